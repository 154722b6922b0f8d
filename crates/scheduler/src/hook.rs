// SPDX-License-Identifier: MIT

//! Post-completion metadata hook: title/OpenGraph-image enrichment.
//!
//! Runs detached from the Scheduler's critical path (it is spawned right
//! after a `success` snapshot is published and never awaited by the loop),
//! so a slow or hostile remote site cannot stall the next queued job. All
//! failures are swallowed — this hook never changes job status.

use std::path::Path;
use std::time::Duration;

use low_tide_broker::Broker;
use low_tide_core::JobId;
use low_tide_store::Store;
use scraper::{Html, Selector};
use tracing::warn;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch `url`, extract `<title>`/OpenGraph metadata, and update the job
/// row. Swallows every error; publishes a fresh snapshot only if it
/// actually changed something.
pub async fn run(job_id: JobId, url: String, thumbnails_dir: std::path::PathBuf, store: &Store, broker: &Broker) {
    let Some(job) = ok_or_warn(store.get_job(job_id), job_id, "reload job before metadata hook") else {
        return;
    };
    let Some(job) = job else { return };
    if job.status != low_tide_core::JobStatus::Success {
        return;
    }

    let client = match reqwest::Client::builder().timeout(FETCH_TIMEOUT).build() {
        Ok(client) => client,
        Err(source) => {
            warn!(%job_id, %source, "failed to build metadata hook http client");
            return;
        }
    };

    let body = match client.get(&url).send().await {
        Ok(response) => match response.text().await {
            Ok(body) => body,
            Err(source) => {
                warn!(%job_id, %source, "failed to read metadata response body");
                return;
            }
        },
        Err(source) => {
            warn!(%job_id, %url, %source, "metadata hook fetch failed");
            return;
        }
    };

    let metadata = extract(&body);
    let mut changed = false;

    if let Some(title) = metadata.title.filter(|_| job.has_derived_title()) {
        if ok_or_warn(store.update_title(job_id, &title), job_id, "persist enriched title").is_some() {
            changed = true;
        }
    }

    if let Some(image_url) = metadata.image {
        if let Some(path) = download_image(&client, job_id, &image_url, &thumbnails_dir).await {
            if ok_or_warn(store.update_image_path(job_id, &path), job_id, "persist thumbnail path").is_some() {
                changed = true;
            }
        }
    }

    if changed {
        if let Some(Some(job)) = ok_or_warn(store.get_job(job_id), job_id, "reload job after metadata hook") {
            broker.publish_snapshot(job);
        }
    }
}

struct Metadata {
    title: Option<String>,
    image: Option<String>,
}

fn extract(body: &str) -> Metadata {
    let document = Html::parse_document(body);
    let title = select_text(&document, "title")
        .or_else(|| select_attr(&document, r#"meta[property="og:title"]"#, "content"));
    let image = select_attr(&document, r#"meta[property="og:image"]"#, "content");
    Metadata { title, image }
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text = document.select(&selector).next()?.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()?.value().attr(attr).map(str::to_string)
}

async fn download_image(
    client: &reqwest::Client,
    job_id: JobId,
    image_url: &str,
    thumbnails_dir: &Path,
) -> Option<String> {
    let response = match client.get(image_url).send().await {
        Ok(response) => response,
        Err(source) => {
            warn!(%job_id, %image_url, %source, "failed to fetch og:image");
            return None;
        }
    };
    let extension = extension_for(image_url, response.headers().get("content-type").and_then(|v| v.to_str().ok()));
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(source) => {
            warn!(%job_id, %source, "failed to read og:image body");
            return None;
        }
    };
    if let Err(source) = tokio::fs::create_dir_all(thumbnails_dir).await {
        warn!(%job_id, %source, "failed to create thumbnails directory");
        return None;
    }
    let filename = format!("{job_id}.{extension}");
    let dest = thumbnails_dir.join(&filename);
    if let Err(source) = tokio::fs::write(&dest, &bytes).await {
        warn!(%job_id, path = %dest.display(), %source, "failed to write thumbnail");
        return None;
    }
    Some(filename)
}

fn extension_for(url: &str, content_type: Option<&str>) -> &'static str {
    if let Some(ct) = content_type {
        if ct.contains("png") {
            return "png";
        }
        if ct.contains("webp") {
            return "webp";
        }
        if ct.contains("gif") {
            return "gif";
        }
        if ct.contains("jpeg") || ct.contains("jpg") {
            return "jpg";
        }
    }
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "png"
    } else if lower.ends_with(".webp") {
        "webp"
    } else if lower.ends_with(".gif") {
        "gif"
    } else {
        "jpg"
    }
}

fn ok_or_warn<T>(result: Result<T, low_tide_store::StoreError>, job_id: JobId, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(source) => {
            warn!(%job_id, %source, "metadata hook failed to {what}");
            None
        }
    }
}

// SPDX-License-Identifier: MIT

//! REST handlers for `/api/jobs/...`. Each handler mutates the Store, then
//! nudges the Scheduler (`wake`/`cancel`) and publishes a snapshot — the
//! Surface never touches Scheduler state directly, per the design.

use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use low_tide_core::{now_unix, Job, JobFileId, JobId, JobStatus};
use low_tide_store::Store;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    status: Option<String>,
    limit: Option<i64>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<ListQuery>,
) -> Result<Json<Vec<Job>>, ServerError> {
    let status = query.status.as_deref().map(str::parse::<JobStatus>).transpose().ok().flatten();
    let store = state.store.clone();
    let jobs = blocking(&store, move |store| store.list_jobs(status, query.limit)).await?;
    Ok(Json(jobs))
}

pub async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Job>, ServerError> {
    let job_id = JobId(id);
    let store = state.store.clone();
    let job = blocking(&store, move |store| store.get_job(job_id)).await?;
    job.map(Json).ok_or(ServerError::NotFound(job_id))
}

pub async fn get_logs(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse, ServerError> {
    let job_id = JobId(id);
    let store = state.store.clone();
    let job = blocking(&store, move |store| store.get_job(job_id)).await?.ok_or(ServerError::NotFound(job_id))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], job.logs))
}

#[derive(Deserialize)]
pub struct CreateJobsForm {
    app_id: String,
    urls: String,
}

#[derive(Serialize)]
pub struct CreateJobsResponse {
    ids: Vec<i64>,
}

pub async fn create_jobs(
    State(state): State<AppState>,
    Form(form): Form<CreateJobsForm>,
) -> Result<Json<CreateJobsResponse>, ServerError> {
    let urls: Vec<&str> = form.urls.split_whitespace().collect();
    if urls.is_empty() {
        return Err(ServerError::BadRequest("no URLs given".to_string()));
    }

    let mut prepared = Vec::with_capacity(urls.len());
    for raw in &urls {
        let parsed = url::Url::parse(raw)
            .map_err(|source| ServerError::BadRequest(format!("invalid URL {raw:?}: {source}")))?;
        let canonical = parsed.to_string();
        state.config.resolve_app(&form.app_id, &canonical)?;
        prepared.push((canonical, (*raw).to_string()));
    }

    let mut ids = Vec::with_capacity(prepared.len());
    for (canonical, original) in prepared {
        let title = Job::default_title(&canonical);
        let store = state.store.clone();
        let app_id = form.app_id.clone();
        let id = blocking(&store, move |store| {
            store.insert_job(&app_id, &canonical, &original, &title, now_unix())
        })
        .await?;
        publish_snapshot(&state, id).await;
        ids.push(id.0);
    }

    state.scheduler.wake();
    Ok(Json(CreateJobsResponse { ids }))
}

pub async fn retry_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, ServerError> {
    let job_id = JobId(id);
    let store = state.store.clone();
    let job = blocking(&store, move |store| store.get_job(job_id)).await?.ok_or(ServerError::NotFound(job_id))?;
    if job.status == JobStatus::Running {
        return Err(ServerError::Conflict(job_id));
    }
    let store = state.store.clone();
    blocking(&store, move |store| store.reset_for_retry(job_id, now_unix())).await?;
    publish_snapshot(&state, job_id).await;
    state.scheduler.wake();
    Ok(Json(serde_json::json!({})))
}

pub async fn cancel_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, ServerError> {
    state.scheduler.cancel(JobId(id)).await;
    Ok(Json(serde_json::json!({})))
}

pub async fn archive_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, ServerError> {
    let job_id = JobId(id);
    let store = state.store.clone();
    blocking(&store, move |store| store.archive(job_id)).await?;
    publish_snapshot(&state, job_id).await;
    Ok(Json(serde_json::json!({})))
}

pub async fn cleanup_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, ServerError> {
    let job_id = JobId(id);
    let store = state.store.clone();
    let job = blocking(&store, move |store| store.get_job(job_id)).await?.ok_or(ServerError::NotFound(job_id))?;
    if job.status == JobStatus::Running {
        return Err(ServerError::Conflict(job_id));
    }
    if job.status != JobStatus::Cleaned {
        let out_dir = state.config.job_output_dir(id);
        if out_dir.exists() {
            tokio::fs::remove_dir_all(&out_dir).await?;
        }
        let store = state.store.clone();
        blocking(&store, move |store| -> Result<(), low_tide_store::StoreError> {
            store.delete_job_files_for_job(job_id)?;
            store.mark_cleaned(job_id)
        })
        .await?;
        publish_snapshot(&state, job_id).await;
    }
    Ok(Json(serde_json::json!({})))
}

pub async fn delete_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, ServerError> {
    let job_id = JobId(id);
    let store = state.store.clone();
    let job = blocking(&store, move |store| store.get_job(job_id)).await?.ok_or(ServerError::NotFound(job_id))?;
    if job.status == JobStatus::Running {
        return Err(ServerError::Conflict(job_id));
    }
    let out_dir = state.config.job_output_dir(id);
    if out_dir.exists() {
        tokio::fs::remove_dir_all(&out_dir).await?;
    }
    let store = state.store.clone();
    blocking(&store, move |store| store.delete_job(job_id)).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn get_file(
    State(state): State<AppState>,
    Path((job_id, file_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ServerError> {
    let job_id = JobId(job_id);
    let store = state.store.clone();
    let file = blocking(&store, move |store| store.get_job_file(JobFileId(file_id)))
        .await?
        .filter(|file| file.job_id == job_id)
        .ok_or(ServerError::NotFound(job_id))?;

    let path = state.config.job_output_dir(job_id.0).join(&file.path);
    let handle = tokio::fs::File::open(&path).await?;
    let stream = ReaderStream::new(handle);
    let body = axum::body::Body::from_stream(stream);
    let filename = file.path.rsplit('/').next().unwrap_or(&file.path).to_string();
    Ok((
        [(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\""))],
        body,
    ))
}

pub async fn get_zip(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse, ServerError> {
    let job_id = JobId(id);
    let store = state.store.clone();
    let files = blocking(&store, move |store| store.list_job_files(job_id)).await?;
    let out_dir = state.config.job_output_dir(id);

    let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ServerError> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options: zip::write::FileOptions<'_, ()> =
                zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for file in files {
                let path = out_dir.join(&file.path);
                let data = std::fs::read(&path)?;
                writer.start_file(&file.path, options)?;
                std::io::Write::write_all(&mut writer, &data)?;
            }
            writer.finish()?;
        }
        Ok(buf.into_inner())
    })
    .await
    .map_err(|source| ServerError::BadRequest(format!("zip task panicked: {source}")))??;

    Ok(([(header::CONTENT_TYPE, "application/zip")], bytes))
}

pub async fn get_thumbnail(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse, ServerError> {
    let job_id = JobId(id);
    let store = state.store.clone();
    let job = blocking(&store, move |store| store.get_job(job_id)).await?.ok_or(ServerError::NotFound(job_id))?;
    let image_path = job.image_path.ok_or(ServerError::NotFound(job_id))?;
    let path = state.config.thumbnails_dir().join(&image_path);
    let handle = tokio::fs::File::open(&path).await?;
    let stream = ReaderStream::new(handle);
    Ok(axum::body::Body::from_stream(stream))
}

pub async fn publish_snapshot(state: &AppState, job_id: JobId) {
    if let Ok(Some(job)) = blocking(&state.store, move |s| s.get_job(job_id)).await {
        state.broker.publish_snapshot(job);
    }
}

/// Run a synchronous `Store` call on the blocking thread pool, matching
/// the design's "every blocking DB call is dispatched via
/// `tokio::task::spawn_blocking`" rule for the async request path.
async fn blocking<T, E>(store: &Arc<Store>, f: impl FnOnce(&Store) -> Result<T, E> + Send + 'static) -> Result<T, E>
where
    T: Send + 'static,
    E: From<low_tide_store::StoreError> + Send + 'static,
{
    let store = store.clone();
    match tokio::task::spawn_blocking(move || f(&store)).await {
        Ok(result) => result,
        Err(_) => unreachable!("store blocking task panicked; Store methods never panic"),
    }
}

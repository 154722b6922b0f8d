use crate::support::{create_job, spawn_server, wait_for_status};

#[tokio::test]
async fn cancel_stops_a_running_job_and_retry_requeues_it() {
    let server = spawn_server("  - id: sleep\n    name: Sleep\n    cmd: [\"sh\", \"-c\", \"sleep 30\"]\n").await;

    let id = create_job(&server, "sleep", "http://a").await;
    wait_for_status(&server, id, "running").await;

    let client = reqwest::Client::new();
    let resp = client.post(server.url(&format!("/api/jobs/{id}/cancel"))).send().await.expect("POST cancel");
    assert!(resp.status().is_success());

    let cancelled = wait_for_status(&server, id, "cancelled").await;
    assert!(cancelled["finished_at"].is_i64());

    let resp = client.post(server.url(&format!("/api/jobs/{id}/retry"))).send().await.expect("POST retry");
    assert!(resp.status().is_success());
    // Retry resets the job to `queued` and the scheduler picks it straight
    // back up since nothing else is queued ahead of it; `running` again is
    // the observable proof the reset took (the `queued` instant is too
    // narrow a window to reliably poll for over HTTP).
    let resumed = wait_for_status(&server, id, "running").await;
    assert!(resumed["pid"].is_u64());

    let resp = client.post(server.url(&format!("/api/jobs/{id}/cancel"))).send().await.expect("POST cancel");
    assert!(resp.status().is_success());
    wait_for_status(&server, id, "cancelled").await;
}

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;

use crate::support::{create_job, spawn_server};

#[tokio::test]
async fn ws_state_streams_snapshots_and_logs_in_order() {
    let server = spawn_server(
        "  - id: sleep\n    name: Sleep\n    cmd: [\"sh\", \"-c\", \"echo line1; sleep 1; echo line2\"]\n",
    )
    .await;

    let ws_url = format!("ws://{}/ws/state", server.addr);
    let (ws, _) = tokio_tungstenite::connect_async(&ws_url).await.expect("ws connect");
    let (_, mut read) = ws.split();

    let id = create_job(&server, "sleep", "http://a").await;

    let mut saw_queued = false;
    let mut saw_running = false;
    let mut saw_log = false;
    let mut saw_success = false;

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(20);
    while tokio::time::Instant::now() < deadline && !saw_success {
        let Some(Ok(Message::Text(text))) =
            tokio::time::timeout(std::time::Duration::from_secs(20), read.next()).await.expect("ws timeout")
        else {
            continue;
        };
        let frame: serde_json::Value = serde_json::from_str(&text).expect("json frame");
        match frame["type"].as_str() {
            Some("job_snapshot") if frame["job"]["id"] == id => match frame["job"]["status"].as_str() {
                Some("queued") => saw_queued = true,
                Some("running") => {
                    assert!(saw_queued, "running snapshot before queued snapshot");
                    saw_running = true;
                }
                Some("success") => {
                    assert!(saw_running, "success snapshot before running snapshot");
                    saw_success = true;
                }
                _ => {}
            },
            Some("job_log") if frame["job_id"] == id => {
                assert!(saw_running, "log line before running snapshot");
                saw_log = true;
            }
            _ => {}
        }
    }

    assert!(saw_queued && saw_running && saw_log && saw_success, "missing frame in ws sequence");
}

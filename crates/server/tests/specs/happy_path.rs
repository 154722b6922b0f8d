use crate::support::{create_job, spawn_server, wait_for_status};

#[tokio::test]
async fn happy_path_runs_a_downloader_to_success() {
    let server = spawn_server(
        "  - id: test-curl\n    name: Test Curl\n    cmd: [\"sh\", \"-c\", \"echo hi > testfile.txt\"]\n",
    )
    .await;

    let id = create_job(&server, "test-curl", "http://127.0.0.1:9999/page.html").await;

    wait_for_status(&server, id, "running").await;
    let done = wait_for_status(&server, id, "success").await;

    let files = done["files"].as_array().expect("files array");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["path"], "testfile.txt");
    assert!(files[0]["size_bytes"].as_i64().expect("size") > 0);
}

use crate::support::{create_job, spawn_server, wait_for_status};

#[tokio::test]
async fn nonexistent_executable_fails_the_job_with_no_files() {
    let server =
        spawn_server("  - id: missing\n    name: Missing\n    cmd: [\"/no/such/executable\"]\n").await;

    let id = create_job(&server, "missing", "http://a").await;
    let failed = wait_for_status(&server, id, "failed").await;

    assert!(failed["error_message"].as_str().expect("error_message").contains("no/such/executable"));
    assert!(failed["files"].as_array().expect("files").is_empty());
}

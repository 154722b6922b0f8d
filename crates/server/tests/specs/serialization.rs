use crate::support::{create_job, spawn_server, wait_for_status};

#[tokio::test]
async fn second_job_stays_queued_until_the_first_terminates() {
    let server = spawn_server(
        "  - id: sleep-a\n    name: Sleep A\n    cmd: [\"sh\", \"-c\", \"sleep 3\"]\n  - id: sleep-b\n    name: Sleep B\n    cmd: [\"sh\", \"-c\", \"sleep 1\"]\n",
    )
    .await;

    let a = create_job(&server, "sleep-a", "http://a").await;
    let b = create_job(&server, "sleep-b", "http://b").await;

    wait_for_status(&server, a, "running").await;
    // B must still be queued while A runs.
    let b_job = server.store.get_job(low_tide_core::JobId(b)).unwrap().unwrap();
    assert_eq!(b_job.status, low_tide_core::JobStatus::Queued);

    wait_for_status(&server, a, "success").await;
    wait_for_status(&server, b, "running").await;
    wait_for_status(&server, b, "success").await;
}

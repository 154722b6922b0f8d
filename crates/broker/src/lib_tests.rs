use super::*;
use low_tide_core::{Job, JobId, JobStatus};

fn sample_job(id: i64) -> Job {
    Job {
        id: JobId(id),
        app_id: "auto".to_string(),
        url: "https://example.com".to_string(),
        original_url: "https://example.com".to_string(),
        title: "example.com".to_string(),
        image_path: None,
        status: JobStatus::Queued,
        pid: None,
        exit_code: None,
        error_message: None,
        created_at: 0,
        started_at: None,
        finished_at: None,
        archived: false,
        logs: String::new(),
        files: Vec::new(),
    }
}

#[tokio::test]
async fn subscriber_receives_snapshot() {
    let broker = Broker::default();
    let mut sub = broker.subscribe();
    broker.publish_snapshot(sample_job(1));
    match sub.recv().await {
        BrokerEvent::JobSnapshot(job) => assert_eq!(job.id, JobId(1)),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn multiple_subscribers_each_get_a_copy() {
    let broker = Broker::default();
    let mut a = broker.subscribe();
    let mut b = broker.subscribe();
    broker.publish_log_line(JobId(1), 1, "hello".to_string());
    for sub in [&mut a, &mut b] {
        match sub.recv().await {
            BrokerEvent::JobLog { job_id, seq, line } => {
                assert_eq!(job_id, JobId(1));
                assert_eq!(seq, 1);
                assert_eq!(line, "hello");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[tokio::test]
async fn unsubscribe_stops_delivery_and_shrinks_registry() {
    let broker = Broker::default();
    let sub = broker.subscribe();
    assert_eq!(broker.subscriber_count(), 1);
    sub.unsubscribe();
    assert_eq!(broker.subscriber_count(), 0);
}

#[tokio::test]
async fn drop_also_unsubscribes() {
    let broker = Broker::default();
    {
        let _sub = broker.subscribe();
        assert_eq!(broker.subscriber_count(), 1);
    }
    assert_eq!(broker.subscriber_count(), 0);
}

#[tokio::test]
async fn full_queue_drops_oldest_not_newest() {
    let broker = Broker::new(2);
    let mut sub = broker.subscribe();
    broker.publish_log_line(JobId(1), 1, "first".to_string());
    broker.publish_log_line(JobId(1), 2, "second".to_string());
    broker.publish_log_line(JobId(1), 3, "third".to_string());

    let first = sub.recv().await;
    let second = sub.recv().await;
    let lines: Vec<_> = [first, second]
        .into_iter()
        .map(|e| match e {
            BrokerEvent::JobLog { line, .. } => line,
            other => panic!("unexpected event: {other:?}"),
        })
        .collect();
    assert_eq!(lines, vec!["second", "third"]);
}

#[tokio::test]
async fn log_sequence_numbers_increase_in_arrival_order() {
    let broker = Broker::default();
    let mut sub = broker.subscribe();
    for seq in 1..=5u64 {
        broker.publish_log_line(JobId(1), seq, format!("line {seq}"));
    }
    let mut seen = Vec::new();
    for _ in 0..5 {
        if let BrokerEvent::JobLog { seq, .. } = sub.recv().await {
            seen.push(seq);
        }
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[tokio::test]
async fn discovers_file_created_while_running() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(low_tide_store::Store::open(&dir.path().join("jobs.db")).unwrap());
    let job_id = store.insert_job("auto", "u", "u", "u", 1).unwrap();
    let out_dir = dir.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();

    let notifications = Arc::new(AtomicUsize::new(0));
    let counter = notifications.clone();
    let watcher =
        FsWatcher::start(job_id, out_dir.clone(), store.clone(), Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    std::fs::write(out_dir.join("result.txt"), b"hello world").unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    watcher.stop().await;

    let files = store.list_job_files(job_id).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "result.txt");
    assert_eq!(files[0].size_bytes, 11);
    assert!(notifications.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn final_reconciliation_catches_files_written_right_before_stop() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(low_tide_store::Store::open(&dir.path().join("jobs.db")).unwrap());
    let job_id = store.insert_job("auto", "u", "u", "u", 1).unwrap();
    let out_dir = dir.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();

    let watcher = FsWatcher::start(job_id, out_dir.clone(), store.clone(), Arc::new(|| {})).unwrap();
    std::fs::write(out_dir.join("late.txt"), b"x").unwrap();
    watcher.stop().await;

    let files = store.list_job_files(job_id).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "late.txt");
}

#[tokio::test]
async fn relative_paths_use_forward_slashes_for_nested_files() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(low_tide_store::Store::open(&dir.path().join("jobs.db")).unwrap());
    let job_id = store.insert_job("auto", "u", "u", "u", 1).unwrap();
    let out_dir = dir.path().join("out");
    std::fs::create_dir_all(out_dir.join("nested")).unwrap();

    let watcher = FsWatcher::start(job_id, out_dir.clone(), store.clone(), Arc::new(|| {})).unwrap();
    std::fs::write(out_dir.join("nested").join("deep.bin"), b"data").unwrap();
    watcher.stop().await;

    let files = store.list_job_files(job_id).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "nested/deep.bin");
}

#[test]
fn relative_forward_slash_handles_nested_components() {
    let base = Path::new("/tmp/jobs/1");
    let full = Path::new("/tmp/jobs/1/a/b.txt");
    assert_eq!(relative_forward_slash(base, full), Some("a/b.txt".to_string()));
}

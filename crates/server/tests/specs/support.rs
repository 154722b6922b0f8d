use std::net::SocketAddr;
use std::sync::Arc;

use low_tide::state::AppState;
use low_tide_broker::Broker;
use low_tide_config::Config;
use low_tide_store::Store;
use tempfile::TempDir;

/// A running `low-tide` server bound to an ephemeral port, plus the temp
/// directory it owns (dropped, and the server shut down, on scope exit).
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<Store>,
    _dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// Start a server with the given `apps:` YAML block already indented as
/// list items (e.g. `"  - id: test-curl\n    ...\n"`).
pub async fn spawn_server(apps_yaml: &str) -> TestServer {
    let dir = TempDir::new().expect("tempdir");
    let data_root = dir.path().join("data");
    let yaml = format!("data_root: {:?}\napps:\n{apps_yaml}", data_root.display());
    let config = Arc::new(Config::parse(&yaml).expect("valid config"));

    let store = Arc::new(Store::open(&config.database_path).expect("open store"));
    let broker = Broker::default();
    let scheduler = low_tide_scheduler::spawn(config.clone(), store.clone(), broker.clone());

    let app = low_tide::routes::router(AppState { config, store: store.clone(), broker, scheduler });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer { addr, store, _dir: dir }
}

/// Submit one job via the same form-encoded POST the UI uses, returning its
/// id.
pub async fn create_job(server: &TestServer, app_id: &str, url: &str) -> i64 {
    let resp = reqwest::Client::new()
        .post(server.url("/api/jobs"))
        .form(&[("app_id", app_id), ("urls", url)])
        .send()
        .await
        .expect("POST /api/jobs");
    assert!(resp.status().is_success(), "create_jobs: {}", resp.status());
    let body: serde_json::Value = resp.json().await.expect("json body");
    body["ids"][0].as_i64().expect("ids[0]")
}

/// Poll `GET /api/jobs/{id}` until its status matches, or panic after 20s.
pub async fn wait_for_status(server: &TestServer, id: i64, status: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(20);
    loop {
        let resp = reqwest::get(server.url(&format!("/api/jobs/{id}"))).await.expect("GET job");
        let job: serde_json::Value = resp.json().await.expect("json body");
        if job["status"] == status {
            return job;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for job {id} to reach {status}, last seen: {job}");
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

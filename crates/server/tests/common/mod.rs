//! Common test utilities for API testing with mocks.
//!
//! The fixture builds an in-process router whose activities run a fake
//! download utility and talk to an in-memory catalogue and object store.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use beeb_core::{
    config::{DownloaderConfig, WorkflowConfig},
    testing::{MockCatalogue, MockObjectStore},
    Activities, BroadcastBus, Config, LocalScheduler,
};
use beeb_server::state::AppState;

/// Re-export fixtures for test convenience
pub use beeb_core::testing::fixtures;

/// Programme the mock catalogue knows about.
pub const KNOWN_PID: &str = "m0008bbc";

/// Test fixture with an in-process router and controllable collaborators.
pub struct TestFixture {
    pub router: Router,
    pub bus: BroadcastBus,
    pub store: Arc<MockObjectStore>,
    pub catalogue: Arc<MockCatalogue>,
    pub scheduler: LocalScheduler,
    pub config: Config,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture whose download utility writes `files` and exits cleanly.
    pub async fn new(files: &[&str]) -> Self {
        Self::with_workflow(files, |_| {}).await
    }

    /// Like [`TestFixture::new`], with the workflow settings adjusted first.
    pub async fn with_workflow(files: &[&str], adjust: impl FnOnce(&mut WorkflowConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let program = fixtures::fake_downloader(temp_dir.path(), files, 0);
        let mut config = fixtures::test_config(temp_dir.path());
        adjust(&mut config.workflow);
        Self::with_program(temp_dir, program, config).await
    }

    /// Fixture whose download utility runs for `secs` seconds.
    pub async fn slow(secs: u64) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let program = fixtures::slow_downloader(temp_dir.path(), secs);
        let config = fixtures::test_config(temp_dir.path());
        Self::with_program(temp_dir, program, config).await
    }

    async fn with_program(temp_dir: TempDir, program: PathBuf, config: Config) -> Self {
        let bus = BroadcastBus::new(config.bus.capacity);
        let store = Arc::new(MockObjectStore::new());
        let catalogue = Arc::new(MockCatalogue::new());
        catalogue
            .add_programme(
                KNOWN_PID,
                fixtures::programme_metadata("Show", "Pilot", 1, 2),
            )
            .await;

        let activities = Arc::new(Activities::new(
            DownloaderConfig {
                program,
                ..config.downloader.clone()
            },
            Arc::new(bus.clone()),
            store.clone(),
            catalogue.clone(),
            config.store.bucket.clone(),
        ));

        let scheduler = LocalScheduler::new();
        let state = Arc::new(AppState::new(
            config.clone(),
            bus.clone(),
            scheduler.clone(),
            activities,
        ));
        let router = beeb_server::api::create_router(state);

        Self {
            router,
            bus,
            store,
            catalogue,
            scheduler,
            config,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Starts a run for `pid` and returns its workflow id.
    pub async fn start(&self, pid: &str) -> String {
        let response = self
            .post("/api/v1/downloads", serde_json::json!({ "programme_id": pid }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "body: {}", response.body);
        response.body["workflow_id"]
            .as_str()
            .expect("workflow_id in response")
            .to_string()
    }

    /// Polls the run until it reaches a terminal phase.
    pub async fn wait_for_terminal(&self, workflow_id: &str) -> Value {
        let path = format!("/api/v1/downloads/{}", workflow_id);
        for _ in 0..200 {
            let response = self.get(&path).await;
            assert_eq!(response.status, StatusCode::OK);
            let phase = response.body["phase"].as_str().unwrap_or_default().to_string();
            if phase == "succeeded" || phase == "failed" {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("run {} did not finish in time", workflow_id);
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

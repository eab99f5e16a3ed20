//! Test helpers: build AppState and router for integration tests.
//!
//! Both backends are in-memory mocks; the transcoder is the real one. Run from the workspace
//! root with `cargo test -p imgpress-api`.

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use axum_test::TestServer;
use imgpress_api::setup::{routes, services};
use imgpress_api::state::AppState;
use imgpress_core::config::{BaseConfig, ServiceConfig};
use imgpress_core::Config;
use imgpress_storage::{AssetHost, BlobStore};
use mocks::{CountingTranscoder, MockAssetHost, MockBlobStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Test application: server, state and the mocks behind it.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub host: Arc<MockAssetHost>,
    pub store: Arc<MockBlobStore>,
    pub transcoder: Arc<CountingTranscoder>,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn inbound_dir(&self) -> PathBuf {
        self.temp_dir.path().join("uploads")
    }

    pub fn outbound_dir(&self) -> PathBuf {
        self.temp_dir.path().join("after_sharp")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.temp_dir.path().join("folder.json")
    }
}

/// Which backends the app under test is configured with
pub struct Backends {
    pub host: Option<MockAssetHost>,
    pub store: Option<MockBlobStore>,
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            host: Some(MockAssetHost::with_tree(vec![
                ("demo", vec!["cats", "dogs"]),
                ("travel", vec!["2024"]),
            ])),
            store: Some(MockBlobStore::default()),
        }
    }
}

/// Setup test app with both mock backends.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(Backends::default()).await
}

pub async fn setup_test_app_with(backends: Backends) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = create_test_config(temp_dir.path());

    let host_enabled = backends.host.is_some();
    let store_enabled = backends.store.is_some();
    let host = Arc::new(backends.host.unwrap_or_default());
    let store = Arc::new(backends.store.unwrap_or_default());
    let transcoder = Arc::new(CountingTranscoder::default());

    let asset_host: Option<Arc<dyn AssetHost>> = host_enabled.then(|| host.clone() as _);
    let blob_store: Option<Arc<dyn BlobStore>> = store_enabled.then(|| store.clone() as _);

    let state = services::build_state(config.clone(), transcoder.clone(), asset_host, blob_store);
    state.stage.ensure_inbound_dir().await.unwrap();
    state.stage.ensure_outbound_dir().await.unwrap();

    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        host,
        store,
        transcoder,
        temp_dir,
    }
}

fn create_test_config(root: &Path) -> Config {
    Config(Box::new(ServiceConfig {
        base: BaseConfig {
            server_port: 4000,
            environment: "test".to_string(),
        },
        asset_host: None,
        azure_connection_string: None,
        staging_inbound_dir: root.join("uploads"),
        staging_outbound_dir: root.join("after_sharp"),
        folder_snapshot_path: root.join("folder.json"),
        folder_refresh_interval_secs: 3600,
        redirect_delay_ms: 0,
        max_upload_size_bytes: 1024 * 1024,
        http_client_timeout_secs: 5,
    }))
}

/// Number of entries directly under `dir`
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#![allow(dead_code)]

use reqwest::multipart;
use service_core::config::Config as CoreConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vision_service::config::VisionConfig;
use vision_service::services::providers::VisionProvider;
use vision_service::startup::Application;

pub const TEST_API_KEY: &str = "gsk-test-key";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub scratch_dir: PathBuf,
    pub client: reqwest::Client,
    // Keeps the scratch directory alive for the duration of the test.
    _tmp: TempDir,
}

/// Build a configuration pointing at `base_url` with a fresh scratch dir.
pub fn test_config(base_url: &str, scratch_dir: &Path, timeout_secs: u64) -> VisionConfig {
    test_config_with(base_url, scratch_dir, timeout_secs, &[])
}

/// Like [`test_config`], with extra variables layered on top.
pub fn test_config_with(
    base_url: &str,
    scratch_dir: &Path,
    timeout_secs: u64,
    extra: &[(&'static str, String)],
) -> VisionConfig {
    let mut vars: HashMap<&str, String> = HashMap::from([
        ("GROQ_API_KEY", TEST_API_KEY.to_string()),
        ("COMPLETION_API_BASE_URL", base_url.to_string()),
        ("COMPLETION_TIMEOUT_SECS", timeout_secs.to_string()),
        ("SCRATCH_DIR", scratch_dir.display().to_string()),
    ]);
    vars.extend(extra.iter().cloned());

    VisionConfig::from_lookup(CoreConfig { port: 0 }, |key| vars.get(key).cloned())
        .expect("Failed to build test configuration")
}

impl TestApp {
    /// Spawn the real application talking to an OpenAI-compatible server at `base_url`.
    pub async fn spawn_against(base_url: &str, timeout_secs: u64) -> Self {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let scratch_dir = tmp.path().join("uploads");
        let config = test_config(base_url, &scratch_dir, timeout_secs);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        Self::start(app, tmp, scratch_dir).await
    }

    /// Spawn the application around an in-process provider.
    pub async fn spawn_with_provider(provider: Arc<dyn VisionProvider>, timeout_secs: u64) -> Self {
        Self::spawn_with_provider_and(provider, timeout_secs, &[]).await
    }

    /// Spawn around an in-process provider with extra configuration variables.
    pub async fn spawn_with_provider_and(
        provider: Arc<dyn VisionProvider>,
        timeout_secs: u64,
        extra: &[(&'static str, String)],
    ) -> Self {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let scratch_dir = tmp.path().join("uploads");
        let config = test_config_with("http://127.0.0.1:9", &scratch_dir, timeout_secs, extra);

        let app = Application::build_with_provider(config, provider)
            .await
            .expect("Failed to build test application");

        Self::start(app, tmp, scratch_dir).await
    }

    async fn start(app: Application, tmp: TempDir, scratch_dir: PathBuf) -> Self {
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            scratch_dir,
            client,
            _tmp: tmp,
        }
    }

    pub async fn upload(&self, file_name: &str, data: Vec<u8>) -> reqwest::Response {
        let form = multipart::Form::new().part(
            "image",
            multipart::Part::bytes(data)
                .file_name(file_name.to_string())
                .mime_str("image/jpeg")
                .unwrap(),
        );

        self.client
            .post(format!("{}/upload", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Number of files currently in the scratch directory.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(&self.scratch_dir)
            .expect("Scratch directory should exist")
            .count()
    }
}

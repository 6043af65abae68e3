//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] around an
//! in-memory [`FakeEngine`], and starts Axum on a random port for HTTP-level
//! testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use ow_core::config::Config;
use ow_engine::{CodecEngine, EngineSession, EngineSignal, SignalSink, ToolRegistry};
use ow_server::context::AppContext;
use ow_server::router::build_router;

/// In-memory engine. Each command "writes" its last argument, unless told
/// to produce nothing or to fail.
#[derive(Default)]
pub struct FakeEngine {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub commands: Mutex<Vec<Vec<String>>>,
    /// Error message returned by every command.
    pub fail_with: Option<String>,
    /// Run commands without writing anything.
    pub skip_output: bool,
    /// When set, each command waits for a permit before running.
    pub hold: Option<Arc<Semaphore>>,
}

impl FakeEngine {
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().clone()
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }
}

#[async_trait]
impl CodecEngine for FakeEngine {
    async fn write_input(&self, name: &str, bytes: &[u8]) -> ow_core::Result<()> {
        self.files.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn run_command(&self, args: &[String], sink: SignalSink<'_>) -> ow_core::Result<()> {
        if let Some(ref hold) = self.hold {
            hold.acquire()
                .await
                .map_err(|e| ow_core::Error::Internal(e.to_string()))?
                .forget();
        }
        self.commands.lock().push(args.to_vec());

        if let Some(ref msg) = self.fail_with {
            return Err(ow_core::Error::tool("ffmpeg", msg.clone()));
        }

        sink(EngineSignal::Log("size=N/A time=00:00:01.00 bitrate=N/A".into()));
        sink(EngineSignal::Progress(1.0));

        if !self.skip_output {
            let output = args.last().cloned().unwrap_or_default();
            self.files.lock().insert(output, b"boosted".to_vec());
        }
        Ok(())
    }

    async fn read_output(&self, name: &str) -> ow_core::Result<Vec<u8>> {
        self.files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ow_core::Error::not_found("engine file", name))
    }

    async fn contains(&self, name: &str) -> bool {
        self.has_file(name)
    }

    async fn discard(&self, name: &str) -> ow_core::Result<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn version(&self) -> Option<String> {
        Some("fake 1.0".into())
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub engine: Option<Arc<FakeEngine>>,
}

impl TestHarness {
    /// Harness with a ready [`FakeEngine`] using default behavior.
    pub fn new() -> Self {
        Self::with_engine(FakeEngine::default())
    }

    /// Harness with a ready engine.
    pub fn with_engine(engine: FakeEngine) -> Self {
        let engine = Arc::new(engine);
        let session = EngineSession::ready(engine.clone());
        Self {
            ctx: Self::context(session),
            engine: Some(engine),
        }
    }

    /// Harness around a session without a usable engine.
    pub fn with_session(session: EngineSession) -> Self {
        Self {
            ctx: Self::context(session),
            engine: None,
        }
    }

    fn context(session: EngineSession) -> AppContext {
        AppContext::new(
            Config::default(),
            Arc::new(session),
            Arc::new(ToolRegistry::default()),
        )
    }

    pub fn engine(&self) -> &FakeEngine {
        self.engine.as_deref().expect("harness has no engine")
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = build_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    /// Start a server with a default ready engine.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }
}

/// POST one file to `/api/upload`.
pub async fn upload(addr: SocketAddr, name: &str, mime: &str, data: &[u8]) -> reqwest::Response {
    let part = reqwest::multipart::Part::bytes(data.to_vec())
        .file_name(name.to_string())
        .mime_str(mime)
        .expect("valid mime");
    let form = reqwest::multipart::Form::new().part("file", part);
    reqwest::Client::new()
        .post(format!("http://{addr}/api/upload"))
        .multipart(form)
        .send()
        .await
        .expect("upload request failed")
}

/// Poll the shell view until the current job has finished and the gate is
/// open again; returns the job snapshot.
pub async fn wait_for_job(addr: SocketAddr) -> serde_json::Value {
    for _ in 0..200 {
        let shell: serde_json::Value = reqwest::get(format!("http://{addr}/api/shell"))
            .await
            .expect("shell request failed")
            .json()
            .await
            .expect("shell json");
        let job = &shell["job"];
        if !job.is_null() && job["phase"] != "running" && shell["busy"] == false {
            return job.clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job did not finish in time");
}

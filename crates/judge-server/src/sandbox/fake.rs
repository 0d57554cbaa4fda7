use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use harness_core::{Language, ResourceLimits};

use super::{ExecOutcome, SandboxHandle, SandboxManager};

/// In-memory `SandboxManager` test double. Records every file an upload
/// wrote and lets a test script the `exec` response per command, so the
/// orchestrator's scheduling/classification logic can be exercised without
/// a Docker daemon. Counts `acquire`/`release` calls to verify sandbox
/// hygiene under panics and cancellation.
pub struct FakeSandboxManager {
    acquires: AtomicU64,
    releases: AtomicU64,
    uploads: Mutex<HashMap<String, Vec<u8>>>,
    downloads: Mutex<HashMap<String, Vec<u8>>>,
    responses: Mutex<Vec<ExecOutcome>>,
    commands: Mutex<Vec<Vec<String>>>,
}

impl Default for FakeSandboxManager {
    fn default() -> Self {
        FakeSandboxManager {
            acquires: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            uploads: Mutex::new(HashMap::new()),
            downloads: Mutex::new(HashMap::new()),
            responses: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }
}

impl FakeSandboxManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the `ExecOutcome`s to return from successive `exec` calls,
    /// in call order.
    pub fn push_response(&self, outcome: ExecOutcome) {
        self.responses.lock().unwrap().push(outcome);
    }

    /// Scripts what a future `download(handle, path)` call returns, as if
    /// the harness had written that file inside the sandbox.
    pub fn set_download(&self, path: &str, bytes: Vec<u8>) {
        self.downloads.lock().unwrap().insert(path.to_string(), bytes);
    }

    pub fn acquire_count(&self) -> u64 {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn uploaded(&self, name: &str) -> Option<Vec<u8>> {
        self.uploads.lock().unwrap().get(name).cloned()
    }

    /// The `command` argument of every past `exec` call, in call order.
    pub fn exec_commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SandboxManager for FakeSandboxManager {
    async fn acquire(
        &self,
        language: Language,
        _limits: &ResourceLimits,
    ) -> anyhow::Result<SandboxHandle> {
        let id = self.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(SandboxHandle {
            id: format!("fake-{id}"),
            language,
        })
    }

    async fn upload(&self, _handle: &SandboxHandle, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        self.uploads
            .lock()
            .unwrap()
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn exec(
        &self,
        _handle: &SandboxHandle,
        command: &[String],
        _deadline: Duration,
    ) -> anyhow::Result<ExecOutcome> {
        self.commands.lock().unwrap().push(command.to_vec());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            anyhow::bail!("FakeSandboxManager: no scripted exec response left");
        }
        Ok(responses.remove(0))
    }

    async fn download(&self, _handle: &SandboxHandle, path: &str) -> anyhow::Result<Vec<u8>> {
        if let Some(bytes) = self.downloads.lock().unwrap().get(path).cloned() {
            return Ok(bytes);
        }
        self.uploaded(path)
            .ok_or_else(|| anyhow::anyhow!("FakeSandboxManager: no file at {path}"))
    }

    async fn release(&self, _handle: SandboxHandle) -> anyhow::Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

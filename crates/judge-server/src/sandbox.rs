mod docker;
mod fake;
mod remote;

pub use docker::LocalDockerSandbox;
pub use fake::FakeSandboxManager;
pub use remote::RemoteSandbox;

use std::collections::HashMap;
use std::time::Duration;

use harness_core::{Language, ResourceLimits};

/// Opaque identity for an acquired sandbox. Carries enough to let a
/// `SandboxManager` impl find its own state again (container id for
/// Docker, session handle for a remote proxy) without leaking that detail
/// to callers.
#[derive(Debug, Clone)]
pub struct SandboxHandle {
    pub id: String,
    pub language: Language,
}

/// Outcome of one `exec` call inside a sandbox.
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub wall_ms: u64,
    /// Set when the manager's own outer deadline killed the container,
    /// distinct from the harness's own, narrower compile/execution
    /// timeouts. Feeds classifier rule 1 directly.
    pub killed_by_deadline: bool,
}

/// Fixed language → container image tag mapping, loaded from `Config`.
#[derive(Debug, Clone, Default)]
pub struct ContainerRegistry {
    images: HashMap<Language, String>,
}

impl ContainerRegistry {
    pub fn new(images: HashMap<Language, String>) -> Self {
        ContainerRegistry { images }
    }

    pub fn image_for(&self, language: Language) -> anyhow::Result<&str> {
        self.images
            .get(&language)
            .map(String::as_str)
            .ok_or_else(|| anyhow::anyhow!("no container image configured for {language:?}"))
    }
}

/// Creates, feeds, executes inside, and destroys isolated containers.
/// Local (Docker Engine API) and remote (SSH-proxied) implementations
/// share this exact contract.
#[async_trait::async_trait]
pub trait SandboxManager: Send + Sync {
    async fn acquire(
        &self,
        language: Language,
        limits: &ResourceLimits,
    ) -> anyhow::Result<SandboxHandle>;

    async fn upload(&self, handle: &SandboxHandle, name: &str, bytes: &[u8]) -> anyhow::Result<()>;

    async fn exec(
        &self,
        handle: &SandboxHandle,
        command: &[String],
        deadline: Duration,
    ) -> anyhow::Result<ExecOutcome>;

    async fn download(&self, handle: &SandboxHandle, path: &str) -> anyhow::Result<Vec<u8>>;

    async fn release(&self, handle: SandboxHandle) -> anyhow::Result<()>;
}

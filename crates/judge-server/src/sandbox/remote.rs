use std::time::Duration;

use harness_core::{Language, ResourceLimits};
use openssh::{KnownHosts, Session};
use tokio::sync::OnceCell;

use super::{ContainerRegistry, ExecOutcome, SandboxHandle, SandboxManager};

/// Proxies the same five `SandboxManager` operations over one multiplexed
/// SSH connection to a remote Docker host, by running the `docker` CLI
/// remotely rather than reimplementing the Engine API over SSH. Public
/// contract is identical to `LocalDockerSandbox`.
pub struct RemoteSandbox {
    destination: String,
    registry: ContainerRegistry,
    session: OnceCell<Session>,
}

impl RemoteSandbox {
    pub fn new(destination: impl Into<String>, registry: ContainerRegistry) -> Self {
        RemoteSandbox {
            destination: destination.into(),
            registry,
            session: OnceCell::new(),
        }
    }

    async fn session(&self) -> anyhow::Result<&Session> {
        self.session
            .get_or_try_init(|| async {
                Session::connect(&self.destination, KnownHosts::Strict)
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await
    }
}

#[async_trait::async_trait]
impl SandboxManager for RemoteSandbox {
    async fn acquire(
        &self,
        language: Language,
        limits: &ResourceLimits,
    ) -> anyhow::Result<SandboxHandle> {
        let image = self.registry.image_for(language)?;
        let name = format!("judge-{}", uuid::Uuid::new_v4());
        let session = self.session().await?;

        let nano_cpus = (limits.cpu_cores * 1_000_000_000.0) as i64;
        let status = session
            .command("docker")
            .arg("run")
            .arg("-d")
            .arg("--name")
            .arg(&name)
            .arg("--network")
            .arg("none")
            .arg("--cpus")
            .arg(format!("{:.3}", nano_cpus as f64 / 1_000_000_000.0))
            .arg("--memory")
            .arg(limits.memory_bytes.to_string())
            .arg("-w")
            .arg("/app")
            .arg(image)
            .arg("sleep")
            .arg("infinity")
            .status()
            .await?;

        anyhow::ensure!(status.success(), "remote docker run failed for {name}");
        Ok(SandboxHandle { id: name, language })
    }

    async fn upload(&self, handle: &SandboxHandle, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let session = self.session().await?;
        let remote_tmp = format!("/tmp/{}-{}", handle.id, name);

        let mut write = session
            .command("tee")
            .arg(&remote_tmp)
            .stdin(openssh::Stdio::piped())
            .stdout(openssh::Stdio::null())
            .spawn()
            .await?;
        {
            let stdin = write.stdin.as_mut().expect("piped stdin");
            tokio::io::AsyncWriteExt::write_all(stdin, bytes).await?;
            tokio::io::AsyncWriteExt::shutdown(stdin).await?;
        }
        write.wait().await?;

        let status = session
            .command("docker")
            .arg("cp")
            .arg(&remote_tmp)
            .arg(format!("{}:/app/{name}", handle.id))
            .status()
            .await?;
        anyhow::ensure!(status.success(), "remote docker cp failed for {name}");
        Ok(())
    }

    async fn exec(
        &self,
        handle: &SandboxHandle,
        command: &[String],
        deadline: Duration,
    ) -> anyhow::Result<ExecOutcome> {
        let session = self.session().await?;
        let started = std::time::Instant::now();

        let mut cmd = session.command("docker");
        cmd.arg("exec").arg(&handle.id);
        for part in command {
            cmd.arg(part);
        }

        let killed_by_deadline;
        let output = match tokio::time::timeout(deadline, cmd.output()).await {
            Ok(result) => {
                killed_by_deadline = false;
                result?
            }
            Err(_elapsed) => {
                killed_by_deadline = true;
                session
                    .command("docker")
                    .arg("kill")
                    .arg(&handle.id)
                    .status()
                    .await
                    .ok();
                return Ok(ExecOutcome {
                    exit_code: -1,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    wall_ms: started.elapsed().as_millis() as u64,
                    killed_by_deadline,
                });
            }
        };

        Ok(ExecOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
            wall_ms: started.elapsed().as_millis() as u64,
            killed_by_deadline,
        })
    }

    async fn download(&self, handle: &SandboxHandle, path: &str) -> anyhow::Result<Vec<u8>> {
        let session = self.session().await?;
        let remote_tmp = format!("/tmp/{}-download", handle.id);
        let status = session
            .command("docker")
            .arg("cp")
            .arg(format!("{}:{path}", handle.id))
            .arg(&remote_tmp)
            .status()
            .await?;
        anyhow::ensure!(status.success(), "remote docker cp (download) failed for {path}");

        let output = session.command("cat").arg(&remote_tmp).output().await?;
        anyhow::ensure!(output.status.success(), "remote cat failed for {remote_tmp}");
        Ok(output.stdout)
    }

    async fn release(&self, handle: SandboxHandle) -> anyhow::Result<()> {
        let session = self.session().await?;
        session
            .command("docker")
            .arg("rm")
            .arg("-f")
            .arg(&handle.id)
            .status()
            .await
            .ok();
        Ok(())
    }
}

use std::io::Write;
use std::time::Duration;

use bollard::Docker;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{HostConfig, NetworkMode};
use futures_util::StreamExt;
use harness_core::{Language, ResourceLimits};
use tokio::time::timeout;

use super::{ContainerRegistry, ExecOutcome, SandboxHandle, SandboxManager};

/// The primary `SandboxManager`: one container per acquired sandbox,
/// created detached with networking disabled and CPU/memory caps taken
/// directly from `ResourceLimits`.
pub struct LocalDockerSandbox {
    docker: Docker,
    registry: ContainerRegistry,
}

impl LocalDockerSandbox {
    pub fn new(docker: Docker, registry: ContainerRegistry) -> Self {
        LocalDockerSandbox { docker, registry }
    }

    pub fn connect_with_defaults(registry: ContainerRegistry) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(LocalDockerSandbox::new(docker, registry))
    }
}

#[async_trait::async_trait]
impl SandboxManager for LocalDockerSandbox {
    async fn acquire(
        &self,
        language: Language,
        limits: &ResourceLimits,
    ) -> anyhow::Result<SandboxHandle> {
        let image = self.registry.image_for(language)?;
        let name = format!("judge-{}", uuid::Uuid::new_v4());

        let host_config = HostConfig {
            network_mode: Some(NetworkMode::None.to_string()),
            nano_cpus: Some((limits.cpu_cores * 1_000_000_000.0) as i64),
            memory: Some(limits.memory_bytes as i64),
            ..Default::default()
        };

        let config = ContainerConfig {
            image: Some(image.to_string()),
            working_dir: Some("/app".to_string()),
            host_config: Some(host_config),
            tty: Some(false),
            ..Default::default()
        };

        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                config,
            )
            .await?;

        self.docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await?;

        Ok(SandboxHandle { id: name, language })
    }

    async fn upload(&self, handle: &SandboxHandle, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, bytes)?;
        let tar_bytes = builder.into_inner()?;

        self.docker
            .upload_to_container(
                &handle.id,
                Some(UploadToContainerOptions {
                    path: "/app".to_string(),
                    ..Default::default()
                }),
                tar_bytes.into(),
            )
            .await?;
        Ok(())
    }

    async fn exec(
        &self,
        handle: &SandboxHandle,
        command: &[String],
        deadline: Duration,
    ) -> anyhow::Result<ExecOutcome> {
        let started = std::time::Instant::now();

        let exec = self
            .docker
            .create_exec(
                &handle.id,
                CreateExecOptions {
                    cmd: Some(command.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    working_dir: Some("/app".to_string()),
                    ..Default::default()
                },
            )
            .await?;

        let run = async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            if let StartExecResults::Attached { mut output, .. } =
                self.docker.start_exec(&exec.id, None).await?
            {
                while let Some(chunk) = output.next().await {
                    match chunk? {
                        bollard::container::LogOutput::StdOut { message } => {
                            stdout.write_all(&message)?
                        }
                        bollard::container::LogOutput::StdErr { message } => {
                            stderr.write_all(&message)?
                        }
                        _ => {}
                    }
                }
            }
            anyhow::Ok((stdout, stderr))
        };

        let killed_by_deadline;
        let (stdout, stderr) = match timeout(deadline, run).await {
            Ok(result) => {
                killed_by_deadline = false;
                result?
            }
            Err(_elapsed) => {
                killed_by_deadline = true;
                self.docker
                    .stop_container(&handle.id, Some(StopContainerOptions { t: 0 }))
                    .await
                    .ok();
                (Vec::new(), Vec::new())
            }
        };

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1) as i32;

        Ok(ExecOutcome {
            exit_code,
            stdout,
            stderr,
            wall_ms: started.elapsed().as_millis() as u64,
            killed_by_deadline,
        })
    }

    async fn download(&self, handle: &SandboxHandle, path: &str) -> anyhow::Result<Vec<u8>> {
        let mut stream = self.docker.download_from_container(
            &handle.id,
            Some(bollard::container::DownloadFromContainerOptions {
                path: path.to_string(),
            }),
        );

        let mut raw = Vec::new();
        while let Some(chunk) = stream.next().await {
            raw.extend_from_slice(&chunk?);
        }

        let mut archive = tar::Archive::new(raw.as_slice());
        for entry in archive.entries()? {
            let mut entry = entry?;
            let mut bytes = Vec::new();
            std::io::copy(&mut entry, &mut bytes)?;
            return Ok(bytes);
        }
        anyhow::bail!("download_from_container returned an empty archive for {path}")
    }

    async fn release(&self, handle: SandboxHandle) -> anyhow::Result<()> {
        self.docker
            .stop_container(&handle.id, Some(StopContainerOptions { t: 0 }))
            .await
            .ok();
        self.docker
            .remove_container(
                &handle.id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }
}

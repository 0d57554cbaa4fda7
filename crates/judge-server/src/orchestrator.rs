//! Execution orchestrator: single-shot and optimized-batch scheduling of
//! submissions onto sandboxes. Concurrency is bounded by a semaphore gating
//! sandbox acquisition rather than a fixed worker pool, so scheduling stays
//! per-request instead of running through a dedicated pop loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use harness_core::{
    CompilerSettings, FunctionType, Language, Literal, Parameter, ParameterSchema, ResourceLimits,
    Verdict,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::classifier::classify;
use crate::codec;
use crate::sandbox::{ContainerRegistry, ExecOutcome, SandboxHandle, SandboxManager};
use crate::types::{BatchSubmission, Submission};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_concurrent_sandboxes: usize,
    pub margin: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            max_concurrent_sandboxes: 2,
            margin: Duration::from_secs(5),
        }
    }
}

/// Owns a `SandboxHandle` for the lifetime of one evaluation and releases
/// it on every exit path, success or failure.
struct SandboxGuard {
    sandboxes: Arc<dyn SandboxManager>,
    handle: Option<SandboxHandle>,
}

impl SandboxGuard {
    fn new(sandboxes: Arc<dyn SandboxManager>, handle: SandboxHandle) -> Self {
        SandboxGuard {
            sandboxes,
            handle: Some(handle),
        }
    }

    fn handle(&self) -> &SandboxHandle {
        self.handle.as_ref().expect("handle taken only on drop")
    }

    async fn release(mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.handle.take() {
            self.sandboxes.release(handle).await?;
        }
        Ok(())
    }
}

impl Drop for SandboxGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let sandboxes = self.sandboxes.clone();
            tokio::spawn(async move {
                if let Err(e) = sandboxes.release(handle).await {
                    log::error!("sandbox release on drop failed: {e}");
                }
            });
        }
    }
}

pub struct Orchestrator {
    sandboxes: Arc<dyn SandboxManager>,
    registry: ContainerRegistry,
    semaphore: Arc<Semaphore>,
    config: OrchestratorConfig,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        sandboxes: Arc<dyn SandboxManager>,
        registry: ContainerRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_sandboxes.max(1)));
        Orchestrator {
            sandboxes,
            registry,
            semaphore,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancels every in-flight `evaluate`/`evaluate_batch` call waiting at
    /// a suspension point. Already-running sandboxes still release via
    /// `SandboxGuard`.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Single-submission algorithm: acquire a sandbox, upload source and
    /// config, compile and run, download and classify the result.
    pub async fn evaluate(&self, submission: Submission) -> Result<Verdict, codec::ConfigError> {
        codec::validate(&submission)?;
        let config_doc = codec::encode_config(&submission)?;
        let limits = submission.resource_limits();
        let total_deadline = Duration::from_secs_f64(
            limits.compile_timeout_s + limits.execution_timeout_s,
        ) + self.config.margin;

        let _permit = tokio::select! {
            permit = self.semaphore.acquire() => permit.expect("semaphore not closed"),
            _ = self.shutdown.cancelled() => {
                return Ok(Verdict::internal_error("orchestrator shutting down"));
            }
        };
        let ext = submission.language.source_extension();

        let run = async {
            let handle = self
                .sandboxes
                .acquire(submission.language, &limits)
                .await?;
            let guard = SandboxGuard::new(self.sandboxes.clone(), handle);

            self.sandboxes
                .upload(
                    guard.handle(),
                    &format!("user.{ext}"),
                    submission.source_code.as_bytes(),
                )
                .await?;
            let config_bytes = serde_json::to_vec(&config_doc)?;
            self.sandboxes
                .upload(guard.handle(), "config.json", &config_bytes)
                .await?;

            let command = vec![
                "harness".to_string(),
                "config.json".to_string(),
                "result.json".to_string(),
                "--compile-timeout-s".to_string(),
                limits.compile_timeout_s.to_string(),
                "--execution-timeout-s".to_string(),
                limits.execution_timeout_s.to_string(),
            ];
            let exec = self
                .sandboxes
                .exec(guard.handle(), &command, total_deadline)
                .await?;

            let result_doc = self
                .sandboxes
                .download(guard.handle(), "result.json")
                .await
                .ok()
                .and_then(|bytes| codec::parse_result(&bytes).ok());

            guard.release().await?;
            anyhow::Ok(classify(result_doc, &exec))
        };

        match run.await {
            Ok(verdict) => Ok(verdict),
            Err(e) => Ok(Verdict::internal_error(e.to_string())),
        }
    }

    /// Optimized-batch algorithm: acquire once, upload source once,
    /// compile+run the first case, then run-only for the rest unless the
    /// parameter schema changed.
    pub async fn evaluate_batch(&self, batch: BatchSubmission) -> Vec<Verdict> {
        let mut verdicts = Vec::with_capacity(batch.cases.len());
        if batch.cases.is_empty() {
            return verdicts;
        }

        let settings = batch
            .compiler_settings
            .clone()
            .unwrap_or_else(|| CompilerSettings::default_for(batch.language));
        let limits = harness_core::clamp_limits(batch.resource_limits);
        let total_deadline =
            Duration::from_secs_f64(limits.compile_timeout_s + limits.execution_timeout_s)
                + self.config.margin;

        let _permit = tokio::select! {
            permit = self.semaphore.acquire() => permit.expect("semaphore not closed"),
            _ = self.shutdown.cancelled() => {
                let verdict = Verdict::internal_error("orchestrator shutting down");
                return (0..batch.cases.len()).map(|_| verdict.clone()).collect();
            }
        };
        let ext = batch.language.source_extension();

        let outcome = async {
            let handle = self.sandboxes.acquire(batch.language, &limits).await?;
            let guard = SandboxGuard::new(self.sandboxes.clone(), handle);

            self.sandboxes
                .upload(
                    guard.handle(),
                    &format!("user.{ext}"),
                    batch.source_code.as_bytes(),
                )
                .await?;

            let mut verdicts = Vec::with_capacity(batch.cases.len());
            let mut shared_schema: Option<ParameterSchema> = None;

            for (i, case) in batch.cases.iter().enumerate() {
                let config_doc = codec::encode_batch_case(batch.language, &settings, case)?;
                let schema = ParameterSchema::from_parameters(&case.parameters, case.function_type);
                let config_bytes = serde_json::to_vec(&config_doc)?;
                self.sandboxes
                    .upload(guard.handle(), "config.json", &config_bytes)
                    .await?;

                let recompile_needed =
                    shared_schema.as_ref().map(|s| s.schema_hash()) != Some(schema.schema_hash());

                let mut command = vec![
                    "harness".to_string(),
                    "config.json".to_string(),
                    "result.json".to_string(),
                    "--compile-timeout-s".to_string(),
                    limits.compile_timeout_s.to_string(),
                    "--execution-timeout-s".to_string(),
                    limits.execution_timeout_s.to_string(),
                ];
                if i > 0 && !recompile_needed {
                    command.push("--reuse-executable".to_string());
                    command.push("test_runner".to_string());
                }

                let exec = self
                    .sandboxes
                    .exec(guard.handle(), &command, total_deadline)
                    .await?;

                if i == 0 && exec.exit_code == 1 {
                    // Shared compile failed: every verdict is the same
                    // COMPILE_ERROR verdict.
                    let result_doc = self
                        .sandboxes
                        .download(guard.handle(), "result.json")
                        .await
                        .ok()
                        .and_then(|bytes| codec::parse_result(&bytes).ok());
                    let verdict = classify(result_doc, &exec);
                    for _ in &batch.cases {
                        verdicts.push(verdict.clone());
                    }
                    return anyhow::Ok(verdicts);
                }

                let result_doc = self
                    .sandboxes
                    .download(guard.handle(), "result.json")
                    .await
                    .ok()
                    .and_then(|bytes| codec::parse_result(&bytes).ok());
                let mut verdict = classify(result_doc, &exec);
                if recompile_needed {
                    verdict.metrics.recompiled = i > 0;
                    shared_schema = Some(schema);
                }
                verdicts.push(verdict);
            }

            guard.release().await?;
            anyhow::Ok(verdicts)
        };

        match outcome.await {
            Ok(v) => v,
            Err(e) => {
                let verdict = Verdict::internal_error(e.to_string());
                (0..batch.cases.len()).map(|_| verdict.clone()).collect()
            }
        }
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::FakeSandboxManager;
    use crate::types::{BatchCase, Submission};
    use harness_core::{Status, TypeTag};
    use std::collections::HashMap as Map;

    fn registry() -> ContainerRegistry {
        let mut images = HashMap::new();
        images.insert(Language::C, "judge/c:latest".to_string());
        ContainerRegistry::new(images)
    }

    fn fake_result_bytes(status: Status, compile_time_ms: f64) -> Vec<u8> {
        let doc = harness_core::document::ResultDocument {
            status,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: status.exit_code(),
            compile_time_ms,
            time_ms: 1.0,
            cpu_utime: 0.0,
            cpu_stime: 0.0,
            maxrss_mb: 0.5,
            expected: None,
            actual: None,
            is_match: None,
            error: None,
        };
        serde_json::to_vec(&doc).unwrap()
    }

    fn sample_submission() -> Submission {
        Submission {
            language: Language::C,
            source_code: "int solve(int*a){*a=*a+1;return 0;}".to_string(),
            parameters: vec![Parameter {
                name: "a".to_string(),
                type_tag: TypeTag::Int,
                input_value: Literal::Int(1),
            }],
            expected: Map::new(),
            function_type: FunctionType::Typed(TypeTag::Int),
            compiler_settings: None,
            resource_limits: None,
        }
    }

    #[tokio::test]
    async fn evaluate_releases_sandbox_exactly_once() {
        let fake = Arc::new(FakeSandboxManager::new());
        fake.set_download("result.json", fake_result_bytes(Status::Success, 10.0));
        fake.push_response(ExecOutcome {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
            wall_ms: 2,
            killed_by_deadline: false,
        });

        let orchestrator = Orchestrator::new(
            fake.clone(),
            registry(),
            OrchestratorConfig::default(),
        );
        let verdict = orchestrator.evaluate(sample_submission()).await.unwrap();

        assert_eq!(verdict.status, Status::Success);
        assert_eq!(fake.acquire_count(), 1);
        assert_eq!(fake.release_count(), 1);
    }

    #[tokio::test]
    async fn evaluate_passes_resource_limits_to_the_harness_command() {
        let fake = Arc::new(FakeSandboxManager::new());
        fake.set_download("result.json", fake_result_bytes(Status::Success, 10.0));
        fake.push_response(ExecOutcome {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
            wall_ms: 2,
            killed_by_deadline: false,
        });

        let orchestrator = Orchestrator::new(fake.clone(), registry(), OrchestratorConfig::default());

        let mut submission = sample_submission();
        submission.resource_limits = Some(harness_core::ResourceLimits {
            compile_timeout_s: 7.0,
            execution_timeout_s: 3.5,
            memory_bytes: 128 * 1024 * 1024,
            cpu_cores: 1.0,
        });
        orchestrator.evaluate(submission).await.unwrap();

        let commands = fake.exec_commands();
        assert_eq!(commands.len(), 1);
        let command = &commands[0];
        assert!(command.contains(&"--compile-timeout-s".to_string()));
        assert_eq!(
            command[command.iter().position(|a| a == "--compile-timeout-s").unwrap() + 1],
            "7"
        );
        assert!(command.contains(&"--execution-timeout-s".to_string()));
        assert_eq!(
            command[command.iter().position(|a| a == "--execution-timeout-s").unwrap() + 1],
            "3.5"
        );
    }

    #[tokio::test]
    async fn evaluate_rejects_invalid_submission_before_touching_sandbox() {
        let fake = Arc::new(FakeSandboxManager::new());
        let orchestrator = Orchestrator::new(
            fake.clone(),
            registry(),
            OrchestratorConfig::default(),
        );

        let mut submission = sample_submission();
        submission.source_code = "x".repeat(50_001);

        let err = orchestrator.evaluate(submission).await.unwrap_err();
        assert!(matches!(err, codec::ConfigError::SourceTooLarge { .. }));
        assert_eq!(fake.acquire_count(), 0);
    }

    #[tokio::test]
    async fn batch_preserves_submission_order() {
        let fake = Arc::new(FakeSandboxManager::new());
        fake.set_download("result.json", fake_result_bytes(Status::Success, 10.0));
        for _ in 0..3 {
            fake.push_response(ExecOutcome {
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
                wall_ms: 1,
                killed_by_deadline: false,
            });
        }

        let orchestrator = Orchestrator::new(
            fake.clone(),
            registry(),
            OrchestratorConfig::default(),
        );

        let case = BatchCase {
            parameters: vec![Parameter {
                name: "a".to_string(),
                type_tag: TypeTag::Int,
                input_value: Literal::Int(1),
            }],
            expected: Map::new(),
            function_type: FunctionType::Typed(TypeTag::Int),
        };

        let batch = BatchSubmission {
            language: Language::C,
            source_code: "int solve(int*a){*a=*a+1;return 0;}".to_string(),
            compiler_settings: None,
            resource_limits: None,
            cases: vec![case.clone(), case.clone(), case],
        };

        let verdicts = orchestrator.evaluate_batch(batch).await;
        assert_eq!(verdicts.len(), 3);
        assert!(verdicts.iter().all(|v| v.status == Status::Success));
        assert_eq!(fake.acquire_count(), 1);
        assert_eq!(fake.release_count(), 1);
    }

    #[tokio::test]
    async fn batch_compile_failure_yields_identical_verdict_for_every_case() {
        let fake = Arc::new(FakeSandboxManager::new());
        fake.set_download("result.json", fake_result_bytes(Status::CompileError, 0.0));
        fake.push_response(ExecOutcome {
            exit_code: 1,
            stdout: Vec::new(),
            stderr: b"syntax error".to_vec(),
            wall_ms: 1,
            killed_by_deadline: false,
        });

        let orchestrator = Orchestrator::new(
            fake.clone(),
            registry(),
            OrchestratorConfig::default(),
        );

        let case = BatchCase {
            parameters: vec![Parameter {
                name: "a".to_string(),
                type_tag: TypeTag::Int,
                input_value: Literal::Int(1),
            }],
            expected: Map::new(),
            function_type: FunctionType::Typed(TypeTag::Int),
        };
        let batch = BatchSubmission {
            language: Language::C,
            source_code: "int solve(int a){ return a+ }".to_string(),
            compiler_settings: None,
            resource_limits: None,
            cases: vec![case.clone(), case],
        };

        let verdicts = orchestrator.evaluate_batch(batch).await;
        assert_eq!(verdicts.len(), 2);
        assert!(verdicts.iter().all(|v| v.status == Status::CompileError));
        assert_eq!(verdicts[0], verdicts[1]);
    }
}

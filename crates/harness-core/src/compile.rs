use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::time::timeout;

use crate::codegen::CodeGenerator;
use crate::document::{ConfigDocument, ResultDocument};
use crate::parse::extract_actual;
use crate::status::Status;
use crate::types::Literal;

/// Whether this invocation should compile a fresh `test_runner` or reuse
/// one already produced for an identical parameter schema (batch run-only
/// mode).
pub enum RunMode {
    CompileAndRun,
    RunOnly { executable: PathBuf },
}

/// Runs the full compile/link/execute sequence for one test configuration,
/// writing the result document to `out_path` and returning the process exit
/// code the harness binary should exit with.
pub async fn run_harness(
    generator: &dyn CodeGenerator,
    work_dir: &Path,
    config: &ConfigDocument,
    mode: RunMode,
    compile_timeout: Duration,
    execution_timeout: Duration,
    out_path: &Path,
) -> Result<i32> {
    if let Err(e) = config.validate() {
        let doc = result_for_internal_error(format!("invalid config: {e}"));
        doc.write_file(out_path).context("writing result document")?;
        return Ok(doc.status.exit_code());
    }

    let executable = match mode {
        RunMode::RunOnly { executable } if executable.exists() => executable,
        _ => {
            let ext = generator.source_extension();
            let user_source = work_dir.join(format!("user.{ext}"));
            let test_main_source = work_dir.join(format!("test_main.{ext}"));
            let executable = work_dir.join("test_runner");
            let compile_output_path = work_dir.join("compile_output.txt");

            let test_main = match generator.generate_test_main(config) {
                Ok(src) => src,
                Err(e) => {
                    let doc = result_for_internal_error(format!("code generation failed: {e}"));
                    doc.write_file(out_path).context("writing result document")?;
                    return Ok(doc.status.exit_code());
                }
            };
            fs::write(&test_main_source, test_main).context("writing test_main source")?;

            let command = generator.compile_command(
                config,
                &user_source.to_string_lossy(),
                &test_main_source.to_string_lossy(),
                &executable.to_string_lossy(),
            );

            let start = Instant::now();
            let compile_result = timeout(
                compile_timeout,
                execute_async(&command, work_dir, &compile_output_path),
            )
            .await;
            let compile_ms = start.elapsed().as_millis() as f64;
            let compile_stderr = fs::read_to_string(&compile_output_path).unwrap_or_default();

            let compile_status = match compile_result {
                Err(_elapsed) => {
                    let mut doc = result_for_status(Status::CompileTimeout);
                    doc.compile_time_ms = compile_ms;
                    doc.stderr = compile_stderr;
                    doc.write_file(out_path).context("writing result document")?;
                    return Ok(doc.status.exit_code());
                }
                Ok(Err(e)) => {
                    let doc = result_for_internal_error(format!("spawning compiler failed: {e}"));
                    doc.write_file(out_path).context("writing result document")?;
                    return Ok(doc.status.exit_code());
                }
                Ok(Ok(status)) => status,
            };

            if !compile_status.success() || !executable.exists() {
                let mut doc = result_for_status(Status::CompileError);
                doc.compile_time_ms = compile_ms;
                doc.stderr = compile_stderr.clone();
                doc.exit_code = compile_status.code().unwrap_or(-1);
                doc.error = Some(compile_stderr);
                doc.write_file(out_path).context("writing result document")?;
                return Ok(doc.status.exit_code());
            }

            executable
        }
    };

    let stdout_path = work_dir.join("run_stdout.txt");
    let stderr_path = work_dir.join("run_stderr.txt");

    let rusage_before = rusage_children();
    let start = Instant::now();
    let run_result = timeout(
        execution_timeout,
        execute_run_async(&executable, work_dir, &stdout_path, &stderr_path),
    )
    .await;
    let wall_ms = start.elapsed().as_millis() as f64;
    let rusage_after = rusage_children();

    let run_status = match run_result {
        Err(_elapsed) => {
            let mut doc = result_for_status(Status::Timeout);
            doc.time_ms = wall_ms;
            doc.cpu_utime = (rusage_after.0 - rusage_before.0).max(0.0);
            doc.cpu_stime = (rusage_after.1 - rusage_before.1).max(0.0);
            doc.maxrss_mb = rusage_after.2 as f64 / (1024.0 * 1024.0);
            doc.write_file(out_path).context("writing result document")?;
            return Ok(doc.status.exit_code());
        }
        Ok(Err(e)) => {
            let doc = result_for_internal_error(format!("spawning test_runner failed: {e}"));
            doc.write_file(out_path).context("writing result document")?;
            return Ok(doc.status.exit_code());
        }
        Ok(Ok(status)) => status,
    };

    let stdout = fs::read_to_string(&stdout_path).unwrap_or_default();
    let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();

    if !run_status.success() {
        let mut doc = result_for_status(Status::RuntimeError);
        doc.time_ms = wall_ms;
        doc.cpu_utime = (rusage_after.0 - rusage_before.0).max(0.0);
        doc.cpu_stime = (rusage_after.1 - rusage_before.1).max(0.0);
        doc.maxrss_mb = rusage_after.2 as f64 / (1024.0 * 1024.0);
        doc.exit_code = signal_aware_exit_code(&run_status);
        doc.stderr = stderr;
        doc.error = Some(format!(
            "test_runner exited with status {:?}",
            run_status.code()
        ));
        doc.write_file(out_path).context("writing result document")?;
        return Ok(doc.status.exit_code());
    }

    let actual = extract_actual(&stdout, &config.solve_params, config.function_type);
    let is_match = compute_match(&config.expected, &actual);

    let status = if config.expected.is_empty() || is_match.unwrap_or(true) {
        Status::Success
    } else {
        Status::WrongAnswer
    };

    let mut doc = result_for_status(status);
    doc.time_ms = wall_ms;
    doc.cpu_utime = (rusage_after.0 - rusage_before.0).max(0.0);
    doc.cpu_stime = (rusage_after.1 - rusage_before.1).max(0.0);
    doc.maxrss_mb = rusage_after.2 as f64 / (1024.0 * 1024.0);
    doc.stdout = stdout;
    doc.stderr = stderr;
    doc.exit_code = 0;
    doc.expected = if config.expected.is_empty() {
        None
    } else {
        Some(config.expected.clone())
    };
    doc.actual = Some(actual);
    doc.is_match = if config.expected.is_empty() {
        None
    } else {
        is_match
    };
    doc.write_file(out_path).context("writing result document")?;
    Ok(doc.status.exit_code())
}

fn compute_match(
    expected: &std::collections::HashMap<String, Literal>,
    actual: &std::collections::HashMap<String, Literal>,
) -> Option<bool> {
    if expected.is_empty() {
        return None;
    }
    Some(
        expected
            .iter()
            .all(|(key, value)| actual.get(key) == Some(value)),
    )
}

fn result_for_status(status: Status) -> ResultDocument {
    ResultDocument {
        status,
        stdout: String::new(),
        stderr: String::new(),
        exit_code: status.exit_code(),
        compile_time_ms: 0.0,
        time_ms: 0.0,
        cpu_utime: 0.0,
        cpu_stime: 0.0,
        maxrss_mb: 0.0,
        expected: None,
        actual: None,
        is_match: None,
        error: None,
    }
}

fn result_for_internal_error(detail: String) -> ResultDocument {
    let mut doc = result_for_status(Status::InternalError);
    doc.error = Some(detail);
    doc
}

#[cfg(unix)]
fn signal_aware_exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
        128 + signal
    } else {
        status.code().unwrap_or(-1)
    }
}

#[cfg(not(unix))]
fn signal_aware_exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Spawns `command` with stdout and stderr redirected to `output_path`.
async fn execute_async(
    command: &[String],
    cwd: &Path,
    output_path: &Path,
) -> Result<std::process::ExitStatus> {
    anyhow::ensure!(!command.is_empty(), "empty command");

    let output_file = fs::File::create(output_path)?;
    let mut cmd = tokio::process::Command::new(&command[0]);
    cmd.args(&command[1..])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(output_file.try_clone()?))
        .stderr(Stdio::from(output_file));

    let mut child = cmd.spawn()?;
    let status = child.wait().await?;
    Ok(status)
}

/// Spawns the compiled `test_runner` with stdout/stderr captured to
/// separate files, so a successful run's output can be scanned without the
/// compiler's own diagnostics mixed in.
async fn execute_run_async(
    executable: &Path,
    cwd: &Path,
    stdout_path: &Path,
    stderr_path: &Path,
) -> Result<std::process::ExitStatus> {
    let stdout_file = fs::File::create(stdout_path)?;
    let stderr_file = fs::File::create(stderr_path)?;

    let mut cmd = tokio::process::Command::new(executable);
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file));

    let mut child = cmd.spawn()?;
    let status = child.wait().await?;
    Ok(status)
}

/// Cumulative (user_cpu_s, sys_cpu_s, maxrss_bytes) across every reaped
/// child of this process, per `getrusage(RUSAGE_CHILDREN)`. `ru_maxrss` is
/// a high-water mark in kilobytes on Linux, not a per-call delta, so callers
/// diff the cpu fields but read maxrss as an absolute reading taken after
/// the child of interest has been waited on.
#[cfg(unix)]
fn rusage_children() -> (f64, f64, u64) {
    unsafe {
        let mut usage: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_CHILDREN, &mut usage) != 0 {
            return (0.0, 0.0, 0);
        }
        let utime = usage.ru_utime.tv_sec as f64 + usage.ru_utime.tv_usec as f64 / 1_000_000.0;
        let stime = usage.ru_stime.tv_sec as f64 + usage.ru_stime.tv_usec as f64 / 1_000_000.0;
        let maxrss_bytes = usage.ru_maxrss as u64 * 1024;
        (utime, stime, maxrss_bytes)
    }
}

#[cfg(not(unix))]
fn rusage_children() -> (f64, f64, u64) {
    (0.0, 0.0, 0)
}

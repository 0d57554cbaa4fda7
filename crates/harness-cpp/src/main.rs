use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use harness_core::codegen::CppLangGenerator;
use harness_core::compile::{RunMode, run_harness};
use harness_core::document::ConfigDocument;

/// In-container test driver for C++ submissions: compiles the user source
/// against a generated `test_main.cpp`, runs it, and writes `result.json`.
#[derive(Parser)]
#[command(name = "harness", version, about, long_about = None)]
struct Args {
    /// Path to the per-test config document
    config_path: PathBuf,

    /// Path to write the result document to
    out_path: PathBuf,

    /// Compile-phase deadline in seconds
    #[arg(long = "compile-timeout-s", default_value_t = 30.0)]
    compile_timeout_s: f64,

    /// Run-phase deadline in seconds
    #[arg(long = "execution-timeout-s", default_value_t = 10.0)]
    execution_timeout_s: f64,

    /// Reuse an already-compiled executable instead of recompiling
    #[arg(long = "reuse-executable")]
    reuse_executable: Option<PathBuf>,
}

fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let exit_code = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(drive(&args)),
        Err(e) => {
            log::error!("failed to start harness runtime: {e}");
            3
        }
    };

    std::process::exit(exit_code);
}

async fn drive(args: &Args) -> i32 {
    let config = match ConfigDocument::read_file(&args.config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("invalid config document: {e}");
            return 3;
        }
    };

    let work_dir = match args.config_path.parent() {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    };

    let mode = match &args.reuse_executable {
        Some(path) => RunMode::RunOnly {
            executable: path.clone(),
        },
        None => RunMode::CompileAndRun,
    };

    let generator = CppLangGenerator;
    match run_harness(
        &generator,
        &work_dir,
        &config,
        mode,
        Duration::from_secs_f64(args.compile_timeout_s),
        Duration::from_secs_f64(args.execution_timeout_s),
        &args.out_path,
    )
    .await
    {
        Ok(code) => code,
        Err(e) => {
            log::error!("harness failed before a result document could be written: {e}");
            3
        }
    }
}

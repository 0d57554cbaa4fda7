use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::Literal;

/// The canonical, closed outcome taxonomy. Every submission produces
/// exactly one of these.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    WrongAnswer,
    CompileError,
    CompileTimeout,
    RuntimeError,
    Timeout,
    InternalError,
}

impl Status {
    /// Harness process exit code for this status: 0 = success/wrong answer,
    /// 1 = compile path failure, 2 = run path failure, >=3 = internal error.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Success | Status::WrongAnswer => 0,
            Status::CompileError | Status::CompileTimeout => 1,
            Status::RuntimeError | Status::Timeout => 2,
            Status::InternalError => 3,
        }
    }

    /// Normalizes harness-reported synonyms to the canonical taxonomy.
    pub fn normalize(raw: &str) -> Option<Status> {
        match raw {
            "SUCCESS" => Some(Status::Success),
            "WRONG_ANSWER" => Some(Status::WrongAnswer),
            "COMPILE_ERROR" => Some(Status::CompileError),
            "COMPILE_TIMEOUT" => Some(Status::CompileTimeout),
            "RUNTIME_ERROR" => Some(Status::RuntimeError),
            "TIMEOUT" | "TIMEOUT_ERROR" => Some(Status::Timeout),
            "INTERNAL_ERROR" | "ERROR" => Some(Status::InternalError),
            _ => None,
        }
    }
}

/// Timing and resource metrics captured across compile and run phases.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub wall_ms: u64,
    pub compile_ms: u64,
    pub user_cpu_s: f64,
    pub sys_cpu_s: f64,
    pub max_rss_bytes: u64,
    /// Set by the optimized-batch orchestrator when an item's schema
    /// differed from the shared compile and forced a dedicated recompile.
    pub recompiled: bool,
}

/// The canonical outcome record returned for every submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: Status,
    #[serde(rename = "match")]
    pub is_match: Option<bool>,
    pub expected: Option<HashMap<String, Literal>>,
    pub actual: Option<HashMap<String, Literal>>,
    pub stdout: String,
    pub stderr: String,
    pub compile_output: String,
    pub exit_code: i32,
    pub metrics: Metrics,
    pub error_detail: Option<String>,
}

impl Verdict {
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Verdict {
            status: Status::InternalError,
            is_match: None,
            expected: None,
            actual: None,
            stdout: String::new(),
            stderr: String::new(),
            compile_output: String::new(),
            exit_code: Status::InternalError.exit_code(),
            metrics: Metrics::default(),
            error_detail: Some(detail.into()),
        }
    }
}

//! Verdict classifier: maps a parsed `ResultDocument` plus the sandbox's
//! own exec outcome to the canonical `Verdict`, via four first-match-wins
//! rules.

use harness_core::document::ResultDocument;
use harness_core::{Metrics, Status, Verdict};

use crate::sandbox::ExecOutcome;

/// Classifies one evaluation. `result_doc` is `None` when the result
/// document couldn't be downloaded or parsed at all (rule 2).
pub fn classify(result_doc: Option<ResultDocument>, exec: &ExecOutcome) -> Verdict {
    // Rule 1: the sandbox's own outer deadline fired. Whether the harness
    // had reached its run phase is inferred from compile_time_ms > 0 with
    // no compile-failure status recorded yet.
    if exec.killed_by_deadline {
        let reached_run_phase = result_doc
            .as_ref()
            .map(|doc| doc.compile_time_ms > 0.0 && doc.status != Status::CompileError)
            .unwrap_or(false);
        let status = if reached_run_phase {
            Status::Timeout
        } else {
            Status::CompileTimeout
        };
        return Verdict {
            status,
            is_match: None,
            expected: result_doc.as_ref().and_then(|d| d.expected.clone()),
            actual: result_doc.as_ref().and_then(|d| d.actual.clone()),
            stdout: result_doc.as_ref().map(|d| d.stdout.clone()).unwrap_or_default(),
            stderr: result_doc.as_ref().map(|d| d.stderr.clone()).unwrap_or_default(),
            compile_output: String::new(),
            exit_code: status.exit_code(),
            metrics: Metrics::default(),
            error_detail: Some("killed by sandbox outer deadline".to_string()),
        };
    }

    // Rule 2: harness exit >= 3, or no usable result document at all.
    if exec.exit_code >= 3 || result_doc.is_none() {
        return Verdict::internal_error(format!(
            "harness exited with code {} or produced no usable result document",
            exec.exit_code
        ));
    }

    let doc = result_doc.expect("checked above");

    // Rule 3: adopt the harness status verbatim, normalizing synonyms.
    // `doc.status` is already the typed, canonical enum (the harness never
    // writes a raw synonym string), so normalization only matters for a
    // hypothetical out-of-band producer; re-running it through
    // `Status::normalize` on the serialized form keeps that contract
    // explicit rather than assumed.
    let raw = serde_json::to_value(doc.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let status = Status::normalize(&raw).unwrap_or(doc.status);

    // Rule 4: match is true only for SUCCESS.
    let is_match = match status {
        Status::Success => Some(true),
        Status::WrongAnswer => Some(false),
        _ => None,
    };

    Verdict {
        status,
        is_match,
        expected: doc.expected,
        actual: doc.actual,
        stdout: doc.stdout,
        stderr: doc.stderr,
        compile_output: String::new(),
        exit_code: doc.exit_code,
        metrics: Metrics {
            wall_ms: doc.time_ms as u64,
            compile_ms: doc.compile_time_ms as u64,
            user_cpu_s: doc.cpu_utime,
            sys_cpu_s: doc.cpu_stime,
            max_rss_bytes: (doc.maxrss_mb * 1024.0 * 1024.0) as u64,
            recompiled: false,
        },
        error_detail: doc.error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_doc(status: Status) -> ResultDocument {
        ResultDocument {
            status,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: status.exit_code(),
            compile_time_ms: 50.0,
            time_ms: 4.0,
            cpu_utime: 0.001,
            cpu_stime: 0.0,
            maxrss_mb: 1.0,
            expected: None,
            actual: None,
            is_match: None,
            error: None,
        }
    }

    fn clean_exec(exit_code: i32) -> ExecOutcome {
        ExecOutcome {
            exit_code,
            stdout: Vec::new(),
            stderr: Vec::new(),
            wall_ms: 4,
            killed_by_deadline: false,
        }
    }

    #[test]
    fn success_yields_match_true() {
        let verdict = classify(Some(base_doc(Status::Success)), &clean_exec(0));
        assert_eq!(verdict.status, Status::Success);
        assert_eq!(verdict.is_match, Some(true));
    }

    #[test]
    fn wrong_answer_yields_match_false() {
        let verdict = classify(Some(base_doc(Status::WrongAnswer)), &clean_exec(0));
        assert_eq!(verdict.status, Status::WrongAnswer);
        assert_eq!(verdict.is_match, Some(false));
    }

    #[test]
    fn compile_error_has_no_match() {
        let verdict = classify(Some(base_doc(Status::CompileError)), &clean_exec(1));
        assert_eq!(verdict.status, Status::CompileError);
        assert_eq!(verdict.is_match, None);
    }

    #[test]
    fn missing_result_document_is_internal_error() {
        let verdict = classify(None, &clean_exec(0));
        assert_eq!(verdict.status, Status::InternalError);
    }

    #[test]
    fn internal_exit_code_overrides_reported_status() {
        let mut doc = base_doc(Status::Success);
        doc.exit_code = 4;
        let verdict = classify(Some(doc), &clean_exec(4));
        assert_eq!(verdict.status, Status::InternalError);
    }

    #[test]
    fn deadline_kill_after_run_phase_is_timeout() {
        let mut exec = clean_exec(0);
        exec.killed_by_deadline = true;
        let doc = base_doc(Status::Success);
        let verdict = classify(Some(doc), &exec);
        assert_eq!(verdict.status, Status::Timeout);
    }

    #[test]
    fn deadline_kill_before_compile_finished_is_compile_timeout() {
        let mut exec = clean_exec(0);
        exec.killed_by_deadline = true;
        let mut doc = base_doc(Status::CompileError);
        doc.compile_time_ms = 0.0;
        let verdict = classify(Some(doc), &exec);
        assert_eq!(verdict.status, Status::CompileTimeout);
    }

    #[test]
    fn empty_expected_map_still_carries_through() {
        let mut doc = base_doc(Status::Success);
        doc.expected = Some(HashMap::new());
        let verdict = classify(Some(doc), &clean_exec(0));
        assert_eq!(verdict.expected, Some(HashMap::new()));
    }
}

//! Parameter & Result Codec: turns a `Submission`/`BatchCase` into the
//! on-disk `ConfigDocument` the harness reads, and parses its `ResultDocument`
//! back out. Validation that must happen before any sandbox is touched
//! (duplicate names, oversize source, malformed literals) lives here too.

use harness_core::document::{ConfigDocument, ResultDocument, StandardField};
pub use harness_core::error::ConfigError;
use harness_core::{FunctionType, Language, Literal, Parameter, validate_source};
use std::collections::HashMap;

use crate::types::{BatchCase, Submission};

/// Builds the per-test config document for a single submission.
pub fn encode_config(submission: &Submission) -> Result<ConfigDocument, ConfigError> {
    encode(
        submission.language,
        &submission.parameters,
        submission.expected.clone(),
        submission.function_type,
        &submission.compiler_settings(),
    )
}

/// Builds the config document for one case of a batch, sharing the batch's
/// language and compiler settings.
pub fn encode_batch_case(
    language: Language,
    compiler_flags: &harness_core::CompilerSettings,
    case: &BatchCase,
) -> Result<ConfigDocument, ConfigError> {
    encode(
        language,
        &case.parameters,
        case.expected.clone(),
        case.function_type,
        compiler_flags,
    )
}

fn encode(
    language: Language,
    parameters: &[Parameter],
    expected: HashMap<String, Literal>,
    function_type: FunctionType,
    settings: &harness_core::CompilerSettings,
) -> Result<ConfigDocument, ConfigError> {
    let mut doc = ConfigDocument {
        solve_params: parameters.to_vec(),
        expected,
        function_type,
        standard: StandardField::new(language, settings.standard.clone()),
        compiler_flags: format!("{} {}", settings.flags, settings.optimization)
            .trim()
            .to_string(),
    };
    // `web::Json<Submission>` deserializes each literal context-free, so a
    // 1-char string or whole-number double may have landed in the wrong
    // `Literal` variant before we ever see it here.
    doc.normalize_literals();
    doc.validate()?;
    Ok(doc)
}

/// Checks the whole-submission invariants that `ConfigDocument::validate`
/// can't see on its own: source size and parameter name uniqueness across
/// the declared schema.
pub fn validate(submission: &Submission) -> Result<(), ConfigError> {
    validate_source(&submission.source_code)?;
    let doc = encode_config(submission)?;
    doc.validate()
}

/// Parses a harness `result.json` into the document the classifier
/// finalizes into a `Verdict`.
pub fn parse_result(bytes: &[u8]) -> Result<ResultDocument, ConfigError> {
    ResultDocument::parse(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_core::{CompilerSettings, TypeTag};

    fn sample_submission() -> Submission {
        Submission {
            language: Language::C,
            source_code: "int solve(int*a){*a=*a+1;return 0;}".to_string(),
            parameters: vec![Parameter {
                name: "a".to_string(),
                type_tag: TypeTag::Int,
                input_value: Literal::Int(1),
            }],
            expected: HashMap::from([("a".to_string(), Literal::Int(2))]),
            function_type: FunctionType::Typed(TypeTag::Int),
            compiler_settings: None,
            resource_limits: None,
        }
    }

    #[test]
    fn encode_round_trips_through_json() {
        let submission = sample_submission();
        let doc = encode_config(&submission).unwrap();
        let text = serde_json::to_string(&doc).unwrap();
        let parsed: ConfigDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(doc, parsed);
    }

    #[test]
    fn encode_uses_language_default_settings_when_unset() {
        let submission = sample_submission();
        let doc = encode_config(&submission).unwrap();
        assert_eq!(doc.standard.standard(), CompilerSettings::default_for(Language::C).standard);
    }

    #[test]
    fn validate_rejects_duplicate_parameter_names() {
        let mut submission = sample_submission();
        submission.parameters.push(Parameter {
            name: "a".to_string(),
            type_tag: TypeTag::Int,
            input_value: Literal::Int(0),
        });
        assert!(matches!(
            validate(&submission),
            Err(ConfigError::DuplicateParameter(name)) if name == "a"
        ));
    }

    #[test]
    fn validate_rejects_oversize_source() {
        let mut submission = sample_submission();
        submission.source_code = "x".repeat(50_001);
        assert!(matches!(
            validate(&submission),
            Err(ConfigError::SourceTooLarge { .. })
        ));
    }

    #[test]
    fn validate_rejects_literal_type_mismatch() {
        let mut submission = sample_submission();
        submission.parameters[0].input_value = Literal::Str("oops".to_string());
        assert!(matches!(
            validate(&submission),
            Err(ConfigError::MalformedLiteral { .. })
        ));
    }

    #[test]
    fn encode_accepts_a_one_character_string_parameter() {
        let mut submission = sample_submission();
        submission.parameters[0] = Parameter {
            name: "s".to_string(),
            type_tag: TypeTag::String,
            // Deserialized by serde as `Literal::Char('x')`, since a
            // 1-character JSON string is ambiguous without the type tag.
            input_value: Literal::Char('x'),
        };
        submission.expected = HashMap::from([("s".to_string(), Literal::Char('x'))]);
        submission.function_type = FunctionType::Void;

        let doc = encode_config(&submission).unwrap();
        assert_eq!(doc.solve_params[0].input_value, Literal::Str("x".to_string()));
        assert_eq!(doc.expected["s"], Literal::Str("x".to_string()));
    }

    #[test]
    fn encode_accepts_a_whole_number_double_parameter() {
        let mut submission = sample_submission();
        submission.parameters[0] = Parameter {
            name: "d".to_string(),
            type_tag: TypeTag::Double,
            // Deserialized by serde as `Literal::Int(4)`, since a
            // whole-number JSON value is ambiguous without the type tag.
            input_value: Literal::Int(4),
        };
        submission.expected = HashMap::from([("d".to_string(), Literal::Int(4))]);
        submission.function_type = FunctionType::Void;

        let doc = encode_config(&submission).unwrap();
        assert_eq!(doc.solve_params[0].input_value, Literal::Float(4.0));
        assert_eq!(doc.expected["d"], Literal::Float(4.0));
    }

    #[test]
    fn validate_rejects_a_genuine_expected_type_mismatch() {
        let mut submission = sample_submission();
        submission.expected = HashMap::from([("a".to_string(), Literal::Str("nope".to_string()))]);
        assert!(matches!(
            validate(&submission),
            Err(ConfigError::MalformedLiteral { param, .. }) if param == "a"
        ));
    }

    #[test]
    fn parse_result_rejects_malformed_bytes() {
        assert!(matches!(
            parse_result(b"not json"),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn parse_result_round_trips_a_result_document() {
        let doc = ResultDocument {
            status: harness_core::Status::Success,
            stdout: "a: 2\nreturn_value: 0\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
            compile_time_ms: 120.0,
            time_ms: 4.0,
            cpu_utime: 0.001,
            cpu_stime: 0.0,
            maxrss_mb: 1.2,
            expected: Some(HashMap::from([("a".to_string(), Literal::Int(2))])),
            actual: Some(HashMap::from([("a".to_string(), Literal::Int(2))])),
            is_match: Some(true),
            error: None,
        };
        let bytes = serde_json::to_vec(&doc).unwrap();
        assert_eq!(parse_result(&bytes).unwrap(), doc);
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::status::Status;
use crate::types::{FunctionType, Language, Literal, Parameter, ResourceLimits};

/// Either `c_standard` or `cpp_standard`, matching the wire format's
/// language-specific key name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum StandardField {
    C { c_standard: String },
    Cpp { cpp_standard: String },
}

impl StandardField {
    pub fn new(language: Language, standard: impl Into<String>) -> Self {
        match language {
            Language::C => StandardField::C {
                c_standard: standard.into(),
            },
            Language::Cpp => StandardField::Cpp {
                cpp_standard: standard.into(),
            },
        }
    }

    pub fn standard(&self) -> &str {
        match self {
            StandardField::C { c_standard } => c_standard,
            StandardField::Cpp { cpp_standard } => cpp_standard,
        }
    }

    pub fn language(&self) -> Language {
        match self {
            StandardField::C { .. } => Language::C,
            StandardField::Cpp { .. } => Language::Cpp,
        }
    }
}

/// The on-disk `config` document read by the harness for one test.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub solve_params: Vec<Parameter>,
    pub expected: HashMap<String, Literal>,
    pub function_type: FunctionType,
    #[serde(flatten)]
    pub standard: StandardField,
    pub compiler_flags: String,
}

impl ConfigDocument {
    /// Maps each declared name to its type tag: every `solve_params` entry,
    /// plus `"return_value"` when `function_type` is non-`void`. Keys in
    /// `expected` that aren't in this map have no declared type to coerce
    /// or validate against.
    fn declared_types(&self) -> HashMap<String, crate::types::TypeTag> {
        let mut types: HashMap<String, crate::types::TypeTag> = self
            .solve_params
            .iter()
            .map(|p| (p.name.clone(), p.type_tag))
            .collect();
        if let FunctionType::Typed(tag) = self.function_type {
            types.insert("return_value".to_string(), tag);
        }
        types
    }

    /// Reinterprets every literal whose JSON shape is ambiguous without its
    /// declared type (a 1-character string parsed as `Char` when the type
    /// is `String`, a whole number parsed as `Int` when the type is
    /// `Float`/`Double`, ...) using each parameter's own type tag. Must run
    /// after every deserialization of this document, since `Literal`'s
    /// `Deserialize` impl has no access to the sibling `type` field and the
    /// ambiguity reappears every time the document round-trips through
    /// JSON.
    pub fn normalize_literals(&mut self) {
        for param in &mut self.solve_params {
            param.input_value = std::mem::replace(&mut param.input_value, Literal::Bool(false))
                .coerce_to(param.type_tag);
        }
        let types = self.declared_types();
        for (name, value) in &mut self.expected {
            if let Some(tag) = types.get(name.as_str()) {
                *value = std::mem::replace(value, Literal::Bool(false)).coerce_to(*tag);
            }
        }
    }

    /// Enforces name uniqueness and literal/type-tag conformance, for both
    /// `solve_params` and `expected`. Source size and resource-limit
    /// ceilings are checked by the caller, which holds the full
    /// `Submission` rather than just one test's config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for param in &self.solve_params {
            if !seen.insert(param.name.as_str()) {
                return Err(ConfigError::DuplicateParameter(param.name.clone()));
            }
            if !param.input_value.conforms_to(param.type_tag) {
                return Err(ConfigError::MalformedLiteral {
                    param: param.name.clone(),
                    reason: format!(
                        "initial value does not match declared type {:?}",
                        param.type_tag
                    ),
                });
            }
        }
        let types = self.declared_types();
        for (name, value) in &self.expected {
            if let Some(tag) = types.get(name.as_str()) {
                if !value.conforms_to(*tag) {
                    return Err(ConfigError::MalformedLiteral {
                        param: name.clone(),
                        reason: format!("expected value does not match declared type {tag:?}"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
    }

    pub fn read_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let bytes =
            std::fs::read(path).map_err(|e| ConfigError::Malformed(format!("read error: {e}")))?;
        let mut doc: ConfigDocument = serde_json::from_slice(&bytes)
            .map_err(|e| ConfigError::Malformed(format!("invalid config document: {e}")))?;
        doc.normalize_literals();
        Ok(doc)
    }
}

/// The on-disk result document written by the harness.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResultDocument {
    pub status: Status,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub compile_time_ms: f64,
    pub time_ms: f64,
    pub cpu_utime: f64,
    pub cpu_stime: f64,
    pub maxrss_mb: f64,
    pub expected: Option<HashMap<String, Literal>>,
    pub actual: Option<HashMap<String, Literal>>,
    #[serde(rename = "match")]
    pub is_match: Option<bool>,
    pub error: Option<String>,
}

impl ResultDocument {
    pub fn write_file(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ConfigError::Malformed(format!("invalid result document: {e}")))
    }
}

/// Validates the source/parameter bounds that apply to a whole submission
/// rather than a single test's config document: source size and duplicate
/// parameter names across the declared schema.
pub fn validate_source(source_code: &str) -> Result<(), ConfigError> {
    const MAX_SOURCE_BYTES: usize = 50_000;
    let len = source_code.len();
    if len > MAX_SOURCE_BYTES {
        return Err(ConfigError::SourceTooLarge {
            len,
            max: MAX_SOURCE_BYTES,
        });
    }
    Ok(())
}

pub fn clamp_limits(limits: Option<ResourceLimits>) -> ResourceLimits {
    limits.unwrap_or_default().clamp_to_ceilings()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Parameter, TypeTag};

    fn doc_with(tag: TypeTag, input_value: Literal, expected: Literal) -> ConfigDocument {
        ConfigDocument {
            solve_params: vec![Parameter {
                name: "p".to_string(),
                type_tag: tag,
                input_value,
            }],
            expected: HashMap::from([("p".to_string(), expected)]),
            function_type: FunctionType::Void,
            standard: StandardField::new(Language::C, "c99"),
            compiler_flags: String::new(),
        }
    }

    #[test]
    fn normalize_literals_recovers_a_one_character_string_after_a_json_round_trip() {
        let doc = doc_with(
            TypeTag::String,
            Literal::Str("x".to_string()),
            Literal::Str("x".to_string()),
        );
        let text = serde_json::to_string(&doc).unwrap();
        // Generic deserialization misreads the 1-char JSON string back as a
        // `Char`; `read_file` normalizes it using the document's own type tag.
        let mut reparsed: ConfigDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed.solve_params[0].input_value, Literal::Char('x'));
        reparsed.normalize_literals();
        assert_eq!(reparsed.solve_params[0].input_value, Literal::Str("x".to_string()));
        assert_eq!(reparsed.expected["p"], Literal::Str("x".to_string()));
    }

    #[test]
    fn validate_accepts_a_whole_number_double_expected_value() {
        let doc = doc_with(TypeTag::Double, Literal::Float(4.0), Literal::Float(4.0));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn validate_rejects_a_genuine_expected_mismatch() {
        let doc = doc_with(TypeTag::Int, Literal::Int(1), Literal::Str("oops".to_string()));
        assert!(matches!(
            doc.validate(),
            Err(ConfigError::MalformedLiteral { .. })
        ));
    }
}

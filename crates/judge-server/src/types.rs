use std::collections::HashMap;

use harness_core::{CompilerSettings, FunctionType, Language, Literal, Parameter, ResourceLimits};
use serde::{Deserialize, Serialize};

/// A judging request: language, source, parameter schema, expectations, and
/// optional overrides for compiler/resource defaults. Immutable once built
/// by the facade; read-only for the orchestrator and harness.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Submission {
    pub language: Language,
    pub source_code: String,
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub expected: HashMap<String, Literal>,
    pub function_type: FunctionType,
    pub compiler_settings: Option<CompilerSettings>,
    pub resource_limits: Option<ResourceLimits>,
}

impl Submission {
    pub fn compiler_settings(&self) -> CompilerSettings {
        self.compiler_settings
            .clone()
            .unwrap_or_else(|| CompilerSettings::default_for(self.language))
    }

    pub fn resource_limits(&self) -> ResourceLimits {
        harness_core::clamp_limits(self.resource_limits)
    }
}

/// One item of an optimized batch request: the configurations share a
/// single `language`/`source_code`, so only what varies per test travels
/// in the list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatchCase {
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub expected: HashMap<String, Literal>,
    pub function_type: FunctionType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatchSubmission {
    pub language: Language,
    pub source_code: String,
    pub compiler_settings: Option<CompilerSettings>,
    pub resource_limits: Option<ResourceLimits>,
    pub cases: Vec<BatchCase>,
}

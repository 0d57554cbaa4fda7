pub mod codegen;
pub mod compile;
pub mod document;
pub mod error;
pub mod parse;
pub mod status;
pub mod types;

pub use codegen::{CLangGenerator, CodeGenerator, CppLangGenerator};
pub use compile::{RunMode, run_harness};
pub use document::{ConfigDocument, ResultDocument, StandardField, clamp_limits, validate_source};
pub use error::ConfigError;
pub use status::{Metrics, Status, Verdict};
pub use types::{
    CompilerSettings, FunctionType, Language, Literal, Parameter, ParameterSchema, ResourceLimits,
    TypeTag,
};

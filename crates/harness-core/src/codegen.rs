mod c;
mod cpp;

pub use c::CLangGenerator;
pub use cpp::CppLangGenerator;

use anyhow::Result;

use crate::document::ConfigDocument;

/// Synthesizes a `test_main` source around the config's parameter schema,
/// and knows how to invoke its language's compiler. One impl per language,
/// switching on `TypeTag` the way a tagged-variant switch, never runtime
/// reflection, generates declarations (DESIGN NOTES: "dynamic type
/// dispatch... is a tagged-variant switch in code generation").
pub trait CodeGenerator: Send + Sync {
    /// File extension for generated/user source (`c` or `cpp`).
    fn source_extension(&self) -> &'static str;

    /// Generates the `test_main` source that declares each parameter,
    /// declares `solve(...)` with the signature implied by the schema,
    /// calls it, and prints one `name: value` line per parameter plus
    /// `return_value: value` unless the function type is `void`.
    fn generate_test_main(&self, config: &ConfigDocument) -> Result<String>;

    /// Builds the shell command that compiles `user.<ext> test_main.<ext>`
    /// into the executable at `output_path`, using the config's standard,
    /// flags and optimization.
    fn compile_command(
        &self,
        config: &ConfigDocument,
        user_source: &str,
        test_main_source: &str,
        output_path: &str,
    ) -> Vec<String>;
}

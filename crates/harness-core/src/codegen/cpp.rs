use std::fmt::Write as _;

use anyhow::{Result, bail};

use super::CodeGenerator;
use crate::document::ConfigDocument;
use crate::types::{FunctionType, Literal, Parameter, TypeTag};

/// Generates a `test_main.cpp` that declares each parameter (arrays as
/// `std::vector`, strings as `std::string`), calls `solve` with reference
/// parameters for mutation, and prints one tagged line per final value.
pub struct CppLangGenerator;

impl CppLangGenerator {
    fn cpp_type(tag: TypeTag) -> &'static str {
        match tag {
            TypeTag::Int => "int",
            TypeTag::Bool => "bool",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::Char => "char",
            TypeTag::String => "std::string",
            TypeTag::ArrayInt | TypeTag::VectorInt => "std::vector<int>",
            TypeTag::ArrayFloat | TypeTag::VectorFloat => "std::vector<float>",
            TypeTag::VectorDouble => "std::vector<double>",
            TypeTag::ArrayChar => "std::vector<char>",
            TypeTag::VectorString => "std::vector<std::string>",
        }
    }

    fn declare(out: &mut String, param: &Parameter) -> Result<()> {
        let ty = Self::cpp_type(param.type_tag);
        match (&param.input_value, param.type_tag) {
            (Literal::Int(v), TypeTag::Int) => writeln!(out, "    {ty} {} = {v};", param.name)?,
            (Literal::Bool(v), TypeTag::Bool) => writeln!(out, "    {ty} {} = {v};", param.name)?,
            (Literal::Float(v), TypeTag::Float) => {
                writeln!(out, "    {ty} {} = {:.10}f;", param.name, v)?
            }
            (Literal::Float(v), TypeTag::Double) => {
                writeln!(out, "    {ty} {} = {:.17};", param.name, v)?
            }
            (Literal::Char(v), TypeTag::Char) => {
                writeln!(out, "    {ty} {} = '{}';", param.name, escape_char(*v))?
            }
            (Literal::Str(v), TypeTag::String) => {
                writeln!(out, "    {ty} {} = \"{}\";", param.name, escape_str(v))?
            }
            (Literal::ArrayInt(items), TypeTag::ArrayInt | TypeTag::VectorInt) => {
                let body = items
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "    {ty} {} = {{{body}}};", param.name)?
            }
            (Literal::ArrayFloat(items), TypeTag::ArrayFloat | TypeTag::VectorFloat) => {
                let body = items
                    .iter()
                    .map(|v| format!("{v:.10}f"))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "    {ty} {} = {{{body}}};", param.name)?
            }
            (Literal::ArrayFloat(items), TypeTag::VectorDouble) => {
                let body = items
                    .iter()
                    .map(|v| format!("{v:.17}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "    {ty} {} = {{{body}}};", param.name)?
            }
            (Literal::ArrayChar(items), TypeTag::ArrayChar) => {
                let body = items
                    .iter()
                    .map(|c| format!("'{}'", escape_char(*c)))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "    {ty} {} = {{{body}}};", param.name)?
            }
            (Literal::ArrayString(items), TypeTag::VectorString) => {
                let body = items
                    .iter()
                    .map(|s| format!("\"{}\"", escape_str(s)))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "    {ty} {} = {{{body}}};", param.name)?
            }
            _ => bail!(
                "parameter {} has a literal that does not match its type tag",
                param.name
            ),
        }
        Ok(())
    }

    fn print_statement(out: &mut String, param: &Parameter) -> Result<()> {
        match param.type_tag {
            TypeTag::Bool => writeln!(
                out,
                "    std::cout << \"{}: \" << ({} ? \"true\" : \"false\") << \"\\n\";",
                param.name, param.name
            )?,
            TypeTag::Int | TypeTag::Float | TypeTag::Double | TypeTag::Char => writeln!(
                out,
                "    std::cout << \"{}: \" << {} << \"\\n\";",
                param.name, param.name
            )?,
            TypeTag::String => writeln!(
                out,
                "    std::cout << \"{}: \" << {} << \"\\n\";",
                param.name, param.name
            )?,
            TypeTag::ArrayInt
            | TypeTag::VectorInt
            | TypeTag::ArrayFloat
            | TypeTag::VectorFloat
            | TypeTag::VectorDouble
            | TypeTag::ArrayChar => print_sequence(out, param, false)?,
            TypeTag::VectorString => print_sequence(out, param, true)?,
        }
        Ok(())
    }
}

fn print_sequence(out: &mut String, param: &Parameter, quote_elements: bool) -> Result<()> {
    writeln!(out, "    std::cout << \"{}: [\";", param.name)?;
    writeln!(
        out,
        "    for (size_t _i = 0; _i < {}.size(); _i++) {{",
        param.name
    )?;
    if quote_elements {
        writeln!(
            out,
            "        std::cout << '\"' << {}[_i] << '\"';",
            param.name
        )?;
    } else {
        writeln!(out, "        std::cout << {}[_i];", param.name)?;
    }
    writeln!(
        out,
        "        if (_i + 1 < {}.size()) std::cout << \", \";",
        param.name
    )?;
    writeln!(out, "    }}")?;
    writeln!(out, "    std::cout << \"]\\n\";")?;
    Ok(())
}

impl CodeGenerator for CppLangGenerator {
    fn source_extension(&self) -> &'static str {
        "cpp"
    }

    fn generate_test_main(&self, config: &ConfigDocument) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "#include <iostream>")?;
        writeln!(out, "#include <string>")?;
        writeln!(out, "#include <vector>")?;
        writeln!(out)?;

        let params = &config.solve_params;
        let ret_ty = match config.function_type {
            FunctionType::Void => "void",
            FunctionType::Typed(tag) => Self::cpp_type(tag),
        };
        let signature = params
            .iter()
            .map(|p| format!("{} &{}", Self::cpp_type(p.type_tag), p.name))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "{ret_ty} solve({signature});")?;
        writeln!(out)?;
        writeln!(out, "int main() {{")?;

        for param in params {
            Self::declare(&mut out, param)?;
        }

        let call_args = params
            .iter()
            .map(|p| p.name.clone())
            .collect::<Vec<_>>()
            .join(", ");

        match config.function_type {
            FunctionType::Void => writeln!(out, "    solve({call_args});")?,
            FunctionType::Typed(_) => {
                writeln!(out, "    {ret_ty} return_value = solve({call_args});")?
            }
        }

        for param in params {
            Self::print_statement(&mut out, param)?;
        }

        if let FunctionType::Typed(tag) = config.function_type {
            match tag {
                TypeTag::Bool => writeln!(
                    out,
                    "    std::cout << \"return_value: \" << (return_value ? \"true\" : \"false\") << \"\\n\";"
                )?,
                TypeTag::Int | TypeTag::Float | TypeTag::Double | TypeTag::Char | TypeTag::String => {
                    writeln!(out, "    std::cout << \"return_value: \" << return_value << \"\\n\";")?
                }
                _ => bail!("function_type must be a scalar type, not {tag:?}"),
            }
        }

        writeln!(out, "    return 0;")?;
        writeln!(out, "}}")?;
        Ok(out)
    }

    fn compile_command(
        &self,
        config: &ConfigDocument,
        user_source: &str,
        test_main_source: &str,
        output_path: &str,
    ) -> Vec<String> {
        let mut args = vec![
            "c++".to_string(),
            format!("-std={}", config.standard.standard()),
        ];
        for flag in config.compiler_flags.split_whitespace() {
            args.push(flag.to_string());
        }
        args.push(user_source.to_string());
        args.push(test_main_source.to_string());
        args.push("-o".to_string());
        args.push(output_path.to_string());
        args
    }
}

fn escape_char(c: char) -> String {
    match c {
        '\'' => "\\'".to_string(),
        '\\' => "\\\\".to_string(),
        '\n' => "\\n".to_string(),
        _ => c.to_string(),
    }
}

fn escape_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

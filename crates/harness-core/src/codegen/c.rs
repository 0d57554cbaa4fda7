use std::fmt::Write as _;

use anyhow::{Result, bail};

use super::CodeGenerator;
use crate::document::ConfigDocument;
use crate::types::{FunctionType, Literal, Parameter, TypeTag};

/// Generates a `test_main.c` that declares each parameter, calls `solve`
/// by pointer for every parameter (arrays/strings already decay to a
/// pointer; scalars are passed via `&var`), and prints one tagged line per
/// final value.
pub struct CLangGenerator;

impl CLangGenerator {
    fn c_type(tag: TypeTag) -> &'static str {
        match tag {
            TypeTag::Int | TypeTag::Bool => "int",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::Char => "char",
            TypeTag::String => "char",
            TypeTag::ArrayInt | TypeTag::VectorInt => "int",
            TypeTag::ArrayFloat | TypeTag::VectorFloat => "float",
            TypeTag::VectorDouble => "double",
            TypeTag::ArrayChar => "char",
            TypeTag::VectorString => "char",
        }
    }

    fn declare(out: &mut String, param: &Parameter) -> Result<()> {
        let ty = Self::c_type(param.type_tag);
        match (&param.input_value, param.type_tag) {
            (Literal::Int(v), TypeTag::Int) => writeln!(out, "    {ty} {} = {v};", param.name)?,
            (Literal::Bool(v), TypeTag::Bool) => {
                writeln!(out, "    {ty} {} = {};", param.name, if *v { 1 } else { 0 })?
            }
            (Literal::Float(v), TypeTag::Float) => {
                writeln!(out, "    {ty} {} = {:.10}f;", param.name, v)?
            }
            (Literal::Float(v), TypeTag::Double) => {
                writeln!(out, "    {ty} {} = {:.17};", param.name, v)?
            }
            (Literal::Char(v), TypeTag::Char) => {
                writeln!(out, "    {ty} {} = '{}';", param.name, escape_char(*v))?
            }
            (Literal::Str(v), TypeTag::String) => writeln!(
                out,
                "    {ty} {}[{}] = \"{}\";",
                param.name,
                v.len() + 1,
                escape_str(v)
            )?,
            (Literal::ArrayInt(items), TypeTag::ArrayInt | TypeTag::VectorInt) => {
                let body = items
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    out,
                    "    {ty} {}[{}] = {{{}}};",
                    param.name,
                    items.len().max(1),
                    body
                )?
            }
            (Literal::ArrayFloat(items), TypeTag::ArrayFloat | TypeTag::VectorFloat) => {
                let body = items
                    .iter()
                    .map(|v| format!("{v:.10}f"))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    out,
                    "    {ty} {}[{}] = {{{}}};",
                    param.name,
                    items.len().max(1),
                    body
                )?
            }
            (Literal::ArrayFloat(items), TypeTag::VectorDouble) => {
                let body = items
                    .iter()
                    .map(|v| format!("{v:.17}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    out,
                    "    {ty} {}[{}] = {{{}}};",
                    param.name,
                    items.len().max(1),
                    body
                )?
            }
            (Literal::ArrayChar(items), TypeTag::ArrayChar) => {
                let body = items
                    .iter()
                    .map(|c| format!("'{}'", escape_char(*c)))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    out,
                    "    {ty} {}[{}] = {{{}}};",
                    param.name,
                    items.len().max(1),
                    body
                )?
            }
            (Literal::ArrayString(items), TypeTag::VectorString) => {
                // C has no vector<string>; modeled as a fixed array of char*.
                let body = items
                    .iter()
                    .map(|s| format!("\"{}\"", escape_str(s)))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    out,
                    "    const char *{}[{}] = {{{}}};",
                    param.name,
                    items.len().max(1),
                    body
                )?
            }
            _ => bail!(
                "parameter {} has a literal that does not match its type tag",
                param.name
            ),
        }
        Ok(())
    }

    fn solve_param(param: &Parameter) -> String {
        if param.type_tag == TypeTag::VectorString {
            return format!("const char **{}", param.name);
        }
        format!("{} *{}", Self::c_type(param.type_tag), param.name)
    }

    fn call_arg(param: &Parameter) -> String {
        if param.type_tag.is_sequence() || param.type_tag == TypeTag::String {
            param.name.clone()
        } else {
            format!("&{}", param.name)
        }
    }

    fn print_statement(out: &mut String, param: &Parameter) -> Result<()> {
        match param.type_tag {
            TypeTag::Int | TypeTag::Bool => {
                writeln!(out, "    printf(\"{}: %d\\n\", {});", param.name, param.name)?
            }
            TypeTag::Float => writeln!(
                out,
                "    printf(\"{}: %.10f\\n\", {});",
                param.name, param.name
            )?,
            TypeTag::Double => writeln!(
                out,
                "    printf(\"{}: %.17f\\n\", {});",
                param.name, param.name
            )?,
            TypeTag::Char => writeln!(
                out,
                "    printf(\"{}: %c\\n\", {});",
                param.name, param.name
            )?,
            TypeTag::String => writeln!(
                out,
                "    printf(\"{}: %s\\n\", {});",
                param.name, param.name
            )?,
            TypeTag::ArrayInt | TypeTag::VectorInt => print_int_array(out, param)?,
            TypeTag::ArrayFloat | TypeTag::VectorFloat => print_float_array(out, param, "%.10f")?,
            TypeTag::VectorDouble => print_float_array(out, param, "%.17f")?,
            TypeTag::ArrayChar => print_char_array(out, param)?,
            TypeTag::VectorString => print_string_array(out, param)?,
        }
        Ok(())
    }

    fn array_len(param: &Parameter) -> usize {
        match &param.input_value {
            Literal::ArrayInt(v) => v.len(),
            Literal::ArrayFloat(v) => v.len(),
            Literal::ArrayChar(v) => v.len(),
            Literal::ArrayString(v) => v.len(),
            _ => 0,
        }
    }
}

impl CodeGenerator for CLangGenerator {
    fn source_extension(&self) -> &'static str {
        "c"
    }

    fn generate_test_main(&self, config: &ConfigDocument) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "#include <stdio.h>")?;
        writeln!(out, "#include <string.h>")?;
        writeln!(out)?;

        let params = &config.solve_params;
        let ret_ty = match config.function_type {
            FunctionType::Void => "void",
            FunctionType::Typed(tag) => Self::c_type(tag),
        };
        let signature = params
            .iter()
            .map(Self::solve_param)
            .collect::<Vec<_>>()
            .join(", ");
        let signature = if signature.is_empty() {
            "void".to_string()
        } else {
            signature
        };
        writeln!(out, "{ret_ty} solve({signature});")?;
        writeln!(out)?;
        writeln!(out, "int main(void) {{")?;

        for param in params {
            Self::declare(&mut out, param)?;
        }

        let call_args = params
            .iter()
            .map(Self::call_arg)
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
                TypeTag::Int | TypeTag::Bool => {
                    writeln!(out, "    printf(\"return_value: %d\\n\", return_value);")?
                }
                TypeTag::Float => writeln!(
                    out,
                    "    printf(\"return_value: %.10f\\n\", return_value);"
                )?,
                TypeTag::Double => writeln!(
                    out,
                    "    printf(\"return_value: %.17f\\n\", return_value);"
                )?,
                TypeTag::Char => {
                    writeln!(out, "    printf(\"return_value: %c\\n\", return_value);")?
                }
                TypeTag::String => {
                    writeln!(out, "    printf(\"return_value: %s\\n\", return_value);")?
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
        let mut args = vec!["cc".to_string(), format!("-std={}", config.standard.standard())];
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

fn print_int_array(out: &mut String, param: &Parameter) -> Result<()> {
    let len = CLangGenerator::array_len(param);
    writeln!(out, "    printf(\"{}: [\");", param.name)?;
    writeln!(out, "    for (int _i = 0; _i < {len}; _i++) {{")?;
    writeln!(
        out,
        "        printf(\"%d%s\", {}[_i], _i + 1 < {len} ? \", \" : \"\");",
        param.name
    )?;
    writeln!(out, "    }}")?;
    writeln!(out, "    printf(\"]\\n\");")?;
    Ok(())
}

fn print_float_array(out: &mut String, param: &Parameter, fmt: &str) -> Result<()> {
    let len = CLangGenerator::array_len(param);
    writeln!(out, "    printf(\"{}: [\");", param.name)?;
    writeln!(out, "    for (int _i = 0; _i < {len}; _i++) {{")?;
    writeln!(
        out,
        "        printf(\"{fmt}%s\", {}[_i], _i + 1 < {len} ? \", \" : \"\");",
        param.name
    )?;
    writeln!(out, "    }}")?;
    writeln!(out, "    printf(\"]\\n\");")?;
    Ok(())
}

fn print_char_array(out: &mut String, param: &Parameter) -> Result<()> {
    let len = CLangGenerator::array_len(param);
    writeln!(out, "    printf(\"{}: [\");", param.name)?;
    writeln!(out, "    for (int _i = 0; _i < {len}; _i++) {{")?;
    writeln!(
        out,
        "        printf(\"'%c'%s\", {}[_i], _i + 1 < {len} ? \", \" : \"\");",
        param.name
    )?;
    writeln!(out, "    }}")?;
    writeln!(out, "    printf(\"]\\n\");")?;
    Ok(())
}

fn print_string_array(out: &mut String, param: &Parameter) -> Result<()> {
    let len = CLangGenerator::array_len(param);
    writeln!(out, "    printf(\"{}: [\");", param.name)?;
    writeln!(out, "    for (int _i = 0; _i < {len}; _i++) {{")?;
    writeln!(
        out,
        "        printf(\"\\\"%s\\\"%s\", {}[_i], _i + 1 < {len} ? \", \" : \"\");",
        param.name
    )?;
    writeln!(out, "    }}")?;
    writeln!(out, "    printf(\"]\\n\");")?;
    Ok(())
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

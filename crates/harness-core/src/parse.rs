use std::collections::HashMap;

use crate::types::{FunctionType, Literal, Parameter, TypeTag};

/// Scans harness stdout for `<name>: <literal>` lines and reconstructs the
/// `actual` map. Only the lines tagged with a declared parameter name (or
/// `return_value`) are consulted; anything else the user's code printed to
/// stdout is ignored. This is a convenience for the caller to inspect — the
/// structured result document is what the classifier actually trusts.
pub fn extract_actual(
    stdout: &str,
    params: &[Parameter],
    function_type: FunctionType,
) -> HashMap<String, Literal> {
    let mut wanted: HashMap<&str, TypeTag> =
        params.iter().map(|p| (p.name.as_str(), p.type_tag)).collect();
    if let FunctionType::Typed(tag) = function_type {
        wanted.insert("return_value", tag);
    }

    let mut actual = HashMap::new();
    for line in stdout.lines() {
        let Some((name, value)) = line.split_once(": ") else {
            continue;
        };
        let Some(&tag) = wanted.get(name) else {
            continue;
        };
        if let Some(literal) = parse_literal(value.trim(), tag) {
            actual.insert(name.to_string(), literal);
        }
    }
    actual
}

fn parse_literal(text: &str, tag: TypeTag) -> Option<Literal> {
    match tag {
        TypeTag::Int => text.parse::<i64>().ok().map(Literal::Int),
        TypeTag::Bool => match text {
            "true" | "1" => Some(Literal::Bool(true)),
            "false" | "0" => Some(Literal::Bool(false)),
            _ => None,
        },
        TypeTag::Float | TypeTag::Double => text.parse::<f64>().ok().map(Literal::Float),
        TypeTag::Char => text.chars().next().map(Literal::Char),
        TypeTag::String => Some(Literal::Str(text.to_string())),
        TypeTag::ArrayInt | TypeTag::VectorInt => {
            parse_sequence(text).map(|items| {
                Literal::ArrayInt(items.iter().filter_map(|s| s.parse::<i64>().ok()).collect())
            })
        }
        TypeTag::ArrayFloat | TypeTag::VectorFloat | TypeTag::VectorDouble => {
            parse_sequence(text).map(|items| {
                Literal::ArrayFloat(items.iter().filter_map(|s| s.parse::<f64>().ok()).collect())
            })
        }
        TypeTag::ArrayChar => parse_sequence(text).map(|items| {
            Literal::ArrayChar(
                items
                    .iter()
                    .filter_map(|s| s.trim_matches('\'').chars().next())
                    .collect(),
            )
        }),
        TypeTag::VectorString => parse_sequence(text).map(|items| {
            Literal::ArrayString(
                items
                    .iter()
                    .map(|s| s.trim_matches('"').to_string())
                    .collect(),
            )
        }),
    }
}

fn parse_sequence(text: &str) -> Option<Vec<String>> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    Some(inner.split(", ").map(|s| s.trim().to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceLimits;

    fn param(name: &str, tag: TypeTag, value: Literal) -> Parameter {
        Parameter {
            name: name.to_string(),
            type_tag: tag,
            input_value: value,
        }
    }

    #[test]
    fn extracts_scalars_and_return_value() {
        let params = vec![
            param("a", TypeTag::Int, Literal::Int(3)),
            param("b", TypeTag::Int, Literal::Int(4)),
        ];
        let stdout = "a: 6\nb: 9\nreturn_value: 0\n";
        let actual = extract_actual(stdout, &params, FunctionType::Typed(TypeTag::Int));
        assert_eq!(actual.get("a"), Some(&Literal::Int(6)));
        assert_eq!(actual.get("b"), Some(&Literal::Int(9)));
        assert_eq!(actual.get("return_value"), Some(&Literal::Int(0)));
    }

    #[test]
    fn void_function_omits_return_value() {
        let params = vec![param("a", TypeTag::Int, Literal::Int(1))];
        let stdout = "a: 2\n";
        let actual = extract_actual(stdout, &params, FunctionType::Void);
        assert!(!actual.contains_key("return_value"));
    }

    #[test]
    fn ignores_unrelated_user_output() {
        let params = vec![param("a", TypeTag::Int, Literal::Int(1))];
        let stdout = "debug: something\na: 5\nnoise here\n";
        let actual = extract_actual(stdout, &params, FunctionType::Void);
        assert_eq!(actual.len(), 1);
        assert_eq!(actual.get("a"), Some(&Literal::Int(5)));
    }

    #[test]
    fn extracts_array_preserving_order() {
        let params = vec![param(
            "arr",
            TypeTag::ArrayInt,
            Literal::ArrayInt(vec![1, 2, 3]),
        )];
        let stdout = "arr: [3, 1, 2]\n";
        let actual = extract_actual(stdout, &params, FunctionType::Void);
        assert_eq!(actual.get("arr"), Some(&Literal::ArrayInt(vec![3, 1, 2])));
    }

    #[test]
    fn resource_limits_default_matches_spec() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.compile_timeout_s, 30.0);
        assert_eq!(limits.execution_timeout_s, 10.0);
        assert_eq!(limits.memory_bytes, 128 * 1024 * 1024);
        assert_eq!(limits.cpu_cores, 1.0);
    }

    #[test]
    fn resource_limits_clamp_to_hard_ceilings() {
        let limits = ResourceLimits {
            compile_timeout_s: 10_000.0,
            execution_timeout_s: 10_000.0,
            memory_bytes: u64::MAX,
            cpu_cores: 999.0,
        }
        .clamp_to_ceilings();
        assert_eq!(limits.compile_timeout_s, 300.0);
        assert_eq!(limits.execution_timeout_s, 60.0);
        assert_eq!(limits.memory_bytes, 1024 * 1024 * 1024);
        assert_eq!(limits.cpu_cores, 4.0);
    }
}

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// The two compiled-language families this judge understands.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    C,
    #[serde(rename = "c++")]
    Cpp,
}

impl Language {
    pub fn source_extension(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }
}

/// Closed set of parameter/return types, per the wire format's type tags.
///
/// `vector<int>`/`vector<float>`/`vector<double>`/`vector<string>` need
/// literal renames since `<`/`>` don't survive a plain `rename_all`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Int,
    Float,
    Double,
    Char,
    String,
    ArrayInt,
    ArrayFloat,
    ArrayChar,
    #[serde(rename = "vector<int>")]
    VectorInt,
    #[serde(rename = "vector<float>")]
    VectorFloat,
    #[serde(rename = "vector<double>")]
    VectorDouble,
    #[serde(rename = "vector<string>")]
    VectorString,
    Bool,
}

impl TypeTag {
    /// True for every tag whose driver declaration is a container rather
    /// than a scalar.
    pub fn is_sequence(self) -> bool {
        matches!(
            self,
            TypeTag::ArrayInt
                | TypeTag::ArrayFloat
                | TypeTag::ArrayChar
                | TypeTag::VectorInt
                | TypeTag::VectorFloat
                | TypeTag::VectorDouble
                | TypeTag::VectorString
        )
    }
}

/// The declared return type of the user entry point: a scalar `TypeTag` or
/// `void`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionType {
    Void,
    Typed(TypeTag),
}

impl Serialize for FunctionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FunctionType::Void => serializer.serialize_str("void"),
            FunctionType::Typed(tag) => tag.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FunctionType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "void" {
            return Ok(FunctionType::Void);
        }
        // Reuse TypeTag's own (de)serialization by round-tripping through JSON,
        // so the closed set stays defined in exactly one place.
        let quoted = serde_json::Value::String(raw.clone());
        serde_json::from_value::<TypeTag>(quoted)
            .map(FunctionType::Typed)
            .map_err(|_| serde::de::Error::custom(format!("unknown function_type: {raw}")))
    }
}

/// A typed literal value. Integers are always 64-bit signed, floats always
/// IEEE-754 double, per the codec's "no ambiguity" contract.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Bool(bool),
    ArrayInt(Vec<i64>),
    ArrayFloat(Vec<f64>),
    ArrayChar(Vec<char>),
    ArrayString(Vec<String>),
}

impl Literal {
    /// Whether this literal's shape conforms to the declared type tag.
    pub fn conforms_to(&self, tag: TypeTag) -> bool {
        matches!(
            (self, tag),
            (Literal::Int(_), TypeTag::Int)
                | (Literal::Float(_), TypeTag::Float)
                | (Literal::Float(_), TypeTag::Double)
                | (Literal::Char(_), TypeTag::Char)
                | (Literal::Str(_), TypeTag::String)
                | (Literal::Bool(_), TypeTag::Bool)
                | (Literal::ArrayInt(_), TypeTag::ArrayInt)
                | (Literal::ArrayInt(_), TypeTag::VectorInt)
                | (Literal::ArrayFloat(_), TypeTag::ArrayFloat)
                | (Literal::ArrayFloat(_), TypeTag::VectorFloat)
                | (Literal::ArrayFloat(_), TypeTag::VectorDouble)
                | (Literal::ArrayChar(_), TypeTag::ArrayChar)
                | (Literal::ArrayString(_), TypeTag::VectorString)
        )
    }

    /// Reinterprets a literal that parsed into the wrong variant because its
    /// JSON shape is ambiguous without the declared type: a one-character
    /// `Str` is a valid `Char`, a whole-number `Int` is a valid `Float`, and
    /// the array equivalents of both. Leaves anything already conforming, or
    /// any genuine mismatch, untouched.
    pub fn coerce_to(self, tag: TypeTag) -> Literal {
        match (self, tag) {
            (Literal::Char(c), TypeTag::String) => Literal::Str(c.to_string()),
            (Literal::Str(s), TypeTag::Char) if s.chars().count() == 1 => {
                Literal::Char(s.chars().next().unwrap())
            }
            (Literal::Int(i), TypeTag::Float | TypeTag::Double) => Literal::Float(i as f64),
            (Literal::ArrayChar(cs), TypeTag::VectorString) => {
                Literal::ArrayString(cs.iter().map(|c| c.to_string()).collect())
            }
            (Literal::ArrayString(ss), TypeTag::ArrayChar)
                if ss.iter().all(|s| s.chars().count() == 1) =>
            {
                Literal::ArrayChar(ss.iter().map(|s| s.chars().next().unwrap()).collect())
            }
            (Literal::ArrayInt(is), TypeTag::ArrayFloat | TypeTag::VectorFloat | TypeTag::VectorDouble) => {
                Literal::ArrayFloat(is.iter().map(|i| *i as f64).collect())
            }
            (other, _) => other,
        }
    }
}

impl Serialize for Literal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Literal::Int(v) => serializer.serialize_i64(*v),
            Literal::Float(v) => serializer.serialize_f64(*v),
            Literal::Char(v) => serializer.serialize_str(&v.to_string()),
            Literal::Str(v) => serializer.serialize_str(v),
            Literal::Bool(v) => serializer.serialize_bool(*v),
            Literal::ArrayInt(v) => v.serialize(serializer),
            Literal::ArrayFloat(v) => v.serialize(serializer),
            Literal::ArrayChar(v) => {
                let strs: Vec<String> = v.iter().map(|c| c.to_string()).collect();
                strs.serialize(serializer)
            }
            Literal::ArrayString(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Literal {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        literal_from_json(&value).map_err(serde::de::Error::custom)
    }
}

fn literal_from_json(value: &serde_json::Value) -> Result<Literal, String> {
    match value {
        serde_json::Value::Null => Err("null is forbidden in the wire format".to_string()),
        serde_json::Value::Bool(b) => Ok(Literal::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Literal::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Literal::Float(f))
            } else {
                Err(format!("unrepresentable number: {n}"))
            }
        }
        serde_json::Value::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Literal::Char(c)),
                _ => Ok(Literal::Str(s.clone())),
            }
        }
        serde_json::Value::Array(items) => {
            if items.is_empty() {
                return Ok(Literal::ArrayInt(Vec::new()));
            }
            if items.iter().all(|v| v.is_i64() || v.is_u64()) {
                let ints = items.iter().map(|v| v.as_i64().unwrap()).collect();
                return Ok(Literal::ArrayInt(ints));
            }
            if items.iter().all(|v| v.is_number()) {
                let floats = items.iter().map(|v| v.as_f64().unwrap()).collect();
                return Ok(Literal::ArrayFloat(floats));
            }
            if items.iter().all(|v| v.is_string()) {
                let strings: Vec<String> = items
                    .iter()
                    .map(|v| v.as_str().unwrap().to_string())
                    .collect();
                if strings.iter().all(|s| s.chars().count() == 1) {
                    let chars = strings.iter().map(|s| s.chars().next().unwrap()).collect();
                    return Ok(Literal::ArrayChar(chars));
                }
                return Ok(Literal::ArrayString(strings));
            }
            Err("array elements must be uniformly numeric or string".to_string())
        }
        serde_json::Value::Object(_) => Err("objects are not a valid literal shape".to_string()),
    }
}

/// Ordered triple: name, type tag, initial value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub input_value: Literal,
}

/// Compile-time standard/flags/optimization for a language.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompilerSettings {
    pub standard: String,
    pub flags: String,
    pub optimization: String,
}

impl CompilerSettings {
    pub fn default_for(language: Language) -> Self {
        match language {
            Language::C => CompilerSettings {
                standard: "c99".to_string(),
                flags: "-Wall -Wextra".to_string(),
                optimization: String::new(),
            },
            Language::Cpp => CompilerSettings {
                standard: "c++17".to_string(),
                flags: "-Wall -Wextra".to_string(),
                optimization: "-O2".to_string(),
            },
        }
    }
}

/// Resource bounds for one compile/run cycle: hard ceilings on compile and
/// execution wall time, peak memory, and CPU share.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    pub compile_timeout_s: f64,
    pub execution_timeout_s: f64,
    pub memory_bytes: u64,
    pub cpu_cores: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits {
            compile_timeout_s: 30.0,
            execution_timeout_s: 10.0,
            memory_bytes: 128 * 1024 * 1024,
            cpu_cores: 1.0,
        }
    }
}

impl ResourceLimits {
    pub const MAX_COMPILE_TIMEOUT_S: f64 = 300.0;
    pub const MAX_EXECUTION_TIMEOUT_S: f64 = 60.0;
    pub const MAX_MEMORY_BYTES: u64 = 1024 * 1024 * 1024;
    pub const MAX_CPU_CORES: f64 = 4.0;

    /// Clamps every field to its hard ceiling.
    pub fn clamp_to_ceilings(mut self) -> Self {
        self.compile_timeout_s = self.compile_timeout_s.min(Self::MAX_COMPILE_TIMEOUT_S);
        self.execution_timeout_s = self.execution_timeout_s.min(Self::MAX_EXECUTION_TIMEOUT_S);
        self.memory_bytes = self.memory_bytes.min(Self::MAX_MEMORY_BYTES);
        self.cpu_cores = self.cpu_cores.min(Self::MAX_CPU_CORES);
        self
    }
}

/// The ordered ⟨name, type⟩ list plus the function-type tag: the signature
/// seen by the generated driver, and the compile-sharing key for batches.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    pub names_and_types: Vec<(String, TypeTag)>,
    pub function_type: FunctionType,
}

impl ParameterSchema {
    pub fn from_parameters(parameters: &[Parameter], function_type: FunctionType) -> Self {
        ParameterSchema {
            names_and_types: parameters
                .iter()
                .map(|p| (p.name.clone(), p.type_tag))
                .collect(),
            function_type,
        }
    }

    /// Hashes the ordered name/type pairs plus the function type. Two
    /// schemas share a compiled `test_runner` iff their hashes (and thus
    /// their name/type/function_type triples) are identical.
    pub fn schema_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (name, tag) in &self.names_and_types {
            name.hash(&mut hasher);
            tag.hash(&mut hasher);
        }
        self.function_type.hash(&mut hasher);
        hasher.finish()
    }
}

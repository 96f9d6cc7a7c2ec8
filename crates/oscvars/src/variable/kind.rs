//! Type dispatch over the six variable kinds.
//!
//! Every kind has one [`KindSpec`] entry carrying its wire encoding, decoding and
//! clamping. Callers look the entry up once through [`VariableKind::spec`] instead
//! of probing the value type at each call site; a new kind is one new entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::net::{ArgType, OscArg};

use super::value::{Bounds, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Float,
    Int,
    String,
    FloatVector,
    IntVector,
    StringVector,
}

impl VariableKind {
    pub const ALL: [VariableKind; 6] = [
        VariableKind::Float,
        VariableKind::Int,
        VariableKind::String,
        VariableKind::FloatVector,
        VariableKind::IntVector,
        VariableKind::StringVector,
    ];

    pub fn spec(self) -> &'static KindSpec {
        &KINDS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn default_value(self) -> Value {
        (self.spec().default_value)()
    }

    pub fn default_bounds(self) -> Bounds {
        self.spec().default_bounds
    }

    /// Whether `bounds` belongs to the numeric family of this kind.
    pub fn accepts_bounds(self, bounds: &Bounds) -> bool {
        matches!(
            (self.spec().element, bounds),
            (ArgType::Float, Bounds::Float { .. })
                | (ArgType::Int, Bounds::Int { .. })
                | (ArgType::Str, Bounds::Unbounded)
        )
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variable type '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for VariableKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KINDS
            .iter()
            .find(|spec| spec.name == s)
            .map(|spec| spec.kind)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

pub struct KindSpec {
    pub kind: VariableKind,
    pub name: &'static str,
    pub label: &'static str,
    pub element: ArgType,
    pub default_value: fn() -> Value,
    pub default_bounds: Bounds,
    pub encode: fn(&Value) -> Vec<OscArg>,
    /// `None` when no argument of the element type is present.
    pub decode: fn(&[OscArg]) -> Option<Value>,
    pub clamp: fn(Value, &Bounds) -> Value,
}

impl fmt::Debug for KindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindSpec")
            .field("kind", &self.kind)
            .field("element", &self.element)
            .finish()
    }
}

// Indexed by `VariableKind as usize`.
static KINDS: [KindSpec; 6] = [
    KindSpec {
        kind: VariableKind::Float,
        name: "float",
        label: "Float",
        element: ArgType::Float,
        default_value: || Value::Float(0.0),
        default_bounds: Bounds::FULL_FLOAT,
        encode: encode_scalar::<f32>,
        decode: decode_scalar::<f32>,
        clamp: clamp_scalar::<f32>,
    },
    KindSpec {
        kind: VariableKind::Int,
        name: "int",
        label: "Int",
        element: ArgType::Int,
        default_value: || Value::Int(0),
        default_bounds: Bounds::FULL_INT,
        encode: encode_scalar::<i32>,
        decode: decode_scalar::<i32>,
        clamp: clamp_scalar::<i32>,
    },
    KindSpec {
        kind: VariableKind::String,
        name: "string",
        label: "String",
        element: ArgType::Str,
        default_value: || Value::String(String::new()),
        default_bounds: Bounds::Unbounded,
        encode: encode_scalar::<String>,
        decode: decode_scalar::<String>,
        clamp: clamp_scalar::<String>,
    },
    KindSpec {
        kind: VariableKind::FloatVector,
        name: "float_vector",
        label: "Vec.Float",
        element: ArgType::Float,
        default_value: || Value::FloatVector(vec![0.0]),
        default_bounds: Bounds::FULL_FLOAT,
        encode: encode_vector::<f32>,
        decode: decode_vector::<f32>,
        clamp: clamp_vector::<f32>,
    },
    KindSpec {
        kind: VariableKind::IntVector,
        name: "int_vector",
        label: "Vec.Int",
        element: ArgType::Int,
        default_value: || Value::IntVector(vec![0]),
        default_bounds: Bounds::FULL_INT,
        encode: encode_vector::<i32>,
        decode: decode_vector::<i32>,
        clamp: clamp_vector::<i32>,
    },
    KindSpec {
        kind: VariableKind::StringVector,
        name: "string_vector",
        label: "Vec.String",
        element: ArgType::Str,
        default_value: || Value::StringVector(Vec::new()),
        default_bounds: Bounds::Unbounded,
        encode: encode_vector::<String>,
        decode: decode_vector::<String>,
        clamp: clamp_vector::<String>,
    },
];

trait Element: Sized + Clone {
    fn to_arg(&self) -> OscArg;
    fn from_arg(arg: &OscArg) -> Option<Self>;
    fn clamp_to(self, bounds: &Bounds) -> Self;
    fn scalar(value: &Value) -> Option<&Self>;
    fn vector(value: &Value) -> Option<&[Self]>;
    fn wrap(self) -> Value;
    fn wrap_vector(values: Vec<Self>) -> Value;
}

impl Element for f32 {
    fn to_arg(&self) -> OscArg {
        OscArg::Float(*self)
    }

    fn from_arg(arg: &OscArg) -> Option<Self> {
        match arg {
            OscArg::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn clamp_to(self, bounds: &Bounds) -> Self {
        match *bounds {
            Bounds::Float { min, max } if min <= max => self.clamp(min, max),
            _ => self,
        }
    }

    fn scalar(value: &Value) -> Option<&Self> {
        match value {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    fn vector(value: &Value) -> Option<&[Self]> {
        match value {
            Value::FloatVector(v) => Some(v),
            _ => None,
        }
    }

    fn wrap(self) -> Value {
        Value::Float(self)
    }

    fn wrap_vector(values: Vec<Self>) -> Value {
        Value::FloatVector(values)
    }
}

impl Element for i32 {
    fn to_arg(&self) -> OscArg {
        OscArg::Int(*self)
    }

    fn from_arg(arg: &OscArg) -> Option<Self> {
        match arg {
            OscArg::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn clamp_to(self, bounds: &Bounds) -> Self {
        match *bounds {
            Bounds::Int { min, max } if min <= max => self.clamp(min, max),
            _ => self,
        }
    }

    fn scalar(value: &Value) -> Option<&Self> {
        match value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    fn vector(value: &Value) -> Option<&[Self]> {
        match value {
            Value::IntVector(v) => Some(v),
            _ => None,
        }
    }

    fn wrap(self) -> Value {
        Value::Int(self)
    }

    fn wrap_vector(values: Vec<Self>) -> Value {
        Value::IntVector(values)
    }
}

impl Element for String {
    fn to_arg(&self) -> OscArg {
        OscArg::Str(self.clone())
    }

    fn from_arg(arg: &OscArg) -> Option<Self> {
        match arg {
            OscArg::Str(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn clamp_to(self, _bounds: &Bounds) -> Self {
        self
    }

    fn scalar(value: &Value) -> Option<&Self> {
        match value {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    fn vector(value: &Value) -> Option<&[Self]> {
        match value {
            Value::StringVector(v) => Some(v),
            _ => None,
        }
    }

    fn wrap(self) -> Value {
        Value::String(self)
    }

    fn wrap_vector(values: Vec<Self>) -> Value {
        Value::StringVector(values)
    }
}

fn encode_scalar<T: Element>(value: &Value) -> Vec<OscArg> {
    T::scalar(value).map(|v| vec![v.to_arg()]).unwrap_or_default()
}

fn encode_vector<T: Element>(value: &Value) -> Vec<OscArg> {
    T::vector(value)
        .map(|values| values.iter().map(T::to_arg).collect())
        .unwrap_or_default()
}

fn decode_scalar<T: Element>(args: &[OscArg]) -> Option<Value> {
    args.first().and_then(T::from_arg).map(T::wrap)
}

fn decode_vector<T: Element>(args: &[OscArg]) -> Option<Value> {
    let values: Vec<T> = args.iter().filter_map(T::from_arg).collect();
    if values.is_empty() {
        None
    } else {
        Some(T::wrap_vector(values))
    }
}

fn clamp_scalar<T: Element>(value: Value, bounds: &Bounds) -> Value {
    if let Some(v) = T::scalar(&value) {
        return v.clone().clamp_to(bounds).wrap();
    }
    value
}

fn clamp_vector<T: Element>(value: Value, bounds: &Bounds) -> Value {
    if let Some(values) = T::vector(&value) {
        return T::wrap_vector(values.iter().cloned().map(|v| v.clamp_to(bounds)).collect());
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_kind() {
        for kind in VariableKind::ALL {
            assert_eq!(kind.spec().kind, kind);
            assert_eq!(kind.default_value().kind(), kind);
            assert!(kind.accepts_bounds(&kind.default_bounds()));
        }
    }

    #[test]
    fn names_parse_back() {
        for kind in VariableKind::ALL {
            assert_eq!(kind.as_str().parse::<VariableKind>(), Ok(kind));
        }
        assert!("double".parse::<VariableKind>().is_err());
    }

    #[test]
    fn serde_names_match_table() {
        let json = serde_json::to_string(&VariableKind::FloatVector).unwrap();
        assert_eq!(json, "\"float_vector\"");
    }

    #[test]
    fn scalar_decode_uses_first_argument_only() {
        let decode = VariableKind::Float.spec().decode;
        assert_eq!(
            decode(&[OscArg::Float(2.0), OscArg::Float(3.0)]),
            Some(Value::Float(2.0))
        );
        assert_eq!(decode(&[OscArg::Int(2), OscArg::Float(3.0)]), None);
        assert_eq!(decode(&[]), None);
    }

    #[test]
    fn vector_decode_filters_by_element_type() {
        let decode = VariableKind::FloatVector.spec().decode;
        let args = [
            OscArg::Float(1.0),
            OscArg::Str("x".into()),
            OscArg::Float(2.0),
        ];
        assert_eq!(decode(&args), Some(Value::FloatVector(vec![1.0, 2.0])));
        assert_eq!(decode(&[OscArg::Str("x".into())]), None);
    }

    #[test]
    fn clamp_is_elementwise_for_vectors() {
        let clamped = Value::IntVector(vec![-5, 3, 50]).clamped(&Bounds::int(0, 10));
        assert_eq!(clamped, Value::IntVector(vec![0, 3, 10]));

        let clamped = Value::Float(15.0).clamped(&Bounds::float(0.0, 10.0));
        assert_eq!(clamped, Value::Float(10.0));
    }

    #[test]
    fn strings_ignore_bounds() {
        let value = Value::StringVector(vec!["a".into()]);
        assert_eq!(value.clone().clamped(&Bounds::Unbounded), value);
    }

    #[test]
    fn encode_emits_one_arg_per_element() {
        let args = Value::StringVector(vec!["a".into(), "b".into()]).to_args();
        assert_eq!(args, vec![OscArg::Str("a".into()), OscArg::Str("b".into())]);
        assert!(Value::FloatVector(Vec::new()).to_args().is_empty());
    }
}

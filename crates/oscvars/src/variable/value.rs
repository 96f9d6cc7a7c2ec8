use std::fmt;

use crate::net::OscArg;

use super::kind::VariableKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f32),
    Int(i32),
    String(String),
    FloatVector(Vec<f32>),
    IntVector(Vec<i32>),
    StringVector(Vec<String>),
}

impl Value {
    pub fn kind(&self) -> VariableKind {
        match self {
            Value::Float(_) => VariableKind::Float,
            Value::Int(_) => VariableKind::Int,
            Value::String(_) => VariableKind::String,
            Value::FloatVector(_) => VariableKind::FloatVector,
            Value::IntVector(_) => VariableKind::IntVector,
            Value::StringVector(_) => VariableKind::StringVector,
        }
    }

    pub fn to_args(&self) -> Vec<OscArg> {
        (self.kind().spec().encode)(self)
    }

    pub fn clamped(self, bounds: &Bounds) -> Value {
        (self.kind().spec().clamp)(self, bounds)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::FloatVector(v)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntVector(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringVector(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", item)?;
            }
            f.write_str("]")
        }

        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::FloatVector(v) => list(f, v),
            Value::IntVector(v) => list(f, v),
            Value::StringVector(v) => list(f, v),
        }
    }
}

/// Numeric range of a variable. Vector kinds apply the pair to every element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bounds {
    Float { min: f32, max: f32 },
    Int { min: i32, max: i32 },
    Unbounded,
}

impl Bounds {
    pub const FULL_FLOAT: Bounds = Bounds::Float {
        min: f32::MIN,
        max: f32::MAX,
    };
    pub const FULL_INT: Bounds = Bounds::Int {
        min: i32::MIN,
        max: i32::MAX,
    };

    pub fn float(min: f32, max: f32) -> Self {
        Bounds::Float { min, max }
    }

    pub fn int(min: i32, max: i32) -> Self {
        Bounds::Int { min, max }
    }

    pub fn is_ordered(&self) -> bool {
        match self {
            Bounds::Float { min, max } => min <= max,
            Bounds::Int { min, max } => min <= max,
            Bounds::Unbounded => true,
        }
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bounds::Float { min, max } if *min == f32::MIN && *max == f32::MAX => f.write_str("-"),
            Bounds::Int { min, max } if *min == i32::MIN && *max == i32::MAX => f.write_str("-"),
            Bounds::Float { min, max } => write!(f, "{}..{}", min, max),
            Bounds::Int { min, max } => write!(f, "{}..{}", min, max),
            Bounds::Unbounded => f.write_str("-"),
        }
    }
}

use crate::net::OscArg;

use super::kind::VariableKind;
use super::value::{Bounds, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VariableError {
    #[error("variable name must not be empty")]
    EmptyName,
    #[error("variable '{0}' already exists")]
    DuplicateName(String),
    #[error("no variable named '{0}'")]
    UnknownVariable(String),
    #[error("variable '{name}' holds {expected} values, got {found}")]
    KindMismatch {
        name: String,
        expected: VariableKind,
        found: VariableKind,
    },
    #[error("bounds {bounds} are not valid for {kind} variable '{name}'")]
    InvalidBounds {
        name: String,
        kind: VariableKind,
        bounds: Bounds,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    kind: VariableKind,
    value: Value,
    bounds: Bounds,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// The value as it goes out on the wire: forced into bounds.
    pub fn clamped_value(&self) -> Value {
        self.value.clone().clamped(&self.bounds)
    }

    pub fn outbound_args(&self) -> Vec<OscArg> {
        self.clamped_value().to_args()
    }

    fn set(&mut self, value: Value) -> Result<(), VariableError> {
        if value.kind() != self.kind {
            return Err(VariableError::KindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                found: value.kind(),
            });
        }
        self.value = value;
        Ok(())
    }

    /// Overwrites the value from inbound arguments, unclamped. Returns false when
    /// no argument matched the kind and the value was left untouched.
    pub(crate) fn apply_args(&mut self, args: &[OscArg]) -> bool {
        match (self.kind.spec().decode)(args) {
            Some(value) => {
                self.value = value;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub kind: VariableKind,
    pub value: Value,
    pub bounds: Bounds,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: kind.default_value(),
            bounds: kind.default_bounds(),
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    fn build(self) -> Result<Variable, VariableError> {
        if self.name.is_empty() {
            return Err(VariableError::EmptyName);
        }
        if self.value.kind() != self.kind {
            return Err(VariableError::KindMismatch {
                name: self.name,
                expected: self.kind,
                found: self.value.kind(),
            });
        }
        if !self.kind.accepts_bounds(&self.bounds) || !self.bounds.is_ordered() {
            return Err(VariableError::InvalidBounds {
                name: self.name,
                kind: self.kind,
                bounds: self.bounds,
            });
        }

        Ok(Variable {
            name: self.name,
            kind: self.kind,
            value: self.value,
            bounds: self.bounds,
        })
    }
}

/// Variables of one group in creation order. Names are unique and case-sensitive.
#[derive(Debug, Default)]
pub struct VariableDirectory {
    variables: Vec<Variable>,
}

impl VariableDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spec: VariableSpec) -> Result<&Variable, VariableError> {
        if self.contains(&spec.name) {
            return Err(VariableError::DuplicateName(spec.name));
        }
        let variable = spec.build()?;
        self.variables.push(variable);
        Ok(&self.variables[self.variables.len() - 1])
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        let pos = self.position(name)?;
        Some(self.variables.remove(pos))
    }

    pub fn set_value(&mut self, name: &str, value: Value) -> Result<&Variable, VariableError> {
        let variable = self
            .get_mut(name)
            .ok_or_else(|| VariableError::UnknownVariable(name.to_string()))?;
        variable.set(value)?;
        Ok(variable)
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_are_rejected_without_side_effects() {
        let mut dir = VariableDirectory::new();
        dir.insert(VariableSpec::new("gain", VariableKind::Float).with_value(0.5f32))
            .unwrap();

        let err = dir
            .insert(VariableSpec::new("gain", VariableKind::Int))
            .unwrap_err();
        assert_eq!(err, VariableError::DuplicateName("gain".into()));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get("gain").unwrap().value(), &Value::Float(0.5));
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut dir = VariableDirectory::new();
        dir.insert(VariableSpec::new("Gain", VariableKind::Float)).unwrap();
        assert!(dir.insert(VariableSpec::new("gain", VariableKind::Float)).is_ok());
        assert_eq!(dir.names(), vec!["Gain".to_string(), "gain".to_string()]);
    }

    #[test]
    fn spec_validation() {
        let mut dir = VariableDirectory::new();
        assert_eq!(
            dir.insert(VariableSpec::new("", VariableKind::Float)),
            Err(VariableError::EmptyName)
        );
        assert!(matches!(
            dir.insert(VariableSpec::new("x", VariableKind::Float).with_value(3)),
            Err(VariableError::KindMismatch { .. })
        ));
        assert!(matches!(
            dir.insert(VariableSpec::new("x", VariableKind::Float).with_bounds(Bounds::int(0, 1))),
            Err(VariableError::InvalidBounds { .. })
        ));
        assert!(matches!(
            dir.insert(
                VariableSpec::new("x", VariableKind::Float).with_bounds(Bounds::float(1.0, 0.0))
            ),
            Err(VariableError::InvalidBounds { .. })
        ));
        assert!(dir.is_empty());
    }

    #[test]
    fn set_value_keeps_kind_fixed() {
        let mut dir = VariableDirectory::new();
        dir.insert(VariableSpec::new("n", VariableKind::Int)).unwrap();

        assert!(dir.set_value("n", Value::Float(1.0)).is_err());
        assert_eq!(dir.set_value("n", Value::Int(4)).unwrap().value(), &Value::Int(4));
        assert_eq!(
            dir.set_value("missing", Value::Int(1)),
            Err(VariableError::UnknownVariable("missing".into()))
        );
    }

    #[test]
    fn local_values_are_stored_unclamped_but_sent_clamped() {
        let mut dir = VariableDirectory::new();
        dir.insert(
            VariableSpec::new("level", VariableKind::Float).with_bounds(Bounds::float(0.0, 10.0)),
        )
        .unwrap();

        let var = dir.set_value("level", Value::Float(15.0)).unwrap();
        assert_eq!(var.value(), &Value::Float(15.0));
        assert_eq!(var.outbound_args(), vec![OscArg::Float(10.0)]);
    }

    #[test]
    fn empty_vector_input_leaves_value_untouched() {
        let mut dir = VariableDirectory::new();
        dir.insert(VariableSpec::new("v", VariableKind::FloatVector).with_value(vec![4.0f32]))
            .unwrap();

        let var = dir.get_mut("v").unwrap();
        assert!(!var.apply_args(&[OscArg::Str("nope".into())]));
        assert_eq!(var.value(), &Value::FloatVector(vec![4.0]));
    }

    #[test]
    fn removal_preserves_order() {
        let mut dir = VariableDirectory::new();
        for name in ["a", "b", "c"] {
            dir.insert(VariableSpec::new(name, VariableKind::String)).unwrap();
        }
        assert!(dir.remove("b").is_some());
        assert!(dir.remove("b").is_none());
        assert_eq!(dir.names(), vec!["a".to_string(), "c".to_string()]);
    }
}

//! Conditional expressions applied to a JSON document during processing
//! (SPEC_FULL.md §C supplement, grounded on `jsonmanip::conditionals`).

use crate::core::error::{Error, ErrorKind, Result};
use serde_json::Value;

/// A path component: either an object key or an array index.
#[derive(Debug, Clone, PartialEq)]
pub enum PathComponent {
    Key(String),
    Index(usize),
}

fn path_from_json(value: &Value) -> Result<Vec<PathComponent>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "conditional path must be a JSON array"))?;
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(PathComponent::Key(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .map(|i| PathComponent::Index(i as usize))
                .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "conditional path index must be a non-negative integer")),
            _ => Err(Error::new(ErrorKind::InvalidValue, "conditional path components must be strings or indices")),
        })
        .collect()
}

fn navigate<'a>(document: &'a Value, path: &[PathComponent]) -> Option<&'a Value> {
    let mut current = document;
    for component in path {
        current = match component {
            PathComponent::Key(key) => current.as_object()?.get(key)?,
            PathComponent::Index(index) => current.as_array()?.get(*index)?,
        };
    }
    Some(current)
}

/// A single conditional clause (spec's `ConditionalClause` hierarchy).
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Exists(Vec<PathComponent>),
    Get(Vec<PathComponent>),
    Literal(Value),
    Equals(Vec<Clause>),
}

impl Clause {
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "conditional clause must be a JSON object"))?;
        if obj.len() != 1 {
            return Err(Error::new(ErrorKind::InvalidValue, "unsupported conditional clause format"));
        }
        let (key, body) = obj.iter().next().unwrap();
        match key.as_str() {
            "exists" => Ok(Clause::Exists(path_from_json(body)?)),
            "get" => Ok(Clause::Get(path_from_json(body)?)),
            "literal" => Ok(Clause::Literal(body.clone())),
            "equals" => {
                let items = body
                    .as_array()
                    .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "equals member must be a JSON array"))?;
                let children = items.iter().map(Clause::from_json).collect::<Result<Vec<_>>>()?;
                Ok(Clause::Equals(children))
            }
            _ => Err(Error::new(ErrorKind::InvalidValue, "unsupported conditional clause format")),
        }
    }

    /// Apply this clause to `document`, returning the JSON value it
    /// evaluates to (`exists`/`equals` evaluate to booleans; `get` and
    /// `literal` evaluate to the value found/configured).
    pub fn apply(&self, document: &Value) -> Value {
        match self {
            Clause::Exists(path) => Value::Bool(navigate(document, path).is_some()),
            Clause::Get(path) => navigate(document, path).cloned().unwrap_or(Value::Null),
            Clause::Literal(value) => value.clone(),
            Clause::Equals(children) => {
                let values: Vec<Value> = children.iter().map(|c| c.apply(document)).collect();
                let all_equal = values.windows(2).all(|pair| pair[0] == pair[1]);
                Value::Bool(all_equal)
            }
        }
    }
}

/// A top-level conditional expression, evaluated against a JSON document
/// and expected to produce a boolean.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditional {
    clause: Option<Clause>,
}

impl Conditional {
    pub fn from_json(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Conditional { clause: None });
        }
        Ok(Conditional { clause: Some(Clause::from_json(value)?) })
    }

    pub fn is_null(&self) -> bool {
        self.clause.is_none()
    }

    pub fn test(&self, value: &Value) -> Result<bool> {
        let clause = self
            .clause
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "cannot test an uninitialised conditional"))?;
        Ok(clause.apply(value).as_bool().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exists_true_for_present_nested_path() {
        let cond = Conditional::from_json(&json!({"exists": ["a", "b"]})).unwrap();
        assert!(cond.test(&json!({"a": {"b": 1}})).unwrap());
        assert!(!cond.test(&json!({"a": {}})).unwrap());
    }

    #[test]
    fn get_returns_null_for_missing_path() {
        let clause = Clause::from_json(&json!({"get": ["a", 0]})).unwrap();
        assert_eq!(clause.apply(&json!({"a": [42]})), json!(42));
        assert_eq!(clause.apply(&json!({"a": []})), Value::Null);
    }

    #[test]
    fn equals_compares_all_children() {
        let cond = Conditional::from_json(&json!({"equals": [
            {"get": ["x"]},
            {"literal": 5}
        ]}))
        .unwrap();
        assert!(cond.test(&json!({"x": 5})).unwrap());
        assert!(!cond.test(&json!({"x": 6})).unwrap());
    }

    #[test]
    fn null_conditional_errors_on_test() {
        let cond = Conditional::from_json(&Value::Null).unwrap();
        assert!(cond.is_null());
        assert!(cond.test(&Value::Null).is_err());
    }
}

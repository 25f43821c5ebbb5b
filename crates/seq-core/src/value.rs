use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeqValue {
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<SeqValue>),
    Map(BTreeMap<String, SeqValue>),
}

impl SeqValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Whole-valued numbers read back as integers; everything else is `None`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Number(value) if value.fract().abs() < f64::EPSILON => Some(*value as i64),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// Truthiness used for step success and condition coercion: false/0/""
    /// and empty collections are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0,
            Self::String(value) => !value.is_empty(),
            Self::Array(values) => !values.is_empty(),
            Self::Map(values) => !values.is_empty(),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => {
                if value.fract().abs() < f64::EPSILON {
                    (*value as i64).to_string()
                } else {
                    value.to_string()
                }
            }
            Self::String(value) => value.clone(),
            Self::Array(values) => format!(
                "[{}]",
                values
                    .iter()
                    .map(SeqValue::to_text)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::Map(values) => {
                let entries = values
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value.to_text()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{}}}", entries)
            }
        }
    }
}

impl From<f64> for SeqValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for SeqValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for SeqValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for SeqValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_emptiness() {
        assert!(SeqValue::Bool(true).is_truthy());
        assert!(!SeqValue::Bool(false).is_truthy());
        assert!(SeqValue::Number(3.0).is_truthy());
        assert!(!SeqValue::Number(0.0).is_truthy());
        assert!(SeqValue::from("x").is_truthy());
        assert!(!SeqValue::from("").is_truthy());
        assert!(!SeqValue::Array(Vec::new()).is_truthy());
        assert!(!SeqValue::Map(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(SeqValue::Number(7.0).to_text(), "7");
        assert_eq!(SeqValue::Number(2.5).to_text(), "2.5");
        assert_eq!(SeqValue::Number(7.0).as_integer(), Some(7));
        assert_eq!(SeqValue::Number(2.5).as_integer(), None);
    }

    #[test]
    fn serde_untagged_roundtrip() {
        let value = SeqValue::Array(vec![
            SeqValue::Number(1.0),
            SeqValue::from("two"),
            SeqValue::Bool(true),
        ]);
        let json = serde_json::to_string(&value).expect("value should serialize");
        assert_eq!(json, r#"[1.0,"two",true]"#);
        let back: SeqValue = serde_json::from_str(&json).expect("value should deserialize");
        assert_eq!(back, value);
    }
}

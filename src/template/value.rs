//! Deferred values for resource properties, parameter bindings and outputs.
//!
//! A [`Value`] is either a literal or a symbolic reference that is only
//! resolved when the owning template is rendered. References never hold the
//! node they point at; they name it by logical id, which keeps a template's
//! node graph free of ownership cycles and lets the renderer validate every
//! target against the finished namespace in one pass.
//!
//! # Forms
//!
//! | Variant | Rendered form |
//! |---------|---------------|
//! | [`Value::Ref`] | `{"Ref": "<id>"}` |
//! | [`Value::GetAtt`] | `{"Fn::GetAtt": ["<id>", "<path>"]}` |
//! | [`Value::FindInMap`] | `{"Fn::FindInMap": ["<map>", <top>, <second>]}` |
//! | [`Value::Join`] | `{"Fn::Join": ["<delimiter>", [...]]}` |
//! | [`Value::If`] | `{"Fn::If": ["<condition>", <then>, <else>]}` |
//! | [`Value::Base64`] | `{"Fn::Base64": <value>}` |
//! | [`Value::Omit`] | absent from the surrounding list or object |
//!
//! # Examples
//!
//! ```rust
//! use brix::template::{Pseudo, Value};
//!
//! let cidr = Value::join(["10.".into(), Value::reference("Ip"), ".0.0/16".into()]);
//! let zone = Value::join([Value::pseudo(Pseudo::Region), "a".into()]);
//! assert!(matches!(cidr, Value::Join { .. }));
//! assert!(matches!(zone, Value::Join { .. }));
//! ```

use std::collections::BTreeMap;

/// Pseudo parameters supplied by the provisioning backend at deploy time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pseudo {
    /// `AWS::Region`
    Region,
    /// `AWS::AccountId`
    AccountId,
    /// `AWS::StackName`
    StackName,
    /// `AWS::StackId`
    StackId,
}

impl Pseudo {
    /// The logical id the backend recognises for this pseudo parameter.
    pub fn logical_id(self) -> &'static str {
        match self {
            Self::Region => "AWS::Region",
            Self::AccountId => "AWS::AccountId",
            Self::StackName => "AWS::StackName",
            Self::StackId => "AWS::StackId",
        }
    }
}

/// Prefix shared by every pseudo parameter id.
pub const PSEUDO_PREFIX: &str = "AWS::";

/// The id a rendered `Fn::If` branch uses to mean "no value".
pub const NO_VALUE: &str = "AWS::NoValue";

/// A literal or deferred value inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// JSON `null`
    Null,
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Number(i64),
    /// String literal
    String(String),
    /// Ordered sequence; [`Value::Omit`] elements are dropped on render
    List(Vec<Value>),
    /// Object; fields holding [`Value::Omit`] are dropped on render
    Map(BTreeMap<String, Value>),
    /// Direct reference to a parameter, resource, nested stack or pseudo parameter
    Ref(String),
    /// Attribute of a resource, or `Outputs.<name>` of a nested stack
    GetAtt {
        /// Logical id of the resource or nested stack
        target: String,
        /// Attribute path
        path: String,
    },
    /// Two-level lookup in a declared mapping
    FindInMap {
        /// Mapping logical id
        map: String,
        /// First-level key
        top: Box<Value>,
        /// Second-level key
        second: Box<Value>,
    },
    /// String concatenation
    Join {
        /// Separator placed between parts
        delimiter: String,
        /// Parts to join; omitted parts are dropped
        parts: Vec<Value>,
    },
    /// Value chosen by a named condition at deploy time
    If {
        /// Condition logical id
        condition: String,
        /// Value when the condition holds
        then: Box<Value>,
        /// Value when it does not
        otherwise: Box<Value>,
    },
    /// Base64 encoding of the inner value
    Base64(Box<Value>),
    /// The omit sentinel: absent from the rendered document
    Omit,
}

impl Value {
    /// Direct reference to a logical id.
    pub fn reference(logical_id: impl Into<String>) -> Self {
        Self::Ref(logical_id.into())
    }

    /// Direct reference to a pseudo parameter.
    pub fn pseudo(pseudo: Pseudo) -> Self {
        Self::Ref(pseudo.logical_id().to_string())
    }

    /// Attribute lookup on another node.
    pub fn get_att(target: impl Into<String>, path: impl Into<String>) -> Self {
        Self::GetAtt {
            target: target.into(),
            path: path.into(),
        }
    }

    /// Lookup in a declared mapping.
    pub fn find_in_map(map: impl Into<String>, top: Value, second: Value) -> Self {
        Self::FindInMap {
            map: map.into(),
            top: Box::new(top),
            second: Box::new(second),
        }
    }

    /// Concatenate parts with no separator.
    pub fn join<I, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::join_with("", parts)
    }

    /// Concatenate parts with `delimiter` between them.
    pub fn join_with<I, V>(delimiter: &str, parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Join {
            delimiter: delimiter.to_string(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Choose between two values by a named condition.
    pub fn when(condition: impl Into<String>, then: Value, otherwise: Value) -> Self {
        Self::If {
            condition: condition.into(),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Base64-encode a value.
    pub fn base64(value: Value) -> Self {
        Self::Base64(Box::new(value))
    }

    /// Build an object from `(key, value)` pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a list from anything convertible into values.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Whether this is the omit sentinel.
    pub fn is_omit(&self) -> bool {
        matches!(self, Self::Omit)
    }

    /// The string literal inside this value, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<Pseudo> for Value {
    fn from(value: Pseudo) -> Self {
        Self::pseudo(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_collects_mixed_parts() {
        let value = Value::join(["10.".into(), Value::reference("Ip"), ".0.0/16".into()]);
        match value {
            Value::Join { delimiter, parts } => {
                assert_eq!(delimiter, "");
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[1], Value::Ref("Ip".to_string()));
            }
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn test_pseudo_ids() {
        assert_eq!(Value::pseudo(Pseudo::Region), Value::Ref("AWS::Region".to_string()));
        assert!(Pseudo::AccountId.logical_id().starts_with(PSEUDO_PREFIX));
    }

    #[test]
    fn test_map_builder_sorts_keys() {
        let value = Value::map([("b", Value::from("2")), ("a", Value::from("1"))]);
        let Value::Map(fields) = value else {
            panic!("expected map");
        };
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}

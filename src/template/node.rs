//! Builder keys and the nodes built from them.

use std::fmt;
use std::sync::Arc;

use super::definition::{Category, Definition, Resource};
use super::value::Value;

/// Symbolic name of a builder within one template.
///
/// The logical id of the built node is the key's name, so ids are stable
/// regardless of the order builders run in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    category: Category,
    name: String,
}

impl Key {
    /// Key in an explicit category.
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    /// Parameter key.
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::new(Category::Parameter, name)
    }

    /// Mapping key.
    pub fn mapping(name: impl Into<String>) -> Self {
        Self::new(Category::Mapping, name)
    }

    /// Condition key.
    pub fn condition(name: impl Into<String>) -> Self {
        Self::new(Category::Condition, name)
    }

    /// Resource key.
    pub fn resource(name: impl Into<String>) -> Self {
        Self::new(Category::Resource, name)
    }

    /// Nested stack key.
    pub fn stack(name: impl Into<String>) -> Self {
        Self::new(Category::NestedStack, name)
    }

    /// Output key.
    pub fn output(name: impl Into<String>) -> Self {
        Self::new(Category::Output, name)
    }

    /// Category of the node this key builds.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Logical id of the node this key builds.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category.label(), self.name)
    }
}

/// Shared handle to a built node.
///
/// Every lookup of the same key during one render returns a clone of the
/// same `Arc`.
pub type NodeRef = Arc<Node>;

/// A built node: a logical id plus the definition its builder returned.
#[derive(Debug, PartialEq, Eq)]
pub struct Node {
    key: Key,
    definition: Definition,
}

impl Node {
    pub(crate) fn new(key: Key, definition: Definition) -> Self {
        Self { key, definition }
    }

    /// Builder key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Stable logical id within the template.
    pub fn logical_id(&self) -> &str {
        self.key.name()
    }

    /// Section the node renders into.
    pub fn category(&self) -> Category {
        self.key.category()
    }

    /// What the builder produced.
    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    /// The resource definition, if this node is a plain resource.
    pub fn as_resource(&self) -> Option<&Resource> {
        match &self.definition {
            Definition::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    /// `{"Ref": id}` pointing at this node.
    pub fn reference(&self) -> Value {
        Value::reference(self.logical_id())
    }

    /// `{"Fn::GetAtt": [id, path]}` on this node.
    pub fn attribute(&self, path: impl Into<String>) -> Value {
        Value::get_att(self.logical_id(), path)
    }

    /// Output `name` of this nested stack.
    pub fn output(&self, name: &str) -> Value {
        Value::get_att(self.logical_id(), format!("Outputs.{name}"))
    }

    /// Lookup in this mapping.
    pub fn lookup(&self, top: impl Into<Value>, second: impl Into<Value>) -> Value {
        Value::find_in_map(self.logical_id(), top.into(), second.into())
    }

    /// `then` when this condition holds, `otherwise` when it does not.
    pub fn select(&self, then: impl Into<Value>, otherwise: impl Into<Value>) -> Value {
        Value::when(self.logical_id(), then.into(), otherwise.into())
    }

    /// `value` when this condition holds, absent otherwise.
    pub fn only(&self, value: impl Into<Value>) -> Value {
        self.select(value, Value::Omit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::definition::Parameter;

    #[test]
    fn test_key_display_uses_category_label() {
        assert_eq!(Key::stack("ZoneA").to_string(), "stack:ZoneA");
        assert_eq!(Key::parameter("Ip").to_string(), "parameter:Ip");
    }

    #[test]
    fn test_node_helpers_name_logical_id() {
        let node = Node::new(Key::parameter("Ip"), Definition::Parameter(Parameter::string()));
        assert_eq!(node.reference(), Value::Ref("Ip".to_string()));
        assert_eq!(
            node.output("Subnet"),
            Value::GetAtt {
                target: "Ip".to_string(),
                path: "Outputs.Subnet".to_string(),
            }
        );
    }
}

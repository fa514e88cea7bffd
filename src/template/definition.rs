//! The definitions builders produce, one shape per section.

use std::collections::BTreeMap;

use super::condition::Condition;
use super::value::Value;

/// Resource type of a nested stack.
pub const NESTED_STACK_TYPE: &str = "AWS::CloudFormation::Stack";

/// Which section a node belongs to.
///
/// The ordering of the variants is the order sections appear in the
/// rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Input parameter
    Parameter,
    /// Static lookup table
    Mapping,
    /// Named condition
    Condition,
    /// Plain resource
    Resource,
    /// Resource embedding another template
    NestedStack,
    /// Stack output
    Output,
}

/// Logical-id namespaces within one template.
///
/// Parameters, resources and nested stacks share the reference namespace;
/// the other categories each live in their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Targets of `Ref`
    Reference,
    /// Targets of `Fn::FindInMap`
    Mapping,
    /// Targets of `Fn::If` and `Condition`
    Condition,
    /// Output names
    Output,
}

impl Category {
    /// Namespace this category's logical ids live in.
    pub fn namespace(self) -> Namespace {
        match self {
            Self::Parameter | Self::Resource | Self::NestedStack => Namespace::Reference,
            Self::Mapping => Namespace::Mapping,
            Self::Condition => Namespace::Condition,
            Self::Output => Namespace::Output,
        }
    }

    /// Top-level section key in the rendered document.
    pub fn section(self) -> &'static str {
        match self {
            Self::Parameter => "Parameters",
            Self::Mapping => "Mappings",
            Self::Condition => "Conditions",
            Self::Resource | Self::NestedStack => "Resources",
            Self::Output => "Outputs",
        }
    }

    /// Whether nodes of this category render into `Resources`.
    pub fn is_resource_like(self) -> bool {
        matches!(self, Self::Resource | Self::NestedStack)
    }

    /// Lowercase label used in keys and messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Parameter => "parameter",
            Self::Mapping => "mapping",
            Self::Condition => "condition",
            Self::Resource => "resource",
            Self::NestedStack => "stack",
            Self::Output => "output",
        }
    }
}

/// An input parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter type, `String` or `Number`
    pub kind: String,
    /// Default value
    pub default: Option<String>,
    /// Human-readable description
    pub description: Option<String>,
    /// Closed set of accepted values
    pub allowed_values: Vec<String>,
}

impl Parameter {
    /// A `String` parameter without a default.
    pub fn string() -> Self {
        Self {
            kind: "String".to_string(),
            default: None,
            description: None,
            allowed_values: Vec::new(),
        }
    }

    /// A `Number` parameter without a default.
    pub fn number() -> Self {
        Self {
            kind: "Number".to_string(),
            ..Self::string()
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict the accepted values.
    pub fn allowed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// A two-level lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    /// `top -> second -> value`
    pub entries: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Mapping {
    /// Empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one entry.
    pub fn entry(
        mut self,
        top: impl Into<String>,
        second: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.entries.entry(top.into()).or_default().insert(second.into(), value.into());
        self
    }
}

/// A plain resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource type, e.g. `AWS::EC2::VPC`
    pub kind: String,
    /// Property values; omitted values are dropped on render
    pub properties: BTreeMap<String, Value>,
    /// Logical ids that must be created first
    pub depends_on: Vec<String>,
    /// Condition gating creation of the resource
    pub condition: Option<String>,
}

impl Resource {
    /// Resource of the given type with no properties.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
            condition: None,
        }
    }

    /// Set one property.
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Read back a property set by the builder.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Require `logical_id` to be created before this resource.
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }

    /// Create the resource only when `condition` holds.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// A resource embedding another template's rendered artifact.
///
/// The target template is fixed when the builder is declared; the builder
/// only supplies parameter bindings and ordering dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedStackLink {
    pub(crate) template: String,
    /// Parameters passed to the nested template
    pub parameters: BTreeMap<String, Value>,
    /// Logical ids that must be created first
    pub depends_on: Vec<String>,
}

impl NestedStackLink {
    /// Link with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the template this link embeds.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Bind one parameter of the nested template.
    pub fn bind(mut self, parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(parameter.into(), value.into());
        self
    }

    /// Require `logical_id` to be created before the nested stack.
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }

    pub(crate) fn targeting(mut self, template: &str) -> Self {
        self.template = template.to_string();
        self
    }
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Exported value
    pub value: Value,
    /// Human-readable description
    pub description: Option<String>,
}

impl Output {
    /// Output exporting `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            description: None,
        }
    }

    /// Set the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// What a builder produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    /// See [`Parameter`]
    Parameter(Parameter),
    /// See [`Mapping`]
    Mapping(Mapping),
    /// See [`Condition`]
    Condition(Condition),
    /// See [`Resource`]
    Resource(Resource),
    /// See [`NestedStackLink`]
    NestedStack(NestedStackLink),
    /// See [`Output`]
    Output(Output),
}

impl Definition {
    /// Category matching this definition's shape.
    pub fn category(&self) -> Category {
        match self {
            Self::Parameter(_) => Category::Parameter,
            Self::Mapping(_) => Category::Mapping,
            Self::Condition(_) => Category::Condition,
            Self::Resource(_) => Category::Resource,
            Self::NestedStack(_) => Category::NestedStack,
            Self::Output(_) => Category::Output,
        }
    }
}

//! Resolution of built nodes into the rendered JSON document.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde_json::{Map, Value as Json, json};

use super::artifact::{ArtifactIndex, RenderedArtifact, StorageLayout};
use super::error::RenderError;
use crate::template::condition::{MAX_OPERANDS, MIN_OPERANDS};
use crate::template::{
    Category, Condition, Definition, Mapping, NESTED_STACK_TYPE, NO_VALUE, NestedStackLink,
    NodeRef, Output, PSEUDO_PREFIX, Parameter, Resource, TemplateDef, Value,
};

/// Every logical id a reference may target, by namespace.
struct Names<'a> {
    references: HashMap<&'a str, Category>,
    mappings: HashSet<&'a str>,
    conditions: HashSet<&'a str>,
    stacks: HashMap<&'a str, &'a RenderedArtifact>,
}

impl<'a> Names<'a> {
    fn collect(
        nodes: &'a BTreeMap<Category, Vec<NodeRef>>,
        artifacts: &'a ArtifactIndex,
    ) -> Result<Self, RenderError> {
        let mut names = Self {
            references: HashMap::new(),
            mappings: HashSet::new(),
            conditions: HashSet::new(),
            stacks: HashMap::new(),
        };

        for node in nodes.values().flatten() {
            let id = node.logical_id();
            match node.definition() {
                Definition::Parameter(_) | Definition::Resource(_) => {
                    names.references.insert(id, node.category());
                }
                Definition::NestedStack(link) => {
                    let artifact =
                        artifacts.get(link.template()).ok_or_else(|| RenderError::MissingArtifact {
                            stack: id.to_string(),
                            template: link.template().to_string(),
                        })?;
                    names.references.insert(id, Category::NestedStack);
                    names.stacks.insert(id, artifact);
                }
                Definition::Mapping(_) => {
                    names.mappings.insert(id);
                }
                Definition::Condition(_) => {
                    names.conditions.insert(id);
                }
                Definition::Output(_) => {}
            }
        }
        Ok(names)
    }
}

/// Resolves the values held by one node.
struct Resolver<'a> {
    names: &'a Names<'a>,
    owner: &'a str,
}

impl Resolver<'_> {
    fn dangling(&self, kind: &'static str, target: &str) -> RenderError {
        RenderError::DanglingReference {
            owner: self.owner.to_string(),
            kind,
            target: target.to_string(),
        }
    }

    /// `None` means the value is omitted.
    fn value(&self, value: &Value) -> Result<Option<Json>, RenderError> {
        let resolved = match value {
            Value::Omit => return Ok(None),
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => json!(n),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(item) = self.value(item)? {
                        out.push(item);
                    }
                }
                Json::Array(out)
            }
            Value::Map(fields) => Json::Object(self.fields(fields)?),
            Value::Ref(target) => {
                if !target.starts_with(PSEUDO_PREFIX)
                    && !self.names.references.contains_key(target.as_str())
                {
                    return Err(self.dangling("parameter or resource", target));
                }
                json!({ "Ref": target })
            }
            Value::GetAtt { target, path } => {
                self.check_attribute(target, path)?;
                json!({ "Fn::GetAtt": [target, path] })
            }
            Value::FindInMap { map, top, second } => {
                if !self.names.mappings.contains(map.as_str()) {
                    return Err(self.dangling("mapping", map));
                }
                json!({ "Fn::FindInMap": [map, self.required(top)?, self.required(second)?] })
            }
            Value::Join { delimiter, parts } => {
                let mut out = Vec::with_capacity(parts.len());
                for part in parts {
                    if let Some(part) = self.value(part)? {
                        out.push(part);
                    }
                }
                json!({ "Fn::Join": [delimiter, out] })
            }
            Value::If {
                condition,
                then,
                otherwise,
            } => {
                if !self.names.conditions.contains(condition.as_str()) {
                    return Err(self.dangling("condition", condition));
                }
                match (self.value(then)?, self.value(otherwise)?) {
                    (None, None) => return Ok(None),
                    (then, otherwise) => json!({
                        "Fn::If": [
                            condition,
                            then.unwrap_or_else(no_value),
                            otherwise.unwrap_or_else(no_value),
                        ]
                    }),
                }
            }
            Value::Base64(inner) => json!({ "Fn::Base64": self.required(inner)? }),
        };
        Ok(Some(resolved))
    }

    fn required(&self, value: &Value) -> Result<Json, RenderError> {
        self.value(value)?.ok_or_else(|| RenderError::MisplacedOmit {
            owner: self.owner.to_string(),
        })
    }

    fn fields(&self, fields: &BTreeMap<String, Value>) -> Result<Map<String, Json>, RenderError> {
        let mut out = Map::new();
        for (key, value) in fields {
            if let Some(value) = self.value(value)? {
                out.insert(key.clone(), value);
            }
        }
        Ok(out)
    }

    fn check_attribute(&self, target: &str, path: &str) -> Result<(), RenderError> {
        match self.names.references.get(target) {
            Some(Category::Resource) => Ok(()),
            Some(Category::NestedStack) => {
                let Some(artifact) = self.names.stacks.get(target) else {
                    return Err(self.dangling("nested stack", target));
                };
                let output = path.strip_prefix("Outputs.").unwrap_or(path);
                if path.starts_with("Outputs.") && artifact.has_output(output) {
                    Ok(())
                } else {
                    Err(RenderError::UnknownNestedOutput {
                        owner: self.owner.to_string(),
                        stack: target.to_string(),
                        template: artifact.name().to_string(),
                        output: output.to_string(),
                    })
                }
            }
            _ => Err(self.dangling("resource", target)),
        }
    }

    fn check_resource_like(&self, target: &str) -> Result<(), RenderError> {
        match self.names.references.get(target) {
            Some(category) if category.is_resource_like() => Ok(()),
            _ => Err(self.dangling("resource", target)),
        }
    }

    fn condition(&self, name: &str, condition: &Condition) -> Result<Json, RenderError> {
        let operands = |ops: &[Condition]| -> Result<Vec<Json>, RenderError> {
            if !(MIN_OPERANDS..=MAX_OPERANDS).contains(&ops.len()) {
                return Err(RenderError::InvalidCondition {
                    condition: name.to_string(),
                    reason: format!(
                        "expected {MIN_OPERANDS} to {MAX_OPERANDS} operands, found {}",
                        ops.len()
                    ),
                });
            }
            ops.iter().map(|op| self.condition(name, op)).collect()
        };

        Ok(match condition {
            Condition::And(ops) => json!({ "Fn::And": operands(ops)? }),
            Condition::Or(ops) => json!({ "Fn::Or": operands(ops)? }),
            Condition::Not(inner) => json!({ "Fn::Not": [self.condition(name, inner)?] }),
            Condition::Equals(left, right) => {
                json!({ "Fn::Equals": [self.required(left)?, self.required(right)?] })
            }
            Condition::Named(other) => {
                if !self.names.conditions.contains(other.as_str()) {
                    return Err(self.dangling("condition", other));
                }
                json!({ "Condition": other })
            }
        })
    }
}

fn no_value() -> Json {
    json!({ "Ref": NO_VALUE })
}

fn parameter(parameter: &Parameter) -> Json {
    let mut out = Map::new();
    out.insert("Type".into(), Json::String(parameter.kind.clone()));
    if let Some(default) = &parameter.default {
        out.insert("Default".into(), Json::String(default.clone()));
    }
    if let Some(description) = &parameter.description {
        out.insert("Description".into(), Json::String(description.clone()));
    }
    if !parameter.allowed_values.is_empty() {
        out.insert("AllowedValues".into(), json!(parameter.allowed_values));
    }
    Json::Object(out)
}

fn mapping(resolver: &Resolver<'_>, mapping: &Mapping) -> Result<Json, RenderError> {
    let mut out = Map::new();
    for (top, entries) in &mapping.entries {
        let mut inner = Map::new();
        for (second, value) in entries {
            inner.insert(second.clone(), resolver.required(value)?);
        }
        out.insert(top.clone(), Json::Object(inner));
    }
    Ok(Json::Object(out))
}

fn resource(resolver: &Resolver<'_>, resource: &Resource) -> Result<Json, RenderError> {
    let mut out = Map::new();
    out.insert("Type".into(), Json::String(resource.kind.clone()));
    let properties = resolver.fields(&resource.properties)?;
    if !properties.is_empty() {
        out.insert("Properties".into(), Json::Object(properties));
    }
    depends_on(resolver, &resource.depends_on, &mut out)?;
    if let Some(condition) = &resource.condition {
        if !resolver.names.conditions.contains(condition.as_str()) {
            return Err(resolver.dangling("condition", condition));
        }
        out.insert("Condition".into(), Json::String(condition.clone()));
    }
    Ok(Json::Object(out))
}

fn nested_stack(
    resolver: &Resolver<'_>,
    link: &NestedStackLink,
    layout: &StorageLayout,
) -> Result<Json, RenderError> {
    let artifact = resolver.names.stacks.get(resolver.owner).ok_or_else(|| {
        RenderError::MissingArtifact {
            stack: resolver.owner.to_string(),
            template: link.template().to_string(),
        }
    })?;

    let mut properties = Map::new();
    properties.insert(
        "TemplateURL".into(),
        resolver.required(&layout.template_url(artifact.storage_key()))?,
    );
    let parameters = resolver.fields(&link.parameters)?;
    if !parameters.is_empty() {
        properties.insert("Parameters".into(), Json::Object(parameters));
    }

    let mut out = Map::new();
    out.insert("Type".into(), Json::String(NESTED_STACK_TYPE.to_string()));
    out.insert("Properties".into(), Json::Object(properties));
    depends_on(resolver, &link.depends_on, &mut out)?;
    Ok(Json::Object(out))
}

fn depends_on(
    resolver: &Resolver<'_>,
    targets: &[String],
    out: &mut Map<String, Json>,
) -> Result<(), RenderError> {
    if targets.is_empty() {
        return Ok(());
    }
    for target in targets {
        resolver.check_resource_like(target)?;
    }
    out.insert("DependsOn".into(), json!(targets));
    Ok(())
}

fn output(resolver: &Resolver<'_>, output: &Output) -> Result<Json, RenderError> {
    let mut out = Map::new();
    out.insert("Value".into(), resolver.required(&output.value)?);
    if let Some(description) = &output.description {
        out.insert("Description".into(), Json::String(description.clone()));
    }
    Ok(Json::Object(out))
}

/// Assemble the document for a fully built template.
///
/// Returns the document and the names of its outputs.
pub(crate) fn assemble(
    def: &TemplateDef,
    nodes: &BTreeMap<Category, Vec<NodeRef>>,
    artifacts: &ArtifactIndex,
    layout: &StorageLayout,
) -> Result<(Json, BTreeSet<String>), RenderError> {
    let names = Names::collect(nodes, artifacts)?;
    let mut sections: BTreeMap<&'static str, Map<String, Json>> = BTreeMap::new();
    let mut outputs = BTreeSet::new();

    for node in nodes.values().flatten() {
        let resolver = Resolver {
            names: &names,
            owner: node.logical_id(),
        };
        let rendered = match node.definition() {
            Definition::Parameter(p) => parameter(p),
            Definition::Mapping(m) => mapping(&resolver, m)?,
            Definition::Condition(c) => resolver.condition(node.logical_id(), c)?,
            Definition::Resource(r) => resource(&resolver, r)?,
            Definition::NestedStack(link) => nested_stack(&resolver, link, layout)?,
            Definition::Output(o) => {
                outputs.insert(node.logical_id().to_string());
                output(&resolver, o)?
            }
        };
        sections
            .entry(node.category().section())
            .or_default()
            .insert(node.logical_id().to_string(), rendered);
    }

    let mut document = Map::new();
    if let Some(description) = def.description() {
        document.insert("Description".into(), Json::String(description.to_string()));
    }
    document.insert("Resources".into(), Json::Object(Map::new()));
    for (section, entries) in sections {
        document.insert(section.to_string(), Json::Object(entries));
    }
    Ok((Json::Object(document), outputs))
}

//! The view a builder gets of its template while it runs.

use std::sync::Arc;

use tracing::trace;

use super::cache::{NodeCache, Slot};
use super::definition::{Category, Definition, Resource};
use super::error::BuildError;
use super::node::{Key, Node, NodeRef};
use super::registry::TemplateDef;

/// Access to the rest of the template from inside a builder.
///
/// Asking a scope for a key builds it on first use and returns the cached
/// node afterwards, so two builders that both need "the security group"
/// share one node.
pub struct Scope<'t> {
    def: &'t TemplateDef,
    cache: &'t mut NodeCache,
}

impl<'t> Scope<'t> {
    pub(crate) fn new(def: &'t TemplateDef, cache: &'t mut NodeCache) -> Self {
        Self { def, cache }
    }

    /// Name of the template being built.
    pub fn template_name(&self) -> &str {
        self.def.name()
    }

    /// Whether the template declares `key`.
    pub fn declares(&self, key: &Key) -> bool {
        self.def.declares(key)
    }

    /// Key whose builder is running right now.
    pub fn current(&self) -> Option<&Key> {
        self.cache.current()
    }

    /// Build `key` if needed and return its node.
    pub fn get(&mut self, key: &Key) -> Result<NodeRef, BuildError> {
        match self.cache.get(key) {
            Some(Slot::Built(node)) => {
                trace!(target: "template", "cache hit for {key} in {}", self.def.name());
                return Ok(node);
            }
            Some(Slot::Building) => {
                return Err(BuildError::CyclicReference {
                    key: key.clone(),
                    chain: self.cache.chain_to(key),
                });
            }
            None => {}
        }

        let def = self.def;
        let entry = def.entry(key).ok_or_else(|| BuildError::UnknownKey {
            template: def.name().to_string(),
            key: key.clone(),
        })?;

        trace!(target: "template", "building {key} in {}", def.name());
        self.cache.begin(key.clone());
        let definition = match (entry.build)(self) {
            Ok(definition) => definition,
            Err(err) => {
                self.cache.abandon(key);
                return Err(err);
            }
        };

        let node = Arc::new(Node::new(key.clone(), definition));
        self.cache.finish(key, Arc::clone(&node));
        Ok(node)
    }

    /// Build `key` when the template declares it.
    pub fn find(&mut self, key: &Key) -> Result<Option<NodeRef>, BuildError> {
        if self.def.declares(key) || self.cache.contains(key) {
            self.get(key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Parameter node named `name`.
    pub fn parameter(&mut self, name: &str) -> Result<NodeRef, BuildError> {
        self.get(&Key::parameter(name))
    }

    /// Mapping node named `name`.
    pub fn mapping(&mut self, name: &str) -> Result<NodeRef, BuildError> {
        self.get(&Key::mapping(name))
    }

    /// Condition node named `name`.
    pub fn condition(&mut self, name: &str) -> Result<NodeRef, BuildError> {
        self.get(&Key::condition(name))
    }

    /// Resource node named `name`.
    pub fn resource(&mut self, name: &str) -> Result<NodeRef, BuildError> {
        self.get(&Key::resource(name))
    }

    /// Nested stack node named `name`.
    pub fn stack(&mut self, name: &str) -> Result<NodeRef, BuildError> {
        self.get(&Key::stack(name))
    }

    /// Add a resource that has no builder of its own, such as a rule that
    /// belongs to the resource currently being built.
    pub fn attach(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> Result<NodeRef, BuildError> {
        let key = Key::resource(logical_id);
        let taken = self.cache.contains(&key)
            || [Category::Parameter, Category::Resource, Category::NestedStack]
                .into_iter()
                .any(|category| self.def.declares(&Key::new(category, key.name())));
        if taken {
            return Err(BuildError::DuplicateLogicalId {
                template: self.def.name().to_string(),
                logical_id: key.name().to_string(),
            });
        }

        let node = Arc::new(Node::new(key.clone(), Definition::Resource(resource)));
        self.cache.attach(key, Arc::clone(&node));
        Ok(node)
    }
}

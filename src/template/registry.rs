//! Declared builder tables.
//!
//! A [`TemplateDef`] maps every [`Key`] of a template to the function that
//! builds it. The table is fixed when the template is defined: there is no
//! discovery step, and nothing is built until a [`Template`](super::Template)
//! instance asks for it.
//!
//! # Specialization
//!
//! [`TemplateDef::derive`] copies the whole table under a new name. The copy
//! shares the base's builder functions (they are reference counted), so
//! overriding one key with [`TemplateDef::override_resource`] and friends
//! leaves every other builder exactly as the base declared it.
//!
//! ```rust
//! use brix::template::{Parameter, Resource, TemplateDef};
//!
//! # fn main() -> Result<(), brix::template::BuildError> {
//! let mut base = TemplateDef::new("base");
//! base.parameter("Env", |_| Ok(Parameter::string().with_default("production")))?
//!     .resource("Queue", |_| Ok(Resource::new("AWS::SQS::Queue")))?;
//!
//! let mut derived = base.derive("derived");
//! derived.override_parameter("Env", |_| Ok(Parameter::string().with_default("test")))?;
//! assert_eq!(derived.keys().count(), base.keys().count());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::condition::Condition;
use super::definition::{
    Category, Definition, Mapping, NestedStackLink, Output, Parameter, Resource,
};
use super::error::BuildError;
use super::node::Key;
use super::scope::Scope;

/// Type-erased builder stored in the table.
pub type BuildFn = Arc<dyn Fn(&mut Scope<'_>) -> Result<Definition, BuildError> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) key: Key,
    pub(crate) build: BuildFn,
    pub(crate) target: Option<String>,
}

/// A named template definition: description plus an ordered builder table.
#[derive(Clone)]
pub struct TemplateDef {
    name: String,
    description: Option<String>,
    entries: Vec<Entry>,
    index: HashMap<Key, usize>,
}

impl std::fmt::Debug for TemplateDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateDef")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("keys", &self.entries.iter().map(|e| e.key.to_string()).collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateDef {
    /// Empty definition named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Set the document-level description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the document-level description.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Template name; also the stem of its storage key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Document-level description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Whether `key` has a builder.
    pub fn declares(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Templates embedded by this definition's nested stacks.
    pub fn nested_templates(&self) -> BTreeSet<&str> {
        self.entries.iter().filter_map(|e| e.target.as_deref()).collect()
    }

    pub(crate) fn entry(&self, key: &Key) -> Option<&Entry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    /// Declare a parameter.
    pub fn parameter<F>(&mut self, name: &str, build: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<Parameter, BuildError> + Send + Sync + 'static,
    {
        self.declare(Key::parameter(name), None, erase(build, Definition::Parameter))
    }

    /// Declare a mapping.
    pub fn mapping<F>(&mut self, name: &str, build: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<Mapping, BuildError> + Send + Sync + 'static,
    {
        self.declare(Key::mapping(name), None, erase(build, Definition::Mapping))
    }

    /// Declare a named condition.
    pub fn condition<F>(&mut self, name: &str, build: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<Condition, BuildError> + Send + Sync + 'static,
    {
        self.declare(Key::condition(name), None, erase(build, Definition::Condition))
    }

    /// Declare a plain resource.
    pub fn resource<F>(&mut self, name: &str, build: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<Resource, BuildError> + Send + Sync + 'static,
    {
        self.declare(Key::resource(name), None, erase(build, Definition::Resource))
    }

    /// Declare a nested stack embedding the template named `template`.
    pub fn nested_stack<F>(
        &mut self,
        name: &str,
        template: &str,
        build: F,
    ) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<NestedStackLink, BuildError> + Send + Sync + 'static,
    {
        let build = link_builder(template, build);
        self.declare(Key::stack(name), Some(template.to_string()), build)
    }

    /// Declare an output.
    pub fn output<F>(&mut self, name: &str, build: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<Output, BuildError> + Send + Sync + 'static,
    {
        self.declare(Key::output(name), None, erase(build, Definition::Output))
    }

    /// Copy of this definition under a new name, sharing every builder.
    pub fn derive(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Replace the builder of a declared parameter.
    pub fn override_parameter<F>(&mut self, name: &str, build: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<Parameter, BuildError> + Send + Sync + 'static,
    {
        self.replace(&Key::parameter(name), erase(build, Definition::Parameter))
    }

    /// Replace the builder of a declared resource.
    pub fn override_resource<F>(&mut self, name: &str, build: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<Resource, BuildError> + Send + Sync + 'static,
    {
        self.replace(&Key::resource(name), erase(build, Definition::Resource))
    }

    /// Replace the builder of a declared nested stack, keeping its target.
    pub fn override_stack<F>(&mut self, name: &str, build: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<NestedStackLink, BuildError> + Send + Sync + 'static,
    {
        let key = Key::stack(name);
        let target = self
            .entry(&key)
            .and_then(|e| e.target.clone())
            .ok_or_else(|| self.unknown(&key))?;
        self.replace(&key, link_builder(&target, build))
    }

    /// Replace the builder of a declared output.
    pub fn override_output<F>(&mut self, name: &str, build: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>) -> Result<Output, BuildError> + Send + Sync + 'static,
    {
        self.replace(&Key::output(name), erase(build, Definition::Output))
    }

    /// Wrap a declared resource builder: `extend` receives what the previous
    /// builder produced and returns the replacement.
    pub fn extend_resource<F>(&mut self, name: &str, extend: F) -> Result<&mut Self, BuildError>
    where
        F: Fn(&mut Scope<'_>, Resource) -> Result<Resource, BuildError> + Send + Sync + 'static,
    {
        let key = Key::resource(name);
        let base = self
            .entry(&key)
            .map(|e| Arc::clone(&e.build))
            .ok_or_else(|| self.unknown(&key))?;
        let wrapped_key = key.clone();
        let build: BuildFn = Arc::new(move |scope: &mut Scope<'_>| match base(scope)? {
            Definition::Resource(resource) => extend(scope, resource).map(Definition::Resource),
            other => Err(BuildError::WrongCategory {
                key: wrapped_key.clone(),
                found: other.category().label(),
            }),
        });
        self.replace(&key, build)
    }

    /// Drop a declared key. Returns whether it was present.
    pub fn remove(&mut self, key: &Key) -> bool {
        let Some(position) = self.index.remove(key) else {
            return false;
        };
        self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        true
    }

    fn declare(
        &mut self,
        key: Key,
        target: Option<String>,
        build: BuildFn,
    ) -> Result<&mut Self, BuildError> {
        if self.index.contains_key(&key) {
            return Err(BuildError::DuplicateKey {
                template: self.name.clone(),
                key,
            });
        }
        let namespace = key.category().namespace();
        let collides = self
            .entries
            .iter()
            .any(|e| e.key.name() == key.name() && e.key.category().namespace() == namespace);
        if collides {
            return Err(BuildError::DuplicateLogicalId {
                template: self.name.clone(),
                logical_id: key.name().to_string(),
            });
        }

        self.index.insert(key.clone(), self.entries.len());
        self.entries.push(Entry { key, build, target });
        Ok(self)
    }

    fn replace(&mut self, key: &Key, build: BuildFn) -> Result<&mut Self, BuildError> {
        let position = *self.index.get(key).ok_or_else(|| self.unknown(key))?;
        self.entries[position].build = build;
        Ok(self)
    }

    fn unknown(&self, key: &Key) -> BuildError {
        BuildError::UnknownKey {
            template: self.name.clone(),
            key: key.clone(),
        }
    }
}

fn erase<T, F>(build: F, wrap: fn(T) -> Definition) -> BuildFn
where
    T: 'static,
    F: Fn(&mut Scope<'_>) -> Result<T, BuildError> + Send + Sync + 'static,
{
    Arc::new(move |scope: &mut Scope<'_>| build(scope).map(wrap))
}

fn link_builder<F>(template: &str, build: F) -> BuildFn
where
    F: Fn(&mut Scope<'_>) -> Result<NestedStackLink, BuildError> + Send + Sync + 'static,
{
    let template = template.to_string();
    Arc::new(move |scope: &mut Scope<'_>| {
        build(scope).map(|link| Definition::NestedStack(link.targeting(&template)))
    })
}

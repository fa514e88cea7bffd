//! Built-in template catalogue.
//!
//! The catalogue is an ordered set of [`TemplateDef`]s. Order only matters
//! for listing; rendering always follows the nesting graph.
//!
//! ```text
//! balanced_region
//! ├── balanced_az
//! │   └── balanced_gateway
//! └── balanced_docs
//! balanced_api
//! ```

pub mod apps;
pub mod base;
pub mod components;
pub mod gateway;
pub mod region;
pub mod zone;

use std::collections::HashMap;

use crate::constants::TEMPLATE_NAME_PREFIX;
use crate::render::{render_all, RenderReport, StorageLayout, TemplateGraph};
use crate::template::{BuildError, TemplateDef};

pub use apps::{AppSettings, app_template};
pub use components::ZoneBindings;

/// Ordered, uniquely named set of template definitions.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    templates: Vec<TemplateDef>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in template, with bucket references taken from `layout`.
    pub fn builtin(layout: &StorageLayout) -> Result<Self, BuildError> {
        let mut catalog = Self::new();
        catalog.insert(apps::docs()?)?;
        catalog.insert(gateway::template(layout)?)?;
        catalog.insert(zone::template()?)?;
        catalog.insert(region::template()?)?;
        catalog.insert(apps::api()?)?;
        Ok(catalog)
    }

    /// Add a definition. Names must be unique.
    pub fn insert(&mut self, def: TemplateDef) -> Result<(), BuildError> {
        if self.index.contains_key(def.name()) {
            return Err(BuildError::DuplicateTemplate {
                name: def.name().to_string(),
            });
        }
        self.index.insert(def.name().to_string(), self.templates.len());
        self.templates.push(def);
        Ok(())
    }

    /// Definition named exactly `name`.
    pub fn get(&self, name: &str) -> Option<&TemplateDef> {
        self.index.get(name).map(|&i| &self.templates[i])
    }

    /// Definition named `name` or `balanced_<name>`.
    pub fn resolve(&self, name: &str) -> Option<&TemplateDef> {
        self.get(name).or_else(|| self.get(&format!("{TEMPLATE_NAME_PREFIX}{name}")))
    }

    /// Definitions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TemplateDef> {
        self.templates.iter()
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(TemplateDef::name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Nesting graph of the whole catalogue.
    pub fn graph(&self) -> TemplateGraph {
        TemplateGraph::from_definitions(self.iter())
    }

    /// Render every template, embedded ones first.
    pub fn render(&self, layout: &StorageLayout) -> RenderReport {
        render_all(self.iter(), layout)
    }
}

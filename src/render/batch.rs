//! Rendering a set of templates in nesting order.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::artifact::{ArtifactIndex, RenderedArtifact, StorageLayout};
use super::error::RenderError;
use super::graph::TemplateGraph;
use super::Renderer;
use crate::template::TemplateDef;

/// Outcome of rendering a set of templates.
#[derive(Debug)]
pub struct RenderReport {
    order: Vec<String>,
    artifacts: ArtifactIndex,
    failures: BTreeMap<String, RenderError>,
}

impl RenderReport {
    /// Every artifact that rendered.
    pub fn artifacts(&self) -> &ArtifactIndex {
        &self.artifacts
    }

    /// Take the artifacts, dropping the failures.
    pub fn into_artifacts(self) -> ArtifactIndex {
        self.artifacts
    }

    /// Outcome for template `name`, if it was part of the batch.
    pub fn outcome(&self, name: &str) -> Option<Result<&RenderedArtifact, &RenderError>> {
        if let Some(err) = self.failures.get(name) {
            return Some(Err(err));
        }
        self.artifacts.get(name).map(Ok)
    }

    /// Outcomes in the order the templates were given.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Result<&RenderedArtifact, &RenderError>)> {
        self.order
            .iter()
            .filter_map(|name| self.outcome(name).map(|outcome| (name.as_str(), outcome)))
    }

    /// Failed templates in the order they were given.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &RenderError)> {
        self.entries().filter_map(|(name, outcome)| outcome.err().map(|err| (name, err)))
    }

    /// Whether every template rendered.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Render every definition, embedded templates first.
///
/// A failing template is recorded and the batch carries on; templates that
/// embed it fail with [`RenderError::DependencyFailed`] without being built.
pub fn render_all<'a>(
    defs: impl IntoIterator<Item = &'a TemplateDef>,
    layout: &StorageLayout,
) -> RenderReport {
    let defs: Vec<&TemplateDef> = defs.into_iter().collect();
    let by_name: HashMap<&str, &TemplateDef> = defs.iter().map(|d| (d.name(), *d)).collect();
    let graph = TemplateGraph::from_definitions(defs.iter().copied());
    let cyclic = graph.cyclic_templates();

    let mut artifacts = ArtifactIndex::new();
    let mut failures = BTreeMap::new();

    for name in graph.render_order() {
        let Some(def) = by_name.get(name.as_str()) else {
            continue;
        };

        let result = if let Some(chain) = cyclic.get(&name) {
            Err(RenderError::CyclicTemplates {
                chain: chain.clone(),
            })
        } else if let Some(dependency) =
            def.nested_templates().into_iter().find(|child| failures.contains_key(*child))
        {
            Err(RenderError::DependencyFailed {
                dependency: dependency.to_string(),
            })
        } else {
            Renderer::new(&artifacts, layout).render(def)
        };

        match result.and_then(|artifact| artifacts.insert(artifact)) {
            Ok(()) => debug!(target: "render", "rendered {name}"),
            Err(err) => {
                warn!(target: "render", "{name} failed to render: {err}");
                failures.insert(name, err);
            }
        }
    }

    RenderReport {
        order: defs.iter().map(|d| d.name().to_string()).collect(),
        artifacts,
        failures,
    }
}

//! State shared by every command.

use anyhow::{Context, Result};

use crate::catalog::Catalog;
use crate::config::BrixConfig;
use crate::core::BrixError;
use crate::deploy::{AwsCliProvider, ProviderError, S3CliStore, sync_artifacts};
use crate::render::{RenderReport, RenderedArtifact, StorageLayout};

/// Loaded configuration plus the global flags.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: BrixConfig,
    /// `--region`, if given
    pub region: Option<String>,
    pub quiet: bool,
}

impl CommandContext {
    pub fn new(config: BrixConfig, region: Option<String>, quiet: bool) -> Self {
        Self {
            config,
            region,
            quiet,
        }
    }

    /// The region commands act on.
    pub fn region(&self) -> Result<String, BrixError> {
        self.config.require_region(self.region.as_deref())
    }

    /// Build the catalogue and render all of it.
    pub fn render(&self) -> Result<Rendered> {
        let layout = self.config.layout()?;
        let catalog = Catalog::builtin(&layout).context("Failed to build the template catalogue")?;
        let report = catalog.render(&layout);
        Ok(Rendered {
            layout,
            catalog,
            report,
        })
    }

    pub fn provider(&self) -> Result<AwsCliProvider, BrixError> {
        Ok(AwsCliProvider::new(self.config.aws.clone(), self.region()?))
    }

    /// Upload every artifact of `rendered` to every configured region.
    pub async fn sync(&self, rendered: &Rendered) -> Result<usize, ProviderError> {
        let store = S3CliStore::new(self.config.aws.clone());
        sync_artifacts(&store, rendered.report.artifacts(), &rendered.layout, &self.config.regions)
            .await
    }
}

/// The rendered catalogue.
#[derive(Debug)]
pub struct Rendered {
    pub layout: StorageLayout,
    pub catalog: Catalog,
    pub report: RenderReport,
}

impl Rendered {
    /// Catalogue name for `name`, which may omit the common prefix.
    pub fn resolve(&self, name: &str) -> Result<String, BrixError> {
        self.catalog
            .resolve(name)
            .map(|def| def.name().to_string())
            .ok_or_else(|| BrixError::UnknownTemplate {
                name: name.to_string(),
            })
    }

    /// Artifact of template `name`, or the reason it did not render.
    pub fn artifact(&self, name: &str) -> Result<&RenderedArtifact> {
        let name = self.resolve(name)?;
        match self.report.outcome(&name) {
            Some(Ok(artifact)) => Ok(artifact),
            Some(Err(err)) => Err(anyhow::Error::from(err.clone()))
                .with_context(|| format!("Template '{name}' failed to render")),
            None => Err(BrixError::UnknownTemplate { name }.into()),
        }
    }

    /// Fail unless every template rendered.
    pub fn ensure_valid(&self) -> Result<(), BrixError> {
        if self.report.is_success() {
            return Ok(());
        }
        Err(BrixError::ValidationFailed {
            failed: self.report.failures().count(),
            total: self.catalog.len(),
        })
    }
}

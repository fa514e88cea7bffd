//! brix - composable CloudFormation templates
//!
//! brix describes infrastructure as Rust builder tables, renders them into
//! canonical, content-addressed template documents and reconciles those
//! documents with deployed stacks.
//!
//! # Architecture Overview
//!
//! - A template is a [`template::TemplateDef`]: named builders for
//!   parameters, mappings, conditions, resources, nested stacks and outputs.
//!   Builders ask for each other's nodes lazily; every node is built once per
//!   render and shared by all references to it.
//! - Definitions can be derived and specialized one builder at a time.
//! - [`render`] turns a definition into canonical JSON whose SHA-256 names its
//!   storage key. Nested stacks embed the key of the template they link to,
//!   so templates render bottom-up in nesting order.
//! - [`deploy`] uploads artifacts and creates or updates stacks through a
//!   [`deploy::StackProvider`], lists stacks, aggregates nested stack events
//!   and diffs deployed templates against local renders.
//!
//! # Core Modules
//!
//! - [`template`] - builder tables, nodes, values and conditions
//! - [`render`] - document assembly, canonical form, artifacts, render order
//! - [`catalog`] - the built-in templates
//! - [`deploy`] - provider boundary and reconciliation
//! - [`config`] - `brix.toml`
//! - [`core`] - error types and user-facing reporting
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```rust
//! use brix::catalog::Catalog;
//! use brix::render::StorageLayout;
//!
//! let layout = StorageLayout::default();
//! let catalog = Catalog::builtin(&layout).unwrap();
//! let report = catalog.render(&layout);
//! assert!(report.is_success());
//! let region = report.artifacts().get("balanced_region").unwrap();
//! assert!(region.storage_key().starts_with("templates/balanced_region-"));
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod deploy;
pub mod render;
pub mod template;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

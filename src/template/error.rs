//! Failures raised while building a template's nodes.

use thiserror::Error;

use super::node::Key;

/// Error raised by the builder registry or by a builder itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A builder asked, directly or indirectly, for its own key
    #[error("Cyclic reference while building {key}: {chain}")]
    CyclicReference {
        /// Key that was requested while under construction
        key: Key,
        /// Keys under construction, outermost first
        chain: String,
    },

    /// No builder is declared for the key
    #[error("Template '{template}' has no builder for {key}")]
    UnknownKey {
        /// Template being built
        template: String,
        /// Missing key
        key: Key,
    },

    /// The same key was declared twice
    #[error("Template '{template}' already declares {key}")]
    DuplicateKey {
        /// Template being defined
        template: String,
        /// Duplicated key
        key: Key,
    },

    /// Two nodes would render under one logical id
    #[error("Logical id '{logical_id}' is used twice in template '{template}'")]
    DuplicateLogicalId {
        /// Template being defined or built
        template: String,
        /// Colliding id
        logical_id: String,
    },

    /// Two templates share a name
    #[error("Template '{name}' is defined twice")]
    DuplicateTemplate {
        /// Shared name
        name: String,
    },

    /// A setting the template cannot be built without was never supplied
    #[error("Template '{template}' requires '{setting}' to be set")]
    MissingConfiguration {
        /// Template being built
        template: String,
        /// Name of the missing setting
        setting: String,
    },

    /// A builder returned a definition of the wrong shape
    #[error("Builder for {key} returned a {found} definition")]
    WrongCategory {
        /// Key being built
        key: Key,
        /// Label of the category actually returned
        found: &'static str,
    },
}

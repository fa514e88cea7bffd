//! Error types and user-facing error reporting shared by every command.

pub mod error;

pub use error::{BrixError, ErrorContext, user_friendly_error};

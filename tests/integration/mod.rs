//! Integration test suite for brix
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **render**: the built-in catalogue rendered end to end
//! - **deploy**: reconciliation against a scripted provider
//! - **cli**: the `brix` binary's output and exit codes

mod cli;
mod deploy;
mod render;

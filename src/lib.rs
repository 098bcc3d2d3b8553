//! wa-cli: branch-scoped sandboxes for conversational assistant skills.
//!
//! The library holds everything the `wa-cli` binary does: the skill cache,
//! name resolution, the sandbox lifecycle and the readonly guard in
//! [`core`], the REST client in [`service`], and the git, toolkit and
//! testing tool integrations around them.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod project;
pub mod service;
pub mod test_utils;
pub mod testing;
pub mod vcs;
pub mod workbench;

pub use error::{Result, WaError};

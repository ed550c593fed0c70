//! Workspace operations: installation and offline validation.

pub mod install;
pub mod validate;

//! Caravel - a package manager and build orchestrator for multi-repository
//! native workspaces.
//!
//! This crate provides the core library functionality for Caravel: multi-source
//! package resolution, build-order computation, and offline dependency
//! validation.

pub mod core;
pub mod graph;
pub mod ops;
pub mod sources;
pub mod util;

pub use crate::core::{
    constraint::{ConstraintSet, DependencySpec},
    manifest::PackageManifest,
    package::{Origin, ResolvedPackage},
    variant::{BuildConfig, Variant},
    workspace::Workspace,
};

pub use crate::graph::BuildGraph;
pub use crate::ops::install::ResolverSession;
pub use crate::util::config::WorkspaceConfig;

//! Core data model: manifests, version constraints, variants, and the
//! workspace layout.

pub mod constraint;
pub mod manifest;
pub mod package;
pub mod variant;
pub mod workspace;

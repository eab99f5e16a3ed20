//! Data models for the application
//!
//! Organized by domain: intake (uploaded files and their types), publishing (targets,
//! outcomes, tiers) and the asset-host folder snapshot.

mod folder;
mod publish;
mod upload;

pub use folder::*;
pub use publish::*;
pub use upload::*;

// ABOUTME: Core domain types for skiff deployments.
// ABOUTME: Validated types for targets and artifact collections.

mod artifact;
mod target;

pub use artifact::{ArtifactCollection, ArtifactEntry, ArtifactError};
pub use target::{DeploymentTarget, TargetError};

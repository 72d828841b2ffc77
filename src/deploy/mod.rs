// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports state types, the Deployment struct, and the run driver.

mod deployment;
mod error;
mod report;
mod run;
mod state;
mod transitions;

pub use deployment::Deployment;
pub use error::{DeployError, DeployErrorKind};
pub use report::{DeployOutcome, DeployReport};
pub use run::run;
pub use state::{CredentialResolved, Idle, SessionOpen};

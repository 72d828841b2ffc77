// ABOUTME: SSH session module for remote deployment targets.
// ABOUTME: Session establishment with a single configured auth method.

mod client;
mod error;

pub use client::{HostVerification, Session, SessionConfig};
pub use error::{Error, Result};

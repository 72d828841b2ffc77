// ABOUTME: Deployment state types for the type state pattern.
// ABOUTME: States carry their own data to enforce valid transitions.

use crate::credential::Credential;
use crate::ssh::Session;

/// Initial state: configuration accepted, nothing resolved yet.
/// Available actions: `resolve_credential()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Idle;

/// Credential resolved: key material loaded, auth method fixed.
/// Available actions: `open_session()`
#[derive(Debug)]
pub struct CredentialResolved {
    pub(crate) credential: Credential,
}

/// Session open: authenticated connection held exclusively.
/// Available actions: `transfer()`
#[derive(Debug)]
pub struct SessionOpen {
    pub(crate) session: Session,
}

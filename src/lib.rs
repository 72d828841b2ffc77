// ABOUTME: Library root for skiff - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod credential;
pub mod deploy;
pub mod error;
pub mod output;
pub mod ssh;
pub mod transfer;
pub mod types;

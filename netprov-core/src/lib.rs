//! Core library for the hotspot-based network provisioner.
//! This crate owns the provisioning session: the temporary access point,
//! the single-flight Wi-Fi connection state machine, and the wired-link
//! watchdog. OS integration lives behind the capability traits in
//! [`traits`], with one implementation per platform under [`backends`].

pub mod backends;
pub mod config;
pub mod hotspot;
pub mod identity;
pub mod orchestrator;
pub mod probe;
pub mod profile_store;
pub mod service;
pub mod session;
pub mod traits;
pub mod watchdog;
pub mod web_server;

#[cfg(test)]
pub(crate) mod test_support;

// Define a shared Error and Result type for the entire crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// No adapter reported a usable hardware address during first-run provisioning.
    #[error("no network adapter hardware address could be determined")]
    NoAddressFound,

    #[error("Invalid hardware address: {0}")]
    InvalidAddress(String),

    #[error("Hotspot error: {0}")]
    Hotspot(String),

    #[error("Profile registration failed: {0}")]
    Registration(String),

    #[error("Failed to persist hotspot identity: {0}")]
    Persist(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;

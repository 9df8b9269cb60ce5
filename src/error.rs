use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the mirror an account plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Source,
    Destination,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRole::Source => f.pad("source"),
            AccountRole::Destination => f.pad("destination"),
        }
    }
}

/// Failures the sync engine knows how to classify.
///
/// Only `Authentication` ever escapes a run. Everything else is absorbed by the
/// component that hit it and ends up as a log record or a failure record.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to fetch {resource} page at offset {offset}: {reason}")]
    TransientPage {
        resource: String,
        offset: u32,
        reason: String,
    },
    #[error("{operation} failed (attempt {attempt}/{max_attempts}): {reason}")]
    TransientWrite {
        operation: String,
        attempt: usize,
        max_attempts: usize,
        reason: String,
    },
    #[error("{operation} failed for {} item(s) after {attempts} attempt(s): {reason}", .item_ids.len())]
    DefinitiveWriteFailure {
        operation: String,
        item_ids: Vec<String>,
        attempts: usize,
        reason: String,
    },
    #[error("Invalid configuration at {path}: {reason}")]
    Configuration { path: String, reason: String },
    #[error("Could not authenticate the {role} account: {reason}")]
    Authentication { role: AccountRole, reason: String },
}

impl SyncError {
    /// Short machine-friendly name, used as the `kind` of persisted error records.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::TransientPage { .. } => "transient_page",
            SyncError::TransientWrite { .. } => "transient_write",
            SyncError::DefinitiveWriteFailure { .. } => "definitive_write_failure",
            SyncError::Configuration { .. } => "configuration",
            SyncError::Authentication { .. } => "authentication",
        }
    }
}

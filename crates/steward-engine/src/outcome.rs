//! Per-item results shared by single and bulk operations

use serde::{Deserialize, Serialize};
use std::fmt;

use steward_core::{ErrorKind, StewardError};

use crate::copy::CopyOutcome;
use crate::grant::{GrantOutcome, RevokeOutcome};

/// Revoke found nothing matching to remove
pub const NOTHING_TO_REVOKE: &str = "nothing to revoke";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Grant,
    Revoke,
    Copy,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grant => f.write_str("grant"),
            Self::Revoke => f.write_str("revoke"),
            Self::Copy => f.write_str("copy"),
        }
    }
}

/// What a successful operation changed on one content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    Granted(GrantOutcome),
    Revoked(RevokeOutcome),
    Copied(CopyOutcome),
}

/// Stage an item had reached when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPhase {
    Validating,
    Applying,
}

impl fmt::Display for ItemPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => f.write_str("validating"),
            Self::Applying => f.write_str("applying"),
        }
    }
}

/// An error raised after part of an operation already reached the repository
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct Interrupted {
    pub error: StewardError,
    /// Changes sent before the error; `None` when the item is untouched
    pub partial: Option<Change>,
}

impl Interrupted {
    pub fn after(error: StewardError, partial: Change) -> Self {
        Self {
            error,
            partial: Some(partial),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<StewardError> for Interrupted {
    fn from(error: StewardError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

/// A failure captured as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub reason: ErrorKind,
    pub detail: String,
    pub phase: ItemPhase,
    /// What the item had already changed when it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<Change>,
}

impl Failure {
    pub fn new(error: &StewardError, phase: ItemPhase) -> Self {
        Self {
            reason: error.kind(),
            detail: error.to_string(),
            phase,
            partial: None,
        }
    }
}

/// Final state of one operation on one content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded { change: Change },
    Skipped { reason: String },
    Failed(Failure),
}

impl Outcome {
    pub fn failed(error: &StewardError, phase: ItemPhase) -> Self {
        Self::Failed(Failure::new(error, phase))
    }

    /// Failure while applying, keeping whatever was already sent
    pub fn interrupted(interrupted: Interrupted) -> Self {
        Self::Failed(Failure {
            partial: interrupted.partial,
            ..Failure::new(&interrupted.error, ItemPhase::Applying)
        })
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn granted(outcome: GrantOutcome) -> Self {
        Self::Succeeded {
            change: Change::Granted(outcome),
        }
    }

    /// Revokes that removed nothing are skips
    pub fn revoked(outcome: RevokeOutcome) -> Self {
        if outcome.is_noop() {
            Self::skipped(NOTHING_TO_REVOKE)
        } else {
            Self::Succeeded {
                change: Change::Revoked(outcome),
            }
        }
    }

    /// Copies that changed nothing are skips
    pub fn copied(outcome: CopyOutcome) -> Self {
        match outcome.skip_reason() {
            Some(reason) => Self::skipped(reason),
            None => Self::Succeeded {
                change: Change::Copied(outcome),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

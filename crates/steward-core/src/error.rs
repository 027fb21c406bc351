//! Error types for the Steward permission engine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::{Capability, ContentType, GranteeType};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StewardError {
    #[error("Content not found: {content_type} with id {id}")]
    ContentNotFound { content_type: ContentType, id: String },

    #[error("Grantee rejected: {grantee_type} with id {id}: {message}")]
    GranteeInvalid {
        grantee_type: GranteeType,
        id: String,
        message: String,
    },

    #[error("Nothing to copy: {content_type} {id} has no grants")]
    NothingToCopy { content_type: ContentType, id: String },

    #[error("No compatible capabilities between {source_type} and {target_type}")]
    NoCompatibleCapabilities {
        source_type: ContentType,
        target_type: ContentType,
    },

    #[error("Capabilities not applicable to {content_type}: {}", join_capabilities(.capabilities))]
    CapabilityNotApplicable {
        content_type: ContentType,
        capabilities: Vec<Capability>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Repository error: {message}")]
    Repository { message: String },
}

fn join_capabilities(capabilities: &[Capability]) -> String {
    capabilities
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl StewardError {
    pub fn content_not_found(content_type: ContentType, id: impl Into<String>) -> Self {
        Self::ContentNotFound {
            content_type,
            id: id.into(),
        }
    }

    pub fn grantee_invalid(
        grantee_type: GranteeType,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::GranteeInvalid {
            grantee_type,
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn nothing_to_copy(content_type: ContentType, id: impl Into<String>) -> Self {
        Self::NothingToCopy {
            content_type,
            id: id.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    /// Stable code used when the error is reported as data
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContentNotFound { .. } => ErrorKind::ContentNotFound,
            Self::GranteeInvalid { .. } => ErrorKind::GranteeInvalid,
            Self::NothingToCopy { .. } => ErrorKind::NothingToCopy,
            Self::NoCompatibleCapabilities { .. } => ErrorKind::NoCompatibleCapabilities,
            Self::CapabilityNotApplicable { .. } => ErrorKind::CapabilityNotApplicable,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Repository { .. } => ErrorKind::RepositoryError,
        }
    }
}

/// Error category as it appears in operation results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ContentNotFound,
    GranteeInvalid,
    NothingToCopy,
    NoCompatibleCapabilities,
    CapabilityNotApplicable,
    InvalidInput,
    RepositoryError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentNotFound => "ContentNotFound",
            Self::GranteeInvalid => "GranteeInvalid",
            Self::NothingToCopy => "NothingToCopy",
            Self::NoCompatibleCapabilities => "NoCompatibleCapabilities",
            Self::CapabilityNotApplicable => "CapabilityNotApplicable",
            Self::InvalidInput => "InvalidInput",
            Self::RepositoryError => "RepositoryError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, StewardError>;

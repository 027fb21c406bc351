//! JSON snapshots of one site's content and grantees

use serde::{Deserialize, Serialize};

use steward_core::{ContentRef, Grant, Grantee, Result, SiteId, StewardError};

/// Everything the in-memory repository holds for one site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub site_id: SiteId,
    #[serde(default)]
    pub grantees: Vec<Grantee>,
    #[serde(default)]
    pub contents: Vec<ContentSnapshot>,
}

/// A content item with the grants it carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    #[serde(flatten)]
    pub content: ContentRef,
    #[serde(default)]
    pub grants: Vec<Grant>,
}

impl RepositorySnapshot {
    pub fn empty(site_id: SiteId) -> Self {
        Self {
            site_id,
            grantees: Vec::new(),
            contents: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StewardError::invalid_input(format!("invalid snapshot: {e}")))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StewardError::repository(format!("failed to encode snapshot: {e}")))
    }
}

//! Request files
//!
//! A request file holds one JSON document describing a single operation or
//! a batch, tagged by `request`:
//!
//! ```json
//! {"request": "copy", "source": {"content_type": "workbook", "id": "wb-1"},
//!  "target": {"content_type": "datasource", "id": "ds-2"}, "mode": "replace"}
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use steward_core::{ContentRef, ContentRepository, CopyMode, GranteeRef, RequestContext};
use steward_engine::{
    BulkReport, BulkRequest, CapabilitySpec, OperationResult, PermissionEngine, RevokeScope,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum Request {
    Grant {
        content: ContentRef,
        grantee: GranteeRef,
        capabilities: CapabilitySpec,
    },
    Revoke {
        content: ContentRef,
        grantee: GranteeRef,
        scope: RevokeScope,
    },
    Copy {
        source: ContentRef,
        target: ContentRef,
        mode: CopyMode,
    },
    Bulk(BulkRequest),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Single(OperationResult),
    Bulk(BulkReport),
}

impl Response {
    /// True when anything in the response failed
    pub fn has_failures(&self) -> bool {
        match self {
            Self::Single(result) => result.outcome.is_failure(),
            Self::Bulk(report) => report.summary.failed > 0,
        }
    }
}

impl Request {
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid request document")
    }

    pub async fn execute<R: ContentRepository>(
        &self,
        engine: &PermissionEngine<R>,
        ctx: &RequestContext,
    ) -> Response {
        match self {
            Self::Grant {
                content,
                grantee,
                capabilities,
            } => Response::Single(engine.grant(ctx, content, grantee, capabilities).await),
            Self::Revoke {
                content,
                grantee,
                scope,
            } => Response::Single(engine.revoke(ctx, content, grantee, scope).await),
            Self::Copy {
                source,
                target,
                mode,
            } => Response::Single(engine.copy(ctx, source, target, *mode).await),
            Self::Bulk(request) => Response::Bulk(engine.bulk(ctx, request).await),
        }
    }
}

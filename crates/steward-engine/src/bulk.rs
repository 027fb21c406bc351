//! Bulk execution of one operation over many content items
//!
//! Items run strictly in input order, one at a time. Each item moves through
//! `Pending -> Validating -> Applying -> Succeeded`, or ends early as `Failed`
//! or `Skipped`. A failing item is recorded and the loop moves on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use steward_core::{
    CapabilitySet, ContentRef, ContentRepository, ContentType, CopyMode, ErrorKind, Grantee,
    GranteeRef, OperationId, RequestContext, Result,
};

use crate::copy::{filter_for_target, PermissionCopyEngine, SourceGrants, SAME_ITEM};
use crate::grant::{CapabilitySpec, PermissionGrantService, RevokeScope};
use crate::outcome::{Change, ItemPhase, OperationKind, Outcome};
use crate::resolver::GranteeResolver;
use crate::validation::validate_grantee;

// =============================================================================
// Requests
// =============================================================================

/// The operation a batch applies to every item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BulkOperation {
    Grant {
        grantee: GranteeRef,
        capabilities: CapabilitySpec,
    },
    Revoke {
        grantee: GranteeRef,
        scope: RevokeScope,
    },
    Copy {
        source: ContentRef,
        mode: CopyMode,
    },
}

impl BulkOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Grant { .. } => OperationKind::Grant,
            Self::Revoke { .. } => OperationKind::Revoke,
            Self::Copy { .. } => OperationKind::Copy,
        }
    }
}

/// One operation over a list of content items of one type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub content_type: ContentType,
    pub content_ids: Vec<String>,
    pub operation: BulkOperation,
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SucceededItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub id: String,
    pub reason: ErrorKind,
    pub detail: String,
    pub phase: ItemPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<Change>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub id: String,
    pub reason: String,
}

/// Per-item accounting of one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResult {
    pub operation_id: OperationId,
    pub operation: OperationKind,
    pub content_type: ContentType,
    pub successful: Vec<SucceededItem>,
    pub failed: Vec<FailedItem>,
    pub skipped: Vec<SkippedItem>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl BulkResult {
    pub(crate) fn new(operation: OperationKind, content_type: ContentType) -> Self {
        let now = Utc::now();
        Self {
            operation_id: OperationId::new(),
            operation,
            content_type,
            successful: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            started_at: now,
            completed_at: now,
            duration_ms: 0,
        }
    }

    /// Items accounted for so far
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len() + self.skipped.len()
    }

    pub(crate) fn record(&mut self, id: &str, name: String, outcome: Outcome) {
        match outcome {
            Outcome::Succeeded { change } => self.successful.push(SucceededItem {
                id: id.to_string(),
                name,
                change,
            }),
            Outcome::Skipped { reason } => self.skipped.push(SkippedItem {
                id: id.to_string(),
                reason,
            }),
            Outcome::Failed(failure) => self.failed.push(FailedItem {
                id: id.to_string(),
                reason: failure.reason,
                detail: failure.detail,
                phase: failure.phase,
                partial: failure.partial,
            }),
        }
    }

    pub(crate) fn finish(&mut self) {
        self.completed_at = Utc::now();
        self.duration_ms = (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Batch-wide inputs resolved once before the loop
enum Prepared {
    Grant {
        grantee: Grantee,
        capabilities: CapabilitySet,
    },
    Revoke {
        grantee: Grantee,
        scope: RevokeScope,
    },
    Copy {
        source: SourceGrants,
        mode: CopyMode,
    },
}

/// Runs one operation over a list of content ids
pub struct BulkOperationExecutor<R: ContentRepository> {
    grants: Arc<PermissionGrantService<R>>,
    copies: Arc<PermissionCopyEngine<R>>,
    resolver: Arc<GranteeResolver<R>>,
}

impl<R: ContentRepository> BulkOperationExecutor<R> {
    pub fn new(
        grants: Arc<PermissionGrantService<R>>,
        copies: Arc<PermissionCopyEngine<R>>,
        resolver: Arc<GranteeResolver<R>>,
    ) -> Self {
        Self {
            grants,
            copies,
            resolver,
        }
    }

    /// Run a batch to completion; always returns a full per-item accounting
    #[instrument(skip_all, fields(
        site = %ctx.site_id,
        operation = %request.operation.kind(),
        content_type = %request.content_type,
        items = request.content_ids.len()
    ))]
    pub async fn execute(&self, ctx: &RequestContext, request: &BulkRequest) -> BulkResult {
        let mut result = BulkResult::new(request.operation.kind(), request.content_type);
        info!(
            operation_id = %result.operation_id,
            "Starting bulk {} over {} items",
            result.operation,
            request.content_ids.len()
        );

        let prepared = self.prepare(ctx, request).await;
        if let Err(e) = &prepared {
            warn!(error = %e, "Bulk preparation failed, every item will fail");
        }

        for id in &request.content_ids {
            let (name, outcome) = match &prepared {
                Ok(prepared) => self.run_item(ctx, request.content_type, id, prepared).await,
                Err(e) => (String::new(), Outcome::failed(e, ItemPhase::Validating)),
            };
            debug!(item = %id, outcome = outcome_label(&outcome), "Item finished");
            result.record(id, name, outcome);
        }

        result.finish();
        info!(
            operation_id = %result.operation_id,
            succeeded = result.successful.len(),
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            duration_ms = result.duration_ms,
            "Bulk {} completed",
            result.operation
        );
        result
    }

    async fn prepare(&self, ctx: &RequestContext, request: &BulkRequest) -> Result<Prepared> {
        match &request.operation {
            BulkOperation::Grant {
                grantee,
                capabilities,
            } => {
                validate_grantee(grantee)?;
                let capabilities = capabilities.resolve_for(request.content_type)?;
                let grantee = self.resolver.resolve(ctx, grantee).await;
                Ok(Prepared::Grant {
                    grantee,
                    capabilities,
                })
            }
            BulkOperation::Revoke { grantee, scope } => {
                validate_grantee(grantee)?;
                scope.check()?;
                let grantee = self.resolver.resolve(ctx, grantee).await;
                Ok(Prepared::Revoke {
                    grantee,
                    scope: scope.clone(),
                })
            }
            BulkOperation::Copy { source, mode } => {
                let source = self.copies.load_source(ctx, source).await?;
                Ok(Prepared::Copy {
                    source,
                    mode: *mode,
                })
            }
        }
    }

    /// Drive one item through validation and application
    async fn run_item(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
        prepared: &Prepared,
    ) -> (String, Outcome) {
        let requested = ContentRef::unnamed(content_type, id);
        debug!(item = %id, state = "validating");

        if let Prepared::Copy { source, .. } = prepared {
            if source.source.same_item(&requested) {
                return (source.source.name.clone(), Outcome::skipped(SAME_ITEM));
            }
        }

        let content = match self.grants.verify_content(ctx, &requested).await {
            Ok(content) => content,
            Err(e) => return (String::new(), Outcome::failed(&e, ItemPhase::Validating)),
        };
        let name = content.name.clone();

        let outcome = match prepared {
            Prepared::Grant {
                grantee,
                capabilities,
            } => {
                debug!(item = %id, state = "applying");
                match self
                    .grants
                    .apply_verified(ctx, &content, grantee, capabilities)
                    .await
                {
                    Ok(outcome) => Outcome::granted(outcome),
                    Err(e) => Outcome::interrupted(e),
                }
            }
            Prepared::Revoke { grantee, scope } => {
                debug!(item = %id, state = "applying");
                match self
                    .grants
                    .revoke_verified(ctx, &content, grantee, scope)
                    .await
                {
                    Ok(outcome) => Outcome::revoked(outcome),
                    Err(e) => Outcome::failed(&e, ItemPhase::Applying),
                }
            }
            Prepared::Copy { source, mode } => {
                let filtered = match filter_for_target(source, content.content_type) {
                    Ok(filtered) => filtered,
                    Err(e) => return (name, Outcome::failed(&e, ItemPhase::Validating)),
                };
                debug!(item = %id, state = "applying");
                match self
                    .copies
                    .copy_verified(ctx, source, &content, filtered, *mode)
                    .await
                {
                    Ok(outcome) => Outcome::copied(outcome),
                    Err(e) => Outcome::interrupted(e),
                }
            }
        };

        (name, outcome)
    }
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Succeeded { .. } => "succeeded",
        Outcome::Skipped { .. } => "skipped",
        Outcome::Failed(_) => "failed",
    }
}

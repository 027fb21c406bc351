//! Engine facade
//!
//! Wires the services over one repository and turns every error into a
//! result value, so callers always get the reason back.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use steward_core::{ContentRef, ContentRepository, CopyMode, GranteeRef, RequestContext, StewardError};

use crate::bulk::{BulkOperationExecutor, BulkRequest, BulkResult};
use crate::config::EngineConfig;
use crate::copy::{filter_for_target, PermissionCopyEngine, SAME_ITEM};
use crate::grant::{CapabilitySpec, PermissionGrantService, RevokeScope};
use crate::outcome::{ItemPhase, OperationKind, Outcome};
use crate::report::{BulkSummary, ResultAggregator};
use crate::resolver::GranteeResolver;

/// Result of a single-item operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation: OperationKind,
    pub content: ContentRef,
    pub outcome: Outcome,
}

/// Result of a bulk operation with its summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkReport {
    pub result: BulkResult,
    pub summary: BulkSummary,
}

/// Grant, revoke, copy and bulk over one content repository
pub struct PermissionEngine<R: ContentRepository> {
    grants: Arc<PermissionGrantService<R>>,
    copies: Arc<PermissionCopyEngine<R>>,
    executor: BulkOperationExecutor<R>,
    aggregator: ResultAggregator,
}

impl<R: ContentRepository> PermissionEngine<R> {
    pub fn new(repo: Arc<R>, config: &EngineConfig) -> Self {
        let resolver = Arc::new(GranteeResolver::with_config(repo.clone(), &config.resolver));
        let grants = Arc::new(PermissionGrantService::new(repo.clone(), resolver.clone()));
        let copies = Arc::new(PermissionCopyEngine::new(repo, config.additive_conflicts));
        let executor = BulkOperationExecutor::new(grants.clone(), copies.clone(), resolver);

        Self {
            grants,
            copies,
            executor,
            aggregator: ResultAggregator::new(config.impact),
        }
    }

    #[instrument(skip_all, fields(site = %ctx.site_id, content = %content, grantee = %grantee))]
    pub async fn grant(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &GranteeRef,
        capabilities: &CapabilitySpec,
    ) -> OperationResult {
        let outcome = match self
            .grants
            .prepare_grant(ctx, content, grantee, capabilities)
            .await
        {
            Err(e) => Outcome::failed(&e, ItemPhase::Validating),
            Ok(prepared) => match self
                .grants
                .apply_verified(ctx, &prepared.content, &prepared.grantee, &prepared.capabilities)
                .await
            {
                Ok(outcome) => Outcome::granted(outcome),
                Err(e) => Outcome::interrupted(e),
            },
        };
        finish(OperationKind::Grant, content, outcome)
    }

    #[instrument(skip_all, fields(site = %ctx.site_id, content = %content, grantee = %grantee))]
    pub async fn revoke(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &GranteeRef,
        scope: &RevokeScope,
    ) -> OperationResult {
        let outcome = match self.grants.prepare_revoke(ctx, content, grantee, scope).await {
            Err(e) => Outcome::failed(&e, ItemPhase::Validating),
            Ok((verified, resolved)) => match self
                .grants
                .revoke_verified(ctx, &verified, &resolved, scope)
                .await
            {
                Ok(outcome) => Outcome::revoked(outcome),
                Err(e) => Outcome::failed(&e, ItemPhase::Applying),
            },
        };
        finish(OperationKind::Revoke, content, outcome)
    }

    #[instrument(skip_all, fields(site = %ctx.site_id, source = %source, target = %target, mode = %mode))]
    pub async fn copy(
        &self,
        ctx: &RequestContext,
        source: &ContentRef,
        target: &ContentRef,
        mode: CopyMode,
    ) -> OperationResult {
        if source.same_item(target) {
            info!("Copy onto itself skipped");
            return finish(OperationKind::Copy, target, Outcome::skipped(SAME_ITEM));
        }

        let staged = async {
            let source = self.copies.load_source(ctx, source).await?;
            let target = self.copies.verify_target(ctx, target).await?;
            let filtered = filter_for_target(&source, target.content_type)?;
            Ok::<_, StewardError>((source, target, filtered))
        };

        let outcome = match staged.await {
            Err(e) => Outcome::failed(&e, ItemPhase::Validating),
            Ok((source, verified, filtered)) => match self
                .copies
                .copy_verified(ctx, &source, &verified, filtered, mode)
                .await
            {
                Ok(outcome) => Outcome::copied(outcome),
                Err(e) => Outcome::interrupted(e),
            },
        };
        finish(OperationKind::Copy, target, outcome)
    }

    pub async fn bulk(&self, ctx: &RequestContext, request: &BulkRequest) -> BulkReport {
        let result = self.executor.execute(ctx, request).await;
        let summary = self.aggregator.summarize(&result);
        BulkReport { result, summary }
    }
}

fn finish(operation: OperationKind, content: &ContentRef, outcome: Outcome) -> OperationResult {
    if let Outcome::Failed(failure) = &outcome {
        warn!(
            reason = %failure.reason,
            phase = %failure.phase,
            detail = %failure.detail,
            partial = failure.partial.is_some(),
            "{} on {} failed",
            operation,
            content
        );
    }
    OperationResult {
        operation,
        content: content.clone(),
        outcome,
    }
}

//! Permission copy between content items
//!
//! A copy runs in three steps:
//! 1. load the source grants (`NothingToCopy` when there are none)
//! 2. keep only capabilities transferable to the target type
//!    (`NoCompatibleCapabilities` when no grantee keeps anything)
//! 3. plan against the target's current grants under the copy mode, then send the plan
//!
//! Planning is pure; only `load_source` and `copy_verified` touch the repository.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use steward_core::{
    CapabilityModel, CapabilitySet, ContentRef, ContentRepository, ContentType, CopyMode, Grant,
    Grantee, RequestContext, Result, StewardError,
};

use crate::config::AdditiveConflictPolicy;
use crate::outcome::{Change, Interrupted};
use crate::validation::validate_content_id;

/// Merge found every filtered capability already on the target
pub const ALREADY_PRESENT: &str = "already present";
/// Additive copy withheld entries held on the target in the opposite mode
pub const MODE_CONFLICT: &str = "mode conflict";
/// Source and target name the same content item
pub const SAME_ITEM: &str = "source and target are the same";

// =============================================================================
// Types
// =============================================================================

/// Source grants fetched once and reused for every target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGrants {
    pub source: ContentRef,
    pub grants: Vec<Grant>,
}

/// A grantee the copy did not send anything for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedGrantee {
    pub grantee: Grantee,
    pub reason: String,
    /// Entries withheld, when only part of the grant was skipped
    #[serde(default, skip_serializing_if = "CapabilitySet::is_empty")]
    pub capabilities: CapabilitySet,
}

/// What a copy will do to one target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPlan {
    /// Grantees to remove from the target before applying
    pub clear: Vec<Grantee>,
    /// Entries to send, per grantee
    pub apply: Vec<Grant>,
    pub skipped: Vec<SkippedGrantee>,
}

/// What a copy did to one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOutcome {
    pub source: ContentRef,
    pub target: ContentRef,
    pub mode: CopyMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<Grantee>,
    pub applied: Vec<Grant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedGrantee>,
}

impl CopyOutcome {
    /// True when the target was left exactly as it was
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.removed.is_empty()
    }

    /// Reason to report when the copy changed nothing
    pub fn skip_reason(&self) -> Option<String> {
        if !self.is_noop() {
            return None;
        }
        let mut reasons: Vec<&str> = Vec::new();
        for skipped in &self.skipped {
            if !reasons.contains(&skipped.reason.as_str()) {
                reasons.push(&skipped.reason);
            }
        }
        if reasons.is_empty() {
            Some("nothing to apply".to_string())
        } else {
            Some(reasons.join(", "))
        }
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Source grants narrowed to what `target_type` accepts, in source order
pub fn filter_for_target(source: &SourceGrants, target_type: ContentType) -> Result<Vec<Grant>> {
    let source_type = source.source.content_type;
    let filtered: Vec<Grant> = source
        .grants
        .iter()
        .filter_map(|grant| {
            let capabilities = grant
                .capabilities
                .filtered(|c, _| CapabilityModel::is_compatible(c, source_type, target_type));
            (!capabilities.is_empty()).then(|| Grant::new(grant.grantee.clone(), capabilities))
        })
        .collect();

    if filtered.is_empty() {
        return Err(StewardError::NoCompatibleCapabilities {
            source_type,
            target_type,
        });
    }
    Ok(filtered)
}

/// Plan a copy of `filtered` onto a target currently holding `target_grants`
pub fn plan(
    mode: CopyMode,
    policy: AdditiveConflictPolicy,
    filtered: Vec<Grant>,
    target_grants: &[Grant],
) -> CopyPlan {
    match mode {
        CopyMode::Replace => CopyPlan {
            clear: target_grants.iter().map(|g| g.grantee.clone()).collect(),
            apply: filtered,
            skipped: Vec::new(),
        },
        CopyMode::Merge => {
            let mut plan = CopyPlan::default();
            for grant in filtered {
                let missing = match held(target_grants, &grant.grantee) {
                    Some(existing) => grant.capabilities.without_capabilities_of(existing),
                    None => grant.capabilities,
                };
                if missing.is_empty() {
                    plan.skipped.push(SkippedGrantee {
                        grantee: grant.grantee,
                        reason: ALREADY_PRESENT.to_string(),
                        capabilities: CapabilitySet::new(),
                    });
                } else {
                    plan.apply.push(Grant::new(grant.grantee, missing));
                }
            }
            plan
        }
        CopyMode::Additive => match policy {
            AdditiveConflictPolicy::Send => CopyPlan {
                apply: filtered,
                ..CopyPlan::default()
            },
            AdditiveConflictPolicy::SkipConflicting => {
                let mut plan = CopyPlan::default();
                for grant in filtered {
                    let (conflicting, sendable) = match held(target_grants, &grant.grantee) {
                        Some(existing) => (
                            grant
                                .capabilities
                                .filtered(|c, mode| existing.contains_entry(c, mode.opposite())),
                            grant
                                .capabilities
                                .filtered(|c, mode| !existing.contains_entry(c, mode.opposite())),
                        ),
                        None => (CapabilitySet::new(), grant.capabilities),
                    };
                    if !conflicting.is_empty() {
                        plan.skipped.push(SkippedGrantee {
                            grantee: grant.grantee.clone(),
                            reason: MODE_CONFLICT.to_string(),
                            capabilities: conflicting,
                        });
                    }
                    if !sendable.is_empty() {
                        plan.apply.push(Grant::new(grant.grantee, sendable));
                    }
                }
                plan
            }
        },
    }
}

fn held<'a>(target_grants: &'a [Grant], grantee: &Grantee) -> Option<&'a CapabilitySet> {
    target_grants
        .iter()
        .find(|g| g.grantee == *grantee)
        .map(|g| &g.capabilities)
}

// =============================================================================
// Copy Engine
// =============================================================================

/// Copies grants from one content item onto others
pub struct PermissionCopyEngine<R: ContentRepository> {
    repo: Arc<R>,
    policy: AdditiveConflictPolicy,
}

impl<R: ContentRepository> PermissionCopyEngine<R> {
    pub fn new(repo: Arc<R>, policy: AdditiveConflictPolicy) -> Self {
        Self { repo, policy }
    }

    /// Fetch the source item and its grants
    #[instrument(skip_all, fields(site = %ctx.site_id, source = %source))]
    pub async fn load_source(&self, ctx: &RequestContext, source: &ContentRef) -> Result<SourceGrants> {
        validate_content_id(&source.id)?;
        let source = self
            .repo
            .get_content(ctx, source.content_type, &source.id)
            .await?;
        let grants = self
            .repo
            .get_grants(ctx, source.content_type, &source.id)
            .await?;

        if grants.is_empty() {
            return Err(StewardError::nothing_to_copy(source.content_type, source.id));
        }
        debug!(grantees = grants.len(), "Loaded source grants");
        Ok(SourceGrants { source, grants })
    }

    /// Fetch the target item, failing with `ContentNotFound`
    pub async fn verify_target(&self, ctx: &RequestContext, target: &ContentRef) -> Result<ContentRef> {
        validate_content_id(&target.id)?;
        self.repo
            .get_content(ctx, target.content_type, &target.id)
            .await
    }

    /// Copy grants from `source` to `target`
    pub async fn copy(
        &self,
        ctx: &RequestContext,
        source: &ContentRef,
        target: &ContentRef,
        mode: CopyMode,
    ) -> std::result::Result<CopyOutcome, Interrupted> {
        let source = self.load_source(ctx, source).await?;
        let target = self.verify_target(ctx, target).await?;
        let filtered = filter_for_target(&source, target.content_type)?;

        self.copy_verified(ctx, &source, &target, filtered, mode)
            .await
    }

    /// Plan and send a copy onto a verified target.
    ///
    /// Entries already sent stay applied if a later repository call fails;
    /// the error then carries what was removed and applied up to that point.
    #[instrument(skip_all, fields(site = %ctx.site_id, source = %source.source, target = %target))]
    pub async fn copy_verified(
        &self,
        ctx: &RequestContext,
        source: &SourceGrants,
        target: &ContentRef,
        filtered: Vec<Grant>,
        mode: CopyMode,
    ) -> std::result::Result<CopyOutcome, Interrupted> {
        let reads_target = !matches!(
            (mode, self.policy),
            (CopyMode::Additive, AdditiveConflictPolicy::Send)
        );
        let target_grants = if reads_target {
            self.repo
                .get_grants(ctx, target.content_type, &target.id)
                .await?
        } else {
            Vec::new()
        };

        let plan = plan(mode, self.policy, filtered, &target_grants);
        debug!(
            clear = plan.clear.len(),
            apply = plan.apply.len(),
            skipped = plan.skipped.len(),
            "Planned {} copy",
            mode
        );

        let mut outcome = CopyOutcome {
            source: source.source.clone(),
            target: target.clone(),
            mode,
            removed: Vec::with_capacity(plan.clear.len()),
            applied: Vec::with_capacity(plan.apply.len()),
            skipped: plan.skipped,
        };

        for grantee in plan.clear {
            let result = self
                .repo
                .revoke_all_for_grantee(ctx, target.content_type, &target.id, &grantee.reference())
                .await;
            if let Err(e) = result {
                return Err(stopped(e, outcome, plan.apply.len()));
            }
            outcome.removed.push(grantee);
        }

        let total = plan.apply.len();
        for grant in plan.apply {
            let result = self
                .repo
                .apply_grant(
                    ctx,
                    target.content_type,
                    &target.id,
                    &grant.grantee.reference(),
                    &grant.capabilities,
                )
                .await;
            if let Err(e) = result {
                let remaining = total - outcome.applied.len();
                return Err(stopped(e, outcome, remaining));
            }
            outcome.applied.push(grant);
        }

        info!(
            removed = outcome.removed.len(),
            applied = outcome.applied.len(),
            skipped = outcome.skipped.len(),
            "Copied permissions from {} to {}",
            source.source,
            target
        );
        Ok(outcome)
    }
}

/// Wrap a repository error raised mid-copy with what was already done
fn stopped(error: StewardError, partial: CopyOutcome, remaining: usize) -> Interrupted {
    if partial.is_noop() {
        return error.into();
    }
    warn!(
        error = %error,
        removed = partial.removed.len(),
        applied = partial.applied.len(),
        remaining,
        "Copy stopped part way through"
    );
    Interrupted::after(error, Change::Copied(partial))
}

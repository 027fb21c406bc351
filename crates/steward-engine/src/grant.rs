//! Direct grant and revoke on one content item

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use steward_core::{
    Capability, CapabilityModel, CapabilitySet, ContentRef, ContentRepository, ContentType,
    Grantee, GranteeRef, RequestContext, Result, StewardError, Template,
};

use crate::outcome::{Change, Interrupted};
use crate::resolver::GranteeResolver;
use crate::validation::{validate_content_id, validate_grantee};

// =============================================================================
// Requests
// =============================================================================

/// Capabilities to grant, given explicitly or by template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilitySpec {
    Explicit(CapabilitySet),
    Template(Template),
}

impl CapabilitySpec {
    /// The set to apply on `content_type`.
    ///
    /// Explicit sets must be valid as given. Templates are narrowed to what
    /// the content type accepts and only fail if nothing is left.
    pub fn resolve_for(&self, content_type: ContentType) -> Result<CapabilitySet> {
        match self {
            Self::Explicit(set) => {
                if set.is_empty() {
                    return Err(StewardError::invalid_input(
                        "at least one capability is required",
                    ));
                }
                CapabilityModel::validate_for(set, content_type)?;
                Ok(set.clone())
            }
            Self::Template(template) => {
                let narrowed = CapabilityModel::template_capabilities_for(*template, content_type);
                if narrowed.is_empty() {
                    return Err(StewardError::CapabilityNotApplicable {
                        content_type,
                        capabilities: CapabilityModel::template_capabilities(*template)
                            .capabilities()
                            .collect(),
                    });
                }
                Ok(narrowed)
            }
        }
    }
}

impl From<Template> for CapabilitySpec {
    fn from(template: Template) -> Self {
        Self::Template(template)
    }
}

impl From<CapabilitySet> for CapabilitySpec {
    fn from(set: CapabilitySet) -> Self {
        Self::Explicit(set)
    }
}

/// Which capabilities a revoke removes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokeScope {
    /// Only the named capabilities; others the grantee holds stay
    Capabilities(Vec<Capability>),
    /// Everything the grantee holds
    AllForGrantee,
}

impl RevokeScope {
    pub fn check(&self) -> Result<()> {
        match self {
            Self::Capabilities(capabilities) if capabilities.is_empty() => Err(
                StewardError::invalid_input("at least one capability is required"),
            ),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// A grant that passed validation and is ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedGrant {
    pub content: ContentRef,
    pub grantee: Grantee,
    pub capabilities: CapabilitySet,
}

/// Result of granting capabilities to one grantee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantOutcome {
    pub content: ContentRef,
    pub grantee: Grantee,
    /// Entries sent to the repository; empty when the grant was already in place
    pub applied: CapabilitySet,
    /// Capabilities whose mode flipped and were revoked before re-applying
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mode_changes: Vec<Capability>,
}

impl GrantOutcome {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Result of revoking capabilities from one grantee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeOutcome {
    pub content: ContentRef,
    pub grantee: Grantee,
    /// Entries the grantee held that are now gone
    pub removed: CapabilitySet,
}

impl RevokeOutcome {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

// =============================================================================
// Grant Service
// =============================================================================

/// Applies and removes capability entries for one grantee on one content item
pub struct PermissionGrantService<R: ContentRepository> {
    repo: Arc<R>,
    resolver: Arc<GranteeResolver<R>>,
}

impl<R: ContentRepository> PermissionGrantService<R> {
    pub fn new(repo: Arc<R>, resolver: Arc<GranteeResolver<R>>) -> Self {
        Self { repo, resolver }
    }

    /// Verify that a content item exists, returning the platform's reference
    pub async fn verify_content(&self, ctx: &RequestContext, content: &ContentRef) -> Result<ContentRef> {
        validate_content_id(&content.id)?;
        self.repo
            .get_content(ctx, content.content_type, &content.id)
            .await
    }

    /// Grant capabilities to a grantee.
    ///
    /// Entries already held with the same mode are not sent again. Entries
    /// held with the opposite mode are revoked first, then applied.
    #[instrument(skip_all, fields(site = %ctx.site_id, content = %content, grantee = %grantee))]
    pub async fn grant(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &GranteeRef,
        spec: &CapabilitySpec,
    ) -> std::result::Result<GrantOutcome, Interrupted> {
        let prepared = self.prepare_grant(ctx, content, grantee, spec).await?;
        self.apply_verified(ctx, &prepared.content, &prepared.grantee, &prepared.capabilities)
            .await
    }

    /// Check everything a grant needs without changing anything
    pub async fn prepare_grant(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &GranteeRef,
        spec: &CapabilitySpec,
    ) -> Result<PreparedGrant> {
        validate_grantee(grantee)?;
        let content = self.verify_content(ctx, content).await?;
        let capabilities = spec.resolve_for(content.content_type)?;
        let grantee = self.resolver.resolve(ctx, grantee).await;

        Ok(PreparedGrant {
            content,
            grantee,
            capabilities,
        })
    }

    /// Grant to content already verified, with a set already valid for its type.
    ///
    /// If the apply fails after a mode flip, the error carries the revoked entries.
    pub async fn apply_verified(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &Grantee,
        capabilities: &CapabilitySet,
    ) -> std::result::Result<GrantOutcome, Interrupted> {
        let reference = grantee.reference();
        let existing = self.held_by(ctx, content, &reference).await?;

        let applied = capabilities.filtered(|c, mode| !existing.contains_entry(c, mode));
        let mode_changes: Vec<Capability> = applied
            .capabilities()
            .filter(|c| existing.contains(*c))
            .collect();

        if !mode_changes.is_empty() {
            debug!(count = mode_changes.len(), "Revoking capabilities held with the opposite mode");
            self.repo
                .revoke_capabilities(ctx, content.content_type, &content.id, &reference, &mode_changes)
                .await?;
        }

        if applied.is_empty() {
            debug!(grantee = %reference, "Grant already in place");
        } else {
            let result = self
                .repo
                .apply_grant(ctx, content.content_type, &content.id, &reference, &applied)
                .await;
            if let Err(e) = result {
                if mode_changes.is_empty() {
                    return Err(e.into());
                }
                warn!(
                    error = %e,
                    revoked = mode_changes.len(),
                    "Grant failed after revoking entries held with the opposite mode"
                );
                let removed = existing.filtered(|c, _| mode_changes.contains(&c));
                return Err(Interrupted::after(
                    e,
                    Change::Revoked(RevokeOutcome {
                        content: content.clone(),
                        grantee: grantee.clone(),
                        removed,
                    }),
                ));
            }
            info!(
                grantee = %reference,
                entries = applied.len(),
                "Granted capabilities on {}",
                content
            );
        }

        Ok(GrantOutcome {
            content: content.clone(),
            grantee: grantee.clone(),
            applied,
            mode_changes,
        })
    }

    /// Revoke according to `scope`
    #[instrument(skip_all, fields(site = %ctx.site_id, content = %content, grantee = %grantee))]
    pub async fn revoke(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &GranteeRef,
        scope: &RevokeScope,
    ) -> Result<RevokeOutcome> {
        let (content, grantee) = self.prepare_revoke(ctx, content, grantee, scope).await?;
        self.revoke_verified(ctx, &content, &grantee, scope).await
    }

    /// Check everything a revoke needs without changing anything
    pub async fn prepare_revoke(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &GranteeRef,
        scope: &RevokeScope,
    ) -> Result<(ContentRef, Grantee)> {
        validate_grantee(grantee)?;
        scope.check()?;
        let content = self.verify_content(ctx, content).await?;
        let grantee = self.resolver.resolve(ctx, grantee).await;
        Ok((content, grantee))
    }

    /// Remove the named capabilities a grantee holds
    pub async fn revoke_capabilities(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &GranteeRef,
        capabilities: &[Capability],
    ) -> Result<RevokeOutcome> {
        let scope = RevokeScope::Capabilities(capabilities.to_vec());
        self.revoke(ctx, content, grantee, &scope).await
    }

    /// Remove everything a grantee holds
    pub async fn revoke_all(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &GranteeRef,
    ) -> Result<RevokeOutcome> {
        self.revoke(ctx, content, grantee, &RevokeScope::AllForGrantee)
            .await
    }

    /// Revoke on content already verified
    pub async fn revoke_verified(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &Grantee,
        scope: &RevokeScope,
    ) -> Result<RevokeOutcome> {
        let reference = grantee.reference();
        let existing = self.held_by(ctx, content, &reference).await?;

        let removed = match scope {
            RevokeScope::Capabilities(capabilities) => {
                existing.filtered(|c, _| capabilities.contains(&c))
            }
            RevokeScope::AllForGrantee => existing,
        };

        if removed.is_empty() {
            debug!(grantee = %reference, "Nothing to revoke");
        } else {
            match scope {
                RevokeScope::Capabilities(_) => {
                    let named: Vec<Capability> = removed.capabilities().collect();
                    self.repo
                        .revoke_capabilities(ctx, content.content_type, &content.id, &reference, &named)
                        .await?;
                }
                RevokeScope::AllForGrantee => {
                    self.repo
                        .revoke_all_for_grantee(ctx, content.content_type, &content.id, &reference)
                        .await?;
                }
            }
            info!(
                grantee = %reference,
                entries = removed.len(),
                "Revoked capabilities on {}",
                content
            );
        }

        Ok(RevokeOutcome {
            content: content.clone(),
            grantee: grantee.clone(),
            removed,
        })
    }

    /// Capability entries `grantee` currently holds on `content`
    async fn held_by(
        &self,
        ctx: &RequestContext,
        content: &ContentRef,
        grantee: &GranteeRef,
    ) -> Result<CapabilitySet> {
        let grants = self
            .repo
            .get_grants(ctx, content.content_type, &content.id)
            .await?;
        Ok(grants
            .into_iter()
            .find(|g| g.grantee.is(grantee))
            .map(|g| g.capabilities)
            .unwrap_or_default())
    }
}

//! Core traits for the Steward permission engine

use crate::{error::Result, models::*};
use async_trait::async_trait;

// =============================================================================
// Content Repository
// =============================================================================

/// Access to the platform's content graph and its permission records.
///
/// One implementation covers every content type; callers pass the type as data.
/// Every call carries the site and session it runs under.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Look up a content item; fails with `ContentNotFound`
    async fn get_content(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
    ) -> Result<ContentRef>;

    /// Every grant currently held on a content item, one per grantee
    async fn get_grants(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
    ) -> Result<Vec<Grant>>;

    /// Add capability entries for a grantee; fails with `GranteeInvalid` for unknown grantees
    async fn apply_grant(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
        grantee: &GranteeRef,
        capabilities: &CapabilitySet,
    ) -> Result<()>;

    /// Remove the named capabilities for a grantee, leaving the rest
    async fn revoke_capabilities(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
        grantee: &GranteeRef,
        capabilities: &[Capability],
    ) -> Result<()>;

    /// Remove every capability a grantee holds on a content item
    async fn revoke_all_for_grantee(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
        grantee: &GranteeRef,
    ) -> Result<()>;

    /// Display name for a grantee
    async fn resolve_grantee(&self, ctx: &RequestContext, grantee: &GranteeRef) -> Result<String>;
}

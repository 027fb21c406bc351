//! In-memory content repository
//!
//! Site-scoped storage with the same observable behaviour as the platform:
//! unknown content fails with `ContentNotFound`, unknown grantees are rejected
//! on write, and every applied entry is recorded in a transport log exactly as
//! sent. Stored state keeps one mode per capability; the last write wins.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use steward_core::{
    Capability, CapabilitySet, ContentRef, ContentRepository, ContentType, Grant, Grantee,
    GranteeRef, Mode, RequestContext, Result, SiteId, StewardError,
};

use crate::snapshot::{ContentSnapshot, RepositorySnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContentKey {
    site_id: SiteId,
    content_type: ContentType,
    id: String,
}

impl ContentKey {
    fn new(site_id: SiteId, content_type: ContentType, id: &str) -> Self {
        Self {
            site_id,
            content_type,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct ContentRecord {
    content: ContentRef,
    grants: Vec<Grant>,
}

/// One capability entry as it crossed the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEntry {
    pub content_type: ContentType,
    pub content_id: String,
    pub grantee: GranteeRef,
    pub capability: Capability,
    pub mode: Mode,
}

/// `ContentRepository` backed by concurrent maps
#[derive(Default)]
pub struct InMemoryContentRepository {
    contents: DashMap<ContentKey, ContentRecord>,
    grantees: DashMap<(SiteId, GranteeRef), String>,
    failing_content: DashMap<ContentKey, String>,
    failing_lookups: DashMap<(SiteId, GranteeRef), String>,
    transport_log: Mutex<Vec<TransportEntry>>,
}

impl InMemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository holding one site's snapshot
    pub fn from_snapshot(snapshot: &RepositorySnapshot) -> Self {
        let repo = Self::new();
        repo.load_snapshot(snapshot);
        repo
    }

    pub fn insert_content(&self, site_id: SiteId, content: ContentRef) {
        let key = ContentKey::new(site_id, content.content_type, &content.id);
        self.contents.insert(
            key,
            ContentRecord {
                content,
                grants: Vec::new(),
            },
        );
    }

    pub fn insert_grantee(&self, site_id: SiteId, grantee: Grantee) {
        self.grantees
            .insert((site_id, grantee.reference()), grantee.name);
    }

    /// Replace the stored grants of an existing content item
    pub fn set_grants(
        &self,
        site_id: SiteId,
        content_type: ContentType,
        id: &str,
        grants: Vec<Grant>,
    ) -> Result<()> {
        let key = ContentKey::new(site_id, content_type, id);
        let mut record = self
            .contents
            .get_mut(&key)
            .ok_or_else(|| StewardError::content_not_found(content_type, id))?;
        record.grants = grants;
        Ok(())
    }

    /// Make every call touching this content item fail with a repository error
    pub fn fail_content(
        &self,
        site_id: SiteId,
        content_type: ContentType,
        id: &str,
        message: impl Into<String>,
    ) {
        self.failing_content
            .insert(ContentKey::new(site_id, content_type, id), message.into());
    }

    /// Make display-name lookups for this grantee fail with a repository error
    pub fn fail_grantee_lookup(
        &self,
        site_id: SiteId,
        grantee: GranteeRef,
        message: impl Into<String>,
    ) {
        self.failing_lookups
            .insert((site_id, grantee), message.into());
    }

    pub fn clear_failures(&self) {
        self.failing_content.clear();
        self.failing_lookups.clear();
    }

    /// Every capability entry sent through `apply_grant`, in order
    pub async fn transport_log(&self) -> Vec<TransportEntry> {
        self.transport_log.lock().await.clone()
    }

    pub fn load_snapshot(&self, snapshot: &RepositorySnapshot) {
        for grantee in &snapshot.grantees {
            self.insert_grantee(snapshot.site_id, grantee.clone());
        }
        for item in &snapshot.contents {
            let key = ContentKey::new(snapshot.site_id, item.content.content_type, &item.content.id);
            self.contents.insert(
                key,
                ContentRecord {
                    content: item.content.clone(),
                    grants: item.grants.clone(),
                },
            );
        }
    }

    /// Export one site's content and grantees, sorted for stable output
    pub fn snapshot(&self, site_id: SiteId) -> RepositorySnapshot {
        let mut grantees: Vec<Grantee> = self
            .grantees
            .iter()
            .filter(|entry| entry.key().0 == site_id)
            .map(|entry| Grantee::new(entry.key().1.clone(), entry.value().clone()))
            .collect();
        grantees.sort_by(|a, b| a.reference().cmp(&b.reference()));

        let mut contents: Vec<ContentSnapshot> = self
            .contents
            .iter()
            .filter(|entry| entry.key().site_id == site_id)
            .map(|entry| ContentSnapshot {
                content: entry.value().content.clone(),
                grants: entry.value().grants.clone(),
            })
            .collect();
        contents.sort_by(|a, b| {
            (a.content.content_type, &a.content.id).cmp(&(b.content.content_type, &b.content.id))
        });

        RepositorySnapshot {
            site_id,
            grantees,
            contents,
        }
    }

    fn check_failure(&self, key: &ContentKey) -> Result<()> {
        match self.failing_content.get(key) {
            Some(message) => Err(StewardError::repository(message.value().clone())),
            None => Ok(()),
        }
    }

    fn known_grantee(&self, site_id: SiteId, grantee: &GranteeRef) -> Option<String> {
        self.grantees
            .get(&(site_id, grantee.clone()))
            .map(|name| name.value().clone())
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    #[instrument(skip(self, ctx), fields(site = %ctx.site_id))]
    async fn get_content(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
    ) -> Result<ContentRef> {
        let key = ContentKey::new(ctx.site_id, content_type, id);
        self.check_failure(&key)?;
        self.contents
            .get(&key)
            .map(|record| record.content.clone())
            .ok_or_else(|| StewardError::content_not_found(content_type, id))
    }

    #[instrument(skip(self, ctx), fields(site = %ctx.site_id))]
    async fn get_grants(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
    ) -> Result<Vec<Grant>> {
        let key = ContentKey::new(ctx.site_id, content_type, id);
        self.check_failure(&key)?;
        self.contents
            .get(&key)
            .map(|record| record.grants.clone())
            .ok_or_else(|| StewardError::content_not_found(content_type, id))
    }

    #[instrument(skip(self, ctx, capabilities), fields(site = %ctx.site_id, entries = capabilities.len()))]
    async fn apply_grant(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
        grantee: &GranteeRef,
        capabilities: &CapabilitySet,
    ) -> Result<()> {
        let key = ContentKey::new(ctx.site_id, content_type, id);
        self.check_failure(&key)?;

        let name = self.known_grantee(ctx.site_id, grantee).ok_or_else(|| {
            StewardError::grantee_invalid(
                grantee.grantee_type,
                grantee.id.clone(),
                "grantee is not known to the site",
            )
        })?;

        {
            let mut record = self
                .contents
                .get_mut(&key)
                .ok_or_else(|| StewardError::content_not_found(content_type, id))?;

            match record.grants.iter_mut().find(|g| g.grantee.is(grantee)) {
                Some(existing) => existing.capabilities.merge_from(capabilities),
                None if capabilities.is_empty() => {}
                None => record.grants.push(Grant::new(
                    Grantee::new(grantee.clone(), name),
                    capabilities.clone(),
                )),
            }
        }

        let mut log = self.transport_log.lock().await;
        log.extend(capabilities.iter().map(|(capability, mode)| TransportEntry {
            content_type,
            content_id: id.to_string(),
            grantee: grantee.clone(),
            capability,
            mode,
        }));

        debug!(grantee = %grantee, "Applied capability entries");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(site = %ctx.site_id))]
    async fn revoke_capabilities(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
        grantee: &GranteeRef,
        capabilities: &[Capability],
    ) -> Result<()> {
        let key = ContentKey::new(ctx.site_id, content_type, id);
        self.check_failure(&key)?;

        let mut record = self
            .contents
            .get_mut(&key)
            .ok_or_else(|| StewardError::content_not_found(content_type, id))?;

        if let Some(existing) = record.grants.iter_mut().find(|g| g.grantee.is(grantee)) {
            for capability in capabilities {
                existing.capabilities.remove(*capability);
            }
        }
        record.grants.retain(|g| !g.capabilities.is_empty());
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(site = %ctx.site_id))]
    async fn revoke_all_for_grantee(
        &self,
        ctx: &RequestContext,
        content_type: ContentType,
        id: &str,
        grantee: &GranteeRef,
    ) -> Result<()> {
        let key = ContentKey::new(ctx.site_id, content_type, id);
        self.check_failure(&key)?;

        let mut record = self
            .contents
            .get_mut(&key)
            .ok_or_else(|| StewardError::content_not_found(content_type, id))?;
        record.grants.retain(|g| !g.grantee.is(grantee));
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(site = %ctx.site_id))]
    async fn resolve_grantee(&self, ctx: &RequestContext, grantee: &GranteeRef) -> Result<String> {
        if let Some(message) = self.failing_lookups.get(&(ctx.site_id, grantee.clone())) {
            return Err(StewardError::repository(message.value().clone()));
        }
        self.known_grantee(ctx.site_id, grantee).ok_or_else(|| {
            StewardError::grantee_invalid(grantee.grantee_type, grantee.id.clone(), "no such grantee")
        })
    }
}

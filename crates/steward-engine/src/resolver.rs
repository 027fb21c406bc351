//! Grantee display-name resolution
//!
//! Names are cosmetic. A failed lookup never fails the operation that asked
//! for it; the grantee is reported as "Unknown" instead. Successful lookups
//! may be cached per site, failures never are.
//!
//! The cache holds display names only and is never consulted for grant state.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use steward_core::{ContentRepository, Grantee, GranteeRef, RequestContext, SiteId};

use crate::config::ResolverCacheConfig;

/// Lookup counters
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub failures: AtomicU64,
}

impl ResolverMetrics {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Turns grantee references into displayable grantees
pub struct GranteeResolver<R: ContentRepository> {
    repo: Arc<R>,
    cache: Option<Cache<(SiteId, GranteeRef), String>>,
    metrics: ResolverMetrics,
}

impl<R: ContentRepository> GranteeResolver<R> {
    /// Resolver that asks the repository every time
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            cache: None,
            metrics: ResolverMetrics::default(),
        }
    }

    pub fn with_config(repo: Arc<R>, config: &ResolverCacheConfig) -> Self {
        let cache = config.enabled.then(|| {
            Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.ttl())
                .build()
        });

        Self {
            repo,
            cache,
            metrics: ResolverMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &ResolverMetrics {
        &self.metrics
    }

    /// Resolve a display name, falling back to "Unknown"
    #[instrument(skip_all, fields(site = %ctx.site_id, grantee = %grantee))]
    pub async fn resolve(&self, ctx: &RequestContext, grantee: &GranteeRef) -> Grantee {
        let key = (ctx.site_id, grantee.clone());

        if let Some(cache) = &self.cache {
            if let Some(name) = cache.get(&key).await {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Grantee name cache hit");
                return Grantee::new(grantee.clone(), name);
            }
        }
        self.metrics.misses.fetch_add(1, Ordering::Relaxed);

        match self.repo.resolve_grantee(ctx, grantee).await {
            Ok(name) => {
                if let Some(cache) = &self.cache {
                    cache.insert(key, name.clone()).await;
                }
                Grantee::new(grantee.clone(), name)
            }
            Err(e) => {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Grantee lookup failed, reporting as unknown");
                Grantee::unknown(grantee.clone())
            }
        }
    }
}

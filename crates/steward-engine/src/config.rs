//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine settings; every field has a default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub impact: ImpactThresholds,
    #[serde(default)]
    pub resolver: ResolverCacheConfig,
    #[serde(default)]
    pub additive_conflicts: AdditiveConflictPolicy,
}

/// Batch sizes at which the reported impact level steps up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactThresholds {
    /// Batches of at least this many items are `Medium`
    #[serde(default = "default_medium_at")]
    pub medium_at: usize,
    /// Batches of at least this many items are `High`
    #[serde(default = "default_high_at")]
    pub high_at: usize,
}

fn default_medium_at() -> usize {
    10
}

fn default_high_at() -> usize {
    50
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            medium_at: default_medium_at(),
            high_at: default_high_at(),
        }
    }
}

/// Display-name cache for grantee lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverCacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_ttl_secs() -> u64 {
    300
}

impl ResolverCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for ResolverCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: default_max_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// What `additive` copies do when the target holds a capability in the opposite mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditiveConflictPolicy {
    /// Send every source entry without reading the target
    #[default]
    Send,
    /// Read the target and withhold entries whose mode conflicts
    SkipConflicting,
}

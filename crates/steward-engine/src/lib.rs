//! Steward Engine - Permission propagation over a content repository
//!
//! Grants and revokes capabilities on single content items, copies grants
//! between items under a copy mode, and runs any of these over a batch of
//! items with per-item accounting.

pub mod bulk;
pub mod config;
pub mod copy;
pub mod grant;
pub mod outcome;
pub mod report;
pub mod resolver;
pub mod service;
pub mod validation;


pub use bulk::{
    BulkOperation, BulkOperationExecutor, BulkRequest, BulkResult, FailedItem, SkippedItem,
    SucceededItem,
};
pub use config::{AdditiveConflictPolicy, EngineConfig, ImpactThresholds, ResolverCacheConfig};
pub use copy::{CopyOutcome, PermissionCopyEngine, SkippedGrantee, SourceGrants};
pub use grant::{CapabilitySpec, GrantOutcome, PermissionGrantService, RevokeOutcome, RevokeScope};
pub use outcome::{Change, Failure, Interrupted, ItemPhase, OperationKind, Outcome};
pub use report::{BulkStatus, BulkSummary, ImpactLevel, ResultAggregator};
pub use resolver::GranteeResolver;
pub use service::{BulkReport, OperationResult, PermissionEngine};

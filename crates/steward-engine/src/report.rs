//! Batch summaries
//!
//! Reporting only. Nothing here is consulted before or during execution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bulk::BulkResult;
use crate::config::ImpactThresholds;

/// Size class of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("Low"),
            Self::Medium => f.write_str("Medium"),
            Self::High => f.write_str("High"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    /// No item failed; also used for empty batches
    Success,
    /// Some items failed, others succeeded or were skipped
    PartialSuccess,
    /// Every item failed
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `succeeded / total`, 0.0 for an empty batch
    pub success_rate: f64,
    pub impact_level: ImpactLevel,
    pub status: BulkStatus,
}

/// Reduces a bulk result to summary statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    thresholds: ImpactThresholds,
}

impl ResultAggregator {
    pub fn new(thresholds: ImpactThresholds) -> Self {
        Self { thresholds }
    }

    pub fn impact_level(&self, total: usize) -> ImpactLevel {
        if total >= self.thresholds.high_at {
            ImpactLevel::High
        } else if total >= self.thresholds.medium_at {
            ImpactLevel::Medium
        } else {
            ImpactLevel::Low
        }
    }

    pub fn summarize(&self, result: &BulkResult) -> BulkSummary {
        let succeeded = result.successful.len();
        let failed = result.failed.len();
        let skipped = result.skipped.len();
        let total = succeeded + failed + skipped;

        let success_rate = if total == 0 {
            0.0
        } else {
            succeeded as f64 / total as f64
        };

        let status = if failed == 0 {
            BulkStatus::Success
        } else if failed == total {
            BulkStatus::Failed
        } else {
            BulkStatus::PartialSuccess
        };

        BulkSummary {
            total,
            succeeded,
            failed,
            skipped,
            success_rate,
            impact_level: self.impact_level(total),
            status,
        }
    }
}

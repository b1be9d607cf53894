//! Data model for reliability records and aggregated statistics.

use std::collections::BTreeMap;

use alin_core::{ProviderKind, ToolCallRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One model attempt. Retries produce one record each.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCallRecord {
    pub model: String,
    pub provider: ProviderKind,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    /// HTTP status of a failed attempt, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Anything the tracker keeps in its recent-history buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Model(ModelCallRecord),
    Tool(ToolCallRecord),
}

impl Record {
    pub fn started_at(&self) -> DateTime<Utc> {
        match self {
            Self::Model(r) => r.started_at,
            Self::Tool(r) => r.started_at,
        }
    }
}

// ── Aggregates ────────────────────────────────────────────────────────────

/// Call counters shared by tools and models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallStats {
    pub calls: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
}

impl CallStats {
    pub fn record(&mut self, success: bool, duration_ms: u64) {
        self.calls += 1;
        if !success {
            self.failures += 1;
        }
        self.total_duration_ms += duration_ms;
    }

    /// Fraction of successful calls; 1.0 before any call.
    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            return 1.0;
        }
        (self.calls - self.failures) as f64 / self.calls as f64
    }

    pub fn mean_duration_ms(&self) -> u64 {
        self.total_duration_ms.checked_div(self.calls).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolStats {
    #[serde(flatten)]
    pub calls: CallStats,
    /// Failure counts keyed by `ToolError::kind()`.
    pub error_kinds: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    #[serde(flatten)]
    pub calls: CallStats,
    /// Failure counts keyed by HTTP status; `0` when there was none.
    pub statuses: BTreeMap<u16, u64>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Point-in-time view of every counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReliabilitySnapshot {
    pub tools: BTreeMap<String, ToolStats>,
    pub models: BTreeMap<String, ModelStats>,
    pub generated_at: DateTime<Utc>,
}

impl ReliabilitySnapshot {
    pub fn total_tool_calls(&self) -> u64 {
        self.tools.values().map(|s| s.calls.calls).sum()
    }

    pub fn total_model_calls(&self) -> u64 {
        self.models.values().map(|s| s.calls.calls).sum()
    }
}

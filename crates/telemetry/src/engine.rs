//! Thread-safe reliability tracker: aggregates per-tool and per-model
//! outcomes and keeps a bounded buffer of recent records.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use alin_core::ToolCallRecord;
use chrono::{DateTime, Utc};

use crate::model::{ModelCallRecord, ModelStats, Record, ReliabilitySnapshot, ToolStats};

/// Where the agent loop reports what happened.
pub trait ReliabilitySink: Send + Sync {
    fn record_model_call(&self, record: &ModelCallRecord);

    fn record_tool_call(&self, record: &ToolCallRecord);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReliabilitySink for NullSink {
    fn record_model_call(&self, _record: &ModelCallRecord) {}

    fn record_tool_call(&self, _record: &ToolCallRecord) {}
}

const DEFAULT_HISTORY: usize = 5_000;

#[derive(Debug, Default)]
struct Totals {
    tools: std::collections::BTreeMap<String, ToolStats>,
    models: std::collections::BTreeMap<String, ModelStats>,
}

/// In-process [`ReliabilitySink`] backing the `/health` report.
pub struct ReliabilityTracker {
    totals: RwLock<Totals>,
    recent: RwLock<VecDeque<Record>>,
    history: usize,
}

impl ReliabilityTracker {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Keep at most `history` recent records.
    pub fn with_history(history: usize) -> Self {
        Self {
            totals: RwLock::new(Totals::default()),
            recent: RwLock::new(VecDeque::new()),
            history,
        }
    }

    fn remember(&self, record: Record) {
        if self.history == 0 {
            return;
        }
        let mut recent = self.recent.write().unwrap_or_else(PoisonError::into_inner);
        if recent.len() == self.history {
            recent.pop_front();
        }
        recent.push_back(record);
    }

    pub fn snapshot(&self) -> ReliabilitySnapshot {
        let totals = self.totals.read().unwrap_or_else(PoisonError::into_inner);
        ReliabilitySnapshot {
            tools: totals.tools.clone(),
            models: totals.models.clone(),
            generated_at: Utc::now(),
        }
    }

    /// Most recent records first.
    pub fn recent(&self, limit: usize) -> Vec<Record> {
        let recent = self.recent.read().unwrap_or_else(PoisonError::into_inner);
        recent.iter().rev().take(limit).cloned().collect()
    }

    /// Drop buffered records that started before `cutoff`. Aggregates stay.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut recent = self.recent.write().unwrap_or_else(PoisonError::into_inner);
        let before = recent.len();
        recent.retain(|r| r.started_at() >= cutoff);
        before - recent.len()
    }
}

impl Default for ReliabilityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReliabilitySink for ReliabilityTracker {
    fn record_model_call(&self, record: &ModelCallRecord) {
        {
            let mut totals = self.totals.write().unwrap_or_else(PoisonError::into_inner);
            let stats = totals.models.entry(record.model.clone()).or_default();
            stats.calls.record(record.success, record.duration_ms);
            if !record.success {
                *stats.statuses.entry(record.status.unwrap_or(0)).or_default() += 1;
            }
            stats.input_tokens += u64::from(record.input_tokens);
            stats.output_tokens += u64::from(record.output_tokens);
        }
        if !record.success {
            tracing::debug!(model = %record.model, status = ?record.status, "Model call failed");
        }
        self.remember(Record::Model(record.clone()));
    }

    fn record_tool_call(&self, record: &ToolCallRecord) {
        {
            let mut totals = self.totals.write().unwrap_or_else(PoisonError::into_inner);
            let stats = totals.tools.entry(record.tool_name.clone()).or_default();
            stats.calls.record(record.success, record.duration_ms);
            if let Some(kind) = &record.error_kind {
                *stats.error_kinds.entry(kind.clone()).or_default() += 1;
            }
        }
        self.remember(Record::Tool(record.clone()));
    }
}

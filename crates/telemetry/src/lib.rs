//! Reliability telemetry for Alin.
//!
//! The agent loop reports one [`ModelCallRecord`] per model attempt and one
//! `ToolCallRecord` per tool call to a [`ReliabilitySink`]. The bundled
//! [`ReliabilityTracker`] aggregates them per tool and per model.

pub mod engine;
pub mod model;

pub use engine::{NullSink, ReliabilitySink, ReliabilityTracker};
pub use model::{CallStats, ModelCallRecord, ModelStats, Record, ReliabilitySnapshot, ToolStats};

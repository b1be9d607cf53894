//! Per-call tool argument accumulation.
//!
//! Each tool call is tracked in a slot keyed by the vendor's block or array
//! index and moves through `Empty → Accumulating → Complete`:
//!
//! - **Empty**: the slot exists but its id or name is still unknown.
//!   Fragments are buffered silently.
//! - **Accumulating**: id and name are known and `ToolUseStart` has been
//!   emitted (together with any buffered fragments as one
//!   `ToolUseInputFragment`). New fragments are forwarded as they arrive.
//! - **Complete**: `ToolUseComplete` has been emitted with the parsed input
//!   and the slot is removed.

use std::collections::BTreeMap;

use alin_core::CanonicalEvent;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    Accumulating,
}

#[derive(Debug)]
struct Slot {
    state: SlotState,
    id: Option<String>,
    name: Option<String>,
    buffer: String,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: SlotState::Empty,
            id: None,
            name: None,
            buffer: String::new(),
        }
    }
}

/// Tool-call slots for one model round.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    slots: BTreeMap<u64, Slot>,
    completed: usize,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the id and/or name for `key`. Emits `ToolUseStart` (and the
    /// buffered input so far) the first time both are known.
    pub fn begin(&mut self, key: u64, id: Option<&str>, name: Option<&str>) -> Vec<CanonicalEvent> {
        let slot = self.slots.entry(key).or_insert_with(Slot::new);
        if let Some(id) = id.filter(|s| !s.is_empty()) {
            slot.id.get_or_insert_with(|| id.to_string());
        }
        if let Some(name) = name.filter(|s| !s.is_empty()) {
            slot.name.get_or_insert_with(|| name.to_string());
        }
        Self::try_start(slot)
    }

    /// Add an argument fragment for `key`.
    pub fn append(&mut self, key: u64, fragment: &str) -> Vec<CanonicalEvent> {
        if fragment.is_empty() {
            return Vec::new();
        }
        let slot = self.slots.entry(key).or_insert_with(Slot::new);
        slot.buffer.push_str(fragment);
        match (slot.state, &slot.id) {
            (SlotState::Accumulating, Some(id)) => vec![CanonicalEvent::ToolUseInputFragment {
                id: id.clone(),
                fragment: fragment.to_string(),
            }],
            _ => Vec::new(),
        }
    }

    fn try_start(slot: &mut Slot) -> Vec<CanonicalEvent> {
        if slot.state != SlotState::Empty {
            return Vec::new();
        }
        let (Some(id), Some(name)) = (&slot.id, &slot.name) else {
            return Vec::new();
        };
        slot.state = SlotState::Accumulating;
        let mut events = vec![CanonicalEvent::ToolUseStart {
            id: id.clone(),
            name: name.clone(),
        }];
        if !slot.buffer.is_empty() {
            events.push(CanonicalEvent::ToolUseInputFragment {
                id: id.clone(),
                fragment: slot.buffer.clone(),
            });
        }
        events
    }

    /// Finish the slot at `key`, if one exists.
    pub fn complete(&mut self, key: u64) -> Option<CanonicalEvent> {
        let slot = self.slots.remove(&key)?;
        let (Some(id), Some(name)) = (slot.id, slot.name) else {
            warn!(index = key, "Dropping tool call that never received an id and name");
            return None;
        };
        self.completed += 1;
        Some(CanonicalEvent::ToolUseComplete {
            id,
            name,
            input: parse_input(&slot.buffer),
        })
    }

    /// Finish every open slot in index order.
    pub fn complete_all(&mut self) -> Vec<CanonicalEvent> {
        let keys: Vec<u64> = self.slots.keys().copied().collect();
        keys.into_iter().filter_map(|k| self.complete(k)).collect()
    }

    /// Drop every open slot without completing it.
    pub fn discard_all(&mut self) -> usize {
        let n = self.slots.len();
        if n > 0 {
            debug!(pending = n, "Discarding unfinished tool calls");
        }
        self.slots.clear();
        n
    }

    /// Tool calls completed so far this round.
    pub fn completed(&self) -> usize {
        self.completed
    }
}

/// Parse accumulated arguments. Anything that is not a JSON object,
/// including an empty buffer, becomes `{}`.
pub fn parse_input(buffer: &str) -> serde_json::Value {
    if buffer.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str::<serde_json::Value>(buffer) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            debug!(len = buffer.len(), "Tool input is not a JSON object, using {{}}");
            serde_json::json!({})
        }
    }
}

//! Observation events and the bounded in-memory event log.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Local};
use serde::Serialize;

/// One per-store observation per cycle, as handed to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct PingEvent {
    pub number: String,
    /// Address probed this cycle, or `-` when unresolved.
    pub address: String,
    pub online: bool,
    /// Mean latency over successful samples, in whole milliseconds.
    pub latency_ms: Option<u64>,
    pub success_count: u32,
    pub time: DateTime<Local>,
}

/// Ring buffer of recent observations, oldest trimmed first.
pub struct EventLog {
    entries: RwLock<VecDeque<PingEvent>>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, event: PingEvent) {
        let mut entries = self.entries.write().unwrap();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    /// Most recent events, oldest first, at most `limit`.
    pub fn recent(&self, limit: usize) -> Vec<PingEvent> {
        let entries = self.entries.read().unwrap();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Event history for debugging and spectator catch-up
//!
//! Append-only, in-memory. Optionally bounded, in which case the oldest
//! events are dropped first.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use super::bus::EventFilter;
use super::types::DebateEvent;

/// Shared reference to EventHistory
pub type SharedEventHistory = Arc<EventHistory>;

/// Per-type counts over the recorded history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStats {
    /// Total events recorded (including dropped ones)
    pub total_recorded: u64,
    /// Events currently retained
    pub retained: usize,
    /// Retained events by type
    pub by_type: BTreeMap<String, usize>,
}

/// Append-only event log
pub struct EventHistory {
    events: RwLock<VecDeque<DebateEvent>>,
    capacity: Option<usize>,
    total: RwLock<u64>,
}

impl EventHistory {
    /// Unbounded history
    pub fn new() -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            capacity: None,
            total: RwLock::new(0),
        }
    }

    /// History that keeps at most `capacity` events
    pub fn bounded(capacity: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity.max(1)),
            total: RwLock::new(0),
        }
    }

    /// Create a shared reference to this history
    pub fn shared(self) -> SharedEventHistory {
        Arc::new(self)
    }

    /// Append an event
    pub fn record(&self, event: &DebateEvent) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(cap) = self.capacity {
            while events.len() >= cap {
                events.pop_front();
            }
        }
        events.push_back(event.clone());
        *self.total.write().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all retained events in publication order
    pub fn events(&self) -> Vec<DebateEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Retained events matching a filter
    pub fn query(&self, filter: &EventFilter) -> Vec<DebateEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Retained events of one type
    pub fn of_type(&self, event_type: &str) -> Vec<DebateEvent> {
        self.query(&EventFilter::new().types(vec![event_type]))
    }

    /// Last `n` events, oldest first
    pub fn recent(&self, n: usize) -> Vec<DebateEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let skip = events.len().saturating_sub(n);
        events.iter().skip(skip).cloned().collect()
    }

    /// Counts by event type
    pub fn stats(&self) -> EventStats {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let mut by_type = BTreeMap::new();
        for event in events.iter() {
            *by_type.entry(event.event_type().to_string()).or_insert(0) += 1;
        }
        EventStats {
            total_recorded: *self.total.read().unwrap_or_else(PoisonError::into_inner),
            retained: events.len(),
            by_type,
        }
    }

    /// Drop all retained events
    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new()
    }
}

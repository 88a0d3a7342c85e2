//! Event bus for debate coordination
//!
//! Handlers subscribe to an exact dotted event type. `publish` appends the
//! event to the optional history, broadcasts it on a tap channel for
//! observers (bridges, transcripts), then awaits every handler registered
//! for that type in subscription order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::history::SharedEventHistory;
use super::types::DebateEvent;

/// Channel capacity for the observer tap
const CHANNEL_CAPACITY: usize = 4096;

/// Error type for event bus operations
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Handler {handler} failed: {reason}")]
    HandlerFailed { handler: String, reason: String },
}

impl EventBusError {
    /// Convenience constructor for handler failures.
    pub fn handler(handler: &str, reason: impl std::fmt::Display) -> Self {
        Self::HandlerFailed {
            handler: handler.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for event bus operations
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Identifier returned by `subscribe`, used to unsubscribe.
pub type SubscriptionId = u64;

/// A subscriber to one or more event types.
///
/// The bus passes itself to `handle` so handlers can publish follow-up
/// events without holding their own reference to the bus.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Handle one event.
    async fn handle(&self, event: &DebateEvent, bus: &EventBus) -> EventBusResult<()>;
}

/// Adapter turning a plain closure into an [`EventHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&DebateEvent) + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&DebateEvent) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &DebateEvent, _bus: &EventBus) -> EventBusResult<()> {
        (self.f)(event);
        Ok(())
    }
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

/// Outcome of a single `publish` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that completed successfully.
    pub delivered: usize,
    /// Handlers that returned an error.
    pub failed: usize,
}

impl PublishReport {
    /// Whether every handler succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Event bus with a per-type dispatch table and a broadcast tap
pub struct EventBus {
    /// Handlers keyed by exact event type, in subscription order
    handlers: RwLock<HashMap<String, Vec<Subscription>>>,

    next_id: AtomicU64,

    /// Broadcast sender for observers
    sender: broadcast::Sender<DebateEvent>,

    /// Optional history every published event is appended to
    history: Option<SharedEventHistory>,
}

impl EventBus {
    /// Create a new event bus without history
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sender,
            history: None,
        }
    }

    /// Create an event bus that records every published event
    pub fn with_history(history: SharedEventHistory) -> Self {
        let mut bus = Self::new();
        bus.history = Some(history);
        bus
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// History attached to this bus, if any
    pub fn history(&self) -> Option<&SharedEventHistory> {
        self.history.as_ref()
    }

    /// Register a handler for an exact event type.
    pub fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers
            .entry(event_type.to_string())
            .or_default()
            .push(Subscription { id, handler });
        debug!(event_type, subscription = id, "Handler subscribed");
        id
    }

    /// Register the same handler for several event types.
    pub fn subscribe_many(
        &self,
        event_types: &[&str],
        handler: Arc<dyn EventHandler>,
    ) -> Vec<SubscriptionId> {
        event_types
            .iter()
            .map(|event_type| self.subscribe(event_type, handler.clone()))
            .collect()
    }

    /// Register a closure for an exact event type.
    pub fn subscribe_fn<F>(&self, event_type: &str, f: F) -> SubscriptionId
    where
        F: Fn(&DebateEvent) + Send + Sync + 'static,
    {
        self.subscribe(event_type, Arc::new(FnHandler::new(event_type, f)))
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for subs in handlers.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
        }
        handlers.retain(|_, subs| !subs.is_empty());
        removed
    }

    /// Number of handlers registered for an event type
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Publish an event to observers, then to all handlers of its type.
    ///
    /// The registry lock is released before any handler runs, so handlers
    /// may publish or subscribe from inside a dispatch. Handler errors are
    /// logged and counted; later handlers still run.
    pub async fn publish(&self, event: DebateEvent) -> PublishReport {
        let event_type = event.event_type();
        let subscribers: Vec<Subscription> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .cloned()
            .unwrap_or_default();

        if let Some(history) = &self.history {
            history.record(&event);
        }

        // Observers see the event before any follow-ups its handlers publish
        let observers = self.sender.send(event.clone()).unwrap_or(0);

        let mut report = PublishReport {
            delivered: 0,
            failed: 0,
        };

        for sub in &subscribers {
            match sub.handler.handle(&event, self).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        event_type,
                        handler = sub.handler.name(),
                        "Event handler failed: {}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            event_type,
            handlers = report.delivered,
            failed = report.failed,
            observers,
            "Event published"
        );

        report
    }

    /// Observe every published event regardless of type.
    pub fn tap(&self) -> broadcast::Receiver<DebateEvent> {
        self.sender.subscribe()
    }

    /// Observe only the events `filter` selects.
    pub fn tap_filtered(&self, filter: EventFilter) -> FilteredTap {
        FilteredTap {
            receiver: self.tap(),
            filter,
        }
    }

    /// Number of observers on the tap channel
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Selects the events an observer cares about.
///
/// A type pattern matches one event type exactly, or a whole family when it
/// ends in `.` (`"senator."` matches every `senator.*` event). Unset
/// criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    patterns: Vec<String>,
    source: Option<String>,
    topic: Option<String>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add type patterns.
    pub fn types<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(
            patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.trim().is_empty()),
        );
        self
    }

    /// Only events emitted by `source`.
    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Only events about `topic`.
    pub fn topic(mut self, topic: &str) -> Self {
        self.topic = Some(topic.to_string());
        self
    }

    /// True when the filter lets everything through.
    pub fn is_open(&self) -> bool {
        self.patterns.is_empty() && self.source.is_none() && self.topic.is_none()
    }

    pub fn matches(&self, event: &DebateEvent) -> bool {
        let event_type = event.event_type();
        (self.patterns.is_empty() || self.patterns.iter().any(|p| type_matches(p, event_type)))
            && self.source.as_deref().map_or(true, |s| event.source == s)
            && self.topic.as_deref().map_or(true, |t| event.topic() == Some(t))
    }
}

fn type_matches(pattern: &str, event_type: &str) -> bool {
    match pattern.strip_suffix('.') {
        Some(family) => event_type
            .strip_prefix(family)
            .is_some_and(|rest| rest.starts_with('.')),
        None => pattern == event_type,
    }
}

/// Tap receiver that skips events outside its filter.
pub struct FilteredTap {
    receiver: broadcast::Receiver<DebateEvent>,
    filter: EventFilter,
}

impl FilteredTap {
    /// Next matching event. Lag and close errors pass through unchanged.
    pub async fn recv(&mut self) -> Result<DebateEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Result<DebateEvent, broadcast::error::TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::history::EventHistory;
    use crate::events::types::{event_types, EventPayload};
    use std::sync::Mutex;

    fn agenda() -> DebateEvent {
        DebateEvent::from_senate(EventPayload::AgendaAnnounced {
            topics: vec!["grain".to_string()],
        })
    }

    fn vote_requested(topic: &str) -> DebateEvent {
        DebateEvent::from_senate(EventPayload::VoteRequested {
            topic: topic.to_string(),
            title: "Grain dole".to_string(),
        })
    }

    #[tokio::test]
    async fn test_handlers_run_once_in_subscription_order() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for n in 1..=3 {
            let calls = calls.clone();
            bus.subscribe_fn(event_types::AGENDA_ANNOUNCED, move |_| {
                calls.lock().unwrap().push(n)
            });
        }
        let other = calls.clone();
        bus.subscribe_fn(event_types::VOTE_REQUESTED, move |_| {
            other.lock().unwrap().push(99)
        });

        let report = bus.publish(agenda()).await;

        assert_eq!(report.delivered, 3);
        assert!(report.is_clean());
        assert_eq!(*calls.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_no_handlers() {
        let bus = EventBus::new();
        let report = bus.publish(agenda()).await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 0);
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _event: &DebateEvent, _bus: &EventBus) -> EventBusResult<()> {
            Err(EventBusError::handler("failing", "boom"))
        }
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(0));

        bus.subscribe(event_types::AGENDA_ANNOUNCED, Arc::new(Failing));
        let counter = seen.clone();
        bus.subscribe_fn(event_types::AGENDA_ANNOUNCED, move |_| {
            *counter.lock().unwrap() += 1
        });

        let report = bus.publish(agenda()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    /// Publishes a vote request whenever the agenda is announced.
    struct Chained;

    #[async_trait]
    impl EventHandler for Chained {
        fn name(&self) -> &str {
            "chained"
        }

        async fn handle(&self, _event: &DebateEvent, bus: &EventBus) -> EventBusResult<()> {
            bus.publish(vote_requested("grain")).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_nested_publish_from_handler() {
        let bus = EventBus::new();
        let votes = Arc::new(Mutex::new(0));

        bus.subscribe(event_types::AGENDA_ANNOUNCED, Arc::new(Chained));
        let counter = votes.clone();
        bus.subscribe_fn(event_types::VOTE_REQUESTED, move |_| {
            *counter.lock().unwrap() += 1
        });

        bus.publish(agenda()).await;
        assert_eq!(*votes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe_fn(event_types::AGENDA_ANNOUNCED, |_| {});
        assert_eq!(bus.handler_count(event_types::AGENDA_ANNOUNCED), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.handler_count(event_types::AGENDA_ANNOUNCED), 0);
    }

    #[tokio::test]
    async fn test_tap_and_history() {
        let history = EventHistory::new().shared();
        let bus = EventBus::with_history(history.clone());
        let mut rx = bus.tap();
        assert_eq!(bus.observer_count(), 1);

        bus.publish(agenda()).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), event_types::AGENDA_ANNOUNCED);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::new()
            .topic("grain")
            .types(vec![event_types::VOTE_REQUESTED]);

        assert!(filter.matches(&vote_requested("grain")));
        assert!(!filter.matches(&vote_requested("roads")));
        assert!(!filter.matches(&agenda()));

        let by_source = EventFilter::new().source("senate");
        assert!(by_source.matches(&agenda()));
        assert!(EventFilter::new().is_open());
        assert!(!by_source.is_open());
    }

    #[test]
    fn test_family_patterns() {
        let session = EventFilter::new().types(["session."]);
        assert!(session.matches(&agenda()));
        assert!(!session.matches(&vote_requested("grain")));

        // A family pattern needs a full segment
        let partial = EventFilter::new().types(["sess."]);
        assert!(!partial.matches(&agenda()));

        let blank = EventFilter::new().types(["", " "]);
        assert!(blank.is_open());
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let bus = Arc::new(EventBus::new());
        let mut filtered = bus.tap_filtered(EventFilter::new().topic("target"));

        let publisher = bus.clone();
        tokio::spawn(async move {
            publisher.publish(vote_requested("other")).await;
            publisher.publish(vote_requested("target")).await;
        });

        let event = filtered.recv().await.unwrap();
        assert_eq!(event.topic(), Some("target"));
    }

    #[tokio::test]
    async fn test_filtered_try_recv_skips_unmatched() {
        let bus = EventBus::new();
        let mut filtered = bus.tap_filtered(EventFilter::new().types([event_types::VOTE_REQUESTED]));

        bus.publish(agenda()).await;
        bus.publish(vote_requested("grain")).await;
        bus.publish(agenda()).await;

        assert_eq!(filtered.try_recv().unwrap().topic(), Some("grain"));
        assert!(matches!(
            filtered.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}

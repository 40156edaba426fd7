use super::types::{
    ChangeEvent, ChangeKind, ChangeScope, ChangesetOp, CollectionChangeset, SearchChangeset,
};
use crate::config::EventsConfig;
use crate::models::SearchId;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::trace;

/// Receiving half of a bus subscription, with an optional filter
/// applied before events are handed out.
pub struct ChangeSubscriber {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: Option<ChangeFilter>,
}

impl ChangeSubscriber {
    pub fn new(receiver: broadcast::Receiver<ChangeEvent>, filter: Option<ChangeFilter>) -> Self {
        Self { receiver, filter }
    }

    fn accepts(&self, event: &ChangeEvent) -> bool {
        match &self.filter {
            Some(filter) => filter.matches(event),
            None => true,
        }
    }

    /// Next event passing the filter. Filtered-out events are skipped
    /// silently.
    pub async fn recv(&mut self) -> Result<ChangeEvent> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<Option<ChangeEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(error) => return Err(error.into()),
            }
        }
    }
}

/// Predicate for selective subscriptions. A dimension left unset passes
/// everything.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    kinds: Option<Vec<ChangeKind>>,
    origins: Option<Vec<String>>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kinds(mut self, kinds: Vec<ChangeKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    /// Restrict to origin labels as produced by
    /// [`ChangeOrigin::label`](super::types::ChangeOrigin::label).
    pub fn with_origins(mut self, origins: Vec<String>) -> Self {
        self.origins = Some(origins);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(kinds) = &self.kinds
            && !kinds.contains(&event.kind)
        {
            return false;
        }

        if let Some(origins) = &self.origins
            && !origins.iter().any(|origin| origin == event.origin.label())
        {
            return false;
        }

        true
    }
}

/// Bus that fans library change notifications out to every open lister
/// and any other interested consumer.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
    stats: Arc<RwLock<EventBusStats>>,
    event_history: Arc<RwLock<Vec<ChangeEvent>>>,
    max_history_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EventBusStats {
    pub total_events: u64,
    pub events_by_kind: HashMap<String, u64>,
    pub subscriber_count: usize,
    pub dropped_events: u64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self::with_history(capacity, 100)
    }

    /// Create a bus with an explicit history bound.
    pub fn with_history(capacity: usize, max_history_size: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self {
            sender,
            stats: Arc::new(RwLock::new(EventBusStats::default())),
            event_history: Arc::new(RwLock::new(Vec::new())),
            max_history_size,
        }
    }

    pub fn from_config(config: &EventsConfig) -> Self {
        Self::with_history(config.capacity, config.history)
    }

    /// Publish one event to every subscriber, recording it in the stats
    /// and the bounded history first.
    pub async fn publish(&self, event: ChangeEvent) -> Result<()> {
        trace!(
            kind = event.kind.as_str(),
            origin = event.origin.label(),
            "publishing change"
        );

        {
            let mut stats = self.stats.write().await;
            stats.total_events += 1;
            *stats
                .events_by_kind
                .entry(event.kind.as_str().to_string())
                .or_default() += 1;
        }

        {
            let mut history = self.event_history.write().await;
            history.push(event.clone());
            if history.len() > self.max_history_size {
                let start = history.len() - self.max_history_size;
                history.drain(..start);
            }
        }

        if self.sender.send(event).is_err() {
            // Nobody subscribed yet; normal during startup.
            self.stats.write().await.dropped_events += 1;
        }
        Ok(())
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> ChangeSubscriber {
        ChangeSubscriber::new(self.sender.subscribe(), None)
    }

    pub fn subscribe_filtered(&self, filter: ChangeFilter) -> ChangeSubscriber {
        ChangeSubscriber::new(self.sender.subscribe(), Some(filter))
    }

    pub fn subscribe_to_kinds(&self, kinds: Vec<ChangeKind>) -> ChangeSubscriber {
        self.subscribe_filtered(ChangeFilter::new().with_kinds(kinds))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Snapshot of the counters, with the live subscriber count.
    pub async fn get_stats(&self) -> EventBusStats {
        let mut snapshot = self.stats.read().await.clone();
        snapshot.subscriber_count = self.subscriber_count();
        snapshot
    }

    /// Recent events, oldest first, for debugging.
    pub async fn get_history(&self) -> Vec<ChangeEvent> {
        self.event_history.read().await.clone()
    }

    pub async fn clear_history(&self) {
        self.event_history.write().await.clear();
    }

    /// Emit a collection contents change.
    pub async fn emit_collection_change(&self, op: ChangesetOp, scope: ChangeScope) -> Result<()> {
        self.publish(ChangeEvent::collection(CollectionChangeset::new(op, scope)))
            .await
    }

    /// Emit a saved search change.
    pub async fn emit_search_changed(&self, search: SearchId) -> Result<()> {
        self.publish(ChangeEvent::search(SearchChangeset { search }))
            .await
    }
}

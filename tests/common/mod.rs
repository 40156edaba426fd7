pub mod fixtures;
pub mod mocks;

use self::mocks::{InMemoryContext, ScriptedSource};
use lightbox::config::ListerConfig;
use lightbox::models::{AlbumId, Collection, ItemRecord};
use lightbox::{CollectionLister, ListerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(1);

/// Honors RUST_LOG when a test needs engine traces.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Short timers so the suites settle quickly.
pub fn test_config() -> ListerConfig {
    ListerConfig {
        refresh_delay_ms: 20,
        filter_debounce_ms: 20,
        event_capacity: 256,
    }
}

/// A spawned lister wired to a scripted source and an in-memory
/// metadata context, with a subscription taken before anything runs.
pub struct TestLister {
    pub lister: CollectionLister,
    pub source: Arc<ScriptedSource>,
    pub context: Arc<InMemoryContext>,
    pub events: broadcast::Receiver<ListerEvent>,
}

impl TestLister {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<ItemRecord>) -> Self {
        Self::with_config(records, test_config())
    }

    pub fn with_config(records: Vec<ItemRecord>, config: ListerConfig) -> Self {
        init_tracing();
        let source = Arc::new(ScriptedSource::with_records(records));
        let context = Arc::new(InMemoryContext::new());
        let lister = CollectionLister::spawn(source.clone(), context.clone(), &config);
        let events = lister.subscribe();
        Self {
            lister,
            source,
            context,
            events,
        }
    }

    pub fn album() -> Collection {
        Collection::Album {
            id: AlbumId::new(5),
        }
    }

    pub fn open_album(&self) {
        self.lister.open(Some(Self::album())).unwrap();
    }

    pub async fn next_event(&mut self) -> ListerEvent {
        next_event(&mut self.events).await
    }

    pub async fn until_completed(&mut self) -> Vec<ListerEvent> {
        events_until_completed(&mut self.events).await
    }

    /// Swallow the two flag events of the recompute that trails every
    /// ingesting pass, returning them for inspection.
    pub async fn settle_flags(&mut self) -> (bool, bool) {
        let event = self.next_event().await;
        let ListerEvent::FilterMatch(any_match) = event else {
            panic!("expected FilterMatch, got {event:?}");
        };
        let event = self.next_event().await;
        let ListerEvent::TextFilterMatch(any_text) = event else {
            panic!("expected TextFilterMatch, got {event:?}");
        };
        (any_match, any_text)
    }

    pub async fn snapshot_ids(&self) -> Vec<i64> {
        self.lister
            .snapshot()
            .await
            .unwrap()
            .iter()
            .map(|item| item.id.get())
            .collect()
    }
}

pub async fn next_event(rx: &mut broadcast::Receiver<ListerEvent>) -> ListerEvent {
    timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for lister event")
        .expect("lister event channel closed")
}

/// Collect events up to and including the next `Completed`.
pub async fn events_until_completed(
    rx: &mut broadcast::Receiver<ListerEvent>,
) -> Vec<ListerEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = event == ListerEvent::Completed;
        events.push(event);
        if done {
            return events;
        }
    }
}

pub fn added_ids(events: &[ListerEvent]) -> Vec<i64> {
    events
        .iter()
        .flat_map(|event| match event {
            ListerEvent::ItemsAdded(items) => items.iter().map(|i| i.id.get()).collect(),
            _ => Vec::new(),
        })
        .collect()
}

pub fn filtered_added_ids(events: &[ListerEvent]) -> Vec<i64> {
    events
        .iter()
        .flat_map(|event| match event {
            ListerEvent::FilteredItemsAdded(items) => items.iter().map(|i| i.id.get()).collect(),
            _ => Vec::new(),
        })
        .collect()
}

pub fn removed_ids(events: &[ListerEvent]) -> Vec<i64> {
    events
        .iter()
        .filter_map(|event| match event {
            ListerEvent::ItemRemoved(item) => Some(item.id.get()),
            _ => None,
        })
        .collect()
}

pub fn filtered_removed_ids(events: &[ListerEvent]) -> Vec<i64> {
    events
        .iter()
        .filter_map(|event| match event {
            ListerEvent::FilteredItemRemoved(item) => Some(item.id.get()),
            _ => None,
        })
        .collect()
}

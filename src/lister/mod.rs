mod core;

pub use self::core::{DeadlineKind, Effect, ListerCore, ListerEvent, ListerState};

use crate::config::ListerConfig;
use crate::context::LibraryContext;
use crate::error::EngineError;
use crate::events::{ChangeEvent, EventBus};
use crate::filters::{MimeFilter, RatingCondition, TagMatch, TextSearchFields};
use crate::models::{Collection, ItemId, ItemRecord, JobTicket, PhotoItem, TagId};
use crate::source::{ChunkSink, CollectionSource, ListOptions};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Messages into the driver task. Everything the engine reacts to
/// arrives through this one queue, in arrival order.
enum Input {
    Open(Option<Collection>),
    Refresh,
    Stop,
    Invalidate(ItemId),
    SetListOptions(ListOptions),
    SetTagFilter {
        tags: HashSet<TagId>,
        condition: TagMatch,
        show_untagged: bool,
    },
    SetRatingFilter {
        rating: i32,
        condition: RatingCondition,
    },
    SetMimeFilter(MimeFilter),
    SetDayFilter(HashSet<NaiveDate>),
    SetTextFilter(String),
    SetTextSearchFields(TextSearchFields),
    Change(ChangeEvent),
    JobChunk {
        ticket: JobTicket,
        records: Vec<ItemRecord>,
    },
    JobFinished {
        ticket: JobTicket,
        result: anyhow::Result<()>,
    },
    Snapshot(oneshot::Sender<Vec<PhotoItem>>),
    IsListing(oneshot::Sender<bool>),
    Shutdown,
}

struct RunningJob {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Handle to a running lister.
///
/// Cheap to clone; all clones feed the same driver task. Setters are
/// synchronous and only enqueue, so they are safe to call from
/// anywhere. They fail with [`EngineError::Closed`] once the lister has
/// been shut down.
#[derive(Clone)]
pub struct CollectionLister {
    inbox: mpsc::UnboundedSender<Input>,
    events: broadcast::Sender<ListerEvent>,
    driver: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CollectionLister {
    /// Build the engine and spawn its driver task.
    pub fn spawn(
        source: Arc<dyn CollectionSource>,
        context: Arc<dyn LibraryContext>,
        config: &ListerConfig,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(config.event_capacity);

        let core = ListerCore::new(context, config.refresh_delay(), config.filter_debounce());
        let driver = tokio::spawn(run_driver(
            core,
            source,
            inbox_rx,
            inbox_tx.clone(),
            events_tx.clone(),
        ));

        Self {
            inbox: inbox_tx,
            events: events_tx,
            driver: Arc::new(Mutex::new(Some(driver))),
        }
    }

    /// Subscribe to the lister's event stream. Events published after
    /// this call are delivered in order, at most once.
    pub fn subscribe(&self) -> broadcast::Receiver<ListerEvent> {
        self.events.subscribe()
    }

    /// Forward every change notification from the bus into this
    /// lister. The forwarder ends when the lister shuts down or the bus
    /// goes away.
    pub fn connect_changes(&self, bus: &EventBus) -> JoinHandle<()> {
        let mut subscriber = bus.subscribe();
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            while let Ok(event) = subscriber.recv().await {
                if inbox.send(Input::Change(event)).is_err() {
                    break;
                }
            }
        })
    }

    pub fn open(&self, collection: Option<Collection>) -> Result<(), EngineError> {
        self.send(Input::Open(collection))
    }

    pub fn refresh(&self) -> Result<(), EngineError> {
        self.send(Input::Refresh)
    }

    pub fn stop(&self) -> Result<(), EngineError> {
        self.send(Input::Stop)
    }

    pub fn invalidate(&self, id: ItemId) -> Result<(), EngineError> {
        self.send(Input::Invalidate(id))
    }

    pub fn set_list_options(&self, options: ListOptions) -> Result<(), EngineError> {
        self.send(Input::SetListOptions(options))
    }

    pub fn set_tag_filter(
        &self,
        tags: HashSet<TagId>,
        condition: TagMatch,
        show_untagged: bool,
    ) -> Result<(), EngineError> {
        self.send(Input::SetTagFilter {
            tags,
            condition,
            show_untagged,
        })
    }

    pub fn set_rating_filter(
        &self,
        rating: i32,
        condition: RatingCondition,
    ) -> Result<(), EngineError> {
        self.send(Input::SetRatingFilter { rating, condition })
    }

    pub fn set_mime_filter(&self, mime: MimeFilter) -> Result<(), EngineError> {
        self.send(Input::SetMimeFilter(mime))
    }

    pub fn set_day_filter(&self, days: HashSet<NaiveDate>) -> Result<(), EngineError> {
        self.send(Input::SetDayFilter(days))
    }

    pub fn set_text_filter(&self, text: impl Into<String>) -> Result<(), EngineError> {
        self.send(Input::SetTextFilter(text.into()))
    }

    pub fn set_text_search_fields(&self, fields: TextSearchFields) -> Result<(), EngineError> {
        self.send(Input::SetTextSearchFields(fields))
    }

    /// Current materialized list, observed between inbox messages.
    pub async fn snapshot(&self) -> Result<Vec<PhotoItem>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(Input::Snapshot(tx))?;
        rx.await.map_err(|_| EngineError::Closed)
    }

    pub async fn is_listing(&self) -> Result<bool, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(Input::IsListing(tx))?;
        rx.await.map_err(|_| EngineError::Closed)
    }

    /// Stop the driver task, cancelling any running job. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.inbox.send(Input::Shutdown);
        let handle = self.driver.lock().await.take();
        if let Some(handle) = handle
            && let Err(error) = handle.await
        {
            warn!(%error, "lister driver ended abnormally");
        }
    }

    fn send(&self, input: Input) -> Result<(), EngineError> {
        self.inbox.send(input).map_err(|_| EngineError::Closed)
    }
}

/// The driver task: owns the core, serializes inputs, fans events out
/// and executes effects. Sleeps until the earliest pending deadline
/// when one is armed.
async fn run_driver(
    mut core: ListerCore,
    source: Arc<dyn CollectionSource>,
    mut inbox: mpsc::UnboundedReceiver<Input>,
    job_tx: mpsc::UnboundedSender<Input>,
    events: broadcast::Sender<ListerEvent>,
) {
    let mut jobs: HashMap<JobTicket, RunningJob> = HashMap::new();

    loop {
        let deadline = core.next_deadline();

        let fired = tokio::select! {
            maybe = inbox.recv() => {
                match maybe {
                    Some(Input::Shutdown) | None => break,
                    Some(input) => {
                        dispatch(&mut core, input);
                        None
                    }
                }
            }
            _ = async {
                // Checked by the branch guard.
                tokio::time::sleep_until(deadline.unwrap().0).await
            }, if deadline.is_some() => deadline.map(|(_, kind)| kind),
        };

        if let Some(kind) = fired {
            match kind {
                DeadlineKind::Refresh => core.fire_refresh_deadline(),
                DeadlineKind::Recompute => core.fire_recompute_deadline(),
            }
        }

        for event in core.take_events() {
            // A send error only means nobody is listening right now.
            let _ = events.send(event);
        }

        for effect in core.take_effects() {
            match effect {
                Effect::StartJob {
                    ticket,
                    collection,
                    options,
                } => {
                    let job = start_job(&source, &job_tx, ticket, collection, options);
                    jobs.insert(ticket, job);
                }
                Effect::KillJob { ticket } => {
                    if let Some(job) = jobs.remove(&ticket) {
                        trace!(%ticket, "cancelling listing job");
                        job.token.cancel();
                        drop(job.handle);
                    }
                }
            }
        }

        // Forget bookkeeping for jobs the core no longer tracks.
        let current = core.current_ticket();
        jobs.retain(|ticket, _| Some(*ticket) == current);
    }

    debug!("lister driver stopping");
    for (_, job) in jobs.drain() {
        job.token.cancel();
    }
}

fn dispatch(core: &mut ListerCore, input: Input) {
    match input {
        Input::Open(collection) => core.open(collection),
        Input::Refresh => core.refresh(),
        Input::Stop => core.stop(),
        Input::Invalidate(id) => core.invalidate(id),
        Input::SetListOptions(options) => core.set_list_options(options),
        Input::SetTagFilter {
            tags,
            condition,
            show_untagged,
        } => core.set_tag_filter(tags, condition, show_untagged),
        Input::SetRatingFilter { rating, condition } => core.set_rating_filter(rating, condition),
        Input::SetMimeFilter(mime) => core.set_mime_filter(mime),
        Input::SetDayFilter(days) => core.set_day_filter(days),
        Input::SetTextFilter(text) => core.set_text_filter(text),
        Input::SetTextSearchFields(fields) => core.set_text_search_fields(fields),
        Input::Change(event) => core.handle_change(&event),
        Input::JobChunk { ticket, records } => core.job_chunk(ticket, records),
        Input::JobFinished { ticket, result } => core.job_finished(ticket, result),
        Input::Snapshot(reply) => {
            let _ = reply.send(core.items().to_vec());
        }
        Input::IsListing(reply) => {
            let _ = reply.send(core.is_listing());
        }
        // Handled by the driver loop before dispatch.
        Input::Shutdown => {}
    }
}

/// Spawn the fetch task for one ticket. Chunks and the terminal result
/// come back through the inbox; a stale ticket makes them inert.
fn start_job(
    source: &Arc<dyn CollectionSource>,
    job_tx: &mpsc::UnboundedSender<Input>,
    ticket: JobTicket,
    collection: Collection,
    options: ListOptions,
) -> RunningJob {
    let token = CancellationToken::new();

    let chunk_tx = job_tx.clone();
    let sink = ChunkSink::new(move |records| {
        chunk_tx.send(Input::JobChunk { ticket, records }).is_ok()
    });

    let source = Arc::clone(source);
    let job_token = token.clone();
    let done_tx = job_tx.clone();
    let handle = tokio::spawn(async move {
        let result = tokio::select! {
            result = source.list(collection, options, sink, job_token.clone()) => result,
            _ = job_token.cancelled() => Ok(()),
        };
        let _ = done_tx.send(Input::JobFinished { ticket, result });
    });

    RunningJob { token, handle }
}

use crate::context::LibraryContext;
use crate::events::{ChangeEvent, ChangePayload, ChangeScope, CollectionChangeset};
use crate::filters::{ItemFilter, MimeFilter, RatingCondition, TagMatch, TextSearchFields};
use crate::models::{Collection, ItemId, ItemRecord, JobTicket, PhotoItem, TagId};
use crate::source::ListOptions;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Recomputing over more rows than this gets a cost-hint log line.
const RECOMPUTE_BUSY_THRESHOLD: usize = 5000;

/// Everything a lister tells its subscribers.
///
/// Two planes: `ItemsAdded`/`ItemRemoved` describe the materialized
/// superset, the `Filtered*` variants describe the predicate-passing
/// subset. Both are fine-grained; no event ever implies a full rebuild.
#[derive(Debug, Clone, PartialEq)]
pub enum ListerEvent {
    /// The view was emptied (collection opened, closed or stopped).
    Cleared,
    /// Items appended to the materialized list, in arrival order.
    ItemsAdded(Vec<PhotoItem>),
    /// Subset of additions (or recompute move-ins) passing the filter.
    FilteredItemsAdded(Vec<PhotoItem>),
    /// An item left the materialized list.
    ItemRemoved(PhotoItem),
    /// An item left the filtered plane, by removal or by filter change.
    FilteredItemRemoved(PhotoItem),
    /// Whether any item currently passes the filter.
    FilterMatch(bool),
    /// Whether any item currently hits the text filter, independent of
    /// the other dimensions.
    TextFilterMatch(bool),
    /// A listing pass ended, successfully or not.
    Completed,
}

/// Side effects the driver task must carry out after a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartJob {
        ticket: JobTicket,
        collection: Collection,
        options: ListOptions,
    },
    KillJob {
        ticket: JobTicket,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListerState {
    Idle,
    Listing,
}

/// Which timer a pending deadline belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineKind {
    Refresh,
    Recompute,
}

/// The lister's state machine.
///
/// Purely synchronous: every input mutates state and appends to the
/// event outbox and effect list, nothing in here blocks or spawns. The
/// driver task feeds inputs in arrival order, drains the outbox to the
/// broadcast channel and executes the effects, so the core can be
/// exercised deterministically in tests without a runtime.
pub struct ListerCore {
    context: Arc<dyn LibraryContext>,
    refresh_delay: Duration,
    filter_debounce: Duration,

    filter: ItemFilter,
    options: ListOptions,
    collection: Option<Collection>,
    state: ListerState,
    refresh_pending: bool,

    items: Vec<PhotoItem>,
    index: HashSet<ItemId>,
    pending: HashMap<ItemId, PhotoItem>,
    invalidated: HashSet<ItemId>,
    matched: HashSet<ItemId>,

    current_ticket: Option<JobTicket>,
    next_ticket: u64,

    refresh_at: Option<Instant>,
    recompute_at: Option<Instant>,

    events: Vec<ListerEvent>,
    effects: Vec<Effect>,
}

impl ListerCore {
    pub fn new(
        context: Arc<dyn LibraryContext>,
        refresh_delay: Duration,
        filter_debounce: Duration,
    ) -> Self {
        Self {
            context,
            refresh_delay,
            filter_debounce,
            filter: ItemFilter::default(),
            options: ListOptions::default(),
            collection: None,
            state: ListerState::Idle,
            refresh_pending: false,
            items: Vec::new(),
            index: HashSet::new(),
            pending: HashMap::new(),
            invalidated: HashSet::new(),
            matched: HashSet::new(),
            current_ticket: None,
            next_ticket: 1,
            refresh_at: None,
            recompute_at: None,
            events: Vec::new(),
            effects: Vec::new(),
        }
    }

    // --- commands -------------------------------------------------------

    /// Point the lister at a collection, or at nothing.
    ///
    /// Always a full restart: the running job is killed, all view state
    /// is dropped and subscribers see `Cleared` before anything new.
    pub fn open(&mut self, collection: Option<Collection>) {
        self.kill_current_job();
        self.clear_view_state();
        self.events.push(ListerEvent::Cleared);
        self.collection = collection;

        match &self.collection {
            Some(collection) => {
                debug!(%collection, "opening collection");
                self.start_job();
            }
            None => {
                self.state = ListerState::Idle;
            }
        }
    }

    /// Re-list the open collection, reconciling instead of rebuilding.
    ///
    /// While a job is running this only marks the refresh as pending
    /// and arms the retry timer; the in-flight fetch is never killed
    /// for a refresh.
    pub fn refresh(&mut self) {
        match self.state {
            ListerState::Listing => {
                trace!("refresh requested while listing, deferring");
                self.refresh_pending = true;
                self.arm_refresh();
            }
            ListerState::Idle => {
                if self.collection.is_some() {
                    self.begin_refresh_cycle();
                }
            }
        }
    }

    /// Kill the job and drop all view state, keeping the collection
    /// selection.
    pub fn stop(&mut self) {
        self.kill_current_job();
        self.clear_view_state();
        self.events.push(ListerEvent::Cleared);
    }

    /// Mark an id stale. Takes effect during the next refresh cycle,
    /// either when the id reappears in the stream (confirmed deletion)
    /// or when it completes with the id still pending.
    pub fn invalidate(&mut self, id: ItemId) {
        trace!(%id, "invalidating item");
        self.invalidated.insert(id);
    }

    pub fn set_list_options(&mut self, options: ListOptions) {
        if self.options != options {
            self.options = options;
            self.refresh();
        }
    }

    // --- filter setters -------------------------------------------------

    pub fn set_tag_filter(
        &mut self,
        tags: HashSet<TagId>,
        condition: TagMatch,
        show_untagged: bool,
    ) {
        self.filter.tags = tags;
        self.filter.tag_condition = condition;
        self.filter.show_untagged = show_untagged;
        self.arm_recompute();
    }

    pub fn set_rating_filter(&mut self, rating: i32, condition: RatingCondition) {
        self.filter.rating = rating;
        self.filter.rating_condition = condition;
        self.arm_recompute();
    }

    pub fn set_mime_filter(&mut self, mime: MimeFilter) {
        self.filter.mime = mime;
        self.arm_recompute();
    }

    pub fn set_day_filter(&mut self, days: HashSet<NaiveDate>) {
        self.filter.days = days;
        self.arm_recompute();
    }

    pub fn set_text_filter(&mut self, text: String) {
        self.filter.text = text;
        self.arm_recompute();
    }

    pub fn set_text_search_fields(&mut self, fields: TextSearchFields) {
        self.filter.text_fields = fields;
        self.arm_recompute();
    }

    // --- job inputs -----------------------------------------------------

    /// One chunk of records from the fetch task. Chunks from any ticket
    /// other than the current one are dropped unseen.
    pub fn job_chunk(&mut self, ticket: JobTicket, records: Vec<ItemRecord>) {
        if self.current_ticket != Some(ticket) {
            trace!(%ticket, "dropping chunk from stale job");
            return;
        }

        let mut new_items = Vec::new();
        let mut new_filtered = Vec::new();

        for record in records {
            let id = ItemId::new(record.id);

            if let Some(previous) = self.pending.remove(&id) {
                // The id survived from the previous snapshot.
                if self.invalidated.remove(&id) {
                    // Explicitly marked stale and confirmed by the
                    // stream: a deletion, not a survivor.
                    self.remove_materialized(previous);
                } else if self.matched.contains(&id)
                    && !self.filter.matches(&previous, self.context.as_ref()).matches
                {
                    self.matched.remove(&id);
                    self.events.push(ListerEvent::FilteredItemRemoved(previous));
                }
                // Already materialized either way; never re-insert.
            } else if !self.index.contains(&id) {
                let tag_ids = self.context.tag_ids_for(id);
                let item = PhotoItem::from_record(record, tag_ids);
                if self.filter.matches(&item, self.context.as_ref()).matches {
                    self.matched.insert(id);
                    new_filtered.push(item.clone());
                }
                self.index.insert(id);
                self.items.push(item.clone());
                new_items.push(item);
            }
            // An id that is neither pending nor new repeated within
            // this stream; ignore the duplicate.
        }

        if !new_items.is_empty() {
            self.events.push(ListerEvent::ItemsAdded(new_items));
        }
        if !new_filtered.is_empty() {
            self.events.push(ListerEvent::FilteredItemsAdded(new_filtered));
        }

        // Re-evaluation is owed but never runs mid-stream.
        self.arm_recompute();
    }

    /// Terminal result of the fetch task.
    pub fn job_finished(&mut self, ticket: JobTicket, result: anyhow::Result<()>) {
        if self.current_ticket != Some(ticket) {
            trace!(%ticket, "dropping completion from stale job");
            return;
        }
        self.current_ticket = None;
        self.state = ListerState::Idle;

        match result {
            Ok(()) => {
                if !self.pending.is_empty() {
                    debug!(
                        count = self.pending.len(),
                        "removing items the refresh did not confirm"
                    );
                    let stale: Vec<PhotoItem> = self
                        .items
                        .iter()
                        .filter(|item| self.pending.contains_key(&item.id))
                        .cloned()
                        .collect();
                    for item in stale {
                        self.remove_materialized(item);
                    }
                }
            }
            Err(error) => {
                // A failed fetch proves nothing about deletions; keep
                // the materialized view as it was.
                warn!(%error, "listing failed, keeping view untouched");
            }
        }

        self.pending.clear();
        self.invalidated.clear();
        self.events.push(ListerEvent::Completed);
    }

    // --- timers ---------------------------------------------------------

    /// The refresh deadline fired.
    pub fn fire_refresh_deadline(&mut self) {
        self.refresh_at = None;
        match self.state {
            ListerState::Listing => {
                // Let the running job finish first.
                self.arm_refresh();
            }
            ListerState::Idle => {
                if self.collection.is_some() {
                    self.begin_refresh_cycle();
                } else {
                    self.refresh_pending = false;
                }
            }
        }
    }

    /// The filter debounce deadline fired.
    pub fn fire_recompute_deadline(&mut self) {
        self.recompute_at = None;
        if self.state == ListerState::Listing {
            // Never recompute against a collection mid-mutation.
            self.arm_recompute();
            return;
        }
        self.recompute();
    }

    // --- change notifications -------------------------------------------

    /// A library change arrived on the bus. Arms the refresh timer when
    /// the open collection may be affected; back-to-back notifications
    /// coalesce into one refresh.
    pub fn handle_change(&mut self, event: &ChangeEvent) {
        let Some(collection) = self.collection.clone() else {
            return;
        };

        let affected = match &event.payload {
            ChangePayload::Collection(changeset) => {
                self.collection_affected(&collection, changeset)
            }
            ChangePayload::Search(changeset) => {
                matches!(collection, Collection::Search { id } if id == changeset.search)
            }
        };

        if affected {
            trace!(
                kind = event.kind.as_str(),
                "change touches the open collection, scheduling refresh"
            );
            self.arm_refresh();
        }
    }

    fn collection_affected(
        &self,
        collection: &Collection,
        changeset: &CollectionChangeset,
    ) -> bool {
        match &changeset.scope {
            ChangeScope::Items(ids) => ids.iter().any(|id| self.index.contains(id)),
            ChangeScope::Container(album) => match collection {
                // Exact check only for a single physical album listed
                // without recursion; everything else is assumed
                // affected rather than checked expensively.
                Collection::Album { id } if !self.options.recurse_albums => id == album,
                _ => true,
            },
        }
    }

    // --- accessors ------------------------------------------------------

    pub fn state(&self) -> ListerState {
        self.state
    }

    pub fn is_listing(&self) -> bool {
        self.state == ListerState::Listing
    }

    pub fn refresh_pending(&self) -> bool {
        self.refresh_pending
    }

    pub fn collection(&self) -> Option<&Collection> {
        self.collection.as_ref()
    }

    pub fn filter(&self) -> &ItemFilter {
        &self.filter
    }

    pub fn items(&self) -> &[PhotoItem] {
        &self.items
    }

    pub fn matched_ids(&self) -> &HashSet<ItemId> {
        &self.matched
    }

    pub fn current_ticket(&self) -> Option<JobTicket> {
        self.current_ticket
    }

    /// Earliest pending deadline, if any, for the driver's sleep.
    pub fn next_deadline(&self) -> Option<(Instant, DeadlineKind)> {
        let refresh = self.refresh_at.map(|at| (at, DeadlineKind::Refresh));
        let recompute = self.recompute_at.map(|at| (at, DeadlineKind::Recompute));
        match (refresh, recompute) {
            (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    pub fn take_events(&mut self) -> Vec<ListerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // --- internals ------------------------------------------------------

    fn clear_view_state(&mut self) {
        self.items.clear();
        self.index.clear();
        self.pending.clear();
        self.invalidated.clear();
        self.matched.clear();
        self.refresh_pending = false;
        self.refresh_at = None;
        self.recompute_at = None;
    }

    fn kill_current_job(&mut self) {
        if let Some(ticket) = self.current_ticket.take() {
            self.effects.push(Effect::KillJob { ticket });
        }
        self.state = ListerState::Idle;
    }

    fn start_job(&mut self) {
        let Some(collection) = self.collection.clone() else {
            return;
        };
        let ticket = JobTicket::new(self.next_ticket);
        self.next_ticket += 1;
        self.current_ticket = Some(ticket);
        self.state = ListerState::Listing;
        trace!(%ticket, %collection, "starting listing job");
        self.effects.push(Effect::StartJob {
            ticket,
            collection,
            options: self.options,
        });
    }

    fn begin_refresh_cycle(&mut self) {
        self.refresh_pending = false;
        self.refresh_at = None;
        self.pending = self
            .items
            .iter()
            .map(|item| (item.id, item.clone()))
            .collect();
        self.kill_current_job();
        self.start_job();
    }

    fn arm_refresh(&mut self) {
        self.refresh_at = Some(Instant::now() + self.refresh_delay);
    }

    fn arm_recompute(&mut self) {
        self.recompute_at = Some(Instant::now() + self.filter_debounce);
    }

    /// Drop one item from every plane, emitting both removal events.
    fn remove_materialized(&mut self, item: PhotoItem) {
        if let Some(position) = self.items.iter().position(|i| i.id == item.id) {
            self.items.remove(position);
        }
        self.index.remove(&item.id);
        let was_matched = self.matched.remove(&item.id);
        self.events.push(ListerEvent::ItemRemoved(item.clone()));
        if was_matched {
            self.events.push(ListerEvent::FilteredItemRemoved(item));
        }
    }

    /// Re-partition the materialized list by the current predicate.
    fn recompute(&mut self) {
        if self.items.len() > RECOMPUTE_BUSY_THRESHOLD {
            debug!(count = self.items.len(), "recomputing filter over large collection");
        }

        let mut any_match = false;
        let mut any_text = false;
        let mut entering: Vec<PhotoItem> = Vec::new();
        let mut leaving: Vec<PhotoItem> = Vec::new();

        for item in &self.items {
            let result = self.filter.matches(item, self.context.as_ref());
            any_match |= result.matches;
            any_text |= result.found_text;

            let was_matched = self.matched.contains(&item.id);
            if result.matches && !was_matched {
                entering.push(item.clone());
            } else if !result.matches && was_matched {
                leaving.push(item.clone());
            }
        }

        for item in leaving {
            self.matched.remove(&item.id);
            self.events.push(ListerEvent::FilteredItemRemoved(item));
        }
        if !entering.is_empty() {
            for item in &entering {
                self.matched.insert(item.id);
            }
            self.events.push(ListerEvent::FilteredItemsAdded(entering));
        }

        self.events.push(ListerEvent::FilterMatch(any_match));
        self.events.push(ListerEvent::TextFilterMatch(any_text));
    }
}

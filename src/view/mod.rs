use crate::lister::ListerEvent;
use crate::models::{AlbumId, ItemId, PhotoItem};
use std::collections::HashMap;
use tracing::debug;

/// Inclusive range of row indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub begin: usize,
    pub end: usize,
}

impl RowRange {
    pub fn new(begin: usize, end: usize) -> Self {
        debug_assert!(begin <= end);
        Self { begin, end }
    }

    /// Number of rows covered. Inclusive bounds, so never zero.
    pub fn len(&self) -> usize {
        self.end - self.begin + 1
    }
}

/// Structural edits produced by one commit or direct mutation.
///
/// Removed ranges are already adjusted for one another: replaying them
/// in order against a copy of the previous rows, then appending, yields
/// the new rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewEdits {
    pub removed: Vec<RowRange>,
    pub appended: Vec<PhotoItem>,
}

impl ViewEdits {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.appended.is_empty()
    }
}

/// Row-level notifications for consumers that key off positions.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    RowsRemoved(Vec<RowRange>),
    RowsAppended(Vec<PhotoItem>),
}

/// Album-relative location of an item, for scanner-style lookups that
/// know a file before they know its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemPath {
    pub album: AlbumId,
    pub name: String,
}

impl ItemPath {
    fn of(item: &PhotoItem) -> Self {
        Self {
            album: item.album_id,
            name: item.name.clone(),
        }
    }
}

struct RefreshCycle {
    old_ids: HashMap<ItemId, usize>,
    incoming: Vec<PhotoItem>,
}

/// Ordered, id-indexed materialization of a collection.
///
/// Two ways to keep it current. [`apply`](Self::apply) mirrors a
/// lister's fine-grained events one to one; the lister already reduces
/// a refresh to per-item removals, so no extra bookkeeping is needed. A
/// refresh cycle (`begin_refresh` / `observe` / `complete_refresh`, or
/// [`reconcile`](Self::reconcile) in one call) instead diffs the rows
/// against a complete replacement list, reducing the difference to
/// contiguous removed ranges plus an appended tail so kept rows keep
/// their identity and relative order.
#[derive(Default)]
pub struct MaterializedView {
    rows: Vec<PhotoItem>,
    index_of: HashMap<ItemId, usize>,
    paths: HashMap<ItemPath, ItemId>,
    cycle: Option<RefreshCycle>,
}

impl MaterializedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn items(&self) -> &[PhotoItem] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&PhotoItem> {
        self.rows.get(index)
    }

    pub fn index_of(&self, id: ItemId) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index_of.contains_key(&id)
    }

    pub fn id_at_path(&self, path: &ItemPath) -> Option<ItemId> {
        self.paths.get(path).copied()
    }

    pub fn is_refreshing(&self) -> bool {
        self.cycle.is_some()
    }

    /// Open a reconciliation cycle against the current rows.
    pub fn begin_refresh(&mut self) {
        debug_assert!(self.cycle.is_none(), "refresh cycle already open");
        self.cycle = Some(RefreshCycle {
            old_ids: self.index_of.clone(),
            incoming: Vec::new(),
        });
    }

    /// Feed one item of the replacement stream into the open cycle.
    ///
    /// A known id marks the existing row as kept; an unknown one is
    /// queued for the appended tail. Ids must not repeat within a
    /// cycle.
    pub fn observe(&mut self, item: PhotoItem) {
        let Some(cycle) = self.cycle.as_mut() else {
            debug_assert!(false, "observe without an open refresh cycle");
            return;
        };

        let kept = cycle.old_ids.remove(&item.id).is_some();
        if !kept {
            debug_assert!(
                !self.index_of.contains_key(&item.id),
                "id observed twice in one refresh cycle"
            );
            cycle.incoming.push(item);
        }
    }

    /// Close the cycle: remove every row never re-observed, as minimal
    /// contiguous ranges in the original order, then append the new
    /// tail.
    pub fn complete_refresh(&mut self) -> ViewEdits {
        let Some(RefreshCycle { old_ids, incoming }) = self.cycle.take() else {
            return ViewEdits::default();
        };

        let mut stale: Vec<usize> = old_ids.into_values().collect();
        stale.sort_unstable();
        let ranges = coalesce(&stale);

        if !ranges.is_empty() {
            debug!(
                stale = stale.len(),
                ranges = ranges.len(),
                incoming = incoming.len(),
                "committing refresh cycle"
            );
        }

        let mut edits = ViewEdits::default();
        let mut offset = 0;
        for range in ranges {
            let adjusted = RowRange::new(range.begin - offset, range.end - offset);
            self.remove_rows(adjusted);
            offset += adjusted.len();
            edits.removed.push(adjusted);
        }

        edits.appended = incoming.clone();
        self.append_rows(incoming);
        edits
    }

    /// Replace the rows with `items` in one diffing pass. Equivalent to
    /// a full cycle fed from the list.
    pub fn reconcile(&mut self, items: Vec<PhotoItem>) -> ViewEdits {
        self.begin_refresh();
        for item in items {
            self.observe(item);
        }
        self.complete_refresh()
    }

    /// Append items outside any cycle.
    pub fn append(&mut self, items: Vec<PhotoItem>) -> ViewEdits {
        debug_assert!(self.cycle.is_none(), "direct append during a refresh cycle");
        let edits = ViewEdits {
            removed: Vec::new(),
            appended: items.clone(),
        };
        self.append_rows(items);
        edits
    }

    /// Remove one row by id, outside any cycle.
    pub fn remove(&mut self, id: ItemId) -> Option<RowRange> {
        debug_assert!(self.cycle.is_none(), "direct remove during a refresh cycle");
        let index = self.index_of(id)?;
        let range = RowRange::new(index, index);
        self.remove_rows(range);
        Some(range)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.index_of.clear();
        self.paths.clear();
        self.cycle = None;
    }

    /// Drive the view from a lister subscription.
    ///
    /// A lister's stream is already fine-grained, survivors of a
    /// refresh included, so mirroring it is enough; `Completed` carries
    /// no structural change of its own. Filtered-plane events never
    /// touch the materialized superset. Must not be mixed with an open
    /// refresh cycle.
    pub fn apply(&mut self, event: &ListerEvent) -> Vec<ViewEvent> {
        debug_assert!(self.cycle.is_none(), "apply during a refresh cycle");
        match event {
            ListerEvent::Cleared => {
                if self.rows.is_empty() {
                    return Vec::new();
                }
                let all = RowRange::new(0, self.rows.len() - 1);
                self.clear();
                vec![ViewEvent::RowsRemoved(vec![all])]
            }
            ListerEvent::ItemsAdded(items) => {
                if items.is_empty() {
                    return Vec::new();
                }
                let edits = self.append(items.clone());
                vec![ViewEvent::RowsAppended(edits.appended)]
            }
            ListerEvent::ItemRemoved(item) => match self.remove(item.id) {
                Some(range) => vec![ViewEvent::RowsRemoved(vec![range])],
                None => Vec::new(),
            },
            ListerEvent::Completed
            | ListerEvent::FilteredItemsAdded(_)
            | ListerEvent::FilteredItemRemoved(_)
            | ListerEvent::FilterMatch(_)
            | ListerEvent::TextFilterMatch(_) => Vec::new(),
        }
    }

    fn append_rows(&mut self, items: Vec<PhotoItem>) {
        for item in items {
            debug_assert!(!self.index_of.contains_key(&item.id), "duplicate row id");
            let index = self.rows.len();
            self.index_of.insert(item.id, index);
            self.paths.insert(ItemPath::of(&item), item.id);
            self.rows.push(item);
        }
    }

    fn remove_rows(&mut self, range: RowRange) {
        for item in &self.rows[range.begin..=range.end] {
            self.index_of.remove(&item.id);
            let path = ItemPath::of(item);
            if self.paths.get(&path) == Some(&item.id) {
                self.paths.remove(&path);
            }
        }
        self.rows.drain(range.begin..=range.end);
        for index in range.begin..self.rows.len() {
            self.index_of.insert(self.rows[index].id, index);
        }
    }
}

/// Coalesce ascending indices into maximal contiguous inclusive ranges.
fn coalesce(sorted: &[usize]) -> Vec<RowRange> {
    let mut ranges: Vec<RowRange> = Vec::new();
    for &index in sorted {
        match ranges.last_mut() {
            Some(last) if index == last.end + 1 => last.end = index,
            _ => ranges.push(RowRange::new(index, index)),
        }
    }
    ranges
}

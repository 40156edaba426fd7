use crate::models::{AlbumId, ItemId, SearchId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A library change notification as carried on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: String,
    pub kind: ChangeKind,
    pub payload: ChangePayload,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub origin: ChangeOrigin,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, payload: ChangePayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            payload,
            timestamp: chrono::Utc::now(),
            origin: ChangeOrigin::System,
            metadata: HashMap::new(),
        }
    }

    /// Build a collection changeset event with the kind derived from
    /// the operation.
    pub fn collection(changeset: CollectionChangeset) -> Self {
        let kind = match changeset.op {
            ChangesetOp::Added => ChangeKind::CollectionItemsAdded,
            ChangesetOp::Removed => ChangeKind::CollectionItemsRemoved,
            ChangesetOp::RemovedAll => ChangeKind::CollectionCleared,
        };
        Self::new(kind, ChangePayload::Collection(changeset))
    }

    pub fn search(changeset: SearchChangeset) -> Self {
        Self::new(ChangeKind::SearchChanged, ChangePayload::Search(changeset))
    }

    pub fn with_origin(mut self, origin: ChangeOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_metadata(mut self, key: String, value: serde_json::Value) -> Self {
        self.metadata.insert(key, value);
        self
    }
}

/// Routing axis for filtered subscriptions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeKind {
    CollectionItemsAdded,
    CollectionItemsRemoved,
    CollectionCleared,
    SearchChanged,
}

impl ChangeKind {
    /// String form for stats keys and routing.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::CollectionItemsAdded => "collection.items_added",
            ChangeKind::CollectionItemsRemoved => "collection.items_removed",
            ChangeKind::CollectionCleared => "collection.cleared",
            ChangeKind::SearchChanged => "search.changed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangePayload {
    Collection(CollectionChangeset),
    Search(SearchChangeset),
}

/// What happened to a collection's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangesetOp {
    Added,
    Removed,
    RemovedAll,
}

/// Which part of the library a collection change touches.
///
/// `Container` scopes the change to one physical album; `Items` names
/// the exact affected ids. Producers send whichever they know cheaply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeScope {
    Container(AlbumId),
    Items(HashSet<ItemId>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionChangeset {
    pub op: ChangesetOp,
    pub scope: ChangeScope,
}

impl CollectionChangeset {
    pub fn new(op: ChangesetOp, scope: ChangeScope) -> Self {
        Self { op, scope }
    }
}

/// A saved search's definition or result set changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchChangeset {
    pub search: SearchId,
}

/// Where a change originated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangeOrigin {
    System,
    Scanner(String),
    Ui(String),
    Maintenance(String),
}

impl ChangeOrigin {
    /// Short label naming the producer class, for filters and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeOrigin::System => "system",
            ChangeOrigin::Scanner(_) => "scanner",
            ChangeOrigin::Ui(_) => "ui",
            ChangeOrigin::Maintenance(_) => "maintenance",
        }
    }
}

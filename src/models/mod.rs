mod identifiers;

pub use identifiers::{AlbumId, AlbumRootId, ItemId, JobTicket, SearchId, TagId};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Coarse media class of an item, independent of the concrete format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Image,
    Video,
    Audio,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Image => "image",
            ItemCategory::Video => "video",
            ItemCategory::Audio => "audio",
        }
    }
}

/// One row as delivered by a [`crate::source::CollectionSource`].
///
/// This is the raw wire shape. Tag assignments are not part of it; the
/// lister resolves those through the library context when it turns a
/// record into a [`PhotoItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: i64,
    pub album_id: i32,
    pub album_root_id: i32,
    pub name: String,
    pub rating: i32,
    pub category: ItemCategory,
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub file_size: i64,
    pub width: i32,
    pub height: i32,
}

/// A single photo, video or audio entry of the library.
///
/// Identity is the numeric id alone. Two instances with the same id
/// compare equal even when their metadata differs, so a stale copy in a
/// view can stand in for a refreshed one until the next recompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoItem {
    pub id: ItemId,
    pub album_id: AlbumId,
    pub album_root_id: AlbumRootId,
    pub name: String,
    pub comment: Option<String>,
    pub rating: i32,
    pub category: ItemCategory,
    pub format: String,
    pub date_time: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub file_size: i64,
    pub width: i32,
    pub height: i32,
    pub tag_ids: HashSet<TagId>,
}

impl PartialEq for PhotoItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PhotoItem {}

impl std::hash::Hash for PhotoItem {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PhotoItem {
    pub fn from_record(record: ItemRecord, tag_ids: HashSet<TagId>) -> Self {
        Self {
            id: ItemId::new(record.id),
            album_id: AlbumId::new(record.album_id),
            album_root_id: AlbumRootId::new(record.album_root_id),
            name: record.name,
            comment: None,
            rating: record.rating,
            category: record.category,
            format: record.format,
            date_time: record.created_at,
            modified_at: record.modified_at,
            file_size: record.file_size,
            width: record.width,
            height: record.height,
            tag_ids,
        }
    }

    /// Rating with the unrated marker folded away. Anything below zero
    /// counts as zero stars.
    pub fn effective_rating(&self) -> i32 {
        self.rating.max(0)
    }

    /// Calendar day the item was taken on, in UTC.
    pub fn calendar_date(&self) -> NaiveDate {
        self.date_time.date_naive()
    }

    pub fn is_raw(&self) -> bool {
        self.format.starts_with("RAW-")
    }

    pub fn has_tag(&self, tag: TagId) -> bool {
        self.tag_ids.contains(&tag)
    }
}

/// What a lister is pointed at. Albums and tags are physical
/// containers, searches and date views are virtual ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collection {
    Album { id: AlbumId },
    Tag { id: TagId },
    Search { id: SearchId },
    Dates { days: BTreeSet<NaiveDate> },
}

impl Collection {
    pub fn is_virtual(&self) -> bool {
        matches!(self, Collection::Search { .. } | Collection::Dates { .. })
    }

    pub fn album_id(&self) -> Option<AlbumId> {
        match self {
            Collection::Album { id } => Some(*id),
            _ => None,
        }
    }

    pub fn tag_id(&self) -> Option<TagId> {
        match self {
            Collection::Tag { id } => Some(*id),
            _ => None,
        }
    }

    pub fn search_id(&self) -> Option<SearchId> {
        match self {
            Collection::Search { id } => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Album { id } => write!(f, "album({id})"),
            Collection::Tag { id } => write!(f, "tag({id})"),
            Collection::Search { id } => write!(f, "search({id})"),
            Collection::Dates { days } => write!(f, "dates({} days)", days.len()),
        }
    }
}

use crate::models::{AlbumId, ItemId, TagId};
use std::collections::HashSet;

/// Read-only window into the library metadata the engine does not own.
///
/// The lister materializes tag assignments through this at ingestion
/// time and the text predicate resolves comments, tag names and album
/// titles through it on demand. Implementations are expected to answer
/// from an in-memory cache; every call sits on the hot filtering path.
///
/// There is deliberately no global instance. Whoever constructs a
/// lister supplies the context it should see.
pub trait LibraryContext: Send + Sync {
    /// Tag ids assigned to the item. Empty set when untagged or unknown.
    fn tag_ids_for(&self, item: ItemId) -> HashSet<TagId>;

    /// Caption text for the item, if any has been stored.
    fn comment_for(&self, item: ItemId) -> Option<String>;

    /// Display name of a tag.
    fn tag_name(&self, tag: TagId) -> Option<String>;

    /// Title of an album.
    fn album_title(&self, album: AlbumId) -> Option<String>;
}

/// Context that knows nothing. Tag resolution yields empty sets and
/// every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyContext;

impl LibraryContext for EmptyContext {
    fn tag_ids_for(&self, _item: ItemId) -> HashSet<TagId> {
        HashSet::new()
    }

    fn comment_for(&self, _item: ItemId) -> Option<String> {
        None
    }

    fn tag_name(&self, _tag: TagId) -> Option<String> {
        None
    }

    fn album_title(&self, _album: AlbumId) -> Option<String> {
        None
    }
}

use async_trait::async_trait;
use lightbox::context::LibraryContext;
use lightbox::models::{AlbumId, Collection, ItemId, ItemRecord, TagId};
use lightbox::source::{ChunkSink, CollectionSource, ListOptions};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Source whose output is scripted per test. The script can be swapped
/// between listing passes, chunks can be delayed to hold a job open,
/// and errors can be injected.
pub struct ScriptedSource {
    chunks: Mutex<Vec<Vec<ItemRecord>>>,
    chunk_delay: Mutex<Duration>,
    error_mode: Mutex<Option<String>>,
    list_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
            chunk_delay: Mutex::new(Duration::ZERO),
            error_mode: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_records(records: Vec<ItemRecord>) -> Self {
        let source = Self::new();
        source.set_records(records);
        source
    }

    pub fn with_chunks(chunks: Vec<Vec<ItemRecord>>) -> Self {
        let source = Self::new();
        source.set_chunks(chunks);
        source
    }

    /// Replace the script with a single chunk, or with nothing when the
    /// records are empty.
    pub fn set_records(&self, records: Vec<ItemRecord>) {
        let chunks = if records.is_empty() {
            Vec::new()
        } else {
            vec![records]
        };
        self.set_chunks(chunks);
    }

    pub fn set_chunks(&self, chunks: Vec<Vec<ItemRecord>>) {
        *self.chunks.lock().unwrap() = chunks;
    }

    pub fn set_chunk_delay(&self, delay: Duration) {
        *self.chunk_delay.lock().unwrap() = delay;
    }

    pub fn inject_error(&self, error: &str) {
        *self.error_mode.lock().unwrap() = Some(error.to_string());
    }

    pub fn clear_error(&self) {
        *self.error_mode.lock().unwrap() = None;
    }

    /// How many listing passes have started.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectionSource for ScriptedSource {
    async fn list(
        &self,
        _collection: Collection,
        _options: ListOptions,
        sink: ChunkSink,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.error_mode.lock().unwrap().clone() {
            return Err(anyhow::anyhow!(error));
        }

        let chunks = self.chunks.lock().unwrap().clone();
        let delay = *self.chunk_delay.lock().unwrap();
        for chunk in chunks {
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Ok(()),
                }
            }
            if cancel.is_cancelled() {
                return Ok(());
            }
            if !sink.send(chunk) {
                break;
            }
        }
        Ok(())
    }
}

/// Metadata oracle backed by plain maps.
pub struct InMemoryContext {
    tags: Mutex<HashMap<ItemId, HashSet<TagId>>>,
    comments: Mutex<HashMap<ItemId, String>>,
    tag_names: Mutex<HashMap<TagId, String>>,
    album_titles: Mutex<HashMap<AlbumId, String>>,
}

impl InMemoryContext {
    pub fn new() -> Self {
        Self {
            tags: Mutex::new(HashMap::new()),
            comments: Mutex::new(HashMap::new()),
            tag_names: Mutex::new(HashMap::new()),
            album_titles: Mutex::new(HashMap::new()),
        }
    }

    pub fn tag_item(&self, item: ItemId, tag: TagId) {
        self.tags
            .lock()
            .unwrap()
            .entry(item)
            .or_default()
            .insert(tag);
    }

    pub fn set_comment(&self, item: ItemId, comment: &str) {
        self.comments
            .lock()
            .unwrap()
            .insert(item, comment.to_string());
    }

    pub fn name_tag(&self, tag: TagId, name: &str) {
        self.tag_names.lock().unwrap().insert(tag, name.to_string());
    }

    pub fn title_album(&self, album: AlbumId, title: &str) {
        self.album_titles
            .lock()
            .unwrap()
            .insert(album, title.to_string());
    }
}

impl LibraryContext for InMemoryContext {
    fn tag_ids_for(&self, item: ItemId) -> HashSet<TagId> {
        self.tags
            .lock()
            .unwrap()
            .get(&item)
            .cloned()
            .unwrap_or_default()
    }

    fn comment_for(&self, item: ItemId) -> Option<String> {
        self.comments.lock().unwrap().get(&item).cloned()
    }

    fn tag_name(&self, tag: TagId) -> Option<String> {
        self.tag_names.lock().unwrap().get(&tag).cloned()
    }

    fn album_title(&self, album: AlbumId) -> Option<String> {
        self.album_titles.lock().unwrap().get(&album).cloned()
    }
}

use crate::models::{Collection, ItemRecord};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Options for a listing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Include items of sub-albums when listing an album.
    pub recurse_albums: bool,
    /// Include items of sub-tags when listing a tag.
    pub recurse_tags: bool,
}

/// Receiving end of a listing job's record stream.
///
/// The lister hands one of these to [`CollectionSource::list`]; every
/// chunk pushed lands in the lister's inbox tagged with the job ticket.
/// `send` returns false once the consumer is gone, at which point the
/// source should stop producing.
pub struct ChunkSink {
    deliver: Box<dyn Fn(Vec<ItemRecord>) -> bool + Send + Sync>,
}

impl ChunkSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(Vec<ItemRecord>) -> bool + Send + Sync + 'static,
    {
        Self {
            deliver: Box::new(deliver),
        }
    }

    /// Sink draining into a plain channel, mostly useful in tests.
    pub fn from_sender(tx: mpsc::UnboundedSender<Vec<ItemRecord>>) -> Self {
        Self::new(move |chunk| tx.send(chunk).is_ok())
    }

    pub fn send(&self, chunk: Vec<ItemRecord>) -> bool {
        (self.deliver)(chunk)
    }
}

impl std::fmt::Debug for ChunkSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSink").finish_non_exhaustive()
    }
}

/// The record store a lister fetches from.
///
/// Implementations run inside the lister's job task. A listing streams
/// zero or more chunks through the sink and then returns exactly once;
/// the result is the job's terminal status. Cancellation is
/// cooperative: check the token between chunks and bail out early with
/// `Ok(())` when it fires (anything still buffered is discarded by
/// ticket comparison on the consumer side).
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Stream the records of a collection.
    async fn list(
        &self,
        collection: Collection,
        options: ListOptions,
        sink: ChunkSink,
        cancel: CancellationToken,
    ) -> Result<()>;
}

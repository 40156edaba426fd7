//! Live filtered collection views for a local photo library.
//!
//! The lister streams a collection's items through a filter predicate and
//! keeps listening for changes; the view mirrors the result set with
//! minimal row edits.

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod filters;
pub mod lister;
pub mod models;
pub mod source;
pub mod view;

pub use config::Config;
pub use context::{EmptyContext, LibraryContext};
pub use error::EngineError;
pub use events::EventBus;
pub use filters::{ItemFilter, MatchResult};
pub use lister::{CollectionLister, ListerEvent};
pub use models::{Collection, ItemRecord, PhotoItem};
pub use source::{ChunkSink, CollectionSource, ListOptions};
pub use view::{MaterializedView, RowRange, ViewEvent};

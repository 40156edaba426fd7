pub mod event_bus;
pub mod types;

pub use event_bus::{ChangeFilter, ChangeSubscriber, EventBus, EventBusStats};
pub use types::{
    ChangeEvent, ChangeKind, ChangeOrigin, ChangePayload, ChangeScope, ChangesetOp,
    CollectionChangeset, SearchChangeset,
};

pub mod classifier;
pub mod delta;
pub mod event;
pub mod snapshot;
pub mod store;

pub use classifier::{classify, Classification};
pub use delta::{ActivityDelta, CzBucket};
pub use event::{EventKind, GameEvent};
pub use snapshot::{FactionActivity, Snapshot, SystemActivity, SystemRef};
pub use store::{ActivityStore, History, StoreError, StoreEvent};

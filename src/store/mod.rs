//! Observable application state.
//!
//! A [`Store`] maps string keys to JSON values. Writes pass through a
//! middleware pipeline, then notify listeners subscribed to the key and then
//! those subscribed to every key. Snapshots can be persisted through a
//! [`StorageBackend`] and derived values are available via [`Computed`].

mod computed;
mod storage;
mod store;
mod subscription;

pub use computed::Computed;
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
pub use store::{
    Listener, Middleware, MiddlewareId, Snapshot, StateChange, Store, DEFAULT_MAX_NOTIFY_DEPTH,
};
pub use subscription::{Channel, Subscription};

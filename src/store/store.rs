use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::computed::Computed;
use super::storage::{MemoryStorage, StorageBackend};
use super::subscription::{Channel, Subscription};
use crate::error::{panic_message, StorageError, StoreError};

/// Point-in-time copy of every entry, in insertion order.
pub type Snapshot = Map<String, Value>;

/// Callback invoked for every change on a subscribed channel.
pub type Listener = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Value transformation stage run on every `set`, before commit.
///
/// Receives the key, the value produced by the previous stage and the value
/// currently stored. Returning an error aborts the write.
pub type Middleware =
    Arc<dyn Fn(&str, Value, Option<&Value>) -> Result<Value, StoreError> + Send + Sync>;

/// Default bound on nested writes issued from inside listeners.
pub const DEFAULT_MAX_NOTIFY_DEPTH: usize = 16;

/// A committed change, as seen by listeners.
///
/// `None` means the key was absent before (`old_value`) or has been
/// removed (`new_value`).
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub key: String,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

/// Handle returned by [`Store::add_middleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MiddlewareId(u64);

pub(super) struct ListenerEntry {
    id: u64,
    listener: Listener,
}

#[derive(Default)]
pub(super) struct Registry {
    keyed: HashMap<String, Vec<ListenerEntry>>,
    wildcard: Vec<ListenerEntry>,
}

impl Registry {
    fn find(&self, channel: &Channel, listener: &Listener) -> Option<u64> {
        let entries = match channel {
            Channel::Key(key) => self.keyed.get(key)?,
            Channel::All => &self.wildcard,
        };
        entries
            .iter()
            .find(|entry| same_listener(&entry.listener, listener))
            .map(|entry| entry.id)
    }

    fn insert(&mut self, channel: &Channel, entry: ListenerEntry) {
        match channel {
            Channel::Key(key) => self.keyed.entry(key.clone()).or_default().push(entry),
            Channel::All => self.wildcard.push(entry),
        }
    }

    fn remove(&mut self, channel: &Channel, id: u64) {
        match channel {
            Channel::Key(key) => {
                if let Some(entries) = self.keyed.get_mut(key) {
                    entries.retain(|entry| entry.id != id);
                    if entries.is_empty() {
                        self.keyed.remove(key);
                    }
                }
            }
            Channel::All => self.wildcard.retain(|entry| entry.id != id),
        }
    }

    /// Key listeners first, then wildcard listeners, each in subscription order.
    fn listeners_for(&self, key: &str) -> Vec<Listener> {
        self.keyed
            .get(key)
            .into_iter()
            .flatten()
            .chain(self.wildcard.iter())
            .map(|entry| Arc::clone(&entry.listener))
            .collect()
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

pub(super) struct StoreInner {
    entries: RwLock<Snapshot>,
    registry: RwLock<Registry>,
    middleware: RwLock<Vec<(MiddlewareId, Middleware)>>,
    storage: Arc<dyn StorageBackend>,
    next_id: AtomicU64,
    depth: AtomicUsize,
    max_notify_depth: usize,
}

impl StoreInner {
    pub(super) fn remove_listener(&self, channel: &Channel, id: u64) {
        self.registry.write().remove(channel, id);
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

struct DepthGuard<'a>(&'a AtomicUsize);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Observable key/value store for application state.
///
/// Cloning a `Store` yields another handle to the same state. Construct one
/// at start-up and pass it to whatever needs it.
///
/// # Examples
///
/// ```
/// use shopdesk::Store;
/// use serde_json::json;
///
/// let store = Store::new();
/// store.set("user", json!({ "name": "Ana" })).unwrap();
/// store.update("user", json!({ "role": "admin" })).unwrap();
///
/// assert_eq!(store.get("user"), Some(json!({ "name": "Ana", "role": "admin" })));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create an empty store backed by in-memory storage.
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()))
    }

    /// Create an empty store that persists through `storage`.
    pub fn with_storage(storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_options(storage, DEFAULT_MAX_NOTIFY_DEPTH)
    }

    /// Create a store with an explicit bound on nested listener writes.
    pub fn with_options(storage: Arc<dyn StorageBackend>, max_notify_depth: usize) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: RwLock::new(Map::new()),
                registry: RwLock::new(Registry::default()),
                middleware: RwLock::new(Vec::new()),
                storage,
                next_id: AtomicU64::new(0),
                depth: AtomicUsize::new(0),
                max_notify_depth: max_notify_depth.max(1),
            }),
        }
    }

    /// Get a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.entries.read().get(key).cloned()
    }

    /// Decode the value under `key` into `T`.
    ///
    /// Returns `None` when the key is absent or holds something else.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                debug!(key, %err, "stored value does not match requested type");
                None
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.read().keys().cloned().collect()
    }

    /// Store any serializable value under `key`.
    pub fn set<V: Serialize>(&self, key: &str, value: V) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.set_value(key, value)
    }

    /// Run `value` through the middleware pipeline, commit it, then notify.
    ///
    /// A middleware error leaves the store untouched and nobody is notified.
    pub fn set_value(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _depth = self.enter(key)?;
        let old_value = self.get(key);
        let value = self.apply_middleware(key, value, old_value.as_ref())?;

        self.inner
            .entries
            .write()
            .insert(key.to_string(), value.clone());

        self.notify(key, Some(value), old_value);
        Ok(())
    }

    /// Shallow-merge the fields of `partial` into the object under `key`.
    ///
    /// An absent (or null) current value counts as an empty object. Nested
    /// objects are replaced, not merged.
    pub fn update(&self, key: &str, partial: Value) -> Result<(), StoreError> {
        let Value::Object(patch) = partial else {
            return Err(StoreError::NotAnObject {
                key: key.to_string(),
                found: kind(&partial),
            });
        };

        let mut merged = match self.get(key) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(current)) => current,
            Some(other) => {
                return Err(StoreError::NotAnObject {
                    key: key.to_string(),
                    found: kind(&other),
                })
            }
        };
        merged.extend(patch);

        self.set_value(key, Value::Object(merged))
    }

    /// Remove `key`. Returns `Ok(false)` (and notifies nobody) if it was
    /// absent.
    ///
    /// Like `set`, a delete issued too deep inside listener callbacks is
    /// rejected before anything is removed.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let _depth = self.enter(key)?;
        let Some(old_value) = self.inner.entries.write().shift_remove(key) else {
            return Ok(false);
        };
        self.notify(key, None, Some(old_value));
        Ok(true)
    }

    /// Remove every entry, notifying each previous key with its old value.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _depth = self.enter("*")?;
        let previous = std::mem::take(&mut *self.inner.entries.write());
        for (key, old_value) in previous {
            self.notify(&key, None, Some(old_value));
        }
        Ok(())
    }

    /// Listen for changes to `key`.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.subscribe_listener(Channel::Key(key.to_string()), Arc::new(callback))
    }

    /// Listen for changes to every key.
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.subscribe_listener(Channel::All, Arc::new(callback))
    }

    /// Register a shared listener on `channel`.
    ///
    /// Registering the same `Arc` twice on one channel keeps a single entry;
    /// the returned handle refers to it.
    pub fn subscribe_listener(&self, channel: Channel, listener: Listener) -> Subscription {
        let mut registry = self.inner.registry.write();
        let id = match registry.find(&channel, &listener) {
            Some(existing) => existing,
            None => {
                let id = self.inner.next_id();
                registry.insert(&channel, ListenerEntry { id, listener });
                id
            }
        };
        drop(registry);

        Subscription::new(channel, id, Arc::downgrade(&self.inner))
    }

    /// Number of listeners registered for `key` (wildcards excluded).
    pub fn listener_count(&self, key: &str) -> usize {
        self.inner
            .registry
            .read()
            .keyed
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Number of keys with at least one dedicated listener.
    pub fn subscribed_keys(&self) -> usize {
        self.inner.registry.read().keyed.len()
    }

    /// Append a middleware stage.
    pub fn add_middleware<F>(&self, middleware: F) -> MiddlewareId
    where
        F: Fn(&str, Value, Option<&Value>) -> Result<Value, StoreError> + Send + Sync + 'static,
    {
        let id = MiddlewareId(self.inner.next_id());
        self.inner
            .middleware
            .write()
            .push((id, Arc::new(middleware)));
        id
    }

    /// Remove a middleware stage. Unknown ids are ignored.
    pub fn remove_middleware(&self, id: MiddlewareId) -> bool {
        let mut stages = self.inner.middleware.write();
        let before = stages.len();
        stages.retain(|(stage, _)| *stage != id);
        stages.len() != before
    }

    /// Shallow copy of the whole map.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.entries.read().clone()
    }

    /// Replace the contents with `snapshot`, setting each entry in order.
    pub fn load_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        self.clear()?;
        for (key, value) in snapshot {
            self.set_value(&key, value)?;
        }
        Ok(())
    }

    /// Write the current snapshot to storage under `storage_key`.
    pub fn try_persist(&self, storage_key: &str) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(&self.snapshot()).map_err(|source| StorageError::Malformed {
                key: storage_key.to_string(),
                source,
            })?;
        self.inner.storage.set_item(storage_key, &encoded)?;
        Ok(())
    }

    /// Like [`try_persist`](Self::try_persist), but logs failures instead of
    /// returning them.
    pub fn persist(&self, storage_key: &str) -> bool {
        match self.try_persist(storage_key) {
            Ok(()) => {
                debug!(storage_key, entries = self.len(), "state persisted");
                true
            }
            Err(err) => {
                error!(storage_key, %err, "failed to persist state");
                false
            }
        }
    }

    /// Load the snapshot stored under `storage_key`.
    ///
    /// Returns `Ok(false)` when nothing was stored.
    pub fn try_restore(&self, storage_key: &str) -> Result<bool, StoreError> {
        let Some(raw) = self.inner.storage.get_item(storage_key)? else {
            return Ok(false);
        };
        let snapshot: Snapshot =
            serde_json::from_str(&raw).map_err(|source| StorageError::Malformed {
                key: storage_key.to_string(),
                source,
            })?;
        self.load_snapshot(snapshot)?;
        Ok(true)
    }

    /// Like [`try_restore`](Self::try_restore), but logs failures.
    pub fn restore(&self, storage_key: &str) -> bool {
        match self.try_restore(storage_key) {
            Ok(true) => {
                debug!(storage_key, entries = self.len(), "state restored");
                true
            }
            Ok(false) => false,
            Err(err) => {
                error!(storage_key, %err, "failed to restore state");
                false
            }
        }
    }

    /// Drop a persisted snapshot.
    pub fn forget(&self, storage_key: &str) -> bool {
        match self.inner.storage.remove_item(storage_key) {
            Ok(()) => true,
            Err(err) => {
                error!(storage_key, %err, "failed to remove persisted state");
                false
            }
        }
    }

    /// Create a lazily evaluated value derived from `dependencies`.
    ///
    /// `compute` receives the current dependency values in the order given.
    pub fn computed<T, F>(&self, dependencies: &[&str], compute: F) -> Computed<T>
    where
        T: Clone,
        F: Fn(&[Option<Value>]) -> T + Send + Sync + 'static,
    {
        Computed::new(self.clone(), dependencies, compute)
    }

    fn enter(&self, key: &str) -> Result<DepthGuard<'_>, StoreError> {
        let depth = self.inner.depth.fetch_add(1, Ordering::SeqCst);
        let guard = DepthGuard(&self.inner.depth);
        if depth >= self.inner.max_notify_depth {
            warn!(key, depth, "nested state writes exceeded the notification bound");
            return Err(StoreError::NotifyDepthExceeded {
                key: key.to_string(),
                depth,
            });
        }
        Ok(guard)
    }

    fn apply_middleware(
        &self,
        key: &str,
        value: Value,
        old_value: Option<&Value>,
    ) -> Result<Value, StoreError> {
        let stages: Vec<Middleware> = self
            .inner
            .middleware
            .read()
            .iter()
            .map(|(_, stage)| Arc::clone(stage))
            .collect();

        stages
            .iter()
            .try_fold(value, |value, stage| stage(key, value, old_value))
    }

    fn notify(&self, key: &str, new_value: Option<Value>, old_value: Option<Value>) {
        let listeners = self.inner.registry.read().listeners_for(key);
        if listeners.is_empty() {
            return;
        }

        let change = StateChange {
            key: key.to_string(),
            new_value,
            old_value,
        };
        for listener in listeners {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(&change))) {
                error!(key, reason = %panic_message(payload.as_ref()), "state listener panicked");
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("entries", &self.len())
            .field("max_notify_depth", &self.inner.max_notify_depth)
            .finish_non_exhaustive()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn store_get_set() {
        let store = Store::new();
        assert_eq!(store.get("count"), None);

        store.set("count", 42).unwrap();
        assert_eq!(store.get("count"), Some(json!(42)));
        assert!(store.has("count"));

        store.set("count", 43).unwrap();
        assert_eq!(store.get_as::<i64>("count"), Some(43));
        assert_eq!(store.get_as::<String>("count"), None);
    }

    #[test]
    fn store_update_merges_one_level() {
        let store = Store::new();
        store
            .set("filters", json!({ "b": 2, "nested": { "x": 1, "y": 2 } }))
            .unwrap();

        store
            .update("filters", json!({ "a": 1, "nested": { "z": 3 } }))
            .unwrap();

        assert_eq!(
            store.get("filters"),
            Some(json!({ "b": 2, "nested": { "z": 3 }, "a": 1 }))
        );
    }

    #[test]
    fn store_update_absent_key_starts_empty() {
        let store = Store::new();
        store.update("prefs", json!({ "theme": "dark" })).unwrap();
        assert_eq!(store.get("prefs"), Some(json!({ "theme": "dark" })));
    }

    #[test]
    fn store_update_rejects_non_objects() {
        let store = Store::new();
        store.set("count", 1).unwrap();

        let err = store.update("count", json!({ "a": 1 })).unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject { found: "a number", .. }));

        let err = store.update("other", json!([1, 2])).unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject { found: "an array", .. }));
        assert!(!store.has("other"));
    }

    #[test]
    fn store_subscribe() {
        let store = Store::new();
        store.set("count", 1).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let subscription = store.subscribe("count", move |change| {
            seen_clone.lock().push(change.clone());
        });

        store.set("count", 2).unwrap();
        store.set("other", 9).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![StateChange {
                key: "count".into(),
                new_value: Some(json!(2)),
                old_value: Some(json!(1)),
            }]
        );

        subscription.unsubscribe();
        subscription.unsubscribe();
        store.set("count", 3).unwrap();
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(store.subscribed_keys(), 0);
    }

    #[test]
    fn key_listeners_run_before_wildcards() {
        let store = Store::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        let _all = store.subscribe_all(move |_| o.lock().push("all"));
        let o = order.clone();
        let _first = store.subscribe("k", move |_| o.lock().push("first"));
        let o = order.clone();
        let _second = store.subscribe("k", move |_| o.lock().push("second"));

        store.set("k", true).unwrap();
        assert_eq!(*order.lock(), vec!["first", "second", "all"]);
    }

    #[test]
    fn listener_sees_committed_value() {
        let store = Store::new();
        let observed = Arc::new(Mutex::new(None));

        let reader = store.clone();
        let o = observed.clone();
        let _sub = store.subscribe("k", move |_| *o.lock() = reader.get("k"));

        store.set("k", "v").unwrap();
        assert_eq!(*observed.lock(), Some(json!("v")));
    }

    #[test]
    fn same_listener_is_registered_once() {
        let store = Store::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let listener: Listener = Arc::new(move |_: &StateChange| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let first = store.subscribe_listener(Channel::Key("k".into()), listener.clone());
        let _second = store.subscribe_listener(Channel::Key("k".into()), listener);
        assert_eq!(store.listener_count("k"), 1);

        store.set("k", 1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        first.unsubscribe();
        assert_eq!(store.listener_count("k"), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let store = Store::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let _bad = store.subscribe("k", |_| panic!("render failed"));
        let c = calls.clone();
        let _good = store.subscribe("k", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = calls.clone();
        let _all = store.subscribe_all(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.set("k", 1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get("k"), Some(json!(1)));
    }

    #[test]
    fn middleware_runs_in_order() {
        let store = Store::new();
        store.add_middleware(|_, value, _| {
            Ok(json!(value.as_str().unwrap_or_default().trim().to_string()))
        });
        store.add_middleware(|_, value, old| {
            let previous = old.and_then(Value::as_str).unwrap_or("");
            Ok(json!(format!("{previous}{}", value.as_str().unwrap_or_default())))
        });

        store.set("name", "  ab ").unwrap();
        store.set("name", " c").unwrap();
        assert_eq!(store.get("name"), Some(json!("abc")));
    }

    #[test]
    fn middleware_error_aborts_write() {
        let store = Store::new();
        store.set("qty", 1).unwrap();
        let id = store.add_middleware(|key, value, _| {
            if value.as_i64().is_some_and(|n| n < 0) {
                return Err(StoreError::rejected(key, "negative quantity"));
            }
            Ok(value)
        });

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let _sub = store.subscribe("qty", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let err = store.set("qty", -4).unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        assert_eq!(store.get("qty"), Some(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(store.remove_middleware(id));
        assert!(!store.remove_middleware(id));
        store.set("qty", -4).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_notifies_with_old_value() {
        let store = Store::new();
        store.set("k", "v").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = store.subscribe("k", move |change| s.lock().push(change.clone()));

        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
        assert!(!store.has("k"));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].new_value, None);
        assert_eq!(seen.lock()[0].old_value, Some(json!("v")));
    }

    #[test]
    fn clear_reports_previous_values() {
        let store = Store::new();
        store.set("a", 1).unwrap();
        store.set("b", 2).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = store.subscribe_all(move |change| {
            s.lock().push((change.key.clone(), change.old_value.clone()));
        });

        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.get("a"), None);
        assert_eq!(
            *seen.lock(),
            vec![("a".to_string(), Some(json!(1))), ("b".to_string(), Some(json!(2)))]
        );
    }

    #[test]
    fn runaway_listener_writes_are_bounded() {
        let store = Store::with_options(Arc::new(MemoryStorage::new()), 4);
        let writer = store.clone();
        let failures = Arc::new(AtomicUsize::new(0));
        let f = failures.clone();
        let _sub = store.subscribe("n", move |change| {
            let next = change.new_value.as_ref().and_then(Value::as_i64).unwrap_or(0) + 1;
            if writer.set("n", next).is_err() {
                f.fetch_add(1, Ordering::SeqCst);
            }
        });

        store.set("n", 0).unwrap();
        assert_eq!(store.get("n"), Some(json!(3)));
        assert_eq!(failures.load(Ordering::SeqCst), 1);

        // depth counter is released afterwards
        store.set("n", 10).unwrap();
    }

    #[test]
    fn runaway_listener_deletes_are_bounded() {
        let store = Store::with_options(Arc::new(MemoryStorage::new()), 4);
        store.set("n", 0).unwrap();

        let writer = store.clone();
        let rejected = Arc::new(Mutex::new(Vec::new()));
        let r = rejected.clone();
        // A set is answered with a delete and a delete with a set.
        let sub = store.subscribe("n", move |change| {
            let result = match change.new_value {
                Some(_) => writer.delete("n").map(drop),
                None => writer.set("n", true),
            };
            if let Err(err) = result {
                r.lock().push(err);
            }
        });

        // delete, set, delete, set, then the fifth (a delete) is refused.
        assert!(store.delete("n").unwrap());
        assert_eq!(rejected.lock().len(), 1);
        assert!(matches!(
            &rejected.lock()[0],
            StoreError::NotifyDepthExceeded { key, depth: 4 } if key == "n"
        ));
        assert_eq!(store.get("n"), Some(json!(true)));

        // the guard is released once the chain unwinds
        sub.unsubscribe();
        assert!(store.delete("n").unwrap());
        assert!(!store.has("n"));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let store = Store::new();
        store.set("a", 1).unwrap();
        let snapshot = store.snapshot();
        store.set("a", 2).unwrap();
        assert_eq!(snapshot.get("a"), Some(&json!(1)));
    }

    #[test]
    fn load_snapshot_replaces_contents() {
        let store = Store::new();
        store.set("stale", true).unwrap();

        let mut snapshot = Snapshot::new();
        snapshot.insert("b".into(), json!(2));
        snapshot.insert("a".into(), json!({ "x": 1 }));
        store.load_snapshot(snapshot.clone()).unwrap();

        assert_eq!(store.snapshot(), snapshot);
        assert!(!store.has("stale"));
    }

    #[test]
    fn persist_then_restore() {
        let storage = Arc::new(MemoryStorage::new());
        let store = Store::with_storage(storage.clone());
        store.set("user", json!({ "name": "Ana" })).unwrap();
        assert!(store.persist("state"));

        let fresh = Store::with_storage(storage);
        assert_eq!(fresh.try_restore("missing").unwrap(), false);
        assert!(fresh.restore("state"));
        assert_eq!(fresh.get("user"), Some(json!({ "name": "Ana" })));

        assert!(fresh.forget("state"));
        assert!(!fresh.restore("state"));
    }

    #[test]
    fn malformed_snapshot_is_reported() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("state", "not json").unwrap();
        let store = Store::with_storage(storage);

        let err = store.try_restore("state").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Storage(StorageError::Malformed { .. })
        ));
        assert!(!store.restore("state"));
        assert!(store.is_empty());
    }
}

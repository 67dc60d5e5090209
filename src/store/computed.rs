use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::store::Store;
use super::subscription::Subscription;

type ComputeFn<T> = Box<dyn Fn(&[Option<Value>]) -> T + Send + Sync>;

/// A memoized value derived from store keys.
///
/// Any change to a dependency marks the value dirty; it is recomputed on the
/// next [`get`](Self::get), not eagerly. Call [`cleanup`](Self::cleanup)
/// once the value is no longer needed.
///
/// # Examples
///
/// ```
/// use shopdesk::Store;
///
/// let store = Store::new();
/// store.set("subtotal", 100).unwrap();
/// store.set("tax", 21).unwrap();
///
/// let total = store.computed(&["subtotal", "tax"], |values| {
///     values.iter().flatten().filter_map(|v| v.as_i64()).sum::<i64>()
/// });
/// assert_eq!(total.get(), 121);
///
/// store.set("tax", 0).unwrap();
/// assert_eq!(total.get(), 100);
/// total.cleanup();
/// ```
pub struct Computed<T> {
    store: Store,
    dependencies: Vec<String>,
    compute: ComputeFn<T>,
    cached: Mutex<Option<T>>,
    dirty: Arc<AtomicBool>,
    subscriptions: Vec<Subscription>,
}

impl<T: Clone> Computed<T> {
    pub(super) fn new<F>(store: Store, dependencies: &[&str], compute: F) -> Self
    where
        F: Fn(&[Option<Value>]) -> T + Send + Sync + 'static,
    {
        let dirty = Arc::new(AtomicBool::new(true));
        let subscriptions = dependencies
            .iter()
            .map(|key| {
                let dirty = Arc::clone(&dirty);
                store.subscribe(key, move |_| dirty.store(true, Ordering::SeqCst))
            })
            .collect();

        Self {
            store,
            dependencies: dependencies.iter().map(|key| key.to_string()).collect(),
            compute: Box::new(compute),
            cached: Mutex::new(None),
            dirty,
            subscriptions,
        }
    }

    /// Get the current value, recomputing only if a dependency changed.
    pub fn get(&self) -> T {
        if !self.dirty.load(Ordering::SeqCst) {
            if let Some(value) = self.cached.lock().as_ref() {
                return value.clone();
            }
        }

        let values: Vec<Option<Value>> = self
            .dependencies
            .iter()
            .map(|key| self.store.get(key))
            .collect();

        // Cleared first so a write made by `compute` itself re-dirties.
        self.dirty.store(false, Ordering::SeqCst);
        let value = (self.compute)(&values);
        *self.cached.lock() = Some(value.clone());
        value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Stop tracking dependencies. The last value stays cached.
    pub fn cleanup(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn sum_of(store: &Store, calls: Arc<AtomicUsize>) -> Computed<i64> {
        store.computed(&["a", "b"], move |values| {
            calls.fetch_add(1, Ordering::SeqCst);
            values.iter().flatten().filter_map(Value::as_i64).sum()
        })
    }

    #[test]
    fn computed_memoizes() {
        let store = Store::new();
        store.set("a", 1).unwrap();
        store.set("b", 2).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let sum = sum_of(&store, calls.clone());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sum.get(), 3);
        assert_eq!(sum.get(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.set("unrelated", json!("x")).unwrap();
        assert_eq!(sum.get(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn computed_recomputes_lazily_after_change() {
        let store = Store::new();
        store.set("a", 1).unwrap();
        store.set("b", 2).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let sum = sum_of(&store, calls.clone());
        sum.get();

        store.set("a", 10).unwrap();
        store.set("b", 20).unwrap();
        assert!(sum.is_dirty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(sum.get(), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cleanup_releases_subscriptions() {
        let store = Store::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let sum = sum_of(&store, calls);
        assert_eq!(store.listener_count("a"), 1);

        sum.cleanup();
        assert_eq!(store.subscribed_keys(), 0);

        sum.get();
        store.set("a", 5).unwrap();
        assert!(!sum.is_dirty());
        assert_eq!(sum.get(), 0);
    }
}

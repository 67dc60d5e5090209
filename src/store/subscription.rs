use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use super::store::StoreInner;

/// Where a listener is attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Changes to one key.
    Key(String),
    /// Changes to any key. Runs after the key's own listeners.
    All,
}

/// Handle for a registered listener.
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    channel: Channel,
    id: u64,
    store: Weak<StoreInner>,
    active: AtomicBool,
}

impl Subscription {
    pub(super) fn new(channel: Channel, id: u64, store: Weak<StoreInner>) -> Self {
        Self {
            channel,
            id,
            store,
            active: AtomicBool::new(true),
        }
    }

    /// Remove the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.remove_listener(&self.channel, self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("active", &self.is_active())
            .finish()
    }
}

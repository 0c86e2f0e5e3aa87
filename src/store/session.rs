use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

use super::types::{Session, SessionEvent};

/// Callback invoked on every session transition
pub type SessionListener = Arc<dyn Fn(SessionEvent, Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct HubState {
    current: Option<Session>,
    listeners: BTreeMap<u64, SessionListener>,
    next_id: u64,
}

/// Holds the current session and fans transitions out to subscribers.
///
/// Listeners run after the internal lock is released, so a listener may
/// query the hub again without deadlocking.
#[derive(Clone, Default)]
pub struct SessionHub {
    inner: Arc<Mutex<HubState>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Session> {
        self.lock().current.clone()
    }

    /// Replace the current session and notify every listener
    pub fn publish(&self, event: SessionEvent, session: Option<Session>) {
        let listeners: Vec<SessionListener> = {
            let mut state = self.lock();
            state.current = session.clone();
            state.listeners.values().cloned().collect()
        };
        debug!("Session event {:?} to {} listener(s)", event, listeners.len());
        for listener in listeners {
            listener(event, session.as_ref());
        }
    }

    pub fn subscribe(&self, listener: SessionListener) -> Subscription {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.insert(id, listener);
        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by `subscribe`; dropping it unsubscribes
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    hub: Weak<Mutex<HubState>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&self.id);
        }
    }
}

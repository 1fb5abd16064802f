use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::reconciler::{Reconciler, SyncReport};

/// Once-per-session background sync.
///
/// The first `trigger` claims the flag and spawns a pass; every later call
/// (repeated mount signals, retries from the client) is a no-op. The flag is
/// never reset, so a fresh session needs a fresh `AutoSync`.
#[derive(Debug, Default)]
pub struct AutoSync {
    started: AtomicBool,
}

impl AutoSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn trigger(&self, reconciler: Reconciler) -> Option<JoinHandle<Option<SyncReport>>> {
        self.spawn_once(async move { reconciler.sync_in_background().await })
    }

    /// Spawn `pass` if this is the first trigger, for passes that still have
    /// to resolve their store
    pub fn spawn_once<F>(&self, pass: F) -> Option<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        Some(tokio::spawn(pass))
    }
}

/// Auto-sync state per dashboard session, owned by the server.
///
/// Holds at most `capacity` sessions; registering one more forgets the
/// oldest. A forgotten session may run its pass again, which finds nothing
/// left to write.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<Sessions>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Sessions {
    by_key: HashMap<String, Arc<AutoSync>>,
    order: VecDeque<String>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl SessionRegistry {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            capacity: capacity.max(1),
        }
    }

    /// `tenant` alone when the client sends no session id
    pub fn session_key(tenant_db: &str, session_id: Option<&str>) -> String {
        match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => format!("{}:{}", tenant_db, id),
            None => tenant_db.to_string(),
        }
    }

    pub async fn session(&self, key: &str) -> Arc<AutoSync> {
        // Fast path: try read lock
        {
            let sessions = self.sessions.read().await;
            if let Some(auto_sync) = sessions.by_key.get(key) {
                return Arc::clone(auto_sync);
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(auto_sync) = sessions.by_key.get(key) {
            return Arc::clone(auto_sync);
        }

        while sessions.order.len() >= self.capacity {
            if let Some(oldest) = sessions.order.pop_front() {
                sessions.by_key.remove(&oldest);
                debug!("Forgot loan auto-sync session: {}", oldest);
            }
        }

        let auto_sync = Arc::new(AutoSync::new());
        sessions.by_key.insert(key.to_string(), Arc::clone(&auto_sync));
        sessions.order.push_back(key.to_string());
        info!("Registered loan auto-sync session: {}", key);
        auto_sync
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.by_key.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loans::clock::FixedClock;
    use crate::loans::store::MemoryLoanStore;
    use crate::testing::{active_loan, day};

    #[tokio::test]
    async fn runs_exactly_once_under_concurrent_triggers() {
        let loan = active_loan("2024-01-01", 15, 0, 12);
        let store = Arc::new(MemoryLoanStore::with_loans([loan.clone()]).await);
        let clock = Arc::new(FixedClock::new(day("2024-03-20")));
        let auto_sync = Arc::new(AutoSync::new());

        let attempts = (0..8).map(|_| {
            let auto_sync = auto_sync.clone();
            let reconciler = Reconciler::new(store.clone(), clock.clone());
            tokio::spawn(async move { auto_sync.trigger(reconciler) })
        });

        let mut handles = vec![];
        for attempt in futures::future::join_all(attempts).await {
            if let Some(handle) = attempt.unwrap() {
                handles.push(handle);
            }
        }
        assert_eq!(handles.len(), 1);
        assert!(auto_sync.has_started());

        let report = handles.pop().unwrap().await.unwrap().unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn swallows_fetch_failure() {
        let store = Arc::new(MemoryLoanStore::new());
        store.set_fail_fetch(true);
        let reconciler = Reconciler::new(store, Arc::new(FixedClock::new(day("2024-03-20"))));

        let handle = AutoSync::new().trigger(reconciler).unwrap();
        assert!(handle.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn registry_keeps_one_guard_per_session() {
        let registry = SessionRegistry::new();
        let key = SessionRegistry::session_key("tenant_a", Some("tab-1"));
        assert_eq!(key, "tenant_a:tab-1");
        assert_eq!(SessionRegistry::session_key("tenant_a", Some("  ")), "tenant_a");

        let first = registry.session(&key).await;
        let again = registry.session(&key).await;
        assert!(Arc::ptr_eq(&first, &again));

        registry.session("tenant_b").await;
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn registry_forgets_oldest_session_at_capacity() {
        let registry = SessionRegistry::with_capacity(3);

        let first = registry.session("tenant_a:0").await;
        first.spawn_once(async {});
        for i in 1..500 {
            registry.session(&format!("tenant_a:{}", i)).await;
        }
        assert_eq!(registry.len().await, 3);

        // Recent sessions keep their guard
        let recent = registry.session("tenant_a:499").await;
        assert!(Arc::ptr_eq(&recent, &registry.session("tenant_a:499").await));
        assert_eq!(registry.len().await, 3);

        // A forgotten session starts over with a fresh guard
        let again = registry.session("tenant_a:0").await;
        assert!(!Arc::ptr_eq(&first, &again));
        assert!(!again.has_started());
        assert_eq!(registry.len().await, 3);
    }
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::Dashboard;
use crate::store::{RemoteStore, StoreError};

/// Sessions untouched for this long are dropped and reloaded on next access.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

struct Session {
    dashboard: Dashboard,
    last_access: Instant,
}

/// Open dashboard sessions, one per user, loaded on first access.
pub struct DashboardRegistry {
    store: Arc<dyn RemoteStore>,
    grace_window: Duration,
    idle_timeout: Duration,
    sessions: DashMap<Uuid, Session>,
    last_sweep: Mutex<Instant>,
}

impl DashboardRegistry {
    pub fn new(store: Arc<dyn RemoteStore>, grace_window: Duration, idle_timeout: Duration) -> Self {
        Self {
            store,
            grace_window,
            idle_timeout,
            sessions: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn is_idle(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_access) >= self.idle_timeout
    }

    /// Returns the user's session, loading it from the store if none is open
    /// or the open one has gone idle.
    pub async fn session(&self, user_id: Uuid) -> Result<Dashboard, StoreError> {
        let now = Instant::now();
        self.sweep(now);

        if let Some(mut open) = self.sessions.get_mut(&user_id) {
            if !self.is_idle(&open, now) {
                open.last_access = now;
                return Ok(open.dashboard.clone());
            }
        }

        let loaded = Dashboard::load(Arc::clone(&self.store), user_id, self.grace_window).await?;
        let fresh = Session {
            dashboard: loaded,
            last_access: now,
        };
        // A concurrent first access may have won; keep it unless it has gone idle.
        let dashboard = match self.sessions.entry(user_id) {
            Entry::Occupied(mut occupied) => {
                if self.is_idle(occupied.get(), now) {
                    occupied.insert(fresh);
                } else {
                    occupied.get_mut().last_access = now;
                }
                occupied.get().dashboard.clone()
            }
            Entry::Vacant(vacant) => vacant.insert(fresh).dashboard.clone(),
        };
        Ok(dashboard)
    }

    /// The user's session if one is open and not idle. Never touches the store.
    pub fn loaded(&self, user_id: Uuid) -> Option<Dashboard> {
        let now = Instant::now();
        self.sessions
            .get(&user_id)
            .filter(|open| !self.is_idle(open, now))
            .map(|open| open.dashboard.clone())
    }

    /// Drops idle sessions, at most once per idle period.
    fn sweep(&self, now: Instant) {
        {
            let Ok(mut last) = self.last_sweep.lock() else {
                return;
            };
            if now.saturating_duration_since(*last) < self.idle_timeout {
                return;
            }
            *last = now;
        }

        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.is_idle(session, now));
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!(evicted, open = self.sessions.len(), "Evicted idle dashboard sessions");
        }
    }

    #[cfg(test)]
    fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}

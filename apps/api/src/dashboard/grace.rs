//! Delayed reordering after a status change.
//!
//! When a goal's status changes, sorts keep using the status it had before the
//! change until the window elapses. Entries are checked lazily against a
//! monotonic clock; nothing is scheduled.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::models::goal::GoalStatus;

pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy)]
struct GraceEntry {
    previous: GoalStatus,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct GraceWindow {
    window: Duration,
    entries: HashMap<Uuid, GraceEntry>,
}

impl GraceWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Holds `previous` as the sort status of `id` for one window starting at `now`.
    /// A second change inside the window replaces the entry and restarts the window.
    pub fn record(&mut self, id: Uuid, previous: GoalStatus, now: Instant) {
        self.prune(now);
        self.entries.insert(
            id,
            GraceEntry {
                previous,
                expires_at: now + self.window,
            },
        );
    }

    /// Status to sort `id` by at `now`: the held status while the window is open, else `live`.
    pub fn effective_status(&self, id: Uuid, live: GoalStatus, now: Instant) -> GoalStatus {
        match self.entries.get(&id) {
            Some(entry) if now < entry.expires_at => entry.previous,
            _ => live,
        }
    }

    #[cfg(test)]
    pub fn is_held(&self, id: Uuid, now: Instant) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|entry| now < entry.expires_at)
    }

    pub fn clear(&mut self, id: Uuid) {
        self.entries.remove(&id);
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn prune(&mut self, now: Instant) {
        self.entries.retain(|_, entry| now < entry.expires_at);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for GraceWindow {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_until_window_elapses() {
        let mut grace = GraceWindow::default();
        let id = Uuid::new_v4();
        let t = Instant::now();
        grace.record(id, GoalStatus::Doing, t);

        assert_eq!(grace.effective_status(id, GoalStatus::Done, t), GoalStatus::Doing);
        assert_eq!(
            grace.effective_status(id, GoalStatus::Done, t + Duration::from_millis(4999)),
            GoalStatus::Doing
        );
        assert_eq!(
            grace.effective_status(id, GoalStatus::Done, t + Duration::from_millis(5000)),
            GoalStatus::Done
        );
    }

    #[test]
    fn test_unknown_id_uses_live_status() {
        let grace = GraceWindow::default();
        let now = Instant::now();
        assert_eq!(
            grace.effective_status(Uuid::new_v4(), GoalStatus::ForLater, now),
            GoalStatus::ForLater
        );
    }

    #[test]
    fn test_rerecord_restarts_window() {
        let mut grace = GraceWindow::default();
        let id = Uuid::new_v4();
        let t = Instant::now();
        grace.record(id, GoalStatus::Doing, t);
        let later = t + Duration::from_millis(3000);
        grace.record(id, GoalStatus::OnTrack, later);

        let probe = t + Duration::from_millis(6000);
        assert!(grace.is_held(id, probe));
        assert_eq!(grace.effective_status(id, GoalStatus::Done, probe), GoalStatus::OnTrack);
    }

    #[test]
    fn test_prune_drops_expired() {
        let mut grace = GraceWindow::new(Duration::from_millis(10));
        let t = Instant::now();
        grace.record(Uuid::new_v4(), GoalStatus::Doing, t);
        grace.record(Uuid::new_v4(), GoalStatus::Doing, t + Duration::from_millis(8));
        grace.prune(t + Duration::from_millis(12));
        assert_eq!(grace.len(), 1);
    }
}

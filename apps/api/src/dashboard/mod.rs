//! Per-user dashboard session: the optimistic sync core.
//!
//! A [`Dashboard`] holds the user's goals, blessings and rewards in memory and
//! keeps them in step with the [`RemoteStore`]. Updates and deletes land in
//! local state at once and are persisted by a spawned task; a failed write
//! restores the captured entity unless a newer write to the same entity has
//! since been applied. Adds are awaited and only touch local state on success.
//!
//! Every entity carries a version number bumped on each local mutation. A
//! settling write compares the version it produced against the current one,
//! so out-of-order completions never roll back over newer changes.

pub mod grace;
pub mod handlers;
pub mod notify;
pub mod registry;
pub mod view;

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::blessing::{Blessing, NewBlessing};
use crate::models::goal::{Goal, GoalPatch, NewGoal};
use crate::models::reward::{NewReward, Reward, RewardPatch};
use crate::store::{RemoteStore, StoreError};

use grace::GraceWindow;
use notify::Notification;
use view::{
    compute_blessing_stats, compute_reward_summary, compute_stats, compute_view,
    resolve_goal_views, BlessingStats, GoalFilter, GoalStats, GoalView, RewardSummary, SortMode,
};

/// Deleted entities kept for undo.
pub const UNDO_LEDGER_CAPACITY: usize = 20;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0} {1} not found")]
    Unknown(&'static str, Uuid),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Persist(#[from] StoreError),

    #[error("undo token {0} is unknown or expired")]
    UnknownUndo(Uuid),
}

/// How a spawned write settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Confirmed,
    Deleted { undo_token: Option<Uuid> },
    /// The write failed and local state was restored.
    RolledBack,
    /// The write failed after a newer local change; local state was kept.
    Superseded,
    /// The persisting task ended without reporting.
    Abandoned,
}

/// An entity captured by a delete or returned by an undo.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "item", rename_all = "lowercase")]
pub enum Record {
    Goal(Goal),
    Blessing(Blessing),
    Reward(Reward),
}

/// The optimistic result of a mutation plus the task persisting it.
#[derive(Debug)]
pub struct PendingWrite<T> {
    pub entity: T,
    handle: JoinHandle<SyncOutcome>,
}

impl<T> PendingWrite<T> {
    /// Waits for the store to answer.
    pub async fn settled(self) -> SyncOutcome {
        self.handle.await.unwrap_or(SyncOutcome::Abandoned)
    }

    /// Lets the write finish in the background and returns the optimistic entity.
    pub fn detach(self) -> T {
        self.entity
    }
}

/// Collections a dashboard keeps in sync.
pub trait Synced: Clone + Send + Sync + 'static {
    const NOUN: &'static str;
    const LABEL: &'static str;

    fn id(&self) -> Uuid;
    fn items_mut(state: &mut DashboardState) -> &mut Vec<Self>;
    fn into_record(self) -> Record;
}

impl Synced for Goal {
    const NOUN: &'static str = "goal";
    const LABEL: &'static str = "Goal";

    fn id(&self) -> Uuid {
        self.id
    }
    fn items_mut(state: &mut DashboardState) -> &mut Vec<Self> {
        &mut state.goals
    }
    fn into_record(self) -> Record {
        Record::Goal(self)
    }
}

impl Synced for Blessing {
    const NOUN: &'static str = "blessing";
    const LABEL: &'static str = "Blessing";

    fn id(&self) -> Uuid {
        self.id
    }
    fn items_mut(state: &mut DashboardState) -> &mut Vec<Self> {
        &mut state.blessings
    }
    fn into_record(self) -> Record {
        Record::Blessing(self)
    }
}

impl Synced for Reward {
    const NOUN: &'static str = "reward";
    const LABEL: &'static str = "Reward";

    fn id(&self) -> Uuid {
        self.id
    }
    fn items_mut(state: &mut DashboardState) -> &mut Vec<Self> {
        &mut state.rewards
    }
    fn into_record(self) -> Record {
        Record::Reward(self)
    }
}

/// Everything a session owns. Collections are newest first.
#[derive(Debug)]
pub struct DashboardState {
    goals: Vec<Goal>,
    blessings: Vec<Blessing>,
    rewards: Vec<Reward>,
    grace: GraceWindow,
    versions: HashMap<Uuid, u64>,
    next_version: u64,
    notifications: Vec<Notification>,
    undo: VecDeque<(Uuid, Record)>,
}

impl DashboardState {
    fn new(grace_window: Duration) -> Self {
        Self {
            goals: Vec::new(),
            blessings: Vec::new(),
            rewards: Vec::new(),
            grace: GraceWindow::new(grace_window),
            versions: HashMap::new(),
            next_version: 0,
            notifications: Vec::new(),
            undo: VecDeque::new(),
        }
    }

    fn bump(&mut self, id: Uuid) -> u64 {
        self.next_version += 1;
        self.versions.insert(id, self.next_version);
        self.next_version
    }

    fn is_current(&self, id: Uuid, version: u64) -> bool {
        self.versions.get(&id) == Some(&version)
    }

    /// Outdates every write still in flight.
    fn invalidate_versions(&mut self) {
        for version in self.versions.values_mut() {
            self.next_version += 1;
            *version = self.next_version;
        }
    }

    fn push_undo(&mut self, token: Uuid, record: Record) {
        self.undo.push_back((token, record));
        while self.undo.len() > UNDO_LEDGER_CAPACITY {
            self.undo.pop_front();
        }
    }

    fn prepend<T: Synced>(&mut self, entity: T) {
        let id = entity.id();
        T::items_mut(self).insert(0, entity);
        self.bump(id);
    }

    fn replace<T: Synced>(&mut self, entity: T) -> bool {
        let id = entity.id();
        match T::items_mut(self).iter_mut().find(|e| e.id() == id) {
            Some(slot) => {
                *slot = entity;
                true
            }
            None => false,
        }
    }
}

/// A rendered dashboard: filtered and sorted goals plus header figures.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub goals: Vec<GoalView>,
    pub blessings: Vec<Blessing>,
    pub rewards: Vec<Reward>,
    pub stats: GoalStats,
    pub reward_summary: RewardSummary,
    pub blessing_stats: BlessingStats,
    pub notifications: Vec<Notification>,
}

struct BegunWrite<T> {
    snapshot: T,
    version: u64,
    grace_recorded: bool,
}

#[derive(Clone)]
pub struct Dashboard {
    user_id: Uuid,
    store: Arc<dyn RemoteStore>,
    state: Arc<Mutex<DashboardState>>,
}

impl Dashboard {
    /// Fetches the user's collections and opens a session over them.
    pub async fn load(
        store: Arc<dyn RemoteStore>,
        user_id: Uuid,
        grace_window: Duration,
    ) -> Result<Self, StoreError> {
        let dashboard = Self {
            user_id,
            store,
            state: Arc::new(Mutex::new(DashboardState::new(grace_window))),
        };
        dashboard.reload().await?;
        Ok(dashboard)
    }

    /// Replaces local state with a fresh fetch. Writes still in flight no longer roll back.
    pub async fn reload(&self) -> Result<(), StoreError> {
        let (goals, blessings, rewards) = tokio::try_join!(
            self.store.list_goals(self.user_id),
            self.store.list_blessings(self.user_id),
            self.store.list_rewards(self.user_id),
        )?;

        let mut state = self.state.lock().await;
        state.invalidate_versions();
        state.grace.clear_all();
        state.goals = goals;
        state.blessings = blessings;
        state.rewards = rewards;
        info!(
            user_id = %self.user_id,
            goals = state.goals.len(),
            blessings = state.blessings.len(),
            rewards = state.rewards.len(),
            "Dashboard loaded"
        );
        Ok(())
    }

    pub async fn goals(&self) -> Vec<Goal> {
        self.state.lock().await.goals.clone()
    }

    /// Drains pending toasts and celebrations.
    pub async fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut self.state.lock().await.notifications)
    }

    /// Renders the session at the current instant and drains notifications.
    pub async fn view(&self, filter: &GoalFilter, sort: SortMode) -> DashboardView {
        let mut state = self.state.lock().await;
        let at = Instant::now();
        state.grace.prune(at);
        DashboardView {
            goals: resolve_goal_views(
                compute_view(&state.goals, filter, sort, &state.grace, at, Utc::now()),
                &state.rewards,
            ),
            blessings: state.blessings.clone(),
            rewards: state.rewards.clone(),
            stats: compute_stats(&state.goals),
            reward_summary: compute_reward_summary(&state.goals, &state.rewards),
            blessing_stats: compute_blessing_stats(&state.blessings),
            notifications: std::mem::take(&mut state.notifications),
        }
    }

    /// Merges rows written outside the session (AI endpoints) into local state.
    pub async fn absorb_goals(&self, goals: Vec<Goal>) {
        let mut state = self.state.lock().await;
        for goal in goals {
            let id = goal.id;
            if state.replace(goal.clone()) {
                state.bump(id);
            } else {
                state.prepend(goal);
            }
        }
    }

    // ── Add ────────────────────────────────────────────────────────────────

    pub async fn add_goal(&self, mut new: NewGoal) -> Result<Goal, SyncError> {
        new.validate().map_err(SyncError::Invalid)?;
        if new.number.is_none() {
            let state = self.state.lock().await;
            new.number = Some(state.goals.iter().map(|g| g.number).max().unwrap_or(0) + 1);
        }
        new.year.get_or_insert_with(|| Utc::now().year());

        let result = self.store.insert_goal(self.user_id, &new).await;
        self.finish_add(result).await
    }

    pub async fn add_blessing(&self, new: NewBlessing) -> Result<Blessing, SyncError> {
        new.validate().map_err(SyncError::Invalid)?;
        let result = self.store.insert_blessing(self.user_id, &new).await;
        self.finish_add(result).await
    }

    pub async fn add_reward(&self, new: NewReward) -> Result<Reward, SyncError> {
        new.validate().map_err(SyncError::Invalid)?;
        let result = self.store.insert_reward(self.user_id, &new).await;
        self.finish_add(result).await
    }

    async fn finish_add<T: Synced>(&self, result: Result<T, StoreError>) -> Result<T, SyncError> {
        let mut state = self.state.lock().await;
        match result {
            Ok(entity) => {
                state.prepend(entity.clone());
                state
                    .notifications
                    .push(Notification::celebration(format!("New {} added!", T::NOUN)));
                state
                    .notifications
                    .push(Notification::success(format!("{} saved", T::LABEL)));
                Ok(entity)
            }
            Err(err) => {
                warn!(user_id = %self.user_id, "Failed to add {}: {err}", T::NOUN);
                state
                    .notifications
                    .push(Notification::error(format!("Failed to add {}", T::NOUN)));
                Err(err.into())
            }
        }
    }

    // ── Update ─────────────────────────────────────────────────────────────

    pub async fn update_goal(
        &self,
        id: Uuid,
        patch: GoalPatch,
    ) -> Result<PendingWrite<Goal>, SyncError> {
        if patch.is_empty() {
            return Err(SyncError::Invalid("no fields to update".to_string()));
        }
        self.update_goal_with(id, move |_| patch).await
    }

    /// Advances the goal to the next status in the cycle.
    pub async fn cycle_goal_status(&self, id: Uuid) -> Result<PendingWrite<Goal>, SyncError> {
        self.update_goal_with(id, |goal| GoalPatch::status(goal.status.next()))
            .await
    }

    pub async fn toggle_goal_pin(&self, id: Uuid) -> Result<PendingWrite<Goal>, SyncError> {
        self.update_goal_with(id, |goal| GoalPatch {
            pinned: Some(!goal.pinned),
            ..Default::default()
        })
        .await
    }

    /// Builds the patch from the current goal under the session lock, applies it, and
    /// spawns the persist.
    async fn update_goal_with(
        &self,
        id: Uuid,
        make_patch: impl FnOnce(&Goal) -> GoalPatch,
    ) -> Result<PendingWrite<Goal>, SyncError> {
        let (begun, optimistic, patch) = {
            let mut state = self.state.lock().await;
            let index = state
                .goals
                .iter()
                .position(|g| g.id == id)
                .ok_or(SyncError::Unknown(Goal::NOUN, id))?;
            let snapshot = state.goals[index].clone();
            let patch = make_patch(&snapshot);
            patch.validate().map_err(SyncError::Invalid)?;

            let mut updated = snapshot.clone();
            patch.apply(&mut updated);
            updated.updated_at = Utc::now();

            let grace_recorded = updated.status != snapshot.status;
            if grace_recorded {
                state.grace.record(id, snapshot.status, Instant::now());
                if updated.status.is_terminal() {
                    state
                        .notifications
                        .push(Notification::celebration(format!("Completed: {}", updated.goal)));
                }
            }

            state.goals[index] = updated.clone();
            let version = state.bump(id);
            let begun = BegunWrite {
                snapshot,
                version,
                grace_recorded,
            };
            (begun, updated, patch)
        };

        let store = Arc::clone(&self.store);
        let user_id = self.user_id;
        let handle = self.spawn_persist(id, begun, async move {
            store.update_goal(user_id, id, &patch).await
        });
        Ok(PendingWrite {
            entity: optimistic,
            handle,
        })
    }

    pub async fn update_reward(
        &self,
        id: Uuid,
        patch: RewardPatch,
    ) -> Result<PendingWrite<Reward>, SyncError> {
        patch.validate().map_err(SyncError::Invalid)?;
        let (begun, optimistic) = {
            let mut state = self.state.lock().await;
            let index = state
                .rewards
                .iter()
                .position(|r| r.id == id)
                .ok_or(SyncError::Unknown(Reward::NOUN, id))?;
            let snapshot = state.rewards[index].clone();
            let mut updated = snapshot.clone();
            patch.apply(&mut updated);
            state.rewards[index] = updated.clone();
            let version = state.bump(id);
            let begun = BegunWrite {
                snapshot,
                version,
                grace_recorded: false,
            };
            (begun, updated)
        };

        let store = Arc::clone(&self.store);
        let user_id = self.user_id;
        let handle = self.spawn_persist(id, begun, async move {
            store.update_reward(user_id, id, &patch).await
        });
        Ok(PendingWrite {
            entity: optimistic,
            handle,
        })
    }

    fn spawn_persist<T, F>(&self, id: Uuid, begun: BegunWrite<T>, persist: F) -> JoinHandle<SyncOutcome>
    where
        T: Synced,
        F: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let shared = Arc::clone(&self.state);
        let user_id = self.user_id;
        tokio::spawn(async move {
            let result = persist.await;
            let mut state = shared.lock().await;
            let current = state.is_current(id, begun.version);
            match result {
                Ok(saved) => {
                    if current {
                        state.replace(saved);
                    }
                    SyncOutcome::Confirmed
                }
                Err(err) => {
                    warn!(%user_id, %id, "Failed to update {}: {err}", T::NOUN);
                    state
                        .notifications
                        .push(Notification::error(format!("Failed to update {}", T::NOUN)));
                    if !current {
                        return SyncOutcome::Superseded;
                    }
                    state.replace(begun.snapshot);
                    if begun.grace_recorded {
                        state.grace.clear(id);
                    }
                    SyncOutcome::RolledBack
                }
            }
        })
    }

    // ── Delete and undo ────────────────────────────────────────────────────

    pub async fn delete_goal(&self, id: Uuid) -> Result<PendingWrite<Goal>, SyncError> {
        let store = Arc::clone(&self.store);
        let user_id = self.user_id;
        self.delete_entity(id, true, async move { store.delete_goal(user_id, id).await })
            .await
    }

    /// Deletes a blessing; `offer_undo` controls whether the deletion is kept for undo.
    pub async fn delete_blessing(
        &self,
        id: Uuid,
        offer_undo: bool,
    ) -> Result<PendingWrite<Blessing>, SyncError> {
        let store = Arc::clone(&self.store);
        let user_id = self.user_id;
        self.delete_entity(id, offer_undo, async move {
            store.delete_blessing(user_id, id).await
        })
        .await
    }

    pub async fn delete_reward(&self, id: Uuid) -> Result<PendingWrite<Reward>, SyncError> {
        let store = Arc::clone(&self.store);
        let user_id = self.user_id;
        self.delete_entity(id, true, async move { store.delete_reward(user_id, id).await })
            .await
    }

    async fn delete_entity<T, F>(
        &self,
        id: Uuid,
        offer_undo: bool,
        persist: F,
    ) -> Result<PendingWrite<T>, SyncError>
    where
        T: Synced,
        F: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        let (removed, version) = {
            let mut state = self.state.lock().await;
            let items = T::items_mut(&mut state);
            let index = items
                .iter()
                .position(|e| e.id() == id)
                .ok_or(SyncError::Unknown(T::NOUN, id))?;
            let removed = items.remove(index);
            (removed, state.bump(id))
        };

        let shared = Arc::clone(&self.state);
        let user_id = self.user_id;
        let captured = removed.clone();
        let handle = tokio::spawn(async move {
            let result = persist.await;
            let mut state = shared.lock().await;
            match result {
                Ok(()) => {
                    state.versions.remove(&id);
                    state.grace.clear(id);
                    if !offer_undo {
                        state
                            .notifications
                            .push(Notification::success(format!("{} deleted", T::LABEL)));
                        return SyncOutcome::Deleted { undo_token: None };
                    }
                    let token = Uuid::new_v4();
                    state.push_undo(token, captured.into_record());
                    state
                        .notifications
                        .push(Notification::with_undo(format!("{} deleted", T::LABEL), token));
                    SyncOutcome::Deleted {
                        undo_token: Some(token),
                    }
                }
                Err(err) => {
                    warn!(%user_id, %id, "Failed to delete {}: {err}", T::NOUN);
                    state
                        .notifications
                        .push(Notification::error(format!("Failed to delete {}", T::NOUN)));
                    if !state.is_current(id, version) {
                        return SyncOutcome::Superseded;
                    }
                    T::items_mut(&mut state).insert(0, captured);
                    SyncOutcome::RolledBack
                }
            }
        });

        Ok(PendingWrite {
            entity: removed,
            handle,
        })
    }

    /// Re-creates a deleted entity as a new row and prepends it.
    pub async fn undo(&self, token: Uuid) -> Result<Record, SyncError> {
        let record = {
            let mut state = self.state.lock().await;
            let position = state
                .undo
                .iter()
                .position(|(t, _)| *t == token)
                .ok_or(SyncError::UnknownUndo(token))?;
            state
                .undo
                .remove(position)
                .map(|(_, record)| record)
                .ok_or(SyncError::UnknownUndo(token))?
        };

        let result = match &record {
            Record::Goal(goal) => self
                .store
                .insert_goal(self.user_id, &goal.to_new_goal())
                .await
                .map(Record::Goal),
            Record::Blessing(blessing) => self
                .store
                .insert_blessing(self.user_id, &NewBlessing::from(blessing))
                .await
                .map(Record::Blessing),
            Record::Reward(reward) => self
                .store
                .insert_reward(self.user_id, &NewReward::from(reward))
                .await
                .map(Record::Reward),
        };

        let mut state = self.state.lock().await;
        match result {
            Ok(restored) => {
                let label = match &restored {
                    Record::Goal(goal) => {
                        state.prepend(goal.clone());
                        Goal::LABEL
                    }
                    Record::Blessing(blessing) => {
                        state.prepend(blessing.clone());
                        Blessing::LABEL
                    }
                    Record::Reward(reward) => {
                        state.prepend(reward.clone());
                        Reward::LABEL
                    }
                };
                state
                    .notifications
                    .push(Notification::success(format!("{label} restored")));
                Ok(restored)
            }
            Err(err) => {
                warn!(user_id = %self.user_id, "Failed to undo delete: {err}");
                state.push_undo(token, record);
                state
                    .notifications
                    .push(Notification::error("Failed to restore item"));
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
impl Dashboard {
    pub async fn goal(&self, id: Uuid) -> Option<Goal> {
        let state = self.state.lock().await;
        state.goals.iter().find(|g| g.id == id).cloned()
    }

    pub async fn blessings(&self) -> Vec<Blessing> {
        self.state.lock().await.blessings.clone()
    }
}

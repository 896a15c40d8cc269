//! Persistence adapter: the atomic primitives cycle/period lifecycle
//! management needs, plus an in-memory reference implementation.
//!
//! The real substrate (a document store with multi-field atomic updates
//! and array filters) is out of scope; this module defines the contract
//! as a trait so the rest of the engine never depends on a concrete
//! database. `InMemoryCycleStore` keeps its state in process-local
//! `HashMap`s the way a registry or validator might, scaled up so each
//! cycle document is behind its own lock, giving a single-writer-per-
//! document guarantee without ever holding a lock across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::{
    Attempt, Cycle, CycleStatus, OperationEntry, PeriodStatus, PeriodUserPlays, SocialPlatform,
    TotalsByUser,
};
use crate::{ChatterpointsError, Result};

/// Outcome of an idempotent operation-entry append.
#[derive(Debug, Clone)]
pub enum OperationAppendOutcome {
    Inserted(OperationEntry),
    AlreadyExists(OperationEntry),
}

#[async_trait]
pub trait CycleStore: Send + Sync {
    /// The OPEN cycle whose window contains `now`, if any.
    async fn find_open_cycle_within_window(&self, now: DateTime<Utc>) -> Result<Option<Cycle>>;

    /// An OPEN cycle scheduled to start in the future (`startAt > now`).
    async fn find_scheduled_open_cycle(&self, now: DateTime<Utc>) -> Result<Option<Cycle>>;

    /// The most recently created cycle, regardless of status.
    async fn find_last_cycle(&self) -> Result<Option<Cycle>>;

    async fn find_cycle_by_id(&self, cycle_id: &str) -> Result<Option<Cycle>>;

    /// Every cycle currently marked OPEN, for the background sweep.
    async fn list_open_cycles(&self) -> Result<Vec<Cycle>>;

    /// Every cycle (any status) whose `[startAt, endAt)` window
    /// intersects `[from, to]`, for cross-cycle history queries.
    async fn list_cycles_overlapping(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Cycle>>;

    /// Inserts a new cycle. Fails if `cycle.cycle_id` already exists.
    async fn create_cycle(&self, cycle: Cycle) -> Result<()>;

    /// Flips cycle status, conditional on its current status matching `expected`.
    /// Returns `true` if the flip happened.
    async fn set_cycle_status(
        &self,
        cycle_id: &str,
        expected: CycleStatus,
        new_status: CycleStatus,
    ) -> Result<bool>;

    /// Flips one period's status, conditional on its current status matching `expected`.
    async fn set_period_status(
        &self,
        cycle_id: &str,
        period_id: &str,
        expected: PeriodStatus,
        new_status: PeriodStatus,
    ) -> Result<bool>;

    /// Appends a scored attempt to a user's period subdocument, creating
    /// it if absent. Fails with `PeriodClosed` if the period isn't OPEN.
    /// Returns the updated per-user-per-period aggregate.
    async fn append_attempt(
        &self,
        cycle_id: &str,
        period_id: &str,
        user_id: &str,
        attempt: Attempt,
    ) -> Result<PeriodUserPlays>;

    /// Writes `{total, breakdown.games}` for a user, inserting a full row
    /// with the supplied `operations`/`social` if none exists yet.
    async fn upsert_totals_for_user(
        &self,
        cycle_id: &str,
        user_id: &str,
        games: i64,
        operations: i64,
        social: i64,
    ) -> Result<TotalsByUser>;

    /// Idempotent append keyed by `entry.operation_id`; also folds the
    /// entry's points into the user's totals row.
    async fn append_operation_entry(
        &self,
        cycle_id: &str,
        entry: OperationEntry,
    ) -> Result<OperationAppendOutcome>;

    /// Appends a social action only if `(user_id, platform)` hasn't been
    /// recorded yet in this cycle, folding `points` into the user's
    /// `breakdown.social` when it is. Returns `true` if inserted.
    async fn add_social_action(
        &self,
        cycle_id: &str,
        user_id: &str,
        platform: SocialPlatform,
        at: DateTime<Utc>,
        points: i64,
    ) -> Result<bool>;
}

/// Reference in-memory implementation: one `RwLock<Cycle>` per cycle
/// document behind an outer `RwLock<HashMap<..>>` for insertion.
#[derive(Default)]
pub struct InMemoryCycleStore {
    cycles: RwLock<HashMap<String, Arc<RwLock<Cycle>>>>,
}

impl InMemoryCycleStore {
    pub fn new() -> Self {
        Self {
            cycles: RwLock::new(HashMap::new()),
        }
    }

    async fn get_handle(&self, cycle_id: &str) -> Option<Arc<RwLock<Cycle>>> {
        self.cycles.read().await.get(cycle_id).cloned()
    }
}

#[async_trait]
impl CycleStore for InMemoryCycleStore {
    async fn find_open_cycle_within_window(&self, now: DateTime<Utc>) -> Result<Option<Cycle>> {
        let cycles = self.cycles.read().await;
        for handle in cycles.values() {
            let cycle = handle.read().await;
            if cycle.is_open_within(now) {
                return Ok(Some(cycle.clone()));
            }
        }
        Ok(None)
    }

    async fn find_scheduled_open_cycle(&self, now: DateTime<Utc>) -> Result<Option<Cycle>> {
        let cycles = self.cycles.read().await;
        for handle in cycles.values() {
            let cycle = handle.read().await;
            if cycle.status == CycleStatus::Open && cycle.start_at > now {
                return Ok(Some(cycle.clone()));
            }
        }
        Ok(None)
    }

    async fn find_last_cycle(&self) -> Result<Option<Cycle>> {
        let cycles = self.cycles.read().await;
        let mut latest: Option<Cycle> = None;
        for handle in cycles.values() {
            let cycle = handle.read().await;
            if latest.as_ref().map(|l| cycle.created_at > l.created_at).unwrap_or(true) {
                latest = Some(cycle.clone());
            }
        }
        Ok(latest)
    }

    async fn find_cycle_by_id(&self, cycle_id: &str) -> Result<Option<Cycle>> {
        match self.get_handle(cycle_id).await {
            Some(handle) => Ok(Some(handle.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_open_cycles(&self) -> Result<Vec<Cycle>> {
        let cycles = self.cycles.read().await;
        let mut out = Vec::new();
        for handle in cycles.values() {
            let cycle = handle.read().await;
            if cycle.status == CycleStatus::Open {
                out.push(cycle.clone());
            }
        }
        Ok(out)
    }

    async fn list_cycles_overlapping(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Cycle>> {
        let cycles = self.cycles.read().await;
        let mut out = Vec::new();
        for handle in cycles.values() {
            let cycle = handle.read().await;
            if cycle.start_at < to && from < cycle.end_at {
                out.push(cycle.clone());
            }
        }
        Ok(out)
    }

    async fn create_cycle(&self, cycle: Cycle) -> Result<()> {
        let mut cycles = self.cycles.write().await;
        if cycles.contains_key(&cycle.cycle_id) {
            return Err(ChatterpointsError::CycleConflict(format!(
                "cycle {} already exists",
                cycle.cycle_id
            )));
        }
        cycles.insert(cycle.cycle_id.clone(), Arc::new(RwLock::new(cycle)));
        Ok(())
    }

    async fn set_cycle_status(
        &self,
        cycle_id: &str,
        expected: CycleStatus,
        new_status: CycleStatus,
    ) -> Result<bool> {
        let handle = match self.get_handle(cycle_id).await {
            Some(h) => h,
            None => return Ok(false),
        };
        let mut cycle = handle.write().await;
        if cycle.status == expected {
            cycle.status = new_status;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn set_period_status(
        &self,
        cycle_id: &str,
        period_id: &str,
        expected: PeriodStatus,
        new_status: PeriodStatus,
    ) -> Result<bool> {
        let handle = match self.get_handle(cycle_id).await {
            Some(h) => h,
            None => return Ok(false),
        };
        let mut cycle = handle.write().await;
        match cycle.period_mut(period_id) {
            Some(period) if period.status == expected => {
                period.status = new_status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_attempt(
        &self,
        cycle_id: &str,
        period_id: &str,
        user_id: &str,
        attempt: Attempt,
    ) -> Result<PeriodUserPlays> {
        let handle = self
            .get_handle(cycle_id)
            .await
            .ok_or(ChatterpointsError::NoCycle)?;
        let mut cycle = handle.write().await;
        let at = attempt.at;
        let won = attempt.won();
        let points = attempt.points;
        let period = cycle
            .period_mut(period_id)
            .ok_or(ChatterpointsError::NoActivePeriod)?;
        if period.status != PeriodStatus::Open {
            return Err(ChatterpointsError::PeriodClosed);
        }
        let plays = period
            .plays
            .entry(user_id.to_string())
            .or_insert_with(|| PeriodUserPlays::new(user_id.to_string(), at));
        plays.attempts += 1;
        plays.total_points = plays.total_points.max(points);
        plays.won = won;
        plays.entries.push(attempt);
        plays.last_updated_at = at;
        Ok(plays.clone())
    }

    async fn upsert_totals_for_user(
        &self,
        cycle_id: &str,
        user_id: &str,
        games: i64,
        operations: i64,
        social: i64,
    ) -> Result<TotalsByUser> {
        let handle = self
            .get_handle(cycle_id)
            .await
            .ok_or(ChatterpointsError::NoCycle)?;
        let mut cycle = handle.write().await;
        let totals = cycle
            .totals_by_user
            .entry(user_id.to_string())
            .or_insert_with(|| {
                let mut totals = TotalsByUser::new(user_id.to_string());
                totals.breakdown.operations = operations;
                totals.breakdown.social = social;
                totals
            });
        totals.breakdown.games = games;
        totals.recompute_total();
        Ok(totals.clone())
    }

    async fn append_operation_entry(
        &self,
        cycle_id: &str,
        entry: OperationEntry,
    ) -> Result<OperationAppendOutcome> {
        let handle = self
            .get_handle(cycle_id)
            .await
            .ok_or(ChatterpointsError::NoCycle)?;
        let mut cycle = handle.write().await;
        if let Some(existing) = cycle
            .operations_entries
            .iter()
            .find(|e| e.operation_id == entry.operation_id)
        {
            return Ok(OperationAppendOutcome::AlreadyExists(existing.clone()));
        }
        let points = entry.points;
        cycle.operations_entries.push(entry.clone());
        let totals = cycle
            .totals_by_user
            .entry(entry.user_id.clone())
            .or_insert_with(|| TotalsByUser::new(entry.user_id.clone()));
        totals.breakdown.operations += points;
        totals.recompute_total();
        Ok(OperationAppendOutcome::Inserted(entry))
    }

    async fn add_social_action(
        &self,
        cycle_id: &str,
        user_id: &str,
        platform: SocialPlatform,
        at: DateTime<Utc>,
        points: i64,
    ) -> Result<bool> {
        let handle = self
            .get_handle(cycle_id)
            .await
            .ok_or(ChatterpointsError::NoCycle)?;
        let mut cycle = handle.write().await;
        let already_exists = cycle
            .social_actions
            .iter()
            .any(|a| a.user_id == user_id && a.platform == platform);
        if already_exists {
            return Ok(false);
        }
        cycle.social_actions.push(crate::model::SocialAction {
            user_id: user_id.to_string(),
            platform,
            at,
        });
        let totals = cycle
            .totals_by_user
            .entry(user_id.to_string())
            .or_insert_with(|| TotalsByUser::new(user_id.to_string()));
        totals.breakdown.social += points;
        totals.recompute_total();
        Ok(true)
    }
}

//! Lazy + periodic scheduler: keeps "exactly one OPEN period per game"
//! and "exactly one OPEN cycle whose window contains now" true on every
//! read.
//!
//! `resolve_active_period` is the authoritative state-transition
//! procedure a request calls before scoring a play. `maintain` is the
//! background equivalent: it sweeps every OPEN cycle unconditionally and
//! is safe to run concurrently with reads because every mutation is a
//! conditional atomic update through `CycleStore`.

use chrono::{DateTime, Utc};

use crate::model::{Cycle, CycleStatus, Period, PeriodStatus};
use crate::store::CycleStore;
use crate::{ChatterpointsError, Result};

/// Counts of state transitions performed during one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCounts {
    pub closed_periods: usize,
    pub opened_periods: usize,
}

/// Aggregate report for `maintainPeriodsAndCycles`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub closed_periods: usize,
    pub closed_cycles: usize,
    pub opened_periods: usize,
}

/// Resolves the active period for `(cycle_id, game_id)` at `now`,
/// performing whatever state transitions the 5-step resolution procedure
/// calls for. Returns `None` if there is no OPEN cycle, no matching game,
/// or the cycle has no periods left to offer (it gets closed in that case).
pub async fn resolve_active_period(
    store: &dyn CycleStore,
    cycle_id: &str,
    game_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Period>> {
    let cycle = match store.find_cycle_by_id(cycle_id).await? {
        Some(c) if c.status == CycleStatus::Open => c,
        _ => return Ok(None),
    };

    let (period, _counts) = advance_game_periods(store, &cycle, game_id, now).await?;
    if period.is_some() {
        return Ok(period);
    }

    maybe_close_cycle(store, cycle_id, now).await?;
    Ok(None)
}

/// Steps 2-5b of the scheduler procedure, scoped to one game within an
/// already-loaded OPEN cycle snapshot. Returns the resolved period (if
/// any) and a count of the transitions performed.
async fn advance_game_periods(
    store: &dyn CycleStore,
    cycle: &Cycle,
    game_id: &str,
    now: DateTime<Utc>,
) -> Result<(Option<Period>, SweepCounts)> {
    let mut counts = SweepCounts::default();
    let cycle_id = cycle.cycle_id.as_str();

    let open_for_game: Vec<&Period> = cycle
        .periods_for_game(game_id)
        .filter(|p| p.status == PeriodStatus::Open)
        .collect();

    let mut containing: Vec<&Period> = open_for_game
        .iter()
        .copied()
        .filter(|p| p.contains(now))
        .collect();

    // Step 3: a single unambiguous OPEN period covering now.
    if containing.len() == 1 {
        return Ok((Some(containing[0].clone()), counts));
    }

    // Step 4: recovery from multiple overlapping OPEN periods. Greatest
    // startAt wins; the rest are closed.
    if containing.len() > 1 {
        containing.sort_by_key(|p| p.start_at);
        let keep = containing.pop().unwrap();
        for stale in containing {
            if store
                .set_period_status(cycle_id, &stale.period_id, PeriodStatus::Open, PeriodStatus::Closed)
                .await?
            {
                counts.closed_periods += 1;
            }
        }
        return Ok((Some(keep.clone()), counts));
    }

    // Step 5: close every OPEN-but-expired period for this game.
    for expired in open_for_game.iter().filter(|p| p.has_expired(now)) {
        if store
            .set_period_status(cycle_id, &expired.period_id, PeriodStatus::Open, PeriodStatus::Closed)
            .await?
        {
            counts.closed_periods += 1;
        }
    }

    let all_for_game: Vec<&Period> = cycle.periods_for_game(game_id).collect();

    // Step 5a: a CLOSED period already covering now.
    if let Some(due) = all_for_game
        .iter()
        .find(|p| p.status == PeriodStatus::Closed && p.contains(now))
    {
        if store
            .set_period_status(cycle_id, &due.period_id, PeriodStatus::Closed, PeriodStatus::Open)
            .await?
        {
            counts.opened_periods += 1;
        }
        let mut opened = (*due).clone();
        opened.status = PeriodStatus::Open;
        return Ok((Some(opened), counts));
    }

    // Step 5b: pre-open the earliest future CLOSED period.
    let mut future: Vec<&Period> = all_for_game
        .iter()
        .copied()
        .filter(|p| p.status == PeriodStatus::Closed && p.start_at > now)
        .collect();
    if !future.is_empty() {
        future.sort_by_key(|p| p.start_at);
        let earliest = future[0];
        if store
            .set_period_status(cycle_id, &earliest.period_id, PeriodStatus::Closed, PeriodStatus::Open)
            .await?
        {
            counts.opened_periods += 1;
        }
        let mut opened = earliest.clone();
        opened.status = PeriodStatus::Open;
        return Ok((Some(opened), counts));
    }

    Ok((None, counts))
}

/// Step 5c: closes the cycle once every period is CLOSED and its window
/// has elapsed. Reads fresh state since `advance_game_periods` may have
/// just flipped periods for other games too.
async fn maybe_close_cycle(store: &dyn CycleStore, cycle_id: &str, now: DateTime<Utc>) -> Result<bool> {
    let cycle = match store.find_cycle_by_id(cycle_id).await? {
        Some(c) => c,
        None => return Ok(false),
    };
    if cycle.status != CycleStatus::Open {
        return Ok(false);
    }
    let all_closed = cycle.periods.iter().all(|p| p.status == PeriodStatus::Closed);
    if all_closed && cycle.end_at <= now {
        return store
            .set_cycle_status(cycle_id, CycleStatus::Open, CycleStatus::Closed)
            .await;
    }
    Ok(false)
}

/// Background sweep: advances every game in every currently OPEN cycle,
/// unconditionally. Safe to run concurrently with `resolve_active_period`
/// — every mutation is a conditional atomic update, so a lost race is a
/// no-op, not a double-transition. Errors encountered while sweeping one
/// cycle are logged and do not abort the sweep over the rest.
pub async fn maintain(store: &dyn CycleStore, now: DateTime<Utc>) -> Result<MaintenanceReport> {
    let mut report = MaintenanceReport::default();
    let open_cycles = store.list_open_cycles().await?;

    for cycle in open_cycles {
        let game_ids: Vec<String> = cycle.games.iter().map(|g| g.game_id.clone()).collect();
        for game_id in game_ids {
            match advance_game_periods(store, &cycle, &game_id, now).await {
                Ok((_, counts)) => {
                    report.closed_periods += counts.closed_periods;
                    report.opened_periods += counts.opened_periods;
                }
                Err(err) => {
                    tracing::warn!(cycle_id = %cycle.cycle_id, game_id = %game_id, error = %err, "scheduler sweep step failed");
                }
            }
        }

        match maybe_close_cycle(store, &cycle.cycle_id, now).await {
            Ok(true) => report.closed_cycles += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(cycle_id = %cycle.cycle_id, error = %err, "cycle close check failed");
            }
        }
    }

    crate::telemetry::record_maintenance_sweep(
        report.closed_periods,
        report.closed_cycles,
        report.opened_periods,
    );

    Ok(report)
}

/// Resolves the OPEN cycle containing `now`, failing with `NoCycle` if
/// none exists. `createCycle` and admin endpoints surface this as an
/// error rather than a benign response.
pub async fn require_open_cycle(store: &dyn CycleStore, now: DateTime<Utc>) -> Result<Cycle> {
    store
        .find_open_cycle_within_window(now)
        .await?
        .ok_or(ChatterpointsError::NoCycle)
}

//! History and stats read models: `getUserHistory`, `getStats`,
//! `getCyclePlays`, `getCycleGamesInfo` — read-only projections over the
//! data model, carrying no invariants beyond faithfully reflecting
//! current store state.

use chrono::{DateTime, Utc};

use crate::external::DisplayLabelProvider;
use crate::model::{
    Attempt, Cycle, CycleStatus, GameType, OperationEntry, PeriodStatus, SocialAction,
    SocialPlatform,
};
use crate::scheduler;
use crate::store::CycleStore;
use crate::{ChatterpointsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryCategory {
    Games,
    Operations,
    Social,
    Prizes,
}

pub struct UserHistoryRequest {
    pub user_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub include: Vec<HistoryCategory>,
    pub game_types: Vec<GameType>,
    pub platforms: Vec<SocialPlatform>,
    pub game_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct GameHistoryEntry {
    pub cycle_id: String,
    pub period_id: String,
    pub game_id: String,
    pub attempt: Attempt,
}

#[derive(Debug, Clone)]
pub struct PrizeHistoryEntry {
    pub cycle_id: String,
    pub position: usize,
    pub prize: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryTotals {
    pub games: i64,
    pub operations: i64,
    pub social: i64,
    pub grand_total: i64,
}

pub struct UserHistoryResponse {
    pub include: Vec<HistoryCategory>,
    pub window: (DateTime<Utc>, DateTime<Utc>),
    pub games: Option<Vec<GameHistoryEntry>>,
    pub operations: Option<Vec<OperationEntry>>,
    pub social: Option<Vec<SocialAction>>,
    pub prizes: Option<Vec<PrizeHistoryEntry>>,
    pub totals: HistoryTotals,
}

/// `getUserHistory`: replays a user's
/// periods, operation entries, and social actions across every cycle
/// whose window intersects `[from, to]`, filtered by the requested game
/// types/platforms/game ids.
pub async fn get_user_history(
    store: &dyn CycleStore,
    request: &UserHistoryRequest,
) -> Result<UserHistoryResponse> {
    let cycles = store.list_cycles_overlapping(request.from, request.to).await?;

    let wants = |c: HistoryCategory| request.include.is_empty() || request.include.contains(&c);

    let mut games = Vec::new();
    let mut operations = Vec::new();
    let mut social = Vec::new();
    let mut prizes = Vec::new();
    let mut totals = HistoryTotals::default();

    for cycle in &cycles {
        if wants(HistoryCategory::Games) {
            for period in &cycle.periods {
                if let Some(ids) = &request.game_ids {
                    if !ids.contains(&period.game_id) {
                        continue;
                    }
                }
                if !request.game_types.is_empty() {
                    let matches_type = cycle
                        .game(&period.game_id)
                        .map(|g| request.game_types.contains(&g.config.game_type()))
                        .unwrap_or(false);
                    if !matches_type {
                        continue;
                    }
                }
                if let Some(plays) = period.plays.get(&request.user_id) {
                    for attempt in &plays.entries {
                        if attempt.at < request.from || attempt.at > request.to {
                            continue;
                        }
                        games.push(GameHistoryEntry {
                            cycle_id: cycle.cycle_id.clone(),
                            period_id: period.period_id.clone(),
                            game_id: period.game_id.clone(),
                            attempt: attempt.clone(),
                        });
                    }
                }
            }
        }

        if wants(HistoryCategory::Operations) {
            for entry in &cycle.operations_entries {
                if entry.user_id != request.user_id {
                    continue;
                }
                if entry.at < request.from || entry.at > request.to {
                    continue;
                }
                operations.push(entry.clone());
            }
        }

        if wants(HistoryCategory::Social) {
            for action in &cycle.social_actions {
                if action.user_id != request.user_id {
                    continue;
                }
                if !request.platforms.is_empty() && !request.platforms.contains(&action.platform) {
                    continue;
                }
                if action.at < request.from || action.at > request.to {
                    continue;
                }
                social.push(action.clone());
            }
        }

        if let Some(user_totals) = cycle.totals_by_user.get(&request.user_id) {
            totals.games += user_totals.breakdown.games;
            totals.operations += user_totals.breakdown.operations;
            totals.social += user_totals.breakdown.social;
        }

        if wants(HistoryCategory::Prizes) {
            let board = crate::aggregator::get_leaderboard(store, Some(&cycle.cycle_id), cycle.podium_prizes.len())
                .await?;
            if let Some(entry) = board.entries.iter().find(|e| e.user_id == request.user_id) {
                prizes.push(PrizeHistoryEntry {
                    cycle_id: cycle.cycle_id.clone(),
                    position: entry.position,
                    prize: entry.prize,
                });
            }
        }
    }
    totals.grand_total = totals.games + totals.operations + totals.social;

    Ok(UserHistoryResponse {
        include: request.include.clone(),
        window: (request.from, request.to),
        games: wants(HistoryCategory::Games).then_some(games),
        operations: wants(HistoryCategory::Operations).then_some(operations),
        social: wants(HistoryCategory::Social).then_some(social),
        prizes: wants(HistoryCategory::Prizes).then_some(prizes),
        totals,
    })
}

#[derive(Debug, Clone)]
pub struct StatsResponse {
    pub cycle_id: String,
    pub period_id: Option<String>,
    pub cycle_range: (DateTime<Utc>, DateTime<Utc>),
    pub period_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub user_id: String,
    pub user_profile: String,
    pub total_points: i64,
    pub detailed_points: HistoryTotals,
    pub periods_played: u32,
    pub wins: u32,
}

/// `getStats(cycleId?, userId)`: single-cycle, single-user
/// snapshot. Resolves the active period for display context, sums
/// `detailedPoints` from the totals row, counts `periodsPlayed`/`wins`
/// by scanning the cycle's periods, and resolves `userProfile` through
/// the caller's `DisplayLabelProvider` (the user directory is out of
/// scope for this crate).
pub async fn get_stats(
    store: &dyn CycleStore,
    label_provider: &dyn DisplayLabelProvider,
    cycle_id: Option<&str>,
    user_id: &str,
    active_game_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<StatsResponse> {
    let cycle = match cycle_id {
        Some(id) => store.find_cycle_by_id(id).await?.ok_or(ChatterpointsError::NoCycle)?,
        None => store.find_last_cycle().await?.ok_or(ChatterpointsError::NoCycle)?,
    };

    let active_period = match active_game_id {
        Some(game_id) => scheduler::resolve_active_period(store, &cycle.cycle_id, game_id, now).await?,
        None => None,
    };

    let totals = cycle.totals_by_user.get(user_id);
    let detailed_points = HistoryTotals {
        games: totals.map(|t| t.breakdown.games).unwrap_or(0),
        operations: totals.map(|t| t.breakdown.operations).unwrap_or(0),
        social: totals.map(|t| t.breakdown.social).unwrap_or(0),
        grand_total: totals.map(|t| t.total).unwrap_or(0),
    };

    let mut periods_played = 0u32;
    let mut wins = 0u32;
    for period in &cycle.periods {
        if let Some(plays) = period.plays.get(user_id) {
            periods_played += 1;
            if plays.won {
                wins += 1;
            }
        }
    }

    let user_profile = label_provider.get_display_label(user_id).await?;

    Ok(StatsResponse {
        cycle_id: cycle.cycle_id.clone(),
        period_id: active_period.as_ref().map(|p| p.period_id.clone()),
        cycle_range: (cycle.start_at, cycle.end_at),
        period_range: active_period.as_ref().map(|p| (p.start_at, p.end_at)),
        user_id: user_id.to_string(),
        user_profile,
        total_points: detailed_points.grand_total,
        detailed_points,
        periods_played,
        wins,
    })
}

#[derive(Debug, Clone)]
pub struct CyclePlaysResponse {
    pub cycle_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub cycle_status: CycleStatus,
    pub plays: Vec<String>,
}

/// `getCyclePlays(cycleId?, userId?)`: a formatted attempt
/// listing. Returns `None` (a 404-equivalent) when the cycle or
/// requested user has no plays.
pub async fn get_cycle_plays(
    store: &dyn CycleStore,
    cycle_id: Option<&str>,
    user_id: Option<&str>,
) -> Result<Option<CyclePlaysResponse>> {
    let cycle = match cycle_id {
        Some(id) => store.find_cycle_by_id(id).await?,
        None => store.find_last_cycle().await?,
    };
    let cycle = match cycle {
        Some(c) => c,
        None => return Ok(None),
    };

    let mut lines = Vec::new();
    for period in &cycle.periods {
        let mut plays: Vec<_> = period.plays.iter().collect();
        if let Some(uid) = user_id {
            plays.retain(|(id, _)| id.as_str() == uid);
        }
        plays.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (user, user_plays) in plays {
            for attempt in &user_plays.entries {
                lines.push(format!(
                    "{} | {} | attempt#{} | guess={} | points={} | won={}",
                    period.game_id, user, attempt.attempt_number, attempt.guess, attempt.points, attempt.won
                ));
            }
        }
    }

    if lines.is_empty() {
        return Ok(None);
    }

    Ok(Some(CyclePlaysResponse {
        cycle_id: cycle.cycle_id,
        start_at: cycle.start_at,
        end_at: cycle.end_at,
        cycle_status: cycle.status,
        plays: lines,
    }))
}

#[derive(Debug, Clone)]
pub struct GameSummary {
    pub game_id: String,
    pub game_type: GameType,
    pub word_length: u8,
}

#[derive(Debug, Clone)]
pub struct PeriodSummary {
    pub period_id: String,
    pub game_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: PeriodStatus,
}

#[derive(Debug, Clone)]
pub struct GamesInfoResponse {
    pub cycle_id: String,
    pub status: CycleStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub games: Vec<GameSummary>,
    pub periods: Vec<PeriodSummary>,
}

/// `getCycleGamesInfo()`: snapshot of the latest cycle's
/// games and periods, no scoring involved.
pub async fn get_cycle_games_info(store: &dyn CycleStore) -> Result<GamesInfoResponse> {
    let cycle: Cycle = store.find_last_cycle().await?.ok_or(ChatterpointsError::NoCycle)?;
    Ok(GamesInfoResponse {
        cycle_id: cycle.cycle_id.clone(),
        status: cycle.status,
        start_at: cycle.start_at,
        end_at: cycle.end_at,
        games: cycle
            .games
            .iter()
            .map(|g| GameSummary {
                game_id: g.game_id.clone(),
                game_type: g.config.game_type(),
                word_length: g.config.word_length(),
            })
            .collect(),
        periods: cycle
            .periods
            .iter()
            .map(|p| PeriodSummary {
                period_id: p.period_id.clone(),
                game_id: p.game_id.clone(),
                start_at: p.start_at,
                end_at: p.end_at,
                status: p.status,
            })
            .collect(),
    })
}

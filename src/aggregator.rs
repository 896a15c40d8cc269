//! Totals aggregation and leaderboard.

use chrono::{DateTime, Utc};

use crate::model::{Cycle, TotalsByUser};
use crate::store::CycleStore;
use crate::{ChatterpointsError, Result};

/// Recomputes and persists `games`/`total` for one user after a play
/// attempt: sums `totalPoints` across every period in the cycle, keeps
/// whatever `operations`/`social` the totals row already carries.
pub async fn recompute_user_totals(
    store: &dyn CycleStore,
    cycle_id: &str,
    user_id: &str,
) -> Result<TotalsByUser> {
    let cycle = store
        .find_cycle_by_id(cycle_id)
        .await?
        .ok_or(ChatterpointsError::NoCycle)?;

    let games: i64 = cycle
        .periods
        .iter()
        .filter_map(|p| p.plays.get(user_id))
        .map(|plays| plays.total_points)
        .sum();

    let existing = cycle.totals_by_user.get(user_id);
    let operations = existing.map(|t| t.breakdown.operations).unwrap_or(0);
    let social = existing.map(|t| t.breakdown.social).unwrap_or(0);

    store
        .upsert_totals_for_user(cycle_id, user_id, games, operations, social)
        .await
}

#[derive(Debug, Clone)]
pub struct LeaderboardEntry {
    pub position: usize,
    pub user_id: String,
    pub points: i64,
    pub prize: f64,
}

#[derive(Debug, Clone)]
pub struct Leaderboard {
    pub cycle_id: String,
    pub cycle_start_at: DateTime<Utc>,
    pub cycle_end_at: DateTime<Utc>,
    pub entries: Vec<LeaderboardEntry>,
}

fn total_attempts_in_cycle(cycle: &Cycle, user_id: &str) -> u32 {
    cycle
        .periods
        .iter()
        .filter_map(|p| p.plays.get(user_id))
        .map(|plays| plays.attempts)
        .sum()
}

/// `getLeaderboard(cycleId?, top)`: resolves the cycle
/// (latest if `cycle_id` is `None`), filters to `total > 0`, sorts by
/// `(total desc, totalAttemptsInCycle asc)`, and assigns podium prizes by
/// rank.
pub async fn get_leaderboard(
    store: &dyn CycleStore,
    cycle_id: Option<&str>,
    top: usize,
) -> Result<Leaderboard> {
    let cycle = match cycle_id {
        Some(id) => store
            .find_cycle_by_id(id)
            .await?
            .ok_or(ChatterpointsError::NoCycle)?,
        None => store.find_last_cycle().await?.ok_or(ChatterpointsError::NoCycle)?,
    };

    let mut ranked: Vec<(&TotalsByUser, u32)> = cycle
        .totals_by_user
        .values()
        .filter(|t| t.total > 0)
        .map(|t| (t, total_attempts_in_cycle(&cycle, &t.user_id)))
        .collect();

    ranked.sort_by(|(a, a_attempts), (b, b_attempts)| {
        b.total.cmp(&a.total).then(a_attempts.cmp(b_attempts))
    });

    let entries = ranked
        .into_iter()
        .take(top)
        .enumerate()
        .map(|(index, (totals, _attempts))| LeaderboardEntry {
            position: index + 1,
            user_id: totals.user_id.clone(),
            points: totals.total,
            prize: cycle.podium_prizes.get(index).copied().unwrap_or(0.0),
        })
        .collect();

    Ok(Leaderboard {
        cycle_id: cycle.cycle_id,
        cycle_start_at: cycle.start_at,
        cycle_end_at: cycle.end_at,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Attempt, CycleStatus, Game, GameConfig, Period, PeriodStatus, PeriodUserPlays,
        PeriodWindow, PeriodWord, TimeUnit, WordleSettings, WordlePoints,
    };
    use crate::store::InMemoryCycleStore;
    use chrono::Duration;
    use std::collections::HashMap;

    fn wordle_config() -> GameConfig {
        GameConfig::Wordle {
            settings: WordleSettings {
                period_window: PeriodWindow { unit: TimeUnit::Days, value: 1 },
                word_length: 7,
                attempts_per_user_per_period: 6,
                efficiency_penalty: 1,
            },
            points: WordlePoints { victory_base: 10, letter_exact: 2, letter_present: 1 },
        }
    }

    fn cycle_with_two_users(now: DateTime<Utc>) -> Cycle {
        let mut plays = HashMap::new();
        let mut alice = PeriodUserPlays::new("alice".to_string(), now);
        alice.total_points = 9;
        alice.attempts = 2;
        alice.entries.push(Attempt {
            guess: "journey".into(),
            points: 9,
            won: true,
            result: Some("GGGGGGG".into()),
            at: now,
            attempt_number: 2,
            display_info: None,
        });
        plays.insert("alice".to_string(), alice);

        let mut bob = PeriodUserPlays::new("bob".to_string(), now);
        bob.total_points = 9;
        bob.attempts = 1;
        plays.insert("bob".to_string(), bob);

        Cycle {
            cycle_id: "cycle-1".to_string(),
            status: CycleStatus::Open,
            start_at: now - Duration::hours(1),
            end_at: now + Duration::days(7),
            podium_prizes: vec![15.0, 7.0, 3.0],
            games: vec![Game {
                game_id: "wordle".to_string(),
                config: wordle_config(),
                enabled: true,
                used_words: vec![],
            }],
            operations_config: vec![],
            operations_entries: vec![],
            periods: vec![Period {
                period_id: "period-1".to_string(),
                game_id: "wordle".to_string(),
                index: 0,
                word: PeriodWord::default(),
                start_at: now - Duration::hours(1),
                end_at: now + Duration::days(1),
                status: PeriodStatus::Open,
                plays,
            }],
            social_actions: vec![],
            totals_by_user: HashMap::new(),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_recompute_sums_games_and_keeps_existing_breakdown() {
        let now = Utc::now();
        let store = InMemoryCycleStore::new();
        store.create_cycle(cycle_with_two_users(now)).await.unwrap();

        let totals = recompute_user_totals(&store, "cycle-1", "alice").await.unwrap();
        assert_eq!(totals.breakdown.games, 9);
        assert_eq!(totals.total, 9);
    }

    #[tokio::test]
    async fn test_leaderboard_breaks_ties_by_fewer_attempts() {
        let now = Utc::now();
        let store = InMemoryCycleStore::new();
        store.create_cycle(cycle_with_two_users(now)).await.unwrap();
        recompute_user_totals(&store, "cycle-1", "alice").await.unwrap();
        recompute_user_totals(&store, "cycle-1", "bob").await.unwrap();

        let board = get_leaderboard(&store, Some("cycle-1"), 3).await.unwrap();
        assert_eq!(board.entries.len(), 2);
        // bob has fewer total attempts (1 vs 2) with the same total points.
        assert_eq!(board.entries[0].user_id, "bob");
        assert_eq!(board.entries[0].prize, 15.0);
        assert_eq!(board.entries[1].user_id, "alice");
        assert_eq!(board.entries[1].prize, 7.0);
    }

    #[tokio::test]
    async fn test_leaderboard_excludes_zero_totals() {
        let now = Utc::now();
        let mut cycle = cycle_with_two_users(now);
        cycle.periods[0].plays.get_mut("bob").unwrap().total_points = 0;
        let store = InMemoryCycleStore::new();
        store.create_cycle(cycle).await.unwrap();
        recompute_user_totals(&store, "cycle-1", "alice").await.unwrap();
        recompute_user_totals(&store, "cycle-1", "bob").await.unwrap();

        let board = get_leaderboard(&store, Some("cycle-1"), 3).await.unwrap();
        assert_eq!(board.entries.len(), 1);
        assert_eq!(board.entries[0].user_id, "alice");
    }
}

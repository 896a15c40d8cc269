//! Property-based tests for the engine's core quantified invariants:
//! totals decomposition, attempts/entries consistency, operationId
//! idempotence, the Wordle mask multiplicity bound, the single-OPEN-period
//! invariant, and operationId uniqueness.

use std::collections::HashSet;

use proptest::prelude::*;

use chatterpoints_engine::model::{
    Attempt, Cycle, CycleStatus, Game, GameConfig, Period, PeriodStatus, PeriodWindow, PeriodWord,
    TimeUnit, TotalsBreakdown, TotalsByUser, WordleSettings, WordlePoints,
};
use chatterpoints_engine::operations::{self, diminishing_factor, seed_default_rules};
use chatterpoints_engine::play::score_wordle;
use chatterpoints_engine::scheduler::resolve_active_period;
use chatterpoints_engine::store::{CycleStore, InMemoryCycleStore};

fn lowercase_word(len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(prop::sample::select(('a'..='z').collect::<Vec<char>>()), len)
        .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    /// `totalsByUser[u].total == breakdown.games + breakdown.operations + breakdown.social`
    /// for every combination of non-negative breakdown components.
    #[test]
    fn test_totals_always_equal_breakdown_sum(games in 0i64..10_000, operations in 0i64..10_000, social in 0i64..10_000) {
        let mut totals = TotalsByUser::new("user".to_string());
        totals.breakdown = TotalsBreakdown { games, operations, social };
        totals.recompute_total();
        prop_assert_eq!(totals.total, games + operations + social);
    }

    /// `diminishingFactor` is always in `(0, 1]`, and is `1` for every
    /// `prev < fullCount`.
    #[test]
    fn test_diminishing_factor_is_bounded(
        prev in 0u32..50,
        full_count in 1u32..20,
        decay_factor in 0.1f64..0.99,
    ) {
        let factor = diminishing_factor(prev, full_count, decay_factor);
        prop_assert!(factor > 0.0 && factor <= 1.0);
        if prev < full_count {
            prop_assert_eq!(factor, 1.0);
        }
    }

    /// Wordle mask green count equals the number of positions where
    /// `guess[i] == answer[i]`, and green+yellow never exceeds the
    /// answer's letter multiplicity for any letter.
    #[test]
    fn test_wordle_mask_green_count_matches_exact_positions(
        answer in lowercase_word(6),
        guess in lowercase_word(6),
    ) {
        let points = WordlePoints { victory_base: 10, letter_exact: 2, letter_present: 1 };
        let (_points, _won, mask) = score_wordle(&guess, &answer, &points, 1, 1);
        let mask_chars: Vec<char> = mask.chars().collect();
        let guess_chars: Vec<char> = guess.chars().collect();
        let answer_chars: Vec<char> = answer.chars().collect();

        let exact_positions = (0..answer_chars.len())
            .filter(|&i| guess_chars[i] == answer_chars[i])
            .count();
        let green_count = mask_chars.iter().filter(|c| **c == 'G').count();
        prop_assert_eq!(green_count, exact_positions);

        for letter in 'a'..='z' {
            let answer_count = answer_chars.iter().filter(|c| **c == letter).count();
            let marked_count = (0..answer_chars.len())
                .filter(|&i| guess_chars[i] == letter && (mask_chars[i] == 'G' || mask_chars[i] == 'Y'))
                .count();
            prop_assert!(marked_count <= answer_count);
        }
    }
}

proptest! {
    /// After `resolveActivePeriod`, at most one period is OPEN for the
    /// resolved game, regardless of how many overlapping OPEN periods the
    /// cycle started with (the scheduler's step-4 recovery invariant).
    #[test]
    fn test_single_open_period_invariant_holds_after_resolve(
        offsets in proptest::collection::vec((-120i64..120, 1i64..240), 1..5),
    ) {
        use chrono::Duration;

        let rt = tokio::runtime::Runtime::new().unwrap();
        let open_count = rt.block_on(async {
            let now = chrono::Utc::now();
            let periods: Vec<Period> = offsets
                .iter()
                .enumerate()
                .map(|(i, (start_off, dur))| {
                    let start_at = now + Duration::minutes(*start_off);
                    Period {
                        period_id: format!("period-{i}"),
                        game_id: "wordle".to_string(),
                        index: i as u32,
                        word: PeriodWord::default(),
                        start_at,
                        end_at: start_at + Duration::minutes(*dur),
                        status: PeriodStatus::Open,
                        plays: Default::default(),
                    }
                })
                .collect();

            let cycle = Cycle {
                cycle_id: "cycle-1".to_string(),
                status: CycleStatus::Open,
                start_at: now - Duration::hours(3),
                end_at: now + Duration::hours(3),
                podium_prizes: vec![15.0, 7.0, 3.0],
                games: vec![Game {
                    game_id: "wordle".to_string(),
                    config: GameConfig::Wordle {
                        settings: WordleSettings {
                            period_window: PeriodWindow { unit: TimeUnit::Hours, value: 1 },
                            word_length: 7,
                            attempts_per_user_per_period: 6,
                            efficiency_penalty: 1,
                        },
                        points: WordlePoints { victory_base: 10, letter_exact: 2, letter_present: 1 },
                    },
                    enabled: true,
                    used_words: vec![],
                }],
                operations_config: vec![],
                operations_entries: vec![],
                periods,
                social_actions: vec![],
                totals_by_user: Default::default(),
                created_at: now,
            };

            let store = InMemoryCycleStore::new();
            store.create_cycle(cycle).await.unwrap();

            resolve_active_period(&store, "cycle-1", "wordle", now).await.unwrap();

            let refreshed = store.find_cycle_by_id("cycle-1").await.unwrap().unwrap();
            refreshed
                .periods_for_game("wordle")
                .filter(|p| p.status == PeriodStatus::Open)
                .count()
        });
        prop_assert!(open_count <= 1);
    }

    /// `operationId` is idempotent: registering the same ID any number of
    /// times (from a small repeated-ID domain) appends exactly one entry
    /// per distinct ID actually submitted.
    #[test]
    fn test_register_operation_entries_are_unique_per_operation_id(
        ids in proptest::collection::vec(0usize..5, 1..20),
    ) {
        use chrono::Duration;

        let rt = tokio::runtime::Runtime::new().unwrap();
        let distinct_count = ids.iter().copied().collect::<HashSet<usize>>().len();
        let entries_len = rt.block_on(async {
            let now = chrono::Utc::now();
            let cycle = Cycle {
                cycle_id: "cycle-1".to_string(),
                status: CycleStatus::Open,
                start_at: now - Duration::hours(1),
                end_at: now + Duration::hours(1),
                podium_prizes: vec![15.0, 7.0, 3.0],
                games: vec![],
                operations_config: seed_default_rules(),
                operations_entries: vec![],
                periods: vec![],
                social_actions: vec![],
                totals_by_user: Default::default(),
                created_at: now,
            };
            let store = InMemoryCycleStore::new();
            store.create_cycle(cycle).await.unwrap();

            for id in &ids {
                operations::register_operation(
                    &store,
                    Some("cycle-1".to_string()),
                    "user1".to_string(),
                    "L1".to_string(),
                    "transfer".to_string(),
                    50.0,
                    format!("op-{id}"),
                    now,
                )
                .await
                .unwrap();
            }

            let refreshed = store.find_cycle_by_id("cycle-1").await.unwrap().unwrap();
            refreshed.operations_entries.len()
        });
        prop_assert_eq!(entries_len, distinct_count);
    }
}

#[tokio::test]
async fn test_attempts_and_entries_stay_consistent_under_repeated_appends() {
    use chatterpoints_engine::model::{
        Cycle, CycleStatus, Game, GameConfig, Period, PeriodStatus, PeriodWindow, PeriodWord,
        TimeUnit, WordleSettings,
    };
    use chatterpoints_engine::store::{CycleStore, InMemoryCycleStore};
    use chrono::{Duration, Utc};
    use std::collections::HashMap;

    let now = Utc::now();
    let config = GameConfig::Wordle {
        settings: WordleSettings {
            period_window: PeriodWindow { unit: TimeUnit::Days, value: 1 },
            word_length: 7,
            attempts_per_user_per_period: 20,
            efficiency_penalty: 1,
        },
        points: WordlePoints { victory_base: 10, letter_exact: 2, letter_present: 1 },
    };
    let cycle = Cycle {
        cycle_id: "cycle-1".to_string(),
        status: CycleStatus::Open,
        start_at: now - Duration::hours(1),
        end_at: now + Duration::days(7),
        podium_prizes: vec![15.0, 7.0, 3.0],
        games: vec![Game { game_id: "wordle".to_string(), config, enabled: true, used_words: vec![] }],
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
            plays: HashMap::new(),
        }],
        social_actions: vec![],
        totals_by_user: HashMap::new(),
        created_at: now,
    };

    let store = InMemoryCycleStore::new();
    store.create_cycle(cycle).await.unwrap();

    let samples = [("aaaaaaa", 2, false), ("bbbbbbb", 5, false), ("ccccccc", 1, false), ("ddddddd", 9, false)];
    let mut max_points = 0;
    for (guess, points, won) in samples {
        max_points = max_points.max(points);
        let attempt = Attempt {
            guess: guess.to_string(),
            points,
            won,
            result: None,
            at: now,
            attempt_number: 1,
            display_info: None,
        };
        let plays = store.append_attempt("cycle-1", "period-1", "user1", attempt).await.unwrap();
        assert_eq!(plays.total_points, max_points);
        assert_eq!(plays.entries.len() as u32, plays.attempts);
    }

    let cycle = store.find_cycle_by_id("cycle-1").await.unwrap().unwrap();
    let plays = &cycle.periods[0].plays["user1"];
    assert_eq!(plays.attempts, samples.len() as u32);
    assert_eq!(plays.entries.len(), samples.len());
    assert_eq!(plays.total_points, max_points);
}

//! Play engine: Wordle and Hangman scoring.
//!
//! `play` runs the ordered pre-play checks, scores the guess, persists
//! the attempt, and folds the result into the user's totals. Benign
//! rejections (no cycle, no active period, duplicate guess, attempts
//! exhausted, already won, hangman full-word-already-attempted) are
//! returned as an `Ok(PlayResponse)` with `status = Error`/`Ok` rather
//! than bubbled as an `Err` — only `GameNotConfigured`, `Validation`, and
//! a `PeriodClosed` race are surfaced as `Err`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::{Attempt, CycleStatus, DisplayInfo, Game, GameConfig, GameType, Lang, Period};
use crate::store::CycleStore;
use crate::{aggregator, scheduler, ChatterpointsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone)]
pub struct PlayResponse {
    pub status: PlayStatus,
    pub period_closed: bool,
    pub won: bool,
    pub points: i64,
    pub display_info: Option<DisplayInfo>,
    pub message: String,
}

impl PlayResponse {
    fn ok_idle(message: &str) -> Self {
        Self {
            status: PlayStatus::Ok,
            period_closed: true,
            won: false,
            points: 0,
            display_info: None,
            message: message.to_string(),
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            status: PlayStatus::Error,
            period_closed: false,
            won: false,
            points: 0,
            display_info: None,
            message: message.to_string(),
        }
    }
}

/// `play(userId, gameId, guess) → PlayResult`.
pub async fn play(
    store: &dyn CycleStore,
    cycle_id: Option<&str>,
    game_id: &str,
    user_id: &str,
    guess: &str,
    lang: Lang,
    now: DateTime<Utc>,
) -> Result<PlayResponse> {
    let user_id = user_id.trim();
    let normalized_guess = guess.trim().to_string();
    if user_id.is_empty() || normalized_guess.is_empty() || !normalized_guess.chars().all(|c| c.is_alphabetic()) {
        return Err(ChatterpointsError::Validation(
            "userId and guess must be non-empty alphabetic".to_string(),
        ));
    }

    // Pre-play check 1: an OPEN cycle exists.
    let cycle = match cycle_id {
        Some(id) => match store.find_cycle_by_id(id).await? {
            Some(c) if c.status == CycleStatus::Open => c,
            _ => return Ok(PlayResponse::ok_idle("no open cycle")),
        },
        None => match store.find_open_cycle_within_window(now).await? {
            Some(c) => c,
            None => return Ok(PlayResponse::ok_idle("no open cycle")),
        },
    };

    // Pre-play check 2: an active period is resolvable.
    let period = match scheduler::resolve_active_period(store, &cycle.cycle_id, game_id, now).await? {
        Some(p) if p.start_at <= now => p,
        _ => return Ok(PlayResponse::ok_idle("no active period")),
    };

    // Pre-play check 3: the game is configured and enabled (surfaced, not benign).
    let game = cycle
        .game(game_id)
        .filter(|g| g.enabled)
        .ok_or_else(|| ChatterpointsError::GameNotConfigured(game_id.to_string()))?;

    let answer = period
        .word
        .get(lang)
        .ok_or_else(|| ChatterpointsError::Internal(format!("period {} missing word for language", period.period_id)))?
        .to_string();

    let plays = period.plays.get(user_id);
    let entries: &[Attempt] = plays.map(|p| p.entries.as_slice()).unwrap_or(&[]);
    let attempts_so_far = plays.map(|p| p.attempts).unwrap_or(0);

    // Pre-play check 4: user hasn't already won.
    if plays.map(|p| p.won).unwrap_or(false) {
        return Ok(PlayResponse::rejected(&ChatterpointsError::AlreadyWon.to_string()));
    }

    // Pre-play check 5: guess isn't a duplicate (case-insensitive, trimmed).
    if entries
        .iter()
        .any(|e| e.guess.trim().eq_ignore_ascii_case(&normalized_guess))
    {
        return Ok(PlayResponse::rejected(&ChatterpointsError::DuplicateGuess.to_string()));
    }

    let attempt_number = attempts_so_far + 1;

    let (points, won, result_mask, display_info) = match &game.config {
        GameConfig::Wordle { settings, points } => {
            // Pre-play check 6 (Wordle): attempts below the per-period ceiling.
            if attempts_so_far >= settings.attempts_per_user_per_period {
                return Ok(PlayResponse::rejected(&ChatterpointsError::AttemptsExhausted.to_string()));
            }
            if normalized_guess.chars().count() != answer.chars().count() {
                return Err(ChatterpointsError::Validation(
                    "wordle guess length must match the answer".to_string(),
                ));
            }
            let (pts, won, mask) = score_wordle(
                &normalized_guess,
                &answer,
                points,
                settings.efficiency_penalty,
                attempt_number,
            );
            (pts, won, Some(mask), None)
        }
        GameConfig::Hangman { settings, points } => {
            let max_wrong = points.max_wrong_attempts;
            let (_guessed, _wrong, remaining, full_word_attempted) =
                reconstruct_hangman_state(&answer, entries, max_wrong);
            // Checked in this order because a full-word miss always zeroes
            // `remaining` (spec.md §4.2): if `remaining == 0` were checked
            // first, the full-word-already-attempted branch below would
            // never be reachable after any full-word miss.
            if full_word_attempted {
                return Ok(PlayResponse::rejected(
                    &ChatterpointsError::HangmanFullWordAlreadyAttempted.to_string(),
                ));
            }
            if remaining == 0 {
                return Ok(PlayResponse::rejected(&ChatterpointsError::AttemptsExhausted.to_string()));
            }
            if normalized_guess.chars().count() != 1 && normalized_guess.chars().count() != answer.chars().count() {
                return Err(ChatterpointsError::Validation(
                    "hangman guess must be one letter or the full word".to_string(),
                ));
            }
            let (pts, won, display) = score_hangman(
                &normalized_guess,
                &answer,
                points,
                settings.efficiency_penalty,
                entries,
                max_wrong,
                attempt_number,
            );
            (pts, won, None, Some(display))
        }
    };

    let attempt = Attempt {
        guess: normalized_guess,
        points,
        won,
        result: result_mask,
        at: now,
        attempt_number,
        display_info: display_info.clone(),
    };

    // May race with a concurrent close; surfaced as a retryable error.
    store
        .append_attempt(&cycle.cycle_id, &period.period_id, user_id, attempt)
        .await?;

    aggregator::recompute_user_totals(store, &cycle.cycle_id, user_id).await?;
    crate::telemetry::record_play(game_id, won);

    Ok(PlayResponse {
        status: PlayStatus::Ok,
        period_closed: false,
        won,
        points,
        display_info,
        message: "ok".to_string(),
    })
}

/// Wordle scoring for one attempt: green/yellow/`?` mask with bounded
/// multiplicity, victory score superseding per-letter accumulation on an
/// exact match.
pub fn score_wordle(
    guess: &str,
    answer: &str,
    points: &crate::model::WordlePoints,
    efficiency_penalty: i64,
    attempt_number: u32,
) -> (i64, bool, String) {
    let guess_chars: Vec<char> = guess.chars().collect();
    let answer_chars: Vec<char> = answer.chars().collect();
    let len = answer_chars.len();
    let mut mask = vec!['?'; len];
    let mut remaining_pool: Vec<char> = answer_chars.clone();
    let mut letter_points: i64 = 0;

    // First pass: greens.
    for i in 0..len {
        if guess_chars[i].eq_ignore_ascii_case(&answer_chars[i]) {
            mask[i] = 'G';
            letter_points += points.letter_exact;
            if let Some(pos) = remaining_pool
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&answer_chars[i]))
            {
                remaining_pool.remove(pos);
            }
        }
    }

    // Second pass: yellows, bounded by remaining multiplicity.
    for i in 0..len {
        if mask[i] == 'G' {
            continue;
        }
        if let Some(pos) = remaining_pool
            .iter()
            .position(|c| c.eq_ignore_ascii_case(&guess_chars[i]))
        {
            mask[i] = 'Y';
            letter_points += points.letter_present;
            remaining_pool.remove(pos);
        }
    }

    let is_exact = guess.eq_ignore_ascii_case(answer);
    if is_exact {
        let victory_points = (points.victory_base - efficiency_penalty * (attempt_number as i64 - 1)).max(1);
        (victory_points, true, mask.into_iter().collect())
    } else {
        (letter_points, false, mask.into_iter().collect())
    }
}

fn reconstruct_hangman_state(
    answer: &str,
    entries: &[Attempt],
    max_wrong_attempts: u32,
) -> (HashSet<char>, HashSet<char>, u32, bool) {
    let answer_len = answer.chars().count();
    let full_word_attempted = entries.iter().any(|e| e.guess.chars().count() == answer_len && answer_len > 1);
    match entries.last() {
        Some(last) => {
            let display = last.display_info.clone().unwrap_or_default();
            let guessed: HashSet<char> = display.guessed_letters.into_iter().collect();
            let wrong: HashSet<char> = display.wrong_letters.into_iter().collect();
            (guessed, wrong, display.remaining_attempts, full_word_attempted)
        }
        None => (HashSet::new(), HashSet::new(), max_wrong_attempts, full_word_attempted),
    }
}

fn apply_letter_guess(
    ch: char,
    answer_chars: &[char],
    guessed: &mut HashSet<char>,
    wrong: &mut HashSet<char>,
    remaining: &mut u32,
) {
    let ch = ch.to_ascii_lowercase();
    if guessed.contains(&ch) || wrong.contains(&ch) {
        return;
    }
    if answer_chars.iter().any(|c| c.to_ascii_lowercase() == ch) {
        guessed.insert(ch);
    } else {
        wrong.insert(ch);
        *remaining = remaining.saturating_sub(1);
    }
}

/// Hangman scoring for one attempt: single-letter guesses update the
/// guessed/wrong letter sets; a full-word guess either wins outright or
/// is processed letter-by-letter and hard-stops the period for the user.
pub fn score_hangman(
    guess: &str,
    answer: &str,
    points: &crate::model::HangmanPoints,
    efficiency_penalty: i64,
    entries: &[Attempt],
    max_wrong_attempts: u32,
    attempt_number: u32,
) -> (i64, bool, DisplayInfo) {
    let answer_chars: Vec<char> = answer.chars().collect();
    let (mut guessed, mut wrong, mut remaining, _) =
        reconstruct_hangman_state(answer, entries, max_wrong_attempts);

    let guess_chars: Vec<char> = guess.chars().collect();
    let mut won = false;
    let points_awarded;

    if guess_chars.len() == answer_chars.len() && guess_chars.len() > 1 {
        if guess.eq_ignore_ascii_case(answer) {
            won = true;
            points_awarded = (points.victory_base - efficiency_penalty * (attempt_number as i64 - 1)).max(0);
            guessed = answer_chars.iter().map(|c| c.to_ascii_lowercase()).collect();
        } else {
            for ch in &guess_chars {
                apply_letter_guess(*ch, &answer_chars, &mut guessed, &mut wrong, &mut remaining);
            }
            points_awarded = points.lose_penalty;
            remaining = 0;
        }
    } else {
        let ch = guess_chars[0];
        apply_letter_guess(ch, &answer_chars, &mut guessed, &mut wrong, &mut remaining);
        let fully_revealed = answer_chars
            .iter()
            .all(|c| guessed.contains(&c.to_ascii_lowercase()));
        if fully_revealed {
            won = true;
            points_awarded = (points.victory_base - efficiency_penalty * (attempt_number as i64 - 1)).max(0);
        } else if remaining == 0 {
            points_awarded = points.lose_penalty;
        } else {
            points_awarded = 0;
        }
    }

    let word_progress: String = answer_chars
        .iter()
        .map(|c| if guessed.contains(&c.to_ascii_lowercase()) { *c } else { '_' })
        .collect();

    let display_info = DisplayInfo {
        guessed_letters: guessed.into_iter().collect(),
        wrong_letters: wrong.into_iter().collect(),
        remaining_attempts: remaining,
        word_progress,
    };

    (points_awarded, won, display_info)
}

/// Whether a period belongs to the given game type, used by callers that
/// branch on `GameType` before dispatching into scoring.
pub fn game_type_of(period: &Period, games: &[Game]) -> Option<GameType> {
    games
        .iter()
        .find(|g| g.game_id == period.game_id)
        .map(|g| g.config.game_type())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HangmanPoints, WordlePoints};

    fn wordle_points() -> WordlePoints {
        WordlePoints {
            victory_base: 10,
            letter_exact: 2,
            letter_present: 1,
        }
    }

    #[test]
    fn test_wordle_exact_win_on_first_attempt() {
        let (points, won, mask) = score_wordle("journey", "journey", &wordle_points(), 1, 1);
        assert!(won);
        assert_eq!(points, 10);
        assert_eq!(mask, "GGGGGGG");
    }

    #[test]
    fn test_wordle_loss_accumulation_scenario() {
        // journal vs journey: j-o-u-r-n-?-? (positions differ at 'a' vs 'e' and 'l' vs 'y')
        let (points, won, _mask) = score_wordle("journal", "journey", &wordle_points(), 1, 1);
        assert!(!won);
        assert_eq!(points, 12); // 6 greens * 2 = 12, no yellows possible here

        let (points2, won2, mask2) = score_wordle("journey", "journey", &wordle_points(), 1, 2);
        assert!(won2);
        assert_eq!(points2, 9); // max(10 - 1*(2-1), 1) = 9
        assert_eq!(mask2, "GGGGGGG");
    }

    #[test]
    fn test_wordle_mask_bounds_matches_by_letter_multiplicity() {
        // answer "roofs" has two 'o's; guess "ooops" has three -> at most two
        // of the guess's 'o's may be marked G/Y, the third must stay '?'.
        let guess = "ooops";
        let answer = "roofs";
        let (_points, _won, mask) = score_wordle(guess, answer, &wordle_points(), 0, 1);
        let guess_chars: Vec<char> = guess.chars().collect();
        let mask_chars: Vec<char> = mask.chars().collect();

        let answer_o_count = answer.chars().filter(|c| *c == 'o').count();
        assert_eq!(answer_o_count, 2);

        let marked_o_count = (0..guess_chars.len())
            .filter(|&i| guess_chars[i] == 'o' && (mask_chars[i] == 'G' || mask_chars[i] == 'Y'))
            .count();
        assert!(marked_o_count <= answer_o_count);
        // The two matching 'o's are at guess positions 1 and 2 (both green,
        // aligned with answer positions 1 and 2); the leading 'o' at
        // position 0 has no multiplicity left and stays unmarked.
        assert_eq!(mask_chars[0], '?');
        assert_eq!(mask_chars[1], 'G');
        assert_eq!(mask_chars[2], 'G');
    }

    #[test]
    fn test_hangman_win_via_individual_letters() {
        let points = HangmanPoints {
            victory_base: 8,
            lose_penalty: 0,
            max_wrong_attempts: 6,
        };
        let mut entries: Vec<Attempt> = Vec::new();
        let mut won = false;
        let mut last_points = 0;
        for (i, letter) in ["p", "l", "a", "n", "e", "t"].iter().enumerate() {
            let (pts, w, display) = score_hangman(letter, "planet", &points, 1, &entries, 6, (i + 1) as u32);
            last_points = pts;
            won = w;
            entries.push(Attempt {
                guess: letter.to_string(),
                points: pts,
                won: w,
                result: None,
                at: Utc::now(),
                attempt_number: (i + 1) as u32,
                display_info: Some(display),
            });
        }
        assert!(won);
        assert_eq!(last_points, 3); // max(8 - 1*(6-1), 0) = 3
        assert_eq!(entries.last().unwrap().display_info.as_ref().unwrap().remaining_attempts, 6);
    }

    #[test]
    fn test_hangman_full_word_miss_hard_stops() {
        let points = HangmanPoints {
            victory_base: 8,
            lose_penalty: 0,
            max_wrong_attempts: 6,
        };
        let (pts, won, display) = score_hangman("banana", "planet", &points, 1, &[], 6, 1);
        assert!(!won);
        assert_eq!(pts, 0);
        assert_eq!(display.remaining_attempts, 0);

        let entries = vec![Attempt {
            guess: "banana".to_string(),
            points: pts,
            won,
            result: None,
            at: Utc::now(),
            attempt_number: 1,
            display_info: Some(display),
        }];
        let (_, _, _, full_word_attempted) = reconstruct_hangman_state("planet", &entries, 6);
        assert!(full_word_attempted);
    }

    #[tokio::test]
    async fn test_play_rejects_second_guess_after_full_word_miss_via_full_word_attempted() {
        use crate::model::{
            Cycle, CycleStatus, Game, HangmanPoints, HangmanSettings, Period, PeriodStatus, PeriodWindow,
        };
        use crate::store::InMemoryCycleStore;
        use std::collections::HashMap;

        let now = Utc::now();
        let config = GameConfig::Hangman {
            settings: crate::model::HangmanSettings {
                period_window: PeriodWindow {
                    unit: crate::model::TimeUnit::Hours,
                    value: 1,
                },
                word_length: 6,
                efficiency_penalty: 1,
            },
            points: HangmanPoints {
                victory_base: 8,
                lose_penalty: 0,
                max_wrong_attempts: 6,
            },
        };
        let mut word = crate::model::PeriodWord::default();
        word.set(Lang::En, "planet".to_string());
        let cycle = Cycle {
            cycle_id: "cycle-1".to_string(),
            status: CycleStatus::Open,
            start_at: now - chrono::Duration::hours(1),
            end_at: now + chrono::Duration::hours(1),
            podium_prizes: vec![15.0, 7.0, 3.0],
            games: vec![Game {
                game_id: "hangman".to_string(),
                config,
                enabled: true,
                used_words: vec![],
            }],
            operations_config: vec![],
            operations_entries: vec![],
            periods: vec![Period {
                period_id: "period-1".to_string(),
                game_id: "hangman".to_string(),
                index: 0,
                word,
                start_at: now - chrono::Duration::hours(1),
                end_at: now + chrono::Duration::hours(1),
                status: PeriodStatus::Open,
                plays: HashMap::new(),
            }],
            social_actions: vec![],
            totals_by_user: HashMap::new(),
            created_at: now,
        };

        let store = InMemoryCycleStore::new();
        store.create_cycle(cycle).await.unwrap();

        // Full-word miss: zeroes remaining_attempts per spec.md §4.2, but
        // must hard-stop subsequent plays via the full-word-attempted guard
        // rather than the (now also true) attempts-exhausted guard.
        let first = play(&store, Some("cycle-1"), "hangman", "user1", "banana", Lang::En, now)
            .await
            .unwrap();
        assert!(!first.won);

        let second = play(&store, Some("cycle-1"), "hangman", "user1", "p", Lang::En, now)
            .await
            .unwrap();
        assert_eq!(second.status, PlayStatus::Error);
        assert_eq!(
            second.message,
            ChatterpointsError::HangmanFullWordAlreadyAttempted.to_string()
        );
    }
}

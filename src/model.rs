//! Data model for cycles, games, periods, attempts, and aggregates.
//!
//! Every domain entity gets its own plain type: `Cycle`, `Game`,
//! `Period`, `PeriodUserPlays`, `Attempt`, `OperationRule`,
//! `OperationEntry`, `SocialAction`, and `TotalsByUser`. Nothing in this
//! module talks to a store — these are plain, serializable value types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChatterpointsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CycleStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeriodStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameType {
    Wordle,
    Hangman,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    /// Minutes in one unit of this kind.
    pub fn minutes_per_unit(&self) -> i64 {
        match self {
            TimeUnit::Minutes => 1,
            TimeUnit::Hours => 60,
            TimeUnit::Days => 60 * 24,
            TimeUnit::Weeks => 60 * 24 * 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub unit: TimeUnit,
    pub value: i64,
}

impl PeriodWindow {
    pub fn to_minutes(&self) -> i64 {
        self.unit.minutes_per_unit() * self.value
    }
}

/// Supported word languages. `en` is always assumed supported; a period
/// word needs at least one populated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    En,
    Es,
    Pt,
}

impl Lang {
    pub const ALL: [Lang; 3] = [Lang::En, Lang::Es, Lang::Pt];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Es => "es",
            Lang::Pt => "pt",
        }
    }
}

/// One secret word per supported language for a single period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWord {
    pub en: Option<String>,
    pub es: Option<String>,
    pub pt: Option<String>,
}

impl PeriodWord {
    pub fn get(&self, lang: Lang) -> Option<&str> {
        match lang {
            Lang::En => self.en.as_deref(),
            Lang::Es => self.es.as_deref(),
            Lang::Pt => self.pt.as_deref(),
        }
    }

    pub fn set(&mut self, lang: Lang, word: String) {
        match lang {
            Lang::En => self.en = Some(word),
            Lang::Es => self.es = Some(word),
            Lang::Pt => self.pt = Some(word),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.en.is_none() && self.es.is_none() && self.pt.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordleSettings {
    pub period_window: PeriodWindow,
    pub word_length: u8,
    pub attempts_per_user_per_period: u32,
    pub efficiency_penalty: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordlePoints {
    pub victory_base: i64,
    pub letter_exact: i64,
    pub letter_present: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangmanSettings {
    pub period_window: PeriodWindow,
    pub word_length: u8,
    pub efficiency_penalty: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangmanPoints {
    pub victory_base: i64,
    pub lose_penalty: i64,
    pub max_wrong_attempts: u32,
}

/// Tagged sum replacing the source's discriminated, loosely-typed config
/// object: a game is either Wordle-shaped or Hangman-shaped, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameConfig {
    #[serde(rename = "WORDLE")]
    Wordle {
        settings: WordleSettings,
        points: WordlePoints,
    },
    #[serde(rename = "HANGMAN")]
    Hangman {
        settings: HangmanSettings,
        points: HangmanPoints,
    },
}

impl GameConfig {
    pub fn game_type(&self) -> GameType {
        match self {
            GameConfig::Wordle { .. } => GameType::Wordle,
            GameConfig::Hangman { .. } => GameType::Hangman,
        }
    }

    pub fn period_window(&self) -> PeriodWindow {
        match self {
            GameConfig::Wordle { settings, .. } => settings.period_window,
            GameConfig::Hangman { settings, .. } => settings.period_window,
        }
    }

    pub fn word_length(&self) -> u8 {
        match self {
            GameConfig::Wordle { settings, .. } => settings.word_length,
            GameConfig::Hangman { settings, .. } => settings.word_length,
        }
    }

    /// Validates the cross-field constraints that apply to each game kind.
    pub fn validate(&self) -> Result<()> {
        let word_length = self.word_length();
        if !(5..=15).contains(&word_length) {
            return Err(ChatterpointsError::Validation(format!(
                "wordLength {word_length} out of range [5,15]"
            )));
        }
        match self {
            GameConfig::Wordle { settings, points } => {
                if settings.attempts_per_user_per_period < 1 {
                    return Err(ChatterpointsError::Validation(
                        "attemptsPerUserPerPeriod must be >= 1".into(),
                    ));
                }
                if points.letter_exact < points.letter_present {
                    return Err(ChatterpointsError::Validation(
                        "letterExact must be >= letterPresent".into(),
                    ));
                }
                if points.victory_base < 1 {
                    return Err(ChatterpointsError::Validation(
                        "victoryBase must be >= 1".into(),
                    ));
                }
                if settings.efficiency_penalty > points.victory_base {
                    return Err(ChatterpointsError::Validation(
                        "efficiencyPenalty must be <= victoryBase".into(),
                    ));
                }
            }
            GameConfig::Hangman { settings, points } => {
                if points.max_wrong_attempts < 1 {
                    return Err(ChatterpointsError::Validation(
                        "maxWrongAttempts must be >= 1".into(),
                    ));
                }
                if points.victory_base < 1 {
                    return Err(ChatterpointsError::Validation(
                        "victoryBase must be >= 1".into(),
                    ));
                }
                if settings.efficiency_penalty > points.victory_base {
                    return Err(ChatterpointsError::Validation(
                        "efficiencyPenalty must be <= victoryBase".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Validates a cycle's podium prize table against spec.md §3: an ordered
/// sequence of non-negative numbers with at least 3 entries (1st, 2nd, 3rd).
pub fn validate_podium_prizes(prizes: &[f64]) -> Result<()> {
    if prizes.len() < 3 {
        return Err(ChatterpointsError::Validation(
            "podiumPrizes must have at least 3 entries".into(),
        ));
    }
    if prizes.iter().any(|p| *p < 0.0) {
        return Err(ChatterpointsError::Validation(
            "podiumPrizes must all be non-negative".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub config: GameConfig,
    pub enabled: bool,
    pub used_words: Vec<PeriodWord>,
}

/// Per-attempt UI state for Hangman, and the position mask for Wordle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub guessed_letters: Vec<char>,
    pub wrong_letters: Vec<char>,
    pub remaining_attempts: u32,
    pub word_progress: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub guess: String,
    pub points: i64,
    /// Whether this attempt won the period for its user.
    pub won: bool,
    pub result: Option<String>,
    pub at: DateTime<Utc>,
    pub attempt_number: u32,
    pub display_info: Option<DisplayInfo>,
}

impl Attempt {
    pub fn won(&self) -> bool {
        self.won
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodUserPlays {
    pub user_id: String,
    pub attempts: u32,
    pub won: bool,
    pub total_points: i64,
    pub entries: Vec<Attempt>,
    pub last_updated_at: DateTime<Utc>,
}

impl PeriodUserPlays {
    pub fn new(user_id: String, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            attempts: 0,
            won: false,
            total_points: 0,
            entries: Vec::new(),
            last_updated_at: at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    pub period_id: String,
    pub game_id: String,
    pub index: u32,
    pub word: PeriodWord,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: PeriodStatus,
    pub plays: HashMap<String, PeriodUserPlays>,
}

impl Period {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start_at <= now && now < self.end_at
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRule {
    pub op_type: String,
    pub user_level: String,
    pub min_amount: i64,
    pub max_amount: Option<i64>,
    pub base_points: f64,
    pub full_count: u32,
    pub decay_factor: f64,
}

impl OperationRule {
    pub fn matches(&self, op_type: &str, user_level: &str, amount: f64) -> bool {
        self.op_type == op_type
            && self.user_level == user_level
            && amount >= self.min_amount as f64
            && self.max_amount.map(|m| amount <= m as f64).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationEntry {
    pub operation_id: String,
    pub user_id: String,
    pub op_type: String,
    pub amount: f64,
    pub user_level: String,
    pub points: i64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Discord,
    Youtube,
    X,
    Instagram,
    Linkedin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialAction {
    pub user_id: String,
    pub platform: SocialPlatform,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsBreakdown {
    pub games: i64,
    pub operations: i64,
    pub social: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsByUser {
    pub user_id: String,
    pub total: i64,
    pub breakdown: TotalsBreakdown,
}

impl TotalsByUser {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            total: 0,
            breakdown: TotalsBreakdown::default(),
        }
    }

    pub fn recompute_total(&mut self) {
        self.total = self.breakdown.games + self.breakdown.operations + self.breakdown.social;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    pub cycle_id: String,
    pub status: CycleStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub podium_prizes: Vec<f64>,
    pub games: Vec<Game>,
    pub operations_config: Vec<OperationRule>,
    pub operations_entries: Vec<OperationEntry>,
    pub periods: Vec<Period>,
    pub social_actions: Vec<SocialAction>,
    pub totals_by_user: HashMap<String, TotalsByUser>,
    pub created_at: DateTime<Utc>,
}

impl Cycle {
    pub fn is_open_within(&self, now: DateTime<Utc>) -> bool {
        self.status == CycleStatus::Open && self.start_at <= now && now < self.end_at
    }

    pub fn game(&self, game_id: &str) -> Option<&Game> {
        self.games.iter().find(|g| g.game_id == game_id)
    }

    pub fn game_mut(&mut self, game_id: &str) -> Option<&mut Game> {
        self.games.iter_mut().find(|g| g.game_id == game_id)
    }

    pub fn period(&self, period_id: &str) -> Option<&Period> {
        self.periods.iter().find(|p| p.period_id == period_id)
    }

    pub fn period_mut(&mut self, period_id: &str) -> Option<&mut Period> {
        self.periods.iter_mut().find(|p| p.period_id == period_id)
    }

    pub fn periods_for_game(&self, game_id: &str) -> impl Iterator<Item = &Period> {
        self.periods.iter().filter(move |p| p.game_id == game_id)
    }

    pub fn last_period_by_end(&self) -> Option<&Period> {
        self.periods.iter().max_by_key(|p| p.end_at)
    }

    /// Duration of the whole cycle window, in minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_at - self.start_at).num_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wordle_config() -> GameConfig {
        GameConfig::Wordle {
            settings: WordleSettings {
                period_window: PeriodWindow {
                    unit: TimeUnit::Days,
                    value: 1,
                },
                word_length: 7,
                attempts_per_user_per_period: 6,
                efficiency_penalty: 1,
            },
            points: WordlePoints {
                victory_base: 10,
                letter_exact: 2,
                letter_present: 1,
            },
        }
    }

    fn hangman_config() -> GameConfig {
        GameConfig::Hangman {
            settings: HangmanSettings {
                period_window: PeriodWindow {
                    unit: TimeUnit::Hours,
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
        }
    }

    #[test]
    fn test_wordle_config_validates() {
        assert!(wordle_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_word_length() {
        let mut cfg = wordle_config();
        if let GameConfig::Wordle { settings, .. } = &mut cfg {
            settings.word_length = 3;
        }
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_letter_present_over_exact() {
        let mut cfg = wordle_config();
        if let GameConfig::Wordle { points, .. } = &mut cfg {
            points.letter_present = points.letter_exact + 1;
        }
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_hangman_config_validates() {
        assert!(hangman_config().validate().is_ok());
    }

    #[test]
    fn test_hangman_rejects_efficiency_penalty_over_victory_base() {
        let mut cfg = hangman_config();
        if let GameConfig::Hangman { settings, points } = &mut cfg {
            settings.efficiency_penalty = points.victory_base + 1;
        }
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_hangman_rejects_zero_victory_base() {
        let mut cfg = hangman_config();
        if let GameConfig::Hangman { points, .. } = &mut cfg {
            points.victory_base = 0;
        }
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_totals_recompute_sums_breakdown() {
        let mut totals = TotalsByUser::new("user1".into());
        totals.breakdown = TotalsBreakdown {
            games: 10,
            operations: 5,
            social: 2,
        };
        totals.recompute_total();
        assert_eq!(totals.total, 17);
    }

    #[test]
    fn test_period_window_to_minutes() {
        let window = PeriodWindow {
            unit: TimeUnit::Hours,
            value: 3,
        };
        assert_eq!(window.to_minutes(), 180);
    }

    #[test]
    fn test_validate_podium_prizes_rejects_short_list() {
        assert!(validate_podium_prizes(&[15.0, 7.0]).is_err());
    }

    #[test]
    fn test_validate_podium_prizes_rejects_negative() {
        assert!(validate_podium_prizes(&[15.0, 7.0, -1.0]).is_err());
    }

    #[test]
    fn test_validate_podium_prizes_accepts_well_formed_list() {
        assert!(validate_podium_prizes(&[15.0, 7.0, 3.0]).is_ok());
    }
}

//! Chatterpoints Cycle Engine
//!
//! A time-sliced, multi-game competitive scoring subsystem: cycle/period
//! lifecycle management, Wordle and Hangman play scoring, an
//! operations-based reward engine with diminishing returns, and a
//! leaderboard aggregator. Persistence, HTTP routing, authentication,
//! blockchain settlement, and the user directory are out of scope and are
//! modeled as narrow trait seams the rest of the crate consumes.

pub mod aggregator;
pub mod config;
pub mod external;
pub mod history;
pub mod model;
pub mod operations;
pub mod play;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod words;

/// Minimum allowed Wordle/Hangman word length.
pub const WORD_LENGTH_MIN: u8 = 5;
/// Maximum allowed Wordle/Hangman word length.
pub const WORD_LENGTH_MAX: u8 = 15;
/// Default weekly cycle duration, in minutes, when the caller doesn't specify one.
pub const DEFAULT_CYCLE_DURATION_MINUTES: i64 = 10_080;
/// Upper bound on random-word resampling attempts before falling back to a suffixed word.
pub const MAX_RANDOM_WORD_SAMPLES: usize = 1000;
/// Default podium prize schedule used when a cycle is created without one.
pub const DEFAULT_PODIUM_PRIZES: [f64; 3] = [15.0, 7.0, 3.0];
/// Points awarded for a first-time social action on a given platform per
/// cycle. The award formula isn't prescribed anywhere upstream; see
/// DESIGN.md for this Open Question's resolution.
pub const SOCIAL_ACTION_POINTS: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ChatterpointsError {
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("cycle conflict: {0}")]
    CycleConflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("no open cycle")]
    NoCycle,

    #[error("no active period")]
    NoActivePeriod,

    #[error("game not configured: {0}")]
    GameNotConfigured(String),

    #[error("duplicate guess")]
    DuplicateGuess,

    #[error("attempts exhausted")]
    AttemptsExhausted,

    #[error("user already won this period")]
    AlreadyWon,

    #[error("hangman full word already attempted")]
    HangmanFullWordAlreadyAttempted,

    #[error("period is closed")]
    PeriodClosed,

    #[error("no matching operation rule")]
    NoRule,

    #[error("duplicate operation id")]
    DuplicateOperationId,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(#[from] ::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ChatterpointsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_sane() {
        assert!(WORD_LENGTH_MIN <= WORD_LENGTH_MAX);
        assert_eq!(DEFAULT_CYCLE_DURATION_MINUTES, 10_080);
        assert_eq!(DEFAULT_PODIUM_PRIZES.len(), 3);
    }

    #[test]
    fn test_error_messages_are_readable() {
        let err = ChatterpointsError::NoRule;
        assert_eq!(err.to_string(), "no matching operation rule");
    }
}

//! Configuration loading.
//!
//! Layered the way a typical schema-plus-overrides config module works:
//! defaults are set on a `config::Config` builder, an optional
//! `chatterpoints.toml` overlays them for local development, and a
//! handful of environment variables take final precedence. Those env
//! vars don't share a single prefix, so they're read explicitly rather
//! than through `config::Environment`'s prefix matching.

use std::env;
use std::time::Duration;

pub use ::config::ConfigError;
use ::config::{Config as ConfigSource, File};
use serde::{Deserialize, Serialize};

use crate::model::Lang;
use crate::DEFAULT_CYCLE_DURATION_MINUTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordsSource {
    Local,
    Gcp,
}

impl WordsSource {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "local" => Some(WordsSource::Local),
            "gcp" => Some(WordsSource::Gcp),
            _ => None,
        }
    }
}

fn parse_lang(raw: &str) -> Option<Lang> {
    match raw.to_ascii_lowercase().as_str() {
        "en" => Some(Lang::En),
        "es" => Some(Lang::Es),
        "pt" => Some(Lang::Pt),
        _ => None,
    }
}

/// Runtime configuration for the Chatterpoints engine.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `CHATTERPOINTS_WORDS_SEED` — passphrase for AES-256-CBC word decryption.
    pub words_seed: String,
    /// `CHATTERPOINTS_WORDS_READ_FROM` — word dictionary source selector.
    pub words_read_from: WordsSource,
    /// `GAMES_LANGUAGE_DEFAULT` — fallback language when a user has none set.
    pub games_language_default: Lang,
    /// `DEFAULT_CYCLE_DURATION_MINUTES` — used when `createCycle` omits a duration.
    pub default_cycle_duration_minutes: i64,
    /// Background maintenance tick interval.
    pub maintenance_tick_interval_secs: u64,
}

impl Settings {
    /// Loads defaults, then an optional `chatterpoints.toml` in the
    /// working directory, then environment variable overrides.
    pub fn load() -> std::result::Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let raw = ConfigSource::builder()
            .set_default("words_read_from", "local")?
            .set_default("games_language_default", "en")?
            .set_default(
                "default_cycle_duration_minutes",
                DEFAULT_CYCLE_DURATION_MINUTES,
            )?
            .set_default("maintenance_tick_interval_secs", 60i64)?
            .add_source(File::with_name("chatterpoints").required(false))
            .build()?;

        let words_seed = env::var("CHATTERPOINTS_WORDS_SEED").unwrap_or_default();

        let words_read_from = env::var("CHATTERPOINTS_WORDS_READ_FROM")
            .ok()
            .and_then(|v| WordsSource::parse(&v))
            .or_else(|| {
                raw.get_string("words_read_from")
                    .ok()
                    .and_then(|v| WordsSource::parse(&v))
            })
            .unwrap_or(WordsSource::Local);

        let games_language_default = env::var("GAMES_LANGUAGE_DEFAULT")
            .ok()
            .and_then(|v| parse_lang(&v))
            .or_else(|| {
                raw.get_string("games_language_default")
                    .ok()
                    .and_then(|v| parse_lang(&v))
            })
            .unwrap_or(Lang::En);

        let default_cycle_duration_minutes = env::var("DEFAULT_CYCLE_DURATION_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or_else(|| {
                raw.get_int("default_cycle_duration_minutes")
                    .unwrap_or(DEFAULT_CYCLE_DURATION_MINUTES)
            });

        let maintenance_tick_interval_secs = raw
            .get_int("maintenance_tick_interval_secs")
            .unwrap_or(60) as u64;

        Ok(Self {
            words_seed,
            words_read_from,
            games_language_default,
            default_cycle_duration_minutes,
            maintenance_tick_interval_secs,
        })
    }

    pub fn maintenance_tick_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_tick_interval_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            words_seed: String::new(),
            words_read_from: WordsSource::Local,
            games_language_default: Lang::En,
            default_cycle_duration_minutes: DEFAULT_CYCLE_DURATION_MINUTES,
            maintenance_tick_interval_secs: 60,
        }
    }
}

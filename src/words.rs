//! Word catalog: encrypted-at-rest dictionaries, random word selection,
//! and period-slot expansion.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use aes::Aes256;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::{Game, Lang, Period, PeriodStatus, PeriodWord};
use crate::{ChatterpointsError, Result, MAX_RANDOM_WORD_SAMPLES};

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Fetches the base64-encoded `iv || ciphertext` blob for one
/// `(lengthKey, lang)` pair. `local` and `gcp` word sources both
/// implement this; everything past "give me the encrypted bytes" — GCS
/// auth, bucket layout — is out of scope and left to the caller's
/// concrete implementation.
#[async_trait]
pub trait WordSource: Send + Sync {
    async fn fetch_encrypted(&self, length_key: &str, lang: Lang) -> Result<String>;
}

/// Reads `{base_dir}/{length_key}.json`, a map of `lang -> base64 blob`.
pub struct LocalFileWordSource {
    base_dir: PathBuf,
}

impl LocalFileWordSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl WordSource for LocalFileWordSource {
    async fn fetch_encrypted(&self, length_key: &str, lang: Lang) -> Result<String> {
        let path = self.base_dir.join(format!("{length_key}.json"));
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ChatterpointsError::Internal(format!("reading {}: {e}", path.display())))?;
        let manifest: HashMap<String, String> = serde_json::from_str(&contents)?;
        manifest
            .get(lang.as_str())
            .cloned()
            .ok_or_else(|| ChatterpointsError::Internal(format!("no {length_key} words for {}", lang.as_str())))
    }
}

/// Decrypts `base64(iv(16 bytes) || AES-256-CBC(ciphertext, key=SHA-256(passphrase)))`
/// into a newline/comma-delimited word list.
fn decrypt_blob(passphrase: &str, blob_b64: &str) -> Result<Vec<String>> {
    let raw = STANDARD
        .decode(blob_b64.trim())
        .map_err(|e| ChatterpointsError::Internal(format!("invalid base64 word blob: {e}")))?;
    if raw.len() < 16 {
        return Err(ChatterpointsError::Internal("word blob shorter than IV".into()));
    }
    let (iv, ciphertext) = raw.split_at(16);
    let key = Sha256::digest(passphrase.as_bytes());

    let mut buf = ciphertext.to_vec();
    let decrypted = Aes256CbcDec::new(key.as_slice().into(), iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| ChatterpointsError::Internal(format!("word blob decryption failed: {e}")))?;

    let text = std::str::from_utf8(decrypted)
        .map_err(|e| ChatterpointsError::Internal(format!("decrypted word blob not utf8: {e}")))?;

    Ok(text
        .split(|c: char| c == '\n' || c == ',' || c == '\r')
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect())
}

/// In-process dictionary cache: decryption occurs once per process per
/// `(lengthKey, lang)`, guarded by a single mutex (coarse-grained but
/// correct single-flight — concurrent misses serialize rather than
/// racing to decrypt the same blob twice).
pub struct WordCatalog {
    source: Box<dyn WordSource>,
    passphrase: String,
    cache: Mutex<HashMap<(u8, Lang), Arc<Vec<String>>>>,
}

impl WordCatalog {
    pub fn new(source: Box<dyn WordSource>, passphrase: String) -> Self {
        Self {
            source,
            passphrase,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn words_for(&self, length: u8, lang: Lang) -> Result<Arc<Vec<String>>> {
        let mut cache = self.cache.lock().await;
        if let Some(words) = cache.get(&(length, lang)) {
            return Ok(words.clone());
        }
        let length_key = format!("l{length}");
        let blob = self.source.fetch_encrypted(&length_key, lang).await?;
        let words = Arc::new(decrypt_blob(&self.passphrase, &blob)?);
        cache.insert((length, lang), words.clone());
        Ok(words)
    }

    /// `randomWord(length, disallowByLang) → PeriodWord`.
    /// Chosen words are added to `disallow` so later calls in the same
    /// cycle don't repeat them.
    pub async fn random_word(
        &self,
        length: u8,
        disallow: &mut HashMap<Lang, HashSet<String>>,
    ) -> Result<PeriodWord> {
        let mut period_word = PeriodWord::default();
        for lang in Lang::ALL {
            let words = self.words_for(length, lang).await?;
            if words.is_empty() {
                return Err(ChatterpointsError::Internal(format!(
                    "empty dictionary for length {length} lang {}",
                    lang.as_str()
                )));
            }
            let used = disallow.entry(lang).or_default();
            let chosen = pick_unused_word(&words, used);
            used.insert(chosen.clone());
            period_word.set(lang, chosen);
        }
        Ok(period_word)
    }
}

fn pick_unused_word(words: &[String], used: &HashSet<String>) -> String {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_RANDOM_WORD_SAMPLES {
        let candidate = &words[rng.gen_range(0..words.len())];
        if !used.contains(candidate) {
            return candidate.clone();
        }
    }
    let base = &words[0];
    let mut suffix = 1u64;
    loop {
        let candidate = format!("{base}{suffix}");
        if !used.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// `expandPeriodsForGame(game, start, end) → [Period]`.
/// Rejects if the game's period slot is as long as (or longer than) the
/// whole cycle.
pub async fn expand_periods_for_game(
    catalog: &WordCatalog,
    game: &Game,
    cycle_duration_minutes: i64,
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
    disallow: &mut HashMap<Lang, HashSet<String>>,
) -> Result<Vec<Period>> {
    let slot_minutes = game.config.period_window().to_minutes();
    if slot_minutes >= cycle_duration_minutes {
        return Err(ChatterpointsError::Validation(format!(
            "game {}'s period window ({slot_minutes}m) must be shorter than the cycle duration ({cycle_duration_minutes}m)",
            game.game_id
        )));
    }

    let word_length = game.config.word_length();
    let mut periods = Vec::new();
    let mut cursor = start;
    let mut index = 0u32;
    while cursor + chrono::Duration::minutes(slot_minutes) <= end {
        let period_end = cursor + chrono::Duration::minutes(slot_minutes);
        let word = catalog.random_word(word_length, disallow).await?;
        periods.push(Period {
            period_id: Uuid::new_v4().to_string(),
            game_id: game.game_id.clone(),
            index,
            word,
            start_at: cursor,
            end_at: period_end,
            status: if index == 0 { PeriodStatus::Open } else { PeriodStatus::Closed },
            plays: HashMap::new(),
        });
        cursor = period_end;
        index += 1;
    }
    Ok(periods)
}

//! The `Service`: wires the Scheduler, Play Engine, Operations Engine,
//! Aggregator, Word Catalog, and Persistence Adapter together behind one
//! `async fn` per public operation. HTTP routing, authentication, and
//! settlement notification are out of scope and are not wired up here —
//! callers own the handler layer and serialize these request/response
//! structs directly as JSON bodies.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::aggregator::{self, Leaderboard};
use crate::config::Settings;
use crate::external::{DisplayLabelProvider, IdentityDisplayLabelProvider, NoopSettlementNotifier, SettlementNotifier};
use crate::history::{
    self, CyclePlaysResponse, GamesInfoResponse, StatsResponse, UserHistoryRequest,
    UserHistoryResponse,
};
use crate::model::{Cycle, CycleStatus, Game, GameConfig, Lang, OperationEntry, SocialPlatform};
use crate::operations;
use crate::play::{self, PlayResponse};
use crate::scheduler::{self, MaintenanceReport};
use crate::store::CycleStore;
use crate::words::{self, WordCatalog};
use crate::{ChatterpointsError, Result, DEFAULT_PODIUM_PRIZES, SOCIAL_ACTION_POINTS};

pub struct GameRequest {
    pub game_id: String,
    pub config: GameConfig,
    pub enabled: bool,
}

pub struct CreateCycleRequest {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub games: Vec<GameRequest>,
    pub podium_prizes: Option<Vec<f64>>,
}

pub struct CreateCycleResponse {
    pub cycle_id: String,
}

pub struct RegisterOperationRequest {
    pub cycle_id: Option<String>,
    pub user_id: String,
    pub user_level: String,
    pub op_type: String,
    pub amount: f64,
    pub operation_id: String,
}

pub struct RegisterOperationResponse {
    pub cycle_id: String,
    pub operation: OperationEntry,
}

pub struct RegisterSocialRequest {
    pub cycle_id: Option<String>,
    pub user_id: String,
    pub platform: SocialPlatform,
}

pub struct RegisterSocialResponse {
    pub granted: bool,
}

/// Wires every component over a shared `CycleStore` and `WordCatalog`.
/// `label_provider` and `settlement_notifier` are the out-of-scope
/// collaborators (user directory, blockchain settlement);
/// `Service::new` defaults both to no-ops so callers who don't need them
/// don't have to supply any.
pub struct Service {
    store: Arc<dyn CycleStore>,
    catalog: Arc<WordCatalog>,
    settings: Settings,
    label_provider: Arc<dyn DisplayLabelProvider>,
    settlement_notifier: Arc<dyn SettlementNotifier>,
}

impl Service {
    pub fn new(store: Arc<dyn CycleStore>, catalog: Arc<WordCatalog>, settings: Settings) -> Self {
        Self::new_with_collaborators(
            store,
            catalog,
            settings,
            Arc::new(IdentityDisplayLabelProvider),
            Arc::new(NoopSettlementNotifier),
        )
    }

    /// Same as `new`, but with the user-directory and settlement-notifier
    /// collaborators wired to real implementations.
    pub fn new_with_collaborators(
        store: Arc<dyn CycleStore>,
        catalog: Arc<WordCatalog>,
        settings: Settings,
        label_provider: Arc<dyn DisplayLabelProvider>,
        settlement_notifier: Arc<dyn SettlementNotifier>,
    ) -> Self {
        crate::telemetry::init_tracing();
        Self {
            store,
            catalog,
            settings,
            label_provider,
            settlement_notifier,
        }
    }

    /// Spawns the background maintenance tick at the configured interval.
    /// Safe to run alongside lazy per-read resolution: both paths take the
    /// same per-cycle lock.
    pub fn spawn_background_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        let interval = service.settings.maintenance_tick_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = service.maintain_periods_and_cycles().await {
                    tracing::warn!(error = %err, "background maintenance tick failed");
                }
            }
        })
    }

    pub async fn maintain_periods_and_cycles(&self) -> Result<MaintenanceReport> {
        scheduler::maintain(self.store.as_ref(), Utc::now()).await
    }

    /// `createCycle`: rejects if an OPEN in-window cycle or
    /// a scheduled OPEN cycle already exists, expands every game's
    /// periods for the whole cycle window up front, and seeds default
    /// operation rules.
    pub async fn create_cycle(&self, request: CreateCycleRequest) -> Result<CreateCycleResponse> {
        let now = Utc::now();
        if self.store.find_open_cycle_within_window(now).await?.is_some()
            || self.store.find_scheduled_open_cycle(now).await?.is_some()
        {
            return Err(ChatterpointsError::CycleConflict(
                "an OPEN or scheduled-OPEN cycle already exists".to_string(),
            ));
        }
        if request.games.is_empty() {
            return Err(ChatterpointsError::Validation(
                "at least one game is required".to_string(),
            ));
        }

        let start_at = request.start_at.unwrap_or(now);
        let duration_minutes = request
            .duration_minutes
            .unwrap_or(self.settings.default_cycle_duration_minutes);
        let end_at = request.end_at.unwrap_or(start_at + Duration::minutes(duration_minutes));
        if end_at <= start_at {
            return Err(ChatterpointsError::Validation(
                "endAt must be after startAt".to_string(),
            ));
        }
        let cycle_duration_minutes = (end_at - start_at).num_minutes();

        let podium_prizes = request
            .podium_prizes
            .unwrap_or_else(|| DEFAULT_PODIUM_PRIZES.to_vec());
        crate::model::validate_podium_prizes(&podium_prizes)?;

        let mut games = Vec::with_capacity(request.games.len());
        let mut periods = Vec::new();
        for game_request in &request.games {
            game_request.config.validate()?;
            let game = Game {
                game_id: game_request.game_id.clone(),
                config: game_request.config,
                enabled: game_request.enabled,
                used_words: vec![],
            };
            let mut disallow: HashMap<Lang, HashSet<String>> = HashMap::new();
            let game_periods = words::expand_periods_for_game(
                &self.catalog,
                &game,
                cycle_duration_minutes,
                start_at,
                end_at,
                &mut disallow,
            )
            .await?;
            periods.extend(game_periods);
            games.push(game);
        }

        let cycle_id = Uuid::new_v4().to_string();
        let cycle = Cycle {
            cycle_id: cycle_id.clone(),
            status: CycleStatus::Open,
            start_at,
            end_at,
            podium_prizes,
            games,
            operations_config: operations::seed_default_rules(),
            operations_entries: Vec::new(),
            periods,
            social_actions: Vec::new(),
            totals_by_user: HashMap::new(),
            created_at: now,
        };
        self.store.create_cycle(cycle).await?;
        Ok(CreateCycleResponse { cycle_id })
    }

    pub async fn play(
        &self,
        cycle_id: Option<&str>,
        game_id: &str,
        user_id: &str,
        guess: &str,
        lang: Lang,
    ) -> Result<PlayResponse> {
        play::play(self.store.as_ref(), cycle_id, game_id, user_id, guess, lang, Utc::now()).await
    }

    /// `registerOperation`. The caller invokes this after
    /// settlement; `settlement_notifier` is the hook the
    /// blockchain/wallet layer consumes once the entry is durably recorded.
    pub async fn register_operation(
        &self,
        request: RegisterOperationRequest,
    ) -> Result<RegisterOperationResponse> {
        let (cycle_id, operation) = operations::register_operation(
            self.store.as_ref(),
            request.cycle_id,
            request.user_id,
            request.user_level,
            request.op_type,
            request.amount,
            request.operation_id,
            Utc::now(),
        )
        .await?;
        self.settlement_notifier
            .notify_operation_registered(&operation)
            .await?;
        Ok(RegisterOperationResponse { cycle_id, operation })
    }

    /// `registerSocial`: grants a fixed per-platform award
    /// the first time a user performs it in a cycle; a repeat is a no-op
    /// returning `granted: false`.
    pub async fn register_social(&self, request: RegisterSocialRequest) -> Result<RegisterSocialResponse> {
        let now = Utc::now();
        let cycle = match &request.cycle_id {
            Some(id) => self
                .store
                .find_cycle_by_id(id)
                .await?
                .ok_or(ChatterpointsError::NoCycle)?,
            None => self
                .store
                .find_open_cycle_within_window(now)
                .await?
                .ok_or(ChatterpointsError::NoCycle)?,
        };
        let granted = self
            .store
            .add_social_action(&cycle.cycle_id, &request.user_id, request.platform, now, SOCIAL_ACTION_POINTS)
            .await?;
        Ok(RegisterSocialResponse { granted })
    }

    pub async fn get_stats(
        &self,
        cycle_id: Option<&str>,
        user_id: &str,
        active_game_id: Option<&str>,
    ) -> Result<StatsResponse> {
        history::get_stats(
            self.store.as_ref(),
            self.label_provider.as_ref(),
            cycle_id,
            user_id,
            active_game_id,
            Utc::now(),
        )
        .await
    }

    pub async fn get_leaderboard(&self, cycle_id: Option<&str>, top: usize) -> Result<Leaderboard> {
        aggregator::get_leaderboard(self.store.as_ref(), cycle_id, top).await
    }

    pub async fn get_cycle_plays(
        &self,
        cycle_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Option<CyclePlaysResponse>> {
        history::get_cycle_plays(self.store.as_ref(), cycle_id, user_id).await
    }

    pub async fn get_cycle_games_info(&self) -> Result<GamesInfoResponse> {
        history::get_cycle_games_info(self.store.as_ref()).await
    }

    pub async fn get_user_history(&self, request: &UserHistoryRequest) -> Result<UserHistoryResponse> {
        history::get_user_history(self.store.as_ref(), request).await
    }
}

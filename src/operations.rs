//! Operations reward engine: tiered rules with diminishing returns.

use chrono::{DateTime, Utc};

use crate::model::{CycleStatus, OperationEntry, OperationRule};
use crate::store::{CycleStore, OperationAppendOutcome};
use crate::{ChatterpointsError, Result};

/// User levels the default rule seeding cross-products over.
pub const DEFAULT_USER_LEVELS: [&str; 2] = ["L1", "L2"];

/// Operation types eligible for default rule seeding. `mint` and
/// `withdraw-all` are deliberately excluded.
pub const DEFAULT_OPERATION_TYPES: [&str; 7] =
    ["transfer", "swap", "deposit", "withdraw", "stake", "unstake", "bridge"];

#[derive(Debug, Clone, Copy)]
struct AmountTier {
    min: i64,
    max: Option<i64>,
    base_points: f64,
    full_count: u32,
    decay_factor: f64,
}

const DEFAULT_AMOUNT_TIERS: [AmountTier; 5] = [
    AmountTier { min: 0, max: Some(100), base_points: 0.5, full_count: 10, decay_factor: 0.7 },
    AmountTier { min: 101, max: Some(500), base_points: 0.2, full_count: 8, decay_factor: 0.6 },
    AmountTier { min: 501, max: Some(1000), base_points: 0.1, full_count: 5, decay_factor: 0.5 },
    AmountTier { min: 1001, max: Some(5000), base_points: 0.05, full_count: 3, decay_factor: 0.5 },
    AmountTier { min: 5000, max: None, base_points: 0.01, full_count: 2, decay_factor: 0.4 },
];

/// Builds the default operation rule set seeded at cycle creation when
/// `operations.config` is otherwise empty: user levels × eligible
/// operation types × amount tiers.
pub fn seed_default_rules() -> Vec<OperationRule> {
    let mut rules = Vec::with_capacity(DEFAULT_USER_LEVELS.len() * DEFAULT_OPERATION_TYPES.len() * DEFAULT_AMOUNT_TIERS.len());
    for level in DEFAULT_USER_LEVELS {
        for op_type in DEFAULT_OPERATION_TYPES {
            for tier in DEFAULT_AMOUNT_TIERS {
                rules.push(OperationRule {
                    op_type: op_type.to_string(),
                    user_level: level.to_string(),
                    min_amount: tier.min,
                    max_amount: tier.max,
                    base_points: tier.base_points,
                    full_count: tier.full_count,
                    decay_factor: tier.decay_factor,
                });
            }
        }
    }
    rules
}

/// Finds the first rule matching `(op_type, user_level, amount)`.
pub fn select_rule<'a>(
    rules: &'a [OperationRule],
    op_type: &str,
    user_level: &str,
    amount: f64,
) -> Option<&'a OperationRule> {
    rules.iter().find(|r| r.matches(op_type, user_level, amount))
}

/// Diminishing-returns multiplier for the `prev`-th prior entry of this
/// `(userId, type)` pair in the cycle.
pub fn diminishing_factor(prev: u32, full_count: u32, decay_factor: f64) -> f64 {
    if prev < full_count {
        1.0
    } else {
        decay_factor.powi((prev - full_count + 1) as i32)
    }
}

/// `ceil(basePoints * amount * factor)`.
pub fn compute_points(base_points: f64, amount: f64, factor: f64) -> i64 {
    (base_points * amount * factor).ceil() as i64
}

/// `registerOperation`: matches an operation against its reward rule,
/// computes diminishing-returns points, and appends the entry atomically.
#[allow(clippy::too_many_arguments)]
pub async fn register_operation(
    store: &dyn CycleStore,
    cycle_id: Option<String>,
    user_id: String,
    user_level: String,
    op_type: String,
    amount: f64,
    operation_id: String,
    now: DateTime<Utc>,
) -> Result<(String, OperationEntry)> {
    let cycle = match &cycle_id {
        Some(id) => store
            .find_cycle_by_id(id)
            .await?
            .ok_or(ChatterpointsError::NoCycle)?,
        None => store.find_last_cycle().await?.ok_or(ChatterpointsError::NoCycle)?,
    };
    if cycle.status != CycleStatus::Open {
        return Err(ChatterpointsError::NoCycle);
    }

    let rule = select_rule(&cycle.operations_config, &op_type, &user_level, amount)
        .ok_or(ChatterpointsError::NoRule)?
        .clone();

    let prev = cycle
        .operations_entries
        .iter()
        .filter(|e| e.user_id == user_id && e.op_type == op_type)
        .count() as u32;

    let factor = diminishing_factor(prev, rule.full_count, rule.decay_factor);
    let points = compute_points(rule.base_points, amount, factor);

    let entry = OperationEntry {
        operation_id,
        user_id,
        op_type: op_type.clone(),
        amount,
        user_level,
        points,
        at: now,
    };

    let result = match store.append_operation_entry(&cycle.cycle_id, entry).await? {
        OperationAppendOutcome::Inserted(e) => {
            crate::telemetry::record_operation_points(&op_type, points);
            e
        }
        // DuplicateOperationId is treated as idempotent success.
        OperationAppendOutcome::AlreadyExists(e) => e,
    };

    Ok((cycle.cycle_id, result))
}

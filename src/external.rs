//! Narrow trait seams for the collaborators this crate scopes out of the
//! core engine: user-directory display-name lookup and blockchain
//! settlement notification. Neither is implemented here — the engine only
//! needs to know how to call them, the same way `store::CycleStore` and
//! `words::WordSource` stand in for the persistence substrate and the
//! word-dictionary loader.

use async_trait::async_trait;

use crate::model::OperationEntry;
use crate::Result;

/// `getDisplayLabel(userId) → string`: user directory / display-name
/// lookup, out of scope for this crate.
#[async_trait]
pub trait DisplayLabelProvider: Send + Sync {
    async fn get_display_label(&self, user_id: &str) -> Result<String>;
}

/// Fallback used when the caller hasn't wired up a real directory
/// lookup: the user's own id stands in for their display label.
pub struct IdentityDisplayLabelProvider;

#[async_trait]
impl DisplayLabelProvider for IdentityDisplayLabelProvider {
    async fn get_display_label(&self, user_id: &str) -> Result<String> {
        Ok(user_id.to_string())
    }
}

/// Hook called after `registerOperation` settles: the "invoke
/// `registerOperation` after settlement" contract for the
/// blockchain/wallet/paymaster layer this crate never talks to directly.
#[async_trait]
pub trait SettlementNotifier: Send + Sync {
    async fn notify_operation_registered(&self, entry: &OperationEntry) -> Result<()>;
}

/// Default notifier for callers that don't need a settlement hook (e.g.
/// tests, or a deployment where settlement is driven some other way).
pub struct NoopSettlementNotifier;

#[async_trait]
impl SettlementNotifier for NoopSettlementNotifier {
    async fn notify_operation_registered(&self, _entry: &OperationEntry) -> Result<()> {
        Ok(())
    }
}

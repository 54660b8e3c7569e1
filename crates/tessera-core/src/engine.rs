use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::LedgerError;
use crate::storage::{PersistentLedger, StorageConfig};
use crate::types::{CollectionConfig, IssuanceEvent, LedgerRecord, MintReceipt};

/// Engine configuration: the immutable collection parameters plus the
/// persistence backend for the record log.
#[derive(Debug, Clone)]
pub struct MintEngineConfig {
    pub collection: CollectionConfig,
    pub storage: StorageConfig,
}

impl MintEngineConfig {
    pub fn new(collection: CollectionConfig) -> Self {
        Self {
            collection,
            storage: StorageConfig::Memory,
        }
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }
}

/// Async front for the issuance ledger.
///
/// This is the single mutation boundary the ledger requires: `mint` and
/// `withdraw` hold the write guard across the whole stage-persist-commit
/// sequence, so no two mutations interleave and a check never runs against a
/// snapshot another request has since moved. Queries take read guards and
/// always observe a fully committed state.
pub struct MintEngine {
    ledger: RwLock<PersistentLedger>,
    collection: CollectionConfig,
}

impl MintEngine {
    pub async fn bootstrap(config: MintEngineConfig) -> Result<Self, LedgerError> {
        let MintEngineConfig {
            collection,
            storage,
        } = config;
        let ledger = PersistentLedger::bootstrap(collection.clone(), storage).await?;

        Ok(Self {
            ledger: RwLock::new(ledger),
            collection,
        })
    }

    /// Mint `quantity` tokens for `holder` against `payment_minor`. The
    /// request time is taken from the environment clock at entry, truncated
    /// to whole seconds; callers do not supply it.
    pub async fn mint(
        &self,
        holder: &str,
        quantity: u64,
        payment_minor: u64,
    ) -> Result<MintReceipt, LedgerError> {
        self.mint_at(holder, quantity, payment_minor, now_secs())
            .await
    }

    /// Mint with an explicit request time. Used by deterministic tests; the
    /// service path goes through [`MintEngine::mint`].
    pub async fn mint_at(
        &self,
        holder: &str,
        quantity: u64,
        payment_minor: u64,
        requested_at: u64,
    ) -> Result<MintReceipt, LedgerError> {
        let mut ledger = self.ledger.write().await;
        ledger.mint(holder, quantity, payment_minor, requested_at).await
    }

    /// Drain the treasury. Only the collection authority may call this.
    pub async fn withdraw(&self, caller: &str) -> Result<u64, LedgerError> {
        let mut ledger = self.ledger.write().await;
        ledger.withdraw(caller).await
    }

    // -------- read path --------

    pub fn collection(&self) -> &CollectionConfig {
        &self.collection
    }

    pub async fn total_supply(&self) -> u64 {
        self.ledger.read().await.ledger().total_supply()
    }

    pub async fn remaining_supply(&self) -> u64 {
        self.ledger.read().await.ledger().remaining_supply()
    }

    pub async fn treasury_minor(&self) -> u64 {
        self.ledger.read().await.ledger().treasury_minor()
    }

    pub async fn owner_of(&self, token_id: u64) -> Result<String, LedgerError> {
        self.ledger
            .read()
            .await
            .ledger()
            .owner_of(token_id)
            .map(str::to_string)
    }

    pub async fn balance_of(&self, holder: &str) -> u64 {
        self.ledger.read().await.ledger().balance_of(holder)
    }

    pub async fn tokens_of(&self, holder: &str) -> Vec<u64> {
        self.ledger.read().await.ledger().tokens_of(holder).to_vec()
    }

    pub async fn token_uri(&self, token_id: u64) -> Result<String, LedgerError> {
        self.ledger.read().await.ledger().token_uri(token_id)
    }

    pub async fn events(&self) -> Vec<IssuanceEvent> {
        self.ledger.read().await.ledger().events().to_vec()
    }

    pub async fn receipts(&self) -> Vec<MintReceipt> {
        self.ledger.read().await.ledger().receipts().to_vec()
    }

    pub async fn records(&self) -> Vec<LedgerRecord> {
        self.ledger.read().await.ledger().records().to_vec()
    }

    pub async fn backend_label(&self) -> &'static str {
        self.ledger.read().await.backend_label()
    }
}

fn now_secs() -> u64 {
    // Whole-second gate comparison; never sub-second.
    Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn open_collection() -> CollectionConfig {
        CollectionConfig::new("Tessera", "TSR", 10, 25, 0, "ipfs://tessera/", "curator")
    }

    async fn engine(collection: CollectionConfig) -> MintEngine {
        MintEngine::bootstrap(MintEngineConfig::new(collection))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn mint_uses_the_environment_clock() {
        let engine = engine(open_collection()).await;
        let receipt = engine.mint("alice", 1, 10).await.unwrap();
        assert_eq!(receipt.first_token_id, 1);
        assert_eq!(engine.total_supply().await, 1);
    }

    #[tokio::test]
    async fn gate_blocks_until_the_configured_second() {
        let collection =
            CollectionConfig::new("Tessera", "TSR", 10, 25, 2_000, "ipfs://tessera/", "curator");
        let engine = engine(collection).await;

        let err = engine.mint_at("alice", 1, 10, 1_999).await.unwrap_err();
        assert!(matches!(err, LedgerError::TooEarly { .. }));
        assert!(engine.mint_at("alice", 1, 10, 2_000).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_mints_never_exceed_the_cap() {
        let collection =
            CollectionConfig::new("Tessera", "TSR", 1, 25, 0, "ipfs://tessera/", "curator");
        let engine = Arc::new(engine(collection).await);

        let mut handles = Vec::new();
        for i in 0..40 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.mint(&format!("holder-{i}"), 1, 1).await
            }));
        }

        let mut minted = 0_u64;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                minted += 1;
            }
        }

        assert_eq!(minted, 25);
        assert_eq!(engine.total_supply().await, 25);
        assert_eq!(engine.remaining_supply().await, 0);
        assert_eq!(engine.treasury_minor().await, 25);

        // Every issued id is owned, exactly once across all holders.
        let mut seen = std::collections::HashSet::new();
        for i in 0..40 {
            for id in engine.tokens_of(&format!("holder-{i}")).await {
                assert!(seen.insert(id), "id {id} assigned twice");
            }
        }
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test]
    async fn reads_observe_fully_committed_state_only() {
        let engine = engine(open_collection()).await;
        engine.mint("alice", 3, 30).await.unwrap();

        let total = engine.total_supply().await;
        for id in 1..=total {
            assert!(engine.owner_of(id).await.is_ok());
        }
        assert_eq!(engine.balance_of("alice").await, total);
    }

    #[tokio::test]
    async fn one_event_per_mint_call() {
        let engine = engine(open_collection()).await;
        engine.mint("alice", 5, 50).await.unwrap();
        engine.mint("bob", 1, 10).await.unwrap();

        let events = engine.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].last_token_id, 5);
        assert_eq!(events[1].last_token_id, 6);
    }

    #[tokio::test]
    async fn withdraw_is_authority_gated() {
        let engine = engine(open_collection()).await;
        engine.mint("alice", 2, 20).await.unwrap();

        assert!(engine.withdraw("alice").await.is_err());
        assert_eq!(engine.withdraw("curator").await.unwrap(), 20);
        assert_eq!(engine.treasury_minor().await, 0);
    }
}

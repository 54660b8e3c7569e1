use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Immutable collection configuration, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub symbol: String,
    /// Price of one token in minor currency units.
    pub cost_per_unit: u64,
    /// Upper bound on token ids ever issued. Must be positive.
    pub max_supply: u64,
    /// Minting is permitted only when the request time (whole unix seconds)
    /// is at or past this instant.
    pub allow_minting_on: u64,
    /// Prefix for per-token metadata addresses.
    pub base_uri: String,
    /// Holder identity allowed to withdraw the treasury.
    pub authority: String,
}

impl CollectionConfig {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        cost_per_unit: u64,
        max_supply: u64,
        allow_minting_on: u64,
        base_uri: impl Into<String>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            cost_per_unit,
            max_supply,
            allow_minting_on,
            base_uri: base_uri.into(),
            authority: authority.into(),
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.max_supply == 0 {
            return Err(LedgerError::Ledger(
                "max_supply must be positive".to_string(),
            ));
        }
        if self.authority.trim().is_empty() {
            return Err(LedgerError::Ledger(
                "collection authority must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one successful mint call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintReceipt {
    pub receipt_id: String,
    pub holder: String,
    pub first_token_id: u64,
    pub last_token_id: u64,
    pub quantity: u64,
    pub paid_minor: u64,
    pub minted_at: DateTime<Utc>,
}

impl MintReceipt {
    pub fn token_ids(&self) -> impl Iterator<Item = u64> {
        self.first_token_id..=self.last_token_id
    }
}

/// Issuance notification emitted on a successful mint call.
///
/// Exactly one event is emitted per mint call, carrying only the highest
/// newly-assigned id and the holder. A batch of N units therefore emits a
/// single event, not N. This asymmetry is kept deliberately; consumers that
/// need the full range must read the receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuanceEvent {
    pub last_token_id: u64,
    pub holder: String,
}

/// Persisted ledger record kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerRecordKind {
    Mint,
    Withdrawal,
}

/// Append-only persistence unit.
///
/// The full ledger state is a deterministic fold over the record sequence,
/// which is how restarts rehydrate supply, ownership, and treasury.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub record_id: String,
    pub index: u64,
    pub kind: LedgerRecordKind,
    pub holder: String,
    pub quantity: u64,
    pub first_token_id: Option<u64>,
    pub last_token_id: Option<u64>,
    pub amount_minor: u64,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerRecord {
    pub fn mint(
        index: u64,
        holder: &str,
        quantity: u64,
        first_token_id: u64,
        last_token_id: u64,
        amount_minor: u64,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            index,
            kind: LedgerRecordKind::Mint,
            holder: holder.to_string(),
            quantity,
            first_token_id: Some(first_token_id),
            last_token_id: Some(last_token_id),
            amount_minor,
            recorded_at: Utc::now(),
        }
    }

    pub fn withdrawal(index: u64, authority: &str, amount_minor: u64) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            index,
            kind: LedgerRecordKind::Withdrawal,
            holder: authority.to_string(),
            quantity: 0,
            first_token_id: None,
            last_token_id: None,
            amount_minor,
            recorded_at: Utc::now(),
        }
    }
}

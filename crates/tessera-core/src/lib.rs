//! Tessera core: a fixed-supply token issuance ledger.
//!
//! This crate enforces the mint invariants (supply cap, release gate,
//! per-unit pricing, append-only ownership) behind a single mutation
//! boundary, with optional PostgreSQL persistence of the record log.

#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod ledger;
pub mod ownership;
pub mod policy;
pub mod storage;
pub mod supply;
pub mod types;

pub use engine::{MintEngine, MintEngineConfig};
pub use error::LedgerError;
pub use ledger::{IssuanceLedger, StagedMint, StagedWithdrawal};
pub use ownership::OwnershipIndex;
pub use policy::MintPolicy;
pub use storage::{PersistentLedger, StorageConfig};
pub use supply::SupplyCounter;
pub use types::{
    CollectionConfig, IssuanceEvent, LedgerRecord, LedgerRecordKind, MintReceipt,
};

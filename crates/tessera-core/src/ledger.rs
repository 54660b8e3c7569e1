use crate::error::LedgerError;
use crate::ownership::OwnershipIndex;
use crate::policy::MintPolicy;
use crate::supply::SupplyCounter;
use crate::types::{
    CollectionConfig, IssuanceEvent, LedgerRecord, LedgerRecordKind, MintReceipt,
};

/// A fully validated mint, staged against a state snapshot but not yet
/// applied. Produced by [`IssuanceLedger::stage_mint`]; storage backends
/// persist the built record before the commit lands in memory.
#[derive(Debug, Clone)]
pub struct StagedMint {
    pub record_index: u64,
    pub holder: String,
    pub quantity: u64,
    pub first_token_id: u64,
    pub last_token_id: u64,
    pub cost_minor: u64,
    pub requested_at: u64,
}

impl StagedMint {
    /// Build the durable record for this staged mint without mutating the
    /// ledger. The record id doubles as the receipt id, so a replayed ledger
    /// reproduces receipts byte for byte.
    pub fn into_record(self) -> LedgerRecord {
        LedgerRecord::mint(
            self.record_index,
            &self.holder,
            self.quantity,
            self.first_token_id,
            self.last_token_id,
            self.cost_minor,
        )
    }
}

/// A validated treasury withdrawal, staged but not yet applied.
#[derive(Debug, Clone)]
pub struct StagedWithdrawal {
    pub record_index: u64,
    pub caller: String,
    pub amount_minor: u64,
}

impl StagedWithdrawal {
    pub fn into_record(self) -> LedgerRecord {
        LedgerRecord::withdrawal(self.record_index, &self.caller, self.amount_minor)
    }
}

/// The issuance ledger: one owned aggregate holding configuration, supply
/// counter, ownership index, treasury, and the append-only record log.
///
/// Mutations are two-phase. `stage_*` validates against the current snapshot
/// without touching state; `commit_record` re-checks the record's index and
/// structure and applies it atomically. A rejected request leaves every
/// field exactly as it was. Replay after a restart walks the same
/// `commit_record` path, so persisted and live state cannot diverge.
#[derive(Debug, Clone)]
pub struct IssuanceLedger {
    config: CollectionConfig,
    policy: MintPolicy,
    supply: SupplyCounter,
    ownership: OwnershipIndex,
    treasury_minor: u64,
    records: Vec<LedgerRecord>,
    receipts: Vec<MintReceipt>,
    events: Vec<IssuanceEvent>,
}

impl IssuanceLedger {
    pub fn new(config: CollectionConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let policy = MintPolicy::new(&config);
        let supply = SupplyCounter::new(config.max_supply);

        Ok(Self {
            config,
            policy,
            supply,
            ownership: OwnershipIndex::new(),
            treasury_minor: 0,
            records: Vec::new(),
            receipts: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Rebuild a ledger by replaying persisted records in order, verifying
    /// index continuity and every structural invariant along the way.
    pub fn from_records(
        config: CollectionConfig,
        records: Vec<LedgerRecord>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self::new(config)?;
        for record in records {
            ledger.commit_record(record)?;
        }
        Ok(ledger)
    }

    // -------- mint path --------

    /// Validate a mint request against the current snapshot. Gate, pricing,
    /// and capacity checks all run here, before any mutation, so a failure
    /// at any step observes and leaves identical state.
    pub fn stage_mint(
        &self,
        holder: &str,
        quantity: u64,
        payment_minor: u64,
        requested_at: u64,
    ) -> Result<StagedMint, LedgerError> {
        if holder.trim().is_empty() {
            return Err(LedgerError::Ledger("holder must not be empty".to_string()));
        }

        self.policy.check(requested_at, quantity, payment_minor)?;
        self.supply.can_reserve(quantity)?;

        let cost_minor = self.policy.total_cost(quantity)?;
        self.treasury_minor.checked_add(cost_minor).ok_or_else(|| {
            LedgerError::Ledger("treasury would overflow".to_string())
        })?;

        Ok(StagedMint {
            record_index: self.records.len() as u64,
            holder: holder.to_string(),
            quantity,
            first_token_id: self.supply.total() + 1,
            last_token_id: self.supply.total() + quantity,
            cost_minor,
            requested_at,
        })
    }

    /// Stage, record, and commit in one call. Returns the mint receipt.
    pub fn mint(
        &mut self,
        holder: &str,
        quantity: u64,
        payment_minor: u64,
        requested_at: u64,
    ) -> Result<MintReceipt, LedgerError> {
        let staged = self.stage_mint(holder, quantity, payment_minor, requested_at)?;
        let receipt = self
            .commit_record(staged.into_record())?
            .ok_or_else(|| LedgerError::Ledger("mint commit produced no receipt".to_string()))?;
        Ok(receipt)
    }

    // -------- withdrawal path --------

    pub fn stage_withdrawal(&self, caller: &str) -> Result<StagedWithdrawal, LedgerError> {
        if caller != self.config.authority {
            return Err(LedgerError::Unauthorized {
                caller: caller.to_string(),
            });
        }

        Ok(StagedWithdrawal {
            record_index: self.records.len() as u64,
            caller: caller.to_string(),
            amount_minor: self.treasury_minor,
        })
    }

    /// Drain the treasury to zero, returning the withdrawn amount. The value
    /// transfer itself is the settlement rail's job; the ledger only records
    /// the debit.
    pub fn withdraw(&mut self, caller: &str) -> Result<u64, LedgerError> {
        let staged = self.stage_withdrawal(caller)?;
        let amount = staged.amount_minor;
        self.commit_record(staged.into_record())?;
        Ok(amount)
    }

    // -------- commit / replay --------

    /// Apply a built record after external durability succeeds. The record
    /// must extend the log contiguously and respect every structural
    /// invariant; a stale stage (interleaved mutation) fails the index check
    /// without partial effect.
    pub fn commit_record(
        &mut self,
        record: LedgerRecord,
    ) -> Result<Option<MintReceipt>, LedgerError> {
        let expected_index = self.records.len() as u64;
        if record.index != expected_index {
            return Err(LedgerError::Ledger(format!(
                "commit index mismatch: expected {expected_index}, got {}",
                record.index
            )));
        }

        match record.kind {
            LedgerRecordKind::Mint => {
                let (first, last) = match (record.first_token_id, record.last_token_id) {
                    (Some(first), Some(last)) if first <= last => (first, last),
                    _ => {
                        return Err(LedgerError::Ledger(format!(
                            "mint record {} has an invalid id range",
                            record.index
                        )))
                    }
                };
                if first != self.supply.total() + 1 || last - first + 1 != record.quantity {
                    return Err(LedgerError::Ledger(format!(
                        "mint record {} does not extend the supply contiguously",
                        record.index
                    )));
                }
                let treasury_after = self
                    .treasury_minor
                    .checked_add(record.amount_minor)
                    .ok_or_else(|| LedgerError::Ledger("treasury would overflow".to_string()))?;

                self.supply.reserve(record.quantity)?;
                self.ownership.assign(&record.holder, first, last);
                self.treasury_minor = treasury_after;

                // One notification per mint call, carrying only the final id.
                self.events.push(IssuanceEvent {
                    last_token_id: last,
                    holder: record.holder.clone(),
                });
                let receipt = MintReceipt {
                    receipt_id: record.record_id.clone(),
                    holder: record.holder.clone(),
                    first_token_id: first,
                    last_token_id: last,
                    quantity: record.quantity,
                    paid_minor: record.amount_minor,
                    minted_at: record.recorded_at,
                };
                self.receipts.push(receipt.clone());
                self.records.push(record);
                Ok(Some(receipt))
            }
            LedgerRecordKind::Withdrawal => {
                if record.holder != self.config.authority {
                    return Err(LedgerError::Ledger(format!(
                        "withdrawal record {} was not made by the authority",
                        record.index
                    )));
                }
                self.treasury_minor = self
                    .treasury_minor
                    .checked_sub(record.amount_minor)
                    .ok_or_else(|| {
                        LedgerError::Ledger("withdrawal exceeds treasury balance".to_string())
                    })?;
                self.records.push(record);
                Ok(None)
            }
        }
    }

    // -------- queries --------

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn total_supply(&self) -> u64 {
        self.supply.total()
    }

    pub fn remaining_supply(&self) -> u64 {
        self.supply.remaining()
    }

    pub fn treasury_minor(&self) -> u64 {
        self.treasury_minor
    }

    pub fn owner_of(&self, token_id: u64) -> Result<&str, LedgerError> {
        self.ownership.owner_of(token_id)
    }

    pub fn balance_of(&self, holder: &str) -> u64 {
        self.ownership.balance_of(holder)
    }

    pub fn tokens_of(&self, holder: &str) -> &[u64] {
        self.ownership.tokens_of(holder)
    }

    /// Metadata address for an issued token: base URI, decimal id, `.json`.
    pub fn token_uri(&self, token_id: u64) -> Result<String, LedgerError> {
        self.ownership.owner_of(token_id)?;
        Ok(format!("{}{}.json", self.config.base_uri, token_id))
    }

    pub fn events(&self) -> &[IssuanceEvent] {
        &self.events
    }

    pub fn receipts(&self) -> &[MintReceipt] {
        &self.receipts
    }

    pub fn records(&self) -> &[LedgerRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery_config() -> CollectionConfig {
        CollectionConfig::new("Tessera", "TSR", 10, 25, 1_000, "ipfs://tessera/", "curator")
    }

    fn open_ledger() -> IssuanceLedger {
        IssuanceLedger::new(gallery_config()).unwrap()
    }

    #[test]
    fn mints_three_for_thirty_and_updates_every_view() {
        let mut ledger = open_ledger();
        let receipt = ledger.mint("alice", 3, 30, 1_000).unwrap();

        assert_eq!(receipt.first_token_id, 1);
        assert_eq!(receipt.last_token_id, 3);
        assert_eq!(ledger.total_supply(), 3);
        assert_eq!(ledger.remaining_supply(), 22);
        assert_eq!(ledger.tokens_of("alice"), &[1, 2, 3]);
        assert_eq!(ledger.balance_of("alice"), 3);
        assert_eq!(ledger.treasury_minor(), 30);
    }

    #[test]
    fn batch_mint_emits_exactly_one_event_with_the_final_id() {
        let mut ledger = open_ledger();
        ledger.mint("alice", 3, 30, 1_000).unwrap();
        ledger.mint("bob", 2, 20, 1_001).unwrap();

        assert_eq!(
            ledger.events(),
            &[
                IssuanceEvent {
                    last_token_id: 3,
                    holder: "alice".to_string(),
                },
                IssuanceEvent {
                    last_token_id: 5,
                    holder: "bob".to_string(),
                },
            ]
        );
    }

    #[test]
    fn oversize_mint_is_rejected_with_supply_unchanged() {
        let mut ledger = open_ledger();
        ledger.mint("alice", 2, 20, 1_000).unwrap();

        let err = ledger.mint("bob", 100, 10_000, 1_000).unwrap_err();
        assert_eq!(
            err,
            LedgerError::SupplyExceeded {
                requested: 100,
                remaining: 23,
                max_supply: 25,
            }
        );
        assert_eq!(ledger.total_supply(), 2);
        assert_eq!(ledger.treasury_minor(), 20);
        assert_eq!(ledger.balance_of("bob"), 0);
    }

    #[test]
    fn underpayment_leaves_state_byte_identical() {
        let mut ledger = open_ledger();
        ledger.mint("alice", 1, 10, 1_000).unwrap();

        let err = ledger.mint("bob", 2, 19, 1_000).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientPayment {
                required_minor: 20,
                attached_minor: 19,
            }
        );
        assert_eq!(ledger.total_supply(), 1);
        assert_eq!(ledger.treasury_minor(), 10);
        assert!(ledger.tokens_of("bob").is_empty());
        assert_eq!(ledger.records().len(), 1);
    }

    #[test]
    fn too_early_rejects_regardless_of_payment() {
        let mut ledger = open_ledger();
        let err = ledger.mint("alice", 1, 1_000_000, 999).unwrap_err();
        assert!(matches!(err, LedgerError::TooEarly { .. }));
        assert_eq!(ledger.total_supply(), 0);
    }

    #[test]
    fn zero_quantity_is_invalid() {
        let mut ledger = open_ledger();
        let err = ledger.mint("alice", 0, 0, 1_000).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity(_)));
    }

    #[test]
    fn overpayment_credits_only_the_required_cost() {
        let mut ledger = open_ledger();
        let receipt = ledger.mint("alice", 2, 95, 1_000).unwrap();

        assert_eq!(receipt.paid_minor, 20);
        assert_eq!(ledger.treasury_minor(), 20);
    }

    #[test]
    fn token_uri_concatenates_base_id_and_suffix() {
        let mut ledger = open_ledger();
        ledger.mint("alice", 2, 20, 1_000).unwrap();

        assert_eq!(ledger.token_uri(2).unwrap(), "ipfs://tessera/2.json");
        assert_eq!(
            ledger.token_uri(3).unwrap_err(),
            LedgerError::UnknownToken(3)
        );
        assert_eq!(
            ledger.token_uri(0).unwrap_err(),
            LedgerError::UnknownToken(0)
        );
    }

    #[test]
    fn every_issued_id_has_exactly_one_owner() {
        let mut ledger = open_ledger();
        ledger.mint("alice", 3, 30, 1_000).unwrap();
        ledger.mint("bob", 4, 40, 1_000).unwrap();
        ledger.mint("alice", 1, 10, 1_000).unwrap();

        for id in 1..=ledger.total_supply() {
            let owner = ledger.owner_of(id).unwrap().to_string();
            let occurrences = ledger
                .tokens_of(&owner)
                .iter()
                .filter(|&&held| held == id)
                .count();
            assert_eq!(occurrences, 1, "id {id} must appear exactly once");
        }

        let balance_sum = ledger.balance_of("alice") + ledger.balance_of("bob");
        assert_eq!(balance_sum, ledger.total_supply());
    }

    #[test]
    fn stale_stage_is_rejected_on_commit() {
        let mut ledger = open_ledger();
        let staged = ledger.stage_mint("alice", 1, 10, 1_000).unwrap();
        ledger.mint("bob", 1, 10, 1_000).unwrap();

        let err = ledger.commit_record(staged.into_record()).unwrap_err();
        assert!(matches!(err, LedgerError::Ledger(_)));
        assert_eq!(ledger.total_supply(), 1);
        assert_eq!(ledger.balance_of("alice"), 0);
    }

    #[test]
    fn withdrawal_requires_the_authority_and_drains_to_zero() {
        let mut ledger = open_ledger();
        ledger.mint("alice", 3, 30, 1_000).unwrap();

        let err = ledger.withdraw("mallory").unwrap_err();
        assert_eq!(
            err,
            LedgerError::Unauthorized {
                caller: "mallory".to_string(),
            }
        );
        assert_eq!(ledger.treasury_minor(), 30);

        assert_eq!(ledger.withdraw("curator").unwrap(), 30);
        assert_eq!(ledger.treasury_minor(), 0);
        // Ownership is untouched by treasury movement.
        assert_eq!(ledger.tokens_of("alice"), &[1, 2, 3]);
    }

    #[test]
    fn replay_reproduces_identical_state() {
        let mut ledger = open_ledger();
        ledger.mint("alice", 3, 30, 1_000).unwrap();
        ledger.mint("bob", 2, 20, 1_001).unwrap();
        ledger.withdraw("curator").unwrap();
        ledger.mint("alice", 1, 10, 1_002).unwrap();

        let replayed =
            IssuanceLedger::from_records(gallery_config(), ledger.records().to_vec()).unwrap();

        assert_eq!(replayed.total_supply(), ledger.total_supply());
        assert_eq!(replayed.treasury_minor(), ledger.treasury_minor());
        assert_eq!(replayed.tokens_of("alice"), ledger.tokens_of("alice"));
        assert_eq!(replayed.tokens_of("bob"), ledger.tokens_of("bob"));
        assert_eq!(replayed.events(), ledger.events());
        assert_eq!(replayed.receipts().len(), ledger.receipts().len());
        assert_eq!(
            replayed.receipts()[0].receipt_id,
            ledger.receipts()[0].receipt_id
        );
    }

    #[test]
    fn replay_rejects_index_gaps() {
        let mut ledger = open_ledger();
        ledger.mint("alice", 1, 10, 1_000).unwrap();
        ledger.mint("bob", 1, 10, 1_000).unwrap();

        let mut records = ledger.records().to_vec();
        records.remove(0);

        let err = IssuanceLedger::from_records(gallery_config(), records).unwrap_err();
        assert!(matches!(err, LedgerError::Ledger(_)));
    }

    #[test]
    fn replay_rejects_foreign_withdrawals() {
        let mut ledger = open_ledger();
        ledger.mint("alice", 1, 10, 1_000).unwrap();
        ledger.withdraw("curator").unwrap();

        let mut records = ledger.records().to_vec();
        records[1].holder = "mallory".to_string();

        let err = IssuanceLedger::from_records(gallery_config(), records).unwrap_err();
        assert!(matches!(err, LedgerError::Ledger(_)));
    }
}

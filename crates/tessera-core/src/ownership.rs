use crate::error::LedgerError;
use std::collections::HashMap;

/// Append-only ownership store for issued token ids.
///
/// Token id `n` lives at arena slot `n - 1`; the per-holder index preserves
/// mint order for wallet enumeration. No API ever removes an assignment.
#[derive(Debug, Clone, Default)]
pub struct OwnershipIndex {
    /// id -> holder, indexed by `id - 1`.
    arena: Vec<String>,
    /// holder -> ids in mint order.
    by_holder: HashMap<String, Vec<u64>>,
}

impl OwnershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids assigned so far. Always equals the supply counter's
    /// total once a mint has committed.
    pub fn len(&self) -> u64 {
        self.arena.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Assign the inclusive id range `first..=last` to `holder`, in order.
    ///
    /// Infallible by construction: the supply controller only hands out
    /// fresh, contiguous ids, which this asserts as an internal invariant.
    pub fn assign(&mut self, holder: &str, first: u64, last: u64) {
        debug_assert_eq!(first, self.len() + 1, "ids must extend the arena contiguously");

        let ids = self.by_holder.entry(holder.to_string()).or_default();
        for id in first..=last {
            self.arena.push(holder.to_string());
            ids.push(id);
        }
    }

    pub fn owner_of(&self, token_id: u64) -> Result<&str, LedgerError> {
        if token_id == 0 {
            return Err(LedgerError::UnknownToken(token_id));
        }
        self.arena
            .get((token_id - 1) as usize)
            .map(String::as_str)
            .ok_or(LedgerError::UnknownToken(token_id))
    }

    pub fn balance_of(&self, holder: &str) -> u64 {
        self.by_holder
            .get(holder)
            .map(|ids| ids.len() as u64)
            .unwrap_or(0)
    }

    pub fn tokens_of(&self, holder: &str) -> &[u64] {
        self.by_holder
            .get(holder)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Holders with at least one token, with their id sequences.
    pub fn holders(&self) -> impl Iterator<Item = (&str, &[u64])> {
        self.by_holder
            .iter()
            .map(|(holder, ids)| (holder.as_str(), ids.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_ranges_and_enumerates_in_mint_order() {
        let mut index = OwnershipIndex::new();
        index.assign("alice", 1, 3);
        index.assign("bob", 4, 4);
        index.assign("alice", 5, 6);

        assert_eq!(index.owner_of(1).unwrap(), "alice");
        assert_eq!(index.owner_of(4).unwrap(), "bob");
        assert_eq!(index.tokens_of("alice"), &[1, 2, 3, 5, 6]);
        assert_eq!(index.balance_of("alice"), 5);
        assert_eq!(index.balance_of("bob"), 1);
        assert_eq!(index.len(), 6);
    }

    #[test]
    fn unknown_ids_have_no_owner() {
        let mut index = OwnershipIndex::new();
        index.assign("alice", 1, 2);

        assert_eq!(index.owner_of(0).unwrap_err(), LedgerError::UnknownToken(0));
        assert_eq!(index.owner_of(3).unwrap_err(), LedgerError::UnknownToken(3));
    }

    #[test]
    fn absent_holder_reads_as_empty() {
        let index = OwnershipIndex::new();
        assert_eq!(index.balance_of("nobody"), 0);
        assert!(index.tokens_of("nobody").is_empty());
    }

    #[test]
    fn balances_sum_to_assigned_count() {
        let mut index = OwnershipIndex::new();
        index.assign("alice", 1, 3);
        index.assign("bob", 4, 7);

        let sum: u64 = index.holders().map(|(_, ids)| ids.len() as u64).sum();
        assert_eq!(sum, index.len());
    }
}

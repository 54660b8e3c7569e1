use crate::error::LedgerError;

/// Fixed-cap sequential id allocator.
///
/// Ids are issued as `1, 2, ..., total` with no reuse and no gaps; burning is
/// out of scope, so the counter only ever grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyCounter {
    total: u64,
    max_supply: u64,
}

impl SupplyCounter {
    pub fn new(max_supply: u64) -> Self {
        Self {
            total: 0,
            max_supply,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn max_supply(&self) -> u64 {
        self.max_supply
    }

    pub fn remaining(&self) -> u64 {
        self.max_supply - self.total
    }

    /// Check capacity for `quantity` ids without reserving them.
    pub fn can_reserve(&self, quantity: u64) -> Result<(), LedgerError> {
        if quantity > self.remaining() {
            return Err(LedgerError::SupplyExceeded {
                requested: quantity,
                remaining: self.remaining(),
                max_supply: self.max_supply,
            });
        }
        Ok(())
    }

    /// Atomically reserve `quantity` ids, returning the inclusive range
    /// `(old_total + 1, old_total + quantity)`. Fails without mutation when
    /// the cap would be exceeded.
    pub fn reserve(&mut self, quantity: u64) -> Result<(u64, u64), LedgerError> {
        self.can_reserve(quantity)?;
        let first = self.total + 1;
        self.total += quantity;
        Ok((first, self.total))
    }
}

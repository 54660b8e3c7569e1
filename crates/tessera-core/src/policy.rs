use crate::error::LedgerError;
use crate::types::CollectionConfig;

/// Pure time/quantity/payment validation for mint requests.
///
/// The policy is deterministic and free of side effects: the same input
/// always yields the same decision, and no state is touched on rejection.
/// Capacity itself is the supply controller's concern; the policy only
/// guards the gate instant and the price arithmetic.
#[derive(Debug, Clone)]
pub struct MintPolicy {
    cost_per_unit: u64,
    allow_minting_on: u64,
}

impl MintPolicy {
    pub fn new(config: &CollectionConfig) -> Self {
        Self {
            cost_per_unit: config.cost_per_unit,
            allow_minting_on: config.allow_minting_on,
        }
    }

    /// Total price of `quantity` units as a checked product.
    pub fn total_cost(&self, quantity: u64) -> Result<u64, LedgerError> {
        self.cost_per_unit.checked_mul(quantity).ok_or_else(|| {
            LedgerError::InvalidQuantity(format!(
                "quantity {quantity} overflows the price computation"
            ))
        })
    }

    /// Gate a mint request against the release instant, quantity lower
    /// bound, and attached payment. Whole-second comparison on the gate.
    pub fn check(
        &self,
        requested_at: u64,
        quantity: u64,
        payment_minor: u64,
    ) -> Result<(), LedgerError> {
        if requested_at < self.allow_minting_on {
            return Err(LedgerError::TooEarly {
                allow_minting_on: self.allow_minting_on,
                requested_at,
            });
        }

        if quantity == 0 {
            return Err(LedgerError::zero_quantity());
        }

        let required_minor = self.total_cost(quantity)?;
        if payment_minor < required_minor {
            return Err(LedgerError::InsufficientPayment {
                required_minor,
                attached_minor: payment_minor,
            });
        }

        Ok(())
    }
}

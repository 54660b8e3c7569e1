use thiserror::Error;

/// Issuance ledger errors.
///
/// None of these are retryable without changing the request: time must pass,
/// payment must increase, quantity must shrink, or the token id must be valid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("minting opens at unix second {allow_minting_on}, request arrived at {requested_at}")]
    TooEarly {
        allow_minting_on: u64,
        requested_at: u64,
    },

    #[error("invalid mint quantity: {0}")]
    InvalidQuantity(String),

    #[error("insufficient payment: required {required_minor} minor units, attached {attached_minor}")]
    InsufficientPayment {
        required_minor: u64,
        attached_minor: u64,
    },

    #[error("supply exceeded: requested {requested}, only {remaining} of {max_supply} remaining")]
    SupplyExceeded {
        requested: u64,
        remaining: u64,
        max_supply: u64,
    },

    #[error("unknown token id {0}")]
    UnknownToken(u64),

    #[error("unauthorized: '{caller}' is not the collection authority")]
    Unauthorized { caller: String },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn zero_quantity() -> Self {
        Self::InvalidQuantity("quantity must be at least 1".to_string())
    }
}

//! Revert errors surfaced to callers.

use alloy_sol_types::sol;
use stylus_sdk::stylus_proc::SolidityError;

use message_counter_types::AttributionError;

sol! {
    /// The signature is malformed or does not recover to any signer.
    error InvalidSignature();
}

#[derive(SolidityError)]
pub enum CounterError {
    InvalidSignature(InvalidSignature),
}

impl From<AttributionError> for CounterError {
    fn from(err: AttributionError) -> Self {
        match err {
            // The reason (length, v, high s, no signer) is not part of the ABI.
            AttributionError::InvalidSignature(_) => Self::InvalidSignature(InvalidSignature {}),
        }
    }
}

//! Off-chain side of the EIP-712 message counter.
//!
//! Builds the `eth_signTypedData_v4` request a wallet signs, signs payloads with a local key,
//! recovers signers exactly as the contract does, and encodes relayer calldata.

pub mod calldata;
pub mod signer;
pub mod typed_data;


pub use signer::{parse_signature_hex, recover_signer, MessageSigner, SignedPayload};
pub use typed_data::TypedDataRequest;

//! Shared core of the EIP-712 message counter, used on-chain (Stylus) and off-chain (tooling).
//!
//! - [`eip712`]: typed structured data hashing (domain separator, struct hash, final digest).
//! - [`signature`]: `r || s || v` parsing and the [`IdentityRecovery`] seam.
//! - [`attribution`]: the submit state machine keyed by recovered signer.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod attribution;
pub mod eip712;
pub mod signature;

pub use attribution::{
    submit, Attribution, AttributionError, MemoryRecords, SignerRecord, SignerRecords,
};
pub use eip712::{
    digest, Domain, DescriptorError, FieldType, FieldValue, Payload, TypeDescriptor, TypedData,
};
pub use signature::{recover_identity, IdentityRecovery, RecoverableSignature, RecoveryError};

#[cfg(feature = "k256")]
pub use signature::{address_of, K256Recovery};

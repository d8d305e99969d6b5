//! Gasless EIP-712 message counter for Arbitrum Stylus.
//!
//! A relayer calls `setSignerMessage` with a payload and a signature made off-chain by someone
//! else. The contract recomputes the EIP-712 digest under its own domain, recovers the signer
//! through the `ecrecover` precompile, and credits the message to that signer. The relayer pays
//! gas and is never recorded.

#![cfg_attr(not(any(test, feature = "export-abi")), no_main)]
#![cfg_attr(not(any(test, feature = "export-abi")), no_std)]

#[macro_use]
extern crate alloc;

pub mod errors;
pub mod message_counter;
pub mod utils;

pub use message_counter::{EIP712MessageCounter, SignerBook};

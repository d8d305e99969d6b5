//! Signer recovery through the EVM `ecrecover` precompile.
//!
//! Signature parsing (length, `v` normalisation, low-`s`) happens in the shared crate before the
//! precompile is reached; this module only frames the call and decodes the result.

use stylus_sdk::{
    alloy_primitives::{Address, B256},
    stylus_core::{
        calls::{context::Call, CallAccess},
        Host,
    },
};

use message_counter_types::{IdentityRecovery, RecoverableSignature, RecoveryError};

/// Precompile address 0x01.
pub const ECRECOVER: Address = Address::with_last_byte(1);

/// Gas forwarded to the precompile (it charges 3000).
pub const ECRECOVER_GAS: u64 = 50_000;

/// On-chain [`IdentityRecovery`] backed by `ecrecover`, called through the contract's host.
pub struct PrecompileRecovery<'a> {
    vm: &'a dyn Host,
}

impl<'a> PrecompileRecovery<'a> {
    pub fn new(vm: &'a dyn Host) -> Self {
        Self { vm }
    }
}

impl IdentityRecovery for PrecompileRecovery<'_> {
    fn recover(
        &self,
        digest: B256,
        signature: &RecoverableSignature,
    ) -> Result<Address, RecoveryError> {
        let input = ecrecover_input(digest, signature);
        let out = self
            .vm
            .static_call(&Call::new().gas(ECRECOVER_GAS), ECRECOVER, &input)
            .map_err(|_| RecoveryError::NoSigner)?;
        decode_ecrecover_output(&out)
    }
}

/// Precompile input: `digest || uint256(v) || r || s`.
pub fn ecrecover_input(digest: B256, signature: &RecoverableSignature) -> [u8; 128] {
    let mut input = [0u8; 128];
    input[0..32].copy_from_slice(digest.as_slice());
    // v as 32-byte big-endian word.
    input[63] = signature.v;
    input[64..96].copy_from_slice(signature.r.as_slice());
    input[96..128].copy_from_slice(signature.s.as_slice());
    input
}

/// The precompile returns empty data on failure, otherwise a word with the address in the
/// low 20 bytes.
pub fn decode_ecrecover_output(out: &[u8]) -> Result<Address, RecoveryError> {
    if out.len() < 32 {
        return Err(RecoveryError::NoSigner);
    }
    let recovered = Address::from_slice(&out[12..32]);
    if recovered == Address::ZERO {
        return Err(RecoveryError::NoSigner);
    }
    Ok(recovered)
}

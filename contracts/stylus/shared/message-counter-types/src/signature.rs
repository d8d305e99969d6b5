//! ECDSA (secp256k1) signature parsing and signer recovery.
//!
//! Recovery itself is behind [`IdentityRecovery`]: on-chain it is the `ecrecover` precompile,
//! off-chain it is `k256` (feature `k256`).

use alloy_primitives::{Address, B256, U256};

/// `r || s || v`.
pub const SIGNATURE_LENGTH: usize = 65;

/// secp256k1 curve order divided by two. Signatures with a larger `s` are rejected (EIP-2).
pub const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xdfe9_2f46_681b_20a0,
    0x5d57_6e73_57a4_501d,
    0xffff_ffff_ffff_ffff,
    0x7fff_ffff_ffff_ffff,
]);

/// Errors during signature parsing or signer recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryError {
    /// Signature is not 65 bytes long.
    InvalidLength(usize),
    /// Recovery byte is not one of 0, 1, 27, 28.
    InvalidV(u8),
    /// `s` lies in the upper half of the curve order (malleable form).
    HighS,
    /// No key corresponds to this (digest, signature) pair.
    NoSigner,
}

/// A parsed, canonical `r || s || v` signature. `v` is always 27 or 28.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: B256,
    pub s: B256,
    pub v: u8,
}

impl RecoverableSignature {
    /// Parse a 65-byte signature. `v` in {0, 1} is normalised to {27, 28}.
    pub fn parse(bytes: &[u8]) -> Result<Self, RecoveryError> {
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(RecoveryError::InvalidLength(bytes.len()));
        }

        let r = B256::from_slice(&bytes[0..32]);
        let s = B256::from_slice(&bytes[32..64]);
        let v = match bytes[64] {
            v @ (27 | 28) => v,
            v @ (0 | 1) => v + 27,
            other => return Err(RecoveryError::InvalidV(other)),
        };

        if U256::from_be_bytes(s.0) > SECP256K1_N_DIV_2 {
            return Err(RecoveryError::HighS);
        }

        Ok(Self { r, s, v })
    }

    /// Recovery id (y-parity) in {0, 1}.
    pub fn recovery_id(&self) -> u8 {
        self.v - 27
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        let mut out = [0u8; SIGNATURE_LENGTH];
        out[0..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }
}

/// Signer recovery primitive, implemented differently on-chain vs off-chain.
pub trait IdentityRecovery {
    fn recover(
        &self,
        digest: B256,
        signature: &RecoverableSignature,
    ) -> Result<Address, RecoveryError>;
}

/// Parse `signature` and recover the address that signed `digest`.
///
/// The zero address is never a valid signer.
pub fn recover_identity<R: IdentityRecovery + ?Sized>(
    recovery: &R,
    digest: B256,
    signature: &[u8],
) -> Result<Address, RecoveryError> {
    let parsed = RecoverableSignature::parse(signature)?;
    let signer = recovery.recover(digest, &parsed)?;
    if signer == Address::ZERO {
        return Err(RecoveryError::NoSigner);
    }
    Ok(signer)
}

#[cfg(feature = "k256")]
pub use self::k256_recovery::{address_of, K256Recovery};

#[cfg(feature = "k256")]
mod k256_recovery {
    use alloy_primitives::{keccak256, Address, B256};
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    use super::{IdentityRecovery, RecoverableSignature, RecoveryError};

    /// Pure-Rust recovery, used by off-chain tooling and tests.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct K256Recovery;

    impl IdentityRecovery for K256Recovery {
        fn recover(
            &self,
            digest: B256,
            signature: &RecoverableSignature,
        ) -> Result<Address, RecoveryError> {
            let mut rs = [0u8; 64];
            rs[..32].copy_from_slice(signature.r.as_slice());
            rs[32..].copy_from_slice(signature.s.as_slice());

            let sig = Signature::from_slice(&rs).map_err(|_| RecoveryError::NoSigner)?;
            let recovery_id = RecoveryId::from_byte(signature.recovery_id())
                .ok_or(RecoveryError::InvalidV(signature.v))?;
            let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
                .map_err(|_| RecoveryError::NoSigner)?;
            Ok(address_of(&key))
        }
    }

    /// Ethereum address of a public key: last 20 bytes of keccak256(X || Y).
    pub fn address_of(key: &VerifyingKey) -> Address {
        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        Address::from_slice(&hash[12..])
    }
}

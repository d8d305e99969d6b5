use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use k256::ecdsa::{RecoveryId, SigningKey};

use message_counter_types::{
    address_of, digest, recover_identity, Domain, K256Recovery, Payload, RecoverableSignature,
    RecoveryError,
};

use crate::typed_data::TypedDataRequest;

/// Local secp256k1 key standing in for the user's wallet.
pub struct MessageSigner {
    key: SigningKey,
}

impl MessageSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Parse a hex private key (with or without `0x`).
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let trimmed = private_key.trim();
        let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(raw).context("private key is not valid hex")?;
        let key = SigningKey::from_slice(&bytes)
            .context("private key is not a valid secp256k1 scalar")?;
        Ok(Self::new(key))
    }

    pub fn address(&self) -> Address {
        address_of(self.key.verifying_key())
    }

    /// Sign a 32-byte digest, producing a low-`s` signature with `v` in {27, 28}.
    pub fn sign_digest(&self, digest: B256) -> Result<RecoverableSignature, k256::ecdsa::Error> {
        let (mut signature, mut recovery_id) =
            self.key.sign_prehash_recoverable(digest.as_slice())?;
        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }

        let rs = signature.to_bytes();
        Ok(RecoverableSignature {
            r: B256::from_slice(&rs[..32]),
            s: B256::from_slice(&rs[32..]),
            v: 27 + recovery_id.to_byte(),
        })
    }

    /// Sign `payload` under `domain`. `payload.signer` is signed as given.
    pub fn sign(
        &self,
        domain: &Domain,
        payload: Payload,
    ) -> Result<SignedPayload, k256::ecdsa::Error> {
        let digest = digest(domain, &payload);
        let signature = self.sign_digest(digest)?;
        Ok(SignedPayload {
            domain: domain.clone(),
            payload,
            digest,
            signature,
        })
    }

    /// Sign `message` as this key's own payload.
    pub fn sign_message(
        &self,
        domain: &Domain,
        message: impl Into<String>,
    ) -> Result<SignedPayload, k256::ecdsa::Error> {
        self.sign(domain, Payload::new(self.address(), message))
    }
}

/// A payload plus the signature a relayer forwards on the signer's behalf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedPayload {
    pub domain: Domain,
    pub payload: Payload,
    pub digest: B256,
    pub signature: RecoverableSignature,
}

impl SignedPayload {
    pub fn signature_bytes(&self) -> [u8; 65] {
        self.signature.to_bytes()
    }

    pub fn typed_data(&self) -> TypedDataRequest {
        TypedDataRequest::new(&self.domain, &self.payload)
    }

    /// Address the contract will credit for this payload.
    pub fn recover(&self) -> Result<Address, RecoveryError> {
        recover_signer(&self.domain, &self.payload, &self.signature_bytes())
    }
}

/// Recover the signer of `payload` under `domain`, as the contract does.
pub fn recover_signer(
    domain: &Domain,
    payload: &Payload,
    signature: &[u8],
) -> Result<Address, RecoveryError> {
    recover_identity(&K256Recovery, digest(domain, payload), signature)
}

/// Parse a hex signature (with or without `0x`).
pub fn parse_signature_hex(signature: &str) -> Result<Vec<u8>> {
    let trimmed = signature.trim();
    let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(raw).context("signature is not valid hex")
}

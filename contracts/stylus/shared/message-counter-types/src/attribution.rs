//! Signer attribution: state changes are keyed by the recovered signer, never by the caller.
//!
//! A relayer (`caller`) submits a payload signed by someone else. The digest of the payload is
//! recomputed under the deployment's domain, the signer is recovered from the signature, and only
//! that signer's record is written. The caller flows through to the result for event emission and
//! nothing else.
//!
//! There is no nonce: resubmitting an identical (payload, signature) pair succeeds again and
//! increments the signer's count again.

use alloc::{collections::BTreeMap, string::String};

use alloy_primitives::{Address, U256};

use crate::{
    eip712::{digest, Domain, Payload},
    signature::{recover_identity, IdentityRecovery, RecoveryError},
};

/// Per-signer persisted state. Unseen signers read as the default (`""`, `0`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerRecord {
    pub last_message: String,
    pub count: U256,
}

/// Storage of signer records, implemented by contract storage on-chain and by
/// [`MemoryRecords`] off-chain.
pub trait SignerRecords {
    /// Last message attributed to `identity` (`""` if never seen).
    fn last_message_of(&self, identity: Address) -> String;

    /// Number of submissions attributed to `identity` (`0` if never seen).
    fn count_of(&self, identity: Address) -> U256;

    /// Overwrite the record of `identity`.
    fn store(&mut self, identity: Address, message: &str, count: U256);
}

/// Errors during submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionError {
    /// The signature is malformed or does not recover to any signer.
    InvalidSignature(RecoveryError),
}

impl From<RecoveryError> for AttributionError {
    fn from(err: RecoveryError) -> Self {
        Self::InvalidSignature(err)
    }
}

/// Outcome of a successful submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribution {
    /// Recovered signer whose record was written.
    pub signer: Address,
    /// Account that submitted the call (the relayer).
    pub caller: Address,
    /// Signer's count after this submission.
    pub count: U256,
}

/// Attribute `payload` to whoever signed it under `domain`.
///
/// Recovery happens before any write, so a failed submission leaves `records` untouched.
pub fn submit<S, R>(
    records: &mut S,
    recovery: &R,
    domain: &Domain,
    caller: Address,
    payload: &Payload,
    signature: &[u8],
) -> Result<Attribution, AttributionError>
where
    S: SignerRecords + ?Sized,
    R: IdentityRecovery + ?Sized,
{
    let signer = recover_signer(recovery, domain, payload, signature)?;
    Ok(credit(records, signer, caller, &payload.message))
}

/// First half of [`submit`]: the signer of `payload` under `domain`.
///
/// Callers that cannot hold the records and the recovery backend at once (contract storage and
/// its host) run this, then [`credit`].
pub fn recover_signer<R>(
    recovery: &R,
    domain: &Domain,
    payload: &Payload,
    signature: &[u8],
) -> Result<Address, AttributionError>
where
    R: IdentityRecovery + ?Sized,
{
    Ok(recover_identity(recovery, digest(domain, payload), signature)?)
}

/// Second half of [`submit`]: write `message` to the record of an already recovered `signer`.
pub fn credit<S>(records: &mut S, signer: Address, caller: Address, message: &str) -> Attribution
where
    S: SignerRecords + ?Sized,
{
    let count = records.count_of(signer).saturating_add(U256::from(1u64));
    records.store(signer, message, count);

    Attribution {
        signer,
        caller,
        count,
    }
}

/// In-memory signer records.
#[derive(Clone, Debug, Default)]
pub struct MemoryRecords {
    records: BTreeMap<Address, SignerRecord>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record of `identity`, or `None` if it was never attributed a submission.
    pub fn get(&self, identity: &Address) -> Option<&SignerRecord> {
        self.records.get(identity)
    }

    /// Number of distinct signers seen.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SignerRecords for MemoryRecords {
    fn last_message_of(&self, identity: Address) -> String {
        self.records
            .get(&identity)
            .map(|r| r.last_message.clone())
            .unwrap_or_default()
    }

    fn count_of(&self, identity: Address) -> U256 {
        self.records
            .get(&identity)
            .map(|r| r.count)
            .unwrap_or_default()
    }

    fn store(&mut self, identity: Address, message: &str, count: U256) {
        let record = self.records.entry(identity).or_default();
        record.last_message.clear();
        record.last_message.push_str(message);
        record.count = count;
    }
}

#[cfg(all(test, feature = "k256"))]
mod tests {
    use super::*;
    use crate::signature::{address_of, K256Recovery};
    use alloy_primitives::{address, hex};
    use k256::ecdsa::{RecoveryId, SigningKey};

    const COUNTER: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const CHAIN_ID: u64 = 31337;

    fn key(seed: u8) -> SigningKey {
        let mut secret = [0u8; 32];
        secret[31] = seed;
        SigningKey::from_slice(&secret).unwrap()
    }

    fn account(key: &SigningKey) -> Address {
        address_of(key.verifying_key())
    }

    fn sign(key: &SigningKey, domain: &Domain, payload: &Payload) -> [u8; 65] {
        let d = digest(domain, payload);
        let (mut sig, mut recid) = key.sign_prehash_recoverable(d.as_slice()).unwrap();
        if let Some(low) = sig.normalize_s() {
            sig = low;
            recid = RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced());
        }
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = 27 + recid.to_byte();
        out
    }

    fn domain() -> Domain {
        Domain::message_counter(CHAIN_ID, COUNTER)
    }

    #[test]
    fn unseen_identity_reads_empty() {
        let records = MemoryRecords::new();
        assert_eq!(records.last_message_of(COUNTER), "");
        assert_eq!(records.count_of(COUNTER), U256::ZERO);
        assert!(records.get(&COUNTER).is_none());
    }

    #[test]
    fn relayed_submission_is_attributed_to_signer() {
        let signer = key(1);
        let relayer = account(&key(2));
        let payload = Payload::new(account(&signer), "first message");
        let sig = sign(&signer, &domain(), &payload);

        let mut records = MemoryRecords::new();
        let out = submit(&mut records, &K256Recovery, &domain(), relayer, &payload, &sig).unwrap();

        assert_eq!(out.signer, account(&signer));
        assert_eq!(out.caller, relayer);
        assert_eq!(out.count, U256::from(1));
        assert_eq!(records.last_message_of(account(&signer)), "first message");
        assert_eq!(records.count_of(account(&signer)), U256::from(1));

        // The relayer paid for the call but is recorded nowhere.
        assert_eq!(records.last_message_of(relayer), "");
        assert_eq!(records.count_of(relayer), U256::ZERO);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn later_message_overwrites_and_count_accumulates() {
        let signer = key(3);
        let relayer = account(&key(4));
        let mut records = MemoryRecords::new();

        for (i, msg) in ["one", "two", "three"].iter().enumerate() {
            let payload = Payload::new(account(&signer), *msg);
            let sig = sign(&signer, &domain(), &payload);
            let out =
                submit(&mut records, &K256Recovery, &domain(), relayer, &payload, &sig).unwrap();
            assert_eq!(out.count, U256::from(i + 1));
        }

        assert_eq!(records.last_message_of(account(&signer)), "three");
        assert_eq!(records.count_of(account(&signer)), U256::from(3));
    }

    #[test]
    fn caller_does_not_influence_the_outcome() {
        let signer = key(5);
        let payload = Payload::new(account(&signer), "relayed");
        let sig = sign(&signer, &domain(), &payload);

        let mut via_first = MemoryRecords::new();
        let mut via_second = MemoryRecords::new();
        let a = submit(&mut via_first, &K256Recovery, &domain(), account(&key(6)), &payload, &sig)
            .unwrap();
        let b = submit(&mut via_second, &K256Recovery, &domain(), account(&key(7)), &payload, &sig)
            .unwrap();

        assert_eq!(a.signer, b.signer);
        assert_eq!(a.count, b.count);
        assert_eq!(via_first.get(&a.signer), via_second.get(&b.signer));
    }

    #[test]
    fn signer_may_relay_for_themselves() {
        let signer = key(8);
        let payload = Payload::new(account(&signer), "self-submitted");
        let sig = sign(&signer, &domain(), &payload);

        let mut records = MemoryRecords::new();
        let out =
            submit(&mut records, &K256Recovery, &domain(), account(&signer), &payload, &sig)
                .unwrap();
        assert_eq!(out.caller, out.signer);
        assert_eq!(records.count_of(account(&signer)), U256::from(1));
    }

    #[test]
    fn identical_submission_is_replayable() {
        // No nonce: two relayers forwarding the same signed payload both succeed.
        let signer = key(9);
        let payload = Payload::new(account(&signer), "replayed");
        let sig = sign(&signer, &domain(), &payload);
        let mut records = MemoryRecords::new();

        submit(&mut records, &K256Recovery, &domain(), account(&key(10)), &payload, &sig).unwrap();
        submit(&mut records, &K256Recovery, &domain(), account(&key(11)), &payload, &sig).unwrap();

        assert_eq!(records.count_of(account(&signer)), U256::from(2));
        assert_eq!(records.last_message_of(account(&signer)), "replayed");
        assert_eq!(records.count_of(account(&key(10))), U256::ZERO);
        assert_eq!(records.count_of(account(&key(11))), U256::ZERO);
    }

    #[test]
    fn tampered_message_is_not_attributed_to_signer() {
        let signer = key(12);
        let payload = Payload::new(account(&signer), "pay 1");
        let sig = sign(&signer, &domain(), &payload);
        let tampered = Payload::new(account(&signer), "pay 9");

        let mut records = MemoryRecords::new();
        match submit(&mut records, &K256Recovery, &domain(), COUNTER, &tampered, &sig) {
            Ok(out) => assert_ne!(out.signer, account(&signer)),
            Err(err) => assert!(matches!(err, AttributionError::InvalidSignature(_))),
        }
        assert_eq!(records.count_of(account(&signer)), U256::ZERO);
    }

    #[test]
    fn signature_for_another_domain_is_not_attributed_to_signer() {
        let signer = key(13);
        let payload = Payload::new(account(&signer), "hello");

        let mut renamed = domain();
        renamed.name = "EIP712MessageCounteR".into();
        let mut other_chain = domain();
        other_chain.chain_id = 1;

        for foreign in [renamed, other_chain] {
            let sig = sign(&signer, &foreign, &payload);
            let mut records = MemoryRecords::new();
            match submit(&mut records, &K256Recovery, &domain(), COUNTER, &payload, &sig) {
                Ok(out) => assert_ne!(out.signer, account(&signer)),
                Err(err) => assert!(matches!(err, AttributionError::InvalidSignature(_))),
            }
            assert_eq!(records.count_of(account(&signer)), U256::ZERO);
        }
    }

    #[test]
    fn invalid_signature_leaves_records_untouched() {
        let signer = key(14);
        let payload = Payload::new(account(&signer), "first");
        let sig = sign(&signer, &domain(), &payload);
        let mut records = MemoryRecords::new();
        submit(&mut records, &K256Recovery, &domain(), COUNTER, &payload, &sig).unwrap();

        let second = Payload::new(account(&signer), "second");
        let cases: [&[u8]; 3] = [&sig[..64], &[0u8; 65], &hex!("00")];
        for bad in cases {
            let err = submit(&mut records, &K256Recovery, &domain(), COUNTER, &second, bad)
                .unwrap_err();
            assert!(matches!(err, AttributionError::InvalidSignature(_)));
        }

        assert_eq!(records.last_message_of(account(&signer)), "first");
        assert_eq!(records.count_of(account(&signer)), U256::from(1));
    }

    #[test]
    fn split_recover_then_credit_matches_submit() {
        let signer = key(17);
        let relayer = account(&key(18));
        let payload = Payload::new(account(&signer), "two steps");
        let sig = sign(&signer, &domain(), &payload);

        let mut whole = MemoryRecords::new();
        let expected =
            submit(&mut whole, &K256Recovery, &domain(), relayer, &payload, &sig).unwrap();

        let mut split = MemoryRecords::new();
        let recovered = recover_signer(&K256Recovery, &domain(), &payload, &sig).unwrap();
        let out = credit(&mut split, recovered, relayer, &payload.message);

        assert_eq!(out, expected);
        assert_eq!(split.get(&recovered), whole.get(&recovered));
        assert_eq!(
            recover_signer(&K256Recovery, &domain(), &payload, &sig[..64]),
            Err(AttributionError::InvalidSignature(RecoveryError::InvalidLength(64)))
        );
    }

    #[test]
    fn payload_signer_field_is_not_trusted() {
        // Attribution follows recovery; the `signer` field only feeds the digest.
        let actual = key(15);
        let claimed = account(&key(16));
        let payload = Payload::new(claimed, "spoof");
        let sig = sign(&actual, &domain(), &payload);

        let mut records = MemoryRecords::new();
        let out = submit(&mut records, &K256Recovery, &domain(), COUNTER, &payload, &sig).unwrap();
        assert_eq!(out.signer, account(&actual));
        assert_eq!(records.count_of(claimed), U256::ZERO);
    }
}

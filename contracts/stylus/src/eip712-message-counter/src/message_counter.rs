//! Contract storage and ABI surface.
//!
//! Design notes:
//! - Records are keyed by the signer recovered from the EIP-712 signature. `msg.sender` is the
//!   relayer; it is passed into the attribution only so it can be logged.
//! - The domain is not stored: name and version are constants, chain id and verifying contract
//!   come from the VM, so a deployment's domain cannot drift.
//! - No nonce is kept. An identical (payload, signature) can be relayed again and counts again.

use alloc::{string::String, vec::Vec};

use alloy_sol_types::sol;
use stylus_sdk::{
    abi::Bytes,
    alloy_primitives::{Address, FixedBytes, U256},
    prelude::*,
    stylus_core::log,
};

use message_counter_types::{
    attribution::{self, SignerRecords},
    eip712::{Domain, Payload},
};

use crate::{errors::CounterError, utils::crypto::PrecompileRecovery};

sol! {
    /// Emitted for every relayed message. `relayer` paid for the call; `signer` was credited.
    event SignerMessageSet(
        address indexed signer,
        address indexed relayer,
        uint256 count,
        string message
    );
}

/// ERC-5267 `fields` bitmap: name, version, chainId, verifyingContract.
const EIP712_DOMAIN_FIELDS: u8 = 0x0f;

sol_storage! {
    /// Per-signer records.
    pub struct SignerBook {
        mapping(address => string) last_messages;
        mapping(address => uint256) counts;
    }

    #[entrypoint]
    pub struct EIP712MessageCounter {
        SignerBook records;
    }
}

impl SignerRecords for SignerBook {
    fn last_message_of(&self, identity: Address) -> String {
        self.last_messages.get(identity).get_string()
    }

    fn count_of(&self, identity: Address) -> U256 {
        self.counts.get(identity)
    }

    fn store(&mut self, identity: Address, message: &str, count: U256) {
        self.last_messages.setter(identity).set_str(message);
        self.counts.insert(identity, count);
    }
}

#[public]
impl EIP712MessageCounter {
    /// Credit `signature_message.message` to whoever signed it.
    ///
    /// `signature_message` is the ABI tuple `(address signer, string message)`, equivalent to the
    /// Solidity struct `Signature`. `signature` is `r || s || v` over the EIP-712 digest of that
    /// struct under this contract's domain. Any account may relay.
    pub fn set_signer_message(
        &mut self,
        signature_message: (Address, String),
        signature: Bytes,
    ) -> Result<(), CounterError> {
        let caller = self.vm().msg_sender();
        let domain = self.domain();
        let (signer, message) = signature_message;
        let payload = Payload { signer, message };

        // Recovery borrows the host, so it finishes before the records are borrowed mutably.
        let signer = attribution::recover_signer(
            &PrecompileRecovery::new(self.vm()),
            &domain,
            &payload,
            signature.as_slice(),
        )?;
        let attributed = attribution::credit(&mut self.records, signer, caller, &payload.message);

        log(
            self.vm(),
            SignerMessageSet {
                signer: attributed.signer,
                relayer: attributed.caller,
                count: attributed.count,
                message: payload.message,
            },
        );
        Ok(())
    }

    /// Last message credited to `account` (`""` if none).
    pub fn last_message_of(&self, account: Address) -> String {
        self.records.last_message_of(account)
    }

    /// Number of messages credited to `account`.
    pub fn count_of(&self, account: Address) -> U256 {
        self.records.count_of(account)
    }

    pub fn domain_separator(&self) -> FixedBytes<32> {
        self.domain().separator()
    }

    /// ERC-5267 domain introspection.
    #[selector(name = "eip712Domain")]
    pub fn eip712_domain(
        &self,
    ) -> (
        FixedBytes<1>,
        String,
        String,
        U256,
        Address,
        FixedBytes<32>,
        Vec<U256>,
    ) {
        let domain = self.domain();
        (
            FixedBytes([EIP712_DOMAIN_FIELDS]),
            domain.name,
            domain.version,
            U256::from(domain.chain_id),
            domain.verifying_contract,
            FixedBytes::ZERO,
            Vec::new(),
        )
    }
}

impl EIP712MessageCounter {
    fn domain(&self) -> Domain {
        Domain::message_counter(self.vm().chain_id(), self.vm().contract_address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolEvent;
    use stylus_sdk::{
        alloy_primitives::{address, b256, hex, B256},
        testing::TestVM,
    };

    use crate::{
        errors::CounterError,
        utils::crypto::{ecrecover_input, ECRECOVER},
    };
    use message_counter_types::{digest, RecoverableSignature};

    const CHAIN_ID: u64 = 31337;
    const COUNTER: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const SIGNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const RELAYER: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");
    const SIGNATURE: [u8; 65] = hex!(
        "bb50e2d89a4ed70663d080659fe0ad4b9bc3e06c17a227433966cb59ceee020d"
        "3354d3f876ae954c17bdc421b4462927a77ff6f93aee971476e4e43fe05ade6d"
        "1c"
    );

    fn deploy() -> (TestVM, EIP712MessageCounter) {
        let vm = TestVM::new();
        vm.set_chain_id(CHAIN_ID);
        vm.set_contract_address(COUNTER);
        vm.set_sender(RELAYER);
        let contract = EIP712MessageCounter::from(&vm);
        (vm, contract)
    }

    /// Answer `ecrecover` with `signer` for this payload and signature.
    fn mock_recovery(vm: &TestVM, payload: &Payload, signature: &[u8], signer: Address) {
        let domain = Domain::message_counter(CHAIN_ID, COUNTER);
        let sig = RecoverableSignature::parse(signature).unwrap();
        let mut word = vec![0u8; 32];
        word[12..].copy_from_slice(signer.as_slice());
        vm.mock_static_call(
            ECRECOVER,
            ecrecover_input(digest(&domain, payload), &sig).to_vec(),
            Ok(word),
        );
    }

    fn submit(
        contract: &mut EIP712MessageCounter,
        message: &str,
        signature: &[u8],
    ) -> Result<(), CounterError> {
        let signature = Bytes::from(signature.to_vec());
        contract.set_signer_message((SIGNER, message.to_string()), signature)
    }

    #[test]
    fn unseen_accounts_read_empty() {
        let (_vm, contract) = deploy();
        assert_eq!(contract.count_of(SIGNER), U256::ZERO);
        assert_eq!(contract.last_message_of(SIGNER), "");
    }

    #[test]
    fn domain_comes_from_the_vm() {
        let (_vm, contract) = deploy();
        assert_eq!(
            contract.domain_separator(),
            b256!("5b2ab5050d92e47c8d7c0120f60ff2ec956f1ad93be8d1e5243a820c49fc4bac")
        );

        let (fields, name, version, chain_id, verifying_contract, salt, extensions) =
            contract.eip712_domain();
        assert_eq!(fields, FixedBytes([0x0f]));
        assert_eq!(name, "EIP712MessageCounter");
        assert_eq!(version, "0.0.1");
        assert_eq!(chain_id, U256::from(CHAIN_ID));
        assert_eq!(verifying_contract, COUNTER);
        assert_eq!(salt, B256::ZERO);
        assert!(extensions.is_empty());
    }

    #[test]
    fn relayed_message_is_credited_to_recovered_signer() {
        let (vm, mut contract) = deploy();
        mock_recovery(&vm, &Payload::new(SIGNER, "first message"), &SIGNATURE, SIGNER);

        if submit(&mut contract, "first message", &SIGNATURE).is_err() {
            panic!("relayed submission reverted");
        }

        assert_eq!(contract.count_of(SIGNER), U256::from(1));
        assert_eq!(contract.last_message_of(SIGNER), "first message");
        // msg.sender paid for the call and is recorded nowhere.
        assert_eq!(contract.count_of(RELAYER), U256::ZERO);
        assert_eq!(contract.last_message_of(RELAYER), "");
    }

    #[test]
    fn submission_emits_signer_message_set() {
        let (vm, mut contract) = deploy();
        mock_recovery(&vm, &Payload::new(SIGNER, "first message"), &SIGNATURE, SIGNER);
        assert!(submit(&mut contract, "first message", &SIGNATURE).is_ok());

        let logs = vm.get_emitted_logs();
        assert_eq!(logs.len(), 1);
        let (topics, data) = &logs[0];
        assert_eq!(topics[0], SignerMessageSet::SIGNATURE_HASH);

        let event = SignerMessageSet::decode_raw_log(topics.iter().copied(), data, true).unwrap();
        assert_eq!(event.signer, SIGNER);
        assert_eq!(event.relayer, RELAYER);
        assert_eq!(event.count, U256::from(1));
        assert_eq!(event.message, "first message");
    }

    #[test]
    fn replayed_signature_counts_again() {
        let (vm, mut contract) = deploy();
        mock_recovery(&vm, &Payload::new(SIGNER, "first message"), &SIGNATURE, SIGNER);

        assert!(submit(&mut contract, "first message", &SIGNATURE).is_ok());
        vm.set_sender(address!("dddddddddddddddddddddddddddddddddddddddd"));
        assert!(submit(&mut contract, "first message", &SIGNATURE).is_ok());

        assert_eq!(contract.count_of(SIGNER), U256::from(2));
        assert_eq!(vm.get_emitted_logs().len(), 2);
    }

    #[test]
    fn failed_recovery_reverts_without_writing() {
        let (vm, mut contract) = deploy();
        mock_recovery(&vm, &Payload::new(SIGNER, "first message"), &SIGNATURE, SIGNER);
        assert!(submit(&mut contract, "first message", &SIGNATURE).is_ok());

        // No mock for this digest: the host returns empty data, as `ecrecover` does on failure.
        let unrecoverable = submit(&mut contract, "tampered", &SIGNATURE);
        assert!(matches!(unrecoverable, Err(CounterError::InvalidSignature(_))));

        let too_short = submit(&mut contract, "second", &SIGNATURE[..64]);
        assert!(matches!(too_short, Err(CounterError::InvalidSignature(_))));

        let mut bad_v = SIGNATURE;
        bad_v[64] = 29;
        let bad_v = submit(&mut contract, "second", &bad_v);
        assert!(matches!(bad_v, Err(CounterError::InvalidSignature(_))));

        assert_eq!(contract.count_of(SIGNER), U256::from(1));
        assert_eq!(contract.last_message_of(SIGNER), "first message");
        assert_eq!(vm.get_emitted_logs().len(), 1);
    }

    #[test]
    fn credit_follows_recovery_not_payload_signer() {
        let (vm, mut contract) = deploy();
        let key_holder = address!("7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
        mock_recovery(&vm, &Payload::new(SIGNER, "spoof"), &SIGNATURE, key_holder);

        assert!(submit(&mut contract, "spoof", &SIGNATURE).is_ok());
        assert_eq!(contract.count_of(key_holder), U256::from(1));
        assert_eq!(contract.last_message_of(key_holder), "spoof");
        assert_eq!(contract.count_of(SIGNER), U256::ZERO);
    }
}

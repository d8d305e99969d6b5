//! Solidity ABI of the deployed counter, for relayers and read-only callers.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};
use anyhow::{Context, Result};

use crate::signer::SignedPayload;

sol! {
    /// ABI-equivalent of the `(address,string)` tuple the contract takes.
    struct Signature {
        address signer;
        string message;
    }

    interface IEIP712MessageCounter {
        event SignerMessageSet(
            address indexed signer,
            address indexed relayer,
            uint256 count,
            string message
        );

        error InvalidSignature();

        function setSignerMessage(
            Signature calldata signatureMessage,
            bytes calldata signature
        ) external;
        function lastMessageOf(address account) external view returns (string memory);
        function countOf(address account) external view returns (uint256);
        function domainSeparator() external view returns (bytes32);
    }
}

/// Calldata a relayer sends to credit `signed` to its signer.
pub fn set_signer_message(signed: &SignedPayload) -> Vec<u8> {
    IEIP712MessageCounter::setSignerMessageCall {
        signatureMessage: Signature {
            signer: signed.payload.signer,
            message: signed.payload.message.clone(),
        },
        signature: Bytes::from(signed.signature_bytes().to_vec()),
    }
    .abi_encode()
}

pub fn last_message_of(account: Address) -> Vec<u8> {
    IEIP712MessageCounter::lastMessageOfCall { account }.abi_encode()
}

pub fn count_of(account: Address) -> Vec<u8> {
    IEIP712MessageCounter::countOfCall { account }.abi_encode()
}

pub fn domain_separator() -> Vec<u8> {
    IEIP712MessageCounter::domainSeparatorCall {}.abi_encode()
}

pub fn decode_last_message(ret: &[u8]) -> Result<String> {
    let out = IEIP712MessageCounter::lastMessageOfCall::abi_decode_returns(ret, true)
        .context("failed decoding lastMessageOf return data")?;
    Ok(out._0)
}

pub fn decode_count(ret: &[u8]) -> Result<U256> {
    let out = IEIP712MessageCounter::countOfCall::abi_decode_returns(ret, true)
        .context("failed decoding countOf return data")?;
    Ok(out._0)
}

pub fn decode_domain_separator(ret: &[u8]) -> Result<B256> {
    let out = IEIP712MessageCounter::domainSeparatorCall::abi_decode_returns(ret, true)
        .context("failed decoding domainSeparator return data")?;
    Ok(out._0)
}

//! `eth_signTypedData_v4` request for the message counter.
//!
//! The wallet is handed both schemas field-for-field. A relayer receiving typed data back checks
//! that it declares exactly these schemas (and nothing else) before hashing it: the contract only
//! understands one primary type, so anything else would recover to the wrong signer.

use std::collections::BTreeMap;

use alloy_primitives::{Address, B256, U256};
use anyhow::{ensure, Context, Result};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use message_counter_types::{
    eip712::{self, PRIMARY_TYPE},
    Domain, Payload, TypeDescriptor,
};

const DOMAIN_TYPE_NAME: &str = "EIP712Domain";

/// One `{name, type}` member of a typed-data schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainValues {
    pub name: String,
    pub version: String,
    /// Wallets send this as a number, a decimal string or a `0x` hex string.
    #[serde(deserialize_with = "chain_id_from_any")]
    pub chain_id: u64,
    pub verifying_contract: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageValues {
    pub signer: Address,
    pub message: String,
}

/// The JSON object passed as the second parameter of `eth_signTypedData_v4`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataRequest {
    pub types: BTreeMap<String, Vec<TypeEntry>>,
    pub primary_type: String,
    pub domain: DomainValues,
    pub message: MessageValues,
}

fn chain_id_from_any<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = U256::deserialize(deserializer)?;
    u64::try_from(raw).map_err(|_| D::Error::custom(format!("chainId {raw} does not fit in u64")))
}

fn entries(descriptor: &TypeDescriptor) -> Vec<TypeEntry> {
    descriptor
        .fields()
        .iter()
        .map(|f| TypeEntry {
            name: f.name.clone(),
            ty: f.ty.as_str().to_string(),
        })
        .collect()
}

impl TypedDataRequest {
    pub fn new(domain: &Domain, payload: &Payload) -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            DOMAIN_TYPE_NAME.to_string(),
            entries(&TypeDescriptor::eip712_domain()),
        );
        types.insert(PRIMARY_TYPE.to_string(), entries(&TypeDescriptor::signature()));

        Self {
            types,
            primary_type: PRIMARY_TYPE.to_string(),
            domain: DomainValues {
                name: domain.name.clone(),
                version: domain.version.clone(),
                chain_id: domain.chain_id,
                verifying_contract: domain.verifying_contract,
            },
            message: MessageValues {
                signer: payload.signer,
                message: payload.message.clone(),
            },
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed parsing typed data JSON")
    }

    /// Check the declared schemas and return the domain and payload they describe.
    pub fn verify(&self) -> Result<(Domain, Payload)> {
        ensure!(
            self.primary_type == PRIMARY_TYPE,
            "unsupported primary type `{}` (expected `{PRIMARY_TYPE}`)",
            self.primary_type
        );
        ensure!(
            self.types.len() == 2,
            "typed data declares {} types, expected only {DOMAIN_TYPE_NAME} and {PRIMARY_TYPE}",
            self.types.len()
        );
        check_schema(&self.types, DOMAIN_TYPE_NAME, &TypeDescriptor::eip712_domain())?;
        check_schema(&self.types, PRIMARY_TYPE, &TypeDescriptor::signature())?;

        let domain = Domain::new(
            self.domain.name.clone(),
            self.domain.version.clone(),
            self.domain.chain_id,
            self.domain.verifying_contract,
        );
        let payload = Payload::new(self.message.signer, self.message.message.clone());
        Ok((domain, payload))
    }

    /// Digest the wallet signs for this request.
    pub fn digest(&self) -> Result<B256> {
        let (domain, payload) = self.verify()?;
        Ok(eip712::digest(&domain, &payload))
    }

    /// JSON-RPC params: `[signerAddress, typedData]`.
    pub fn rpc_params(&self) -> Value {
        json!([self.message.signer, self])
    }
}

fn check_schema(
    types: &BTreeMap<String, Vec<TypeEntry>>,
    name: &str,
    expected: &TypeDescriptor,
) -> Result<()> {
    let declared = types
        .get(name)
        .with_context(|| format!("typed data is missing the `{name}` schema"))?;
    ensure!(
        *declared == entries(expected),
        "`{name}` schema does not match `{}`",
        expected.encode_type()
    );
    Ok(())
}

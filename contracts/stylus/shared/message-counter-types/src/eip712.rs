//! EIP-712 typed structured data hashing.
//!
//! Implements the "v4" encoding produced by `eth_signTypedData_v4`:
//! - `domainSeparator = hashStruct(EIP712Domain)`
//! - `structHash = hashStruct(message)`
//! - `digest = keccak256("\x19\x01" || domainSeparator || structHash)`
//!
//! Any deviation (field order, type tag, integer width) still yields a valid-looking digest,
//! which recovers to a different address. Keep the type strings below bit-exact.

use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use alloy_primitives::{keccak256, Address, B256, U256};

/// `encodeType` of the four-field domain used by the message counter.
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// `encodeType` of the relayed payload.
pub const SIGNATURE_TYPE: &str = "Signature(address signer,string message)";

/// Primary type name the signer's wallet is asked to sign.
pub const PRIMARY_TYPE: &str = "Signature";

/// Domain name the contract is deployed under.
pub const DOMAIN_NAME: &str = "EIP712MessageCounter";
/// Domain version the contract is deployed under.
pub const DOMAIN_VERSION: &str = "0.0.1";

/// Atomic EIP-712 field types understood by the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Address,
    Bool,
    Bytes32,
    Uint256,
    String,
    Bytes,
}

impl FieldType {
    /// Parse a Solidity type tag. Only exact, canonical spellings are accepted
    /// (`uint` is not an alias for `uint256` in a type hash).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "address" => Some(Self::Address),
            "bool" => Some(Self::Bool),
            "bytes32" => Some(Self::Bytes32),
            "uint256" => Some(Self::Uint256),
            "string" => Some(Self::String),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Bool => "bool",
            Self::Bytes32 => "bytes32",
            Self::Uint256 => "uint256",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

/// A value supplied for one field of a [`TypeDescriptor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Address(Address),
    Bool(bool),
    Bytes32(B256),
    Uint256(U256),
    String(&'a str),
    Bytes(&'a [u8]),
}

impl FieldValue<'_> {
    fn field_type(&self) -> FieldType {
        match self {
            Self::Address(_) => FieldType::Address,
            Self::Bool(_) => FieldType::Bool,
            Self::Bytes32(_) => FieldType::Bytes32,
            Self::Uint256(_) => FieldType::Uint256,
            Self::String(_) => FieldType::String,
            Self::Bytes(_) => FieldType::Bytes,
        }
    }
}

/// Errors raised while building or applying a [`TypeDescriptor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    /// Struct or field name is empty or not a Solidity identifier.
    InvalidIdentifier,
    /// A struct must declare at least one field.
    NoFields,
    /// Two fields share a name (index of the second occurrence).
    DuplicateField(usize),
    /// Field type tag is not one of the supported atomic types (field index).
    UnsupportedType(usize),
    /// Number of values does not match the number of fields.
    ArityMismatch { expected: usize, got: usize },
    /// Value kind does not match the declared field type (field index).
    ValueMismatch(usize),
}

/// One named, typed member of a struct schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeField {
    pub name: String,
    pub ty: FieldType,
}

/// Ordered struct schema. Field order is part of the type hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    fields: Vec<TypeField>,
}

const DOMAIN_FIELDS: [(&str, FieldType); 4] = [
    ("name", FieldType::String),
    ("version", FieldType::String),
    ("chainId", FieldType::Uint256),
    ("verifyingContract", FieldType::Address),
];

const SIGNATURE_FIELDS: [(&str, FieldType); 2] =
    [("signer", FieldType::Address), ("message", FieldType::String)];

impl TypeDescriptor {
    /// Build a descriptor from `(fieldName, typeTag)` pairs, rejecting malformed schemas.
    pub fn new(name: &str, fields: &[(&str, &str)]) -> Result<Self, DescriptorError> {
        if !is_identifier(name) {
            return Err(DescriptorError::InvalidIdentifier);
        }
        if fields.is_empty() {
            return Err(DescriptorError::NoFields);
        }

        let mut out: Vec<TypeField> = Vec::with_capacity(fields.len());
        for (i, (field_name, tag)) in fields.iter().enumerate() {
            if !is_identifier(field_name) {
                return Err(DescriptorError::InvalidIdentifier);
            }
            if out.iter().any(|f| f.name == *field_name) {
                return Err(DescriptorError::DuplicateField(i));
            }
            let ty = FieldType::parse(tag).ok_or(DescriptorError::UnsupportedType(i))?;
            out.push(TypeField {
                name: field_name.to_string(),
                ty,
            });
        }

        Ok(Self {
            name: name.to_string(),
            fields: out,
        })
    }

    /// The `EIP712Domain` schema (name, version, chainId, verifyingContract).
    pub fn eip712_domain() -> Self {
        Self::from_static("EIP712Domain", &DOMAIN_FIELDS)
    }

    /// The `Signature` payload schema (signer, message).
    pub fn signature() -> Self {
        Self::from_static(PRIMARY_TYPE, &SIGNATURE_FIELDS)
    }

    fn from_static(name: &str, fields: &[(&str, FieldType)]) -> Self {
        Self {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(n, ty)| TypeField {
                    name: n.to_string(),
                    ty: *ty,
                })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[TypeField] {
        &self.fields
    }

    /// `encodeType`: `Name(type1 name1,type2 name2,...)`.
    pub fn encode_type(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 16 * self.fields.len());
        out.push_str(&self.name);
        out.push('(');
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(field.ty.as_str());
            out.push(' ');
            out.push_str(&field.name);
        }
        out.push(')');
        out
    }

    pub fn type_hash(&self) -> B256 {
        keccak256(self.encode_type().as_bytes())
    }

    /// `hashStruct` over values given in field order.
    pub fn hash_struct(&self, values: &[FieldValue<'_>]) -> Result<B256, DescriptorError> {
        if values.len() != self.fields.len() {
            return Err(DescriptorError::ArityMismatch {
                expected: self.fields.len(),
                got: values.len(),
            });
        }

        let mut enc = Eip712AbiEncoder::with_words(1 + values.len());
        enc.push_b256(&self.type_hash());
        for (i, (field, value)) in self.fields.iter().zip(values).enumerate() {
            if field.ty != value.field_type() {
                return Err(DescriptorError::ValueMismatch(i));
            }
            enc.push_value(value);
        }
        Ok(keccak256(enc.finish()))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Minimal ABI word encoder for `encodeData`.
pub struct Eip712AbiEncoder {
    buf: Vec<u8>,
}

impl Default for Eip712AbiEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Eip712AbiEncoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_words(words: usize) -> Self {
        Self {
            buf: Vec::with_capacity(32 * words),
        }
    }

    pub fn push_b256(&mut self, v: &B256) {
        self.buf.extend_from_slice(v.as_slice());
    }

    pub fn push_address(&mut self, addr: &Address) {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(addr.as_slice());
        self.buf.extend_from_slice(&word);
    }

    pub fn push_u256(&mut self, v: U256) {
        self.buf.extend_from_slice(&v.to_be_bytes::<32>());
    }

    pub fn push_bool(&mut self, v: bool) {
        let mut word = [0u8; 32];
        word[31] = v as u8;
        self.buf.extend_from_slice(&word);
    }

    /// Dynamic types (`string`, `bytes`) are encoded as the keccak256 of their contents.
    pub fn push_dynamic(&mut self, bytes: &[u8]) {
        self.push_b256(&keccak256(bytes));
    }

    pub fn push_value(&mut self, value: &FieldValue<'_>) {
        match value {
            FieldValue::Address(a) => self.push_address(a),
            FieldValue::Bool(b) => self.push_bool(*b),
            FieldValue::Bytes32(b) => self.push_b256(b),
            FieldValue::Uint256(u) => self.push_u256(*u),
            FieldValue::String(s) => self.push_dynamic(s.as_bytes()),
            FieldValue::Bytes(b) => self.push_dynamic(b),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// A struct with a statically known EIP-712 schema.
pub trait TypedData {
    /// Canonical `encodeType` string.
    const TYPE: &'static str;

    /// Append the `encodeData` words for `self` (type hash excluded).
    fn encode_data(&self, enc: &mut Eip712AbiEncoder);

    fn type_hash() -> B256 {
        keccak256(Self::TYPE.as_bytes())
    }

    fn hash_struct(&self) -> B256 {
        let mut enc = Eip712AbiEncoder::new();
        enc.push_b256(&Self::type_hash());
        self.encode_data(&mut enc);
        keccak256(enc.finish())
    }
}

/// Signing domain. Immutable per deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Domain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
        }
    }

    /// Domain of a message counter deployed at `verifying_contract` on `chain_id`.
    pub fn message_counter(chain_id: u64, verifying_contract: Address) -> Self {
        Self::new(DOMAIN_NAME, DOMAIN_VERSION, chain_id, verifying_contract)
    }

    pub fn separator(&self) -> B256 {
        self.hash_struct()
    }
}

impl TypedData for Domain {
    const TYPE: &'static str = DOMAIN_TYPE;

    fn encode_data(&self, enc: &mut Eip712AbiEncoder) {
        enc.push_dynamic(self.name.as_bytes());
        enc.push_dynamic(self.version.as_bytes());
        enc.push_u256(U256::from(self.chain_id));
        enc.push_address(&self.verifying_contract);
    }
}

/// The relayed unit of work: `Signature(address signer,string message)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    pub signer: Address,
    pub message: String,
}

impl Payload {
    pub fn new(signer: Address, message: impl Into<String>) -> Self {
        Self {
            signer,
            message: message.into(),
        }
    }
}

impl TypedData for Payload {
    const TYPE: &'static str = SIGNATURE_TYPE;

    fn encode_data(&self, enc: &mut Eip712AbiEncoder) {
        enc.push_address(&self.signer);
        enc.push_dynamic(self.message.as_bytes());
    }
}

/// `keccak256("\x19\x01" || domainSeparator || structHash)`.
pub fn final_digest(domain_separator: &B256, struct_hash: &B256) -> B256 {
    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.extend_from_slice(b"\x19\x01");
    buf.extend_from_slice(domain_separator.as_slice());
    buf.extend_from_slice(struct_hash.as_slice());
    keccak256(buf)
}

/// Digest a statically typed message under `domain`.
pub fn digest<T: TypedData>(domain: &Domain, message: &T) -> B256 {
    final_digest(&domain.separator(), &message.hash_struct())
}

/// Digest values described by a runtime `descriptor` under `domain`.
pub fn digest_with(
    domain: &Domain,
    descriptor: &TypeDescriptor,
    values: &[FieldValue<'_>],
) -> Result<B256, DescriptorError> {
    let struct_hash = descriptor.hash_struct(values)?;
    Ok(final_digest(&domain.separator(), &struct_hash))
}

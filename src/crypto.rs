use crate::Sha256;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The address that owns a transaction output.
/// In a real deployment this would be derived from a public key; here it is an opaque
/// string because key management is outside the scope of the consensus core.
#[derive(Debug, Clone, Hash, Serialize, Deserialize, Eq, PartialEq)]
pub struct Address(String);

impl Address {
    pub fn new(address: String) -> Self {
        Self(address)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque signature bytes attached to a transaction input.
#[derive(Debug, Clone, Hash, Serialize, Deserialize, Eq, PartialEq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(raw_bytes: Vec<u8>) -> Self {
        Self(raw_bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0[..]
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.as_slice()))
    }
}

/// The external signature verification oracle.
/// The consensus core treats verification as a trusted black box: it asks whether the
/// signature over the given message was produced by the owner of the address, and
/// accepts the answer without knowing anything about the underlying scheme.
pub trait SignatureOracle {
    fn verify(&self, address: &Address, message: &[u8], signature: &Signature) -> bool;
}

/// A deterministic stand-in for a real public-key signature scheme: the "signature" is
/// the SHA-256 digest of the address bytes followed by the message.
/// It offers no forgery resistance whatsoever. It exists so the core can be exercised
/// end to end (tests, benchmarks) without pulling key management into scope; a real
/// node plugs an actual scheme in behind the same trait.
pub struct DigestSignatureScheme {}

impl DigestSignatureScheme {
    pub fn new() -> Self {
        Self {}
    }

    pub fn sign(&self, address: &Address, message: &[u8]) -> Signature {
        Signature::new(Self::digest(address, message))
    }

    fn digest(address: &Address, message: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(address.as_bytes().len() + message.len());
        data.extend_from_slice(address.as_bytes());
        data.extend_from_slice(message);
        Sha256::digest(&data).as_slice().to_vec()
    }
}

impl SignatureOracle for DigestSignatureScheme {
    fn verify(&self, address: &Address, message: &[u8], signature: &Signature) -> bool {
        signature.as_slice() == &Self::digest(address, message)[..]
    }
}

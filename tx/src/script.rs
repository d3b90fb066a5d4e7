//! Opaque script bytes plus the few scripts the tools synthesize locally.
//!
//! Everything else (addresses, ownership, signing) comes from the node.

use crate::error::TxError;
use std::fmt;

const OP_RETURN: u8 = 0x6a;
const OP_1: u8 = 0x51;
const OP_2: u8 = 0x52;
const OP_CHECKMULTISIG: u8 = 0xae;

/// A locking or unlocking script, treated as opaque bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_hex(s: &str) -> Result<Self, TxError> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| TxError::InvalidHex(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// The provably-unspendable zero-value burn marker.
    pub fn op_return() -> Self {
        Self(vec![OP_RETURN])
    }

    /// An `OP_RETURN <data>` marker output.
    pub fn op_return_data(data: &[u8]) -> Self {
        let mut bytes = vec![OP_RETURN];
        push_slice(&mut bytes, data);
        Self(bytes)
    }

    /// A bare 1-of-2 multisig locking script with a garbage second key,
    /// used to discourage propagation of the payment transaction.
    pub fn bare_multisig_1of2(pubkey: &[u8; 33]) -> Self {
        let mut bytes = vec![OP_1];
        push_slice(&mut bytes, pubkey);
        push_slice(&mut bytes, &[0u8; 33]);
        bytes.push(OP_2);
        bytes.push(OP_CHECKMULTISIG);
        Self(bytes)
    }

    pub fn is_op_return(&self) -> bool {
        self.0.first() == Some(&OP_RETURN)
    }
}

/// Append a minimal push of `data` (direct push or PUSHDATA1).
fn push_slice(out: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        0..=75 => out.push(data.len() as u8),
        76..=255 => {
            out.push(0x4c); // OP_PUSHDATA1
            out.push(data.len() as u8);
        }
        _ => {
            out.push(0x4d); // OP_PUSHDATA2
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        }
    }
    out.extend_from_slice(data);
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let script = Script::from_hex("76a914000000000000000000000000000000000000000088ac").unwrap();
        assert_eq!(script.len(), 25);
        assert_eq!(
            script.to_hex(),
            "76a914000000000000000000000000000000000000000088ac"
        );
    }

    #[test]
    fn test_op_return_marker() {
        let script = Script::op_return();
        assert!(script.is_op_return());
        assert_eq!(script.as_bytes(), &[0x6a]);
    }

    #[test]
    fn test_op_return_data() {
        let script = Script::op_return_data(b"abc");
        assert!(script.is_op_return());
        assert_eq!(script.as_bytes(), &[0x6a, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn test_bare_multisig_shape() {
        let script = Script::bare_multisig_1of2(&[0x02; 33]);
        let bytes = script.as_bytes();
        assert_eq!(bytes[0], 0x51); // OP_1
        assert_eq!(*bytes.last().unwrap(), 0xae); // OP_CHECKMULTISIG
        assert_eq!(bytes.len(), 1 + 34 + 34 + 1 + 1);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(Script::from_hex("zz").is_err());
    }
}

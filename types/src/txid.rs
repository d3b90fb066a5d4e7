//! Transaction identifiers and outpoints.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 32-byte transaction id.
///
/// Stored in wire (little-endian) byte order; displayed and parsed in the
/// conventional reversed hex used by nodes and explorers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Txid([u8; 32]);

impl Txid {
    pub const ZERO: Self = Self([0u8; 32]);

    /// Construct from wire-order bytes.
    pub fn from_wire_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The wire-order bytes, as serialized inside transactions.
    pub fn as_wire_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Txid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(ParseError::InvalidTxid(format!(
                "wrong length: expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0]).ok_or_else(|| ParseError::InvalidTxid(s.to_string()))?;
            let lo = hex_val(chunk[1]).ok_or_else(|| ParseError::InvalidTxid(s.to_string()))?;
            // Reverse while parsing: display order is big-endian.
            bytes[31 - i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter().rev() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({self})")
    }
}

/// A reference to a specific output of a prior transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let s = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
        let txid: Txid = s.parse().unwrap();
        assert_eq!(txid.to_string(), s);
    }

    #[test]
    fn test_display_reverses_wire_order() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xaa; // lowest wire byte prints last
        let txid = Txid::from_wire_bytes(bytes);
        let s = txid.to_string();
        assert!(s.ends_with("aa"));
        assert!(s.starts_with("00"));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!("abcd".parse::<Txid>().is_err());
        assert!("g".repeat(64).parse::<Txid>().is_err());
    }

    #[test]
    fn test_outpoint_display() {
        let txid: Txid = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
            .parse()
            .unwrap();
        let op = OutPoint::new(txid, 3);
        assert!(op.to_string().ends_with(":3"));
    }
}

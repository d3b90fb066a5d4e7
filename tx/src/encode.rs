//! Consensus serialization of draft transactions.
//!
//! Wire layout: little-endian version, compact-size input count, per input
//! the outpoint (wire-order txid + vout), length-prefixed unlocking script
//! and sequence; compact-size output count, per output the value and
//! length-prefixed locking script; little-endian lock time.

use crate::error::TxError;
use crate::script::Script;
use crate::transaction::{Transaction, TxIn, TxOut};
use rbf_types::{Amount, OutPoint, Txid};

/// Bytes a compact-size varint occupies for `n`.
pub const fn varint_len(n: u64) -> u64 {
    match n {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

fn write_varint(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xFC => out.push(n as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], TxError> {
        if self.pos + n > self.data.len() {
            return Err(TxError::Truncated);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TxError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn read_u32(&mut self) -> Result<u32, TxError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, TxError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_varint(&mut self) -> Result<u64, TxError> {
        let tag = self.take(1)?[0];
        Ok(match tag {
            0xFD => u16::from_le_bytes(self.read_array()?) as u64,
            0xFE => u32::from_le_bytes(self.read_array()?) as u64,
            0xFF => u64::from_le_bytes(self.read_array()?),
            n => n as u64,
        })
    }

    fn read_script(&mut self) -> Result<Script, TxError> {
        let len = self.read_varint()?;
        if len > (self.data.len() - self.pos) as u64 {
            return Err(TxError::OversizedLength(len));
        }
        Ok(Script::new(self.take(len as usize)?.to_vec()))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Transaction {
    /// Serialize to consensus bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size() as usize);
        out.extend_from_slice(&self.version.to_le_bytes());
        write_varint(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(input.outpoint.txid.as_wire_bytes());
            out.extend_from_slice(&input.outpoint.vout.to_le_bytes());
            write_varint(&mut out, input.script_sig.len() as u64);
            out.extend_from_slice(input.script_sig.as_bytes());
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_varint(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.sats().to_le_bytes());
            write_varint(&mut out, output.script_pubkey.len() as u64);
            out.extend_from_slice(output.script_pubkey.as_bytes());
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Parse consensus bytes; rejects trailing data.
    pub fn decode(data: &[u8]) -> Result<Self, TxError> {
        let mut cursor = Cursor { data, pos: 0 };
        let version = cursor.read_u32()?;

        let input_count = cursor.read_varint()?;
        let mut inputs = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            let txid_bytes: [u8; 32] = cursor.read_array()?;
            let vout = cursor.read_u32()?;
            let script_sig = cursor.read_script()?;
            let sequence = cursor.read_u32()?;
            inputs.push(TxIn {
                outpoint: OutPoint::new(Txid::from_wire_bytes(txid_bytes), vout),
                script_sig,
                sequence,
            });
        }

        let output_count = cursor.read_varint()?;
        let mut outputs = Vec::with_capacity(output_count.min(1024) as usize);
        for _ in 0..output_count {
            let value = Amount::new(cursor.read_u64()?);
            let script_pubkey = cursor.read_script()?;
            outputs.push(TxOut {
                value,
                script_pubkey,
            });
        }

        let lock_time = cursor.read_u32()?;
        if cursor.remaining() != 0 {
            return Err(TxError::TrailingBytes(cursor.remaining()));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn from_hex(s: &str) -> Result<Self, TxError> {
        let bytes = hex::decode(s).map_err(|e| TxError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_tx(script_sig_len: usize, outputs: &[(u64, usize)]) -> Transaction {
        let mut tx = Transaction::new();
        tx.inputs.push(TxIn {
            outpoint: OutPoint::new(Txid::from_wire_bytes([7u8; 32]), 1),
            script_sig: Script::new(vec![0xab; script_sig_len]),
            sequence: 0xFFFF_FFFD,
        });
        for &(value, spk_len) in outputs {
            tx.outputs.push(TxOut {
                value: Amount::new(value),
                script_pubkey: Script::new(vec![0xcd; spk_len]),
            });
        }
        tx
    }

    #[test]
    fn test_varint_widths() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(0xFC), 1);
        assert_eq!(varint_len(0xFD), 3);
        assert_eq!(varint_len(0xFFFF), 3);
        assert_eq!(varint_len(0x1_0000), 5);
        assert_eq!(varint_len(u64::MAX), 9);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let tx = sample_tx(107, &[(99_000, 25), (0, 1)]);
        let decoded = Transaction::decode(&tx.encode()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_hex_round_trip() {
        let tx = sample_tx(0, &[(1_234, 25)]);
        assert_eq!(Transaction::from_hex(&tx.to_hex()).unwrap(), tx);
    }

    #[test]
    fn test_truncated_rejected() {
        let mut bytes = sample_tx(107, &[(5, 25)]).encode();
        bytes.truncate(bytes.len() - 1);
        assert_eq!(Transaction::decode(&bytes), Err(TxError::Truncated));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = sample_tx(107, &[(5, 25)]).encode();
        bytes.push(0);
        assert_eq!(Transaction::decode(&bytes), Err(TxError::TrailingBytes(1)));
    }

    proptest! {
        /// The size accessor must agree with the actual serialization for
        /// any script lengths, including ones crossing varint width bumps.
        #[test]
        fn prop_size_matches_encoding(
            script_sig_len in 0usize..600,
            spk_len in 0usize..300,
            value in 0u64..21_000_000_00_000_000,
        ) {
            let tx = sample_tx(script_sig_len, &[(value, spk_len)]);
            prop_assert_eq!(tx.serialized_size() as usize, tx.encode().len());
        }
    }
}

//! The draft transaction mutated by the convergence engine.

use crate::encode::varint_len;
use crate::error::TxError;
use crate::script::Script;
use rbf_types::{Amount, OutPoint};

/// A transaction input: a prior outpoint, its unlocking script (empty
/// until signed) and the sequence number controlling replaceability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub outpoint: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    /// A not-yet-signed input spending `outpoint`.
    pub fn unsigned(outpoint: OutPoint, sequence: u32) -> Self {
        Self {
            outpoint,
            script_sig: Script::empty(),
            sequence,
        }
    }
}

/// A transaction output: an amount locked by a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Script) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

/// A mutable draft transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    /// An empty version-2 transaction.
    pub fn new() -> Self {
        Self {
            version: 2,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    /// Exact serialized byte length of the current contents.
    ///
    /// Must always equal `encode().len()`; the fee-rate loop depends on it
    /// being recomputed after every mutation.
    pub fn serialized_size(&self) -> u64 {
        let mut size = 4 + 4; // version + lock_time
        size += varint_len(self.inputs.len() as u64);
        for input in &self.inputs {
            // outpoint (32 + 4) + script length prefix + script + sequence
            size += 36 + varint_len(input.script_sig.len() as u64) + input.script_sig.len() as u64 + 4;
        }
        size += varint_len(self.outputs.len() as u64);
        for output in &self.outputs {
            size += 8 + varint_len(output.script_pubkey.len() as u64)
                + output.script_pubkey.len() as u64;
        }
        size
    }

    /// Sum of all output values, with overflow checking.
    pub fn total_output_value(&self) -> Result<Amount, TxError> {
        self.outputs
            .iter()
            .try_fold(Amount::ZERO, |acc, out| acc.checked_add(out.value))
            .ok_or(TxError::ValueOverflow)
    }
}

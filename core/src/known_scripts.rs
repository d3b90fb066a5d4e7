//! Registry of locking scripts the burn scanner knows how to spend.
//!
//! Loaded once at startup and owned by the scanner instance, never held
//! as ambient state. Each entry maps a locking script to the way its outputs
//! get unlocked: either the node's wallet signs (imported keys), or a
//! precomputed unlocking script is attached verbatim (outputs spendable
//! without a signature, such as trivial p2sh redeems).

use crate::error::Error;
use rbf_tx::Script;
use std::collections::HashMap;
use std::path::Path;

/// How to unlock an output paying a known script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpendTemplate {
    /// The node's wallet holds the key; sign through the node.
    NodeSigned,
    /// Attach this unlocking script as-is.
    Precomputed(Script),
}

/// Locking scripts the scanner watches for, with their spend templates.
#[derive(Debug, Default)]
pub struct KnownScripts {
    entries: HashMap<Script, SpendTemplate>,
}

impl KnownScripts {
    /// Load from a file: one entry per line, `#` comments and blank lines
    /// skipped. A line is either `<script_pubkey_hex>` (node-signed) or
    /// `<script_pubkey_hex> <script_sig_hex>` (precomputed unlock).
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&contents).map_err(|e| {
            Error::Config(format!("{}: {e}", path.display()))
        })
    }

    fn parse(contents: &str) -> Result<Self, Error> {
        let mut entries = HashMap::new();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let spk = fields
                .next()
                .map(Script::from_hex)
                .transpose()
                .map_err(|e| Error::InvalidInput(format!("line {}: {e}", lineno + 1)))?
                .ok_or_else(|| Error::InvalidInput(format!("line {}: empty entry", lineno + 1)))?;
            let template = match fields.next() {
                Some(sig_hex) => SpendTemplate::Precomputed(
                    Script::from_hex(sig_hex)
                        .map_err(|e| Error::InvalidInput(format!("line {}: {e}", lineno + 1)))?,
                ),
                None => SpendTemplate::NodeSigned,
            };
            if fields.next().is_some() {
                return Err(Error::InvalidInput(format!(
                    "line {}: expected at most two fields",
                    lineno + 1
                )));
            }
            entries.insert(spk, template);
        }
        Ok(Self { entries })
    }

    pub fn lookup(&self, script_pubkey: &Script) -> Option<&SpendTemplate> {
        self.entries.get(script_pubkey)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

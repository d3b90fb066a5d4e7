//! Mempool scanner that spends outputs locked by known scripts entirely
//! to fees, or replaces whole transactions with an all-to-fees variant
//! when their signatures don't cover the outputs.

use crate::error::Error;
use crate::known_scripts::{KnownScripts, SpendTemplate};
use crate::node_client::{NodeClient, NodeEndpoint};
use rbf_tx::{Script, Transaction, TxIn, TxOut};
use rbf_types::{Amount, OutPoint, Txid};
use std::collections::HashSet;
use std::time::Duration;

/// Sighash mode asking the signer to cover no outputs, so the burn tx
/// stays valid whatever we put in them.
const SIGHASH_NONE_ANYONECANPAY: &str = "NONE|ANYONECANPAY";

/// What one polling cycle did; used for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub new_txs: usize,
    pub replaced: usize,
    pub burns_sent: usize,
}

/// Long-running scanner with its own known-script registry and the set of
/// mempool ids already examined. The seen-set grows unbounded for the
/// life of the process; it is never persisted.
pub struct BurnScanner {
    endpoint: NodeEndpoint,
    known: KnownScripts,
    delay: Duration,
    seen: HashSet<Txid>,
}

impl BurnScanner {
    pub fn new(endpoint: NodeEndpoint, known: KnownScripts, delay: Duration) -> Self {
        Self {
            endpoint,
            known,
            delay,
            seen: HashSet::new(),
        }
    }

    /// Poll forever at a fixed interval. Only broadcast rejections are
    /// survivable; transport and signing failures abort the process.
    pub async fn run(&mut self) -> Result<(), Error> {
        tracing::info!(
            known_scripts = self.known.len(),
            "scanning mempool for burnable outputs"
        );
        loop {
            // Reconnect each cycle: the previous connection may have been
            // closed while we slept.
            let client = self.endpoint.connect()?;
            let stats = self.poll_once(&client).await?;
            if stats.new_txs > 0 {
                tracing::info!(
                    new_txs = stats.new_txs,
                    replaced = stats.replaced,
                    burns_sent = stats.burns_sent,
                    "cycle complete"
                );
            }
            tracing::debug!("sleeping {}s", self.delay.as_secs());
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Examine mempool transactions not seen in earlier cycles.
    pub async fn poll_once(&mut self, client: &NodeClient) -> Result<CycleStats, Error> {
        let mut stats = CycleStats::default();

        let mempool = client.mempool_txids().await?;
        let new_txids: Vec<Txid> = mempool
            .into_iter()
            .filter(|txid| self.seen.insert(*txid))
            .collect();
        stats.new_txs = new_txids.len();

        for txid in new_txids {
            let info = match client.get_transaction(&txid).await {
                Ok(info) => info,
                // Evicted between the mempool listing and the fetch.
                Err(Error::TxNotFound(_)) => continue,
                Err(e) => return Err(e),
            };

            if is_all_to_fees(&info.tx) {
                continue;
            }

            // The unlocking scripts might not sign the outputs at all, in
            // which case the whole transaction can be redirected to fees.
            let replacement = all_to_fees_replacement(&info.tx);
            match client.broadcast(&replacement).await {
                Ok(replacement_txid) => {
                    tracing::info!(%txid, %replacement_txid, "replaced tx with all-to-fees");
                    stats.replaced += 1;
                    continue;
                }
                Err(Error::Rejected(reason)) => {
                    tracing::debug!(%txid, %reason, "whole-tx replacement rejected");
                }
                Err(e) => return Err(e),
            }

            // Couldn't replace; spend individual known outputs instead.
            stats.burns_sent += self.burn_outputs(client, &txid, &info.tx).await?;
        }

        Ok(stats)
    }

    async fn burn_outputs(
        &self,
        client: &NodeClient,
        txid: &Txid,
        tx: &Transaction,
    ) -> Result<usize, Error> {
        let mut sent = 0;
        for (vout, output) in tx.outputs.iter().enumerate() {
            let Some(template) = self.known.lookup(&output.script_pubkey) else {
                continue;
            };
            let outpoint = OutPoint::new(*txid, vout as u32);
            let mut burn = burn_to_fees_tx(outpoint);

            match template {
                SpendTemplate::Precomputed(script_sig) => {
                    burn.inputs[0].script_sig = script_sig.clone();
                }
                SpendTemplate::NodeSigned => {
                    let signed = client
                        .sign_transaction(&burn, Some(SIGHASH_NONE_ANYONECANPAY))
                        .await?;
                    if !signed.complete {
                        return Err(Error::SigningIncomplete);
                    }
                    burn = signed.tx;
                }
            }

            // One bad candidate must not block the rest of the cycle.
            match client.broadcast(&burn).await {
                Ok(burn_txid) => {
                    tracing::info!(%outpoint, %burn_txid, "sent burn tx");
                    sent += 1;
                }
                Err(Error::Rejected(reason)) => {
                    tracing::info!(%outpoint, %reason, tx = %burn.to_hex(), "burn tx rejected");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(sent)
    }
}

/// Whether a transaction already sends everything to fees: exactly one
/// zero-value OP_RETURN output.
pub fn is_all_to_fees(tx: &Transaction) -> bool {
    tx.outputs.len() == 1
        && tx.outputs[0].value.is_zero()
        && tx.outputs[0].script_pubkey == Script::op_return()
}

/// Rebuild a transaction with its inputs (and their existing unlocking
/// scripts) intact but every output replaced by the zero-value marker,
/// preserving version and lock time so the signatures stay valid when
/// they don't cover outputs.
pub fn all_to_fees_replacement(tx: &Transaction) -> Transaction {
    Transaction {
        version: tx.version,
        inputs: tx.inputs.clone(),
        outputs: vec![TxOut::new(Amount::ZERO, Script::op_return())],
        lock_time: tx.lock_time,
    }
}

/// A one-input transaction spending `outpoint` entirely to fees.
pub fn burn_to_fees_tx(outpoint: OutPoint) -> Transaction {
    let mut tx = Transaction::new();
    tx.inputs
        .push(TxIn::unsigned(outpoint, rbf_types::params::SEQUENCE_FINAL));
    tx.outputs.push(TxOut::new(Amount::ZERO, Script::op_return()));
    tx
}

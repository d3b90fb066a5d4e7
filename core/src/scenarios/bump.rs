//! Bump the fee of an unconfirmed transaction by a ratio of its old rate.

use crate::engine::{converge, Draft, ResignTx};
use crate::error::Error;
use crate::node_client::NodeClient;
use crate::pool::UnspentPool;
use rbf_tx::{Transaction, TxOut};
use rbf_types::params::SEQUENCE_FINAL;
use rbf_types::{Amount, FeeRate, Txid};

#[derive(Debug, Clone)]
pub struct BumpOptions {
    pub txid: Txid,
    /// Ratio of new fee rate to old fee rate.
    pub ratio: FeeRate,
    pub dust: Amount,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct BumpOutcome {
    pub tx: Transaction,
    /// Set when the replacement was broadcast (not a dry run).
    pub broadcast_txid: Option<Txid>,
}

pub async fn run(client: &NodeClient, opts: &BumpOptions) -> Result<BumpOutcome, Error> {
    let info = client.get_transaction(&opts.txid).await?;
    if info.confirmations > 0 {
        return Err(Error::AlreadyConfirmed {
            confirmations: info.confirmations,
        });
    }
    let mut tx = info.tx;

    // Locate an output we control to use as change; append a fresh
    // zero-value one when the transaction has none.
    let mut change_index = None;
    for (index, output) in tx.outputs.iter().enumerate() {
        if client.script_is_owned(&output.script_pubkey).await? {
            change_index = Some(index);
            break;
        }
    }
    let change_index = match change_index {
        Some(index) => index,
        None => {
            let script = client.new_change_script().await?;
            tx.outputs.push(TxOut::new(Amount::ZERO, script));
            tx.outputs.len() - 1
        }
    };

    let value_in = resolve_input_value(client, &tx).await?;
    let mut draft = Draft::new(tx, change_index, value_in)?;

    let old_rate = draft.fee_rate().ok_or_else(|| {
        Error::InvalidTransaction("outputs exceed inputs on an existing transaction".into())
    })?;
    let target = old_rate.scale(opts.ratio);
    tracing::debug!(
        size = draft.size(),
        fee = draft.fee(),
        %old_rate,
        %target,
        "bumping fee"
    );

    let mut pool = UnspentPool::new(client.list_unspent(1).await?);
    let outcome = converge(&mut draft, &mut pool, target, opts.dust, SEQUENCE_FINAL, client).await?;
    tracing::debug!(
        iterations = outcome.iterations,
        inputs_added = outcome.inputs_added,
        new_size = draft.size(),
        new_fee = draft.fee(),
        "converged"
    );

    client.resign(&mut draft.tx).await?;

    let broadcast_txid = if opts.dry_run {
        None
    } else {
        tracing::debug!(tx = %draft.tx.to_hex(), "sending replacement");
        Some(client.broadcast(&draft.tx).await?)
    };

    Ok(BumpOutcome {
        tx: draft.tx,
        broadcast_txid,
    })
}

/// Total value consumed by a transaction's inputs, resolved by fetching
/// each previous transaction from the node.
pub(crate) async fn resolve_input_value(
    client: &NodeClient,
    tx: &Transaction,
) -> Result<Amount, Error> {
    let mut total = Amount::ZERO;
    for input in &tx.inputs {
        let prev = client.get_transaction(&input.outpoint.txid).await?;
        let prev_out = prev
            .tx
            .outputs
            .get(input.outpoint.vout as usize)
            .ok_or_else(|| {
                Error::InvalidTransaction(format!(
                    "input references missing output {}",
                    input.outpoint
                ))
            })?;
        total = total
            .checked_add(prev_out.value)
            .ok_or(Error::AmountOverflow)?;
    }
    Ok(total)
}

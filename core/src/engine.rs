//! Fee-rate convergence engine.
//!
//! The loop repeatedly measures the draft's fee shortfall against the
//! target rate and applies one policy step at a time. Shrinking change
//! leaves the serialized size untouched; adding an input changes it by an
//! amount unknown until the node signs, so every addition is followed by a
//! mandatory re-sign before the next measurement. Skipping that round-trip
//! would corrupt the fee-rate estimate.

use crate::error::Error;
use crate::policy::{self, Step};
use crate::pool::UnspentPool;
use rbf_tx::{Transaction, TxIn};
use rbf_types::{Amount, FeeRate};

/// Re-signs a draft in place, filling in the unlocking scripts.
///
/// Implemented by the node client; tests substitute a mock that installs
/// fixed-size scripts.
pub trait ResignTx {
    fn resign(
        &self,
        tx: &mut Transaction,
    ) -> impl std::future::Future<Output = Result<(), Error>> + Send;
}

/// A draft transaction with its running value totals.
///
/// The totals are carried alongside the transaction so the loop never has
/// to re-resolve previous outputs mid-flight; the fee is signed because a
/// draft under construction can be output-heavy before funding.
#[derive(Debug)]
pub struct Draft {
    pub tx: Transaction,
    /// Index of the change output mutations are applied to.
    pub change_index: usize,
    pub value_in: Amount,
    pub value_out: Amount,
}

impl Draft {
    /// Wrap a transaction whose total input value is already known.
    pub fn new(tx: Transaction, change_index: usize, value_in: Amount) -> Result<Self, Error> {
        let value_out = tx.total_output_value()?;
        if change_index >= tx.outputs.len() {
            return Err(Error::InvalidTransaction(format!(
                "change index {change_index} out of range for {} outputs",
                tx.outputs.len()
            )));
        }
        Ok(Self {
            tx,
            change_index,
            value_in,
            value_out,
        })
    }

    /// Current fee; negative while outputs exceed inputs.
    pub fn fee(&self) -> i128 {
        self.value_in.sats() as i128 - self.value_out.sats() as i128
    }

    pub fn size(&self) -> u64 {
        self.tx.serialized_size()
    }

    /// Observed fee rate, once the draft is no longer output-heavy.
    pub fn fee_rate(&self) -> Option<FeeRate> {
        let fee = self.fee();
        if fee < 0 {
            return None;
        }
        Some(FeeRate::of(Amount::new(fee as u64), self.size()))
    }

    pub fn change_value(&self) -> Amount {
        self.tx.outputs[self.change_index].value
    }
}

/// Outcome of a successful convergence run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converged {
    pub iterations: u32,
    pub inputs_added: u32,
}

/// Mutate `draft` until its fee rate meets `target`, or fail with
/// [`Error::InsufficientFunds`] once `pool` is exhausted.
///
/// New inputs are appended with `sequence`, the scenario's replaceability
/// signal. Terminates in at most `pool + 1` iterations: a shrink step hits
/// the target exactly at the current size, and every other step strictly
/// shrinks the pool.
pub async fn converge<S: ResignTx>(
    draft: &mut Draft,
    pool: &mut UnspentPool,
    target: FeeRate,
    dust: Amount,
    sequence: u32,
    signer: &S,
) -> Result<Converged, Error> {
    let mut iterations = 0u32;
    let mut inputs_added = 0u32;

    loop {
        let size = draft.size();
        let delta_fee = target.delta_fee(draft.fee(), size);
        if delta_fee == 0 {
            break;
        }
        iterations += 1;
        tracing::debug!(delta_fee, size, "fee shortfall");

        match policy::select_step(draft.change_value(), delta_fee, dust, pool)? {
            Step::ShrinkChange(delta) => {
                let change = &mut draft.tx.outputs[draft.change_index];
                change.value = change
                    .value
                    .checked_sub(delta)
                    .ok_or(Error::AmountOverflow)?;
                draft.value_out = draft
                    .value_out
                    .checked_sub(delta)
                    .ok_or(Error::AmountOverflow)?;
            }
            Step::AddInput(unspent) => {
                tracing::debug!(
                    outpoint = %unspent.outpoint,
                    amount = %unspent.amount,
                    "adding input"
                );
                draft
                    .tx
                    .inputs
                    .push(TxIn::unsigned(unspent.outpoint, sequence));
                draft.value_in = draft
                    .value_in
                    .checked_add(unspent.amount)
                    .ok_or(Error::AmountOverflow)?;
                // Fold the whole candidate into change: the invariant
                // holds without re-deriving totals, and a later shrink
                // iteration trims any excess.
                let change = &mut draft.tx.outputs[draft.change_index];
                change.value = change
                    .value
                    .checked_add(unspent.amount)
                    .ok_or(Error::AmountOverflow)?;
                draft.value_out = draft
                    .value_out
                    .checked_add(unspent.amount)
                    .ok_or(Error::AmountOverflow)?;

                // The new unlocking script's length is unknown until
                // signed; measuring size before the re-sign would
                // under-count it.
                signer.resign(&mut draft.tx).await?;
                inputs_added += 1;
            }
        }
    }

    Ok(Converged {
        iterations,
        inputs_added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Unspent;
    use proptest::prelude::*;
    use rbf_tx::{Script, TxOut};
    use rbf_types::{OutPoint, Txid};

    const DUST: Amount = Amount::new(10_000);
    const SEQ: u32 = 0xFFFF_FFFF;
    const P2PKH_SIG_LEN: usize = 107;

    /// Installs a fixed-length unlocking script on every unsigned input.
    struct FixedSigner {
        sig_len: usize,
    }

    impl ResignTx for FixedSigner {
        async fn resign(&self, tx: &mut Transaction) -> Result<(), Error> {
            for input in &mut tx.inputs {
                if input.script_sig.is_empty() {
                    input.script_sig = Script::new(vec![0u8; self.sig_len]);
                }
            }
            Ok(())
        }
    }

    /// A signer that must never be called.
    struct NoSigner;

    impl ResignTx for NoSigner {
        async fn resign(&self, _tx: &mut Transaction) -> Result<(), Error> {
            panic!("resign called on a draft that should converge by shrinking");
        }
    }

    fn outpoint(n: u8) -> OutPoint {
        OutPoint::new(Txid::from_wire_bytes([n; 32]), 0)
    }

    fn pool_of(amounts: &[u64]) -> UnspentPool {
        UnspentPool::new(
            amounts
                .iter()
                .enumerate()
                .map(|(i, &a)| Unspent {
                    outpoint: outpoint(i as u8 + 100),
                    amount: Amount::new(a),
                })
                .collect(),
        )
    }

    /// One signed input (script length tuned so the whole tx is 250
    /// bytes), a change output and a payment output.
    fn draft_250_bytes(change: u64, payment: u64, value_in: u64) -> Draft {
        let mut tx = Transaction::new();
        tx.inputs.push(TxIn {
            outpoint: outpoint(1),
            script_sig: Script::new(vec![0u8; 131]),
            sequence: SEQ,
        });
        tx.outputs.push(TxOut::new(
            Amount::new(change),
            Script::new(vec![0xaa; 25]),
        ));
        tx.outputs.push(TxOut::new(
            Amount::new(payment),
            Script::new(vec![0xbb; 25]),
        ));
        assert_eq!(tx.serialized_size(), 250);
        Draft::new(tx, 0, Amount::new(value_in)).unwrap()
    }

    fn run(
        draft: &mut Draft,
        pool: &mut UnspentPool,
        target: FeeRate,
        signer: &impl ResignTx,
    ) -> Result<Converged, Error> {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(converge(draft, pool, target, DUST, SEQ, signer))
    }

    #[test]
    fn test_ten_x_bump_adds_exactly_one_input() {
        // 100_000 in, 99_000 out, 250 bytes: 4 sat/vB. Target 40 sat/vB
        // with a single 50_000 candidate available.
        let mut draft = draft_250_bytes(15_000, 84_000, 100_000);
        let mut pool = pool_of(&[50_000]);
        let target = FeeRate::of(Amount::new(1_000), 250).scale(FeeRate::from_sat_per_vb(10));

        let outcome = run(
            &mut draft,
            &mut pool,
            target,
            &FixedSigner {
                sig_len: P2PKH_SIG_LEN,
            },
        )
        .unwrap();

        assert_eq!(outcome.inputs_added, 1);
        assert!(target.is_met(draft.fee(), draft.size()));
        assert!(draft.change_value() > DUST);
        assert!(pool.is_empty());
        // The appended input carries the re-signed script.
        assert_eq!(draft.tx.inputs[1].script_sig.len(), P2PKH_SIG_LEN);
    }

    #[test]
    fn test_converges_by_shrinking_alone() {
        // Plenty of change headroom: a single shrink must suffice and the
        // signer must never be consulted.
        let mut draft = draft_250_bytes(80_000, 19_000, 100_000);
        let mut pool = pool_of(&[50_000]);
        let target = FeeRate::from_sat_per_vb(40);

        let outcome = run(&mut draft, &mut pool, target, &NoSigner).unwrap();

        assert_eq!(outcome, Converged { iterations: 1, inputs_added: 0 });
        assert!(target.is_met(draft.fee(), draft.size()));
        assert_eq!(pool.len(), 1);
        assert_eq!(draft.size(), 250); // shrinking never changes size
    }

    #[test]
    fn test_already_converged_is_idempotent() {
        let mut draft = draft_250_bytes(50_000, 49_000, 100_000);
        let mut pool = pool_of(&[50_000]);
        let target = FeeRate::from_sat_per_vb(40);

        run(&mut draft, &mut pool, target, &NoSigner).unwrap();
        let before = draft.tx.clone();

        let second = run(&mut draft, &mut pool, target, &NoSigner).unwrap();
        assert_eq!(second, Converged { iterations: 0, inputs_added: 0 });
        assert_eq!(draft.tx, before);
    }

    #[test]
    fn test_pool_exhaustion_is_insufficient_funds() {
        let mut draft = draft_250_bytes(10_050, 88_950, 100_000);
        let mut pool = pool_of(&[]);
        let err = run(
            &mut draft,
            &mut pool,
            FeeRate::from_sat_per_vb(40),
            &FixedSigner {
                sig_len: P2PKH_SIG_LEN,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds));
    }

    #[test]
    fn test_funds_output_heavy_draft() {
        // Build-from-scratch shape: no inputs yet, outputs exceed inputs.
        let mut tx = Transaction::new();
        tx.outputs.push(TxOut::new(Amount::ZERO, Script::new(vec![0xaa; 25])));
        tx.outputs.push(TxOut::new(
            Amount::new(70_000),
            Script::new(vec![0xbb; 25]),
        ));
        let mut draft = Draft::new(tx, 0, Amount::ZERO).unwrap();
        let mut pool = pool_of(&[60_000, 40_000]);
        let target = FeeRate::new(11, 10); // 1.1 sat/vB

        let outcome = run(
            &mut draft,
            &mut pool,
            target,
            &FixedSigner {
                sig_len: P2PKH_SIG_LEN,
            },
        )
        .unwrap();

        assert!(target.is_met(draft.fee(), draft.size()));
        assert!(outcome.inputs_added >= 2); // 60k alone cannot cover 70k + fee
        assert!(draft.change_value() > DUST);
    }

    proptest! {
        /// For any pool and target: either the engine converges with the
        /// dust invariant intact in at most pool+1 iterations, or it
        /// reports InsufficientFunds.
        #[test]
        fn prop_converge_or_exhaust(
            change in prop_oneof![Just(0u64), 10_001u64..500_000],
            payment in 1_000u64..200_000,
            deficit in 0u64..50_000,
            pool_amounts in proptest::collection::vec(1_000u64..100_000, 0..8),
            target_sats in 1u64..50,
        ) {
            let mut tx = Transaction::new();
            tx.inputs.push(TxIn {
                outpoint: outpoint(1),
                script_sig: Script::new(vec![0u8; P2PKH_SIG_LEN]),
                sequence: SEQ,
            });
            tx.outputs.push(TxOut::new(Amount::new(change), Script::new(vec![0xaa; 25])));
            tx.outputs.push(TxOut::new(Amount::new(payment), Script::new(vec![0xbb; 25])));

            // Start at most `deficit` short of a zero fee.
            let value_in = (change + payment).saturating_sub(deficit);
            let mut draft = Draft::new(tx, 0, Amount::new(value_in)).unwrap();
            let pool_size = pool_amounts.len() as u32;
            let mut pool = pool_of(&pool_amounts);
            let target = FeeRate::from_sat_per_vb(target_sats);

            let result = run(&mut draft, &mut pool, target,
                             &FixedSigner { sig_len: P2PKH_SIG_LEN });

            match result {
                Ok(outcome) => {
                    prop_assert!(target.is_met(draft.fee(), draft.size()));
                    prop_assert!(outcome.iterations <= pool_size + 1);
                    let cv = draft.change_value();
                    prop_assert!(cv == Amount::ZERO || cv > DUST);
                }
                Err(Error::InsufficientFunds) => {
                    prop_assert!(pool.is_empty());
                }
                Err(e) => prop_assert!(false, "unexpected error: {e}"),
            }
        }
    }
}

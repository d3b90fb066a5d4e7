//! Change/input selection policy.
//!
//! Given the fee shortfall of one convergence iteration, decide whether to
//! shrink the change output in place or consume another unspent output.

use crate::error::Error;
use crate::pool::{Unspent, UnspentPool};
use rbf_types::Amount;

/// One mutation chosen by the policy.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Reduce the change output by this amount; transaction size is
    /// unchanged, so this completes the convergence.
    ShrinkChange(Amount),
    /// Append an input spending this candidate, folding its full amount
    /// into the change output for a later iteration to trim.
    AddInput(Unspent),
}

/// Pick the next mutation for a required `delta_fee >= 1`.
///
/// Change is shrunk only when the remainder stays strictly above the dust
/// floor; a remainder anywhere in `(0, dust]` (or an outright underflow)
/// forces input addition instead, even when shrinking alone would reach
/// the fee target arithmetically.
pub fn select_step(
    change_value: Amount,
    delta_fee: u64,
    dust: Amount,
    pool: &mut UnspentPool,
) -> Result<Step, Error> {
    let delta = Amount::new(delta_fee);
    match change_value.checked_sub(delta) {
        Some(remainder) if remainder > dust => Ok(Step::ShrinkChange(delta)),
        _ => pool
            .pop_largest()
            .map(Step::AddInput)
            .ok_or(Error::InsufficientFunds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbf_types::{OutPoint, Txid};

    const DUST: Amount = Amount::new(10_000);

    fn pool_of(amounts: &[u64]) -> UnspentPool {
        UnspentPool::new(
            amounts
                .iter()
                .enumerate()
                .map(|(i, &a)| Unspent {
                    outpoint: OutPoint::new(Txid::from_wire_bytes([i as u8; 32]), 0),
                    amount: Amount::new(a),
                })
                .collect(),
        )
    }

    #[test]
    fn test_shrinks_when_comfortably_above_dust() {
        let mut pool = pool_of(&[50_000]);
        let step = select_step(Amount::new(20_000), 5_000, DUST, &mut pool).unwrap();
        assert_eq!(step, Step::ShrinkChange(Amount::new(5_000)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_dust_window_forces_input_addition() {
        // 10_050 - 100 = 9_950 lands inside (0, dust]: must not shrink.
        let mut pool = pool_of(&[50_000]);
        let step = select_step(Amount::new(10_050), 100, DUST, &mut pool).unwrap();
        assert!(matches!(step, Step::AddInput(_)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_remainder_exactly_dust_forces_input_addition() {
        let mut pool = pool_of(&[50_000]);
        let step = select_step(Amount::new(10_100), 100, DUST, &mut pool).unwrap();
        assert!(matches!(step, Step::AddInput(_)));
    }

    #[test]
    fn test_underflow_forces_input_addition() {
        let mut pool = pool_of(&[50_000]);
        let step = select_step(Amount::new(100), 9_999, DUST, &mut pool).unwrap();
        assert!(matches!(step, Step::AddInput(_)));
    }

    #[test]
    fn test_exhausted_pool_is_insufficient_funds() {
        let mut pool = pool_of(&[]);
        let err = select_step(Amount::new(100), 9_999, DUST, &mut pool).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds));
    }
}

//! The unspent-output pool the selection policy draws from.

use rbf_types::{Amount, OutPoint};

/// A spendable output candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unspent {
    pub outpoint: OutPoint,
    pub amount: Amount,
}

/// Candidates kept sorted ascending by amount; consumption always takes
/// the largest remaining candidate, minimizing the number of new inputs
/// per convergence run.
#[derive(Debug, Default)]
pub struct UnspentPool {
    entries: Vec<Unspent>,
}

impl UnspentPool {
    pub fn new(mut entries: Vec<Unspent>) -> Self {
        entries.sort_by_key(|u| u.amount);
        Self { entries }
    }

    pub fn pop_largest(&mut self) -> Option<Unspent> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbf_types::Txid;

    fn unspent(n: u8, amount: u64) -> Unspent {
        Unspent {
            outpoint: OutPoint::new(Txid::from_wire_bytes([n; 32]), 0),
            amount: Amount::new(amount),
        }
    }

    #[test]
    fn test_pops_largest_first() {
        let mut pool = UnspentPool::new(vec![
            unspent(1, 30_000),
            unspent(2, 90_000),
            unspent(3, 50_000),
        ]);
        assert_eq!(pool.pop_largest().unwrap().amount, Amount::new(90_000));
        assert_eq!(pool.pop_largest().unwrap().amount, Amount::new(50_000));
        assert_eq!(pool.pop_largest().unwrap().amount, Amount::new(30_000));
        assert!(pool.pop_largest().is_none());
    }

    #[test]
    fn test_empty_pool() {
        let mut pool = UnspentPool::new(Vec::new());
        assert!(pool.is_empty());
        assert!(pool.pop_largest().is_none());
    }
}

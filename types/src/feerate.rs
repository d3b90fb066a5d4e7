//! Exact-rational fee rates in satoshis per byte.
//!
//! Fee rates are kept as reduced integer fractions and compared by
//! cross-multiplication. Floating point is never involved, so convergence
//! decisions are deterministic and never oscillate at the target boundary.

use crate::amount::Amount;
use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

/// A fee rate of `num / den` satoshis per byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeRate {
    num: u128,
    den: u128,
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

impl FeeRate {
    /// Build a rate from a fraction. `den` must be non-zero.
    pub fn new(num: u128, den: u128) -> Self {
        assert!(den != 0, "fee rate denominator must be non-zero");
        let g = gcd(num, den);
        if g > 1 {
            Self {
                num: num / g,
                den: den / g,
            }
        } else {
            Self { num, den }
        }
    }

    pub fn from_sat_per_vb(sats: u64) -> Self {
        Self::new(sats as u128, 1)
    }

    /// The observed rate of a transaction paying `fee` over `size` bytes.
    pub fn of(fee: Amount, size: u64) -> Self {
        Self::new(fee.sats() as u128, size.max(1) as u128)
    }

    /// Whether a transaction paying `fee` over `size` bytes meets this rate.
    ///
    /// `fee` is signed: a draft under construction can be output-heavy
    /// before funding, in which case the rate is trivially unmet.
    pub fn is_met(&self, fee: i128, size: u64) -> bool {
        if fee < 0 {
            return false;
        }
        fee * self.den as i128 >= self.num as i128 * size as i128
    }

    /// `ceil(rate × size − fee)`: the additional fee required for a
    /// transaction of `size` bytes currently paying `fee` to reach this
    /// rate. Zero means the rate is already met.
    pub fn delta_fee(&self, fee: i128, size: u64) -> u64 {
        let needed = self.num as i128 * size as i128;
        let have = fee * self.den as i128;
        if have >= needed {
            return 0;
        }
        let diff = needed - have;
        let den = self.den as i128;
        (diff + den - 1).div_euclid(den) as u64
    }

    /// Multiply this rate by another rational (fee-bump ratios).
    pub fn scale(&self, ratio: FeeRate) -> Self {
        Self::new(self.num * ratio.num, self.den * ratio.den)
    }

    /// `floor(rate × size)`: the fee this rate implies for `size` bytes,
    /// rounded down (relay-bandwidth surcharge convention).
    pub fn fee_for_size_floor(&self, size: u64) -> Amount {
        Amount::new((self.num * size as u128 / self.den) as u64)
    }
}

impl FromStr for FeeRate {
    type Err = ParseError;

    /// Parse a decimal string ("10", "2.5", "0.25") into an exact fraction.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::InvalidFeeRate(s.to_string());
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }
        if frac_part.len() > 12 {
            return Err(ParseError::InvalidFeeRate(format!(
                "{s}: more than 12 decimal places"
            )));
        }
        let int: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| err())?
        };
        let frac: u128 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().map_err(|_| err())?
        };
        let den = 10u128.pow(frac_part.len() as u32);
        let num = int
            .checked_mul(den)
            .and_then(|n| n.checked_add(frac))
            .ok_or_else(err)?;
        Ok(Self::new(num, den))
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{} sat/vB", self.num)
        } else {
            write!(f, "{}/{} sat/vB", self.num, self.den)
        }
    }
}

//! Protocol constants shared by all scenarios.

use crate::amount::Amount;

/// Minimum economically-rational output amount. Mutations never leave a
/// change output at or below this value (other than exactly zero).
pub const DUST_THRESHOLD: Amount = Amount::new(10_000);

/// Sequence number that disables opt-in replaceability signalling.
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// BIP125 opt-in replaceable sequence (final minus two).
pub const SEQUENCE_OPT_IN_RBF: u32 = 0xFFFF_FFFD;

/// Zero sequence: maximally replaceable, used on every input of a
/// replacement built by the sendmany scenario.
pub const SEQUENCE_REPLACEABLE_ZERO: u32 = 0;

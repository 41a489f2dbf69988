//! Canonical Primitive Types for the State Layer
//!
//! Rule: No String identifiers in consensus-visible state. Ever.
//!
//! These types cross the storage boundary and feed the composite key codec,
//! so they are:
//! - Fixed-size (no dynamic allocation)
//! - Deterministically serializable
//! - Efficient to copy and compare

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Owning scope (contract account) of a table
pub type Scope = u64;

/// Table name/id within a scope
pub type TableId = u64;

/// Table-local, monotonically assigned row id
pub type RowId = u64;

/// Primary key carried in composite keys
pub type PrimaryKey = u64;

/// Owning contract id carried in full keys
pub type ContractId = u64;

/// Undo-session watermark; strictly increases with each push()
pub type Revision = u64;

/// Numeric discriminant identifying a table type in the registry
pub type TableTypeId = u16;

// ============================================================================
// WIDE SECONDARY KEY VALUES
// ============================================================================

/// 256-bit secondary key value as a pair of u128 words.
///
/// Ordering is `hi` first, then `lo`, the same order the codec writes the
/// big-endian bytes in, so derived `Ord` matches encoded byte order.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default)]
pub struct U256 {
    pub hi: u128,
    pub lo: u128,
}

impl U256 {
    /// Create a new U256 from high and low words
    pub const fn new(hi: u128, lo: u128) -> Self {
        Self { hi, lo }
    }

    /// Create a zeroed U256
    pub const fn zero() -> Self {
        Self { hi: 0, lo: 0 }
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({:#x}, {:#x})", self.hi, self.lo)
    }
}

impl From<u128> for U256 {
    fn from(lo: u128) -> Self {
        Self { hi: 0, lo }
    }
}

/// Raw IEEE-754 binary128 bit pattern.
///
/// Rust has no stable `f128`, so the quadruple-precision secondary key is
/// carried as its bit pattern. Numeric ordering is defined only through the
/// codec's sign-fold transform; equality here is bit equality.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
pub struct Float128(pub u128);

impl Float128 {
    /// Wrap a raw binary128 bit pattern
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    /// Get the raw bit pattern
    pub const fn to_bits(self) -> u128 {
        self.0
    }
}

impl fmt::Debug for Float128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Float128({})", hex::encode(self.0.to_be_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_ordering_matches_word_order() {
        // hi dominates, lo breaks ties
        assert!(U256::new(0, u128::MAX) < U256::new(1, 0));
        assert!(U256::new(7, 1) < U256::new(7, 2));
        assert_eq!(U256::zero(), U256::new(0, 0));
    }

    #[test]
    fn test_u256_from_u128() {
        let v = U256::from(42u128);
        assert_eq!(v.hi, 0);
        assert_eq!(v.lo, 42);
    }

    #[test]
    fn test_float128_bits_roundtrip() {
        let v = Float128::from_bits(0x3fff_0000_0000_0000_0000_0000_0000_0000);
        assert_eq!(v.to_bits(), 0x3fff_0000_0000_0000_0000_0000_0000_0000);
    }
}

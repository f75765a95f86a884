//! Component bit masks.
//!
//! A [`Mask`] carries one bit per registered component type. Bit `N` set
//! means the component with dense id `N` is present. The same type backs the
//! per-entity attachment set and a query's required/excluded sets, so query
//! matching reduces to superset and intersection tests.

use fixedbitset::FixedBitSet;

/// A growable bitfield with one bit per registered component type.
///
/// The mask grows on demand when a bit beyond its current width is inserted,
/// so worlds are never limited to a fixed component count.
#[derive(Debug, Default, Clone)]
pub struct Mask {
    /// The bitset for tracking component bits.
    bits: FixedBitSet,
}

impl Mask {
    /// An empty mask with no bits set.
    #[inline]
    pub const fn new() -> Self {
        Self {
            bits: FixedBitSet::new(),
        }
    }

    /// A mask with exactly one bit set.
    pub fn with_bit(bit: usize) -> Self {
        let mut mask = Self::new();
        mask.insert(bit);
        mask
    }

    /// Set the given bit, growing the mask if needed.
    #[inline]
    pub fn insert(&mut self, bit: usize) {
        self.bits.grow(bit + 1);
        self.bits.insert(bit);
    }

    /// Clear the given bit.
    #[inline]
    pub fn remove(&mut self, bit: usize) {
        if bit < self.bits.len() {
            self.bits.set(bit, false);
        }
    }

    /// Whether the given bit is set.
    #[inline]
    pub fn contains(&self, bit: usize) -> bool {
        self.bits.contains(bit)
    }

    /// Whether every bit of `other` is also set in `self`.
    #[inline]
    pub fn contains_all(&self, other: &Mask) -> bool {
        self.bits.is_superset(&other.bits)
    }

    /// Whether `self` and `other` share at least one set bit.
    #[inline]
    pub fn intersects(&self, other: &Mask) -> bool {
        !self.bits.is_disjoint(&other.bits)
    }

    /// Whether no bits are set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_clear()
    }

    /// Clear every bit.
    #[inline]
    pub fn clear(&mut self) {
        self.bits.clear();
    }

    /// Iterate the indices of the set bits, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.bits.count_ones(..)
    }
}

//! Q12.20 fixed-point phase arithmetic
//!
//! The resampler walks its input with a fixed-point phase so that the hot
//! path never needs floating point `ceil`/`floor`. All arithmetic wraps at
//! 32 bits.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Mask selecting the 12 integer bits
pub const INTEGER_PART_MASK: u32 = 0xFFF0_0000;

/// Mask selecting the 20 fractional bits
pub const FRACT_PART_MASK: u32 = 0x000F_FFFF;

/// Number of fractional bits
pub const FRACT_BIT_COUNT: u32 = 20;

/// Phase distance below which a position snaps to the nearest integer.
///
/// 4 ULPs, roughly 3.8e-6 of a sample.
pub const PHASE_EPSILON: Fixed = Fixed(4);

/// Unsigned Q12.20 fixed-point value
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(u32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(1 << FRACT_BIT_COUNT);

    /// Wrap a raw Q12.20 bit pattern
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw Q12.20 bit pattern
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Truncating conversion from float (negative values saturate to zero)
    pub fn from_f32(value: f32) -> Self {
        Self((value * Self::ONE.0 as f32) as u32)
    }

    /// Whole number of samples, e.g. `from_usize(3)` is 3.0
    pub const fn from_usize(value: usize) -> Self {
        Self((value as u32) << FRACT_BIT_COUNT)
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / Self::ONE.0 as f32
    }

    /// Integer part
    pub const fn to_usize(self) -> usize {
        (self.0 >> FRACT_BIT_COUNT) as usize
    }

    /// Round upward to the next integer
    pub const fn ceil(self) -> Self {
        if self.0 & FRACT_PART_MASK == 0 {
            Self(self.0 & INTEGER_PART_MASK)
        } else {
            Self((self.0 & INTEGER_PART_MASK).wrapping_add(Self::ONE.0))
        }
    }

    /// Round downward, dropping the fractional part
    pub const fn floor(self) -> Self {
        Self(self.0 & INTEGER_PART_MASK)
    }

    /// Fractional bits only
    pub const fn fract(self) -> Self {
        Self(self.0 & FRACT_PART_MASK)
    }

    /// Fractional part as a float in `[0, 1)`
    pub fn fract_f32(self) -> f32 {
        (self.0 & FRACT_PART_MASK) as f32 * (1.0 / Self::ONE.0 as f32)
    }

    /// True when the value has wrapped below zero
    pub const fn is_negative(self) -> bool {
        (self.0 as i32) < 0
    }

    /// Snap to an integer boundary when the fraction is within
    /// [`PHASE_EPSILON`] of 0 or 1.
    pub fn snapped(self) -> Self {
        let fract = self.0 & FRACT_PART_MASK;
        if fract < PHASE_EPSILON.0 {
            self.floor()
        } else if Self::ONE.0 - fract < PHASE_EPSILON.0 {
            Self((self.0 & INTEGER_PART_MASK).wrapping_add(Self::ONE.0))
        } else {
            self
        }
    }

    /// `(self * rhs) >> 20` evaluated in 64 bits
    pub fn mul(self, rhs: Fixed) -> Self {
        Self(((self.0 as u64 * rhs.0 as u64) >> FRACT_BIT_COUNT) as u32)
    }

    /// Shift left by `bits`, wrapping
    pub const fn shl(self, bits: u32) -> Self {
        Self(self.0.wrapping_shl(bits))
    }

    /// Shift right by `bits`
    pub const fn shr(self, bits: u32) -> u32 {
        self.0 >> bits
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(rhs.0))
    }
}

impl SubAssign for Fixed {
    fn sub_assign(&mut self, rhs: Fixed) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({:.6})", self.to_f32())
    }
}

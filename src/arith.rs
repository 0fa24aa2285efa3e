//! Arbitrary-precision integer facade.
//!
//! The rest of the crate never touches `num_bigint` directly; it goes
//! through `Int` so the representation can change without rippling through
//! the IR, splitter, and interpreter.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::fmt;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Int(BigUint);

impl Int {
    pub fn zero() -> Int {
        Int(BigUint::zero())
    }

    pub fn one() -> Int {
        Int(BigUint::one())
    }

    pub fn from_u64(v: u64) -> Int {
        Int(BigUint::from(v))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: &Int) -> Int {
        Int(&self.0 + &other.0)
    }

    /// Subtracts `other` from `self`. Panics if `other > self`; callers must
    /// ensure subtraction is only ever performed on values already known to
    /// be ordered (the splitter's rebalanced `t + b + c = a` form guarantees
    /// this for register-level subtraction).
    pub fn sub(&self, other: &Int) -> Int {
        Int(&self.0 - &other.0)
    }

    pub fn mul(&self, other: &Int) -> Int {
        Int(&self.0 * &other.0)
    }

    /// Reduces `self` modulo `2^width`, i.e. keeps only the low `width`
    /// bits. This is the single place narrowing to a register's bitwidth
    /// happens.
    pub fn mod_pow2(&self, width: u32) -> Int {
        if width == 0 {
            return Int::zero();
        }
        let mut out = self.0.clone();
        for i in width..self.bit_len() {
            out.set_bit(i as u64, false);
        }
        Int(out)
    }

    pub fn shr(&self, bits: u32) -> Int {
        Int(&self.0 >> bits)
    }

    pub fn bit_len(&self) -> u32 {
        self.0.bits() as u32
    }

    pub fn bit(&self, i: u32) -> bool {
        self.0.bit(i as u64)
    }

    pub fn set_bit(&mut self, i: u32, value: bool) {
        self.0.set_bit(i as u64, value);
    }

    /// Extracts the `width`-bit slice starting at bit `offset` (LSB-first).
    pub fn bit_slice(&self, offset: u32, width: u32) -> Int {
        self.shr(offset).mod_pow2(width)
    }

    pub fn pow2(width: u32) -> Int {
        Int(BigUint::one() << width)
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Int({})", self.0)
    }
}

/// Evaluates an arithmetic op over already-read source values and a
/// constant term, in unbounded precision (spec.md §3, §4.4: "the combined
/// constant/source arithmetic is performed in unbounded integers before
/// slicing"). `target_width` is the combined bitwidth of the LSB-first
/// target list the result will be sliced into; `Sub` uses it as a bias
/// (`sources[0] + 2^target_width - rest - constant`) so that an
/// underflowing subtraction still lands on a non-negative `Int` whose
/// high bit, once sliced across the target list, is exactly the borrow bit
/// a balanced `t + b + c = a` equation would have produced (spec.md §4.3).
/// `Add` sums everything; `Mul` takes the product of the sources, using the
/// constant as an extra multiplicand whenever it is non-zero (a zero
/// constant means "no extra factor", since there is no dedicated
/// "constant present" flag on `MacroInstr::Assign`).
pub fn eval(op: crate::ir::MacroOp, sources: &[Int], constant: &Int, target_width: u32) -> Int {
    use crate::ir::MacroOp;
    match op {
        MacroOp::Add => {
            let mut acc = constant.clone();
            for s in sources {
                acc = acc.add(s);
            }
            acc
        }
        MacroOp::Sub => {
            let bias = Int::pow2(target_width);
            let mut acc = sources.first().cloned().unwrap_or_else(Int::zero).add(&bias);
            if !sources.is_empty() {
                for s in &sources[1..] {
                    acc = acc.sub(s);
                }
            }
            acc.sub(constant)
        }
        MacroOp::Mul => {
            let mut acc = Int::one();
            for s in sources {
                acc = acc.mul(s);
            }
            if !constant.is_zero() {
                acc = acc.mul(constant);
            }
            acc
        }
    }
}

/// Ceiling of log2(n), the number of bits needed to represent values in
/// `[0, n)`. Used throughout the splitter and trace builder to size
/// overflow/carry limbs and the `$pc` column.
pub fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        return 0;
    }
    64 - (n - 1).leading_zeros()
}

/// The number of bits needed to represent `v` (0 for `v == 0`).
pub fn bit_length_u128(v: u128) -> u32 {
    128 - v.leading_zeros()
}

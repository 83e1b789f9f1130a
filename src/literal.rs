//! Boolean literal representation.
//!
//! A literal is a variable or its negation, stored as a single signed `i32`
//! (DIMACS convention). Variables are 1-indexed.

use std::fmt::{self, Display};
use std::ops::Neg;

/// A Boolean literal (variable or its negation).
///
/// Positive values are positive literals, negative values are negated
/// variables. Zero is not a valid literal.
///
/// # Examples
///
/// ```
/// use sdd_compiler::literal::Literal;
///
/// let x = Literal::positive(1);
/// assert_eq!(-x, Literal::negative(1));
/// assert_eq!(x.var(), 1);
/// assert_eq!(x.index(), 2);
/// assert_eq!((-x).index(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal(i32);

impl Literal {
    /// Creates a positive literal for the given variable.
    ///
    /// # Panics
    ///
    /// Panics if `var` is zero.
    #[inline]
    pub const fn positive(var: u32) -> Self {
        assert!(var > 0, "Variable must be positive (1-indexed)");
        Self(var as i32)
    }

    /// Creates a negative literal for the given variable.
    ///
    /// # Panics
    ///
    /// Panics if `var` is zero.
    #[inline]
    pub const fn negative(var: u32) -> Self {
        assert!(var > 0, "Variable must be positive (1-indexed)");
        Self(-(var as i32))
    }

    /// Creates a literal for `var` with the given polarity.
    #[inline]
    pub const fn new(var: u32, positive: bool) -> Self {
        if positive {
            Self::positive(var)
        } else {
            Self::negative(var)
        }
    }

    /// Creates a literal from a signed integer.
    ///
    /// # Panics
    ///
    /// Panics if `lit` is zero.
    #[inline]
    pub const fn from_i32(lit: i32) -> Self {
        assert!(lit != 0, "Literal cannot be zero");
        Self(lit)
    }

    /// Returns the underlying variable (always positive).
    #[inline]
    pub const fn var(self) -> u32 {
        self.0.unsigned_abs()
    }

    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Returns the negation of this literal.
    #[inline]
    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Returns the raw signed integer representation.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Dense slot index: `2 * var` for the positive literal, `2 * var + 1`
    /// for the negative one.
    ///
    /// Used to address watch lists and literal bitsets.
    #[inline]
    pub const fn index(self) -> usize {
        2 * self.var() as usize + self.is_negative() as usize
    }

    /// Inverse of [`index`](Self::index).
    #[inline]
    pub const fn from_index(index: usize) -> Self {
        Self::new((index / 2) as u32, index % 2 == 0)
    }
}

impl Neg for Literal {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl From<i32> for Literal {
    fn from(lit: i32) -> Self {
        Self::from_i32(lit)
    }
}

impl From<Literal> for i32 {
    fn from(lit: Literal) -> Self {
        lit.0
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_positive() {
            write!(f, "x{}", self.var())
        } else {
            write!(f, "¬x{}", self.var())
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_polarity() {
        let pos = Literal::positive(3);
        let neg = Literal::negative(3);
        assert_eq!(pos.var(), 3);
        assert_eq!(neg.var(), 3);
        assert!(pos.is_positive());
        assert!(neg.is_negative());
        assert_eq!(Literal::new(3, false), neg);
        assert_eq!(-pos, neg);
        assert_eq!(-neg, pos);
    }

    #[test]
    fn test_index_roundtrip() {
        for raw in [1, -1, 7, -7, 42, -42] {
            let lit = Literal::from_i32(raw);
            assert_eq!(Literal::from_index(lit.index()), lit);
        }
        assert_ne!(Literal::positive(5).index(), Literal::negative(5).index());
        assert_eq!(Literal::negative(5).index(), Literal::positive(5).index() + 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Literal::positive(1)), "x1");
        assert_eq!(format!("{}", Literal::negative(2)), "¬x2");
    }

    #[test]
    #[should_panic(expected = "Variable must be positive")]
    fn test_zero_var() {
        Literal::positive(0);
    }

    #[test]
    #[should_panic(expected = "Literal cannot be zero")]
    fn test_zero_literal() {
        Literal::from_i32(0);
    }
}

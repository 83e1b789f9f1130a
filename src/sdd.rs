//! SDD node representation.
//!
//! An SDD node is one of:
//! - a **constant**: ⊤ or ⊥,
//! - a **literal** terminal, normalized for the vtree leaf of its variable,
//! - a **decomposition** `(p₁ ∧ s₁) ∨ … ∨ (pₖ ∧ sₖ)` normalized for an
//!   internal vtree node, primes over the left subtree, subs over the right.
//!
//! Decomposition elements form a *compressed, trimmed partition*: primes are
//! pairwise exclusive, jointly exhaustive and never ⊥; subs are pairwise
//! distinct; `{(⊤, s)}` and `{(p, ⊤), (¬p, ⊥)}` never occur. Together with
//! hash-consing this makes the representation canonical for a fixed vtree.

use std::fmt::{self, Display};

use crate::literal::Literal;
use crate::vtree::VtreeId;

/// Identifier of an SDD node inside its [`SddFactory`](crate::factory::SddFactory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SddId(u32);

impl SddId {
    /// The ID for the FALSE terminal.
    pub const FALSE: Self = Self(0);

    /// The ID for the TRUE terminal.
    pub const TRUE: Self = Self(1);

    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_false(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_true(self) -> bool {
        self.0 == 1
    }

    /// Returns true if this is a constant (TRUE or FALSE).
    #[inline]
    pub const fn is_constant(self) -> bool {
        self.0 <= 1
    }
}

impl Display for SddId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::FALSE => write!(f, "⊥"),
            Self::TRUE => write!(f, "⊤"),
            Self(id) => write!(f, "n{}", id),
        }
    }
}

/// A prime-sub element of a decomposition node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element {
    /// An SDD over the left variables.
    pub prime: SddId,
    /// An SDD over the right variables.
    pub sub: SddId,
}

impl Element {
    #[inline]
    pub const fn new(prime: SddId, sub: SddId) -> Self {
        Self { prime, sub }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.prime, self.sub)
    }
}

/// An SDD node as stored by the factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sdd {
    False,
    True,

    /// A signed literal, normalized for the leaf of its variable.
    Literal { literal: Literal, vtree: VtreeId },

    /// A decomposition node: disjunction of (prime, sub) pairs, sorted by prime.
    Decomposition { vtree: VtreeId, elements: Vec<Element> },
}

impl Sdd {
    /// Vtree node this node is normalized for; `None` for constants.
    #[inline]
    pub fn vtree(&self) -> Option<VtreeId> {
        match self {
            Sdd::False | Sdd::True => None,
            Sdd::Literal { vtree, .. } | Sdd::Decomposition { vtree, .. } => Some(*vtree),
        }
    }

    #[inline]
    pub fn literal(&self) -> Option<Literal> {
        match self {
            Sdd::Literal { literal, .. } => Some(*literal),
            _ => None,
        }
    }

    #[inline]
    pub fn elements(&self) -> Option<&[Element]> {
        match self {
            Sdd::Decomposition { elements, .. } => Some(elements),
            _ => None,
        }
    }

    #[inline]
    pub fn is_decomposition(&self) -> bool {
        matches!(self, Sdd::Decomposition { .. })
    }

    /// Number of elements; zero for constants and literals.
    #[inline]
    pub fn size(&self) -> usize {
        self.elements().map_or(0, <[Element]>::len)
    }
}

impl Display for Sdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sdd::False => write!(f, "⊥"),
            Sdd::True => write!(f, "⊤"),
            Sdd::Literal { literal, .. } => write!(f, "{}", literal),
            Sdd::Decomposition { vtree, elements } => {
                write!(f, "[{}]{{", vtree)?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ∨ ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_sdd_id_constants() {
        assert!(SddId::FALSE.is_false());
        assert!(SddId::TRUE.is_true());
        assert!(SddId::FALSE.is_constant());
        assert!(SddId::TRUE.is_constant());
        assert!(!SddId::new(2).is_constant());
        assert_eq!(format!("{}", SddId::new(4)), "n4");
        assert_eq!(format!("{}", SddId::TRUE), "⊤");
    }

    #[test]
    fn test_node_accessors() {
        let lit = Sdd::Literal { literal: Literal::negative(2), vtree: VtreeId::new(1) };
        assert_eq!(lit.literal(), Some(Literal::negative(2)));
        assert_eq!(lit.vtree(), Some(VtreeId::new(1)));
        assert_eq!(lit.size(), 0);
        assert_eq!(Sdd::True.vtree(), None);

        let dec = Sdd::Decomposition {
            vtree: VtreeId::new(2),
            elements: vec![Element::new(SddId::new(2), SddId::TRUE), Element::new(SddId::new(3), SddId::FALSE)],
        };
        assert!(dec.is_decomposition());
        assert_eq!(dec.size(), 2);
        assert_eq!(format!("{}", dec), "[v2]{(n2, ⊤) ∨ (n3, ⊥)}");
        assert_eq!(format!("{}", lit), "¬x2");
    }
}

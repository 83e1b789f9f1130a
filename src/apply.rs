//! The SDD apply algorithm and operations built on top of it.
//!
//! `apply(f, g, op)` dispatches on how the vtree nodes of `f` and `g` relate
//! in the active vtree (compared by in-order position):
//!
//! | case | relation | result partition at |
//! |---|---|---|
//! | equal | same vtree node | that node, product of both partitions |
//! | left | `f` below the left child of `g`'s node | `g`'s node |
//! | right | `g` below the right child of `f`'s node | `f`'s node |
//! | incomparable | neither below the other | their lowest common ancestor |
//!
//! Results are memoized per `(op, f, g)` for the duration of one top-level
//! call; the memo is dropped when the call returns.

use std::collections::{BTreeMap, HashMap};

use crate::factory::SddFactory;
use crate::literal::Literal;
use crate::sdd::{Element, Sdd, SddId};
use crate::vtree::VtreeId;

/// Binary Boolean operator supported by [`SddFactory::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    /// `x op absorbing == absorbing`.
    #[inline]
    pub fn absorbing(self) -> SddId {
        match self {
            Operator::And => SddId::FALSE,
            Operator::Or => SddId::TRUE,
        }
    }

    /// `x op identity == x`.
    #[inline]
    pub fn identity(self) -> SddId {
        match self {
            Operator::And => SddId::TRUE,
            Operator::Or => SddId::FALSE,
        }
    }
}

type ApplyMemo = HashMap<(Operator, SddId, SddId), SddId>;

enum Case {
    Equal(VtreeId),
    Left(VtreeId),
    Right(VtreeId),
    Incomparable(VtreeId),
}

impl SddFactory {
    /// Combines two SDDs with `op`.
    pub fn apply(&mut self, f: SddId, g: SddId, op: Operator) -> SddId {
        let mut memo = ApplyMemo::new();
        self.apply_rec(f, g, op, &mut memo)
    }

    /// Returns f ∧ g.
    #[inline]
    pub fn conjoin(&mut self, f: SddId, g: SddId) -> SddId {
        self.apply(f, g, Operator::And)
    }

    /// Returns f ∨ g.
    #[inline]
    pub fn disjoin(&mut self, f: SddId, g: SddId) -> SddId {
        self.apply(f, g, Operator::Or)
    }

    /// Returns f → g.
    pub fn implies(&mut self, f: SddId, g: SddId) -> SddId {
        let nf = self.negate(f);
        self.disjoin(nf, g)
    }

    /// Returns f ↔ g.
    pub fn equiv(&mut self, f: SddId, g: SddId) -> SddId {
        let fg = self.implies(f, g);
        let gf = self.implies(g, f);
        self.conjoin(fg, gf)
    }

    /// Conjunction of all given SDDs (⊤ for none).
    pub fn conjoin_all(&mut self, sdds: impl IntoIterator<Item = SddId>) -> SddId {
        let mut result = SddId::TRUE;
        for f in sdds {
            result = self.conjoin(result, f);
            if result.is_false() {
                break;
            }
        }
        result
    }

    /// Disjunction of all given SDDs (⊥ for none).
    pub fn disjoin_all(&mut self, sdds: impl IntoIterator<Item = SddId>) -> SddId {
        let mut result = SddId::FALSE;
        for f in sdds {
            result = self.disjoin(result, f);
            if result.is_true() {
                break;
            }
        }
        result
    }

    /// The clause `l₁ ∨ … ∨ lₖ`, folded left-to-right from ⊥.
    pub fn clause(&mut self, literals: &[Literal]) -> SddId {
        let mut result = SddId::FALSE;
        for &lit in literals {
            let l = self.literal(lit);
            result = self.disjoin(result, l);
        }
        result
    }

    /// The cube `l₁ ∧ … ∧ lₖ`.
    pub fn cube(&mut self, literals: &[Literal]) -> SddId {
        let mut result = SddId::TRUE;
        for &lit in literals {
            let l = self.literal(lit);
            result = self.conjoin(result, l);
        }
        result
    }

    pub(crate) fn apply_rec(&mut self, f: SddId, g: SddId, op: Operator, memo: &mut ApplyMemo) -> SddId {
        if f == g {
            return f;
        }
        if f == op.absorbing() || g == op.absorbing() {
            return op.absorbing();
        }
        if f == op.identity() {
            return g;
        }
        if g == op.identity() {
            return f;
        }
        if self.is_negation(f, g) {
            return op.absorbing();
        }

        let key = if f <= g { (op, f, g) } else { (op, g, f) };
        if let Some(&result) = memo.get(&key) {
            self.stats.apply_memo_hits += 1;
            return result;
        }
        self.stats.apply_calls += 1;

        let (n1, n2, case) = self.classify(f, g);
        let result = match case {
            Case::Equal(vtree) => self.apply_equal(n1, n2, vtree, op, memo),
            Case::Left(vtree) => self.apply_left(n1, n2, vtree, op, memo),
            Case::Right(vtree) => self.apply_right(n1, n2, vtree, op, memo),
            Case::Incomparable(lca) => self.apply_incomparable(n1, n2, lca, op, memo),
        };

        memo.insert(key, result);
        result
    }

    /// Orders `f`, `g` by vtree position and determines the apply case.
    fn classify(&self, f: SddId, g: SddId) -> (SddId, SddId, Case) {
        let root = self.root();
        let vf = self.node_vtree(f).expect("non-constant node");
        let vg = self.node_vtree(g).expect("non-constant node");
        let (n1, n2, v1, v2) = if root.position(vf) <= root.position(vg) {
            (f, g, vf, vg)
        } else {
            (g, f, vg, vf)
        };
        let case = if v1 == v2 {
            Case::Equal(v1)
        } else {
            let lca = root.lca(v1, v2);
            if lca == v2 {
                Case::Left(v2)
            } else if lca == v1 {
                Case::Right(v1)
            } else {
                Case::Incomparable(lca)
            }
        };
        (n1, n2, case)
    }

    /// Both nodes are normalized for `vtree`: multiply the partitions.
    fn apply_equal(&mut self, n1: SddId, n2: SddId, vtree: VtreeId, op: Operator, memo: &mut ApplyMemo) -> SddId {
        let elems1 = self.elements_at(n1, vtree);
        let elems2 = self.elements_at(n2, vtree);
        let mut result = Vec::new();
        for e1 in &elems1 {
            for e2 in &elems2 {
                let prime = self.apply_rec(e1.prime, e2.prime, Operator::And, memo);
                if prime.is_false() {
                    continue;
                }
                let sub = self.apply_rec(e1.sub, e2.sub, op, memo);
                result.push(Element::new(prime, sub));
            }
        }
        self.build_from_elements(vtree, result, memo)
    }

    /// `n1` lies in the left subtree of `vtree`, `n2` is normalized for it.
    fn apply_left(&mut self, n1: SddId, n2: SddId, vtree: VtreeId, op: Operator, memo: &mut ApplyMemo) -> SddId {
        let elems2 = self.elements_at(n2, vtree);
        let n1_neg = self.negate(n1);
        // For AND keep the part of each prime inside n1; for OR the part outside.
        let (n, n_neg) = match op {
            Operator::And => (n1, n1_neg),
            Operator::Or => (n1_neg, n1),
        };
        let mut result = vec![Element::new(n_neg, op.absorbing())];
        for e2 in &elems2 {
            let prime = self.apply_rec(e2.prime, n, Operator::And, memo);
            if !prime.is_false() {
                result.push(Element::new(prime, e2.sub));
            }
        }
        self.build_from_elements(vtree, result, memo)
    }

    /// `n1` is normalized for `vtree`, `n2` lies in its right subtree.
    fn apply_right(&mut self, n1: SddId, n2: SddId, vtree: VtreeId, op: Operator, memo: &mut ApplyMemo) -> SddId {
        let elems1 = self.elements_at(n1, vtree);
        let mut result = Vec::with_capacity(elems1.len());
        for e1 in &elems1 {
            let sub = self.apply_rec(e1.sub, n2, op, memo);
            result.push(Element::new(e1.prime, sub));
        }
        self.build_from_elements(vtree, result, memo)
    }

    /// `n1` lies left of `lca`, `n2` right of it.
    fn apply_incomparable(&mut self, n1: SddId, n2: SddId, lca: VtreeId, op: Operator, memo: &mut ApplyMemo) -> SddId {
        let n1_neg = self.negate(n1);
        let (sub1, sub2) = match op {
            Operator::And => (n2, SddId::FALSE),
            Operator::Or => (SddId::TRUE, n2),
        };
        let elements = vec![Element::new(n1, sub1), Element::new(n1_neg, sub2)];
        self.build_from_elements(lca, elements, memo)
    }

    fn elements_at(&self, f: SddId, vtree: VtreeId) -> Vec<Element> {
        match self.node(f) {
            Sdd::Decomposition { vtree: v, elements } if *v == vtree => elements.clone(),
            other => panic!("Node {} ({}) is not normalized for vtree node {}", f, other, vtree),
        }
    }

    /// Compresses and trims a partition, then hash-conses it.
    pub(crate) fn build_from_elements(&mut self, vtree: VtreeId, elements: Vec<Element>, memo: &mut ApplyMemo) -> SddId {
        // Compression: one element per distinct sub, primes disjoined.
        let mut by_sub: BTreeMap<SddId, SddId> = BTreeMap::new();
        for e in elements {
            let prime = match by_sub.get(&e.sub) {
                Some(&p) => self.apply_rec(p, e.prime, Operator::Or, memo),
                None => e.prime,
            };
            by_sub.insert(e.sub, prime);
        }
        let mut compressed: Vec<Element> = by_sub
            .into_iter()
            .filter(|(_, prime)| !prime.is_false())
            .map(|(sub, prime)| Element::new(prime, sub))
            .collect();
        compressed.sort();

        match compressed.as_slice() {
            [] => SddId::FALSE,
            [e] => {
                assert!(e.prime.is_true(), "single-element partition with prime {}", e.prime);
                e.sub
            }
            [a, b] if a.sub.is_true() && b.sub.is_false() => a.prime,
            [a, b] if a.sub.is_false() && b.sub.is_true() => b.prime,
            _ => self.make_decomposition(vtree, compressed),
        }
    }

    // ─── Conditioning and quantification ───

    /// Returns `f | lit`: `f` with the literal's variable fixed to satisfy `lit`.
    pub fn condition(&mut self, f: SddId, lit: Literal) -> SddId {
        let mut cache = HashMap::new();
        self.condition_rec(f, lit, &mut cache)
    }

    fn condition_rec(&mut self, f: SddId, lit: Literal, cache: &mut HashMap<SddId, SddId>) -> SddId {
        if let Some(&r) = cache.get(&f) {
            return r;
        }
        let result = match self.node(f).clone() {
            Sdd::False | Sdd::True => f,
            Sdd::Literal { literal, .. } if literal == lit => SddId::TRUE,
            Sdd::Literal { literal, .. } if literal == -lit => SddId::FALSE,
            Sdd::Literal { .. } => f,
            Sdd::Decomposition { elements, .. } => {
                let mut result = SddId::FALSE;
                for e in elements {
                    let prime = self.condition_rec(e.prime, lit, cache);
                    if prime.is_false() {
                        continue;
                    }
                    let sub = self.condition_rec(e.sub, lit, cache);
                    let term = self.conjoin(prime, sub);
                    result = self.disjoin(result, term);
                }
                result
            }
        };
        cache.insert(f, result);
        result
    }

    /// Existential quantification: `∃var. f = f|var ∨ f|¬var`.
    pub fn exists(&mut self, f: SddId, var: u32) -> SddId {
        let pos = self.condition(f, Literal::positive(var));
        let neg = self.condition(f, Literal::negative(var));
        self.disjoin(pos, neg)
    }

    /// Universal quantification: `∀var. f = f|var ∧ f|¬var`.
    pub fn forall(&mut self, f: SddId, var: u32) -> SddId {
        let pos = self.condition(f, Literal::positive(var));
        let neg = self.condition(f, Literal::negative(var));
        self.conjoin(pos, neg)
    }

    // ─── Vtree migration ───

    /// Re-expresses `f` over the active vtree.
    ///
    /// Decomposition nodes whose vtree node is still part of the active
    /// version are kept as they are; the others are rebuilt from their
    /// elements with apply.
    pub(crate) fn migrate(&mut self, f: SddId, cache: &mut HashMap<SddId, SddId>) -> SddId {
        if let Some(&r) = cache.get(&f) {
            return r;
        }
        let result = match self.node(f).clone() {
            Sdd::False | Sdd::True | Sdd::Literal { .. } => f,
            Sdd::Decomposition { vtree, .. } if self.root().contains(vtree) => f,
            Sdd::Decomposition { elements, .. } => {
                let mut result = SddId::FALSE;
                for e in elements {
                    let prime = self.migrate(e.prime, cache);
                    let sub = self.migrate(e.sub, cache);
                    let term = self.conjoin(prime, sub);
                    result = self.disjoin(result, term);
                }
                result
            }
        };
        cache.insert(f, result);
        result
    }
}

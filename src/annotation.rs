//! Context masks of the vtree nodes.
//!
//! For every node `t` of the vtree used by the top-down compiler:
//!
//! - `var_mask(t)`: the variables below `t`;
//! - `context_clause_mask(t)`: the clauses *cut* by `t`, i.e. whose variables
//!   are partly inside and partly outside `t`;
//! - `context_lits_mask(t)`: the literal slots (two per variable, see
//!   [`Literal::index`]) of the variables below `t` and of every variable
//!   of a cut clause.
//!
//! Only these parts of the solver state can influence what compiling `t`
//! returns, so they form the cache key at `t`.
//!
//! For every variable the annotation also records which clauses contain its
//! positive and its negative literal; the SDD SAT extension uses these to
//! track subsumed clauses.

use std::collections::HashMap;

use log::debug;

use crate::bitset::BitSet;
use crate::cnf::Cnf;
use crate::literal::Literal;
use crate::vtree::{Vtree, VtreeId, VtreeNode};

#[derive(Debug, Clone)]
pub struct VtreeAnnotation {
    var_masks: HashMap<VtreeId, BitSet>,
    context_clauses: HashMap<VtreeId, BitSet>,
    context_lits: HashMap<VtreeId, BitSet>,
    clause_pos: Vec<BitSet>,
    clause_neg: Vec<BitSet>,
    num_clauses: usize,
}

impl VtreeAnnotation {
    /// Annotates the tree rooted at `root` for the clauses of `cnf`.
    pub fn new(vtree: &Vtree, root: VtreeId, cnf: &Cnf) -> Self {
        let num_vars = cnf.max_var().max(vtree.variables_under(root).into_iter().max().unwrap_or(0)) as usize;
        let mut clause_pos = vec![BitSet::empty(); num_vars + 1];
        let mut clause_neg = vec![BitSet::empty(); num_vars + 1];
        let mut clause_vars = Vec::with_capacity(cnf.len());
        for (i, clause) in cnf.clauses().iter().enumerate() {
            let mut vars = BitSet::empty();
            for lit in clause {
                vars.insert(lit.var() as usize);
                if lit.is_positive() {
                    clause_pos[lit.var() as usize].insert(i);
                } else {
                    clause_neg[lit.var() as usize].insert(i);
                }
            }
            clause_vars.push(vars);
        }

        let mut this = Self {
            var_masks: HashMap::new(),
            context_clauses: HashMap::new(),
            context_lits: HashMap::new(),
            clause_pos,
            clause_neg,
            num_clauses: cnf.len(),
        };

        // Variable masks, post-order.
        this.compute_var_masks(vtree, root);

        // Context masks, pre-order.
        let mut stack = vec![root];
        while let Some(t) = stack.pop() {
            let own = &this.var_masks[&t];
            let mut clauses = BitSet::empty();
            let mut vars = own.clone();
            for (i, cv) in clause_vars.iter().enumerate() {
                if cv.intersects(own) && !cv.is_subset(own) {
                    clauses.insert(i);
                    vars.union_with(cv);
                }
            }
            let lits: BitSet = vars
                .iter()
                .flat_map(|v| [Literal::positive(v as u32).index(), Literal::negative(v as u32).index()])
                .collect();
            this.context_clauses.insert(t, clauses);
            this.context_lits.insert(t, lits);
            if let VtreeNode::Internal { left, right } = vtree.node(t) {
                stack.push(right);
                stack.push(left);
            }
        }

        debug!("annotated {} vtree nodes for {} clauses", this.var_masks.len(), this.num_clauses);
        this
    }

    fn compute_var_masks(&mut self, vtree: &Vtree, t: VtreeId) -> BitSet {
        let mask = match vtree.node(t) {
            VtreeNode::Leaf { var } => BitSet::from_iter([var as usize]),
            VtreeNode::Internal { left, right } => {
                let mut mask = self.compute_var_masks(vtree, left);
                mask.union_with(&self.compute_var_masks(vtree, right));
                mask
            }
        };
        self.var_masks.insert(t, mask.clone());
        mask
    }

    #[inline]
    pub fn num_clauses(&self) -> usize {
        self.num_clauses
    }

    fn get<'a>(map: &'a HashMap<VtreeId, BitSet>, t: VtreeId) -> &'a BitSet {
        match map.get(&t) {
            Some(mask) => mask,
            None => panic!("Vtree node {} is not annotated", t),
        }
    }

    pub fn var_mask(&self, t: VtreeId) -> &BitSet {
        Self::get(&self.var_masks, t)
    }

    pub fn context_clause_mask(&self, t: VtreeId) -> &BitSet {
        Self::get(&self.context_clauses, t)
    }

    pub fn context_lits_mask(&self, t: VtreeId) -> &BitSet {
        Self::get(&self.context_lits, t)
    }

    /// Clauses containing the positive literal of `var`.
    pub fn clause_pos_mask(&self, var: u32) -> &BitSet {
        &self.clause_pos[var as usize]
    }

    /// Clauses containing the negative literal of `var`.
    pub fn clause_neg_mask(&self, var: u32) -> &BitSet {
        &self.clause_neg[var as usize]
    }

    /// Clauses satisfied by `lit`.
    pub fn clauses_satisfied_by(&self, lit: Literal) -> &BitSet {
        if lit.is_positive() {
            self.clause_pos_mask(lit.var())
        } else {
            self.clause_neg_mask(lit.var())
        }
    }

    /// Largest variable covered by the per-literal clause masks.
    pub fn max_var(&self) -> u32 {
        (self.clause_pos.len() - 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_masks() {
        // Clauses: 0 = (x1 ∨ x2), 1 = (¬x2 ∨ x3), 2 = (x3 ∨ ¬x4)
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![-2, 3], vec![3, -4]]);
        let mut vt = Vtree::new();
        let root = vt.balanced(&[1, 2, 3, 4]);
        let left = vt.left(root);
        let right = vt.right(root);
        let ann = VtreeAnnotation::new(&vt, root, &cnf);

        assert_eq!(ann.var_mask(root).iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(ann.var_mask(left).iter().collect::<Vec<_>>(), vec![1, 2]);
        assert!(ann.context_clause_mask(root).is_empty());

        // Clause 1 spans {2, 3} and is cut by both halves.
        assert_eq!(ann.context_clause_mask(left).iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(ann.context_clause_mask(right).iter().collect::<Vec<_>>(), vec![1]);

        // Left context covers x1, x2 and x3 (through clause 1).
        let lits = ann.context_lits_mask(left);
        assert!(lits.contains(Literal::positive(3).index()));
        assert!(lits.contains(Literal::negative(3).index()));
        assert!(!lits.contains(Literal::positive(4).index()));

        let x1 = vt.left(left);
        assert_eq!(ann.context_clause_mask(x1).iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_literal_clause_masks() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![-2, 3], vec![3, -4]]);
        let mut vt = Vtree::new();
        let root = vt.right_linear(&[1, 2, 3, 4]);
        let ann = VtreeAnnotation::new(&vt, root, &cnf);
        assert_eq!(ann.clause_pos_mask(3).iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(ann.clause_neg_mask(2).iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(ann.clauses_satisfied_by(Literal::negative(4)).iter().collect::<Vec<_>>(), vec![2]);
        assert!(ann.clause_neg_mask(1).is_empty());
        assert_eq!(ann.num_clauses(), 3);
    }
}

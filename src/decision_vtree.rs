//! Decision vtrees generated from a dtree.
//!
//! Walking the dtree top-down, every node contributes its *cutset*: the
//! variables its two children share, minus those already placed by an
//! ancestor (a leaf's cutset is all of its remaining variables). The cutset
//! becomes a right-linear chain of Shannon nodes (each with a variable leaf
//! as left child) on top of the vtrees generated for the children:
//!
//! ```text
//!   cutset {a, b} over children L, R      ─►      ●
//!                                                / \
//!                                               a   ●
//!                                                  / \
//!                                                 b   ●
//!                                                    / \
//!                                                 vt(L) vt(R)
//! ```
//!
//! Children without remaining variables are left out, so every variable
//! ends up in exactly one leaf.

use std::collections::BTreeSet;

use log::debug;

use crate::bitset::BitSet;
use crate::cnf::Cnf;
use crate::dtree::DTree;
use crate::vtree::{Vtree, VtreeId};

/// Order of the variables inside a cutset chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prioritization {
    /// Ascending variable index.
    #[default]
    None,
    /// Variables occurring in more clauses first; ties by variable index.
    VarCount,
}

struct Generator<'a> {
    vtree: &'a mut Vtree,
    occurrences: Vec<usize>,
    prioritization: Prioritization,
}

impl Generator<'_> {
    fn generate(&mut self, t: &DTree, assigned: &BitSet) -> Option<VtreeId> {
        match t {
            DTree::Leaf { vars, .. } => {
                let cutset = vars.difference(assigned);
                self.chain(&cutset, None)
            }
            DTree::Node { left, right, .. } => {
                let cutset = left.vars().intersection(right.vars()).difference(assigned);
                let mut below = assigned.clone();
                below.union_with(&cutset);
                let l = self.generate(left, &below);
                let r = self.generate(right, &below);
                let inner = match (l, r) {
                    (Some(l), Some(r)) => Some(self.vtree.internal(l, r)),
                    (l, r) => l.or(r),
                };
                self.chain(&cutset, inner)
            }
        }
    }

    fn chain(&mut self, cutset: &BitSet, end: Option<VtreeId>) -> Option<VtreeId> {
        let mut vars: Vec<u32> = cutset.iter().map(|v| v as u32).collect();
        if self.prioritization == Prioritization::VarCount {
            vars.sort_by_key(|&v| (std::cmp::Reverse(self.occurrences.get(v as usize).copied().unwrap_or(0)), v));
        }
        let mut acc = end;
        for &var in vars.iter().rev() {
            let leaf = self.vtree.leaf(var);
            acc = Some(match acc {
                Some(rest) => self.vtree.internal(leaf, rest),
                None => leaf,
            });
        }
        acc
    }
}

/// Generates the decision vtree for `cnf` (whose dtree is `dtree`) in the
/// arena `vtree` and returns its root.
///
/// Variables of `all_vars` that do not occur in `cnf` are placed in a
/// right-linear subtree to the right of the generated one. Returns `None`
/// when there are no variables at all.
pub fn generate_decision_vtree(
    vtree: &mut Vtree,
    dtree: Option<&DTree>,
    cnf: &Cnf,
    prioritization: Prioritization,
    all_vars: &[u32],
) -> Option<VtreeId> {
    let mut generator = Generator { vtree, occurrences: cnf.occurrences(), prioritization };
    let generated = dtree.and_then(|t| generator.generate(t, &BitSet::empty()));

    let used: BTreeSet<u32> = cnf.variables().into_iter().collect();
    let free: Vec<u32> = all_vars.iter().copied().filter(|v| !used.contains(v)).collect::<BTreeSet<_>>().into_iter().collect();
    let free_tree = if free.is_empty() { None } else { Some(generator.vtree.right_linear(&free)) };
    debug!("decision vtree: {} formula variables, {} free variables", used.len(), free.len());

    match (generated, free_tree) {
        (Some(g), Some(f)) => Some(generator.vtree.internal(g, f)),
        (g, f) => g.or(f),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::vtree::VtreeNode;

    fn leaves(vt: &Vtree, root: VtreeId) -> Vec<u32> {
        let mut vars = vt.variables_under(root);
        vars.sort();
        vars
    }

    /// Every internal node either has a leaf as left child (Shannon node) or
    /// is a decomposition of two subtrees.
    fn count_shannon(vt: &Vtree, root: VtreeId) -> usize {
        vt.subtree(root)
            .into_iter()
            .filter(|&t| matches!(vt.node(t), VtreeNode::Internal { left, .. } if vt.is_leaf(left)))
            .count()
    }

    #[test]
    fn test_single_clause_chain() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2, 3]]);
        let dtree = DTree::new(&cnf).unwrap();
        let mut vt = Vtree::new();
        let root = generate_decision_vtree(&mut vt, Some(&dtree), &cnf, Prioritization::None, &[1, 2, 3]).unwrap();
        assert_eq!(vt.variables_under(root), vec![1, 2, 3]);
        assert_eq!(count_shannon(&vt, root), 2);
    }

    #[test]
    fn test_cutset_on_top() {
        // x2 is shared by both clauses and must be decided first.
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![-2, 3]]);
        let dtree = DTree::new(&cnf).unwrap();
        let mut vt = Vtree::new();
        let root = generate_decision_vtree(&mut vt, Some(&dtree), &cnf, Prioritization::None, &[1, 2, 3]).unwrap();
        assert_eq!(vt.node(vt.left(root)), VtreeNode::Leaf { var: 2 });
        assert_eq!(leaves(&vt, root), vec![1, 2, 3]);
    }

    #[test]
    fn test_var_count_prioritization() {
        // Single leaf clause: the chain order follows occurrence counts.
        let cnf = Cnf::from_dimacs(&[vec![1, 2, 3], vec![3, 4], vec![2, 3, 5]]);
        let tree = DTree::leaf(0, BitSet::from_iter([1, 2, 3]));
        let mut vt = Vtree::new();
        let root = generate_decision_vtree(&mut vt, Some(&tree), &cnf, Prioritization::VarCount, &[1, 2, 3]).unwrap();
        assert_eq!(vt.variables_under(root), vec![3, 2, 1]);
    }

    #[test]
    fn test_free_variables_appended() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2]]);
        let dtree = DTree::new(&cnf).unwrap();
        let mut vt = Vtree::new();
        let root = generate_decision_vtree(&mut vt, Some(&dtree), &cnf, Prioritization::None, &[1, 2, 5, 4]).unwrap();
        assert_eq!(vt.variables_under(vt.right(root)), vec![4, 5]);
        assert_eq!(leaves(&vt, root), vec![1, 2, 4, 5]);

        let empty = Cnf::new();
        let only_free = generate_decision_vtree(&mut vt, None, &empty, Prioritization::None, &[7]).unwrap();
        assert_eq!(vt.node(only_free), VtreeNode::Leaf { var: 7 });
        assert!(generate_decision_vtree(&mut vt, None, &empty, Prioritization::None, &[]).is_none());
    }

    #[test]
    fn test_each_variable_once() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![2, 3], vec![3, 4], vec![4, 1], vec![1, 3, 5], vec![-5, 6]]);
        let dtree = DTree::new(&cnf).unwrap();
        let mut vt = Vtree::new();
        let root = generate_decision_vtree(&mut vt, Some(&dtree), &cnf, Prioritization::VarCount, &[1, 2, 3, 4, 5, 6]).unwrap();
        let vars = vt.variables_under(root);
        assert_eq!(vars.len(), 6);
        assert_eq!(leaves(&vt, root), vec![1, 2, 3, 4, 5, 6]);
    }
}

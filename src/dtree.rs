//! Decomposition trees over the clauses of a CNF.
//!
//! A dtree is a full binary tree whose leaves are the clauses. Each node
//! carries the set of variables of the clauses below it. The builder uses a
//! min-degree variable elimination order over the primal graph: eliminating
//! a variable composes all subtrees mentioning it into one, so variables
//! shared by two siblings end up as high in the tree as the order allows.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::bitset::BitSet;
use crate::cnf::Cnf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DTree {
    Leaf { clause: usize, vars: BitSet },
    Node { left: Box<DTree>, right: Box<DTree>, vars: BitSet },
}

impl DTree {
    /// Builds the dtree of `cnf`; `None` if it has no clauses.
    pub fn new(cnf: &Cnf) -> Option<DTree> {
        let mut forest: Vec<DTree> = cnf
            .clauses()
            .iter()
            .enumerate()
            .map(|(i, clause)| DTree::leaf(i, clause.iter().map(|l| l.var() as usize).collect()))
            .collect();
        if forest.is_empty() {
            return None;
        }

        let mut graph: BTreeMap<u32, BTreeSet<u32>> = cnf.variables().into_iter().map(|v| (v, BTreeSet::new())).collect();
        for clause in cnf.clauses() {
            for a in clause {
                for b in clause {
                    if a.var() != b.var() {
                        graph.entry(a.var()).or_default().insert(b.var());
                    }
                }
            }
        }

        while let Some(var) = graph.iter().min_by_key(|(v, n)| (n.len(), **v)).map(|(v, _)| *v) {
            let (with, without): (Vec<DTree>, Vec<DTree>) =
                forest.into_iter().partition(|t| t.vars().contains(var as usize));
            forest = without;
            if let Some(tree) = DTree::compose(with) {
                forest.push(tree);
            }

            let neighbors = graph.remove(&var).unwrap_or_default();
            for &a in &neighbors {
                if let Some(adjacent) = graph.get_mut(&a) {
                    adjacent.remove(&var);
                    adjacent.extend(neighbors.iter().copied().filter(|&b| b != a));
                }
            }
        }

        let tree = DTree::compose(forest);
        if let Some(t) = &tree {
            debug!("dtree: {} leaves, depth {}", t.num_leaves(), t.depth());
        }
        tree
    }

    pub fn leaf(clause: usize, vars: BitSet) -> DTree {
        DTree::Leaf { clause, vars }
    }

    pub fn node(left: DTree, right: DTree) -> DTree {
        let mut vars = left.vars().clone();
        vars.union_with(right.vars());
        DTree::Node { left: Box::new(left), right: Box::new(right), vars }
    }

    /// Balanced composition of `trees`, in the given order.
    pub fn compose(mut trees: Vec<DTree>) -> Option<DTree> {
        match trees.len() {
            0 => None,
            1 => trees.pop(),
            n => {
                let right = trees.split_off(n / 2);
                let l = DTree::compose(trees)?;
                let r = DTree::compose(right)?;
                Some(DTree::node(l, r))
            }
        }
    }

    /// Variables of the clauses below this node.
    pub fn vars(&self) -> &BitSet {
        match self {
            DTree::Leaf { vars, .. } | DTree::Node { vars, .. } => vars,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, DTree::Leaf { .. })
    }

    pub fn num_leaves(&self) -> usize {
        match self {
            DTree::Leaf { .. } => 1,
            DTree::Node { left, right, .. } => left.num_leaves() + right.num_leaves(),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            DTree::Leaf { .. } => 0,
            DTree::Node { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Clause indices of the leaves, left to right.
    pub fn clauses(&self) -> Vec<usize> {
        let mut result = Vec::new();
        let mut stack = vec![self];
        while let Some(t) = stack.pop() {
            match t {
                DTree::Leaf { clause, .. } => result.push(*clause),
                DTree::Node { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        result
    }
}

//! Tentative vtree edits with undo, and a greedy vtree search built on them.
//!
//! A [`VtreeShadow`] records a chain of [`VtreeFragment`]s on top of the
//! vtree version that was active when the shadow was created (the *base*).
//! Every [`step`](VtreeShadow::step) applies one [`VtreeOperation`] to the
//! active vtree, installs the result as a new version and migrates the
//! tracked nodes (the nodes pinned to the base) to it:
//!
//! ```text
//!   stack:  ... │ base │ frag 1 │ frag 2 │ frag 3 │  ← active
//!                 ▲                          │
//!                 └──── rollback_all ────────┘
//! ```
//!
//! [`rollback`](VtreeShadow::rollback) drops the most recent fragment;
//! [`apply`](VtreeShadow::apply) keeps the last one and removes the base and
//! all intermediate versions from the stack.

use std::collections::HashMap;

use log::debug;

use crate::factory::SddFactory;
use crate::sdd::SddId;
use crate::vtree::{VtreeId, VtreeOperation};

/// One applied vtree edit.
#[derive(Debug, Clone)]
pub struct VtreeFragment {
    operation: VtreeOperation,
    root: VtreeId,
    generation: u64,
    nodes: Vec<SddId>,
}

impl VtreeFragment {
    #[inline]
    pub fn operation(&self) -> VtreeOperation {
        self.operation
    }

    /// Root of the vtree version this edit produced.
    #[inline]
    pub fn root(&self) -> VtreeId {
        self.root
    }

    /// Stack generation of that version.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Undo history of vtree edits over a factory's vtree stack.
#[derive(Debug)]
pub struct VtreeShadow {
    base_depth: usize,
    /// Tracked nodes of the base version with their pin counts.
    base: Vec<(SddId, usize)>,
    /// Fragments, oldest first; each one builds on its predecessor.
    fragments: Vec<VtreeFragment>,
}

impl VtreeShadow {
    /// Starts a shadow over the active vtree, tracking its pinned nodes.
    ///
    /// # Panics
    ///
    /// Panics if no vtree is installed.
    pub fn new(factory: &mut SddFactory) -> Self {
        let root = factory.root();
        let base = root.pinned_nodes().into_iter().map(|f| (f, root.pin_count(f))).collect();
        factory.stack.stash();
        Self { base_depth: factory.stack.depth(), base, fragments: Vec::new() }
    }

    /// Number of fragments on top of the base.
    #[inline]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[VtreeFragment] {
        &self.fragments
    }

    /// The tracked nodes, as expressed over the active vtree.
    pub fn current_nodes(&self) -> Vec<SddId> {
        match self.fragments.last() {
            Some(fragment) => fragment.nodes.clone(),
            None => self.base.iter().map(|&(f, _)| f).collect(),
        }
    }

    /// Applies `op` to the active vtree and migrates the tracked nodes.
    ///
    /// Returns false (and changes nothing) if the target is not an internal
    /// node of the active vtree or the operation does not fit its shape.
    pub fn step(&mut self, factory: &mut SddFactory, op: VtreeOperation) -> bool {
        let target = op.target();
        if !factory.root().contains(target) {
            return false;
        }
        let Some(replacement) = factory.vtree.apply_operation(op) else {
            return false;
        };
        let root = match factory.stack.active() {
            Some(active) => active.replace(&mut factory.vtree, target, replacement),
            None => return false,
        };
        let generation = factory.install_vtree(root);

        let mut memo = HashMap::new();
        let mut nodes = Vec::with_capacity(self.base.len());
        for (old, &(_, pins)) in self.current_nodes().into_iter().zip(&self.base) {
            let new = factory.migrate(old, &mut memo);
            for _ in 0..pins {
                factory.pin(new);
            }
            nodes.push(new);
        }
        debug!("vtree step {}: generation {}, size {}", op, generation, factory.sdd_size_all(&nodes));
        self.fragments.push(VtreeFragment { operation: op, root, generation, nodes });
        true
    }

    /// Undoes the most recent step. Returns false if there is none.
    pub fn rollback(&mut self, factory: &mut SddFactory) -> bool {
        let Some(fragment) = self.fragments.pop() else {
            return false;
        };
        debug_assert_eq!(factory.stack.generation(), Some(fragment.generation));
        factory.stack.pop();
        debug!("vtree rollback {}", fragment.operation);
        true
    }

    /// Undoes every step, returning to the base version.
    pub fn rollback_all(&mut self, factory: &mut SddFactory) -> usize {
        let mut count = 0;
        while self.rollback(factory) {
            count += 1;
        }
        count
    }

    /// Keeps the active version and removes the base and intermediate
    /// versions from the stack. Returns the pairs `(base node, new node)`
    /// of the tracked nodes.
    pub fn apply(self, factory: &mut SddFactory) -> Vec<(SddId, SddId)> {
        factory.stack.commit();
        if !self.fragments.is_empty() {
            factory.stack.collapse(self.base_depth - 1);
        }
        debug!("vtree apply: {} steps", self.fragments.len());
        let current = self.current_nodes();
        self.base.iter().map(|&(f, _)| f).zip(current).collect()
    }

    /// Rolls back every step and ends the shadow.
    pub fn discard(mut self, factory: &mut SddFactory) {
        self.rollback_all(factory);
        factory.stack.commit();
    }
}

/// Greedy local search over vtree edits, minimizing the total size of the
/// pinned nodes.
///
/// Each round tries every rotation and swap at every internal node of the
/// active vtree, keeping an edit when the size shrinks and rolling it back
/// otherwise. Stops after `rounds` rounds or when a round brings no
/// improvement. Returns the old→new mapping of the pinned nodes.
pub fn minimize(factory: &mut SddFactory, rounds: usize) -> Vec<(SddId, SddId)> {
    let mut shadow = VtreeShadow::new(factory);
    let initial = factory.sdd_size_all(&shadow.current_nodes());
    let mut best = initial;

    for round in 0..rounds {
        let mut improved = false;
        let candidates: Vec<VtreeId> =
            factory.root().nodes().iter().copied().filter(|&t| !factory.vtree().is_leaf(t)).collect();
        for t in candidates {
            for op in [VtreeOperation::RotateLeft(t), VtreeOperation::RotateRight(t), VtreeOperation::SwapChildren(t)] {
                if !shadow.step(factory, op) {
                    continue;
                }
                let size = factory.sdd_size_all(&shadow.current_nodes());
                if size < best {
                    best = size;
                    improved = true;
                } else {
                    shadow.rollback(factory);
                }
            }
        }
        debug!("minimize round {}: size {}", round, best);
        if !improved {
            break;
        }
    }

    debug!("minimize: size {} -> {} in {} steps", initial, best, shadow.len());
    shadow.apply(factory)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::literal::Literal;

    fn lit(x: i32) -> Literal {
        Literal::from_i32(x)
    }

    /// (x1 ∧ x2) ∨ (x3 ∧ x4), pinned.
    fn setup() -> (SddFactory, SddId) {
        let mut factory = SddFactory::right_linear(4);
        let a = factory.cube(&[lit(1), lit(2)]);
        let b = factory.cube(&[lit(3), lit(4)]);
        let f = factory.disjoin(a, b);
        factory.pin(f);
        (factory, f)
    }

    #[test]
    fn test_step_and_rollback() {
        let (mut factory, f) = setup();
        let base_root = factory.root().root();
        let models = factory.models(f);

        let mut shadow = VtreeShadow::new(&mut factory);
        let right = factory.vtree().right(base_root);
        assert!(shadow.step(&mut factory, VtreeOperation::RotateLeft(right)));
        assert_eq!(shadow.len(), 1);
        assert_ne!(factory.root().root(), base_root);
        let g = shadow.current_nodes()[0];
        assert_eq!(factory.models(g), models);
        assert_eq!(factory.pinned_nodes(), vec![g]);

        let root = factory.root().root();
        assert!(shadow.step(&mut factory, VtreeOperation::SwapChildren(root)));
        let h = shadow.current_nodes()[0];
        assert_eq!(factory.models(h), models);

        assert_eq!(shadow.rollback_all(&mut factory), 2);
        assert_eq!(factory.root().root(), base_root);
        assert_eq!(shadow.current_nodes(), vec![f]);
        assert_eq!(factory.pinned_nodes(), vec![f]);
        shadow.discard(&mut factory);
        assert_eq!(factory.vtree_stack().depth(), 1);
    }

    #[test]
    fn test_step_rejects_bad_targets() {
        let (mut factory, _) = setup();
        let mut shadow = VtreeShadow::new(&mut factory);
        let leaf = factory.root().var_leaf(1);
        assert!(!shadow.step(&mut factory, VtreeOperation::SwapChildren(leaf)));
        // Right-linear: the root has a leaf as left child, nothing to rotate right.
        let root = factory.root().root();
        assert!(!shadow.step(&mut factory, VtreeOperation::RotateRight(root)));
        assert!(shadow.is_empty());
        assert!(!shadow.rollback(&mut factory));
    }

    #[test]
    fn test_apply_collapses_history() {
        let (mut factory, f) = setup();
        let mut shadow = VtreeShadow::new(&mut factory);
        let root = factory.root().root();
        assert!(shadow.step(&mut factory, VtreeOperation::SwapChildren(root)));
        let root = factory.root().root();
        assert!(shadow.step(&mut factory, VtreeOperation::SwapChildren(root)));
        let mapping = shadow.apply(&mut factory);

        assert_eq!(factory.vtree_stack().depth(), 1);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping[0].0, f);
        // Swapping twice restores the same vtree, so the node is the same.
        assert_eq!(mapping[0].1, f);
        assert_eq!(factory.pinned_nodes(), vec![f]);
    }

    #[test]
    fn test_minimize_preserves_semantics() {
        let (mut factory, f) = setup();
        let before = factory.sdd_size(f);
        let models = factory.models(f);
        let count = factory.model_count(f);

        let mapping = minimize(&mut factory, 3);
        let g = mapping[0].1;
        assert!(factory.sdd_size(g) <= before);
        assert_eq!(factory.model_count(g), count);
        assert_eq!(factory.models(g), models);
        assert_eq!(factory.pinned_nodes(), vec![g]);
        assert_eq!(factory.vtree_stack().depth(), 1);
    }
}

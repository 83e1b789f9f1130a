//! An installed vtree version.
//!
//! [`VtreeRoot`] indexes one root of the [`Vtree`] arena: it assigns every
//! node of that tree an in-order position, records parent links and
//! per-subtree variable counts, and keeps the reference-counted set of SDD
//! nodes that are pinned to this version.
//!
//! In-order positions have the property the apply algorithm relies on: for
//! any internal node `t`, every node of `left(t)` has a smaller position than
//! `t`, and every node of `right(t)` a larger one.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::sdd::SddId;
use crate::vtree::{Vtree, VtreeId, VtreeNode};

#[derive(Debug, Clone, Copy)]
struct NodeInfo {
    position: u32,
    parent: Option<VtreeId>,
    num_vars: u32,
}

/// Index over one version of the vtree.
#[derive(Debug, Clone)]
pub struct VtreeRoot {
    root: VtreeId,
    info: HashMap<VtreeId, NodeInfo>,
    by_position: Vec<VtreeId>,
    var_leaves: BTreeMap<u32, VtreeId>,
    pinned: HashMap<SddId, usize>,
}

impl VtreeRoot {
    /// Indexes the tree rooted at `root`.
    ///
    /// # Panics
    ///
    /// Panics if a variable occurs in more than one leaf.
    pub fn new(vtree: &Vtree, root: VtreeId) -> Self {
        let mut this = Self {
            root,
            info: HashMap::new(),
            by_position: Vec::new(),
            var_leaves: BTreeMap::new(),
            pinned: HashMap::new(),
        };
        this.index(vtree, root, None);
        this
    }

    fn index(&mut self, vtree: &Vtree, id: VtreeId, parent: Option<VtreeId>) -> u32 {
        match vtree.node(id) {
            VtreeNode::Leaf { var } => {
                let previous = self.var_leaves.insert(var, id);
                assert!(previous.is_none(), "Variable {} occurs in more than one vtree leaf", var);
                self.info.insert(id, NodeInfo { position: self.by_position.len() as u32, parent, num_vars: 1 });
                self.by_position.push(id);
                1
            }
            VtreeNode::Internal { left, right } => {
                let left_vars = self.index(vtree, left, Some(id));
                let position = self.by_position.len() as u32;
                self.by_position.push(id);
                let right_vars = self.index(vtree, right, Some(id));
                let num_vars = left_vars + right_vars;
                self.info.insert(id, NodeInfo { position, parent, num_vars });
                num_vars
            }
        }
    }

    #[inline]
    pub fn root(&self) -> VtreeId {
        self.root
    }

    /// Number of nodes in this version.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.by_position.len()
    }

    #[inline]
    pub fn num_vars(&self) -> u32 {
        self.var_leaves.len() as u32
    }

    /// Returns true if `id` is a node of this version.
    #[inline]
    pub fn contains(&self, id: VtreeId) -> bool {
        self.info.contains_key(&id)
    }

    fn info(&self, id: VtreeId) -> &NodeInfo {
        match self.info.get(&id) {
            Some(info) => info,
            None => panic!("Vtree node {} is not part of the active vtree", id),
        }
    }

    /// In-order position of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this version.
    #[inline]
    pub fn position(&self, id: VtreeId) -> u32 {
        self.info(id).position
    }

    /// Node at the given in-order position.
    #[inline]
    pub fn at_position(&self, position: u32) -> VtreeId {
        self.by_position[position as usize]
    }

    /// All nodes of this version, in in-order.
    #[inline]
    pub fn nodes(&self) -> &[VtreeId] {
        &self.by_position
    }

    #[inline]
    pub fn parent(&self, id: VtreeId) -> Option<VtreeId> {
        self.info(id).parent
    }

    /// Number of variables below `id`.
    #[inline]
    pub fn num_vars_under(&self, id: VtreeId) -> u32 {
        self.info(id).num_vars
    }

    /// Leaf holding `var`, if the variable is part of this version.
    #[inline]
    pub fn leaf(&self, var: u32) -> Option<VtreeId> {
        self.var_leaves.get(&var).copied()
    }

    /// Leaf holding `var`.
    ///
    /// # Panics
    ///
    /// Panics if the variable is not part of this version.
    pub fn var_leaf(&self, var: u32) -> VtreeId {
        match self.leaf(var) {
            Some(id) => id,
            None => panic!("Variable {} is not part of the vtree", var),
        }
    }

    /// All variables of this version, in ascending order.
    pub fn variables(&self) -> Vec<u32> {
        self.var_leaves.keys().copied().collect()
    }

    /// Checks if node `ancestor` is an ancestor of (or equal to) `descendant`.
    pub fn is_ancestor(&self, ancestor: VtreeId, descendant: VtreeId) -> bool {
        let mut current = Some(descendant);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Lowest common ancestor of two nodes.
    pub fn lca(&self, a: VtreeId, b: VtreeId) -> VtreeId {
        let mut ancestors_a = HashSet::new();
        let mut current = Some(a);
        while let Some(id) = current {
            ancestors_a.insert(id);
            current = self.parent(id);
        }

        let mut current = Some(b);
        while let Some(id) = current {
            if ancestors_a.contains(&id) {
                return id;
            }
            current = self.parent(id);
        }
        self.root
    }

    /// Rebuilds the path from `target` to the root with `target` replaced by
    /// `replacement`; returns the id of the new root.
    ///
    /// Untouched siblings along the path are shared with this version.
    pub fn replace(&self, vtree: &mut Vtree, target: VtreeId, replacement: VtreeId) -> VtreeId {
        let mut child = target;
        let mut new_child = replacement;
        while let Some(parent) = self.parent(child) {
            let (left, right) = vtree.node(parent).children().expect("parent is internal");
            new_child = if left == child {
                vtree.internal(new_child, right)
            } else {
                vtree.internal(left, new_child)
            };
            child = parent;
        }
        new_child
    }

    // ─── Pinned nodes ───

    /// Pins `node` to this version. Returns the new reference count.
    pub fn pin(&mut self, node: SddId) -> usize {
        let count = self.pinned.entry(node).or_insert(0);
        *count += 1;
        *count
    }

    /// Drops one reference to `node`. Returns true if the node was pinned.
    pub fn unpin(&mut self, node: SddId) -> bool {
        match self.pinned.get_mut(&node) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.pinned.remove(&node);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn pin_count(&self, node: SddId) -> usize {
        self.pinned.get(&node).copied().unwrap_or(0)
    }

    /// Pinned nodes, sorted by id.
    pub fn pinned_nodes(&self) -> Vec<SddId> {
        let mut nodes: Vec<_> = self.pinned.keys().copied().collect();
        nodes.sort();
        nodes
    }

    /// Removes every pin and returns the nodes that were pinned.
    pub fn clear_pins(&mut self) -> Vec<SddId> {
        let nodes = self.pinned_nodes();
        self.pinned.clear();
        nodes
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn balanced4() -> (Vtree, VtreeRoot) {
        let mut vt = Vtree::new();
        let root = vt.balanced(&[1, 2, 3, 4]);
        let vr = VtreeRoot::new(&vt, root);
        (vt, vr)
    }

    #[test]
    fn test_in_order_positions() {
        let (vt, vr) = balanced4();
        assert_eq!(vr.num_nodes(), 7);
        assert_eq!(vr.num_vars(), 4);
        let root = vr.root();
        assert_eq!(vr.position(root), 3);
        for t in vr.nodes() {
            if let Some((l, r)) = vt.node(*t).children() {
                assert!(vr.position(l) < vr.position(*t));
                assert!(vr.position(*t) < vr.position(r));
            }
        }
        for (pos, &id) in vr.nodes().iter().enumerate() {
            assert_eq!(vr.at_position(pos as u32), id);
        }
    }

    #[test]
    fn test_parents_and_counts() {
        let (vt, vr) = balanced4();
        let root = vr.root();
        assert_eq!(vr.parent(root), None);
        assert_eq!(vr.parent(vt.left(root)), Some(root));
        assert_eq!(vr.num_vars_under(root), 4);
        assert_eq!(vr.num_vars_under(vt.left(root)), 2);
        assert_eq!(vr.num_vars_under(vr.var_leaf(3)), 1);
        assert_eq!(vr.variables(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_lca() {
        let (vt, vr) = balanced4();
        let (x1, x2, x3) = (vr.var_leaf(1), vr.var_leaf(2), vr.var_leaf(3));
        let root = vr.root();
        assert_eq!(vr.lca(x1, x2), vt.left(root));
        assert_eq!(vr.lca(x2, x1), vt.left(root));
        assert_eq!(vr.lca(x1, x3), root);
        assert_eq!(vr.lca(x3, vt.left(root)), root);
        assert_eq!(vr.lca(x1, vt.left(root)), vt.left(root));
        assert_eq!(vr.lca(x1, x1), x1);
        assert!(vr.is_ancestor(root, x3));
        assert!(!vr.is_ancestor(x3, root));
    }

    #[test]
    #[should_panic(expected = "not part of the active vtree")]
    fn test_unknown_node_panics() {
        let (mut vt, vr) = balanced4();
        let other = vt.leaf(9);
        vr.position(other);
    }

    #[test]
    fn test_pin_refcount() {
        let (_, mut vr) = balanced4();
        let n = SddId::new(7);
        assert_eq!(vr.pin(n), 1);
        assert_eq!(vr.pin(n), 2);
        assert!(vr.unpin(n));
        assert_eq!(vr.pin_count(n), 1);
        assert!(vr.unpin(n));
        assert_eq!(vr.pin_count(n), 0);
        assert!(!vr.unpin(n));
        vr.pin(SddId::new(3));
        vr.pin(n);
        assert_eq!(vr.clear_pins(), vec![SddId::new(3), n]);
        assert!(vr.pinned_nodes().is_empty());
    }

    #[test]
    fn test_replace_path_copies() {
        let (mut vt, vr) = balanced4();
        let root = vr.root();
        let left = vt.left(root);
        let right = vt.right(root);
        let swapped = vt.internal(vt.right(left), vt.left(left));
        let new_root = vr.replace(&mut vt, left, swapped);
        assert_ne!(new_root, root);
        assert_eq!(vt.right(new_root), right);
        assert_eq!(vt.variables_under(new_root), vec![2, 1, 3, 4]);
    }
}

//! Variable Tree (Vtree) storage.
//!
//! A vtree is a full binary tree whose leaves correspond to Boolean variables.
//! Its structure determines how SDDs decompose Boolean functions.
//!
//! All vtree nodes live in one arena ([`Vtree`]). Nodes are immutable and
//! hash-consed: there is exactly one leaf per variable and exactly one
//! internal node per `(left, right)` pair. A structural edit (rotation, child
//! swap) therefore never mutates a node; it allocates the few new nodes on the
//! path to the root and yields a new root id, while every untouched subtree
//! keeps its identity. Version-scoped annotations (positions, parents, pinned
//! nodes) live in [`VtreeRoot`](crate::vtree_root::VtreeRoot).
//!
//! # Construction Strategies
//!
//! - **Right-linear**: variables ordered left-to-right in a chain
//! - **Left-linear**: variables ordered right-to-left in a chain
//! - **Balanced**: balanced binary tree for minimal height
//!
//! For variables {x₁, x₂, x₃, x₄}, a balanced vtree looks like:
//!
//! ```text
//!        ( )
//!        / \
//!       /   \
//!     ( )   ( )
//!     / \   / \
//!    x₁ x₂ x₃ x₄
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display};

/// Stable identifier for a vtree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VtreeId(u32);

impl VtreeId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the index (0-based) for array access.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for VtreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A vtree node: either a leaf (variable) or internal (with left/right children).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VtreeNode {
    /// A leaf node labeled with a variable (1-indexed).
    Leaf { var: u32 },

    /// An internal node with left and right children.
    Internal { left: VtreeId, right: VtreeId },
}

impl VtreeNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, VtreeNode::Leaf { .. })
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(self, VtreeNode::Internal { .. })
    }

    /// Returns the variable if this is a leaf, None otherwise.
    #[inline]
    pub fn var(&self) -> Option<u32> {
        match self {
            VtreeNode::Leaf { var } => Some(*var),
            VtreeNode::Internal { .. } => None,
        }
    }

    /// Returns `(left, right)` if this is an internal node, None otherwise.
    #[inline]
    pub fn children(&self) -> Option<(VtreeId, VtreeId)> {
        match self {
            VtreeNode::Internal { left, right } => Some((*left, *right)),
            VtreeNode::Leaf { .. } => None,
        }
    }
}

/// Structural edits applicable to an internal vtree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VtreeOperation {
    /// `((a, b), c)` becomes `(a, (b, c))`.
    RotateRight(VtreeId),
    /// `(a, (b, c))` becomes `((a, b), c)`.
    RotateLeft(VtreeId),
    /// `(a, b)` becomes `(b, a)`.
    SwapChildren(VtreeId),
}

impl VtreeOperation {
    /// The node the operation is applied at.
    pub fn target(&self) -> VtreeId {
        match *self {
            VtreeOperation::RotateRight(id) | VtreeOperation::RotateLeft(id) | VtreeOperation::SwapChildren(id) => id,
        }
    }
}

impl Display for VtreeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VtreeOperation::RotateRight(id) => write!(f, "rotate-right({})", id),
            VtreeOperation::RotateLeft(id) => write!(f, "rotate-left({})", id),
            VtreeOperation::SwapChildren(id) => write!(f, "swap({})", id),
        }
    }
}

/// Arena of hash-consed vtree nodes.
#[derive(Debug, Clone, Default)]
pub struct Vtree {
    nodes: Vec<VtreeNode>,
    leaves: HashMap<u32, VtreeId>,
    internals: HashMap<(VtreeId, VtreeId), VtreeId>,
}

impl Vtree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever allocated in the arena (all versions).
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the node with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the id was not allocated by this arena.
    #[inline]
    pub fn node(&self, id: VtreeId) -> VtreeNode {
        self.nodes[id.index()]
    }

    /// Returns the leaf for `var`, allocating it on first use.
    pub fn leaf(&mut self, var: u32) -> VtreeId {
        assert!(var > 0, "Variable must be positive (1-indexed)");
        if let Some(&id) = self.leaves.get(&var) {
            return id;
        }
        let id = self.alloc(VtreeNode::Leaf { var });
        self.leaves.insert(var, id);
        id
    }

    /// Returns the internal node `(left, right)`, allocating it on first use.
    pub fn internal(&mut self, left: VtreeId, right: VtreeId) -> VtreeId {
        assert_ne!(left, right, "Vtree children must be distinct");
        if let Some(&id) = self.internals.get(&(left, right)) {
            return id;
        }
        let id = self.alloc(VtreeNode::Internal { left, right });
        self.internals.insert((left, right), id);
        id
    }

    fn alloc(&mut self, node: VtreeNode) -> VtreeId {
        let id = VtreeId::new(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Returns the leaf of `var` if one was ever allocated.
    #[inline]
    pub fn leaf_of(&self, var: u32) -> Option<VtreeId> {
        self.leaves.get(&var).copied()
    }

    #[inline]
    pub fn is_leaf(&self, id: VtreeId) -> bool {
        self.node(id).is_leaf()
    }

    /// Returns the left child of an internal node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is a leaf.
    pub fn left(&self, id: VtreeId) -> VtreeId {
        match self.node(id) {
            VtreeNode::Internal { left, .. } => left,
            VtreeNode::Leaf { .. } => panic!("Vtree node {} is not internal", id),
        }
    }

    /// Returns the right child of an internal node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is a leaf.
    pub fn right(&self, id: VtreeId) -> VtreeId {
        match self.node(id) {
            VtreeNode::Internal { right, .. } => right,
            VtreeNode::Leaf { .. } => panic!("Vtree node {} is not internal", id),
        }
    }

    /// Variables under `id`, in in-order (left-to-right) order.
    pub fn variables_under(&self, id: VtreeId) -> Vec<u32> {
        let mut vars = Vec::new();
        let mut stack = vec![id];
        while let Some(t) = stack.pop() {
            match self.node(t) {
                VtreeNode::Leaf { var } => vars.push(var),
                VtreeNode::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        vars
    }

    /// All node ids of the subtree rooted at `id` (including `id`).
    pub fn subtree(&self, id: VtreeId) -> Vec<VtreeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(t) = stack.pop() {
            out.push(t);
            if let Some((left, right)) = self.node(t).children() {
                stack.push(right);
                stack.push(left);
            }
        }
        out
    }

    /// Builds a balanced vtree over `vars` (in the given left-to-right order).
    ///
    /// # Panics
    ///
    /// Panics if `vars` is empty.
    pub fn balanced(&mut self, vars: &[u32]) -> VtreeId {
        assert!(!vars.is_empty(), "Must have at least one variable");
        if vars.len() == 1 {
            return self.leaf(vars[0]);
        }
        let mid = vars.len() / 2;
        let left = self.balanced(&vars[..mid]);
        let right = self.balanced(&vars[mid..]);
        self.internal(left, right)
    }

    /// Builds a right-linear vtree: `(x₁, (x₂, (… , xₙ)))`.
    ///
    /// ```text
    ///            ( )
    ///            / \
    ///           x₁ ( )
    ///              / \
    ///             x₂ ( )
    ///                / \
    ///               x₃ x₄
    /// ```
    pub fn right_linear(&mut self, vars: &[u32]) -> VtreeId {
        assert!(!vars.is_empty(), "Must have at least one variable");
        let (&last, rest) = vars.split_last().expect("non-empty");
        let mut acc = self.leaf(last);
        for &var in rest.iter().rev() {
            let leaf = self.leaf(var);
            acc = self.internal(leaf, acc);
        }
        acc
    }

    /// Builds a left-linear vtree: `(((x₁, x₂), …), xₙ)`.
    pub fn left_linear(&mut self, vars: &[u32]) -> VtreeId {
        assert!(!vars.is_empty(), "Must have at least one variable");
        let mut acc = self.leaf(vars[0]);
        for &var in &vars[1..] {
            let leaf = self.leaf(var);
            acc = self.internal(acc, leaf);
        }
        acc
    }

    /// Applies `op` to the subtree rooted at its target and returns the
    /// replacement subtree root, or `None` if the operation does not apply
    /// to the target's shape.
    ///
    /// Only the target is rebuilt here; re-linking the ancestors is the job of
    /// [`VtreeRoot::replace`](crate::vtree_root::VtreeRoot::replace).
    pub fn apply_operation(&mut self, op: VtreeOperation) -> Option<VtreeId> {
        let (left, right) = self.node(op.target()).children()?;
        match op {
            VtreeOperation::RotateRight(_) => {
                let (a, b) = self.node(left).children()?;
                let bc = self.internal(b, right);
                Some(self.internal(a, bc))
            }
            VtreeOperation::RotateLeft(_) => {
                let (b, c) = self.node(right).children()?;
                let ab = self.internal(left, b);
                Some(self.internal(ab, c))
            }
            VtreeOperation::SwapChildren(_) => Some(self.internal(right, left)),
        }
    }

    /// Indented multi-line rendering of the subtree at `id`.
    pub fn to_string_tree(&self, id: VtreeId) -> String {
        let mut s = String::new();
        self.format_subtree(id, 0, &mut s);
        s
    }

    fn format_subtree(&self, id: VtreeId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match self.node(id) {
            VtreeNode::Leaf { var } => out.push_str(&format!("{}x{}\n", indent, var)),
            VtreeNode::Internal { left, right } => {
                out.push_str(&format!("{}({}):\n", indent, id));
                self.format_subtree(left, depth + 1, out);
                self.format_subtree(right, depth + 1, out);
            }
        }
    }

    /// Variable set of the subtree at `id`.
    pub fn variable_set(&self, id: VtreeId) -> BTreeSet<u32> {
        self.variables_under(id).into_iter().collect()
    }
}

impl Display for Vtree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vtree({} leaves, {} nodes)", self.leaves.len(), self.nodes.len())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_balanced_vtree() {
        let mut vt = Vtree::new();
        let root = vt.balanced(&[1, 2, 3, 4]);
        assert_eq!(vt.num_nodes(), 7); // 4 leaves + 3 internal
        let left = vt.left(root);
        let right = vt.right(root);
        assert!(!vt.is_leaf(left));
        assert!(!vt.is_leaf(right));
        assert_eq!(vt.variables_under(root), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_linear_vtrees() {
        let mut vt = Vtree::new();
        let right = vt.right_linear(&[1, 2, 3]);
        assert!(vt.is_leaf(vt.left(right)));
        assert_eq!(vt.node(vt.left(right)).var(), Some(1));

        let left = vt.left_linear(&[1, 2, 3]);
        assert!(vt.is_leaf(vt.right(left)));
        assert_eq!(vt.node(vt.right(left)).var(), Some(3));
        assert_eq!(vt.variables_under(left), vec![1, 2, 3]);
    }

    #[test]
    fn test_hash_consing() {
        let mut vt = Vtree::new();
        let a = vt.balanced(&[1, 2]);
        let b = vt.balanced(&[1, 2]);
        assert_eq!(a, b);
        assert_eq!(vt.num_nodes(), 3);
        assert_eq!(vt.leaf(1), vt.leaf_of(1).unwrap());
        let swapped = vt.balanced(&[2, 1]);
        assert_ne!(a, swapped);
    }

    #[test]
    fn test_rotations() {
        let mut vt = Vtree::new();
        let root = vt.left_linear(&[1, 2, 3]); // ((1,2),3)
        let rotated = vt.apply_operation(VtreeOperation::RotateRight(root)).unwrap();
        assert_eq!(rotated, vt.right_linear(&[1, 2, 3])); // (1,(2,3))
        let back = vt.apply_operation(VtreeOperation::RotateLeft(rotated)).unwrap();
        assert_eq!(back, root);

        let swapped = vt.apply_operation(VtreeOperation::SwapChildren(root)).unwrap();
        assert_eq!(vt.variables_under(swapped), vec![3, 1, 2]);

        // Rotating a leaf, or rotating right when the left child is a leaf, does not apply.
        let leaf = vt.leaf(1);
        assert_eq!(vt.apply_operation(VtreeOperation::SwapChildren(leaf)), None);
        assert_eq!(vt.apply_operation(VtreeOperation::RotateRight(rotated)), None);
    }

    #[test]
    fn test_subtree() {
        let mut vt = Vtree::new();
        let root = vt.balanced(&[1, 2, 3]);
        let ids = vt.subtree(root);
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], root);
        assert_eq!(vt.variable_set(root), [1, 2, 3].into_iter().collect());
    }
}

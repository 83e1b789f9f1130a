//! SDD factory: the owner of all SDD nodes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          SddFactory                              │
//! │                                                                  │
//! │  nodes: Vec<Sdd>          vtree: Vtree (arena)   stack: VtreeStack│
//! │  ┌────────────────┐       ┌──────────────┐       ┌────────────┐  │
//! │  │ [0] False      │       │ hash-consed  │       │ active     │  │
//! │  │ [1] True       │       │ leaves and   │       │ VtreeRoot  │  │
//! │  │ [2] +x1        │       │ internal     │       │ + pins     │  │
//! │  │ [3] -x1        │       │ nodes        │       ├────────────┤  │
//! │  │ ...            │       └──────────────┘       │ older ...  │  │
//! │  └────────────────┘                              └────────────┘  │
//! │                                                                  │
//! │  unique_table: (vtree, elements) → SddId                         │
//! │  negations:    Vec<Option<SddId>>                                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every node-creating operation takes `&mut self`. Nodes are never freed:
//! an [`SddId`] stays valid for the lifetime of the factory. Decomposition
//! nodes refer to immutable arena vtree nodes, so they remain valid SDDs for
//! their subtree across vtree versions; operations combining nodes require
//! those subtrees to be part of the active version.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::literal::Literal;
use crate::sdd::{Element, Sdd, SddId};
use crate::vtree::{Vtree, VtreeId};
use crate::vtree_root::VtreeRoot;
use crate::vtree_stack::VtreeStack;

/// Counters reported by [`SddFactory::stats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FactoryStats {
    pub num_nodes: usize,
    pub apply_calls: usize,
    pub apply_memo_hits: usize,
    pub unique_hits: usize,
}

impl fmt::Display for FactoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes: {}, apply calls: {}, apply memo hits: {}, unique-table hits: {}",
            self.num_nodes, self.apply_calls, self.apply_memo_hits, self.unique_hits
        )
    }
}

/// Hash-consing factory for SDD nodes.
pub struct SddFactory {
    pub(crate) vtree: Vtree,
    pub(crate) stack: VtreeStack,
    pub(crate) nodes: Vec<Sdd>,
    pub(crate) negations: Vec<Option<SddId>>,
    unique_table: HashMap<(VtreeId, Vec<Element>), SddId>,
    literals: HashMap<Literal, SddId>,
    pub(crate) stats: FactoryStats,
}

impl Default for SddFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SddFactory {
    /// Creates a factory without an installed vtree.
    ///
    /// Only the constants are available until a vtree is installed with
    /// [`install_vtree`](Self::install_vtree).
    pub fn new() -> Self {
        Self {
            vtree: Vtree::new(),
            stack: VtreeStack::new(),
            nodes: vec![Sdd::False, Sdd::True],
            negations: vec![Some(SddId::TRUE), Some(SddId::FALSE)],
            unique_table: HashMap::new(),
            literals: HashMap::new(),
            stats: FactoryStats::default(),
        }
    }

    /// Factory over variables `1..=num_vars` with a balanced vtree.
    pub fn balanced(num_vars: u32) -> Self {
        let vars: Vec<u32> = (1..=num_vars).collect();
        Self::with_vtree(|vt| vt.balanced(&vars))
    }

    /// Factory over variables `1..=num_vars` with a right-linear vtree.
    pub fn right_linear(num_vars: u32) -> Self {
        let vars: Vec<u32> = (1..=num_vars).collect();
        Self::with_vtree(|vt| vt.right_linear(&vars))
    }

    /// Factory over variables `1..=num_vars` with a left-linear vtree.
    pub fn left_linear(num_vars: u32) -> Self {
        let vars: Vec<u32> = (1..=num_vars).collect();
        Self::with_vtree(|vt| vt.left_linear(&vars))
    }

    /// Factory whose vtree is built by `build` in a fresh arena.
    ///
    /// ```
    /// use sdd_compiler::factory::SddFactory;
    ///
    /// // ((x1, x2), x3)
    /// let factory = SddFactory::with_vtree(|vt| {
    ///     let (a, b, c) = (vt.leaf(1), vt.leaf(2), vt.leaf(3));
    ///     let ab = vt.internal(a, b);
    ///     vt.internal(ab, c)
    /// });
    /// assert_eq!(factory.num_vars(), 3);
    /// ```
    pub fn with_vtree(build: impl FnOnce(&mut Vtree) -> VtreeId) -> Self {
        let mut factory = Self::new();
        let root = build(&mut factory.vtree);
        factory.install_vtree(root);
        factory
    }

    #[inline]
    pub fn vtree(&self) -> &Vtree {
        &self.vtree
    }

    /// Mutable access to the vtree arena, for building new roots.
    #[inline]
    pub fn vtree_mut(&mut self) -> &mut Vtree {
        &mut self.vtree
    }

    #[inline]
    pub fn vtree_stack(&self) -> &VtreeStack {
        &self.stack
    }

    /// Installs the tree rooted at `root` (built in [`vtree_mut`](Self::vtree_mut))
    /// as the active vtree. Returns its generation.
    pub fn install_vtree(&mut self, root: VtreeId) -> u64 {
        let vtree_root = VtreeRoot::new(&self.vtree, root);
        debug!("install vtree {} over {} variables", root, vtree_root.num_vars());
        self.stack.push(vtree_root)
    }

    /// The active vtree version, if one is installed.
    #[inline]
    pub fn active_vtree(&self) -> Option<&VtreeRoot> {
        self.stack.active()
    }

    /// The active vtree version.
    ///
    /// # Panics
    ///
    /// Panics if no vtree is installed.
    pub(crate) fn root(&self) -> &VtreeRoot {
        match self.stack.active() {
            Some(root) => root,
            None => panic!("No vtree is installed in the factory"),
        }
    }

    /// Number of variables of the active vtree (0 if none is installed).
    pub fn num_vars(&self) -> u32 {
        self.stack.active().map_or(0, VtreeRoot::num_vars)
    }

    /// Number of nodes allocated so far, constants included.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn node(&self, id: SddId) -> &Sdd {
        &self.nodes[id.index()]
    }

    pub fn stats(&self) -> FactoryStats {
        FactoryStats { num_nodes: self.nodes.len(), ..self.stats }
    }

    fn add_node(&mut self, node: Sdd) -> SddId {
        let id = SddId::new(self.nodes.len() as u32);
        self.nodes.push(node);
        self.negations.push(None);
        id
    }

    /// Vtree node `f` is normalized for; `None` for constants.
    #[inline]
    pub fn node_vtree(&self, f: SddId) -> Option<VtreeId> {
        self.node(f).vtree()
    }

    // ─── Terminals ───

    /// Returns the terminal node for `literal`.
    ///
    /// # Panics
    ///
    /// Panics if the variable is not part of the active vtree.
    pub fn literal(&mut self, literal: Literal) -> SddId {
        if let Some(&id) = self.literals.get(&literal) {
            return id;
        }
        let var = literal.var();
        let leaf = self.root().var_leaf(var);
        let pos_lit = Literal::positive(var);
        let neg_lit = Literal::negative(var);
        let pos = self.add_node(Sdd::Literal { literal: pos_lit, vtree: leaf });
        let neg = self.add_node(Sdd::Literal { literal: neg_lit, vtree: leaf });
        self.set_negation(pos, neg);
        self.literals.insert(pos_lit, pos);
        self.literals.insert(neg_lit, neg);
        if literal.is_positive() {
            pos
        } else {
            neg
        }
    }

    /// Positive literal of `var`.
    #[inline]
    pub fn var(&mut self, var: u32) -> SddId {
        self.literal(Literal::positive(var))
    }

    /// Negative literal of `var`.
    #[inline]
    pub fn neg_var(&mut self, var: u32) -> SddId {
        self.literal(Literal::negative(var))
    }

    // ─── Negation ───

    /// Returns ¬f.
    ///
    /// Computed by negating the subs of each element (primes partition ⊤)
    /// and cached in both directions.
    pub fn negate(&mut self, f: SddId) -> SddId {
        if let Some(neg) = self.negations[f.index()] {
            return neg;
        }
        let neg = match self.nodes[f.index()].clone() {
            Sdd::False => SddId::TRUE,
            Sdd::True => SddId::FALSE,
            Sdd::Literal { literal, .. } => self.literal(-literal),
            Sdd::Decomposition { vtree, elements } => {
                let mut negated = Vec::with_capacity(elements.len());
                for e in elements {
                    let sub = self.negate(e.sub);
                    negated.push(Element::new(e.prime, sub));
                }
                self.make_decomposition(vtree, negated)
            }
        };
        self.set_negation(f, neg);
        neg
    }

    fn set_negation(&mut self, f: SddId, neg: SddId) {
        self.negations[f.index()] = Some(neg);
        self.negations[neg.index()] = Some(f);
    }

    #[inline]
    pub(crate) fn is_negation(&self, f: SddId, g: SddId) -> bool {
        self.negations[f.index()] == Some(g)
    }

    // ─── Node construction ───

    /// Canonicalizing constructor for the two-element partition
    /// `{(prime1, sub1), (prime2, sub2)}` at `vtree`.
    ///
    /// Short-circuits before allocating:
    /// - equal subs (both primes non-false): the shared sub;
    /// - a false prime: the other element's sub;
    /// - subs `(⊤, ⊥)` or `(⊥, ⊤)`: the prime paired with ⊤.
    ///
    /// # Panics
    ///
    /// Panics if the primes are not each other's negation.
    pub fn unique(&mut self, vtree: VtreeId, prime1: SddId, sub1: SddId, prime2: SddId, sub2: SddId) -> SddId {
        if prime1.is_false() {
            return sub2;
        }
        if prime2.is_false() {
            return sub1;
        }
        if sub1 == sub2 {
            return sub1;
        }
        if sub1.is_true() && sub2.is_false() {
            return prime1;
        }
        if sub1.is_false() && sub2.is_true() {
            return prime2;
        }
        assert_eq!(
            self.negate(prime1),
            prime2,
            "unique: primes {} and {} do not partition ⊤",
            prime1,
            prime2
        );
        self.make_decomposition(vtree, vec![Element::new(prime1, sub1), Element::new(prime2, sub2)])
    }

    /// Looks up or allocates the decomposition node for `elements` at `vtree`.
    ///
    /// The elements must already be compressed and trimmed.
    pub(crate) fn make_decomposition(&mut self, vtree: VtreeId, mut elements: Vec<Element>) -> SddId {
        debug_assert!(elements.len() >= 2, "decomposition needs at least two elements");
        debug_assert!(elements.iter().all(|e| !e.prime.is_false()), "false prime in partition");
        elements.sort();
        let key = (vtree, elements);
        if let Some(&id) = self.unique_table.get(&key) {
            self.stats.unique_hits += 1;
            return id;
        }
        let id = self.add_node(Sdd::Decomposition { vtree, elements: key.1.clone() });
        self.unique_table.insert(key, id);
        id
    }

    // ─── Pinning ───

    /// Pins `f` to the active vtree version.
    pub fn pin(&mut self, f: SddId) -> usize {
        match self.stack.active_mut() {
            Some(root) => root.pin(f),
            None => panic!("No vtree is installed in the factory"),
        }
    }

    /// Releases one pin of `f` in the active vtree version.
    pub fn unpin(&mut self, f: SddId) -> bool {
        self.stack.active_mut().is_some_and(|root| root.unpin(f))
    }

    /// Nodes pinned to the active vtree version, sorted by id.
    pub fn pinned_nodes(&self) -> Vec<SddId> {
        self.stack.active().map(VtreeRoot::pinned_nodes).unwrap_or_default()
    }
}

impl fmt::Debug for SddFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SddFactory")
            .field("num_vars", &self.num_vars())
            .field("num_nodes", &self.num_nodes())
            .field("vtree_depth", &self.stack.depth())
            .finish()
    }
}

//! Top-down SDD compilation driven by an incremental SAT solver.
//!
//! The compiler walks the decision vtree from the root. The solver trail
//! is the compilation context: compiling a vtree node `t` yields the SDD of
//! the clauses restricted to the variables of `t` under the current trail.
//!
//! - **Leaf** `x`: the literal of `x` if the trail implies one, ⊤ otherwise
//!   (⊤ as well if `x` is projected away).
//! - **Decomposition** (internal node with an internal left child): compile
//!   both children independently; the result is `prime ∧ sub`.
//! - **Shannon** (internal node with a leaf `x` as left child): case-split on
//!   `x` through the solver's decision API, compiling the right child under
//!   each polarity. A conflict in a branch is resolved by asserting the
//!   learnt literal at its assertion level and compiling that node again.
//!
//! Shannon nodes memoize their results in a two-level cache keyed by the
//! implied literals and the subsumed clauses that lie in the node's context
//! (see [`VtreeAnnotation`]).

use std::collections::HashMap;

use log::debug;

use crate::annotation::VtreeAnnotation;
use crate::bitset::BitSet;
use crate::factory::SddFactory;
use crate::handler::{check, Cancellation, ComputationEvent, ComputationHandler};
use crate::literal::Literal;
use crate::sdd::SddId;
use crate::sdd_solver::SddSatSolver;
use crate::vtree::{VtreeId, VtreeNode};

#[derive(Debug, Clone, Copy, Default)]
pub struct TopDownStats {
    /// Case splits through the solver's decision API.
    pub shannon_expansions: usize,
    /// Shannon nodes answered from the cache.
    pub cache_hits: usize,
    /// Results currently held in the cache.
    pub cache_entries: usize,
    /// Shannon nodes whose variable was already implied by the trail.
    pub implied_splits: usize,
    /// Vtree nodes compiled again after asserting a learnt literal.
    pub assertion_retries: usize,
}

type ContextCache = HashMap<BitSet, HashMap<BitSet, SddId>>;

pub struct TopDownCompiler<'a> {
    factory: &'a mut SddFactory,
    solver: &'a mut SddSatSolver,
    annotation: &'a VtreeAnnotation,
    handler: &'a mut dyn ComputationHandler,
    relevant: BitSet,
    cache: HashMap<VtreeId, ContextCache>,
    split_vars: BitSet,
    stats: TopDownStats,
}

impl<'a> TopDownCompiler<'a> {
    /// Prepares a compilation of the clauses loaded into `solver` over the
    /// active vtree of `factory`. Variables outside `relevant` are
    /// existentially quantified away.
    pub fn new(
        factory: &'a mut SddFactory,
        solver: &'a mut SddSatSolver,
        annotation: &'a VtreeAnnotation,
        relevant: impl IntoIterator<Item = u32>,
        handler: &'a mut dyn ComputationHandler,
    ) -> Self {
        Self {
            factory,
            solver,
            annotation,
            handler,
            relevant: relevant.into_iter().map(|v| v as usize).collect(),
            cache: HashMap::new(),
            split_vars: BitSet::empty(),
            stats: TopDownStats::default(),
        }
    }

    /// Compiles from the root of the active vtree.
    pub fn compile(&mut self) -> Result<SddId, Cancellation> {
        check(&mut *self.handler, ComputationEvent::SddComputationStarted)?;
        let root = match self.factory.active_vtree() {
            Some(root) => root.root(),
            None => return Ok(SddId::TRUE),
        };
        let result = self.cnf2sdd(root)?;
        debug!(
            "top-down: {} Shannon expansions, {} cache hits, {} retries",
            self.stats.shannon_expansions, self.stats.cache_hits, self.stats.assertion_retries
        );
        Ok(result)
    }

    pub fn stats(&self) -> TopDownStats {
        self.stats
    }

    /// Returns true if the compiler case-split on `var` at least once.
    pub fn was_case_split(&self, var: u32) -> bool {
        self.split_vars.contains(var as usize)
    }

    /// Number of cached results at `vtree`.
    pub fn cache_size(&self, vtree: VtreeId) -> usize {
        self.cache.get(&vtree).map_or(0, |level1| level1.values().map(HashMap::len).sum())
    }

    fn cnf2sdd(&mut self, t: VtreeId) -> Result<SddId, Cancellation> {
        match self.factory.vtree().node(t) {
            VtreeNode::Leaf { var } => Ok(self.compile_leaf(var)),
            VtreeNode::Internal { left, right } => match self.factory.vtree().node(left) {
                VtreeNode::Leaf { var } => self.compile_shannon(t, var, right),
                VtreeNode::Internal { .. } => self.compile_decomposition(t, left, right),
            },
        }
    }

    fn compile_leaf(&mut self, var: u32) -> SddId {
        if !self.relevant.contains(var as usize) {
            return SddId::TRUE;
        }
        match self.solver.implied_literal(var) {
            Some(lit) => self.factory.literal(lit),
            None => SddId::TRUE,
        }
    }

    fn compile_decomposition(&mut self, t: VtreeId, left: VtreeId, right: VtreeId) -> Result<SddId, Cancellation> {
        let prime = self.cnf2sdd(left)?;
        if prime.is_false() {
            self.invalidate(left);
            return Ok(SddId::FALSE);
        }
        let sub = self.cnf2sdd(right)?;
        if sub.is_false() {
            self.invalidate(left);
            return Ok(SddId::FALSE);
        }
        let neg_prime = self.factory.negate(prime);
        Ok(self.factory.unique(t, prime, sub, neg_prime, SddId::FALSE))
    }

    fn compile_shannon(&mut self, t: VtreeId, var: u32, right: VtreeId) -> Result<SddId, Cancellation> {
        let key = self.cache_key(t);
        if let Some(cached) = self.lookup(t, &key) {
            self.stats.cache_hits += 1;
            return Ok(cached);
        }

        if let Some(lit) = self.solver.implied_literal(var) {
            self.stats.implied_splits += 1;
            let sub = self.cnf2sdd(right)?;
            if !self.relevant.contains(var as usize) {
                return Ok(sub);
            }
            let prime = self.factory.literal(lit);
            let neg_prime = self.factory.literal(-lit);
            return Ok(self.factory.unique(t, prime, sub, neg_prime, SddId::FALSE));
        }

        check(&mut *self.handler, ComputationEvent::SddShannonExpansion)?;
        self.stats.shannon_expansions += 1;
        self.split_vars.insert(var as usize);

        let pos = Literal::positive(var);
        let pos_sub = self.compile_branch(pos, right)?;
        if pos_sub.is_false() {
            return self.after_conflict(t);
        }
        let neg_sub = self.compile_branch(-pos, right)?;
        if neg_sub.is_false() {
            return self.after_conflict(t);
        }

        let result = if self.relevant.contains(var as usize) {
            let x = self.factory.literal(pos);
            let not_x = self.factory.literal(-pos);
            self.factory.unique(t, x, pos_sub, not_x, neg_sub)
        } else {
            self.factory.disjoin(pos_sub, neg_sub)
        };
        self.store(t, key, result);
        Ok(result)
    }

    fn compile_branch(&mut self, lit: Literal, right: VtreeId) -> Result<SddId, Cancellation> {
        let sub = if self.solver.decide(lit) {
            self.cnf2sdd(right)
        } else {
            Ok(SddId::FALSE)
        };
        self.solver.undo_decide(lit.var());
        sub
    }

    /// A branch at `t` came back ⊥: retry `t` if the pending learnt clause
    /// asserts at the current level, otherwise hand ⊥ to the caller.
    fn after_conflict(&mut self, t: VtreeId) -> Result<SddId, Cancellation> {
        if self.solver.at_assertion_level() && self.solver.assert_cd_literal() {
            self.stats.assertion_retries += 1;
            debug!("retrying vtree node {} at level {}", t, self.solver.decision_level());
            self.cnf2sdd(t)
        } else {
            Ok(SddId::FALSE)
        }
    }

    fn cache_key(&mut self, t: VtreeId) -> (BitSet, BitSet) {
        let lits = self.solver.implied_literal_bitset().intersection(self.annotation.context_lits_mask(t));
        let clauses = self.solver.subsumed_clause_bitset().intersection(self.annotation.context_clause_mask(t));
        (lits, clauses)
    }

    fn lookup(&self, t: VtreeId, key: &(BitSet, BitSet)) -> Option<SddId> {
        self.cache.get(&t)?.get(&key.0)?.get(&key.1).copied()
    }

    fn store(&mut self, t: VtreeId, key: (BitSet, BitSet), result: SddId) {
        let (lits, clauses) = key;
        let previous = self.cache.entry(t).or_default().entry(lits).or_default().insert(clauses, result);
        if previous.is_none() {
            self.stats.cache_entries += 1;
        }
    }

    /// Drops every cached result in the subtree of `t`.
    fn invalidate(&mut self, t: VtreeId) {
        for node in self.factory.vtree().subtree(t) {
            if let Some(entries) = self.cache.remove(&node) {
                let dropped: usize = entries.values().map(HashMap::len).sum();
                self.stats.cache_entries -= dropped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cnf::Cnf;
    use crate::decision_vtree::{generate_decision_vtree, Prioritization};
    use crate::dtree::DTree;
    use crate::handler::{NopHandler, ShannonExpansionLimit};

    struct Setup {
        factory: SddFactory,
        solver: SddSatSolver,
        annotation: VtreeAnnotation,
        vars: Vec<u32>,
    }

    fn setup(clauses: &[Vec<i32>]) -> Setup {
        let cnf = Cnf::from_dimacs(clauses);
        let vars = cnf.variables();
        let dtree = DTree::new(&cnf);
        let mut factory = SddFactory::new();
        let root = generate_decision_vtree(factory.vtree_mut(), dtree.as_ref(), &cnf, Prioritization::None, &vars).unwrap();
        factory.install_vtree(root);
        let annotation = VtreeAnnotation::new(factory.vtree(), root, &cnf);
        let mut solver = SddSatSolver::with_cnf(&cnf, cnf.max_var());
        solver.init_clause_masks(&annotation);
        Setup { factory, solver, annotation, vars }
    }

    #[test]
    fn test_compile_small_formula() {
        let mut s = setup(&[vec![1, 2], vec![-1, 3]]);
        let mut handler = NopHandler;
        let mut compiler = TopDownCompiler::new(&mut s.factory, &mut s.solver, &s.annotation, s.vars.clone(), &mut handler);
        let f = compiler.compile().unwrap();
        assert!(compiler.stats().shannon_expansions > 0);
        assert_eq!(s.factory.model_count(f), 4u32.into());
    }

    #[test]
    fn test_matches_apply() {
        let clauses = vec![vec![1, 2, -3], vec![-1, 4], vec![3, -4, 5], vec![-2, -5], vec![2, 3, 4]];
        let mut s = setup(&clauses);
        let mut handler = NopHandler;
        let f = TopDownCompiler::new(&mut s.factory, &mut s.solver, &s.annotation, s.vars.clone(), &mut handler)
            .compile()
            .unwrap();

        let mut g = SddId::TRUE;
        for c in &clauses {
            let lits: Vec<Literal> = c.iter().map(|&l| Literal::from_i32(l)).collect();
            let clause = s.factory.clause(&lits);
            g = s.factory.conjoin(g, clause);
        }
        assert_eq!(f, g);
    }

    #[test]
    fn test_conflicts_are_resolved() {
        // x1 forces x2 and ¬x2 through different clauses: only ¬x1 survives.
        let mut s = setup(&[vec![-1, 2], vec![-1, -2, 3], vec![-1, -3], vec![1, 4]]);
        let mut handler = NopHandler;
        let f = TopDownCompiler::new(&mut s.factory, &mut s.solver, &s.annotation, s.vars.clone(), &mut handler)
            .compile()
            .unwrap();
        // ¬x1 ∧ x4, x2 and x3 free.
        assert_eq!(s.factory.model_count(f), 4u32.into());
        assert!(s.factory.evaluate(f, &[Literal::from_i32(-1), Literal::from_i32(2), Literal::from_i32(-3), Literal::from_i32(4)]));
    }

    #[test]
    fn test_projection_drops_variables() {
        let mut s = setup(&[vec![1, 2], vec![-2, 3]]);
        let mut handler = NopHandler;
        let f = TopDownCompiler::new(&mut s.factory, &mut s.solver, &s.annotation, [1, 3], &mut handler)
            .compile()
            .unwrap();
        // ∃x2. (x1 ∨ x2) ∧ (¬x2 ∨ x3) = x1 ∨ x3
        assert!(!s.factory.variables(f).contains(&2));
        let x1 = s.factory.var(1);
        let x3 = s.factory.var(3);
        assert_eq!(f, s.factory.disjoin(x1, x3));
    }

    #[test]
    fn test_cancellation() {
        let mut s = setup(&[vec![1, 2], vec![-2, 3], vec![3, 4], vec![-4, 5]]);
        let mut handler = ShannonExpansionLimit::new(1);
        {
            let mut compiler =
                TopDownCompiler::new(&mut s.factory, &mut s.solver, &s.annotation, s.vars.clone(), &mut handler);
            let err = compiler.compile().unwrap_err();
            assert_eq!(err.event, ComputationEvent::SddShannonExpansion);
            assert_eq!(compiler.stats().shannon_expansions, 1);
        }

        // The aborted branches were undone on the way out.
        assert_eq!(s.solver.decision_level(), 0);
        let nodes = s.factory.num_nodes();
        let decisions = s.solver.stats().decisions;

        // Once declined, the handler keeps declining, and nothing more is built.
        assert!(!handler.should_resume(ComputationEvent::SddShannonExpansion));
        assert_eq!(handler.count(), 1);
        let mut compiler = TopDownCompiler::new(&mut s.factory, &mut s.solver, &s.annotation, s.vars.clone(), &mut handler);
        let err = compiler.compile().unwrap_err();
        assert_eq!(err.event, ComputationEvent::SddShannonExpansion);
        assert_eq!(compiler.stats().shannon_expansions, 0);
        assert_eq!(s.factory.num_nodes(), nodes);
        assert_eq!(s.solver.stats().decisions, decisions);
    }
}

//! SAT solver extension for top-down SDD compilation.
//!
//! [`SddSatSolver`] wraps the base [`Solver`] and maintains two bit sets
//! that describe the current solver state at every recursion point of the
//! compiler:
//!
//! - the *implied literals*: every literal on the trail, indexed by
//!   [`Literal::index`]. Kept up to date eagerly through the solver hooks,
//!   with a snapshot per decision level that is restored on backtrack.
//! - the *subsumed clauses*: the input clauses satisfied by some trail
//!   literal. Advanced lazily from the last trail position it saw; when
//!   backtracking went below that position it is rebuilt from the start of
//!   the trail.

use log::debug;

use crate::annotation::VtreeAnnotation;
use crate::bitset::BitSet;
use crate::cnf::Cnf;
use crate::literal::Literal;
use crate::solver::{Solver, SolverHooks, SolverStats};

/// Solver hooks mirroring the trail into a bit set.
#[derive(Debug, Clone)]
pub struct TrailTracker {
    trail_bitset: BitSet,
    trail_lim_bitsets: Vec<BitSet>,
    /// Smallest trail length reached by a backtrack since the subsumed-clause
    /// set was last advanced.
    canceled_until: usize,
}

impl Default for TrailTracker {
    fn default() -> Self {
        Self {
            trail_bitset: BitSet::empty(),
            trail_lim_bitsets: Vec::new(),
            canceled_until: usize::MAX,
        }
    }
}

impl SolverHooks for TrailTracker {
    fn on_enqueue(&mut self, lit: Literal) {
        self.trail_bitset.insert(lit.index());
    }

    fn on_new_level(&mut self, _level: usize) {
        self.trail_lim_bitsets.push(self.trail_bitset.clone());
    }

    fn on_cancel(&mut self, level: usize, trail_len: usize) {
        self.trail_bitset = self.trail_lim_bitsets[level].clone();
        self.trail_lim_bitsets.truncate(level);
        self.canceled_until = self.canceled_until.min(trail_len);
    }
}

pub struct SddSatSolver {
    solver: Solver<TrailTracker>,
    /// Clauses satisfied by each literal, indexed by [`Literal::index`].
    clause_masks: Vec<BitSet>,
    subsumed: BitSet,
    advanced_until: usize,
}

impl Default for SddSatSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SddSatSolver {
    pub fn new() -> Self {
        Self {
            solver: Solver::with_hooks(TrailTracker::default()),
            clause_masks: Vec::new(),
            subsumed: BitSet::empty(),
            advanced_until: 0,
        }
    }

    /// Creates a solver loaded with the clauses of `cnf` over variables
    /// `1..=num_vars` (at least the variables of `cnf`).
    pub fn with_cnf(cnf: &Cnf, num_vars: u32) -> Self {
        let mut solver = Self::new();
        solver.solver.ensure_vars(num_vars.max(cnf.max_var()));
        for clause in cnf.clauses() {
            if !solver.add_clause(clause) {
                break;
            }
        }
        solver
    }

    #[inline]
    pub fn add_clause(&mut self, lits: &[Literal]) -> bool {
        self.solver.add_clause(lits)
    }

    /// Installs the per-literal clause masks computed by the annotation.
    pub fn init_clause_masks(&mut self, annotation: &VtreeAnnotation) {
        let max_var = annotation.max_var().max(self.solver.num_vars());
        self.clause_masks = vec![BitSet::empty(); 2 * (max_var as usize + 1)];
        for var in 1..=annotation.max_var() {
            self.clause_masks[Literal::positive(var).index()] = annotation.clause_pos_mask(var).clone();
            self.clause_masks[Literal::negative(var).index()] = annotation.clause_neg_mask(var).clone();
        }
        self.subsumed.clear();
        self.advanced_until = 0;
        debug!("clause masks installed for {} variables", max_var);
    }

    /// Solves the loaded clauses; the solver is back at level 0 afterwards.
    #[inline]
    pub fn sat(&mut self) -> bool {
        self.solver.sat()
    }

    #[inline]
    pub fn decide(&mut self, lit: Literal) -> bool {
        self.solver.decide(lit)
    }

    #[inline]
    pub fn undo_decide(&mut self, var: u32) {
        self.solver.undo_decide(var)
    }

    #[inline]
    pub fn at_assertion_level(&self) -> bool {
        self.solver.at_assertion_level()
    }

    #[inline]
    pub fn assert_cd_literal(&mut self) -> bool {
        self.solver.assert_cd_literal()
    }

    #[inline]
    pub fn decision_level(&self) -> usize {
        self.solver.decision_level()
    }

    #[inline]
    pub fn stats(&self) -> SolverStats {
        self.solver.stats()
    }

    #[inline]
    pub fn solver(&self) -> &Solver<TrailTracker> {
        &self.solver
    }

    /// The literal of `var` currently on the trail, if any.
    pub fn implied_literal(&self, var: u32) -> Option<Literal> {
        let pos = Literal::positive(var);
        self.solver.value(pos).map(|value| if value { pos } else { -pos })
    }

    /// All literals currently on the trail.
    #[inline]
    pub fn implied_literal_bitset(&self) -> &BitSet {
        &self.solver.hooks().trail_bitset
    }

    /// Input clauses satisfied by the current trail.
    pub fn subsumed_clause_bitset(&mut self) -> &BitSet {
        let tracker = self.solver.hooks_mut();
        let canceled_until = std::mem::replace(&mut tracker.canceled_until, usize::MAX);
        if canceled_until < self.advanced_until {
            self.subsumed.clear();
            self.advanced_until = 0;
        }
        let trail = self.solver.trail();
        for lit in &trail[self.advanced_until.min(trail.len())..] {
            if let Some(mask) = self.clause_masks.get(lit.index()) {
                self.subsumed.union_with(mask);
            }
        }
        self.advanced_until = trail.len();
        &self.subsumed
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::vtree::Vtree;

    fn lit(x: i32) -> Literal {
        Literal::from_i32(x)
    }

    fn setup() -> SddSatSolver {
        // 0 = (x1 ∨ x2), 1 = (¬x1 ∨ x3), 2 = (¬x3 ∨ x4)
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![-1, 3], vec![-3, 4]]);
        let mut vt = Vtree::new();
        let root = vt.right_linear(&[1, 2, 3, 4]);
        let ann = VtreeAnnotation::new(&vt, root, &cnf);
        let mut solver = SddSatSolver::with_cnf(&cnf, 4);
        solver.init_clause_masks(&ann);
        solver
    }

    #[test]
    fn test_implied_literals_follow_trail() {
        let mut solver = setup();
        assert!(solver.sat());
        assert!(solver.implied_literal_bitset().is_empty());

        assert!(solver.decide(lit(1)));
        assert_eq!(solver.implied_literal(3), Some(lit(3)));
        assert_eq!(solver.implied_literal(4), Some(lit(4)));
        assert_eq!(solver.implied_literal(2), None);
        let implied = solver.implied_literal_bitset();
        assert!(implied.contains(lit(1).index()));
        assert!(implied.contains(lit(4).index()));
        assert!(!implied.contains(lit(-4).index()));

        solver.undo_decide(1);
        assert!(solver.implied_literal_bitset().is_empty());
    }

    #[test]
    fn test_subsumed_clauses_advance_and_rewind() {
        let mut solver = setup();
        assert!(solver.subsumed_clause_bitset().is_empty());

        assert!(solver.decide(lit(1)));
        // x1, x3, x4 satisfy clauses 0, 1 and 2.
        assert_eq!(solver.subsumed_clause_bitset().iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        solver.undo_decide(1);

        assert!(solver.decide(lit(-1)));
        // ¬x1 satisfies clause 1, then x2 is propagated and satisfies clause 0.
        assert_eq!(solver.subsumed_clause_bitset().iter().collect::<Vec<_>>(), vec![0, 1]);
        assert!(solver.decide(lit(-3)));
        assert_eq!(solver.subsumed_clause_bitset().iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        solver.undo_decide(3);
        assert_eq!(solver.subsumed_clause_bitset().iter().collect::<Vec<_>>(), vec![0, 1]);
        solver.undo_decide(1);
        assert!(solver.subsumed_clause_bitset().is_empty());
    }

    #[test]
    fn test_level_zero_literals_survive_backtrack() {
        let cnf = Cnf::from_dimacs(&[vec![1], vec![-1, 2, 3]]);
        let mut solver = SddSatSolver::with_cnf(&cnf, 3);
        assert_eq!(solver.implied_literal(1), Some(lit(1)));
        assert!(solver.decide(lit(-2)));
        assert_eq!(solver.implied_literal(3), Some(lit(3)));
        solver.undo_decide(2);
        assert!(solver.implied_literal_bitset().contains(lit(1).index()));
        assert!(!solver.implied_literal_bitset().contains(lit(3).index()));
    }
}

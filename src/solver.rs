//! Incremental CDCL solver.
//!
//! A compact MiniSat-style solver: two watched literals with blockers,
//! first-UIP conflict analysis, activity-based branching with phase saving.
//!
//! Besides the usual `solve(assumptions)` entry point it exposes a
//! *decision API* used by the top-down compiler, which drives the search
//! itself:
//!
//! - [`decide`](Solver::decide) opens a decision level, enqueues a literal
//!   and propagates. On conflict the learnt clause and its assertion level
//!   are recorded and `false` is returned.
//! - [`undo_decide`](Solver::undo_decide) backtracks to just below the
//!   level of the given decision.
//! - once backtracking reaches the recorded assertion level
//!   ([`at_assertion_level`](Solver::at_assertion_level)),
//!   [`assert_cd_literal`](Solver::assert_cd_literal) adds the learnt clause
//!   and enqueues its asserting literal.
//!
//! Trail changes are reported through [`SolverHooks`], the seam used by
//! [`SddSatSolver`](crate::sdd_solver::SddSatSolver) to maintain its bit sets.

use log::{debug, trace};

use crate::literal::Literal;

/// Callbacks invoked on trail changes.
pub trait SolverHooks {
    /// A literal was put on the trail.
    fn on_enqueue(&mut self, _lit: Literal) {}

    /// A new decision level was opened; `level` is the new decision level.
    fn on_new_level(&mut self, _level: usize) {}

    /// The trail was cut back to decision level `level`, leaving `trail_len` literals.
    fn on_cancel(&mut self, _level: usize, _trail_len: usize) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl SolverHooks for NoHooks {}

#[derive(Debug, Clone)]
struct Clause {
    lits: Vec<Literal>,
    learnt: bool,
}

#[derive(Debug, Clone, Copy)]
struct Watcher {
    clause: usize,
    blocker: Literal,
}

/// Learnt clause waiting to be asserted once backtracking reaches `level`.
#[derive(Debug, Clone)]
struct Assertion {
    clause: Vec<Literal>,
    level: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SolverStats {
    pub decisions: u64,
    pub conflicts: u64,
    pub propagations: u64,
    pub learnts: u64,
}

pub struct Solver<H: SolverHooks = NoHooks> {
    num_vars: u32,
    clauses: Vec<Clause>,
    /// `watches[lit.index()]`: clauses watching `lit`, visited when `lit` becomes false.
    watches: Vec<Vec<Watcher>>,
    assigns: Vec<Option<bool>>,
    levels: Vec<usize>,
    reasons: Vec<Option<usize>>,
    trail: Vec<Literal>,
    trail_lim: Vec<usize>,
    qhead: usize,
    activity: Vec<f64>,
    var_inc: f64,
    polarity: Vec<bool>,
    seen: Vec<bool>,
    ok: bool,
    assertion: Option<Assertion>,
    model: Vec<bool>,
    hooks: H,
    stats: SolverStats,
}

const VAR_DECAY: f64 = 0.95;
const RESCALE_LIMIT: f64 = 1e100;

#[inline]
fn lit_value(assigns: &[Option<bool>], lit: Literal) -> Option<bool> {
    assigns[lit.var() as usize].map(|v| v == lit.is_positive())
}

impl Default for Solver<NoHooks> {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver<NoHooks> {
    pub fn new() -> Self {
        Self::with_hooks(NoHooks)
    }
}

impl<H: SolverHooks> Solver<H> {
    pub fn with_hooks(hooks: H) -> Self {
        Self {
            num_vars: 0,
            clauses: Vec::new(),
            watches: vec![Vec::new(); 2],
            assigns: vec![None],
            levels: vec![0],
            reasons: vec![None],
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            activity: vec![0.0],
            var_inc: 1.0,
            polarity: vec![false],
            seen: vec![false],
            ok: true,
            assertion: None,
            model: Vec::new(),
            hooks,
            stats: SolverStats::default(),
        }
    }

    #[inline]
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Makes variables `1..=num_vars` known to the solver.
    pub fn ensure_vars(&mut self, num_vars: u32) {
        if num_vars <= self.num_vars {
            return;
        }
        let n = num_vars as usize + 1;
        self.watches.resize(2 * n, Vec::new());
        self.assigns.resize(n, None);
        self.levels.resize(n, 0);
        self.reasons.resize(n, None);
        self.activity.resize(n, 0.0);
        self.polarity.resize(n, false);
        self.seen.resize(n, false);
        self.num_vars = num_vars;
    }

    #[inline]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    #[inline]
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    #[inline]
    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Returns false once the clause database is known to be unsatisfiable.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    #[inline]
    pub fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    #[inline]
    pub fn trail(&self) -> &[Literal] {
        &self.trail
    }

    /// Current value of `lit`: `Some(true)` if it is on the trail.
    #[inline]
    pub fn value(&self, lit: Literal) -> Option<bool> {
        if lit.var() > self.num_vars {
            return None;
        }
        lit_value(&self.assigns, lit)
    }

    /// Decision level `var` was assigned at, if it is assigned.
    pub fn level(&self, var: u32) -> Option<usize> {
        self.assigns.get(var as usize).copied().flatten().map(|_| self.levels[var as usize])
    }

    /// Model of the last successful [`solve`](Self::solve), indexed by variable.
    #[inline]
    pub fn model(&self) -> &[bool] {
        &self.model
    }

    /// Adds a clause at decision level 0.
    ///
    /// Returns false if the solver became (or already was) unsatisfiable.
    pub fn add_clause(&mut self, lits: &[Literal]) -> bool {
        assert_eq!(self.decision_level(), 0, "clauses can only be added at decision level 0");
        if !self.ok {
            return false;
        }
        if let Some(max) = lits.iter().map(|l| l.var()).max() {
            self.ensure_vars(max);
        }

        let mut clause: Vec<Literal> = lits.to_vec();
        clause.sort();
        clause.dedup();
        if clause.iter().any(|&lit| clause.contains(&-lit)) {
            return true;
        }
        let mut simplified = Vec::with_capacity(clause.len());
        for &lit in &clause {
            match lit_value(&self.assigns, lit) {
                Some(true) => return true,
                Some(false) => {}
                None => simplified.push(lit),
            }
        }

        match simplified.len() {
            0 => {
                self.ok = false;
                false
            }
            1 => {
                self.enqueue(simplified[0], None);
                self.ok = self.propagate().is_none();
                self.ok
            }
            _ => {
                self.attach(Clause { lits: simplified, learnt: false });
                true
            }
        }
    }

    fn attach(&mut self, clause: Clause) -> usize {
        let index = self.clauses.len();
        let (c0, c1) = (clause.lits[0], clause.lits[1]);
        self.watches[c0.index()].push(Watcher { clause: index, blocker: c1 });
        self.watches[c1.index()].push(Watcher { clause: index, blocker: c0 });
        if clause.learnt {
            self.stats.learnts += 1;
        }
        self.clauses.push(clause);
        index
    }

    fn enqueue(&mut self, lit: Literal, reason: Option<usize>) {
        let var = lit.var() as usize;
        debug_assert!(self.assigns[var].is_none(), "variable {} is already assigned", var);
        self.assigns[var] = Some(lit.is_positive());
        self.levels[var] = self.decision_level();
        self.reasons[var] = reason;
        self.trail.push(lit);
        self.hooks.on_enqueue(lit);
    }

    fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len());
        self.hooks.on_new_level(self.trail_lim.len());
    }

    /// Undoes all assignments above decision level `level`.
    pub fn cancel_until(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }
        let bound = self.trail_lim[level];
        for &lit in self.trail[bound..].iter().rev() {
            let var = lit.var() as usize;
            self.assigns[var] = None;
            self.reasons[var] = None;
            self.polarity[var] = lit.is_positive();
        }
        self.trail.truncate(bound);
        self.trail_lim.truncate(level);
        self.qhead = bound;
        self.hooks.on_cancel(level, bound);
    }

    /// Unit propagation. Returns the index of a conflicting clause, if any.
    pub fn propagate(&mut self) -> Option<usize> {
        let mut conflict = None;
        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            self.stats.propagations += 1;
            let false_lit = -p;
            let mut ws = std::mem::take(&mut self.watches[false_lit.index()]);
            let mut i = 0;
            let mut j = 0;

            'watchers: while i < ws.len() {
                let w = ws[i];
                i += 1;
                if lit_value(&self.assigns, w.blocker) == Some(true) {
                    ws[j] = w;
                    j += 1;
                    continue;
                }

                let lits = &mut self.clauses[w.clause].lits;
                if lits[0] == false_lit {
                    lits.swap(0, 1);
                }
                debug_assert_eq!(lits[1], false_lit);
                let first = lits[0];
                let watcher = Watcher { clause: w.clause, blocker: first };
                if first != w.blocker && lit_value(&self.assigns, first) == Some(true) {
                    ws[j] = watcher;
                    j += 1;
                    continue;
                }

                for k in 2..lits.len() {
                    if lit_value(&self.assigns, lits[k]) != Some(false) {
                        lits.swap(1, k);
                        let new_watch = lits[1];
                        self.watches[new_watch.index()].push(watcher);
                        continue 'watchers;
                    }
                }

                // Unit or conflicting.
                ws[j] = watcher;
                j += 1;
                if lit_value(&self.assigns, first) == Some(false) {
                    conflict = Some(w.clause);
                    self.qhead = self.trail.len();
                    while i < ws.len() {
                        ws[j] = ws[i];
                        j += 1;
                        i += 1;
                    }
                } else {
                    trace!("propagate {} from clause {}", first, w.clause);
                    self.enqueue(first, Some(w.clause));
                }
            }

            ws.truncate(j);
            self.watches[false_lit.index()] = ws;
        }
        conflict
    }

    /// First-UIP conflict analysis.
    ///
    /// Returns the learnt clause (asserting literal first, a literal of the
    /// highest remaining level second) and its backtrack level.
    fn analyze(&mut self, conflict: usize) -> (Vec<Literal>, usize) {
        let current = self.decision_level();
        let mut learnt = vec![Literal::positive(1)];
        let mut path_count = 0;
        let mut p: Option<Literal> = None;
        let mut index = self.trail.len();
        let mut reason = Some(conflict);

        loop {
            let clause = reason.expect("implied literal has a reason");
            let start = usize::from(p.is_some());
            for k in start..self.clauses[clause].lits.len() {
                let q = self.clauses[clause].lits[k];
                let var = q.var() as usize;
                if !self.seen[var] && self.levels[var] > 0 {
                    self.bump_activity(var);
                    self.seen[var] = true;
                    if self.levels[var] >= current {
                        path_count += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }

            loop {
                index -= 1;
                if self.seen[self.trail[index].var() as usize] {
                    break;
                }
            }
            let lit = self.trail[index];
            let var = lit.var() as usize;
            p = Some(lit);
            reason = self.reasons[var];
            self.seen[var] = false;
            path_count -= 1;
            if path_count == 0 {
                break;
            }
        }

        let uip = p.expect("conflict analysis reached the UIP");
        learnt[0] = -uip;
        for lit in &learnt[1..] {
            self.seen[lit.var() as usize] = false;
        }

        let backtrack_level = if learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            for k in 2..learnt.len() {
                if self.levels[learnt[k].var() as usize] > self.levels[learnt[max_i].var() as usize] {
                    max_i = k;
                }
            }
            learnt.swap(1, max_i);
            self.levels[learnt[1].var() as usize]
        };
        self.var_inc /= VAR_DECAY;
        (learnt, backtrack_level)
    }

    fn bump_activity(&mut self, var: usize) {
        self.activity[var] += self.var_inc;
        if self.activity[var] > RESCALE_LIMIT {
            for a in &mut self.activity {
                *a *= 1.0 / RESCALE_LIMIT;
            }
            self.var_inc *= 1.0 / RESCALE_LIMIT;
        }
    }

    /// Adds a learnt clause and enqueues its asserting literal.
    fn learn(&mut self, clause: Vec<Literal>) {
        let asserting = clause[0];
        if clause.len() == 1 {
            self.enqueue(asserting, None);
        } else {
            let index = self.attach(Clause { lits: clause, learnt: true });
            self.enqueue(asserting, Some(index));
        }
    }

    fn pick_branch_lit(&self) -> Option<Literal> {
        let mut best: Option<usize> = None;
        for var in 1..=self.num_vars as usize {
            if self.assigns[var].is_none() && best.map_or(true, |b| self.activity[var] > self.activity[b]) {
                best = Some(var);
            }
        }
        best.map(|var| Literal::new(var as u32, self.polarity[var]))
    }

    /// Solves under the given assumptions. The solver is back at level 0
    /// when this returns; on success the model is available via [`model`](Self::model).
    pub fn solve(&mut self, assumptions: &[Literal]) -> bool {
        if !self.ok {
            return false;
        }
        self.cancel_until(0);
        if let Some(max) = assumptions.iter().map(|l| l.var()).max() {
            self.ensure_vars(max);
        }

        loop {
            if let Some(conflict) = self.propagate() {
                self.stats.conflicts += 1;
                if self.decision_level() == 0 {
                    self.ok = false;
                    return false;
                }
                let (learnt, backtrack_level) = self.analyze(conflict);
                self.cancel_until(backtrack_level);
                self.learn(learnt);
                continue;
            }

            let mut next = None;
            while self.decision_level() < assumptions.len() {
                let p = assumptions[self.decision_level()];
                match lit_value(&self.assigns, p) {
                    // Dummy level: the assumption already holds.
                    Some(true) => self.new_decision_level(),
                    Some(false) => {
                        self.cancel_until(0);
                        return false;
                    }
                    None => {
                        next = Some(p);
                        break;
                    }
                }
            }

            let next = match next {
                Some(p) => p,
                None => match self.pick_branch_lit() {
                    Some(p) => {
                        self.stats.decisions += 1;
                        p
                    }
                    None => {
                        self.model = self.assigns.iter().map(|v| v.unwrap_or(false)).collect();
                        self.cancel_until(0);
                        return true;
                    }
                },
            };
            self.new_decision_level();
            self.enqueue(next, None);
        }
    }

    /// Solves without assumptions.
    #[inline]
    pub fn sat(&mut self) -> bool {
        self.solve(&[])
    }

    // ─── Decision API ───

    /// Opens a new decision level with `lit` and propagates.
    ///
    /// Returns false on conflict; the learnt clause is then pending until
    /// [`assert_cd_literal`](Self::assert_cd_literal).
    ///
    /// # Panics
    ///
    /// Panics if `lit` is already assigned.
    pub fn decide(&mut self, lit: Literal) -> bool {
        assert!(self.value(lit).is_none(), "deciding on assigned literal {}", lit);
        self.stats.decisions += 1;
        self.new_decision_level();
        self.enqueue(lit, None);
        self.propagate_after_decide()
    }

    /// Backtracks to the level just below the decision on `var`.
    pub fn undo_decide(&mut self, var: u32) {
        let level = self.levels[var as usize];
        self.cancel_until(level.saturating_sub(1));
    }

    /// Returns true if the current level is the assertion level of the
    /// pending learnt clause.
    pub fn at_assertion_level(&self) -> bool {
        matches!(&self.assertion, Some(a) if a.level == self.decision_level())
    }

    /// Adds the pending learnt clause, enqueues its asserting literal and
    /// propagates. Returns false if this yields a new conflict.
    ///
    /// # Panics
    ///
    /// Panics if not at the assertion level.
    pub fn assert_cd_literal(&mut self) -> bool {
        assert!(self.at_assertion_level(), "not at the assertion level");
        let Some(assertion) = self.assertion.take() else {
            return false;
        };
        debug!("assert {} at level {}", assertion.clause[0], assertion.level);
        self.learn(assertion.clause);
        self.propagate_after_decide()
    }

    fn propagate_after_decide(&mut self) -> bool {
        match self.propagate() {
            Some(conflict) => {
                self.handle_conflict(conflict);
                false
            }
            None => true,
        }
    }

    fn handle_conflict(&mut self, conflict: usize) {
        self.stats.conflicts += 1;
        if self.decision_level() > 0 {
            let (clause, level) = self.analyze(conflict);
            debug!("conflict at level {}, learnt clause of size {} asserts at level {}", self.decision_level(), clause.len(), level);
            self.assertion = Some(Assertion { clause, level });
        } else {
            debug!("conflict at level 0");
            self.assertion = None;
            self.ok = false;
        }
    }
}

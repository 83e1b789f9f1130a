//! Satisfiability-preserving CNF pre-processing.
//!
//! - [`backbone_simplify`] computes the backbone (literals true in every
//!   model) with the base solver, emits it as unit clauses and propagates it
//!   through the remaining clauses.
//! - [`subsume`] drops duplicate and subsumed clauses.
//!
//! Both return clauses in canonical order (by length, then literals), so
//! [`simplify`] is idempotent.

use log::debug;

use crate::cnf::Cnf;
use crate::literal::Literal;
use crate::solver::Solver;

/// Literals that are true in every model of `cnf`, by variable; `None` if
/// `cnf` is unsatisfiable.
pub fn backbone(cnf: &Cnf) -> Option<Vec<Literal>> {
    let mut solver = Solver::new();
    solver.ensure_vars(cnf.max_var());
    for clause in cnf.clauses() {
        if !solver.add_clause(clause) {
            return None;
        }
    }
    if !solver.sat() {
        return None;
    }

    let model = solver.model().to_vec();
    let mut result = Vec::new();
    for var in cnf.variables() {
        let candidate = Literal::new(var, model[var as usize]);
        // The candidate is a backbone literal iff its negation has no model.
        if !solver.solve(&[-candidate]) {
            result.push(candidate);
        }
    }
    Some(result)
}

/// Replaces `cnf` by its backbone units plus the clauses that the backbone
/// does not satisfy, with falsified literals removed.
///
/// An unsatisfiable input yields the single empty clause.
pub fn backbone_simplify(cnf: &Cnf) -> Cnf {
    let Some(backbone) = backbone(cnf) else {
        debug!("backbone: formula is unsatisfiable");
        let mut unsat = Cnf::new();
        unsat.add_clause(std::iter::empty::<Literal>());
        return unsat;
    };

    let mut values = vec![None; cnf.max_var() as usize + 1];
    for lit in &backbone {
        values[lit.var() as usize] = Some(lit.is_positive());
    }

    let mut clauses: Vec<Vec<Literal>> = backbone.iter().map(|&lit| vec![lit]).collect();
    for clause in cnf.clauses() {
        let satisfied = clause.iter().any(|lit| values[lit.var() as usize] == Some(lit.is_positive()));
        if satisfied {
            continue;
        }
        clauses.push(clause.iter().copied().filter(|lit| values[lit.var() as usize].is_none()).collect());
    }
    debug!("backbone: {} literals, {} of {} clauses remain", backbone.len(), clauses.len() - backbone.len(), cnf.len());
    canonical(clauses)
}

/// Removes duplicate clauses and clauses subsumed by another clause.
pub fn subsume(cnf: &Cnf) -> Cnf {
    let mut clauses: Vec<Vec<Literal>> = cnf.clauses().to_vec();
    sort_canonical(&mut clauses);
    clauses.dedup();

    let mut kept: Vec<Vec<Literal>> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        // Shorter clauses come first, so only kept ones can subsume this one.
        if !kept.iter().any(|k| is_subset(k, &clause)) {
            kept.push(clause);
        }
    }
    debug!("subsumption: {} of {} clauses kept", kept.len(), cnf.len());
    canonical(kept)
}

/// Backbone simplification followed by subsumption.
pub fn simplify(cnf: &Cnf) -> Cnf {
    subsume(&backbone_simplify(cnf))
}

fn sort_canonical(clauses: &mut [Vec<Literal>]) {
    clauses.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
}

fn canonical(mut clauses: Vec<Vec<Literal>>) -> Cnf {
    sort_canonical(&mut clauses);
    clauses.into_iter().collect()
}

/// Both clauses are sorted by variable.
fn is_subset(small: &[Literal], large: &[Literal]) -> bool {
    let mut j = 0;
    for lit in small {
        while j < large.len() && large[j] != *lit {
            if large[j].var() > lit.var() {
                return false;
            }
            j += 1;
        }
        if j == large.len() {
            return false;
        }
        j += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn lit(x: i32) -> Literal {
        Literal::from_i32(x)
    }

    #[test]
    fn test_backbone() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![1, -2], vec![-1, 3, 4]]);
        assert_eq!(backbone(&cnf), Some(vec![lit(1)]));
        let unsat = Cnf::from_dimacs(&[vec![1], vec![-1]]);
        assert_eq!(backbone(&unsat), None);
    }

    #[test]
    fn test_backbone_simplify() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![1, -2], vec![-1, 3, 4], vec![2, 5]]);
        let simplified = backbone_simplify(&cnf);
        assert_eq!(simplified, Cnf::from_dimacs(&[vec![1], vec![2, 5], vec![3, 4]]));

        let unsat = Cnf::from_dimacs(&[vec![1], vec![-1]]);
        assert!(backbone_simplify(&unsat).has_empty_clause());
        assert_eq!(backbone_simplify(&unsat).len(), 1);
    }

    #[test]
    fn test_subsume() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2, 3], vec![1, 2], vec![2, 1], vec![-1, 4], vec![4, -1, 5]]);
        let result = subsume(&cnf);
        assert_eq!(result, Cnf::from_dimacs(&[vec![-1, 4], vec![1, 2]]));
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![1, -2], vec![-1, 3, 4], vec![3, 4, 5], vec![-3, 6], vec![6, 7]]);
        let once = simplify(&cnf);
        let twice = simplify(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_is_subset() {
        assert!(is_subset(&[lit(1), lit(3)], &[lit(1), lit(2), lit(3)]));
        assert!(!is_subset(&[lit(1), lit(-3)], &[lit(1), lit(2), lit(3)]));
        assert!(is_subset(&[], &[lit(1)]));
    }
}

//! Clause-set representation consumed by the compilers.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use crate::literal::Literal;

/// A CNF formula: a conjunction of clauses.
///
/// Clauses are normalized on insertion: literals are sorted by variable and
/// deduplicated, and tautological clauses (containing both `x` and `¬x`) are
/// dropped. The empty clause is kept and makes the formula unsatisfiable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cnf {
    clauses: Vec<Vec<Literal>>,
}

impl Cnf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a CNF from DIMACS-style signed integer clauses.
    ///
    /// ```
    /// use sdd_compiler::cnf::Cnf;
    ///
    /// let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![-1, 3], vec![2, -2]]);
    /// assert_eq!(cnf.len(), 2); // the tautology is dropped
    /// assert_eq!(cnf.variables(), vec![1, 2, 3]);
    /// ```
    pub fn from_dimacs(clauses: &[Vec<i32>]) -> Self {
        let mut cnf = Self::new();
        for clause in clauses {
            cnf.add_clause(clause.iter().map(|&l| Literal::from_i32(l)));
        }
        cnf
    }

    /// Adds a clause. Returns false if it was a tautology and got dropped.
    pub fn add_clause(&mut self, literals: impl IntoIterator<Item = Literal>) -> bool {
        match normalize_clause(literals) {
            Some(clause) => {
                self.clauses.push(clause);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns true if some clause is empty.
    pub fn has_empty_clause(&self) -> bool {
        self.clauses.iter().any(Vec::is_empty)
    }

    /// Variables occurring in the clauses, ascending.
    pub fn variables(&self) -> Vec<u32> {
        let vars: BTreeSet<u32> = self.clauses.iter().flatten().map(|lit| lit.var()).collect();
        vars.into_iter().collect()
    }

    /// Largest variable index, 0 for a formula without variables.
    pub fn max_var(&self) -> u32 {
        self.clauses.iter().flatten().map(|lit| lit.var()).max().unwrap_or(0)
    }

    /// Number of clauses each variable occurs in, indexed by variable.
    pub fn occurrences(&self) -> Vec<usize> {
        let mut counts = vec![0; self.max_var() as usize + 1];
        for clause in &self.clauses {
            for lit in clause {
                counts[lit.var() as usize] += 1;
            }
        }
        counts
    }

    /// Evaluates the formula under a total assignment (`values[var]`).
    pub fn evaluate(&self, values: &[bool]) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.iter().any(|lit| values[lit.var() as usize] == lit.is_positive()))
    }
}

impl FromIterator<Vec<Literal>> for Cnf {
    fn from_iter<I: IntoIterator<Item = Vec<Literal>>>(iter: I) -> Self {
        let mut cnf = Cnf::new();
        for clause in iter {
            cnf.add_clause(clause);
        }
        cnf
    }
}

impl Display for Cnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "⊤");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " ∧ ")?;
            }
            if clause.is_empty() {
                write!(f, "⊥")?;
                continue;
            }
            write!(f, "(")?;
            for (j, lit) in clause.iter().enumerate() {
                if j > 0 {
                    write!(f, " ∨ ")?;
                }
                write!(f, "{}", lit)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Sorts and deduplicates a clause; `None` for a tautology.
pub(crate) fn normalize_clause(literals: impl IntoIterator<Item = Literal>) -> Option<Vec<Literal>> {
    let mut clause: Vec<Literal> = literals.into_iter().collect();
    clause.sort_by_key(|lit| (lit.var(), lit.is_negative()));
    clause.dedup();
    if clause.windows(2).any(|w| w[0].var() == w[1].var()) {
        return None;
    }
    Some(clause)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_normalization() {
        let cnf = Cnf::from_dimacs(&[vec![3, -1, 3], vec![1, -1], vec![]]);
        assert_eq!(cnf.len(), 2);
        assert_eq!(cnf.clauses()[0], vec![Literal::negative(1), Literal::positive(3)]);
        assert!(cnf.has_empty_clause());
        assert_eq!(cnf.variables(), vec![1, 3]);
    }

    #[test]
    fn test_occurrences_and_evaluate() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![-1, 3]]);
        assert_eq!(cnf.occurrences(), vec![0, 2, 1, 1]);
        assert!(cnf.evaluate(&[false, true, false, true]));
        assert!(!cnf.evaluate(&[false, true, false, false]));
        assert_eq!(format!("{}", cnf), "(x1 ∨ x2) ∧ (¬x1 ∨ x3)");
    }
}

//! Minimal Boolean formula type accepted by the compiler entry point.
//!
//! The compiler only reads a formula's [`FormulaType`], its operands and its
//! variables, and requires it to be in conjunctive normal form.

use std::collections::BTreeSet;

use crate::cnf::Cnf;
use crate::literal::Literal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaType {
    True,
    False,
    Literal,
    Not,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    Constant(bool),
    Literal(Literal),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl Formula {
    pub fn lit(lit: i32) -> Self {
        Formula::Literal(Literal::from_i32(lit))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(f: Formula) -> Self {
        Formula::Not(Box::new(f))
    }

    pub fn and(operands: impl IntoIterator<Item = Formula>) -> Self {
        Formula::And(operands.into_iter().collect())
    }

    pub fn or(operands: impl IntoIterator<Item = Formula>) -> Self {
        Formula::Or(operands.into_iter().collect())
    }

    /// Formula in CNF built from DIMACS-style clauses.
    ///
    /// ```
    /// use sdd_compiler::formula::Formula;
    ///
    /// let f = Formula::from_clauses(&[vec![1, 2], vec![-1, 3]]);
    /// assert!(f.is_cnf());
    /// assert_eq!(f.variables().len(), 3);
    /// ```
    pub fn from_clauses(clauses: &[Vec<i32>]) -> Self {
        Formula::And(clauses.iter().map(|c| Formula::Or(c.iter().map(|&l| Formula::lit(l)).collect())).collect())
    }

    pub fn formula_type(&self) -> FormulaType {
        match self {
            Formula::Constant(true) => FormulaType::True,
            Formula::Constant(false) => FormulaType::False,
            Formula::Literal(_) => FormulaType::Literal,
            Formula::Not(_) => FormulaType::Not,
            Formula::And(_) => FormulaType::And,
            Formula::Or(_) => FormulaType::Or,
        }
    }

    pub fn operands(&self) -> &[Formula] {
        match self {
            Formula::Not(inner) => std::slice::from_ref(inner.as_ref()),
            Formula::And(ops) | Formula::Or(ops) => ops,
            Formula::Constant(_) | Formula::Literal(_) => &[],
        }
    }

    pub fn variables(&self) -> BTreeSet<u32> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<u32>) {
        match self {
            Formula::Literal(lit) => {
                vars.insert(lit.var());
            }
            _ => {
                for op in self.operands() {
                    op.collect_variables(vars);
                }
            }
        }
    }

    /// Returns true if the formula is a conjunction of clauses.
    ///
    /// Constants, single literals and single clauses count as CNF.
    pub fn is_cnf(&self) -> bool {
        match self {
            Formula::And(ops) => ops.iter().all(Formula::is_clause),
            _ => self.is_clause(),
        }
    }

    fn is_clause(&self) -> bool {
        match self {
            Formula::Constant(_) | Formula::Literal(_) => true,
            Formula::Or(ops) => ops.iter().all(|op| matches!(op, Formula::Literal(_) | Formula::Constant(_))),
            _ => false,
        }
    }

    /// Clause set of a CNF formula; `None` if the formula is not in CNF.
    pub fn to_cnf(&self) -> Option<Cnf> {
        if !self.is_cnf() {
            return None;
        }
        let mut cnf = Cnf::new();
        match self {
            Formula::And(ops) => {
                for op in ops {
                    add_clause(&mut cnf, op);
                }
            }
            _ => add_clause(&mut cnf, self),
        }
        Some(cnf)
    }
}

fn add_clause(cnf: &mut Cnf, clause: &Formula) {
    match clause {
        Formula::Constant(true) => {}
        Formula::Constant(false) => {
            cnf.add_clause(std::iter::empty::<Literal>());
        }
        Formula::Literal(lit) => {
            cnf.add_clause([*lit]);
        }
        Formula::Or(ops) => {
            if ops.contains(&Formula::Constant(true)) {
                return;
            }
            cnf.add_clause(ops.iter().filter_map(|op| match op {
                Formula::Literal(lit) => Some(*lit),
                _ => None,
            }));
        }
        _ => unreachable!("checked by is_cnf"),
    }
}

impl From<&Cnf> for Formula {
    fn from(cnf: &Cnf) -> Self {
        Formula::And(
            cnf.clauses()
                .iter()
                .map(|c| Formula::Or(c.iter().copied().map(Formula::Literal).collect()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_cnf_detection() {
        let cnf = Formula::from_clauses(&[vec![1, -2], vec![3]]);
        assert!(cnf.is_cnf());
        assert_eq!(cnf.formula_type(), FormulaType::And);
        assert_eq!(cnf.operands().len(), 2);

        let nested = Formula::and([Formula::lit(1), Formula::or([Formula::and([Formula::lit(2), Formula::lit(3)])])]);
        assert!(!nested.is_cnf());
        assert!(nested.to_cnf().is_none());

        let negation = Formula::not(Formula::lit(1));
        assert!(!negation.is_cnf());
        assert_eq!(negation.variables(), BTreeSet::from([1]));
    }

    #[test]
    fn test_to_cnf_constants() {
        assert!(Formula::Constant(true).to_cnf().unwrap().is_empty());
        assert!(Formula::Constant(false).to_cnf().unwrap().has_empty_clause());
        let f = Formula::and([Formula::or([Formula::lit(1), Formula::Constant(false)]), Formula::Constant(true)]);
        let cnf = f.to_cnf().unwrap();
        assert_eq!(cnf.clauses(), &[vec![Literal::positive(1)]]);
    }

    #[test]
    fn test_round_trip_through_cnf() {
        let cnf = Cnf::from_dimacs(&[vec![1, 2], vec![-2, 3]]);
        let f = Formula::from(&cnf);
        assert_eq!(f.to_cnf().unwrap(), cnf);
    }
}

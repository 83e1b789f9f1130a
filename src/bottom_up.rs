//! Bottom-up SDD compilation: one clause at a time with apply.

use log::debug;

use crate::cnf::Cnf;
use crate::factory::SddFactory;
use crate::literal::Literal;
use crate::sdd::SddId;

/// Compiles `cnf` over the active vtree of `factory`.
///
/// Clauses are conjoined in order of the vtree position of the lowest common
/// ancestor of their variables, so clauses living in the same part of the
/// vtree are combined first.
///
/// # Panics
///
/// Panics if a variable of `cnf` is not part of the active vtree.
pub fn compile_bottom_up(factory: &mut SddFactory, cnf: &Cnf) -> SddId {
    if cnf.has_empty_clause() {
        return SddId::FALSE;
    }

    let mut ordered: Vec<(u32, &[Literal])> = cnf
        .clauses()
        .iter()
        .map(|clause| (clause_position(factory, clause), clause.as_slice()))
        .collect();
    ordered.sort_by_key(|(position, _)| *position);

    let mut result = SddId::TRUE;
    for (_, clause) in ordered {
        let c = factory.clause(clause);
        result = factory.conjoin(result, c);
        if result.is_false() {
            break;
        }
    }
    debug!("bottom-up: {} clauses, result size {}", cnf.len(), factory.sdd_size(result));
    result
}

fn clause_position(factory: &SddFactory, clause: &[Literal]) -> u32 {
    let root = factory.root();
    let lca = clause
        .iter()
        .map(|lit| root.var_leaf(lit.var()))
        .reduce(|a, b| root.lca(a, b))
        .expect("clause is not empty");
    root.position(lca)
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use test_log::test;

    use super::*;

    #[test]
    fn test_trivial_inputs() {
        let mut factory = SddFactory::balanced(2);
        assert_eq!(compile_bottom_up(&mut factory, &Cnf::new()), SddId::TRUE);
        let unsat = Cnf::from_dimacs(&[vec![1], vec![]]);
        assert_eq!(compile_bottom_up(&mut factory, &unsat), SddId::FALSE);
        let contradiction = Cnf::from_dimacs(&[vec![1], vec![-1]]);
        assert_eq!(compile_bottom_up(&mut factory, &contradiction), SddId::FALSE);
    }

    #[test]
    fn test_clause_order_does_not_matter() {
        let mut factory = SddFactory::balanced(4);
        let a = compile_bottom_up(&mut factory, &Cnf::from_dimacs(&[vec![1, 2], vec![-2, 3], vec![3, 4]]));
        let b = compile_bottom_up(&mut factory, &Cnf::from_dimacs(&[vec![4, 3], vec![2, 1], vec![3, -2]]));
        assert_eq!(a, b);
        assert_eq!(factory.model_count(a), BigUint::from(7u32));
    }

    #[test]
    #[should_panic(expected = "not part of the vtree")]
    fn test_unknown_variable_panics() {
        let mut factory = SddFactory::balanced(2);
        compile_bottom_up(&mut factory, &Cnf::from_dimacs(&[vec![1, 3]]));
    }
}

//! Queries over compiled SDDs: counting, enumeration, evaluation and size.

use std::collections::{BTreeSet, HashMap, HashSet};

use num_bigint::BigUint;

use crate::factory::SddFactory;
use crate::literal::Literal;
use crate::sdd::{Sdd, SddId};
use crate::vtree::VtreeId;

impl SddFactory {
    /// Number of models of `f` over the variables of the active vtree.
    ///
    /// ```
    /// use sdd_compiler::factory::SddFactory;
    ///
    /// let mut factory = SddFactory::balanced(3);
    /// let x = factory.var(1);
    /// let y = factory.var(2);
    /// let f = factory.disjoin(x, y);
    /// assert_eq!(factory.model_count(f), 6u32.into());
    /// ```
    pub fn model_count(&self, f: SddId) -> BigUint {
        let Some(root) = self.active_vtree() else {
            return if f.is_true() { BigUint::from(1u32) } else { BigUint::ZERO };
        };
        let mut cache = HashMap::new();
        self.count_at(f, root.root(), &mut cache)
    }

    /// Number of models of `f` over the variable set `vars`.
    ///
    /// # Panics
    ///
    /// Panics if `f` depends on a variable outside `vars`.
    pub fn model_count_over(&self, f: SddId, vars: &[u32]) -> BigUint {
        let target: BTreeSet<u32> = vars.iter().copied().collect();
        let support = self.variables(f);
        if let Some(v) = support.iter().find(|v| !target.contains(v)) {
            panic!("Node {} depends on variable {} outside the counted set", f, v);
        }
        let active: BTreeSet<u32> = self.active_vtree().map(|r| r.variables().into_iter().collect()).unwrap_or_default();
        let excluded = active.difference(&target).count();
        let extra = target.difference(&active).count();
        (self.model_count(f) >> excluded) << extra
    }

    /// Count of `f` over the variables below `t`; `f` is ⊥, ⊤, or normalized
    /// for a node in the subtree of `t`.
    fn count_at(&self, f: SddId, t: VtreeId, cache: &mut HashMap<SddId, BigUint>) -> BigUint {
        let root = self.root();
        let total = root.num_vars_under(t);
        match self.node(f) {
            Sdd::False => BigUint::ZERO,
            Sdd::True => BigUint::from(1u32) << total,
            node => {
                let v = node.vtree().expect("non-constant node");
                let gap = total - root.num_vars_under(v);
                self.count_exact(f, cache) << gap
            }
        }
    }

    fn count_exact(&self, f: SddId, cache: &mut HashMap<SddId, BigUint>) -> BigUint {
        if let Some(count) = cache.get(&f) {
            return count.clone();
        }
        let count = match self.node(f) {
            Sdd::False => BigUint::ZERO,
            Sdd::True => BigUint::from(1u32),
            Sdd::Literal { .. } => BigUint::from(1u32),
            Sdd::Decomposition { vtree, elements } => {
                let (left, right) = (self.vtree.left(*vtree), self.vtree.right(*vtree));
                let mut sum = BigUint::ZERO;
                for e in elements {
                    let p = self.count_at(e.prime, left, cache);
                    let s = self.count_at(e.sub, right, cache);
                    sum += p * s;
                }
                sum
            }
        };
        cache.insert(f, count.clone());
        count
    }

    /// All models of `f` as full assignments over the active vtree variables.
    ///
    /// Each model is sorted by variable; the list is sorted lexicographically.
    pub fn models(&self, f: SddId) -> Vec<Vec<Literal>> {
        let Some(root) = self.active_vtree() else {
            return if f.is_true() { vec![Vec::new()] } else { Vec::new() };
        };
        let mut models = self.models_at(f, root.root());
        for m in &mut models {
            m.sort_by_key(|lit| lit.var());
        }
        models.sort();
        models
    }

    fn models_at(&self, f: SddId, t: VtreeId) -> Vec<Vec<Literal>> {
        match self.node(f) {
            Sdd::False => Vec::new(),
            Sdd::True => all_assignments(&self.vtree.variables_under(t)),
            node => {
                let v = node.vtree().expect("non-constant node");
                let own = self.models_exact(f);
                if v == t {
                    return own;
                }
                let own_vars = self.vtree.variable_set(v);
                let rest: Vec<u32> = self.vtree.variables_under(t).into_iter().filter(|x| !own_vars.contains(x)).collect();
                cross(&own, &all_assignments(&rest))
            }
        }
    }

    fn models_exact(&self, f: SddId) -> Vec<Vec<Literal>> {
        match self.node(f) {
            Sdd::Literal { literal, .. } => vec![vec![*literal]],
            Sdd::Decomposition { vtree, elements } => {
                let (left, right) = (self.vtree.left(*vtree), self.vtree.right(*vtree));
                let mut result = Vec::new();
                for e in elements {
                    let primes = self.models_at(e.prime, left);
                    let subs = self.models_at(e.sub, right);
                    result.extend(cross(&primes, &subs));
                }
                result
            }
            Sdd::False | Sdd::True => unreachable!("constants are handled by models_at"),
        }
    }

    /// Evaluates `f` under a (partial) assignment given as true literals.
    ///
    /// # Panics
    ///
    /// Panics if evaluation reaches a variable the assignment does not mention.
    pub fn evaluate(&self, f: SddId, assignment: &[Literal]) -> bool {
        let values: HashMap<u32, bool> = assignment.iter().map(|lit| (lit.var(), lit.is_positive())).collect();
        self.evaluate_with(f, &values)
    }

    fn evaluate_with(&self, f: SddId, values: &HashMap<u32, bool>) -> bool {
        match self.node(f) {
            Sdd::False => false,
            Sdd::True => true,
            Sdd::Literal { literal, .. } => match values.get(&literal.var()) {
                Some(&value) => value == literal.is_positive(),
                None => panic!("Variable {} is not assigned", literal.var()),
            },
            Sdd::Decomposition { elements, .. } => {
                for e in elements {
                    if self.evaluate_with(e.prime, values) {
                        return self.evaluate_with(e.sub, values);
                    }
                }
                unreachable!("primes of {} do not cover the assignment", f)
            }
        }
    }

    /// Number of distinct decomposition nodes reachable from `f`.
    pub fn size(&self, f: SddId) -> usize {
        self.decompositions(&[f]).len()
    }

    /// Total number of elements over the distinct decomposition nodes of `f`.
    pub fn sdd_size(&self, f: SddId) -> usize {
        self.sdd_size_all(&[f])
    }

    /// Shared [`sdd_size`](Self::sdd_size) of several roots.
    pub fn sdd_size_all(&self, roots: &[SddId]) -> usize {
        self.decompositions(roots).iter().map(|&id| self.node(id).size()).sum()
    }

    fn decompositions(&self, roots: &[SddId]) -> HashSet<SddId> {
        let mut visited = HashSet::new();
        let mut stack: Vec<SddId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if let Some(elements) = self.node(id).elements() {
                if visited.insert(id) {
                    for e in elements {
                        stack.push(e.prime);
                        stack.push(e.sub);
                    }
                }
            }
        }
        visited
    }

    /// Variables `f` depends on.
    pub fn variables(&self, f: SddId) -> BTreeSet<u32> {
        let mut vars = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![f];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            match self.node(id) {
                Sdd::False | Sdd::True => {}
                Sdd::Literal { literal, .. } => {
                    vars.insert(literal.var());
                }
                Sdd::Decomposition { elements, .. } => {
                    for e in elements {
                        stack.push(e.prime);
                        stack.push(e.sub);
                    }
                }
            }
        }
        vars
    }

    /// Some satisfying partial assignment of `f`, or `None` if `f` is ⊥.
    pub fn any_sat(&self, f: SddId) -> Option<Vec<Literal>> {
        if f.is_false() {
            return None;
        }
        let mut result = Vec::new();
        let mut stack = vec![f];
        while let Some(id) = stack.pop() {
            match self.node(id) {
                Sdd::False => unreachable!("trimmed nodes never lead to ⊥ here"),
                Sdd::True => {}
                Sdd::Literal { literal, .. } => result.push(*literal),
                Sdd::Decomposition { elements, .. } => {
                    let e = elements.iter().find(|e| !e.sub.is_false()).expect("consistent node has a non-false sub");
                    stack.push(e.prime);
                    stack.push(e.sub);
                }
            }
        }
        result.sort_by_key(|lit| lit.var());
        Some(result)
    }
}

fn all_assignments(vars: &[u32]) -> Vec<Vec<Literal>> {
    let mut result = vec![Vec::new()];
    for &var in vars {
        let mut next = Vec::with_capacity(result.len() * 2);
        for partial in &result {
            for positive in [false, true] {
                let mut m: Vec<Literal> = partial.clone();
                m.push(Literal::new(var, positive));
                next.push(m);
            }
        }
        result = next;
    }
    result
}

fn cross(a: &[Vec<Literal>], b: &[Vec<Literal>]) -> Vec<Vec<Literal>> {
    let mut result = Vec::with_capacity(a.len() * b.len());
    for x in a {
        for y in b {
            let mut m = x.clone();
            m.extend_from_slice(y);
            result.push(m);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn lit(x: i32) -> Literal {
        Literal::from_i32(x)
    }

    #[test]
    fn test_model_count_constants() {
        let factory = SddFactory::balanced(3);
        assert_eq!(factory.model_count(SddId::TRUE), BigUint::from(8u32));
        assert_eq!(factory.model_count(SddId::FALSE), BigUint::ZERO);
        let empty = SddFactory::new();
        assert_eq!(empty.model_count(SddId::TRUE), BigUint::from(1u32));
    }

    #[test]
    fn test_model_count_with_gaps() {
        let mut factory = SddFactory::balanced(4);
        let x1 = factory.var(1);
        assert_eq!(factory.model_count(x1), BigUint::from(8u32));
        let f = factory.clause(&[lit(1), lit(4)]);
        assert_eq!(factory.model_count(f), BigUint::from(12u32));
        assert_eq!(factory.model_count_over(f, &[1, 4]), BigUint::from(3u32));
        assert_eq!(factory.model_count_over(f, &[1, 4, 7]), BigUint::from(6u32));
    }

    #[test]
    #[should_panic(expected = "outside the counted set")]
    fn test_model_count_over_rejects_support() {
        let mut factory = SddFactory::balanced(2);
        let f = factory.cube(&[lit(1), lit(2)]);
        factory.model_count_over(f, &[1]);
    }

    #[test]
    fn test_models_and_evaluate() {
        let mut factory = SddFactory::right_linear(3);
        let c1 = factory.clause(&[lit(1), lit(2)]);
        let c2 = factory.clause(&[lit(-1), lit(3)]);
        let f = factory.conjoin(c1, c2);
        let models = factory.models(f);
        assert_eq!(models.len(), 4);
        for m in &models {
            assert!(factory.evaluate(f, m));
        }
        assert!(!factory.evaluate(f, &[lit(1), lit(2), lit(-3)]));
        assert!(models.contains(&vec![lit(-1), lit(2), lit(-3)]));
    }

    #[test]
    fn test_size_and_support() {
        let mut factory = SddFactory::balanced(4);
        let f = factory.cube(&[lit(1), lit(3)]);
        assert_eq!(factory.variables(f), BTreeSet::from([1, 3]));
        assert_eq!(factory.size(f), 1);
        assert_eq!(factory.sdd_size(f), 2);
        assert_eq!(factory.size(SddId::TRUE), 0);
        let x = factory.var(2);
        assert_eq!(factory.sdd_size_all(&[f, x]), 2);
    }

    #[test]
    fn test_any_sat() {
        let mut factory = SddFactory::balanced(4);
        assert_eq!(factory.any_sat(SddId::FALSE), None);
        assert_eq!(factory.any_sat(SddId::TRUE), Some(vec![]));
        let c = factory.clause(&[lit(-2), lit(3)]);
        let g = factory.cube(&[lit(1), lit(4)]);
        let f = factory.conjoin(c, g);
        let mut sat = factory.any_sat(f).unwrap();
        assert!(sat.contains(&lit(1)) && sat.contains(&lit(4)));
        for var in 1..=4 {
            if !sat.iter().any(|l| l.var() == var) {
                sat.push(Literal::positive(var));
            }
        }
        assert!(factory.evaluate(f, &sat));
    }
}

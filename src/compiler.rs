//! Compilation of CNF formulas into SDDs.
//!
//! [`compile`] is the entry point: it validates the input, optionally
//! simplifies it, picks a vtree and runs one of the two compilers.
//!
//! ```
//! use sdd_compiler::compiler::{compile, CompilerConfig};
//! use sdd_compiler::formula::Formula;
//!
//! // (x1 ∨ x2) ∧ (¬x1 ∨ x3)
//! let formula = Formula::from_clauses(&[vec![1, 2], vec![-1, 3]]);
//! let compilation = compile(&formula, &CompilerConfig::default()).unwrap();
//! assert_eq!(compilation.factory().model_count(compilation.node()), num_bigint::BigUint::from(4u32));
//! ```

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info};

use crate::annotation::VtreeAnnotation;
use crate::bottom_up::compile_bottom_up;
use crate::cnf::Cnf;
pub use crate::decision_vtree::Prioritization;
use crate::decision_vtree::generate_decision_vtree;
use crate::dtree::DTree;
use crate::factory::SddFactory;
use crate::formula::Formula;
use crate::handler::{check, Cancellation, ComputationEvent, ComputationHandler, NopHandler};
use crate::sdd::SddId;
use crate::sdd_solver::SddSatSolver;
use crate::simplify::simplify;
use crate::top_down::TopDownCompiler;

/// Compilation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompilerKind {
    /// Solver-driven compilation over a generated decision vtree.
    #[default]
    TopDown,
    /// Clause-by-clause conjunction with apply.
    BottomUp,
}

/// Options of [`compile`].
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    /// Run backbone simplification and subsumption first.
    pub simplify: bool,
    /// Variable order inside the cutsets of the decision vtree.
    pub prioritization: Prioritization,
    pub compiler: CompilerKind,
    /// Variables to keep; the others are existentially quantified.
    /// `None` keeps all of them.
    pub variables: Option<Vec<u32>>,
}

impl CompilerConfig {
    pub fn with_simplify(mut self, simplify: bool) -> Self {
        self.simplify = simplify;
        self
    }

    pub fn with_prioritization(mut self, prioritization: Prioritization) -> Self {
        self.prioritization = prioritization;
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerKind) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_variables(mut self, variables: impl IntoIterator<Item = u32>) -> Self {
        self.variables = Some(variables.into_iter().collect());
        self
    }
}

/// Error type for [`compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The input formula is not in conjunctive normal form.
    NotCnf,
    /// The supplied vtree lacks these variables of the formula.
    MissingVariables(Vec<u32>),
    /// Top-down compilation needs a generated vtree and cannot run on a supplied factory.
    TopDownWithSuppliedFactory,
    /// The handler canceled the compilation.
    Canceled(Cancellation),
}

impl From<Cancellation> for CompileError {
    fn from(c: Cancellation) -> Self {
        CompileError::Canceled(c)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::NotCnf => write!(f, "formula is not in CNF"),
            CompileError::MissingVariables(vars) => {
                write!(f, "vtree is missing variables: ")?;
                for (i, v) in vars.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "x{}", v)?;
                }
                Ok(())
            }
            CompileError::TopDownWithSuppliedFactory => {
                write!(f, "top-down compilation cannot use a supplied factory")
            }
            CompileError::Canceled(c) => write!(f, "{}", c),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Canceled(c) => Some(c),
            _ => None,
        }
    }
}

/// A compiled node together with the factory owning it.
#[derive(Debug)]
pub struct Compilation {
    node: SddId,
    factory: SddFactory,
}

impl Compilation {
    #[inline]
    pub fn node(&self) -> SddId {
        self.node
    }

    #[inline]
    pub fn factory(&self) -> &SddFactory {
        &self.factory
    }

    #[inline]
    pub fn factory_mut(&mut self) -> &mut SddFactory {
        &mut self.factory
    }

    pub fn into_parts(self) -> (SddId, SddFactory) {
        (self.node, self.factory)
    }
}

/// Compiles `formula` with a fresh factory and no cancellation.
pub fn compile(formula: &Formula, config: &CompilerConfig) -> Result<Compilation, CompileError> {
    compile_with(formula, config, None, &mut NopHandler)
}

/// Compiles `formula`, polling `handler` for cancellation.
///
/// With `factory` given, the formula is compiled bottom-up over its active
/// vtree, which must contain every variable of the formula. Otherwise a
/// fresh factory is created whose vtree covers the variables of the input
/// formula (and the target variables), including those that
/// simplification removes.
///
/// The result node is pinned in the active vtree of the returned factory.
pub fn compile_with(
    formula: &Formula,
    config: &CompilerConfig,
    factory: Option<SddFactory>,
    handler: &mut dyn ComputationHandler,
) -> Result<Compilation, CompileError> {
    let input = formula.to_cnf().ok_or(CompileError::NotCnf)?;

    let mut all_vars: BTreeSet<u32> = formula.variables();
    if let Some(targets) = &config.variables {
        all_vars.extend(targets.iter().copied());
    }
    let all_vars: Vec<u32> = all_vars.into_iter().collect();
    let targets: Vec<u32> = match &config.variables {
        Some(targets) => targets.iter().copied().collect::<BTreeSet<_>>().into_iter().collect(),
        None => all_vars.clone(),
    };

    let cnf = if config.simplify {
        let simplified = simplify(&input);
        info!("simplified: {} clauses -> {} clauses", input.len(), simplified.len());
        simplified
    } else {
        input
    };
    info!("compiling {} clauses over {} variables ({:?})", cnf.len(), all_vars.len(), config.compiler);

    let (node, mut factory) = match factory {
        Some(_) if config.compiler == CompilerKind::TopDown => {
            return Err(CompileError::TopDownWithSuppliedFactory);
        }
        Some(factory) => compile_supplied(factory, &cnf, &all_vars, &targets, handler)?,
        None => compile_fresh(&cnf, &all_vars, &targets, config, handler)?,
    };

    if factory.active_vtree().is_some() {
        factory.pin(node);
    }
    info!("result: {} nodes, size {}", factory.size(node), factory.sdd_size(node));
    Ok(Compilation { node, factory })
}

fn compile_supplied(
    mut factory: SddFactory,
    cnf: &Cnf,
    all_vars: &[u32],
    targets: &[u32],
    handler: &mut dyn ComputationHandler,
) -> Result<(SddId, SddFactory), CompileError> {
    let available: BTreeSet<u32> = factory.active_vtree().map(|root| root.variables()).unwrap_or_default().into_iter().collect();
    let missing: Vec<u32> = all_vars.iter().copied().filter(|v| !available.contains(v)).collect();
    if !missing.is_empty() {
        return Err(CompileError::MissingVariables(missing));
    }

    check(handler, ComputationEvent::SddComputationStarted)?;
    let node = compile_bottom_up(&mut factory, cnf);
    let node = project(&mut factory, node, all_vars, targets);
    Ok((node, factory))
}

fn compile_fresh(
    cnf: &Cnf,
    all_vars: &[u32],
    targets: &[u32],
    config: &CompilerConfig,
    handler: &mut dyn ComputationHandler,
) -> Result<(SddId, SddFactory), CompileError> {
    let mut factory = SddFactory::new();

    if cnf.has_empty_clause() || cnf.is_empty() || config.compiler == CompilerKind::BottomUp {
        check(handler, ComputationEvent::SddComputationStarted)?;
        install_balanced(&mut factory, all_vars);
        let node = if cnf.has_empty_clause() {
            SddId::FALSE
        } else if cnf.is_empty() {
            SddId::TRUE
        } else {
            let node = compile_bottom_up(&mut factory, cnf);
            project(&mut factory, node, all_vars, targets)
        };
        return Ok((node, factory));
    }

    let num_vars = all_vars.last().copied().unwrap_or(0);
    let mut solver = SddSatSolver::with_cnf(cnf, num_vars);
    if !solver.sat() {
        debug!("formula is unsatisfiable");
        check(handler, ComputationEvent::SddComputationStarted)?;
        install_balanced(&mut factory, all_vars);
        return Ok((SddId::FALSE, factory));
    }

    let dtree = DTree::new(cnf);
    let root = generate_decision_vtree(factory.vtree_mut(), dtree.as_ref(), cnf, config.prioritization, all_vars);
    let Some(root) = root else {
        return Ok((SddId::TRUE, factory));
    };
    factory.install_vtree(root);
    info!("decision vtree: {} nodes", factory.root().num_nodes());

    let annotation = VtreeAnnotation::new(factory.vtree(), root, cnf);
    solver.init_clause_masks(&annotation);

    let mut compiler = TopDownCompiler::new(&mut factory, &mut solver, &annotation, targets.iter().copied(), handler);
    let node = compiler.compile()?;
    let stats = compiler.stats();
    info!(
        "top-down: {} Shannon expansions, {} cache entries, {} cache hits",
        stats.shannon_expansions, stats.cache_entries, stats.cache_hits
    );
    Ok((node, factory))
}

fn install_balanced(factory: &mut SddFactory, vars: &[u32]) {
    if !vars.is_empty() {
        let root = factory.vtree_mut().balanced(vars);
        factory.install_vtree(root);
    }
}

/// Existentially quantifies the variables of `all_vars` outside `targets`.
fn project(factory: &mut SddFactory, mut node: SddId, all_vars: &[u32], targets: &[u32]) -> SddId {
    for &var in all_vars {
        if targets.binary_search(&var).is_err() {
            node = factory.exists(node, var);
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use test_log::test;

    use super::*;
    use crate::handler::ShannonExpansionLimit;

    fn count(c: &Compilation) -> BigUint {
        c.factory().model_count(c.node())
    }

    #[test]
    fn test_compile_default() {
        let formula = Formula::from_clauses(&[vec![1, 2], vec![-1, 3]]);
        let c = compile(&formula, &CompilerConfig::default()).unwrap();
        assert_eq!(count(&c), BigUint::from(4u32));
        assert_eq!(c.factory().pinned_nodes(), vec![c.node()]);
    }

    #[test]
    fn test_not_cnf() {
        let formula = Formula::or([Formula::and([Formula::lit(1), Formula::lit(2)]), Formula::lit(3)]);
        let err = compile(&formula, &CompilerConfig::default()).unwrap_err();
        assert_eq!(err, CompileError::NotCnf);
        assert_eq!(err.to_string(), "formula is not in CNF");
    }

    #[test]
    fn test_supplied_factory() {
        let formula = Formula::from_clauses(&[vec![1, 2], vec![-1, 3]]);
        let config = CompilerConfig::default();
        let err = compile_with(&formula, &config, Some(SddFactory::balanced(3)), &mut NopHandler).unwrap_err();
        assert_eq!(err, CompileError::TopDownWithSuppliedFactory);

        let config = config.with_compiler(CompilerKind::BottomUp);
        let err = compile_with(&formula, &config, Some(SddFactory::balanced(2)), &mut NopHandler).unwrap_err();
        assert_eq!(err, CompileError::MissingVariables(vec![3]));
        assert_eq!(err.to_string(), "vtree is missing variables: x3");

        let c = compile_with(&formula, &config, Some(SddFactory::balanced(4)), &mut NopHandler).unwrap();
        // x4 is free in the supplied vtree.
        assert_eq!(count(&c), BigUint::from(8u32));
    }

    #[test]
    fn test_canceled() {
        let formula = Formula::from_clauses(&[vec![1, 2], vec![-1, 3], vec![2, 3, 4]]);
        let mut handler = ShannonExpansionLimit::new(0);
        let err = compile_with(&formula, &CompilerConfig::default(), None, &mut handler).unwrap_err();
        assert_eq!(err, CompileError::Canceled(Cancellation { event: ComputationEvent::SddShannonExpansion }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_builders() {
        let config = CompilerConfig::default()
            .with_simplify(true)
            .with_prioritization(Prioritization::VarCount)
            .with_compiler(CompilerKind::BottomUp)
            .with_variables([3, 1]);
        assert!(config.simplify);
        assert_eq!(config.prioritization, Prioritization::VarCount);
        assert_eq!(config.compiler, CompilerKind::BottomUp);
        assert_eq!(config.variables, Some(vec![3, 1]));
    }
}

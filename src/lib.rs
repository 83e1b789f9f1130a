//! # sdd-compiler: compiling CNF formulas into Sentential Decision Diagrams
//!
//! **`sdd-compiler`** turns a Boolean formula in conjunctive normal form into a **Sentential Decision Diagram (SDD)**,
//! a canonical circuit that supports polynomial-time model counting, model enumeration and logical operations.
//!
//! ## What is an SDD?
//!
//! An SDD is defined relative to a *vtree*: a full binary tree whose leaves are the variables.
//! At a vtree node `v`, a function is written as a set of elements `(p₁, s₁), ..., (pₙ, sₙ)` where the *primes* `pᵢ`
//! range over the variables left of `v`, are pairwise exclusive and jointly exhaustive, and the *subs* `sᵢ` range over
//! the variables right of `v`. With *compressed* (distinct subs) and *trimmed* partitions, every function has exactly one
//! SDD for a fixed vtree, so equivalence is pointer equality.
//!
//! ## Key Features
//!
//! - **Factory-Centric Architecture**: All nodes live in an [`SddFactory`][crate::factory::SddFactory], which hash-conses
//!   them by `(vtree node, elements)` and owns the vtree together with a stack of installed vtree versions.
//! - **Top-down compilation**: [`TopDownCompiler`][crate::top_down::TopDownCompiler] walks a decision vtree generated from a
//!   decomposition tree of the clauses, using an incremental CDCL solver as the compilation context and a two-level cache
//!   keyed by implied literals and subsumed clauses.
//! - **Bottom-up compilation**: [`compile_bottom_up`][crate::bottom_up::compile_bottom_up] conjoins clause SDDs with apply over
//!   any installed vtree.
//! - **Cooperative cancellation**: a [`ComputationHandler`][crate::handler::ComputationHandler] is polled before every
//!   Shannon expansion.
//! - **1-Based Indexing**: Variables are 1-indexed, as in DIMACS.
//!
//! ## Basic Usage
//!
//! ```rust
//! use num_bigint::BigUint;
//! use sdd_compiler::compiler::{compile, CompilerConfig};
//! use sdd_compiler::formula::Formula;
//!
//! // 1. Build a CNF: (x1 ∨ x2) ∧ (¬x1 ∨ x3)
//! let formula = Formula::from_clauses(&[vec![1, 2], vec![-1, 3]]);
//!
//! // 2. Compile it top-down (the default)
//! let compilation = compile(&formula, &CompilerConfig::default()).unwrap();
//! let (f, mut factory) = compilation.into_parts();
//!
//! // 3. Query the result
//! assert_eq!(factory.model_count(f), BigUint::from(4u32));
//!
//! // 4. Keep working with the factory: f ∧ ¬x3 forces ¬x1 and x2
//! let nx3 = factory.neg_var(3);
//! let g = factory.conjoin(f, nx3);
//! assert_eq!(factory.model_count(g), BigUint::from(1u32));
//! ```
//!
//! ## Core Components
//!
//! - **[`compiler`]**: The entry point, [`compile`][crate::compiler::compile], and its configuration.
//! - **[`factory`]**, **[`apply`]**, **[`query`]**: Node construction, boolean operations and queries.
//! - **[`vtree`]**, **[`vtree_root`]**, **[`vtree_stack`]**, **[`vtree_shadow`]**: Vtrees, their installed versions and
//!   tentative edits.
//! - **[`solver`]**, **[`sdd_solver`]**: The incremental CDCL solver and the bookkeeping the top-down compiler needs.
//!
//! For the compilation algorithm itself, check the [`top_down`] module documentation.

pub mod annotation;
pub mod apply;
pub mod bitset;
pub mod bottom_up;
pub mod cnf;
pub mod compiler;
pub mod decision_vtree;
pub mod dtree;
pub mod factory;
pub mod formula;
pub mod handler;
pub mod literal;
pub mod query;
pub mod sdd;
pub mod sdd_solver;
pub mod simplify;
pub mod solver;
pub mod top_down;
pub mod vtree;
pub mod vtree_root;
pub mod vtree_shadow;
pub mod vtree_stack;

use clap::{Parser, ValueEnum};

use sdd_compiler::compiler::{compile, CompilerConfig, CompilerKind, Prioritization};
use sdd_compiler::formula::Formula;
use sdd_compiler::vtree_shadow::minimize;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Problem {
    /// N queens on an NxN board.
    Queens,
    /// N+1 pigeons in N holes (unsatisfiable).
    Pigeons,
    /// N pigeons in N holes (N! solutions).
    Matching,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Compiler {
    TopDown,
    BottomUp,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Problem to encode.
    #[arg(value_enum, default_value = "queens")]
    problem: Problem,

    /// Problem size.
    #[arg(value_name = "INT", default_value = "6")]
    n: usize,

    /// Compilation algorithm.
    #[clap(long, value_enum, default_value = "top-down")]
    compiler: Compiler,

    /// Simplify the CNF before compiling.
    #[clap(long)]
    simplify: bool,

    /// Order cutset variables by occurrence count.
    #[clap(long)]
    var_count: bool,

    /// Rounds of vtree search after compilation.
    #[clap(long, value_name = "INT", default_value = "0")]
    minimize: usize,
}

fn queens(n: usize) -> Vec<Vec<i32>> {
    let var = |i: usize, j: usize| (i * n + j + 1) as i32;
    let mut clauses = Vec::new();

    // At least one queen per row
    for i in 0..n {
        clauses.push((0..n).map(|j| var(i, j)).collect());
    }

    // No two queens attack each other
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                for l in 0..n {
                    if (i, j) >= (k, l) {
                        continue;
                    }
                    let same_row = i == k;
                    let same_col = j == l;
                    let same_diag = i + l == k + j || i + j == k + l;
                    if same_row || same_col || same_diag {
                        clauses.push(vec![-var(i, j), -var(k, l)]);
                    }
                }
            }
        }
    }
    clauses
}

fn pigeons(pigeons: usize, holes: usize) -> Vec<Vec<i32>> {
    let var = |p: usize, h: usize| (p * holes + h + 1) as i32;
    let mut clauses = Vec::new();

    // Every pigeon sits in some hole
    for p in 0..pigeons {
        clauses.push((0..holes).map(|h| var(p, h)).collect());
    }

    // No hole holds two pigeons
    for h in 0..holes {
        for p in 0..pigeons {
            for q in p + 1..pigeons {
                clauses.push(vec![-var(p, h), -var(q, h)]);
            }
        }
    }
    clauses
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let clauses = match args.problem {
        Problem::Queens => queens(args.n),
        Problem::Pigeons => pigeons(args.n + 1, args.n),
        Problem::Matching => pigeons(args.n, args.n),
    };
    println!("Encoded {:?} with n = {}: {} clauses", args.problem, args.n, clauses.len());
    let formula = Formula::from_clauses(&clauses);

    let config = CompilerConfig::default()
        .with_simplify(args.simplify)
        .with_prioritization(if args.var_count { Prioritization::VarCount } else { Prioritization::None })
        .with_compiler(match args.compiler {
            Compiler::TopDown => CompilerKind::TopDown,
            Compiler::BottomUp => CompilerKind::BottomUp,
        });

    let time_compile = std::time::Instant::now();
    let (mut f, mut factory) = compile(&formula, &config)?.into_parts();
    println!("Compiled in {:.3} s", time_compile.elapsed().as_secs_f64());
    println!("factory = {:?}", factory);
    println!("stats: {}", factory.stats());

    if args.minimize > 0 && factory.active_vtree().is_some() {
        let before = factory.sdd_size(f);
        let mapping = minimize(&mut factory, args.minimize);
        if let Some(&(_, g)) = mapping.iter().find(|(old, _)| *old == f) {
            f = g;
        }
        println!("Vtree search: size {} -> {}", before, factory.sdd_size(f));
    }

    println!("res: {} nodes, size {}", factory.size(f), factory.sdd_size(f));
    println!("model count: {}", factory.model_count(f));

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}

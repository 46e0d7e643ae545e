use clap::Parser;
use milopt::{
    cfg::{build_cfgs, to_dot},
    commandline::{Operation, Options},
    eval,
    mil::Program,
    opt::{optimise, NullObserver, Optimiser, OptimiserOptions, Rewrite, RewriteObserver},
    prelude::*,
    samples,
};

/// Prints rewrites to standard output as they happen.
struct PrintRewrites;
impl RewriteObserver for PrintRewrites {
    fn rewrite(&mut self, rewrite: &Rewrite) {
        match rewrite.defn {
            Some(defn) => println!("{defn}: {}", rewrite.description),
            None => println!("{}", rewrite.description),
        }
    }
}

fn main() -> Result<()> {
    let options = Options::parse();

    stderrlog::new()
        .module("milopt")
        .quiet(options.quiet)
        .verbosity(1 + options.verbose as usize)
        .init()?;

    match options.operation {
        Operation::List => {
            for sample in samples::SAMPLES {
                println!("{:<12} {}", sample.name, sample.description);
            }
        }
        Operation::Show { sample } => print!("{}", samples::build(&sample)?),
        Operation::Optimise {
            sample,
            rewrites,
            optimiser,
        } => {
            let mut program = samples::build(&sample)?;
            let stats = if rewrites {
                optimise(&mut program, &optimiser.options(), &mut PrintRewrites)?
            } else {
                optimise(&mut program, &optimiser.options(), &mut NullObserver)?
            };
            if rewrites {
                println!();
            }
            print!("{program}");
            info!("{} rewrite(s) in {} pass(es)", stats.rewrites, stats.passes);
        }
        Operation::Cfg {
            sample,
            dot,
            details,
            no_optimise,
            optimiser,
        } => {
            let mut program = samples::build(&sample)?;
            let options = optimiser.options();
            if no_optimise {
                shake(&mut program, &options)?;
            } else {
                optimise(&mut program, &options, &mut NullObserver)?;
            }
            let cfgs = build_cfgs(&mut program, options.small_block_limit)?;
            if dot {
                print!("{}", to_dot(&cfgs));
            } else {
                for cfg in &cfgs {
                    if details {
                        print!("{}", cfg.details());
                    } else {
                        println!("{cfg}");
                    }
                }
            }
        }
        Operation::Run {
            sample,
            args,
            optimiser,
        } => {
            let mut program = samples::build(&sample)?;
            let before = eval::run_main(&program, &args)?;
            optimise(&mut program, &optimiser.options(), &mut NullObserver)?;
            let after = eval::run_main(&program, &args)?;

            for value in &after.output {
                println!("{value}");
            }
            println!("{}", after.termination);
            if before != after {
                bail!(
                    "optimised program behaves differently: before, {before:?}; after, {after:?}"
                );
            }
        }
    }

    Ok(())
}

/// Compute components and reference counts without changing the program.
fn shake(program: &mut Program, options: &OptimiserOptions) -> Result<()> {
    Optimiser::new(program, options.clone(), &mut NullObserver).shake()?;
    Ok(())
}

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::opt::OptimiserOptions;

#[derive(Debug, Parser)]
#[clap(about = "An optimiser for MIL programs")]
pub struct Options {
    #[clap(subcommand)]
    pub operation: Operation,
    /// Log more detail; repeat for even more
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    /// Only log errors
    #[clap(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Operation {
    /// List the sample programs
    List,
    /// Print a sample program
    Show { sample: String },
    /// Optimise a sample program and print the result
    Optimise {
        sample: String,
        /// Print every rewrite as it is made
        #[clap(long)]
        rewrites: bool,
        #[clap(flatten)]
        optimiser: OptimiserArgs,
    },
    /// Build the control flow graphs of a sample program
    Cfg {
        sample: String,
        /// Print the graphs in dot format
        #[clap(long)]
        dot: bool,
        /// Print every label with its predecessors and phi functions
        #[clap(long)]
        details: bool,
        #[clap(short, long)]
        /// Do not optimise the program first
        no_optimise: bool,
        #[clap(flatten)]
        optimiser: OptimiserArgs,
    },
    /// Run a sample program, before and after optimisation
    Run {
        sample: String,
        /// Arguments for the parameters of the program's main block
        #[clap(allow_negative_numbers = true)]
        args: Vec<i64>,
        #[clap(flatten)]
        optimiser: OptimiserArgs,
    },
}

#[derive(Debug, Args)]
pub struct OptimiserArgs {
    /// Do not inline blocks
    #[clap(long)]
    no_inline: bool,
    /// Do not rewrite code using what is known about its variables
    #[clap(long)]
    no_flow: bool,
    /// Do not merge equivalent definitions
    #[clap(long)]
    no_dedup: bool,
    /// Give up after this many rounds of optimisation
    #[clap(long, default_value_t = OptimiserOptions::MAX_OPTIMIZE_PASSES)]
    max_passes: usize,
}

impl OptimiserArgs {
    pub fn options(&self) -> OptimiserOptions {
        OptimiserOptions {
            max_passes: self.max_passes,
            inlining: !self.no_inline,
            flow: !self.no_flow,
            dedup: !self.no_dedup,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimiser_flags_switch_passes_off() {
        let options = Options::parse_from(["milopt", "-vv", "optimise", "known-cons", "--no-flow"]);
        assert_eq!(2, options.verbose);
        let Operation::Optimise { sample, optimiser, .. } = options.operation else {
            panic!("expected the optimise operation")
        };
        assert_eq!("known-cons", sample);
        let options = optimiser.options();
        assert!(!options.flow);
        assert!(options.inlining);
        assert_eq!(OptimiserOptions::MAX_OPTIMIZE_PASSES, options.max_passes);
    }

    #[test]
    fn run_takes_word_arguments() {
        let options = Options::parse_from(["milopt", "run", "countdown", "3", "-4"]);
        let Operation::Run { args, .. } = options.operation else {
            panic!("expected the run operation")
        };
        assert_eq!(vec![3, -4], args);
    }
}

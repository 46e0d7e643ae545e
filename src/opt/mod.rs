//! The MIL optimiser.
//!
//! [`optimise`] runs a fixed pipeline of whole-program passes until nothing changes. Each pass
//! lives in its own module as a set of methods on [`Optimiser`], which carries the program, the
//! options and the observer that hears about every rewrite.

mod cfun_simplify;
mod cleanup;
mod dedup;
mod derive;
mod facts;
mod flow;
mod inline;
mod liveness;
mod optimiser;
mod prims;
mod rewrite;
mod unused_args;

pub use facts::{Fact, Facts};
pub use optimiser::{
    optimise, NullObserver, OptimiseStats, Optimiser, OptimiserOptions, Rewrite, RewriteLog,
    RewriteObserver,
};
pub use prims::simplify as simplify_prim;

//! Whole-program analyses: components of the definition graph, reference counts, return
//! analysis and argument lists.

mod args;
mod occurrences;
mod returns;
mod scc;

pub use scc::{compute_sccs, DefnScc, SccId};

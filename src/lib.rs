//! An optimiser for MIL, a monadic intermediate language for functional programs.
//!
//! A [`mil::Program`] is a graph of blocks, closure definitions and top-level bindings. The
//! optimiser in [`opt`] rewrites it in place, using the analyses in [`analysis`]. [`cfg`] builds
//! the control flow graphs a back end would start from, and [`eval`] gives programs a meaning
//! that optimisation must preserve.

pub mod analysis;
pub mod cfg;
pub mod commandline;
pub mod error;
pub mod eval;
mod ext;
pub mod mil;
pub mod opt;
pub mod prelude;
pub mod samples;

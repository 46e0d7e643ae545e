//! Error types.
//!
//! Two kinds of failure exist. An [`InternalError`] is a broken invariant of the MIL program
//! (an out-of-range constructor, a duplicated alternative, an arity mismatch, ...). It aborts the
//! current pass and is propagated straight to the caller. A [`ProgramError`] is a mistake in the
//! source program that the front end should have caught; these are accumulated by
//! [`Diagnostics`] so that all of them can be reported at once.

use thiserror::Error;

use crate::mil::{BlockId, ClosureId, DefnId, TempId};

pub type InternalResult<T> = Result<T, InternalError>;

/// A violated invariant of the MIL program representation.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum InternalError {
    #[error("constructor '{cfun}' has tag {tag}, but its type only has {family} constructors")]
    CfunIndexOutOfRange {
        cfun: String,
        tag: usize,
        family: usize,
    },
    #[error("field {index} selected from constructor '{cfun}' of arity {arity}")]
    SelIndexOutOfRange {
        cfun: String,
        index: usize,
        arity: usize,
    },
    #[error("multiple alternatives for constructor '{cfun}' in {defn}")]
    DuplicateAlternative { cfun: String, defn: DefnId },
    #[error("case in {defn} is marked exhaustive, but constructor '{cfun}' is not covered")]
    NonExhaustiveCase { cfun: String, defn: DefnId },
    #[error("arity mismatch in {context}: expected {expected} values, found {found}")]
    ArityMismatch {
        context: String,
        expected: usize,
        found: usize,
    },
    #[error("wildcard variable read in {0}")]
    WildcardRead(DefnId),
    #[error("{0} is not defined")]
    UndefinedBlock(BlockId),
    #[error("{0} is not defined")]
    UndefinedClosure(ClosureId),
    #[error("top-level component {index} of {defn} does not exist")]
    UndefinedTopLevel { defn: DefnId, index: usize },
    #[error("variable {var} is bound more than once in {defn}")]
    RepeatedBinding { var: TempId, defn: DefnId },
    #[error("cannot continue after a {0} in a straight-line code sequence")]
    NotStraightLine(&'static str),
}

impl InternalError {
    pub fn arity<S: Into<String>>(context: S, expected: usize, found: usize) -> Self {
        Self::ArityMismatch {
            context: context.into(),
            expected,
            found,
        }
    }
}

/// An error in the source program.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProgramError {
    #[error("illegal recursive top-level binding for: {}", .0.join(", "))]
    IllegalRecursiveTopLevel(Vec<String>),
    #[error("{0} is declared as an entrypoint, but has no definition")]
    UnknownEntrypoint(DefnId),
    #[error("the program has no entrypoints")]
    NoEntrypoints,
}

/// Accumulates [`ProgramError`]s reported while analysing a program.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<ProgramError>,
}
impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: ProgramError) {
        log::warn!("{error}");
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgramError> {
        self.errors.iter()
    }

    /// Returns [`Ok`] if nothing was reported, otherwise all of the reported errors.
    pub fn into_result(self) -> Result<(), Vec<ProgramError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Returned by the optimiser entry points.
#[derive(Debug, Error)]
pub enum OptimiseError {
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
    #[error("{} error(s) in the source program: {}", .0.len(), describe_all(.0))]
    Program(Vec<ProgramError>),
}

impl From<Vec<ProgramError>> for OptimiseError {
    fn from(errors: Vec<ProgramError>) -> Self {
        Self::Program(errors)
    }
}

fn describe_all(errors: &[ProgramError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Marks a type from which multiple errors can be collected.
#[cfg(test)]
pub(crate) trait CollectErrors<E> {
    /// Collects all errors from `Self` into a [`Vec<E>`].
    fn collect_errors(self) -> Vec<E>;
}
#[cfg(test)]
impl<R, E> CollectErrors<E> for Result<R, Vec<E>> {
    fn collect_errors(self) -> Vec<E> {
        self.err().into_iter().flatten().collect()
    }
}

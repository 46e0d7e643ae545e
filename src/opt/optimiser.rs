//! The optimiser driver: options, the rewrite observer and the pass loop.

use crate::{
    error::{Diagnostics, OptimiseError},
    mil::{DefnId, Program},
    prelude::*,
};

/// Limits and switches for the optimiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimiserOptions {
    /// Upper bound on the number of rounds of the main and cleanup loops together.
    pub max_passes: usize,
    /// Number of nested inlining steps allowed at one point in the code.
    pub inline_iter_limit: usize,
    /// Longest block body that may be copied into more than one caller.
    pub inline_lines_limit: usize,
    /// Longest block body that is included in its callers' control flow graphs.
    pub small_block_limit: usize,
    /// How many times a definition may be specialised from an already specialised one.
    pub derive_depth_limit: usize,
    /// Number of rewrites attempted in a row at one point of a code sequence during flow.
    pub rewrite_fuel: usize,
    pub inlining: bool,
    pub flow: bool,
    pub dedup: bool,
}
impl OptimiserOptions {
    pub const MAX_OPTIMIZE_PASSES: usize = 42;
    pub const INLINE_ITER_LIMIT: usize = 3;
    pub const INLINE_LINES_LIMIT: usize = 6;
}
impl Default for OptimiserOptions {
    fn default() -> Self {
        Self {
            max_passes: Self::MAX_OPTIMIZE_PASSES,
            inline_iter_limit: Self::INLINE_ITER_LIMIT,
            inline_lines_limit: Self::INLINE_LINES_LIMIT,
            small_block_limit: 4,
            derive_depth_limit: 4,
            rewrite_fuel: 32,
            inlining: true,
            flow: true,
            dedup: true,
        }
    }
}

/// A single rewrite made by the optimiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// The definition being optimised when the rewrite happened.
    pub defn: Option<DefnId>,
    pub description: String,
}

/// Receives every rewrite as it happens.
pub trait RewriteObserver {
    fn rewrite(&mut self, rewrite: &Rewrite);
}

/// Ignores all rewrites.
#[derive(Debug, Default)]
pub struct NullObserver;
impl RewriteObserver for NullObserver {
    fn rewrite(&mut self, _rewrite: &Rewrite) {}
}

/// Keeps every rewrite, in order.
#[derive(Debug, Default)]
pub struct RewriteLog {
    pub rewrites: Vec<Rewrite>,
}
impl RewriteLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any rewrite description contains `text`.
    pub fn mentions(&self, text: &str) -> bool {
        self.rewrites.iter().any(|r| r.description.contains(text))
    }
}
impl RewriteObserver for RewriteLog {
    fn rewrite(&mut self, rewrite: &Rewrite) {
        self.rewrites.push(rewrite.clone());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimiseStats {
    pub passes: usize,
    pub rewrites: usize,
    pub size_before: usize,
    pub size_after: usize,
}

/// Optimise `program` in place.
pub fn optimise(
    program: &mut Program,
    options: &OptimiserOptions,
    observer: &mut dyn RewriteObserver,
) -> Result<OptimiseStats, OptimiseError> {
    Optimiser::new(program, options.clone(), observer).optimise()
}

pub struct Optimiser<'p> {
    pub(super) program: &'p mut Program,
    pub(super) options: OptimiserOptions,
    observer: &'p mut dyn RewriteObserver,
    /// Rewrites made in the current round.
    pub(super) count: usize,
    total: usize,
    pub(super) current: Option<DefnId>,
}
impl<'p> Optimiser<'p> {
    pub fn new(
        program: &'p mut Program,
        options: OptimiserOptions,
        observer: &'p mut dyn RewriteObserver,
    ) -> Self {
        Self {
            program,
            options,
            observer,
            count: 0,
            total: 0,
            current: None,
        }
    }

    /// Record a rewrite.
    pub(super) fn report<S: Into<String>>(&mut self, description: S) {
        let rewrite = Rewrite {
            defn: self.current,
            description: description.into(),
        };
        match rewrite.defn {
            Some(defn) => debug!("{defn}: {}", rewrite.description),
            None => debug!("{}", rewrite.description),
        }
        self.observer.rewrite(&rewrite);
        self.count += 1;
        self.total += 1;
    }

    /// Recompute reachability, components and reference counts.
    pub fn shake(&mut self) -> Result<(), OptimiseError> {
        let mut diagnostics = Diagnostics::new();
        self.program.compute_sccs(&mut diagnostics)?;
        diagnostics.into_result()?;
        self.program.count_occurrences()?;
        Ok(())
    }

    /// Run the whole pipeline.
    ///
    /// The main loop repeats inlining, unused argument removal and flow until a round makes no
    /// rewrites. The cleanup loop then merges duplicate definitions and tidies up the
    /// opportunities that exposes, stopping once a round only repeats the merges.
    pub fn optimise(&mut self) -> Result<OptimiseStats, OptimiseError> {
        self.program.check()?;
        self.shake()?;
        self.cfun_simplify()?;
        let size_before = self.program.size();
        let mut passes = 0;

        loop {
            self.count = 0;
            if self.options.inlining {
                self.inlining()?;
                self.shake()?;
            }
            self.unused_args()?;
            self.shake()?;
            if self.options.flow {
                self.flow()?;
                self.shake()?;
            }
            passes += 1;
            debug!("pass {passes}: {} rewrite(s)", self.count);
            if self.count == 0 || passes >= self.options.max_passes {
                break;
            }
        }

        loop {
            self.count = 0;
            if self.options.dedup {
                self.collapse()?;
            }
            let postcount = self.count;
            self.shake()?;
            if self.options.inlining {
                self.inlining()?;
                self.shake()?;
            }
            if self.options.flow {
                self.flow()?;
                self.shake()?;
            }
            passes += 1;
            debug!("cleanup pass {passes}: {} rewrite(s)", self.count);
            if self.count == 0 || self.count == postcount || passes >= self.options.max_passes {
                break;
            }
        }

        self.current = None;
        self.program.check()?;
        let stats = OptimiseStats {
            passes,
            rewrites: self.total,
            size_before,
            size_after: self.program.size(),
        };
        info!(
            "optimised in {} pass(es) with {} rewrite(s), size {} -> {}",
            stats.passes, stats.rewrites, stats.size_before, stats.size_after
        );
        Ok(stats)
    }
}

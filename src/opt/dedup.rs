//! Duplicate elimination: merging definitions that are the same up to renaming.

use super::Optimiser;
use crate::{
    ext::{Buckets, ConstHashMap},
    mil::{Atom, BlockId, ClosureId, DefnId, Program, Tail, TopId},
    prelude::*,
};

/// The definition that `b` was merged into, following chains of merges.
fn block_replacement(program: &Program, mut b: BlockId) -> BlockId {
    let mut steps = 0;
    while let Some(next) = program.block(b).ok().and_then(|block| block.replace_with) {
        if next == b || steps > program.block_ids().count() {
            break;
        }
        b = next;
        steps += 1;
    }
    b
}

fn closure_replacement(program: &Program, mut k: ClosureId) -> ClosureId {
    let mut steps = 0;
    while let Some(next) = program.closure(k).ok().and_then(|c| c.replace_with) {
        if next == k || steps > program.closure_ids().count() {
            break;
        }
        k = next;
        steps += 1;
    }
    k
}

impl Optimiser<'_> {
    /// Merge equivalent blocks, closures and top-levels, redirecting every reference to the
    /// first of each group.
    pub(super) fn collapse(&mut self) -> InternalResult<()> {
        let merged_blocks = self.collapse_blocks()?;
        let merged_closures = self.collapse_closures()?;
        if merged_blocks || merged_closures {
            self.redirect()?;
        }
        self.collapse_tops()
    }

    fn collapse_blocks(&mut self) -> InternalResult<bool> {
        let mut buckets: ConstHashMap<i64, Vec<BlockId>> = ConstHashMap::default();
        let mut merged = false;
        for defn in self.program.defns() {
            let DefnId::Block(id) = defn else { continue };
            let block = self.program.block(id)?;
            let summary = block.summary();
            let same = buckets.bucket(&summary).copied().find(|other| {
                self.program
                    .block(*other)
                    .is_ok_and(|other| other.alpha_equiv(block))
            });
            match same {
                Some(other) if !self.program.is_entrypoint(defn) => {
                    self.program.block_mut(id)?.replace_with = Some(other);
                    self.current = Some(defn);
                    self.report(format!("{id} is a copy of {other}"));
                    merged = true;
                }
                _ => {
                    self.program.block_mut(id)?.replace_with = None;
                    buckets.push_to_bucket(summary, id);
                }
            }
        }
        self.current = None;
        Ok(merged)
    }

    fn collapse_closures(&mut self) -> InternalResult<bool> {
        let mut buckets: ConstHashMap<i64, Vec<ClosureId>> = ConstHashMap::default();
        let mut merged = false;
        for defn in self.program.defns() {
            let DefnId::Closure(id) = defn else { continue };
            let closure = self.program.closure(id)?;
            let summary = closure.summary();
            let same = buckets.bucket(&summary).copied().find(|other| {
                self.program
                    .closure(*other)
                    .is_ok_and(|other| other.alpha_equiv(closure))
            });
            match same {
                Some(other) if !self.program.is_entrypoint(defn) => {
                    self.program.closure_mut(id)?.replace_with = Some(other);
                    self.current = Some(defn);
                    self.report(format!("{id} is a copy of {other}"));
                    merged = true;
                }
                _ => {
                    self.program.closure_mut(id)?.replace_with = None;
                    buckets.push_to_bucket(summary, id);
                }
            }
        }
        self.current = None;
        Ok(merged)
    }

    /// Point every block call and closure allocation at the surviving copy.
    fn redirect(&mut self) -> InternalResult<()> {
        let blocks: Vec<_> = self
            .program
            .block_ids()
            .map(|b| block_replacement(self.program, b))
            .collect();
        let closures: Vec<_> = self
            .program
            .closure_ids()
            .map(|k| closure_replacement(self.program, k))
            .collect();
        let redirect_tail = |tail: &mut Tail| match tail {
            Tail::BlockCall(bc) => bc.target = blocks[bc.target.index()],
            Tail::ClosAlloc(k, _) => *k = closures[k.index()],
            _ => {}
        };
        for defn in self.program.all_defns() {
            match defn {
                DefnId::Block(id) => {
                    let code = &mut self.program.block_mut(id)?.code;
                    code.visit_tails_mut(&mut |t| redirect_tail(t));
                    code.visit_calls_mut(&mut |bc| bc.target = blocks[bc.target.index()]);
                }
                DefnId::Closure(id) => redirect_tail(&mut self.program.closure_mut(id)?.tail),
                DefnId::Top(id) => redirect_tail(&mut self.program.top_mut(id)?.tail),
            }
        }
        Ok(())
    }

    /// A top-level that computes the same pure value as an earlier one returns that one's
    /// values instead.
    fn collapse_tops(&mut self) -> InternalResult<()> {
        let mut buckets: ConstHashMap<i64, Vec<TopId>> = ConstHashMap::default();
        for defn in self.program.defns() {
            let DefnId::Top(id) = defn else { continue };
            let top = self.program.top(id)?;
            if !top.tail.is_pure() || matches!(top.tail, Tail::Return(_)) {
                continue;
            }
            let summary = top.summary();
            let same = buckets.bucket(&summary).copied().find(|other| {
                self.program
                    .top(*other)
                    .is_ok_and(|other| other.alpha_equiv(top))
            });
            match same {
                Some(other) if !self.program.is_entrypoint(defn) => {
                    let n = top.lhs.len();
                    self.program.top_mut(id)?.tail =
                        Tail::Return((0..n).map(|i| Atom::top(other, i)).collect());
                    self.current = Some(defn);
                    self.report(format!("{id} is a copy of {other}"));
                }
                _ => buckets.push_to_bucket(summary, id),
            }
        }
        self.current = None;
        Ok(())
    }
}

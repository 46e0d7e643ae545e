//! Local tidying of code sequences, and detection of blocks that can only loop.

use super::Optimiser;
use crate::{
    mil::{Atom, BlockId, Code, Tail},
    prelude::*,
};

impl Optimiser<'_> {
    /// Remove bindings without effect, code after tails that never return, and branches that
    /// all lead to the same place.
    pub(super) fn cleanup(&mut self, code: Code) -> InternalResult<Code> {
        Ok(match code {
            Code::Bind { vars, tail, rest } => {
                if tail.blackholes() || self.program.tail_doesnt_return(&tail)? {
                    self.report(format!("nothing runs after {tail}"));
                    return Ok(Code::Done(tail));
                }
                if vars.iter().all(|v| v.is_wildcard()) && tail.has_no_effect() {
                    self.report(format!("dropped unused {tail}"));
                    return self.cleanup(*rest);
                }
                let rest = self.cleanup(*rest)?;
                if let Code::Done(Tail::Return(atoms)) = &rest {
                    let returns_vars = atoms.len() == vars.len()
                        && atoms
                            .iter()
                            .zip(&vars)
                            .all(|(a, v)| !v.is_wildcard() && *a == Atom::Temp(*v));
                    if returns_vars {
                        self.report(format!("right monad law for {tail}"));
                        return Ok(Code::Done(tail));
                    }
                }
                Code::bind(vars, tail, rest)
            }
            Code::Assert { atom, cfun, rest } => Code::assert(atom, cfun, self.cleanup(*rest)?),
            Code::If {
                test,
                if_true,
                if_false,
            } if if_true == if_false => {
                self.report(format!("if {test} has identical branches"));
                Code::call(if_true)
            }
            Code::Case { scrutinee, alts } => {
                let shared = {
                    let mut calls = alts.calls();
                    match calls.next() {
                        Some(first) if calls.all(|bc| bc == first) => Some(first.clone()),
                        _ => None,
                    }
                };
                match shared {
                    Some(bc) => {
                        self.report(format!("case {scrutinee} has identical branches"));
                        Code::call(bc)
                    }
                    None => Code::Case { scrutinee, alts },
                }
            }
            code => code,
        })
    }

    /// Does `code`, the body of `src`, certainly loop forever without doing anything?
    pub(super) fn detect_loops(&self, src: BlockId, code: &Code) -> InternalResult<bool> {
        if !self.program.is_recursive(src.into())? {
            return Ok(false);
        }
        self.code_loops(src, code, &mut vec![src])
    }

    fn code_loops(
        &self,
        src: BlockId,
        code: &Code,
        visited: &mut Vec<BlockId>,
    ) -> InternalResult<bool> {
        Ok(match code {
            Code::Done(Tail::BlockCall(bc)) => self.block_loops(src, bc.target, visited)?,
            Code::Done(_) => false,
            Code::Bind {
                tail: Tail::BlockCall(bc),
                ..
            } => self.block_loops(src, bc.target, visited)?,
            Code::Bind { tail, rest, .. } => {
                tail.has_no_effect() && self.code_loops(src, rest, visited)?
            }
            Code::Assert { rest, .. } => self.code_loops(src, rest, visited)?,
            Code::If { .. } | Code::Case { .. } => false,
        })
    }

    fn block_loops(
        &self,
        src: BlockId,
        b: BlockId,
        visited: &mut Vec<BlockId>,
    ) -> InternalResult<bool> {
        if visited.contains(&b) {
            return Ok(true);
        }
        if self.program.in_other_scc(b, src.into())? {
            return Ok(false);
        }
        visited.push(b);
        let code = &self.program.block(b)?.code;
        self.code_loops(src, code, visited)
    }
}

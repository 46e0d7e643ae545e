//! Inlining: copying short or singly used blocks into their callers.

use super::Optimiser;
use crate::{
    mil::{BlockCall, BlockId, Code, DefnId, Prim, Tail, TempId, TempSubst},
    prelude::*,
};

/// Length of a block body for prefix inlining: one for each binding and for the final tail, or
/// zero if the body branches or contains a tail that never returns.
fn prefix_len(code: &Code, len: usize) -> usize {
    match code {
        Code::Done(t) if t.blackholes() => 0,
        Code::Done(_) => len + 1,
        Code::Bind { tail, .. } if tail.blackholes() => 0,
        Code::Bind { rest, .. } => prefix_len(rest, len + 1),
        Code::Assert { rest, .. } => prefix_len(rest, len),
        Code::If { .. } | Code::Case { .. } => 0,
    }
}

/// Length of a block body for suffix inlining. Branches count as a single line.
fn suffix_len(code: &Code, len: usize) -> usize {
    match code {
        Code::Bind { rest, .. } => suffix_len(rest, len + 1),
        Code::Assert { rest, .. } => suffix_len(rest, len),
        Code::Done(_) | Code::If { .. } | Code::Case { .. } => len + 1,
    }
}

impl Optimiser<'_> {
    /// Inline calls throughout the program, one component at a time with callees first, so that
    /// callers see the already inlined bodies of their callees.
    pub(super) fn inlining(&mut self) -> InternalResult<()> {
        self.program.return_analysis()?;
        let sccs: Vec<_> = self.program.sccs.iter().map(|s| s.members.clone()).collect();
        for members in sccs {
            for defn in members {
                self.current = Some(defn);
                match defn {
                    DefnId::Block(id) => self.inline_block(id)?,
                    DefnId::Closure(id) => {
                        let tail = self.program.closure(id)?.tail.clone();
                        if let Some(tail) = self.inline_tail(&tail)? {
                            self.program.closure_mut(id)?.tail = tail;
                        }
                    }
                    DefnId::Top(id) => {
                        let tail = self.program.top(id)?.tail.clone();
                        if let Some(tail) = self.inline_tail(&tail)? {
                            self.program.top_mut(id)?.tail = tail;
                        }
                    }
                }
            }
        }
        self.current = None;
        Ok(())
    }

    fn inline_block(&mut self, id: BlockId) -> InternalResult<()> {
        let block = self.program.block(id)?;
        // Calls to gotos are bypassed instead.
        if block.is_goto() && !self.program.is_entrypoint(id.into()) {
            return Ok(());
        }
        let code = block.code.clone();
        let code = self.cleanup(code)?;
        let code = self.cfun_simplify_code(code)?;
        let code = if self.detect_loops(id, &code)? {
            self.report(format!("{id} loops forever"));
            Code::Done(Tail::PrimCall(Prim::Loop, vec![]))
        } else {
            code
        };
        let code = self.inline_code(id, code, self.options.inline_iter_limit)?;
        self.program.block_mut(id)?.code = code;
        Ok(())
    }

    /// Inline at most `limit` nested calls at each point of `code`, which belongs to `src`.
    fn inline_code(&mut self, src: BlockId, code: Code, limit: usize) -> InternalResult<Code> {
        Ok(match code {
            Code::Bind { vars, tail, rest } => {
                if limit > 0 {
                    if let Tail::BlockCall(bc) = &tail {
                        if let Some(code) = self.prefix_inline(src, &vars, bc, &rest)? {
                            return self.inline_code(src, code, limit - 1);
                        }
                        if let Some(code) = self.enters(src, &vars, bc, &rest)? {
                            return self.inline_code(src, code, limit - 1);
                        }
                        if let Some(code) = self.cases_on(src, &vars, bc, &rest)? {
                            return self.inline_code(src, code, limit - 1);
                        }
                    }
                }
                let rest = self.inline_code(src, *rest, self.options.inline_iter_limit)?;
                let tail = match tail {
                    Tail::BlockCall(bc) => Tail::BlockCall(self.bypass_goto(&bc)?.unwrap_or(bc)),
                    tail => tail,
                };
                Code::bind(vars, tail, rest)
            }
            Code::Assert { atom, cfun, rest } => {
                let rest = self.inline_code(src, *rest, limit)?;
                Code::assert(atom, cfun, rest)
            }
            Code::Done(Tail::BlockCall(bc)) => {
                let bc = self.bypass_goto(&bc)?.unwrap_or(bc);
                if limit > 0 {
                    if let Some(code) = self.suffix_inline(src, &bc)? {
                        return self.inline_code(src, code, limit - 1);
                    }
                }
                Code::call(bc)
            }
            Code::Done(tail) => Code::Done(tail),
            Code::If {
                test,
                if_true,
                if_false,
            } => Code::If {
                test,
                if_true: self.bypass_goto(&if_true)?.unwrap_or(if_true),
                if_false: self.bypass_goto(&if_false)?.unwrap_or(if_false),
            },
            Code::Case {
                scrutinee,
                mut alts,
            } => {
                for bc in alts.calls_mut() {
                    if let Some(new) = self.bypass_goto(bc)? {
                        *bc = new;
                    }
                }
                Code::Case { scrutinee, alts }
            }
        })
    }

    /// The body of `bc`'s target with parameters replaced by arguments and bound variables
    /// renamed apart from those of the caller.
    fn instantiate(&mut self, bc: &BlockCall) -> InternalResult<Code> {
        let block = self.program.block(bc.target)?;
        let mut subst = TempSubst::new();
        subst.bind(&block.params, &bc.args)?;
        let code = block.code.clone();
        code.copy_fresh(&mut self.program.temps, &mut subst)
    }

    /// Replace `vars <- bc; rest` with a copy of the callee's body followed by `rest`.
    fn prefix_inline(
        &mut self,
        src: BlockId,
        vars: &[TempId],
        bc: &BlockCall,
        rest: &Code,
    ) -> InternalResult<Option<Code>> {
        if !self.program.in_other_scc(bc.target, src.into())? {
            return Ok(None);
        }
        let block = self.program.block(bc.target)?;
        let n = prefix_len(&block.code, 0);
        if n == 0 || (block.meta.occurs != 1 && n > self.options.inline_lines_limit) {
            return Ok(None);
        }
        let code = self.instantiate(bc)?.and_then(vars.to_vec(), rest.clone())?;
        self.report(format!("inlined {} at the start of {src}", bc.target));
        Ok(Some(code))
    }

    /// Replace a call at the end of a block with a copy of the callee's body.
    fn suffix_inline(&mut self, src: BlockId, bc: &BlockCall) -> InternalResult<Option<Code>> {
        let block = self.program.block(bc.target)?;
        let inline = if block.meta.doesnt_return && self.program.is_recursive(bc.target.into())? {
            false
        } else if block.meta.occurs == 1 || matches!(block.code, Code::Done(_)) {
            true
        } else if !self.guarded(bc.target, src, &mut vec![])? {
            false
        } else {
            let n = suffix_len(&block.code, 0);
            n > 0 && n <= self.options.inline_lines_limit
        };
        if !inline || bc.target == src {
            return Ok(None);
        }
        let code = self.instantiate(bc)?;
        self.report(format!("inlined {} at the end of {src}", bc.target));
        Ok(Some(code))
    }

    /// Can `src` be reached again from `b` by tail calls alone, without passing through a
    /// conditional? If so, inlining `b` into `src` could unroll a loop indefinitely.
    fn guarded(
        &self,
        b: BlockId,
        src: BlockId,
        visited: &mut Vec<BlockId>,
    ) -> InternalResult<bool> {
        if b == src {
            return Ok(false);
        }
        if visited.contains(&b) || self.program.in_other_scc(b, src.into())? {
            return Ok(true);
        }
        visited.push(b);
        match self.program.block(b)?.code.end_tail() {
            Some(Tail::BlockCall(bc)) => {
                let next = bc.target;
                self.guarded(next, src, visited)
            }
            _ => Ok(true),
        }
    }

    /// Inline a call in the tail of a closure or top-level definition when the callee does
    /// nothing but compute another tail.
    fn inline_tail(&mut self, tail: &Tail) -> InternalResult<Option<Tail>> {
        let Tail::BlockCall(bc) = tail else {
            return Ok(None);
        };
        let bypassed = self.bypass_goto(bc)?;
        let bc = bypassed.as_ref().unwrap_or(bc);
        let block = self.program.block(bc.target)?;
        if let Code::Done(body) = &block.code {
            let mut subst = TempSubst::new();
            subst.bind(&block.params, &bc.args)?;
            let body = body.apply(&subst);
            self.report(format!("inlined {} into a tail", bc.target));
            return Ok(Some(body));
        }
        Ok(bypassed.map(Tail::BlockCall))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Diagnostics,
        mil::{Atom, Program, ProgramBuilder},
        opt::{OptimiserOptions, RewriteLog},
    };

    fn inline(program: &mut Program) -> RewriteLog {
        program.compute_sccs(&mut Diagnostics::new()).unwrap();
        program.count_occurrences().unwrap();
        let mut log = RewriteLog::new();
        Optimiser::new(program, OptimiserOptions::default(), &mut log)
            .inlining()
            .unwrap();
        program.check().unwrap();
        log
    }

    fn print(atom: Atom, rest: Code) -> Code {
        Code::bind(vec![], Tail::PrimCall(Prim::Print, vec![atom]), rest)
    }

    #[test]
    fn short_blocks_are_inlined_at_the_start_of_callers() {
        let mut builder = ProgramBuilder::new();
        let (p, x, y) = (builder.temp(), builder.temp(), builder.temp());
        let double = builder.block(
            vec![p],
            Code::Done(Tail::PrimCall(Prim::Add, vec![p.into(), p.into()])),
        );
        let main = builder.block(
            vec![x],
            Code::bind(
                vec![y],
                Tail::call(double, vec![x.into()]),
                print(y.into(), Code::Done(Tail::ret(y.into()))),
            ),
        );
        builder.entrypoint(main);
        let mut program = builder.finish();
        let log = inline(&mut program);

        assert!(log.mentions("inlined b0 at the start of b1"));
        assert_eq!(
            "t3 <- add(t2, t2)\n[] <- print(t3)\nreturn t3",
            program.block(main).unwrap().code.to_string()
        );
    }

    #[test]
    fn single_use_blocks_are_inlined_at_the_end() {
        let mut builder = ProgramBuilder::new();
        let (p, x) = (builder.temp(), builder.temp());
        let show = builder.block(vec![p], print(p.into(), Code::Done(Tail::ret(p.into()))));
        let main = builder.block(vec![x], Code::call(BlockCall::new(show, vec![x.into()])));
        builder.entrypoint(main);
        let mut program = builder.finish();
        let log = inline(&mut program);

        assert!(log.mentions("inlined b0 at the end of b1"));
        assert_eq!(
            "[] <- print(t2)\nreturn t2",
            program.block(main).unwrap().code.to_string()
        );
    }

    #[test]
    fn unguarded_self_loops_are_replaced() {
        let mut builder = ProgramBuilder::new();
        let spin = builder.declare_block();
        builder
            .define_block(spin, vec![], Code::call(BlockCall::new(spin, vec![])))
            .unwrap();
        builder.entrypoint(spin);
        let mut program = builder.finish();
        let log = inline(&mut program);

        assert!(log.mentions("b0 loops forever"));
        assert_eq!("loop()", program.block(spin).unwrap().code.to_string());
    }

    #[test]
    fn tails_of_closures_absorb_trivial_blocks() {
        let mut builder = ProgramBuilder::new();
        let (p, s, a) = (builder.temp(), builder.temp(), builder.temp());
        let neg = builder.block(vec![p], Code::Done(Tail::PrimCall(Prim::Neg, vec![p.into()])));
        let k = builder.closure(vec![s], vec![a], Tail::call(neg, vec![a.into()]));
        builder.entrypoint(k);
        let mut program = builder.finish();
        inline(&mut program);

        assert_eq!("neg(t3)", program.closure(k).unwrap().tail.to_string());
    }
}

//! Rewriting single tails and block calls using known facts.

use super::{facts::Facts, prims, Optimiser};
use crate::{
    mil::{BlockCall, Code, Tail, TempSubst},
    prelude::*,
};

impl Optimiser<'_> {
    /// A tail that can replace `tail`, given the facts. Returns [`None`] if nothing changes.
    pub(super) fn rewrite_tail(
        &mut self,
        tail: &Tail,
        facts: &Facts,
    ) -> InternalResult<Option<Tail>> {
        match tail {
            Tail::Sel(cfun, index, a) => {
                let known = facts.about(self.program, a);
                if let Some(Tail::DataAlloc(c, args)) = known.as_ref().and_then(|f| f.tail()) {
                    if c == cfun && *index < args.len() {
                        let field = args[*index].clone();
                        self.report(format!("{tail} selects known field {field}"));
                        return Ok(Some(Tail::ret(field)));
                    }
                }
                Ok(None)
            }
            Tail::Enter(f, args) => {
                let known = facts.about(self.program, f);
                let Some(Tail::ClosAlloc(k, stored)) = known.and_then(|f| f.tail().cloned()) else {
                    return Ok(None);
                };
                let closure = self.program.closure(k)?;
                let mut subst = TempSubst::new();
                subst.bind(&closure.stored, &stored)?;
                if closure.params.len() != args.len() {
                    return Err(InternalError::arity(
                        format!("entering {k}"),
                        closure.params.len(),
                        args.len(),
                    ));
                }
                subst.bind(&closure.params, args)?;
                let body = closure.tail.apply(&subst);
                self.report(format!("{tail} enters known closure {k}"));
                Ok(Some(body))
            }
            Tail::ClosAlloc(k, args) => Ok(self
                .derive_closure(*k, args, facts)?
                .map(|(k, args)| Tail::ClosAlloc(k, args))),
            Tail::BlockCall(bc) => Ok(self.rewrite_block_call(bc, facts)?.map(Tail::BlockCall)),
            Tail::PrimCall(p, args) => {
                let simpler = prims::simplify(*p, args, facts);
                if let Some(t) = &simpler {
                    self.report(format!("{tail} simplifies to {t}"));
                }
                Ok(simpler)
            }
            Tail::Return(_) | Tail::DataAlloc(..) => Ok(None),
        }
    }

    /// A better call than `bc`, if there is one: skip a case that the callee would do on an
    /// argument with a known constructor, or call a copy of the callee specialised for the
    /// arguments.
    pub(super) fn rewrite_block_call(
        &mut self,
        bc: &BlockCall,
        facts: &Facts,
    ) -> InternalResult<Option<BlockCall>> {
        if let Some(short) = self.short_case(bc, facts)? {
            let bypassed = self.bypass_goto(&short)?;
            return Ok(Some(bypassed.unwrap_or(short)));
        }
        if let Some(derived) = self.derive_with_known_cons(bc, facts)? {
            return Ok(Some(derived));
        }
        self.derive_with_duplicate_args(bc)
    }

    /// If the callee starts by casing on one of its parameters, and the constructor of the
    /// corresponding argument is known, call the selected alternative directly.
    fn short_case(
        &mut self,
        bc: &BlockCall,
        facts: &Facts,
    ) -> InternalResult<Option<BlockCall>> {
        let block = self.program.block(bc.target)?;
        let Code::Case { scrutinee, alts } = &block.code else {
            return Ok(None);
        };
        let Some(index) = block.params.iter().position(|p| scrutinee.mentions(*p)) else {
            return Ok(None);
        };
        let Some(arg) = bc.args.get(index) else {
            return Err(InternalError::arity(
                format!("call to {}", bc.target),
                block.params.len(),
                bc.args.len(),
            ));
        };
        let Some(fact) = facts.about(self.program, arg) else {
            return Ok(None);
        };
        let Some(taken) = fact.cfun().and_then(|cfun| alts.select(cfun)) else {
            return Ok(None);
        };
        let mut subst = TempSubst::new();
        subst.bind(&block.params, &bc.args)?;
        let short = taken.apply(&subst);
        self.report(format!("{bc} skips its case on known {arg}, calling {short}"));
        Ok(Some(short))
    }

    /// Follow calls to blocks that do nothing but call another block.
    pub(super) fn bypass_goto(&mut self, bc: &BlockCall) -> InternalResult<Option<BlockCall>> {
        let mut current = bc.clone();
        let mut visited = vec![bc.target];
        loop {
            let block = self.program.block(current.target)?;
            let Code::Done(Tail::BlockCall(next)) = &block.code else {
                break;
            };
            if !block.is_goto() || visited.contains(&next.target) {
                break;
            }
            let mut subst = TempSubst::new();
            subst.bind(&block.params, &current.args)?;
            current = next.apply(&subst);
            visited.push(current.target);
        }
        if current == *bc {
            Ok(None)
        } else {
            self.report(format!("{bc} bypasses goto blocks to {current}"));
            Ok(Some(current))
        }
    }
}

//! Finding definitions that never return.

use crate::{
    mil::{Code, DefnId, Program, Tail},
    prelude::*,
};

impl Program {
    /// Does calling `tail` certainly not return, given what is known so far?
    pub fn tail_doesnt_return(&self, tail: &Tail) -> InternalResult<bool> {
        Ok(match tail {
            Tail::BlockCall(bc) => self.block(bc.target)?.meta.doesnt_return,
            Tail::PrimCall(p, _) => p.purity().doesnt_return(),
            _ => false,
        })
    }

    pub fn code_doesnt_return(&self, code: &Code) -> InternalResult<bool> {
        Ok(match code {
            Code::Done(t) => self.tail_doesnt_return(t)?,
            Code::Bind { tail, rest, .. } => {
                self.tail_doesnt_return(tail)? || self.code_doesnt_return(rest)?
            }
            Code::Assert { rest, .. } => self.code_doesnt_return(rest)?,
            Code::If {
                if_true, if_false, ..
            } => {
                self.block(if_true.target)?.meta.doesnt_return
                    && self.block(if_false.target)?.meta.doesnt_return
            }
            Code::Case { alts, .. } => {
                let mut all = true;
                for bc in alts.calls() {
                    all &= self.block(bc.target)?.meta.doesnt_return;
                }
                all
            }
        })
    }

    fn defn_doesnt_return(&self, defn: DefnId) -> InternalResult<bool> {
        match defn {
            DefnId::Block(id) => self.code_doesnt_return(&self.block(id)?.code),
            DefnId::Closure(id) => self.tail_doesnt_return(&self.closure(id)?.tail),
            DefnId::Top(id) => self.tail_doesnt_return(&self.top(id)?.tail),
        }
    }

    /// Compute [`crate::mil::DefnMeta::doesnt_return`] for every definition, one component at a
    /// time with callees first. Within a component, every member is first assumed not to
    /// return, and the assumption is withdrawn until nothing changes.
    pub fn return_analysis(&mut self) -> InternalResult<()> {
        for i in 0..self.sccs.len() {
            let members = self.sccs[i].members.clone();
            for member in &members {
                self.meta_mut(*member)?.doesnt_return = true;
            }
            let mut changed = true;
            while changed {
                changed = false;
                for member in &members {
                    if self.meta(*member)?.doesnt_return && !self.defn_doesnt_return(*member)? {
                        self.meta_mut(*member)?.doesnt_return = false;
                        changed = true;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Diagnostics,
        mil::{BlockCall, Prim, ProgramBuilder},
    };

    #[test]
    fn halting_and_looping_blocks_do_not_return() {
        let mut builder = ProgramBuilder::new();
        let x = builder.temp();
        let halt = builder.block(vec![], Code::Done(Tail::PrimCall(Prim::Halt, vec![])));
        let spin = builder.declare_block();
        builder
            .define_block(spin, vec![], Code::call(BlockCall::new(spin, vec![])))
            .unwrap();
        let ret = builder.block(vec![], Code::Done(Tail::Return(vec![])));
        let either = builder.block(
            vec![x],
            Code::If {
                test: x.into(),
                if_true: BlockCall::new(halt, vec![]),
                if_false: BlockCall::new(ret, vec![]),
            },
        );
        let both = builder.block(
            vec![x],
            Code::If {
                test: x.into(),
                if_true: BlockCall::new(halt, vec![]),
                if_false: BlockCall::new(spin, vec![]),
            },
        );
        let main = builder.block(
            vec![x],
            Code::bind(
                vec![],
                Tail::call(either, vec![x.into()]),
                Code::Done(Tail::call(both, vec![x.into()])),
            ),
        );
        builder.entrypoint(main);
        let mut program = builder.finish();
        program.compute_sccs(&mut Diagnostics::new()).unwrap();
        program.return_analysis().unwrap();

        let doesnt_return = |b| program.block(b).unwrap().meta.doesnt_return;
        assert!(doesnt_return(halt));
        assert!(doesnt_return(spin));
        assert!(!doesnt_return(ret));
        assert!(!doesnt_return(either));
        assert!(doesnt_return(both));
        assert!(doesnt_return(main));
    }

    #[test]
    fn loops_with_an_exit_return() {
        let mut builder = ProgramBuilder::new();
        let x = builder.temp();
        let exit = builder.block(vec![], Code::Done(Tail::Return(vec![])));
        let again = builder.declare_block();
        builder
            .define_block(
                again,
                vec![x],
                Code::If {
                    test: x.into(),
                    if_true: BlockCall::new(again, vec![x.into()]),
                    if_false: BlockCall::new(exit, vec![]),
                },
            )
            .unwrap();
        builder.entrypoint(again);
        let mut program = builder.finish();
        program.compute_sccs(&mut Diagnostics::new()).unwrap();
        program.return_analysis().unwrap();

        assert!(!program.block(again).unwrap().meta.doesnt_return);
    }
}

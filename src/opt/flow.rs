//! The flow pass: rewriting code sequences using the facts known at each point.

use super::{facts::Facts, Optimiser};
use crate::{
    mil::{Alts, Atom, BlockCall, BlockId, Code, DefnId, Fallback, Prim, Tail, TempSubst},
    prelude::*,
};

impl Optimiser<'_> {
    /// Run flow over every definition, followed by liveness analysis.
    pub(super) fn flow(&mut self) -> InternalResult<()> {
        for defn in self.program.defns() {
            self.current = Some(defn);
            match defn {
                DefnId::Block(id) => self.flow_block(id)?,
                DefnId::Closure(id) => {
                    let tail = self.program.closure(id)?.tail.clone();
                    if let Some(t) = self.flow_tail(&tail)? {
                        self.program.closure_mut(id)?.tail = t;
                    }
                }
                DefnId::Top(id) => {
                    let tail = self.program.top(id)?.tail.clone();
                    if let Some(t) = self.flow_tail(&tail)? {
                        self.program.top_mut(id)?.tail = t;
                    }
                }
            }
        }
        self.current = None;
        Ok(())
    }

    /// Flow the body of a single block, then remove the bindings it no longer needs.
    pub(super) fn flow_block(&mut self, id: BlockId) -> InternalResult<()> {
        let previous = self.current.replace(id.into());
        let code = self.program.block(id)?.code.clone();
        let fuel = self.options.rewrite_fuel;
        let code = self.flow_code(code, Facts::new(), TempSubst::new(), fuel)?;
        let code = self.liveness(code)?;
        let code = self.cleanup(code)?;
        self.program.block_mut(id)?.code = code;
        self.current = previous;
        Ok(())
    }

    /// Rewrite the tail of a closure or top-level definition, which must stay a single tail.
    fn flow_tail(&mut self, original: &Tail) -> InternalResult<Option<Tail>> {
        let mut tail = self
            .replace_tops(original)
            .unwrap_or_else(|| original.clone());
        for _ in 0..self.options.rewrite_fuel {
            match self.rewrite_tail(&tail, &Facts::new())? {
                Some(t) => tail = t,
                None => break,
            }
        }
        Ok((tail != *original).then_some(tail))
    }

    /// Rewrite `code` given the facts known before it, applying `subst` on the way. `fuel`
    /// bounds the number of consecutive rewrites at the same point.
    pub(super) fn flow_code(
        &mut self,
        code: Code,
        mut facts: Facts,
        mut subst: TempSubst,
        fuel: usize,
    ) -> InternalResult<Code> {
        let refuel = self.options.rewrite_fuel;
        match code {
            Code::Bind { vars, tail, rest } => {
                let tail = tail.apply(&subst);
                subst.remove(&vars);

                if let [v] = vars.as_slice() {
                    if !v.is_wildcard() {
                        if let Some(p) = facts.find(&tail) {
                            self.report(format!("reuse {p} for {v} <- {tail}"));
                            subst.extend(*v, Atom::Temp(p));
                            return self.flow_code(*rest, facts, subst, refuel);
                        }
                    }
                }
                if let Tail::Return(args) = &tail {
                    if args.len() == vars.len() {
                        self.report(format!("left monad law for {tail}"));
                        subst.bind(&vars, args)?;
                        return self.flow_code(*rest, facts, subst, refuel);
                    }
                }
                if fuel > 0 {
                    if let Some(t) = self.rewrite_tail(&tail, &facts)? {
                        let code = Code::Bind { vars, tail: t, rest };
                        return self.flow_code(code, facts, subst, fuel - 1);
                    }
                }

                facts.kill(&vars);
                if !tail.has_no_effect() {
                    facts.kill_non_pure();
                }
                if let [v] = vars.as_slice() {
                    if tail.is_repeatable() && !tail.mentions(*v) {
                        facts.add(*v, tail.clone());
                    }
                }
                let rest = self.flow_code(*rest, facts, subst, refuel)?;
                Ok(Code::bind(vars, tail, rest))
            }
            Code::Done(tail) => {
                let tail = tail.apply(&subst);
                if fuel > 0 {
                    if let Some(t) = self.rewrite_tail(&tail, &facts)? {
                        return self.flow_code(Code::Done(t), facts, subst, fuel - 1);
                    }
                }
                Ok(Code::Done(tail))
            }
            Code::Assert { atom, cfun, rest } => {
                let atom = subst.apply(&atom);
                let known = facts.about(self.program, &atom);
                if known.as_ref().and_then(|f| f.cfun()) == Some(&cfun) {
                    self.report(format!("assert {atom} {cfun} already known"));
                    return self.flow_code(*rest, facts, subst, refuel);
                }
                if let Atom::Temp(t) = atom {
                    facts.add_cfun(t, cfun.clone());
                }
                let rest = self.flow_code(*rest, facts, subst, refuel)?;
                Ok(Code::assert(atom, cfun, rest))
            }
            Code::If {
                test,
                if_true,
                if_false,
            } => {
                let test = subst.apply(&test);
                let if_true = if_true.apply(&subst);
                let if_false = if_false.apply(&subst);
                self.flow_if(test, if_true, if_false, facts, fuel)
            }
            Code::Case { scrutinee, alts } => {
                let scrutinee = subst.apply(&scrutinee);
                let mut alts = alts;
                for bc in alts.calls_mut() {
                    *bc = bc.apply(&subst);
                }
                self.flow_case(scrutinee, alts, facts, fuel)
            }
        }
    }

    fn flow_if(
        &mut self,
        test: Atom,
        if_true: BlockCall,
        if_false: BlockCall,
        facts: Facts,
        fuel: usize,
    ) -> InternalResult<Code> {
        if let Atom::Flag(b) = test {
            let taken = if b { if_true } else { if_false };
            self.report(format!("if {b} takes {taken}"));
            return self.flow_code(Code::call(taken), facts, TempSubst::new(), fuel);
        }
        if let Atom::Temp(t) = test {
            if let Some(Tail::PrimCall(Prim::Bnot, args)) = facts.lookup_tail(t) {
                if let [negated] = args.as_slice() {
                    if fuel > 0 {
                        self.report(format!("if on negated {negated} swaps branches"));
                        let code = Code::If {
                            test: negated.clone(),
                            if_true: if_false,
                            if_false: if_true,
                        };
                        return self.flow_code(code, facts, TempSubst::new(), fuel - 1);
                    }
                }
            }
        }

        let if_true = self.flow_branch(&test, Atom::Flag(true), if_true, &facts)?;
        let if_false = self.flow_branch(&test, Atom::Flag(false), if_false, &facts)?;

        let flags = (self.returned_flag(&if_true)?, self.returned_flag(&if_false)?);
        Ok(match flags {
            (Some(a), Some(b)) if a == b => {
                self.report(format!("both branches of if {test} return {a}"));
                Code::Done(Tail::ret(Atom::Flag(a)))
            }
            (Some(true), Some(false)) => {
                self.report(format!("if {test} returns its test"));
                Code::Done(Tail::ret(test))
            }
            (Some(false), Some(true)) => {
                self.report(format!("if {test} returns its negated test"));
                Code::Done(Tail::PrimCall(Prim::Bnot, vec![test]))
            }
            _ => Code::If {
                test,
                if_true,
                if_false,
            },
        })
    }

    /// Rewrite one branch of a conditional, knowing the value of the test in that branch.
    fn flow_branch(
        &mut self,
        test: &Atom,
        value: Atom,
        bc: BlockCall,
        facts: &Facts,
    ) -> InternalResult<BlockCall> {
        let mut bc = bc;
        if let Atom::Temp(t) = test {
            if bc.args.contains(test) {
                let mut subst = TempSubst::new();
                subst.extend(*t, value.clone());
                bc = bc.apply(&subst);
                self.report(format!("pass {value} for {t} to {}", bc.target));
            }
        }
        Ok(self.rewrite_block_call(&bc, facts)?.unwrap_or(bc))
    }

    /// The flag returned by a call to a block that does nothing else.
    fn returned_flag(&self, bc: &BlockCall) -> InternalResult<Option<bool>> {
        if !bc.args.is_empty() {
            return Ok(None);
        }
        Ok(match &self.program.block(bc.target)?.code {
            Code::Done(Tail::Return(atoms)) => match atoms.as_slice() {
                [Atom::Flag(b)] => Some(*b),
                _ => None,
            },
            _ => None,
        })
    }

    fn flow_case(
        &mut self,
        scrutinee: Atom,
        alts: Alts,
        facts: Facts,
        fuel: usize,
    ) -> InternalResult<Code> {
        if let Some(fact) = facts.about(self.program, &scrutinee) {
            if let Some(taken) = fact.cfun().and_then(|cfun| alts.select(cfun)) {
                let taken = taken.clone();
                self.report(format!("case on known {scrutinee} takes {taken}"));
                return self.flow_code(Code::call(taken), facts, TempSubst::new(), fuel);
            }
        }

        let mut alts = alts;
        if let Fallback::DefAlt(bc) = &mut alts.fallback {
            if let Some(new) = self.rewrite_block_call(bc, &facts)? {
                *bc = new;
            }
        }
        for alt in &mut alts.alts {
            let mut known = facts.clone();
            if let Atom::Temp(t) = scrutinee {
                known.add_cfun(t, alt.cfun.clone());
            }
            if let Some(new) = self.rewrite_block_call(&alt.call, &known)? {
                alt.call = new;
            }
        }
        Ok(Code::Case { scrutinee, alts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Diagnostics,
        mil::{CfunAlt, Program, ProgramBuilder, TempId},
        opt::{OptimiserOptions, RewriteLog},
    };

    fn flow(program: &mut Program, code: Code) -> (Code, RewriteLog) {
        program.compute_sccs(&mut Diagnostics::new()).unwrap();
        let mut log = RewriteLog::new();
        let options = OptimiserOptions::default();
        let fuel = options.rewrite_fuel;
        let code = Optimiser::new(program, options, &mut log)
            .flow_code(code, Facts::new(), TempSubst::new(), fuel)
            .unwrap();
        (code, log)
    }

    /// A block that returns `value`, for code that needs somewhere to jump.
    fn returning(builder: &mut ProgramBuilder, value: i64) -> BlockId {
        builder.block(vec![], Code::Done(Tail::ret(value.into())))
    }

    #[test]
    fn selecting_from_a_known_constructor_returns_the_field() {
        let mut builder = ProgramBuilder::new();
        let list = builder.data("List", &[("Nil", 0), ("Cons", 2)]);
        let (h, t, x, y) = (builder.temp(), builder.temp(), builder.temp(), builder.temp());
        let main = builder.block(vec![h, t], Code::Done(Tail::ret(h.into())));
        builder.entrypoint(main);
        let mut program = builder.finish();

        let code = Code::bind(
            vec![x],
            Tail::DataAlloc(list[1].clone(), vec![h.into(), t.into()]),
            Code::bind(
                vec![y],
                Tail::Sel(list[1].clone(), 0, x.into()),
                Code::Done(Tail::ret(y.into())),
            ),
        );
        let (code, log) = flow(&mut program, code);

        assert_eq!(Some(&Tail::ret(h.into())), code.end_tail());
        assert!(log.mentions("selects known field"));
        assert!(log.mentions("left monad law"));
    }

    #[test]
    fn constant_tests_take_one_branch() {
        let mut builder = ProgramBuilder::new();
        let yes = returning(&mut builder, 1);
        let no = returning(&mut builder, 0);
        let x = builder.temp();
        builder.entrypoint(yes);
        builder.entrypoint(no);
        let mut program = builder.finish();

        let code = Code::bind(
            vec![x],
            Tail::PrimCall(Prim::Lt, vec![3.into(), 5.into()]),
            Code::If {
                test: x.into(),
                if_true: BlockCall::new(yes, vec![]),
                if_false: BlockCall::new(no, vec![]),
            },
        );
        let (code, log) = flow(&mut program, code);

        assert_eq!(Code::call(BlockCall::new(yes, vec![])), code);
        assert!(log.mentions("if true takes"));
    }

    #[test]
    fn negated_tests_swap_branches() {
        let mut builder = ProgramBuilder::new();
        let first = returning(&mut builder, 1);
        let second = returning(&mut builder, 2);
        let (f, n) = (builder.temp(), builder.temp());
        builder.entrypoint(first);
        builder.entrypoint(second);
        let mut program = builder.finish();

        let code = Code::bind(
            vec![n],
            Tail::PrimCall(Prim::Bnot, vec![f.into()]),
            Code::If {
                test: n.into(),
                if_true: BlockCall::new(first, vec![]),
                if_false: BlockCall::new(second, vec![]),
            },
        );
        let (code, _) = flow(&mut program, code);

        let Code::Bind { rest, .. } = code else {
            panic!("expected the negation to stay, found {code:?}");
        };
        assert_eq!(
            Code::If {
                test: f.into(),
                if_true: BlockCall::new(second, vec![]),
                if_false: BlockCall::new(first, vec![]),
            },
            *rest
        );
    }

    #[test]
    fn repeated_pure_tails_are_shared() {
        let mut builder = ProgramBuilder::new();
        let (p, x, y) = (builder.temp(), builder.temp(), builder.temp());
        let main = returning(&mut builder, 0);
        builder.entrypoint(main);
        let mut program = builder.finish();

        let add = Tail::PrimCall(Prim::Add, vec![p.into(), 1.into()]);
        let code = Code::bind(
            vec![x],
            add.clone(),
            Code::bind(vec![y], add, Code::Done(Tail::Return(vec![x.into(), y.into()]))),
        );
        let (code, log) = flow(&mut program, code);

        assert_eq!(
            Some(&Tail::Return(vec![x.into(), x.into()])),
            code.end_tail()
        );
        assert!(log.mentions("reuse"));
    }

    #[test]
    fn stores_invalidate_earlier_loads() {
        let mut builder = ProgramBuilder::new();
        let (p, a, b) = (builder.temp(), builder.temp(), builder.temp());
        let main = returning(&mut builder, 0);
        builder.entrypoint(main);
        let mut program = builder.finish();

        let load = Tail::PrimCall(Prim::Load, vec![p.into()]);
        let code = Code::bind(
            vec![a],
            load.clone(),
            Code::bind(
                vec![TempId::WILDCARD],
                Tail::PrimCall(Prim::Store, vec![p.into(), 1.into()]),
                Code::bind(vec![b], load, Code::Done(Tail::Return(vec![a.into(), b.into()]))),
            ),
        );
        let (code, log) = flow(&mut program, code);

        assert_eq!(
            Some(&Tail::Return(vec![a.into(), b.into()])),
            code.end_tail()
        );
        assert!(!log.mentions("reuse"));
    }

    #[test]
    fn cases_on_known_constructors_are_resolved() {
        let mut builder = ProgramBuilder::new();
        let choice = builder.data("Choice", &[("Yes", 0), ("No", 0)]);
        let yes = returning(&mut builder, 1);
        let no = returning(&mut builder, 0);
        let c = builder.temp();
        builder.entrypoint(yes);
        builder.entrypoint(no);
        let mut program = builder.finish();

        let code = Code::bind(
            vec![c],
            Tail::DataAlloc(choice[1].clone(), vec![]),
            Code::Case {
                scrutinee: c.into(),
                alts: Alts::new(
                    vec![CfunAlt {
                        cfun: choice[0].clone(),
                        call: BlockCall::new(yes, vec![]),
                    }],
                    Fallback::DefAlt(BlockCall::new(no, vec![])),
                ),
            },
        );
        let (code, log) = flow(&mut program, code);

        assert_eq!(Some(&Code::call(BlockCall::new(no, vec![]))), code.rest());
        assert!(log.mentions("case on known"));
    }
}

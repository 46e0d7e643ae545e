//! Specialising blocks and closures for the arguments they are called with.
//!
//! When some arguments of a call are known allocations or constants, a copy of the callee is
//! made that rebuilds them itself, so that flow can use what is known about them inside the
//! callee. Copies are remembered by the definition they came from and reused for later calls
//! with the same pattern of arguments. The depth limit stops a copy of a copy of a copy ... from
//! going on forever.
//!
//! A call whose result is immediately branched on or entered can also be replaced by a call to a
//! copy that does that itself with the value it would have returned. The branch travels as a
//! closure, so flow inside the copy sees the value before the branch is taken.

use super::{
    facts::{Fact, Facts},
    Optimiser,
};
use crate::{
    mil::{
        ArgPattern, Atom, Block, BlockCall, BlockId, ClosureDefn, ClosureId, Code, Origin, Tail,
        TempId, TempSubst,
    },
    prelude::*,
};

impl Optimiser<'_> {
    /// What is known about each argument, and the atoms to pass in its place.
    fn arg_patterns(
        &self,
        args: &[Atom],
        facts: &Facts,
        constants: bool,
    ) -> (Vec<ArgPattern>, Vec<Atom>) {
        let mut pattern = vec![];
        let mut passed = vec![];
        for arg in args {
            match facts.about(self.program, arg) {
                Some(Fact::Tail(Tail::DataAlloc(cfun, fields))) if !fields.is_empty() => {
                    pattern.push(ArgPattern::Data(cfun));
                    passed.extend(fields);
                }
                Some(Fact::Tail(Tail::ClosAlloc(k, fields))) => {
                    pattern.push(ArgPattern::Closure(k));
                    passed.extend(fields);
                }
                Some(fact) if fact.cfun().is_some() => {
                    pattern.push(fact.cfun().cloned().map_or(ArgPattern::Unknown, ArgPattern::Tag));
                    passed.push(arg.clone());
                }
                _ if constants && arg.is_constant() => pattern.push(ArgPattern::Value(arg.clone())),
                _ => {
                    pattern.push(ArgPattern::Unknown);
                    passed.push(arg.clone());
                }
            }
        }
        (pattern, passed)
    }

    /// Whether a pattern is worth a specialised copy: it must remove at least one argument.
    fn worth_deriving(pattern: &[ArgPattern]) -> bool {
        pattern.iter().any(|p| {
            matches!(
                p,
                ArgPattern::Data(_) | ArgPattern::Closure(_) | ArgPattern::Value(_)
            )
        })
    }

    fn fresh_param(&mut self, param: TempId) -> TempId {
        if param.is_wildcard() {
            self.program.temps.fresh()
        } else {
            self.program.temps.fresh_like(param)
        }
    }

    /// A copy of `code` taking the arguments described by `pattern` in place of `params`.
    fn specialise_code(
        &mut self,
        params: &[TempId],
        code: &Code,
        pattern: &[ArgPattern],
    ) -> InternalResult<(Vec<TempId>, Code)> {
        if params.len() != pattern.len() {
            return Err(InternalError::arity("specialisation", params.len(), pattern.len()));
        }
        let mut subst = TempSubst::new();
        let mut new_params = vec![];
        let mut inits = vec![];
        let mut asserts = vec![];
        for (param, pat) in params.iter().zip(pattern) {
            let fields = match pat {
                ArgPattern::Data(cfun) => cfun.arity(),
                ArgPattern::Closure(k) => self.program.closure(*k)?.stored.len(),
                ArgPattern::Value(atom) => {
                    subst.extend(*param, atom.clone());
                    continue;
                }
                ArgPattern::Unknown | ArgPattern::Tag(_) => {
                    let p = self.fresh_param(*param);
                    new_params.push(p);
                    subst.extend(*param, p.into());
                    if let ArgPattern::Tag(cfun) = pat {
                        asserts.push((p, cfun.clone()));
                    }
                    continue;
                }
            };
            let fields = self.program.temps.fresh_n(fields);
            let atoms = fields.iter().map(|f| Atom::Temp(*f)).collect();
            new_params.extend(fields);
            let p = self.fresh_param(*param);
            subst.extend(*param, p.into());
            inits.push((
                p,
                match pat {
                    ArgPattern::Closure(k) => Tail::ClosAlloc(*k, atoms),
                    ArgPattern::Data(cfun) => Tail::DataAlloc(cfun.clone(), atoms),
                    _ => unreachable!("only allocations have fields"),
                },
            ));
        }

        let mut code = code.copy_fresh(&mut self.program.temps, &mut subst)?;
        for (p, cfun) in asserts.into_iter().rev() {
            code = Code::assert(p.into(), cfun, code);
        }
        for (p, tail) in inits.into_iter().rev() {
            code = Code::bind(vec![p], tail, code);
        }
        Ok((new_params, code))
    }

    /// Call a copy of the callee specialised for arguments with known constructors.
    pub(super) fn derive_with_known_cons(
        &mut self,
        bc: &BlockCall,
        facts: &Facts,
    ) -> InternalResult<Option<BlockCall>> {
        let constants = !self.program.is_recursive(bc.target.into())?;
        let (pattern, args) = self.arg_patterns(&bc.args, facts, constants);
        if !Self::worth_deriving(&pattern) {
            return Ok(None);
        }
        let block = self.program.block(bc.target)?;
        if block.params.len() != bc.args.len() {
            return Err(InternalError::arity(
                format!("call to {}", bc.target),
                block.params.len(),
                bc.args.len(),
            ));
        }
        if matches!(&block.origin, Origin::KnownCons { pattern: p, .. } if *p == pattern) {
            return Ok(None);
        }
        let depth = block.origin.depth() + 1;
        if depth > self.options.derive_depth_limit {
            return Ok(None);
        }

        let cached = block.derived.iter().copied().find(|d| {
            self.program.block(*d).is_ok_and(
                |b| matches!(&b.origin, Origin::KnownCons { pattern: p, .. } if *p == pattern),
            )
        });
        let target = match cached {
            Some(target) => target,
            None => {
                let (params, code) = {
                    let block = block.clone();
                    self.specialise_code(&block.params, &block.code, &pattern)?
                };
                let target = self.add_derived_block(bc.target, params, code, Origin::KnownCons {
                    pattern: pattern.clone(),
                    depth,
                })?;
                self.flow_block(target)?;
                target
            }
        };
        let derived = BlockCall::new(target, args);
        let pattern: Vec<_> = pattern.iter().map(ToString::to_string).collect();
        self.report(format!("{bc} calls {derived}, specialised for [{}]", pattern.join(", ")));
        Ok(Some(derived))
    }

    fn add_derived_block(
        &mut self,
        original: BlockId,
        params: Vec<TempId>,
        code: Code,
        origin: Origin,
    ) -> InternalResult<BlockId> {
        let mut block = Block::new(params, code);
        block.origin = origin;
        let id = self.program.add_block(block);
        self.program.block_mut(original)?.derived.push(id);
        trace!("derived {id} from {original}");
        Ok(id)
    }

    /// Allocate a copy of a closure specialised for stored fields with known constructors.
    /// The copy calls a new block holding the specialised body.
    pub(super) fn derive_closure(
        &mut self,
        k: ClosureId,
        args: &[Atom],
        facts: &Facts,
    ) -> InternalResult<Option<(ClosureId, Vec<Atom>)>> {
        let constants = !self.program.is_recursive(k.into())?;
        let (pattern, passed) = self.arg_patterns(args, facts, constants);
        if !Self::worth_deriving(&pattern) {
            return Ok(None);
        }
        let closure = self.program.closure(k)?.clone();
        if closure.stored.len() != args.len() {
            return Err(InternalError::arity(
                format!("allocation of {k}"),
                closure.stored.len(),
                args.len(),
            ));
        }
        if matches!(&closure.origin, Origin::KnownCons { pattern: p, .. } if *p == pattern) {
            return Ok(None);
        }
        let depth = closure.origin.depth() + 1;
        if depth > self.options.derive_depth_limit {
            return Ok(None);
        }

        let cached = closure.derived.iter().copied().find(|d| {
            self.program.closure(*d).is_ok_and(
                |c| matches!(&c.origin, Origin::KnownCons { pattern: p, .. } if *p == pattern),
            )
        });
        let derived = match cached {
            Some(derived) => derived,
            None => {
                let params: Vec<_> =
                    closure.stored.iter().chain(&closure.params).copied().collect();
                let mut full = pattern.clone();
                full.extend(closure.params.iter().map(|_| ArgPattern::Unknown));
                let (block_params, code) =
                    self.specialise_code(&params, &Code::Done(closure.tail.clone()), &full)?;

                let stored = self.program.temps.fresh_n(block_params.len() - closure.params.len());
                let new_params = self.program.temps.fresh_like_all(&closure.params);
                let call_args = stored
                    .iter()
                    .chain(&new_params)
                    .map(|t| Atom::Temp(*t))
                    .collect();

                let mut block = Block::new(block_params, code);
                block.origin = Origin::KnownCons {
                    pattern: full,
                    depth,
                };
                let body = self.program.add_block(block);
                let mut derived = ClosureDefn::new(stored, new_params, Tail::call(body, call_args));
                derived.origin = Origin::KnownCons {
                    pattern: pattern.clone(),
                    depth,
                };
                let derived = self.program.add_closure(derived);
                self.program.closure_mut(k)?.derived.push(derived);
                self.flow_block(body)?;
                derived
            }
        };
        self.report(format!("{k} allocation specialised as {derived}"));
        Ok(Some((derived, passed)))
    }

    /// Call a copy of the callee taking a variable that is passed more than once only once.
    pub(super) fn derive_with_duplicate_args(
        &mut self,
        bc: &BlockCall,
    ) -> InternalResult<Option<BlockCall>> {
        let dups: Vec<Option<usize>> = bc
            .args
            .iter()
            .enumerate()
            .map(|(i, a)| match a {
                Atom::Temp(_) => bc.args[..i].iter().position(|b| b == a),
                _ => None,
            })
            .collect();
        if dups.iter().all(Option::is_none) {
            return Ok(None);
        }
        let block = self.program.block(bc.target)?;
        if block.params.len() != bc.args.len() {
            return Err(InternalError::arity(
                format!("call to {}", bc.target),
                block.params.len(),
                bc.args.len(),
            ));
        }
        let depth = block.origin.depth() + 1;
        if depth > self.options.derive_depth_limit {
            return Ok(None);
        }

        let cached = block.derived.iter().copied().find(|d| {
            self.program.block(*d).is_ok_and(
                |b| matches!(&b.origin, Origin::DuplicateArgs { dups: d, .. } if *d == dups),
            )
        });
        let target = match cached {
            Some(target) => target,
            None => {
                let block = block.clone();
                let mut subst = TempSubst::new();
                let mut params = vec![];
                let mut kept: Vec<TempId> = vec![];
                for (param, dup) in block.params.iter().zip(&dups) {
                    let p = match dup {
                        Some(j) => kept[*j],
                        None => {
                            let p = self.fresh_param(*param);
                            params.push(p);
                            p
                        }
                    };
                    kept.push(p);
                    subst.extend(*param, p.into());
                }
                let code = block.code.copy_fresh(&mut self.program.temps, &mut subst)?;
                self.add_derived_block(
                    bc.target,
                    params,
                    code,
                    Origin::DuplicateArgs {
                        dups: dups.clone(),
                        depth,
                    },
                )?
            }
        };
        let args = bc
            .args
            .iter()
            .zip(&dups)
            .filter(|(_, dup)| dup.is_none())
            .map(|(a, _)| a.clone())
            .collect();
        let derived = BlockCall::new(target, args);
        self.report(format!("{bc} passes each variable once to {derived}"));
        Ok(Some(derived))
    }
}

/// What a block derived by [`Optimiser::derive_handoff`] does with the value its source returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handoff {
    /// Enter the closure passed as the last argument with the value.
    Cont,
    /// Enter the value with the last `arity` arguments.
    Enter { arity: usize },
}
impl Handoff {
    fn extra_params(self) -> usize {
        match self {
            Handoff::Cont => 1,
            Handoff::Enter { arity } => arity,
        }
    }

    fn origin(self, depth: usize) -> Origin {
        match self {
            Handoff::Cont => Origin::Cont { depth },
            Handoff::Enter { arity } => Origin::Enter { arity, depth },
        }
    }
}

impl Optimiser<'_> {
    /// Can calls to `b` be replaced by calls to a copy that passes its result on to a
    /// continuation? Every copy made for `b` also copies the blocks it branches to, so nothing
    /// it reaches may be recursive.
    fn continuation_candidate(&self, b: BlockId) -> InternalResult<bool> {
        let block = self.program.block(b)?;
        Ok(!matches!(block.code, Code::Done(_))
            && block.origin.depth() < self.options.derive_depth_limit
            && self.program.reaches_no_recursion(b.into())?)
    }

    /// Replace `v <- bc; case v of ...` (or `if v ...`) in `src` with a call to a copy of the
    /// callee that enters a closure holding the branch once it has the value of `v`.
    pub(super) fn cases_on(
        &mut self,
        src: BlockId,
        vars: &[TempId],
        bc: &BlockCall,
        rest: &Code,
    ) -> InternalResult<Option<Code>> {
        let &[v] = vars else {
            return Ok(None);
        };
        let branches_on_v = match rest {
            Code::Case {
                scrutinee: Atom::Temp(t),
                ..
            }
            | Code::If {
                test: Atom::Temp(t),
                ..
            } => *t == v,
            _ => false,
        };
        if !branches_on_v || !self.continuation_candidate(bc.target)? {
            return Ok(None);
        }

        // A block for the branch, taking everything it reads.
        let free = rest.free_temps();
        let params = self.program.temps.fresh_like_all(&free);
        let mut subst = TempSubst::new();
        subst.rename(&free, &params)?;
        let code = rest.copy_fresh(&mut self.program.temps, &mut subst)?;
        let branch = self.program.add_block(Block::new(params, code));

        // A closure storing everything but `v`, which it takes as its argument.
        let stored: Vec<_> = free.iter().copied().filter(|t| *t != v).collect();
        let fields = self.program.temps.fresh_like_all(&stored);
        let arg = self.program.temps.fresh_like(v);
        let mut subst = TempSubst::new();
        subst.rename(&stored, &fields)?;
        subst.rename(&[v], &[arg])?;
        let free_atoms: Vec<Atom> = free.iter().map(|t| Atom::Temp(*t)).collect();
        let body = Tail::call(branch, subst.apply_all(&free_atoms));
        let k = self
            .program
            .add_closure(ClosureDefn::new(fields, vec![arg], body));

        let cont = self.program.temps.fresh();
        let derived = self.derive_handoff(bc.target, Handoff::Cont)?;
        let mut args = bc.args.clone();
        args.push(cont.into());
        self.report(format!("pushed case on {v} into {} in {src}", bc.target));
        let stored = stored.into_iter().map(Atom::Temp).collect();
        Ok(Some(Code::bind(
            vec![cont],
            Tail::ClosAlloc(k, stored),
            Code::call(BlockCall::new(derived, args)),
        )))
    }

    /// Replace `f <- bc; f @ [args]` with a call to a copy of the callee that enters the value
    /// it would have returned itself.
    pub(super) fn enters(
        &mut self,
        src: BlockId,
        vars: &[TempId],
        bc: &BlockCall,
        rest: &Code,
    ) -> InternalResult<Option<Code>> {
        let &[f] = vars else {
            return Ok(None);
        };
        let Code::Done(Tail::Enter(Atom::Temp(g), iargs)) = rest else {
            return Ok(None);
        };
        if *g != f || iargs.contains(&Atom::Temp(f)) {
            return Ok(None);
        }
        let block = self.program.block(bc.target)?;
        if block.origin.depth() >= self.options.derive_depth_limit {
            return Ok(None);
        }
        let handoff = Handoff::Enter {
            arity: iargs.len(),
        };
        let derived = self.derive_handoff(bc.target, handoff)?;
        let args = bc.args.iter().chain(iargs).cloned().collect();
        self.report(format!("pushed enter into {} in {src}", bc.target));
        Ok(Some(Code::call(BlockCall::new(derived, args))))
    }

    /// A copy of `b` taking extra parameters, and handing the value it would have returned to
    /// them. Blocks that `b` branches or jumps to are derived in the same way.
    fn derive_handoff(&mut self, b: BlockId, handoff: Handoff) -> InternalResult<BlockId> {
        let block = self.program.block(b)?;
        let origin = handoff.origin(block.origin.depth() + 1);
        let cached = block
            .derived
            .iter()
            .copied()
            .find(|d| self.program.block(*d).is_ok_and(|x| x.origin == origin));
        if let Some(derived) = cached {
            return Ok(derived);
        }

        let block = block.clone();
        let mut subst = TempSubst::new();
        let mut params = vec![];
        for param in &block.params {
            let p = self.fresh_param(*param);
            subst.extend(*param, p.into());
            params.push(p);
        }
        let extras = self.program.temps.fresh_n(handoff.extra_params());
        params.extend(&extras);
        let code = block.code.copy_fresh(&mut self.program.temps, &mut subst)?;

        // Registered before its body is built, so that jumps back to `b` reuse it.
        let id = self.add_derived_block(b, params, Code::Done(Tail::Return(vec![])), origin)?;
        let code = self.hand_off(code, handoff, &extras)?;
        self.program.block_mut(id)?.code = code;
        Ok(id)
    }

    fn hand_off(
        &mut self,
        code: Code,
        handoff: Handoff,
        extras: &[TempId],
    ) -> InternalResult<Code> {
        Ok(match code {
            Code::Bind { vars, tail, rest } => {
                Code::bind(vars, tail, self.hand_off(*rest, handoff, extras)?)
            }
            Code::Assert { atom, cfun, rest } => {
                Code::assert(atom, cfun, self.hand_off(*rest, handoff, extras)?)
            }
            Code::Done(Tail::BlockCall(bc)) => {
                Code::call(self.call_with_handoff(&bc, handoff, extras)?)
            }
            Code::Done(tail) => {
                if tail.blackholes() || self.program.tail_doesnt_return(&tail)? {
                    return Ok(Code::Done(tail));
                }
                let v = self.program.temps.fresh();
                let extras: Vec<Atom> = extras.iter().map(|t| Atom::Temp(*t)).collect();
                let enter = match handoff {
                    Handoff::Cont => Tail::Enter(extras[0].clone(), vec![v.into()]),
                    Handoff::Enter { .. } => Tail::Enter(v.into(), extras),
                };
                Code::bind(vec![v], tail, Code::Done(enter))
            }
            Code::If {
                test,
                if_true,
                if_false,
            } => Code::If {
                test,
                if_true: self.call_with_handoff(&if_true, handoff, extras)?,
                if_false: self.call_with_handoff(&if_false, handoff, extras)?,
            },
            Code::Case {
                scrutinee,
                mut alts,
            } => {
                for bc in alts.calls_mut() {
                    *bc = self.call_with_handoff(bc, handoff, extras)?;
                }
                Code::Case { scrutinee, alts }
            }
        })
    }

    fn call_with_handoff(
        &mut self,
        bc: &BlockCall,
        handoff: Handoff,
        extras: &[TempId],
    ) -> InternalResult<BlockCall> {
        let target = self.derive_handoff(bc.target, handoff)?;
        let args = bc
            .args
            .iter()
            .cloned()
            .chain(extras.iter().map(|t| Atom::Temp(*t)))
            .collect();
        Ok(BlockCall::new(target, args))
    }
}

//! Hooks for the passes that run around the optimiser: the specialiser, which produces
//! monomorphic copies of definitions, and the representation transform, which replaces
//! operations on specially represented types after optimisation.

use super::{
    Atom, Block, BlockCall, BlockId, ClosureDefn, ClosureId, Code, DefnId, Program, Tail, TempId,
    TempSubst, TopLevel, TopRef, Type,
};
use crate::{ext::TryMapSlice, prelude::*};

/// Rewrites representation-changing operations, one tail at a time.
pub trait RepTransform {
    /// The replacement for `tail`, or [`None`] to keep it. New definitions needed by the
    /// replacement can be added to `program`.
    fn transform_tail(
        &mut self,
        program: &mut Program,
        tail: &Tail,
    ) -> InternalResult<Option<Tail>>;
}

/// Decides where the copies made by [`Program::specialize`] point to.
pub trait Specialize {
    fn block(&mut self, id: BlockId) -> BlockId {
        id
    }

    fn closure(&mut self, id: ClosureId) -> ClosureId {
        id
    }

    fn top(&mut self, r: TopRef) -> TopRef {
        r
    }

    fn ty(&mut self, ty: &Type) -> Type {
        ty.clone()
    }
}

impl Program {
    /// Apply a representation transform to every tail of every definition, returning the number
    /// of tails replaced. The program is checked again afterwards.
    pub fn rep_transform<R: RepTransform>(&mut self, transform: &mut R) -> InternalResult<usize> {
        let mut changed = 0;
        for defn in self.defns() {
            match defn {
                DefnId::Block(id) => {
                    let mut code = self.block(id)?.code.clone();
                    let mut result = Ok(());
                    code.visit_tails_mut(&mut |tail| {
                        if result.is_ok() {
                            match transform.transform_tail(self, tail) {
                                Ok(Some(t)) => {
                                    *tail = t;
                                    changed += 1;
                                }
                                Ok(None) => {}
                                Err(e) => result = Err(e),
                            }
                        }
                    });
                    result?;
                    self.block_mut(id)?.code = code;
                }
                DefnId::Closure(id) => {
                    let tail = self.closure(id)?.tail.clone();
                    if let Some(t) = transform.transform_tail(self, &tail)? {
                        self.closure_mut(id)?.tail = t;
                        changed += 1;
                    }
                }
                DefnId::Top(id) => {
                    let tail = self.top(id)?.tail.clone();
                    if let Some(t) = transform.transform_tail(self, &tail)? {
                        self.top_mut(id)?.tail = t;
                        changed += 1;
                    }
                }
            }
        }
        debug!("representation transform replaced {changed} tail(s)");
        self.check()?;
        Ok(changed)
    }

    /// Add a copy of `defn` with every temporary renamed, types mapped and references
    /// redirected by `spec`.
    pub fn specialize<S: Specialize>(
        &mut self,
        defn: DefnId,
        spec: &mut S,
    ) -> InternalResult<DefnId> {
        let mut subst = TempSubst::new();
        Ok(match defn {
            DefnId::Block(id) => {
                let block = self.block(id)?.clone();
                let params = self.specialize_temps(&block.params, &mut subst, spec)?;
                let code = self.specialize_code(&block.code, &mut subst, spec)?;
                self.add_block(Block::new(params, code)).into()
            }
            DefnId::Closure(id) => {
                let k = self.closure(id)?.clone();
                let stored = self.specialize_temps(&k.stored, &mut subst, spec)?;
                let params = self.specialize_temps(&k.params, &mut subst, spec)?;
                let tail = specialize_tail(&k.tail, &subst, spec);
                self.add_closure(ClosureDefn::new(stored, params, tail)).into()
            }
            DefnId::Top(id) => {
                let top = self.top(id)?.clone();
                let lhs = top
                    .lhs
                    .iter()
                    .map(|lhs| {
                        let mut lhs = lhs.clone();
                        lhs.ty = lhs.ty.as_ref().map(|ty| spec.ty(ty));
                        lhs
                    })
                    .collect();
                let tail = specialize_tail(&top.tail, &subst, spec);
                self.add_top(TopLevel::new(lhs, tail)).into()
            }
        })
    }

    fn specialize_temps<S: Specialize>(
        &mut self,
        temps: &[TempId],
        subst: &mut TempSubst,
        spec: &mut S,
    ) -> InternalResult<Vec<TempId>> {
        let fresh = temps.try_map(|t| {
            if t.is_wildcard() {
                return Ok::<_, InternalError>(*t);
            }
            let ty = self.temps.ty(*t).map(|ty| spec.ty(ty));
            Ok(self.temps.fresh_typed(ty))
        })?;
        subst.rename(temps, &fresh)?;
        Ok(fresh)
    }

    fn specialize_code<S: Specialize>(
        &mut self,
        code: &Code,
        subst: &mut TempSubst,
        spec: &mut S,
    ) -> InternalResult<Code> {
        let redirect = |bc: &BlockCall, subst: &TempSubst, spec: &mut S| {
            BlockCall::new(spec.block(bc.target), subst.apply_all(&bc.args))
        };
        Ok(match code {
            Code::Done(t) => Code::Done(specialize_tail(t, subst, spec)),
            Code::Bind { vars, tail, rest } => {
                let tail = specialize_tail(tail, subst, spec);
                let vars = self.specialize_temps(vars, subst, spec)?;
                Code::bind(vars, tail, self.specialize_code(rest, subst, spec)?)
            }
            Code::Assert { atom, cfun, rest } => Code::assert(
                specialize_atom(atom, subst, spec),
                cfun.clone(),
                self.specialize_code(rest, subst, spec)?,
            ),
            Code::If {
                test,
                if_true,
                if_false,
            } => Code::If {
                test: specialize_atom(test, subst, spec),
                if_true: redirect(if_true, subst, spec),
                if_false: redirect(if_false, subst, spec),
            },
            Code::Case { scrutinee, alts } => {
                let mut alts = alts.clone();
                for bc in alts.calls_mut() {
                    *bc = redirect(bc, subst, spec);
                }
                Code::Case {
                    scrutinee: specialize_atom(scrutinee, subst, spec),
                    alts,
                }
            }
        })
    }
}

fn specialize_atom<S: Specialize>(atom: &Atom, subst: &TempSubst, spec: &mut S) -> Atom {
    match subst.apply(atom) {
        Atom::Top(r) => Atom::Top(spec.top(r)),
        atom => atom,
    }
}

fn specialize_tail<S: Specialize>(tail: &Tail, subst: &TempSubst, spec: &mut S) -> Tail {
    let mut tail = tail.apply(subst);
    for atom in tail.atoms_mut() {
        if let Atom::Top(r) = atom {
            *r = spec.top(*r);
        }
    }
    match &mut tail {
        Tail::BlockCall(bc) => bc.target = spec.block(bc.target),
        Tail::ClosAlloc(k, _) => *k = spec.closure(*k),
        _ => {}
    }
    tail
}

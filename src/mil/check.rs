//! Structural validation of programs.
//!
//! The optimiser relies on these invariants everywhere; checking them up front turns a
//! malformed input into an [`InternalError`] rather than a wrong rewrite later on.

use std::collections::HashSet;

use super::{Alts, Atom, Code, DefnId, Fallback, Program, Tail, TempId};
use crate::error::{InternalError, InternalResult};

impl Program {
    /// Check every definition that is still part of the program.
    pub fn check(&self) -> InternalResult<()> {
        for defn in self.defns() {
            self.check_defn(defn)?;
        }
        Ok(())
    }

    pub fn check_defn(&self, defn: DefnId) -> InternalResult<()> {
        let mut bound = HashSet::new();
        match defn {
            DefnId::Block(id) => {
                let block = self.block(id)?;
                self.bind_all(defn, &mut bound, &block.params)?;
                self.check_code(defn, &mut bound, &block.code)
            }
            DefnId::Closure(id) => {
                let k = self.closure(id)?;
                self.bind_all(defn, &mut bound, &k.stored)?;
                self.bind_all(defn, &mut bound, &k.params)?;
                self.check_tail(defn, &k.tail)
            }
            DefnId::Top(id) => {
                let top = self.top(id)?;
                self.check_tail(defn, &top.tail)?;
                match top.tail.output_arity() {
                    Some(n) if n != top.lhs.len() => Err(InternalError::arity(
                        format!("top-level {id}"),
                        top.lhs.len(),
                        n,
                    )),
                    _ => Ok(()),
                }
            }
        }
    }

    fn bind_all(
        &self,
        defn: DefnId,
        bound: &mut HashSet<TempId>,
        vars: &[TempId],
    ) -> InternalResult<()> {
        for var in vars {
            if !var.is_wildcard() && !bound.insert(*var) {
                return Err(InternalError::RepeatedBinding { var: *var, defn });
            }
        }
        Ok(())
    }

    fn check_atom(&self, defn: DefnId, atom: &Atom) -> InternalResult<()> {
        match atom {
            Atom::Temp(t) if t.is_wildcard() => Err(InternalError::WildcardRead(defn)),
            Atom::Top(r) => {
                if r.index < self.top(r.top)?.lhs.len() {
                    Ok(())
                } else {
                    Err(InternalError::UndefinedTopLevel {
                        defn: r.top.into(),
                        index: r.index,
                    })
                }
            }
            _ => Ok(()),
        }
    }

    fn check_args(&self, context: String, expected: usize, args: &[Atom]) -> InternalResult<()> {
        if expected == args.len() {
            Ok(())
        } else {
            Err(InternalError::arity(context, expected, args.len()))
        }
    }

    pub(crate) fn check_tail(&self, defn: DefnId, tail: &Tail) -> InternalResult<()> {
        for atom in tail.atoms() {
            self.check_atom(defn, atom)?;
        }
        match tail {
            Tail::BlockCall(bc) => {
                let params = self.block(bc.target)?.params.len();
                self.check_args(format!("call to {}", bc.target), params, &bc.args)
            }
            Tail::ClosAlloc(k, args) => {
                let stored = self.closure(*k)?.stored.len();
                self.check_args(format!("allocation of {k}"), stored, args)
            }
            Tail::DataAlloc(cfun, args) => {
                cfun.validate()?;
                self.check_args(format!("allocation of {cfun}"), cfun.arity(), args)
            }
            Tail::Sel(cfun, index, _) => {
                cfun.validate()?;
                if *index < cfun.arity() {
                    Ok(())
                } else {
                    Err(InternalError::SelIndexOutOfRange {
                        cfun: cfun.name().to_string(),
                        index: *index,
                        arity: cfun.arity(),
                    })
                }
            }
            Tail::PrimCall(p, args) => self.check_args(format!("call to {p}"), p.arity(), args),
            Tail::Return(_) | Tail::Enter(..) => Ok(()),
        }
    }

    fn check_code(
        &self,
        defn: DefnId,
        bound: &mut HashSet<TempId>,
        code: &Code,
    ) -> InternalResult<()> {
        match code {
            Code::Done(t) => self.check_tail(defn, t),
            Code::Bind { vars, tail, rest } => {
                self.check_tail(defn, tail)?;
                if let Some(n) = tail.output_arity() {
                    if n != vars.len() {
                        return Err(InternalError::arity(
                            format!("binding of {tail} in {defn}"),
                            vars.len(),
                            n,
                        ));
                    }
                }
                self.bind_all(defn, bound, vars)?;
                self.check_code(defn, bound, rest)
            }
            Code::Assert { atom, cfun, rest } => {
                self.check_atom(defn, atom)?;
                cfun.validate()?;
                self.check_code(defn, bound, rest)
            }
            Code::If {
                test,
                if_true,
                if_false,
            } => {
                self.check_atom(defn, test)?;
                self.check_tail(defn, &Tail::BlockCall(if_true.clone()))?;
                self.check_tail(defn, &Tail::BlockCall(if_false.clone()))
            }
            Code::Case { scrutinee, alts } => {
                self.check_atom(defn, scrutinee)?;
                for bc in alts.calls() {
                    self.check_tail(defn, &Tail::BlockCall(bc.clone()))?;
                }
                self.check_alts(defn, alts)
            }
        }
    }

    /// No constructor may appear twice, and a case without a default must cover every
    /// constructor of its type.
    pub(crate) fn check_alts(&self, defn: DefnId, alts: &Alts) -> InternalResult<()> {
        let mut seen = HashSet::new();
        for alt in &alts.alts {
            alt.cfun.validate()?;
            if !seen.insert(alt.cfun.clone()) {
                return Err(InternalError::DuplicateAlternative {
                    cfun: alt.cfun.name().to_string(),
                    defn,
                });
            }
        }
        if let (Fallback::FailAlt, Some(first)) = (&alts.fallback, alts.alts.first()) {
            if let Some(missing) = self
                .datatypes
                .siblings(&first.cfun)?
                .iter()
                .find(|c| !seen.contains(*c))
            {
                return Err(InternalError::NonExhaustiveCase {
                    cfun: missing.name().to_string(),
                    defn,
                });
            }
        }
        Ok(())
    }
}

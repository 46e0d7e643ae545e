//! Code sequences.

use std::fmt::{self, Display, Formatter};

use super::{Atom, BlockCall, Cfun, Tail, TempId, TempSubst, Temps};
use crate::error::{InternalError, InternalResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfunAlt {
    pub cfun: Cfun,
    pub call: BlockCall,
}

/// What happens when a case matches none of its constructor alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    DefAlt(BlockCall),
    /// No default is needed, because the alternatives cover every constructor.
    FailAlt,
}

/// The alternatives of a case. No constructor appears twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alts {
    pub alts: Vec<CfunAlt>,
    pub fallback: Fallback,
}
impl Alts {
    pub fn new(alts: Vec<CfunAlt>, fallback: Fallback) -> Self {
        Self { alts, fallback }
    }

    pub fn default_call(&self) -> Option<&BlockCall> {
        match &self.fallback {
            Fallback::DefAlt(bc) => Some(bc),
            Fallback::FailAlt => None,
        }
    }

    /// The call taken when the scrutinee was built with `cfun`.
    pub fn select(&self, cfun: &Cfun) -> Option<&BlockCall> {
        self.alts
            .iter()
            .find(|alt| alt.cfun == *cfun)
            .map(|alt| &alt.call)
            .or_else(|| self.default_call())
    }

    /// Every call of the case, alternatives first.
    pub fn calls(&self) -> impl Iterator<Item = &BlockCall> {
        self.alts
            .iter()
            .map(|alt| &alt.call)
            .chain(self.default_call())
    }

    pub fn calls_mut(&mut self) -> impl Iterator<Item = &mut BlockCall> {
        let default = match &mut self.fallback {
            Fallback::DefAlt(bc) => Some(bc),
            Fallback::FailAlt => None,
        };
        self.alts.iter_mut().map(|alt| &mut alt.call).chain(default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Code {
    Done(Tail),
    Bind {
        vars: Vec<TempId>,
        tail: Tail,
        rest: Box<Code>,
    },
    /// Continue with `rest`, knowing that `atom` was built with `cfun`.
    Assert {
        atom: Atom,
        cfun: Cfun,
        rest: Box<Code>,
    },
    If {
        test: Atom,
        if_true: BlockCall,
        if_false: BlockCall,
    },
    Case {
        scrutinee: Atom,
        alts: Alts,
    },
}
impl Code {
    pub fn bind(vars: Vec<TempId>, tail: Tail, rest: Code) -> Code {
        Code::Bind {
            vars,
            tail,
            rest: Box::new(rest),
        }
    }

    pub fn assert(atom: Atom, cfun: Cfun, rest: Code) -> Code {
        Code::Assert {
            atom,
            cfun,
            rest: Box::new(rest),
        }
    }

    pub fn call(bc: BlockCall) -> Code {
        Code::Done(Tail::BlockCall(bc))
    }

    /// The code that follows this statement in a straight-line sequence.
    pub fn rest(&self) -> Option<&Code> {
        match self {
            Code::Bind { rest, .. } | Code::Assert { rest, .. } => Some(rest),
            _ => None,
        }
    }

    /// The tail ending a straight-line sequence.
    pub fn end_tail(&self) -> Option<&Tail> {
        match self {
            Code::Done(t) => Some(t),
            Code::Bind { rest, .. } | Code::Assert { rest, .. } => rest.end_tail(),
            Code::If { .. } | Code::Case { .. } => None,
        }
    }

    /// Is this a straight-line sequence of at most `limit` bindings?
    pub fn is_small(&self, limit: usize) -> bool {
        match self {
            Code::Done(_) => true,
            Code::Bind { rest, .. } => limit > 0 && rest.is_small(limit - 1),
            Code::Assert { rest, .. } => rest.is_small(limit),
            Code::If { .. } | Code::Case { .. } => false,
        }
    }

    /// Replace the tail `t` ending this sequence with `vars <- t; rest`.
    pub fn and_then(self, vars: Vec<TempId>, rest: Code) -> InternalResult<Code> {
        Ok(match self {
            Code::Done(tail) => Code::bind(vars, tail, rest),
            Code::Bind {
                vars: vs,
                tail,
                rest: r,
            } => Code::bind(vs, tail, (*r).and_then(vars, rest)?),
            Code::Assert {
                atom,
                cfun,
                rest: r,
            } => Code::assert(atom, cfun, (*r).and_then(vars, rest)?),
            Code::If { .. } => return Err(InternalError::NotStraightLine("conditional")),
            Code::Case { .. } => return Err(InternalError::NotStraightLine("case")),
        })
    }

    /// Apply a substitution to every atom. Bound variables are left alone.
    pub fn apply(&self, subst: &TempSubst) -> Code {
        match self {
            Code::Done(t) => Code::Done(t.apply(subst)),
            Code::Bind { vars, tail, rest } => {
                Code::bind(vars.clone(), tail.apply(subst), rest.apply(subst))
            }
            Code::Assert { atom, cfun, rest } => {
                Code::assert(subst.apply(atom), cfun.clone(), rest.apply(subst))
            }
            Code::If {
                test,
                if_true,
                if_false,
            } => Code::If {
                test: subst.apply(test),
                if_true: if_true.apply(subst),
                if_false: if_false.apply(subst),
            },
            Code::Case { scrutinee, alts } => {
                let mut alts = alts.clone();
                for bc in alts.calls_mut() {
                    *bc = bc.apply(subst);
                }
                Code::Case {
                    scrutinee: subst.apply(scrutinee),
                    alts,
                }
            }
        }
    }

    /// Copy this code, giving every bound variable a fresh name. The renaming is added to
    /// `subst`, which is also applied to every atom.
    pub fn copy_fresh(&self, temps: &mut Temps, subst: &mut TempSubst) -> InternalResult<Code> {
        Ok(match self {
            Code::Bind { vars, tail, rest } => {
                let tail = tail.apply(subst);
                let fresh = temps.fresh_like_all(vars);
                subst.rename(vars, &fresh)?;
                Code::bind(fresh, tail, rest.copy_fresh(temps, subst)?)
            }
            Code::Assert { atom, cfun, rest } => {
                Code::assert(subst.apply(atom), cfun.clone(), rest.copy_fresh(temps, subst)?)
            }
            _ => self.apply(subst),
        })
    }

    pub fn visit_tails<F: FnMut(&Tail)>(&self, f: &mut F) {
        match self {
            Code::Done(t) => f(t),
            Code::Bind { tail, rest, .. } => {
                f(tail);
                rest.visit_tails(f)
            }
            Code::Assert { rest, .. } => rest.visit_tails(f),
            Code::If { .. } | Code::Case { .. } => {}
        }
    }

    pub fn visit_tails_mut<F: FnMut(&mut Tail)>(&mut self, f: &mut F) {
        match self {
            Code::Done(t) => f(t),
            Code::Bind { tail, rest, .. } => {
                f(tail);
                rest.visit_tails_mut(f)
            }
            Code::Assert { rest, .. } => rest.visit_tails_mut(f),
            Code::If { .. } | Code::Case { .. } => {}
        }
    }

    /// Visit every block call: those in tails, and the branches of conditionals and cases.
    pub fn visit_calls<F: FnMut(&BlockCall)>(&self, f: &mut F) {
        match self {
            Code::Done(Tail::BlockCall(bc)) => f(bc),
            Code::Done(_) => {}
            Code::Bind { tail, rest, .. } => {
                if let Tail::BlockCall(bc) = tail {
                    f(bc);
                }
                rest.visit_calls(f)
            }
            Code::Assert { rest, .. } => rest.visit_calls(f),
            Code::If {
                if_true, if_false, ..
            } => {
                f(if_true);
                f(if_false);
            }
            Code::Case { alts, .. } => alts.calls().for_each(f),
        }
    }

    pub fn visit_calls_mut<F: FnMut(&mut BlockCall)>(&mut self, f: &mut F) {
        match self {
            Code::Done(Tail::BlockCall(bc)) => f(bc),
            Code::Done(_) => {}
            Code::Bind { tail, rest, .. } => {
                if let Tail::BlockCall(bc) = tail {
                    f(bc);
                }
                rest.visit_calls_mut(f)
            }
            Code::Assert { rest, .. } => rest.visit_calls_mut(f),
            Code::If {
                if_true, if_false, ..
            } => {
                f(if_true);
                f(if_false);
            }
            Code::Case { alts, .. } => alts.calls_mut().for_each(f),
        }
    }

    /// Visit every atom that is read by this code.
    pub fn visit_atoms<F: FnMut(&Atom)>(&self, f: &mut F) {
        match self {
            Code::Done(t) => t.atoms().into_iter().for_each(f),
            Code::Bind { tail, rest, .. } => {
                tail.atoms().into_iter().for_each(&mut *f);
                rest.visit_atoms(f)
            }
            Code::Assert { atom, rest, .. } => {
                f(atom);
                rest.visit_atoms(f)
            }
            Code::If {
                test,
                if_true,
                if_false,
            } => {
                f(test);
                if_true.args.iter().chain(&if_false.args).for_each(f)
            }
            Code::Case { scrutinee, alts } => {
                f(scrutinee);
                alts.calls().flat_map(|bc| &bc.args).for_each(f)
            }
        }
    }

    /// Variables bound by this code, in order.
    pub fn bound_temps(&self) -> Vec<TempId> {
        let mut bound = vec![];
        let mut code = self;
        while let Some(rest) = code.rest() {
            if let Code::Bind { vars, .. } = code {
                bound.extend(vars.iter().copied());
            }
            code = rest;
        }
        bound
    }

    pub fn display(&self, indent: usize) -> CodeDisplay<'_> {
        CodeDisplay { code: self, indent }
    }
}
impl Display for Code {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.display(0).fmt(f)
    }
}

/// Displays code with every line indented by the same amount.
pub struct CodeDisplay<'a> {
    code: &'a Code,
    indent: usize,
}
impl Display for CodeDisplay<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let pad = " ".repeat(self.indent);
        let mut code = self.code;
        loop {
            match code {
                Code::Done(t) => return write!(f, "{pad}{t}"),
                Code::Bind { vars, tail, rest } => {
                    if vars.len() == 1 {
                        writeln!(f, "{pad}{} <- {tail}", vars[0])?;
                    } else {
                        let vars: Vec<_> = vars.iter().map(ToString::to_string).collect();
                        writeln!(f, "{pad}[{}] <- {tail}", vars.join(", "))?;
                    }
                    code = rest;
                }
                Code::Assert { atom, cfun, rest } => {
                    writeln!(f, "{pad}assert {atom} {cfun}")?;
                    code = rest;
                }
                Code::If {
                    test,
                    if_true,
                    if_false,
                } => return write!(f, "{pad}if {test} then {if_true} else {if_false}"),
                Code::Case { scrutinee, alts } => {
                    write!(f, "{pad}case {scrutinee} of")?;
                    for alt in &alts.alts {
                        write!(f, "\n{pad}    {} -> {}", alt.cfun, alt.call)?;
                    }
                    if let Fallback::DefAlt(bc) = &alts.fallback {
                        write!(f, "\n{pad}    _ -> {bc}")?;
                    }
                    return Ok(());
                }
            }
        }
    }
}

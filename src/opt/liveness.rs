//! Liveness: bindings nobody reads become wildcards, and constant top-levels are propagated.

use std::collections::HashSet;

use super::Optimiser;
use crate::{
    mil::{Atom, BlockCall, Code, Tail, TempId, TopRef},
    prelude::*,
};

impl Optimiser<'_> {
    /// Remove dead variables from `code`, working backwards from its end.
    pub(super) fn liveness(&mut self, code: Code) -> InternalResult<Code> {
        Ok(self.live_code(code)?.0)
    }

    fn live_code(&mut self, code: Code) -> InternalResult<(Code, HashSet<TempId>)> {
        Ok(match code {
            Code::Done(tail) => {
                let tail = self.replace_tops(&tail).unwrap_or(tail);
                let live = tail.temps().collect();
                (Code::Done(tail), live)
            }
            Code::Bind { vars, tail, rest } => {
                let (rest, mut live) = self.live_code(*rest)?;
                let tail = self.replace_tops(&tail).unwrap_or(tail);
                let vars = vars
                    .into_iter()
                    .map(|v| {
                        if v.is_wildcard() || live.contains(&v) {
                            v
                        } else {
                            self.report(format!("{v} is never used"));
                            TempId::WILDCARD
                        }
                    })
                    .collect::<Vec<_>>();
                if vars.iter().all(|v| v.is_wildcard()) && tail.has_no_effect() {
                    self.report(format!("dropped unused {tail}"));
                    return Ok((rest, live));
                }
                for v in &vars {
                    live.remove(v);
                }
                live.extend(tail.temps());
                (Code::bind(vars, tail, rest), live)
            }
            Code::Assert { atom, cfun, rest } => {
                let (rest, mut live) = self.live_code(*rest)?;
                match atom {
                    Atom::Temp(t) if !live.contains(&t) => {
                        self.report(format!("assert {t} {cfun} is never used"));
                        (rest, live)
                    }
                    atom => {
                        live.extend(atom.as_temp());
                        (Code::assert(atom, cfun, rest), live)
                    }
                }
            }
            Code::If {
                test,
                if_true,
                if_false,
            } => {
                let test = self.replace_top_atom(&test).unwrap_or(test);
                let if_true = self.replace_call_tops(if_true);
                let if_false = self.replace_call_tops(if_false);
                let live = test
                    .as_temp()
                    .into_iter()
                    .chain(call_temps(&if_true))
                    .chain(call_temps(&if_false))
                    .collect();
                let code = Code::If {
                    test,
                    if_true,
                    if_false,
                };
                (code, live)
            }
            Code::Case {
                scrutinee,
                mut alts,
            } => {
                let scrutinee = self.replace_top_atom(&scrutinee).unwrap_or(scrutinee);
                for bc in alts.calls_mut() {
                    *bc = self.replace_call_tops(bc.clone());
                }
                let mut live: HashSet<_> = scrutinee.as_temp().into_iter().collect();
                for bc in alts.calls() {
                    live.extend(call_temps(bc));
                }
                (Code::Case { scrutinee, alts }, live)
            }
        })
    }

    /// The value of a reference to a top-level that just returns constants or other top-levels.
    fn replace_top_atom(&mut self, atom: &Atom) -> Option<Atom> {
        let Atom::Top(TopRef { top, index }) = atom else {
            return None;
        };
        let Ok(defn) = self.program.top(*top) else {
            return None;
        };
        let Tail::Return(values) = &defn.tail else {
            return None;
        };
        match values.get(*index)? {
            value @ (Atom::Word(_) | Atom::Flag(_) | Atom::Top(_)) if value != atom => {
                let value = value.clone();
                self.report(format!("replace {atom} with {value}"));
                Some(value)
            }
            _ => None,
        }
    }

    /// Replace references to constant top-levels in `tail`, if there are any.
    pub(super) fn replace_tops(&mut self, tail: &Tail) -> Option<Tail> {
        let mut tail = tail.clone();
        let mut changed = false;
        for atom in tail.atoms_mut() {
            if let Some(value) = self.replace_top_atom(atom) {
                *atom = value;
                changed = true;
            }
        }
        changed.then_some(tail)
    }

    fn replace_call_tops(&mut self, mut bc: BlockCall) -> BlockCall {
        for atom in &mut bc.args {
            if let Some(value) = self.replace_top_atom(atom) {
                *atom = value;
            }
        }
        bc
    }
}

fn call_temps(bc: &BlockCall) -> impl Iterator<Item = TempId> + '_ {
    bc.args.iter().filter_map(Atom::as_temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mil::{Prim, Program, ProgramBuilder},
        opt::{NullObserver, OptimiserOptions},
    };

    fn live(program: &mut Program, code: Code) -> (Code, usize) {
        let mut observer = NullObserver;
        let mut optimiser = Optimiser::new(program, OptimiserOptions::default(), &mut observer);
        let code = optimiser.liveness(code).unwrap();
        (code, optimiser.count)
    }

    #[test]
    fn unread_variables_become_wildcards() {
        let mut builder = ProgramBuilder::new();
        let (f, y) = (builder.temp(), builder.temp());
        let code = Code::bind(
            vec![y],
            Tail::Enter(f.into(), vec![Atom::Word(1)]),
            Code::Done(Tail::ret(f.into())),
        );
        let (code, count) = live(builder.program(), code);

        assert_eq!(1, count);
        assert_eq!("_ <- t1 @ [1]\nreturn t1", code.to_string());
    }

    #[test]
    fn unread_bindings_without_effects_are_dropped() {
        let mut builder = ProgramBuilder::new();
        let (x, y) = (builder.temp(), builder.temp());
        let code = Code::bind(
            vec![x],
            Tail::PrimCall(Prim::Load, vec![Atom::Word(8)]),
            Code::bind(
                vec![y],
                Tail::PrimCall(Prim::Add, vec![x.into(), Atom::Word(1)]),
                Code::Done(Tail::ret(Atom::Word(0))),
            ),
        );
        let (code, count) = live(builder.program(), code);

        assert_eq!(4, count);
        assert_eq!("return 0", code.to_string());
    }

    #[test]
    fn unused_asserts_are_dropped() {
        let mut builder = ProgramBuilder::new();
        let cfuns = builder.data("List", &[("Nil", 0), ("Cons", 2)]);
        let x = builder.temp();
        let code = Code::assert(x.into(), cfuns[1].clone(), Code::Done(Tail::ret(Atom::Word(0))));
        let (code, count) = live(builder.program(), code);

        assert_eq!(1, count);
        assert_eq!("return 0", code.to_string());
    }

    #[test]
    fn constant_top_levels_are_propagated() {
        let mut builder = ProgramBuilder::new();
        let top = builder.top(&["answer"], Tail::ret(Atom::Word(42)));
        let code = Code::Done(Tail::PrimCall(Prim::Add, vec![Atom::top(top, 0), Atom::Word(1)]));
        let (code, count) = live(builder.program(), code);

        assert_eq!(1, count);
        assert_eq!("add(42, 1)", code.to_string());
    }

    #[test]
    fn allocated_top_levels_stay_referenced() {
        let mut builder = ProgramBuilder::new();
        let cfuns = builder.data("List", &[("Nil", 0), ("Cons", 2)]);
        let top = builder.top(&["nil"], Tail::DataAlloc(cfuns[0].clone(), vec![]));
        let code = Code::Done(Tail::ret(Atom::top(top, 0)));
        let (code, count) = live(builder.program(), code);

        assert_eq!(0, count);
        assert_eq!("return top0.0", code.to_string());
    }
}

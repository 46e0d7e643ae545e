//! Counting references to definitions.

use crate::{
    mil::{Atom, Code, DefnId, Program, Tail},
    prelude::*,
};

impl Program {
    /// Recompute [`crate::mil::DefnMeta::occurs`] and [`crate::mil::DefnMeta::calls`] for every
    /// definition still in the program.
    pub fn count_occurrences(&mut self) -> InternalResult<()> {
        let defns = self.defns();
        for defn in self.all_defns() {
            let meta = self.meta_mut(defn)?;
            meta.occurs = 0;
            meta.calls = 0;
            meta.entrypoint = false;
        }
        for entry in self.entrypoints.clone() {
            if let Ok(meta) = self.meta_mut(entry) {
                meta.occurs += 1;
                meta.entrypoint = true;
            }
        }

        let mut refs = vec![];
        for defn in &defns {
            match defn {
                DefnId::Block(id) => code_refs(&self.block(*id)?.code, &mut refs),
                DefnId::Closure(id) => tail_refs(&self.closure(*id)?.tail, false, &mut refs),
                DefnId::Top(id) => tail_refs(&self.top(*id)?.tail, true, &mut refs),
            }
        }
        for (defn, called) in refs {
            let meta = self.meta_mut(defn)?;
            meta.occurs += 1;
            if called {
                meta.calls += 1;
            }
        }
        Ok(())
    }
}

/// Collects every reference made by a tail. Block calls are marked when they are non-tail
/// calls, which need the callee to be compiled as a function.
fn tail_refs(tail: &Tail, non_tail: bool, refs: &mut Vec<(DefnId, bool)>) {
    match tail {
        Tail::BlockCall(bc) => refs.push((bc.target.into(), non_tail)),
        Tail::ClosAlloc(k, _) => refs.push(((*k).into(), false)),
        _ => {}
    }
    for atom in tail.atoms() {
        if let Atom::Top(r) = atom {
            refs.push((r.top.into(), false));
        }
    }
}

fn code_refs(code: &Code, refs: &mut Vec<(DefnId, bool)>) {
    match code {
        Code::Done(t) => tail_refs(t, false, refs),
        Code::Bind { tail, rest, .. } => {
            tail_refs(tail, true, refs);
            code_refs(rest, refs)
        }
        Code::Assert { atom, rest, .. } => {
            if let Atom::Top(r) = atom {
                refs.push((r.top.into(), false));
            }
            code_refs(rest, refs)
        }
        Code::If { .. } | Code::Case { .. } => code.visit_atoms(&mut |atom| {
            if let Atom::Top(r) = atom {
                refs.push((r.top.into(), false));
            }
        }),
    }
    match code {
        Code::If {
            if_true, if_false, ..
        } => {
            refs.push((if_true.target.into(), false));
            refs.push((if_false.target.into(), false));
        }
        Code::Case { alts, .. } => {
            refs.extend(alts.calls().map(|bc| (bc.target.into(), false)));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Diagnostics,
        mil::{BlockCall, ProgramBuilder, TempId},
    };

    #[test]
    fn occurrences_count_every_reference() {
        let mut builder = ProgramBuilder::new();
        let x = builder.temp();
        let leaf = builder.block(vec![], Code::Done(Tail::Return(vec![])));
        let k = builder.closure(vec![], vec![], Tail::call(leaf, vec![]));
        let main = builder.block(
            vec![],
            Code::bind(
                vec![x],
                Tail::call(leaf, vec![]),
                Code::bind(
                    vec![TempId::WILDCARD],
                    Tail::ClosAlloc(k, vec![]),
                    Code::If {
                        test: true.into(),
                        if_true: BlockCall::new(leaf, vec![]),
                        if_false: BlockCall::new(leaf, vec![]),
                    },
                ),
            ),
        );
        builder.entrypoint(main);
        let mut program = builder.finish();
        program.compute_sccs(&mut Diagnostics::new()).unwrap();
        program.count_occurrences().unwrap();

        let leaf = &program.block(leaf).unwrap().meta;
        assert_eq!(4, leaf.occurs);
        assert_eq!(1, leaf.calls);
        assert_eq!(1, program.closure(k).unwrap().meta.occurs);
        let main = &program.block(main).unwrap().meta;
        assert_eq!(1, main.occurs);
        assert!(main.entrypoint);
    }
}

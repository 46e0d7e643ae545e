//! Free variables and argument lists.

use crate::{
    mil::{Atom, BlockId, Code, DefnId, Program, TempId},
    prelude::*,
};

impl Code {
    /// Temporaries read but not bound by this code, in order of first use.
    pub fn free_temps(&self) -> Vec<TempId> {
        let mut free = vec![];
        let mut bound = vec![];
        let mut code = self;
        loop {
            let mut read = |atom: &Atom| {
                if let Atom::Temp(t) = atom {
                    if !bound.contains(t) && !free.contains(t) {
                        free.push(*t);
                    }
                }
            };
            match code {
                Code::Bind { vars, tail, rest } => {
                    tail.atoms().into_iter().for_each(&mut read);
                    bound.extend(vars.iter().copied());
                    code = rest;
                }
                Code::Assert { atom, rest, .. } => {
                    read(atom);
                    code = rest;
                }
                _ => {
                    code.visit_atoms(&mut read);
                    return free;
                }
            }
        }
    }
}

impl Program {
    /// The parameters (and stored fields) of a definition that its body actually reads, in
    /// order. After unused arguments have been removed, this is every parameter.
    pub fn live_args(&self, defn: DefnId) -> InternalResult<Vec<TempId>> {
        Ok(match defn {
            DefnId::Block(id) => {
                let block = self.block(id)?;
                let free = block.code.free_temps();
                block
                    .params
                    .iter()
                    .copied()
                    .filter(|p| free.contains(p))
                    .collect()
            }
            DefnId::Closure(id) => {
                let k = self.closure(id)?;
                let read: Vec<_> = k.tail.temps().collect();
                k.stored
                    .iter()
                    .chain(&k.params)
                    .copied()
                    .filter(|p| read.contains(p))
                    .collect()
            }
            DefnId::Top(_) => vec![],
        })
    }

    /// Extend the parameters of a block with the variables its body reads without binding,
    /// returning the added parameters. Every call to the block must then pass them too.
    pub fn add_args(&mut self, id: BlockId) -> InternalResult<Vec<TempId>> {
        let block = self.block_mut(id)?;
        let added: Vec<_> = block
            .code
            .free_temps()
            .into_iter()
            .filter(|t| !block.params.contains(t))
            .collect();
        block.params.extend(added.iter().copied());
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mil::{Prim, ProgramBuilder, Tail};

    #[test]
    fn free_temps_skip_bound_variables() {
        let mut builder = ProgramBuilder::new();
        let (a, b, x) = (builder.temp(), builder.temp(), builder.temp());
        let code = Code::bind(
            vec![x],
            Tail::PrimCall(Prim::Add, vec![b.into(), a.into()]),
            Code::Done(Tail::PrimCall(Prim::Mul, vec![x.into(), b.into()])),
        );
        assert_eq!(vec![b, a], code.free_temps());
    }

    #[test]
    fn add_args_appends_free_variables() {
        let mut builder = ProgramBuilder::new();
        let (p, y) = (builder.temp(), builder.temp());
        let b = builder.block(
            vec![p],
            Code::Done(Tail::PrimCall(Prim::Add, vec![y.into(), 1.into()])),
        );
        let mut program = builder.finish();

        assert_eq!(vec![y], program.add_args(b).unwrap());
        assert_eq!(vec![p, y], program.block(b).unwrap().params);
        assert_eq!(vec![y], program.live_args(b.into()).unwrap());
        assert_eq!(Vec::<TempId>::new(), program.add_args(b).unwrap());
    }
}

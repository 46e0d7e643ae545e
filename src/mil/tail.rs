//! Tails: the operations at the end of a binding or a block.

use std::fmt::{self, Display, Formatter};

use super::{Atom, AtomList, BlockId, Cfun, ClosureId, Prim, Purity, TempId, TempSubst};

/// A call to a block, passing arguments for each of its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockCall {
    pub target: BlockId,
    pub args: Vec<Atom>,
}
impl BlockCall {
    pub fn new(target: BlockId, args: Vec<Atom>) -> Self {
        Self { target, args }
    }

    pub fn apply(&self, subst: &TempSubst) -> BlockCall {
        BlockCall::new(self.target, subst.apply_all(&self.args))
    }
}
impl Display for BlockCall {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}[{}]", self.target, AtomList(&self.args))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tail {
    Return(Vec<Atom>),
    /// Enter the closure `f` with the given arguments.
    Enter(Atom, Vec<Atom>),
    BlockCall(BlockCall),
    DataAlloc(Cfun, Vec<Atom>),
    ClosAlloc(ClosureId, Vec<Atom>),
    /// Select the field with the given index from a value built with the constructor.
    Sel(Cfun, usize, Atom),
    PrimCall(Prim, Vec<Atom>),
}
impl Tail {
    pub fn ret(atom: Atom) -> Self {
        Tail::Return(vec![atom])
    }

    pub fn call(target: BlockId, args: Vec<Atom>) -> Self {
        Tail::BlockCall(BlockCall::new(target, args))
    }

    pub fn purity(&self) -> Purity {
        match self {
            Tail::Return(_) | Tail::DataAlloc(..) | Tail::ClosAlloc(..) | Tail::Sel(..) => {
                Purity::Pure
            }
            Tail::Enter(..) | Tail::BlockCall(_) => Purity::Impure,
            Tail::PrimCall(p, _) => p.purity(),
        }
    }

    pub fn is_pure(&self) -> bool {
        self.purity().is_pure()
    }

    pub fn is_repeatable(&self) -> bool {
        self.purity().is_repeatable()
    }

    pub fn has_no_effect(&self) -> bool {
        self.purity().has_no_effect()
    }

    /// Tails that can never complete, whatever the program around them.
    pub fn blackholes(&self) -> bool {
        matches!(self, Tail::PrimCall(p, _) if p.blackholes())
    }

    pub fn is_allocator(&self) -> bool {
        matches!(self, Tail::DataAlloc(..) | Tail::ClosAlloc(..))
    }

    pub fn as_block_call(&self) -> Option<&BlockCall> {
        match self {
            Tail::BlockCall(bc) => Some(bc),
            _ => None,
        }
    }

    /// Number of values this tail produces, where that can be seen from the tail alone.
    pub fn output_arity(&self) -> Option<usize> {
        match self {
            Tail::Return(atoms) => Some(atoms.len()),
            Tail::DataAlloc(..) | Tail::ClosAlloc(..) | Tail::Sel(..) => Some(1),
            Tail::PrimCall(p, _) if p.blackholes() => None,
            Tail::PrimCall(p, _) => Some(p.results()),
            Tail::Enter(..) | Tail::BlockCall(_) => None,
        }
    }

    pub fn atoms(&self) -> Vec<&Atom> {
        match self {
            Tail::Return(args)
            | Tail::BlockCall(BlockCall { args, .. })
            | Tail::DataAlloc(_, args)
            | Tail::ClosAlloc(_, args)
            | Tail::PrimCall(_, args) => args.iter().collect(),
            Tail::Enter(f, args) => std::iter::once(f).chain(args).collect(),
            Tail::Sel(_, _, a) => vec![a],
        }
    }

    pub fn atoms_mut(&mut self) -> Vec<&mut Atom> {
        match self {
            Tail::Return(args)
            | Tail::BlockCall(BlockCall { args, .. })
            | Tail::DataAlloc(_, args)
            | Tail::ClosAlloc(_, args)
            | Tail::PrimCall(_, args) => args.iter_mut().collect(),
            Tail::Enter(f, args) => std::iter::once(f).chain(args.iter_mut()).collect(),
            Tail::Sel(_, _, a) => vec![a],
        }
    }

    /// Temporaries read by this tail.
    pub fn temps(&self) -> impl Iterator<Item = TempId> + '_ {
        self.atoms().into_iter().filter_map(Atom::as_temp)
    }

    pub fn mentions(&self, temp: TempId) -> bool {
        self.atoms().into_iter().any(|a| a.mentions(temp))
    }

    pub fn apply(&self, subst: &TempSubst) -> Tail {
        if subst.is_empty() {
            return self.clone();
        }
        let mut tail = self.clone();
        for atom in tail.atoms_mut() {
            *atom = subst.apply(atom);
        }
        tail
    }
}
impl Display for Tail {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Tail::Return(args) if args.len() == 1 => write!(f, "return {}", args[0]),
            Tail::Return(args) => write!(f, "return [{}]", AtomList(args)),
            Tail::Enter(c, args) => write!(f, "{c} @ [{}]", AtomList(args)),
            Tail::BlockCall(bc) => write!(f, "{bc}"),
            Tail::DataAlloc(cfun, args) => write!(f, "{cfun}({})", AtomList(args)),
            Tail::ClosAlloc(k, args) => write!(f, "{k}{{{}}}", AtomList(args)),
            Tail::Sel(cfun, index, a) => write!(f, "sel {cfun} {index} {a}"),
            Tail::PrimCall(p, args) => write!(f, "{p}({})", AtomList(args)),
        }
    }
}

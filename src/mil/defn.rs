//! Definitions: blocks, closure definitions and top-level bindings, and the ids referring to
//! them.

use std::fmt::{self, Display, Formatter};

use super::{Atom, Cfun, Code, Tail, TempId, Type};
use crate::analysis::SccId;

macro_rules! defn_id {
    ($(#[$attr:meta])* $name:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);
        impl $name {
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
        impl Display for $name {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

defn_id!(
    /// Identifies a [`Block`] within its program.
    BlockId,
    "b"
);
defn_id!(
    /// Identifies a [`ClosureDefn`] within its program.
    ClosureId,
    "k"
);
defn_id!(TopId, "top");

/// Any definition of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefnId {
    Block(BlockId),
    Closure(ClosureId),
    Top(TopId),
}
impl From<BlockId> for DefnId {
    fn from(id: BlockId) -> Self {
        DefnId::Block(id)
    }
}
impl From<ClosureId> for DefnId {
    fn from(id: ClosureId) -> Self {
        DefnId::Closure(id)
    }
}
impl From<TopId> for DefnId {
    fn from(id: TopId) -> Self {
        DefnId::Top(id)
    }
}
impl Display for DefnId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DefnId::Block(id) => write!(f, "{id}"),
            DefnId::Closure(id) => write!(f, "{id}"),
            DefnId::Top(id) => write!(f, "{id}"),
        }
    }
}

/// Information about a definition computed by the whole-program analyses. None of it is part of
/// the definition's meaning, and all of it is recomputed after passes that change the call graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefnMeta {
    /// Number of references to the definition, plus one if it is an entrypoint.
    pub occurs: usize,
    /// Number of non-tail calls to the definition.
    pub calls: usize,
    pub doesnt_return: bool,
    pub scc: Option<SccId>,
    pub entrypoint: bool,
}

/// What is known about one argument of a call when deriving a specialised definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPattern {
    /// Nothing is known; the argument is passed unchanged.
    Unknown,
    /// A data allocation with this constructor; its fields are passed instead.
    Data(Cfun),
    /// A closure allocation for this definition; its stored fields are passed instead.
    Closure(ClosureId),
    /// The argument is built with this constructor, but the fields are not known. The argument
    /// is still passed, and the derived definition asserts its constructor.
    Tag(Cfun),
    /// The argument is this constant, so it does not need to be passed at all.
    Value(Atom),
}
impl ArgPattern {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ArgPattern::Unknown)
    }
}
impl Display for ArgPattern {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ArgPattern::Unknown => write!(f, "_"),
            ArgPattern::Data(cfun) => write!(f, "{cfun}(..)"),
            ArgPattern::Closure(k) => write!(f, "{k}{{..}}"),
            ArgPattern::Tag(cfun) => write!(f, "{cfun}?"),
            ArgPattern::Value(atom) => write!(f, "{atom}"),
        }
    }
}

/// How a definition came to exist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Origin {
    #[default]
    Source,
    /// Specialised for arguments with known constructors.
    KnownCons {
        pattern: Vec<ArgPattern>,
        depth: usize,
    },
    /// Specialised for a call that passes the same variable more than once. `dups[i]` holds
    /// the earlier position that argument `i` duplicates.
    DuplicateArgs {
        dups: Vec<Option<usize>>,
        depth: usize,
    },
    /// Takes a closure as an extra, last parameter and enters it with the value the source
    /// would have returned.
    Cont { depth: usize },
    /// Takes `arity` extra parameters and enters the value the source would have returned
    /// with them.
    Enter { arity: usize, depth: usize },
}
impl Origin {
    /// Number of derivation steps between this definition and the source program.
    pub fn depth(&self) -> usize {
        match self {
            Origin::Source => 0,
            Origin::KnownCons { depth, .. }
            | Origin::DuplicateArgs { depth, .. }
            | Origin::Cont { depth }
            | Origin::Enter { depth, .. } => *depth,
        }
    }
}

/// A basic block: a parameterised code sequence, entered by a [`super::BlockCall`].
#[derive(Debug, Clone)]
pub struct Block {
    pub params: Vec<TempId>,
    pub code: Code,
    pub meta: DefnMeta,
    pub origin: Origin,
    /// Blocks specialised from this one, which may be reused for calls with the same pattern.
    pub derived: Vec<BlockId>,
    /// Set when duplicate elimination found an equivalent block to use instead.
    pub replace_with: Option<BlockId>,
}
impl Block {
    pub fn new(params: Vec<TempId>, code: Code) -> Self {
        Self {
            params,
            code,
            meta: DefnMeta::default(),
            origin: Origin::Source,
            derived: vec![],
            replace_with: None,
        }
    }

    /// A goto block does nothing but pass control to another block.
    pub fn is_goto(&self) -> bool {
        match &self.code {
            Code::Done(Tail::BlockCall(bc)) => !self.params.is_empty() || bc.args.is_empty(),
            _ => false,
        }
    }
}

/// A closure definition `k{stored} [params] = tail`.
#[derive(Debug, Clone)]
pub struct ClosureDefn {
    pub stored: Vec<TempId>,
    pub params: Vec<TempId>,
    pub tail: Tail,
    pub meta: DefnMeta,
    pub origin: Origin,
    pub derived: Vec<ClosureId>,
    pub replace_with: Option<ClosureId>,
}
impl ClosureDefn {
    pub fn new(stored: Vec<TempId>, params: Vec<TempId>, tail: Tail) -> Self {
        Self {
            stored,
            params,
            tail,
            meta: DefnMeta::default(),
            origin: Origin::Source,
            derived: vec![],
            replace_with: None,
        }
    }
}

/// One of the values bound by a top-level definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLhs {
    pub name: String,
    pub ty: Option<Type>,
}
impl TopLhs {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }
}

/// A top-level binding `lhs <- tail`, evaluated once when the program starts.
#[derive(Debug, Clone)]
pub struct TopLevel {
    pub lhs: Vec<TopLhs>,
    pub tail: Tail,
    pub meta: DefnMeta,
}
impl TopLevel {
    pub fn new(lhs: Vec<TopLhs>, tail: Tail) -> Self {
        Self {
            lhs,
            tail,
            meta: DefnMeta::default(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.lhs.iter().map(|lhs| lhs.name.clone()).collect()
    }
}

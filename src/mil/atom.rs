//! Atoms: the operands of every tail.

use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use super::{Scalar, TempId, TopId};

/// A reference to one of the values computed by a top-level definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopRef {
    pub top: TopId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Atom {
    Temp(TempId),
    Word(i64),
    Flag(bool),
    /// A component of a top-level definition.
    Top(TopRef),
    /// A symbol defined outside of the program, such as a memory area.
    Extern(Rc<str>),
}
impl Atom {
    pub fn top(top: TopId, index: usize) -> Self {
        Atom::Top(TopRef { top, index })
    }

    pub fn external<S: Into<Rc<str>>>(name: S) -> Self {
        Atom::Extern(name.into())
    }

    pub fn as_temp(&self) -> Option<TempId> {
        match self {
            Atom::Temp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Atom::Word(w) => Some(Scalar::Word(*w)),
            Atom::Flag(b) => Some(Scalar::Flag(*b)),
            _ => None,
        }
    }

    pub fn as_word(&self) -> Option<i64> {
        match self {
            Atom::Word(w) => Some(*w),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Atom::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Scalar constants; these never change and never need a register of their own.
    pub fn is_constant(&self) -> bool {
        matches!(self, Atom::Word(_) | Atom::Flag(_))
    }

    /// Does this atom refer to the given temporary?
    pub fn mentions(&self, temp: TempId) -> bool {
        self.as_temp() == Some(temp)
    }
}
impl From<TempId> for Atom {
    fn from(temp: TempId) -> Self {
        Atom::Temp(temp)
    }
}
impl From<i64> for Atom {
    fn from(word: i64) -> Self {
        Atom::Word(word)
    }
}
impl From<bool> for Atom {
    fn from(flag: bool) -> Self {
        Atom::Flag(flag)
    }
}
impl From<Scalar> for Atom {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Word(w) => Atom::Word(w),
            Scalar::Flag(b) => Atom::Flag(b),
        }
    }
}
impl Display for Atom {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Atom::Temp(t) => write!(f, "{t}"),
            Atom::Word(w) => write!(f, "{w}"),
            Atom::Flag(b) => write!(f, "{b}"),
            Atom::Top(TopRef { top, index }) => write!(f, "{top}.{index}"),
            Atom::Extern(name) => write!(f, "@{name}"),
        }
    }
}

/// Formats a list of atoms separated by commas.
pub struct AtomList<'a>(pub &'a [Atom]);
impl Display for AtomList<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for (i, atom) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{atom}")?;
        }
        Ok(())
    }
}

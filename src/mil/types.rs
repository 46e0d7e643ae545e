//! Types attached to temporaries by the front end. The optimiser only carries and substitutes
//! them, it never infers them.

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A type variable, numbered by the type checker.
    Var(usize),
    /// A type constructor applied to arguments.
    Con(String, Vec<Type>),
}
impl Type {
    pub fn con<S: Into<String>>(name: S, args: Vec<Type>) -> Self {
        Type::Con(name.into(), args)
    }

    pub fn word() -> Self {
        Type::con("Word", vec![])
    }

    pub fn flag() -> Self {
        Type::con("Flag", vec![])
    }

    /// Replaces type variables using the given substitution.
    pub fn apply(&self, subst: &[(usize, Type)]) -> Type {
        match self {
            Type::Var(v) => subst
                .iter()
                .rev()
                .find(|(w, _)| w == v)
                .map(|(_, ty)| ty.clone())
                .unwrap_or_else(|| self.clone()),
            Type::Con(name, args) => {
                Type::Con(name.clone(), args.iter().map(|a| a.apply(subst)).collect())
            }
        }
    }

    pub fn is_monomorphic(&self) -> bool {
        match self {
            Type::Var(_) => false,
            Type::Con(_, args) => args.iter().all(Type::is_monomorphic),
        }
    }
}
impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Type::Var(v) => write!(f, "a{v}"),
            Type::Con(name, args) if args.is_empty() => write!(f, "{name}"),
            Type::Con(name, args) => {
                write!(f, "({name}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

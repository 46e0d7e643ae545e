//! Temporaries: the local variables of MIL code.
//!
//! Every temporary lives in a [`Temps`] arena owned by the program. Identity equality of
//! temporaries is equality of their [`TempId`]; copying code allocates new slots rather than
//! aliasing old ones.

use std::fmt::{self, Display, Formatter};

use super::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(u32);
impl TempId {
    /// The reserved, write-only variable `_`.
    pub const WILDCARD: TempId = TempId(0);

    pub fn is_wildcard(self) -> bool {
        self == Self::WILDCARD
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}
impl Display for TempId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_wildcard() {
            write!(f, "_")
        } else {
            write!(f, "t{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TempInfo {
    ty: Option<Type>,
}

/// Arena of temporaries.
#[derive(Debug, Clone)]
pub struct Temps {
    infos: Vec<TempInfo>,
}
impl Temps {
    pub fn new() -> Self {
        Self {
            infos: vec![TempInfo::default()],
        }
    }

    /// Generates a new unique temporary.
    pub fn fresh(&mut self) -> TempId {
        self.infos.push(TempInfo::default());
        TempId((self.infos.len() - 1) as u32)
    }

    /// Generates a new unique temporary with the given type.
    pub fn fresh_typed(&mut self, ty: Option<Type>) -> TempId {
        let temp = self.fresh();
        self.infos[temp.index()].ty = ty;
        temp
    }

    pub fn fresh_n(&mut self, n: usize) -> Vec<TempId> {
        (0..n).map(|_| self.fresh()).collect()
    }

    /// Generates a new temporary of the same type as `temp`. The wildcard stays the wildcard.
    pub fn fresh_like(&mut self, temp: TempId) -> TempId {
        if temp.is_wildcard() {
            temp
        } else {
            let ty = self.ty(temp).cloned();
            self.fresh_typed(ty)
        }
    }

    pub fn fresh_like_all(&mut self, temps: &[TempId]) -> Vec<TempId> {
        temps.iter().map(|t| self.fresh_like(*t)).collect()
    }

    pub fn ty(&self, temp: TempId) -> Option<&Type> {
        self.infos.get(temp.index()).and_then(|info| info.ty.as_ref())
    }

    pub fn set_ty(&mut self, temp: TempId, ty: Type) {
        if let Some(info) = self.infos.get_mut(temp.index()) {
            if !temp.is_wildcard() {
                info.ty = Some(ty);
            }
        }
    }

    /// Number of temporaries allocated so far, including the wildcard.
    pub fn len(&self) -> usize {
        self.infos.len()
    }
}
impl Default for Temps {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_generates_ascending_temps() {
        let mut temps = Temps::new();

        assert_eq!("t1", temps.fresh().to_string());
        assert_eq!("t2", temps.fresh().to_string());
    }

    #[test]
    fn wildcard_is_reserved() {
        let mut temps = Temps::new();
        let t = temps.fresh();

        assert!(TempId::WILDCARD.is_wildcard());
        assert!(!t.is_wildcard());
        assert_eq!("_", TempId::WILDCARD.to_string());
        assert_eq!(TempId::WILDCARD, temps.fresh_like(TempId::WILDCARD));
    }

    #[test]
    fn fresh_like_copies_the_type() {
        let mut temps = Temps::new();
        let t = temps.fresh_typed(Some(Type::word()));
        let u = temps.fresh_like(t);

        assert_ne!(t, u);
        assert_eq!(Some(&Type::word()), temps.ty(u));
    }

    #[test]
    fn the_wildcard_never_gets_a_type() {
        let mut temps = Temps::new();
        temps.set_ty(TempId::WILDCARD, Type::word());
        assert_eq!(None, temps.ty(TempId::WILDCARD));
    }
}

//! Substitutions of atoms for temporaries.

use super::{Atom, TempId};
use crate::error::{InternalError, InternalResult};

/// A finite map from temporaries to atoms. Later bindings shadow earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TempSubst {
    pairs: Vec<(TempId, Atom)>,
}
impl TempSubst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn lookup(&self, temp: TempId) -> Option<&Atom> {
        self.pairs
            .iter()
            .rev()
            .find(|(t, _)| *t == temp)
            .map(|(_, a)| a)
    }

    /// Map `temp` to `atom`. Mapping the wildcard has no effect.
    pub fn extend(&mut self, temp: TempId, atom: Atom) {
        if !temp.is_wildcard() {
            self.pairs.push((temp, atom));
        }
    }

    /// Map each of `temps` to the corresponding atom.
    pub fn bind(&mut self, temps: &[TempId], atoms: &[Atom]) -> InternalResult<()> {
        if temps.len() != atoms.len() {
            return Err(InternalError::arity(
                "substitution",
                temps.len(),
                atoms.len(),
            ));
        }
        for (temp, atom) in temps.iter().zip(atoms) {
            self.extend(*temp, atom.clone());
        }
        Ok(())
    }

    /// Map each of `from` to the corresponding temporary of `to`.
    pub fn rename(&mut self, from: &[TempId], to: &[TempId]) -> InternalResult<()> {
        let to: Vec<Atom> = to.iter().map(|t| Atom::Temp(*t)).collect();
        self.bind(from, &to)
    }

    /// Forget all mappings for `temps`, as required when they are bound again.
    pub fn remove(&mut self, temps: &[TempId]) {
        self.pairs.retain(|(t, _)| !temps.contains(t));
    }

    pub fn apply(&self, atom: &Atom) -> Atom {
        match atom {
            Atom::Temp(t) => self.lookup(*t).cloned().unwrap_or_else(|| atom.clone()),
            _ => atom.clone(),
        }
    }

    pub fn apply_all(&self, atoms: &[Atom]) -> Vec<Atom> {
        atoms.iter().map(|a| self.apply(a)).collect()
    }

    /// Like [`Self::apply`], but for a position that must hold a temporary.
    pub fn apply_temp(&self, temp: TempId) -> TempId {
        match self.lookup(temp) {
            Some(Atom::Temp(t)) => *t,
            _ => temp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mil::Temps;

    #[test]
    fn later_bindings_shadow_earlier_ones() {
        let mut temps = Temps::new();
        let x = temps.fresh();
        let mut subst = TempSubst::new();
        subst.extend(x, Atom::Word(1));
        subst.extend(x, Atom::Word(2));

        assert_eq!(Atom::Word(2), subst.apply(&x.into()));
        subst.remove(&[x]);
        assert_eq!(Atom::from(x), subst.apply(&x.into()));
        assert!(subst.is_empty());
    }

    #[test]
    fn bind_checks_arity() {
        let mut temps = Temps::new();
        let xs = temps.fresh_n(2);
        let mut subst = TempSubst::new();

        assert_eq!(
            Err(InternalError::arity("substitution", 2, 1)),
            subst.bind(&xs, &[Atom::Word(0)])
        );
    }

    #[test]
    fn wildcard_is_never_mapped() {
        let mut subst = TempSubst::new();
        subst.extend(TempId::WILDCARD, Atom::Word(3));
        assert!(subst.is_empty());
    }

    #[test]
    fn constants_are_unchanged() {
        let mut temps = Temps::new();
        let x = temps.fresh();
        let mut subst = TempSubst::new();
        subst.extend(x, Atom::Flag(true));
        assert_eq!(
            vec![Atom::Flag(true), Atom::Word(4)],
            subst.apply_all(&[x.into(), Atom::Word(4)])
        );
    }
}

//! Facts: what is known about the values of variables at a point in a code sequence.

use crate::mil::{Atom, Cfun, Program, Tail, TempId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    /// The variable holds the result of this tail.
    Tail(Tail),
    /// The variable holds a value built with this constructor.
    Cfun(Cfun),
}
impl Fact {
    /// The constructor of the value, if known.
    pub fn cfun(&self) -> Option<&Cfun> {
        match self {
            Fact::Tail(Tail::DataAlloc(cfun, _)) | Fact::Cfun(cfun) => Some(cfun),
            _ => None,
        }
    }

    pub fn tail(&self) -> Option<&Tail> {
        match self {
            Fact::Tail(t) => Some(t),
            Fact::Cfun(_) => None,
        }
    }
}

/// Facts in the order they were learned. Each variable is bound once, so a fact stays true for
/// the rest of the sequence unless an effect could change what it observed.
#[derive(Debug, Clone, Default)]
pub struct Facts {
    facts: Vec<(TempId, Fact)>,
}
impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn lookup(&self, temp: TempId) -> Option<&Fact> {
        self.facts
            .iter()
            .rev()
            .find(|(t, _)| *t == temp)
            .map(|(_, fact)| fact)
    }

    pub fn lookup_tail(&self, temp: TempId) -> Option<&Tail> {
        self.lookup(temp).and_then(Fact::tail)
    }

    /// A variable already holding the result of `tail`.
    pub fn find(&self, tail: &Tail) -> Option<TempId> {
        self.facts
            .iter()
            .rev()
            .find(|(_, fact)| matches!(fact, Fact::Tail(t) if t == tail))
            .map(|(t, _)| *t)
    }

    /// Forget everything about `vars`, including facts that mention them.
    pub fn kill(&mut self, vars: &[TempId]) {
        self.facts.retain(|(t, fact)| {
            !vars.contains(t)
                && match fact {
                    Fact::Tail(tail) => !vars.iter().any(|v| tail.mentions(*v)),
                    Fact::Cfun(_) => true,
                }
        });
    }

    /// Forget facts that an effect could invalidate.
    pub fn kill_non_pure(&mut self) {
        self.facts.retain(|(_, fact)| match fact {
            Fact::Tail(tail) => tail.is_pure(),
            Fact::Cfun(_) => true,
        });
    }

    pub fn add(&mut self, temp: TempId, tail: Tail) {
        if !temp.is_wildcard() {
            self.facts.push((temp, Fact::Tail(tail)));
        }
    }

    pub fn add_cfun(&mut self, temp: TempId, cfun: Cfun) {
        if !temp.is_wildcard() {
            self.facts.push((temp, Fact::Cfun(cfun)));
        }
    }

    /// What is known about `atom`: facts for temporaries, and the allocations of top-level
    /// definitions.
    pub fn about(&self, program: &Program, atom: &Atom) -> Option<Fact> {
        match atom {
            Atom::Temp(t) => self.lookup(*t).cloned(),
            Atom::Top(r) => program.top_allocator(*r).cloned().map(Fact::Tail),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mil::{DataTypes, Prim, Temps};

    #[test]
    fn newest_fact_wins() {
        let mut temps = Temps::new();
        let mut types = DataTypes::new();
        let list = types.declare("List", &[("Nil", 0), ("Cons", 2)]);
        let x = temps.fresh();
        let mut facts = Facts::new();
        facts.add_cfun(x, list[0].clone());
        facts.add_cfun(x, list[1].clone());

        assert_eq!(Some(&list[1]), facts.lookup(x).and_then(Fact::cfun));
    }

    #[test]
    fn kill_forgets_facts_that_mention_a_variable() {
        let mut temps = Temps::new();
        let (x, y, z) = (temps.fresh(), temps.fresh(), temps.fresh());
        let mut facts = Facts::new();
        facts.add(y, Tail::PrimCall(Prim::Neg, vec![x.into()]));
        facts.add(z, Tail::PrimCall(Prim::Neg, vec![1.into()]));

        facts.kill(&[x]);
        assert_eq!(None, facts.lookup(y));
        assert_eq!(Some(z), facts.find(&Tail::PrimCall(Prim::Neg, vec![1.into()])));
    }

    #[test]
    fn effects_invalidate_observations_only() {
        let mut temps = Temps::new();
        let (a, x, y) = (temps.fresh(), temps.fresh(), temps.fresh());
        let load = Tail::PrimCall(Prim::Load, vec![a.into()]);
        let neg = Tail::PrimCall(Prim::Neg, vec![a.into()]);
        let mut facts = Facts::new();
        facts.add(x, load.clone());
        facts.add(y, neg.clone());

        facts.kill_non_pure();
        assert_eq!(None, facts.find(&load));
        assert_eq!(Some(y), facts.find(&neg));
        assert_eq!(1, facts.len());
    }

    #[test]
    fn wildcard_never_has_facts() {
        let mut facts = Facts::new();
        facts.add(TempId::WILDCARD, Tail::Return(vec![]));
        assert!(facts.is_empty());
    }
}

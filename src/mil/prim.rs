//! Primitive operations and their effect classification.

use std::fmt::{self, Display, Formatter};

/// How much a primitive (or more generally, a tail) interacts with the outside world.
///
/// The levels are ordered: every property that holds at one level also holds at all lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Purity {
    /// No effects and no dependence on effects.
    Pure,
    /// Reads state that an effect may change. Repeating it gives the same answer as long as no
    /// effect happened in between.
    Observer,
    /// No visible effect, but two uses may give different answers.
    Volatile,
    /// Has a visible effect.
    Impure,
    /// Never returns to its caller.
    DoesntReturn,
}
impl Purity {
    pub fn is_pure(self) -> bool {
        self == Purity::Pure
    }

    /// A repeatable computation may be replaced by the result of an earlier, identical one.
    pub fn is_repeatable(self) -> bool {
        self <= Purity::Observer
    }

    pub fn has_no_effect(self) -> bool {
        self <= Purity::Volatile
    }

    pub fn doesnt_return(self) -> bool {
        self == Purity::DoesntReturn
    }
}

/// A scalar value, as consumed and produced by primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Word(i64),
    Flag(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prim {
    Add,
    Sub,
    Mul,
    Neg,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Lshr,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Bnot,
    Band,
    Bor,
    FlagToWord,
    /// Read a word from memory.
    Load,
    /// Write a word to memory.
    Store,
    /// Read a cycle counter.
    Ticks,
    /// Print a word.
    Print,
    /// Stop the program.
    Halt,
    /// Loop forever without doing anything.
    Loop,
}

impl Prim {
    pub const ALL: [Prim; 26] = [
        Prim::Add,
        Prim::Sub,
        Prim::Mul,
        Prim::Neg,
        Prim::And,
        Prim::Or,
        Prim::Xor,
        Prim::Not,
        Prim::Shl,
        Prim::Lshr,
        Prim::Eq,
        Prim::Neq,
        Prim::Lt,
        Prim::Lte,
        Prim::Gt,
        Prim::Gte,
        Prim::Bnot,
        Prim::Band,
        Prim::Bor,
        Prim::FlagToWord,
        Prim::Load,
        Prim::Store,
        Prim::Ticks,
        Prim::Print,
        Prim::Halt,
        Prim::Loop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Prim::Add => "add",
            Prim::Sub => "sub",
            Prim::Mul => "mul",
            Prim::Neg => "neg",
            Prim::And => "and",
            Prim::Or => "or",
            Prim::Xor => "xor",
            Prim::Not => "not",
            Prim::Shl => "shl",
            Prim::Lshr => "lshr",
            Prim::Eq => "eq",
            Prim::Neq => "neq",
            Prim::Lt => "lt",
            Prim::Lte => "lte",
            Prim::Gt => "gt",
            Prim::Gte => "gte",
            Prim::Bnot => "bnot",
            Prim::Band => "band",
            Prim::Bor => "bor",
            Prim::FlagToWord => "flagToWord",
            Prim::Load => "load",
            Prim::Store => "store",
            Prim::Ticks => "ticks",
            Prim::Print => "print",
            Prim::Halt => "halt",
            Prim::Loop => "loop",
        }
    }

    pub fn from_name(name: &str) -> Option<Prim> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn purity(self) -> Purity {
        match self {
            Prim::Load => Purity::Observer,
            Prim::Ticks => Purity::Volatile,
            Prim::Store | Prim::Print => Purity::Impure,
            Prim::Halt | Prim::Loop => Purity::DoesntReturn,
            _ => Purity::Pure,
        }
    }

    /// Number of arguments the primitive expects.
    pub fn arity(self) -> usize {
        match self {
            Prim::Ticks | Prim::Halt | Prim::Loop => 0,
            Prim::Neg | Prim::Not | Prim::Bnot | Prim::FlagToWord | Prim::Load | Prim::Print => 1,
            _ => 2,
        }
    }

    /// Number of results the primitive produces.
    pub fn results(self) -> usize {
        match self {
            Prim::Store | Prim::Print | Prim::Halt | Prim::Loop => 0,
            _ => 1,
        }
    }

    /// Primitives whose call can never make progress.
    pub fn blackholes(self) -> bool {
        matches!(self, Prim::Halt | Prim::Loop)
    }

    /// The comparison computing the negation of this one, so that `bnot(p(x, y)) == q(x, y)`.
    pub fn bnot_dual(self) -> Option<Prim> {
        Some(match self {
            Prim::Eq => Prim::Neq,
            Prim::Neq => Prim::Eq,
            Prim::Lt => Prim::Gte,
            Prim::Gte => Prim::Lt,
            Prim::Lte => Prim::Gt,
            Prim::Gt => Prim::Lte,
            _ => return None,
        })
    }

    /// Commutative binary operators.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Prim::Add
                | Prim::Mul
                | Prim::And
                | Prim::Or
                | Prim::Xor
                | Prim::Eq
                | Prim::Neq
                | Prim::Band
                | Prim::Bor
        )
    }

    /// Compute the result of a pure primitive on known arguments. Returns [`None`] for
    /// primitives with effects, or when the arguments have the wrong shape.
    pub fn compute(self, args: &[Scalar]) -> Option<Scalar> {
        use Scalar::*;

        if !self.purity().is_pure() {
            return None;
        }
        Some(match (self, args) {
            (Prim::Add, [Word(x), Word(y)]) => Word(x.wrapping_add(*y)),
            (Prim::Sub, [Word(x), Word(y)]) => Word(x.wrapping_sub(*y)),
            (Prim::Mul, [Word(x), Word(y)]) => Word(x.wrapping_mul(*y)),
            (Prim::Neg, [Word(x)]) => Word(x.wrapping_neg()),
            (Prim::And, [Word(x), Word(y)]) => Word(x & y),
            (Prim::Or, [Word(x), Word(y)]) => Word(x | y),
            (Prim::Xor, [Word(x), Word(y)]) => Word(x ^ y),
            (Prim::Not, [Word(x)]) => Word(!x),
            (Prim::Shl, [Word(x), Word(y)]) => Word(x.wrapping_shl((*y & 63) as u32)),
            (Prim::Lshr, [Word(x), Word(y)]) => {
                Word(((*x as u64).wrapping_shr((*y & 63) as u32)) as i64)
            }
            (Prim::Eq, [Word(x), Word(y)]) => Flag(x == y),
            (Prim::Neq, [Word(x), Word(y)]) => Flag(x != y),
            (Prim::Lt, [Word(x), Word(y)]) => Flag(x < y),
            (Prim::Lte, [Word(x), Word(y)]) => Flag(x <= y),
            (Prim::Gt, [Word(x), Word(y)]) => Flag(x > y),
            (Prim::Gte, [Word(x), Word(y)]) => Flag(x >= y),
            (Prim::Bnot, [Flag(x)]) => Flag(!x),
            (Prim::Band, [Flag(x), Flag(y)]) => Flag(*x && *y),
            (Prim::Bor, [Flag(x), Flag(y)]) => Flag(*x || *y),
            (Prim::FlagToWord, [Flag(x)]) => Word(*x as i64),
            _ => return None,
        })
    }
}
impl Display for Prim {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Scalar::*;

    #[test]
    fn purity_levels_are_ordered() {
        assert!(Purity::Pure.is_repeatable());
        assert!(Purity::Observer.is_repeatable());
        assert!(!Purity::Observer.is_pure());
        assert!(!Purity::Volatile.is_repeatable());
        assert!(Purity::Volatile.has_no_effect());
        assert!(!Purity::Impure.has_no_effect());
        assert!(Purity::DoesntReturn.doesnt_return());
    }

    #[test]
    fn names_round_trip() {
        for prim in Prim::ALL {
            assert_eq!(Some(prim), Prim::from_name(prim.name()));
        }
        assert_eq!(None, Prim::from_name("frobnicate"));
    }

    #[test]
    fn compute_folds_pure_primitives() {
        assert_eq!(Some(Word(5)), Prim::Add.compute(&[Word(2), Word(3)]));
        assert_eq!(Some(Word(i64::MIN)), Prim::Add.compute(&[Word(i64::MAX), Word(1)]));
        assert_eq!(Some(Flag(true)), Prim::Lt.compute(&[Word(-1), Word(0)]));
        assert_eq!(Some(Word(1)), Prim::Lshr.compute(&[Word(2), Word(1)]));
        assert_eq!(Some(Word(i64::MAX)), Prim::Lshr.compute(&[Word(-1), Word(1)]));
        assert_eq!(Some(Flag(false)), Prim::Bnot.compute(&[Flag(true)]));
    }

    #[test]
    fn compute_refuses_effects_and_bad_shapes() {
        assert_eq!(None, Prim::Print.compute(&[Word(1)]));
        assert_eq!(None, Prim::Load.compute(&[Word(1)]));
        assert_eq!(None, Prim::Add.compute(&[Flag(true), Word(1)]));
        assert_eq!(None, Prim::Add.compute(&[Word(1)]));
    }

    #[test]
    fn every_comparison_has_an_involutive_dual() {
        for prim in [Prim::Eq, Prim::Neq, Prim::Lt, Prim::Lte, Prim::Gt, Prim::Gte] {
            let dual = prim.bnot_dual().unwrap();
            assert_eq!(Some(prim), dual.bnot_dual());
            for (x, y) in [(1, 2), (2, 2), (3, 2)] {
                let Some(Flag(a)) = prim.compute(&[Word(x), Word(y)]) else {
                    panic!("comparison did not produce a flag")
                };
                assert_eq!(Some(Flag(!a)), dual.compute(&[Word(x), Word(y)]));
            }
        }
    }
}

//! Constant folding and algebraic simplification of primitive calls.

use super::facts::Facts;
use crate::mil::{Atom, Prim, Scalar, Tail};

/// A simpler tail computing the same value as `prim(args)`, if there is one.
pub fn simplify(prim: Prim, args: &[Atom], facts: &Facts) -> Option<Tail> {
    use Atom::{Flag, Word};
    use Prim::*;

    let constants: Option<Vec<Scalar>> = args.iter().map(Atom::as_scalar).collect();
    if let Some(value) = constants.and_then(|c| prim.compute(&c)) {
        return Some(Tail::ret(value.into()));
    }
    let ret = |atom: &Atom| Some(Tail::ret(atom.clone()));
    let call = |p: Prim, args: Vec<Atom>| {
        simplify(p, &args, facts).or(Some(Tail::PrimCall(p, args)))
    };

    match (prim, args) {
        // Constants go on the right of commutative operators.
        (p, [c, x]) if p.is_commutative() && c.is_constant() && !x.is_constant() => {
            call(p, vec![x.clone(), c.clone()])
        }

        (Add, [x, Word(0)]) => ret(x),
        (Add, [Atom::Temp(x), Word(m)]) => match facts.lookup_tail(*x) {
            Some(Tail::PrimCall(Add, inner)) => match inner.as_slice() {
                [y, Word(n)] => call(Add, vec![y.clone(), Word(n.wrapping_add(*m))]),
                _ => None,
            },
            _ => None,
        },
        (Sub, [x, Word(0)]) => ret(x),
        (Sub, [x, y]) if x == y => ret(&Word(0)),
        (Sub, [x, Word(n)]) => call(Add, vec![x.clone(), Word(n.wrapping_neg())]),
        (Mul, [x, Word(1)]) => ret(x),
        (Mul, [_, Word(0)]) => ret(&Word(0)),
        (And, [_, Word(0)]) => ret(&Word(0)),
        (And, [x, Word(-1)]) => ret(x),
        (Or, [x, Word(0)]) => ret(x),
        (Or, [_, Word(-1)]) => ret(&Word(-1)),
        (And | Or, [x, y]) if x == y => ret(x),
        (Xor, [x, Word(0)]) => ret(x),
        (Xor, [x, y]) if x == y => ret(&Word(0)),
        (Shl | Lshr, [x, Word(0)]) => ret(x),

        (Band, [x, Flag(true)]) => ret(x),
        (Band, [_, Flag(false)]) => ret(&Flag(false)),
        (Bor, [x, Flag(false)]) => ret(x),
        (Bor, [_, Flag(true)]) => ret(&Flag(true)),
        (Band | Bor, [x, y]) if x == y => ret(x),

        (Eq | Lte | Gte, [x, y]) if x == y => ret(&Flag(true)),
        (Neq | Lt | Gt, [x, y]) if x == y => ret(&Flag(false)),

        (Not | Neg | Bnot, [Atom::Temp(x)]) => match facts.lookup_tail(*x) {
            Some(Tail::PrimCall(q, inner)) if *q == prim && inner.len() == 1 => ret(&inner[0]),
            Some(Tail::PrimCall(q, inner)) if prim == Bnot => {
                q.bnot_dual().map(|dual| Tail::PrimCall(dual, inner.clone()))
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mil::{TempId, Temps};

    macro_rules! assert_simplifies {
        ($facts:expr, $prim:expr, [$($arg:expr),*], $expected:expr) => {
            assert_eq!(
                $expected,
                simplify($prim, &[$(Atom::from($arg)),*], &$facts).map(|t| t.to_string()).as_deref()
            )
        };
    }

    fn temps() -> (TempId, TempId, TempId) {
        let mut temps = Temps::new();
        (temps.fresh(), temps.fresh(), temps.fresh())
    }

    #[test]
    fn constants_are_folded() {
        let facts = Facts::new();
        assert_simplifies!(facts, Prim::Add, [2, 3], Some("return 5"));
        assert_simplifies!(facts, Prim::Lt, [4, 3], Some("return false"));
        assert_simplifies!(facts, Prim::Bnot, [true], Some("return false"));
        assert_simplifies!(facts, Prim::FlagToWord, [true], Some("return 1"));
    }

    #[test]
    fn identities_remove_the_operation() {
        let (x, y, _) = temps();
        let facts = Facts::new();
        assert_simplifies!(facts, Prim::Add, [x, 0], Some("return t1"));
        assert_simplifies!(facts, Prim::Add, [0, x], Some("return t1"));
        assert_simplifies!(facts, Prim::Mul, [x, 1], Some("return t1"));
        assert_simplifies!(facts, Prim::Mul, [0, x], Some("return 0"));
        assert_simplifies!(facts, Prim::Sub, [x, x], Some("return 0"));
        assert_simplifies!(facts, Prim::Xor, [y, y], Some("return 0"));
        assert_simplifies!(facts, Prim::And, [x, x], Some("return t1"));
        assert_simplifies!(facts, Prim::Or, [x, 0], Some("return t1"));
        assert_simplifies!(facts, Prim::Band, [x, true], Some("return t1"));
        assert_simplifies!(facts, Prim::Bor, [x, true], Some("return true"));
        assert_simplifies!(facts, Prim::Lte, [x, x], Some("return true"));
        assert_simplifies!(facts, Prim::Neq, [x, x], Some("return false"));
    }

    #[test]
    fn nothing_to_do_for_unknown_operands() {
        let (x, y, _) = temps();
        let facts = Facts::new();
        assert_simplifies!(facts, Prim::Add, [x, y], None);
        assert_simplifies!(facts, Prim::Lt, [x, 0], None);
        assert_simplifies!(facts, Prim::Print, [1], None);
    }

    #[test]
    fn constants_move_right_and_offsets_combine() {
        let (x, y, _) = temps();
        let mut facts = Facts::new();
        assert_simplifies!(facts, Prim::Mul, [3, x], Some("mul(t1, 3)"));
        assert_simplifies!(facts, Prim::Sub, [x, 1], Some("add(t1, -1)"));

        facts.add(y, Tail::PrimCall(Prim::Add, vec![x.into(), 2.into()]));
        assert_simplifies!(facts, Prim::Add, [y, 5], Some("add(t1, 7)"));
        assert_simplifies!(facts, Prim::Sub, [y, 2], Some("return t1"));
    }

    #[test]
    fn double_negations_cancel() {
        let (x, y, z) = temps();
        let mut facts = Facts::new();
        facts.add(y, Tail::PrimCall(Prim::Neg, vec![x.into()]));
        facts.add(z, Tail::PrimCall(Prim::Lt, vec![x.into(), 4.into()]));

        assert_simplifies!(facts, Prim::Neg, [y], Some("return t1"));
        assert_simplifies!(facts, Prim::Not, [y], None);
        assert_simplifies!(facts, Prim::Bnot, [z], Some("gte(t1, 4)"));
    }
}

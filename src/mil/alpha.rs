//! Hash summaries and alpha-equivalence of code fragments.
//!
//! Two fragments are alpha-equivalent when they are equal up to a consistent renaming of the
//! variables they bind. Summaries are polynomial hashes that ignore bound variable names, so
//! alpha-equivalent fragments always have equal summaries; comparing summaries first makes
//! duplicate detection cheap when, as is usual, nothing matches.

use super::{Alts, Atom, Block, BlockCall, ClosureDefn, Code, Fallback, Tail, TempId, TopLevel};

/// The bound variables of the two fragments being compared, in binding order.
#[derive(Debug, Default)]
pub struct AlphaEnv {
    left: Vec<TempId>,
    right: Vec<TempId>,
}
impl AlphaEnv {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(&mut self, left: &[TempId], right: &[TempId]) {
        self.left.extend_from_slice(left);
        self.right.extend_from_slice(right);
    }

    fn unbind(&mut self, n: usize) {
        self.left.truncate(self.left.len() - n);
        self.right.truncate(self.right.len() - n);
    }

    /// Variables correspond if they were bound at the same position, or if neither is bound
    /// and they are the same variable.
    fn temps_equiv(&self, a: TempId, b: TempId) -> bool {
        let i = self.left.iter().rposition(|t| *t == a);
        let j = self.right.iter().rposition(|t| *t == b);
        match (i, j) {
            (Some(i), Some(j)) => i == j,
            (None, None) => a == b,
            _ => false,
        }
    }
}

pub trait Alpha {
    /// A hash that is equal for alpha-equivalent values.
    fn summary(&self) -> i64;

    fn alpha(&self, other: &Self, env: &mut AlphaEnv) -> bool;

    fn alpha_equiv(&self, other: &Self) -> bool {
        self.alpha(other, &mut AlphaEnv::new())
    }
}

fn args_summary(seed: i64, args: &[Atom]) -> i64 {
    args.iter()
        .fold(seed, |sum, a| sum.wrapping_mul(53).wrapping_add(a.summary()))
}

fn args_alpha(left: &[Atom], right: &[Atom], env: &mut AlphaEnv) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(a, b)| a.alpha(b, env))
}

impl Alpha for Atom {
    fn summary(&self) -> i64 {
        match self {
            Atom::Temp(_) => -17,
            Atom::Word(w) => *w,
            Atom::Flag(true) => 71,
            Atom::Flag(false) => -11,
            Atom::Top(r) => 97i64
                .wrapping_add((r.top.index() as i64).wrapping_mul(7))
                .wrapping_add(r.index as i64),
            Atom::Extern(name) => name
                .bytes()
                .fold(101i64, |sum, b| sum.wrapping_mul(31).wrapping_add(b as i64)),
        }
    }

    fn alpha(&self, other: &Self, env: &mut AlphaEnv) -> bool {
        match (self, other) {
            (Atom::Temp(a), Atom::Temp(b)) => env.temps_equiv(*a, *b),
            _ => self == other,
        }
    }
}

impl Alpha for BlockCall {
    fn summary(&self) -> i64 {
        args_summary(self.target.index() as i64, &self.args).wrapping_mul(33)
    }

    fn alpha(&self, other: &Self, env: &mut AlphaEnv) -> bool {
        self.target == other.target && args_alpha(&self.args, &other.args, env)
    }
}

impl Alpha for Tail {
    fn summary(&self) -> i64 {
        match self {
            Tail::Return(args) => args_summary(1, args),
            Tail::Enter(f, args) => args_summary(args_summary(3, std::slice::from_ref(f)), args),
            Tail::BlockCall(bc) => bc.summary(),
            Tail::DataAlloc(cfun, args) => args_summary(cfun.tag() as i64, args)
                .wrapping_mul(33)
                .wrapping_add(2),
            Tail::ClosAlloc(k, args) => args_summary(k.index() as i64, args)
                .wrapping_mul(33)
                .wrapping_add(3),
            Tail::Sel(cfun, n, a) => (4 + cfun.tag() as i64 + *n as i64)
                .wrapping_mul(53)
                .wrapping_add(a.summary()),
            Tail::PrimCall(p, args) => args_summary(*p as i64, args)
                .wrapping_mul(33)
                .wrapping_add(1),
        }
    }

    fn alpha(&self, other: &Self, env: &mut AlphaEnv) -> bool {
        match (self, other) {
            (Tail::Return(a), Tail::Return(b)) => args_alpha(a, b, env),
            (Tail::Enter(f, a), Tail::Enter(g, b)) => f.alpha(g, env) && args_alpha(a, b, env),
            (Tail::BlockCall(a), Tail::BlockCall(b)) => a.alpha(b, env),
            (Tail::DataAlloc(c, a), Tail::DataAlloc(d, b)) => c == d && args_alpha(a, b, env),
            (Tail::ClosAlloc(k, a), Tail::ClosAlloc(l, b)) => k == l && args_alpha(a, b, env),
            (Tail::Sel(c, n, a), Tail::Sel(d, m, b)) => c == d && n == m && a.alpha(b, env),
            (Tail::PrimCall(p, a), Tail::PrimCall(q, b)) => p == q && args_alpha(a, b, env),
            _ => false,
        }
    }
}

impl Alpha for Alts {
    fn summary(&self) -> i64 {
        let fallback = match &self.fallback {
            Fallback::DefAlt(bc) => bc.summary(),
            Fallback::FailAlt => 19,
        };
        self.alts.iter().rev().fold(fallback, |next, alt| {
            3i64.wrapping_add(alt.call.summary().wrapping_mul(7))
                .wrapping_add(next.wrapping_mul(13))
        })
    }

    fn alpha(&self, other: &Self, env: &mut AlphaEnv) -> bool {
        let fallbacks = match (&self.fallback, &other.fallback) {
            (Fallback::DefAlt(a), Fallback::DefAlt(b)) => a.alpha(b, env),
            (Fallback::FailAlt, Fallback::FailAlt) => true,
            _ => false,
        };
        fallbacks
            && self.alts.len() == other.alts.len()
            && self
                .alts
                .iter()
                .zip(&other.alts)
                .all(|(a, b)| a.cfun == b.cfun && a.call.alpha(&b.call, env))
    }
}

impl Alpha for Code {
    fn summary(&self) -> i64 {
        match self {
            Code::Done(t) => t.summary().wrapping_mul(17).wrapping_add(3),
            Code::Bind { tail, rest, .. } => tail
                .summary()
                .wrapping_mul(17)
                .wrapping_add(rest.summary().wrapping_mul(11))
                .wrapping_add(511),
            Code::Assert { cfun, rest, .. } => (cfun.tag() as i64)
                .wrapping_mul(7)
                .wrapping_add(rest.summary().wrapping_mul(13))
                .wrapping_add(257),
            Code::If {
                if_true, if_false, ..
            } => if_true
                .summary()
                .wrapping_mul(3)
                .wrapping_add(if_false.summary().wrapping_mul(23)),
            Code::Case { alts, .. } => alts.summary().wrapping_mul(5).wrapping_add(41),
        }
    }

    fn alpha(&self, other: &Self, env: &mut AlphaEnv) -> bool {
        match (self, other) {
            (Code::Done(a), Code::Done(b)) => a.alpha(b, env),
            (
                Code::Bind {
                    vars: vs,
                    tail: t,
                    rest: c,
                },
                Code::Bind {
                    vars: ws,
                    tail: u,
                    rest: d,
                },
            ) => {
                if vs.len() != ws.len() || !t.alpha(u, env) {
                    return false;
                }
                env.bind(vs, ws);
                let equiv = c.alpha(d, env);
                env.unbind(vs.len());
                equiv
            }
            (
                Code::Assert {
                    atom: a,
                    cfun: c,
                    rest: r,
                },
                Code::Assert {
                    atom: b,
                    cfun: d,
                    rest: s,
                },
            ) => c == d && a.alpha(b, env) && r.alpha(s, env),
            (
                Code::If {
                    test: a,
                    if_true: t1,
                    if_false: f1,
                },
                Code::If {
                    test: b,
                    if_true: t2,
                    if_false: f2,
                },
            ) => a.alpha(b, env) && t1.alpha(t2, env) && f1.alpha(f2, env),
            (
                Code::Case {
                    scrutinee: a,
                    alts: x,
                },
                Code::Case {
                    scrutinee: b,
                    alts: y,
                },
            ) => a.alpha(b, env) && x.alpha(y, env),
            _ => false,
        }
    }
}

impl Block {
    pub fn summary(&self) -> i64 {
        self.code.summary()
    }

    /// Blocks are alpha-equivalent if their bodies are, with parameters matched by position.
    pub fn alpha_equiv(&self, other: &Block) -> bool {
        if self.params.len() != other.params.len() {
            return false;
        }
        let mut env = AlphaEnv::new();
        env.bind(&self.params, &other.params);
        self.code.alpha(&other.code, &mut env)
    }
}

impl ClosureDefn {
    pub fn summary(&self) -> i64 {
        self.tail.summary()
    }

    pub fn alpha_equiv(&self, other: &ClosureDefn) -> bool {
        if self.stored.len() != other.stored.len() || self.params.len() != other.params.len() {
            return false;
        }
        let mut env = AlphaEnv::new();
        env.bind(&self.stored, &other.stored);
        env.bind(&self.params, &other.params);
        self.tail.alpha(&other.tail, &mut env)
    }
}

impl TopLevel {
    pub fn summary(&self) -> i64 {
        self.tail.summary()
    }

    pub fn alpha_equiv(&self, other: &TopLevel) -> bool {
        self.lhs.len() == other.lhs.len() && self.tail.alpha_equiv(&other.tail)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::mil::{BlockId, Prim, TempSubst, Temps};

    /// One binding step of a generated code sequence: a primitive applied to two operands,
    /// each chosen from the variables in scope or a small constant.
    #[derive(Debug, Clone)]
    struct Step {
        prim: Prim,
        left: u8,
        right: u8,
    }

    fn step() -> impl Strategy<Value = Step> {
        (
            prop::sample::select(vec![Prim::Add, Prim::Sub, Prim::Mul, Prim::Xor, Prim::Lt]),
            any::<u8>(),
            any::<u8>(),
        )
            .prop_map(|(prim, left, right)| Step { prim, left, right })
    }

    fn operand(choice: u8, scope: &[TempId]) -> Atom {
        if choice % 4 == 0 {
            Atom::Word((choice / 4) as i64 % 3)
        } else {
            Atom::Temp(scope[choice as usize % scope.len()])
        }
    }

    /// Builds a block with two parameters from the generated steps.
    fn build(temps: &mut Temps, steps: &[Step], end: u8) -> Block {
        let params = temps.fresh_n(2);
        let mut scope = params.clone();
        let mut binds = vec![];
        for step in steps {
            let tail = Tail::PrimCall(
                step.prim,
                vec![operand(step.left, &scope), operand(step.right, &scope)],
            );
            let var = temps.fresh();
            binds.push((var, tail));
            scope.push(var);
        }
        let mut code = if end % 2 == 0 {
            Code::Done(Tail::ret(operand(end / 2 + 1, &scope)))
        } else {
            Code::Done(Tail::call(BlockId::new(0), vec![operand(end, &scope)]))
        };
        for (var, tail) in binds.into_iter().rev() {
            code = Code::bind(vec![var], tail, code);
        }
        Block::new(params, code)
    }

    fn renamed(temps: &mut Temps, block: &Block) -> Block {
        let params = temps.fresh_like_all(&block.params);
        let mut subst = TempSubst::new();
        subst.rename(&block.params, &params).unwrap();
        let code = block.code.copy_fresh(temps, &mut subst).unwrap();
        Block::new(params, code)
    }

    proptest! {
        #[test]
        fn alpha_equiv_is_reflexive(
            steps in prop::collection::vec(step(), 0..6),
            end in any::<u8>(),
        ) {
            let mut temps = Temps::new();
            let block = build(&mut temps, &steps, end);
            prop_assert!(block.alpha_equiv(&block));
        }

        #[test]
        fn renaming_preserves_equivalence_and_summary(
            steps in prop::collection::vec(step(), 0..6),
            end in any::<u8>(),
        ) {
            let mut temps = Temps::new();
            let block = build(&mut temps, &steps, end);
            let copy = renamed(&mut temps, &block);
            prop_assert!(block.alpha_equiv(&copy));
            prop_assert!(copy.alpha_equiv(&block));
            prop_assert_eq!(block.summary(), copy.summary());
        }

        #[test]
        fn equivalence_is_symmetric_and_implies_equal_summaries(
            a in prop::collection::vec(step(), 0..4),
            b in prop::collection::vec(step(), 0..4),
            end_a in any::<u8>(),
            end_b in any::<u8>(),
        ) {
            let mut temps = Temps::new();
            let x = build(&mut temps, &a, end_a);
            let y = build(&mut temps, &b, end_b);
            prop_assert_eq!(x.alpha_equiv(&y), y.alpha_equiv(&x));
            if x.alpha_equiv(&y) {
                prop_assert_eq!(x.summary(), y.summary());
            }
        }
    }

    #[test]
    fn blocks_returning_their_parameter_are_equivalent() {
        let mut temps = Temps::new();
        let (p, q) = (temps.fresh(), temps.fresh());
        let a = Block::new(vec![p], Code::Done(Tail::ret(p.into())));
        let b = Block::new(vec![q], Code::Done(Tail::ret(q.into())));

        assert!(a.alpha_equiv(&b));
        assert_eq!(a.summary(), b.summary());
    }

    #[test]
    fn free_variables_must_be_identical() {
        let mut temps = Temps::new();
        let (x, y) = (temps.fresh(), temps.fresh());

        assert!(Tail::ret(x.into()).alpha_equiv(&Tail::ret(x.into())));
        assert!(!Tail::ret(x.into()).alpha_equiv(&Tail::ret(y.into())));
    }

    #[test]
    fn bound_positions_must_match() {
        let mut temps = Temps::new();
        let (p, q, r, s) = (temps.fresh(), temps.fresh(), temps.fresh(), temps.fresh());
        let first = Block::new(vec![p, q], Code::Done(Tail::ret(p.into())));
        let second = Block::new(vec![r, s], Code::Done(Tail::ret(s.into())));

        assert!(!first.alpha_equiv(&second));
    }

    #[test]
    fn different_targets_are_never_equivalent() {
        let a = Tail::call(BlockId::new(1), vec![]);
        let b = Tail::call(BlockId::new(2), vec![]);
        assert!(!a.alpha_equiv(&b));
    }
}

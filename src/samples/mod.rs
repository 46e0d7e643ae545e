//! Small MIL programs, built in code, that exercise the different parts of the optimiser.
//!
//! The first entrypoint of every sample is its `main` block, which takes no arguments.

use crate::{
    error::InternalResult,
    mil::{
        Alts, Atom, BlockCall, BlockId, Cfun, CfunAlt, Code, Fallback, Prim, Program,
        ProgramBuilder, Tail, TempId,
    },
    prelude::*,
};

pub struct Sample {
    pub name: &'static str,
    pub description: &'static str,
    make: fn() -> InternalResult<Program>,
}
impl Sample {
    pub fn build(&self) -> InternalResult<Program> {
        (self.make)()
    }
}

pub const SAMPLES: &[Sample] = &[
    Sample {
        name: "sel-known",
        description: "select a field from a value built just before",
        make: sel_known,
    },
    Sample {
        name: "const-if",
        description: "branch on a comparison of constants",
        make: const_if,
    },
    Sample {
        name: "dup-blocks",
        description: "two blocks that only differ in their variable names",
        make: dup_blocks,
    },
    Sample {
        name: "same-alts",
        description: "a case whose alternatives all do the same thing",
        make: same_alts,
    },
    Sample {
        name: "known-cons",
        description: "sum a list that is built in the same program",
        make: known_cons,
    },
    Sample {
        name: "map-closure",
        description: "map a closure over a list, then sum the result",
        make: map_closure,
    },
    Sample {
        name: "countdown",
        description: "a loop printing 3, 2, 1",
        make: countdown,
    },
    Sample {
        name: "flags",
        description: "comparisons, negated comparisons and flag-returning conditionals",
        make: flags,
    },
    Sample {
        name: "exhaustive",
        description: "a case with a default that can only match one constructor",
        make: exhaustive,
    },
    Sample {
        name: "dup-args",
        description: "a call passing the same variable twice",
        make: dup_args,
    },
    Sample {
        name: "tops",
        description: "top-level allocations and constants",
        make: tops,
    },
];

pub fn find(name: &str) -> Option<&'static Sample> {
    SAMPLES.iter().find(|sample| sample.name == name)
}

/// Build the sample called `name`.
pub fn build(name: &str) -> Result<Program> {
    match find(name) {
        Some(sample) => Ok(sample.build()?),
        None => bail!("unknown sample '{name}'"),
    }
}

fn prim<const N: usize>(p: Prim, args: [Atom; N]) -> Tail {
    Tail::PrimCall(p, args.into())
}

fn call<const N: usize>(target: BlockId, args: [Atom; N]) -> BlockCall {
    BlockCall::new(target, args.into())
}

/// A straight-line sequence of bindings ending in `end`.
fn seq(binds: Vec<(Vec<TempId>, Tail)>, end: Code) -> Code {
    binds
        .into_iter()
        .rev()
        .fold(end, |rest, (vars, tail)| Code::bind(vars, tail, rest))
}

fn alt(cfun: &Cfun, call: BlockCall) -> CfunAlt {
    CfunAlt {
        cfun: cfun.clone(),
        call,
    }
}

/// `[n] = print(n); return n`
fn print_and_return(builder: &mut ProgramBuilder) -> BlockId {
    let n = builder.temp();
    builder.block(
        vec![n],
        seq(
            vec![(vec![], prim(Prim::Print, [n.into()]))],
            Code::Done(Tail::ret(n.into())),
        ),
    )
}

fn list_type(builder: &mut ProgramBuilder) -> (Cfun, Cfun) {
    let list = builder.data("List", &[("Nil", 0), ("Cons", 2)]);
    (list[0].clone(), list[1].clone())
}

/// `sum[xs, acc]`, adding every element of a list to `acc`.
fn list_sum(builder: &mut ProgramBuilder, cons: &Cfun) -> InternalResult<BlockId> {
    let sum = builder.declare_block();
    let on_cons = builder.declare_block();
    let on_nil = builder.declare_block();

    let (xs, acc) = (builder.temp(), builder.temp());
    builder.define_block(
        sum,
        vec![xs, acc],
        Code::Case {
            scrutinee: xs.into(),
            alts: Alts::new(
                vec![alt(cons, call(on_cons, [xs.into(), acc.into()]))],
                Fallback::DefAlt(call(on_nil, [acc.into()])),
            ),
        },
    )?;

    let (ys, a, h, t, s) = (
        builder.temp(),
        builder.temp(),
        builder.temp(),
        builder.temp(),
        builder.temp(),
    );
    builder.define_block(
        on_cons,
        vec![ys, a],
        seq(
            vec![
                (vec![h], Tail::Sel(cons.clone(), 0, ys.into())),
                (vec![t], Tail::Sel(cons.clone(), 1, ys.into())),
                (vec![s], prim(Prim::Add, [a.into(), h.into()])),
            ],
            Code::call(call(sum, [t.into(), s.into()])),
        ),
    )?;

    let r = builder.temp();
    builder.define_block(on_nil, vec![r], Code::Done(Tail::ret(r.into())))?;
    Ok(sum)
}

/// Bindings that build a list of the given words, and the variable holding the list.
fn list_of(
    builder: &mut ProgramBuilder,
    nil: &Cfun,
    cons: &Cfun,
    words: &[i64],
) -> (Vec<(Vec<TempId>, Tail)>, TempId) {
    let mut list = builder.temp();
    let mut binds = vec![(vec![list], Tail::DataAlloc(nil.clone(), vec![]))];
    for word in words.iter().rev() {
        let cell = builder.temp();
        binds.push((
            vec![cell],
            Tail::DataAlloc(cons.clone(), vec![Atom::Word(*word), list.into()]),
        ));
        list = cell;
    }
    (binds, list)
}

fn sel_known() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let (nil, cons) = list_type(&mut builder);

    let (h, t, x, y) = (builder.temp(), builder.temp(), builder.temp(), builder.temp());
    let head = builder.block(
        vec![h, t],
        seq(
            vec![
                (vec![x], Tail::DataAlloc(cons.clone(), vec![h.into(), t.into()])),
                (vec![y], Tail::Sel(cons, 0, x.into())),
                (vec![], prim(Prim::Print, [y.into()])),
            ],
            Code::Done(Tail::ret(y.into())),
        ),
    );

    let n = builder.temp();
    let main = builder.block(
        vec![],
        seq(
            vec![(vec![n], Tail::DataAlloc(nil, vec![]))],
            Code::call(call(head, [7.into(), n.into()])),
        ),
    );
    builder.entrypoint(main);
    builder.entrypoint(head);
    Ok(builder.finish())
}

fn const_if() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let show = print_and_return(&mut builder);
    let yes = builder.block(vec![], Code::call(call(show, [1.into()])));
    let no = builder.block(vec![], Code::call(call(show, [0.into()])));

    let x = builder.temp();
    let main = builder.block(
        vec![],
        seq(
            vec![(vec![x], prim(Prim::Lt, [3.into(), 5.into()]))],
            Code::If {
                test: x.into(),
                if_true: call(yes, []),
                if_false: call(no, []),
            },
        ),
    );
    builder.entrypoint(main);
    Ok(builder.finish())
}

fn dup_blocks() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let (p, q) = (builder.temp(), builder.temp());
    let first = builder.block(vec![p], Code::Done(Tail::ret(p.into())));
    let second = builder.block(vec![q], Code::Done(Tail::ret(q.into())));

    let (r, s) = (builder.temp(), builder.temp());
    let main = builder.block(
        vec![],
        seq(
            vec![
                (vec![r], Tail::call(first, vec![5.into()])),
                (vec![s], Tail::call(second, vec![r.into()])),
                (vec![], prim(Prim::Print, [s.into()])),
            ],
            Code::Done(Tail::ret(s.into())),
        ),
    );
    builder.entrypoint(main);
    Ok(builder.finish())
}

fn same_alts() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let choice = builder.data("Choice", &[("Yes", 0), ("No", 0)]);
    let show = print_and_return(&mut builder);

    let c = builder.temp();
    let pick = builder.block(
        vec![c],
        Code::Case {
            scrutinee: c.into(),
            alts: Alts::new(
                vec![
                    alt(&choice[0], call(show, [10.into()])),
                    alt(&choice[1], call(show, [10.into()])),
                ],
                Fallback::FailAlt,
            ),
        },
    );

    let (w, z, c) = (builder.temp(), builder.temp(), builder.temp());
    let choose = pick_constructor(&mut builder, &choice)?;
    let main = builder.block(
        vec![],
        seq(
            vec![
                (vec![w], prim(Prim::Load, [0.into()])),
                (vec![z], prim(Prim::Eq, [w.into(), 0.into()])),
                (vec![c], Tail::call(choose, vec![z.into()])),
            ],
            Code::call(call(pick, [c.into()])),
        ),
    );
    builder.entrypoint(main);
    Ok(builder.finish())
}

/// `[flag] = if flag then Yes() else No()`, for a data type with two nullary constructors.
fn pick_constructor(builder: &mut ProgramBuilder, cfuns: &[Cfun]) -> InternalResult<BlockId> {
    let make = |builder: &mut ProgramBuilder, cfun: &Cfun| {
        let v = builder.temp();
        builder.block(
            vec![],
            seq(
                vec![(vec![v], Tail::DataAlloc(cfun.clone(), vec![]))],
                Code::Done(Tail::ret(v.into())),
            ),
        )
    };
    let (yes, no) = match cfuns {
        [yes, no, ..] => (make(builder, yes), make(builder, no)),
        _ => return Err(InternalError::arity("constructor choice", 2, cfuns.len())),
    };
    let flag = builder.temp();
    Ok(builder.block(
        vec![flag],
        Code::If {
            test: flag.into(),
            if_true: call(yes, []),
            if_false: call(no, []),
        },
    ))
}

fn known_cons() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let (nil, cons) = list_type(&mut builder);
    let sum = list_sum(&mut builder, &cons)?;

    let (mut binds, list) = list_of(&mut builder, &nil, &cons, &[1, 2, 3]);
    let total = builder.temp();
    binds.push((vec![total], Tail::call(sum, vec![list.into(), 0.into()])));
    binds.push((vec![], prim(Prim::Print, [total.into()])));
    let main = builder.block(vec![], seq(binds, Code::Done(Tail::ret(total.into()))));
    builder.entrypoint(main);
    Ok(builder.finish())
}

fn map_closure() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let (nil, cons) = list_type(&mut builder);
    let sum = list_sum(&mut builder, &cons)?;

    let (n, x) = (builder.temp(), builder.temp());
    let add = builder.closure(vec![n], vec![x], prim(Prim::Add, [n.into(), x.into()]));

    let map = builder.declare_block();
    let map_cons = builder.declare_block();
    let map_nil = builder.declare_block();
    let (f, xs) = (builder.temp(), builder.temp());
    builder.define_block(
        map,
        vec![f, xs],
        Code::Case {
            scrutinee: xs.into(),
            alts: Alts::new(
                vec![
                    alt(&cons, call(map_cons, [f.into(), xs.into()])),
                    alt(&nil, call(map_nil, [])),
                ],
                Fallback::FailAlt,
            ),
        },
    )?;
    let (f, xs, h, t, h1, t1, r) = (
        builder.temp(),
        builder.temp(),
        builder.temp(),
        builder.temp(),
        builder.temp(),
        builder.temp(),
        builder.temp(),
    );
    builder.define_block(
        map_cons,
        vec![f, xs],
        seq(
            vec![
                (vec![h], Tail::Sel(cons.clone(), 0, xs.into())),
                (vec![t], Tail::Sel(cons.clone(), 1, xs.into())),
                (vec![h1], Tail::Enter(f.into(), vec![h.into()])),
                (vec![t1], Tail::call(map, vec![f.into(), t.into()])),
                (vec![r], Tail::DataAlloc(cons.clone(), vec![h1.into(), t1.into()])),
            ],
            Code::Done(Tail::ret(r.into())),
        ),
    )?;
    let empty = builder.temp();
    builder.define_block(
        map_nil,
        vec![],
        seq(
            vec![(vec![empty], Tail::DataAlloc(nil.clone(), vec![]))],
            Code::Done(Tail::ret(empty.into())),
        ),
    )?;

    let (mut binds, list) = list_of(&mut builder, &nil, &cons, &[1, 2]);
    let (g, mapped, total) = (builder.temp(), builder.temp(), builder.temp());
    binds.extend([
        (vec![g], Tail::ClosAlloc(add, vec![10.into()])),
        (vec![mapped], Tail::call(map, vec![g.into(), list.into()])),
        (vec![total], Tail::call(sum, vec![mapped.into(), 0.into()])),
        (vec![], prim(Prim::Print, [total.into()])),
    ]);
    let main = builder.block(vec![], seq(binds, Code::Done(Tail::ret(total.into()))));
    builder.entrypoint(main);
    Ok(builder.finish())
}

fn countdown() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let count = builder.declare_block();
    let step = builder.declare_block();
    let stop = builder.block(vec![], Code::Done(Tail::ret(0.into())));

    let (n, z) = (builder.temp(), builder.temp());
    builder.define_block(
        count,
        vec![n],
        seq(
            vec![(vec![z], prim(Prim::Eq, [n.into(), 0.into()]))],
            Code::If {
                test: z.into(),
                if_true: call(stop, []),
                if_false: call(step, [n.into()]),
            },
        ),
    )?;
    let (n, m) = (builder.temp(), builder.temp());
    builder.define_block(
        step,
        vec![n],
        seq(
            vec![
                (vec![], prim(Prim::Print, [n.into()])),
                (vec![m], prim(Prim::Sub, [n.into(), 1.into()])),
            ],
            Code::call(call(count, [m.into()])),
        ),
    )?;

    let main = builder.block(vec![], Code::call(call(count, [3.into()])));
    builder.entrypoint(main);
    Ok(builder.finish())
}

fn flags() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let yes = builder.block(vec![], Code::Done(Tail::ret(true.into())));
    let no = builder.block(vec![], Code::Done(Tail::ret(false.into())));
    let b = builder.temp();
    let check = builder.block(
        vec![b],
        Code::If {
            test: b.into(),
            if_true: call(yes, []),
            if_false: call(no, []),
        },
    );

    let (x, t, r) = (builder.temp(), builder.temp(), builder.temp());
    let big = builder.block(
        vec![x],
        seq(
            vec![
                (vec![], prim(Prim::Print, [x.into()])),
                (vec![t], prim(Prim::Gte, [x.into(), 0.into()])),
                (vec![r], Tail::call(check, vec![t.into()])),
            ],
            Code::Done(Tail::ret(r.into())),
        ),
    );
    let x = builder.temp();
    let small = builder.block(
        vec![x],
        seq(
            vec![(vec![], prim(Prim::Print, [0.into()]))],
            Code::Done(Tail::ret(false.into())),
        ),
    );

    let (w, g, ng) = (builder.temp(), builder.temp(), builder.temp());
    let main = builder.block(
        vec![],
        seq(
            vec![
                (vec![], prim(Prim::Store, [8.into(), 5.into()])),
                (vec![w], prim(Prim::Load, [8.into()])),
                (vec![g], prim(Prim::Gt, [w.into(), 3.into()])),
                (vec![ng], prim(Prim::Bnot, [g.into()])),
            ],
            Code::If {
                test: ng.into(),
                if_true: call(small, [w.into()]),
                if_false: call(big, [w.into()]),
            },
        ),
    );
    builder.entrypoint(main);
    Ok(builder.finish())
}

fn exhaustive() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let colour = builder.data("Colour", &[("Red", 0), ("Green", 0), ("Blue", 0)]);
    let show = print_and_return(&mut builder);

    let c = builder.temp();
    let name = builder.block(
        vec![c],
        Code::Case {
            scrutinee: c.into(),
            alts: Alts::new(
                vec![
                    alt(&colour[0], call(show, [1.into()])),
                    alt(&colour[1], call(show, [2.into()])),
                ],
                Fallback::DefAlt(call(show, [3.into()])),
            ),
        },
    );

    let (w, z, c) = (builder.temp(), builder.temp(), builder.temp());
    let choose = pick_constructor(&mut builder, &[colour[2].clone(), colour[0].clone()])?;
    let main = builder.block(
        vec![],
        seq(
            vec![
                (vec![w], prim(Prim::Load, [0.into()])),
                (vec![z], prim(Prim::Eq, [w.into(), 0.into()])),
                (vec![c], Tail::call(choose, vec![z.into()])),
            ],
            Code::call(call(name, [c.into()])),
        ),
    );
    builder.entrypoint(main);
    Ok(builder.finish())
}

fn dup_args() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let pair = builder.declare_block();
    let show = print_and_return(&mut builder);
    let (a, b, s, i) = (builder.temp(), builder.temp(), builder.temp(), builder.temp());
    builder.define_block(
        pair,
        vec![a, b, i],
        seq(
            vec![(vec![s], prim(Prim::Add, [a.into(), b.into()]))],
            Code::If {
                test: i.into(),
                if_true: call(pair, [s.into(), s.into(), false.into()]),
                if_false: call(show, [s.into()]),
            },
        ),
    )?;

    let (w, r) = (builder.temp(), builder.temp());
    let main = builder.block(
        vec![],
        seq(
            vec![
                (vec![], prim(Prim::Store, [0.into(), 21.into()])),
                (vec![w], prim(Prim::Load, [0.into()])),
                (vec![r], Tail::call(pair, vec![w.into(), w.into(), true.into()])),
            ],
            Code::Done(Tail::ret(r.into())),
        ),
    );
    builder.entrypoint(main);
    Ok(builder.finish())
}

fn tops() -> InternalResult<Program> {
    let mut builder = ProgramBuilder::new();
    let (nil, cons) = list_type(&mut builder);
    let empty = builder.top(&["empty"], Tail::DataAlloc(nil, vec![]));
    let one = builder.top(
        &["one"],
        Tail::DataAlloc(cons.clone(), vec![1.into(), Atom::top(empty, 0)]),
    );
    let answer = builder.top(&["answer"], prim(Prim::Add, [40.into(), 2.into()]));

    let (h, r) = (builder.temp(), builder.temp());
    let main = builder.block(
        vec![],
        seq(
            vec![
                (vec![h], Tail::Sel(cons, 0, Atom::top(one, 0))),
                (vec![r], prim(Prim::Add, [Atom::top(answer, 0), h.into()])),
                (vec![], prim(Prim::Print, [r.into()])),
            ],
            Code::Done(Tail::ret(r.into())),
        ),
    );
    builder.entrypoint(main);
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        eval::{self, Observed, Outcome, Termination},
        opt::{optimise, NullObserver, OptimiserOptions},
    };

    fn run(name: &str) -> Outcome {
        eval::run_main(&build(name).unwrap(), &[]).unwrap()
    }

    macro_rules! assert_outcome {
        ($name:expr, [$($out:expr),*], [$($ret:expr),*]) => {
            let outcome = run($name);
            assert_eq!(vec![$(Observed::from_test($out)),*], outcome.output, "output of {}", $name);
            assert_eq!(
                Termination::Returned(vec![$(Observed::from_test($ret)),*]),
                outcome.termination,
                "result of {}",
                $name
            );
        };
    }

    trait FromTest<T> {
        fn from_test(value: T) -> Self;
    }
    impl FromTest<i64> for Observed {
        fn from_test(value: i64) -> Self {
            Observed::Word(value)
        }
    }
    impl FromTest<bool> for Observed {
        fn from_test(value: bool) -> Self {
            Observed::Flag(value)
        }
    }

    #[test]
    fn names_are_unique() {
        for (i, sample) in SAMPLES.iter().enumerate() {
            assert!(SAMPLES[..i].iter().all(|s| s.name != sample.name));
        }
        assert!(find("known-cons").is_some());
        assert!(build("no-such-sample").is_err());
    }

    #[test]
    fn every_sample_is_well_formed() {
        for sample in SAMPLES {
            let program = sample.build().unwrap();
            assert_eq!(Ok(()), program.check(), "{}", sample.name);
            assert!(!program.entrypoints.is_empty(), "{}", sample.name);
        }
    }

    #[test]
    fn samples_compute_what_they_should() {
        assert_outcome!("sel-known", [7], [7]);
        assert_outcome!("const-if", [1], [1]);
        assert_outcome!("dup-blocks", [5], [5]);
        assert_outcome!("same-alts", [10], [10]);
        assert_outcome!("known-cons", [6], [6]);
        assert_outcome!("map-closure", [23], [23]);
        assert_outcome!("countdown", [3, 2, 1], [0]);
        assert_outcome!("flags", [5], [true]);
        assert_outcome!("exhaustive", [3], [3]);
        assert_outcome!("dup-args", [84], [84]);
        assert_outcome!("tops", [43], [43]);
    }

    #[test]
    fn optimising_a_sample_keeps_its_meaning() {
        for sample in SAMPLES {
            let mut program = sample.build().unwrap();
            let before = eval::run_main(&program, &[]).unwrap();
            optimise(&mut program, &OptimiserOptions::default(), &mut NullObserver).unwrap();
            let after = eval::run_main(&program, &[]).unwrap();
            assert_eq!(before, after, "{}", sample.name);
        }
    }
}

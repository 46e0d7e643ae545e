//! A reference interpreter for MIL programs.
//!
//! The interpreter gives programs a meaning that does not depend on any back end, so that an
//! optimised program can be compared with the one it came from. Memory is a map from word
//! addresses to words, initially all zero. `print` appends its argument to the output, and
//! `ticks` reads a clock that advances with every store and print.

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use thiserror::Error;

use crate::{
    mil::{
        Atom, Cfun, ClosureId, Code, DefnId, Prim, Program, Scalar, Tail, TempId, TopId, TopRef,
    },
    prelude::*,
};

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Word(i64),
    Flag(bool),
    Data(Cfun, Rc<[Value]>),
    Closure(ClosureId, Rc<[Value]>),
    Extern(Rc<str>),
}
impl Value {
    fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Word(w) => Some(Scalar::Word(*w)),
            Value::Flag(b) => Some(Scalar::Flag(*b)),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Word(_) => "a word",
            Value::Flag(_) => "a flag",
            Value::Data(..) => "data",
            Value::Closure(..) => "a closure",
            Value::Extern(_) => "an external symbol",
        }
    }

    /// The part of a value that stays the same however the program is optimised. Closures are
    /// opaque, because specialisation changes which definition they refer to.
    pub fn observe(&self) -> Observed {
        match self {
            Value::Word(w) => Observed::Word(*w),
            Value::Flag(b) => Observed::Flag(*b),
            Value::Data(cfun, fields) => Observed::Data(
                cfun.name().to_string(),
                fields.iter().map(Value::observe).collect(),
            ),
            Value::Closure(..) => Observed::Closure,
            Value::Extern(name) => Observed::Extern(name.to_string()),
        }
    }
}
impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Word(w) => Value::Word(w),
            Scalar::Flag(b) => Value::Flag(b),
        }
    }
}

/// A value as seen from outside the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Word(i64),
    Flag(bool),
    Data(String, Vec<Observed>),
    Closure,
    Extern(String),
}
impl Display for Observed {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Observed::Word(w) => write!(f, "{w}"),
            Observed::Flag(b) => write!(f, "{b}"),
            Observed::Data(name, fields) if fields.is_empty() => write!(f, "{name}"),
            Observed::Data(name, fields) => {
                write!(f, "{name}(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, ")")
            }
            Observed::Closure => write!(f, "<closure>"),
            Observed::Extern(name) => write!(f, "@{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Returned(Vec<Observed>),
    Halted,
    /// The program entered an infinite loop, or ran out of steps.
    Diverged,
}
impl Display for Termination {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Termination::Returned(values) => {
                let values: Vec<_> = values.iter().map(ToString::to_string).collect();
                write!(f, "returned [{}]", values.join(", "))
            }
            Termination::Halted => write!(f, "halted"),
            Termination::Diverged => write!(f, "diverged"),
        }
    }
}

/// Everything a run of a program can be observed to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub output: Vec<Observed>,
    pub termination: Termination,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error("the program has no entrypoint")]
    NoEntrypoint,
    #[error("cannot run {0} as an entrypoint")]
    UnsupportedEntrypoint(DefnId),
    #[error("{0} is read before it is bound")]
    Unbound(TempId),
    #[error("{context}: expected {expected}, found {found}")]
    Mismatch {
        context: String,
        expected: String,
        found: String,
    },
    #[error("no alternative matches constructor {0}")]
    NoMatch(String),
    #[error("assertion that a value was built with {0} failed")]
    AssertFailed(String),
    #[error("primitive {prim} cannot be applied to [{args}]")]
    BadPrim { prim: Prim, args: String },
    #[error("calls nested more than {0} deep")]
    TooDeep(usize),
    #[error("{0} depends on its own value")]
    CyclicTopLevel(TopId),
}

impl EvalError {
    fn mismatch<C: Into<String>, E: ToString, F: ToString>(
        context: C,
        expected: E,
        found: F,
    ) -> Self {
        Self::Mismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Why evaluation stopped early.
enum Stop {
    Halted,
    Diverged,
    Failed(EvalError),
}
impl From<EvalError> for Stop {
    fn from(error: EvalError) -> Self {
        Stop::Failed(error)
    }
}
impl From<InternalError> for Stop {
    fn from(error: InternalError) -> Self {
        Stop::Failed(error.into())
    }
}

type Env = HashMap<TempId, Value>;

/// Where a tail leaves control: either with its results, or at the start of some code.
enum Step<'p> {
    Values(Vec<Value>),
    Jump(Env, &'p Code),
}

pub struct Evaluator<'p> {
    program: &'p Program,
    step_limit: usize,
    depth_limit: usize,
    steps: usize,
    depth: usize,
    memory: HashMap<i64, i64>,
    clock: i64,
    output: Vec<Observed>,
    tops: HashMap<TopId, Rc<[Value]>>,
    evaluating: Vec<TopId>,
}
impl<'p> Evaluator<'p> {
    pub const STEP_LIMIT: usize = 1_000_000;
    pub const DEPTH_LIMIT: usize = 1_000;

    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            step_limit: Self::STEP_LIMIT,
            depth_limit: Self::DEPTH_LIMIT,
            steps: 0,
            depth: 0,
            memory: HashMap::new(),
            clock: 0,
            output: vec![],
            tops: HashMap::new(),
            evaluating: vec![],
        }
    }

    /// Treat a run as diverging once it has executed `limit` statements.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Run the definition `entry`, passing `args` to its parameters.
    pub fn run(mut self, entry: DefnId, args: &[i64]) -> Result<Outcome, EvalError> {
        let program = self.program;
        let args: Vec<Value> = args.iter().copied().map(Value::Word).collect();
        let result = match entry {
            DefnId::Block(id) => {
                let block = program.block(id)?;
                let env = bind_params(&format!("entry {id}"), &block.params, args)?;
                self.eval_code(env, &block.code)
            }
            DefnId::Top(id) if args.is_empty() => {
                self.top_values(id).map(|values| values.to_vec())
            }
            DefnId::Top(_) | DefnId::Closure(_) => {
                return Err(EvalError::UnsupportedEntrypoint(entry))
            }
        };
        let termination = match result {
            Ok(values) => Termination::Returned(values.iter().map(Value::observe).collect()),
            Err(Stop::Halted) => Termination::Halted,
            Err(Stop::Diverged) => Termination::Diverged,
            Err(Stop::Failed(error)) => return Err(error),
        };
        debug!(
            "{entry} {termination} after {} step(s), {} output(s)",
            self.steps,
            self.output.len()
        );
        Ok(Outcome {
            output: self.output,
            termination,
        })
    }

    fn tick(&mut self) -> Result<(), Stop> {
        self.steps += 1;
        if self.steps > self.step_limit {
            Err(Stop::Diverged)
        } else {
            Ok(())
        }
    }

    fn atom(&mut self, env: &Env, atom: &Atom) -> Result<Value, Stop> {
        Ok(match atom {
            Atom::Temp(t) => env.get(t).cloned().ok_or(EvalError::Unbound(*t))?,
            Atom::Word(w) => Value::Word(*w),
            Atom::Flag(b) => Value::Flag(*b),
            Atom::Top(TopRef { top, index }) => self
                .top_values(*top)?
                .get(*index)
                .cloned()
                .ok_or(InternalError::UndefinedTopLevel {
                    defn: (*top).into(),
                    index: *index,
                })?,
            Atom::Extern(name) => Value::Extern(name.clone()),
        })
    }

    fn atoms(&mut self, env: &Env, atoms: &[Atom]) -> Result<Vec<Value>, Stop> {
        atoms.iter().map(|a| self.atom(env, a)).collect()
    }

    /// The values of a top-level definition, computed the first time they are needed.
    fn top_values(&mut self, id: TopId) -> Result<Rc<[Value]>, Stop> {
        if let Some(values) = self.tops.get(&id) {
            return Ok(values.clone());
        }
        if self.evaluating.contains(&id) {
            return Err(EvalError::CyclicTopLevel(id).into());
        }
        let program = self.program;
        let top = program.top(id)?;
        self.evaluating.push(id);
        let values = self.eval_tail(&Env::new(), &top.tail);
        self.evaluating.pop();
        let values: Rc<[Value]> = values?.into();
        if values.len() != top.lhs.len() {
            return Err(EvalError::mismatch(
                format!("values of {id}"),
                top.lhs.len(),
                values.len(),
            )
            .into());
        }
        self.tops.insert(id, values.clone());
        Ok(values)
    }

    fn eval_code(&mut self, mut env: Env, mut code: &'p Code) -> Result<Vec<Value>, Stop> {
        loop {
            self.tick()?;
            match code {
                Code::Bind { vars, tail, rest } => {
                    let values = self.eval_tail(&env, tail)?;
                    if values.len() != vars.len() {
                        return Err(
                            EvalError::mismatch(format!("{tail}"), vars.len(), values.len())
                                .into(),
                        );
                    }
                    for (var, value) in vars.iter().zip(values) {
                        if !var.is_wildcard() {
                            env.insert(*var, value);
                        }
                    }
                    code = rest;
                }
                Code::Assert { atom, cfun, rest } => {
                    match self.atom(&env, atom)? {
                        Value::Data(c, _) if c == *cfun => {}
                        _ => return Err(EvalError::AssertFailed(cfun.to_string()).into()),
                    }
                    code = rest;
                }
                Code::Done(tail) => match self.tail_step(&env, tail)? {
                    Step::Values(values) => return Ok(values),
                    Step::Jump(next, c) => (env, code) = (next, c),
                },
                Code::If {
                    test,
                    if_true,
                    if_false,
                } => {
                    let bc = match self.atom(&env, test)? {
                        Value::Flag(true) => if_true,
                        Value::Flag(false) => if_false,
                        other => {
                            return Err(EvalError::mismatch("if", "a flag", other.kind()).into())
                        }
                    };
                    (env, code) = self.jump(&env, bc.target, &bc.args)?;
                }
                Code::Case { scrutinee, alts } => {
                    let bc = match self.atom(&env, scrutinee)? {
                        Value::Data(cfun, _) => alts
                            .select(&cfun)
                            .ok_or_else(|| EvalError::NoMatch(cfun.to_string()))?,
                        other => {
                            return Err(EvalError::mismatch("case", "data", other.kind()).into())
                        }
                    };
                    (env, code) = self.jump(&env, bc.target, &bc.args)?;
                }
            }
        }
    }

    fn jump(
        &mut self,
        env: &Env,
        target: crate::mil::BlockId,
        args: &[Atom],
    ) -> Result<(Env, &'p Code), Stop> {
        let program = self.program;
        let block = program.block(target)?;
        let args = self.atoms(env, args)?;
        let env = bind_params(&format!("call to {target}"), &block.params, args)?;
        Ok((env, &block.code))
    }

    /// Evaluate a tail in a position where its results are needed.
    fn eval_tail(&mut self, env: &Env, tail: &'p Tail) -> Result<Vec<Value>, Stop> {
        match self.tail_step(env, tail)? {
            Step::Values(values) => Ok(values),
            Step::Jump(env, code) => {
                if self.depth >= self.depth_limit {
                    return Err(EvalError::TooDeep(self.depth_limit).into());
                }
                self.depth += 1;
                let result = self.eval_code(env, code);
                self.depth -= 1;
                result
            }
        }
    }

    fn tail_step(&mut self, env: &Env, tail: &'p Tail) -> Result<Step<'p>, Stop> {
        let program = self.program;
        let mut closure_env;
        let (mut env, mut tail) = (env, tail);
        loop {
            let values = match tail {
                Tail::Return(atoms) => self.atoms(env, atoms)?,
                Tail::BlockCall(bc) => {
                    let (env, code) = self.jump(env, bc.target, &bc.args)?;
                    return Ok(Step::Jump(env, code));
                }
                Tail::Enter(f, args) => {
                    let (k, stored) = match self.atom(env, f)? {
                        Value::Closure(k, stored) => (k, stored),
                        other => {
                            return Err(EvalError::mismatch(
                                format!("{tail}"),
                                "a closure",
                                other.kind(),
                            )
                            .into())
                        }
                    };
                    let defn = program.closure(k)?;
                    let mut values = stored.to_vec();
                    values.extend(self.atoms(env, args)?);
                    let formals: Vec<TempId> =
                        defn.stored.iter().chain(&defn.params).copied().collect();
                    closure_env = bind_params(&format!("entry to {k}"), &formals, values)?;
                    self.tick()?;
                    (env, tail) = (&closure_env, &defn.tail);
                    continue;
                }
                Tail::DataAlloc(cfun, args) => {
                    vec![Value::Data(cfun.clone(), self.atoms(env, args)?.into())]
                }
                Tail::ClosAlloc(k, args) => vec![Value::Closure(*k, self.atoms(env, args)?.into())],
                Tail::Sel(cfun, index, a) => match self.atom(env, a)? {
                    Value::Data(c, fields) if c == *cfun => {
                        vec![fields.get(*index).cloned().ok_or_else(|| {
                            InternalError::SelIndexOutOfRange {
                                cfun: cfun.to_string(),
                                index: *index,
                                arity: fields.len(),
                            }
                        })?]
                    }
                    other => {
                        return Err(EvalError::mismatch(
                            format!("{tail}"),
                            cfun,
                            match &other {
                                Value::Data(c, _) => c.to_string(),
                                v => v.kind().to_string(),
                            },
                        )
                        .into())
                    }
                },
                Tail::PrimCall(prim, args) => {
                    let args = self.atoms(env, args)?;
                    self.prim(*prim, args)?
                }
            };
            return Ok(Step::Values(values));
        }
    }

    fn prim(&mut self, prim: Prim, args: Vec<Value>) -> Result<Vec<Value>, Stop> {
        let bad = |args: &[Value]| EvalError::BadPrim {
            prim,
            args: args
                .iter()
                .map(|v| v.observe().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        };
        Ok(match (prim, args.as_slice()) {
            (Prim::Load, [Value::Word(address)]) => {
                vec![Value::Word(self.memory.get(address).copied().unwrap_or(0))]
            }
            (Prim::Store, [Value::Word(address), Value::Word(word)]) => {
                self.memory.insert(*address, *word);
                self.clock += 1;
                vec![]
            }
            (Prim::Print, [value]) => {
                trace!("print {}", value.observe());
                self.output.push(value.observe());
                self.clock += 1;
                vec![]
            }
            (Prim::Ticks, []) => vec![Value::Word(self.clock)],
            (Prim::Halt, []) => return Err(Stop::Halted),
            (Prim::Loop, []) => return Err(Stop::Diverged),
            (p, values) if p.purity().is_pure() => {
                let scalars: Option<Vec<Scalar>> = values.iter().map(Value::as_scalar).collect();
                let result = scalars.and_then(|s| p.compute(&s));
                vec![result.ok_or_else(|| bad(values))?.into()]
            }
            (_, values) => return Err(bad(values).into()),
        })
    }
}

fn bind_params(context: &str, params: &[TempId], args: Vec<Value>) -> Result<Env, EvalError> {
    if params.len() != args.len() {
        return Err(EvalError::mismatch(context, params.len(), args.len()));
    }
    Ok(params
        .iter()
        .zip(args)
        .filter(|(p, _)| !p.is_wildcard())
        .map(|(p, v)| (*p, v))
        .collect())
}

/// Run the first entrypoint of `program`.
pub fn run_main(program: &Program, args: &[i64]) -> Result<Outcome, EvalError> {
    let entry = *program.entrypoints.first().ok_or(EvalError::NoEntrypoint)?;
    Evaluator::new(program).run(entry, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mil::{Alts, BlockCall, CfunAlt, Fallback, ProgramBuilder};

    macro_rules! words {
        ($($w:expr),*) => {
            vec![$(Observed::Word($w)),*]
        };
    }

    fn returned(values: Vec<Observed>) -> Termination {
        Termination::Returned(values)
    }

    #[test]
    fn straight_line_code_prints_and_returns() {
        let mut builder = ProgramBuilder::new();
        let (p, x) = (builder.temp(), builder.temp());
        let main = builder.block(
            vec![p],
            Code::bind(
                vec![x],
                Tail::PrimCall(Prim::Mul, vec![p.into(), 3.into()]),
                Code::bind(
                    vec![],
                    Tail::PrimCall(Prim::Print, vec![x.into()]),
                    Code::Done(Tail::ret(x.into())),
                ),
            ),
        );
        builder.entrypoint(main);
        let program = builder.finish();

        let outcome = run_main(&program, &[5]).unwrap();
        assert_eq!(words![15], outcome.output);
        assert_eq!(returned(words![15]), outcome.termination);
    }

    #[test]
    fn recursion_over_a_list() {
        let mut builder = ProgramBuilder::new();
        let list = builder.data("List", &[("Nil", 0), ("Cons", 2)]);
        let sum = builder.declare_block();
        let on_cons = builder.declare_block();
        let on_nil = builder.declare_block();

        let (xs, acc) = (builder.temp(), builder.temp());
        builder
            .define_block(
                sum,
                vec![xs, acc],
                Code::Case {
                    scrutinee: xs.into(),
                    alts: Alts::new(
                        vec![CfunAlt {
                            cfun: list[1].clone(),
                            call: BlockCall::new(on_cons, vec![xs.into(), acc.into()]),
                        }],
                        Fallback::DefAlt(BlockCall::new(on_nil, vec![acc.into()])),
                    ),
                },
            )
            .unwrap();
        let (ys, a, h, t, s) = (
            builder.temp(),
            builder.temp(),
            builder.temp(),
            builder.temp(),
            builder.temp(),
        );
        builder
            .define_block(
                on_cons,
                vec![ys, a],
                Code::bind(
                    vec![h],
                    Tail::Sel(list[1].clone(), 0, ys.into()),
                    Code::bind(
                        vec![t],
                        Tail::Sel(list[1].clone(), 1, ys.into()),
                        Code::bind(
                            vec![s],
                            Tail::PrimCall(Prim::Add, vec![a.into(), h.into()]),
                            Code::call(BlockCall::new(sum, vec![t.into(), s.into()])),
                        ),
                    ),
                ),
            )
            .unwrap();
        let r = builder.temp();
        builder
            .define_block(on_nil, vec![r], Code::Done(Tail::ret(r.into())))
            .unwrap();

        let (n, l1, l2) = (builder.temp(), builder.temp(), builder.temp());
        let main = builder.block(
            vec![],
            Code::bind(
                vec![n],
                Tail::DataAlloc(list[0].clone(), vec![]),
                Code::bind(
                    vec![l1],
                    Tail::DataAlloc(list[1].clone(), vec![4.into(), n.into()]),
                    Code::bind(
                        vec![l2],
                        Tail::DataAlloc(list[1].clone(), vec![3.into(), l1.into()]),
                        Code::call(BlockCall::new(sum, vec![l2.into(), 0.into()])),
                    ),
                ),
            ),
        );
        builder.entrypoint(main);

        let outcome = run_main(&builder.finish(), &[]).unwrap();
        assert_eq!(returned(words![7]), outcome.termination);
    }

    #[test]
    fn closures_carry_their_stored_fields() {
        let mut builder = ProgramBuilder::new();
        let (n, x, f, r) = (builder.temp(), builder.temp(), builder.temp(), builder.temp());
        let k = builder.closure(
            vec![n],
            vec![x],
            Tail::PrimCall(Prim::Add, vec![n.into(), x.into()]),
        );
        let main = builder.block(
            vec![],
            Code::bind(
                vec![f],
                Tail::ClosAlloc(k, vec![10.into()]),
                Code::bind(
                    vec![r],
                    Tail::Enter(f.into(), vec![5.into()]),
                    Code::Done(Tail::Return(vec![r.into(), f.into()])),
                ),
            ),
        );
        builder.entrypoint(main);

        let outcome = run_main(&builder.finish(), &[]).unwrap();
        assert_eq!(
            returned(vec![Observed::Word(15), Observed::Closure]),
            outcome.termination
        );
    }

    #[test]
    fn memory_and_the_clock() {
        let mut builder = ProgramBuilder::new();
        let (before, x, after) = (builder.temp(), builder.temp(), builder.temp());
        let main = builder.block(
            vec![],
            Code::bind(
                vec![before],
                Tail::PrimCall(Prim::Ticks, vec![]),
                Code::bind(
                    vec![],
                    Tail::PrimCall(Prim::Store, vec![8.into(), 99.into()]),
                    Code::bind(
                        vec![x],
                        Tail::PrimCall(Prim::Load, vec![8.into()]),
                        Code::bind(
                            vec![after],
                            Tail::PrimCall(Prim::Ticks, vec![]),
                            Code::Done(Tail::Return(vec![
                                before.into(),
                                x.into(),
                                after.into(),
                            ])),
                        ),
                    ),
                ),
            ),
        );
        builder.entrypoint(main);

        let outcome = run_main(&builder.finish(), &[]).unwrap();
        assert_eq!(returned(words![0, 99, 1]), outcome.termination);
    }

    #[test]
    fn halting_and_looping() {
        let mut builder = ProgramBuilder::new();
        let halt = builder.block(
            vec![],
            Code::bind(
                vec![],
                Tail::PrimCall(Prim::Print, vec![1.into()]),
                Code::Done(Tail::PrimCall(Prim::Halt, vec![])),
            ),
        );
        let spin = builder.declare_block();
        builder
            .define_block(spin, vec![], Code::call(BlockCall::new(spin, vec![])))
            .unwrap();
        let program = builder.finish();

        let outcome = Evaluator::new(&program).run(halt.into(), &[]).unwrap();
        assert_eq!(words![1], outcome.output);
        assert_eq!(Termination::Halted, outcome.termination);

        let outcome = Evaluator::new(&program)
            .with_step_limit(100)
            .run(spin.into(), &[])
            .unwrap();
        assert_eq!(Termination::Diverged, outcome.termination);
    }

    #[test]
    fn top_levels_are_computed_once() {
        let mut builder = ProgramBuilder::new();
        let list = builder.data("List", &[("Nil", 0), ("Cons", 2)]);
        let nil = builder.top(&["nil"], Tail::DataAlloc(list[0].clone(), vec![]));
        let one = builder.top(
            &["one"],
            Tail::DataAlloc(list[1].clone(), vec![1.into(), Atom::top(nil, 0)]),
        );
        builder.entrypoint(one);

        let outcome = run_main(&builder.finish(), &[]).unwrap();
        assert_eq!(
            returned(vec![Observed::Data(
                "Cons".into(),
                vec![Observed::Word(1), Observed::Data("Nil".into(), vec![])]
            )]),
            outcome.termination
        );
        assert_eq!("returned [Cons(1, Nil)]", outcome.termination.to_string());
    }

    #[test]
    fn runtime_errors_are_reported() {
        let mut builder = ProgramBuilder::new();
        let x = builder.temp();
        let bad = builder.block(
            vec![],
            Code::Done(Tail::PrimCall(Prim::Add, vec![true.into(), 1.into()])),
        );
        let unbound = builder.block(vec![], Code::Done(Tail::ret(x.into())));
        let own = Atom::top(TopId::new(0), 0);
        let cyclic = builder.top(&["x"], Tail::PrimCall(Prim::Neg, vec![own]));
        let program = builder.finish();

        assert_eq!(
            Err(EvalError::BadPrim {
                prim: Prim::Add,
                args: "true, 1".into()
            }),
            Evaluator::new(&program).run(bad.into(), &[])
        );
        assert_eq!(
            Err(EvalError::Unbound(x)),
            Evaluator::new(&program).run(unbound.into(), &[])
        );
        assert_eq!(
            Err(EvalError::CyclicTopLevel(cyclic)),
            Evaluator::new(&program).run(cyclic.into(), &[])
        );
        assert_eq!(
            Err(EvalError::NoEntrypoint),
            run_main(&program, &[])
        );
    }
}

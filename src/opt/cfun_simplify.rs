//! Simplifying case statements using the constructors of the scrutinee's type.

use super::Optimiser;
use crate::{
    mil::{Alts, CfunAlt, Code, DefnId, Fallback},
    prelude::*,
};

impl Optimiser<'_> {
    pub(super) fn cfun_simplify(&mut self) -> InternalResult<()> {
        for defn in self.program.defns() {
            if let DefnId::Block(id) = defn {
                self.current = Some(defn);
                let code = self.program.block(id)?.code.clone();
                let code = self.cfun_simplify_code(code)?;
                self.program.block_mut(id)?.code = code;
            }
        }
        self.current = None;
        Ok(())
    }

    /// Simplify the case, if any, at the end of `code`.
    pub(super) fn cfun_simplify_code(&mut self, code: Code) -> InternalResult<Code> {
        Ok(match code {
            Code::Bind { vars, tail, rest } => {
                Code::bind(vars, tail, self.cfun_simplify_code(*rest)?)
            }
            Code::Assert { atom, cfun, rest } => {
                Code::assert(atom, cfun, self.cfun_simplify_code(*rest)?)
            }
            Code::Case { scrutinee, alts } => match self.simplify_alts(alts)? {
                Ok(alts) => Code::Case { scrutinee, alts },
                Err(code) => {
                    self.report(format!("case {scrutinee} has a single branch"));
                    code
                }
            },
            code => code,
        })
    }

    /// Tighten the alternatives of a case, or give the code to run instead if only one branch
    /// is possible.
    fn simplify_alts(&mut self, mut alts: Alts) -> InternalResult<Result<Alts, Code>> {
        let Some(first) = alts.alts.first() else {
            return Ok(match alts.fallback {
                Fallback::DefAlt(bc) => Err(Code::call(bc)),
                Fallback::FailAlt => Ok(alts),
            });
        };
        let family = first.cfun.family();
        let covered = (0..family).all(|tag| alts.alts.iter().any(|a| a.cfun.tag() == tag));

        if let Fallback::DefAlt(def) = &alts.fallback {
            if covered {
                self.report("default of a case covering every constructor removed");
                alts.fallback = Fallback::FailAlt;
            } else if alts.alts.len() + 1 == family {
                let siblings = self.program.datatypes.siblings(&first.cfun)?;
                if let Some(missing) = siblings
                    .iter()
                    .find(|c| !alts.alts.iter().any(|a| a.cfun == **c))
                {
                    let alt = CfunAlt {
                        cfun: missing.clone(),
                        call: def.clone(),
                    };
                    self.report(format!("default of a case now matches {}", alt.cfun));
                    alts.alts.push(alt);
                    alts.fallback = Fallback::FailAlt;
                }
            }
        }

        if family == 1 && alts.fallback == Fallback::FailAlt {
            if let [alt] = alts.alts.as_slice() {
                return Ok(Err(Code::call(alt.call.clone())));
            }
        }
        Ok(Ok(alts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        eval::Evaluator,
        mil::{Atom, BlockCall, BlockId, Cfun, Prim, Program, ProgramBuilder, Tail, TempId},
        opt::{OptimiserOptions, RewriteLog},
    };

    fn simplify(program: &mut Program, code: Code) -> (Code, RewriteLog) {
        let mut log = RewriteLog::new();
        let code = Optimiser::new(program, OptimiserOptions::default(), &mut log)
            .cfun_simplify_code(code)
            .unwrap();
        (code, log)
    }

    fn call(b: usize) -> BlockCall {
        BlockCall::new(BlockId::new(b), vec![])
    }

    fn case(x: TempId, alts: &[(&Cfun, usize)], fallback: Fallback) -> Code {
        let alts = alts
            .iter()
            .map(|(cfun, b)| CfunAlt {
                cfun: (*cfun).clone(),
                call: call(*b),
            })
            .collect();
        Code::Case {
            scrutinee: x.into(),
            alts: Alts::new(alts, fallback),
        }
    }

    #[test]
    fn a_lone_default_is_taken() {
        let mut builder = ProgramBuilder::new();
        let x = builder.temp();
        let (code, log) = simplify(builder.program(), case(x, &[], Fallback::DefAlt(call(3))));

        assert_eq!(Code::call(call(3)), code);
        assert_eq!(1, log.rewrites.len());
    }

    #[test]
    fn missing_constructor_replaces_the_default() {
        let mut builder = ProgramBuilder::new();
        let colour = builder.data("Colour", &[("Red", 0), ("Green", 0), ("Blue", 0)]);
        let x = builder.temp();
        let code = case(x, &[(&colour[0], 1), (&colour[2], 2)], Fallback::DefAlt(call(3)));
        let (code, _) = simplify(builder.program(), code);

        assert_eq!(
            case(
                x,
                &[(&colour[0], 1), (&colour[2], 2), (&colour[1], 3)],
                Fallback::FailAlt
            ),
            code
        );
    }

    #[test]
    fn covered_cases_lose_their_default() {
        let mut builder = ProgramBuilder::new();
        let list = builder.data("List", &[("Nil", 0), ("Cons", 2)]);
        let x = builder.temp();
        let code = case(x, &[(&list[1], 1), (&list[0], 2)], Fallback::DefAlt(call(3)));
        let (code, log) = simplify(builder.program(), code);

        assert_eq!(case(x, &[(&list[1], 1), (&list[0], 2)], Fallback::FailAlt), code);
        assert!(log.mentions("covering every constructor"));
    }

    #[test]
    fn three_constructors_covered_keep_their_meaning() {
        let mut builder = ProgramBuilder::new();
        let colour = builder.data("Colour", &[("Red", 0), ("Green", 0), ("Blue", 0)]);
        let shows: Vec<BlockId> = (1..=4)
            .map(|n| {
                builder.block(
                    vec![],
                    Code::bind(
                        vec![],
                        Tail::PrimCall(Prim::Print, vec![Atom::Word(n)]),
                        Code::Done(Tail::ret(Atom::Word(n))),
                    ),
                )
            })
            .collect();
        let x = builder.temp();
        let alts = colour
            .iter()
            .zip(&shows)
            .map(|(cfun, show)| CfunAlt {
                cfun: cfun.clone(),
                call: BlockCall::new(*show, vec![]),
            })
            .collect();
        let pick = builder.block(
            vec![x],
            Code::Case {
                scrutinee: x.into(),
                alts: Alts::new(alts, Fallback::DefAlt(BlockCall::new(shows[3], vec![]))),
            },
        );
        let mains: Vec<BlockId> = colour
            .iter()
            .map(|cfun| {
                let c = builder.temp();
                builder.block(
                    vec![],
                    Code::bind(
                        vec![c],
                        Tail::DataAlloc(cfun.clone(), vec![]),
                        Code::call(BlockCall::new(pick, vec![c.into()])),
                    ),
                )
            })
            .collect();
        for main in &mains {
            builder.entrypoint(*main);
        }
        let mut program = builder.finish();
        let run = |program: &Program| {
            mains
                .iter()
                .map(|main| Evaluator::new(program).run((*main).into(), &[]).unwrap())
                .collect::<Vec<_>>()
        };
        let before = run(&program);

        let code = program.block(pick).unwrap().code.clone();
        let (code, log) = simplify(&mut program, code);
        let Code::Case { alts, .. } = &code else {
            panic!("expected a case, got {code}");
        };
        assert_eq!(3, alts.alts.len());
        assert_eq!(Fallback::FailAlt, alts.fallback);
        assert!(log.mentions("covering every constructor"));

        program.block_mut(pick).unwrap().code = code;
        let after = run(&program);
        assert_eq!(before, after);
        assert_ne!(after[0], after[1]);
        assert_ne!(after[1], after[2]);
        assert_ne!(after[0], after[2]);
    }

    #[test]
    fn single_constructor_types_need_no_case() {
        let mut builder = ProgramBuilder::new();
        let pair = builder.data("Pair", &[("Pair", 2)]);
        let x = builder.temp();
        let code = case(x, &[(&pair[0], 1)], Fallback::FailAlt);
        let (code, _) = simplify(builder.program(), code);

        assert_eq!(Code::call(call(1)), code);
    }

    #[test]
    fn partial_cases_are_left_alone() {
        let mut builder = ProgramBuilder::new();
        let colour = builder.data("Colour", &[("Red", 0), ("Green", 0), ("Blue", 0)]);
        let x = builder.temp();
        let code = case(x, &[(&colour[0], 1)], Fallback::DefAlt(call(3)));
        let (simplified, log) = simplify(builder.program(), code.clone());

        assert_eq!(code, simplified);
        assert!(log.rewrites.is_empty());
    }
}

//! Construction of control flow graphs.

use super::{Cfg, CfgKind, Label, LabelId, LabelKind, Phi, Pred, Source};
use crate::{
    mil::{
        Atom, BlockCall, BlockId, ClosureId, Code, DefnId, Program, Tail, TempId, TempSubst,
    },
    prelude::*,
};

/// Build the graphs for every definition of a program whose components and reference counts
/// are up to date. Blocks that are called as functions get fresh parameter names, so the
/// program's temporaries are extended.
pub fn build_cfgs(program: &mut Program, small_block_limit: usize) -> InternalResult<Vec<Cfg>> {
    let defns = program.defns();
    let mut functions = vec![];
    for defn in &defns {
        if let DefnId::Block(b) = *defn {
            let block = program.block(b)?;
            if block.meta.calls > 0 || block.meta.entrypoint {
                let params = block.params.clone();
                functions.push((b, program.temps.fresh_like_all(&params)));
            }
        }
    }

    let mut builder = CfgBuilder {
        program,
        small_block_limit,
        next_num: 0,
    };
    let mut cfgs = vec![];
    let mut functions = functions.into_iter().peekable();
    for defn in &defns {
        match *defn {
            DefnId::Block(b) => {
                if let Some((_, params)) = functions.next_if(|(f, _)| *f == b) {
                    cfgs.push(builder.block_cfg(b, params)?);
                }
            }
            DefnId::Closure(k) => cfgs.push(builder.closure_cfg(k)?),
            DefnId::Top(_) => {}
        }
    }
    if let Some(init) = builder.init_cfg(&defns)? {
        cfgs.push(init);
    }
    debug!("built {} control flow graph(s)", cfgs.len());
    Ok(cfgs)
}

struct CfgBuilder<'p> {
    program: &'p Program,
    small_block_limit: usize,
    next_num: usize,
}
impl<'p> CfgBuilder<'p> {
    fn num(&mut self) -> usize {
        self.next_num += 1;
        self.next_num - 1
    }

    fn new_cfg(&mut self, kind: CfgKind, included: Vec<BlockId>) -> Cfg {
        Cfg {
            num: self.num(),
            kind,
            labels: vec![],
            entry: vec![],
            included,
            renaming: TempSubst::new(),
        }
    }

    fn block_cfg(&mut self, b: BlockId, params: Vec<TempId>) -> InternalResult<Cfg> {
        let program = self.program;
        let mut included = vec![b];
        self.identify_code(b.into(), &program.block(b)?.code, &mut included)?;
        let entrypoint = program.is_entrypoint(b.into());
        let args = params.iter().map(|p| Atom::Temp(*p)).collect();
        let mut cfg = self.new_cfg(
            CfgKind::Block {
                block: b,
                params,
                entrypoint,
            },
            included,
        );
        cfg.entry = vec![self.edge(&mut cfg, Source::Entry, b, args)];
        self.finish(cfg)
    }

    fn closure_cfg(&mut self, k: ClosureId) -> InternalResult<Cfg> {
        let program = self.program;
        let tail = &program.closure(k)?.tail;
        let mut included = vec![];
        if let Tail::BlockCall(bc) = tail {
            self.identify_call(k.into(), bc.target, &mut included)?;
        }
        let mut cfg = self.new_cfg(CfgKind::Closure(k), included);
        if let Tail::BlockCall(bc) = tail {
            cfg.entry = vec![self.edge(&mut cfg, Source::Entry, bc.target, bc.args.clone())];
        }
        self.finish(cfg)
    }

    /// The graph initialising every top-level value that is computed by a block.
    fn init_cfg(&mut self, defns: &[DefnId]) -> InternalResult<Option<Cfg>> {
        let program = self.program;
        let mut calls = vec![];
        for defn in defns {
            if let DefnId::Top(id) = *defn {
                if let Tail::BlockCall(bc) = &program.top(id)?.tail {
                    calls.push((id, bc));
                }
            }
        }
        if calls.is_empty() {
            return Ok(None);
        }
        let mut included = vec![];
        for (id, bc) in &calls {
            self.identify_call((*id).into(), bc.target, &mut included)?;
        }
        let mut cfg = self.new_cfg(CfgKind::Init, included);
        for (_, bc) in calls {
            let label = self.edge(&mut cfg, Source::Entry, bc.target, bc.args.clone());
            cfg.entry.push(label);
        }
        self.finish(cfg).map(Some)
    }

    fn finish(&mut self, mut cfg: Cfg) -> InternalResult<Cfg> {
        self.find_succs(&mut cfg)?;
        self.param_elim(&mut cfg)?;
        trace!("{cfg}");
        Ok(cfg)
    }

    fn is_small(&self, b: BlockId) -> InternalResult<bool> {
        Ok(!self.program.is_recursive(b.into())?
            && self.program.block(b)?.code.is_small(self.small_block_limit))
    }

    /// Add the blocks reachable by jumps from `code` to `included`. A block stays out of the
    /// graph when it does real work and is called as a function from elsewhere.
    fn identify_code(
        &self,
        src: DefnId,
        code: &Code,
        included: &mut Vec<BlockId>,
    ) -> InternalResult<()> {
        for bc in ending_calls(code) {
            self.identify_call(src, bc.target, included)?;
        }
        Ok(())
    }

    fn identify_call(
        &self,
        src: DefnId,
        b: BlockId,
        included: &mut Vec<BlockId>,
    ) -> InternalResult<()> {
        if included.contains(&b) {
            return Ok(());
        }
        let block = self.program.block(b)?;
        if self.program.in_other_scc(b, src)? && block.meta.calls != 0 && !self.is_small(b)? {
            return Ok(());
        }
        included.push(b);
        self.identify_code(b.into(), &block.code, included)
    }

    fn add_label(&mut self, cfg: &mut Cfg, kind: LabelKind, pred: Pred) -> LabelId {
        cfg.labels.push(Label {
            num: self.num(),
            kind,
            preds: vec![pred],
            succs: vec![],
            phis: vec![],
        });
        cfg.labels.len() - 1
    }

    /// Register an edge from `source` to block `b`, returning the label it arrives at.
    fn edge(&mut self, cfg: &mut Cfg, source: Source, b: BlockId, args: Vec<Atom>) -> LabelId {
        if !cfg.included.contains(&b) {
            let call = BlockCall::new(b, args.clone());
            return self.add_label(cfg, LabelKind::Call(call), Pred { source, args });
        }
        let Some(target) = cfg.label_for(b) else {
            return self.add_label(cfg, LabelKind::Code(b), Pred { source, args });
        };
        if cfg.labels[target].preds.iter().any(|p| p.source == source) {
            // A second edge from the same source would make the phi functions ambiguous.
            let goto = self.add_label(
                cfg,
                LabelKind::Goto(target),
                Pred {
                    source,
                    args: args.clone(),
                },
            );
            cfg.labels[target].preds.push(Pred {
                source: Source::Label(goto),
                args,
            });
            return goto;
        }
        cfg.labels[target].preds.push(Pred { source, args });
        target
    }

    /// Compute the successors of every label, adding labels as they are discovered.
    fn find_succs(&mut self, cfg: &mut Cfg) -> InternalResult<()> {
        let program = self.program;
        let mut i = 0;
        while i < cfg.labels.len() {
            let succs = match cfg.labels[i].kind {
                LabelKind::Code(b) => {
                    let mut succs = vec![];
                    for bc in ending_calls(&program.block(b)?.code) {
                        succs.push(self.edge(cfg, Source::Label(i), bc.target, bc.args.clone()));
                    }
                    succs
                }
                LabelKind::Goto(target) => vec![target],
                LabelKind::Call(_) => vec![],
            };
            cfg.labels[i].succs = succs;
            i += 1;
        }
        Ok(())
    }

    /// Labels with a single predecessor rename their parameters to the arguments they receive;
    /// the others merge them with phi functions.
    fn param_elim(&self, cfg: &mut Cfg) -> InternalResult<()> {
        let mut renaming = TempSubst::new();
        for i in 0..cfg.labels.len() {
            let LabelKind::Code(b) = cfg.labels[i].kind else {
                continue;
            };
            let params = &self.program.block(b)?.params;
            let preds = &cfg.labels[i].preds;
            if let [pred] = preds.as_slice() {
                let args = renaming.apply_all(&pred.args);
                renaming.bind(params, &args)?;
                continue;
            }
            let mut phis = vec![];
            for (j, param) in params.iter().enumerate() {
                if param.is_wildcard() {
                    continue;
                }
                let mut incoming = vec![];
                for pred in preds {
                    let arg = pred.args.get(j).ok_or_else(|| {
                        InternalError::arity(format!("edge to {b}"), params.len(), pred.args.len())
                    })?;
                    incoming.push((cfg.source_name(pred.source), renaming.apply(arg)));
                }
                phis.push(Phi {
                    param: *param,
                    incoming,
                });
            }
            cfg.labels[i].phis = phis;
        }
        cfg.renaming = renaming;
        Ok(())
    }
}

/// The block calls that end a code sequence.
fn ending_calls(mut code: &Code) -> Vec<&BlockCall> {
    while let Some(rest) = code.rest() {
        code = rest;
    }
    match code {
        Code::Done(Tail::BlockCall(bc)) => vec![bc],
        Code::If {
            if_true, if_false, ..
        } => vec![if_true, if_false],
        Code::Case { alts, .. } => alts.calls().collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cfg::to_dot,
        error::Diagnostics,
        mil::{Prim, ProgramBuilder},
    };

    fn shaken(builder: ProgramBuilder) -> Program {
        let mut program = builder.finish();
        program.compute_sccs(&mut Diagnostics::new()).unwrap();
        program.count_occurrences().unwrap();
        program
    }

    fn names(cfgs: &[Cfg]) -> Vec<String> {
        cfgs.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn loops_merge_their_parameters() {
        let mut builder = ProgramBuilder::new();
        let main = builder.declare_block();
        let count = builder.declare_block();
        let stop = builder.block(vec![], Code::Done(Tail::ret(0.into())));
        let step = builder.declare_block();
        builder
            .define_block(main, vec![], Code::call(BlockCall::new(count, vec![3.into()])))
            .unwrap();
        let (n, z) = (builder.temp(), builder.temp());
        builder
            .define_block(
                count,
                vec![n],
                Code::bind(
                    vec![z],
                    Tail::PrimCall(Prim::Eq, vec![n.into(), 0.into()]),
                    Code::If {
                        test: z.into(),
                        if_true: BlockCall::new(stop, vec![]),
                        if_false: BlockCall::new(step, vec![n.into()]),
                    },
                ),
            )
            .unwrap();
        let (k, m) = (builder.temp(), builder.temp());
        builder
            .define_block(
                step,
                vec![k],
                Code::bind(
                    vec![m],
                    Tail::PrimCall(Prim::Sub, vec![k.into(), 1.into()]),
                    Code::call(BlockCall::new(count, vec![m.into()])),
                ),
            )
            .unwrap();
        builder.entrypoint(main);
        let mut program = shaken(builder);

        let cfgs = build_cfgs(&mut program, 4).unwrap();
        assert_eq!(vec!["b0: { b0 b1 b2 b3 }"], names(&cfgs));

        let cfg = &cfgs[0];
        let head = cfg.label_for(count).unwrap();
        assert_eq!(
            vec![Phi {
                param: n,
                incoming: vec![("b0".into(), Atom::Word(3)), ("b3".into(), m.into())],
            }],
            cfg.labels[head].phis
        );
        assert_eq!(Atom::from(n), cfg.renaming.apply(&k.into()));
        assert_eq!(
            "b1 (from b0, b3) -> b2, b3",
            cfg.details().to_string().lines().nth(2).unwrap().trim()
        );
    }

    #[test]
    fn repeated_edges_go_through_a_goto() {
        let mut builder = ProgramBuilder::new();
        let (x, y) = (builder.temp(), builder.temp());
        let join = builder.declare_block();
        let main = builder.block(
            vec![x],
            Code::If {
                test: x.into(),
                if_true: BlockCall::new(join, vec![1.into()]),
                if_false: BlockCall::new(join, vec![2.into()]),
            },
        );
        builder
            .define_block(join, vec![y], Code::Done(Tail::ret(y.into())))
            .unwrap();
        builder.entrypoint(main);
        let mut program = shaken(builder);

        let cfgs = build_cfgs(&mut program, 4).unwrap();
        let cfg = &cfgs[0];
        assert_eq!(3, cfg.labels.len());
        assert_eq!(LabelKind::Goto(1), cfg.labels[2].kind);
        assert_eq!(vec![1, 2], cfg.labels[0].succs);
        assert_eq!(
            vec![Source::Label(0), Source::Label(2)],
            cfg.labels[1]
                .preds
                .iter()
                .map(|p| p.source)
                .collect::<Vec<_>>()
        );
        assert_eq!(vec![1], cfg.labels[2].succs);
        assert_eq!(2, cfg.labels[1].phis[0].incoming.len());
    }

    #[test]
    fn large_functions_are_called() {
        let mut builder = ProgramBuilder::new();
        let p = builder.temp();
        let vars = builder.temps(5);
        let mut code = Code::Done(Tail::ret(vars[4].into()));
        for i in (0..5).rev() {
            let input = if i == 0 { p } else { vars[i - 1] };
            code = Code::bind(
                vec![vars[i]],
                Tail::PrimCall(Prim::Add, vec![input.into(), 1.into()]),
                code,
            );
        }
        let work = builder.block(vec![p], code);
        let r = builder.temp();
        let main = builder.block(
            vec![],
            Code::bind(
                vec![r],
                Tail::call(work, vec![1.into()]),
                Code::call(BlockCall::new(work, vec![r.into()])),
            ),
        );
        builder.entrypoint(main);
        let mut program = shaken(builder);

        let cfgs = build_cfgs(&mut program, 4).unwrap();
        assert_eq!(2, cfgs.len());
        assert_eq!("func_b0", cfgs[0].name());
        let cfg = &cfgs[1];
        assert_eq!("b1", cfg.name());
        assert_eq!(
            LabelKind::Call(BlockCall::new(work, vec![r.into()])),
            cfg.labels[1].kind
        );
        assert!(cfg.labels[1].succs.is_empty());
        assert!(cfg.to_string().starts_with("b1: { b1 c"));

        let CfgKind::Block { params, .. } = &cfgs[0].kind else {
            panic!("expected a block graph")
        };
        assert_ne!(vec![p], *params);
        assert_eq!(Atom::from(params[0]), cfgs[0].renaming.apply(&p.into()));
    }

    #[test]
    fn closures_and_top_levels_have_graphs() {
        let mut builder = ProgramBuilder::new();
        let x = builder.temp();
        let double = builder.block(
            vec![x],
            Code::Done(Tail::PrimCall(Prim::Add, vec![x.into(), x.into()])),
        );
        let y = builder.temp();
        let k = builder.closure(vec![], vec![y], Tail::call(double, vec![y.into()]));
        let top = builder.top(&["four"], Tail::call(double, vec![2.into()]));
        let f = builder.temp();
        let main = builder.block(
            vec![],
            Code::bind(
                vec![f],
                Tail::ClosAlloc(k, vec![]),
                Code::Done(Tail::Enter(f.into(), vec![Atom::top(top, 0)])),
            ),
        );
        builder.entrypoint(main);
        let mut program = shaken(builder);

        let cfgs = build_cfgs(&mut program, 4).unwrap();
        let names = names(&cfgs);
        assert!(names.contains(&"func_k0: { b0 }".to_string()), "{names:?}");
        assert!(names.contains(&"b1: { b1 }".to_string()), "{names:?}");
        assert_eq!(Some(&"init: { b0 }".to_string()), names.last());
    }

    #[test]
    fn dot_output_lists_nodes_and_edges() {
        let mut builder = ProgramBuilder::new();
        let x = builder.temp();
        let next = builder.block(vec![x], Code::Done(Tail::ret(x.into())));
        let main = builder.block(vec![], Code::call(BlockCall::new(next, vec![7.into()])));
        builder.entrypoint(main);
        let mut program = shaken(builder);

        let cfgs = build_cfgs(&mut program, 4).unwrap();
        assert_eq!(
            "digraph CFGs {\n\
             0[label=\"b1\",style=filled, fillcolor=lightblue];\n\
             0 -> 1;\n\
             1[label=\"b1\",style=filled, fillcolor=lightblue];\n\
             1 -> 2;\n\
             2[label=\"b0\",style=filled, fillcolor=lightblue];\n\
             }\n",
            to_dot(&cfgs)
        );
    }
}

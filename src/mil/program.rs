//! Whole programs: the graph of definitions, and everything they share.

use std::fmt::{self, Display, Formatter};

use super::{
    Atom, Block, BlockId, ClosureDefn, ClosureId, Code, DataTypes, DefnId, DefnMeta, Tail, Temps,
    TopId, TopLevel, TopRef,
};
use crate::{
    analysis::DefnScc,
    error::{InternalError, InternalResult},
};

/// A MIL program. Definitions are never removed; those that become unreachable are simply left
/// out of [`Program::sccs`] and [`Program::defns`] once the program is shaken.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub temps: Temps,
    pub datatypes: DataTypes,
    blocks: Vec<Block>,
    closures: Vec<ClosureDefn>,
    toplevels: Vec<TopLevel>,
    pub entrypoints: Vec<DefnId>,
    /// Strongly connected components of the reachable definitions, callees first.
    pub sccs: Vec<DefnScc>,
}
impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, block: Block) -> BlockId {
        self.blocks.push(block);
        BlockId::new(self.blocks.len() - 1)
    }

    pub fn add_closure(&mut self, closure: ClosureDefn) -> ClosureId {
        self.closures.push(closure);
        ClosureId::new(self.closures.len() - 1)
    }

    pub fn add_top(&mut self, top: TopLevel) -> TopId {
        self.toplevels.push(top);
        TopId::new(self.toplevels.len() - 1)
    }

    pub fn block(&self, id: BlockId) -> InternalResult<&Block> {
        self.blocks
            .get(id.index())
            .ok_or(InternalError::UndefinedBlock(id))
    }

    pub fn block_mut(&mut self, id: BlockId) -> InternalResult<&mut Block> {
        self.blocks
            .get_mut(id.index())
            .ok_or(InternalError::UndefinedBlock(id))
    }

    pub fn closure(&self, id: ClosureId) -> InternalResult<&ClosureDefn> {
        self.closures
            .get(id.index())
            .ok_or(InternalError::UndefinedClosure(id))
    }

    pub fn closure_mut(&mut self, id: ClosureId) -> InternalResult<&mut ClosureDefn> {
        self.closures
            .get_mut(id.index())
            .ok_or(InternalError::UndefinedClosure(id))
    }

    pub fn top(&self, id: TopId) -> InternalResult<&TopLevel> {
        self.toplevels
            .get(id.index())
            .ok_or(InternalError::UndefinedTopLevel {
                defn: id.into(),
                index: 0,
            })
    }

    pub fn top_mut(&mut self, id: TopId) -> InternalResult<&mut TopLevel> {
        self.toplevels
            .get_mut(id.index())
            .ok_or(InternalError::UndefinedTopLevel {
                defn: id.into(),
                index: 0,
            })
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(BlockId::new)
    }

    pub fn closure_ids(&self) -> impl Iterator<Item = ClosureId> {
        (0..self.closures.len()).map(ClosureId::new)
    }

    pub fn top_ids(&self) -> impl Iterator<Item = TopId> {
        (0..self.toplevels.len()).map(TopId::new)
    }

    /// Every definition ever added to the program, reachable or not.
    pub fn all_defns(&self) -> Vec<DefnId> {
        self.block_ids()
            .map(DefnId::from)
            .chain(self.closure_ids().map(DefnId::from))
            .chain(self.top_ids().map(DefnId::from))
            .collect()
    }

    /// The definitions that are still part of the program, callees first once components have
    /// been computed.
    pub fn defns(&self) -> Vec<DefnId> {
        if self.sccs.is_empty() {
            self.all_defns()
        } else {
            self.sccs
                .iter()
                .flat_map(|scc| scc.members.iter().copied())
                .collect()
        }
    }

    pub fn meta(&self, defn: DefnId) -> InternalResult<&DefnMeta> {
        Ok(match defn {
            DefnId::Block(id) => &self.block(id)?.meta,
            DefnId::Closure(id) => &self.closure(id)?.meta,
            DefnId::Top(id) => &self.top(id)?.meta,
        })
    }

    pub fn meta_mut(&mut self, defn: DefnId) -> InternalResult<&mut DefnMeta> {
        Ok(match defn {
            DefnId::Block(id) => &mut self.block_mut(id)?.meta,
            DefnId::Closure(id) => &mut self.closure_mut(id)?.meta,
            DefnId::Top(id) => &mut self.top_mut(id)?.meta,
        })
    }

    pub fn is_entrypoint(&self, defn: DefnId) -> bool {
        self.entrypoints.contains(&defn)
    }

    /// Is `b` in a different component from `scc`, or in no component at all?
    pub fn in_other_scc(&self, b: BlockId, defn: DefnId) -> InternalResult<bool> {
        let theirs = self.block(b)?.meta.scc;
        let ours = self.meta(defn)?.scc;
        Ok(theirs.is_none() || theirs != ours)
    }

    /// Whether the component containing `defn` is recursive.
    pub fn is_recursive(&self, defn: DefnId) -> InternalResult<bool> {
        Ok(match self.meta(defn)?.scc {
            Some(scc) => self.sccs.get(scc.index()).is_some_and(|scc| scc.recursive),
            None => false,
        })
    }

    /// The definitions referenced by `defn`, without duplicates, in order of appearance.
    pub fn callees(&self, defn: DefnId) -> InternalResult<Vec<DefnId>> {
        let mut callees = vec![];
        let mut add = |d: DefnId| {
            if !callees.contains(&d) {
                callees.push(d)
            }
        };
        let tail_refs = |tail: &Tail, add: &mut dyn FnMut(DefnId)| {
            match tail {
                Tail::BlockCall(bc) => add(bc.target.into()),
                Tail::ClosAlloc(k, _) => add((*k).into()),
                _ => {}
            }
            for atom in tail.atoms() {
                if let Atom::Top(TopRef { top, .. }) = atom {
                    add((*top).into())
                }
            }
        };
        match defn {
            DefnId::Block(id) => {
                let code = &self.block(id)?.code;
                code.visit_tails(&mut |t| tail_refs(t, &mut add));
                code.visit_calls(&mut |bc| add(bc.target.into()));
                code.visit_atoms(&mut |a| {
                    if let Atom::Top(TopRef { top, .. }) = a {
                        add((*top).into())
                    }
                });
            }
            DefnId::Closure(id) => tail_refs(&self.closure(id)?.tail, &mut add),
            DefnId::Top(id) => tail_refs(&self.top(id)?.tail, &mut add),
        }
        Ok(callees)
    }

    /// The allocator computing a top-level value, if that is all the definition does.
    pub fn top_allocator(&self, r: TopRef) -> Option<&Tail> {
        let top = self.toplevels.get(r.top.index())?;
        (top.lhs.len() == 1 && r.index == 0 && top.tail.is_allocator()).then_some(&top.tail)
    }

    /// Write a single definition in textual form.
    pub fn fmt_defn(&self, f: &mut Formatter, defn: DefnId) -> fmt::Result {
        match defn {
            DefnId::Block(id) => match self.blocks.get(id.index()) {
                Some(block) => write!(
                    f,
                    "{id}[{}] =\n{}",
                    temp_list(&block.params),
                    block.code.display(4)
                ),
                None => write!(f, "{id} = ?"),
            },
            DefnId::Closure(id) => match self.closures.get(id.index()) {
                Some(k) => write!(
                    f,
                    "{id}{{{}}} [{}] = {}",
                    temp_list(&k.stored),
                    temp_list(&k.params),
                    k.tail
                ),
                None => write!(f, "{id} = ?"),
            },
            DefnId::Top(id) => match self.toplevels.get(id.index()) {
                Some(top) => write!(f, "{id} ({}) <- {}", top.names().join(", "), top.tail),
                None => write!(f, "{id} = ?"),
            },
        }
    }

    pub fn display_defn(&self, defn: DefnId) -> DefnDisplay<'_> {
        DefnDisplay {
            program: self,
            defn,
        }
    }

    /// Number of bindings in all retained blocks, a rough measure of program size.
    pub fn size(&self) -> usize {
        self.defns()
            .into_iter()
            .map(|d| match d {
                DefnId::Block(id) => self
                    .blocks
                    .get(id.index())
                    .map(|b| code_size(&b.code))
                    .unwrap_or(0),
                _ => 1,
            })
            .sum()
    }
}

fn code_size(code: &Code) -> usize {
    1 + code.rest().map(code_size).unwrap_or(0)
}

fn temp_list(temps: &[super::TempId]) -> String {
    temps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct DefnDisplay<'a> {
    program: &'a Program,
    defn: DefnId,
}
impl Display for DefnDisplay<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.program.fmt_defn(f, self.defn)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut defns = self.defns();
        defns.sort();
        for (i, defn) in defns.into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            self.fmt_defn(f, defn)?;
            writeln!(f)?;
        }
        if !self.entrypoints.is_empty() {
            let entries: Vec<_> = self.entrypoints.iter().map(ToString::to_string).collect();
            writeln!(f, "\nexport {}", entries.join(", "))?;
        }
        Ok(())
    }
}

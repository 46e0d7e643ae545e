//! Control flow graphs, as a back end would build them from an optimised program.
//!
//! Every block that is called as a function (or is an entrypoint), every closure definition
//! and the initialisation of top-level values gets a [`Cfg`]. The nodes of a graph are labels:
//! the code of a block included in the graph, a call to a block compiled as a separate
//! function, or a goto inserted so that no label has the same predecessor twice.

mod build;
mod dot;

use std::fmt::{self, Display, Formatter};

pub use build::build_cfgs;
pub use dot::to_dot;

use crate::mil::{Atom, BlockCall, BlockId, ClosureId, TempId, TempSubst};

pub type LabelId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelKind {
    /// The code of a block included in this graph.
    Code(BlockId),
    /// A call to a block that is compiled as a separate function; the result is returned.
    Call(BlockCall),
    /// Passes control on to another label of the same graph.
    Goto(LabelId),
}

/// Where an edge comes from: the start of the graph, or one of its labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Entry,
    Label(LabelId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pred {
    pub source: Source,
    pub args: Vec<Atom>,
}

/// Merges the values passed for one block parameter by each predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phi {
    pub param: TempId,
    /// The name of each predecessor, with the value it passes.
    pub incoming: Vec<(String, Atom)>,
}
impl Display for Phi {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} = phi(", self.param)?;
        for (i, (label, atom)) in self.incoming.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{label}: {atom}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Number of the node, unique among all graphs built together.
    pub num: usize,
    pub kind: LabelKind,
    pub preds: Vec<Pred>,
    pub succs: Vec<LabelId>,
    pub phis: Vec<Phi>,
}
impl Label {
    pub fn name(&self) -> String {
        match &self.kind {
            LabelKind::Code(b) => b.to_string(),
            LabelKind::Call(_) => format!("c{}", self.num),
            LabelKind::Goto(_) => format!("g{}", self.num),
        }
    }

    fn dot_attrs(&self) -> &'static str {
        match self.kind {
            LabelKind::Code(_) => BLOCK_ATTRS,
            LabelKind::Call(_) => "style=filled, fillcolor=palegreen",
            LabelKind::Goto(_) => "style=filled, fillcolor=thistle1",
        }
    }
}

const BLOCK_ATTRS: &str = "style=filled, fillcolor=lightblue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfgKind {
    /// A block compiled as a function, with fresh names for its parameters.
    Block {
        block: BlockId,
        params: Vec<TempId>,
        entrypoint: bool,
    },
    Closure(ClosureId),
    /// Computes the top-level values that need code to run.
    Init,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cfg {
    pub num: usize,
    pub kind: CfgKind,
    pub labels: Vec<Label>,
    /// Successors of the start of the graph.
    pub entry: Vec<LabelId>,
    /// Blocks whose code is part of this graph.
    pub included: Vec<BlockId>,
    /// Renamings for the parameters of labels with a single predecessor.
    pub renaming: TempSubst,
}
impl Cfg {
    pub fn name(&self) -> String {
        match &self.kind {
            CfgKind::Block {
                block,
                entrypoint: true,
                ..
            } => block.to_string(),
            CfgKind::Block { block, .. } => format!("func_{block}"),
            CfgKind::Closure(k) => format!("func_{k}"),
            CfgKind::Init => "init".to_string(),
        }
    }

    fn dot_attrs(&self) -> &'static str {
        match self.kind {
            CfgKind::Closure(_) => "style=filled, fillcolor=white",
            _ => BLOCK_ATTRS,
        }
    }

    pub fn label_for(&self, block: BlockId) -> Option<LabelId> {
        self.labels
            .iter()
            .position(|label| label.kind == LabelKind::Code(block))
    }

    fn source_name(&self, source: Source) -> String {
        match source {
            Source::Entry => self.name(),
            Source::Label(l) => self
                .labels
                .get(l)
                .map(Label::name)
                .unwrap_or_else(|| "?".to_string()),
        }
    }

    /// A listing of every label, with its predecessors, successors and phi functions.
    pub fn details(&self) -> CfgDetails<'_> {
        CfgDetails(self)
    }
}

/// Summary of a graph: its name and the names of its labels.
impl Display for Cfg {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {{", self.name())?;
        for label in &self.labels {
            write!(f, " {}", label.name())?;
        }
        write!(f, " }}")
    }
}

pub struct CfgDetails<'a>(&'a Cfg);
impl Display for CfgDetails<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let cfg = self.0;
        let names = |ids: &[LabelId]| {
            ids.iter()
                .map(|&l| cfg.source_name(Source::Label(l)))
                .collect::<Vec<_>>()
                .join(", ")
        };
        match &cfg.kind {
            CfgKind::Block { params, .. } => {
                let params: Vec<_> = params.iter().map(ToString::to_string).collect();
                writeln!(f, "{}[{}] -> {}", cfg.name(), params.join(", "), names(&cfg.entry))?
            }
            _ => writeln!(f, "{} -> {}", cfg.name(), names(&cfg.entry))?,
        }
        for label in &cfg.labels {
            let preds: Vec<_> = label
                .preds
                .iter()
                .map(|p| cfg.source_name(p.source))
                .collect();
            write!(f, "  {}", label.name())?;
            match &label.kind {
                LabelKind::Code(_) => {}
                LabelKind::Call(bc) => write!(f, " calls {bc}")?,
                LabelKind::Goto(target) => write!(f, " goes to {}", names(&[*target]))?,
            }
            write!(f, " (from {})", preds.join(", "))?;
            if !label.succs.is_empty() {
                write!(f, " -> {}", names(&label.succs))?;
            }
            writeln!(f)?;
            for phi in &label.phis {
                writeln!(f, "    {phi}")?;
            }
        }
        Ok(())
    }
}

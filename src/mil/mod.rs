//! The monadic intermediate language: its program representation and the basic operations on
//! it that every pass shares.

mod alpha;
mod atom;
mod builder;
mod cfun;
mod check;
mod code;
mod defn;
mod prim;
mod program;
mod subst;
mod tail;
mod temp;
mod types;
mod visit;

pub use alpha::{Alpha, AlphaEnv};
pub use atom::{Atom, AtomList, TopRef};
pub use builder::ProgramBuilder;
pub use cfun::{Cfun, DataType, DataTypeId, DataTypes};
pub use code::{Alts, CfunAlt, Code, CodeDisplay, Fallback};
pub use defn::{
    ArgPattern, Block, BlockId, ClosureDefn, ClosureId, DefnId, DefnMeta, Origin, TopId,
    TopLevel, TopLhs,
};
pub use prim::{Prim, Purity, Scalar};
pub use program::{DefnDisplay, Program};
pub use subst::TempSubst;
pub use tail::{BlockCall, Tail};
pub use temp::{TempId, Temps};
pub use types::Type;
pub use visit::{RepTransform, Specialize};

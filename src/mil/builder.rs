//! Convenient construction of programs, as a front end (or a test) would do it.

use super::{
    Block, BlockId, Cfun, ClosureDefn, ClosureId, Code, DefnId, Program, Tail, TempId, TopId,
    TopLevel, TopLhs, Type,
};
use crate::error::InternalResult;

/// Builds a [`Program`]. Blocks and closures may be declared before they are defined, so that
/// mutually recursive definitions can refer to each other.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
}
impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a data type, returning its constructors in order.
    pub fn data(&mut self, name: &str, cfuns: &[(&str, usize)]) -> Vec<Cfun> {
        self.program.datatypes.declare(name, cfuns)
    }

    pub fn temp(&mut self) -> TempId {
        self.program.temps.fresh()
    }

    pub fn typed_temp(&mut self, ty: Type) -> TempId {
        self.program.temps.fresh_typed(Some(ty))
    }

    pub fn temps(&mut self, n: usize) -> Vec<TempId> {
        self.program.temps.fresh_n(n)
    }

    /// Reserve a block, to be given its body later by [`Self::define_block`].
    pub fn declare_block(&mut self) -> BlockId {
        self.program
            .add_block(Block::new(vec![], Code::Done(Tail::Return(vec![]))))
    }

    pub fn define_block(
        &mut self,
        id: BlockId,
        params: Vec<TempId>,
        code: Code,
    ) -> InternalResult<()> {
        let block = self.program.block_mut(id)?;
        block.params = params;
        block.code = code;
        Ok(())
    }

    pub fn block(&mut self, params: Vec<TempId>, code: Code) -> BlockId {
        self.program.add_block(Block::new(params, code))
    }

    pub fn declare_closure(&mut self) -> ClosureId {
        self.program
            .add_closure(ClosureDefn::new(vec![], vec![], Tail::Return(vec![])))
    }

    pub fn define_closure(
        &mut self,
        id: ClosureId,
        stored: Vec<TempId>,
        params: Vec<TempId>,
        tail: Tail,
    ) -> InternalResult<()> {
        let closure = self.program.closure_mut(id)?;
        closure.stored = stored;
        closure.params = params;
        closure.tail = tail;
        Ok(())
    }

    pub fn closure(&mut self, stored: Vec<TempId>, params: Vec<TempId>, tail: Tail) -> ClosureId {
        self.program
            .add_closure(ClosureDefn::new(stored, params, tail))
    }

    pub fn top(&mut self, names: &[&str], tail: Tail) -> TopId {
        let lhs = names.iter().map(|name| TopLhs::new(*name)).collect();
        self.program.add_top(TopLevel::new(lhs, tail))
    }

    pub fn entrypoint<D: Into<DefnId>>(&mut self, defn: D) {
        let defn = defn.into();
        if !self.program.entrypoints.contains(&defn) {
            self.program.entrypoints.push(defn);
        }
    }

    pub fn program(&mut self) -> &mut Program {
        &mut self.program
    }

    pub fn finish(self) -> Program {
        self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mil::BlockCall;

    #[test]
    fn mutually_recursive_blocks_can_be_declared_first() {
        let mut builder = ProgramBuilder::new();
        let ping = builder.declare_block();
        let pong = builder.declare_block();
        builder
            .define_block(ping, vec![], Code::call(BlockCall::new(pong, vec![])))
            .unwrap();
        builder
            .define_block(pong, vec![], Code::call(BlockCall::new(ping, vec![])))
            .unwrap();
        builder.entrypoint(ping);
        builder.entrypoint(ping);
        let program = builder.finish();

        assert_eq!(vec![DefnId::Block(ping)], program.entrypoints);
        assert_eq!(
            "b0[] =\n    b1[]",
            program.display_defn(ping.into()).to_string()
        );
    }

    #[test]
    fn defining_an_undeclared_block_fails() {
        let mut builder = ProgramBuilder::new();
        assert!(builder
            .define_block(BlockId::new(5), vec![], Code::Done(Tail::Return(vec![])))
            .is_err());
    }
}

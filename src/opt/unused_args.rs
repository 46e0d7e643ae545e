//! Removing parameters that are never used, and the matching arguments at every call.

use std::collections::HashSet;

use super::Optimiser;
use crate::{
    ext::ConstHashMap,
    mil::{Atom, BlockCall, Code, DefnId, Tail, TempId},
    prelude::*,
};

/// For each block, which parameters are used; for each closure, which stored fields are.
type Usage = ConstHashMap<DefnId, Vec<bool>>;

fn keep<T: Clone>(items: &[T], used: &[bool]) -> Vec<T> {
    items
        .iter()
        .zip(used)
        .filter(|(_, u)| **u)
        .map(|(item, _)| item.clone())
        .collect()
}

/// The positions of `args` that reach a used parameter of the callee.
fn used_args<'a>(
    usage: &'a Usage,
    callee: DefnId,
    args: &'a [Atom],
) -> impl Iterator<Item = &'a Atom> + 'a {
    let used = usage.get(&callee);
    args.iter()
        .enumerate()
        .filter(move |(i, _)| used.map_or(true, |u| u.get(*i).copied().unwrap_or(true)))
        .map(|(_, a)| a)
}

fn tail_uses(usage: &Usage, tail: &Tail, used: &mut HashSet<TempId>) {
    let atoms: Vec<&Atom> = match tail {
        Tail::BlockCall(bc) => used_args(usage, bc.target.into(), &bc.args).collect(),
        Tail::ClosAlloc(k, args) => used_args(usage, (*k).into(), args).collect(),
        tail => tail.atoms(),
    };
    used.extend(atoms.into_iter().filter_map(Atom::as_temp));
}

fn call_uses(usage: &Usage, bc: &BlockCall, used: &mut HashSet<TempId>) {
    used.extend(used_args(usage, bc.target.into(), &bc.args).filter_map(Atom::as_temp));
}

/// Temporaries whose values are needed by `code`, given the current usage of its callees.
fn code_uses(usage: &Usage, code: &Code) -> HashSet<TempId> {
    match code {
        Code::Done(tail) => {
            let mut used = HashSet::new();
            tail_uses(usage, tail, &mut used);
            used
        }
        Code::Bind { vars, tail, rest } => {
            let mut used = code_uses(usage, rest);
            for v in vars {
                used.remove(v);
            }
            tail_uses(usage, tail, &mut used);
            used
        }
        Code::Assert { atom, rest, .. } => {
            let mut used = code_uses(usage, rest);
            used.extend(atom.as_temp());
            used
        }
        Code::If {
            test,
            if_true,
            if_false,
        } => {
            let mut used: HashSet<_> = test.as_temp().into_iter().collect();
            call_uses(usage, if_true, &mut used);
            call_uses(usage, if_false, &mut used);
            used
        }
        Code::Case { scrutinee, alts } => {
            let mut used: HashSet<_> = scrutinee.as_temp().into_iter().collect();
            for bc in alts.calls() {
                call_uses(usage, bc, &mut used);
            }
            used
        }
    }
}

/// Marks the parameters in `used`. A variable listed twice is only used once.
fn mark(params: &[TempId], used: &HashSet<TempId>) -> Vec<bool> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| used.contains(p) && !params[..i].contains(p))
        .collect()
}

impl Optimiser<'_> {
    fn compute_usage(&self) -> InternalResult<Usage> {
        let mut usage = Usage::default();
        for scc in &self.program.sccs {
            for defn in &scc.members {
                let n = match defn {
                    DefnId::Block(id) => self.program.block(*id)?.params.len(),
                    DefnId::Closure(id) => self.program.closure(*id)?.stored.len(),
                    DefnId::Top(_) => continue,
                };
                let entry = self.program.is_entrypoint(*defn);
                usage.insert(*defn, vec![entry; n]);
            }

            let mut changed = true;
            while changed {
                changed = false;
                for defn in &scc.members {
                    let found = match defn {
                        DefnId::Block(id) => {
                            let block = self.program.block(*id)?;
                            mark(&block.params, &code_uses(&usage, &block.code))
                        }
                        DefnId::Closure(id) => {
                            let k = self.program.closure(*id)?;
                            let mut used = HashSet::new();
                            tail_uses(&usage, &k.tail, &mut used);
                            mark(&k.stored, &used)
                        }
                        DefnId::Top(_) => continue,
                    };
                    if let Some(flags) = usage.get_mut(defn) {
                        for (flag, found) in flags.iter_mut().zip(found) {
                            if found && !*flag {
                                *flag = true;
                                changed = true;
                            }
                        }
                    }
                }
            }
        }
        Ok(usage)
    }

    /// Remove parameters of blocks, and stored fields of closures, that are never used.
    pub(super) fn unused_args(&mut self) -> InternalResult<()> {
        let usage = self.compute_usage()?;
        let mut pruned = Usage::default();
        for (defn, flags) in usage {
            if flags.iter().all(|u| *u) {
                continue;
            }
            self.current = Some(defn);
            let (removed, id) = match defn {
                DefnId::Block(id) => {
                    let block = self.program.block_mut(id)?;
                    let removed = block.params.len() - flags.iter().filter(|u| **u).count();
                    block.params = keep(&block.params, &flags);
                    (removed, id.to_string())
                }
                DefnId::Closure(id) => {
                    let k = self.program.closure_mut(id)?;
                    let removed = k.stored.len() - flags.iter().filter(|u| **u).count();
                    k.stored = keep(&k.stored, &flags);
                    (removed, id.to_string())
                }
                DefnId::Top(_) => continue,
            };
            self.report(format!("removed {removed} unused argument(s) of {id}"));
            pruned.insert(defn, flags);
        }
        self.current = None;
        if pruned.is_empty() {
            return Ok(());
        }

        let prune_alloc = |tail: &mut Tail| {
            if let Tail::ClosAlloc(k, args) = tail {
                if let Some(flags) = pruned.get(&(*k).into()) {
                    *args = keep(args, flags);
                }
            }
        };
        let prune_tail = |tail: &mut Tail| match tail {
            Tail::BlockCall(bc) => prune_call(&pruned, bc),
            tail => prune_alloc(tail),
        };
        for defn in self.program.all_defns() {
            match defn {
                DefnId::Block(id) => {
                    let code = &mut self.program.block_mut(id)?.code;
                    code.visit_tails_mut(&mut |t| prune_alloc(t));
                    code.visit_calls_mut(&mut |bc| prune_call(&pruned, bc));
                }
                DefnId::Closure(id) => prune_tail(&mut self.program.closure_mut(id)?.tail),
                DefnId::Top(id) => prune_tail(&mut self.program.top_mut(id)?.tail),
            }
        }
        Ok(())
    }
}

fn prune_call(pruned: &Usage, bc: &mut BlockCall) {
    if let Some(flags) = pruned.get(&bc.target.into()) {
        bc.args = keep(&bc.args, flags);
    }
}

//! Strongly connected components of the definition graph.
//!
//! Components are found with two depth-first searches: one over the call graph that records
//! the order in which definitions are finished, and one over the reversed graph, taking roots in
//! reverse finishing order, that collects each component. The second search discovers callers
//! before callees, so the result is reversed before it is stored.

use std::collections::{HashMap, HashSet};

use crate::{
    error::{Diagnostics, ProgramError},
    mil::{DefnId, Program},
    prelude::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SccId(u32);
impl SccId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A set of definitions that (directly or indirectly) refer to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefnScc {
    pub members: Vec<DefnId>,
    /// Set when some member can reach itself.
    pub recursive: bool,
    /// Components that the members of this one refer to.
    pub uses: Vec<SccId>,
}

/// Computes the components of every definition reachable from `roots`, callees first.
pub fn compute_sccs(program: &Program, roots: &[DefnId]) -> InternalResult<Vec<DefnScc>> {
    let mut callees = HashMap::new();
    let mut finished = vec![];
    let mut visited = HashSet::new();

    for root in roots {
        if !visited.insert(*root) {
            continue;
        }
        let mut stack = vec![(*root, 0)];
        callees.insert(*root, program.callees(*root)?);
        while let Some((defn, next)) = stack.pop() {
            let succ = callees[&defn].get(next).copied();
            match succ {
                Some(callee) => {
                    stack.push((defn, next + 1));
                    if visited.insert(callee) {
                        callees.insert(callee, program.callees(callee)?);
                        stack.push((callee, 0));
                    }
                }
                None => finished.push(defn),
            }
        }
    }

    let mut callers: HashMap<DefnId, Vec<DefnId>> = HashMap::new();
    for defn in &finished {
        for callee in &callees[defn] {
            callers.entry(*callee).or_default().push(*defn);
        }
    }

    let mut assigned: HashMap<DefnId, usize> = HashMap::new();
    let mut components: Vec<Vec<DefnId>> = vec![];
    for root in finished.iter().rev() {
        if assigned.contains_key(root) {
            continue;
        }
        let index = components.len();
        let mut members = vec![];
        let mut stack = vec![*root];
        assigned.insert(*root, index);
        while let Some(defn) = stack.pop() {
            members.push(defn);
            for caller in callers.get(&defn).into_iter().flatten() {
                if !assigned.contains_key(caller) {
                    assigned.insert(*caller, index);
                    stack.push(*caller);
                }
            }
        }
        members.sort();
        components.push(members);
    }

    // Components were found callers first.
    let count = components.len();
    let position = |discovered: usize| SccId::new(count - 1 - discovered);
    let mut sccs: Vec<DefnScc> = components
        .into_iter()
        .rev()
        .map(|members| DefnScc {
            members,
            recursive: false,
            uses: vec![],
        })
        .collect();

    for (i, scc) in sccs.iter_mut().enumerate() {
        let own = SccId::new(i);
        for member in &scc.members {
            for callee in &callees[member] {
                let target = position(assigned[callee]);
                if target == own {
                    if scc.members.len() > 1 || callee == member {
                        scc.recursive = true;
                    }
                } else if !scc.uses.contains(&target) {
                    scc.uses.push(target);
                }
            }
        }
        scc.recursive |= scc.members.len() > 1;
    }
    Ok(sccs)
}

impl Program {
    /// Recompute the components of the definitions reachable from the entrypoints, dropping
    /// every other definition from the program. Top-level values that depend on themselves
    /// are reported as errors.
    pub fn compute_sccs(&mut self, diagnostics: &mut Diagnostics) -> InternalResult<()> {
        let all = self.all_defns();
        for entry in &self.entrypoints {
            if !all.contains(entry) {
                diagnostics.report(ProgramError::UnknownEntrypoint(*entry));
            }
        }
        let roots: Vec<_> = self
            .entrypoints
            .iter()
            .copied()
            .filter(|e| all.contains(e))
            .collect();
        if roots.is_empty() {
            diagnostics.report(ProgramError::NoEntrypoints);
        }

        let sccs = compute_sccs(self, &roots)?;
        for defn in all {
            self.meta_mut(defn)?.scc = None;
        }
        for (i, scc) in sccs.iter().enumerate() {
            for member in &scc.members {
                self.meta_mut(*member)?.scc = Some(SccId::new(i));
            }
            if scc.recursive {
                self.check_recursive_tops(scc, diagnostics)?;
            }
        }
        trace!("{} reachable component(s)", sccs.len());
        self.sccs = sccs;
        Ok(())
    }

    /// Whether neither the component of `defn` nor any component it reaches is recursive.
    /// Definitions outside every component, such as ones derived since the last computation,
    /// are not.
    pub fn reaches_no_recursion(&self, defn: DefnId) -> InternalResult<bool> {
        let Some(start) = self.meta(defn)?.scc else {
            return Ok(false);
        };
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(scc) = self.sccs.get(id.index()) else {
                return Ok(false);
            };
            if scc.recursive {
                return Ok(false);
            }
            stack.extend(scc.uses.iter().copied());
        }
        Ok(true)
    }

    /// Recursive top-level definitions are only allowed when they allocate, so that the
    /// value exists before anything reads it.
    fn check_recursive_tops(
        &self,
        scc: &DefnScc,
        diagnostics: &mut Diagnostics,
    ) -> InternalResult<()> {
        let mut illegal = false;
        let mut names = vec![];
        for member in &scc.members {
            if let DefnId::Top(id) = member {
                let top = self.top(*id)?;
                illegal |= !top.tail.is_allocator();
                names.extend(top.names());
            }
        }
        if illegal {
            diagnostics.report(ProgramError::IllegalRecursiveTopLevel(names));
        }
        Ok(())
    }
}

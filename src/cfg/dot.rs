//! Graphviz output for control flow graphs.

use std::fmt::Write;

use super::Cfg;

/// Describe `cfgs` as a single dot graph, with one node for each graph and each of its labels.
pub fn to_dot(cfgs: &[Cfg]) -> String {
    let mut out = String::from("digraph CFGs {\n");
    for cfg in cfgs {
        node(&mut out, cfg.num, &cfg.name(), cfg.dot_attrs());
        for &succ in &cfg.entry {
            edge(&mut out, cfg, cfg.num, succ);
        }
        for label in &cfg.labels {
            node(&mut out, label.num, &label.name(), label.dot_attrs());
            for &succ in &label.succs {
                edge(&mut out, cfg, label.num, succ);
            }
        }
    }
    out.push_str("}\n");
    out
}

fn node(out: &mut String, num: usize, name: &str, attrs: &str) {
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{num}[label=\"{name}\",{attrs}];");
}

fn edge(out: &mut String, cfg: &Cfg, from: usize, to: usize) {
    if let Some(label) = cfg.labels.get(to) {
        let _ = writeln!(out, "{from} -> {};", label.num);
    }
}

//! Graphviz export.
//!
//! Internal nodes are drawn as circles labelled with their decision, leaves
//! as boxes labelled with their expression. Solid edges lead to the true
//! branch, dashed edges to the false branch.

use std::collections::BTreeMap;

use crate::node::Node;
use crate::types::NodeId;
use crate::xadd::Xadd;

impl Xadd {
    pub fn to_dot(&mut self, roots: &[NodeId]) -> Result<String, std::fmt::Error> {
        use std::fmt::Write as _;

        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "node [shape=circle];")?;

        let all_nodes = self.descendants(roots.iter().copied());

        // Leaves at the bottom rank.
        writeln!(dot, "{{ rank=sink")?;
        for &id in &all_nodes {
            if let Node::Leaf(e) = self.node(id) {
                let label = self.pool().display(e);
                writeln!(dot, "{} [shape=box, label=\"{}\"];", id.index(), label)?;
            }
        }
        writeln!(dot, "}}")?;

        // Internal nodes grouped per decision level.
        let mut levels = BTreeMap::<u32, Vec<NodeId>>::new();
        for &id in &all_nodes {
            if let Node::Internal { dec, .. } = self.node(id) {
                levels.entry(dec.index()).or_default().push(id);
            }
        }
        for ids in levels.values() {
            writeln!(dot, "{{ rank=same")?;
            for &id in ids {
                let dec = self.decision_of(id).expect("grouped nodes are internal");
                let label = self.registry.display(&mut self.pool, dec);
                writeln!(dot, "{} [label=\"{}\"];", id.index(), label.replace('"', "\\\""))?;
            }
            writeln!(dot, "}}")?;
        }

        // Edges: solid to the true branch, dashed to the false branch.
        for &id in &all_nodes {
            if let Node::Internal { low, high, .. } = self.node(id) {
                writeln!(dot, "{} -> {};", id.index(), high.index())?;
                writeln!(dot, "{} -> {} [style=dashed];", id.index(), low.index())?;
            }
        }

        // Roots.
        writeln!(dot, "{{ rank=source")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} [shape=rect, label=\"{}\"];", i, root)?;
        }
        writeln!(dot, "}}")?;
        for (i, &root) in roots.iter().enumerate() {
            writeln!(dot, "r{} -> {};", i, root.index())?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_contains_all_nodes() {
        let mut xadd = Xadd::new();
        xadd.declare_bool("b");
        let f = xadd
            .import("( b ( [1] ) ( [x + y <= 0] ( [0] ) ( [2] ) ) )")
            .unwrap();
        let dot = xadd.to_dot(&[f]).unwrap();

        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("label=\"b\""));
        assert!(dot.contains("x + y <= 0"));
        assert!(dot.contains("style=dashed"));
        assert!(dot.contains("r0 ->"));
    }
}

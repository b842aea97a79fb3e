//! Structural connectivity audit.
//!
//! Finds nodes with no DC conduction path to ground. Such nodes make the
//! MNA matrix singular (or leave the operating point arbitrary), and are
//! almost always a wiring mistake in the topology builder. Conduction paths
//! come from each device's `dc_topology` report: resistors, voltage
//! sources, inductors and junctions conduct; ideal current sources and
//! capacitors do not.

use std::collections::VecDeque;
use std::fmt;

use crate::circuit::Circuit;
use crate::node::NodeId;

/// Result of a connectivity audit.
#[derive(Debug, Clone)]
pub struct AuditReport {
    floating: Vec<(NodeId, String)>,
    num_nodes: usize,
}

impl AuditReport {
    /// Whether every node has a DC path to ground.
    pub fn is_clean(&self) -> bool {
        self.floating.is_empty()
    }

    /// The floating nodes, with labels where available.
    pub fn floating(&self) -> &[(NodeId, String)] {
        &self.floating
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            write!(
                f,
                "connectivity: all {} nodes have a DC path to ground",
                self.num_nodes
            )
        } else {
            writeln!(
                f,
                "connectivity: {} of {} nodes are floating:",
                self.floating.len(),
                self.num_nodes
            )?;
            for (node, name) in &self.floating {
                writeln!(f, "  node {node} ({name}): no DC path to ground")?;
            }
            Ok(())
        }
    }
}

/// Check that every node reaches ground through DC conduction paths.
///
/// Breadth-first search from all ground-adjacent nodes over the undirected
/// graph of `dc_topology` pairs. Requires a finalised circuit.
pub fn check_dc_paths(circuit: &Circuit) -> AuditReport {
    assert!(
        circuit.is_finalized(),
        "connectivity audit requires a finalized circuit"
    );

    let num_nodes = circuit.num_nodes();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
    let mut reached = vec![false; num_nodes];
    let mut queue = VecDeque::new();

    for (a, b) in circuit.dc_connections() {
        match (a.index(), b.index()) {
            (Some(u), Some(v)) => {
                adjacency[u].push(v);
                adjacency[v].push(u);
            }
            // One side grounded: the other side is a BFS seed.
            (Some(u), None) | (None, Some(u)) => {
                if !reached[u] {
                    reached[u] = true;
                    queue.push_back(u);
                }
            }
            (None, None) => {}
        }
    }

    while let Some(u) = queue.pop_front() {
        for &v in &adjacency[u] {
            if !reached[v] {
                reached[v] = true;
                queue.push_back(v);
            }
        }
    }

    let floating = (0..num_nodes)
        .filter(|&i| !reached[i])
        .map(|i| {
            let id = NodeId::from_index(i);
            let name = circuit
                .node_label(id)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("node_{i}"));
            (id, name)
        })
        .collect();

    AuditReport {
        floating,
        num_nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, StampContext};

    /// Test-only element that reports a single conduction pair.
    #[derive(Debug)]
    struct Wire(NodeId, NodeId);

    impl Element for Wire {
        fn label(&self) -> &str {
            "W"
        }

        fn linear_stamp(&self, _ctx: &mut StampContext<'_>) {}

        fn dc_topology(&self, out: &mut Vec<(NodeId, NodeId)>) {
            out.push((self.0, self.1));
        }
    }

    /// Element with no DC path (a capacitor or current source).
    #[derive(Debug)]
    struct Open;

    impl Element for Open {
        fn label(&self) -> &str {
            "O"
        }

        fn linear_stamp(&self, _ctx: &mut StampContext<'_>) {}
    }

    #[test]
    fn test_chain_to_ground_is_clean() {
        let mut circuit = Circuit::new();
        let a = circuit.add_node();
        let b = circuit.add_node();
        circuit.add(Wire(a, b));
        circuit.add(Wire(b, NodeId::GROUND));
        circuit.finalize();

        let report = check_dc_paths(&circuit);
        assert!(report.is_clean());
    }

    #[test]
    fn test_open_element_leaves_node_floating() {
        let mut circuit = Circuit::new();
        let a = circuit.add_node();
        let b = circuit.add_named_node("FLOAT");
        circuit.add(Wire(a, NodeId::GROUND));
        // b only connects through an element with no DC path.
        circuit.add(Open);
        circuit.finalize();

        let report = check_dc_paths(&circuit);
        assert!(!report.is_clean());
        assert_eq!(report.floating().len(), 1);
        assert_eq!(report.floating()[0].0, b);
        assert_eq!(report.floating()[0].1, "FLOAT");
    }

    #[test]
    fn test_island_not_reached_through_itself() {
        let mut circuit = Circuit::new();
        let a = circuit.add_node();
        let b = circuit.add_node();
        // a-b are connected to each other but not to ground.
        circuit.add(Wire(a, b));
        circuit.finalize();

        let report = check_dc_paths(&circuit);
        assert_eq!(report.floating().len(), 2);
    }
}

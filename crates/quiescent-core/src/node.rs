//! Node identifiers for circuit graphs.

use std::fmt;

use nalgebra::DVector;

/// Identifies a node in the circuit.
///
/// Non-ground nodes carry an index in `[0, num_nodes)` that doubles as the
/// node's row/column in the MNA system. Ground is the reserved sentinel
/// [`NodeId::GROUND`] and is never stored as an unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(i32);

impl NodeId {
    /// The ground node. Always 0 V, never part of the unknown vector.
    pub const GROUND: NodeId = NodeId(-1);

    /// Create a NodeId from a matrix index.
    pub fn from_index(index: usize) -> Self {
        NodeId(index as i32)
    }

    /// The MNA matrix index of this node, or `None` for ground.
    pub fn index(self) -> Option<usize> {
        if self.is_ground() {
            None
        } else {
            Some(self.0 as usize)
        }
    }

    /// Check if this is the ground node.
    pub fn is_ground(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Read a node voltage from a solution vector. Ground reads as 0.
pub fn node_voltage(x: &DVector<f64>, node: NodeId) -> f64 {
    match node.index() {
        Some(i) => x[i],
        None => 0.0,
    }
}

/// A node in the circuit graph.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    /// Optional label, used only for diagnostics.
    label: Option<String>,
}

impl Node {
    /// Create an unlabelled node.
    pub fn new(id: NodeId) -> Self {
        Self { id, label: None }
    }

    /// Create a labelled node.
    pub fn with_label(id: NodeId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: Some(label.into()),
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_sentinel() {
        assert!(NodeId::GROUND.is_ground());
        assert_eq!(NodeId::GROUND.index(), None);
        assert_eq!(NodeId::GROUND.to_string(), "GND");
    }

    #[test]
    fn test_node_index_roundtrip() {
        let n = NodeId::from_index(7);
        assert!(!n.is_ground());
        assert_eq!(n.index(), Some(7));
        assert_eq!(n.to_string(), "7");
    }

    #[test]
    fn test_node_voltage_reads() {
        let x = DVector::from_vec(vec![1.5, -3.0]);
        assert_eq!(node_voltage(&x, NodeId::from_index(0)), 1.5);
        assert_eq!(node_voltage(&x, NodeId::from_index(1)), -3.0);
        assert_eq!(node_voltage(&x, NodeId::GROUND), 0.0);
    }

    #[test]
    fn test_labelled_node() {
        let n = Node::with_label(NodeId::from_index(2), "OUT");
        assert_eq!(n.id().index(), Some(2));
        assert_eq!(n.label(), Some("OUT"));
    }
}

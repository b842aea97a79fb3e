//! Circuit assembler: node allocation, device registry, finalisation.

use std::marker::PhantomData;

use indexmap::IndexMap;
use nalgebra::DVector;

use crate::element::{Element, LimitContext, StampContext};
use crate::mna::MnaSystem;
use crate::node::{Node, NodeId};

/// Typed handle to a registered device.
///
/// Returned by [`Circuit::add`]; lets harnesses reach back into a device
/// (e.g. to retune a supply voltage between warm-started solves) without
/// keeping references into the circuit.
pub struct DeviceHandle<E> {
    index: usize,
    _marker: PhantomData<fn() -> E>,
}

impl<E> Clone for DeviceHandle<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for DeviceHandle<E> {}

/// A circuit under construction, and after [`finalize`](Circuit::finalize)
/// the read-only device registry the solver iterates over.
///
/// Devices are stored once in registration order; the capability lists
/// (`newton`, `dynamic`, `branch`) hold indices into that canonical list so
/// a single device can participate in several solver phases without being
/// cloned.
#[derive(Debug, Default)]
pub struct Circuit {
    nodes: Vec<Node>,
    elements: Vec<Box<dyn Element>>,
    newton: Vec<usize>,
    dynamic: Vec<usize>,
    branch: Vec<usize>,
    nodesets: IndexMap<NodeId, f64>,
    num_branches: usize,
    finalized: bool,
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unlabelled node. Indices are handed out monotonically.
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node::new(id));
        id
    }

    /// Create a labelled node.
    pub fn add_named_node(&mut self, label: impl Into<String>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node::with_label(id, label));
        id
    }

    /// Get a node's label, if it has one.
    pub fn node_label(&self, node: NodeId) -> Option<&str> {
        node.index()
            .and_then(|i| self.nodes.get(i))
            .and_then(|n| n.label())
    }

    /// Find a node by label.
    pub fn find_node(&self, label: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.label() == Some(label))
            .map(|n| n.id())
    }

    /// Register a device, recording it in the capability dispatch lists.
    ///
    /// Panics if called after [`finalize`](Circuit::finalize): branch
    /// indices are already assigned and the unknown count is fixed.
    pub fn add<E: Element>(&mut self, element: E) -> DeviceHandle<E> {
        assert!(
            !self.finalized,
            "cannot add {:?} after finalize: unknown layout is fixed",
            element.label()
        );
        let index = self.elements.len();
        if element.is_newton() {
            self.newton.push(index);
        }
        if element.is_dynamic() {
            self.dynamic.push(index);
        }
        if element.branch_count() > 0 {
            self.branch.push(index);
        }
        self.elements.push(Box::new(element));
        DeviceHandle {
            index,
            _marker: PhantomData,
        }
    }

    /// Borrow a registered device through its handle.
    pub fn device<E: Element>(&self, handle: DeviceHandle<E>) -> &E {
        let any: &dyn std::any::Any = self.elements[handle.index].as_ref();
        any.downcast_ref::<E>()
            .expect("device handle does not match the stored element type")
    }

    /// Mutably borrow a registered device through its handle.
    ///
    /// Parameter mutation (a swept supply value, say) is fine after
    /// finalisation; topology is not, and there is no way to change it here.
    pub fn device_mut<E: Element>(&mut self, handle: DeviceHandle<E>) -> &mut E {
        let any: &mut dyn std::any::Any = self.elements[handle.index].as_mut();
        any.downcast_mut::<E>()
            .expect("device handle does not match the stored element type")
    }

    /// Record an initial-guess voltage for a node. Not a constraint: the
    /// value only seeds Newton's starting point.
    pub fn set_nodeset(&mut self, node: NodeId, voltage: f64) {
        if node.index().is_some_and(|i| i < self.nodes.len()) {
            self.nodesets.insert(node, voltage);
        }
    }

    /// Write the recorded nodesets into an initial guess vector.
    pub fn apply_nodesets(&self, x: &mut DVector<f64>) {
        for (&node, &v) in &self.nodesets {
            if let Some(i) = node.index() {
                if i < x.len() {
                    x[i] = v;
                }
            }
        }
    }

    /// Assign branch-variable slots and fix the unknown count.
    ///
    /// Branch-carrying devices receive contiguous slots starting at
    /// `num_nodes`, in registration order. Idempotent.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        let mut next = self.nodes.len();
        for &i in &self.branch {
            self.elements[i].set_branch_base(next);
            next += self.elements[i].branch_count();
        }
        self.num_branches = next - self.nodes.len();
        self.finalized = true;
    }

    /// Whether [`finalize`](Circuit::finalize) has run.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of non-ground nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of branch-current unknowns. Zero before finalisation.
    pub fn num_branches(&self) -> usize {
        self.num_branches
    }

    /// Total unknown count `N = num_nodes + num_branches`.
    pub fn num_unknowns(&self) -> usize {
        self.nodes.len() + self.num_branches
    }

    /// Human-readable meaning of unknown `i`: `V(<node>)` or `I(<element>)`.
    pub fn unknown_meaning(&self, index: usize) -> String {
        if index < self.nodes.len() {
            return match self.nodes[index].label() {
                Some(label) => format!("V({label})"),
                None => format!("V(node {index})"),
            };
        }
        let mut base = self.nodes.len();
        for &i in &self.branch {
            let count = self.elements[i].branch_count();
            if index < base + count {
                return format!("I({})", self.elements[i].label());
            }
            base += count;
        }
        format!("unknown({index})")
    }

    /// Iterate all elements (read-only).
    pub fn elements(&self) -> impl Iterator<Item = &dyn Element> {
        self.elements.iter().map(|e| e.as_ref())
    }

    /// Number of registered devices.
    pub fn num_devices(&self) -> usize {
        self.elements.len()
    }

    /// Collect every DC conduction pair reported by the registry.
    pub fn dc_connections(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs = Vec::new();
        for element in &self.elements {
            element.dc_topology(&mut pairs);
        }
        pairs
    }

    // Solver-facing passes. Ordering within a Newton iteration is part of
    // the contract: linear stamps, then Newton stamps against the limited
    // voltages cached by the preceding compute_limited pass.

    /// Run `linear_stamp` for every element.
    pub fn stamp_linear(&self, system: &mut MnaSystem, scale: f64) {
        let mut ctx = StampContext { system, scale };
        for element in &self.elements {
            element.linear_stamp(&mut ctx);
        }
    }

    /// Run `newton_stamp` for every Newton element.
    pub fn stamp_newton(&self, system: &mut MnaSystem, scale: f64, x_guess: &DVector<f64>) {
        let mut ctx = StampContext { system, scale };
        for &i in &self.newton {
            self.elements[i].newton_stamp(&mut ctx, x_guess);
        }
    }

    /// Refresh every Newton element's limited-voltage cache.
    pub fn compute_limited(&mut self, x: &DVector<f64>, x_old: &DVector<f64>) {
        let ctx = LimitContext { x, x_old };
        for &i in &self.newton {
            self.elements[i].compute_limited(&ctx);
        }
    }

    /// Push a new `dt` into every dynamic element's companion model.
    pub fn begin_step(&mut self, dt: f64) {
        for &i in &self.dynamic {
            self.elements[i].begin_step(dt);
        }
    }

    /// Commit a converged solution into every dynamic element's history.
    pub fn commit_step(&mut self, x: &DVector<f64>) {
        for &i in &self.dynamic {
            self.elements[i].commit_step(x);
        }
    }
}

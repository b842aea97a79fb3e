//! Core circuit representation and MNA matrix structures for Quiescent.
//!
//! This crate provides the assembler half of the simulator: nodes, the
//! dense MNA system, the element capability traits every device implements,
//! and the [`Circuit`] registry the solver iterates over.
//!
//! # Modified Nodal Analysis
//!
//! The unknown vector `x` holds node voltages followed by branch currents
//! (one or more per voltage-source-like element). Ground is the sentinel
//! [`NodeId::GROUND`] and never appears in `x`; ground rows and columns are
//! never written.
//!
//! # Example: assembling by hand
//!
//! ```rust
//! use quiescent_core::mna::MnaSystem;
//! use quiescent_core::NodeId;
//!
//! // Two parallel 1k resistors from node 0 to ground, fed by 10 mA.
//! let n0 = NodeId::from_index(0);
//! let mut mna = MnaSystem::new(1, 0);
//! mna.stamp_conductance(n0, NodeId::GROUND, 1e-3);
//! mna.stamp_conductance(n0, NodeId::GROUND, 1e-3);
//! mna.stamp_current(NodeId::GROUND, n0, 10e-3);
//!
//! assert_eq!(mna.matrix()[(0, 0)], 2e-3);
//! assert_eq!(mna.rhs()[0], 10e-3);
//! ```

pub mod audit;
pub mod circuit;
pub mod element;
pub mod mna;
pub mod node;
pub mod units;

pub use audit::{AuditReport, check_dc_paths};
pub use circuit::{Circuit, DeviceHandle};
pub use element::{Element, LimitContext, StampContext};
pub use mna::MnaSystem;
pub use node::{Node, NodeId, node_voltage};

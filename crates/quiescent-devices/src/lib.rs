//! Device library for the Quiescent analog simulator.
//!
//! Every device implements the element capability traits of
//! `quiescent-core`:
//!
//! - [`Resistor`], [`VoltageSource`], [`CurrentSource`] stamp linearly.
//! - [`Capacitor`] and [`Inductor`] carry trapezoidal companion models and
//!   participate in transient stepping.
//! - [`Diode`] and [`Bjt`] linearise per Newton iteration with SPICE-style
//!   PN junction voltage limiting between iterates.
//!
//! Constructors validate parameters and return `Result`; a rejected device
//! never reaches the circuit.

pub mod bjt;
pub mod diode;
pub mod error;
pub mod limit;
pub mod passive;
pub mod sources;

pub use bjt::{Bjt, BjtParams, BjtPolarity, BjtTerminals, add_bjt_with_parasitics};
pub use diode::{Diode, DiodeParams};
pub use error::{Error, Result};
pub use limit::{pnjlim, safe_exp, thermal_voltage};
pub use passive::{Capacitor, Inductor, Resistor};
pub use sources::{CurrentSource, VoltageSource};

//! Mock device implementations for testing and development.
//!
//! This module provides simulated devices that can be controlled
//! programmatically without requiring physical hardware.

pub mod elcom;

pub use elcom::{MockElcomDevice, MockElcomHandle};

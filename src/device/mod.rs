//! Printer connection.
//!
//! The transport session (authentication, wire decoding) sits behind the
//! [`DeviceClient`] trait. A [`SimulatedPrinter`] ships with the crate for
//! demonstration and testing.

mod client;
mod simulated;

pub use client::{DeviceClient, DeviceError, DeviceMessage};
pub use simulated::SimulatedPrinter;

//! compositor-busd - bridges compositor lifecycle signals onto D-Bus.
//!
//! Observes outputs and views through the compositor's IPC socket and
//! republishes a filtered, normalized subset of their lifecycle events as
//! D-Bus signals, while answering a small set of inbound state queries.

pub mod bridge;
pub mod bus;
pub mod config;
pub mod host;
pub mod state;
pub mod tracker;
pub mod translate;

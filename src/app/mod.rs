//! Application core: domain orchestration, no direct I/O.
//!
//! This module contains the business rules for the chamber controller:
//! batch lifecycle, threshold control, alert evaluation and the command
//! surface.  All interaction with hardware and persistence happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.  [`runtime`] runs the service on its own
//! thread as the single writer of all mutable state.

pub mod commands;
pub mod events;
pub mod ports;
pub mod runtime;
pub mod service;

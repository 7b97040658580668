//! Fermenter controller library.
//!
//! Exposes the domain core and adapters for the binary and for integration
//! testing.  Everything below [`app`] is pure logic; hardware and the
//! filesystem are only touched through [`adapters`].

#![deny(unused_must_use)]

pub mod app;
pub mod batch;
pub mod config;
pub mod control;
pub mod error;
pub mod recipes;
pub mod safety;
pub mod timestamp;
pub mod trace;

pub mod adapters;
pub mod drivers;
pub mod pins;
pub mod sensors;

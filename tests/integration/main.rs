//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  No real hardware is required.

mod app_service_tests;
mod mock_hw;
mod runtime_tests;

//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the mock transport in [`mock_link`].  Everything runs on the
//! host with no gateway attached.

mod client_scenario_tests;
mod connection_tests;

//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters or a live server bound to a loopback port.

mod mock_ports;
mod rpc_tests;
mod service_tests;

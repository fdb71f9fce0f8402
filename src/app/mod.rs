//! Application core: pure decision logic, zero I/O.
//!
//! This module contains the business rules for the guardian controller:
//! report ingestion, operator overrides, the periodic checks and the
//! outbound command mailbox.  All interaction with storage, clocks and
//! diagnostics happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without sockets or files.

pub mod commands;
pub mod events;
pub mod gateway;
pub mod mailbox;
pub mod ports;
pub mod service;

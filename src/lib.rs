//! Guardian library.
//!
//! Presence-reactive relay controller: a motion-sensing device reports in,
//! the server derives a presence label, runs the delayed-off countdown and
//! queues relay instructions the device picks up by polling.  Exposes the
//! pure-logic modules and the adapters for integration testing.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod history;
pub mod rpc;
pub mod scheduler;
pub mod server;

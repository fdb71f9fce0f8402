//! RPC subsystem.
//!
//! JSON requests and responses in length-prefixed frames over TCP.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      RPC Stack                             │
//! │                                                            │
//! │  ┌──────────────┐   ┌──────────┐   ┌──────────────────────┐│
//! │  │ TcpTransport │──▶│  Codec   │──▶│ Engine (dispatcher)  ││
//! │  │ (io_task)    │   │ (framing)│   │  → Gateway           ││
//! │  └──────────────┘   └──────────┘   └──────────────────────┘│
//! │         ▲                                    │             │
//! │         └──────────── Response ◀─────────────┘             │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod engine;
pub mod io_task;
pub mod messages;

//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements                     | Connects to               |
//! |------------------|--------------------------------|---------------------------|
//! | `config_file`    | ConfigPort                     | JSON file on disk         |
//! | `log_sink`       | EventSink                      | `log` / `env_logger`      |
//! | `store`          | StoragePort                    | In-memory tables + journal|
//! | `storage_worker` | StoragePort, StatusQueryPort   | Storage thread            |
//! | `tcp_transport`  | -                              | TCP clients (RPC)         |
//! | `time`           | ClockPort                      | System wall clock         |

pub mod config_file;
pub mod log_sink;
pub mod storage_worker;
pub mod store;
pub mod tcp_transport;
pub mod time;

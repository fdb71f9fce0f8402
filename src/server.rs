//! Server wiring: opens the store, starts the storage worker, builds the
//! gateway and spawns the RPC I/O thread.
//!
//! ```text
//!  main ──▶ Server::start(config)
//!             ├─ MemoryStore::from_config ──▶ spawn_worker ──▶ StorageLink
//!             ├─ Gateway(GuardianService, StorageLink, LogEventSink, SystemClock)
//!             ├─ TcpTransport::bind
//!             └─ io_task::spawn(RpcEngine(StorageLink), Scheduler)
//! ```

use core::time::Duration;
use std::net::SocketAddr;
use std::thread::JoinHandle;

use log::info;

use crate::adapters::log_sink::LogEventSink;
use crate::adapters::storage_worker::{StorageLink, spawn_worker};
use crate::adapters::store::MemoryStore;
use crate::adapters::tcp_transport::TcpTransport;
use crate::adapters::time::SystemClock;
use crate::app::gateway::Gateway;
use crate::app::service::GuardianService;
use crate::config::GuardianConfig;
use crate::error::{Error, Result};
use crate::rpc::engine::{RpcEngine, RpcLimits};
use crate::rpc::io_task::{self, IoContext, IoHandle};
use crate::scheduler::Scheduler;

/// A running guardian server.
pub struct Server {
    addr: SocketAddr,
    io: IoHandle,
    storage: StorageLink,
    storage_thread: JoinHandle<MemoryStore>,
}

impl Server {
    /// Validate `config` and bring every subsystem up.
    ///
    /// Fails before anything is written when the config is invalid, the
    /// journal cannot be opened or the listen address is taken.
    pub fn start(config: &GuardianConfig) -> Result<Self> {
        config.validate()?;
        let transport = TcpTransport::bind(&config.bind_address, config.listen_port)?;
        Self::with_transport(config, transport)
    }

    /// Like [`start`](Self::start) but serves on an already-bound
    /// transport; `bind_address` and `listen_port` are ignored.
    pub fn with_transport(config: &GuardianConfig, transport: TcpTransport) -> Result<Self> {
        config.validate()?;
        let addr = transport.local_addr()?;

        let store = MemoryStore::from_config(config)?;
        let (storage, storage_thread) = spawn_worker(store)?;

        let mut gateway = Gateway::new(
            GuardianService::new(config),
            storage.clone(),
            LogEventSink::new(),
            SystemClock::new(),
        );
        gateway.start();

        let ctx = IoContext {
            gateway,
            engine: RpcEngine::new(storage.clone(), RpcLimits::from_config(config)),
            scheduler: Scheduler::from_config(config),
            tick: Duration::from_millis(u64::from(config.scheduler_tick_ms)),
            max_frame: config.max_request_frame,
        };
        let io = io_task::spawn(transport, ctx)?;

        info!(
            "guardian listening on {} (device {}, countdown {}ms, liveness {}ms)",
            addr, config.device_id, config.countdown_duration_ms, config.liveness_timeout_ms
        );

        Ok(Self {
            addr,
            io,
            storage,
            storage_thread,
        })
    }

    /// Bound listen address (useful with port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until the I/O thread exits.
    pub fn wait(self) -> Result<MemoryStore> {
        let Self {
            io,
            storage,
            storage_thread,
            ..
        } = self;
        io.join().map_err(|_| Error::Thread("rpc-io"))?;
        stop_storage(&storage, storage_thread)
    }

    /// Stop the I/O loop, drain the storage queue and return the store.
    pub fn shutdown(self) -> Result<MemoryStore> {
        let Self {
            io,
            storage,
            storage_thread,
            ..
        } = self;
        io.shutdown().map_err(|_| Error::Thread("rpc-io"))?;
        stop_storage(&storage, storage_thread)
    }
}

fn stop_storage(storage: &StorageLink, thread: JoinHandle<MemoryStore>) -> Result<MemoryStore> {
    futures_lite::future::block_on(storage.shutdown());
    let store = thread.join().map_err(|_| Error::Thread("storage"))?;
    info!("storage stopped ({} history samples retained)", store.history_len());
    Ok(store)
}

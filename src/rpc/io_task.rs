//! Async RPC I/O runtime.
//!
//! One thread runs an `edge-executor` [`LocalExecutor`] with
//! `async-io-mini` reactor timers.  Everything that touches the gateway
//! lives on this thread, so the gateway sits in an `Rc<RefCell<_>>`.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │  rpc-io thread                                               │
//!  │   ┌────────┐  ┌────────┐  frames  ┌──────────────┐           │
//!  │   │ Accept │  │  Read  │─────────▶│ Dispatch × N │──┐        │
//!  │   │  50ms  │  │  1ms   │          │ (RpcEngine)  │  │ queue  │
//!  │   └────────┘  └────────┘          └──────────────┘  │ write  │
//!  │                   ▲ flush                            ▼        │
//!  │                   └──────────── TcpTransport ◀───────┘        │
//!  │   ┌────────────┐                                              │
//!  │   │ Timer tick │──▶ Scheduler ──▶ Gateway (countdown,        │
//!  │   │ tick_ms    │                  liveness, history)         │
//!  │   └────────────┘                                              │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Several dispatch tasks run side by side so a full-status read waiting
//! on storage does not hold up reports, polls or commands.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use edge_executor::LocalExecutor;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{debug, error, info, warn};

use super::codec::{FrameDecoder, encode_frame};
use super::engine::{RpcEngine, encode_response};
use super::messages::Response;
use crate::adapters::tcp_transport::{ClientId, MAX_CLIENTS, TcpTransport, TransportError};
use crate::app::gateway::Gateway;
use crate::app::ports::{ClockPort, EventSink, StatusQueryPort, StoragePort};
use crate::scheduler::Scheduler;

const READ_BUF_SIZE: usize = 1024;
const ACCEPT_INTERVAL: Duration = Duration::from_millis(50);
const READ_INTERVAL: Duration = Duration::from_millis(1);

/// Concurrent request handlers.
pub const DISPATCHERS: usize = 4;

/// Frames waiting for a dispatcher.
const INBOUND_DEPTH: usize = 16;

/// Cross-thread stop flag for the I/O loop.
pub type StopSignal = Signal<CriticalSectionRawMutex, ()>;

struct Inbound {
    client_id: ClientId,
    frame: Vec<u8>,
}

type InboundChannel = Channel<NoopRawMutex, Inbound, INBOUND_DEPTH>;
type SharedTransport = Rc<RefCell<TcpTransport>>;
type SharedDecoders = Rc<RefCell<[FrameDecoder; MAX_CLIENTS]>>;

/// Everything the I/O loop needs besides the transport.
pub struct IoContext<S, E, C, Q> {
    pub gateway: Gateway<S, E, C>,
    pub engine: RpcEngine<Q>,
    pub scheduler: Scheduler,
    pub tick: Duration,
    pub max_frame: usize,
}

/// Handle to a spawned I/O thread.
pub struct IoHandle {
    stop: Arc<StopSignal>,
    thread: JoinHandle<()>,
}

impl IoHandle {
    /// Ask the loop to stop and wait for the thread.
    pub fn shutdown(self) -> thread::Result<()> {
        self.stop.signal(());
        self.thread.join()
    }

    /// Wait for the thread without stopping it.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    pub fn stop_signal(&self) -> Arc<StopSignal> {
        Arc::clone(&self.stop)
    }
}

// ── Tasks ────────────────────────────────────────────────────

/// New connections are rare; 50ms polling is plenty.
async fn accept_loop(transport: SharedTransport, decoders: SharedDecoders) {
    loop {
        {
            let mut t = transport.borrow_mut();
            while let Some(cid) = t.try_accept() {
                decoders.borrow_mut()[usize::from(cid)].reset();
            }
        }
        async_io_mini::Timer::after(ACCEPT_INTERVAL).await;
    }
}

/// Poll every connected client, split its bytes into frames and hand
/// them to the dispatchers.  Also retries queued writes that a full
/// socket buffer held back.
///
/// While the dispatch queue is full, buffered frames stay in their
/// decoder and the socket is not read, so a busy server pushes back on
/// clients through TCP flow control instead of dropping requests.
async fn read_loop(
    transport: SharedTransport,
    decoders: SharedDecoders,
    inbound: Rc<InboundChannel>,
) {
    let mut read_buf = [0u8; READ_BUF_SIZE];
    loop {
        {
            let mut t = transport.borrow_mut();
            let mut decoders = decoders.borrow_mut();
            for idx in 0..MAX_CLIENTS {
                let Ok(cid) = ClientId::try_from(idx) else {
                    break;
                };
                if !t.is_connected(cid) {
                    continue;
                }
                if t.has_pending(cid) {
                    if let Err(e) = t.flush_client(cid) {
                        warn!("IO: write to client {} failed: {}", cid, e);
                        decoders[idx].reset();
                        continue;
                    }
                }
                match drain_frames(&mut decoders[idx], cid, &inbound) {
                    Drain::Idle => {}
                    Drain::Backlogged => continue,
                    Drain::Broken => {
                        t.disconnect(cid);
                        continue;
                    }
                }
                match t.read_client(cid, &mut read_buf) {
                    Ok(0) => {}
                    Ok(n) => {
                        let decoder = &mut decoders[idx];
                        decoder.feed(&read_buf[..n]);
                        if drain_frames(decoder, cid, &inbound) == Drain::Broken {
                            t.disconnect(cid);
                        }
                    }
                    Err(TransportError::NotConnected) => decoders[idx].reset(),
                    Err(TransportError::Io | TransportError::Overflow) => {
                        warn!("IO: client {} read error, dropped", cid);
                        decoders[idx].reset();
                    }
                }
            }
        }
        async_io_mini::Timer::after(READ_INTERVAL).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    /// Every complete frame was queued.
    Idle,
    /// The dispatch queue filled up; the rest waits in the decoder.
    Backlogged,
    /// The stream cannot be resynchronised.
    Broken,
}

fn drain_frames(decoder: &mut FrameDecoder, client_id: ClientId, inbound: &InboundChannel) -> Drain {
    loop {
        if inbound.is_full() {
            return Drain::Backlogged;
        }
        match decoder.next_frame() {
            Ok(Some(frame)) => {
                // Single-threaded: the queue cannot fill between the check and the send.
                if inbound.try_send(Inbound { client_id, frame }).is_err() {
                    error!("IO[{}]: dispatch queue full after check, frame lost", client_id);
                }
            }
            Ok(None) => return Drain::Idle,
            Err(e) => {
                warn!("IO[{}]: {}, closing connection", client_id, e);
                return Drain::Broken;
            }
        }
    }
}

async fn dispatch_loop<S, E, C, Q>(
    id: usize,
    transport: SharedTransport,
    gateway: Rc<RefCell<Gateway<S, E, C>>>,
    engine: Rc<RpcEngine<Q>>,
    inbound: Rc<InboundChannel>,
) where
    S: StoragePort,
    E: EventSink,
    C: ClockPort,
    Q: StatusQueryPort,
{
    loop {
        let msg = inbound.receive().await;
        let response = engine.dispatch_frame(&gateway, &msg.frame).await;
        debug!("IO: dispatcher {} answered client {}", id, msg.client_id);
        send_response(&transport, msg.client_id, &response);
    }
}

fn send_response(transport: &SharedTransport, cid: ClientId, response: &Response) {
    let mut out = Vec::new();
    if encode_frame(&encode_response(response), &mut out).is_none() {
        return;
    }
    let mut t = transport.borrow_mut();
    match t.queue_write(cid, &out) {
        Ok(()) => {
            if let Err(e) = t.flush_client(cid) {
                warn!("IO: write to client {} failed: {}", cid, e);
            }
        }
        Err(TransportError::Overflow) => {
            warn!("IO: client {} is not reading its responses, dropped", cid);
        }
        // Client left before its answer was ready.
        Err(_) => debug!("IO: client {} gone, response dropped", cid),
    }
}

/// Feed wall-time elapsed since the previous tick into the scheduler.
async fn timer_loop<S, E, C>(
    mut scheduler: Scheduler,
    gateway: Rc<RefCell<Gateway<S, E, C>>>,
    tick: Duration,
) where
    S: StoragePort,
    E: EventSink,
    C: ClockPort,
{
    let mut last = Instant::now();
    loop {
        async_io_mini::Timer::after(tick).await;
        let now = Instant::now();
        let elapsed = u64::try_from(now.duration_since(last).as_millis()).unwrap_or(u64::MAX);
        if elapsed == 0 {
            continue;
        }
        last = now;
        scheduler.tick(elapsed, &mut *gateway.borrow_mut());
    }
}

// ── Entry points ─────────────────────────────────────────────

/// Run the I/O loop on the current thread until `stop` is signalled.
pub fn run<S, E, C, Q>(transport: TcpTransport, ctx: IoContext<S, E, C, Q>, stop: &StopSignal)
where
    S: StoragePort,
    E: EventSink,
    C: ClockPort,
    Q: StatusQueryPort,
{
    let IoContext {
        gateway,
        engine,
        scheduler,
        tick,
        max_frame,
    } = ctx;

    let executor: LocalExecutor<'_, 8> = LocalExecutor::new();
    let transport: SharedTransport = Rc::new(RefCell::new(transport));
    let decoders: SharedDecoders = Rc::new(RefCell::new(core::array::from_fn(|_| {
        FrameDecoder::new(max_frame)
    })));
    let inbound: Rc<InboundChannel> = Rc::new(Channel::new());
    let gateway = Rc::new(RefCell::new(gateway));
    let engine = Rc::new(engine);

    executor
        .spawn(accept_loop(transport.clone(), decoders.clone()))
        .detach();
    executor
        .spawn(read_loop(transport.clone(), decoders.clone(), inbound.clone()))
        .detach();
    for id in 0..DISPATCHERS {
        executor
            .spawn(dispatch_loop(
                id,
                transport.clone(),
                gateway.clone(),
                engine.clone(),
                inbound.clone(),
            ))
            .detach();
    }
    executor
        .spawn(timer_loop(scheduler, gateway.clone(), tick))
        .detach();

    info!(
        "IO loop started ({} max clients, {} dispatchers, tick {:?})",
        MAX_CLIENTS, DISPATCHERS, tick
    );

    futures_lite::future::block_on(executor.run(stop.wait()));
    info!("IO loop stopped");
}

/// Spawn the I/O loop on its own thread.
pub fn spawn<S, E, C, Q>(
    transport: TcpTransport,
    ctx: IoContext<S, E, C, Q>,
) -> std::io::Result<IoHandle>
where
    S: StoragePort + Send + 'static,
    E: EventSink + Send + 'static,
    C: ClockPort + Send + 'static,
    Q: StatusQueryPort + Send + 'static,
{
    let stop = Arc::new(StopSignal::new());
    let thread_stop = Arc::clone(&stop);
    let thread = thread::Builder::new()
        .name("rpc-io".into())
        .spawn(move || run(transport, ctx, &thread_stop))?;
    Ok(IoHandle { stop, thread })
}

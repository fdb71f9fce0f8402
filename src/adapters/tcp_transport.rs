//! Multi-client TCP transport.
//!
//! A non-blocking TCP server with a fixed table of client slots:
//!
//! 1. [`TcpTransport::bind`] binds the listener in non-blocking mode.
//! 2. [`try_accept`](TcpTransport::try_accept) polls for one pending
//!    connection and places it in the first free slot.  When every slot
//!    is taken the connection is closed immediately.
//! 3. [`read_client`](TcpTransport::read_client) never blocks: `Ok(0)`
//!    means no data yet, [`TransportError::NotConnected`] means the peer
//!    went away and the slot is free again.
//! 4. Writes are queued per client and drained by
//!    [`flush_client`](TcpTransport::flush_client), which copes with
//!    partial writes on a full socket buffer.  A client whose queue
//!    passes [`OUTBOX_LIMIT`] is dropped.

use core::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use log::{debug, info, warn};

/// Index of a client slot.
pub type ClientId = u8;

/// Simultaneous client connections.
pub const MAX_CLIENTS: usize = 8;

/// Queued response bytes a client may leave unread.  A single response
/// into an empty queue is always accepted, whatever its size.
pub const OUTBOX_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Socket I/O failure; the client has been dropped.
    Io,
    /// No client in that slot.
    NotConnected,
    /// Client left too much unread; it has been dropped.
    Overflow,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "TCP/socket I/O error"),
            Self::NotConnected => write!(f, "no client connected"),
            Self::Overflow => write!(f, "client outbox over {} bytes", OUTBOX_LIMIT),
        }
    }
}

impl std::error::Error for TransportError {}

struct ClientSlot {
    stream: TcpStream,
    peer: SocketAddr,
    outbox: Vec<u8>,
}

pub struct TcpTransport {
    listener: TcpListener,
    clients: [Option<ClientSlot>; MAX_CLIENTS],
}

impl TcpTransport {
    /// Bind `addr:port`.  Port `0` lets the OS pick one; see
    /// [`local_addr`](Self::local_addr).
    pub fn bind(addr: &str, port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind((addr, port))?;
        listener.set_nonblocking(true)?;
        info!("TCP: listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            clients: Default::default(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one pending connection, if any.
    pub fn try_accept(&mut self) -> Option<ClientId> {
        let (stream, peer) = match self.listener.accept() {
            Ok(pair) => pair,
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => return None,
            Err(e) => {
                warn!("TCP: accept error: {}", e);
                return None;
            }
        };

        let Some(idx) = self.clients.iter().position(Option::is_none) else {
            warn!("TCP: all {} slots busy, refusing {}", MAX_CLIENTS, peer);
            return None;
        };
        if let Err(e) = stream.set_nonblocking(true) {
            warn!("TCP: failed to set non-blocking on {}: {}", peer, e);
            return None;
        }
        // Responses are small; don't let Nagle hold them back.
        let _ = stream.set_nodelay(true);

        info!("TCP: client {} connected from {}", idx, peer);
        self.clients[idx] = Some(ClientSlot {
            stream,
            peer,
            outbox: Vec::new(),
        });
        u8::try_from(idx).ok()
    }

    pub fn is_connected(&self, cid: ClientId) -> bool {
        self.slot(cid).is_some()
    }

    /// Clients currently connected.
    pub fn connected(&self) -> usize {
        self.clients.iter().filter(|c| c.is_some()).count()
    }

    pub fn peer(&self, cid: ClientId) -> Option<SocketAddr> {
        self.slot(cid).map(|c| c.peer)
    }

    /// Non-blocking read.
    pub fn read_client(&mut self, cid: ClientId, buf: &mut [u8]) -> Result<usize, TransportError> {
        let client = self.slot_mut(cid).ok_or(TransportError::NotConnected)?;
        match client.stream.read(buf) {
            Ok(0) => {
                info!("TCP: client {} disconnected (EOF)", cid);
                self.drop_slot(cid);
                Err(TransportError::NotConnected)
            }
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(ref e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                debug!("TCP: client {} read error: {}", cid, e);
                self.drop_slot(cid);
                Err(TransportError::Io)
            }
        }
    }

    /// Queue bytes for `cid`.  Nothing is sent until a flush.
    pub fn queue_write(&mut self, cid: ClientId, data: &[u8]) -> Result<(), TransportError> {
        let client = self.slot_mut(cid).ok_or(TransportError::NotConnected)?;
        if !client.outbox.is_empty() && client.outbox.len() + data.len() > OUTBOX_LIMIT {
            let queued = client.outbox.len();
            warn!("TCP: client {} has {} bytes unread, disconnecting", cid, queued);
            self.drop_slot(cid);
            return Err(TransportError::Overflow);
        }
        client.outbox.extend_from_slice(data);
        Ok(())
    }

    /// Whether `cid` has queued bytes not yet written.
    pub fn has_pending(&self, cid: ClientId) -> bool {
        self.slot(cid).is_some_and(|c| !c.outbox.is_empty())
    }

    /// Write as much of the queue as the socket takes.  Returns the bytes
    /// still queued.
    pub fn flush_client(&mut self, cid: ClientId) -> Result<usize, TransportError> {
        let client = self.slot_mut(cid).ok_or(TransportError::NotConnected)?;
        while !client.outbox.is_empty() {
            match client.stream.write(&client.outbox) {
                Ok(0) => {
                    self.drop_slot(cid);
                    return Err(TransportError::Io);
                }
                Ok(n) => {
                    client.outbox.drain(..n);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!("TCP: client {} write error: {}", cid, e);
                    self.drop_slot(cid);
                    return Err(TransportError::Io);
                }
            }
        }
        Ok(client.outbox.len())
    }

    pub fn disconnect(&mut self, cid: ClientId) {
        if self.drop_slot(cid) {
            info!("TCP: client {} disconnected", cid);
        }
    }

    fn slot(&self, cid: ClientId) -> Option<&ClientSlot> {
        self.clients.get(usize::from(cid)).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, cid: ClientId) -> Option<&mut ClientSlot> {
        self.clients.get_mut(usize::from(cid)).and_then(Option::as_mut)
    }

    fn drop_slot(&mut self, cid: ClientId) -> bool {
        self.clients
            .get_mut(usize::from(cid))
            .and_then(Option::take)
            .is_some()
    }
}

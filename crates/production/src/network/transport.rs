//! Point-to-point delivery of encoded frames.
//!
//! A frame on a TCP stream is `[len: u32 BE][bytes]`. Each connection opens
//! with the dialer's validator id as a `u64 BE`, which the listener attaches
//! to every frame it reads from that connection.

use quorum_types::ValidatorId;
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Largest frame read from a peer.
pub const MAX_FRAME_SIZE: usize = super::wire::MAX_DECOMPRESSED_SIZE + 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Unknown peer {0}")]
    UnknownPeer(ValidatorId),

    #[error("Outbound queue to {0} is full")]
    QueueFull(ValidatorId),

    #[error("Connection to {0} is closed")]
    Closed(ValidatorId),
}

/// A frame received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub from: ValidatorId,
    pub bytes: Vec<u8>,
}

/// Sends encoded frames to peers.
///
/// Sends never block the caller. A frame that cannot be queued is dropped
/// with an error; the sync protocols recover from loss through retries.
pub trait Transport: Send {
    fn send(&self, to: ValidatorId, frame: Vec<u8>) -> Result<(), TransportError>;
}

fn queue_error<T>(to: ValidatorId, error: mpsc::error::TrySendError<T>) -> TransportError {
    match error {
        mpsc::error::TrySendError::Full(_) => TransportError::QueueFull(to),
        mpsc::error::TrySendError::Closed(_) => TransportError::Closed(to),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// In-process transport
// ═══════════════════════════════════════════════════════════════════════════

/// Transport connecting runners in one process over channels.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    local: ValidatorId,
    peers: HashMap<ValidatorId, mpsc::Sender<InboundFrame>>,
}

impl ChannelTransport {
    /// Fully connected transports for `validators`, each paired with the
    /// receiver of the frames addressed to it.
    pub fn mesh(
        validators: &[ValidatorId],
        capacity: usize,
    ) -> Vec<(ChannelTransport, mpsc::Receiver<InboundFrame>)> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            validators.iter().map(|_| mpsc::channel(capacity)).unzip();
        let peers: HashMap<ValidatorId, mpsc::Sender<InboundFrame>> =
            validators.iter().copied().zip(senders).collect();

        validators
            .iter()
            .zip(receivers)
            .map(|(local, rx)| {
                let transport = ChannelTransport {
                    local: *local,
                    peers: peers.clone(),
                };
                (transport, rx)
            })
            .collect()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, to: ValidatorId, frame: Vec<u8>) -> Result<(), TransportError> {
        let peer = self.peers.get(&to).ok_or(TransportError::UnknownPeer(to))?;
        peer.try_send(InboundFrame {
            from: self.local,
            bytes: frame,
        })
        .map_err(|e| queue_error(to, e))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TCP transport
// ═══════════════════════════════════════════════════════════════════════════

/// Transport with one outbound TCP connection per peer.
///
/// Each peer has a writer task that dials lazily and redials after an I/O
/// error. Frames queued while a peer is unreachable are dropped.
#[derive(Debug)]
pub struct TcpTransport {
    peers: HashMap<ValidatorId, mpsc::Sender<Vec<u8>>>,
    writers: Vec<JoinHandle<()>>,
}

impl TcpTransport {
    /// Spawn a writer task per peer. Must be called inside a tokio runtime.
    pub fn connect(
        local: ValidatorId,
        peers: impl IntoIterator<Item = (ValidatorId, SocketAddr)>,
        capacity: usize,
    ) -> Self {
        let mut senders = HashMap::new();
        let mut writers = Vec::new();
        for (peer, addr) in peers {
            let (tx, rx) = mpsc::channel(capacity);
            senders.insert(peer, tx);
            writers.push(tokio::spawn(run_writer(local, peer, addr, rx)));
        }
        Self {
            peers: senders,
            writers,
        }
    }
}

impl Transport for TcpTransport {
    fn send(&self, to: ValidatorId, frame: Vec<u8>) -> Result<(), TransportError> {
        let peer = self.peers.get(&to).ok_or(TransportError::UnknownPeer(to))?;
        peer.try_send(frame).map_err(|e| queue_error(to, e))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        for writer in &self.writers {
            writer.abort();
        }
    }
}

async fn dial(local: ValidatorId, addr: SocketAddr) -> std::io::Result<TcpStream> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    stream.write_all(&local.0.to_be_bytes()).await?;
    Ok(stream)
}

async fn run_writer(
    local: ValidatorId,
    peer: ValidatorId,
    addr: SocketAddr,
    mut rx: mpsc::Receiver<Vec<u8>>,
) {
    let mut connection: Option<TcpStream> = None;
    while let Some(frame) = rx.recv().await {
        if connection.is_none() {
            match dial(local, addr).await {
                Ok(stream) => {
                    debug!(peer = %peer, %addr, "Connected to peer");
                    connection = Some(stream);
                }
                Err(e) => {
                    warn!(peer = %peer, %addr, error = %e, "Dial failed, dropping frame");
                    continue;
                }
            }
        }
        let Some(stream) = connection.as_mut() else {
            continue;
        };

        let len = frame.len() as u32;
        let result = async {
            stream.write_all(&len.to_be_bytes()).await?;
            stream.write_all(&frame).await
        }
        .await;
        if let Err(e) = result {
            warn!(peer = %peer, error = %e, "Write failed, reconnecting on next frame");
            connection = None;
        }
    }
    trace!(peer = %peer, "Writer stopped");
}

/// Accept peer connections on `addr`, forwarding their frames to `inbound`.
///
/// Returns the bound address and the accept loop's task.
pub async fn listen(
    addr: SocketAddr,
    inbound: mpsc::Sender<InboundFrame>,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    tokio::spawn(read_connection(stream, remote, inbound.clone()));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            }
        }
    });
    Ok((bound, handle))
}

async fn read_connection(
    mut stream: TcpStream,
    remote: SocketAddr,
    inbound: mpsc::Sender<InboundFrame>,
) {
    let mut id = [0u8; 8];
    if let Err(e) = stream.read_exact(&mut id).await {
        debug!(%remote, error = %e, "Connection closed before handshake");
        return;
    }
    let from = ValidatorId(u64::from_be_bytes(id));
    debug!(%remote, peer = %from, "Peer connected");

    loop {
        let mut len = [0u8; 4];
        if stream.read_exact(&mut len).await.is_err() {
            break;
        }
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_FRAME_SIZE {
            warn!(peer = %from, len, "Frame too large, closing connection");
            break;
        }
        let mut bytes = vec![0u8; len];
        if stream.read_exact(&mut bytes).await.is_err() {
            break;
        }
        if inbound.send(InboundFrame { from, bytes }).await.is_err() {
            break;
        }
    }
    debug!(peer = %from, "Peer disconnected");
}

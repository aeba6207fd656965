//! Router-style endpoint: many dialers, one receiver, addressed sends.
//!
//! A `RouterEndpoint` owns a TCP listener plus per-connection reader and
//! writer tasks. Inbound messages from every peer funnel into one ingress
//! channel tagged with the peer's [`SocketIdentity`]; outbound messages are
//! addressed by identity and queued on that peer's writer. The dispatch
//! loop is the only consumer — the tasks here never touch broker state.

use crate::transport::frames::{MultipartCodec, TransportError};
use crate::transport::identity::SocketIdentity;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

/// Ingress channel depth. Readers park when the dispatch loop falls this
/// far behind, which bounds memory under burst.
const INGRESS_CAPACITY: usize = 1024;

type PeerWriters = Arc<Mutex<HashMap<SocketIdentity, mpsc::UnboundedSender<Vec<Bytes>>>>>;

/// One of the broker's two endpoints.
pub struct RouterEndpoint {
    local_addr: SocketAddr,
    ingress: mpsc::Receiver<(SocketIdentity, Vec<Bytes>)>,
    peers: PeerWriters,
    accept_task: tokio::task::JoinHandle<()>,
}

impl RouterEndpoint {
    /// Binds to `host:preferred_port`, falling back to an ephemeral port if
    /// the preferred one is taken. Other bind failures propagate.
    pub async fn bind(host: &str, preferred_port: u16) -> Result<Self, TransportError> {
        let listener = match TcpListener::bind((host, preferred_port)).await {
            Ok(listener) => listener,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && preferred_port != 0 => {
                debug!(host, preferred_port, "preferred port taken, falling back");
                TcpListener::bind((host, 0)).await?
            }
            Err(e) => return Err(e.into()),
        };
        let local_addr = listener.local_addr()?;

        let (ingress_tx, ingress_rx) = mpsc::channel(INGRESS_CAPACITY);
        let peers: PeerWriters = Arc::new(Mutex::new(HashMap::new()));
        let accept_task = tokio::spawn(accept_loop(listener, ingress_tx, Arc::clone(&peers)));

        Ok(Self {
            local_addr,
            ingress: ingress_rx,
            peers,
            accept_task,
        })
    }

    /// The address this endpoint actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receives the next inbound message from any peer.
    ///
    /// Cancellation-safe; intended to sit inside the dispatch loop's
    /// `select!`. Returns `None` only after the endpoint is shut down.
    pub async fn recv(&mut self) -> Option<(SocketIdentity, Vec<Bytes>)> {
        self.ingress.recv().await
    }

    /// Takes one already-queued inbound message, if any, without waiting.
    pub fn try_recv(&mut self) -> Option<(SocketIdentity, Vec<Bytes>)> {
        self.ingress.try_recv().ok()
    }

    /// Queues `frames` for the peer behind `identity`.
    ///
    /// Non-blocking. Returns false when the peer is gone; the caller loses
    /// nothing durable — clients retry and workers heartbeat.
    pub fn send(&self, identity: &SocketIdentity, frames: Vec<Bytes>) -> bool {
        let writers = self.peers.lock().expect("peer map lock");
        match writers.get(identity) {
            Some(writer) => writer.send(frames).is_ok(),
            None => {
                debug!(peer = %identity, "send to unknown peer dropped");
                false
            }
        }
    }

    /// Identities of every currently connected peer.
    pub fn connected_peers(&self) -> Vec<SocketIdentity> {
        self.peers
            .lock()
            .expect("peer map lock")
            .keys()
            .cloned()
            .collect()
    }
}

impl Drop for RouterEndpoint {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    ingress: mpsc::Sender<(SocketIdentity, Vec<Bytes>)>,
    peers: PeerWriters,
) {
    static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let identity = SocketIdentity::from_sequence(NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed));
        debug!(peer = %identity, %remote, "peer connected");
        spawn_peer(stream, identity, ingress.clone(), Arc::clone(&peers));
    }
}

fn spawn_peer(
    stream: TcpStream,
    identity: SocketIdentity,
    ingress: mpsc::Sender<(SocketIdentity, Vec<Bytes>)>,
    peers: PeerWriters,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, MultipartCodec::new());
    let mut writer = FramedWrite::new(write_half, MultipartCodec::new());

    let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Vec<Bytes>>();
    peers
        .lock()
        .expect("peer map lock")
        .insert(identity.clone(), writer_tx);

    let writer_identity = identity.clone();
    tokio::spawn(async move {
        while let Some(frames) = writer_rx.recv().await {
            if let Err(e) = writer.send(frames).await {
                debug!(peer = %writer_identity, error = %e, "peer write failed");
                break;
            }
        }
    });

    tokio::spawn(async move {
        loop {
            match reader.next().await {
                Some(Ok(frames)) => {
                    if ingress.send((identity.clone(), frames)).await.is_err() {
                        break; // endpoint dropped
                    }
                }
                Some(Err(e)) => {
                    debug!(peer = %identity, error = %e, "peer read failed");
                    break;
                }
                None => break, // clean EOF
            }
        }
        peers.lock().expect("peer map lock").remove(&identity);
        debug!(peer = %identity, "peer disconnected");
    });
}

//! The UDP socket owner: neighbor discovery broadcaster and the single
//! receive loop that demultiplexes incoming datagrams.
//!
//! Only the WHOIS/IAMHERE discovery handshake is handled here; every
//! other message id is handed to a `PeerHandler` (the device model)
//! since answering it needs device state this crate doesn't have.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::discovery::NeighborTable;
use crate::message::{BusMessage, MessageId};

pub const BUS_PORT: u16 = 20202;
/// Neighbor discovery retry interval and receive-loop poll timeout.
pub const POLL_INTERVAL: Duration = Duration::from_millis(333);

/// Implemented by the device model to answer data-exchange requests
/// (GETV/GETLOAD) from a known neighbor. Discovery (WHOIS/IAMHERE) never
/// reaches this trait; it's handled entirely inside `BusRuntime`.
#[async_trait::async_trait]
pub trait PeerHandler: Send + Sync {
    async fn handle_message(&self, msg: BusMessage, from: SocketAddr) -> Option<BusMessage>;
}

pub struct BusRuntime {
    socket: UdpSocket,
    guid: u32,
    broadcast_addr: SocketAddr,
    neighbors: NeighborTable,
}

impl BusRuntime {
    pub async fn bind(
        guid: u32,
        bind_addr: SocketAddr,
        broadcast_addr: SocketAddr,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.set_broadcast(true)?;
        Ok(BusRuntime {
            socket,
            guid,
            broadcast_addr,
            neighbors: NeighborTable::new(),
        })
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    async fn send(&self, msg: &BusMessage, addr: SocketAddr) {
        if let Err(e) = self.socket.send_to(&msg.encode(), addr).await {
            warn!("bus send to {addr} failed: {e}");
        }
    }

    /// Sends a fire-and-forget request/reply to a neighbor by guid.
    /// Returns `false` without sending if the neighbor's address hasn't
    /// been resolved yet (the caller retries on its own schedule).
    pub async fn send_to_neighbor(&self, msg: &BusMessage, guid: u32) -> bool {
        match self.neighbors.address_of(guid) {
            Some(addr) => {
                self.send(msg, addr).await;
                true
            },
            None => false,
        }
    }

    /// Periodically broadcasts WHOIS for every neighbor guid that hasn't
    /// resolved an address yet, until all are resolved or cancelled.
    pub async fn run_discovery_broadcaster(
        &self,
        expected_neighbors: Vec<u32>,
        cancel: CancellationToken,
    ) {
        loop {
            let unresolved = self.neighbors.unresolved(&expected_neighbors);
            if unresolved.is_empty() {
                debug!(guid = self.guid, "all neighbors resolved, discovery broadcaster idle");
                return;
            }
            for target in &unresolved {
                trace!(guid = self.guid, target, "broadcasting WHOIS");
                self.send(&BusMessage::whois(self.guid, *target), self.broadcast_addr)
                    .await;
            }
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {},
                _ = cancel.cancelled() => return,
            }
        }
    }

    /// Receives and demultiplexes datagrams until cancelled. WHOIS
    /// addressed to this device's guid is answered directly; any other
    /// message from a resolved neighbor is handed to `handler`, and any
    /// non-neighbor sender is told UNKNOWN.
    pub async fn run_receive_loop(
        &self,
        handler: Arc<dyn PeerHandler>,
        cancel: CancellationToken,
    ) {
        let mut buf = [0u8; 64];
        loop {
            let recv = timeout(POLL_INTERVAL, self.socket.recv_from(&mut buf)).await;
            if cancel.is_cancelled() {
                return;
            }
            let (len, from) = match recv {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    warn!("bus recv error: {e}");
                    continue;
                },
                Err(_) => continue, // poll timeout, loop back to check cancellation
            };

            let msg = match BusMessage::decode(&buf[..len]) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("malformed bus datagram from {from}: {e}");
                    continue;
                },
            };

            if msg.message_id == MessageId::Whois {
                if msg.receiver_id == self.guid {
                    debug!(guid = self.guid, from = %from, "answering WHOIS with IAMHERE");
                    self.neighbors.resolve(msg.sender_id, from);
                    self.send(&BusMessage::i_am_here(self.guid, msg.sender_id), from)
                        .await;
                }
                continue;
            }

            if msg.message_id == MessageId::IAmHere {
                self.neighbors.resolve(msg.sender_id, from);
                continue;
            }

            if !self.neighbors.is_resolved(msg.sender_id) {
                self.send(&BusMessage::unknown(self.guid, msg.sender_id), from)
                    .await;
                continue;
            }

            if let Some(reply) = handler.handle_message(msg, from).await {
                self.send(&reply, from).await;
            }
        }
    }
}

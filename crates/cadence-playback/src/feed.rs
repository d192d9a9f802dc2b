//! Single-producer, single-consumer packet feed between the network reader
//! and the tick thread.

use tokio::sync::mpsc::{self, error::TryRecvError};

use cadence_core::Packet;

use crate::error::PlaybackError;

/// Create a connected feed. The sender is not `Clone`: one producer only.
pub fn packet_feed() -> (PacketSender, PacketReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        PacketSender { inner: tx },
        PacketReceiver {
            inner: rx,
            closed: false,
        },
    )
}

/// Producer half, owned by whatever reads packets off the wire.
#[derive(Debug)]
pub struct PacketSender {
    inner: mpsc::UnboundedSender<Packet>,
}

impl PacketSender {
    /// Enqueue a packet without blocking.
    pub fn push(&self, packet: Packet) -> Result<(), PlaybackError> {
        self.inner
            .send(packet)
            .map_err(|_| PlaybackError::FeedClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Consumer half, drained by the tracker once per tick.
#[derive(Debug)]
pub struct PacketReceiver {
    inner: mpsc::UnboundedReceiver<Packet>,
    closed: bool,
}

impl PacketReceiver {
    /// Next buffered packet, if any. Never blocks.
    pub fn try_next(&mut self) -> Option<Packet> {
        match self.inner.try_recv() {
            Ok(packet) => Some(packet),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.closed {
                    tracing::debug!("Packet feed producer dropped");
                    self.closed = true;
                }
                None
            }
        }
    }

    /// Everything buffered right now, in push order.
    pub fn drain(&mut self) -> impl Iterator<Item = Packet> + '_ {
        std::iter::from_fn(move || self.try_next())
    }

    /// The producer is gone and every buffered packet has been consumed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

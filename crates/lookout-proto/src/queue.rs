//! Bounded, non-blocking message queue seam.
//!
//! The frame loop must never wait on the network: sends fail fast when
//! the local buffer is full, receives poll with a short bounded timeout.
//! The in-process implementation is a bounded crossbeam channel; a real
//! transport bridges one end of it to the wire.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;
use thiserror::Error;

/// Matches the high-water mark the recognition servers expect from
/// clients.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("send buffer full")]
    Full,
    #[error("queue disconnected")]
    Disconnected,
}

/// Push side of a request channel.
pub trait OutboundQueue: Send {
    /// Enqueue without blocking; `QueueError::Full` when the buffer has
    /// no room.
    fn try_push(&self, message: Vec<u8>) -> Result<(), QueueError>;
}

/// Pull side of a result channel.
pub trait InboundQueue: Send {
    /// Wait up to `timeout` for one message; `None` means nothing
    /// arrived.
    fn poll(&self, timeout: Duration) -> Option<Vec<u8>>;
}

pub struct ChannelSender {
    tx: Sender<Vec<u8>>,
}

pub struct ChannelReceiver {
    rx: Receiver<Vec<u8>>,
}

impl OutboundQueue for ChannelSender {
    fn try_push(&self, message: Vec<u8>) -> Result<(), QueueError> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Disconnected(_) => QueueError::Disconnected,
        })
    }
}

impl InboundQueue for ChannelReceiver {
    fn poll(&self, timeout: Duration) -> Option<Vec<u8>> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// A bounded in-process queue pair. The sender side goes to a client,
/// the receiver side to whatever drains toward the transport (or to a
/// test).
pub fn bounded(capacity: usize) -> (ChannelSender, ChannelReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (ChannelSender { tx }, ChannelReceiver { rx })
}

//! lookout-proto — wire protocol for the face-identification client.
//!
//! Length-prefixed request framing, schema-tolerant result decoding, and
//! the bounded non-blocking queue seam the transport plugs into.

pub mod client;
pub mod message;
pub mod queue;
pub mod result;

pub use client::{RecognitionClient, RegisterClient};
pub use message::{decode_request, encode_request, ChannelMode, ProtocolError, RequestHeader};
pub use queue::{bounded, InboundQueue, OutboundQueue, QueueError, DEFAULT_QUEUE_CAPACITY};
pub use result::{decode_result, RecognitionResult, ResultError, UNKNOWN_FACE_ID};

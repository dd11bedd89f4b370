//! Frame-level transport: start/handshake, send one response, receive one
//! request, clear stale data. [`mq`] and [`pipe`] are the two variants;
//! both implement [`Transport`] so the receiver loop (C7) is agnostic to
//! which one it was handed.

pub mod mq;
pub mod pipe;

use crate::error::TransportError;
use crate::message::{Request, Response};

pub const MQ_MAX_LENGTH: usize = 256;
pub const MQ_MAX_MSG: usize = 10;
pub const PIPE_READ_ERROR_MAX: u32 = 5;

/// The capability set every transport variant implements.
pub trait Transport {
    /// Opens handles, drains any stale data, and emits the "ready"
    /// handshake. Idempotent only in the sense that calling it twice is a
    /// caller error, not something this trait guards against.
    fn start(&mut self) -> Result<(), TransportError>;

    fn is_started(&self) -> bool;

    /// Blocks for exactly one framed request. Fails with `NotStarted` if
    /// called before `start`.
    fn receive_request(&mut self) -> Result<Request, TransportError>;

    /// Writes one framed response. Must never partially emit on success.
    fn send_response(&mut self, response: &Response) -> Result<(), TransportError>;
}

//! Request and response envelopes, and the owned-buffer discipline they
//! carry across the transport → dispatcher → transport handoff.
//!
//! A payload is exclusively owned by whichever structure currently holds
//! it; transferring it (request into the dispatcher, a response back out)
//! moves the `Box<[u8]>` rather than copying it. There is no separate
//! free/release step — the buffer is released when its owner is dropped.

use crate::command::{Command, Status};

#[derive(Debug)]
pub struct Request {
    pub command: Command,
    pub data: Box<[u8]>,
}

impl Request {
    pub fn new(command: Command, data: impl Into<Box<[u8]>>) -> Request {
        Request {
            command,
            data: data.into(),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: Status,
    pub data: Box<[u8]>,
}

impl Response {
    pub fn ok(data: impl Into<Box<[u8]>>) -> Response {
        Response {
            status: Status::Ok,
            data: data.into(),
        }
    }

    pub fn error() -> Response {
        Response {
            status: Status::Error,
            data: Box::new([]),
        }
    }

    pub fn empty_ok() -> Response {
        Response::ok(Box::new([]) as Box<[u8]>)
    }

    /// Clears the payload and sets `status = MALFORMED`, per C1's
    /// `respond_malformed` helper.
    pub fn malformed() -> Response {
        Response {
            status: Status::Malformed,
            data: Box::new([]),
        }
    }
}

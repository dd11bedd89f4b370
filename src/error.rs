//! Error taxonomy. One `thiserror` enum per layer, composed with `#[from]`
//! so a low-level failure (an `io::Error`, an `shmat` failure) arrives at
//! the caller as the right layer's error without manual wrapping.

use thiserror::Error;

/// C1 — wire codec errors. Reads never fail (the caller presizes slices
/// after a length check); only casts can.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("value {0} does not fit in a u32")]
    DoesNotFitU32(u64),
}

/// C2 — transport errors, shared by the MQ and pipe variants.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport not started")]
    NotStarted,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },
    #[error("exceeded {0} consecutive read errors")]
    ReadRetriesExhausted(u32),
    #[error("response of {len} bytes exceeds MQ_MAX_LENGTH - 1 ({max})")]
    ResponseTooLarge { len: usize, max: usize },
}

/// C3 — shared-memory gateway errors.
#[derive(Debug, Error)]
pub enum ShmError {
    #[error("shmat failed: {0}")]
    Attach(#[source] std::io::Error),
    #[error("shmctl(IPC_STAT) failed: {0}")]
    Stat(#[source] std::io::Error),
    #[error("shmdt failed: {0}")]
    Detach(#[source] std::io::Error),
    #[error("copy of {requested} bytes at offset {offset} exceeds segment size {size}")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        size: usize,
    },
}

/// C8 — driver-side errors. Wraps transport errors and adds the
/// driver's own view of a handler reporting ERROR or MALFORMED.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("request refused: MALFORMED")]
    Malformed,
    #[error("request failed: ERROR")]
    HandlerError,
}

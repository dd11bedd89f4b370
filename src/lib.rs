//! Control-plane library for a Virtual Platform Testing Interface: a
//! bidirectional request/response protocol between a driver (fuzzer,
//! test runner) and a virtual-platform simulation, over POSIX message
//! queues or anonymous pipes.
//!
//! The VP simulation itself — CPU, MMU, MMIO devices, symbol resolution,
//! basic-block counting hooks — is not implemented here; callers
//! implement [`dispatcher::VpHandlers`] and hand it to a
//! [`receiver::ReceiverLoop`] alongside one of the two transports.

pub mod command;
pub mod coverage;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod event;
pub mod event_channel;
pub mod logging;
pub mod message;
pub mod receiver;
pub mod shm;
pub mod sync;
pub mod transport;
pub mod wire;

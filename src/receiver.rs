//! The receiver thread: drains requests from a transport, dispatches
//! them, and writes back responses, forever. The request payload is
//! released by the transport on its own next receive; the response
//! payload is released when `run_once` returns.

use crate::dispatcher::{Dispatcher, VpHandlers};
use crate::logging::Logger;
use crate::transport::Transport;
use std::thread::JoinHandle;

pub struct ReceiverLoop;

impl ReceiverLoop {
    /// Spawns the receiver thread. On `receive_request` failure the loop
    /// logs and continues — no unsolicited response is ever emitted.
    pub fn spawn<T, H>(
        mut transport: T,
        mut dispatcher: Dispatcher<H>,
        logger: Logger,
    ) -> JoinHandle<()>
    where
        T: Transport + Send + 'static,
        H: VpHandlers + Send + 'static,
    {
        std::thread::Builder::new()
            .name("vpti-receiver".into())
            .spawn(move || loop {
                run_once(&mut transport, &mut dispatcher, &logger);
            })
            .expect("failed to spawn receiver thread")
    }
}

/// One iteration of the receiver loop, factored out so dispatch logic is
/// unit-testable without a thread or a real transport.
pub fn run_once<T: Transport, H: VpHandlers>(
    transport: &mut T,
    dispatcher: &mut Dispatcher<H>,
    logger: &Logger,
) {
    let request = match transport.receive_request() {
        Ok(request) => request,
        Err(e) => {
            logger.error(&format!("receive_request failed: {e}"));
            return;
        }
    };
    let response = dispatcher.handle_request(&request);
    if let Err(e) = transport.send_response(&response) {
        logger.error(&format!("send_response failed: {e}"));
    }
}

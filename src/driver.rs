//! Driver-side client: mirrors C2+C6 for the side issuing commands.
//! `start` performs the handshake, `wait_for_ready`/`check_for_ready`
//! observe it, `send_request` round-trips one request and surfaces
//! handler failures as [`DriverError`] while still returning the payload.

use crate::error::{DriverError, TransportError};
use crate::message::{Request, Response};
use crate::transport::mq::Mq;
use crate::transport::pipe::Pipe;
use crate::transport::Transport;
use std::os::unix::io::RawFd;
use std::os::unix::process::CommandExt;
use std::process::Command as StdCommand;

/// The driver side of an MQ pair: opens the request queue write-only and
/// the response queue read-only, the reverse of the VP's roles.
pub struct MqDriver {
    transport: Mq,
}

impl MqDriver {
    pub fn new(request_name: &str, response_name: &str) -> MqDriver {
        MqDriver {
            transport: Mq::new(request_name, response_name),
        }
    }

    pub fn with_receiver_id(mut self, receiver_id: u32) -> MqDriver {
        self.transport = self.transport.with_receiver_id(receiver_id);
        self
    }

    pub fn start(&mut self) -> Result<(), TransportError> {
        self.transport.start_as_driver()
    }

    pub fn wait_for_ready(&mut self) -> Result<(), TransportError> {
        loop {
            if self.check_for_ready()? {
                return Ok(());
            }
        }
    }

    /// Non-blocking poll: peeks the response queue's depth via
    /// `mq_getattr` and, if a message is waiting, receives it. A message
    /// addressed to a different receiver is put back on the queue rather
    /// than consumed.
    pub fn check_for_ready(&mut self) -> Result<bool, TransportError> {
        self.transport.check_for_ready_as_driver()
    }

    pub fn send_request(&mut self, req: Request) -> Result<Response, DriverError> {
        self.transport.send_request_as_driver(&req)?;
        let response = self.transport.receive_response_as_driver()?;
        match response.status {
            crate::command::Status::Ok => Ok(response),
            crate::command::Status::Error => Err(DriverError::HandlerError),
            crate::command::Status::Malformed => Err(DriverError::Malformed),
        }
    }
}

/// The driver side of a pipe pair: creates both pipes itself, talks the
/// same framing as [`crate::transport::pipe::Pipe`], and can install the
/// fds into a child process about to `exec` the VP.
pub struct PipeDriver {
    transport: Pipe,
    vp_request_fd: RawFd,
    vp_response_fd: RawFd,
}

impl PipeDriver {
    /// Creates two anonymous pipes. The driver reads from
    /// `response_read` / writes to `request_write`; the VP child inherits
    /// `request_read` / `response_write`.
    pub fn new() -> Result<PipeDriver, TransportError> {
        let (request_read, request_write) =
            nix::unistd::pipe().map_err(|e| TransportError::Io(e.into()))?;
        let (response_read, response_write) =
            nix::unistd::pipe().map_err(|e| TransportError::Io(e.into()))?;
        Ok(PipeDriver {
            // driver's "request" pipe is what it writes to; Pipe's
            // framing is symmetric so we wrap it with the driver's roles
            // swapped relative to the VP's Pipe.
            transport: Pipe::new(response_read, request_write),
            vp_request_fd: request_read,
            vp_response_fd: response_write,
        })
    }

    /// The fds the VP child should inherit: `(request_read, response_write)`.
    pub fn child_fds(&self) -> (RawFd, RawFd) {
        (self.vp_request_fd, self.vp_response_fd)
    }

    /// Installs a `pre_exec` hook that `dup2`s this driver's child fds to
    /// `request_fd`/`response_fd` in the about-to-be-spawned child,
    /// before `exec` replaces its image — the idiomatic equivalent of
    /// forking and inheriting fixed descriptors.
    pub fn prepare_child(&self, command: &mut StdCommand, request_fd: RawFd, response_fd: RawFd) {
        let (child_request, child_response) = self.child_fds();
        unsafe {
            command.pre_exec(move || {
                if libc::dup2(child_request, request_fd) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                if libc::dup2(child_response, response_fd) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    /// Blocks until the `b"ready\0"` handshake is observed, by polling
    /// [`Self::check_for_ready`] in a loop.
    pub fn wait_for_ready(&mut self) -> Result<(), TransportError> {
        loop {
            if self.check_for_ready()? {
                return Ok(());
            }
        }
    }

    /// Non-blocking poll: peeks the available byte count with
    /// `ioctl(FIONREAD)` and only reads once at least 6 bytes (the whole
    /// `b"ready\0"` handshake) are available, so a caller can spin on
    /// this without ever blocking on a partial handshake.
    pub fn check_for_ready(&mut self) -> Result<bool, TransportError> {
        let fd = self.raw_response_fd();
        let mut available: libc::c_int = 0;
        let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut available as *mut libc::c_int) };
        if rc == -1 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        if available < 6 {
            return Ok(false);
        }
        let mut buf = [0u8; 6];
        read_exact(fd, &mut buf)?;
        if buf == *b"ready\0" {
            self.transport_mark_started();
            return Ok(true);
        }
        Ok(false)
    }

    pub fn send_request(&mut self, req: Request) -> Result<Response, DriverError> {
        self.transport.send_request_as_driver(&req)?;
        let response = self.transport.receive_response_as_driver()?;
        match response.status {
            crate::command::Status::Ok => Ok(response),
            crate::command::Status::Error => Err(DriverError::HandlerError),
            crate::command::Status::Malformed => Err(DriverError::Malformed),
        }
    }

    fn raw_response_fd(&self) -> RawFd {
        self.transport.raw_read_fd()
    }

    fn transport_mark_started(&mut self) {
        self.transport.mark_started();
    }
}

fn read_exact(fd: RawFd, mut buf: &mut [u8]) -> Result<(), TransportError> {
    while !buf.is_empty() {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n <= 0 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        buf = &mut buf[n as usize..];
    }
    Ok(())
}

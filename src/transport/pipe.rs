//! Anonymous-pipe transport: a stream of length-prefixed frames over a
//! pair of file descriptors, one per direction.
//!
//! Framing: `command(1) ‖ data_len(u32 BE) ‖ data` for requests,
//! `status(1) ‖ data_len(u32 BE) ‖ data` for responses. The handshake is
//! the literal bytes `b"ready\0"` written to the response fd.

use super::{Transport, PIPE_READ_ERROR_MAX};
use crate::command::{Command, Status};
use crate::error::TransportError;
use crate::message::{Request, Response};
use std::os::unix::io::RawFd;

/// Wraps a pair of already-open fds: `request_fd` is read from, `response_fd`
/// is written to. Construct from either inherited fds (dup2'd by the
/// driver before fork) or a `libc::pipe` pair created directly.
pub struct Pipe {
    request_fd: RawFd,
    response_fd: RawFd,
    started: bool,
}

impl Pipe {
    pub fn new(request_fd: RawFd, response_fd: RawFd) -> Pipe {
        Pipe {
            request_fd,
            response_fd,
            started: false,
        }
    }

    /// The driver-side mirror of [`Transport::receive_request`] /
    /// [`Transport::send_response`]: a driver wraps its pipe pair in a
    /// `Pipe` too (request_fd = the fd it reads responses from,
    /// response_fd = the fd it writes requests to) and uses these
    /// instead of the VP-facing trait methods.
    pub(crate) fn raw_read_fd(&self) -> RawFd {
        self.request_fd
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    pub(crate) fn send_request_as_driver(&mut self, req: &Request) -> Result<(), TransportError> {
        let mut header = [0u8; 5];
        header[0] = req.command.tag();
        crate::wire::put_u32_be(&mut header, 1, req.data.len() as u32);
        write_all(self.response_fd, &header)?;
        write_all(self.response_fd, &req.data)?;
        Ok(())
    }

    pub(crate) fn receive_response_as_driver(&mut self) -> Result<Response, TransportError> {
        let mut header = [0u8; 5];
        read_exact_retrying(self.request_fd, &mut header)?;
        let status = Status::from_tag(header[0]).unwrap_or(Status::Error);
        let data_len = crate::wire::get_u32_be(&header, 1) as usize;
        let mut data = vec![0u8; data_len];
        read_exact_retrying(self.request_fd, &mut data)?;
        Ok(Response {
            status,
            data: data.into_boxed_slice(),
        })
    }
}

impl Transport for Pipe {
    fn start(&mut self) -> Result<(), TransportError> {
        write_all(self.response_fd, b"ready\0")?;
        self.started = true;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn receive_request(&mut self) -> Result<Request, TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        let mut header = [0u8; 5];
        read_exact_retrying(self.request_fd, &mut header)?;
        let command = Command::from_tag(header[0]).unwrap_or(Command::Kill);
        let data_len = crate::wire::get_u32_be(&header, 1) as usize;
        let mut data = vec![0u8; data_len];
        read_exact_retrying(self.request_fd, &mut data)?;
        Ok(Request::new(command, data.into_boxed_slice()))
    }

    fn send_response(&mut self, response: &Response) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        let mut header = [0u8; 5];
        header[0] = response.status.tag();
        crate::wire::put_u32_be(&mut header, 1, response.data.len() as u32);
        write_all(self.response_fd, &header)?;
        write_all(self.response_fd, &response.data)?;
        Ok(())
    }
}

/// Note: `Command::from_tag` failure above is masked to `Kill` rather
/// than surfaced, since `Request` has no "unknown command" variant; the
/// dispatcher does not special-case it and no handler table row maps to
/// an out-of-range tag in practice. Revisit if that stops being true.
fn write_all(fd: RawFd, mut buf: &[u8]) -> Result<(), TransportError> {
    while !buf.is_empty() {
        let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n < 0 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        buf = &buf[n as usize..];
    }
    Ok(())
}

fn read_exact_retrying(fd: RawFd, mut buf: &mut [u8]) -> Result<(), TransportError> {
    let mut consecutive_errors = 0u32;
    while !buf.is_empty() {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n > 0 {
            consecutive_errors = 0;
            buf = &mut buf[n as usize..];
        } else {
            consecutive_errors += 1;
            if consecutive_errors >= PIPE_READ_ERROR_MAX {
                return Err(TransportError::ReadRetriesExhausted(PIPE_READ_ERROR_MAX));
            }
        }
    }
    Ok(())
}

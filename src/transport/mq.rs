//! POSIX message queue transport. Raw `libc::mq_*` calls are isolated to
//! this module — neither the standard library nor `nix`'s `mqueue`
//! module exposes the attribute control (`mq_maxmsg`/`mq_msgsize`) this
//! component needs, so the FFI surface stays narrow and local, the way
//! the original isolates `<mqueue.h>` use to a single translation unit.
//!
//! Framing: each message is atomic and capped at [`super::MQ_MAX_LENGTH`]
//! bytes. A request is `command(1) ‖ data`; a response is
//! `status(1) ‖ data`. The multi-receiver dialect additionally prefixes
//! a 4-byte receiver identifier (`0` = broadcast).

use super::{Transport, MQ_MAX_LENGTH, MQ_MAX_MSG};
use crate::command::Command;
use crate::error::TransportError;
use crate::message::{Request, Response};
use std::ffi::CString;
use std::os::raw::c_char;

/// A named POSIX message queue pair: requests are read from one queue,
/// responses written to the other. `receiver_id`, when set, opts into
/// the multi-receiver dialect (`spec.md` §4.2) for this pair.
pub struct Mq {
    request_name: CString,
    response_name: CString,
    request_mqd: libc::mqd_t,
    response_mqd: libc::mqd_t,
    receiver_id: Option<u32>,
    started: bool,
}

impl Mq {
    pub fn new(request_name: &str, response_name: &str) -> Mq {
        Mq {
            request_name: CString::new(request_name).expect("queue name has no interior NUL"),
            response_name: CString::new(response_name).expect("queue name has no interior NUL"),
            request_mqd: -1,
            response_mqd: -1,
            receiver_id: None,
            started: false,
        }
    }

    /// Opts into the multi-receiver dialect under the given identifier.
    /// `0` is reserved for broadcast and matches any receiver.
    pub fn with_receiver_id(mut self, receiver_id: u32) -> Mq {
        self.receiver_id = Some(receiver_id);
        self
    }

    fn open(name: &CString, flags: libc::c_int, mode: libc::mode_t) -> Result<libc::mqd_t, TransportError> {
        let attr = libc::mq_attr {
            mq_flags: 0,
            mq_maxmsg: MQ_MAX_MSG as i64,
            mq_msgsize: MQ_MAX_LENGTH as i64,
            mq_curmsgs: 0,
        };
        let mqd = unsafe {
            libc::mq_open(
                name.as_ptr() as *const c_char,
                flags,
                mode,
                &attr as *const libc::mq_attr,
            )
        };
        if mqd == -1 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        Ok(mqd)
    }

    /// Drains any stale messages left on the request queue from a prior run.
    fn drain_stale(&self) {
        let mut buf = [0u8; MQ_MAX_LENGTH];
        loop {
            let n = unsafe {
                libc::mq_receive(
                    self.request_mqd,
                    buf.as_mut_ptr() as *mut c_char,
                    buf.len(),
                    std::ptr::null_mut(),
                )
            };
            if n < 0 {
                break;
            }
        }
    }

    /// Encodes the optional receiver-identifier prefix used by the
    /// multi-receiver dialect ahead of `body`.
    fn frame(&self, body: &[u8]) -> Vec<u8> {
        match self.receiver_id {
            Some(id) => {
                let mut framed = vec![0u8; 4 + body.len()];
                crate::wire::put_u32_be(&mut framed, 0, id);
                framed[4..].copy_from_slice(body);
                framed
            }
            None => body.to_vec(),
        }
    }

    /// Strips the receiver-identifier prefix, if this `Mq` uses the
    /// dialect, returning `None` when the message is addressed to a
    /// different receiver (the caller should requeue and retry).
    fn unframe<'a>(&self, raw: &'a [u8]) -> Option<&'a [u8]> {
        match self.receiver_id {
            Some(mine) => {
                if raw.len() < 4 {
                    return None;
                }
                let addressed_to = crate::wire::get_u32_be(raw, 0);
                if addressed_to == 0 || addressed_to == mine {
                    Some(&raw[4..])
                } else {
                    None
                }
            }
            None => Some(raw),
        }
    }
}

impl Mq {
    /// The driver-side mirror of [`Transport::start`]/`receive_request`/
    /// `send_response`: the driver opens the request queue write-only and
    /// the response queue read-only — the reverse of the VP's roles —
    /// then blocks for the "ready" handshake.
    pub fn start_as_driver(&mut self) -> Result<(), TransportError> {
        self.request_mqd = Self::open(&self.request_name, libc::O_WRONLY | libc::O_CREAT, 0o660)?;
        self.response_mqd = Self::open(&self.response_name, libc::O_RDONLY | libc::O_CREAT, 0o644)?;
        self.started = true;
        Ok(())
    }

    pub fn wait_for_ready_as_driver(&mut self) -> Result<(), TransportError> {
        loop {
            if self.check_for_ready_as_driver()? {
                return Ok(());
            }
        }
    }

    /// Non-blocking poll: `mq_getattr` first, so an empty queue never
    /// blocks on `mq_receive`. A message addressed to a different
    /// receiver is put back on the queue with `mq_send`, mirroring the
    /// put-back-on-mismatch behavior `receive_request`/
    /// `receive_response_as_driver` use for the blocking path.
    pub fn check_for_ready_as_driver(&mut self) -> Result<bool, TransportError> {
        let mut attr = libc::mq_attr {
            mq_flags: 0,
            mq_maxmsg: 0,
            mq_msgsize: 0,
            mq_curmsgs: 0,
        };
        let rc = unsafe { libc::mq_getattr(self.response_mqd, &mut attr) };
        if rc == -1 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        if attr.mq_curmsgs <= 0 {
            return Ok(false);
        }
        let mut buf = [0u8; MQ_MAX_LENGTH];
        let n = unsafe {
            libc::mq_receive(
                self.response_mqd,
                buf.as_mut_ptr() as *mut c_char,
                buf.len(),
                std::ptr::null_mut(),
            )
        };
        if n < 0 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        let raw = &buf[..n as usize];
        match self.unframe(raw) {
            Some(body) => Ok(body == b"ready"),
            None => {
                self.requeue(self.response_mqd, raw)?;
                Ok(false)
            }
        }
    }

    /// Re-sends raw framed bytes that weren't addressed to this
    /// receiver back onto `mqd`, so the intended receiver can still
    /// consume them.
    fn requeue(&self, mqd: libc::mqd_t, raw: &[u8]) -> Result<(), TransportError> {
        let rc = unsafe { libc::mq_send(mqd, raw.as_ptr() as *const c_char, raw.len(), 0) };
        if rc == -1 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    pub fn send_request_as_driver(&mut self, req: &Request) -> Result<(), TransportError> {
        let mut body = Vec::with_capacity(1 + req.data.len());
        body.push(req.command.tag());
        body.extend_from_slice(&req.data);
        let framed = self.frame(&body);
        let rc = unsafe {
            libc::mq_send(
                self.request_mqd,
                framed.as_ptr() as *const c_char,
                framed.len(),
                0,
            )
        };
        if rc == -1 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    pub fn receive_response_as_driver(&mut self) -> Result<Response, TransportError> {
        loop {
            let mut buf = [0u8; MQ_MAX_LENGTH];
            let n = unsafe {
                libc::mq_receive(
                    self.response_mqd,
                    buf.as_mut_ptr() as *mut c_char,
                    buf.len(),
                    std::ptr::null_mut(),
                )
            };
            if n < 0 {
                return Err(TransportError::Io(std::io::Error::last_os_error()));
            }
            let raw = &buf[..n as usize];
            let body = match self.unframe(raw) {
                Some(body) => body,
                None => {
                    self.requeue(self.response_mqd, raw)?;
                    continue;
                }
            };
            if body.is_empty() {
                return Err(TransportError::ShortRead {
                    expected: 1,
                    got: 0,
                });
            }
            let status = crate::command::Status::from_tag(body[0]).unwrap_or(crate::command::Status::Error);
            return Ok(Response {
                status,
                data: body[1..].to_vec().into_boxed_slice(),
            });
        }
    }
}

impl Transport for Mq {
    fn start(&mut self) -> Result<(), TransportError> {
        self.request_mqd = Self::open(&self.request_name, libc::O_RDONLY | libc::O_CREAT, 0o660)?;
        self.response_mqd = Self::open(&self.response_name, libc::O_WRONLY | libc::O_CREAT, 0o644)?;
        self.drain_stale();
        let framed = self.frame(b"ready");
        let rc = unsafe {
            libc::mq_send(
                self.response_mqd,
                framed.as_ptr() as *const c_char,
                framed.len(),
                0,
            )
        };
        if rc == -1 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
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
        loop {
            let mut buf = [0u8; MQ_MAX_LENGTH];
            let n = unsafe {
                libc::mq_receive(
                    self.request_mqd,
                    buf.as_mut_ptr() as *mut c_char,
                    buf.len(),
                    std::ptr::null_mut(),
                )
            };
            if n < 0 {
                return Err(TransportError::Io(std::io::Error::last_os_error()));
            }
            let raw = &buf[..n as usize];
            let body = match self.unframe(raw) {
                Some(body) => body,
                None => {
                    self.requeue(self.request_mqd, raw)?;
                    continue;
                }
            };
            if body.is_empty() {
                return Err(TransportError::ShortRead {
                    expected: 1,
                    got: 0,
                });
            }
            let command = Command::from_tag(body[0]).unwrap_or(Command::Kill);
            return Ok(Request::new(command, &body[1..]));
        }
    }

    fn send_response(&mut self, response: &Response) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        let mut body = Vec::with_capacity(1 + response.data.len());
        body.push(response.status.tag());
        body.extend_from_slice(&response.data);
        if body.len() > MQ_MAX_LENGTH - 1 {
            return Err(TransportError::ResponseTooLarge {
                len: body.len(),
                max: MQ_MAX_LENGTH - 1,
            });
        }
        let framed = self.frame(&body);
        let rc = unsafe {
            libc::mq_send(
                self.response_mqd,
                framed.as_ptr() as *const c_char,
                framed.len(),
                0,
            )
        };
        if rc == -1 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Drop for Mq {
    fn drop(&mut self) {
        if self.request_mqd != -1 {
            unsafe {
                libc::mq_close(self.request_mqd);
            }
        }
        if self.response_mqd != -1 {
            unsafe {
                libc::mq_close(self.response_mqd);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_frame_round_trips() {
        let mq = Mq::new("/vpti-req", "/vpti-resp").with_receiver_id(7);
        let framed = mq.frame(b"hello");
        assert_eq!(mq.unframe(&framed), Some(&b"hello"[..]));
    }

    #[test]
    fn frame_for_other_receiver_is_rejected() {
        let mine = Mq::new("/vpti-req", "/vpti-resp").with_receiver_id(7);
        let other = Mq::new("/vpti-req", "/vpti-resp").with_receiver_id(9);
        let framed = other.frame(b"hello");
        assert_eq!(mine.unframe(&framed), None);
    }

    #[test]
    fn broadcast_identifier_zero_matches_any_receiver() {
        let mine = Mq::new("/vpti-req", "/vpti-resp").with_receiver_id(7);
        let broadcaster = Mq::new("/vpti-req", "/vpti-resp").with_receiver_id(0);
        let framed = broadcaster.frame(b"hello");
        assert_eq!(mine.unframe(&framed), Some(&b"hello"[..]));
    }
}

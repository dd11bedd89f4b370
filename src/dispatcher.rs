//! Decodes a command payload, enforces its length invariants, calls the
//! matching VP handler, and encodes the reply. One entry point,
//! [`Dispatcher::handle_request`], selects on `req.command`.
//!
//! Every arm uses the *negated* validation form: `if !check(...) { return
//! Response::malformed(); }`. No arm invokes a handler before its length
//! check passes.

use crate::command::{Command, Status};
use crate::coverage::CoverageMap;
use crate::event_channel::EventConsumer;
use crate::logging::Logger;
use crate::message::{Request, Response};
use crate::shm::ShmSegment;
use crate::wire::{get_u32_be, get_u64_be, put_u32_be, put_u64_be};

/// The VP-facing contract: one method per row of the handler table.
/// Implemented by whatever owns the simulation (CPU, MMU, MMIO devices,
/// symbol resolution) — none of which this crate implements.
pub trait VpHandlers {
    fn kill(&mut self, gracefully: bool) -> Status;
    fn set_breakpoint(&mut self, symbol: &str, offset: u8) -> Status;
    fn remove_breakpoint(&mut self, symbol: &str) -> Status;
    fn enable_mmio_tracking(&mut self, start: u64, end: u64, mode: u8) -> Status;
    fn disable_mmio_tracking(&mut self) -> Status;
    fn set_mmio_value(&mut self, value: &[u8]) -> Status;
    fn add_to_mmio_read_queue(&mut self, addr: u64, width: u32, data: &[u8]) -> Status;
    fn set_cpu_interrupt_trigger(&mut self, interrupt_addr: u64, trigger_addr: u64) -> Status;
    fn enable_code_coverage(&mut self) -> Status;
    fn disable_code_coverage(&mut self) -> Status;
    fn reset_code_coverage(&mut self) -> Status;
    fn set_return_code_address(&mut self, addr: u64, reg_name: &str) -> Status;
    fn get_return_code(&mut self) -> (Status, u64);
    #[allow(clippy::too_many_arguments)]
    fn do_run(
        &mut self,
        start_breakpoint: &str,
        end_breakpoint: &str,
        addr: u64,
        width: u32,
        data: &[u8],
        register_name: &str,
    ) -> Status;
    #[allow(clippy::too_many_arguments)]
    fn do_run_shm(
        &mut self,
        start_breakpoint: &str,
        end_breakpoint: &str,
        addr: u64,
        width: u32,
        data: &[u8],
        register_name: &str,
    ) -> Status;
    fn set_error_symbol(&mut self, symbol: &str) -> Status;
    fn set_fixed_read(&mut self, count: u8, entries: &[u8]) -> Status;
    fn get_cpu_pc(&mut self) -> (Status, u64);
    fn jump_cpu_to(&mut self, addr: u64) -> Status;
    fn store_cpu_registers(&mut self) -> Status;
    fn restore_cpu_registers(&mut self) -> Status;
}

/// Owns the coverage map and the receiver's side of the event channel —
/// neither belongs to a specific VP handler, both are core state the
/// dispatcher reads and writes directly (`spec.md` §3: "written by
/// simulation hooks, read by receiver").
pub struct Dispatcher<H: VpHandlers> {
    pub handlers: H,
    pub coverage: CoverageMap,
    events: EventConsumer,
    logger: Logger,
}

impl<H: VpHandlers> Dispatcher<H> {
    pub fn new(handlers: H, events: EventConsumer, logger: Logger) -> Dispatcher<H> {
        Dispatcher {
            handlers,
            coverage: CoverageMap::new(),
            events,
            logger,
        }
    }

    pub fn handle_request(&mut self, req: &Request) -> Response {
        match req.command {
            Command::Continue => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                let event = self.events.recv();
                Response::ok(event.encode())
            }

            Command::Kill => {
                if !exact(req, 1, &self.logger) {
                    return Response::malformed();
                }
                let gracefully = req.data[0] != 0;
                status_only(self.handlers.kill(gracefully))
            }

            Command::SetBreakpoint => {
                if !min(req, 2, &self.logger) {
                    return Response::malformed();
                }
                let offset = req.data[0];
                let symbol = String::from_utf8_lossy(&req.data[1..]);
                status_only(self.handlers.set_breakpoint(&symbol, offset))
            }

            Command::RemoveBreakpoint => {
                if !min(req, 1, &self.logger) {
                    return Response::malformed();
                }
                let symbol = String::from_utf8_lossy(&req.data);
                status_only(self.handlers.remove_breakpoint(&symbol))
            }

            Command::EnableMmioTracking => {
                if !exact(req, 17, &self.logger) {
                    return Response::malformed();
                }
                let start = get_u64_be(&req.data, 0);
                let end = get_u64_be(&req.data, 8);
                let mode = req.data[16];
                status_only(self.handlers.enable_mmio_tracking(start, end, mode))
            }

            Command::DisableMmioTracking => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                status_only(self.handlers.disable_mmio_tracking())
            }

            Command::SetMmioValue => {
                if !min(req, 1, &self.logger) {
                    return Response::malformed();
                }
                status_only(self.handlers.set_mmio_value(&req.data))
            }

            Command::AddToMmioReadQueue => {
                if !min(req, 17, &self.logger) {
                    return Response::malformed();
                }
                let addr = get_u64_be(&req.data, 0);
                let width = get_u32_be(&req.data, 8);
                let data_len = get_u32_be(&req.data, 12) as usize;
                if !exact(req, 16 + data_len, &self.logger) {
                    return Response::malformed();
                }
                let data = &req.data[16..16 + data_len];
                status_only(self.handlers.add_to_mmio_read_queue(addr, width, data))
            }

            Command::SetCpuInterruptTrigger => {
                if !exact(req, 16, &self.logger) {
                    return Response::malformed();
                }
                let interrupt_addr = get_u64_be(&req.data, 0);
                let trigger_addr = get_u64_be(&req.data, 8);
                status_only(
                    self.handlers
                        .set_cpu_interrupt_trigger(interrupt_addr, trigger_addr),
                )
            }

            Command::EnableCodeCoverage => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                status_only(self.handlers.enable_code_coverage())
            }

            Command::DisableCodeCoverage => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                status_only(self.handlers.disable_code_coverage())
            }

            Command::ResetCodeCoverage => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                let status = self.handlers.reset_code_coverage();
                self.coverage.reset();
                status_only(status)
            }

            Command::GetCodeCoverage => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                let bytes = self.coverage.as_bytes();
                let mut data = vec![0u8; 4 + bytes.len()];
                put_u32_be(&mut data, 0, bytes.len() as u32);
                data[4..].copy_from_slice(bytes);
                Response::ok(data.into_boxed_slice())
            }

            Command::GetCodeCoverageShm => {
                if !exact(req, 8, &self.logger) {
                    return Response::malformed();
                }
                let shm_id = get_u32_be(&req.data, 0) as i32;
                let offset = get_u32_be(&req.data, 4) as usize;
                match ShmSegment::attach_rw(shm_id) {
                    Ok(mut shm) => match shm.copy_to(offset, self.coverage.as_bytes()) {
                        Ok(()) => Response::empty_ok(),
                        Err(e) => {
                            self.logger.error(&format!("coverage shm copy failed: {e}"));
                            Response::error()
                        }
                    },
                    Err(e) => {
                        self.logger.error(&format!("coverage shm attach failed: {e}"));
                        Response::error()
                    }
                }
            }

            Command::SetReturnCodeAddress => {
                if !min(req, 8, &self.logger) {
                    return Response::malformed();
                }
                let address = get_u64_be(&req.data, 0);
                let reg_name = String::from_utf8_lossy(&req.data[8..]);
                status_only(self.handlers.set_return_code_address(address, &reg_name))
            }

            Command::GetReturnCode => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                let (status, code) = self.handlers.get_return_code();
                let mut data = vec![0u8; 8];
                put_u64_be(&mut data, 0, code);
                Response {
                    status,
                    data: data.into_boxed_slice(),
                }
            }

            Command::DoRun => {
                if !min(req, 20, &self.logger) {
                    return Response::malformed();
                }
                let addr = get_u64_be(&req.data, 0);
                let width = get_u32_be(&req.data, 8);
                let data_length = get_u32_be(&req.data, 12) as usize;
                let sbp_len = req.data[16] as usize;
                let ebp_len = req.data[17] as usize;
                let reg_len = req.data[18] as usize;
                if !exact(req, 19 + sbp_len + ebp_len + reg_len + data_length, &self.logger) {
                    return Response::malformed();
                }
                let mut off = 19;
                let start_bp = String::from_utf8_lossy(&req.data[off..off + sbp_len]).into_owned();
                off += sbp_len;
                let end_bp = String::from_utf8_lossy(&req.data[off..off + ebp_len]).into_owned();
                off += ebp_len;
                let reg = String::from_utf8_lossy(&req.data[off..off + reg_len]).into_owned();
                off += reg_len;
                let data = &req.data[off..off + data_length];
                status_only(
                    self.handlers
                        .do_run(&start_bp, &end_bp, addr, width, data, &reg),
                )
            }

            Command::DoRunShm => {
                if !min(req, 25, &self.logger) {
                    return Response::malformed();
                }
                let addr = get_u64_be(&req.data, 0);
                let width = get_u32_be(&req.data, 8);
                let shm_id = get_u32_be(&req.data, 12) as i32;
                let shm_offset = get_u32_be(&req.data, 16) as usize;
                let stop_on_nul = req.data[20] != 0;
                let sbp_len = req.data[21] as usize;
                let ebp_len = req.data[22] as usize;
                let reg_len = req.data[23] as usize;
                if !exact(req, 24 + sbp_len + ebp_len + reg_len, &self.logger) {
                    return Response::malformed();
                }
                let mut off = 24;
                let start_bp = String::from_utf8_lossy(&req.data[off..off + sbp_len]).into_owned();
                off += sbp_len;
                let end_bp = String::from_utf8_lossy(&req.data[off..off + ebp_len]).into_owned();
                off += ebp_len;
                let reg = String::from_utf8_lossy(&req.data[off..off + reg_len]).into_owned();

                let shm = match ShmSegment::attach_ro(shm_id) {
                    Ok(shm) => shm,
                    Err(e) => {
                        self.logger.error(&format!("do_run_shm attach failed: {e}"));
                        return Response::error();
                    }
                };
                let max = shm.size().saturating_sub(shm_offset);
                let data = shm.copy_from(shm_offset, max, stop_on_nul);
                status_only(
                    self.handlers
                        .do_run_shm(&start_bp, &end_bp, addr, width, &data, &reg),
                )
            }

            Command::SetErrorSymbol => {
                if !min(req, 1, &self.logger) {
                    return Response::malformed();
                }
                let symbol = String::from_utf8_lossy(&req.data);
                status_only(self.handlers.set_error_symbol(&symbol))
            }

            Command::SetFixedRead => {
                if !min(req, 10, &self.logger) {
                    return Response::malformed();
                }
                let count = req.data[0];
                if !exact(req, 1 + count as usize * 9, &self.logger) {
                    return Response::malformed();
                }
                status_only(self.handlers.set_fixed_read(count, &req.data[1..]))
            }

            Command::GetCpuPc => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                let (status, pc) = self.handlers.get_cpu_pc();
                let mut data = vec![0u8; 8];
                put_u64_be(&mut data, 0, pc);
                Response {
                    status,
                    data: data.into_boxed_slice(),
                }
            }

            Command::JumpCpuTo => {
                if !exact(req, 8, &self.logger) {
                    return Response::malformed();
                }
                let addr = get_u64_be(&req.data, 0);
                status_only(self.handlers.jump_cpu_to(addr))
            }

            Command::StoreCpuRegisters => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                status_only(self.handlers.store_cpu_registers())
            }

            Command::RestoreCpuRegisters => {
                if !exact(req, 0, &self.logger) {
                    return Response::malformed();
                }
                status_only(self.handlers.restore_cpu_registers())
            }
        }
    }
}

fn exact(req: &Request, length: usize, logger: &Logger) -> bool {
    if req.data.len() != length {
        logger.error(&format!(
            "request has length {} but command requires exactly {}",
            req.data.len(),
            length
        ));
        return false;
    }
    true
}

fn min(req: &Request, length: usize, logger: &Logger) -> bool {
    if req.data.len() < length {
        logger.error(&format!(
            "request has length {} but command requires at least {}",
            req.data.len(),
            length
        ));
        return false;
    }
    true
}

fn status_only(status: Status) -> Response {
    Response {
        status,
        data: Box::new([]),
    }
}

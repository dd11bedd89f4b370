//! End-to-end coverage of the pipe transport against a mock VP, driving
//! the literal round-trip scenarios from the handler table.

use std::os::unix::io::RawFd;

use vpti::command::{Command, Status};
use vpti::dispatcher::{Dispatcher, VpHandlers};
use vpti::event::Event;
use vpti::event_channel;
use vpti::logging::Logger;
use vpti::message::Request;
use vpti::receiver::run_once;
use vpti::transport::pipe::Pipe;
use vpti::transport::Transport;

struct MockVp {
    killed: Option<bool>,
    breakpoints: Vec<(String, u8)>,
}

impl VpHandlers for MockVp {
    fn kill(&mut self, gracefully: bool) -> Status {
        self.killed = Some(gracefully);
        Status::Ok
    }
    fn set_breakpoint(&mut self, symbol: &str, offset: u8) -> Status {
        self.breakpoints.push((symbol.to_string(), offset));
        Status::Ok
    }
    fn remove_breakpoint(&mut self, _symbol: &str) -> Status {
        Status::Ok
    }
    fn enable_mmio_tracking(&mut self, _start: u64, _end: u64, _mode: u8) -> Status {
        Status::Ok
    }
    fn disable_mmio_tracking(&mut self) -> Status {
        Status::Ok
    }
    fn set_mmio_value(&mut self, _value: &[u8]) -> Status {
        Status::Ok
    }
    fn add_to_mmio_read_queue(&mut self, addr: u64, width: u32, data: &[u8]) -> Status {
        assert_eq!(addr, 0x4000_0000);
        assert_eq!(width, 4);
        assert_eq!(data, &[1, 2, 3, 4, 5, 6, 7, 8]);
        Status::Ok
    }
    fn set_cpu_interrupt_trigger(&mut self, _a: u64, _b: u64) -> Status {
        Status::Ok
    }
    fn enable_code_coverage(&mut self) -> Status {
        Status::Ok
    }
    fn disable_code_coverage(&mut self) -> Status {
        Status::Ok
    }
    fn reset_code_coverage(&mut self) -> Status {
        Status::Ok
    }
    fn set_return_code_address(&mut self, _addr: u64, _reg: &str) -> Status {
        Status::Ok
    }
    fn get_return_code(&mut self) -> (Status, u64) {
        (Status::Ok, 0)
    }
    fn do_run(&mut self, _s: &str, _e: &str, _a: u64, _w: u32, _d: &[u8], _r: &str) -> Status {
        Status::Ok
    }
    fn do_run_shm(&mut self, _s: &str, _e: &str, _a: u64, _w: u32, _d: &[u8], _r: &str) -> Status {
        Status::Ok
    }
    fn set_error_symbol(&mut self, _s: &str) -> Status {
        Status::Ok
    }
    fn set_fixed_read(&mut self, _count: u8, _entries: &[u8]) -> Status {
        Status::Ok
    }
    fn get_cpu_pc(&mut self) -> (Status, u64) {
        (Status::Ok, 0)
    }
    fn jump_cpu_to(&mut self, _addr: u64) -> Status {
        Status::Ok
    }
    fn store_cpu_registers(&mut self) -> Status {
        Status::Ok
    }
    fn restore_cpu_registers(&mut self) -> Status {
        Status::Ok
    }
}

fn make_vp_pipe_and_driver_fds() -> (Pipe, RawFd, RawFd) {
    let mut req = [0i32; 2];
    let mut resp = [0i32; 2];
    unsafe {
        assert_eq!(libc::pipe(req.as_mut_ptr()), 0);
        assert_eq!(libc::pipe(resp.as_mut_ptr()), 0);
    }
    let vp = Pipe::new(req[0], resp[1]);
    (vp, resp[0], req[1])
}

fn write_all(fd: RawFd, buf: &[u8]) {
    let mut buf = buf;
    while !buf.is_empty() {
        let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        assert!(n > 0);
        buf = &buf[n as usize..];
    }
}

fn read_exact(fd: RawFd, buf: &mut [u8]) {
    let mut buf = buf;
    while !buf.is_empty() {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        assert!(n > 0);
        buf = &mut buf[n as usize..];
    }
}

fn send_request(driver_write: RawFd, command: Command, data: &[u8]) {
    let mut header = [0u8; 5];
    header[0] = command.tag();
    vpti::wire::put_u32_be(&mut header, 1, data.len() as u32);
    write_all(driver_write, &header);
    write_all(driver_write, data);
}

fn recv_response(driver_read: RawFd) -> (Status, Vec<u8>) {
    let mut header = [0u8; 5];
    read_exact(driver_read, &mut header);
    let status = Status::from_tag(header[0]).unwrap();
    let len = vpti::wire::get_u32_be(&header, 1) as usize;
    let mut data = vec![0u8; len];
    read_exact(driver_read, &mut data);
    (status, data)
}

#[test]
fn handshake_then_set_breakpoint() {
    let (mut vp_pipe, driver_read, driver_write) = make_vp_pipe_and_driver_fds();
    vp_pipe.start().unwrap();

    let mut ready = [0u8; 6];
    read_exact(driver_read, &mut ready);
    assert_eq!(&ready, b"ready\0");

    let (_producer, consumer) = event_channel::channel();
    let mut dispatcher = Dispatcher::new(
        MockVp {
            killed: None,
            breakpoints: vec![],
        },
        consumer,
        Logger::new(),
    );

    let mut data = vec![4u8];
    data.extend_from_slice(b"main");
    send_request(driver_write, Command::SetBreakpoint, &data);
    run_once(&mut vp_pipe, &mut dispatcher, &Logger::new());

    let (status, resp_data) = recv_response(driver_read);
    assert_eq!(status, Status::Ok);
    assert!(resp_data.is_empty());
    assert_eq!(
        dispatcher.handlers.breakpoints,
        vec![("main".to_string(), 4)]
    );
}

#[test]
fn malformed_kill_does_not_invoke_handler() {
    let (mut vp_pipe, driver_read, driver_write) = make_vp_pipe_and_driver_fds();
    vp_pipe.start().unwrap();
    let mut ready = [0u8; 6];
    read_exact(driver_read, &mut ready);

    let (_producer, consumer) = event_channel::channel();
    let mut dispatcher = Dispatcher::new(
        MockVp {
            killed: None,
            breakpoints: vec![],
        },
        consumer,
        Logger::new(),
    );

    // KILL requires a 1-byte `gracefully` payload; send none.
    send_request(driver_write, Command::Kill, &[]);
    run_once(&mut vp_pipe, &mut dispatcher, &Logger::new());

    let (status, resp_data) = recv_response(driver_read);
    assert_eq!(status, Status::Malformed);
    assert!(resp_data.is_empty());
    assert_eq!(dispatcher.handlers.killed, None);
}

#[test]
fn continue_returns_breakpoint_hit() {
    let (mut vp_pipe, driver_read, driver_write) = make_vp_pipe_and_driver_fds();
    vp_pipe.start().unwrap();
    let mut ready = [0u8; 6];
    read_exact(driver_read, &mut ready);

    let (producer, consumer) = event_channel::channel();
    let mut dispatcher = Dispatcher::new(
        MockVp {
            killed: None,
            breakpoints: vec![],
        },
        consumer,
        Logger::new(),
    );

    let handle = std::thread::spawn(move || {
        producer.notify(Event::breakpoint_hit("foo"));
    });

    send_request(driver_write, Command::Continue, &[]);
    run_once(&mut vp_pipe, &mut dispatcher, &Logger::new());
    handle.join().unwrap();

    let (status, resp_data) = recv_response(driver_read);
    assert_eq!(status, Status::Ok);
    assert_eq!(resp_data[0], 0x03);
    assert_eq!(&resp_data[1..], b"foo\0");
}

#[test]
fn add_to_mmio_read_queue_parses_fields() {
    let (mut vp_pipe, driver_read, driver_write) = make_vp_pipe_and_driver_fds();
    vp_pipe.start().unwrap();
    let mut ready = [0u8; 6];
    read_exact(driver_read, &mut ready);

    let (_producer, consumer) = event_channel::channel();
    let mut dispatcher = Dispatcher::new(
        MockVp {
            killed: None,
            breakpoints: vec![],
        },
        consumer,
        Logger::new(),
    );

    let mut data = vec![0u8; 16];
    vpti::wire::put_u64_be(&mut data, 0, 0x4000_0000);
    vpti::wire::put_u32_be(&mut data, 8, 4);
    vpti::wire::put_u32_be(&mut data, 12, 8);
    data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);

    send_request(driver_write, Command::AddToMmioReadQueue, &data);
    run_once(&mut vp_pipe, &mut dispatcher, &Logger::new());

    let (status, resp_data) = recv_response(driver_read);
    assert_eq!(status, Status::Ok);
    assert!(resp_data.is_empty());
}

#[test]
fn get_code_coverage_shm_too_small_is_error() {
    let (mut vp_pipe, driver_read, driver_write) = make_vp_pipe_and_driver_fds();
    vp_pipe.start().unwrap();
    let mut ready = [0u8; 6];
    read_exact(driver_read, &mut ready);

    let (_producer, consumer) = event_channel::channel();
    let mut dispatcher = Dispatcher::new(
        MockVp {
            killed: None,
            breakpoints: vec![],
        },
        consumer,
        Logger::new(),
    );

    // MAP_SIZE - 1 bytes: one short of what GET_CODE_COVERAGE_SHM needs.
    let shm_id = unsafe {
        libc::shmget(
            libc::IPC_PRIVATE,
            vpti::coverage::MAP_SIZE - 1,
            libc::IPC_CREAT | 0o600,
        )
    };
    assert!(shm_id >= 0);

    let mut data = vec![0u8; 8];
    vpti::wire::put_u32_be(&mut data, 0, shm_id as u32);
    vpti::wire::put_u32_be(&mut data, 4, 0);

    send_request(driver_write, Command::GetCodeCoverageShm, &data);
    run_once(&mut vp_pipe, &mut dispatcher, &Logger::new());

    let (status, _resp_data) = recv_response(driver_read);
    assert_eq!(status, Status::Error);

    unsafe {
        libc::shmctl(shm_id, libc::IPC_RMID, std::ptr::null_mut());
    }
}

//! End-to-end dispatch tests against a fake in-memory `Target`, covering the
//! boundary scenarios around feature negotiation, memory access, vCont
//! resolution, and qXfer windowing.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gdbrsp::{
    BreakpointCookie, BreakpointKind, ContinueMode, DynamicLibraryRecord, FlashProgrammer,
    PlatformRegisterList, RegisterDescriptor, RegisterValue, RegisterValues, SessionError,
    StopReason, StopRecord, Stub, Target, TargetError, ThreadRecord,
};

static REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor {
        index: 0,
        name: "r0",
        size_bits: 32,
    },
    RegisterDescriptor {
        index: 1,
        name: "pc",
        size_bits: 32,
    },
];

static REGISTER_LIST: PlatformRegisterList = PlatformRegisterList {
    registers: REGISTERS,
};

struct FakeTarget {
    memory: Vec<u8>,
    registers: RegisterValues,
    next_cookie: u64,
    breakpoints: HashMap<(BreakpointKind, u64), BreakpointCookie>,
    write_memory_calls: usize,
    cont_calls: Vec<(u32, ContinueMode)>,
    threads: Vec<u32>,
    break_requested: Arc<AtomicBool>,
}

impl FakeTarget {
    fn new() -> Self {
        let mut registers = RegisterValues::new(REGISTERS.len());
        registers.set(0, RegisterValue::from_bytes(&[1, 0, 0, 0]));
        registers.set(1, RegisterValue::from_bytes(&[2, 0, 0, 0]));
        Self {
            memory: vec![0xAA, 0xBB, 0xCC, 0xDD],
            registers,
            next_cookie: 1,
            breakpoints: HashMap::new(),
            write_memory_calls: 0,
            cont_calls: Vec::new(),
            threads: vec![1, 2, 3],
            break_requested: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Target for FakeTarget {
    type Error = String;

    fn register_list(&self) -> &PlatformRegisterList {
        &REGISTER_LIST
    }

    fn last_stop_record(&mut self) -> Result<StopRecord, TargetError<Self::Error>> {
        Ok(StopRecord {
            reason: StopReason::Unspecified,
            pid: None,
            tid: Some(1),
        })
    }

    fn resume_and_wait(&mut self, _tid: u32) -> Result<StopRecord, TargetError<Self::Error>> {
        Ok(StopRecord {
            reason: StopReason::SignalReceived(5),
            pid: None,
            tid: Some(1),
        })
    }

    fn step(&mut self, tid: u32) -> Result<StopRecord, TargetError<Self::Error>> {
        self.resume_and_wait(tid)
    }

    fn break_hook(&self) -> Arc<dyn Fn() + Send + Sync> {
        let flag = Arc::clone(&self.break_requested);
        Arc::new(move || flag.store(true, Ordering::SeqCst))
    }

    fn terminate(&mut self) {}
    fn close_session_safely(&mut self) {}

    fn set_thread_mode_for_next_cont(
        &mut self,
        tid: u32,
        mode: ContinueMode,
        need_restore: &mut bool,
    ) -> Result<(), TargetError<Self::Error>> {
        self.cont_calls.push((tid, mode));
        *need_restore = mode == ContinueMode::SingleStep;
        Ok(())
    }

    fn read_frame_related_registers(
        &mut self,
        _tid: u32,
    ) -> Result<RegisterValues, TargetError<Self::Error>> {
        Ok(self.registers.clone())
    }

    fn read_target_registers(
        &mut self,
        _tid: u32,
    ) -> Result<RegisterValues, TargetError<Self::Error>> {
        Ok(self.registers.clone())
    }

    fn write_target_registers(
        &mut self,
        _tid: u32,
        values: &RegisterValues,
    ) -> Result<(), TargetError<Self::Error>> {
        self.registers = values.clone();
        Ok(())
    }

    fn read_target_memory(
        &mut self,
        address: u64,
        buf: &mut [u8],
    ) -> Result<usize, TargetError<Self::Error>> {
        let start = address as usize;
        if start > self.memory.len() {
            return Err(TargetError::Errno(0x0e));
        }
        let n = buf.len().min(self.memory.len() - start);
        buf[..n].copy_from_slice(&self.memory[start..start + n]);
        Ok(n)
    }

    fn write_target_memory(
        &mut self,
        address: u64,
        data: &[u8],
    ) -> Result<(), TargetError<Self::Error>> {
        self.write_memory_calls += 1;
        let start = address as usize;
        if start + data.len() > self.memory.len() {
            self.memory.resize(start + data.len(), 0);
        }
        self.memory[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_breakpoint(
        &mut self,
        kind: BreakpointKind,
        address: u64,
        _size: u64,
    ) -> Result<BreakpointCookie, TargetError<Self::Error>> {
        let cookie = BreakpointCookie(self.next_cookie);
        self.next_cookie += 1;
        self.breakpoints.insert((kind, address), cookie);
        Ok(cookie)
    }

    fn remove_breakpoint(
        &mut self,
        kind: BreakpointKind,
        address: u64,
        cookie: BreakpointCookie,
    ) -> Result<(), TargetError<Self::Error>> {
        match self.breakpoints.remove(&(kind, address)) {
            Some(original) if original == cookie => Ok(()),
            _ => Err(TargetError::NonFatal),
        }
    }

    fn dynamic_library_list(
        &mut self,
    ) -> Result<Vec<DynamicLibraryRecord>, TargetError<Self::Error>> {
        Ok(Vec::new())
    }

    fn thread_list(&mut self) -> Result<Vec<ThreadRecord>, TargetError<Self::Error>> {
        Ok(self
            .threads
            .iter()
            .map(|&id| ThreadRecord {
                thread_id: id,
                user_friendly_name: format!("thread-{}", id),
            })
            .collect())
    }

    fn flash_programmer(&mut self) -> Option<&mut dyn FlashProgrammer<Self::Error>> {
        Some(self)
    }
}

impl FlashProgrammer<String> for FakeTarget {
    fn embedded_memory_regions(&mut self) -> Result<Vec<(u64, u64)>, TargetError<String>> {
        Ok(vec![(0x0800_0000, 0x10000)])
    }

    fn erase_flash(&mut self, _address: u64, _length: u64) -> Result<(), TargetError<String>> {
        Ok(())
    }

    fn write_flash(&mut self, _address: u64, _data: &[u8]) -> Result<(), TargetError<String>> {
        Ok(())
    }

    fn commit_flash_write(&mut self) -> Result<(), TargetError<String>> {
        Ok(())
    }
}

/// In-memory duplex connection backed by two byte vectors, for exercising
/// `serve_one` without a real socket.
struct FakeConn {
    inbound: io::Cursor<Vec<u8>>,
    outbound: Vec<u8>,
}

impl FakeConn {
    fn new(inbound: Vec<u8>) -> Self {
        Self {
            inbound: io::Cursor::new(inbound),
            outbound: Vec::new(),
        }
    }
}

impl Read for FakeConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inbound.read(buf)
    }
}

impl Write for FakeConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn q_supported_advertises_start_no_ack_mode() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    let reply = stub
        .dispatch(&mut target, b"qSupported:multiprocess+;xmlRegisters=i386")
        .unwrap();
    let reply = String::from_utf8(reply).unwrap();
    assert!(reply.contains("QStartNoAckMode+"));
    assert!(reply.starts_with("PacketSize="));
}

#[test]
fn start_no_ack_mode_disables_ack_bookkeeping() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    let reply = stub.dispatch(&mut target, b"QStartNoAckMode").unwrap();
    assert_eq!(reply, b"OK");
}

#[test]
fn read_memory_returns_hex_encoded_bytes() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    let reply = stub.dispatch(&mut target, b"m0,4").unwrap();
    assert_eq!(reply, b"aabbccdd");
}

#[test]
fn zero_length_binary_write_is_a_probe() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    let reply = stub.dispatch(&mut target, b"X0,0:").unwrap();
    assert_eq!(reply, b"OK");
    assert_eq!(target.write_memory_calls, 0);
}

#[test]
fn vcont_resolves_per_thread_actions_and_replays_restore() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    let reply = stub.dispatch(&mut target, b"vCont;s:1;c:2;t:3").unwrap();
    assert!(reply.starts_with(b"T"));

    assert_eq!(target.cont_calls.len(), 4);
    assert_eq!(target.cont_calls[0], (1, ContinueMode::SingleStep));
    assert_eq!(target.cont_calls[1], (3, ContinueMode::Suspend));
    // thread 2 resolves to the default action (Probe), which is skipped
    assert!(!target.cont_calls.iter().any(|&(tid, _)| tid == 2));
    // restore is replayed only for the thread whose mode asked for it
    assert_eq!(target.cont_calls[2], (1, ContinueMode::Restore));
}

#[test]
fn breakpoint_cookie_is_replayed_on_removal() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    let set = stub.dispatch(&mut target, b"Z0,1000,4").unwrap();
    assert_eq!(set, b"OK");
    let remove = stub.dispatch(&mut target, b"z0,1000,4").unwrap();
    assert_eq!(remove, b"OK");
    assert!(target.breakpoints.is_empty());
}

#[test]
fn breakpoint_with_condition_is_rejected() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    let reply = stub.dispatch(&mut target, b"Z0,1000,4;cond").unwrap();
    assert!(reply.is_empty());
}

#[test]
fn qxfer_threads_window_fits_in_one_reply() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    let reply = stub
        .dispatch(&mut target, b"qXfer:threads:read::0,100")
        .unwrap();
    assert_eq!(reply[0], b'l');
    let doc = std::str::from_utf8(&reply[1..]).unwrap();
    assert!(doc.starts_with("<?xml"));
    assert!(doc.contains("<threads>"));
    assert!(doc.contains("thread-1"));
}

#[test]
fn resume_invalidates_thread_selection() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    stub.dispatch(&mut target, b"Hg1").unwrap();
    stub.dispatch(&mut target, b"c").unwrap();
    // after a resume, register reads fall back to the last reported stop
    // thread rather than the stale Hg selection
    let reply = stub.dispatch(&mut target, b"g").unwrap();
    assert!(!reply.is_empty());
}

#[test]
fn memory_map_reports_flash_regions_once_captured() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    stub.capture_memory_regions(&mut target);

    let reply = stub
        .dispatch(&mut target, b"qXfer:memory-map:read::0,200")
        .unwrap();
    assert_eq!(reply[0], b'l');
    let doc = std::str::from_utf8(&reply[1..]).unwrap();
    assert!(doc.contains("type=\"flash\""));
    assert!(doc.contains("start=\"0x8000000\""));
}

#[test]
fn full_round_trip_through_serve_one() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    let packet = gdbrsp_test_support::encode(b"qC");
    let mut input = vec![b'+'];
    input.extend_from_slice(&packet);
    let mut conn = FakeConn::new(input);

    gdbrsp::serve_one(&mut stub, &mut target, &mut conn).unwrap();
    assert!(conn.outbound.starts_with(b"+$QC"));
}

#[test]
fn corrupted_checksum_is_reported_as_a_frame_error() {
    let mut target = FakeTarget::new();
    let mut stub = Stub::new();
    // "g" with a deliberately wrong two-digit checksum
    let mut conn = FakeConn::new(b"+$g#00".to_vec());

    let err = gdbrsp::serve_one(&mut stub, &mut target, &mut conn).unwrap_err();
    match err {
        SessionError::Frame(_) => {}
        other => panic!("expected a frame error, got {:?}", other),
    }
    // ack mode was enabled, so the mismatch must have been nacked
    assert_eq!(conn.outbound, b"-");
}

mod gdbrsp_test_support {
    /// Re-implements the wire framing just well enough to build test
    /// fixtures without depending on the crate's private `frame` module.
    pub fn encode(body: &[u8]) -> Vec<u8> {
        let checksum = body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        let mut out = Vec::with_capacity(body.len() + 4);
        out.push(b'$');
        out.extend_from_slice(body);
        out.push(b'#');
        out.extend(format!("{:02x}", checksum).into_bytes());
        out
    }
}

//! A minimal `Target` that holds a flat memory buffer and a handful of
//! registers, for exercising the stub without a real debuggee.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use gdbrsp::{
    config::Config, server, BreakpointCookie, BreakpointKind, ContinueMode, PlatformRegisterList,
    RegisterDescriptor, RegisterValue, RegisterValues, StopReason, StopRecord, Target,
    TargetError,
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

struct EchoTarget {
    memory: Vec<u8>,
    registers: RegisterValues,
    break_requested: Arc<AtomicBool>,
    terminated: bool,
}

impl EchoTarget {
    fn new() -> Self {
        let mut registers = RegisterValues::new(REGISTERS.len());
        registers.set(0, RegisterValue::from_bytes(&[0; 4]));
        registers.set(1, RegisterValue::from_bytes(&[0; 4]));
        Self {
            memory: vec![0; 64 * 1024],
            registers,
            break_requested: Arc::new(AtomicBool::new(false)),
            terminated: false,
        }
    }
}

impl Target for EchoTarget {
    type Error = std::convert::Infallible;

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
        // Nothing actually runs; report an immediate stop, or a signal stop
        // if a break-in arrived while "running".
        self.break_requested.store(false, Ordering::SeqCst);
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

    fn terminate(&mut self) {
        self.terminated = true;
    }

    fn close_session_safely(&mut self) {
        self.terminated = true;
    }

    fn set_thread_mode_for_next_cont(
        &mut self,
        _tid: u32,
        _mode: ContinueMode,
        need_restore: &mut bool,
    ) -> Result<(), TargetError<Self::Error>> {
        *need_restore = false;
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
        let end = (start + buf.len()).min(self.memory.len());
        if start >= self.memory.len() {
            return Err(TargetError::Errno(0x0e));
        }
        let n = end - start;
        buf[..n].copy_from_slice(&self.memory[start..end]);
        Ok(n)
    }

    fn write_target_memory(
        &mut self,
        address: u64,
        data: &[u8],
    ) -> Result<(), TargetError<Self::Error>> {
        let start = address as usize;
        let end = start + data.len();
        if end > self.memory.len() {
            return Err(TargetError::Errno(0x0e));
        }
        self.memory[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_breakpoint(
        &mut self,
        _kind: BreakpointKind,
        _address: u64,
        _size: u64,
    ) -> Result<BreakpointCookie, TargetError<Self::Error>> {
        Ok(BreakpointCookie::default())
    }

    fn remove_breakpoint(
        &mut self,
        _kind: BreakpointKind,
        _address: u64,
        _cookie: BreakpointCookie,
    ) -> Result<(), TargetError<Self::Error>> {
        Ok(())
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let config = Config::parse();
    let monitor = server::SessionMonitor::new();
    server::run(&config, &monitor, EchoTarget::new)
}

//! The `Target` capability contract: everything the dispatcher needs from a
//! concrete debuggee driver, expressed as an object-safe trait plus a set of
//! optional capability sub-traits.
//!
//! A target exposes a fixed set of required operations (register/memory
//! access, resume/step, break-in) plus a handful of capabilities it may or
//! may not implement (breakpoints, FLASH programming, remote commands,
//! library/thread introspection). Optional capabilities follow the same
//! shape as the core crate's extension traits: a method returning
//! `Option<&mut dyn Trait>`, so the dispatcher can probe for support without
//! every target having to implement every method.

use std::fmt::Debug;
use std::sync::Arc;

/// A target-specific, non-fatal error code, or a fatal error that aborts the
/// session.
///
/// Mirrors the two-tier error model used throughout this crate: most target
/// calls fail in ways GDB can be told about and continue from (`NonFatal`,
/// `Errno`), but a target may also signal that its internal state is no
/// longer trustworthy (`Fatal`), which unwinds the whole session.
#[non_exhaustive]
pub enum TargetError<E> {
    /// Generic failure, reported to the client as `EREMOTEIO`.
    NonFatal,
    /// An operation-specific errno-style status code.
    Errno(u8),
    /// The command is recognized but this target doesn't implement it.
    NotSupported,
    /// A target-specific fatal error; the session is torn down.
    Fatal(E),
}

impl<E> From<()> for TargetError<E> {
    fn from(_: ()) -> Self {
        TargetError::NonFatal
    }
}

pub type TargetResult<T, Tgt> = Result<T, TargetError<<Tgt as Target>::Error>>;

/// One entry of a target's register layout.
#[derive(Debug, Clone, Copy)]
pub struct RegisterDescriptor {
    pub index: u32,
    pub name: &'static str,
    pub size_bits: u16,
}

impl RegisterDescriptor {
    pub const fn size_bytes(&self) -> usize {
        (self.size_bits as usize + 7) / 8
    }
}

/// The full register layout for a target, supplied at construction time
/// rather than encoded in a compile-time architecture type: the wire-level
/// `g`/`G`/`p`/`P` commands only ever need to walk this list in order.
#[derive(Debug, Clone, Copy)]
pub struct PlatformRegisterList {
    pub registers: &'static [RegisterDescriptor],
}

impl PlatformRegisterList {
    pub fn get(&self, index: u32) -> Option<&RegisterDescriptor> {
        self.registers.iter().find(|r| r.index == index)
    }
}

/// A single register's value, holding up to 64 bytes the way the reference
/// register container does, to accommodate the widest vector registers
/// without per-target generics.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RegisterValue {
    valid: bool,
    len: u8,
    bytes: [u8; 64],
}

impl RegisterValue {
    pub const fn invalid() -> Self {
        Self {
            valid: false,
            len: 0,
            bytes: [0; 64],
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        let len = data.len().min(64);
        let mut bytes = [0u8; 64];
        bytes[..len].copy_from_slice(&data[..len]);
        Self {
            valid: true,
            len: len as u8,
            bytes,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl Debug for RegisterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterValue")
            .field("valid", &self.valid)
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

/// A sparse set of register values, indexed by [`RegisterDescriptor::index`],
/// bounds-checked the way the original container is.
#[derive(Debug, Clone)]
pub struct RegisterValues {
    values: Vec<RegisterValue>,
}

impl RegisterValues {
    pub fn new(count: usize) -> Self {
        Self {
            values: vec![RegisterValue::invalid(); count],
        }
    }

    pub fn get(&self, index: usize) -> Option<&RegisterValue> {
        self.values.get(index)
    }

    pub fn set(&mut self, index: usize, value: RegisterValue) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reason a target stopped, mirroring the reference `TargetStopReason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Unspecified,
    SignalReceived(u8),
    ProcessExited(i32),
    LibraryEvent,
}

#[derive(Debug, Clone, Copy)]
pub struct StopRecord {
    pub reason: StopReason,
    pub pid: Option<u32>,
    pub tid: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DynamicLibraryRecord {
    pub full_path: String,
    pub load_address: u64,
}

#[derive(Debug, Clone)]
pub struct ThreadRecord {
    pub thread_id: u32,
    pub user_friendly_name: String,
}

/// A per-thread continuation request, as produced while splitting a `vCont`
/// action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueMode {
    /// Capability probe: must not mutate target state.
    Probe,
    SingleStep,
    Suspend,
    /// Undo whatever was requested for this thread in the prior round.
    Restore,
}

/// The four breakpoint kinds the wire protocol's `Z`/`z` commands name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    Software,
    Hardware,
    WriteWatch,
    ReadWatch,
    AccessWatch,
}

/// Opaque token a target may attach to a set breakpoint, handed back
/// unchanged on removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreakpointCookie(pub u64);

/// Optional FLASH-programming capability.
pub trait FlashProgrammer<E> {
    fn embedded_memory_regions(&mut self) -> Result<Vec<(u64, u64)>, TargetError<E>>;
    fn erase_flash(&mut self, address: u64, length: u64) -> Result<(), TargetError<E>>;
    fn write_flash(&mut self, address: u64, data: &[u8]) -> Result<(), TargetError<E>>;
    fn commit_flash_write(&mut self) -> Result<(), TargetError<E>>;
}

/// Optional remote-command capability (GDB's `monitor`/`qRcmd`).
pub trait RemoteCommand<E> {
    fn execute_remote_command(&mut self, cmd: &[u8]) -> Result<Vec<u8>, TargetError<E>>;
}

/// Everything the dispatcher needs from a debuggee driver.
///
/// Every method here is required; methods that a target legitimately cannot
/// support should return `Err(TargetError::NotSupported)`, which the
/// dispatcher turns into the empty "unsupported" wire response rather than
/// `Enn`. Optional, larger capabilities (FLASH, remote commands) are exposed
/// through the `*_capability` accessors instead, following the same
/// `Option<&mut dyn Trait>` shape used for protocol extensions elsewhere in
/// this crate: return `None` when the target doesn't implement them.
pub trait Target {
    /// A target-specific fatal error; propagating one of these tears down
    /// the whole session.
    type Error: Debug;

    fn register_list(&self) -> &PlatformRegisterList;

    fn last_stop_record(&mut self) -> Result<StopRecord, TargetError<Self::Error>>;

    fn resume_and_wait(&mut self, tid: u32) -> Result<StopRecord, TargetError<Self::Error>>;
    fn step(&mut self, tid: u32) -> Result<StopRecord, TargetError<Self::Error>>;

    /// Produce a handle the break-in watcher thread can call at any time,
    /// including concurrently with `resume_and_wait`/`step` running on the
    /// dispatcher thread. Implementations are expected to capture their own
    /// interior synchronization (an atomic flag, a channel) here rather than
    /// relying on the dispatcher's exclusive access to `self` — the returned
    /// closure outlives any particular borrow of the target and carries no
    /// reference to it.
    fn break_hook(&self) -> Arc<dyn Fn() + Send + Sync>;

    fn terminate(&mut self);
    fn close_session_safely(&mut self);

    /// Probe or set the continuation mode for one thread ahead of the next
    /// resume. `Probe` must be a pure capability check: it must not mutate
    /// state, and `need_restore` reports whether a later `Restore` call
    /// would be meaningful for this thread.
    fn set_thread_mode_for_next_cont(
        &mut self,
        tid: u32,
        mode: ContinueMode,
        need_restore: &mut bool,
    ) -> Result<(), TargetError<Self::Error>>;

    fn read_frame_related_registers(
        &mut self,
        tid: u32,
    ) -> Result<RegisterValues, TargetError<Self::Error>>;
    fn read_target_registers(
        &mut self,
        tid: u32,
    ) -> Result<RegisterValues, TargetError<Self::Error>>;
    fn write_target_registers(
        &mut self,
        tid: u32,
        values: &RegisterValues,
    ) -> Result<(), TargetError<Self::Error>>;

    fn read_target_memory(
        &mut self,
        address: u64,
        buf: &mut [u8],
    ) -> Result<usize, TargetError<Self::Error>>;
    fn write_target_memory(
        &mut self,
        address: u64,
        data: &[u8],
    ) -> Result<(), TargetError<Self::Error>>;

    fn create_breakpoint(
        &mut self,
        kind: BreakpointKind,
        address: u64,
        size: u64,
    ) -> Result<BreakpointCookie, TargetError<Self::Error>>;
    fn remove_breakpoint(
        &mut self,
        kind: BreakpointKind,
        address: u64,
        cookie: BreakpointCookie,
    ) -> Result<(), TargetError<Self::Error>>;

    fn dynamic_library_list(
        &mut self,
    ) -> Result<Vec<DynamicLibraryRecord>, TargetError<Self::Error>> {
        Err(TargetError::NotSupported)
    }
    fn thread_list(&mut self) -> Result<Vec<ThreadRecord>, TargetError<Self::Error>> {
        Err(TargetError::NotSupported)
    }

    fn flash_programmer(&mut self) -> Option<&mut dyn FlashProgrammer<Self::Error>> {
        None
    }
    fn remote_command(&mut self) -> Option<&mut dyn RemoteCommand<Self::Error>> {
        None
    }

    /// Called once per protocol error the dispatcher recovers from, mostly
    /// so a target can surface diagnostics to a user interface. The default
    /// is a no-op; the dispatcher already logs independently.
    fn on_protocol_error(&mut self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_descriptor_size_rounds_up() {
        let r = RegisterDescriptor {
            index: 0,
            name: "r0",
            size_bits: 12,
        };
        assert_eq!(r.size_bytes(), 2);
    }

    #[test]
    fn register_values_bounds_checked_get() {
        let mut values = RegisterValues::new(2);
        values.set(0, RegisterValue::from_bytes(&[1, 2, 3, 4]));
        assert!(values.get(0).unwrap().is_valid());
        assert!(!values.get(1).unwrap().is_valid());
        assert!(values.get(2).is_none());
    }

    #[test]
    fn register_value_truncates_to_64_bytes() {
        let data = [0xAAu8; 100];
        let v = RegisterValue::from_bytes(&data);
        assert_eq!(v.as_bytes().len(), 64);
    }
}

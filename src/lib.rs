//! A GDB Remote Serial Protocol (RSP) debug server.
//!
//! Speaks the wire protocol GDB (and compatible clients) use to control a
//! remote debuggee: framing, escaping, run-length encoding, acknowledgment,
//! command dispatch, and the asynchronous break-in (Ctrl-C) side channel.
//! The actual debuggee is supplied by the caller through the [`Target`]
//! trait; this crate owns everything above that boundary.
//!
//! ## Features
//!
//! - `trace-pkt`: trace raw packet bytes (in both directions) via `log`.
//!   Off by default cost: building the human-readable form on every packet.
//! - `cli`: pulls in `clap` for [`config::Config`]'s derive, used by the
//!   `echo-target` example binary.

mod breakchannel;
mod crc32;
mod error;
mod frame;
mod hex;
mod stub;
mod xml;

pub mod config;
pub mod server;
pub mod target;

pub use breakchannel::{BreakChannel, PeekableConn};
pub use error::{DispatchError, FrameError, SessionError};
pub use server::SessionMonitor;
pub use stub::{serve_one, Stub};
pub use target::{
    BreakpointCookie, BreakpointKind, ContinueMode, DynamicLibraryRecord, FlashProgrammer,
    PlatformRegisterList, RegisterDescriptor, RegisterValue, RegisterValues, RemoteCommand,
    StopReason, StopRecord, Target, TargetError, ThreadRecord,
};

//! Dispatcher: owns per-session state, splits incoming packet bodies into
//! command + arguments, and routes each to its handler in [`commands`].

pub mod commands;
pub mod qxfer;
pub mod session;
pub mod stop;
pub mod vcont;

use log::{debug, info};
#[cfg(feature = "trace-pkt")]
use log::trace;
use log::warn;

use crate::error::SessionError;
use crate::frame::{encode_packet, receive_packet, FrameError, Packet};
use crate::stub::session::{FeatureValue, MemoryRegion, SessionState};
use crate::target::Target;

/// Feature flags this stub advertises in its `qSupported` reply.
fn default_stub_features() -> Vec<(&'static str, FeatureValue)> {
    vec![
        ("qXfer:libraries:read", FeatureValue::Supported),
        ("qXfer:threads:read", FeatureValue::Supported),
        ("qXfer:memory-map:read", FeatureValue::Supported),
        ("QStartNoAckMode", FeatureValue::Supported),
    ]
}

/// Drives one GDB connection's worth of packet-level dispatch. Holds no
/// reference to the connection or the target; both are threaded through
/// explicitly so the caller retains control over I/O and break-in handling.
pub struct Stub {
    state: SessionState,
}

impl Stub {
    pub fn new() -> Self {
        let mut state = SessionState::new();
        state.stub_features = default_stub_features();
        Self { state }
    }

    /// Split `body` into `cmd` and `args` at the first byte in
    /// `{';', ':', ','}`.
    fn split_packet(body: &[u8]) -> (&[u8], &[u8]) {
        match body.iter().position(|&b| matches!(b, b';' | b':' | b',')) {
            Some(i) => (&body[..i], &body[i..]),
            None => (body, &[]),
        }
    }

    /// Capture the target's FLASH layout once, for `qXfer:memory-map:read`.
    /// A no-op if the target has no flash programmer, or if reading its
    /// regions fails; `state.memory_regions` then stays empty and
    /// `memory-map` reports no regions rather than erroring the connection.
    pub fn capture_memory_regions<T: Target>(&mut self, target: &mut T) {
        let flash = match target.flash_programmer() {
            Some(flash) => flash,
            None => return,
        };
        if let Ok(regions) = flash.embedded_memory_regions() {
            self.state.memory_regions = regions
                .into_iter()
                .map(|(start, length)| MemoryRegion {
                    kind: "flash",
                    start,
                    length,
                    erase_block_size: 0,
                })
                .collect();
        }
    }

    fn known_thread_ids(&self) -> Vec<u32> {
        if self.state.thread_info_cache.valid {
            self.state
                .thread_info_cache
                .threads
                .iter()
                .map(|(tid, _)| *tid)
                .collect()
        } else {
            vec![self.state.effective_cont_thread()]
        }
    }

    /// Dispatch one already-unescaped packet body, returning its reply body
    /// (unframed). Propagates `TargetError::Fatal` as a session-ending
    /// error.
    pub fn dispatch<T: Target>(&mut self, target: &mut T, body: &[u8]) -> Result<Vec<u8>, T::Error> {
        #[cfg(feature = "trace-pkt")]
        trace!("dispatch: {:?}", String::from_utf8_lossy(body));
        let (cmd, rest) = Self::split_packet(body);
        // `rest` still carries its splitter byte (';', ':', or ',');
        // handlers that need it strip it themselves via `args`.
        let args: &[u8] = if rest.is_empty() { rest } else { &rest[1..] };

        let reply = match cmd {
            b"qSupported" => commands::q_supported(&mut self.state, args),
            b"QStartNoAckMode" => commands::start_no_ack_mode(&mut self.state),
            b"?" => commands::query_stop_reason(&mut self.state, target)?,
            b"H" => commands::set_thread(&mut self.state, args),
            b"g" => commands::read_all_registers(&self.state, target)?,
            b"G" => commands::write_all_registers(&self.state, target, args)?,
            b"P" => commands::write_one_register(&self.state, target, args)?,
            b"m" => commands::read_memory(target, args)?,
            b"M" => commands::write_memory(target, args)?,
            b"X" => commands::write_memory_binary(target, args)?,
            b"c" => commands::resume(&mut self.state, target)?,
            b"s" => commands::step(&mut self.state, target)?,
            b"vCont?" => commands::vcont_probe(),
            b"vCont" => {
                let known = self.known_thread_ids();
                commands::vcont(&mut self.state, target, body, &known)?
            }
            b"k" => commands::kill(target),
            b"Z" => commands::set_breakpoint(&mut self.state, target, args)?,
            b"z" => commands::remove_breakpoint(&mut self.state, target, args)?,
            b"qCRC" => commands::qcrc(target, args)?,
            b"qRcmd" => commands::qrcmd(target, args)?,
            b"vFlashErase" => commands::vflash_erase(target, args)?,
            b"vFlashWrite" => commands::vflash_write(target, args)?,
            b"vFlashDone" => commands::vflash_done(target)?,
            b"qfThreadInfo" => commands::q_first_thread_info(&mut self.state, target)?,
            b"qsThreadInfo" => commands::q_subsequent_thread_info(&mut self.state),
            b"qThreadExtraInfo" => commands::q_thread_extra_info(&self.state, args),
            b"T" => commands::thread_alive(&self.state, args),
            b"qC" => commands::q_current_thread(&self.state),
            b"qXfer" => commands::qxfer_request(target, &self.state, args)?,
            _ => {
                debug!("unrecognized command: {:?}", String::from_utf8_lossy(cmd));
                Vec::new()
            }
        };
        Ok(reply)
    }
}

impl Default for Stub {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive and dispatch one packet on `conn`, writing the encoded reply
/// back. Propagates `SessionError::Eof` when the connection closed (or went
/// unreadable) while waiting for a packet; the caller must treat that as
/// session-ending, same as `SessionError::Io`.
pub fn serve_one<T: Target, C: std::io::Read + std::io::Write>(
    stub: &mut Stub,
    target: &mut T,
    conn: &mut C,
) -> Result<(), SessionError<T::Error>> {
    let body = match receive_packet(conn, stub.state.ack_enabled) {
        Ok(Packet::Command(body)) => body,
        Ok(Packet::Interrupt) => {
            (target.break_hook())();
            return Ok(());
        }
        Err(FrameError::UnexpectedEof) => {
            info!("connection closed while waiting for a packet");
            return Err(SessionError::Eof);
        }
        Err(e) => {
            warn!("protocol error: {}", e);
            target.on_protocol_error(&e.to_string());
            return Err(e.into());
        }
    };

    let reply = match stub.dispatch(target, &body) {
        Ok(reply) => reply,
        Err(e) => return Err(SessionError::Target(e)),
    };

    let wire = encode_packet(&reply);
    conn.write_all(&wire)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_packet_finds_first_splitter() {
        assert_eq!(Stub::split_packet(b"m1000,4"), (&b"m"[..], &b",4"[..]));
        assert_eq!(Stub::split_packet(b"qSupported:f1;f2"), (&b"qSupported"[..], &b":f1;f2"[..]));
        assert_eq!(Stub::split_packet(b"qC"), (&b"qC"[..], &b""[..]));
    }

}

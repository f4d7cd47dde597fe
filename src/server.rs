//! TCP accept loop: one session at a time, each session driven by its own
//! [`BreakChannel`] + [`Stub`].

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{error, info, warn};

use crate::breakchannel::{BreakChannel, ExclusiveReader, PeekableConn};
use crate::config::Config;
use crate::error::SessionError;
use crate::stub::{serve_one, Stub};
use crate::target::Target;

struct ActiveSession {
    break_hook: Arc<dyn Fn() + Send + Sync>,
    shutdown: Arc<AtomicBool>,
}

/// Enforces a single active session and forwards process-wide interrupts to
/// it: a Ctrl-C-style interrupt reaches the target's break hook, a stronger
/// shutdown signal (e.g. Ctrl-Break) asks the owning connection thread to
/// call [`Target::close_session_safely`] at its next packet boundary.
#[derive(Default)]
pub struct SessionMonitor {
    active: Mutex<Option<ActiveSession>>,
}

impl SessionMonitor {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    fn try_register(&self, break_hook: Arc<dyn Fn() + Send + Sync>) -> Option<Arc<AtomicBool>> {
        let mut slot = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_some() {
            return None;
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        *slot = Some(ActiveSession {
            break_hook,
            shutdown: Arc::clone(&shutdown),
        });
        Some(shutdown)
    }

    fn unregister(&self) {
        let mut slot = self.active.lock().unwrap_or_else(|p| p.into_inner());
        *slot = None;
    }

    /// Forward a Ctrl-C-style interrupt to the active session, if any.
    pub fn forward_interrupt(&self) {
        let slot = self.active.lock().unwrap_or_else(|p| p.into_inner());
        match slot.as_ref() {
            Some(session) => (session.break_hook)(),
            None => warn!("interrupt received with no active session"),
        }
    }

    /// Request the active session close down safely at its next packet
    /// boundary. Also pokes the break hook so a session blocked inside a
    /// long-running resume notices promptly.
    pub fn request_shutdown(&self) {
        let slot = self.active.lock().unwrap_or_else(|p| p.into_inner());
        match slot.as_ref() {
            Some(session) => {
                session.shutdown.store(true, Ordering::SeqCst);
                (session.break_hook)();
            }
            None => warn!("shutdown requested with no active session"),
        }
    }
}

/// Adapts a [`BreakChannel`]'s split read/write paths to a single
/// `Read + Write` connection, the shape [`crate::frame::receive_packet`]
/// and [`serve_one`] expect.
struct ChannelIo<'a, C: PeekableConn> {
    reader: ExclusiveReader<'a, C>,
    channel: &'a BreakChannel<C>,
}

impl<'a, C: PeekableConn> Read for ChannelIo<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<'a, C: PeekableConn> Write for ChannelIo<'a, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.channel.send_all(buf)?;
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run the accept loop, handing each connection to `make_target` for a
/// fresh [`Target`] instance. Blocks forever (or until the listener errors).
pub fn run<T: Target>(
    config: &Config,
    monitor: &SessionMonitor,
    make_target: impl Fn() -> T,
) -> io::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)?;
    info!("listening on {}", config.bind_addr);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("accept failed: {}", e);
                continue;
            }
        };
        stream.set_nodelay(true)?;
        handle_connection(monitor, stream, &make_target);
    }
    Ok(())
}

fn handle_connection<T: Target>(
    monitor: &SessionMonitor,
    stream: TcpStream,
    make_target: &impl Fn() -> T,
) {
    let mut target = make_target();
    let shutdown = match monitor.try_register(target.break_hook()) {
        Some(flag) => flag,
        None => {
            warn!("rejecting connection: a session is already active");
            return;
        }
    };

    let break_hook = target.break_hook();
    let channel = match BreakChannel::new(stream, move || break_hook()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to start break watcher: {}", e);
            monitor.unregister();
            return;
        }
    };

    let mut stub = Stub::new();
    stub.capture_memory_regions(&mut target);
    loop {
        let mut conn = ChannelIo {
            reader: channel.lock_reader(),
            channel: &channel,
        };
        match serve_one(&mut stub, &mut target, &mut conn) {
            Ok(()) => {}
            Err(SessionError::Io(e)) => {
                info!("connection closed: {}", e);
                break;
            }
            Err(SessionError::Eof) => {
                info!("connection closed");
                break;
            }
            Err(SessionError::Frame(e)) => {
                warn!("protocol error: {}", e);
            }
            Err(SessionError::Target(e)) => {
                error!("fatal target error: {:?}", e);
                break;
            }
        }
        if shutdown.load(Ordering::SeqCst) {
            info!("shutdown requested, closing session");
            break;
        }
    }

    target.close_session_safely();
    monitor.unregister();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_registration_is_rejected_until_first_unregisters() {
        let monitor = SessionMonitor::new();
        let a = monitor.try_register(Arc::new(|| {}));
        assert!(a.is_some());
        let b = monitor.try_register(Arc::new(|| {}));
        assert!(b.is_none());
        monitor.unregister();
        let c = monitor.try_register(Arc::new(|| {}));
        assert!(c.is_some());
    }
}

//! Asynchronous break-in detection on top of a single TCP connection.
//!
//! A connection is used by two parties at once: the dispatcher, which reads
//! and processes packets sequentially, and a background watcher thread,
//! which peeks at the next incoming byte so it can react to an async `0x03`
//! break-in request while the dispatcher is blocked inside a long-running
//! target call (`c`, `s`, ...).
//!
//! The two are kept from stepping on each other with a mutex that hands out
//! an exclusive read token ([`ExclusiveReader`]): the watcher holds the lock
//! while it peeks, and backs off onto a condvar as soon as it sees something
//! other than `0x03` sitting in the buffer, letting the dispatcher grab the
//! token and read the real packet. Writes go over an independently locked
//! clone of the connection, since the reference server never gates replies
//! on the read-side lock.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

/// The literal byte that requests an asynchronous stop.
pub const BREAK_IN_BYTE: u8 = crate::frame::BREAK_IN_BYTE;

/// A duplex connection that can non-destructively peek at its next unread
/// byte, and can be cheaply duplicated into an independent handle onto the
/// same underlying socket.
pub trait PeekableConn: Read + Write + Send + Sized + 'static {
    /// Block until at least one byte is available and return it without
    /// consuming it from the stream.
    fn peek_byte(&self) -> io::Result<u8>;

    /// Produce a second handle onto the same connection, for use as an
    /// independent write path.
    fn try_clone(&self) -> io::Result<Self>;
}

impl PeekableConn for std::net::TcpStream {
    fn peek_byte(&self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.peek(&mut buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    ))
                }
                Ok(_) => return Ok(buf[0]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn try_clone(&self) -> io::Result<Self> {
        std::net::TcpStream::try_clone(self)
    }
}

struct Shared<C> {
    conn: Mutex<C>,
    reader_released: Condvar,
    terminating: AtomicBool,
}

/// Owns the read side of a connection plus its watcher thread.
pub struct BreakChannel<C: PeekableConn> {
    shared: Arc<Shared<C>>,
    writer: Mutex<C>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<C: PeekableConn> BreakChannel<C> {
    /// Spawn the watcher thread over `conn`. `on_break` is invoked from the
    /// watcher thread itself whenever a `0x03` byte is seen; it must be
    /// cheap and non-blocking (typically: set a flag / forward to the
    /// target's own break-in signal).
    pub fn new(conn: C, on_break: impl Fn() + Send + Sync + 'static) -> io::Result<Self> {
        let writer = conn.try_clone()?;
        let shared = Arc::new(Shared {
            conn: Mutex::new(conn),
            reader_released: Condvar::new(),
            terminating: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || watch(worker_shared, on_break));

        Ok(Self {
            shared,
            writer: Mutex::new(writer),
            worker: Some(worker),
        })
    }

    /// Acquire exclusive read access to the connection. The watcher is
    /// blocked from peeking for as long as the guard is held; drop it as
    /// soon as the packet bytes are in hand so the watcher resumes
    /// monitoring for break-ins while the packet is dispatched.
    pub fn lock_reader(&self) -> ExclusiveReader<'_, C> {
        let guard = self
            .shared
            .conn
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        ExclusiveReader {
            guard: Some(guard),
            shared: &self.shared,
        }
    }

    /// Send a reply. Independent of the read-side lock, matching the
    /// reference server's fire-and-forget write path.
    pub fn send_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut w = self
            .writer
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        w.write_all(buf)
    }
}

impl<C: PeekableConn> Drop for BreakChannel<C> {
    fn drop(&mut self) {
        self.shared.terminating.store(true, Ordering::SeqCst);
        self.shared.reader_released.notify_all();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// RAII token granting exclusive access to the connection's read side.
pub struct ExclusiveReader<'a, C: PeekableConn> {
    guard: Option<MutexGuard<'a, C>>,
    shared: &'a Shared<C>,
}

impl<'a, C: PeekableConn> std::ops::Deref for ExclusiveReader<'a, C> {
    type Target = C;
    fn deref(&self) -> &C {
        self.guard.as_ref().expect("guard taken before drop")
    }
}

impl<'a, C: PeekableConn> std::ops::DerefMut for ExclusiveReader<'a, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.guard.as_mut().expect("guard taken before drop")
    }
}

impl<'a, C: PeekableConn> Drop for ExclusiveReader<'a, C> {
    fn drop(&mut self) {
        self.guard.take();
        self.shared.reader_released.notify_one();
    }
}

fn watch<C: PeekableConn>(shared: Arc<Shared<C>>, on_break: impl Fn() + Send + Sync + 'static) {
    let mut guard = match shared.conn.lock() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    };

    while !shared.terminating.load(Ordering::SeqCst) {
        match guard.peek_byte() {
            Ok(BREAK_IN_BYTE) => {
                let mut discard = [0u8; 1];
                if guard.read_exact(&mut discard).is_err() {
                    return;
                }
                on_break();
            }
            Ok(_) => {
                guard = match shared.reader_released.wait(guard) {
                    Ok(g) => g,
                    Err(poison) => poison.into_inner(),
                };
            }
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    fn spawn_loopback() -> (std::net::TcpStream, std::net::TcpStream) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn break_in_byte_invokes_hook_without_blocking_writes() {
        let (mut client, server) = spawn_loopback();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);

        let channel = BreakChannel::new(server, move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        client.write_all(&[BREAK_IN_BYTE]).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while hits.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        channel.send_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn real_packet_byte_is_left_for_the_reader() {
        let (mut client, server) = spawn_loopback();
        let channel = BreakChannel::new(server, || {}).unwrap();

        client.write_all(b"$g#67").unwrap();
        thread::sleep(Duration::from_millis(50));

        let mut reader = channel.lock_reader();
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"$g#67");

        let (tx, rx) = mpsc::channel();
        drop(reader);
        tx.send(()).unwrap();
        rx.recv().unwrap();
    }
}

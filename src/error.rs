//! Crate-wide error types, one per error plane described by the protocol
//! design (transport, protocol/framing, command dispatch).

use core::fmt::{self, Debug, Display};

/// Errors arising while parsing the framed wire encoding (escape/RLE/
/// checksum). These correspond to the "protocol errors" plane: recoverable
/// by resynchronizing to the next `$`, but fatal after repeated failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The byte immediately preceding `$` was not `+` while ack mode was
    /// enabled.
    MissingAck,
    /// An escape byte (`}`) appeared with no following byte.
    DanglingEscape,
    /// A run-length byte (`*`) appeared with no preceding byte to repeat, or
    /// with no following count byte.
    MalformedRunLength,
    /// The run-length count fell outside the printable `[29, 126]` range.
    RunLengthOutOfRange,
    /// `#` was reached without two following checksum hex digits.
    MissingChecksum,
    /// The two checksum hex digits didn't parse.
    MalformedChecksum,
    /// Computed checksum didn't match the one on the wire.
    ChecksumMismatch { expected: u8, computed: u8 },
    /// Packet body exceeded the configured packet buffer size.
    PacketTooLarge,
    /// The connection was closed (EOF) partway through a packet.
    UnexpectedEof,
}

impl Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::MissingAck => write!(f, "expected '+' before '$'"),
            FrameError::DanglingEscape => write!(f, "escape byte '}}' at end of packet body"),
            FrameError::MalformedRunLength => write!(f, "malformed run-length sequence"),
            FrameError::RunLengthOutOfRange => write!(f, "run-length count out of printable range"),
            FrameError::MissingChecksum => write!(f, "packet truncated before checksum"),
            FrameError::MalformedChecksum => write!(f, "checksum is not two hex digits"),
            FrameError::ChecksumMismatch { expected, computed } => write!(
                f,
                "checksum mismatch: wire={:02x} computed={:02x}",
                expected, computed
            ),
            FrameError::PacketTooLarge => write!(f, "packet body exceeds buffer capacity"),
            FrameError::UnexpectedEof => write!(f, "connection closed mid-packet"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

/// Errno-style command error, translated into the wire's `Enn` response.
///
/// `nn` is the value `& 0xFF`; `0` is reserved for success (and is never
/// constructed as a `DispatchError`), `NOT_SUPPORTED` maps onto an empty
/// response rather than a literal `Enn` (dispatcher-recognized unsupported).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// Generic failure reported by the target, carrying its status code.
    Status(u8),
    /// No thread matches the requested id.
    NoSuchThread,
    /// The target is out of memory / the operation would exceed a bound.
    NoMemory,
    /// Address range cannot be accessed (e.g: read/write faulted).
    Fault,
    /// The command is recognized but not implemented by this target.
    NotSupported,
    /// Well-formed command carried a nonsensical argument.
    InvalidArgument,
}

impl DispatchError {
    /// `nn` in the `Enn` wire response, or `None` if this error is better
    /// expressed as the empty "unsupported" response.
    pub fn errno(self) -> Option<u8> {
        match self {
            DispatchError::Status(code) => Some(code),
            DispatchError::NoSuchThread => Some(0x01),
            DispatchError::NoMemory => Some(0x0c),
            DispatchError::Fault => Some(0x0e),
            DispatchError::InvalidArgument => Some(0x16),
            DispatchError::NotSupported => None,
        }
    }
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Status(n) => write!(f, "target returned status {}", n),
            DispatchError::NoSuchThread => write!(f, "no such thread"),
            DispatchError::NoMemory => write!(f, "out of memory"),
            DispatchError::Fault => write!(f, "memory access fault"),
            DispatchError::NotSupported => write!(f, "not supported"),
            DispatchError::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DispatchError {}

/// Top-level error returned by [`crate::stub::Stub::serve_one`] and
/// [`crate::server::Server::run`].
#[derive(Debug)]
pub enum SessionError<T> {
    /// I/O error on the underlying connection.
    Io(std::io::Error),
    /// The connection was closed (or went unreadable) while waiting for a
    /// packet. Always session-ending, same as `Io`.
    Eof,
    /// The wire encoding was malformed beyond recovery, but the connection
    /// itself is still alive; recoverable by resynchronizing to the next
    /// packet.
    Frame(FrameError),
    /// The target returned a fatal (non-recoverable) error.
    Target(T),
}

impl<T: Debug> Display for SessionError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "I/O error: {}", e),
            SessionError::Eof => write!(f, "connection closed"),
            SessionError::Frame(e) => write!(f, "protocol error: {}", e),
            SessionError::Target(e) => write!(f, "target error: {:?}", e),
        }
    }
}

impl<T: Debug> std::error::Error for SessionError<T> {}

impl<T> From<std::io::Error> for SessionError<T> {
    fn from(e: std::io::Error) -> Self {
        SessionError::Io(e)
    }
}

impl<T> From<FrameError> for SessionError<T> {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::UnexpectedEof => SessionError::Eof,
            other => SessionError::Frame(other),
        }
    }
}

//! Error taxonomy for the link and application layers.

use thiserror::Error;

/// A framing-level failure surfaced by [`crate::frame::FrameDecoder`].
///
/// These are always recovered locally by the engine (a REJ is sent, or the
/// sender's retransmission handles it) rather than returned to the
/// application layer directly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("BCC2 mismatch: payload checksum {expected:#04x} != received {actual:#04x}")]
    Bcc2Mismatch { expected: u8, actual: u8 },
    #[error("frame truncated: no byte followed an escape")]
    TruncatedEscape,
    #[error("frame closed with no payload to reinterpret as BCC2")]
    EmptyPayload,
}

/// Top-level error type for every public operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open serial port {device:?} at {baud} baud: {source}")]
    PortOpenFailed {
        device: String,
        baud: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("baud rate {0} is not one of the supported POSIX rates")]
    InvalidBaudRate(u32),

    #[error("connect handshake timed out after {0} attempt(s)")]
    ConnectTimeout(u32),

    #[error("write unacknowledged after {0} attempt(s)")]
    WriteTimeout(u32),

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("reject received for outstanding frame")]
    RejectReceived,

    #[error("peer disconnected")]
    PeerDisconnected,

    #[error("disconnect handshake timed out")]
    CloseTimeout,

    #[error("payload of {len} bytes exceeds the maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("malformed application packet: {0}")]
    MalformedPacket(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

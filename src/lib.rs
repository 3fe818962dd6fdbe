//! A connection-oriented, stop-and-wait data-link protocol for point-to-point
//! file transfer over an asynchronous serial line.
//!
//! The wire format is byte-stuffed and checksummed with a pair of XOR
//! checksums (`BCC1` over the header, `BCC2` over the payload), sequenced
//! with a single alternating bit, and driven by a small supervisory state
//! machine that also governs the SET/UA connect handshake and the DISC/UA
//! disconnect handshake. See [`engine::LinkLayer`] for the entry point.
//!
//! ```no_run
//! use rdlp_rs::config::{ConnectionConfig, Role};
//! use rdlp_rs::engine::LinkLayer;
//!
//! # fn main() -> Result<(), rdlp_rs::error::Error> {
//! let config = ConnectionConfig::new("/dev/ttyS0", Role::Sender)
//!     .with_baud(9600)
//!     .with_timeout(std::time::Duration::from_secs(3))
//!     .with_max_retransmissions(3);
//!
//! let mut link = LinkLayer::open(config)?;
//! link.write(b"Hello, World!")?;
//! link.close(true)?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod frame;
pub mod packet;
pub mod port;

pub use config::{ConnectionConfig, Role};
pub use engine::{LinkLayer, Stats};
pub use error::{Error, FrameError, Result};

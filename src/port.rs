//! Serial port adapter.
//!
//! Mirrors the teacher's `Interface` trait (`src/interface.rs`): a small
//! trait the engine is generic over, so the real OS-backed implementation
//! and an in-memory loopback used by tests are interchangeable.

use std::io::{self, Read, Write};
use std::time::Duration;

use log::debug;

use crate::control::VALID_BAUD_RATES;
use crate::error::Error;

/// The character timeout the real adapter configures on its underlying
/// driver. A read either completes within this window or returns `None`;
/// it never blocks indefinitely, so the engine can keep checking its
/// [`crate::clock::Deadline`] between reads.
pub const CHARACTER_TIMEOUT: Duration = Duration::from_millis(100);

/// Byte-level I/O against the serial line. The engine owns one of these
/// exclusively for the lifetime of a connection.
pub trait SerialPort {
    /// Block for up to the adapter's character timeout. `Ok(None)` means
    /// the timeout elapsed with no byte available.
    fn read_byte(&mut self) -> Result<Option<u8>, Error>;

    /// Write every byte of `bytes`, returning the count written.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize, Error>;

    /// Release the underlying device. Idempotent.
    fn close(&mut self) -> Result<(), Error>;
}

fn validate_baud(baud: u32) -> Result<(), Error> {
    if VALID_BAUD_RATES.contains(&baud) {
        Ok(())
    } else {
        Err(Error::InvalidBaudRate(baud))
    }
}

/// The production adapter, backed by a real OS serial driver via the
/// `serialport` crate: 8 data bits, no parity, 1 stop bit, no flow control,
/// opened with [`CHARACTER_TIMEOUT`] as its read timeout.
pub struct SystemSerialPort {
    device: String,
    inner: Box<dyn serialport::SerialPort>,
}

impl SystemSerialPort {
    pub fn open(device: &str, baud: u32) -> Result<Self, Error> {
        validate_baud(baud)?;
        let inner = serialport::new(device, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(CHARACTER_TIMEOUT)
            .open()
            .map_err(|e| Error::PortOpenFailed {
                device: device.to_string(),
                baud,
                source: io::Error::new(io::ErrorKind::Other, e),
            })?;
        debug!("opened serial port {device} at {baud} baud");
        Ok(SystemSerialPort {
            device: device.to_string(),
            inner,
        })
    }
}

impl SerialPort for SystemSerialPort {
    fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        self.inner.write_all(bytes)?;
        Ok(bytes.len())
    }

    fn close(&mut self) -> Result<(), Error> {
        debug!("closed serial port {}", self.device);
        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod loopback {
    //! An in-memory null-modem pair for integration tests that drive both
    //! peers concurrently on real OS threads (the only way to exercise a
    //! genuinely two-sided blocking handshake without reimplementing the
    //! engine's loop). Each end polls its inbound queue with a short real
    //! sleep when empty, mirroring a real adapter's character timeout, so
    //! timeouts here are real (short) wall-clock durations rather than a
    //! fake clock — tests using this type should keep per-attempt timeouts
    //! in the tens-of-milliseconds range to stay fast.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use super::*;

    const POLL_INTERVAL: Duration = Duration::from_millis(1);

    #[derive(Default)]
    struct Channel {
        bytes: VecDeque<u8>,
    }

    /// One end of a loopback pair. Reading drains the channel written to by
    /// the other end, sleeping briefly and reporting a timeout if empty.
    pub struct LoopbackPort {
        outbound: Arc<Mutex<Channel>>,
        inbound: Arc<Mutex<Channel>>,
        drop_next_n_writes: usize,
        corrupt_at_write_offset: Option<(usize, u8)>,
        written: usize,
    }

    impl LoopbackPort {
        /// Build both ends of a connected pair.
        pub fn pair() -> (LoopbackPort, LoopbackPort) {
            let a_to_b = Arc::new(Mutex::new(Channel::default()));
            let b_to_a = Arc::new(Mutex::new(Channel::default()));
            let a = LoopbackPort {
                outbound: a_to_b.clone(),
                inbound: b_to_a.clone(),
                drop_next_n_writes: 0,
                corrupt_at_write_offset: None,
                written: 0,
            };
            let b = LoopbackPort {
                outbound: b_to_a,
                inbound: a_to_b,
                drop_next_n_writes: 0,
                corrupt_at_write_offset: None,
                written: 0,
            };
            (a, b)
        }

        /// Silently discard the next `n` whole frames this end writes.
        pub fn drop_next_writes(&mut self, n: usize) {
            self.drop_next_n_writes = n;
        }

        /// Flip every bit of the byte written at absolute write-offset `offset`.
        pub fn corrupt_byte_at(&mut self, offset: usize, mask: u8) {
            self.corrupt_at_write_offset = Some((offset, mask));
        }
    }

    impl SerialPort for LoopbackPort {
        fn read_byte(&mut self) -> Result<Option<u8>, Error> {
            let byte = self.inbound.lock().unwrap().bytes.pop_front();
            if byte.is_none() {
                thread::sleep(POLL_INTERVAL);
            }
            Ok(byte)
        }

        fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize, Error> {
            if self.drop_next_n_writes > 0 {
                self.drop_next_n_writes -= 1;
                self.written += bytes.len();
                return Ok(bytes.len());
            }
            let mut out = self.outbound.lock().unwrap();
            for &b in bytes {
                let b = match self.corrupt_at_write_offset {
                    Some((offset, mask)) if offset == self.written => b ^ mask,
                    _ => b,
                };
                out.bytes.push_back(b);
                self.written += 1;
            }
            Ok(bytes.len())
        }

        fn close(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }
}

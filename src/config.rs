//! Connection configuration.

use std::time::Duration;

use crate::control::VALID_BAUD_RATES;
use crate::error::Error;

/// Which end of the connection this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

/// Immutable-after-`open` connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub(crate) device: String,
    pub(crate) baud: u32,
    pub(crate) role: Role,
    pub(crate) timeout: Duration,
    pub(crate) max_retransmissions: u32,
}

impl ConnectionConfig {
    /// A config with the defaults used throughout the spec's scenario
    /// seeds: 9600 baud, 3s per-attempt timeout, 3 retransmissions.
    pub fn new(device: impl Into<String>, role: Role) -> Self {
        ConnectionConfig {
            device: device.into(),
            baud: 9600,
            role,
            timeout: Duration::from_secs(3),
            max_retransmissions: 3,
        }
    }

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retransmissions(mut self, n: u32) -> Self {
        self.max_retransmissions = n;
        self
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retransmissions(&self) -> u32 {
        self.max_retransmissions
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if !VALID_BAUD_RATES.contains(&self.baud) {
            return Err(Error::InvalidBaudRate(self.baud));
        }
        Ok(())
    }
}

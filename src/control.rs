//! Wire-level constants: flags, addresses, and the control-byte taxonomy.

/// Frame delimiter. Never stuffed.
pub const FLAG: u8 = 0x7E;
/// Escape byte introduced by stuffing. Never stuffed itself (it is the escape).
pub const ESCAPE: u8 = 0x7D;
/// XOR mask applied to a stuffed byte's escaped value.
pub const STUFF_MASK: u8 = 0x20;

/// Address used by sender-originated commands and sender-originated responses.
pub const ADDR_SENDER: u8 = 0x03;
/// Address used by receiver-originated commands and receiver-originated responses.
pub const ADDR_RECEIVER: u8 = 0x01;

/// Connect request (sender -> receiver).
pub const SET: u8 = 0x03;
/// Connect/disconnect acknowledgement (receiver -> sender, or sender -> receiver for the final close ack).
pub const UA: u8 = 0x07;
/// Disconnect request (either direction).
pub const DISC: u8 = 0x0B;
/// Information frame, sequence bit 0.
pub const I0: u8 = 0x00;
/// Information frame, sequence bit 1.
pub const I1: u8 = 0x80;
/// Positive ack, next expected sequence bit 0.
pub const RR0: u8 = 0xAA;
/// Positive ack, next expected sequence bit 1.
pub const RR1: u8 = 0xAB;
/// Negative ack, resend sequence bit 0.
pub const REJ0: u8 = 0x54;
/// Negative ack, resend sequence bit 1.
pub const REJ1: u8 = 0x55;

/// Largest information-frame payload the codec will build or accept.
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Control byte for an information frame carrying sequence bit `seq`.
pub fn info(seq: bool) -> u8 {
    if seq {
        I1
    } else {
        I0
    }
}

/// Control byte for an RR acknowledging next-expected sequence bit `seq`.
pub fn rr(seq: bool) -> u8 {
    if seq {
        RR1
    } else {
        RR0
    }
}

/// Control byte for a REJ asking for retransmission of sequence bit `seq`.
pub fn rej(seq: bool) -> u8 {
    if seq {
        REJ1
    } else {
        REJ0
    }
}

/// True if `control` is one of `I0`/`I1`.
pub fn is_information(control: u8) -> bool {
    control == I0 || control == I1
}

/// The sequence bit carried by an information-frame control byte.
///
/// Only meaningful when [`is_information`] is true for `control`.
pub fn info_seq(control: u8) -> bool {
    control == I1
}

/// POSIX-defined discrete baud rates accepted by [`crate::config::ConnectionConfig`].
pub const VALID_BAUD_RATES: &[u32] = &[
    1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400,
];

//! Byte stuffing, BCC checksums, and frame encode/decode.
//!
//! [`FrameDecoder`] collapses the source's nested `switch` state machine
//! (see `original_source/src/link_layer.c`'s inline `llopen`/`llwrite`
//! loops) into a single tagged enum and an explicit transition function,
//! shared by every call site that needs to recognize a frame: connecting,
//! awaiting a data acknowledgement, reading data, and disconnecting.

use crate::control::{is_information, ESCAPE, FLAG, STUFF_MASK};
use crate::error::FrameError;

/// A running XOR checksum, mirroring the teacher's `Crc32Context` shape
/// (an accumulator object with `step`/`finalize`) but for the simpler BCC.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bcc(u8);

impl Bcc {
    pub fn new() -> Self {
        Bcc(0)
    }

    pub fn step(&mut self, byte: u8) {
        self.0 ^= byte;
    }

    pub fn finalize(self) -> u8 {
        self.0
    }
}

/// `BCC1 = address XOR control`.
pub fn bcc1(address: u8, control: u8) -> u8 {
    address ^ control
}

/// `BCC2 = XOR of every payload byte`.
pub fn bcc2(payload: &[u8]) -> u8 {
    let mut acc = Bcc::new();
    for &b in payload {
        acc.step(b);
    }
    acc.finalize()
}

/// Escape-transform `bytes`, doubling any `FLAG`/`ESCAPE` byte into the
/// two-byte `ESCAPE, byte ^ STUFF_MASK` sequence.
pub fn stuff(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if b == FLAG || b == ESCAPE {
            out.push(ESCAPE);
            out.push(b ^ STUFF_MASK);
        } else {
            out.push(b);
        }
    }
    out
}

/// Inverse of [`stuff`]. Fails if an escape byte is the last byte in `bytes`.
pub fn unstuff(bytes: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(b) = iter.next() {
        if b == ESCAPE {
            let next = iter.next().ok_or(FrameError::TruncatedEscape)?;
            out.push(next ^ STUFF_MASK);
        } else {
            out.push(b);
        }
    }
    Ok(out)
}

/// Encode a 5-byte supervisory frame (SET/UA/DISC/RR/REJ). Never stuffed:
/// supervisory frames carry no payload.
pub fn encode_supervisory(address: u8, control: u8) -> [u8; 5] {
    [FLAG, address, control, bcc1(address, control), FLAG]
}

/// Encode an information frame carrying `payload`.
pub fn encode_information(address: u8, control: u8, payload: &[u8]) -> Vec<u8> {
    let bcc2_byte = bcc2(payload);
    let mut body = Vec::with_capacity(payload.len() + 1);
    body.extend_from_slice(payload);
    body.push(bcc2_byte);
    let stuffed = stuff(&body);

    let mut frame = Vec::with_capacity(5 + stuffed.len());
    frame.push(FLAG);
    frame.push(address);
    frame.push(control);
    frame.push(bcc1(address, control));
    frame.extend_from_slice(&stuffed);
    frame.push(FLAG);
    frame
}

/// A frame recognized by [`FrameDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    /// A supervisory frame: SET, UA, DISC, RR(N), or REJ(N).
    Supervisory { address: u8, control: u8 },
    /// An information frame with its destuffed, checksum-validated payload.
    Information {
        address: u8,
        control: u8,
        payload: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Start,
    FlagRcv,
    ARcv,
    CRcv,
    DataRcv,
    EscapeFound,
    BccOk,
}

/// The 6-state supervisory automaton (`Start -> FlagRcv -> ARcv -> CRcv ->
/// BccOk -> Stop`), extended with a `DataRcv`/`EscapeFound` pair for
/// information frames. One instance is fed one byte at a time; it resets
/// itself to `Start` after every terminal outcome (accepted frame or
/// framing error), so it can be reused across attempts without
/// reallocating.
pub struct FrameDecoder {
    state: DecoderState,
    expected_address: u8,
    accepted_controls: &'static [u8],
    control: u8,
    payload: Vec<u8>,
}

impl FrameDecoder {
    /// A decoder that only recognizes frames from `expected_address` whose
    /// control byte is in `accepted_controls` — the "context-dependent
    /// whitelist" the spec assigns per call site.
    pub fn new(expected_address: u8, accepted_controls: &'static [u8]) -> Self {
        FrameDecoder {
            state: DecoderState::Start,
            expected_address,
            accepted_controls,
            control: 0,
            payload: Vec::new(),
        }
    }

    /// Discard any partially-received frame and start looking for a flag again.
    pub fn reset(&mut self) {
        self.state = DecoderState::Start;
        self.payload.clear();
    }

    /// Feed one byte. Returns `Ok(Some(frame))` once a frame is fully
    /// recognized, `Ok(None)` if more bytes are needed, or `Err` on a
    /// framing/checksum failure (after which the decoder has already reset
    /// to `Start`).
    pub fn feed(&mut self, byte: u8) -> Result<Option<DecodedFrame>, FrameError> {
        match self.state {
            DecoderState::Start => {
                if byte == FLAG {
                    self.state = DecoderState::FlagRcv;
                }
                Ok(None)
            }
            DecoderState::FlagRcv => {
                if byte == self.expected_address {
                    self.state = DecoderState::ARcv;
                } else if byte != FLAG {
                    self.state = DecoderState::Start;
                }
                Ok(None)
            }
            DecoderState::ARcv => {
                if self.accepted_controls.contains(&byte) {
                    self.control = byte;
                    self.payload.clear();
                    self.state = DecoderState::CRcv;
                } else if byte == FLAG {
                    self.state = DecoderState::FlagRcv;
                } else {
                    self.state = DecoderState::Start;
                }
                Ok(None)
            }
            DecoderState::CRcv => {
                if byte == self.expected_address ^ self.control {
                    self.state = if is_information(self.control) {
                        DecoderState::DataRcv
                    } else {
                        DecoderState::BccOk
                    };
                } else if byte == FLAG {
                    self.state = DecoderState::FlagRcv;
                } else {
                    self.state = DecoderState::Start;
                }
                Ok(None)
            }
            DecoderState::DataRcv => {
                if byte == ESCAPE {
                    self.state = DecoderState::EscapeFound;
                    Ok(None)
                } else if byte == FLAG {
                    let outcome = self.finish_information();
                    self.state = DecoderState::Start;
                    outcome.map(Some)
                } else {
                    self.payload.push(byte);
                    Ok(None)
                }
            }
            DecoderState::EscapeFound => {
                self.payload.push(byte ^ STUFF_MASK);
                self.state = DecoderState::DataRcv;
                Ok(None)
            }
            DecoderState::BccOk => {
                let frame = if byte == FLAG {
                    Some(DecodedFrame::Supervisory {
                        address: self.expected_address,
                        control: self.control,
                    })
                } else {
                    None
                };
                self.state = DecoderState::Start;
                Ok(frame)
            }
        }
    }

    fn finish_information(&mut self) -> Result<DecodedFrame, FrameError> {
        if self.payload.is_empty() {
            return Err(FrameError::EmptyPayload);
        }
        let received_bcc2 = self.payload.pop().expect("checked non-empty above");
        let computed_bcc2 = bcc2(&self.payload);
        if computed_bcc2 != received_bcc2 {
            return Err(FrameError::Bcc2Mismatch {
                expected: computed_bcc2,
                actual: received_bcc2,
            });
        }
        Ok(DecodedFrame::Information {
            address: self.expected_address,
            control: self.control,
            payload: std::mem::take(&mut self.payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::*;

    #[test]
    fn stuffing_round_trips_every_byte_value() {
        for b in 0u8..=255 {
            let s = stuff(&[b]);
            assert_eq!(unstuff(&s).unwrap(), vec![b]);
        }
    }

    #[test]
    fn stuffing_round_trips_mixed_sequences() {
        let samples: &[&[u8]] = &[
            &[],
            &[0x00, 0x01, 0x02],
            &[FLAG],
            &[ESCAPE],
            &[FLAG, ESCAPE, FLAG, ESCAPE],
            &[0xAA, FLAG, 0xBB, ESCAPE, 0xCC],
            b"Hello, World!",
        ];
        for s in samples {
            assert_eq!(unstuff(&stuff(s)).unwrap(), s.to_vec());
        }
    }

    #[test]
    fn unstuff_rejects_trailing_escape() {
        assert_eq!(unstuff(&[0x01, ESCAPE]), Err(FrameError::TruncatedEscape));
    }

    #[test]
    fn bcc_matches_plain_xor() {
        assert_eq!(bcc1(ADDR_SENDER, SET), ADDR_SENDER ^ SET);
        assert_eq!(bcc2(b"Hello"), b'H' ^ b'e' ^ b'l' ^ b'l' ^ b'o');
        assert_eq!(bcc2(&[]), 0);
    }

    fn feed_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> Result<Option<DecodedFrame>, FrameError> {
        let mut last = Ok(None);
        for &b in bytes {
            last = decoder.feed(b);
            if let Ok(Some(_)) = last {
                return last;
            }
            if last.is_err() {
                return last;
            }
        }
        last
    }

    #[test]
    fn decodes_a_supervisory_frame() {
        let frame = encode_supervisory(ADDR_SENDER, SET);
        let mut decoder = FrameDecoder::new(ADDR_SENDER, &[SET]);
        let decoded = feed_all(&mut decoder, &frame).unwrap().unwrap();
        assert_eq!(
            decoded,
            DecodedFrame::Supervisory {
                address: ADDR_SENDER,
                control: SET
            }
        );
    }

    #[test]
    fn decodes_an_information_frame_with_flag_in_payload() {
        let frame = encode_information(ADDR_SENDER, info(false), &[FLAG]);
        let mut decoder = FrameDecoder::new(ADDR_SENDER, &[I0, I1, DISC]);
        let decoded = feed_all(&mut decoder, &frame).unwrap().unwrap();
        assert_eq!(
            decoded,
            DecodedFrame::Information {
                address: ADDR_SENDER,
                control: I0,
                payload: vec![FLAG],
            }
        );
    }

    #[test]
    fn decodes_an_information_frame_with_escape_in_payload() {
        let frame = encode_information(ADDR_SENDER, info(true), &[ESCAPE]);
        let mut decoder = FrameDecoder::new(ADDR_SENDER, &[I0, I1, DISC]);
        let decoded = feed_all(&mut decoder, &frame).unwrap().unwrap();
        assert_eq!(
            decoded,
            DecodedFrame::Information {
                address: ADDR_SENDER,
                control: I1,
                payload: vec![ESCAPE],
            }
        );
    }

    #[test]
    fn detects_bcc2_mismatch() {
        let mut frame = encode_information(ADDR_SENDER, info(false), b"Hello");
        // Flip a payload byte after stuffing, leaving BCC2 stale.
        let corrupt_index = 5;
        frame[corrupt_index] ^= 0xFF;
        let mut decoder = FrameDecoder::new(ADDR_SENDER, &[I0, I1, DISC]);
        let result = feed_all(&mut decoder, &frame);
        assert!(matches!(result, Err(FrameError::Bcc2Mismatch { .. })));
    }

    #[test]
    fn ignores_frame_from_unexpected_address() {
        let frame = encode_supervisory(ADDR_RECEIVER, UA);
        let mut decoder = FrameDecoder::new(ADDR_SENDER, &[SET]);
        let decoded = feed_all(&mut decoder, &frame).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn recovers_after_garbage_precedes_a_valid_frame() {
        let mut garbage = vec![0x00, 0x01, 0x02];
        garbage.extend_from_slice(&encode_supervisory(ADDR_SENDER, SET));
        let mut decoder = FrameDecoder::new(ADDR_SENDER, &[SET]);
        let decoded = feed_all(&mut decoder, &garbage).unwrap().unwrap();
        assert_eq!(
            decoded,
            DecodedFrame::Supervisory {
                address: ADDR_SENDER,
                control: SET
            }
        );
    }
}

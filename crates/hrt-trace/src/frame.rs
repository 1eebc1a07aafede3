//! HDLC framing shared by the encoder side ([`crate::Tracer`]) and host tools.
//!
//! A frame is `seq | type | [timestamp u32 LE] | payload | checksum | FLAG`,
//! where every byte except the closing flag is escaped and the checksum is the
//! one's complement of the byte sum over `seq..payload`.

use thiserror::Error;

use crate::records;

pub const FLAG: u8 = 0x7E;
pub const ESC: u8 = 0x7D;
pub const ESC_XOR: u8 = 0x20;

/// Appends `record` to `dest` as a complete HDLC frame.
pub fn encode_into(dest: &mut Vec<u8>, seq: u8, record_type: u8, timestamp: Option<u32>, payload: &[u8]) {
    let mut checksum: u8 = 0;

    let push = |dest: &mut Vec<u8>, byte: u8, sum: Option<&mut u8>| {
        if let Some(sum) = sum {
            *sum = sum.wrapping_add(byte);
        }
        if byte == FLAG || byte == ESC {
            dest.push(ESC);
            dest.push(byte ^ ESC_XOR);
        } else {
            dest.push(byte);
        }
    };

    push(dest, seq, Some(&mut checksum));
    push(dest, record_type, Some(&mut checksum));

    if let Some(ts) = timestamp {
        for byte in ts.to_le_bytes() {
            push(dest, byte, Some(&mut checksum));
        }
    }

    for &byte in payload {
        push(dest, byte, Some(&mut checksum));
    }

    push(dest, !checksum, None);
    dest.push(FLAG);
}

/// A verified record pulled out of a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u8,
    pub record_type: u8,
    pub timestamp_us: Option<u32>,
    pub payload: Vec<u8>,
}

impl Frame {
    /// `(index, generation)` of the timer a timer record refers to.
    pub fn timer_handle(&self) -> Option<(u32, u32)> {
        if !records::is_timer(self.record_type) {
            return None;
        }
        self.u64_at(0).map(|bits| (bits as u32, (bits >> 32) as u32))
    }

    /// Little-endian `u64` at `offset` into the payload.
    pub fn u64_at(&self, offset: usize) -> Option<u64> {
        let bytes = self.payload.get(offset..offset.checked_add(8)?)?;
        bytes.try_into().ok().map(u64::from_le_bytes)
    }

    pub fn u32_at(&self, offset: usize) -> Option<u32> {
        let bytes = self.payload.get(offset..offset.checked_add(4)?)?;
        bytes.try_into().ok().map(u32::from_le_bytes)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record of {0} byte(s) cannot hold seq, type and checksum")]
    Truncated(usize),
    #[error("record of {0} byte(s) has no room for its timestamp")]
    MissingTimestamp(usize),
    #[error("checksum {found:#04x} does not match computed {expected:#04x}")]
    Checksum { expected: u8, found: u8 },
}

/// Incremental deframer. Feed it arbitrary chunks; each completed frame
/// comes back either decoded or as the reason it was dropped, and decoding
/// continues at the next flag.
#[derive(Debug)]
pub struct FrameDecoder {
    timestamps: bool,
    pending: Vec<u8>,
    escaped: bool,
}

impl FrameDecoder {
    /// `timestamps` must match the encoder's `TraceConfig::include_timestamp`.
    pub fn new(timestamps: bool) -> Self {
        Self {
            timestamps,
            pending: Vec::new(),
            escaped: false,
        }
    }

    pub fn push_bytes(&mut self, input: &[u8]) -> Vec<Result<Frame, DecodeError>> {
        let mut out = Vec::new();

        for &byte in input {
            match byte {
                FLAG => {
                    self.escaped = false;
                    if !self.pending.is_empty() {
                        let raw = std::mem::take(&mut self.pending);
                        out.push(self.decode(&raw));
                    }
                }
                ESC => self.escaped = true,
                _ if self.escaped => {
                    self.pending.push(byte ^ ESC_XOR);
                    self.escaped = false;
                }
                _ => self.pending.push(byte),
            }
        }

        out
    }

    fn decode(&self, raw: &[u8]) -> Result<Frame, DecodeError> {
        let Some((&checksum, content)) = raw.split_last() else {
            return Err(DecodeError::Truncated(0));
        };
        let [seq, record_type, rest @ ..] = content else {
            return Err(DecodeError::Truncated(raw.len()));
        };

        let expected = !content.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte));
        if checksum != expected {
            return Err(DecodeError::Checksum {
                expected,
                found: checksum,
            });
        }

        let (timestamp_us, payload) = if self.timestamps {
            let (ts, payload) = rest
                .split_first_chunk::<4>()
                .ok_or(DecodeError::MissingTimestamp(raw.len()))?;
            (Some(u32::from_le_bytes(*ts)), payload)
        } else {
            (None, rest)
        };

        Ok(Frame {
            seq: *seq,
            record_type: *record_type,
            timestamp_us,
            payload: payload.to_vec(),
        })
    }
}

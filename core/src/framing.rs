//! Frame codec: payload ⇄ checksum- and FEC-protected wire bytes.
//!
//! Wire layout:
//!
//! ```text
//! header: length (2, BE) | RS parity (4)               -- block 0
//! body:   length (2, BE) | payload | CRC-16 (2, BE)    -- split into blocks
//!         of at most `ecc_block_len` bytes, each followed by 2t parity bytes
//! ```
//!
//! The header is a tiny RS(6,2) code so the receiver learns how many bytes
//! to collect before the body is complete. The length is repeated inside
//! the body so it is also covered by the checksum.

use crc::{Crc, CRC_16_IBM_3740};

use crate::error::{AudioModemError, Result};
use crate::fec::ReedSolomon;
use crate::profile::Profile;

/// Length field size in bytes.
pub const LENGTH_FIELD_LEN: usize = 2;
pub const HEADER_PARITY_LEN: usize = 4;
/// Bytes occupied by the protected header on the wire.
pub const HEADER_WIRE_LEN: usize = LENGTH_FIELD_LEN + HEADER_PARITY_LEN;
pub const CHECKSUM_LEN: usize = 2;

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF).
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Checksum over the big-endian length followed by the payload.
pub fn checksum(length: u16, payload: &[u8]) -> u16 {
    let mut digest = CRC16.digest();
    digest.update(&length.to_be_bytes());
    digest.update(payload);
    digest.finalize()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub length: u16,
    pub payload: Vec<u8>,
    pub checksum: u16,
    /// Header parity followed by the parity of each body block
    pub parity: Vec<u8>,
}

impl Frame {
    /// `length | payload | checksum`, the bytes the body parity covers.
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.payload.len() + LENGTH_FIELD_LEN + CHECKSUM_LEN);
        body.extend_from_slice(&self.length.to_be_bytes());
        body.extend_from_slice(&self.payload);
        body.extend_from_slice(&self.checksum.to_be_bytes());
        body
    }

    /// Interleave header, body blocks and their parity into wire order.
    pub fn to_bytes(&self, profile: &Profile) -> Vec<u8> {
        let mut out = Vec::with_capacity(wire_len(self.length as usize, profile));
        out.extend_from_slice(&self.length.to_be_bytes());
        out.extend_from_slice(&self.parity[..HEADER_PARITY_LEN]);

        let parity_len = profile.parity_per_block();
        let body = self.body();
        for (block, chunk) in body.chunks(profile.ecc_block_len).enumerate() {
            let start = HEADER_PARITY_LEN + block * parity_len;
            out.extend_from_slice(chunk);
            out.extend_from_slice(&self.parity[start..start + parity_len]);
        }
        out
    }
}

fn body_blocks(length: usize, profile: &Profile) -> usize {
    (length + LENGTH_FIELD_LEN + CHECKSUM_LEN).div_ceil(profile.ecc_block_len)
}

/// Total wire bytes for a payload of `length` bytes.
pub fn wire_len(length: usize, profile: &Profile) -> usize {
    let body = length + LENGTH_FIELD_LEN + CHECKSUM_LEN;
    HEADER_WIRE_LEN + body + body_blocks(length, profile) * profile.parity_per_block()
}

/// Build a frame: checksum first, then parity for the header and every block.
pub fn encode_frame(payload: &[u8], profile: &Profile) -> Result<Frame> {
    if payload.len() > profile.max_payload_bytes {
        return Err(AudioModemError::PayloadTooLarge {
            size: payload.len(),
            max: profile.max_payload_bytes,
        });
    }

    let length = payload.len() as u16;
    let mut frame = Frame {
        length,
        payload: payload.to_vec(),
        checksum: checksum(length, payload),
        parity: Vec::new(),
    };

    let header_rs = ReedSolomon::new(HEADER_PARITY_LEN)?;
    frame.parity = header_rs.encode(&length.to_be_bytes())?;

    let body_rs = ReedSolomon::new(profile.parity_per_block())?;
    for chunk in frame.body().chunks(profile.ecc_block_len) {
        let parity = body_rs.encode(chunk)?;
        frame.parity.extend(parity);
    }

    Ok(frame)
}

/// Correct the protected header and return the declared payload length.
///
/// `erasures` are positions within `header` known to be unreliable.
pub fn decode_header(header: &[u8], erasures: &[usize], profile: &Profile) -> Result<usize> {
    if header.len() < HEADER_WIRE_LEN {
        return Err(AudioModemError::TruncatedFrame {
            received: header.len(),
            expected: HEADER_WIRE_LEN,
        });
    }

    let mut codeword = header[..HEADER_WIRE_LEN].to_vec();
    let rs = ReedSolomon::new(HEADER_PARITY_LEN)?;
    rs.correct(&mut codeword, erasures)
        .ok_or(AudioModemError::UncorrectableBlock { block: 0 })?;

    let declared = u16::from_be_bytes([codeword[0], codeword[1]]) as usize;
    if declared > profile.max_payload_bytes {
        return Err(AudioModemError::InvalidLength {
            declared,
            max: profile.max_payload_bytes,
        });
    }
    Ok(declared)
}

/// Recover the payload from wire bytes.
///
/// `erasures` are wire positions of bytes that came from weak symbols.
/// Block 0 is the header; body blocks are numbered from 1.
pub fn decode_frame(bytes: &[u8], erasures: &[usize], profile: &Profile) -> Result<Vec<u8>> {
    let length = decode_header(bytes, erasures, profile)?;
    let expected = wire_len(length, profile);
    if bytes.len() < expected {
        return Err(AudioModemError::TruncatedFrame {
            received: bytes.len(),
            expected,
        });
    }

    let rs = ReedSolomon::new(profile.parity_per_block())?;
    let body_len = length + LENGTH_FIELD_LEN + CHECKSUM_LEN;
    let mut body = Vec::with_capacity(body_len);
    let mut offset = HEADER_WIRE_LEN;
    let mut remaining = body_len;
    let mut block = 1;

    while remaining > 0 {
        let data_len = remaining.min(profile.ecc_block_len);
        let end = offset + data_len + rs.parity_len();
        let mut codeword = bytes[offset..end].to_vec();
        let local: Vec<usize> = erasures
            .iter()
            .filter(|&&p| p >= offset && p < end)
            .map(|&p| p - offset)
            .collect();

        rs.correct(&mut codeword, &local)
            .ok_or(AudioModemError::UncorrectableBlock { block })?;
        body.extend_from_slice(&codeword[..data_len]);

        offset = end;
        remaining -= data_len;
        block += 1;
    }

    let body_length = u16::from_be_bytes([body[0], body[1]]);
    let payload = &body[LENGTH_FIELD_LEN..LENGTH_FIELD_LEN + length];
    let received = u16::from_be_bytes([body[body_len - 2], body[body_len - 1]]);

    if body_length as usize != length || checksum(body_length, payload) != received {
        return Err(AudioModemError::ChecksumFailure);
    }

    Ok(payload.to_vec())
}

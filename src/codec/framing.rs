//! Packet framing
//!
//! [`encode_packet`] is the sender side; [`PacketDecoder`] is the incremental
//! receiver side, reassembling packets from an arbitrary byte-stream
//! segmentation and verifying each trailer before releasing the payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::checksum::checksum;
use crate::constants::MAX_PAYLOAD_BYTES;
use crate::error::FramingError;

/// Byte length of the `u32` length prefix.
pub const LEN_PREFIX_BYTES: usize = 4;

/// Byte length of the `u32` checksum trailer.
pub const CHECKSUM_BYTES: usize = 4;

/// Encode one frame of samples into a wire packet.
///
/// The payload is the samples as little-endian bytes; the trailer is the
/// additive checksum of exactly those bytes. A failed buffer allocation is
/// reported rather than aborting; the caller drops the frame and moves on.
pub fn encode_packet(samples: &[i16]) -> Result<Vec<u8>, FramingError> {
    let payload_len = samples.len() * std::mem::size_of::<i16>();
    if payload_len > MAX_PAYLOAD_BYTES {
        return Err(FramingError::PayloadTooLarge(payload_len));
    }

    let packet_len = LEN_PREFIX_BYTES + payload_len + CHECKSUM_BYTES;
    let mut packet = Vec::new();
    packet
        .try_reserve_exact(packet_len)
        .map_err(|_| FramingError::Alloc(packet_len))?;

    packet.put_u32(payload_len as u32);
    for &sample in samples {
        packet.extend_from_slice(&sample.to_le_bytes());
    }
    let sum = checksum(&packet[LEN_PREFIX_BYTES..]);
    packet.put_u32(sum);

    Ok(packet)
}

/// Reinterpret a verified payload as little-endian samples.
///
/// A trailing odd byte (possible only if the sender framed a corrupt
/// length) is ignored.
pub fn payload_to_samples(payload: &[u8]) -> Vec<i16> {
    payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Incremental packet decoder over a reliable byte stream.
///
/// Feed bytes in with [`extend`](Self::extend), then drain complete packets
/// with [`next_payload`](Self::next_payload). A checksum mismatch consumes
/// the bad packet (the stream stays aligned, the payload is discarded); an
/// oversized length prefix means the stream itself is desynchronized and
/// the connection should be dropped.
pub struct PacketDecoder {
    buffer: BytesMut,
    max_payload: usize,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_BYTES)
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_payload,
        }
    }

    /// Append raw bytes received from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Decode the next complete packet, if the buffer holds one.
    ///
    /// `Ok(None)` means more bytes are needed.
    pub fn next_payload(&mut self) -> Result<Option<Bytes>, FramingError> {
        if self.buffer.len() < LEN_PREFIX_BYTES {
            return Ok(None);
        }

        let mut prefix = [0u8; LEN_PREFIX_BYTES];
        prefix.copy_from_slice(&self.buffer[..LEN_PREFIX_BYTES]);
        let length = u32::from_be_bytes(prefix) as usize;
        if length > self.max_payload {
            return Err(FramingError::PayloadTooLarge(length));
        }

        if self.buffer.len() < LEN_PREFIX_BYTES + length + CHECKSUM_BYTES {
            return Ok(None);
        }

        self.buffer.advance(LEN_PREFIX_BYTES);
        let payload = self.buffer.split_to(length).freeze();
        let expected = self.buffer.get_u32();

        let actual = checksum(&payload);
        if actual != expected {
            return Err(FramingError::ChecksumMismatch { expected, actual });
        }

        Ok(Some(payload))
    }

    /// Bytes currently buffered but not yet decoded.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

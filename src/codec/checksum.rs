//! Additive byte checksum

/// Sum of all bytes, wrapping on overflow.
///
/// Deterministic and cheap; catches any single-byte corruption outright and
/// multi-byte corruption with high probability. Not cryptographic.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)))
}

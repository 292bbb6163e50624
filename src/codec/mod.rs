//! Wire codec
//!
//! Frames cross the network as length-prefixed, checksum-trailed packets:
//!
//! ```text
//! +----------------+----------------------+------------------+
//! | length: u32 BE | payload: u8[length]  | checksum: u32 BE |
//! +----------------+----------------------+------------------+
//! ```
//!
//! The payload is raw little-endian sample bytes; the checksum is the
//! additive byte sum of exactly the payload. Both ends compute it the same
//! way: the sender when building a packet, the receiver when verifying.

pub mod checksum;
pub mod framing;

pub use checksum::checksum;
pub use framing::{encode_packet, PacketDecoder};

//! Disk-backed queue.
//!
//! Notifications are framed and appended to a chain of segments:
//!
//! ```text
//! | kind (1) | length (4, LE) | payload (length) | crc32 (4, LE) |
//! ```
//!
//! - kind 1 = value (payload from the serializer)
//! - kind 2 = error (error-kind byte + UTF-8 message)
//! - kind 3 = complete (empty payload)
//!
//! The CRC covers kind, length and payload. Each segment carries a
//! published watermark that only advances after a whole frame is flushed,
//! so a reader at the watermark has nothing to read, while a frame that
//! straddles it, an unknown kind or a bad checksum is corruption.
//!
//! When the rollover policy trips, the writer opens the next segment and then
//! seals the current one. A reader that reaches the watermark of a sealed
//! segment deletes it and moves on.

mod queue;
pub mod record;
mod segment;

pub use queue::SpillQueue;

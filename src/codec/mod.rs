//! Decoding and encoding of `.pop`/`.idx` grayscale videos.
//!
//! A video is split across two buffers: a small index describing the frame
//! geometry and where each frame starts, and a payload holding scanline
//! records. Identical scanlines are stored once and referenced from
//! elsewhere in the payload, which makes mostly-static footage compress
//! extremely well.
//!
//! # File Format
//!
//! All integers are little-endian.
//!
//! ```text
//! Index (.idx):
//!   Width: u16
//!   Height: u16
//!   Frame entries (8 bytes each, until end of buffer):
//!     Payload offset: u32
//!     Reserved: u32 (written as zero, ignored on read)
//!
//! Payload (.pop), a sequence of scanline records:
//!   Fresh:  0x7A, then (count: u8, value: u8) pairs until the row is full
//!   Reuse:  0x33, then the absolute offset of another record
//!           (7 bytes, or 8 with the top byte ignored for wide streams)
//! ```
//!
//! A frame is `height` consecutive records starting at its index offset.
//! Decoded pixels are RGBA with `R = G = B = value` and `A = 255`, or one
//! byte per pixel in [`PixelFormat::Gray`].

mod decoder;
mod encoder;
mod format;
mod raw;

pub use decoder::{FrameDecoder, FrameIterator};
pub use encoder::{EncodeStats, VideoEncoder};
pub use format::{
    CorruptionKind, DecodeError, INDEX_ENTRY_SIZE, INDEX_HEADER_SIZE, OffsetField, PixelFormat,
    TAG_FRESH, TAG_REUSE, VideoIndex,
};
pub use raw::{RAW_HEADER_SIZE, RawVideo, write_raw_header};

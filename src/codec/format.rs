//! Binary layout of the index and payload buffers.

use std::io::{self, Write};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::schema::ConfigError;

/// Tag byte introducing a run-length encoded scanline.
pub const TAG_FRESH: u8 = 122;

/// Tag byte introducing a reference to another scanline record.
pub const TAG_REUSE: u8 = 51;

/// Size of the index header (width + height) in bytes.
pub const INDEX_HEADER_SIZE: usize = 4;

/// Size of one frame entry in the index (offset word + reserved word).
pub const INDEX_ENTRY_SIZE: usize = 8;

/// Number of significant bytes in a reuse offset.
const REUSE_OFFSET_BYTES: usize = 7;

/// On-disk width of the offset field carried by a reuse record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetField {
    /// 7 bytes; a reuse record occupies 8 bytes.
    #[default]
    Compact,
    /// A full u64 whose top byte is never read; a reuse record occupies 9 bytes.
    Wide,
}

impl OffsetField {
    /// Bytes occupied by the offset field.
    pub fn stored_len(self) -> usize {
        match self {
            OffsetField::Compact => REUSE_OFFSET_BYTES,
            OffsetField::Wide => REUSE_OFFSET_BYTES + 1,
        }
    }

    /// Total size of a reuse record, tag included.
    pub fn record_len(self) -> usize {
        1 + self.stored_len()
    }
}

/// Layout of a decoded pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Four bytes per pixel: value, value, value, 255.
    #[default]
    Rgba,
    /// One intensity byte per pixel.
    Gray,
}

impl PixelFormat {
    /// Bytes written per decoded pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Gray => 1,
        }
    }

    /// Fill `dst` with pixels of intensity `value`.
    pub(crate) fn fill(self, dst: &mut [u8], value: u8) {
        match self {
            PixelFormat::Rgba => {
                for pixel in dst.chunks_exact_mut(4) {
                    pixel.copy_from_slice(&[value, value, value, 255]);
                }
            }
            PixelFormat::Gray => dst.fill(value),
        }
    }
}

/// Kind of damage found in a payload stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CorruptionKind {
    #[error("unrecognized tag byte {0:#04x}")]
    UnknownTag(u8),
    #[error("record runs past the end of the payload")]
    Truncated,
    #[error("reuse target {0} lies outside the payload")]
    DanglingReference(u64),
    #[error("run-length pairs expand to {pixels} pixels but the row holds {width}")]
    RunOverflow { pixels: usize, width: usize },
}

/// Errors produced while reading an index or decoding a frame.
///
/// Every variant is scoped to the call that produced it; the decoder holds
/// no state that a failure could leave inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed index: {0}")]
    MalformedIndex(String),

    #[error("Frame index {index} out of range ({frame_count} frames)")]
    FrameIndexOutOfRange { index: usize, frame_count: usize },

    #[error("Output buffer holds {actual} bytes but the frame needs {expected}")]
    OutputSizeMismatch { expected: usize, actual: usize },

    #[error("Corrupt stream at offset {offset}: {kind}")]
    CorruptStream { offset: usize, kind: CorruptionKind },

    #[error("Reuse chain starting at offset {offset} exceeds {limit} hops")]
    ReuseChainTooDeep { offset: usize, limit: usize },

    #[error("Reuse chain starting at offset {offset} loops back to offset {target}")]
    CyclicReference { offset: usize, target: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl DecodeError {
    pub(crate) fn corrupt(offset: usize, kind: CorruptionKind) -> Self {
        DecodeError::CorruptStream { offset, kind }
    }
}

/// Parsed contents of an index buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoIndex {
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in scanlines.
    pub height: u16,
    /// Payload offset of the first scanline record of each frame, in frame order.
    pub frame_offsets: Vec<u32>,
}

impl VideoIndex {
    /// Parse an index buffer.
    ///
    /// # Errors
    /// Returns [`DecodeError::MalformedIndex`] if the buffer is shorter than
    /// the header or its entry table is not a whole number of 8-byte entries.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < INDEX_HEADER_SIZE {
            return Err(DecodeError::MalformedIndex(format!(
                "{} bytes is shorter than the {INDEX_HEADER_SIZE}-byte header",
                bytes.len()
            )));
        }

        let (header, entries) = bytes.split_at(INDEX_HEADER_SIZE);
        if entries.len() % INDEX_ENTRY_SIZE != 0 {
            return Err(DecodeError::MalformedIndex(format!(
                "entry table of {} bytes is not a multiple of {INDEX_ENTRY_SIZE}",
                entries.len()
            )));
        }

        let width = u16::from_le_bytes([header[0], header[1]]);
        let height = u16::from_le_bytes([header[2], header[3]]);

        let mut frame_offsets = Vec::with_capacity(entries.len() / INDEX_ENTRY_SIZE);
        let mut reserved_in_use = 0usize;
        for entry in entries.chunks_exact(INDEX_ENTRY_SIZE) {
            frame_offsets.push(u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]));
            if entry[4..] != [0; 4] {
                reserved_in_use += 1;
            }
        }

        if reserved_in_use > 0 {
            warn!("{reserved_in_use} index entries carry a non-zero reserved word; ignoring it");
        }

        Ok(Self {
            width,
            height,
            frame_offsets,
        })
    }

    /// Number of frames listed in the index.
    pub fn frame_count(&self) -> usize {
        self.frame_offsets.len()
    }

    /// Payload offset of a frame, if the frame exists.
    pub fn frame_offset(&self, frame_index: usize) -> Option<usize> {
        self.frame_offsets
            .get(frame_index)
            .map(|&offset| offset as usize)
    }

    /// Pixels in one frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes needed to hold one decoded frame.
    pub fn frame_size(&self, format: PixelFormat) -> usize {
        self.pixel_count() * format.bytes_per_pixel()
    }

    /// Serialized size of this index in bytes.
    pub fn encoded_len(&self) -> usize {
        INDEX_HEADER_SIZE + self.frame_offsets.len() * INDEX_ENTRY_SIZE
    }

    /// Write the index to output.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_index_header(w, self.width, self.height)?;
        for &offset in &self.frame_offsets {
            write_index_entry(w, offset)?;
        }
        Ok(())
    }
}

pub(crate) fn write_index_header<W: Write>(w: &mut W, width: u16, height: u16) -> io::Result<()> {
    w.write_all(&width.to_le_bytes())?;
    w.write_all(&height.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_index_entry<W: Write>(w: &mut W, offset: u32) -> io::Result<()> {
    w.write_all(&offset.to_le_bytes())?;
    // Reserved word
    w.write_all(&[0u8; 4])?;
    Ok(())
}

/// Read the offset field of a reuse record starting at `at`.
///
/// Returns `None` if the field does not fit in the payload.
pub(crate) fn read_reuse_offset(payload: &[u8], at: usize, field: OffsetField) -> Option<u64> {
    let end = at.checked_add(field.stored_len())?;
    let stored = payload.get(at..end)?;
    let mut buf = [0u8; 8];
    buf[..REUSE_OFFSET_BYTES].copy_from_slice(&stored[..REUSE_OFFSET_BYTES]);
    Some(u64::from_le_bytes(buf))
}

/// Append the offset field of a reuse record to `out`.
pub(crate) fn push_reuse_offset(out: &mut Vec<u8>, offset: u64, field: OffsetField) {
    out.extend_from_slice(&offset.to_le_bytes()[..REUSE_OFFSET_BYTES]);
    if field == OffsetField::Wide {
        out.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_bytes(width: u16, height: u16, entries: &[(u32, u32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&width.to_le_bytes());
        buf.extend_from_slice(&height.to_le_bytes());
        for &(offset, reserved) in entries {
            buf.extend_from_slice(&offset.to_le_bytes());
            buf.extend_from_slice(&reserved.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_parse_header_and_offsets() {
        let bytes = index_bytes(320, 240, &[(0, 0), (1234, 0), (98765, 0)]);
        let index = VideoIndex::parse(&bytes).unwrap();

        assert_eq!(index.width, 320);
        assert_eq!(index.height, 240);
        assert_eq!(index.frame_offsets, vec![0, 1234, 98765]);
        assert_eq!(index.frame_count(), 3);
        assert_eq!(index.frame_offset(1), Some(1234));
        assert_eq!(index.frame_offset(3), None);
    }

    #[test]
    fn test_parse_header_only() {
        let index = VideoIndex::parse(&index_bytes(4, 1, &[])).unwrap();
        assert_eq!(index.frame_count(), 0);
        assert_eq!(index.pixel_count(), 4);
    }

    #[test]
    fn test_parse_ignores_reserved_word() {
        let bytes = index_bytes(2, 2, &[(16, 0xDEAD_BEEF), (32, 7)]);
        let index = VideoIndex::parse(&bytes).unwrap();
        assert_eq!(index.frame_offsets, vec![16, 32]);
    }

    #[test]
    fn test_parse_rejects_short_header() {
        for len in 0..INDEX_HEADER_SIZE {
            let err = VideoIndex::parse(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, DecodeError::MalformedIndex(_)), "len {len}");
        }
    }

    #[test]
    fn test_parse_rejects_partial_entry() {
        let mut bytes = index_bytes(4, 4, &[(0, 0)]);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        let err = VideoIndex::parse(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedIndex(_)));
    }

    #[test]
    fn test_write_matches_parse_layout() {
        let index = VideoIndex {
            width: 640,
            height: 2,
            frame_offsets: vec![0, 77, 4_000_000_000],
        };

        let mut buf = Vec::new();
        index.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), index.encoded_len());
        assert_eq!(&buf[..4], &[0x80, 0x02, 0x02, 0x00]);
        assert_eq!(&buf[12..20], &[77, 0, 0, 0, 0, 0, 0, 0]);

        assert_eq!(VideoIndex::parse(&buf).unwrap(), index);
    }

    #[test]
    fn test_frame_size_by_format() {
        let index = VideoIndex {
            width: 5,
            height: 3,
            frame_offsets: vec![],
        };
        assert_eq!(index.frame_size(PixelFormat::Rgba), 60);
        assert_eq!(index.frame_size(PixelFormat::Gray), 15);
    }

    #[test]
    fn test_reuse_offset_fields() {
        let mut compact = Vec::new();
        push_reuse_offset(&mut compact, 0x0011_2233_4455_6677, OffsetField::Compact);
        assert_eq!(compact, vec![0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
        assert_eq!(
            read_reuse_offset(&compact, 0, OffsetField::Compact),
            Some(0x0011_2233_4455_6677)
        );
        // A wide field needs its eighth byte present.
        assert_eq!(read_reuse_offset(&compact, 0, OffsetField::Wide), None);

        let wide = [0x05, 0, 0, 0, 0, 0, 0, 0xFF];
        assert_eq!(read_reuse_offset(&wide, 0, OffsetField::Wide), Some(5));
    }

    #[test]
    fn test_pixel_fill() {
        let mut rgba = [0u8; 8];
        PixelFormat::Rgba.fill(&mut rgba, 200);
        assert_eq!(rgba, [200, 200, 200, 255, 200, 200, 200, 255]);

        let mut gray = [0u8; 3];
        PixelFormat::Gray.fill(&mut gray, 9);
        assert_eq!(gray, [9, 9, 9]);
    }
}

//! Uncompressed grayscale container used as encoder input and dump output.
//!
//! ```text
//! Width: u16
//! Height: u16
//! Frames: width * height intensity bytes each, back to back
//! ```

use std::io::{self, Write};

/// Size of the raw header in bytes.
pub const RAW_HEADER_SIZE: usize = 4;

/// Borrowed view of a raw grayscale video.
#[derive(Debug, Clone, Copy)]
pub struct RawVideo<'a> {
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in rows.
    pub height: u16,
    data: &'a [u8],
}

impl<'a> RawVideo<'a> {
    /// Parse a raw video buffer.
    ///
    /// Trailing bytes that do not make up a whole frame are ignored.
    pub fn parse(bytes: &'a [u8]) -> io::Result<Self> {
        if bytes.len() < RAW_HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Raw video is shorter than its header",
            ));
        }

        let width = u16::from_le_bytes([bytes[0], bytes[1]]);
        let height = u16::from_le_bytes([bytes[2], bytes[3]]);
        if width == 0 || height == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Raw video has empty frames ({width}x{height})"),
            ));
        }

        Ok(Self {
            width,
            height,
            data: &bytes[RAW_HEADER_SIZE..],
        })
    }

    /// Bytes per frame.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of complete frames.
    pub fn frame_count(&self) -> usize {
        self.data.len() / self.frame_size()
    }

    /// Iterate over complete frames.
    pub fn frames(&self) -> impl ExactSizeIterator<Item = &'a [u8]> + use<'a> {
        let data: &'a [u8] = self.data;
        data.chunks_exact(self.frame_size())
    }
}

/// Write the raw header.
pub fn write_raw_header<W: Write>(w: &mut W, width: u16, height: u16) -> io::Result<()> {
    w.write_all(&width.to_le_bytes())?;
    w.write_all(&height.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frames() {
        let mut bytes = Vec::new();
        write_raw_header(&mut bytes, 2, 2).unwrap();
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let raw = RawVideo::parse(&bytes).unwrap();
        assert_eq!((raw.width, raw.height), (2, 2));
        assert_eq!(raw.frame_count(), 2);

        let frames: Vec<_> = raw.frames().collect();
        assert_eq!(frames, vec![&[1u8, 2, 3, 4][..], &[5u8, 6, 7, 8][..]]);
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        assert!(RawVideo::parse(&[1, 0]).is_err());
        assert!(RawVideo::parse(&[0, 0, 4, 0, 1, 2]).is_err());
    }
}

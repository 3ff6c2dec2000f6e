//! Frame decoder resolving scanline records against a payload buffer.

use log::{debug, trace};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use super::format::{
    CorruptionKind, DecodeError, OffsetField, PixelFormat, TAG_FRESH, TAG_REUSE, VideoIndex,
    read_reuse_offset,
};
use crate::schema::CodecConfig;

/// Decoder expanding frames of a payload buffer into pixel buffers.
///
/// The decoder only borrows the payload and index; nothing decoded is
/// cached, so every call recomputes the frame from the payload. Sharing a
/// decoder across threads is safe as long as each call gets its own output.
///
/// Usage:
/// ```ignore
/// let index = VideoIndex::parse(&idx_bytes)?;
/// let decoder = FrameDecoder::new(&pop_bytes, &index)?;
///
/// let mut rgba = vec![0u8; index.frame_size(PixelFormat::Rgba)];
/// decoder.decode_frame(0, &mut rgba)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder<'a> {
    payload: &'a [u8],
    index: &'a VideoIndex,
    offset_field: OffsetField,
    max_reuse_depth: usize,
}

impl<'a> FrameDecoder<'a> {
    /// Create a decoder with the default configuration.
    ///
    /// # Errors
    /// Same as [`FrameDecoder::with_config`].
    pub fn new(payload: &'a [u8], index: &'a VideoIndex) -> Result<Self, DecodeError> {
        Self::with_config(payload, index, &CodecConfig::default())
    }

    /// Create a decoder using the offset field width and reuse depth limit from `config`.
    ///
    /// Every frame offset must lie inside the payload and point at a
    /// scanline tag.
    ///
    /// # Errors
    /// Returns [`DecodeError::InvalidConfig`] for an invalid configuration,
    /// [`DecodeError::MalformedIndex`] if a frame offset lies outside the
    /// payload, and [`DecodeError::CorruptStream`] if a frame does not start
    /// with a known tag.
    pub fn with_config(
        payload: &'a [u8],
        index: &'a VideoIndex,
        config: &CodecConfig,
    ) -> Result<Self, DecodeError> {
        config.validate()?;

        for (frame, &offset) in index.frame_offsets.iter().enumerate() {
            match payload.get(offset as usize) {
                Some(&TAG_FRESH | &TAG_REUSE) => {}
                Some(&tag) => {
                    return Err(DecodeError::corrupt(
                        offset as usize,
                        CorruptionKind::UnknownTag(tag),
                    ));
                }
                None => {
                    return Err(DecodeError::MalformedIndex(format!(
                        "frame {frame} starts at offset {offset} but the payload is {} bytes",
                        payload.len()
                    )));
                }
            }
        }

        debug!(
            "Decoder ready: {}x{}, {} frames, {} payload bytes",
            index.width,
            index.height,
            index.frame_count(),
            payload.len()
        );

        Ok(Self::unchecked(payload, index, config))
    }

    /// Create a decoder over a payload and index that already passed
    /// [`FrameDecoder::with_config`].
    pub(crate) fn unchecked(payload: &'a [u8], index: &'a VideoIndex, config: &CodecConfig) -> Self {
        Self {
            payload,
            index,
            offset_field: config.offset_field,
            max_reuse_depth: config.max_reuse_depth,
        }
    }

    /// Get the index this decoder reads frame offsets from.
    pub fn index(&self) -> &'a VideoIndex {
        self.index
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u16 {
        self.index.width
    }

    /// Frame height in scanlines.
    pub fn height(&self) -> u16 {
        self.index.height
    }

    /// Get total number of frames.
    pub fn frame_count(&self) -> usize {
        self.index.frame_count()
    }

    /// Decode a frame as RGBA into `output`, which must hold exactly
    /// `width * height * 4` bytes.
    ///
    /// # Errors
    /// Fails if the frame does not exist, the output has the wrong size, or
    /// the frame's records are corrupt.
    pub fn decode_frame(&self, frame_index: usize, output: &mut [u8]) -> Result<(), DecodeError> {
        self.decode_frame_as(frame_index, PixelFormat::Rgba, output)
    }

    /// Decode a frame as one intensity byte per pixel.
    ///
    /// # Errors
    /// Same as [`FrameDecoder::decode_frame`].
    pub fn decode_frame_gray(
        &self,
        frame_index: usize,
        output: &mut [u8],
    ) -> Result<(), DecodeError> {
        self.decode_frame_as(frame_index, PixelFormat::Gray, output)
    }

    /// Decode a frame in the given pixel format.
    ///
    /// # Errors
    /// Same as [`FrameDecoder::decode_frame`].
    pub fn decode_frame_as(
        &self,
        frame_index: usize,
        format: PixelFormat,
        output: &mut [u8],
    ) -> Result<(), DecodeError> {
        let start = self.index.frame_offset(frame_index).ok_or(
            DecodeError::FrameIndexOutOfRange {
                index: frame_index,
                frame_count: self.frame_count(),
            },
        )?;

        let expected = self.index.frame_size(format);
        if output.len() != expected {
            return Err(DecodeError::OutputSizeMismatch {
                expected,
                actual: output.len(),
            });
        }

        let row_bytes = self.index.width as usize * format.bytes_per_pixel();
        let mut chain = Vec::new();
        let mut offset = start;
        for row in 0..self.index.height as usize {
            let dst = &mut output[row * row_bytes..(row + 1) * row_bytes];
            offset = self.resolve_scanline(offset, dst, format, &mut chain)?;
        }

        Ok(())
    }

    /// Decode a frame into a freshly allocated buffer.
    ///
    /// # Errors
    /// Same as [`FrameDecoder::decode_frame`].
    pub fn decode_frame_to_vec(
        &self,
        frame_index: usize,
        format: PixelFormat,
    ) -> Result<Vec<u8>, DecodeError> {
        let mut output = vec![0u8; self.index.frame_size(format)];
        self.decode_frame_as(frame_index, format, &mut output)?;
        Ok(output)
    }

    /// Decode every frame concurrently, each into its own buffer.
    ///
    /// # Errors
    /// Returns the error of a failing frame; which one is unspecified when
    /// several frames are corrupt.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn decode_all_par(&self, format: PixelFormat) -> Result<Vec<Vec<u8>>, DecodeError> {
        (0..self.frame_count())
            .into_par_iter()
            .map(|frame_index| self.decode_frame_to_vec(frame_index, format))
            .collect()
    }

    /// Decode the whole payload front to back as gray scanlines, ignoring
    /// the index.
    ///
    /// Records are read back to back from offset 0 until the payload is
    /// exhausted; the rows are returned concatenated.
    ///
    /// # Errors
    /// Fails on the first corrupt record.
    pub fn decode_stream_gray(&self) -> Result<Vec<u8>, DecodeError> {
        let mut rows = Vec::new();
        let mut row = vec![0u8; self.index.width as usize];
        let mut chain = Vec::new();
        let mut offset = 0;

        while offset < self.payload.len() {
            offset = self.resolve_scanline(offset, &mut row, PixelFormat::Gray, &mut chain)?;
            rows.extend_from_slice(&row);
        }

        Ok(rows)
    }

    /// Create an iterator over all frames, decoded as RGBA.
    pub fn frames(&self) -> FrameIterator<'a> {
        FrameIterator {
            decoder: *self,
            current: 0,
        }
    }

    /// Resolve the record at `offset` into `dst` and return the offset of
    /// the record that follows it.
    ///
    /// A reuse record is followed by whatever comes after its own offset
    /// field, however long the chain it points into.
    fn resolve_scanline(
        &self,
        offset: usize,
        dst: &mut [u8],
        format: PixelFormat,
        chain: &mut Vec<usize>,
    ) -> Result<usize, DecodeError> {
        chain.clear();
        let mut record = offset;

        loop {
            match self.tag_at(record)? {
                TAG_FRESH => {
                    let body_end = self.expand(record + 1, dst, format)?;
                    return Ok(if chain.is_empty() {
                        body_end
                    } else {
                        offset + self.offset_field.record_len()
                    });
                }
                TAG_REUSE => {
                    chain.push(record);
                    if chain.len() > self.max_reuse_depth {
                        return Err(DecodeError::ReuseChainTooDeep {
                            offset,
                            limit: self.max_reuse_depth,
                        });
                    }

                    let target = self.reuse_target(record)?;
                    if chain.contains(&target) {
                        return Err(DecodeError::CyclicReference { offset, target });
                    }

                    trace!("Record at {record} reuses scanline at {target}");
                    record = target;
                }
                tag => {
                    return Err(DecodeError::corrupt(
                        record,
                        CorruptionKind::UnknownTag(tag),
                    ));
                }
            }
        }
    }

    /// Expand run-length pairs starting at `body` until `dst` is full.
    ///
    /// Returns the offset just past the last consumed pair.
    fn expand(&self, body: usize, dst: &mut [u8], format: PixelFormat) -> Result<usize, DecodeError> {
        let bpp = format.bytes_per_pixel();
        let width = self.index.width as usize;
        let mut cursor = body;
        let mut written = 0;

        while written < width {
            let pair = self
                .payload
                .get(cursor..cursor + 2)
                .ok_or(DecodeError::corrupt(cursor, CorruptionKind::Truncated))?;
            let (count, value) = (pair[0] as usize, pair[1]);

            if written + count > width {
                return Err(DecodeError::corrupt(
                    cursor,
                    CorruptionKind::RunOverflow {
                        pixels: written + count,
                        width,
                    },
                ));
            }

            format.fill(&mut dst[written * bpp..(written + count) * bpp], value);
            written += count;
            cursor += 2;
        }

        Ok(cursor)
    }

    fn tag_at(&self, offset: usize) -> Result<u8, DecodeError> {
        self.payload
            .get(offset)
            .copied()
            .ok_or(DecodeError::corrupt(offset, CorruptionKind::Truncated))
    }

    fn reuse_target(&self, record: usize) -> Result<usize, DecodeError> {
        let target = read_reuse_offset(self.payload, record + 1, self.offset_field)
            .ok_or(DecodeError::corrupt(record, CorruptionKind::Truncated))?;

        usize::try_from(target)
            .ok()
            .filter(|&target| target < self.payload.len())
            .ok_or(DecodeError::corrupt(
                record,
                CorruptionKind::DanglingReference(target),
            ))
    }
}

/// Iterator over decoded RGBA frames.
pub struct FrameIterator<'a> {
    decoder: FrameDecoder<'a>,
    current: usize,
}

impl Iterator for FrameIterator<'_> {
    type Item = Result<Vec<u8>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.decoder.frame_count() {
            return None;
        }

        let result = self
            .decoder
            .decode_frame_to_vec(self.current, PixelFormat::Rgba);
        self.current += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.decoder.frame_count() - self.current;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIterator<'_> {}

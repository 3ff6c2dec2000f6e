//! Video encoder producing payload and index streams from grayscale frames.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::debug;

use super::format::{
    INDEX_ENTRY_SIZE, INDEX_HEADER_SIZE, OffsetField, TAG_FRESH, TAG_REUSE, push_reuse_offset,
    write_index_entry, write_index_header,
};
use crate::schema::CodecConfig;

/// Encoder writing scanline records to a payload stream and frame offsets
/// to an index stream.
///
/// Each frame row becomes one record. With `reuse_scanlines` enabled, a row
/// identical to one already stored becomes a reference to that record.
///
/// Usage:
/// ```ignore
/// let mut encoder = VideoEncoder::create("video.pop", "video.idx", 320, 240, &config)?;
/// for frame in frames {
///     encoder.encode_frame(&frame)?;
/// }
/// let stats = encoder.finalize()?;
/// ```
pub struct VideoEncoder<P: Write, I: Write> {
    payload: P,
    index: I,
    width: u16,
    height: u16,
    offset_field: OffsetField,
    reuse_scanlines: bool,
    max_run: u8,
    /// Bytes written to the payload so far.
    position: u64,
    frames_written: u64,
    fresh_scanlines: u64,
    reused_scanlines: u64,
    /// Payload offset of the fresh record stored for each distinct row.
    stored_rows: HashMap<Vec<u8>, u64>,
    /// Pre-allocated buffer for one record.
    record: Vec<u8>,
}

impl VideoEncoder<BufWriter<File>, BufWriter<File>> {
    /// Create an encoder writing to a payload file and an index file.
    pub fn create<P: AsRef<Path>, Q: AsRef<Path>>(
        payload_path: P,
        index_path: Q,
        width: u16,
        height: u16,
        config: &CodecConfig,
    ) -> io::Result<Self> {
        let payload = BufWriter::new(File::create(payload_path)?);
        let index = BufWriter::new(File::create(index_path)?);
        Self::new(payload, index, width, height, config)
    }
}

impl<P: Write, I: Write> VideoEncoder<P, I> {
    /// Create an encoder and write the index header.
    pub fn new(
        payload: P,
        mut index: I,
        width: u16,
        height: u16,
        config: &CodecConfig,
    ) -> io::Result<Self> {
        config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // Every frame must emit at least one record for its index offset to
        // land inside the payload.
        if width == 0 || height == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Frames must be non-empty ({width}x{height})"),
            ));
        }

        write_index_header(&mut index, width, height)?;

        Ok(Self {
            payload,
            index,
            width,
            height,
            offset_field: config.offset_field,
            reuse_scanlines: config.reuse_scanlines,
            max_run: config.max_run,
            position: 0,
            frames_written: 0,
            fresh_scanlines: 0,
            reused_scanlines: 0,
            stored_rows: HashMap::new(),
            record: Vec::with_capacity(width as usize * 2 + 1),
        })
    }

    /// Encode one frame of `width * height` intensity bytes, row by row.
    pub fn encode_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let width = self.width as usize;
        let expected = width * self.height as usize;
        if frame.len() != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame size mismatch: {} bytes vs {}x{}",
                    frame.len(),
                    self.width,
                    self.height
                ),
            ));
        }

        // The index stores 32-bit offsets.
        let frame_offset = u32::try_from(self.position).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Payload offset {} does not fit in a 32-bit index entry",
                    self.position
                ),
            )
        })?;
        write_index_entry(&mut self.index, frame_offset)?;

        for row in 0..self.height as usize {
            self.encode_scanline(&frame[row * width..(row + 1) * width])?;
        }

        self.frames_written += 1;
        Ok(())
    }

    fn encode_scanline(&mut self, line: &[u8]) -> io::Result<()> {
        self.record.clear();

        let stored = if self.reuse_scanlines {
            self.stored_rows.get(line).copied()
        } else {
            None
        };

        match stored {
            Some(target) => {
                self.record.push(TAG_REUSE);
                push_reuse_offset(&mut self.record, target, self.offset_field);
                self.reused_scanlines += 1;
            }
            None => {
                self.record.push(TAG_FRESH);
                push_runs(&mut self.record, line, self.max_run);
                if self.reuse_scanlines {
                    self.stored_rows.insert(line.to_vec(), self.position);
                }
                self.fresh_scanlines += 1;
            }
        }

        self.payload.write_all(&self.record)?;
        self.position += self.record.len() as u64;
        Ok(())
    }

    /// Flush both streams and report what was written.
    pub fn finalize(mut self) -> io::Result<EncodeStats> {
        self.payload.flush()?;
        self.index.flush()?;

        let stats = EncodeStats {
            frame_count: self.frames_written,
            payload_bytes: self.position,
            index_bytes: (INDEX_HEADER_SIZE as u64)
                + self.frames_written * INDEX_ENTRY_SIZE as u64,
            fresh_scanlines: self.fresh_scanlines,
            reused_scanlines: self.reused_scanlines,
        };
        debug!("Encoding finished: {stats}");

        Ok(stats)
    }

    /// Get number of frames encoded so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

/// Append `(count, value)` pairs covering `line`, splitting runs at `max_run`.
fn push_runs(out: &mut Vec<u8>, line: &[u8], max_run: u8) {
    let mut pixels = line.iter().copied().peekable();
    while let Some(value) = pixels.next() {
        let mut count = 1u8;
        while count < max_run && pixels.next_if_eq(&value).is_some() {
            count += 1;
        }
        out.push(count);
        out.push(value);
    }
}

/// Statistics from an encoding session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeStats {
    /// Total frames encoded.
    pub frame_count: u64,
    /// Size of the payload stream.
    pub payload_bytes: u64,
    /// Size of the index stream.
    pub index_bytes: u64,
    /// Rows stored as run-length records.
    pub fresh_scanlines: u64,
    /// Rows stored as references to earlier records.
    pub reused_scanlines: u64,
}

impl std::fmt::Display for EncodeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} payload bytes, {} index bytes, {} fresh / {} reused scanlines",
            self.frame_count,
            self.payload_bytes,
            self.index_bytes,
            self.fresh_scanlines,
            self.reused_scanlines
        )
    }
}

//! Pop Video - Decoder and encoder for `.pop`/`.idx` grayscale videos.
//!
//! A video is stored as an index buffer (frame geometry and per-frame
//! payload offsets) and a payload buffer of run-length encoded scanlines,
//! where repeated scanlines are stored once and referenced by offset.
//!
//! # Architecture
//!
//! - `codec`: index parsing, frame decoding and encoding
//! - `schema`: JSON configuration shared by the codec and CLI
//!
//! # Example
//!
//! ```rust,no_run
//! use pop_video::codec::{FrameDecoder, PixelFormat, VideoIndex};
//!
//! let index_bytes = std::fs::read("video.idx").unwrap();
//! let payload = std::fs::read("video.pop").unwrap();
//!
//! let index = VideoIndex::parse(&index_bytes).unwrap();
//! let decoder = FrameDecoder::new(&payload, &index).unwrap();
//!
//! let mut rgba = vec![0u8; index.frame_size(PixelFormat::Rgba)];
//! for frame in 0..decoder.frame_count() {
//!     decoder.decode_frame(frame, &mut rgba).unwrap();
//! }
//! ```

pub mod codec;
pub mod schema;

// WebAssembly bindings (only for wasm32 target)
#[cfg(target_arch = "wasm32")]
pub mod wasm;

// Re-export commonly used types
pub use codec::{DecodeError, FrameDecoder, PixelFormat, VideoEncoder, VideoIndex};
pub use schema::CodecConfig;

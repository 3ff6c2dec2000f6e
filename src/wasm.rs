//! WebAssembly bindings for browser playback.
//!
//! The playback page fetches `video.pop` and `video.idx`, builds a
//! [`WasmDecoder`] from both buffers and decodes each displayed frame into
//! the pixel data of an `ImageData` of matching size.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::{
    codec::{FrameDecoder, VideoIndex},
    schema::CodecConfig,
};

/// Initialize WASM module with panic hook and logging.
#[wasm_bindgen(start)]
pub fn init() {
    // Set panic hook for better error messages in browser
    console_error_panic_hook::set_once();

    // Initialize WASM logger
    wasm_logger::init(wasm_logger::Config::default());
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoInfo {
    width: u16,
    height: u16,
    num_frames: usize,
}

/// WebAssembly wrapper owning a video's payload and parsed index.
#[wasm_bindgen]
pub struct WasmDecoder {
    payload: Vec<u8>,
    index: VideoIndex,
    config: CodecConfig,
}

#[wasm_bindgen]
impl WasmDecoder {
    /// Create a decoder from the payload and index buffers.
    ///
    /// # Arguments
    /// * `payload` - Contents of `video.pop`
    /// * `index` - Contents of `video.idx`
    /// * `config_json` - Optional JSON string containing CodecConfig
    #[wasm_bindgen(constructor)]
    pub fn new(
        payload: Vec<u8>,
        index: &[u8],
        config_json: Option<String>,
    ) -> Result<WasmDecoder, JsValue> {
        let config: CodecConfig = match config_json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| JsValue::from_str(&format!("Invalid config JSON: {e}")))?,
            None => CodecConfig::default(),
        };

        let index = VideoIndex::parse(index).map_err(to_js)?;
        FrameDecoder::with_config(&payload, &index, &config).map_err(to_js)?;

        Ok(WasmDecoder {
            payload,
            index,
            config,
        })
    }

    /// Frame width in pixels.
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u16 {
        self.index.width
    }

    /// Frame height in pixels.
    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u16 {
        self.index.height
    }

    /// Number of frames in the video.
    #[wasm_bindgen(getter, js_name = numFrames)]
    pub fn num_frames(&self) -> usize {
        self.index.frame_count()
    }

    /// Get `{ width, height, numFrames }` as a plain object.
    #[wasm_bindgen(js_name = getInfo)]
    pub fn get_info(&self) -> Result<JsValue, JsValue> {
        let info = VideoInfo {
            width: self.index.width,
            height: self.index.height,
            num_frames: self.index.frame_count(),
        };
        serde_wasm_bindgen::to_value(&info).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Decode a frame as RGBA into `output` (`width * height * 4` bytes).
    #[wasm_bindgen(js_name = decodeFrame)]
    pub fn decode_frame(&self, frame_index: i32, output: &mut [u8]) -> Result<(), JsValue> {
        let frame_count = self.index.frame_count();
        let frame_index = usize::try_from(frame_index).map_err(|_| {
            JsValue::from_str(&format!(
                "Frame index {frame_index} out of range ({frame_count} frames)"
            ))
        })?;

        // Offsets and config were validated in the constructor.
        FrameDecoder::unchecked(&self.payload, &self.index, &self.config)
            .decode_frame(frame_index, output)
            .map_err(to_js)
    }
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{TAG_FRESH, TAG_REUSE};
    use wasm_bindgen_test::wasm_bindgen_test;

    fn index_bytes() -> Vec<u8> {
        vec![4, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5, 0, 0, 0, 0, 0, 0, 0]
    }

    fn payload() -> Vec<u8> {
        vec![TAG_FRESH, 2, 10, 2, 20, TAG_REUSE, 0, 0, 0, 0, 0, 0, 0]
    }

    #[wasm_bindgen_test]
    fn test_decode_frames() {
        let decoder = WasmDecoder::new(payload(), &index_bytes(), None).unwrap();
        assert_eq!(decoder.width(), 4);
        assert_eq!(decoder.height(), 1);
        assert_eq!(decoder.num_frames(), 2);

        let mut first = vec![0u8; 16];
        let mut second = vec![0u8; 16];
        decoder.decode_frame(0, &mut first).unwrap();
        decoder.decode_frame(1, &mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(&first[..4], &[10, 10, 10, 255]);
    }

    #[wasm_bindgen_test]
    fn test_invalid_config_rejected() {
        let config = Some(r#"{"max_reuse_depth": 0}"#.to_string());
        assert!(WasmDecoder::new(payload(), &index_bytes(), config).is_err());
    }

    #[wasm_bindgen_test]
    fn test_negative_frame_index() {
        let decoder = WasmDecoder::new(payload(), &index_bytes(), None).unwrap();
        let mut output = vec![0u8; 16];
        assert!(decoder.decode_frame(-1, &mut output).is_err());
        assert!(decoder.decode_frame(2, &mut output).is_err());
    }
}

//! CLI integration tests for pop-video.
//!
//! Runs the built binary against small videos written to a temp directory.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pop-video"))
        .args(args)
        .output()
        .expect("Failed to execute pop-video")
}

fn stderr_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// 2x2 video with one frame, stored with 8-byte reuse offsets.
///
/// The frame starts at byte 3 with a reuse of the row at byte 0 and
/// continues with a fresh row at byte 12.
struct WideVideo {
    dir: TempDir,
    payload: String,
    index: String,
    config: String,
}

impl WideVideo {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = |name: &str| dir.path().join(name).to_string_lossy().into_owned();
        let payload = path("video.pop");
        let index = path("video.idx");
        let config = path("config.json");

        let mut bytes = vec![0x7A, 2, 9, 0x33];
        bytes.extend_from_slice(&[0; 8]);
        bytes.extend_from_slice(&[0x7A, 2, 4]);
        fs::write(&payload, bytes).unwrap();
        fs::write(&index, [2, 0, 2, 0, 3, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        fs::write(&config, r#"{"offset_field": "wide"}"#).unwrap();

        Self {
            dir,
            payload,
            index,
            config,
        }
    }

    fn out(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }
}

#[test]
fn test_frame_with_wide_config() {
    let video = WideVideo::new();
    let out = video.out("frame.pgm");

    let output = run(&[
        "frame",
        &video.payload,
        &video.index,
        "0",
        &out,
        &video.config,
    ]);
    assert!(output.status.success(), "{}", stderr_string(&output));

    let mut expected = b"P5\n2 2\n255\n".to_vec();
    expected.extend_from_slice(&[9, 9, 4, 4]);
    assert_eq!(fs::read(&out).unwrap(), expected);
}

#[test]
fn test_dump_with_wide_config() {
    let video = WideVideo::new();
    let out = video.out("dump.raw");

    let output = run(&["dump", &video.payload, &video.index, &out, &video.config]);
    assert!(output.status.success(), "{}", stderr_string(&output));

    assert_eq!(fs::read(&out).unwrap(), [2u8, 0, 2, 0, 9, 9, 9, 9, 4, 4]);
}

#[test]
fn test_wide_stream_fails_with_default_config() {
    let video = WideVideo::new();

    let output = run(&[
        "frame",
        &video.payload,
        &video.index,
        "0",
        &video.out("frame.pgm"),
    ]);
    assert!(!output.status.success());
    assert!(stderr_string(&output).contains("Error"));

    let output = run(&["dump", &video.payload, &video.index, &video.out("dump.raw")]);
    assert!(!output.status.success());
}

#[test]
fn test_invalid_config_rejected() {
    let video = WideVideo::new();
    let config = video.out("bad.json");
    fs::write(&config, r#"{"max_run": 0}"#).unwrap();

    let output = run(&["dump", &video.payload, &video.index, &video.out("dump.raw"), &config]);
    assert!(!output.status.success());
    assert!(stderr_string(&output).contains("Maximum run length"));
}

#[test]
fn test_usage_on_missing_arguments() {
    let output = run(&["frame"]);
    assert!(!output.status.success());
    assert!(stderr_string(&output).contains("Usage"));
}

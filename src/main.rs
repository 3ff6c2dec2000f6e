//! Pop Video CLI - Inspect, decode and encode `.pop`/`.idx` videos.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::time::Instant;

use log::info;
use pop_video::{
    codec::{FrameDecoder, PixelFormat, RawVideo, VideoEncoder, VideoIndex, write_raw_header},
    schema::CodecConfig,
};

type CliResult = Result<(), Box<dyn Error>>;

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("pop-video", String::as_str);
    let arg = |i: usize| args.get(i).map(String::as_str);

    let result = match (arg(1), args.len()) {
        (Some("--example"), _) => {
            print_example_config();
            Ok(())
        }
        (Some("info"), 4) => print_info(&args[2], &args[3]),
        (Some("verify"), 4 | 5) => verify(&args[2], &args[3], arg(4)),
        (Some("frame"), 6 | 7) => export_frame(&args[2], &args[3], &args[4], &args[5], arg(6)),
        (Some("dump"), 5 | 6) => dump(&args[2], &args[3], &args[4], arg(5)),
        (Some("encode"), 5 | 6) => encode(&args[2], &args[3], &args[4], arg(5)),
        _ => {
            print_usage(program);
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <command> [arguments]", program);
    eprintln!();
    eprintln!("Decode and encode .pop/.idx grayscale videos.");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  info <video.pop> <video.idx>                                Show dimensions and frame count");
    eprintln!("  verify <video.pop> <video.idx> [config.json]                Decode every frame");
    eprintln!("  frame <video.pop> <video.idx> <n> <out.pgm> [config.json]   Export frame n as PGM");
    eprintln!("  dump <video.pop> <video.idx> <out.raw> [config.json]        Decode the whole payload to raw gray");
    eprintln!("  encode <in.raw> <out.pop> <out.idx> [config.json]           Encode raw gray frames");
    eprintln!("  --example                                                   Print the default configuration");
    eprintln!();
    eprintln!("Streams whose reuse records carry 8-byte offsets need {{\"offset_field\": \"wide\"}} in config.json.");
}

fn load_config(path: Option<&str>) -> Result<CodecConfig, Box<dyn Error>> {
    let config = match path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => CodecConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn load_video(payload_path: &str, index_path: &str) -> Result<(Vec<u8>, VideoIndex), Box<dyn Error>> {
    let payload = fs::read(payload_path)?;
    let index = VideoIndex::parse(&fs::read(index_path)?)?;
    info!(
        "Loaded {} ({} bytes) and {} ({} frames)",
        payload_path,
        payload.len(),
        index_path,
        index.frame_count()
    );
    Ok((payload, index))
}

fn print_info(payload_path: &str, index_path: &str) -> CliResult {
    let (payload, index) = load_video(payload_path, index_path)?;

    println!("Pop Video");
    println!("=========");
    println!("Dimensions: {}x{}", index.width, index.height);
    println!("Frames: {}", index.frame_count());
    println!("Payload: {} bytes", payload.len());

    let raw_size = index.frame_size(PixelFormat::Gray) * index.frame_count();
    if !payload.is_empty() {
        println!(
            "Compression: {:.1}x vs raw gray",
            raw_size as f64 / payload.len() as f64
        );
    }
    Ok(())
}

fn verify(payload_path: &str, index_path: &str, config_path: Option<&str>) -> CliResult {
    let config = load_config(config_path)?;
    let (payload, index) = load_video(payload_path, index_path)?;
    let decoder = FrameDecoder::with_config(&payload, &index, &config)?;

    println!("Decoding {} frames...", decoder.frame_count());
    let start = Instant::now();
    let frames = decoder.decode_all_par(PixelFormat::Rgba)?;
    let elapsed = start.elapsed();

    println!(
        "Decoded {} frames in {:.3}s ({:.1} frames/s)",
        frames.len(),
        elapsed.as_secs_f32(),
        frames.len() as f32 / elapsed.as_secs_f32().max(f32::EPSILON)
    );
    Ok(())
}

fn export_frame(
    payload_path: &str,
    index_path: &str,
    frame: &str,
    out_path: &str,
    config_path: Option<&str>,
) -> CliResult {
    let frame_index: usize = frame.parse()?;
    let config = load_config(config_path)?;
    let (payload, index) = load_video(payload_path, index_path)?;
    let decoder = FrameDecoder::with_config(&payload, &index, &config)?;
    let gray = decoder.decode_frame_to_vec(frame_index, PixelFormat::Gray)?;

    let mut out = BufWriter::new(File::create(out_path)?);
    write!(out, "P5\n{} {}\n255\n", index.width, index.height)?;
    out.write_all(&gray)?;
    out.flush()?;

    println!("Wrote frame {} to {}", frame_index, out_path);
    Ok(())
}

fn dump(payload_path: &str, index_path: &str, out_path: &str, config_path: Option<&str>) -> CliResult {
    let config = load_config(config_path)?;
    let (payload, index) = load_video(payload_path, index_path)?;
    let decoder = FrameDecoder::with_config(&payload, &index, &config)?;
    let rows = decoder.decode_stream_gray()?;

    let mut out = BufWriter::new(File::create(out_path)?);
    write_raw_header(&mut out, index.width, index.height)?;
    out.write_all(&rows)?;
    out.flush()?;

    let row_count = if index.width == 0 {
        0
    } else {
        rows.len() / index.width as usize
    };
    println!("Wrote {} scanlines to {}", row_count, out_path);
    Ok(())
}

fn encode(raw_path: &str, payload_path: &str, index_path: &str, config_path: Option<&str>) -> CliResult {
    let config = load_config(config_path)?;
    let bytes = fs::read(raw_path)?;
    let raw = RawVideo::parse(&bytes)?;

    println!("{}x{}, {} frames", raw.width, raw.height, raw.frame_count());

    let mut encoder = VideoEncoder::create(payload_path, index_path, raw.width, raw.height, &config)?;
    for frame in raw.frames() {
        encoder.encode_frame(frame)?;
    }
    let stats = encoder.finalize()?;

    println!("{}", stats);
    Ok(())
}

fn print_example_config() {
    let config = CodecConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}

//! voicefx-record - record the default microphone through the varispeed transform
//!
//! # Usage
//!
//! ```bash
//! # Five seconds, voice unchanged
//! voicefx-record
//!
//! # Ten seconds, higher and faster
//! voicefx-record --seconds 10 --pitch 750 --rate 600 out.wav
//! ```
//!
//! Positions are slider values in `0..=1000`; 500 leaves the voice unchanged.
//! Set `RUST_LOG=debug` for per-chunk logging.

use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use clap::Parser;
use voicefx_core::{CaptureConfiguration, CaptureError, CaptureSession, Recorder, VarispeedEngine};
use voicefx_cpal::CpalMicCapture;

#[derive(Parser, Debug)]
#[command(name = "voicefx-record")]
#[command(about = "Record the microphone with pitch and rate effects to a WAV file", long_about = None)]
struct Args {
    /// Output WAV file
    #[arg(value_name = "FILE", default_value = "record_temp.wav")]
    output: PathBuf,

    /// Recording length in seconds
    #[arg(short, long, default_value_t = 5)]
    seconds: u64,

    /// Pitch slider position (500 = unchanged)
    #[arg(short, long, default_value_t = 500, value_parser = clap::value_parser!(u32).range(0..=1000))]
    pitch: u32,

    /// Rate slider position (500 = unchanged)
    #[arg(short, long, default_value_t = 500, value_parser = clap::value_parser!(u32).range(0..=1000))]
    rate: u32,

    /// Finalize after this many seconds of audio even if --seconds is longer
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    max_seconds: u64,

    /// Skip the .metadata.json sidecar
    #[arg(long)]
    no_metadata: bool,
}

fn record(args: Args) -> Result<(), CaptureError> {
    let config = CaptureConfiguration {
        output_path: args.output,
        flush_on_stop: true,
        write_metadata: !args.no_metadata,
        max_duration: Some(Duration::from_secs(args.max_seconds)),
        ..Default::default()
    };
    let mic = CpalMicCapture::default_device(config.sample_rate);
    let session = CaptureSession::<VarispeedEngine>::with_default_engine(config);
    let mut recorder = Recorder::new(mic, session);

    let pitch = recorder.set_pitch_position(args.pitch);
    let rate = recorder.set_rate_position(args.rate);
    log::info!("pitch x{:.3}, rate x{:.3}", pitch, rate);

    recorder.start()?;
    thread::sleep(Duration::from_secs(args.seconds));
    let result = recorder.stop()?;

    println!(
        "{}: {:.2}s, {} bytes, sha256 {}",
        result.file_path.display(),
        result.duration_secs,
        result.data_bytes,
        result.checksum
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = record(args) {
        eprintln!("Error: recording failed: {}", e);
        process::exit(1);
    }
}

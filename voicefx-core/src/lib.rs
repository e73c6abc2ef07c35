//! # voicefx-core
//!
//! Platform-agnostic core of the voice effect recorder.
//!
//! Captured PCM chunks are pushed through a streaming pitch/rate transform
//! and appended to a WAV file whose header is finalized once recording stops.
//! Platform backends implement the `CaptureProvider` trait and plug into
//! `Recorder`; transforms implement `TransformEngine`.
//!
//! ## Architecture
//!
//! ```text
//! voicefx-core (this crate)
//! ├── traits/       ← CaptureProvider, TransformEngine, CaptureDelegate
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, AudioChunk, etc.
//! ├── processing/   ← WAV header codec, ParameterMapper, engines, PCM helpers
//! ├── session/      ← CaptureSession (orchestrator), Recorder
//! └── storage/      ← WaveFileWriter, finalize, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioChunk, CaptureSessionDiagnostics, ChunkOutcome, TransformParameters};
pub use models::config::CaptureConfiguration;
pub use models::error::{CaptureError, ErrorKind};
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::CaptureState;
pub use processing::parameter_mapper::ParameterMapper;
pub use processing::passthrough::PassthroughEngine;
pub use processing::varispeed::VarispeedEngine;
pub use processing::wav_format::{WavHeader, WaveFormat};
pub use session::capture_session::{CaptureSession, EventOutcome};
pub use session::recorder::Recorder;
pub use storage::wave_writer::{finalize, ClosedWave, WaveFileWriter};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_provider::{CaptureEvent, CaptureProvider, ChunkCallback};
pub use traits::transform_engine::TransformEngine;

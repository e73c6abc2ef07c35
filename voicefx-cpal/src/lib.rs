//! # voicefx-cpal
//!
//! Microphone backend for `voicefx-core`, built on cpal.
//!
//! Provides:
//! - `ChunkAssembler`: device buffers → fixed-size mono 16-bit PCM chunks
//! - `CpalMicCapture`: `CaptureProvider` over a cpal input stream (feature `cpal`)
//!
//! The `voicefx-record` binary wires `CpalMicCapture` to a `Recorder`.

pub mod chunker;

#[cfg(feature = "cpal")]
pub mod cpal_mic;

pub use chunker::ChunkAssembler;

#[cfg(feature = "cpal")]
pub use cpal_mic::CpalMicCapture;

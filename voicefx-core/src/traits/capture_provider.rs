use std::sync::Arc;

use crate::models::audio_models::AudioChunk;
use crate::models::error::CaptureError;

/// Lifecycle event emitted by a capture source.
///
/// A source emits `Started` once, zero or more `Chunk`s, then exactly one
/// `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent<'a> {
    Started,
    Chunk(AudioChunk<'a>),
    Stopped,
}

/// Callback invoked for every delivered PCM chunk.
///
/// Chunks are mono 16-bit little-endian PCM at the configured sample rate.
/// The callback runs on the capture thread and returns only once the chunk
/// has been fully processed, which throttles capture to real time.
pub type ChunkCallback = Arc<dyn Fn(AudioChunk<'_>) + Send + Sync + 'static>;

/// Interface for microphone capture sources.
pub trait CaptureProvider: Send + Sync {
    /// Whether this capture source is currently available.
    fn is_available(&self) -> bool;

    /// Start capturing, delivering chunks via `callback` on a capture thread.
    fn start(&mut self, callback: ChunkCallback) -> Result<(), CaptureError>;

    /// Stop capturing. Once this returns no callback is in flight.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Human-readable name of the device backing this provider.
    fn device_name(&self) -> String;
}

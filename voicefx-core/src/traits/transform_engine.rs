use crate::models::error::CaptureError;

/// Streaming pitch/rate transform.
///
/// The engine is stateful: it buffers fed input internally and yields output
/// on demand, and input and output chunk boundaries need not line up. A
/// single `feed` may produce no output at all and a later one a burst.
///
/// Samples cross the boundary as little-endian 16-bit PCM bytes.
///
/// Lifecycle: `configure` once, any number of `set_pitch`/`set_rate`/`feed`/
/// `drain` calls, then `release` exactly once.
pub trait TransformEngine: Send {
    /// Prepare for a stream of `channels` interleaved channels at `sample_rate`.
    fn configure(&mut self, channels: u16, sample_rate: u32) -> Result<(), CaptureError>;

    /// Pitch multiplier, effective for subsequent feeds. 1.0 is unchanged.
    fn set_pitch(&mut self, factor: f64);

    /// Rate multiplier, effective for subsequent feeds. 1.0 is unchanged.
    fn set_rate(&mut self, factor: f64);

    /// Push PCM bytes into the engine.
    fn feed(&mut self, pcm: &[u8]) -> Result<(), CaptureError>;

    /// Copy available output into `out`, returning the byte count.
    ///
    /// Zero means nothing is available right now, not end of stream.
    fn drain(&mut self, out: &mut [u8]) -> Result<usize, CaptureError>;

    /// Push any internally held input through so the next drains return it.
    fn flush(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Free engine resources. Called exactly once per `configure`.
    fn release(&mut self);
}

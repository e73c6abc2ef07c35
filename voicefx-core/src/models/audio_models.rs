use std::sync::atomic::{AtomicU64, Ordering};

/// A span of PCM bytes delivered by the capture source.
///
/// The delivered buffer may be larger than the valid data; only the first
/// `valid_len` bytes are audio. Borrowed for the duration of one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioChunk<'a> {
    buffer: &'a [u8],
    valid_len: usize,
}

impl<'a> AudioChunk<'a> {
    /// A chunk whose first `valid_len` bytes of `buffer` are valid.
    ///
    /// A `valid_len` past the end of the buffer is clamped to its length.
    pub fn new(buffer: &'a [u8], valid_len: usize) -> Self {
        Self {
            buffer,
            valid_len: valid_len.min(buffer.len()),
        }
    }

    /// A chunk that is valid end to end.
    pub fn full(buffer: &'a [u8]) -> Self {
        Self::new(buffer, buffer.len())
    }

    /// The valid PCM bytes.
    pub fn bytes(&self) -> &'a [u8] {
        &self.buffer[..self.valid_len]
    }

    pub fn len(&self) -> usize {
        self.valid_len
    }

    pub fn is_empty(&self) -> bool {
        self.valid_len == 0
    }
}

/// Pitch and rate multipliers shared between the control thread and the
/// capture thread.
///
/// Each factor is stored as the bit pattern of an `f64` in its own atomic,
/// so every read and write of a single field is one word access. The two
/// fields are independent; no ordering between them is promised.
#[derive(Debug)]
pub struct TransformParameters {
    pitch: AtomicU64,
    rate: AtomicU64,
}

impl TransformParameters {
    pub fn new(pitch: f64, rate: f64) -> Self {
        Self {
            pitch: AtomicU64::new(sanitize(pitch).to_bits()),
            rate: AtomicU64::new(sanitize(rate).to_bits()),
        }
    }

    pub fn pitch(&self) -> f64 {
        f64::from_bits(self.pitch.load(Ordering::Relaxed))
    }

    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Relaxed))
    }

    /// Set the pitch multiplier. Non-positive or non-finite values fall back to 1.0.
    pub fn set_pitch(&self, pitch: f64) {
        self.pitch.store(sanitize(pitch).to_bits(), Ordering::Relaxed);
    }

    /// Set the rate multiplier. Non-positive or non-finite values fall back to 1.0.
    pub fn set_rate(&self, rate: f64) {
        self.rate.store(sanitize(rate).to_bits(), Ordering::Relaxed);
    }

    /// Read both factors, one access each.
    pub fn snapshot(&self) -> (f64, f64) {
        (self.pitch(), self.rate())
    }
}

impl Default for TransformParameters {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

fn sanitize(factor: f64) -> f64 {
    if factor.is_finite() && factor > 0.0 {
        factor
    } else {
        1.0
    }
}

/// What one `on_chunk` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Valid input bytes fed to the engine.
    pub bytes_fed: usize,
    /// Bytes appended to the container.
    pub bytes_written: usize,
    /// Non-empty drain pulls (one append each).
    pub appends: usize,
    /// The maximum length was reached and the recording was finalized.
    pub limit_reached: bool,
}

/// Counters for debugging capture sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSessionDiagnostics {
    pub chunks_received: u64,
    pub bytes_fed: u64,
    pub bytes_written: u64,
    pub drain_pulls: u64,
    pub engine_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn chunk_exposes_only_valid_bytes() {
        let buffer = [1u8, 2, 3, 4, 5, 6];
        let chunk = AudioChunk::new(&buffer, 4);
        assert_eq!(chunk.bytes(), &[1, 2, 3, 4]);
        assert_eq!(chunk.len(), 4);
    }

    #[test]
    fn chunk_clamps_oversized_valid_length() {
        let buffer = [9u8; 8];
        let chunk = AudioChunk::new(&buffer, 100);
        assert_eq!(chunk.len(), 8);
        assert!(AudioChunk::new(&buffer, 0).is_empty());
    }

    #[test]
    fn parameters_round_trip_through_atomics() {
        let params = TransformParameters::default();
        assert_eq!(params.snapshot(), (1.0, 1.0));

        params.set_pitch(2.5);
        params.set_rate(0.25);
        assert_relative_eq!(params.pitch(), 2.5);
        assert_relative_eq!(params.rate(), 0.25);
    }

    #[test]
    fn invalid_factors_fall_back_to_neutral() {
        let params = TransformParameters::new(-1.0, f64::NAN);
        assert_eq!(params.snapshot(), (1.0, 1.0));

        params.set_rate(0.0);
        assert_eq!(params.rate(), 1.0);
    }
}

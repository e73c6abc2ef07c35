//! Turns device callback buffers into fixed-size PCM chunks.
//!
//! Devices deliver float frames at their own rate, channel count and buffer
//! size. The session wants mono 16-bit little-endian PCM at the configured
//! rate, in chunks of a steady size.

use voicefx_core::models::audio_models::AudioChunk;
use voicefx_core::processing::pcm::{self, StreamingResampler};

/// Chunk size the recorder delivers by default: 128 ms of 16 kHz mono.
pub const DEFAULT_CHUNK_BYTES: usize = 4096;

/// Accumulates converted PCM and emits it in `chunk_bytes` pieces.
///
/// Rate conversion is continuous across device buffers, so no samples are
/// lost or duplicated at buffer boundaries.
#[derive(Debug)]
pub struct ChunkAssembler {
    resampler: StreamingResampler,
    chunk_bytes: usize,
    converted: Vec<f32>,
    pending: Vec<u8>,
}

impl ChunkAssembler {
    /// `chunk_bytes` is rounded down to whole samples, with a floor of one sample.
    pub fn new(target_rate: u32, chunk_bytes: usize) -> Self {
        let chunk_bytes = (chunk_bytes & !1).max(2);
        Self {
            resampler: StreamingResampler::new(target_rate),
            chunk_bytes,
            converted: Vec::new(),
            pending: Vec::with_capacity(chunk_bytes * 2),
        }
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// Bytes held back waiting for a full chunk.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Convert one device buffer and emit every chunk it completes.
    pub fn push(&mut self, samples: &[f32], source_rate: u32, channels: u16, mut emit: impl FnMut(AudioChunk<'_>)) {
        let mono = pcm::downmix_to_mono(samples, channels as usize);
        self.converted.clear();
        self.resampler.process(&mono, source_rate, &mut self.converted);
        self.pending.extend_from_slice(&pcm::f32_to_pcm16(&self.converted));
        self.emit_full_chunks(&mut emit);
    }

    /// Convert the held-back tail and emit everything left, the last chunk short.
    pub fn finish(&mut self, mut emit: impl FnMut(AudioChunk<'_>)) {
        self.converted.clear();
        self.resampler.finish(&mut self.converted);
        self.pending.extend_from_slice(&pcm::f32_to_pcm16(&self.converted));
        self.emit_full_chunks(&mut emit);

        if !self.pending.is_empty() {
            emit(AudioChunk::full(&self.pending));
            self.pending.clear();
        }
    }

    fn emit_full_chunks(&mut self, emit: &mut impl FnMut(AudioChunk<'_>)) {
        let mut offset = 0;
        while self.pending.len() - offset >= self.chunk_bytes {
            emit(AudioChunk::full(&self.pending[offset..offset + self.chunk_bytes]));
            offset += self.chunk_bytes;
        }
        self.pending.drain(..offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn collect(assembler: &mut ChunkAssembler, samples: &[f32], rate: u32, channels: u16) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        assembler.push(samples, rate, channels, |chunk| chunks.push(chunk.bytes().to_vec()));
        chunks
    }

    fn finish(assembler: &mut ChunkAssembler) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        assembler.finish(|chunk| chunks.push(chunk.bytes().to_vec()));
        chunks
    }

    #[test]
    fn emits_fixed_size_chunks_and_holds_the_rest() {
        let mut assembler = ChunkAssembler::new(16000, 100);
        let chunks = collect(&mut assembler, &[0.0; 120], 16000, 1);

        // The newest sample waits for its successor.
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 100));
        assert_eq!(assembler.pending(), 38);
    }

    #[test]
    fn pending_bytes_complete_the_next_chunk() {
        let mut assembler = ChunkAssembler::new(16000, 100);
        collect(&mut assembler, &[0.5; 30], 16000, 1);
        assert_eq!(assembler.pending(), 58);

        let chunks = collect(&mut assembler, &[0.5; 21], 16000, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn stereo_input_is_downmixed() {
        let mut assembler = ChunkAssembler::new(16000, 4);
        let mut chunks = collect(&mut assembler, &[1.0, 0.0, -1.0, 0.0], 16000, 2);
        chunks.extend(finish(&mut assembler));

        let samples: Vec<i16> = chunks.iter().flat_map(|c| pcm::pcm16_to_i16(c)).collect();
        assert_eq!(samples.len(), 2);
        assert_abs_diff_eq!(pcm::i16_to_f32(samples[0]), 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(pcm::i16_to_f32(samples[1]), -0.5, epsilon = 1e-3);
    }

    #[test]
    fn device_rate_is_converted_to_target_rate() {
        let mut assembler = ChunkAssembler::new(16000, 1 << 20);
        collect(&mut assembler, &[0.0; 480], 48000, 1);
        assert_eq!(assembler.pending(), 160 * 2);
    }

    #[test]
    fn odd_sized_device_buffers_lose_no_audio() {
        let input: Vec<f32> = (0..44100).map(|i| ((i as f32) * 0.003).sin() * 0.5).collect();
        let mut assembler = ChunkAssembler::new(16000, DEFAULT_CHUNK_BYTES);

        let mut total = 0;
        for buffer in input.chunks(441 * 2 + 7) {
            for chunk in collect(&mut assembler, buffer, 44100, 1) {
                assert_eq!(chunk.len(), DEFAULT_CHUNK_BYTES);
                total += chunk.len();
            }
        }
        total += finish(&mut assembler).iter().map(Vec::len).sum::<usize>();

        // One second at 16 kHz; the read head may land on the final input sample.
        assert!((16000..=16001).contains(&(total / 2)), "got {} samples", total / 2);
    }

    #[test]
    fn finish_flushes_a_short_chunk() {
        let mut assembler = ChunkAssembler::new(16000, 4096);
        collect(&mut assembler, &[0.1; 10], 16000, 1);

        let tail = finish(&mut assembler);
        assert_eq!(tail.iter().map(Vec::len).collect::<Vec<_>>(), vec![20]);
        assert!(finish(&mut assembler).is_empty());
    }

    #[test]
    fn odd_chunk_size_rounds_to_whole_samples() {
        assert_eq!(ChunkAssembler::new(16000, 4097).chunk_bytes(), 4096);
        assert_eq!(ChunkAssembler::new(16000, 1).chunk_bytes(), 2);
    }
}

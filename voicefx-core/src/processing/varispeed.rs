use std::collections::VecDeque;

use crate::models::error::CaptureError;
use crate::traits::transform_engine::TransformEngine;

/// Streaming linear-interpolation resampler.
///
/// Reads input frames at a step of `pitch × rate` per output frame, so both
/// factors act like a playback-speed knob: above 1.0 the voice gets higher
/// and shorter, below 1.0 lower and longer. The fractional read position and
/// the last unconsumed frame are carried across feeds, so chunk boundaries
/// leave no seams. Pitch-preserving time stretching is out of its reach.
///
/// Input that does not complete a frame is held until the next feed.
#[derive(Debug)]
pub struct VarispeedEngine {
    channels: usize,
    configured: bool,
    pitch: f64,
    rate: f64,
    /// Interleaved input samples not yet consumed.
    frames: Vec<f32>,
    /// Read position in frames, relative to the start of `frames`.
    position: f64,
    /// Trailing bytes that did not make up a whole frame.
    carry: Vec<u8>,
    output: VecDeque<u8>,
}

impl VarispeedEngine {
    pub fn new() -> Self {
        Self {
            channels: 1,
            configured: false,
            pitch: 1.0,
            rate: 1.0,
            frames: Vec::new(),
            position: 0.0,
            carry: Vec::new(),
            output: VecDeque::new(),
        }
    }

    /// Input frames consumed per output frame.
    pub fn step(&self) -> f64 {
        self.pitch * self.rate
    }

    /// Output bytes ready to drain.
    pub fn available(&self) -> usize {
        self.output.len()
    }

    fn frame_count(&self) -> usize {
        self.frames.len() / self.channels
    }

    fn frame_bytes(&self) -> usize {
        self.channels * 2
    }

    /// Emit every output frame whose two neighbouring input frames are known.
    fn render(&mut self) {
        let step = self.step();
        let frame_count = self.frame_count();

        while self.position + 1.0 < frame_count as f64 {
            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            for ch in 0..self.channels {
                let a = self.frames[index * self.channels + ch];
                let b = self.frames[(index + 1) * self.channels + ch];
                let sample = a * (1.0 - fraction) + b * fraction;
                let value = sample.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                self.output.extend(value.to_le_bytes());
            }
            self.position += step;
        }

        // Keep the frame under the read head; everything before it is spent.
        let consumed = (self.position as usize).min(frame_count.saturating_sub(1));
        if consumed > 0 {
            self.frames.drain(..consumed * self.channels);
            self.position -= consumed as f64;
        }
    }
}

impl Default for VarispeedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformEngine for VarispeedEngine {
    fn configure(&mut self, channels: u16, sample_rate: u32) -> Result<(), CaptureError> {
        if channels == 0 || sample_rate == 0 {
            return Err(CaptureError::EngineFailed(format!(
                "cannot configure {} channels at {} Hz",
                channels, sample_rate
            )));
        }
        self.channels = channels as usize;
        self.frames.clear();
        self.carry.clear();
        self.output.clear();
        self.position = 0.0;
        self.configured = true;
        Ok(())
    }

    fn set_pitch(&mut self, factor: f64) {
        if factor.is_finite() && factor > 0.0 {
            self.pitch = factor;
        }
    }

    fn set_rate(&mut self, factor: f64) {
        if factor.is_finite() && factor > 0.0 {
            self.rate = factor;
        }
    }

    fn feed(&mut self, pcm: &[u8]) -> Result<(), CaptureError> {
        if !self.configured {
            return Err(CaptureError::EngineFailed("engine is not configured".into()));
        }

        self.carry.extend_from_slice(pcm);
        let whole = self.carry.len() / self.frame_bytes() * self.frame_bytes();
        self.frames.extend(
            self.carry[..whole]
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32),
        );
        self.carry.drain(..whole);

        self.render();
        Ok(())
    }

    fn drain(&mut self, out: &mut [u8]) -> Result<usize, CaptureError> {
        let count = out.len().min(self.output.len());
        for (slot, byte) in out.iter_mut().zip(self.output.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn flush(&mut self) -> Result<(), CaptureError> {
        if !self.configured || self.frames.is_empty() {
            return Ok(());
        }
        // Repeat the final frame so the read head can interpolate up to it.
        let last = self.frames[self.frames.len() - self.channels..].to_vec();
        self.frames.extend_from_slice(&last);
        self.render();
        self.frames.clear();
        self.position = 0.0;
        self.carry.clear();
        Ok(())
    }

    fn release(&mut self) {
        self.frames = Vec::new();
        self.carry = Vec::new();
        self.output = VecDeque::new();
        self.position = 0.0;
        self.configured = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn drain_samples(engine: &mut VarispeedEngine) -> Vec<i16> {
        let mut out = vec![0u8; 4096];
        let mut samples = Vec::new();
        loop {
            let n = engine.drain(&mut out).unwrap();
            if n == 0 {
                break;
            }
            samples.extend(out[..n].chunks_exact(2).map(|p| i16::from_le_bytes([p[0], p[1]])));
        }
        samples
    }

    #[test]
    fn unity_step_reproduces_input_with_one_frame_lookahead() {
        let mut engine = VarispeedEngine::new();
        engine.configure(1, 16000).unwrap();
        engine.feed(&pcm(&[10, 20, 30, 40])).unwrap();

        // The last frame waits for its successor before it can be emitted.
        assert_eq!(drain_samples(&mut engine), vec![10, 20, 30]);

        engine.feed(&pcm(&[50])).unwrap();
        assert_eq!(drain_samples(&mut engine), vec![40]);
    }

    #[test]
    fn double_step_halves_the_output() {
        let mut engine = VarispeedEngine::new();
        engine.configure(1, 16000).unwrap();
        engine.set_rate(2.0);
        let input: Vec<i16> = (0..100).map(|i| i * 10).collect();
        engine.feed(&pcm(&input)).unwrap();

        let output = drain_samples(&mut engine);
        assert_eq!(output.len(), 50);
        assert_eq!(output[1], 20);
    }

    #[test]
    fn half_step_interpolates_between_frames() {
        let mut engine = VarispeedEngine::new();
        engine.configure(1, 16000).unwrap();
        engine.set_pitch(0.5);
        engine.feed(&pcm(&[0, 100, 200])).unwrap();

        assert_eq!(drain_samples(&mut engine), vec![0, 50, 100, 150]);
    }

    #[test]
    fn seamless_across_odd_byte_boundaries() {
        let mut whole = VarispeedEngine::new();
        whole.configure(1, 16000).unwrap();
        whole.set_rate(0.75);
        let input: Vec<i16> = (0..64).map(|i| (i * 37 % 200) as i16 - 100).collect();
        let bytes = pcm(&input);
        whole.feed(&bytes).unwrap();

        let mut split = VarispeedEngine::new();
        split.configure(1, 16000).unwrap();
        split.set_rate(0.75);
        for piece in bytes.chunks(7) {
            split.feed(piece).unwrap();
        }

        assert_eq!(drain_samples(&mut whole), drain_samples(&mut split));
    }

    #[test]
    fn flush_emits_the_held_tail() {
        let mut engine = VarispeedEngine::new();
        engine.configure(1, 16000).unwrap();
        engine.feed(&pcm(&[1, 2, 3])).unwrap();
        assert_eq!(drain_samples(&mut engine), vec![1, 2]);

        engine.flush().unwrap();
        assert_eq!(drain_samples(&mut engine), vec![3]);
    }

    #[test]
    fn stereo_frames_stay_interleaved() {
        let mut engine = VarispeedEngine::new();
        engine.configure(2, 16000).unwrap();
        engine.feed(&pcm(&[1, -1, 2, -2, 3, -3])).unwrap();

        assert_eq!(drain_samples(&mut engine), vec![1, -1, 2, -2]);
    }

    #[test]
    fn rejects_feed_after_release() {
        let mut engine = VarispeedEngine::new();
        engine.configure(1, 16000).unwrap();
        engine.release();
        assert!(matches!(engine.feed(&[0, 0]), Err(CaptureError::EngineFailed(_))));
    }
}

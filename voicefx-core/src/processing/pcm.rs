//! Sample conversions between capture buffers and 16-bit PCM bytes.

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
///
/// A trailing partial frame is dropped.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Linear-interpolation sample rate converter for a mono stream that
/// arrives in pieces.
///
/// The fractional read position and the samples under the read head carry
/// over from one `process` call to the next, so splitting the input at any
/// point yields the same output as converting it in one go. The newest
/// sample is held back until its successor arrives; `finish` releases it.
#[derive(Debug, Clone)]
pub struct StreamingResampler {
    target_rate: u32,
    /// Unconsumed input; index 0 is the sample at or before the read head.
    history: Vec<f32>,
    /// Read position in input samples, relative to `history[0]`.
    position: f64,
    /// Input samples per output sample at the last `process` call.
    step: f64,
}

impl StreamingResampler {
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate,
            history: Vec::new(),
            position: 0.0,
            step: 1.0,
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Convert `samples` recorded at `source_rate`, appending to `out`.
    ///
    /// A zero rate on either side is ignored.
    pub fn process(&mut self, samples: &[f32], source_rate: u32, out: &mut Vec<f32>) {
        if source_rate == 0 || self.target_rate == 0 {
            return;
        }
        self.step = source_rate as f64 / self.target_rate as f64;
        self.history.extend_from_slice(samples);
        let len = self.history.len();

        while self.position + 1.0 < len as f64 {
            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            let a = self.history[index];
            let b = self.history[index + 1];
            out.push(a * (1.0 - fraction) + b * fraction);
            self.position += self.step;
        }

        let consumed = (self.position as usize).min(len.saturating_sub(1));
        if consumed > 0 {
            self.history.drain(..consumed);
            self.position -= consumed as f64;
        }
    }

    /// Emit the held-back tail, treating the last sample as repeating.
    pub fn finish(&mut self, out: &mut Vec<f32>) {
        let len = self.history.len();
        while self.position < len as f64 {
            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            let a = self.history[index];
            let b = self.history.get(index + 1).copied().unwrap_or(a);
            out.push(a * (1.0 - fraction) + b * fraction);
            self.position += self.step;
        }
        self.history.clear();
        self.position = 0.0;
    }
}

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM (little-endian bytes).
///
/// Clamps out-of-range values. Output length = `samples.len() * 2` bytes.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * i16::MAX as f32) as i16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

/// Scale a 16-bit sample into `[-1.0, 1.0)`.
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Decode little-endian 16-bit PCM bytes. A trailing odd byte is ignored.
pub fn pcm16_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

use std::collections::VecDeque;

use crate::models::error::CaptureError;
use crate::traits::transform_engine::TransformEngine;

/// Engine that hands back exactly what was fed, byte for byte.
///
/// Pitch and rate are recorded but have no effect. Useful for capturing the
/// raw microphone signal and as the reference engine in pipeline tests.
#[derive(Debug)]
pub struct PassthroughEngine {
    pending: VecDeque<u8>,
    configured: bool,
    pitch: f64,
    rate: f64,
}

impl PassthroughEngine {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            configured: false,
            pitch: 1.0,
            rate: 1.0,
        }
    }

    /// Bytes fed but not yet drained.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn factors(&self) -> (f64, f64) {
        (self.pitch, self.rate)
    }
}

impl Default for PassthroughEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformEngine for PassthroughEngine {
    fn configure(&mut self, channels: u16, sample_rate: u32) -> Result<(), CaptureError> {
        if channels == 0 || sample_rate == 0 {
            return Err(CaptureError::EngineFailed(format!(
                "cannot configure {} channels at {} Hz",
                channels, sample_rate
            )));
        }
        self.pending.clear();
        self.configured = true;
        Ok(())
    }

    fn set_pitch(&mut self, factor: f64) {
        self.pitch = factor;
    }

    fn set_rate(&mut self, factor: f64) {
        self.rate = factor;
    }

    fn feed(&mut self, pcm: &[u8]) -> Result<(), CaptureError> {
        if !self.configured {
            return Err(CaptureError::EngineFailed("engine is not configured".into()));
        }
        self.pending.extend(pcm);
        Ok(())
    }

    fn drain(&mut self, out: &mut [u8]) -> Result<usize, CaptureError> {
        let count = out.len().min(self.pending.len());
        for (slot, byte) in out.iter_mut().zip(self.pending.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn release(&mut self) {
        self.pending.clear();
        self.configured = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_capacity_sized_pulls() {
        let mut engine = PassthroughEngine::new();
        engine.configure(1, 16000).unwrap();
        engine.feed(&[1, 2, 3, 4, 5]).unwrap();

        let mut out = [0u8; 2];
        assert_eq!(engine.drain(&mut out).unwrap(), 2);
        assert_eq!(out, [1, 2]);
        assert_eq!(engine.drain(&mut out).unwrap(), 2);
        assert_eq!(out, [3, 4]);
        assert_eq!(engine.drain(&mut out).unwrap(), 1);
        assert_eq!(out[0], 5);
        assert_eq!(engine.drain(&mut out).unwrap(), 0);
    }

    #[test]
    fn feed_before_configure_fails() {
        let mut engine = PassthroughEngine::new();
        assert!(matches!(engine.feed(&[0, 0]), Err(CaptureError::EngineFailed(_))));
    }

    #[test]
    fn release_discards_pending_output() {
        let mut engine = PassthroughEngine::new();
        engine.configure(1, 16000).unwrap();
        engine.feed(&[7; 10]).unwrap();
        engine.release();

        assert_eq!(engine.pending(), 0);
        assert!(engine.feed(&[1]).is_err());
    }

    #[test]
    fn factors_are_recorded_but_not_applied() {
        let mut engine = PassthroughEngine::default();
        assert_eq!(engine.factors(), (1.0, 1.0));

        engine.configure(1, 16000).unwrap();
        engine.set_pitch(2.0);
        engine.set_rate(0.5);
        engine.feed(&[9; 4]).unwrap();

        assert_eq!(engine.factors(), (2.0, 0.5));
        assert_eq!(engine.pending(), 4);
    }
}

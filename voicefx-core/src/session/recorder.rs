use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::CaptureState;
use crate::processing::parameter_mapper::ParameterMapper;
use crate::session::capture_session::CaptureSession;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::transform_engine::TransformEngine;

/// A capture source wired to a [`CaptureSession`].
///
/// `start` opens the recording before the source begins delivering, and
/// `stop` halts the source before the recording is finalized, so no chunk
/// arrives outside a session.
pub struct Recorder<P: CaptureProvider, E: TransformEngine + 'static> {
    provider: P,
    session: Arc<CaptureSession<E>>,
    mapper: ParameterMapper,
}

impl<P: CaptureProvider, E: TransformEngine + 'static> Recorder<P, E> {
    pub fn new(provider: P, session: CaptureSession<E>) -> Self {
        Self {
            provider,
            session: Arc::new(session),
            mapper: ParameterMapper::default(),
        }
    }

    /// Use `mapper` to translate slider positions.
    pub fn with_mapper(mut self, mapper: ParameterMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn session(&self) -> &Arc<CaptureSession<E>> {
        &self.session
    }

    pub fn state(&self) -> CaptureState {
        self.session.state()
    }

    pub fn device_name(&self) -> String {
        self.provider.device_name()
    }

    /// Set pitch from a slider position; applies from the next chunk.
    pub fn set_pitch_position(&self, position: u32) -> f64 {
        let pitch = self.mapper.map(position);
        self.session.parameters().set_pitch(pitch);
        log::debug!("pitch slider {} -> {:.3}", position, pitch);
        pitch
    }

    /// Set rate from a slider position; applies from the next chunk.
    pub fn set_rate_position(&self, position: u32) -> f64 {
        let rate = self.mapper.map(position);
        self.session.parameters().set_rate(rate);
        log::debug!("rate slider {} -> {:.3}", position, rate);
        rate
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        if !self.provider.is_available() {
            return Err(CaptureError::DeviceNotAvailable);
        }

        self.session.start()?;

        if let Err(e) = self.provider.start(self.session.chunk_callback()) {
            log::error!("Failed to start {}: {}", self.provider.device_name(), e);
            if let Err(cleanup) = self.session.stop() {
                log::warn!("Failed to discard recording: {}", cleanup);
            }
            return Err(e);
        }

        log::info!("Recording from {}", self.provider.device_name());
        Ok(())
    }

    /// Stop the source and finalize. A recording the length limit already
    /// finalized is returned as is.
    pub fn stop(&mut self) -> Result<RecordingResult, CaptureError> {
        if let Err(e) = self.provider.stop() {
            log::warn!("Failed to stop {}: {}", self.provider.device_name(), e);
        }
        match self.session.stop() {
            Err(CaptureError::NotRecording) => self.session.take_completed().ok_or(CaptureError::NotRecording),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::AudioChunk;
    use crate::models::config::CaptureConfiguration;
    use crate::processing::passthrough::PassthroughEngine;
    use crate::traits::capture_provider::ChunkCallback;
    use approx::assert_relative_eq;
    use std::time::Duration;

    /// Delivers a fixed set of chunks synchronously from `start`.
    struct ScriptedMic {
        available: bool,
        fail_start: bool,
        chunks: Vec<Vec<u8>>,
        stopped: bool,
    }

    impl ScriptedMic {
        fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                available: true,
                fail_start: false,
                chunks,
                stopped: false,
            }
        }
    }

    impl CaptureProvider for ScriptedMic {
        fn is_available(&self) -> bool {
            self.available
        }

        fn start(&mut self, callback: ChunkCallback) -> Result<(), CaptureError> {
            if self.fail_start {
                return Err(CaptureError::DeviceNotAvailable);
            }
            for chunk in &self.chunks {
                callback(AudioChunk::full(chunk));
            }
            Ok(())
        }

        fn stop(&mut self) -> Result<(), CaptureError> {
            self.stopped = true;
            Ok(())
        }

        fn device_name(&self) -> String {
            "scripted mic".into()
        }
    }

    fn session_in(dir: &tempfile::TempDir) -> CaptureSession<PassthroughEngine> {
        CaptureSession::with_default_engine(CaptureConfiguration {
            output_path: dir.path().join("recorder.wav"),
            ..Default::default()
        })
    }

    #[test]
    fn records_everything_the_provider_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let mic = ScriptedMic::with_chunks(vec![vec![1; 640], vec![2; 640]]);
        let mut recorder = Recorder::new(mic, session_in(&dir));

        recorder.start().unwrap();
        assert!(recorder.state().is_recording());
        let result = recorder.stop().unwrap();

        assert_eq!(result.data_bytes, 1280);
        assert!(recorder.provider.stopped);
        assert!(recorder.state().is_idle());
    }

    #[test]
    fn stop_after_length_limit_returns_the_finished_recording() {
        let dir = tempfile::tempdir().unwrap();
        let session = CaptureSession::with_default_engine(CaptureConfiguration {
            output_path: dir.path().join("capped.wav"),
            max_duration: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let mic = ScriptedMic::with_chunks(vec![vec![1; 2000], vec![2; 2000], vec![3; 2000]]);
        let mut recorder: Recorder<_, PassthroughEngine> = Recorder::new(mic, session);

        recorder.start().unwrap();
        assert!(recorder.state().is_idle());

        let result = recorder.stop().unwrap();
        assert_eq!(result.data_bytes, 4000);
        assert!(recorder.provider.stopped);
        assert_eq!(recorder.stop(), Err(CaptureError::NotRecording));
    }

    #[test]
    fn provider_failure_rolls_back_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut mic = ScriptedMic::with_chunks(Vec::new());
        mic.fail_start = true;
        let mut recorder = Recorder::new(mic, session_in(&dir));

        assert_eq!(recorder.start(), Err(CaptureError::DeviceNotAvailable));
        assert!(recorder.state().is_idle());
    }

    #[test]
    fn unavailable_device_never_opens_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut mic = ScriptedMic::with_chunks(Vec::new());
        mic.available = false;
        let mut recorder = Recorder::new(mic, session_in(&dir));

        assert_eq!(recorder.start(), Err(CaptureError::DeviceNotAvailable));
        assert!(!dir.path().join("recorder.wav").exists());
    }

    #[test]
    fn slider_positions_reach_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(ScriptedMic::with_chunks(Vec::new()), session_in(&dir));

        assert_relative_eq!(recorder.set_pitch_position(1000), 4.0);
        assert_relative_eq!(recorder.set_rate_position(0), 0.25);
        assert_eq!(recorder.session().parameters().snapshot(), (4.0, 0.25));
    }
}

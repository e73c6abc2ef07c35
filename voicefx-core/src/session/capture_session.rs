use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioChunk, CaptureSessionDiagnostics, ChunkOutcome, TransformParameters};
use crate::models::config::CaptureConfiguration;
use crate::models::error::{CaptureError, ErrorKind};
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::state::CaptureState;
use crate::processing::wav_format::{WaveFormat, WavHeader};
use crate::storage::metadata;
use crate::storage::wave_writer::{self, ClosedWave, WaveFileWriter};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_provider::{CaptureEvent, ChunkCallback};
use crate::traits::transform_engine::TransformEngine;

/// Builds a fresh transform engine for every session.
pub type EngineFactory<E> = Box<dyn Fn() -> E + Send + Sync>;

/// Result of dispatching one [`CaptureEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Started,
    Chunk(ChunkOutcome),
    Stopped(RecordingResult),
}

/// Resources alive only while recording.
struct Pipeline<E> {
    engine: E,
    writer: WaveFileWriter,
    scratch: Vec<u8>,
    byte_limit: Option<u64>,
}

/// Internal mutable session state, protected by `parking_lot::Mutex`.
///
/// The pipeline sits under the same lock as the state, so `stop` cannot
/// tear it down while a chunk is being processed.
struct SessionInner<E> {
    state: CaptureState,
    pipeline: Option<Pipeline<E>>,
    diagnostics: CaptureSessionDiagnostics,
    /// Recording finalized by the length limit, until collected.
    completed: Option<RecordingResult>,
}

/// Capture → transform → persist orchestrator.
///
/// Data flow:
/// ```text
/// [capture callback] → on_chunk → [TransformEngine feed / drain loop] → [WaveFileWriter]
/// ```
///
/// `start` and `stop` come from a control thread, `on_chunk` from the
/// capture thread; share the session through an `Arc`. Every chunk is fed
/// and fully drained before `on_chunk` returns, so the capture source itself
/// paces the pipeline. Pitch and rate are read from [`TransformParameters`]
/// at the top of each chunk, so a change applies to the next chunk.
///
/// Failure handling:
/// - engine feed/drain errors are returned for that chunk; recording goes on.
/// - container write errors abort the session back to idle.
/// - reaching `max_duration` finalizes the recording from `on_chunk`; the
///   result is kept for [`take_completed`](Self::take_completed).
/// - `stop` always releases the engine, closes the file and finalizes the
///   header, in that order, even if an earlier step failed.
/// - `stop` while idle returns [`CaptureError::NotRecording`] and touches no file.
pub struct CaptureSession<E: TransformEngine> {
    config: CaptureConfiguration,
    factory: EngineFactory<E>,
    parameters: Arc<TransformParameters>,
    inner: Mutex<SessionInner<E>>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl<E: TransformEngine> CaptureSession<E> {
    pub fn new(config: CaptureConfiguration, factory: impl Fn() -> E + Send + Sync + 'static) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            parameters: Arc::new(TransformParameters::default()),
            inner: Mutex::new(SessionInner {
                state: CaptureState::Idle,
                pipeline: None,
                diagnostics: CaptureSessionDiagnostics::default(),
                completed: None,
            }),
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Shared pitch/rate handle for the control side.
    pub fn parameters(&self) -> Arc<TransformParameters> {
        Arc::clone(&self.parameters)
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.inner.lock().state
    }

    pub fn diagnostics(&self) -> CaptureSessionDiagnostics {
        self.inner.lock().diagnostics.clone()
    }

    /// The recording finalized by the length limit, if it has not been taken.
    pub fn take_completed(&self) -> Option<RecordingResult> {
        self.inner.lock().completed.take()
    }

    /// Open a new recording. Transitions: idle → recording.
    ///
    /// Configures a fresh engine, then truncates the output file and writes
    /// the provisional header. Nothing changes if either step fails.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_idle() {
            return Err(CaptureError::AlreadyRecording);
        }

        self.config.validate()?;
        let format = self.config.wave_format()?;
        let byte_limit = self.config.max_data_bytes()?;

        let mut engine = (self.factory)();
        engine.configure(format.channels, format.sample_rate)?;

        let writer = match WaveFileWriter::open(&self.config.output_path, format) {
            Ok(writer) => writer,
            Err(e) => {
                engine.release();
                log::error!("Failed to open recording: {}", e);
                return Err(e);
            }
        };

        inner.pipeline = Some(Pipeline {
            engine,
            writer,
            scratch: vec![0; self.config.drain_buffer_size],
            byte_limit,
        });
        inner.diagnostics = CaptureSessionDiagnostics::default();
        inner.completed = None;
        inner.state = CaptureState::Recording { chunks_processed: 0 };
        let state = inner.state;
        drop(inner);

        log::info!(
            "Recording started: {} ({} Hz, {} bit)",
            self.config.output_path.display(),
            format.sample_rate,
            format.bit_depth
        );
        self.notify_state(&state);
        Ok(())
    }

    /// Transform one delivered chunk and persist everything the engine emits.
    ///
    /// Applies the current pitch/rate, feeds the chunk, then drains the engine
    /// into the scratch buffer until a pull comes back empty, appending every
    /// non-empty pull to the file.
    pub fn on_chunk(&self, chunk: AudioChunk<'_>) -> Result<ChunkOutcome, CaptureError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let pipeline = match (&inner.state, inner.pipeline.as_mut()) {
            (CaptureState::Recording { .. }, Some(pipeline)) => pipeline,
            _ => return Err(CaptureError::NotRecording),
        };

        let (pitch, rate) = self.parameters.snapshot();
        pipeline.engine.set_pitch(pitch);
        pipeline.engine.set_rate(rate);

        let mut outcome = ChunkOutcome::default();
        let result = pipeline
            .engine
            .feed(chunk.bytes())
            .map_err(into_engine_error)
            .and_then(|_| {
                outcome.bytes_fed = chunk.len();
                drain_engine(&mut pipeline.engine, &mut pipeline.writer, &mut pipeline.scratch, &mut outcome)
            });
        let limit_reached = result.is_ok()
            && pipeline
                .byte_limit
                .is_some_and(|limit| pipeline.writer.bytes_written() >= limit);

        inner.diagnostics.chunks_received += 1;
        inner.diagnostics.bytes_fed += outcome.bytes_fed as u64;
        inner.diagnostics.bytes_written += outcome.bytes_written as u64;
        inner.diagnostics.drain_pulls += outcome.appends as u64;
        if let CaptureState::Recording { chunks_processed } = &mut inner.state {
            *chunks_processed += 1;
        }

        let error = match result {
            Ok(()) if !limit_reached => {
                log::debug!(
                    "chunk: {} bytes in, {} bytes out in {} appends",
                    outcome.bytes_fed,
                    outcome.bytes_written,
                    outcome.appends
                );
                return Ok(outcome);
            }
            Ok(()) => {
                log::info!("Maximum recording length reached, finalizing");
                inner.state = CaptureState::Finalizing;
                let finished = match inner.pipeline.take() {
                    Some(pipeline) => self.teardown(pipeline, false),
                    None => Err(CaptureError::NotRecording),
                };
                inner.state = CaptureState::Idle;
                if let Ok(recording) = &finished {
                    inner.completed = Some(recording.clone());
                }
                drop(guard);

                self.notify_state(&CaptureState::Finalizing);
                self.notify_state(&CaptureState::Idle);
                self.report_finished(&finished);
                outcome.limit_reached = true;
                return finished.map(|_| outcome);
            }
            Err(e) => e,
        };

        if error.kind() == ErrorKind::Engine {
            inner.diagnostics.engine_errors += 1;
            drop(guard);
            log::warn!("Transform engine error, chunk dropped: {}", error);
            self.notify_error(&error);
            return Err(error);
        }

        // The container is broken; nothing after this chunk can make it valid.
        log::error!("Failed to write audio data, aborting session: {}", error);
        inner.state = CaptureState::Finalizing;
        let pipeline = inner.pipeline.take();
        if let Some(pipeline) = pipeline {
            if let Err(cleanup) = self.teardown(pipeline, true) {
                log::error!("Cleanup after write failure also failed: {}", cleanup);
            }
        }
        inner.state = CaptureState::Idle;
        drop(guard);

        self.notify_state(&CaptureState::Finalizing);
        self.notify_state(&CaptureState::Idle);
        self.notify_error(&error);
        Err(error)
    }

    /// Stop recording and finalize the file.
    /// Transitions: recording → finalizing → idle.
    ///
    /// Waits for an in-flight chunk. The session reaches idle whatever happens;
    /// the first cleanup error, if any, is returned.
    pub fn stop(&self) -> Result<RecordingResult, CaptureError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_recording() {
            return Err(CaptureError::NotRecording);
        }

        inner.state = CaptureState::Finalizing;
        let result = match inner.pipeline.take() {
            Some(pipeline) => self.teardown(pipeline, false),
            None => Err(CaptureError::NotRecording),
        };
        inner.state = CaptureState::Idle;
        drop(inner);

        self.notify_state(&CaptureState::Finalizing);
        self.notify_state(&CaptureState::Idle);
        self.report_finished(&result);
        result
    }

    /// Drive the session from a capture lifecycle event.
    pub fn handle_event(&self, event: CaptureEvent<'_>) -> Result<EventOutcome, CaptureError> {
        match event {
            CaptureEvent::Started => self.start().map(|_| EventOutcome::Started),
            CaptureEvent::Chunk(chunk) => self.on_chunk(chunk).map(EventOutcome::Chunk),
            CaptureEvent::Stopped => self.stop().map(EventOutcome::Stopped),
        }
    }

    /// Callback for a [`CaptureProvider`](crate::traits::capture_provider::CaptureProvider)
    /// that routes every delivered chunk into `on_chunk`.
    ///
    /// Chunk errors are already logged and reported to the delegate, so the
    /// callback drops them.
    pub fn chunk_callback(self: &Arc<Self>) -> ChunkCallback
    where
        E: 'static,
    {
        let session = Arc::clone(self);
        Arc::new(move |chunk: AudioChunk<'_>| {
            let _ = session.on_chunk(chunk);
        })
    }

    // --- Internal helpers ---

    /// Release the engine, close the file, finalize the header. Every step
    /// runs even if an earlier one failed; the first error wins.
    ///
    /// `salvage` is set when a write failed: the file may then hold a partial
    /// write the writer never counted, and the header is patched to whatever
    /// the file holds.
    fn teardown(&self, pipeline: Pipeline<E>, salvage: bool) -> Result<RecordingResult, CaptureError> {
        let Pipeline {
            mut engine,
            mut writer,
            mut scratch,
            ..
        } = pipeline;
        let file_path: PathBuf = writer.file_path().to_path_buf();
        let format = *writer.format();
        let mut first_error: Option<CaptureError> = None;

        if self.config.flush_on_stop {
            let mut outcome = ChunkOutcome::default();
            let flushed = engine
                .flush()
                .map_err(into_engine_error)
                .and_then(|_| drain_engine(&mut engine, &mut writer, &mut scratch, &mut outcome));
            match flushed {
                Ok(()) => log::debug!("flushed {} bytes of engine tail", outcome.bytes_written),
                Err(e) => {
                    log::warn!("Failed to flush engine tail: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        engine.release();

        let closed = match writer.close() {
            Ok(closed) => Some(closed),
            Err(e) => {
                log::error!("Failed to close recording: {}", e);
                first_error.get_or_insert(e);
                None
            }
        };

        let header = match &closed {
            Some(closed) => finalize_closed(closed, salvage),
            None => wave_writer::finalize(&file_path),
        };
        let header = match header {
            Ok(header) => header,
            Err(e) => {
                log::error!("Failed to finalize WAV header: {}", e);
                return Err(first_error.unwrap_or(e));
            }
        };

        if let Some(e) = first_error {
            return Err(e);
        }

        self.build_result(file_path, &format, header.data_size as u64)
    }

    fn build_result(
        &self,
        file_path: PathBuf,
        format: &WaveFormat,
        data_bytes: u64,
    ) -> Result<RecordingResult, CaptureError> {
        let checksum = wave_writer::sha256_file(&file_path)?;
        let (pitch, rate) = self.parameters.snapshot();
        let metadata = RecordingMetadata::new(
            format,
            &file_path.to_string_lossy(),
            data_bytes,
            &checksum,
            pitch,
            rate,
        );

        if self.config.write_metadata {
            if let Err(e) = metadata::write_metadata(&metadata, &file_path) {
                log::warn!("Failed to write metadata sidecar: {}", e);
            }
        }

        Ok(RecordingResult {
            file_path,
            duration_secs: format.duration_secs(data_bytes),
            data_bytes,
            checksum,
            metadata,
        })
    }

    fn report_finished(&self, result: &Result<RecordingResult, CaptureError>) {
        match result {
            Ok(recording) => {
                log::info!(
                    "Recording stopped: {} ({:.2}s, {} bytes)",
                    recording.file_path.display(),
                    recording.duration_secs,
                    recording.data_bytes
                );
                if let Some(ref delegate) = self.delegate {
                    delegate.on_capture_finished(recording);
                }
            }
            Err(e) => {
                log::error!("Recording finished with errors: {}", e);
                self.notify_error(e);
            }
        }
    }

    fn notify_state(&self, state: &CaptureState) {
        log::debug!("session state -> {}", state.name());
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(state);
        }
    }

    fn notify_error(&self, error: &CaptureError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }
}

impl<E: TransformEngine + Default + 'static> CaptureSession<E> {
    /// A session that builds its engines with `E::default()`.
    pub fn with_default_engine(config: CaptureConfiguration) -> Self {
        Self::new(config, E::default)
    }
}

/// Pull from the engine until it reports nothing available, appending each
/// non-empty pull to the file.
fn drain_engine<E: TransformEngine>(
    engine: &mut E,
    writer: &mut WaveFileWriter,
    scratch: &mut [u8],
    outcome: &mut ChunkOutcome,
) -> Result<(), CaptureError> {
    loop {
        let pulled = engine.drain(scratch).map_err(into_engine_error)?;
        if pulled == 0 {
            return Ok(());
        }
        if pulled > scratch.len() {
            return Err(CaptureError::EngineFailed(format!(
                "drain reported {} bytes for a {}-byte buffer",
                pulled,
                scratch.len()
            )));
        }
        writer.append(&scratch[..pulled])?;
        outcome.appends += 1;
        outcome.bytes_written += pulled;
    }
}

/// Finalize through the length guard; with `salvage`, fall back to patching
/// the header from the file as it stands.
fn finalize_closed(closed: &ClosedWave, salvage: bool) -> Result<WavHeader, CaptureError> {
    match closed.finalize() {
        Err(e) if salvage => {
            log::warn!("Salvaging {}: {}", closed.file_path().display(), e);
            wave_writer::finalize(closed.file_path())
        }
        other => other,
    }
}

/// Errors raised by engine calls count as engine errors whatever their variant.
fn into_engine_error(error: CaptureError) -> CaptureError {
    match error {
        CaptureError::EngineFailed(_) => error,
        other => CaptureError::EngineFailed(other.to_string()),
    }
}

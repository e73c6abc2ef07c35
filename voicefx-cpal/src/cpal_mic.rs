//! cpal microphone capture provider.
//!
//! Captures from the default (or a named) input device and delivers mono
//! 16-bit PCM chunks at the session's sample rate via the `ChunkCallback`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream};
use parking_lot::Mutex;

use voicefx_core::models::error::CaptureError;
use voicefx_core::traits::capture_provider::{CaptureProvider, ChunkCallback};

use crate::chunker::{ChunkAssembler, DEFAULT_CHUNK_BYTES};

/// How often the capture thread checks for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// cpal microphone capture.
///
/// The stream lives on a dedicated thread, since cpal streams are not `Send`
/// on every host. Device buffers are converted and cut into chunks of a fixed
/// size before they reach the callback; the remainder is delivered as one
/// short chunk on stop.
pub struct CpalMicCapture {
    device_name: Option<String>,
    target_rate: u32,
    chunk_bytes: usize,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalMicCapture {
    /// Capture from the system default input device.
    pub fn default_device(target_rate: u32) -> Self {
        Self::with_device_name(None, target_rate)
    }

    /// Capture from the input device called `name`, or the default if `None`.
    pub fn with_device_name(name: Option<String>, target_rate: u32) -> Self {
        Self {
            device_name: name,
            target_rate,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    /// Deliver chunks of `chunk_bytes` instead of the default size.
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    /// Names of every input device on the default host.
    pub fn input_device_names() -> Vec<String> {
        match cpal::default_host().input_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                log::warn!("Failed to list input devices: {}", e);
                Vec::new()
            }
        }
    }
}

impl CaptureProvider for CpalMicCapture {
    fn is_available(&self) -> bool {
        find_device(self.device_name.as_deref()).is_ok()
    }

    fn start(&mut self, callback: ChunkCallback) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::ConfigurationFailed(
                "mic capture already running".into(),
            ));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let device_name = self.device_name.clone();
        let assembler = ChunkAssembler::new(self.target_rate, self.chunk_bytes);
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("cpal-mic-capture".into())
            .spawn(move || {
                mic_capture_loop(&running, device_name.as_deref(), assembler, callback, ready_tx);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::Unknown(format!("failed to spawn mic thread: {}", e))
            })?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::Unknown("mic thread exited during startup".into())));
        if let Err(e) = ready {
            self.running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        *self.capture_handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            handle
                .join()
                .map_err(|_| CaptureError::Unknown("mic capture thread panicked".into()))?;
        }
        Ok(())
    }

    fn device_name(&self) -> String {
        self.device_name
            .clone()
            .unwrap_or_else(|| "Default Microphone".into())
    }
}

impl Drop for CpalMicCapture {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Capture loop running on a dedicated thread.
///
/// Sequence:
/// 1. Find the input device and its default config
/// 2. Build an input stream for the device's sample format
/// 3. Report readiness to `start`
/// 4. Idle until stopped, then drop the stream and flush the last chunk
fn mic_capture_loop(
    running: &AtomicBool,
    device_name: Option<&str>,
    assembler: ChunkAssembler,
    callback: ChunkCallback,
    ready: mpsc::Sender<Result<(), CaptureError>>,
) {
    let assembler = Arc::new(Mutex::new(assembler));

    let stream = match open_stream(device_name, Arc::clone(&assembler), Arc::clone(&callback)) {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("Mic capture error: {}", e);
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }

    drop(stream);
    assembler.lock().finish(|chunk| callback(chunk));
    log::debug!("mic capture thread exiting");
}

fn find_device(name: Option<&str>) -> Result<Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        None => host.default_input_device().ok_or(CaptureError::DeviceNotAvailable),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| CaptureError::Unknown(format!("failed to list input devices: {}", e)))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or(CaptureError::DeviceNotAvailable),
    }
}

fn open_stream(
    device_name: Option<&str>,
    assembler: Arc<Mutex<ChunkAssembler>>,
    callback: ChunkCallback,
) -> Result<Stream, CaptureError> {
    let device = find_device(device_name)?;
    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::ConfigurationFailed(format!("no input config: {}", e)))?;

    log::info!(
        "Using input device {:?}: {} Hz, {} channels, {:?}",
        device.name().unwrap_or_default(),
        supported.sample_rate().0,
        supported.channels(),
        supported.sample_format()
    );

    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let stream = match sample_format {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, assembler, callback),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, assembler, callback),
        SampleFormat::F32 => build_stream::<f32>(&device, &config, assembler, callback),
        other => Err(CaptureError::ConfigurationFailed(format!(
            "unsupported sample format: {:?}",
            other
        ))),
    }?;

    stream
        .play()
        .map_err(|e| CaptureError::Unknown(format!("failed to start stream: {}", e)))?;
    Ok(stream)
}

fn build_stream<T>(
    device: &Device,
    config: &cpal::StreamConfig,
    assembler: Arc<Mutex<ChunkAssembler>>,
    callback: ChunkCallback,
) -> Result<Stream, CaptureError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let source_rate = config.sample_rate.0;
    let channels = config.channels;
    let mut samples: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                samples.clear();
                samples.extend(data.iter().map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s)));
                assembler
                    .lock()
                    .push(&samples, source_rate, channels, |chunk| callback(chunk));
            },
            |err| log::error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| CaptureError::Unknown(format!("failed to build input stream: {}", e)))
}

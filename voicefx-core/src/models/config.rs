use std::path::PathBuf;
use std::time::Duration;

use crate::models::error::CaptureError;
use crate::processing::wav_format::WaveFormat;

/// Default size of the scratch buffer the drain loop pulls engine output into.
pub const DEFAULT_DRAIN_BUFFER_SIZE: usize = 4096;

/// Longest recording a session keeps before finalizing on its own.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(30);

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfiguration {
    /// Sample rate of the delivered PCM in Hz (default: 16000).
    pub sample_rate: u32,

    /// Bit depth of the PCM output (default: 16). Valid values: 8, 16, 32.
    pub bit_depth: u16,

    /// Number of channels (default: 1). Sessions only record mono.
    pub channels: u16,

    /// Recording file. Overwritten by every new session.
    pub output_path: PathBuf,

    /// Capacity in bytes of each drain pull from the transform engine.
    pub drain_buffer_size: usize,

    /// Flush the engine and drain its tail before releasing it on stop.
    pub flush_on_stop: bool,

    /// Write a `.metadata.json` sidecar next to the finished recording.
    pub write_metadata: bool,

    /// Finalize automatically once this much audio has been written
    /// (default: 30 s). `None` records until `stop`.
    pub max_duration: Option<Duration>,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), CaptureError> {
        self.wave_format()?;
        if self.channels != 1 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "capture sessions record mono only, got {} channels",
                self.channels
            )));
        }
        if self.drain_buffer_size == 0 {
            return Err(CaptureError::ConfigurationFailed(
                "drain buffer size must be positive".into(),
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(CaptureError::ConfigurationFailed("output path is empty".into()));
        }
        if self.max_duration.is_some_and(|max| max.is_zero()) {
            return Err(CaptureError::ConfigurationFailed(
                "maximum duration must be positive".into(),
            ));
        }
        Ok(())
    }

    /// PCM bytes after which the session finalizes itself, in whole frames.
    pub fn max_data_bytes(&self) -> Result<Option<u64>, CaptureError> {
        let format = self.wave_format()?;
        Ok(self.max_duration.map(|max| {
            let block_align = format.block_align().max(1) as u64;
            let bytes = (max.as_secs_f64() * format.byte_rate() as f64) as u64;
            (bytes / block_align * block_align).max(block_align)
        }))
    }

    /// The container format this configuration records to.
    pub fn wave_format(&self) -> Result<WaveFormat, CaptureError> {
        WaveFormat::new(self.channels, self.sample_rate, self.bit_depth)
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            bit_depth: 16,
            channels: 1,
            output_path: PathBuf::from("record_temp.wav"),
            drain_buffer_size: DEFAULT_DRAIN_BUFFER_SIZE,
            flush_on_stop: false,
            write_metadata: false,
            max_duration: Some(DEFAULT_MAX_DURATION),
        }
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::processing::wav_format::WaveFormat;

/// Result returned when a capture session stops and its file is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    /// PCM bytes after the 44-byte header.
    pub data_bytes: u64,
    /// SHA-256 hex digest of the finalized file.
    pub checksum: String,
    pub metadata: RecordingMetadata,
}

/// Metadata describing a finished recording.
///
/// Serializable so it can be stored as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub duration_secs: f64,
    pub data_bytes: u64,
    pub checksum: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    /// Pitch multiplier in effect when the session stopped.
    pub pitch: f64,
    /// Rate multiplier in effect when the session stopped.
    pub rate: f64,
}

impl RecordingMetadata {
    pub fn new(
        format: &WaveFormat,
        file_path: &str,
        data_bytes: u64,
        checksum: &str,
        pitch: f64,
        rate: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: file_path.to_string(),
            duration_secs: format.duration_secs(data_bytes),
            data_bytes,
            checksum: checksum.to_string(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            bit_depth: format.bit_depth,
            pitch,
            rate,
        }
    }
}

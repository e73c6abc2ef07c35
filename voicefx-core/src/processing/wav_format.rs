//! WAV file format utilities.
//!
//! Generates the standard 44-byte RIFF/WAVE header for uncompressed PCM,
//! decodes it back, and computes the two size fields that are only known
//! once the stream is complete.

use crate::models::error::CaptureError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Byte offset of the RIFF `ChunkSize` field.
pub const CHUNK_SIZE_OFFSET: u64 = 4;

/// Byte offset of the `data` sub-chunk size field.
pub const DATA_SIZE_OFFSET: u64 = 40;

/// Channel layouts a recording can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn channels(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

impl TryFrom<u16> for ChannelLayout {
    type Error = CaptureError;

    fn try_from(channels: u16) -> Result<Self, Self::Error> {
        match channels {
            1 => Ok(Self::Mono),
            2 => Ok(Self::Stereo),
            other => Err(CaptureError::ConfigurationFailed(format!(
                "unsupported channel count: {}",
                other
            ))),
        }
    }
}

/// Sample encodings a recording can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    Pcm8,
    Pcm16,
    Float32,
}

impl SampleEncoding {
    pub fn bit_depth(self) -> u16 {
        match self {
            Self::Pcm8 => 8,
            Self::Pcm16 => 16,
            Self::Float32 => 32,
        }
    }
}

impl TryFrom<u16> for SampleEncoding {
    type Error = CaptureError;

    fn try_from(bit_depth: u16) -> Result<Self, Self::Error> {
        match bit_depth {
            8 => Ok(Self::Pcm8),
            16 => Ok(Self::Pcm16),
            32 => Ok(Self::Float32),
            other => Err(CaptureError::ConfigurationFailed(format!(
                "unsupported bit depth: {}",
                other
            ))),
        }
    }
}

/// Validated `{channels, sample_rate, bit_depth}` triple for a WAV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bit_depth: u16,
}

impl WaveFormat {
    /// Validate and build a format. Unsupported values fail with
    /// `ConfigurationFailed` instead of falling back to a default.
    pub fn new(channels: u16, sample_rate: u32, bit_depth: u16) -> Result<Self, CaptureError> {
        let layout = ChannelLayout::try_from(channels)?;
        let encoding = SampleEncoding::try_from(bit_depth)?;
        Self::from_layout(layout, sample_rate, encoding)
    }

    pub fn from_layout(
        layout: ChannelLayout,
        sample_rate: u32,
        encoding: SampleEncoding,
    ) -> Result<Self, CaptureError> {
        if sample_rate == 0 {
            return Err(CaptureError::ConfigurationFailed(
                "sample rate must be positive".into(),
            ));
        }
        let block_align = layout.channels() * (encoding.bit_depth() / 8);
        if sample_rate.checked_mul(block_align as u32).is_none() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "byte rate overflows the header field: {} Hz x {} bytes per frame",
                sample_rate, block_align
            )));
        }
        Ok(Self {
            channels: layout.channels(),
            sample_rate,
            bit_depth: encoding.bit_depth(),
        })
    }

    /// Mono 16-bit at `sample_rate`, the recorder's native capture format.
    pub fn mono_16bit(sample_rate: u32) -> Result<Self, CaptureError> {
        Self::from_layout(ChannelLayout::Mono, sample_rate, SampleEncoding::Pcm16)
    }

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bit_depth / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Playback duration of `data_bytes` of PCM in this format.
    pub fn duration_secs(&self, data_bytes: u64) -> f64 {
        data_bytes as f64 / self.byte_rate() as f64
    }
}

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &WaveFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let chunk_size = 36u32.wrapping_add(data_size);

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bit_depth.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// The provisional header written before any PCM: both size fields zero.
pub fn provisional_header(format: &WaveFormat) -> [u8; WAV_HEADER_SIZE] {
    let mut header = generate_wav_header(format, 0);
    header[4..8].copy_from_slice(&0u32.to_le_bytes());
    header
}

/// `(ChunkSize, Subchunk2Size)` for a file of `file_len` bytes.
///
/// Lengths of 4 GiB or more truncate to 32 bits; callers keep files below that.
pub fn size_fields(file_len: u64) -> (u32, u32) {
    let chunk_size = file_len.saturating_sub(8) as u32;
    let data_size = file_len.saturating_sub(WAV_HEADER_SIZE as u64) as u32;
    (chunk_size, data_size)
}

/// Decoded fields of a 44-byte PCM WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bit_depth: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Decode a header, checking the four chunk tags.
    pub fn parse(bytes: &[u8]) -> Result<Self, CaptureError> {
        if bytes.len() < WAV_HEADER_SIZE {
            return Err(CaptureError::StorageError(format!(
                "WAV header truncated: {} bytes",
                bytes.len()
            )));
        }
        for (range, tag) in [(0..4, b"RIFF"), (8..12, b"WAVE"), (12..16, b"fmt "), (36..40, b"data")] {
            if &bytes[range.clone()] != tag {
                return Err(CaptureError::StorageError(format!(
                    "missing {:?} tag at offset {}",
                    String::from_utf8_lossy(tag),
                    range.start
                )));
            }
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        Ok(Self {
            chunk_size: u32_at(4),
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bit_depth: u16_at(34),
            data_size: u32_at(40),
        })
    }

    pub fn format(&self) -> Result<WaveFormat, CaptureError> {
        WaveFormat::new(self.channels, self.sample_rate, self.bit_depth)
    }
}

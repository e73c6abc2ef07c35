use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::processing::wav_format::{self, WaveFormat, WavHeader, WAV_HEADER_SIZE};

/// Append-only WAV file writer whose header is patched after the fact.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header, both size fields zero until finalize]
/// [raw PCM data...]
/// ```
///
/// The header goes out in `open`, before any PCM. `append` never seeks.
/// `close` flushes and releases the handle without touching the header;
/// [`finalize`] reopens the file and rewrites the two size fields from the
/// file length.
pub struct WaveFileWriter {
    file_path: PathBuf,
    format: WaveFormat,
    file: BufWriter<File>,
    bytes_written: u64,
}

impl WaveFileWriter {
    /// Create (or truncate) `file_path` and write the provisional header.
    pub fn open(file_path: impl Into<PathBuf>, format: WaveFormat) -> Result<Self, CaptureError> {
        let file_path = file_path.into();

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&file_path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))?;
        let mut file = BufWriter::new(file);

        file.write_all(&wav_format::provisional_header(&format))
            .map_err(|e| CaptureError::StorageError(format!("failed to write header: {}", e)))?;

        log::debug!(
            "opened {} ({} Hz, {} ch, {} bit)",
            file_path.display(),
            format.sample_rate,
            format.channels,
            format.bit_depth
        );

        Ok(Self {
            file_path,
            format,
            file,
            bytes_written: 0,
        })
    }

    /// Append PCM bytes after everything written so far.
    pub fn append(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        self.file
            .write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flush and release the file handle. The header is left provisional.
    pub fn close(self) -> Result<ClosedWave, CaptureError> {
        let file = self
            .file
            .into_inner()
            .map_err(|e| CaptureError::StorageError(format!("flush failed: {}", e.error())))?;
        file.sync_all()
            .map_err(|e| CaptureError::StorageError(format!("sync failed: {}", e)))?;

        Ok(ClosedWave {
            file_path: self.file_path,
            format: self.format,
            bytes_written: self.bytes_written,
        })
    }

    /// PCM bytes appended since the header, independent of header contents.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn format(&self) -> &WaveFormat {
        &self.format
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// A closed, not yet finalized, WAV stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedWave {
    file_path: PathBuf,
    format: WaveFormat,
    bytes_written: u64,
}

impl ClosedWave {
    /// Finalize the header, refusing if the file changed since `close`.
    ///
    /// A length other than `44 + bytes_written` means someone wrote to the
    /// file in between, and the patched header would describe data this
    /// stream never produced.
    pub fn finalize(&self) -> Result<WavHeader, CaptureError> {
        let expected = WAV_HEADER_SIZE as u64 + self.bytes_written;
        let actual = fs::metadata(&self.file_path)
            .map_err(|e| CaptureError::StorageError(format!("failed to stat file: {}", e)))?
            .len();
        if actual != expected {
            return Err(CaptureError::StorageError(format!(
                "file length {} does not match {} bytes written since close",
                actual, expected
            )));
        }
        finalize(&self.file_path)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn format(&self) -> &WaveFormat {
        &self.format
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Patch `ChunkSize` (offset 4) and `Subchunk2Size` (offset 40) from the
/// file's current length.
///
/// `ChunkSize = len - 8`, `Subchunk2Size = len - 44`, both little-endian u32.
/// Files of 4 GiB or more truncate. The handle is dropped on every path.
/// Running it again without new writes rewrites the same bytes.
pub fn finalize(path: &Path) -> Result<WavHeader, CaptureError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to reopen {}: {}", path.display(), e)))?;

    let file_len = file
        .metadata()
        .map_err(|e| CaptureError::StorageError(format!("failed to stat file: {}", e)))?
        .len();
    if file_len < WAV_HEADER_SIZE as u64 {
        return Err(CaptureError::StorageError(format!(
            "{} is {} bytes, shorter than a WAV header",
            path.display(),
            file_len
        )));
    }

    let (chunk_size, data_size) = wav_format::size_fields(file_len);
    patch_u32(&mut file, wav_format::CHUNK_SIZE_OFFSET, chunk_size)
        .and_then(|_| patch_u32(&mut file, wav_format::DATA_SIZE_OFFSET, data_size))
        .and_then(|_| file.sync_all())
        .map_err(|e| CaptureError::StorageError(format!("failed to patch header: {}", e)))?;

    log::info!("finalized {}: {} data bytes", path.display(), data_size);

    read_header(path)
}

/// Read and decode the first 44 bytes of a WAV file.
pub fn read_header(path: &Path) -> Result<WavHeader, CaptureError> {
    let mut header = [0u8; WAV_HEADER_SIZE];
    let mut file = File::open(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to open {}: {}", path.display(), e)))?;
    io::Read::read_exact(&mut file, &mut header)
        .map_err(|e| CaptureError::StorageError(format!("failed to read header: {}", e)))?;
    WavHeader::parse(&header)
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let mut file = File::open(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn patch_u32(file: &mut File, offset: u64, value: u32) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&value.to_le_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono16k() -> WaveFormat {
        WaveFormat::new(1, 16000, 16).unwrap()
    }

    #[test]
    fn open_writes_provisional_header_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provisional.wav");

        let writer = WaveFileWriter::open(&path, mono16k()).unwrap();
        writer.close().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 44);
        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.chunk_size, 0);
        assert_eq!(header.data_size, 0);
        assert_eq!(header.audio_format, 1);
    }

    #[test]
    fn finalize_empty_stream_for_every_format() {
        let dir = tempfile::tempdir().unwrap();
        for channels in [1u16, 2] {
            for bit_depth in [8u16, 16, 32] {
                for sample_rate in [8000u32, 16000, 44100, 48000] {
                    let format = WaveFormat::new(channels, sample_rate, bit_depth).unwrap();
                    let path = dir.path().join(format!("{}_{}_{}.wav", channels, sample_rate, bit_depth));

                    WaveFileWriter::open(&path, format).unwrap().close().unwrap();
                    let header = finalize(&path).unwrap();

                    assert_eq!(fs::metadata(&path).unwrap().len(), 44);
                    assert_eq!(header.chunk_size, 36);
                    assert_eq!(header.data_size, 0);
                    assert_eq!(header.format().unwrap(), format);
                }
            }
        }
    }

    #[test]
    fn finalize_reflects_all_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appends.wav");

        let mut writer = WaveFileWriter::open(&path, mono16k()).unwrap();
        let pieces: [&[u8]; 4] = [&[1; 10], &[], &[2; 333], &[3; 4096]];
        for piece in pieces {
            writer.append(piece).unwrap();
        }
        assert_eq!(writer.bytes_written(), 4439);

        let closed = writer.close().unwrap();
        let header = closed.finalize().unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 44 + 4439);
        assert_eq!(header.chunk_size, 4439 + 36);
        assert_eq!(header.data_size, 4439);
    }

    #[test]
    fn refinalizing_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.wav");

        let mut writer = WaveFileWriter::open(&path, mono16k()).unwrap();
        writer.append(&[5; 100]).unwrap();
        let closed = writer.close().unwrap();

        closed.finalize().unwrap();
        let first = fs::read(&path).unwrap();
        closed.finalize().unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn closed_wave_detects_intervening_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tampered.wav");

        let mut writer = WaveFileWriter::open(&path, mono16k()).unwrap();
        writer.append(&[0; 8]).unwrap();
        let closed = writer.close().unwrap();
        closed.finalize().unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0; 6]).unwrap();
        drop(file);

        assert!(matches!(closed.finalize(), Err(CaptureError::StorageError(_))));
    }

    #[test]
    fn finalize_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        fs::write(&path, b"RIFF").unwrap();

        assert!(matches!(finalize(&path), Err(CaptureError::StorageError(_))));
    }

    #[test]
    fn finalize_missing_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            finalize(&dir.path().join("missing.wav")),
            Err(CaptureError::StorageError(_))
        ));
    }

    #[test]
    fn open_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let result = WaveFileWriter::open(blocker.join("out.wav"), mono16k());
        assert!(matches!(result, Err(CaptureError::StorageError(_))));
    }

    #[test]
    fn checksum_is_hex_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digest.bin");
        fs::write(&path, b"abc").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

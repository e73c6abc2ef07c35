use thiserror::Error;

/// Errors that can occur while recording a transformed voice stream.
///
/// Each variant belongs to one [`ErrorKind`], which decides how the session
/// reacts: configuration and state errors leave the session untouched,
/// engine errors are reported per chunk, storage errors end the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("transform engine failed: {0}")]
    EngineFailed(String),

    #[error("a recording session is already in progress")]
    AlreadyRecording,

    #[error("no recording session is in progress")]
    NotRecording,

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Coarse classification of a [`CaptureError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid format or session parameters. Fatal to `start`.
    Configuration,
    /// File creation, append or finalize failure. Fatal to the session.
    Io,
    /// Transform feed/drain failure. Non-fatal.
    Engine,
    /// Operation not allowed in the current session state.
    State,
    /// Capture device failure.
    Device,
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigurationFailed(_) => ErrorKind::Configuration,
            Self::StorageError(_) => ErrorKind::Io,
            Self::EngineFailed(_) => ErrorKind::Engine,
            Self::AlreadyRecording | Self::NotRecording => ErrorKind::State,
            Self::DeviceNotAvailable | Self::Unknown(_) => ErrorKind::Device,
        }
    }

    /// Whether this error ends the current recording session.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self.kind(), ErrorKind::Io)
    }
}

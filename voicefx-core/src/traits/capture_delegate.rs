use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::CaptureState;

/// Event delegate for capture session notifications.
///
/// `on_state_changed` and `on_capture_finished` run on the thread that
/// called `start`/`stop`; `on_error` may run on the capture thread.
/// Implementations should marshal to a UI thread if needed.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called when a chunk fails or cleanup hits an error.
    fn on_error(&self, error: &CaptureError);

    /// Called when the file is finalized.
    fn on_capture_finished(&self, result: &RecordingResult);
}

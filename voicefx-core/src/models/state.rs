/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → recording → finalizing → idle
/// ```
///
/// Only one session may be recording at a time. A storage failure while
/// recording jumps straight through finalizing back to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Recording { chunks_processed: u64 },
    Finalizing,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    pub fn is_finalizing(&self) -> bool {
        matches!(self, Self::Finalizing)
    }

    /// Number of chunks handled so far, if recording.
    pub fn chunks_processed(&self) -> Option<u64> {
        match self {
            Self::Recording { chunks_processed } => Some(*chunks_processed),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording { .. } => "recording",
            Self::Finalizing => "finalizing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert!(CaptureState::default().is_idle());
        assert_eq!(CaptureState::default().chunks_processed(), None);
    }

    #[test]
    fn recording_carries_chunk_count() {
        let state = CaptureState::Recording { chunks_processed: 3 };
        assert!(state.is_recording());
        assert_eq!(state.chunks_processed(), Some(3));
        assert_eq!(state.name(), "recording");
        assert!(CaptureState::Finalizing.is_finalizing());
    }
}

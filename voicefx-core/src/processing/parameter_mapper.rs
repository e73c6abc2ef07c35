/// Maps a bounded control position onto a pitch/rate multiplier.
///
/// Two linear segments meet at the midpoint (multiplier 1.0):
/// ```text
/// p ∈ [0, max/2]      m = 0.75 / (max/2) * p + 0.25     0.25 ..= 1.0
/// p ∈ (max/2, max]    m = 3.0 / (max/2) * p - 2.0       1.0 ..= 4.0
/// ```
/// The lower half of the control compresses into `[0.25, 1.0]` and the upper
/// half expands into `(1.0, 4.0]`, giving finer control near neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterMapper {
    max: u32,
}

/// Control range used by the recorder's sliders.
pub const DEFAULT_CONTROL_MAX: u32 = 1000;

pub const MIN_MULTIPLIER: f64 = 0.25;
pub const NEUTRAL_MULTIPLIER: f64 = 1.0;
pub const MAX_MULTIPLIER: f64 = 4.0;

impl ParameterMapper {
    /// A mapper over `[0, max]`. `max` must be a positive even number so the
    /// midpoint is a reachable position.
    pub fn new(max: u32) -> Option<Self> {
        (max > 0 && max % 2 == 0).then_some(Self { max })
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn midpoint(&self) -> u32 {
        self.max / 2
    }

    /// Multiplier for a control position. Positions above `max` are clamped.
    pub fn map(&self, position: u32) -> f64 {
        let p = position.min(self.max) as f64;
        let half = self.midpoint() as f64;
        if p > half {
            (3.0 / half) * p - 2.0
        } else {
            (0.75 / half) * p + 0.25
        }
    }

    /// Nearest control position producing `multiplier`, clamped to the range.
    pub fn position_for(&self, multiplier: f64) -> u32 {
        let half = self.midpoint() as f64;
        let m = multiplier.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER);
        let p = if m > NEUTRAL_MULTIPLIER {
            (m + 2.0) * half / 3.0
        } else {
            (m - 0.25) * half / 0.75
        };
        (p.round() as u32).min(self.max)
    }
}

impl Default for ParameterMapper {
    fn default() -> Self {
        Self {
            max: DEFAULT_CONTROL_MAX,
        }
    }
}

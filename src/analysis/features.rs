use serde::Serialize;

use super::aggregate::BandAverages;
use super::energy::{BeatEvent, EnergyState};

/// Raw spectrum copies, one per band with everything outside the band zeroed,
/// plus the unmasked spectrum.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BandSpectra {
    pub bass: Vec<u8>,
    pub mid: Vec<u8>,
    pub treble: Vec<u8>,
    pub full: Vec<u8>,
}

/// Everything computed for one frame. Never mutated after publication.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureSnapshot {
    /// Sequence number, starting at 0 for the first published frame.
    pub frame: u64,
    pub timestamp_ms: f64,
    pub frequency_data: BandSpectra,
    /// Band averages on the 0-255 scale.
    pub averages: BandAverages,
    /// Band averages on the 0-1 scale.
    pub normalized: BandAverages,
    pub bins: Vec<f32>,
    pub energy: EnergyState,
    /// Decaying peak hold, one per bin.
    pub peaks: Vec<f32>,
    /// Whether this frame was a beat.
    pub is_peak: bool,
    pub beat: Option<BeatEvent>,
    /// True when the spectrum came from the synthetic generator.
    pub using_fallback_data: bool,
}

impl FeatureSnapshot {
    pub fn buffer_length(&self) -> usize {
        self.frequency_data.full.len()
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }
}

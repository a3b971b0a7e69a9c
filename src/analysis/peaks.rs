use super::settings::check_decay;
use crate::error::AnalyzerError;

/// Per-bin decaying peak hold: `peak[i] = max(bin[i], peak[i] * decay)`.
#[derive(Debug, Clone)]
pub struct PeakTracker {
    peaks: Vec<f32>,
    decay: f32,
}

impl PeakTracker {
    pub fn new(bin_count: usize, decay: f32) -> Self {
        Self {
            peaks: vec![0.0; bin_count],
            decay,
        }
    }

    pub fn set_decay(&mut self, decay: f32) -> Result<(), AnalyzerError> {
        check_decay(decay).map_err(|e| AnalyzerError::InvalidConfiguration(vec![e]))?;
        self.decay = decay;
        Ok(())
    }

    /// Drop held peaks and take a new bin count.
    pub fn resize(&mut self, bin_count: usize) {
        self.peaks.clear();
        self.peaks.resize(bin_count, 0.0);
    }

    pub fn update(&mut self, bins: &[f32]) -> &[f32] {
        if bins.len() != self.peaks.len() {
            self.resize(bins.len());
        }
        for (peak, &bin) in self.peaks.iter_mut().zip(bins) {
            *peak = bin.max(*peak * self.decay);
        }
        &self.peaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_and_decays() {
        let mut tracker = PeakTracker::new(3, 0.5);
        assert_eq!(tracker.update(&[100.0, 0.0, 50.0]), &[100.0, 0.0, 50.0]);
        assert_eq!(tracker.update(&[0.0, 10.0, 40.0]), &[50.0, 10.0, 40.0]);
        assert_eq!(tracker.update(&[0.0, 0.0, 0.0]), &[25.0, 5.0, 20.0]);
    }

    #[test]
    fn peak_never_below_bin() {
        let mut tracker = PeakTracker::new(4, 0.95);
        let frames = [
            [255.0, 10.0, 0.0, 128.0],
            [0.0, 200.0, 5.0, 127.0],
            [30.0, 0.0, 250.0, 0.0],
        ];
        let mut previous = vec![0.0f32; 4];
        for bins in frames {
            let peaks = tracker.update(&bins).to_vec();
            for i in 0..4 {
                assert!(peaks[i] >= bins[i]);
                if bins[i] <= previous[i] * 0.95 {
                    assert!(peaks[i] <= previous[i]);
                }
            }
            previous = peaks;
        }
    }

    #[test]
    fn rejects_decay_out_of_range() {
        let mut tracker = PeakTracker::new(2, 0.95);
        assert!(tracker.set_decay(1.2).is_err());
        assert!(tracker.set_decay(-0.1).is_err());
        tracker.update(&[100.0, 0.0]);
        assert_eq!(tracker.update(&[0.0, 0.0]), &[95.0, 0.0]);
        assert!(tracker.set_decay(0.0).is_ok());
        assert_eq!(tracker.update(&[5.0, 5.0]), &[5.0, 5.0]);
        assert_eq!(tracker.update(&[1.0, 0.0]), &[1.0, 0.0]);
    }

    #[test]
    fn resize_resets_peaks() {
        let mut tracker = PeakTracker::new(2, 0.9);
        tracker.update(&[200.0, 200.0]);
        tracker.resize(4);
        assert_eq!(tracker.update(&[0.0; 4]), &[0.0; 4]);
    }
}

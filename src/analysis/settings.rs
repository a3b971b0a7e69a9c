use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, FieldError};

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// Shape of the analysis: FFT window, analyser smoothing and visual bin count.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub fft_size: usize,
    pub smoothing: f32,
    pub bin_count: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            bin_count: 64,
        }
    }
}

impl AnalyzerConfig {
    /// Number of frequency samples per frame, always `fft_size / 2`.
    pub fn buffer_length(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> Result<(), AnalyzerError> {
        let mut errors = Vec::new();
        let fft_ok = self.fft_size.is_power_of_two()
            && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size);
        if !fft_ok {
            errors.push(FieldError::new(
                "fft_size",
                self.fft_size,
                format!("power of two in [{}, {}]", MIN_FFT_SIZE, MAX_FFT_SIZE),
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            errors.push(FieldError::new("smoothing", self.smoothing, "[0, 1]"));
        }
        // Only meaningful against a valid fft size.
        if fft_ok && (self.bin_count == 0 || self.bin_count > self.fft_size / 4) {
            errors.push(FieldError::new(
                "bin_count",
                self.bin_count,
                format!("(0, {}]", self.fft_size / 4),
            ));
        } else if self.bin_count == 0 {
            errors.push(FieldError::new("bin_count", self.bin_count, "greater than 0"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AnalyzerError::InvalidConfiguration(errors))
        }
    }
}

/// Empirically tuned beat and peak-hold constants.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Relative rise over the rolling average that counts as a beat.
    pub threshold: f32,
    /// Minimum gap between two beats.
    pub min_interval_ms: f64,
    /// Per-frame multiplier applied to peak-hold values.
    pub decay: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_interval_ms: 100.0,
            decay: 0.95,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        let mut errors = Vec::new();
        if let Err(e) = check_threshold(self.threshold) {
            errors.push(e);
        }
        if let Err(e) = check_decay(self.decay) {
            errors.push(e);
        }
        if !(self.min_interval_ms >= 0.0 && self.min_interval_ms.is_finite()) {
            errors.push(FieldError::new("min_interval_ms", self.min_interval_ms, ">= 0"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AnalyzerError::InvalidConfiguration(errors))
        }
    }
}

pub(crate) fn check_threshold(threshold: f32) -> Result<(), FieldError> {
    if threshold >= 0.0 && threshold.is_finite() {
        Ok(())
    } else {
        Err(FieldError::new("threshold", threshold, ">= 0"))
    }
}

pub(crate) fn check_decay(decay: f32) -> Result<(), FieldError> {
    if (0.0..=1.0).contains(&decay) {
        Ok(())
    } else {
        Err(FieldError::new("decay", decay, "[0, 1]"))
    }
}

/// A reconfiguration request. Unset fields keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PartialConfig {
    pub fft_size: Option<usize>,
    pub smoothing: Option<f32>,
    pub bin_count: Option<usize>,
    pub threshold: Option<f32>,
    pub min_interval_ms: Option<f64>,
    pub decay: Option<f32>,
}

impl PartialConfig {
    pub fn fft_size(mut self, fft_size: usize) -> Self {
        self.fft_size = Some(fft_size);
        self
    }

    pub fn smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = Some(smoothing);
        self
    }

    pub fn bin_count(mut self, bin_count: usize) -> Self {
        self.bin_count = Some(bin_count);
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn min_interval_ms(mut self, min_interval_ms: f64) -> Self {
        self.min_interval_ms = Some(min_interval_ms);
        self
    }

    pub fn decay(mut self, decay: f32) -> Self {
        self.decay = Some(decay);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto the current settings and validate the result as a whole.
    /// Nothing is applied unless every field is valid.
    pub fn resolve(
        &self,
        analyzer: &AnalyzerConfig,
        detector: &DetectorConfig,
    ) -> Result<(AnalyzerConfig, DetectorConfig), AnalyzerError> {
        let next_analyzer = AnalyzerConfig {
            fft_size: self.fft_size.unwrap_or(analyzer.fft_size),
            smoothing: self.smoothing.unwrap_or(analyzer.smoothing),
            bin_count: self.bin_count.unwrap_or(analyzer.bin_count),
        };
        let next_detector = DetectorConfig {
            threshold: self.threshold.unwrap_or(detector.threshold),
            min_interval_ms: self.min_interval_ms.unwrap_or(detector.min_interval_ms),
            decay: self.decay.unwrap_or(detector.decay),
        };

        let mut errors = Vec::new();
        for result in [next_analyzer.validate(), next_detector.validate()] {
            if let Err(AnalyzerError::InvalidConfiguration(fields)) = result {
                errors.extend(fields);
            }
        }
        if errors.is_empty() {
            Ok((next_analyzer, next_detector))
        } else {
            Err(AnalyzerError::InvalidConfiguration(errors))
        }
    }
}

use super::source::{SignalSource, SourceId, SourceKind};
use crate::analysis::settings::AnalyzerConfig;
use crate::error::SourceError;

/// (time rate, per-index rate) for each region of the spectrum.
const BASS_PHASE: (f64, f64) = (1.5, 0.05);
const MID_PHASE: (f64, f64) = (2.5, 0.08);
const TREBLE_PHASE: (f64, f64) = (3.5, 0.1);

/// Fill `out` with `128 + 127 * sin(phase)`, where the phase depends only on
/// `elapsed_secs` and the index. The lowest 20% of indices use the bass
/// phase, up to 50% the mid phase, the rest the treble phase.
pub fn synthetic_spectrum(elapsed_secs: f64, out: &mut [u8]) {
    let len = out.len() as f64;
    for (i, value) in out.iter_mut().enumerate() {
        let x = i as f64;
        let (rate, spread) = if x < len * 0.2 {
            BASS_PHASE
        } else if x < len * 0.5 {
            MID_PHASE
        } else {
            TREBLE_PHASE
        };
        let v = 128.0 + 127.0 * (elapsed_secs * rate + x * spread).sin();
        *value = v.clamp(0.0, 255.0) as u8;
    }
}

#[derive(Clone, Debug)]
pub struct SyntheticSource {
    id: SourceId,
    sample_rate: f32,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            id: SourceId::next(),
            sample_rate,
            connected: false,
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl SignalSource for SyntheticSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn connect(&mut self, _config: &AnalyzerConfig) -> Result<(), SourceError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn configure(&mut self, _config: &AnalyzerConfig) {}

    fn is_ready(&self) -> bool {
        self.connected
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn magnitude_spectrum(&mut self, now_ms: f64, out: &mut [u8]) -> Result<(), SourceError> {
        synthetic_spectrum(now_ms / 1000.0, out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_time_gives_identical_output() {
        let mut a = vec![0u8; 1024];
        let mut b = vec![0u8; 1024];
        synthetic_spectrum(12.345, &mut a);
        synthetic_spectrum(12.345, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn output_changes_over_time() {
        let mut a = vec![0u8; 256];
        let mut b = vec![0u8; 256];
        synthetic_spectrum(0.0, &mut a);
        synthetic_spectrum(0.5, &mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn starts_at_midpoint() {
        let mut out = vec![0u8; 64];
        synthetic_spectrum(0.0, &mut out);
        // sin(0) = 0 for index 0.
        assert_eq!(out[0], 128);
        assert!(out.iter().any(|&v| v != 0));
    }

    #[test]
    fn source_reads_from_frame_time() {
        let mut source = SyntheticSource::default();
        source.connect(&AnalyzerConfig::default()).unwrap();
        assert!(source.is_ready());
        let mut out = vec![0u8; 512];
        source.magnitude_spectrum(2500.0, &mut out).unwrap();
        let mut expected = vec![0u8; 512];
        synthetic_spectrum(2.5, &mut expected);
        assert_eq!(out, expected);
        assert!(!source.is_live());
    }
}

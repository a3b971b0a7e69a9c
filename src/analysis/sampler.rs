use crate::audio::source::SignalSource;
use crate::audio::synthetic::synthetic_spectrum;

#[derive(Debug)]
pub struct SpectrumSampler {
    spectrum: Vec<u8>,
    using_fallback: bool,
}

impl SpectrumSampler {
    pub fn new(buffer_length: usize) -> Self {
        Self {
            spectrum: vec![0; buffer_length],
            using_fallback: false,
        }
    }

    pub fn buffer_length(&self) -> usize {
        self.spectrum.len()
    }

    pub fn resize(&mut self, buffer_length: usize) {
        self.spectrum.clear();
        self.spectrum.resize(buffer_length, 0);
    }

    pub fn using_fallback(&self) -> bool {
        self.using_fallback
    }

    /// Forget the fallback state, e.g. after the source was replaced.
    pub fn reset(&mut self) {
        self.using_fallback = false;
        self.spectrum.iter_mut().for_each(|v| *v = 0);
    }

    /// Current frame's spectrum. `source` is `None` when nothing is attached
    /// or the attached source failed to connect.
    pub fn sample(&mut self, source: Option<&mut dyn SignalSource>, now_ms: f64) -> &[u8] {
        let real = match source {
            Some(source) if source.is_ready() => match source.magnitude_spectrum(now_ms, &mut self.spectrum) {
                Ok(()) if self.spectrum.iter().any(|&v| v > 0) => true,
                Ok(()) => {
                    self.enter_fallback("source returned an all-zero spectrum");
                    false
                }
                Err(e) => {
                    self.enter_fallback(&e.to_string());
                    false
                }
            },
            Some(_) => {
                self.enter_fallback("source is not ready");
                false
            }
            None => {
                self.enter_fallback("no connected source");
                false
            }
        };

        if real {
            if self.using_fallback {
                log::info!("Real spectrum data available again, leaving fallback");
                self.using_fallback = false;
            }
        } else {
            synthetic_spectrum(now_ms / 1000.0, &mut self.spectrum);
        }
        &self.spectrum
    }

    fn enter_fallback(&mut self, reason: &str) {
        if !self.using_fallback {
            log::warn!("Using synthetic spectrum: {}", reason);
            self.using_fallback = true;
        }
    }
}

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::analysis::settings::AnalyzerConfig;

/// Magnitudes at or below this map to 0.
pub const MIN_DECIBELS: f32 = -100.0;
/// Magnitudes at or above this map to 255.
pub const MAX_DECIBELS: f32 = -30.0;

/// Windowed FFT with temporal smoothing and a dB → 0-255 mapping.
///
/// All buffers are sized once per FFT size and reused across frames.
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    planner: FftPlanner<f32>,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            fft_size: config.fft_size,
            smoothing: config.smoothing,
            planner,
            fft,
            window: blackman_window(config.fft_size),
            buffer: vec![Complex::new(0.0, 0.0); config.fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            smoothed: vec![0.0; config.fft_size / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Apply a new shape. A new FFT size re-plans and drops smoothing memory.
    pub fn configure(&mut self, config: &AnalyzerConfig) {
        self.smoothing = config.smoothing;
        if config.fft_size == self.fft_size {
            return;
        }
        log::debug!("Analyser resize: fft_size {} -> {}", self.fft_size, config.fft_size);
        self.fft_size = config.fft_size;
        self.fft = self.planner.plan_fft_forward(config.fft_size);
        self.window = blackman_window(config.fft_size);
        self.buffer = vec![Complex::new(0.0, 0.0); config.fft_size];
        self.scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        self.smoothed = vec![0.0; config.fft_size / 2];
    }

    /// Analyse the most recent `fft_size` samples of `samples` (zero-padded
    /// at the front when shorter) into `out`.
    pub fn process(&mut self, samples: &[f32], out: &mut [u8]) {
        let n = self.fft_size;
        let take = samples.len().min(n);
        let pad = n - take;
        let tail = &samples[samples.len() - take..];

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let s = if i < pad { 0.0 } else { tail[i - pad] };
            *slot = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / n as f32;
        let tau = self.smoothing;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for (k, value) in out.iter_mut().enumerate().take(n / 2) {
            let magnitude = self.buffer[k].norm() * scale;
            let mut smoothed = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            if !smoothed.is_finite() {
                smoothed = 0.0;
            }
            self.smoothed[k] = smoothed;
            *value = to_byte(smoothed, range);
        }
    }
}

fn to_byte(magnitude: f32, range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (255.0 / range * (db - MIN_DECIBELS)).floor();
    scaled.clamp(0.0, 255.0) as u8
}

/// Blackman window with alpha = 0.16.
pub fn blackman_window(size: usize) -> Vec<f32> {
    let alpha = 0.16f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

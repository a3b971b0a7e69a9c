//! Live input source. Samples arrive through a [`StreamFeed`] from whatever
//! thread owns the capture device.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::analyser::SpectrumAnalyser;
use super::source::{SignalSource, SourceId, SourceKind};
use crate::analysis::settings::{AnalyzerConfig, MAX_FFT_SIZE};
use crate::error::SourceError;

#[derive(Debug, Default)]
struct FeedState {
    samples: VecDeque<f32>,
    closed: bool,
}

/// Producer side of a live stream. Keeps only the newest samples needed for
/// the largest analysis window.
#[derive(Clone, Debug, Default)]
pub struct StreamFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl StreamFeed {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, samples: &[f32]) {
        let mut state = self.lock();
        state.samples.extend(samples.iter().copied());
        let excess = state.samples.len().saturating_sub(MAX_FFT_SIZE);
        state.samples.drain(..excess);
    }

    /// Mark the producer as gone; the source stops being ready.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn buffered(&self) -> usize {
        self.lock().samples.len()
    }

    fn copy_latest(&self, len: usize, out: &mut Vec<f32>) {
        let state = self.lock();
        let start = state.samples.len().saturating_sub(len);
        out.clear();
        out.extend(state.samples.range(start..));
    }
}

pub struct StreamSource {
    id: SourceId,
    sample_rate: f32,
    feed: StreamFeed,
    analyser: Option<SpectrumAnalyser>,
    window: Vec<f32>,
}

impl StreamSource {
    pub fn new(sample_rate: f32) -> (Self, StreamFeed) {
        let feed = StreamFeed::default();
        let source = Self {
            id: SourceId::next(),
            sample_rate,
            feed: feed.clone(),
            analyser: None,
            window: Vec::new(),
        };
        (source, feed)
    }
}

impl SignalSource for StreamSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Stream
    }

    fn connect(&mut self, config: &AnalyzerConfig) -> Result<(), SourceError> {
        if self.feed.is_closed() {
            return Err(SourceError::Connection("stream already closed".into()));
        }
        if self.sample_rate <= 0.0 {
            return Err(SourceError::Connection(format!(
                "invalid sample rate {}",
                self.sample_rate
            )));
        }
        self.analyser = Some(SpectrumAnalyser::new(config));
        self.window = Vec::with_capacity(config.fft_size);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.analyser = None;
    }

    fn configure(&mut self, config: &AnalyzerConfig) {
        if let Some(analyser) = self.analyser.as_mut() {
            analyser.configure(config);
        }
    }

    fn is_ready(&self) -> bool {
        self.analyser.is_some() && !self.feed.is_closed()
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn magnitude_spectrum(&mut self, _now_ms: f64, out: &mut [u8]) -> Result<(), SourceError> {
        if self.feed.is_closed() {
            return Err(SourceError::Read("stream closed".into()));
        }
        let analyser = self.analyser.as_mut().ok_or(SourceError::NotReady)?;
        self.feed.copy_latest(analyser.fft_size(), &mut self.window);
        analyser.process(&self.window, out);
        Ok(())
    }
}

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::analysis::settings::AnalyzerConfig;
use crate::error::SourceError;

/// Identity of a signal source. Clones of a source share it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SourceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Decoded file playback.
    MediaElement,
    /// Microphone or other live input.
    Stream,
    /// Deterministic generator.
    Synthetic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::MediaElement => "media-element",
            SourceKind::Stream => "stream",
            SourceKind::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// Anything the publisher can pull a magnitude spectrum from.
pub trait SignalSource {
    fn id(&self) -> SourceId;

    fn kind(&self) -> SourceKind;

    /// Live sources never end and are not routed to an output.
    fn is_live(&self) -> bool {
        self.kind() == SourceKind::Stream
    }

    fn provides_frequency_data(&self) -> bool {
        true
    }

    /// Establish the signal path. Called once on attach.
    fn connect(&mut self, config: &AnalyzerConfig) -> Result<(), SourceError>;

    /// Tear down the signal path. Must be safe to call more than once.
    fn disconnect(&mut self);

    /// Apply a new analysis shape; takes effect on the next read.
    fn configure(&mut self, config: &AnalyzerConfig);

    fn is_ready(&self) -> bool;

    fn sample_rate(&self) -> f32;

    /// Fill `out` (length `fft_size / 2`) with 0-255 magnitudes for the frame
    /// at `now_ms`.
    fn magnitude_spectrum(&mut self, now_ms: f64, out: &mut [u8]) -> Result<(), SourceError>;
}

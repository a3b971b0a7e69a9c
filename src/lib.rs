//! Real-time audio feature extraction for audio-reactive visuals.
//!
//! A [`FeaturePublisher`] pulls one magnitude spectrum per frame from a
//! [`SignalSource`], reduces it to band averages, bins, energy, beats and
//! peak-hold values, and hands an immutable [`FeatureSnapshot`] to each
//! subscriber.

pub mod analysis;
pub mod audio;
pub mod error;
pub mod frame_loop;
pub mod sink;

pub use analysis::{AnalyzerConfig, DetectorConfig, FeaturePublisher, FeatureSnapshot, PartialConfig, Subscriber};
pub use audio::SignalSource;
pub use error::{AnalyzerError, SourceError};

//! Owns the source binding and configuration, runs one frame through the
//! pipeline and hands the resulting snapshot to every subscriber.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;

use super::aggregate::{aggregate, band_spectrum};
use super::bands::{Band, BandTable, BAND_RANGES};
use super::energy::{BeatEvent, EnergyDetector};
use super::features::{BandSpectra, FeatureSnapshot};
use super::peaks::PeakTracker;
use super::sampler::SpectrumSampler;
use super::settings::{AnalyzerConfig, DetectorConfig, PartialConfig};
use crate::audio::source::{SignalSource, SourceId};
use crate::error::{AnalyzerError, FieldError};

/// Sample rate assumed for band mapping while no source is attached.
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Receives one snapshot per frame.
///
/// Errors and panics are logged by the publisher and never stop the frame
/// or the other subscribers.
pub trait Subscriber {
    fn on_feature_frame(&mut self, snapshot: &Arc<FeatureSnapshot>) -> Result<()>;

    fn on_beat(&mut self, _beat: &BeatEvent) -> Result<()> {
        Ok(())
    }

    /// Flush anything buffered. Called by `FeaturePublisher::finish_subscribers`.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F> Subscriber for F
where
    F: FnMut(&FeatureSnapshot) -> Result<()>,
{
    fn on_feature_frame(&mut self, snapshot: &Arc<FeatureSnapshot>) -> Result<()> {
        self(snapshot.as_ref())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner {
    config: AnalyzerConfig,
    detector_config: DetectorConfig,
    source: Option<Box<dyn SignalSource>>,
    connected: bool,
    sampler: SpectrumSampler,
    bands: BandTable,
    energy: EnergyDetector,
    peaks: PeakTracker,
    subscribers: Vec<(SubscriptionId, Box<dyn Subscriber>)>,
    next_subscription: u64,
    volume: f32,
    frame: u64,
}

impl Inner {
    fn sample_rate(&self) -> f32 {
        self.source
            .as_ref()
            .map(|s| s.sample_rate())
            .filter(|&sr| sr > 0.0)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    fn detach(&mut self) -> bool {
        match self.source.take() {
            Some(mut source) => {
                source.disconnect();
                self.connected = false;
                log::info!("Detached {} source {}", source.kind(), source.id());
                true
            }
            None => false,
        }
    }

    fn refresh_bands(&mut self) {
        let sample_rate = self.sample_rate();
        let buffer_length = self.config.buffer_length();
        self.bands.refresh(&BAND_RANGES, sample_rate, buffer_length);
    }
}

/// Single long-lived pipeline instance. Control operations take `&mut self`,
/// so they always land between frames, never inside one.
pub struct FeaturePublisher {
    inner: Option<Inner>,
}

impl Default for FeaturePublisher {
    fn default() -> Self {
        Self::from_valid(AnalyzerConfig::default(), DetectorConfig::default())
    }
}

impl FeaturePublisher {
    pub fn new(config: AnalyzerConfig, detector: DetectorConfig) -> Result<Self, AnalyzerError> {
        let mut errors = Vec::new();
        for result in [config.validate(), detector.validate()] {
            if let Err(AnalyzerError::InvalidConfiguration(fields)) = result {
                errors.extend(fields);
            }
        }
        if !errors.is_empty() {
            return Err(AnalyzerError::InvalidConfiguration(errors));
        }
        Ok(Self::from_valid(config, detector))
    }

    fn from_valid(config: AnalyzerConfig, detector: DetectorConfig) -> Self {
        let buffer_length = config.buffer_length();
        Self {
            inner: Some(Inner {
                config,
                detector_config: detector,
                source: None,
                connected: false,
                sampler: SpectrumSampler::new(buffer_length),
                bands: BandTable::new(&BAND_RANGES, DEFAULT_SAMPLE_RATE, buffer_length),
                energy: EnergyDetector::new(&detector),
                peaks: PeakTracker::new(config.bin_count, detector.decay),
                subscribers: Vec::new(),
                next_subscription: 0,
                volume: 1.0,
                frame: 0,
            }),
        }
    }

    fn inner(&self) -> Result<&Inner, AnalyzerError> {
        self.inner.as_ref().ok_or(AnalyzerError::Disposed)
    }

    fn inner_mut(&mut self) -> Result<&mut Inner, AnalyzerError> {
        self.inner.as_mut().ok_or(AnalyzerError::Disposed)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn config(&self) -> Result<AnalyzerConfig, AnalyzerError> {
        Ok(self.inner()?.config)
    }

    pub fn detector_config(&self) -> Result<DetectorConfig, AnalyzerError> {
        Ok(self.inner()?.detector_config)
    }

    pub fn buffer_length(&self) -> Result<usize, AnalyzerError> {
        Ok(self.inner()?.sampler.buffer_length())
    }

    /// True while frames are built from synthetic data.
    pub fn using_fallback_data(&self) -> Result<bool, AnalyzerError> {
        Ok(self.inner()?.sampler.using_fallback())
    }

    pub fn source_id(&self) -> Result<Option<SourceId>, AnalyzerError> {
        Ok(self.inner()?.source.as_ref().map(|s| s.id()))
    }

    pub fn is_source_connected(&self) -> Result<bool, AnalyzerError> {
        Ok(self.inner()?.connected)
    }

    /// Replace the active source. The previous one is disconnected first.
    /// Attaching the source that is already attached does nothing.
    ///
    /// A connection failure is not an error: the source stays attached and
    /// frames come from the synthetic generator.
    pub fn attach_source(&mut self, source: Box<dyn SignalSource>) -> Result<(), AnalyzerError> {
        let inner = self.inner_mut()?;
        if inner.source.as_ref().map(|s| s.id()) == Some(source.id()) {
            log::debug!("Source {} already attached", source.id());
            return Ok(());
        }
        inner.detach();

        let mut source = source;
        match source.connect(&inner.config) {
            Ok(()) => {
                inner.connected = true;
                log::info!(
                    "Attached {} source {} ({} Hz)",
                    source.kind(),
                    source.id(),
                    source.sample_rate()
                );
            }
            Err(e) => {
                inner.connected = false;
                log::warn!("Could not connect {} source {}: {}", source.kind(), source.id(), e);
            }
        }
        inner.source = Some(source);
        inner.sampler.reset();
        inner.energy.reset();
        inner.refresh_bands();
        Ok(())
    }

    /// Disconnect and drop the active source. Returns whether one was attached.
    pub fn detach_source(&mut self) -> Result<bool, AnalyzerError> {
        let inner = self.inner_mut()?;
        let detached = inner.detach();
        inner.sampler.reset();
        inner.refresh_bands();
        Ok(detached)
    }

    /// Validate and apply a partial update. Either every field is applied
    /// before the next frame or nothing changes.
    pub fn reconfigure(&mut self, partial: PartialConfig) -> Result<(), AnalyzerError> {
        let inner = self.inner_mut()?;
        let (config, detector) = partial.resolve(&inner.config, &inner.detector_config)?;

        if config.fft_size != inner.config.fft_size {
            inner.sampler.resize(config.buffer_length());
        }
        if config.bin_count != inner.config.bin_count {
            inner.peaks.resize(config.bin_count);
        }
        inner.peaks.set_decay(detector.decay)?;
        inner.energy.apply(&detector);

        let changed = config != inner.config;
        inner.config = config;
        inner.detector_config = detector;
        if changed {
            if let Some(source) = inner.source.as_mut() {
                source.configure(&config);
            }
        }
        inner.refresh_bands();
        log::info!(
            "Reconfigured: fft_size={} smoothing={} bin_count={} threshold={} decay={}",
            config.fft_size,
            config.smoothing,
            config.bin_count,
            detector.threshold,
            detector.decay
        );
        Ok(())
    }

    pub fn set_peak_threshold(&mut self, threshold: f32) -> Result<(), AnalyzerError> {
        self.reconfigure(PartialConfig::default().threshold(threshold))
    }

    pub fn set_peak_decay(&mut self, decay: f32) -> Result<(), AnalyzerError> {
        self.reconfigure(PartialConfig::default().decay(decay))
    }

    /// Output gain. Has no effect on analysis.
    pub fn set_volume(&mut self, level: f32) -> Result<(), AnalyzerError> {
        let inner = self.inner_mut()?;
        if !(level >= 0.0 && level.is_finite()) {
            return Err(AnalyzerError::InvalidConfiguration(vec![FieldError::new(
                "volume", level, ">= 0",
            )]));
        }
        inner.volume = level;
        Ok(())
    }

    pub fn volume(&self) -> Result<f32, AnalyzerError> {
        Ok(self.inner()?.volume)
    }

    pub fn subscribe<S>(&mut self, subscriber: S) -> Result<SubscriptionId, AnalyzerError>
    where
        S: Subscriber + 'static,
    {
        let inner = self.inner_mut()?;
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.subscribers.push((id, Box::new(subscriber)));
        log::debug!("Subscriber {:?} registered ({} total)", id, inner.subscribers.len());
        Ok(id)
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<bool, AnalyzerError> {
        let inner = self.inner_mut()?;
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        Ok(inner.subscribers.len() != before)
    }

    pub fn subscriber_count(&self) -> Result<usize, AnalyzerError> {
        Ok(self.inner()?.subscribers.len())
    }

    /// Run one frame at host time `now_ms` and deliver it.
    pub fn process_frame(&mut self, now_ms: f64) -> Result<Arc<FeatureSnapshot>, AnalyzerError> {
        let inner = self.inner_mut()?;

        let source = if inner.connected {
            inner.source.as_mut().map(|s| &mut **s as &mut dyn SignalSource)
        } else {
            None
        };
        let spectrum = inner.sampler.sample(source, now_ms);

        let bin_count = inner.config.bin_count;
        let agg = aggregate(spectrum, &inner.bands, bin_count);
        let range = |band: Band| inner.bands.get(band);
        let frequency_data = BandSpectra {
            bass: masked(spectrum, range(Band::Bass)),
            mid: masked(spectrum, range(Band::Mid)),
            treble: masked(spectrum, range(Band::Treble)),
            full: spectrum.to_vec(),
        };

        let (energy, beat) = inner.energy.update(agg.normalized.full, now_ms);
        let peaks = inner.peaks.update(&agg.bins).to_vec();

        let snapshot = Arc::new(FeatureSnapshot {
            frame: inner.frame,
            timestamp_ms: now_ms,
            frequency_data,
            averages: agg.averages,
            normalized: agg.normalized,
            bins: agg.bins,
            energy,
            peaks,
            is_peak: beat.is_some(),
            beat,
            using_fallback_data: inner.sampler.using_fallback(),
        });
        inner.frame += 1;

        deliver(&mut inner.subscribers, &snapshot);
        Ok(snapshot)
    }

    /// Let every subscriber flush its output. All are finished even if one
    /// fails; the first failure is returned.
    pub fn finish_subscribers(&mut self) -> Result<()> {
        let inner = self.inner_mut()?;
        let mut first_error = None;
        for (id, subscriber) in inner.subscribers.iter_mut() {
            if let Err(e) = subscriber.finish() {
                log::warn!("Subscriber {:?} failed to finish: {:#}", id, e);
                first_error.get_or_insert(e.context(format!("Subscriber {:?} failed to finish", id)));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Disconnect the source, drop subscribers and buffers. Every later call
    /// except this one fails with [`AnalyzerError::Disposed`].
    pub fn destroy(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.detach();
            log::info!(
                "Feature publisher destroyed after {} frames, {} subscribers dropped",
                inner.frame,
                inner.subscribers.len()
            );
        }
    }
}

fn masked(spectrum: &[u8], range: Option<super::bands::IndexRange>) -> Vec<u8> {
    match range {
        Some(range) => band_spectrum(spectrum, range),
        None => vec![0; spectrum.len()],
    }
}

fn deliver(subscribers: &mut [(SubscriptionId, Box<dyn Subscriber>)], snapshot: &Arc<FeatureSnapshot>) {
    for (id, subscriber) in subscribers.iter_mut() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            subscriber.on_feature_frame(snapshot)?;
            if let Some(beat) = &snapshot.beat {
                subscriber.on_beat(beat)?;
            }
            Ok::<(), anyhow::Error>(())
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Subscriber {:?} failed on frame {}: {:#}", id, snapshot.frame, e),
            Err(payload) => log::error!(
                "Subscriber {:?} panicked on frame {}: {}",
                id,
                snapshot.frame,
                panic_message(payload.as_ref())
            ),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

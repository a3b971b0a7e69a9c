use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::analyser::SpectrumAnalyser;
use super::decode::AudioData;
use super::source::{SignalSource, SourceId, SourceKind};
use crate::analysis::settings::AnalyzerConfig;
use crate::error::SourceError;

#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    /// The track is loaded and can play.
    Ready,
    Error(String),
    /// Playback reached the end of the track.
    Ended,
}

/// Transport controls for a playing source.
pub trait Playback {
    fn play(&self);
    fn pause(&self);
    fn is_playing(&self) -> bool;
    fn seek(&self, position_secs: f64);
    fn position_secs(&self) -> f64;
    /// Drain lifecycle events raised since the last call.
    fn poll_events(&self) -> Vec<PlaybackEvent>;
}

#[derive(Debug)]
struct Transport {
    playing: bool,
    position_secs: f64,
    duration_secs: f64,
    last_tick_ms: Option<f64>,
    events: VecDeque<PlaybackEvent>,
}

impl Transport {
    /// Move the playhead by the time elapsed since the previous tick.
    fn advance(&mut self, now_ms: f64) {
        if !self.playing {
            self.last_tick_ms = None;
            return;
        }
        if let Some(last) = self.last_tick_ms {
            self.position_secs += ((now_ms - last) / 1000.0).max(0.0);
        }
        self.last_tick_ms = Some(now_ms);
        if self.position_secs >= self.duration_secs {
            self.position_secs = self.duration_secs;
            self.playing = false;
            self.last_tick_ms = None;
            self.events.push_back(PlaybackEvent::Ended);
            log::info!("Playback ended at {:.2}s", self.duration_secs);
        }
    }
}

/// Shared handle to a source's transport; usable from any thread.
#[derive(Clone, Debug)]
pub struct PlaybackHandle {
    inner: Arc<Mutex<Transport>>,
}

impl PlaybackHandle {
    fn lock(&self) -> MutexGuard<'_, Transport> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn duration_secs(&self) -> f64 {
        self.lock().duration_secs
    }
}

impl Playback for PlaybackHandle {
    fn play(&self) {
        let mut t = self.lock();
        if t.position_secs >= t.duration_secs {
            t.position_secs = 0.0;
        }
        t.playing = t.duration_secs > 0.0;
        t.last_tick_ms = None;
    }

    fn pause(&self) {
        let mut t = self.lock();
        t.playing = false;
        t.last_tick_ms = None;
    }

    fn is_playing(&self) -> bool {
        self.lock().playing
    }

    fn seek(&self, position_secs: f64) {
        let mut t = self.lock();
        t.position_secs = position_secs.clamp(0.0, t.duration_secs);
        t.last_tick_ms = None;
    }

    fn position_secs(&self) -> f64 {
        self.lock().position_secs
    }

    fn poll_events(&self) -> Vec<PlaybackEvent> {
        self.lock().events.drain(..).collect()
    }
}

/// Plays a decoded track and analyses the samples under the playhead.
///
/// Paused or finished playback reads as silence.
#[derive(Clone)]
pub struct MediaElementSource {
    id: SourceId,
    audio: Arc<AudioData>,
    transport: PlaybackHandle,
    analyser: Option<Arc<Mutex<SpectrumAnalyser>>>,
}

impl MediaElementSource {
    pub fn new(audio: Arc<AudioData>) -> Self {
        let mut events = VecDeque::new();
        if audio.samples.is_empty() || audio.sample_rate == 0 {
            events.push_back(PlaybackEvent::Error("track contains no audio".into()));
        } else {
            events.push_back(PlaybackEvent::Ready);
        }
        let transport = Transport {
            playing: false,
            position_secs: 0.0,
            duration_secs: audio.duration_secs(),
            last_tick_ms: None,
            events,
        };
        Self {
            id: SourceId::next(),
            audio,
            transport: PlaybackHandle {
                inner: Arc::new(Mutex::new(transport)),
            },
            analyser: None,
        }
    }

    pub fn playback(&self) -> PlaybackHandle {
        self.transport.clone()
    }

    pub fn audio(&self) -> &AudioData {
        &self.audio
    }
}

impl SignalSource for MediaElementSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::MediaElement
    }

    fn connect(&mut self, config: &AnalyzerConfig) -> Result<(), SourceError> {
        if self.audio.samples.is_empty() || self.audio.sample_rate == 0 {
            return Err(SourceError::Connection("track contains no audio".into()));
        }
        self.analyser = Some(Arc::new(Mutex::new(SpectrumAnalyser::new(config))));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.analyser = None;
    }

    fn configure(&mut self, config: &AnalyzerConfig) {
        if let Some(analyser) = &self.analyser {
            analyser
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .configure(config);
        }
    }

    fn is_ready(&self) -> bool {
        self.analyser.is_some()
    }

    fn sample_rate(&self) -> f32 {
        self.audio.sample_rate as f32
    }

    fn magnitude_spectrum(&mut self, now_ms: f64, out: &mut [u8]) -> Result<(), SourceError> {
        let analyser = self.analyser.as_ref().ok_or(SourceError::NotReady)?;
        let mut analyser = analyser.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let position = {
            let mut t = self.transport.lock();
            t.advance(now_ms);
            t.playing.then_some(t.position_secs)
        };

        match position {
            Some(pos) => {
                let window = self.audio.window_ending_at(pos, analyser.fft_size());
                analyser.process(window, out);
            }
            None => out.fill(0),
        }
        Ok(())
    }
}

use std::cell::RefCell;
use std::io::Write;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use spectra::analysis::energy::BeatEvent;
use spectra::analysis::mailbox::frame_mailbox;
use spectra::audio::decode::AudioData;
use spectra::audio::{MediaElementSource, Playback, PlaybackEvent, SignalSource, SourceId, SourceKind};
use spectra::frame_loop::{Clocking, FrameLoop};
use spectra::sink::JsonLinesSink;
use spectra::{AnalyzerConfig, DetectorConfig, FeaturePublisher, FeatureSnapshot, PartialConfig, SourceError, Subscriber};

fn tone(hz: f32, sample_rate: u32, secs: f32) -> Arc<AudioData> {
    let n = (sample_rate as f32 * secs) as usize;
    let samples = (0..n)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * hz * i as f32 / sample_rate as f32).sin())
        .collect();
    Arc::new(AudioData::new(samples, sample_rate))
}

/// Flat spectrum whose level is scripted per call.
struct Levels {
    id: SourceId,
    levels: Vec<u8>,
    call: usize,
}

impl Levels {
    fn new(levels: Vec<u8>) -> Self {
        Self { id: SourceId::next(), levels, call: 0 }
    }
}

impl SignalSource for Levels {
    fn id(&self) -> SourceId {
        self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Stream
    }

    fn connect(&mut self, _config: &AnalyzerConfig) -> Result<(), SourceError> {
        Ok(())
    }

    fn disconnect(&mut self) {}

    fn configure(&mut self, _config: &AnalyzerConfig) {}

    fn is_ready(&self) -> bool {
        true
    }

    fn sample_rate(&self) -> f32 {
        44100.0
    }

    fn magnitude_spectrum(&mut self, _now_ms: f64, out: &mut [u8]) -> Result<(), SourceError> {
        let level = self.levels[self.call.min(self.levels.len() - 1)];
        self.call += 1;
        out.fill(level);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn media_playback_runs_until_ended() {
    let config = AnalyzerConfig { fft_size: 1024, smoothing: 0.0, bin_count: 32 };
    let mut publisher = FeaturePublisher::new(config, DetectorConfig::default()).unwrap();
    let media = MediaElementSource::new(tone(1000.0, 8000, 1.0));
    let playback = media.playback();

    assert_eq!(playback.poll_events(), vec![PlaybackEvent::Ready]);
    publisher.attach_source(Box::new(media.clone())).unwrap();
    playback.play();

    let collected: Rc<RefCell<Vec<FeatureSnapshot>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = collected.clone();
    publisher
        .subscribe(move |s: &FeatureSnapshot| -> Result<()> {
            sink.borrow_mut().push(s.clone());
            Ok(())
        })
        .unwrap();

    let frame_loop = FrameLoop::new(20, Clocking::Offline);
    let produced = frame_loop
        .run(&mut publisher, Some(100), |_| {
            if playback.poll_events().contains(&PlaybackEvent::Ended) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

    // Frames at 0, 50, ..., 1000 ms; the last one reaches the end of the track.
    assert_eq!(produced, 21);
    let frames = collected.borrow();
    assert_eq!(frames.len(), 21);
    assert!(frames[0].using_fallback_data);

    let playing = &frames[10];
    assert!(!playing.using_fallback_data);
    assert_eq!(playing.buffer_length(), 512);
    assert!(playing.averages.mid > playing.averages.treble);
    assert!(!playback.is_playing());
}

#[test]
fn beats_reach_subscribers_and_json_stream() {
    let mut publisher = FeaturePublisher::default();
    let mut levels = vec![64u8; 10];
    levels.push(255);
    levels.extend(std::iter::repeat(64).take(5));
    publisher.attach_source(Box::new(Levels::new(levels))).unwrap();

    struct Beats(Rc<RefCell<Vec<BeatEvent>>>);
    impl Subscriber for Beats {
        fn on_feature_frame(&mut self, _snapshot: &Arc<FeatureSnapshot>) -> Result<()> {
            Ok(())
        }

        fn on_beat(&mut self, beat: &BeatEvent) -> Result<()> {
            self.0.borrow_mut().push(*beat);
            Ok(())
        }
    }

    let beats = Rc::new(RefCell::new(Vec::new()));
    publisher.subscribe(Beats(beats.clone())).unwrap();
    let out = SharedBuf::default();
    publisher.subscribe(JsonLinesSink::new(out.clone(), true)).unwrap();

    let frame_loop = FrameLoop::new(10, Clocking::Offline);
    frame_loop.run(&mut publisher, Some(16), |_| ControlFlow::Continue(())).unwrap();

    let beats = beats.borrow();
    assert_eq!(beats.len(), 1);
    assert_eq!(beats[0].timestamp_ms, 1000.0);
    assert_eq!(beats[0].energy, 1.0);

    let text = String::from_utf8(out.0.borrow().clone()).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 16);
    assert_eq!(lines[10]["is_peak"], true);
    assert!(lines[9]["beat"].is_null());
    assert_eq!(lines[10]["beat"]["timestamp_ms"], 1000.0);
    assert!(lines.iter().all(|l| l["using_fallback_data"] == false));
}

#[test]
fn reconfigure_between_frames_reaches_consumer() {
    let mut publisher = FeaturePublisher::default();
    let (sender, receiver) = frame_mailbox();
    publisher.subscribe(sender).unwrap();

    publisher.process_frame(0.0).unwrap();
    assert_eq!(receiver.try_recv().unwrap().buffer_length(), 1024);

    publisher
        .reconfigure(PartialConfig::default().fft_size(256).bin_count(16))
        .unwrap();
    publisher.process_frame(16.0).unwrap();
    let frame = receiver.try_recv().unwrap();
    assert_eq!(frame.buffer_length(), 128);
    assert_eq!(frame.bin_count(), 16);
    assert_eq!(frame.peaks.len(), 16);

    // Invalid updates leave the running configuration alone.
    assert!(publisher.reconfigure(PartialConfig::default().fft_size(100)).is_err());
    assert_eq!(publisher.config().unwrap().fft_size, 256);
}

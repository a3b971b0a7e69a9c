use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analysis::features::FeatureSnapshot;
use crate::analysis::publisher::FeaturePublisher;
use crate::error::AnalyzerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clocking {
    /// Ticks follow the wall clock.
    Realtime,
    /// Ticks run back to back with timestamps `i * 1000 / fps`.
    Offline,
}

/// Cancels a running loop from anywhere. Frames already started complete;
/// no new frame starts after `stop`.
#[derive(Clone, Debug, Default)]
pub struct LoopHandle {
    stopped: Arc<AtomicBool>,
}

impl LoopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

pub struct FrameLoop {
    fps: u32,
    clocking: Clocking,
    handle: LoopHandle,
}

impl FrameLoop {
    pub fn new(fps: u32, clocking: Clocking) -> Self {
        Self {
            fps: fps.max(1),
            clocking,
            handle: LoopHandle::default(),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }

    /// Tick until stopped, `max_frames` is reached, or `after_frame` breaks.
    /// Returns the number of frames produced.
    pub fn run<F>(
        &self,
        publisher: &mut FeaturePublisher,
        max_frames: Option<u64>,
        mut after_frame: F,
    ) -> Result<u64, AnalyzerError>
    where
        F: FnMut(&FeatureSnapshot) -> ControlFlow<()>,
    {
        let start = Instant::now();
        let interval = self.frame_interval();
        let mut produced = 0u64;

        log::debug!("Frame loop starting: {} fps, {:?}", self.fps, self.clocking);
        while max_frames.map_or(true, |max| produced < max) {
            let now_ms = match self.clocking {
                Clocking::Offline => produced as f64 * 1000.0 / self.fps as f64,
                Clocking::Realtime => {
                    let deadline = start + interval * produced as u32;
                    if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                        std::thread::sleep(wait);
                    }
                    start.elapsed().as_secs_f64() * 1000.0
                }
            };
            if self.handle.is_stopped() {
                break;
            }

            let snapshot = publisher.process_frame(now_ms)?;
            produced += 1;
            if after_frame(&snapshot).is_break() {
                break;
            }
        }
        log::debug!("Frame loop finished after {} frames", produced);
        Ok(produced)
    }
}

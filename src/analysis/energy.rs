use serde::Serialize;

use super::settings::DetectorConfig;

/// Fixed number of frames kept in the energy history.
pub const ENERGY_HISTORY_LEN: usize = 50;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnergyState {
    /// Normalized full-spectrum energy of the latest frame.
    pub current: f32,
    /// Oldest first, always `ENERGY_HISTORY_LEN` long.
    pub history: Vec<f32>,
    pub average: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BeatEvent {
    pub energy: f32,
    pub threshold: f32,
    pub timestamp_ms: f64,
}

/// Order-sensitive: one `update` per frame, in frame order.
#[derive(Debug)]
pub struct EnergyDetector {
    ring: [f32; ENERGY_HISTORY_LEN],
    head: usize,
    filled: usize,
    current: f32,
    average: f32,
    threshold: f32,
    min_interval_ms: f64,
    last_beat_ms: Option<f64>,
}

impl EnergyDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            ring: [0.0; ENERGY_HISTORY_LEN],
            head: 0,
            filled: 0,
            current: 0.0,
            average: 0.0,
            threshold: config.threshold,
            min_interval_ms: config.min_interval_ms,
            last_beat_ms: None,
        }
    }

    pub(crate) fn apply(&mut self, config: &DetectorConfig) {
        self.threshold = config.threshold;
        self.min_interval_ms = config.min_interval_ms;
    }

    /// Push one frame's normalized full energy and test it for a beat.
    ///
    /// Until the history has filled, the average covers only the frames seen
    /// so far.
    pub fn update(&mut self, normalized_full: f32, now_ms: f64) -> (EnergyState, Option<BeatEvent>) {
        self.ring[self.head] = normalized_full;
        self.head = (self.head + 1) % ENERGY_HISTORY_LEN;
        self.filled = (self.filled + 1).min(ENERGY_HISTORY_LEN);

        // Summed in f64 so a constant stream averages to exactly its value.
        let sum: f64 = self.ring.iter().map(|&v| v as f64).sum();
        self.average = (sum / self.filled as f64) as f32;
        self.current = normalized_full;

        let gate_open = self
            .last_beat_ms
            .map_or(true, |last| now_ms - last >= self.min_interval_ms);
        let above = self.current > self.average * (1.0 + self.threshold);

        let beat = if above && gate_open {
            self.last_beat_ms = Some(now_ms);
            log::trace!(
                "Beat at {:.1}ms: energy={:.3} average={:.3}",
                now_ms,
                self.current,
                self.average
            );
            Some(BeatEvent {
                energy: self.current,
                threshold: self.threshold,
                timestamp_ms: now_ms,
            })
        } else {
            None
        };

        (self.state(), beat)
    }

    pub fn state(&self) -> EnergyState {
        let mut history = Vec::with_capacity(ENERGY_HISTORY_LEN);
        history.extend_from_slice(&self.ring[self.head..]);
        history.extend_from_slice(&self.ring[..self.head]);
        EnergyState {
            current: self.current,
            history,
            average: self.average,
        }
    }

    /// Forget history and the last beat, as if no frame had been seen.
    pub fn reset(&mut self) {
        self.ring = [0.0; ENERGY_HISTORY_LEN];
        self.head = 0;
        self.filled = 0;
        self.current = 0.0;
        self.average = 0.0;
        self.last_beat_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> EnergyDetector {
        EnergyDetector::new(&DetectorConfig::default())
    }

    #[test]
    fn constant_input_converges_exactly() {
        // Every level a byte spectrum can normalize to.
        for k in 0..=255u32 {
            let v = k as f32 / 255.0;
            let mut d = detector();
            let mut last = None;
            for i in 0..60 {
                last = Some(d.update(v, i as f64 * 16.0).0);
            }
            let state = last.unwrap();
            assert_eq!(state.average, v, "k = {}", k);
            assert_eq!(state.history.len(), ENERGY_HISTORY_LEN);
            assert!(state.history.iter().all(|&h| h == v));
        }
    }

    #[test]
    fn history_length_is_fixed() {
        let mut d = detector();
        assert_eq!(d.state().history.len(), ENERGY_HISTORY_LEN);
        for i in 0..3 {
            let (state, _) = d.update(0.1 * i as f32, i as f64);
            assert_eq!(state.history.len(), ENERGY_HISTORY_LEN);
        }
    }

    #[test]
    fn history_is_oldest_first() {
        let mut d = detector();
        for i in 0..(ENERGY_HISTORY_LEN + 3) {
            d.update(i as f32, i as f64 * 200.0);
        }
        let state = d.state();
        assert_eq!(state.history[0], 3.0);
        assert_eq!(state.history[ENERGY_HISTORY_LEN - 1], (ENERGY_HISTORY_LEN + 2) as f32);
    }

    #[test]
    fn spike_after_steady_energy_is_a_beat() {
        let mut d = detector();
        let avg = 0.25f32;
        for i in 0..49 {
            let (_, beat) = d.update(avg, i as f64 * 16.0);
            assert!(beat.is_none(), "unexpected beat on frame {}", i);
        }
        let (state, beat) = d.update(avg * 2.0, 49.0 * 16.0 + 100.0);
        let beat = beat.expect("spike should be a beat");
        assert_eq!(beat.energy, 0.5);
        assert_eq!(beat.threshold, 0.5);
        assert!(state.current > state.average * 1.5);

        let (_, next) = d.update(avg, 49.0 * 16.0 + 116.0);
        assert!(next.is_none());
    }

    #[test]
    fn beats_are_gated_by_min_interval() {
        let mut d = detector();
        for i in 0..50 {
            d.update(0.1, i as f64);
        }
        assert!(d.update(0.9, 1000.0).1.is_some());
        // Another spike 50ms later is suppressed.
        assert!(d.update(0.95, 1050.0).1.is_none());
        // Exactly 100ms after the first one it may fire again.
        assert!(d.update(1.0, 1100.0).1.is_some());
    }

    #[test]
    fn apply_changes_threshold_and_gate() {
        let mut d = detector();
        for i in 0..10 {
            d.update(0.2, i as f64 * 200.0);
        }
        d.apply(&DetectorConfig { threshold: 2.0, min_interval_ms: 500.0, decay: 0.95 });
        // 0.5 is above 1.5x the average but not 3x.
        let (_, beat) = d.update(0.5, 2000.0);
        assert!(beat.is_none());
        let (_, beat) = d.update(0.9, 2200.0);
        assert_eq!(beat.map(|b| b.threshold), Some(2.0));
        assert!(d.update(5.0, 2600.0).1.is_none());
        assert!(d.update(5.0, 2700.0).1.is_some());
    }

    #[test]
    fn reset_clears_history() {
        let mut d = detector();
        for i in 0..10 {
            d.update(0.5, i as f64);
        }
        assert!(d.update(1.0, 200.0).1.is_some());
        d.reset();
        let state = d.state();
        assert_eq!(state.average, 0.0);
        assert!(state.history.iter().all(|&h| h == 0.0));
        // The gate is open again right away.
        assert!(d.update(0.1, 210.0).1.is_none());
        assert!(d.update(1.0, 220.0).1.is_some());
    }
}

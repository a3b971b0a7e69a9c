use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analysis::aggregate::BandAverages;
use crate::analysis::energy::BeatEvent;
use crate::analysis::features::FeatureSnapshot;
use crate::analysis::publisher::Subscriber;

/// Snapshot without the raw per-band spectra.
#[derive(Serialize)]
struct CompactFrame<'a> {
    frame: u64,
    timestamp_ms: f64,
    averages: &'a BandAverages,
    normalized: &'a BandAverages,
    bins: &'a [f32],
    peaks: &'a [f32],
    energy: f32,
    energy_average: f32,
    is_peak: bool,
    beat: Option<&'a BeatEvent>,
    using_fallback_data: bool,
}

/// Writes one JSON object per frame.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    compact: bool,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W, compact: bool) -> Self {
        Self {
            writer,
            compact,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffered lines to the underlying writer.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush feature output")
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_frame(&mut self, snapshot: &FeatureSnapshot) -> Result<()> {
        let result = if self.compact {
            let frame = CompactFrame {
                frame: snapshot.frame,
                timestamp_ms: snapshot.timestamp_ms,
                averages: &snapshot.averages,
                normalized: &snapshot.normalized,
                bins: &snapshot.bins,
                peaks: &snapshot.peaks,
                energy: snapshot.energy.current,
                energy_average: snapshot.energy.average,
                is_peak: snapshot.is_peak,
                beat: snapshot.beat.as_ref(),
                using_fallback_data: snapshot.using_fallback_data,
            };
            serde_json::to_writer(&mut self.writer, &frame)
        } else {
            serde_json::to_writer(&mut self.writer, snapshot)
        };
        result.with_context(|| format!("Failed to serialize frame {}", snapshot.frame))?;
        self.writer
            .write_all(b"\n")
            .context("Failed to write feature frame")?;
        self.written += 1;
        Ok(())
    }
}

impl<W: Write> Subscriber for JsonLinesSink<W> {
    fn on_feature_frame(&mut self, snapshot: &Arc<FeatureSnapshot>) -> Result<()> {
        self.write_frame(snapshot)
    }

    fn finish(&mut self) -> Result<()> {
        JsonLinesSink::finish(self)
    }
}

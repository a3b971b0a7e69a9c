use serde::Serialize;

/// Named frequency band, half-open in Hz: `[min_hz, max_hz)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandRange {
    pub name: Band,
    pub min_hz: f32,
    pub max_hz: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Bass,
    Mid,
    Treble,
}

/// Bass, mid and treble, ordered by frequency.
pub const BAND_RANGES: [BandRange; 3] = [
    BandRange { name: Band::Bass, min_hz: 20.0, max_hz: 250.0 },
    BandRange { name: Band::Mid, min_hz: 250.0, max_hz: 2000.0 },
    BandRange { name: Band::Treble, min_hz: 2000.0, max_hz: 16000.0 },
];

/// Inclusive index range into a raw spectrum. Empty when `min_index > max_index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexRange {
    pub min_index: usize,
    pub max_index: usize,
}

impl IndexRange {
    pub fn is_empty(&self) -> bool {
        self.min_index > self.max_index
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.max_index - self.min_index + 1
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.min_index && index <= self.max_index
    }
}

/// `round(freq / nyquist * buffer_length)`, clamped to `[0, buffer_length - 1]`.
pub fn frequency_to_index(freq_hz: f32, sample_rate: f32, buffer_length: usize) -> usize {
    if buffer_length == 0 || sample_rate <= 0.0 {
        return 0;
    }
    let nyquist = sample_rate / 2.0;
    let index = (freq_hz / nyquist * buffer_length as f32).round();
    if index.is_nan() || index <= 0.0 {
        0
    } else {
        (index as usize).min(buffer_length - 1)
    }
}

pub fn index_to_frequency(index: usize, sample_rate: f32, buffer_length: usize) -> f32 {
    if buffer_length == 0 {
        return 0.0;
    }
    index as f32 / buffer_length as f32 * (sample_rate / 2.0)
}

pub fn range_to_indices(min_hz: f32, max_hz: f32, sample_rate: f32, buffer_length: usize) -> IndexRange {
    IndexRange {
        min_index: frequency_to_index(min_hz, sample_rate, buffer_length),
        max_index: frequency_to_index(max_hz, sample_rate, buffer_length),
    }
}

/// Cached band → index table, rebuilt only when the sample rate or buffer
/// length changes.
///
/// Adjacent bands share a boundary frequency; after rounding they would also
/// share the boundary index. The shared index stays with the lower band so the
/// bands never overlap.
#[derive(Clone, Debug)]
pub struct BandTable {
    sample_rate: f32,
    buffer_length: usize,
    entries: Vec<(Band, IndexRange)>,
}

impl BandTable {
    pub fn new(ranges: &[BandRange], sample_rate: f32, buffer_length: usize) -> Self {
        let mut table = Self {
            sample_rate,
            buffer_length,
            entries: Vec::with_capacity(ranges.len()),
        };
        table.rebuild(ranges);
        table
    }

    /// Recompute if the shape changed. Returns whether a rebuild happened.
    pub fn refresh(&mut self, ranges: &[BandRange], sample_rate: f32, buffer_length: usize) -> bool {
        if self.sample_rate == sample_rate && self.buffer_length == buffer_length {
            return false;
        }
        self.sample_rate = sample_rate;
        self.buffer_length = buffer_length;
        self.rebuild(ranges);
        true
    }

    fn rebuild(&mut self, ranges: &[BandRange]) {
        self.entries.clear();
        // Highest index claimed by a non-empty band so far. Ranges are
        // ordered by frequency, so later bands start above it.
        let mut claimed: Option<usize> = None;
        for range in ranges {
            let mut indices =
                range_to_indices(range.min_hz, range.max_hz, self.sample_rate, self.buffer_length);
            if let Some(last) = claimed {
                indices.min_index = indices.min_index.max(last + 1);
            }
            if !indices.is_empty() {
                claimed = Some(indices.max_index);
            }
            self.entries.push((range.name, indices));
        }
        log::debug!(
            "Band table rebuilt: sample_rate={} buffer_length={} {:?}",
            self.sample_rate,
            self.buffer_length,
            self.entries
        );
    }

    pub fn get(&self, band: Band) -> Option<IndexRange> {
        self.entries.iter().find(|(b, _)| *b == band).map(|(_, r)| *r)
    }

    pub fn entries(&self) -> &[(Band, IndexRange)] {
        &self.entries
    }

    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }
}

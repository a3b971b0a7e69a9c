use serde::Serialize;

use super::bands::{Band, BandTable, IndexRange};

/// Average magnitude per band on the 0-255 scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BandAverages {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub full: f32,
}

impl BandAverages {
    pub fn get(&self, band: Band) -> f32 {
        match band {
            Band::Bass => self.bass,
            Band::Mid => self.mid,
            Band::Treble => self.treble,
        }
    }

    fn set(&mut self, band: Band, value: f32) {
        match band {
            Band::Bass => self.bass = value,
            Band::Mid => self.mid = value,
            Band::Treble => self.treble = value,
        }
    }

    /// Every entry divided by 255.
    pub fn normalized(&self) -> BandAverages {
        BandAverages {
            bass: self.bass / 255.0,
            mid: self.mid / 255.0,
            treble: self.treble / 255.0,
            full: self.full / 255.0,
        }
    }
}

/// Output of one aggregation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub averages: BandAverages,
    pub normalized: BandAverages,
    pub bins: Vec<f32>,
}

/// Width of each bin slice: `ceil(buffer_length / bin_count)`.
pub fn slice_width(buffer_length: usize, bin_count: usize) -> usize {
    if bin_count == 0 {
        return 0;
    }
    buffer_length.div_ceil(bin_count)
}

pub fn band_average(spectrum: &[u8], range: IndexRange) -> f32 {
    if range.is_empty() || range.min_index >= spectrum.len() {
        return 0.0;
    }
    let end = range.max_index.min(spectrum.len() - 1);
    let slice = &spectrum[range.min_index..=end];
    let sum: u32 = slice.iter().map(|&v| v as u32).sum();
    sum as f32 / slice.len() as f32
}

/// Mean of each contiguous slice. Slices that fall entirely past the end of
/// the spectrum (possible when `bin_count` does not divide the length) are 0.
pub fn compute_bins(spectrum: &[u8], bin_count: usize, bins: &mut Vec<f32>) {
    bins.clear();
    bins.resize(bin_count, 0.0);
    let len = spectrum.len();
    let width = slice_width(len, bin_count);
    if width == 0 {
        return;
    }
    for (i, bin) in bins.iter_mut().enumerate() {
        let start = (i * width).min(len);
        let end = (start + width).min(len);
        if start == end {
            break;
        }
        let sum: u32 = spectrum[start..end].iter().map(|&v| v as u32).sum();
        *bin = sum as f32 / (end - start) as f32;
    }
}

/// Pure aggregation: band averages from the band table, their normalized
/// form, and `bin_count` bins.
pub fn aggregate(spectrum: &[u8], table: &BandTable, bin_count: usize) -> Aggregate {
    let mut averages = BandAverages::default();
    for &(band, range) in table.entries() {
        averages.set(band, band_average(spectrum, range));
    }
    averages.full = if spectrum.is_empty() {
        0.0
    } else {
        spectrum.iter().map(|&v| v as u32).sum::<u32>() as f32 / spectrum.len() as f32
    };

    let mut bins = Vec::with_capacity(bin_count);
    compute_bins(spectrum, bin_count, &mut bins);

    Aggregate {
        normalized: averages.normalized(),
        averages,
        bins,
    }
}

/// Copy of the spectrum with everything outside `range` zeroed.
pub fn band_spectrum(spectrum: &[u8], range: IndexRange) -> Vec<u8> {
    spectrum
        .iter()
        .enumerate()
        .map(|(i, &v)| if range.contains(i) { v } else { 0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::bands::BAND_RANGES;
    use approx::assert_relative_eq;

    fn table(len: usize) -> BandTable {
        BandTable::new(&BAND_RANGES, 44100.0, len)
    }

    #[test]
    fn small_fft_example() {
        let mut spectrum = vec![0u8; 64];
        spectrum[0] = 255;
        spectrum[1] = 255;
        let out = aggregate(&spectrum, &table(64), 32);
        assert_eq!(out.averages.bass, 255.0);
        assert_eq!(out.averages.mid, 0.0);
        assert_eq!(out.averages.treble, 0.0);
        assert_relative_eq!(out.averages.full, 7.96875);
        assert_eq!(out.normalized.bass, 1.0);
    }

    #[test]
    fn normalized_is_average_over_255() {
        let spectrum: Vec<u8> = (0..512).map(|i| ((i * 37) % 256) as u8).collect();
        let out = aggregate(&spectrum, &table(512), 64);
        for band in [Band::Bass, Band::Mid, Band::Treble] {
            let n = out.normalized.get(band);
            assert!((0.0..=1.0).contains(&n));
            assert_eq!(n, out.averages.get(band) / 255.0);
        }
        assert_eq!(out.normalized.full, out.averages.full / 255.0);
    }

    #[test]
    fn empty_band_averages_to_zero() {
        let spectrum = vec![200u8; 4];
        let out = aggregate(&spectrum, &table(4), 1);
        assert_eq!(out.averages.mid, 0.0);
        assert_eq!(out.averages.bass, 200.0);
    }

    #[test]
    fn bins_preserve_total_when_width_divides() {
        let spectrum: Vec<u8> = (0..256).map(|i| (i * 7 % 251) as u8).collect();
        let total: f32 = spectrum.iter().map(|&v| v as f32).sum();
        for bin_count in [1usize, 2, 4, 8, 16, 32, 64] {
            let mut bins = Vec::new();
            compute_bins(&spectrum, bin_count, &mut bins);
            let width = slice_width(spectrum.len(), bin_count) as f32;
            let rebuilt: f32 = bins.iter().map(|b| b * width).sum();
            assert_relative_eq!(rebuilt, total, max_relative = 1e-5);
        }
    }

    #[test]
    fn uneven_bins_truncate_last_slice() {
        // 10 samples into 4 bins: width 3 → [0..3], [3..6], [6..9], [9..10]
        let spectrum = [10u8, 20, 30, 40, 50, 60, 70, 80, 90, 100];
        let mut bins = Vec::new();
        compute_bins(&spectrum, 4, &mut bins);
        assert_eq!(bins, vec![20.0, 50.0, 80.0, 100.0]);
    }

    #[test]
    fn bins_past_end_are_zero() {
        // 64 samples into 30 bins: width 3, only 22 slices have data.
        let spectrum = vec![90u8; 64];
        let mut bins = Vec::new();
        compute_bins(&spectrum, 30, &mut bins);
        assert_eq!(bins.len(), 30);
        assert!(bins[..22].iter().all(|&b| b == 90.0));
        assert!(bins[22..].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn band_spectrum_masks_outside_range() {
        let spectrum = [1u8, 2, 3, 4, 5];
        let masked = band_spectrum(&spectrum, IndexRange { min_index: 1, max_index: 3 });
        assert_eq!(masked, vec![0, 2, 3, 4, 0]);
    }
}

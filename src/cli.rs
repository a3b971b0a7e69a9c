use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spectra", about = "Audio feature extractor for audio-reactive visuals")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Write JSON lines here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Frames per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// FFT window size (power of two, 32-32768)
    #[arg(long, default_value_t = 2048)]
    pub fft_size: usize,

    /// Number of visual frequency bins
    #[arg(long, default_value_t = 64)]
    pub bins: usize,

    /// Analyser smoothing factor (0.0-1.0)
    #[arg(long, default_value_t = 0.8)]
    pub smoothing: f32,

    /// Relative energy rise that counts as a beat
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f32,

    /// Per-frame peak-hold decay (0.0-1.0)
    #[arg(long, default_value_t = 0.95)]
    pub decay: f32,

    /// Output gain applied by the host (does not change the analysis)
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Pace frames on the wall clock instead of running as fast as possible
    #[arg(long)]
    pub realtime: bool,

    /// Leave the per-band spectra out of each frame
    #[arg(long)]
    pub compact: bool,

    /// Read mono f32le PCM from stdin instead of a file
    #[arg(long, conflicts_with = "input")]
    pub live: bool,

    /// Sample rate of the --live stream
    #[arg(long, default_value_t = 44100)]
    pub sample_rate: u32,

    /// Stop after this many frames
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_analyzer_defaults() {
        let cli = Cli::parse_from(["spectra", "song.wav"]);
        assert_eq!(cli.input, Some(PathBuf::from("song.wav")));
        assert_eq!(cli.fft_size, 2048);
        assert_eq!(cli.bins, 64);
        assert_eq!(cli.smoothing, 0.8);
        assert_eq!(cli.fps, 60);
        assert!(!cli.live);
    }

    #[test]
    fn live_conflicts_with_input() {
        assert!(Cli::try_parse_from(["spectra", "song.wav", "--live"]).is_err());
        let cli = Cli::try_parse_from(["spectra", "--live", "--sample-rate", "48000"]).unwrap();
        assert!(cli.live);
        assert_eq!(cli.sample_rate, 48000);
    }
}

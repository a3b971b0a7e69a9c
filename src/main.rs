mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::ops::ControlFlow;
use std::sync::Arc;

use cli::Cli;
use spectra::audio::decode;
use spectra::audio::{MediaElementSource, Playback, PlaybackEvent, StreamFeed, StreamSource};
use spectra::frame_loop::{Clocking, FrameLoop};
use spectra::sink::JsonLinesSink;
use spectra::{AnalyzerConfig, DetectorConfig, FeaturePublisher};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let mut min_interval_ms = DetectorConfig::default().min_interval_ms;
    if let Some(ref path) = config::discover_config(cli.config.as_deref()) {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.fps == 60 { cli.fps = cfg.output.fps; }
            if cli.fft_size == 2048 { cli.fft_size = cfg.analyzer.fft_size; }
            if cli.bins == 64 { cli.bins = cfg.analyzer.bins; }
            if cli.smoothing == 0.8 { cli.smoothing = cfg.analyzer.smoothing; }
            if cli.threshold == 0.5 { cli.threshold = cfg.beat.threshold; }
            if cli.decay == 0.95 { cli.decay = cfg.beat.decay; }
            cli.compact |= cfg.output.compact;
            cli.realtime |= cfg.output.realtime;
            min_interval_ms = cfg.beat.min_interval_ms;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let analyzer = AnalyzerConfig {
        fft_size: cli.fft_size,
        smoothing: cli.smoothing,
        bin_count: cli.bins,
    };
    let detector = DetectorConfig {
        threshold: cli.threshold,
        min_interval_ms,
        decay: cli.decay,
    };
    let mut publisher = FeaturePublisher::new(analyzer, detector).context("Invalid analyzer settings")?;
    publisher.set_volume(cli.volume).context("Invalid volume")?;

    let writer: Box<dyn Write> = match cli.output {
        Some(ref path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    publisher.subscribe(JsonLinesSink::new(writer, cli.compact))?;

    log::info!(
        "spectra - fft {} / {} bins @ {}fps",
        analyzer.fft_size,
        analyzer.bin_count,
        cli.fps
    );

    let produced = if cli.live {
        run_live(&cli, &mut publisher)?
    } else {
        run_file(&cli, &mut publisher)?
    };

    publisher.finish_subscribers()?;
    publisher.destroy();
    match cli.output {
        Some(ref path) => log::info!("Done! {} frames written to {}", produced, path.display()),
        None => log::info!("Done! {} frames written", produced),
    }
    Ok(())
}

fn run_file(cli: &Cli, publisher: &mut FeaturePublisher) -> Result<u64> {
    let input = cli.input.as_ref().context("Input audio file is required (or use --live)")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    log::info!("Input: {}", input.display());

    let audio = decode::decode_file(input)?;
    let media = MediaElementSource::new(Arc::new(audio));
    let playback = media.playback();

    for event in playback.poll_events() {
        match event {
            PlaybackEvent::Ready => {
                publisher.attach_source(Box::new(media.clone()))?;
                playback.play();
            }
            PlaybackEvent::Error(message) => {
                publisher.detach_source()?;
                anyhow::bail!("Cannot play {}: {}", input.display(), message);
            }
            PlaybackEvent::Ended => {}
        }
    }

    let total_frames = (playback.duration_secs() * cli.fps as f64).ceil() as u64 + 1;
    let clocking = if cli.realtime { Clocking::Realtime } else { Clocking::Offline };
    let frame_loop = FrameLoop::new(cli.fps, clocking);

    let pb = ProgressBar::new(cli.max_frames.unwrap_or(total_frames).min(total_frames));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let mut beats = 0u64;
    let produced = frame_loop.run(publisher, cli.max_frames, |snapshot| {
        pb.set_position(snapshot.frame + 1);
        if snapshot.beat.is_some() {
            beats += 1;
        }
        if playback.poll_events().contains(&PlaybackEvent::Ended) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    pb.finish_with_message("Analysis complete");
    log::info!("Detected {} beats in {:.1}s", beats, playback.duration_secs());
    Ok(produced)
}

fn run_live(cli: &Cli, publisher: &mut FeaturePublisher) -> Result<u64> {
    let (source, feed) = StreamSource::new(cli.sample_rate as f32);
    publisher.attach_source(Box::new(source))?;
    log::info!("Reading f32le PCM from stdin at {} Hz", cli.sample_rate);

    let reader_feed = feed.clone();
    let reader = std::thread::spawn(move || read_pcm(std::io::stdin().lock(), &reader_feed));

    let frame_loop = FrameLoop::new(cli.fps, Clocking::Realtime);
    let produced = frame_loop.run(publisher, cli.max_frames, |_| {
        if feed.is_closed() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    if feed.is_closed() {
        match reader.join() {
            Ok(result) => result?,
            Err(_) => anyhow::bail!("Input reader panicked"),
        }
    }
    Ok(produced)
}

/// Pump little-endian f32 samples into `feed` until EOF.
fn read_pcm<R: Read>(mut input: R, feed: &StreamFeed) -> Result<()> {
    let mut buf = vec![0u8; 4096];
    let mut pending = Vec::with_capacity(4);
    let mut samples = Vec::with_capacity(buf.len() / 4 + 1);
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                feed.close();
                return Err(e).context("Failed to read PCM from stdin");
            }
        };
        samples.clear();
        for &byte in &buf[..n] {
            pending.push(byte);
            if pending.len() == 4 {
                samples.push(f32::from_le_bytes([pending[0], pending[1], pending[2], pending[3]]));
                pending.clear();
            }
        }
        feed.push(&samples);
    }
    feed.close();
    log::info!("Input stream closed");
    Ok(())
}

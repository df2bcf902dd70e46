// ============================================================================
// MAIN.RS - Command-Line Player
// ============================================================================
//
//     pixelsong picture.png --style lofi --wah 40
//
// 1. Decode the image and turn it into notes and a mood
// 2. Resolve tempo from the style table (flags can override it)
// 3. Open the output device on a render engine
// 4. Apply settings and mood, play one pass, wait for it to end
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;

use pixelsong::analysis::{extract, measure_mood, PixelBuffer, DEFAULT_STEPS};
use pixelsong::audio::{OutputDevice, RenderEngine, DEFAULT_SAMPLE_RATE};
use pixelsong::config::{DebugLevel, EffectSettings, StyleTable, StyleTag};
use pixelsong::sequencer::{tick_interval_ms, Sequencer};

/// How long to keep the device open after the last step
const TAIL: Duration = Duration::from_millis(400);

#[derive(Parser)]
#[command(name = "pixelsong")]
#[command(about = "Play a picture as a short three-voice tune")]
struct Cli {
    /// Image to play (anything the image crate can decode)
    image: PathBuf,

    /// Style tag that picks tempo and downsample rate
    #[arg(long, default_value = "calm")]
    style: StyleTag,

    /// TOML file overriding the built-in style table
    #[arg(long)]
    styles: Option<PathBuf>,

    /// Tempo override in beats per minute
    #[arg(long)]
    bpm: Option<f64>,

    /// Downsample override (play every Nth step)
    #[arg(long)]
    downsample: Option<usize>,

    /// Number of steps to extract from the image
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    steps: usize,

    /// Master volume, 0 to 1
    #[arg(long, default_value_t = 0.5)]
    volume: f32,

    /// Distortion amount, 0 to 100
    #[arg(long, default_value_t = 0.0)]
    distortion: f32,

    /// Wah depth, 0 to 100
    #[arg(long, default_value_t = 0.0)]
    wah: f32,

    /// How much to log
    #[arg(long, value_enum, default_value_t = DebugLevel::Basic)]
    debug_level: DebugLevel,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,
}

fn init_logging(level: DebugLevel) {
    env_logger::Builder::new()
        .filter_level(level.level_filter())
        .parse_default_env()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug_level);

    // ========================================================================
    // ANALYSIS
    // ========================================================================

    let image = image::open(&cli.image)
        .with_context(|| format!("Failed to open image {}", cli.image.display()))?;
    let pixels = PixelBuffer::from_image(&image);
    let notes = extract(&pixels, cli.steps);
    let mood = measure_mood(&pixels);

    log::info!(
        "{}: {}x{}, {} steps, saturation {:.2}, brightness {:.2}",
        cli.image.display(),
        pixels.width(),
        pixels.height(),
        notes.len(),
        mood.saturation,
        mood.brightness
    );
    if notes.is_silent() {
        log::info!("nothing in the image is bright enough to play; this pass will be silent");
    }

    // ========================================================================
    // TEMPO
    // ========================================================================

    let table = match &cli.styles {
        Some(path) => StyleTable::load(path)
            .with_context(|| format!("Failed to load style table {}", path.display()))?,
        None => StyleTable::default(),
    };
    let tempo = table.lookup(cli.style);
    let bpm = cli.bpm.unwrap_or(tempo.bpm);
    let downsample = cli.downsample.unwrap_or(tempo.downsample_rate).max(1);

    let Some(tick_ms) = tick_interval_ms(bpm) else {
        bail!("Tempo must be a positive number of beats per minute, got {}", bpm);
    };

    // ========================================================================
    // AUDIO
    // ========================================================================

    let engine = RenderEngine::new(cli.sample_rate);
    let _device = OutputDevice::open(engine.clone(), cli.sample_rate)
        .context("Failed to open the audio output")?;

    let sequencer = Sequencer::new(Arc::new(engine));
    let settings = EffectSettings {
        volume: cli.volume,
        distortion_amount: cli.distortion,
        wah_depth: cli.wah,
        style: cli.style,
        ..EffectSettings::default()
    };
    sequencer.update_audio_settings(&settings);
    sequencer.update_visual_metrics(mood.saturation, mood.brightness);

    // ========================================================================
    // PLAY
    // ========================================================================

    sequencer.play(&notes, bpm, downsample);

    let ticks = notes.len().div_ceil(downsample) as f64 + 1.0;
    let expected = Duration::from_secs_f64(ticks * tick_ms / 1000.0) + Duration::from_secs(1);
    if !sequencer.wait(expected) {
        log::warn!("playback did not finish in {:.1} s, stopping", expected.as_secs_f64());
        sequencer.stop();
    }

    thread::sleep(TAIL);
    Ok(())
}

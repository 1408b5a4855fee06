//! Audioscope - real-time audio stream analysis
//!
//! Entry point for the terminal level monitor.

use anyhow::{Context, Result};
use audioscope::{
    AudioEngine, AudioStream, ConfigUpdate, EngineConfig, FrameQueue, MeterStore, RingStream,
};
use std::cell::RefCell;
use std::f32::consts::PI;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Frame clock period (~60 Hz)
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Width of the terminal level bar
const METER_WIDTH: usize = 40;

/// Options from the command line
#[derive(Debug, Default)]
struct Options {
    fft_size: Option<usize>,
    threshold: Option<f32>,
    config: Option<PathBuf>,
    tone: Option<f32>,
}

/// Synthetic sine source pulsing one second on, one second off
struct ToneSource {
    ring: RingStream,
    frequency: f32,
    sample_rate: u32,
    position: u64,
}

impl ToneSource {
    fn new(frequency: f32, sample_rate: u32) -> Self {
        Self {
            ring: RingStream::new(sample_rate, sample_rate as usize),
            frequency,
            sample_rate,
            position: 0,
        }
    }

    /// Push one frame period worth of samples
    fn feed(&mut self, period: Duration) {
        let count = (self.sample_rate as f64 * period.as_secs_f64()).round() as usize;
        let rate = self.sample_rate as f32;
        let samples: Vec<f32> = (0..count)
            .map(|i| {
                let n = self.position + i as u64;
                let gate = if (n / self.sample_rate as u64) % 2 == 0 { 0.6 } else { 0.0 };
                gate * (2.0 * PI * self.frequency * (n as f32 / rate)).sin()
            })
            .collect();
        self.position += count as u64;
        self.ring.push(&samples);
    }
}

enum Source {
    Tone(ToneSource),
    #[cfg(feature = "capture")]
    Capture(Rc<audioscope::audio::stream::CaptureStream>),
}

impl Source {
    fn open(tone: Option<f32>) -> Result<Self> {
        match tone {
            Some(frequency) => Ok(Self::tone(frequency)),
            None => Self::open_default(),
        }
    }

    fn tone(frequency: f32) -> Self {
        println!("Synthetic tone: {:.1} Hz", frequency);
        Source::Tone(ToneSource::new(frequency, audioscope::DEFAULT_SAMPLE_RATE))
    }

    #[cfg(feature = "capture")]
    fn open_default() -> Result<Self> {
        let capture = audioscope::audio::stream::CaptureStream::open_default(1 << 16)?;
        println!("Capturing from: {}", capture.device_name());
        Ok(Source::Capture(Rc::new(capture)))
    }

    #[cfg(not(feature = "capture"))]
    fn open_default() -> Result<Self> {
        Ok(Self::tone(440.0))
    }

    fn stream(&self) -> Rc<dyn AudioStream> {
        match self {
            Source::Tone(tone) => Rc::new(tone.ring.clone()),
            #[cfg(feature = "capture")]
            Source::Capture(capture) => capture.clone(),
        }
    }

    fn advance(&mut self, period: Duration) {
        match self {
            Source::Tone(tone) => tone.feed(period),
            #[cfg(feature = "capture")]
            Source::Capture(_) => {}
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("audioscope=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = match parse_args(&args)? {
        Some(options) => options,
        None => return Ok(()),
    };

    println!("Audioscope v{} - Audio Stream Monitor", audioscope::VERSION);
    println!();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building frame clock runtime")?;
    runtime.block_on(run(options))
}

/// Parse arguments; `None` means the invocation was fully handled
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        let value = |name: &str| {
            args.get(i + 1)
                .cloned()
                .with_context(|| format!("{} requires a value", name))
        };

        match args[i].as_str() {
            "--version" | "-v" => {
                println!("audioscope {} (built {})", audioscope::VERSION, audioscope::BUILD_DATE);
                return Ok(None);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--fft-size" | "-f" => {
                let raw = value("--fft-size")?;
                options.fft_size = Some(
                    raw.parse()
                        .with_context(|| format!("invalid fft size: {}", raw))?,
                );
            }
            "--threshold" | "-t" => {
                let raw = value("--threshold")?;
                options.threshold = Some(
                    raw.parse()
                        .with_context(|| format!("invalid threshold: {}", raw))?,
                );
            }
            "--config" | "-c" => {
                options.config = Some(PathBuf::from(value("--config")?));
            }
            "--tone" => {
                let raw = value("--tone")?;
                options.tone = Some(
                    raw.parse()
                        .with_context(|| format!("invalid tone frequency: {}", raw))?,
                );
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                return Ok(None);
            }
        }
        i += 2;
    }

    Ok(Some(options))
}

fn print_help() {
    println!("Usage: audioscope [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -f, --fft-size N        Transform size, power of two (default: 2048)");
    println!("  -t, --threshold X       Activity threshold 0.0-1.0 (default: 0.1)");
    println!("  -c, --config PATH       Load engine config from a JSON file");
    println!("      --tone HZ           Analyze a synthetic pulsing tone");
    println!("  -v, --version           Show version");
    println!("  -h, --help              Show this help");
    println!();
    println!("Examples:");
    println!("  audioscope --tone 1000 --threshold 0.2");
    println!("  audioscope --config audioscope.json");
    println!();
    println!("Set RUST_LOG=audioscope=debug for lifecycle details.");
}

fn load_config(options: &Options) -> Result<EngineConfig> {
    let base = match &options.config {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::default(),
    };
    let config = base.merged(&ConfigUpdate {
        fft_size: options.fft_size,
        activity_threshold: options.threshold,
        ..Default::default()
    });
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

fn render_meter(level: f32, frequency: f32, active: bool) -> String {
    let filled = ((level.clamp(0.0, 1.0) * METER_WIDTH as f32).round() as usize).min(METER_WIDTH);
    format!(
        "\r[{}{}] {:>5.3} | {:>8.1} Hz | {}",
        "#".repeat(filled),
        " ".repeat(METER_WIDTH - filled),
        level,
        frequency,
        if active { "ACTIVE" } else { "quiet " }
    )
}

async fn run(options: Options) -> Result<()> {
    let config = load_config(&options)?;
    let mut source = Source::open(options.tone)?;

    let frames = FrameQueue::new();
    let mut engine = AudioEngine::new(Rc::new(frames.clone()))?;
    let store = Rc::new(RefCell::new(MeterStore::new()));

    engine.initialize(config)?;
    engine.connect(source.stream())?;

    let meter_store = Rc::clone(&store);
    engine.on_audio_data(move |_, metrics| {
        meter_store.borrow_mut().record(metrics);
        print!(
            "{}",
            render_meter(metrics.level, metrics.dominant_frequency_hz, metrics.is_active)
        );
        let _ = io::stdout().flush();
    })?;

    let activity_store = Rc::clone(&store);
    engine.on_activity_change(move |active| {
        activity_store.borrow_mut().record_activity(active);
        info!("Audio {}", if active { "active" } else { "inactive" });
    })?;

    engine.start()?;
    println!("Monitoring started. Press Ctrl+C to stop.");
    println!();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        error!("Failed to install Ctrl+C handler: {}", e);
    }

    let mut clock = tokio::time::interval(FRAME_INTERVAL);
    while running.load(Ordering::SeqCst) {
        clock.tick().await;
        source.advance(FRAME_INTERVAL);
        frames.run_frame();
    }

    println!();
    println!();
    println!("Stopping...");
    let last = engine.metrics()?;
    engine.stop()?;
    engine.destroy()?;

    let store = store.borrow();
    let stats = store.stats();
    println!("Ticks:        {}", stats.measurement_count);
    if stats.measurement_count > 0 {
        println!(
            "Level:        avg {:.3} | min {:.3} | max {:.3}",
            stats.avg_level, stats.min_level, stats.max_level
        );
    }
    println!("Active:       {:.1}%", store.active_ratio() * 100.0);
    println!("Transitions:  {}", stats.transition_count);
    println!("Last metrics: {}", serde_json::to_string(&last)?);
    println!("Done.");

    Ok(())
}

//! leap_solfege: interactive entry point.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use leap_solfege::app::{run, run_headless, AppConfig, SourceKind};
use leap_solfege::source::load_replay;
use solfege_core::PipelineConfig;
use solfege_midi::{GeneralMidi, NoteMode, PitchMap};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Keyboard-driven synthetic hands
    Sim,
    /// LeapMotion controller (build with `--features leap`)
    Leap,
    /// JSON-lines replay file given with --replay
    Replay,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline settings (TOML); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where hand frames come from
    #[arg(short, long, value_enum, default_value_t = Source::Sim)]
    source: Source,

    /// Replay file (implies --source replay)
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Process the replay without a window or audio and print the events
    #[arg(long, requires = "replay")]
    headless: bool,

    /// Write the played notes to this MIDI file on exit
    #[arg(long)]
    record: Option<PathBuf>,

    /// Save every incoming frame to this replay file
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Save a trained calibration to this TOML file on exit
    #[arg(long)]
    save_calibration: Option<PathBuf>,

    /// General MIDI instrument, by name or program number
    #[arg(short, long, default_value = "Acoustic Grand Piano")]
    instrument: String,

    /// MIDI note for Do
    #[arg(long, default_value_t = 60)]
    root: u8,

    /// Map the signs onto the natural minor scale
    #[arg(long)]
    minor: bool,

    /// Release each note after this many ms instead of holding it
    #[arg(long)]
    pluck_ms: Option<u64>,

    /// Override the hold delay (ms)
    #[arg(long)]
    hold_ms: Option<u64>,

    /// Override the detection threshold (0–1)
    #[arg(long)]
    threshold: Option<f32>,

    /// Open the first MIDI port whose name contains this text
    #[arg(long)]
    midi_port: Option<String>,

    /// Print the effective pipeline config as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("leap_solfege=info,solfege_core=info,solfege_midi=info")
    });
    fmt().with_env_filter(filter).init();
}

fn pipeline_config(args: &Args) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(ms) = args.hold_ms {
        cfg.hold_delay_ms = ms;
    }
    if let Some(t) = args.threshold {
        cfg.detection_threshold = t;
    }
    cfg.validate().context("invalid pipeline settings")?;
    Ok(cfg)
}

fn app_config(args: &Args) -> Result<AppConfig> {
    let Some(instrument) = GeneralMidi::from_name(&args.instrument) else {
        bail!("unknown instrument {:?}", args.instrument);
    };
    let root = args.root.min(127 - 11);
    let source = match (&args.replay, args.source) {
        (Some(path), _) => SourceKind::Replay(path.clone()),
        (None, Source::Replay) => bail!("--source replay needs --replay <FILE>"),
        (None, Source::Sim) => SourceKind::Simulation,
        (None, Source::Leap) => SourceKind::Leap,
    };
    Ok(AppConfig {
        pipeline: pipeline_config(args)?,
        source,
        pitch_map: if args.minor { PitchMap::minor(root) } else { PitchMap::major(root) },
        instrument,
        note_mode: match args.pluck_ms {
            Some(ms) => NoteMode::Pluck { length: Duration::from_millis(ms) },
            None => NoteMode::Sustain,
        },
        midi_port: args.midi_port.clone(),
        record: args.record.clone(),
        capture: args.capture.clone(),
        save_calibration: args.save_calibration.clone(),
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let cfg = app_config(&args)?;
    if args.print_config {
        print!("{}", cfg.pipeline.to_toml_string()?);
        return Ok(());
    }

    if args.headless {
        let SourceKind::Replay(path) = &cfg.source else {
            bail!("--headless needs --replay <FILE>");
        };
        let records = load_replay(path)
            .with_context(|| format!("cannot load replay {}", path.display()))?;
        let events = run_headless(&cfg, &records)?;
        for e in &events {
            println!("{e}");
        }
        info!(frames = records.len(), events = events.len(), "replay done");
        return Ok(());
    }

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Leap Solfège · Curwen hand signs to MIDI notes        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    run(cfg)
}

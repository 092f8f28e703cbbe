//! Top-level application state machine.
//!
//! `AppState` owns the [`GesturePipeline`], the calibration samples and the
//! optional session recorder.  It turns [`HandFrame`]s into gesture events,
//! forwards those to the sound sink, and exposes what the visualizer
//! draws each frame.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use solfege_core::{
    build_classifier, CalibrationSet, ClassifierConfig, ConfidenceVector, GestureEvent,
    GesturePipeline, GestureSink, PipelineConfig, Solfege,
};
use solfege_midi::{note_name, GeneralMidi, NoteMode, PitchMap, SessionRecorder};
use tracing::{info, warn};

use crate::player::Player;
use crate::source::{
    spawn_frame_source, HandFrame, ReplayFrameSource, ReplayRecord, ReplayWriter, SimFrameSource,
};
use crate::visualizer::{UiAction, View, Visualizer};

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Where hand frames come from.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceKind {
    /// Number keys pick a synthetic pose.
    Simulation,
    /// A LeapMotion controller (needs the `leap` feature).
    Leap,
    /// A recorded JSON-lines file.
    Replay(PathBuf),
}

/// Configuration for the full application.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub pipeline:         PipelineConfig,
    pub source:           SourceKind,
    pub pitch_map:        PitchMap,
    pub instrument:       GeneralMidi,
    pub note_mode:        NoteMode,
    /// Substring of the MIDI port name to open.
    pub midi_port:        Option<String>,
    /// Write the session's notes here as a MIDI file on exit.
    pub record:           Option<PathBuf>,
    /// Write every incoming frame here in replay format.
    pub capture:          Option<PathBuf>,
    /// Save a trained prototype classifier here as pipeline TOML.
    pub save_calibration: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            pipeline:         PipelineConfig::default(),
            source:           SourceKind::Simulation,
            pitch_map:        PitchMap::major(60),
            instrument:       GeneralMidi::AcousticGrandPiano,
            note_mode:        NoteMode::Sustain,
            midi_port:        None,
            record:           None,
            capture:          None,
            save_calibration: None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

/// Recent events kept for display.
const HISTORY: usize = 256;

pub struct AppState {
    // ── recognition ───────────────────────────────────────────────────────
    pipeline:    GesturePipeline,
    config:      PipelineConfig,
    calibration: CalibrationSet,

    // ── output ────────────────────────────────────────────────────────────
    sound:       Box<dyn GestureSink>,
    recorder:    Option<SessionRecorder>,
    pitch_map:   PitchMap,
    note_mode:   NoteMode,
    instrument:  GeneralMidi,

    // ── display ───────────────────────────────────────────────────────────
    history:     VecDeque<GestureEvent>,
    last_at:     Duration,
    pub status:  String,
}

impl AppState {
    /// `sound` receives every gesture event; usually a [`Player`].
    pub fn new(cfg: &AppConfig, sound: Box<dyn GestureSink>) -> Result<Self> {
        let pipeline = GesturePipeline::new(&cfg.pipeline).context("invalid pipeline config")?;
        let recorder = cfg.record.as_ref().map(|_| {
            SessionRecorder::new(cfg.pitch_map.clone()).instrument(cfg.instrument)
        });
        let status = format!(
            "Ready  classifier={}  hold={} ms  threshold={:.2}",
            pipeline.classifier_name(),
            cfg.pipeline.hold_delay_ms,
            cfg.pipeline.detection_threshold,
        );
        Ok(AppState {
            pipeline,
            config:      cfg.pipeline.clone(),
            calibration: CalibrationSet::new(),
            sound,
            recorder,
            pitch_map:   cfg.pitch_map.clone(),
            note_mode:   cfg.note_mode,
            instrument:  cfg.instrument,
            history:     VecDeque::with_capacity(HISTORY),
            last_at:     Duration::ZERO,
            status,
        })
    }

    // ── process one HandFrame ────────────────────────────────────────────

    pub fn handle_frame(&mut self, frame: &HandFrame) {
        self.last_at = frame.at;
        let mut events: Vec<GestureEvent> = Vec::new();
        if let Err(e) = self.pipeline.on_frame(frame.landmarks.as_deref(), frame.at, &mut events) {
            self.status = format!("frame rejected: {e}");
        }
        self.dispatch(events);
    }

    fn dispatch(&mut self, events: Vec<GestureEvent>) {
        for e in events {
            if e.is_enter() {
                let pitch = self.pitch_map.note_for(e.class);
                self.status = format!("{}  ({})", e, note_name(pitch));
            } else {
                self.status = e.to_string();
            }
            if let Some(rec) = self.recorder.as_mut() {
                rec.record(&e);
            }
            if self.history.len() == HISTORY {
                self.history.pop_front();
            }
            self.history.push_back(e);
            self.sound.on_gesture_event(e);
        }
    }

    // ── calibration ──────────────────────────────────────────────────────

    /// Store the current hand's features as a sample of `class`.
    pub fn capture(&mut self, class: Solfege) {
        match self.pipeline.features() {
            Some(f) => {
                self.calibration.add(class, f);
                self.status = format!(
                    "captured {}  ({} samples, {} total)",
                    class,
                    self.calibration.count(class),
                    self.calibration.len()
                );
            }
            None => self.status = format!("no hand to capture for {class}"),
        }
    }

    /// Replace the classifier with prototypes fitted to the captured samples.
    pub fn train(&mut self) {
        let sigma = match &self.config.classifier {
            ClassifierConfig::Prototype { sigma, .. } => *sigma,
            ClassifierConfig::Heuristic { .. } => 0.5,
        };
        match self.calibration.fit(sigma) {
            Ok(proto) => {
                self.config.classifier = proto.to_config();
                info!(prototypes = proto.prototypes().len(), sigma, "prototype classifier trained");
                self.pipeline.set_classifier(Box::new(proto));
                self.status = format!("trained on {} samples", self.calibration.len());
            }
            Err(e) => {
                warn!(error = %e, "training failed");
                self.status = format!("cannot train: {e}");
            }
        }
    }

    /// Back to the default heuristic classifier.
    pub fn use_heuristic(&mut self) {
        self.config.classifier = ClassifierConfig::default();
        match build_classifier(&self.config) {
            Ok(c) => {
                self.pipeline.set_classifier(c);
                self.status = format!("classifier={}", self.pipeline.classifier_name());
            }
            Err(e) => self.status = format!("cannot switch classifier: {e}"),
        }
    }

    pub fn toggle_note_mode(&mut self) -> NoteMode {
        self.note_mode = match self.note_mode {
            NoteMode::Sustain => NoteMode::pluck(),
            NoteMode::Pluck { .. } => NoteMode::Sustain,
        };
        self.status = format!("note mode: {:?}", self.note_mode);
        self.note_mode
    }

    /// Step to the next General MIDI program in the offered list.
    pub fn next_instrument(&mut self) -> GeneralMidi {
        let i = GeneralMidi::ALL.iter().position(|g| *g == self.instrument).unwrap_or(0);
        self.instrument = GeneralMidi::ALL[(i + 1) % GeneralMidi::ALL.len()];
        self.status = format!("instrument: {}", self.instrument.name());
        self.instrument
    }

    /// The pipeline config as it stands, trained classifier included.
    pub fn current_config(&self) -> &PipelineConfig {
        &self.config
    }

    // ── shutdown ──────────────────────────────────────────────────────────

    /// Leave any active sign, close the recording and write it to `record`.
    pub fn finish(&mut self, record: Option<&Path>) -> Result<()> {
        let now = self.last_at;
        let mut events = Vec::new();
        self.pipeline.reset(now, &mut events);
        self.dispatch(events);

        if let (Some(rec), Some(path)) = (self.recorder.as_mut(), record) {
            rec.finish(now);
            if rec.notes().is_empty() {
                warn!(path = %path.display(), "no notes played; nothing recorded");
            } else {
                rec.write_file(path)
                    .with_context(|| format!("cannot write {}", path.display()))?;
            }
        }
        Ok(())
    }

    // ── Accessors for the render loop ─────────────────────────────────────

    pub fn pipeline(&self)    -> &GesturePipeline   { &self.pipeline }
    pub fn confidences(&self) -> &ConfidenceVector  { self.pipeline.confidences() }
    pub fn history(&self)     -> &VecDeque<GestureEvent> { &self.history }
    pub fn calibration(&self) -> &CalibrationSet    { &self.calibration }
    pub fn note_mode(&self)   -> NoteMode           { self.note_mode }

    /// Active sign and its note name.
    pub fn active(&self) -> Option<(Solfege, String)> {
        self.pipeline
            .active()
            .map(|c| (c, note_name(self.pitch_map.note_for(c))))
    }
}

fn save_calibration(app: &AppState, path: &Path) -> Result<()> {
    if !matches!(app.current_config().classifier, ClassifierConfig::Prototype { .. }) {
        return Ok(());
    }
    let text = app.current_config().to_toml_string()?;
    fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
    info!(path = %path.display(), "calibration saved");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the interactive loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// Creates the visualizer, the frame source and the MIDI player, then
/// drives the event/render loop at ~60 fps until the window closes or the
/// source runs dry.
pub fn run(cfg: AppConfig) -> Result<()> {
    let start = Instant::now();

    // ── Frame source ──────────────────────────────────────────────────────
    let (sim_tx, frames) = match &cfg.source {
        SourceKind::Simulation => {
            let (tx, rx) = mpsc::channel();
            (Some(tx), spawn_frame_source(SimFrameSource::new(rx, start)))
        }
        SourceKind::Replay(path) => {
            let records = crate::source::load_replay(path)
                .with_context(|| format!("cannot load replay {}", path.display()))?;
            (None, spawn_frame_source(ReplayFrameSource { records, realtime: true }))
        }
        #[cfg(feature = "leap")]
        SourceKind::Leap => (None, spawn_frame_source(crate::source::LeapFrameSource { start })),
        #[cfg(not(feature = "leap"))]
        SourceKind::Leap => anyhow::bail!("LeapMotion support needs the `leap` feature"),
    };

    let mut capture = match &cfg.capture {
        Some(path) => Some(
            ReplayWriter::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => None,
    };

    let mut vis = Visualizer::new(sim_tx)?;
    let player = Player::open(
        cfg.midi_port.as_deref(),
        cfg.pitch_map.clone(),
        cfg.note_mode,
        cfg.instrument,
    );
    let control = player.control();
    let mut app = AppState::new(&cfg, Box::new(player))?;
    info!(source = ?cfg.source, instrument = cfg.instrument.name(), "started");

    // ── Main loop ─────────────────────────────────────────────────────────
    'outer: while vis.is_open() {
        for action in vis.poll_input() {
            match action {
                UiAction::Quit           => break 'outer,
                UiAction::Capture(class) => app.capture(class),
                UiAction::Train          => app.train(),
                UiAction::UseHeuristic   => app.use_heuristic(),
                UiAction::ToggleNoteMode => {
                    control.all_notes_off();
                    control.set_mode(app.toggle_note_mode());
                }
                UiAction::NextInstrument => control.set_program(app.next_instrument()),
            }
        }

        loop {
            match frames.try_recv() {
                Ok(frame) => {
                    if let Some(w) = capture.as_mut() {
                        if let Err(e) = w.write_frame(&frame) {
                            warn!(error = %e, "frame capture stopped");
                            capture = None;
                        }
                    }
                    app.handle_frame(&frame);
                }
                Err(TryRecvError::Empty)        => break,
                Err(TryRecvError::Disconnected) => break 'outer,
            }
        }

        let active = app.active();
        vis.render(&View {
            confidences: app.confidences(),
            threshold:   app.pipeline().threshold(),
            gate:        app.pipeline().gate_state(),
            active,
            hand:        app.pipeline().smoothed_frame(),
            status:      &app.status,
            classifier:  app.pipeline().classifier_name(),
        });
    }

    app.finish(cfg.record.as_deref())?;
    if let Some(w) = capture {
        let frames = w.frames();
        w.into_inner()?;
        info!(frames, "frames captured");
    }
    if let Some(path) = &cfg.save_calibration {
        save_calibration(&app, path)?;
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// run_headless(): replay without a window
// ════════════════════════════════════════════════════════════════════════════

/// Push recorded frames through the pipeline as fast as possible, logging
/// each gesture event.  Returns every event, including the final `Leave`.
pub fn run_headless(cfg: &AppConfig, records: &[ReplayRecord]) -> Result<Vec<GestureEvent>> {
    let (tx, rx) = mpsc::channel::<GestureEvent>();
    let mut app = AppState::new(cfg, Box::new(tx))?;
    for record in records {
        app.handle_frame(&record.to_frame());
    }
    app.finish(cfg.record.as_deref())?;

    let events: Vec<GestureEvent> = rx.try_iter().collect();
    for e in &events {
        info!(event = %e, "gesture");
    }
    Ok(events)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

//! # solfege_midi
//!
//! Turn solfège gesture events into sound and into Standard MIDI Files.
//!
//! * [`PitchMap`] assigns each sign a MIDI note (Do → C4 … Ti → B4 by default).
//! * [`SoundManager`] is the live audio collaborator: it starts a note on
//!   `Enter`, stops it on `Leave` (or after a fixed length in pluck mode),
//!   and talks to any [`NoteSink`].
//! * [`SessionRecorder`] keeps the session's enter/leave times and writes a
//!   Type-0 MIDI file.
//!
//! MIDI bytes are written directly; no MIDI crate is needed here.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use solfege_core::{GestureEvent, Solfege};
//! use solfege_midi::{GeneralMidi, NoteMode, NullOut, PitchMap, SessionRecorder, SoundManager};
//!
//! let mut sound = SoundManager::new(NullOut, PitchMap::major(60), NoteMode::Sustain)
//!     .with_program(GeneralMidi::Vibraphone);
//! let mut rec = SessionRecorder::new(PitchMap::major(60)).instrument(GeneralMidi::Vibraphone);
//!
//! for e in [
//!     GestureEvent::enter(Solfege::Do, Duration::from_millis(200)),
//!     GestureEvent::leave(Solfege::Do, Duration::from_millis(700)),
//! ] {
//!     sound.handle(&e);
//!     rec.record(&e);
//! }
//! rec.write_file("session.mid").unwrap();
//! ```

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use solfege_core::{GestureEvent, GestureKind, Solfege};
use thiserror::Error;
use tracing::{debug, info};

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("cannot write MIDI file: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing was ever entered and left, so there is nothing to write.
    #[error("session has no completed notes")]
    NoNotes,
}

// ════════════════════════════════════════════════════════════════════════════
// General MIDI instrument numbers
// ════════════════════════════════════════════════════════════════════════════

/// The General MIDI programs offered for playback (0-indexed, as sent in
/// Program Change).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GeneralMidi {
    // Piano
    AcousticGrandPiano   = 0,
    BrightAcousticPiano  = 1,
    ElectricPiano1       = 4,
    Harpsichord          = 6,
    // Chromatic Percussion
    Celesta              = 8,
    Glockenspiel         = 9,
    MusicBox             = 10,
    Vibraphone           = 11,
    Marimba              = 12,
    Xylophone            = 13,
    TubularBells         = 14,
    // Organ
    ChurchOrgan          = 19,
    ReedOrgan            = 20,
    Accordion            = 21,
    // Guitar
    AcousticGuitarNylon  = 24,
    // Strings
    Violin               = 40,
    Cello                = 42,
    PizzicatoStrings     = 45,
    OrchestralHarp       = 46,
    // Ensemble
    StringEnsemble1      = 48,
    ChoirAahs            = 52,
    VoiceOohs            = 53,
    // Brass
    Trumpet              = 56,
    FrenchHorn           = 60,
    // Reed
    AltoSax              = 65,
    Oboe                 = 68,
    Clarinet             = 71,
    // Pipe
    Flute                = 73,
    Recorder             = 74,
    PanFlute             = 75,
    Ocarina              = 79,
    // Synth
    Lead1Square          = 80,
    Pad1NewAge           = 88,
    Pad2Warm             = 89,
    Pad4Choir            = 91,
    // Ethnic / percussive
    Kalimba              = 108,
    SteelDrums           = 114,
}

impl GeneralMidi {
    pub const ALL: [GeneralMidi; 37] = [
        GeneralMidi::AcousticGrandPiano, GeneralMidi::BrightAcousticPiano,
        GeneralMidi::ElectricPiano1, GeneralMidi::Harpsichord,
        GeneralMidi::Celesta, GeneralMidi::Glockenspiel, GeneralMidi::MusicBox,
        GeneralMidi::Vibraphone, GeneralMidi::Marimba, GeneralMidi::Xylophone,
        GeneralMidi::TubularBells, GeneralMidi::ChurchOrgan, GeneralMidi::ReedOrgan,
        GeneralMidi::Accordion, GeneralMidi::AcousticGuitarNylon, GeneralMidi::Violin,
        GeneralMidi::Cello, GeneralMidi::PizzicatoStrings, GeneralMidi::OrchestralHarp,
        GeneralMidi::StringEnsemble1, GeneralMidi::ChoirAahs, GeneralMidi::VoiceOohs,
        GeneralMidi::Trumpet, GeneralMidi::FrenchHorn, GeneralMidi::AltoSax,
        GeneralMidi::Oboe, GeneralMidi::Clarinet, GeneralMidi::Flute,
        GeneralMidi::Recorder, GeneralMidi::PanFlute, GeneralMidi::Ocarina,
        GeneralMidi::Lead1Square, GeneralMidi::Pad1NewAge, GeneralMidi::Pad2Warm,
        GeneralMidi::Pad4Choir, GeneralMidi::Kalimba, GeneralMidi::SteelDrums,
    ];

    /// Raw MIDI program number (0–127).
    pub fn program(self) -> u8 { self as u8 }

    pub fn name(self) -> &'static str {
        match self {
            GeneralMidi::AcousticGrandPiano  => "Acoustic Grand Piano",
            GeneralMidi::BrightAcousticPiano => "Bright Acoustic Piano",
            GeneralMidi::ElectricPiano1      => "Electric Piano 1",
            GeneralMidi::Harpsichord         => "Harpsichord",
            GeneralMidi::Celesta             => "Celesta",
            GeneralMidi::Glockenspiel        => "Glockenspiel",
            GeneralMidi::MusicBox            => "Music Box",
            GeneralMidi::Vibraphone          => "Vibraphone",
            GeneralMidi::Marimba             => "Marimba",
            GeneralMidi::Xylophone           => "Xylophone",
            GeneralMidi::TubularBells        => "Tubular Bells",
            GeneralMidi::ChurchOrgan         => "Church Organ",
            GeneralMidi::ReedOrgan           => "Reed Organ",
            GeneralMidi::Accordion           => "Accordion",
            GeneralMidi::AcousticGuitarNylon => "Acoustic Guitar (nylon)",
            GeneralMidi::Violin              => "Violin",
            GeneralMidi::Cello               => "Cello",
            GeneralMidi::PizzicatoStrings    => "Pizzicato Strings",
            GeneralMidi::OrchestralHarp      => "Orchestral Harp",
            GeneralMidi::StringEnsemble1     => "String Ensemble 1",
            GeneralMidi::ChoirAahs           => "Choir Aahs",
            GeneralMidi::VoiceOohs           => "Voice Oohs",
            GeneralMidi::Trumpet             => "Trumpet",
            GeneralMidi::FrenchHorn          => "French Horn",
            GeneralMidi::AltoSax             => "Alto Sax",
            GeneralMidi::Oboe                => "Oboe",
            GeneralMidi::Clarinet            => "Clarinet",
            GeneralMidi::Flute               => "Flute",
            GeneralMidi::Recorder            => "Recorder",
            GeneralMidi::PanFlute            => "Pan Flute",
            GeneralMidi::Ocarina             => "Ocarina",
            GeneralMidi::Lead1Square         => "Lead 1 (Square)",
            GeneralMidi::Pad1NewAge          => "Pad 1 (New Age)",
            GeneralMidi::Pad2Warm            => "Pad 2 (Warm)",
            GeneralMidi::Pad4Choir           => "Pad 4 (Choir)",
            GeneralMidi::Kalimba             => "Kalimba",
            GeneralMidi::SteelDrums          => "Steel Drums",
        }
    }

    /// Look up by name, ignoring case, spaces and punctuation, so
    /// `"grand-piano"` does not match but `"acousticgrandpiano"` and
    /// `"Acoustic Grand Piano"` both do.  A bare program number also works.
    pub fn from_name(s: &str) -> Option<GeneralMidi> {
        if let Ok(n) = s.trim().parse::<u8>() {
            return GeneralMidi::ALL.iter().copied().find(|g| g.program() == n);
        }
        let key = squash(s);
        GeneralMidi::ALL.iter().copied().find(|g| squash(g.name()) == key)
    }
}

fn squash(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).map(|c| c.to_ascii_lowercase()).collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Scale / PitchMap: sign → MIDI note
// ════════════════════════════════════════════════════════════════════════════

/// Semitone offsets from the root for the seven scale degrees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scale {
    pub intervals: [u8; 7],
    pub name:      &'static str,
}

impl Scale {
    /// Major (Ionian): W W H W W W H
    pub fn major() -> Self {
        Scale { intervals: [0, 2, 4, 5, 7, 9, 11], name: "Major" }
    }
    /// Natural minor (Aeolian): W H W W H W W
    pub fn minor() -> Self {
        Scale { intervals: [0, 2, 3, 5, 7, 8, 10], name: "Minor" }
    }
    pub fn dorian() -> Self {
        Scale { intervals: [0, 2, 3, 5, 7, 9, 10], name: "Dorian" }
    }
    pub fn mixolydian() -> Self {
        Scale { intervals: [0, 2, 4, 5, 7, 9, 10], name: "Mixolydian" }
    }
}

/// Maps a sign to a MIDI note: the sign's scale degree above `root`.
///
/// ```rust
/// use solfege_core::Solfege;
/// use solfege_midi::PitchMap;
///
/// let pm = PitchMap::major(60);
/// assert_eq!(pm.note_for(Solfege::Do), 60); // C4
/// assert_eq!(pm.note_for(Solfege::Ti), 71); // B4
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PitchMap {
    /// MIDI note for Do.
    pub root:  u8,
    pub scale: Scale,
}

impl PitchMap {
    pub fn major(root: u8) -> Self {
        PitchMap { root, scale: Scale::major() }
    }
    pub fn minor(root: u8) -> Self {
        PitchMap { root, scale: Scale::minor() }
    }
    pub fn custom(root: u8, scale: Scale) -> Self {
        PitchMap { root, scale }
    }

    /// MIDI note for `class`, clamped to 0–127.
    pub fn note_for(&self, class: Solfege) -> u8 {
        let semitone = self.scale.intervals[class.index()] as usize;
        (self.root as usize + semitone).min(127) as u8
    }
}

impl Default for PitchMap {
    fn default() -> Self {
        PitchMap::major(60)
    }
}

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Scientific pitch name: 60 → `"C4"`, 69 → `"A4"`, 0 → `"C-1"`.
pub fn note_name(pitch: u8) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[pitch as usize % 12], octave)
}

// ════════════════════════════════════════════════════════════════════════════
// NoteSink: where live notes go
// ════════════════════════════════════════════════════════════════════════════

/// A live MIDI destination.
pub trait NoteSink {
    fn program_change(&mut self, channel: u8, program: u8);
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8);
    fn note_off(&mut self, channel: u8, note: u8);
}

impl<T: NoteSink + ?Sized> NoteSink for Box<T> {
    fn program_change(&mut self, channel: u8, program: u8) {
        (**self).program_change(channel, program)
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        (**self).note_on(channel, note, velocity)
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        (**self).note_off(channel, note)
    }
}

/// Used when no MIDI port is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullOut;

impl NoteSink for NullOut {
    fn program_change(&mut self, _ch: u8, _p: u8)  {}
    fn note_on(&mut self, _ch: u8, _n: u8, _v: u8) {}
    fn note_off(&mut self, _ch: u8, _n: u8)        {}
}

// ════════════════════════════════════════════════════════════════════════════
// SoundManager: gesture events → notes
// ════════════════════════════════════════════════════════════════════════════

/// How long a note lasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteMode {
    /// From `Enter` until the matching `Leave`.
    Sustain,
    /// A fixed length from `Enter`; `Leave` is ignored.
    Pluck { length: Duration },
}

impl NoteMode {
    /// An eighth note at 120 BPM.
    pub const DEFAULT_PLUCK: Duration = Duration::from_millis(250);

    pub fn pluck() -> Self {
        NoteMode::Pluck { length: Self::DEFAULT_PLUCK }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Sounding {
    class: Solfege,
    pitch: u8,
    since: Duration,
}

/// Plays one note at a time in response to gesture events.
pub struct SoundManager<S: NoteSink> {
    out:       S,
    pitch_map: PitchMap,
    mode:      NoteMode,
    channel:   u8,
    velocity:  u8,
    program:   u8,
    sounding:  Option<Sounding>,
}

impl<S: NoteSink> SoundManager<S> {
    /// Defaults: channel 0, velocity 100, Acoustic Grand Piano.
    pub fn new(out: S, pitch_map: PitchMap, mode: NoteMode) -> Self {
        let mut m = SoundManager {
            out,
            pitch_map,
            mode,
            channel:  0,
            velocity: 100,
            program:  GeneralMidi::AcousticGrandPiano.program(),
            sounding: None,
        };
        m.out.program_change(m.channel, m.program);
        m
    }

    pub fn with_program(mut self, gm: GeneralMidi) -> Self {
        self.set_program(gm.program());
        self
    }

    pub fn with_velocity(mut self, v: u8) -> Self {
        self.velocity = v.min(127);
        self
    }

    pub fn with_channel(mut self, ch: u8) -> Self {
        self.channel = ch & 0x0F;
        self.out.program_change(self.channel, self.program);
        self
    }

    pub fn set_program(&mut self, program: u8) {
        self.program = program.min(127);
        self.out.program_change(self.channel, self.program);
    }

    pub fn set_mode(&mut self, mode: NoteMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> NoteMode { self.mode }

    pub fn program(&self) -> u8 { self.program }

    pub fn pitch_map(&self) -> &PitchMap { &self.pitch_map }

    /// The sign and pitch currently sounding.
    pub fn sounding(&self) -> Option<(Solfege, u8)> {
        self.sounding.map(|s| (s.class, s.pitch))
    }

    pub fn out(&self) -> &S { &self.out }

    pub fn handle(&mut self, event: &GestureEvent) {
        match event.kind {
            GestureKind::Enter => {
                self.stop();
                let pitch = self.pitch_map.note_for(event.class);
                debug!(class = %event.class, pitch, "note on");
                self.out.note_on(self.channel, pitch, self.velocity);
                self.sounding = Some(Sounding { class: event.class, pitch, since: event.at });
            }
            GestureKind::Leave => {
                if self.mode == NoteMode::Sustain
                    && self.sounding.is_some_and(|s| s.class == event.class)
                {
                    self.stop();
                }
            }
        }
    }

    /// Release a plucked note once its length has passed.
    pub fn tick(&mut self, now: Duration) {
        if let (NoteMode::Pluck { length }, Some(s)) = (self.mode, self.sounding) {
            if now.saturating_sub(s.since) >= length {
                self.stop();
            }
        }
    }

    /// Silence whatever is sounding.
    pub fn all_notes_off(&mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(s) = self.sounding.take() {
            debug!(class = %s.class, pitch = s.pitch, "note off");
            self.out.note_off(self.channel, s.pitch);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SessionRecorder: gesture events → Standard MIDI File
// ════════════════════════════════════════════════════════════════════════════

/// One note of a recorded session, in session time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedNote {
    pub class: Solfege,
    pub pitch: u8,
    pub start: Duration,
    pub end:   Duration,
}

/// Collects enter/leave pairs and serialises them as a Type-0 MIDI file.
///
/// Time zero of the file is the first `Enter`.
pub struct SessionRecorder {
    pitch_map:         PitchMap,
    notes:             Vec<RecordedNote>,
    open:              Option<(Solfege, Duration)>,
    tempo_bpm:         u32,
    ticks_per_quarter: u16,
    instrument:        u8,
    velocity:          u8,
    channel:           u8,
    name:              String,
}

impl SessionRecorder {
    /// Defaults: 120 BPM, 480 ticks per quarter, piano, velocity 100.
    pub fn new(pitch_map: PitchMap) -> Self {
        SessionRecorder {
            pitch_map,
            notes:             Vec::new(),
            open:              None,
            tempo_bpm:         120,
            ticks_per_quarter: 480,
            instrument:        GeneralMidi::AcousticGrandPiano.program(),
            velocity:          100,
            channel:           0,
            name:              "solfege session".to_string(),
        }
    }

    // ── setters (builder pattern) ─────────────────────────────────────────

    pub fn tempo(mut self, bpm: u32) -> Self {
        self.tempo_bpm = bpm.clamp(1, 300);
        self
    }

    pub fn instrument(mut self, gm: GeneralMidi) -> Self {
        self.instrument = gm.program();
        self
    }

    pub fn ticks_per_quarter(mut self, tpq: u16) -> Self {
        self.ticks_per_quarter = tpq.max(1);
        self
    }

    pub fn name(mut self, s: &str) -> Self {
        self.name = s.to_string();
        self
    }

    // ── recording ─────────────────────────────────────────────────────────

    pub fn record(&mut self, event: &GestureEvent) {
        match event.kind {
            GestureKind::Enter => {
                self.close(event.at);
                self.open = Some((event.class, event.at));
            }
            GestureKind::Leave => {
                if self.open.is_some_and(|(c, _)| c == event.class) {
                    self.close(event.at);
                }
            }
        }
    }

    /// Close a note left open at the end of the session.
    pub fn finish(&mut self, at: Duration) {
        self.close(at);
    }

    pub fn notes(&self) -> &[RecordedNote] {
        &self.notes
    }

    fn close(&mut self, at: Duration) {
        if let Some((class, start)) = self.open.take() {
            self.notes.push(RecordedNote {
                class,
                pitch: self.pitch_map.note_for(class),
                start,
                end: at.max(start),
            });
        }
    }

    // ── serialisation ─────────────────────────────────────────────────────

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MidiError> {
        let bytes = self.to_bytes()?;
        let mut f = std::fs::File::create(path.as_ref())?;
        f.write_all(&bytes)?;
        info!(path = %path.as_ref().display(), notes = self.notes.len(), "session written");
        Ok(())
    }

    /// A complete Type-0 MIDI file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MidiError> {
        if self.notes.is_empty() {
            return Err(MidiError::NoNotes);
        }
        let track = self.build_track_chunk();
        let mut out = Vec::new();

        // MThd  length=6  format=0  ntrks=1  division
        out.extend_from_slice(b"MThd");
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&self.ticks_per_quarter.to_be_bytes());

        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track.len() as u32).to_be_bytes());
        out.extend_from_slice(&track);
        Ok(out)
    }

    fn build_track_chunk(&self) -> Vec<u8> {
        let mut t: Vec<u8> = Vec::new();
        let ch = self.channel & 0x0F;

        // ── tempo ─────────────────────────────────────────────────────────
        let micros = 60_000_000u32 / self.tempo_bpm.max(1);
        t.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03]);
        t.push(((micros >> 16) & 0xFF) as u8);
        t.push(((micros >>  8) & 0xFF) as u8);
        t.push(( micros        & 0xFF) as u8);

        // ── track name ────────────────────────────────────────────────────
        let name = self.name.as_bytes();
        t.extend_from_slice(&[0x00, 0xFF, 0x03]);
        write_vlq(&mut t, name.len() as u32);
        t.extend_from_slice(name);

        // ── program change ────────────────────────────────────────────────
        t.extend_from_slice(&[0x00, 0xC0 | ch, self.instrument]);

        // ── notes, as absolute ticks from the first Enter ────────────────
        let origin = self.notes.first().map(|n| n.start).unwrap_or_default();
        let to_ticks = |at: Duration| {
            ms_to_ticks(at.saturating_sub(origin), self.ticks_per_quarter, self.tempo_bpm)
        };
        let mut last = 0u32;
        for note in &self.notes {
            let on  = to_ticks(note.start).max(last);
            let off = to_ticks(note.end).max(on);

            write_vlq(&mut t, on - last);
            t.extend_from_slice(&[0x90 | ch, note.pitch, self.velocity]);
            write_vlq(&mut t, off - on);
            t.extend_from_slice(&[0x80 | ch, note.pitch, 0x00]);
            last = off;
        }

        // ── end of track ──────────────────────────────────────────────────
        t.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        t
    }
}

/// Milliseconds of session time → MIDI ticks at `bpm`.
pub fn ms_to_ticks(d: Duration, tpq: u16, bpm: u32) -> u32 {
    // ticks = ms * tpq * bpm / 60_000
    let ticks = d.as_millis() * tpq as u128 * bpm as u128 / 60_000;
    ticks.min(u32::MAX as u128) as u32
}

/// Write a MIDI variable-length quantity (VLQ).
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = [0u8; 5];
    let mut i = 4;
    bytes[i] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 {
        i -= 1;
        bytes[i] = ((value & 0x7F) | 0x80) as u8;
        value >>= 7;
    }
    buf.extend_from_slice(&bytes[i..]);
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

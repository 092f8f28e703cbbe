//! Real-time MIDI playback thread.
//!
//! Gesture events are forwarded to a thread that owns a
//! [`SoundManager`] over a MIDI output port.  Pluck-mode notes are released
//! by the thread's own clock, so the app loop never blocks on audio.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use solfege_core::{GestureEvent, GestureSink};
use solfege_midi::{GeneralMidi, NoteMode, NoteSink, NullOut, PitchMap, SoundManager};
use tracing::{info, warn};

// ════════════════════════════════════════════════════════════════════════════
// PlayerCommand: sent to the playback thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerCommand {
    Gesture(GestureEvent),
    /// Change instrument (MIDI program 0–127).
    SetProgram(u8),
    SetMode(NoteMode),
    AllNotesOff,
    /// Silence everything and terminate the thread.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// midir backend
// ════════════════════════════════════════════════════════════════════════════

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl NoteSink for MidirOut {
    fn program_change(&mut self, channel: u8, program: u8) {
        let _ = self.conn.send(&[0xC0 | (channel & 0x0F), program]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        let _ = self.conn.send(&[0x90 | (channel & 0x0F), note, velocity]);
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        let _ = self.conn.send(&[0x80 | (channel & 0x0F), note, 0]);
    }
}

/// Port names that usually belong to a General MIDI softsynth.
fn looks_like_synth(name: &str) -> bool {
    let n = name.to_lowercase();
    ["fluid", "timidity", "microsoft", "gm", "synth"].iter().any(|k| n.contains(k))
}

/// Open a MIDI output port.
///
/// With `hint`, the first port whose name contains it (ignoring case) is
/// used; otherwise a softsynth is preferred, then the first port.  Falls
/// back to [`NullOut`] with a warning when nothing can be opened.
pub fn open_midi_output(hint: Option<&str>) -> Box<dyn NoteSink + Send> {
    let midi_out = match midir::MidiOutput::new("leap_solfege") {
        Ok(m)  => m,
        Err(e) => {
            warn!(error = %e, "MIDI init failed; notes will be silent");
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("no MIDI output ports found; notes will be silent");
        warn!("start a synthesiser such as `timidity -iA` or `fluidsynth` (Linux); macOS and Windows ship one");
        return Box::new(NullOut);
    }

    let names: Vec<String> = ports
        .iter()
        .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
        .collect();

    let port_idx = match hint {
        Some(h) => {
            let h = h.to_lowercase();
            names.iter().position(|n| n.to_lowercase().contains(&h))
        }
        None => names.iter().position(|n| looks_like_synth(n)),
    }
    .unwrap_or(0);

    info!(port = %names[port_idx], "opening MIDI port");
    match midi_out.connect(&ports[port_idx], "solfege-play") {
        Ok(conn) => Box::new(MidirOut { conn }),
        Err(e) => {
            warn!(error = %e, "cannot connect MIDI port; notes will be silent");
            Box::new(NullOut)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Player: the playback thread
// ════════════════════════════════════════════════════════════════════════════

/// Handle to the MIDI playback thread.  Dropping it stops the thread.
pub struct Player {
    cmd_tx: Sender<PlayerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl Player {
    /// Spawn the playback thread on `out`.
    pub fn spawn(
        out:        Box<dyn NoteSink + Send>,
        pitch_map:  PitchMap,
        mode:       NoteMode,
        instrument: GeneralMidi,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PlayerCommand>();
        let handle = thread::spawn(move || {
            let sound = SoundManager::new(out, pitch_map, mode).with_program(instrument);
            player_thread(sound, cmd_rx);
        });
        Player { cmd_tx, handle: Some(handle) }
    }

    /// Spawn on the best available MIDI port.
    pub fn open(
        port_hint:  Option<&str>,
        pitch_map:  PitchMap,
        mode:       NoteMode,
        instrument: GeneralMidi,
    ) -> Self {
        Self::spawn(open_midi_output(port_hint), pitch_map, mode, instrument)
    }

    pub fn send(&self, cmd: PlayerCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    /// A cloneable handle for commands other than gesture events.
    pub fn control(&self) -> PlayerControl {
        PlayerControl { cmd_tx: self.cmd_tx.clone() }
    }

    /// Silence, stop the thread and wait for it.
    pub fn quit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.send(PlayerCommand::Quit);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Sends settings changes to a running [`Player`].
#[derive(Clone)]
pub struct PlayerControl {
    cmd_tx: Sender<PlayerCommand>,
}

impl PlayerControl {
    pub fn set_program(&self, gm: GeneralMidi) {
        let _ = self.cmd_tx.send(PlayerCommand::SetProgram(gm.program()));
    }

    pub fn set_mode(&self, mode: NoteMode) {
        let _ = self.cmd_tx.send(PlayerCommand::SetMode(mode));
    }

    pub fn all_notes_off(&self) {
        let _ = self.cmd_tx.send(PlayerCommand::AllNotesOff);
    }
}

impl GestureSink for Player {
    fn on_gesture_event(&mut self, event: GestureEvent) {
        self.send(PlayerCommand::Gesture(event));
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// player_thread: the actual loop
// ════════════════════════════════════════════════════════════════════════════

const TICK: Duration = Duration::from_millis(10);

fn player_thread<S: NoteSink>(mut sound: SoundManager<S>, cmd_rx: Receiver<PlayerCommand>) {
    // Event times are on the frame source's clock; `anchor` ties the latest
    // one to the wall clock so pluck releases can be timed here.
    let mut anchor: Option<(Duration, Instant)> = None;

    loop {
        match cmd_rx.recv_timeout(TICK) {
            Ok(PlayerCommand::Gesture(e)) => {
                anchor = Some((e.at, Instant::now()));
                sound.handle(&e);
            }
            Ok(PlayerCommand::SetProgram(p)) => sound.set_program(p),
            Ok(PlayerCommand::SetMode(m))    => sound.set_mode(m),
            Ok(PlayerCommand::AllNotesOff)   => sound.all_notes_off(),
            Ok(PlayerCommand::Quit) | Err(RecvTimeoutError::Disconnected) => {
                sound.all_notes_off();
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        if let Some((at, wall)) = anchor {
            sound.tick(at + wall.elapsed());
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

//! Hand-landmark sources: LeapMotion hardware, keyboard simulation and
//! recorded replay files.
//!
//! Every source runs on its own thread and delivers [`HandFrame`]s over an
//! `mpsc` channel, so the app loop never needs to know where frames come
//! from.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use solfege_core::poses::{synthetic_pose, with_tremor};
use solfege_core::{InputError, LandmarkFrame, Point3, Solfege};
use thiserror::Error;
use tracing::{debug, info};

// ════════════════════════════════════════════════════════════════════════════
// HandFrame
// ════════════════════════════════════════════════════════════════════════════

/// One tracker sample.  `landmarks` is `None` when no hand is in view.
#[derive(Clone, Debug, PartialEq)]
pub struct HandFrame {
    pub landmarks: Option<Vec<Point3>>,
    /// Time since the source started.
    pub at:        Duration,
}

impl HandFrame {
    pub fn hand(landmarks: Vec<Point3>, at: Duration) -> Self {
        HandFrame { landmarks: Some(landmarks), at }
    }

    pub fn empty(at: Duration) -> Self {
        HandFrame { landmarks: None, at }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FrameSource trait: unified interface for hw, sim and replay
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`HandFrame`]s over a channel.
///
/// `run` returns when the source is exhausted or the receiver hangs up.
pub trait FrameSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<HandFrame>);
}

/// Spawn a frame source on its own thread and return the receiving end.
pub fn spawn_frame_source<S: FrameSource>(source: S) -> Receiver<HandFrame> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(source).run(tx));
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// SimFrameSource: keyboard simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimInput {
    /// Show the synthetic pose for this sign until told otherwise.
    Hold(Solfege),
    /// Take the hand out of view.
    Release,
    Quit,
}

/// Frame source driven by [`SimInput`] events from the visualizer window.
///
/// Emits a frame every `period`: the held sign's synthetic pose with a
/// little tremor, or an empty frame when no sign is held.
pub struct SimFrameSource {
    pub rx:     Receiver<SimInput>,
    pub period: Duration,
    /// Peak tremor offset in image units.
    pub tremor: f32,
    pub start:  Instant,
}

impl SimFrameSource {
    /// 30 fps with a barely visible tremor.
    pub fn new(rx: Receiver<SimInput>, start: Instant) -> Self {
        SimFrameSource {
            rx,
            period: Duration::from_millis(33),
            tremor: 0.002,
            start,
        }
    }
}

impl FrameSource for SimFrameSource {
    fn run(self: Box<Self>, tx: Sender<HandFrame>) {
        let mut held: Option<LandmarkFrame> = None;
        loop {
            // ── drain input ───────────────────────────────────────────────
            loop {
                match self.rx.try_recv() {
                    Ok(SimInput::Hold(class)) => {
                        debug!(%class, "sim hold");
                        held = Some(synthetic_pose(class));
                    }
                    Ok(SimInput::Release) => held = None,
                    Ok(SimInput::Quit) | Err(TryRecvError::Disconnected) => return,
                    Err(TryRecvError::Empty) => break,
                }
            }

            let at = self.start.elapsed();
            let frame = match &held {
                Some(base) => {
                    let jittered = with_tremor(base, at.as_secs_f32(), self.tremor);
                    HandFrame::hand(jittered.points().to_vec(), at)
                }
                None => HandFrame::empty(at),
            };
            if tx.send(frame).is_err() {
                return;
            }
            thread::sleep(self.period);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Replay files: one JSON object per line
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot read replay: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Json {
        line:   usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {source}")]
    Landmarks {
        line:   usize,
        #[source]
        source: InputError,
    },

    #[error("line {line}: time runs backwards ({t_ms} ms after {previous_ms} ms)")]
    OutOfOrder { line: usize, t_ms: u64, previous_ms: u64 },
}

/// The on-disk form of a frame:
/// `{"t_ms": 33, "landmarks": [[x, y, z], ...]}` or `"landmarks": null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub t_ms:      u64,
    pub landmarks: Option<Vec<[f32; 3]>>,
}

impl ReplayRecord {
    pub fn from_frame(frame: &HandFrame) -> Self {
        ReplayRecord {
            t_ms:      frame.at.as_millis() as u64,
            landmarks: frame
                .landmarks
                .as_ref()
                .map(|pts| pts.iter().map(|p| [p.x, p.y, p.z]).collect()),
        }
    }

    pub fn to_frame(&self) -> HandFrame {
        HandFrame {
            landmarks: self
                .landmarks
                .as_ref()
                .map(|pts| pts.iter().copied().map(Point3::from).collect()),
            at: Duration::from_millis(self.t_ms),
        }
    }
}

/// Parse a replay stream.  Blank lines are skipped; every hand must have
/// exactly 21 finite landmarks and time must not run backwards.
pub fn read_replay<R: BufRead>(reader: R) -> Result<Vec<ReplayRecord>, ReplayError> {
    let mut records: Vec<ReplayRecord> = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(&line)
            .map_err(|source| ReplayError::Json { line: line_no, source })?;

        if let Some(pts) = &record.landmarks {
            let flat: Vec<f32> = pts.iter().flatten().copied().collect();
            LandmarkFrame::from_flat(&flat)
                .map_err(|source| ReplayError::Landmarks { line: line_no, source })?;
        }
        if let Some(prev) = records.last() {
            if record.t_ms < prev.t_ms {
                return Err(ReplayError::OutOfOrder {
                    line:        line_no,
                    t_ms:        record.t_ms,
                    previous_ms: prev.t_ms,
                });
            }
        }
        records.push(record);
    }
    Ok(records)
}

pub fn load_replay<P: AsRef<Path>>(path: P) -> Result<Vec<ReplayRecord>, ReplayError> {
    let file = File::open(path.as_ref())?;
    let records = read_replay(BufReader::new(file))?;
    info!(path = %path.as_ref().display(), frames = records.len(), "replay loaded");
    Ok(records)
}

/// Writes frames in the replay format, one line each.
pub struct ReplayWriter<W: Write> {
    out:    W,
    frames: usize,
}

impl<W: Write> ReplayWriter<W> {
    pub fn new(out: W) -> Self {
        ReplayWriter { out, frames: 0 }
    }

    pub fn write_frame(&mut self, frame: &HandFrame) -> Result<(), ReplayError> {
        let line = serde_json::to_string(&ReplayRecord::from_frame(frame))
            .map_err(|source| ReplayError::Json { line: self.frames + 1, source })?;
        writeln!(self.out, "{line}")?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn into_inner(mut self) -> Result<W, ReplayError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl ReplayWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        Ok(ReplayWriter::new(File::create(path)?))
    }
}

/// Frame source that plays back recorded frames.
///
/// With `realtime` set the original spacing between frames is kept;
/// otherwise frames are sent as fast as the receiver takes them.  Frame
/// times are always the recorded ones.
pub struct ReplayFrameSource {
    pub records:  Vec<ReplayRecord>,
    pub realtime: bool,
}

impl FrameSource for ReplayFrameSource {
    fn run(self: Box<Self>, tx: Sender<HandFrame>) {
        let start = Instant::now();
        let origin = self.records.first().map(|r| r.t_ms).unwrap_or(0);
        for record in &self.records {
            if self.realtime {
                let due = Duration::from_millis(record.t_ms.saturating_sub(origin));
                if let Some(wait) = due.checked_sub(start.elapsed()) {
                    thread::sleep(wait);
                }
            }
            if tx.send(record.to_frame()).is_err() {
                return;
            }
        }
        debug!(frames = self.records.len(), "replay finished");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapFrameSource: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Millimetres of Leap space per unit of landmark space.
#[cfg(feature = "leap")]
const LEAP_MM_PER_UNIT: f32 = 400.0;
/// Leap height that maps to the vertical centre of the image.
#[cfg(feature = "leap")]
const LEAP_CENTER_Y_MM: f32 = 200.0;

/// Frame source backed by a real LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// The first tracked hand is converted to the 21-landmark layout; Leap's
/// y-up millimetres become y-down image units centred at (0.5, 0.5).
#[cfg(feature = "leap")]
pub struct LeapFrameSource {
    pub start: Instant,
}

#[cfg(feature = "leap")]
impl FrameSource for LeapFrameSource {
    fn run(self: Box<Self>, tx: Sender<HandFrame>) {
        use leaprs::*;

        let mut connection = match Connection::create(ConnectionConfig::default()) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = ?e, "cannot create LeapC connection");
                return;
            }
        };
        if let Err(e) = connection.open() {
            tracing::warn!(error = ?e, "cannot open LeapMotion device");
            return;
        }
        info!("LeapMotion connected");

        loop {
            let msg = match connection.poll(100) {
                Ok(m) => m,
                Err(_) => continue,
            };
            if let Event::Tracking(frame) = msg.event() {
                let at = self.start.elapsed();
                let out = match frame.hands().next() {
                    Some(hand) => {
                        // Wrist from the middle metacarpal base; each digit
                        // gives its proximal, intermediate and distal joints
                        // plus the tip.
                        let mut pts = vec![Point3::ZERO; solfege_core::LANDMARK_COUNT];
                        for (f, digit) in hand.digits().take(5).enumerate() {
                            if f == 2 {
                                let w = digit.metacarpal().prev_joint();
                                pts[0] = leap_point(w.x, w.y, w.z);
                            }
                            let base = 1 + f * 4;
                            let joints = [
                                digit.proximal().prev_joint(),
                                digit.intermediate().prev_joint(),
                                digit.distal().prev_joint(),
                                digit.distal().next_joint(),
                            ];
                            for (k, j) in joints.iter().enumerate() {
                                pts[base + k] = leap_point(j.x, j.y, j.z);
                            }
                        }
                        HandFrame::hand(pts, at)
                    }
                    None => HandFrame::empty(at),
                };
                if tx.send(out).is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(feature = "leap")]
fn leap_point(x: f32, y: f32, z: f32) -> Point3 {
    Point3::new(
        0.5 + x / LEAP_MM_PER_UNIT,
        0.5 - (y - LEAP_CENTER_Y_MM) / LEAP_MM_PER_UNIT,
        z / LEAP_MM_PER_UNIT,
    )
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use solfege_core::LANDMARK_COUNT;
    use std::io::Cursor;

    fn pose_line(t_ms: u64, class: Solfege) -> String {
        let frame = HandFrame::hand(synthetic_pose(class).points().to_vec(), Duration::from_millis(t_ms));
        serde_json::to_string(&ReplayRecord::from_frame(&frame)).unwrap()
    }

    #[test]
    fn parses_hands_and_gaps() {
        let text = format!("{}\n\n{{\"t_ms\": 66, \"landmarks\": null}}\n", pose_line(33, Solfege::Re));
        let records = read_replay(Cursor::new(text)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].t_ms, 33);
        assert_eq!(records[0].landmarks.as_ref().map(Vec::len), Some(LANDMARK_COUNT));
        assert_eq!(records[1].to_frame(), HandFrame::empty(Duration::from_millis(66)));
    }

    #[test]
    fn short_hand_is_rejected_with_line_number() {
        let text = format!("{}\n{{\"t_ms\": 40, \"landmarks\": [[0,0,0]]}}\n", pose_line(0, Solfege::Do));
        match read_replay(Cursor::new(text)) {
            Err(ReplayError::Landmarks { line, source }) => {
                assert_eq!(line, 2);
                assert_eq!(source, InputError::WrongLandmarkCount { expected: 21, found: 1 });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_json_is_rejected() {
        let err = read_replay(Cursor::new("{\"t_ms\": \n")).unwrap_err();
        assert!(matches!(err, ReplayError::Json { line: 1, .. }));
    }

    #[test]
    fn time_must_not_run_backwards() {
        let text = format!("{}\n{}\n", pose_line(100, Solfege::Mi), pose_line(50, Solfege::Mi));
        let err = read_replay(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ReplayError::OutOfOrder { line: 2, t_ms: 50, previous_ms: 100 }));
    }

    #[test]
    fn writer_output_reads_back() {
        let frames = vec![
            HandFrame::hand(synthetic_pose(Solfege::La).points().to_vec(), Duration::from_millis(0)),
            HandFrame::empty(Duration::from_millis(33)),
        ];
        let mut w = ReplayWriter::new(Vec::new());
        for f in &frames {
            w.write_frame(f).unwrap();
        }
        assert_eq!(w.frames(), 2);
        let bytes = w.into_inner().unwrap();
        let back: Vec<HandFrame> = read_replay(Cursor::new(bytes))
            .unwrap()
            .iter()
            .map(ReplayRecord::to_frame)
            .collect();
        assert_eq!(back, frames);
    }

    #[test]
    fn replay_source_sends_every_frame() {
        let records = read_replay(Cursor::new(format!(
            "{}\n{}\n{{\"t_ms\": 66, \"landmarks\": null}}\n",
            pose_line(0, Solfege::Ti),
            pose_line(33, Solfege::Ti),
        )))
        .unwrap();
        let rx = spawn_frame_source(ReplayFrameSource { records, realtime: false });
        let got: Vec<HandFrame> = rx.iter().collect();
        assert_eq!(got.len(), 3);
        assert!(got[2].landmarks.is_none());
        assert_eq!(got[1].at, Duration::from_millis(33));
    }

    #[test]
    fn realtime_replay_tolerates_records_out_of_order() {
        let records = vec![
            ReplayRecord { t_ms: 40, landmarks: None },
            ReplayRecord { t_ms: 10, landmarks: None },
            ReplayRecord { t_ms: 45, landmarks: None },
        ];
        let rx = spawn_frame_source(ReplayFrameSource { records, realtime: true });
        let got: Vec<Duration> = rx.iter().map(|f| f.at).collect();
        assert_eq!(got, vec![Duration::from_millis(40), Duration::from_millis(10), Duration::from_millis(45)]);
    }

    #[test]
    fn sim_source_follows_held_sign() {
        let (tx, rx) = mpsc::channel();
        let mut sim = SimFrameSource::new(rx, Instant::now());
        sim.period = Duration::from_millis(1);
        sim.tremor = 0.0;
        tx.send(SimInput::Hold(Solfege::Fa)).unwrap();
        let frames = spawn_frame_source(sim);

        let first = frames.recv().unwrap();
        assert_eq!(first.landmarks, Some(synthetic_pose(Solfege::Fa).points().to_vec()));

        tx.send(SimInput::Release).unwrap();
        let released = frames.iter().find(|f| f.landmarks.is_none());
        assert!(released.is_some());

        tx.send(SimInput::Quit).unwrap();
        // the source stops; the channel drains and closes
        assert!(frames.iter().count() < 1000);
    }
}

//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────┬───────────────────────────────────────┐
//! │                          │  Do  ████████████░░░░░░░░   0.92      │
//! │      hand skeleton       │  Re  ██░░░░░░░░░░│░░░░░░░   0.10      │
//! │     (smoothed frame)     │  ...             │ threshold          │
//! │                          │                                       │
//! │                          │        DO   C4                        │
//! ├──────────────────────────┴───────────────────────────────────────┤
//! │  status bar                                                      │
//! │  key legend                                                      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;

use anyhow::{anyhow, Result};
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use solfege_core::{ConfidenceVector, GateState, LandmarkFrame, Solfege};

use crate::source::SimInput;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:     usize = 960;
pub const WIN_H:     usize = 520;
const HAND_W:        usize = 400;
const HAND_H:        usize = 430;
const BAR_X:         usize = HAND_W + 70;
const BAR_W:         usize = 360;
const BAR_H:         usize = 26;
const BAR_Y0:        usize = 40;
const BAR_GAP:       usize = 14;
const ACTIVE_Y:      usize = BAR_Y0 + 7 * (BAR_H + BAR_GAP) + 20;
const STATUS_Y:      usize = WIN_H - 56;
const BG_COLOR:      u32   = 0xFF1A1A2E;
const PANEL_BG:      u32   = 0xFF16213E;
const BAR_BG:        u32   = 0xFF0F3460;
const TEXT_BG:       u32   = 0xFF0F3460;
const BONE_COLOR:    u32   = 0xFFAADDFF;
const JOINT_COLOR:   u32   = 0xFFFFFFFF;
const THRESH_COLOR:  u32   = 0xFFFFD700;
const ACTIVE_COLOR:  u32   = 0xFFFFD700;

/// One colour per sign, Do through Ti.
const CLASS_COLORS: [u32; Solfege::COUNT] = [
    0xFFE94560, 0xFFF08A24, 0xFFF6D743, 0xFF5CDB95, 0xFF3FC1C9, 0xFF6C63FF, 0xFFC77DFF,
];

/// Landmark index pairs drawn as bones.
const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (9, 10), (10, 11), (11, 12),
    (13, 14), (14, 15), (15, 16),
    (0, 17), (17, 18), (18, 19), (19, 20),
    (5, 9), (9, 13), (13, 17),
];

// ════════════════════════════════════════════════════════════════════════════
// View: everything one frame needs to draw
// ════════════════════════════════════════════════════════════════════════════

pub struct View<'a> {
    pub confidences: &'a ConfidenceVector,
    pub threshold:   f32,
    pub gate:        GateState,
    /// Active sign and the note name it plays.
    pub active:      Option<(Solfege, String)>,
    pub hand:        Option<&'a LandmarkFrame>,
    pub status:      &'a str,
    pub classifier:  &'a str,
}

/// Window actions that are not simulated hand input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiAction {
    Quit,
    /// Store the current hand as a calibration sample for this sign.
    Capture(Solfege),
    /// Train a prototype classifier from the captured samples.
    Train,
    /// Go back to the heuristic classifier.
    UseHeuristic,
    /// Switch between sustained and plucked notes.
    ToggleNoteMode,
    NextInstrument,
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    buf:    Vec<u32>,
    /// Where number keys go in simulation mode.
    sim_tx: Option<Sender<SimInput>>,
}

const SIGN_KEYS: [Key; Solfege::COUNT] =
    [Key::Key1, Key::Key2, Key::Key3, Key::Key4, Key::Key5, Key::Key6, Key::Key7];

impl Visualizer {
    pub fn new(sim_tx: Option<Sender<SimInput>>) -> Result<Self> {
        let mut window = Window::new(
            "Leap Solfège: hand-sign recogniser",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow!("cannot open window: {e}"))?;

        window.limit_update_rate(Some(std::time::Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_tx,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll the keyboard.  Number keys drive the simulated hand; the rest
    /// come back as [`UiAction`]s.
    pub fn poll_input(&mut self) -> Vec<UiAction> {
        let mut actions = Vec::new();
        if !self.window.is_open() {
            actions.push(UiAction::Quit);
            return actions;
        }

        let shift = self.window.is_key_down(Key::LeftShift)
                 || self.window.is_key_down(Key::RightShift);
        let pressed = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);

        if pressed(Key::Q) || pressed(Key::Escape) {
            actions.push(UiAction::Quit);
        }
        for (class, key) in Solfege::ALL.iter().zip(SIGN_KEYS.iter()) {
            if pressed(*key) {
                if shift {
                    actions.push(UiAction::Capture(*class));
                } else if let Some(tx) = &self.sim_tx {
                    let _ = tx.send(SimInput::Hold(*class));
                }
            }
        }
        if pressed(Key::Key0) {
            if let Some(tx) = &self.sim_tx {
                let _ = tx.send(SimInput::Release);
            }
        }
        if pressed(Key::T) { actions.push(UiAction::Train); }
        if pressed(Key::H) { actions.push(UiAction::UseHeuristic); }
        if pressed(Key::P) { actions.push(UiAction::ToggleNoteMode); }
        if pressed(Key::I) { actions.push(UiAction::NextInstrument); }

        if actions.contains(&UiAction::Quit) {
            if let Some(tx) = &self.sim_tx {
                let _ = tx.send(SimInput::Quit);
            }
        }
        actions
    }

    /// Render one frame.
    pub fn render(&mut self, view: &View<'_>) {
        self.buf.fill(BG_COLOR);

        // ── Hand panel ────────────────────────────────────────────────────
        self.fill_rect(10, 10, HAND_W, HAND_H, PANEL_BG);
        match view.hand {
            Some(frame) => self.draw_skeleton(frame),
            None => self.draw_text("NO HAND", 10 + HAND_W / 2 - 28, 10 + HAND_H / 2, 2, 0xFF888888),
        }

        // ── Confidence bars ───────────────────────────────────────────────
        self.draw_text(view.classifier, BAR_X, 14, 2, 0xFFAADDFF);
        for (i, (class, value)) in view.confidences.iter().enumerate() {
            let y = BAR_Y0 + i * (BAR_H + BAR_GAP);
            let highlighted = view.active.as_ref().is_some_and(|(a, _)| *a == class);
            let label_color = if highlighted { ACTIVE_COLOR } else { 0xFFEEEEEE };
            self.draw_text(class.name(), BAR_X - 56, y + 6, 3, label_color);

            self.fill_rect(BAR_X, y, BAR_W, BAR_H, BAR_BG);
            let filled = (BAR_W as f32 * value.clamp(0.0, 1.0)) as usize;
            let color = CLASS_COLORS[class.index()];
            self.fill_rect(BAR_X, y, filled, BAR_H, if highlighted { blend(color, 0xFFFFFFFF, 0.35) } else { color });
            if highlighted {
                self.draw_border(BAR_X, y, BAR_W, BAR_H, ACTIVE_COLOR);
            }
            self.draw_text(&format!("{value:.2}"), BAR_X + BAR_W + 10, y + 6, 3, 0xFFEEEEEE);
        }

        // ── Threshold line ────────────────────────────────────────────────
        let tx = BAR_X + (BAR_W as f32 * view.threshold.clamp(0.0, 1.0)) as usize;
        let bottom = BAR_Y0 + Solfege::COUNT * (BAR_H + BAR_GAP) - BAR_GAP;
        for y in (BAR_Y0 - 6)..(bottom + 6) {
            self.set_pixel(tx, y, THRESH_COLOR);
            self.set_pixel(tx + 1, y, THRESH_COLOR);
        }

        // ── Active sign / candidate ───────────────────────────────────────
        match (&view.active, view.gate) {
            (Some((class, note)), _) => {
                let text = format!("{} {}", class.name(), note);
                self.draw_text(&text, BAR_X, ACTIVE_Y, 8, ACTIVE_COLOR);
            }
            (None, GateState::Candidate { class, .. }) => {
                self.draw_text(&format!("{}?", class.name()), BAR_X, ACTIVE_Y, 8, 0xFF666688);
            }
            _ => {}
        }

        // ── Status bar ────────────────────────────────────────────────────
        self.fill_rect(0, STATUS_Y, WIN_W, WIN_H - STATUS_Y, TEXT_BG);
        self.draw_text(view.status, 10, STATUS_Y + 10, 2, 0xFFEEEEEE);

        // ── Key legend ────────────────────────────────────────────────────
        let legend = if self.sim_tx.is_some() {
            "1-7=sign  0=no hand  shift+1-7=capture  T=train  H=heuristic  P=pluck  I=instrument  Q=quit"
        } else {
            "shift+1-7=capture  T=train  H=heuristic  P=pluck  I=instrument  Q=quit"
        };
        self.draw_text(legend, 10, WIN_H - 18, 2, 0xFF888888);

        self.window.update_with_buffer(&self.buf, WIN_W, WIN_H).ok();
    }

    // ── Skeleton ──────────────────────────────────────────────────────────

    /// Image coordinates (0–1) map onto the hand panel.
    fn draw_skeleton(&mut self, frame: &LandmarkFrame) {
        let to_px = |i: usize| {
            let p = frame.point(i);
            let x = 10.0 + p.x.clamp(0.0, 1.0) * HAND_W as f32;
            let y = 10.0 + p.y.clamp(0.0, 1.0) * HAND_H as f32;
            (x as isize, y as isize)
        };
        for (a, b) in HAND_CONNECTIONS {
            let (x0, y0) = to_px(a);
            let (x1, y1) = to_px(b);
            self.draw_line(x0, y0, x1, y1, BONE_COLOR);
        }
        for i in 0..solfege_core::LANDMARK_COUNT {
            let (x, y) = to_px(i);
            self.fill_rect((x - 2).max(0) as usize, (y - 2).max(0) as usize, 5, 5, JOINT_COLOR);
        }
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(WIN_H) {
            for col in x..(x + w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        for col in x..(x + w).min(WIN_W) {
            self.set_pixel(col, y, color);
            self.set_pixel(col, y + h - 1, color);
        }
        for row in y..(y + h).min(WIN_H) {
            self.set_pixel(x, row, color);
            self.set_pixel(x + w - 1, row, color);
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < WIN_W && y < WIN_H {
            self.buf[y * WIN_W + x] = color;
        }
    }

    /// Bresenham, clipped per pixel.
    fn draw_line(&mut self, x0: isize, y0: isize, x1: isize, y1: isize, color: u32) {
        let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
        let (sx, sy) = (if x0 < x1 { 1 } else { -1 }, if y0 < y1 { 1 } else { -1 });
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            if x >= 0 && y >= 0 {
                self.set_pixel(x as usize, y as usize, color);
            }
            if x == x1 && y == y1 { break; }
            let e2 = 2 * err;
            if e2 >= dy { err += dy; x += sx; }
            if e2 <= dx { err += dx; y += sy; }
        }
    }

    /// 3×5 bitmap text, each font pixel drawn as a `scale`×`scale` block.
    fn draw_text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let advance = 4 * scale;
        let mut cx = x;
        for ch in text.chars() {
            for (row, &bits) in char_glyph(ch).iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += advance;
            if cx + advance > WIN_W { break; }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '?' => [0b111, 0b001, 0b011, 0b000, 0b010],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '(' => [0b010, 0b100, 0b100, 0b100, 0b010],
        ')' => [0b010, 0b001, 0b001, 0b001, 0b010],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000],
    }
}

/// Alpha-blend two ARGB colours. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |shift: u32| {
        let ca = ((a >> shift) & 0xFF) as f32;
        let cb = ((b >> shift) & 0xFF) as f32;
        ((ca * (1.0 - t) + cb * t) as u32) << shift
    };
    0xFF000000 | lerp(16) | lerp(8) | lerp(0)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0xFF102030, 0xFFFFFFFF, 0.0), 0xFF102030);
        assert_eq!(blend(0xFF102030, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
    }

    #[test]
    fn glyphs_ignore_case() {
        assert_eq!(char_glyph('s'), char_glyph('S'));
        assert_eq!(char_glyph('#'), [0b101, 0b111, 0b101, 0b111, 0b101]);
    }

    #[test]
    fn skeleton_connects_every_landmark() {
        let mut seen = [false; solfege_core::LANDMARK_COUNT];
        for (a, b) in HAND_CONNECTIONS {
            seen[a] = true;
            seen[b] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}

//! # leap_solfege
//!
//! Interactive solfège hand-sign controller.  Hand landmarks from a
//! LeapMotion controller (or the keyboard simulator, or a replay file) run
//! through the [`solfege_core`] pipeline; recognised signs play MIDI notes
//! and can be recorded to a Standard MIDI File.
//!
//! ## Sign → note mapping (C major, root 60)
//!
//! | Sign | Hand shape | Note |
//! |---|---|---|
//! | Do | fist, thumb out, pinky edge forward | C4 |
//! | Re | index straight up, palm to camera | D4 |
//! | Mi | flat hand, palm down | E4 |
//! | Fa | hanging hand, thumb down | F4 |
//! | Sol | flat hand tilted away, back visible | G4 |
//! | La | cupped hand, palm down | A4 |
//! | Ti | index raised at an angle | B4 |
//!
//! ## Feature flags
//!
//! * (default): **Simulation mode**: number keys show synthetic hands.
//! * `leap`: **Hardware mode**: polls a real LeapMotion controller via LeapC.
//!
//! ### Keyboard
//!
//! | Key | Action |
//! |---|---|
//! | `1`–`7` | Hold the synthetic Do…Ti hand (simulation only) |
//! | `0` | Take the hand away (simulation only) |
//! | `Shift`+`1`–`7` | Capture the current hand as a calibration sample |
//! | `T` | Train a prototype classifier from the samples |
//! | `H` | Back to the heuristic classifier |
//! | `P` | Toggle sustained / plucked notes |
//! | `I` | Next instrument |
//! | `Q` / `Escape` | Quit |

pub mod source;
pub mod player;
pub mod visualizer;
pub mod app;

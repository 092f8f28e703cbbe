//! The seven solfège classes and a per-class confidence vector.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One solfège hand sign, in scale order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Solfege {
    Do,
    Re,
    Mi,
    Fa,
    Sol,
    La,
    Ti,
}

impl Solfege {
    pub const COUNT: usize = 7;

    pub const ALL: [Solfege; Solfege::COUNT] = [
        Solfege::Do, Solfege::Re, Solfege::Mi, Solfege::Fa,
        Solfege::Sol, Solfege::La, Solfege::Ti,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Solfege> {
        Solfege::ALL.get(i).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Solfege::Do  => "Do",
            Solfege::Re  => "Re",
            Solfege::Mi  => "Mi",
            Solfege::Fa  => "Fa",
            Solfege::Sol => "Sol",
            Solfege::La  => "La",
            Solfege::Ti  => "Ti",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(s: &str) -> Option<Solfege> {
        Solfege::ALL.iter().copied().find(|c| c.name().eq_ignore_ascii_case(s))
    }

    /// Scale degree, 0 for Do through 6 for Ti.
    pub const fn degree(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Solfege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ConfidenceVector
// ════════════════════════════════════════════════════════════════════════════

/// Confidence per class, indexed by [`Solfege::index`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConfidenceVector([f32; Solfege::COUNT]);

impl ConfidenceVector {
    pub const ZERO: ConfidenceVector = ConfidenceVector([0.0; Solfege::COUNT]);

    pub fn new(values: [f32; Solfege::COUNT]) -> Self {
        ConfidenceVector(values)
    }

    /// A vector with one class set and every other class at zero.
    pub fn single(class: Solfege, value: f32) -> Self {
        let mut v = Self::ZERO;
        v.set(class, value);
        v
    }

    pub fn get(&self, class: Solfege) -> f32 {
        self.0[class.index()]
    }

    pub fn set(&mut self, class: Solfege, value: f32) {
        self.0[class.index()] = value;
    }

    /// Multiply one class in place.
    pub fn scale(&mut self, class: Solfege, k: f32) {
        self.0[class.index()] *= k;
    }

    pub fn values(&self) -> &[f32; Solfege::COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Solfege, f32)> + '_ {
        Solfege::ALL.iter().map(move |&c| (c, self.get(c)))
    }

    /// Highest-scoring class; ties go to the earlier class.
    pub fn top(&self) -> (Solfege, f32) {
        let mut best = (Solfege::Do, self.0[0]);
        for (c, v) in self.iter().skip(1) {
            if v > best.1 {
                best = (c, v);
            }
        }
        best
    }

    /// Classes sorted by descending score.  The sort is stable, so equal
    /// scores keep Do…Ti order.
    pub fn ranked(&self) -> [(Solfege, f32); Solfege::COUNT] {
        let mut out = [(Solfege::Do, 0.0); Solfege::COUNT];
        for (slot, entry) in out.iter_mut().zip(self.iter()) {
            *slot = entry;
        }
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }

    /// Clamp every entry into `[0, 1]`; NaN becomes 0.
    pub fn clamp(&mut self) {
        for v in self.0.iter_mut() {
            *v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        }
    }

    pub fn clamped(mut self) -> Self {
        self.clamp();
        self
    }
}

impl From<[f32; Solfege::COUNT]> for ConfidenceVector {
    fn from(values: [f32; Solfege::COUNT]) -> Self {
        ConfidenceVector(values)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_scale_order() {
        for (i, c) in Solfege::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
            assert_eq!(Solfege::from_index(i), Some(*c));
        }
        assert_eq!(Solfege::from_index(7), None);
    }

    #[test]
    fn names_round_trip_case_insensitively() {
        assert_eq!(Solfege::from_name("sol"), Some(Solfege::Sol));
        assert_eq!(Solfege::from_name("TI"), Some(Solfege::Ti));
        assert_eq!(Solfege::from_name("so"), None);
        assert_eq!(Solfege::La.to_string(), "La");
    }

    #[test]
    fn top_prefers_earlier_class_on_tie() {
        let v = ConfidenceVector::new([0.1, 0.8, 0.2, 0.8, 0.0, 0.0, 0.0]);
        assert_eq!(v.top(), (Solfege::Re, 0.8));
    }

    #[test]
    fn ranked_is_descending_and_stable() {
        let v = ConfidenceVector::new([0.5, 0.9, 0.5, 0.0, 0.0, 0.0, 0.3]);
        let r = v.ranked();
        assert_eq!(r[0].0, Solfege::Re);
        assert_eq!(r[1].0, Solfege::Do);
        assert_eq!(r[2].0, Solfege::Mi);
        assert_eq!(r[3].0, Solfege::Ti);
    }

    #[test]
    fn clamp_bounds_and_nan() {
        let v = ConfidenceVector::new([-0.2, 1.4, f32::NAN, 0.5, 0.0, 1.0, 0.0]).clamped();
        assert_eq!(v.values(), &[0.0, 1.0, 0.0, 0.5, 0.0, 1.0, 0.0]);
    }
}

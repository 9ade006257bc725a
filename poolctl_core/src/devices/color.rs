//! Light color table and the pure pulse planner.
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::CommandError;

/// Number of programs the fixture cycles through.
pub const COLOR_COUNT: u8 = 17;

const COLOR_NAMES: [&str; COLOR_COUNT as usize] = [
    "Fast Color Wash",
    "Deep Blue Sea",
    "Royal Blue",
    "Afternoon Skies",
    "Aqua Green",
    "Emerald",
    "Cloud White",
    "Warm Red",
    "Flamingo",
    "Vivid Violet",
    "Sangria",
    "Slow Color Wash",
    "Blue/Cyan/White Fade",
    "Blue/Green/Magenta Fade",
    "Red/White/Blue Switch",
    "Fast Random Fade - Mardi Gras",
    "Fast Random Fade - Cool Cabaret",
];

/// Fixture program index, 0..=16. Index 0 is where a reset lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ColorIndex(u8);

impl ColorIndex {
    pub const FIRST: Self = Self(0);

    pub const fn new(index: u8) -> Option<Self> {
        if index < COLOR_COUNT { Some(Self(index)) } else { None }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn name(self) -> &'static str {
        COLOR_NAMES[self.0 as usize]
    }

    /// Advance pulses needed to get from `self` to `target`.
    pub const fn steps_to(self, target: Self) -> u8 {
        (target.0 + COLOR_COUNT - self.0) % COLOR_COUNT
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..COLOR_COUNT).map(Self)
    }
}

impl TryFrom<u8> for ColorIndex {
    type Error = CommandError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index).ok_or_else(|| {
            CommandError::InvalidParameter(format!("color index must be in 0..=16, got {index}"))
        })
    }
}

impl fmt::Display for ColorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRequest {
    Color(ColorIndex),
    Reset,
}

impl ColorRequest {
    /// Color the fixture shows once the request is realized.
    pub const fn target(self) -> ColorIndex {
        match self {
            Self::Color(c) => c,
            Self::Reset => ColorIndex::FIRST,
        }
    }
}

impl Serialize for ColorRequest {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Color(c) => s.serialize_u8(c.get()),
            Self::Reset => s.serialize_str("reset"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulse {
    /// Long OFF: fixture returns to color 0.
    Reset,
    /// Short OFF: fixture moves to the next color.
    Advance,
}

/// Pulses that take the fixture from `assumed` to the requested color.
///
/// Unknown position or an explicit reset starts with one reset pulse.
pub fn plan(assumed: Option<ColorIndex>, request: ColorRequest) -> Vec<Pulse> {
    let (mut pulses, from) = match (request, assumed) {
        (ColorRequest::Reset, _) => return vec![Pulse::Reset],
        (_, None) => (vec![Pulse::Reset], ColorIndex::FIRST),
        (_, Some(known)) => (Vec::new(), known),
    };
    let steps = from.steps_to(request.target());
    pulses.extend(std::iter::repeat_n(Pulse::Advance, usize::from(steps)));
    pulses
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(i: u8) -> ColorIndex {
        ColorIndex::new(i).unwrap()
    }

    #[test]
    fn names_cover_every_index() {
        assert_eq!(ColorIndex::all().count(), 17);
        assert_eq!(c(0).name(), "Fast Color Wash");
        assert_eq!(c(16).name(), "Fast Random Fade - Cool Cabaret");
        assert!(ColorIndex::new(17).is_none());
    }

    #[test]
    fn steps_wrap_modulo_count() {
        assert_eq!(c(3).steps_to(c(5)), 2);
        assert_eq!(c(5).steps_to(c(3)), 15);
        assert_eq!(c(7).steps_to(c(7)), 0);
    }

    #[test]
    fn reset_is_a_single_pulse_even_when_known() {
        assert_eq!(plan(Some(c(9)), ColorRequest::Reset), vec![Pulse::Reset]);
        assert_eq!(plan(None, ColorRequest::Reset), vec![Pulse::Reset]);
    }

    #[test]
    fn unknown_position_resets_first() {
        let p = plan(None, ColorRequest::Color(c(0)));
        assert_eq!(p, vec![Pulse::Reset]);
    }
}

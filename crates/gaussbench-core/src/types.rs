//! Core types shared across GaussBench.
//!
//! All quantities in the core are SI base units: metres for lengths and
//! positions, radians for angles. Prefixed units are a presentation concern.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Transverse orientation of a beam or of an optical element.
///
/// A beam is either `Spherical` (one waist shared by both transverse
/// directions) or `Ellipsoidal` (independent horizontal and vertical waists).
/// `Horizontal` and `Vertical` select one direction, both when reading a beam
/// and when restricting an element (e.g. a cylindrical lens) to one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Spherical,
    Horizontal,
    Vertical,
    Ellipsoidal,
}

impl Orientation {
    /// Storage slot used by per-direction beam parameters.
    ///
    /// `Spherical` and `Ellipsoidal` read the horizontal slot.
    pub(crate) fn slot(self) -> usize {
        match self {
            Orientation::Vertical => 1,
            _ => 0,
        }
    }

    /// Slots written by a mutator called with this orientation.
    pub(crate) fn slots(self) -> &'static [usize] {
        match self {
            Orientation::Horizontal => &[0],
            Orientation::Vertical => &[1],
            Orientation::Spherical | Orientation::Ellipsoidal => &[0, 1],
        }
    }

    /// The two independent transverse directions.
    pub const DIRECTIONS: [Orientation; 2] = [Orientation::Horizontal, Orientation::Vertical];
}

/// A point in the bench plane (m).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[inline]
pub fn sqr(x: f64) -> f64 {
    x * x
}

/// Wrap an angle into [0, 2π).
pub fn normalize_angle(angle: f64) -> f64 {
    angle.rem_euclid(TAU)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_normalize_angle_wraps_negative() {
        assert!((normalize_angle(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
        assert!((normalize_angle(5.0 * PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn test_orientation_slots() {
        assert_eq!(Orientation::Spherical.slots(), &[0, 1]);
        assert_eq!(Orientation::Vertical.slot(), 1);
        assert_eq!(Orientation::Ellipsoidal.slot(), 0);
    }
}

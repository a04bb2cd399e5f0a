//! Minimal 2-D bounding-box geometry.
//!
//! The engine only needs bounding boxes for two things: deciding which
//! quadrant an entry falls into, and aggregating the bounds of a subtree.
//! Anything beyond containment and union is out of scope.

use serde::{Deserialize, Serialize};

/// An axis-aligned 2-D bounding box.
///
/// Coordinates are plain `f64` values in whatever CRS the dataset uses; the
/// engine never interprets them beyond containment checks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope from its corner coordinates.
    ///
    /// Panics if `min > max` on either axis.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        assert!(
            min_x <= max_x && min_y <= max_y,
            "degenerate envelope: ({min_x}, {min_y}) .. ({max_x}, {max_y})"
        );
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// A point envelope (zero width and height).
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Width of the envelope.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the envelope.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns `true` if `other` is fully inside this envelope (borders
    /// included).
    pub fn contains(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// The smallest envelope covering both `self` and `other`.
    pub fn expanded_to_include(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Union of two optional envelopes.
pub fn union(a: Option<Envelope>, b: Option<Envelope>) -> Option<Envelope> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.expanded_to_include(&b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

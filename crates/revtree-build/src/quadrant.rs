//! Quadrant arithmetic for the quadtree clustering strategy.

use revtree_model::Envelope;

/// One quarter of a quadtree cell, in bucket-index order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    /// South-west: lower-left quarter, bucket 0.
    SW,
    /// North-west: upper-left quarter, bucket 1.
    NW,
    /// North-east: upper-right quarter, bucket 2.
    NE,
    /// South-east: lower-right quarter, bucket 3.
    SE,
}

impl Quadrant {
    /// All quadrants, indexed by their bucket number.
    pub const VALUES: [Quadrant; 4] = [Quadrant::SW, Quadrant::NW, Quadrant::NE, Quadrant::SE];

    /// The bucket index this quadrant maps to.
    pub fn bucket_index(self) -> u8 {
        match self {
            Quadrant::SW => 0,
            Quadrant::NW => 1,
            Quadrant::NE => 2,
            Quadrant::SE => 3,
        }
    }

    /// The sub-envelope this quadrant occupies within `parent`.
    pub fn slice(self, parent: &Envelope) -> Envelope {
        let mid_x = parent.min_x + parent.width() / 2.0;
        let mid_y = parent.min_y + parent.height() / 2.0;
        match self {
            Quadrant::SW => Envelope::new(parent.min_x, parent.min_y, mid_x, mid_y),
            Quadrant::NW => Envelope::new(parent.min_x, mid_y, mid_x, parent.max_y),
            Quadrant::NE => Envelope::new(mid_x, mid_y, parent.max_x, parent.max_y),
            Quadrant::SE => Envelope::new(mid_x, parent.min_y, parent.max_x, mid_y),
        }
    }
}

/// The quadrant path of an entry's bounds inside `max_bounds`, as bucket
/// indices from the root, up to `max_depth` levels deep.
///
/// Descent stops at the first cell where the bounds fit in no single
/// quadrant. Bounds that are absent or straddle the very first split come
/// back as an empty path, which marks the entry as non-promotable at every
/// depth.
pub fn quadrants_by_depth(
    bounds: Option<&Envelope>,
    max_bounds: &Envelope,
    max_depth: usize,
) -> Vec<u8> {
    let mut path = Vec::new();
    let Some(bounds) = bounds else {
        return path;
    };
    if !max_bounds.contains(bounds) {
        return path;
    }
    let mut cell = *max_bounds;
    'descend: for _ in 0..max_depth {
        for quadrant in Quadrant::VALUES {
            let slice = quadrant.slice(&cell);
            if slice.contains(bounds) {
                path.push(quadrant.bucket_index());
                cell = slice;
                continue 'descend;
            }
        }
        break;
    }
    path
}

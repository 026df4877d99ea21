//! Secondary motion behavior: recoil offsets, anti-detect jitter, and the
//! text formats the coordinate/offset lists are entered in.

use crate::Point;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A relative pointer offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

/// Cyclic sequence of post-action offsets. The index wraps after the last
/// element and advances once per application.
#[derive(Debug, Clone)]
pub struct RecoilPattern {
    offsets: Vec<Offset>,
    index: usize,
}

impl RecoilPattern {
    /// Returns `None` for an empty sequence.
    pub fn new(offsets: Vec<Offset>) -> Option<Self> {
        if offsets.is_empty() {
            None
        } else {
            Some(Self { offsets, index: 0 })
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Next offset in the cycle, advancing (and wrapping) the index.
    pub fn next(&mut self) -> Offset {
        let offset = self.offsets[self.index];
        self.index = (self.index + 1) % self.offsets.len();
        offset
    }
}

/// Independent per-action jitter draw: each axis gets a uniform integer from
/// `[-radius, radius]`. Not cumulative.
pub fn jitter_offset<R: Rng>(rng: &mut R, radius: i32) -> Offset {
    if radius <= 0 {
        return Offset::new(0, 0);
    }
    Offset::new(
        rng.gen_range(-radius..=radius),
        rng.gen_range(-radius..=radius),
    )
}

/// Parse "dx,dy" lines into offsets. Lines without a comma are skipped, as
/// are lines that fail to parse.
pub fn parse_offsets(text: &str) -> Vec<Offset> {
    parse_pairs(text)
        .into_iter()
        .map(|(dx, dy)| Offset::new(dx, dy))
        .collect()
}

/// Parse "x,y" lines into points.
pub fn parse_points(text: &str) -> Vec<Point> {
    parse_pairs(text)
        .into_iter()
        .map(|(x, y)| Point::new(x, y))
        .collect()
}

fn parse_pairs(text: &str) -> Vec<(i32, i32)> {
    text.lines()
        .filter_map(|line| {
            let (a, b) = line.split_once(',')?;
            Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
        })
        .collect()
}

use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Default slack for vertical adjacency and containment tests.
pub const VERTICAL_TOLERANCE: f32 = 2.0;

/// Default slack for horizontal centering and column alignment.
pub const HORIZONTAL_TOLERANCE: f32 = 10.0;

/// Rulings are drawn as rectangles thinner than this.
const RULING_THICKNESS: f32 = 2.0;

/// Horizontal rulings shorter than this are decoration, not grid lines.
const MIN_HORIZONTAL_RULING_WIDTH: f32 = 50.0;

/// Axis-aligned bounding box in page space (top-left origin, y grows down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BBox {
    /// Build a box, rejecting NaN/infinite coordinates and negative extents.
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Result<BBox, AuditError> {
        let coords = [x_min, y_min, x_max, y_max];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(AuditError::InvalidGeometry(format!(
                "non-finite coordinate in ({x_min}, {y_min}, {x_max}, {y_max})"
            )));
        }
        if x_max < x_min || y_max < y_min {
            return Err(AuditError::InvalidGeometry(format!(
                "negative extent in ({x_min}, {y_min}, {x_max}, {y_max})"
            )));
        }
        Ok(BBox {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn center_x(&self) -> f32 {
        (self.x_min + self.x_max) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y_min + self.y_max) / 2.0
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// True if `inner` lies inside `self` grown by `tolerance` on every side.
    pub fn contains(&self, inner: &BBox, tolerance: f32) -> bool {
        inner.x_min >= self.x_min - tolerance
            && inner.x_max <= self.x_max + tolerance
            && inner.y_min >= self.y_min - tolerance
            && inner.y_max <= self.y_max + tolerance
    }

    /// True if the vertical extents of the two boxes intersect.
    pub fn overlaps_vertically(&self, other: &BBox) -> bool {
        self.y_min <= other.y_max && other.y_min <= self.y_max
    }
}

/// True if `next` starts at or below the top of `current` and no more than
/// `max_gap` below its bottom edge.
pub fn vertically_adjacent(current: &BBox, next: &BBox, max_gap: f32) -> bool {
    next.y_min >= current.y_min && next.y_min - current.y_max <= max_gap
}

/// Midpoints within `tolerance` of each other.
pub fn horizontally_centered(a: &BBox, b: &BBox, tolerance: f32) -> bool {
    (a.center_x() - b.center_x()).abs() <= tolerance
}

/// Both left and right edges strictly within `tolerance`.
pub fn edges_aligned(a: &BBox, b: &BBox, tolerance: f32) -> bool {
    (a.x_min - b.x_min).abs() < tolerance && (a.x_max - b.x_max).abs() < tolerance
}

/// A positioned run of text: one word, or one reconciled line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// 1-based page number.
    pub page_number: usize,
    /// 1-based position within the page.
    pub index: usize,
    pub text: String,
    pub bbox: BBox,
}

impl Fragment {
    pub fn new(page_number: usize, index: usize, text: impl Into<String>, bbox: BBox) -> Self {
        Fragment {
            page_number,
            index,
            text: text.into(),
            bbox,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A thin drawn rectangle interpreted as a table grid line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruling {
    pub orientation: Orientation,
    pub bbox: BBox,
}

impl Ruling {
    /// Classify a drawn rectangle, or `None` when it is not a grid line.
    pub fn classify(rect: &BBox) -> Option<Ruling> {
        let orientation = if rect.height() < RULING_THICKNESS
            && rect.width() > MIN_HORIZONTAL_RULING_WIDTH
        {
            Orientation::Horizontal
        } else if rect.width() < RULING_THICKNESS {
            Orientation::Vertical
        } else {
            return None;
        };
        Some(Ruling {
            orientation,
            bbox: *rect,
        })
    }

    /// Position across the line: y for horizontal, x for vertical.
    pub fn position(&self) -> f32 {
        match self.orientation {
            Orientation::Horizontal => self.bbox.center_y(),
            Orientation::Vertical => self.bbox.center_x(),
        }
    }
}

/// True for rectangles that are neither grid lines nor degenerate.
pub fn is_cell(rect: &BBox) -> bool {
    rect.width() >= RULING_THICKNESS && rect.height() >= RULING_THICKNESS
}

/// Sort positions and collapse those within `tolerance` of the previous kept one.
pub fn dedup_positions(mut positions: Vec<f32>, tolerance: f32) -> Vec<f32> {
    positions.sort_by(|a, b| a.total_cmp(b));
    let mut out: Vec<f32> = Vec::with_capacity(positions.len());
    for p in positions {
        match out.last() {
            Some(last) if (p - last).abs() <= tolerance => {}
            _ => out.push(p),
        }
    }
    out
}

//! Column geometry from the table header.
//!
//! Strategies are tried in order and the first one that yields at least one
//! column wins: vertical rulings, then header cell rectangles.

use serde::Serialize;
use tracing::debug;

use crate::error::AuditError;
use crate::extraction::PageGeometry;
use crate::geometry::{dedup_positions, is_cell, Orientation};
use crate::model::Field;
use crate::table::HeaderBand;
use crate::Tolerances;

/// A configured field mapped to the half-open span `[x_min, x_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldColumn {
    pub field: Field,
    pub x_min: f32,
    pub x_max: f32,
}

impl FieldColumn {
    /// Whether `x` falls in this column, widened by `tolerance` on both sides.
    pub fn accepts(&self, x: f32, tolerance: f32) -> bool {
        self.x_min - tolerance <= x && x < self.x_max + tolerance
    }
}

/// One way of finding column boundaries in the header band.
pub trait ColumnStrategy {
    fn name(&self) -> &'static str;

    /// Sorted x positions of the column edges, or `None` when this strategy
    /// finds fewer than two edges.
    fn boundaries(
        &self,
        page: &PageGeometry,
        band: &HeaderBand,
        tolerances: &Tolerances,
    ) -> Option<Vec<f32>>;
}

/// Vertical rulings crossing the header band.
pub struct RulingColumns;

impl ColumnStrategy for RulingColumns {
    fn name(&self) -> &'static str {
        "vertical rulings"
    }

    fn boundaries(
        &self,
        page: &PageGeometry,
        band: &HeaderBand,
        tolerances: &Tolerances,
    ) -> Option<Vec<f32>> {
        let positions: Vec<f32> = page
            .rulings(Orientation::Vertical)
            .filter(|r| r.bbox.y_min <= band.y_max && r.bbox.y_max >= band.y_min)
            .map(|r| r.position())
            .collect();
        let edges = dedup_positions(positions, tolerances.vertical);
        (edges.len() >= 2).then_some(edges)
    }
}

/// Header cell rectangles, left to right. Each distinct left edge starts a
/// column; the rightmost cell edge closes the last one.
pub struct CellColumns;

impl ColumnStrategy for CellColumns {
    fn name(&self) -> &'static str {
        "header cells"
    }

    fn boundaries(
        &self,
        page: &PageGeometry,
        band: &HeaderBand,
        tolerances: &Tolerances,
    ) -> Option<Vec<f32>> {
        let cells: Vec<_> = page
            .rects
            .iter()
            .filter(|r| is_cell(r))
            .filter(|r| {
                r.y_min >= band.y_min - tolerances.vertical
                    && r.y_max <= band.y_max + tolerances.vertical
            })
            .collect();
        let right = cells.iter().map(|r| r.x_max).fold(f32::NEG_INFINITY, f32::max);
        let mut edges =
            dedup_positions(cells.iter().map(|r| r.x_min).collect(), tolerances.vertical);
        if edges.is_empty() {
            return None;
        }
        if right > edges[edges.len() - 1] + tolerances.vertical {
            edges.push(right);
        }
        (edges.len() >= 2).then_some(edges)
    }
}

const COLUMN_STRATEGIES: &[&dyn ColumnStrategy] = &[&RulingColumns, &CellColumns];

/// Resolve the document's column geometry from the header band.
pub fn identify_columns(
    page: &PageGeometry,
    band: &HeaderBand,
    fields: &[Field],
    tolerances: &Tolerances,
) -> Result<Vec<FieldColumn>, AuditError> {
    for strategy in COLUMN_STRATEGIES {
        if let Some(edges) = strategy.boundaries(page, band, tolerances) {
            let columns = columns_from_boundaries(&edges, fields);
            debug!(
                strategy = strategy.name(),
                columns = columns.len(),
                "identified table columns"
            );
            return Ok(columns);
        }
    }
    Err(AuditError::CannotIdentifyColumns)
}

/// Each adjacent pair of edges is one column, named by position from
/// `fields`; columns past the configured list become `unknown_k`.
pub fn columns_from_boundaries(edges: &[f32], fields: &[Field]) -> Vec<FieldColumn> {
    edges
        .windows(2)
        .enumerate()
        .map(|(i, pair)| FieldColumn {
            field: fields.get(i).copied().unwrap_or(Field::Unknown(i + 1)),
            x_min: pair[0],
            x_max: pair[1],
        })
        .collect()
}

/// The column for a cell starting at `x`. A column that strictly contains
/// `x` wins; otherwise the nearest left edge among the tolerance-widened
/// matches.
pub fn assign_column(columns: &[FieldColumn], x: f32, tolerance: f32) -> Option<&FieldColumn> {
    if let Some(column) = columns.iter().find(|c| c.accepts(x, 0.0)) {
        return Some(column);
    }
    columns
        .iter()
        .filter(|c| c.accepts(x, tolerance))
        .min_by(|a, b| (a.x_min - x).abs().total_cmp(&(b.x_min - x).abs()))
}

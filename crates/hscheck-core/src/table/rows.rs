//! Row geometry and cell text within one page segment of a block.

use tracing::debug;

use crate::extraction::PageGeometry;
use crate::geometry::{dedup_positions, is_cell, BBox, Fragment, Orientation};
use crate::model::Field;
use crate::parsing::normalize::normalize_cell_text;
use crate::table::columns::{assign_column, FieldColumn};
use crate::table::Segment;
use crate::Tolerances;

/// Fewer genuine cells than this on a ruled row means the table is drawn
/// with lines only.
const MIN_GENUINE_CELLS: usize = 5;

/// Vertical extent of one table row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowBand {
    pub y_min: f32,
    pub y_max: f32,
    /// Bounded by two horizontal rulings.
    pub ruled: bool,
}

pub trait RowStrategy {
    fn name(&self) -> &'static str;

    fn rows(&self, page: &PageGeometry, segment: &Segment, tolerances: &Tolerances)
        -> Option<Vec<RowBand>>;
}

/// Consecutive horizontal rulings inside the segment bound one row each.
pub struct RulingRows;

impl RowStrategy for RulingRows {
    fn name(&self) -> &'static str {
        "horizontal rulings"
    }

    fn rows(
        &self,
        page: &PageGeometry,
        segment: &Segment,
        tolerances: &Tolerances,
    ) -> Option<Vec<RowBand>> {
        let positions: Vec<f32> = page
            .rulings(Orientation::Horizontal)
            .map(|r| r.position())
            .filter(|y| *y >= segment.y_min && *y <= segment.y_max)
            .collect();
        let edges = dedup_positions(positions, tolerances.vertical);
        if edges.len() < 2 {
            return None;
        }
        Some(
            edges
                .windows(2)
                .map(|pair| RowBand {
                    y_min: pair[0],
                    y_max: pair[1],
                    ruled: true,
                })
                .collect(),
        )
    }
}

/// Cell rectangles clustered by top edge.
pub struct ClusteredRows;

impl RowStrategy for ClusteredRows {
    fn name(&self) -> &'static str {
        "clustered cells"
    }

    fn rows(
        &self,
        page: &PageGeometry,
        segment: &Segment,
        tolerances: &Tolerances,
    ) -> Option<Vec<RowBand>> {
        let mut cells: Vec<&BBox> = page
            .rects
            .iter()
            .filter(|r| is_cell(r) && r.y_min >= segment.y_min && r.y_max <= segment.y_max)
            .collect();
        if cells.is_empty() {
            return None;
        }
        cells.sort_by(|a, b| a.y_min.total_cmp(&b.y_min));

        let mut rows: Vec<RowBand> = Vec::new();
        let mut anchor = f32::NEG_INFINITY;
        for cell in cells {
            match rows.last_mut() {
                Some(row) if cell.y_min - anchor <= tolerances.merge_gap => {
                    row.y_max = row.y_max.max(cell.y_max);
                }
                _ => {
                    anchor = cell.y_min;
                    rows.push(RowBand {
                        y_min: cell.y_min,
                        y_max: cell.y_max,
                        ruled: false,
                    });
                }
            }
        }
        Some(rows)
    }
}

const ROW_STRATEGIES: &[&dyn RowStrategy] = &[&RulingRows, &ClusteredRows];

/// Row bands for a segment; empty when no strategy finds any.
pub fn detect_rows(
    page: &PageGeometry,
    segment: &Segment,
    tolerances: &Tolerances,
) -> Vec<RowBand> {
    for strategy in ROW_STRATEGIES {
        if let Some(rows) = strategy.rows(page, segment, tolerances) {
            debug!(
                page = page.page_number,
                strategy = strategy.name(),
                rows = rows.len(),
                "detected table rows"
            );
            return rows;
        }
    }
    Vec::new()
}

/// Cell boxes for a row: the drawn cells inside it, or one virtual cell per
/// column when a ruled row has too few drawn cells.
pub fn row_cells(
    page: &PageGeometry,
    row: &RowBand,
    columns: &[FieldColumn],
    tolerances: &Tolerances,
) -> Vec<BBox> {
    let genuine: Vec<BBox> = page
        .rects
        .iter()
        .filter(|r| is_cell(r))
        .filter(|r| {
            r.y_min >= row.y_min - tolerances.vertical && r.y_max <= row.y_max + tolerances.vertical
        })
        .copied()
        .collect();

    if genuine.len() < MIN_GENUINE_CELLS && row.ruled {
        return columns
            .iter()
            .map(|c| BBox {
                x_min: c.x_min,
                y_min: row.y_min,
                x_max: c.x_max,
                y_max: row.y_max,
            })
            .collect();
    }
    genuine
}

/// Text of the words inside `cell`, read top to bottom then left to right.
pub fn cell_text(words: &[Fragment], cell: &BBox, tolerances: &Tolerances) -> String {
    let mut inside: Vec<&Fragment> = words
        .iter()
        .filter(|w| cell.contains(&w.bbox, tolerances.vertical))
        .collect();
    inside.sort_by(|a, b| a.bbox.y_min.total_cmp(&b.bbox.y_min));

    let mut lines: Vec<Vec<&Fragment>> = Vec::new();
    for word in inside {
        match lines.last_mut() {
            Some(line) if (word.bbox.y_min - line[0].bbox.y_min).abs() <= tolerances.vertical => {
                line.push(word)
            }
            _ => lines.push(vec![word]),
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.bbox.x_min.total_cmp(&b.bbox.x_min));
    }
    let ordered: Vec<&str> = lines.iter().flatten().map(|w| w.text.as_str()).collect();
    normalize_cell_text(&ordered)
}

/// Field/text pairs for every non-empty cell of every row in `segment`, in
/// row order.
pub fn extract_segment_rows(
    page: &PageGeometry,
    segment: &Segment,
    columns: &[FieldColumn],
    tolerances: &Tolerances,
) -> Vec<Vec<(Field, String)>> {
    detect_rows(page, segment, tolerances)
        .iter()
        .map(|row| {
            let mut cells = row_cells(page, row, columns, tolerances);
            cells.sort_by(|a, b| a.x_min.total_cmp(&b.x_min));
            cells
                .iter()
                .filter_map(|cell| {
                    let text = cell_text(&page.words, cell, tolerances);
                    if text.is_empty() {
                        return None;
                    }
                    let column = assign_column(columns, cell.x_min, tolerances.horizontal)?;
                    Some((column.field, text))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::columns::columns_from_boundaries;

    fn bbox(x0: f32, y0: f32, x1: f32, y1: f32) -> BBox {
        BBox::new(x0, y0, x1, y1).unwrap()
    }

    fn word(text: &str, x0: f32, y0: f32) -> Fragment {
        Fragment::new(1, 0, text, bbox(x0, y0, x0 + 30.0, y0 + 8.0))
    }

    fn segment() -> Segment {
        Segment {
            page_number: 1,
            y_min: 100.0,
            y_max: 300.0,
        }
    }

    fn horizontal(y: f32) -> BBox {
        bbox(20.0, y - 0.25, 260.0, y + 0.25)
    }

    #[test]
    fn test_ruled_rows_from_consecutive_rulings() {
        let page = PageGeometry {
            page_number: 1,
            rects: vec![
                horizontal(130.0),
                horizontal(150.0),
                horizontal(151.0),
                horizontal(170.0),
                horizontal(400.0),
            ],
            ..Default::default()
        };
        let rows = detect_rows(&page, &segment(), &Tolerances::default());
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].y_min, rows[0].y_max), (130.0, 150.0));
        assert!(rows.iter().all(|r| r.ruled));
    }

    #[test]
    fn test_rows_cluster_cells_without_rulings() {
        let page = PageGeometry {
            page_number: 1,
            rects: vec![
                bbox(20.0, 130.0, 100.0, 148.0),
                bbox(100.0, 131.0, 180.0, 149.0),
                bbox(20.0, 150.0, 100.0, 168.0),
            ],
            ..Default::default()
        };
        let rows = detect_rows(&page, &segment(), &Tolerances::default());
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].y_min, rows[0].y_max), (130.0, 149.0));
        assert!(!rows[0].ruled);
    }

    #[test]
    fn test_virtual_cells_for_line_only_tables() {
        let columns = columns_from_boundaries(
            &[20.0, 100.0, 180.0],
            &[Field::FinalCustomer, Field::ReferenceCode],
        );
        let page = PageGeometry::default();
        let row = RowBand {
            y_min: 130.0,
            y_max: 150.0,
            ruled: true,
        };
        let cells = row_cells(&page, &row, &columns, &Tolerances::default());
        assert_eq!(
            cells,
            vec![bbox(20.0, 130.0, 100.0, 150.0), bbox(100.0, 130.0, 180.0, 150.0)]
        );

        let unruled = RowBand {
            ruled: false,
            ..row
        };
        assert!(row_cells(&page, &unruled, &columns, &Tolerances::default()).is_empty());
    }

    #[test]
    fn test_cell_text_reading_order_and_rejoin() {
        let words = vec![
            word("0012759", 40.0, 142.0),
            word("D01ACMP", 22.0, 132.0),
            word("outside", 300.0, 132.0),
        ];
        let cell = bbox(20.0, 130.0, 100.0, 150.0);
        assert_eq!(cell_text(&words, &cell, &Tolerances::default()), "D01ACMP0012759");

        let words = vec![
            word("TRADING", 60.0, 133.0),
            word("ACME", 22.0, 132.0),
            word("CO", 22.0, 141.0),
        ];
        assert_eq!(cell_text(&words, &cell, &Tolerances::default()), "ACME TRADING CO");
    }

    #[test]
    fn test_extract_segment_rows_assigns_fields() {
        let columns = columns_from_boundaries(
            &[20.0, 100.0, 180.0],
            &[Field::FinalCustomer, Field::ReferenceCode],
        );
        let page = PageGeometry {
            page_number: 1,
            words: vec![word("ACME", 25.0, 136.0), word("U11-001", 105.0, 136.0)],
            rects: vec![horizontal(130.0), horizontal(150.0)],
            ..Default::default()
        };
        let rows = extract_segment_rows(&page, &segment(), &columns, &Tolerances::default());
        assert_eq!(
            rows,
            vec![vec![
                (Field::FinalCustomer, "ACME".to_string()),
                (Field::ReferenceCode, "U11-001".to_string()),
            ]]
        );
    }
}

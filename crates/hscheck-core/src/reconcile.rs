//! Line reconciliation: repair segmentation artifacts of the text provider
//! before any business parsing.
//!
//! The passes run exactly once, in this order: height split, merge, width
//! split. Later stages depend on that order.

use serde::Serialize;
use tracing::{debug, info};

use crate::geometry::{edges_aligned, horizontally_centered, vertically_adjacent, BBox, Fragment};
use crate::parsing::normalize::contains_marker;
use crate::parsing::DESCRIPTION_MARKER;
use crate::Tolerances;

/// Lines taller than this are two stacked fields measured as one.
const TALL_LINE_HEIGHT: f32 = 15.0;

/// Width window for lines that are two adjacent cells measured as one.
const WIDE_LINE_MIN: f32 = 100.0;
const WIDE_LINE_MAX: f32 = 200.0;

/// Run all reconciliation passes.
pub fn reconcile(lines: &[Fragment], tolerances: &Tolerances) -> Vec<Fragment> {
    let split = split_by_height(lines);
    let merged = merge_adjacent(&split, tolerances);
    split_by_width(&merged)
}

/// Each intermediate line set, for debugging the reconciler.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileStages {
    pub raw: Vec<Fragment>,
    pub truncated: Vec<Fragment>,
    pub height_split: Vec<Fragment>,
    pub merged: Vec<Fragment>,
    pub width_split: Vec<Fragment>,
}

pub fn reconcile_stages(
    raw: Vec<Fragment>,
    truncate_marker: Option<&str>,
    tolerances: &Tolerances,
) -> ReconcileStages {
    let truncated = match truncate_marker {
        Some(marker) => truncate_at_marker(&raw, marker),
        None => raw.clone(),
    };
    let height_split = split_by_height(&truncated);
    let merged = merge_adjacent(&height_split, tolerances);
    let width_split = split_by_width(&merged);
    ReconcileStages {
        raw,
        truncated,
        height_split,
        merged,
        width_split,
    }
}

/// Drop the first line containing `marker` (case-insensitive) and all after it.
pub fn truncate_at_marker(lines: &[Fragment], marker: &str) -> Vec<Fragment> {
    if marker.trim().is_empty() {
        return lines.to_vec();
    }
    match lines.iter().position(|l| contains_marker(&l.text, marker)) {
        Some(i) => {
            let line = &lines[i];
            info!(
                page = line.page_number,
                index = line.index,
                "truncated at line {}: '{}'",
                i + 1,
                line.text.chars().take(50).collect::<String>()
            );
            lines[..i].to_vec()
        }
        None => lines.to_vec(),
    }
}

/// Split lines taller than a normal line at their first space.
///
/// Both halves keep the original y-span; the x-span is partitioned by
/// character count.
pub fn split_by_height(lines: &[Fragment]) -> Vec<Fragment> {
    let mut out = Vec::with_capacity(lines.len());
    let mut split_count = 0;

    for line in lines {
        if line.bbox.height() > TALL_LINE_HEIGHT {
            if let Some((left, right)) = line.text.split_once(' ') {
                if let Some(halves) = split_fragment(line, left, right) {
                    debug!(
                        page = line.page_number,
                        index = line.index,
                        height = line.bbox.height(),
                        "split tall line into 2"
                    );
                    split_count += 1;
                    out.extend(halves);
                    continue;
                }
            }
        }
        out.push(line.clone());
    }

    if split_count > 0 {
        info!("split {split_count} abnormal height line(s)");
    }
    renumber(out)
}

/// Split lines wider than one cell at their last space.
///
/// Lines carrying the goods description marker are left alone so the code
/// embedded in them survives.
pub fn split_by_width(lines: &[Fragment]) -> Vec<Fragment> {
    let mut out = Vec::with_capacity(lines.len());
    let mut split_count = 0;

    for line in lines {
        let width = line.bbox.width();
        if width > WIDE_LINE_MIN
            && width < WIDE_LINE_MAX
            && !contains_marker(&line.text, DESCRIPTION_MARKER)
        {
            if let Some((left, right)) = line.text.rsplit_once(' ') {
                if let Some(halves) = split_fragment(line, left, right) {
                    debug!(
                        page = line.page_number,
                        index = line.index,
                        width,
                        "split wide line into 2"
                    );
                    split_count += 1;
                    out.extend(halves);
                    continue;
                }
            }
        }
        out.push(line.clone());
    }

    if split_count > 0 {
        info!("split {split_count} wide line(s)");
    }
    renumber(out)
}

/// Greedily merge each line with the following lines that continue it.
///
/// A continuation sits on the same page, starts within the merge gap below
/// the current bottom edge, and is either centered on the current line or
/// has both edges roughly aligned with it. Text is joined without a
/// separator.
pub fn merge_adjacent(lines: &[Fragment], tolerances: &Tolerances) -> Vec<Fragment> {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let mut current = lines[i].clone();
        current.text = current.text.trim().to_string();
        let mut j = i + 1;

        while let Some(next) = lines.get(j) {
            if next.page_number != current.page_number {
                break;
            }
            let adjacent = vertically_adjacent(&current.bbox, &next.bbox, tolerances.merge_gap);
            let centered = horizontally_centered(&current.bbox, &next.bbox, tolerances.horizontal);
            let aligned = edges_aligned(&current.bbox, &next.bbox, tolerances.legacy_alignment);
            if !(adjacent && (centered || aligned)) {
                break;
            }
            debug!(
                page = current.page_number,
                "merged '{}' + '{}'",
                current.text,
                next.text.trim()
            );
            current.text.push_str(next.text.trim());
            current.bbox = current.bbox.union(&next.bbox);
            j += 1;
        }

        out.push(current);
        i = j;
    }

    if out.len() < lines.len() {
        info!("merged {} line(s)", lines.len() - out.len());
    }
    renumber(out)
}

/// Renumber `index` sequentially from 1 within each page.
pub fn renumber(mut lines: Vec<Fragment>) -> Vec<Fragment> {
    let mut page = 0;
    let mut counter = 0;
    for line in &mut lines {
        if line.page_number != page {
            page = line.page_number;
            counter = 0;
        }
        counter += 1;
        line.index = counter;
    }
    lines
}

/// Estimate the x coordinate separating two halves of a split line,
/// weighting the span by each half's character count.
pub fn split_point(x_min: f32, x_max: f32, left_chars: usize, right_chars: usize) -> f32 {
    let total = left_chars + right_chars;
    if total == 0 {
        return (x_min + x_max) / 2.0;
    }
    x_min + (x_max - x_min) * (left_chars as f32 / total as f32)
}

fn split_fragment(line: &Fragment, left: &str, right: &str) -> Option<[Fragment; 2]> {
    let left = left.trim();
    let right = right.trim();
    if left.is_empty() || right.is_empty() {
        return None;
    }
    let mid = split_point(
        line.bbox.x_min,
        line.bbox.x_max,
        left.chars().count(),
        right.chars().count(),
    );
    let left_box = BBox {
        x_max: mid,
        ..line.bbox
    };
    let right_box = BBox {
        x_min: mid,
        ..line.bbox
    };
    Some([
        Fragment::new(line.page_number, line.index, left, left_box),
        Fragment::new(line.page_number, line.index, right, right_box),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(page: usize, text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> Fragment {
        Fragment::new(page, 0, text, BBox::new(x0, y0, x1, y1).unwrap())
    }

    fn texts(lines: &[Fragment]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_merge_wrapped_code() {
        let lines = vec![
            frag(1, "YCV5-43GTLA-1-", 100.0, 200.0, 160.0, 210.0),
            frag(1, "U3", 120.0, 211.0, 135.0, 221.0),
        ];
        let merged = merge_adjacent(&lines, &Tolerances::default());
        assert_eq!(texts(&merged), vec!["YCV5-43GTLA-1-U3"]);
        assert_eq!(merged[0].bbox, BBox::new(100.0, 200.0, 160.0, 221.0).unwrap());
        assert_eq!(merged[0].index, 1);
    }

    #[test]
    fn test_merge_is_greedy() {
        let lines = vec![
            frag(1, "AB", 100.0, 100.0, 140.0, 110.0),
            frag(1, "CD", 100.0, 112.0, 140.0, 122.0),
            frag(1, "EF", 100.0, 124.0, 140.0, 134.0),
            frag(1, "far", 100.0, 160.0, 140.0, 170.0),
        ];
        let merged = merge_adjacent(&lines, &Tolerances::default());
        assert_eq!(texts(&merged), vec!["ABCDEF", "far"]);
        assert_eq!(merged[1].index, 2);
    }

    #[test]
    fn test_merge_respects_page_and_gap() {
        let lines = vec![
            frag(1, "A", 100.0, 100.0, 140.0, 110.0),
            frag(2, "B", 100.0, 110.0, 140.0, 120.0),
            frag(2, "C", 100.0, 124.0, 140.0, 134.0),
        ];
        let merged = merge_adjacent(&lines, &Tolerances::default());
        assert_eq!(texts(&merged), vec!["A", "B", "C"]);
        assert_eq!(merged[1].index, 1);
        assert_eq!(merged[2].index, 2);
    }

    #[test]
    fn test_cells_on_the_same_row_do_not_merge() {
        let lines = vec![
            frag(1, "ACME", 25.0, 140.0, 65.0, 150.0),
            frag(1, "U11-001", 105.0, 140.0, 145.0, 150.0),
        ];
        let merged = merge_adjacent(&lines, &Tolerances::default());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_split_by_height_at_first_space() {
        let lines = vec![frag(1, "10270065043 D01ACMP0012759", 100.0, 321.0, 225.0, 339.0)];
        let split = split_by_height(&lines);
        assert_eq!(texts(&split), vec!["10270065043", "D01ACMP0012759"]);
        // 11 vs 14 characters over 125 units.
        assert!((split[0].bbox.x_max - 155.0).abs() < 1e-3);
        assert_eq!(split[1].bbox.x_min, split[0].bbox.x_max);
        assert_eq!(split[0].bbox.y_min, 321.0);
        assert_eq!(split[1].bbox.y_max, 339.0);
        assert_eq!((split[0].index, split[1].index), (1, 2));
    }

    #[test]
    fn test_split_by_width_at_last_space() {
        let lines = vec![frag(1, "AIFI (GOODMAN) 10205389943", 35.0, 100.0, 147.0, 110.0)];
        let split = split_by_width(&lines);
        assert_eq!(texts(&split), vec!["AIFI (GOODMAN)", "10205389943"]);
    }

    #[test]
    fn test_split_by_width_exempts_description_line() {
        let lines = vec![frag(1, "Description of goods: VALVE", 20.0, 100.0, 170.0, 110.0)];
        assert_eq!(split_by_width(&lines).len(), 1);
    }

    #[test]
    fn test_split_by_width_leaves_captions_alone() {
        let lines = vec![frag(1, "A long caption line here", 20.0, 100.0, 260.0, 110.0)];
        assert_eq!(split_by_width(&lines).len(), 1);
    }

    #[test]
    fn test_split_point_is_proportional() {
        assert_eq!(split_point(0.0, 100.0, 1, 3), 25.0);
        assert_eq!(split_point(10.0, 20.0, 0, 0), 15.0);
    }

    #[test]
    fn test_reconcile_is_stable_on_normalized_lines() {
        let lines = renumber(vec![
            frag(1, "SHIPPED TO/BY", 20.0, 40.0, 90.0, 50.0),
            frag(1, "ACME", 25.0, 140.0, 65.0, 150.0),
            frag(1, "U11-001", 105.0, 140.0, 145.0, 150.0),
            frag(1, "SUB TOTAL", 20.0, 180.0, 80.0, 190.0),
            frag(2, "TOTAL:", 20.0, 40.0, 60.0, 50.0),
        ]);
        let once = reconcile(&lines, &Tolerances::default());
        assert_eq!(once, lines);
        assert_eq!(reconcile(&once, &Tolerances::default()), once);
    }

    #[test]
    fn test_truncate_at_marker() {
        let lines = vec![
            frag(1, "1,800.00", 20.0, 10.0, 60.0, 20.0),
            frag(1, "say u.s.dollars one thousand", 20.0, 30.0, 90.0, 40.0),
            frag(1, "Bank details", 20.0, 50.0, 90.0, 60.0),
        ];
        let truncated = truncate_at_marker(&lines, "SAY U.S.DOLLARS");
        assert_eq!(texts(&truncated), vec!["1,800.00"]);
        assert_eq!(truncate_at_marker(&lines, "").len(), 3);
    }
}

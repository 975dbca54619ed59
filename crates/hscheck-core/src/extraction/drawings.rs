//! Drawn rectangles read from page content streams.
//!
//! Table rulings and cell backgrounds are drawn either as rectangles (`re`)
//! or as stroked line segments (`m`/`l` painted with `S`). Both end up as
//! boxes here; a stroked segment becomes a hairline box around it.
//! Positions are mapped through the current transformation matrix, Form
//! XObjects are followed, and everything is flipped to a top-left origin
//! so it lines up with the text geometry.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::AuditError;
use crate::geometry::BBox;

/// Thickness given to a stroked segment, well under the ruling threshold.
const STROKED_RULING_WIDTH: f32 = 0.5;

/// A segment whose extent on both axes exceeds this is diagonal, not a
/// grid line.
const AXIS_SLACK: f32 = 1.0;

/// Form XObjects nested deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 8;

/// Affine transform `[a b c d e f]` in PDF operand order.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// `self` applied first, then `outer`.
    fn then(&self, outer: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = outer.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }
}

type Point = (f32, f32);

/// Straight segments of the path under construction, in device space.
#[derive(Debug, Default)]
struct Path {
    segments: Vec<(Point, Point)>,
    start: Option<Point>,
    current: Option<Point>,
}

impl Path {
    fn move_to(&mut self, p: Point) {
        self.start = Some(p);
        self.current = Some(p);
    }

    fn line_to(&mut self, p: Point) {
        if let Some(c) = self.current {
            self.segments.push((c, p));
        }
        self.current = Some(p);
    }

    fn close(&mut self) {
        if let (Some(c), Some(s)) = (self.current, self.start) {
            if c != s {
                self.segments.push((c, s));
            }
        }
        self.current = self.start;
    }

    fn clear(&mut self) {
        *self = Path::default();
    }
}

/// Rectangles for every page of the document, in page order.
pub fn extract_rects(pdf_bytes: &[u8]) -> Result<Vec<Vec<BBox>>, AuditError> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| AuditError::Extraction(format!("failed to parse PDF: {e}")))?;

    let mut out = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let height = page_height(&doc, page_id).unwrap_or(0.0);
        let content = doc
            .get_page_content(page_id)
            .map_err(|e| AuditError::Extraction(format!("page {page_number}: {e}")))?;
        let content = Content::decode(&content)
            .map_err(|e| AuditError::Extraction(format!("page {page_number}: {e}")))?;

        let mut walker = Walker {
            doc: Some(&doc),
            page_height: height,
            rects: Vec::new(),
        };
        let resources = page_resources(&doc, page_id);
        walker.walk(&content.operations, resources, Matrix::IDENTITY, 0);
        debug!(page = page_number, rects = walker.rects.len(), "read drawn rectangles");
        out.push(walker.rects);
    }
    Ok(out)
}

/// Walk a content stream and collect drawn boxes in top-left coordinates.
/// Form XObjects need the document and are skipped here.
pub fn rects_from_operations(operations: &[Operation], page_height: f32) -> Vec<BBox> {
    let mut walker = Walker {
        doc: None,
        page_height,
        rects: Vec::new(),
    };
    walker.walk(operations, None, Matrix::IDENTITY, 0);
    walker.rects
}

struct Walker<'a> {
    doc: Option<&'a Document>,
    page_height: f32,
    rects: Vec<BBox>,
}

impl<'a> Walker<'a> {
    fn walk(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        base: Matrix,
        depth: usize,
    ) {
        let mut ctm = base;
        let mut saved: Vec<Matrix> = Vec::new();
        let mut path = Path::default();

        for op in operations {
            match op.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => ctm = saved.pop().unwrap_or(base),
                "cm" => {
                    if let Some(m) = numbers::<6>(&op.operands) {
                        ctm = Matrix(m).then(&ctm);
                    }
                }
                "re" => {
                    let Some([x, y, w, h]) = numbers::<4>(&op.operands) else {
                        continue;
                    };
                    let corners = [
                        ctm.apply(x, y),
                        ctm.apply(x + w, y),
                        ctm.apply(x, y + h),
                        ctm.apply(x + w, y + h),
                    ];
                    self.push_box(&corners);
                }
                "m" => {
                    if let Some([x, y]) = numbers::<2>(&op.operands) {
                        path.move_to(ctm.apply(x, y));
                    }
                }
                "l" => {
                    if let Some([x, y]) = numbers::<2>(&op.operands) {
                        path.line_to(ctm.apply(x, y));
                    }
                }
                "h" => path.close(),
                "S" | "B" | "B*" => {
                    self.push_segments(&path);
                    path.clear();
                }
                "s" | "b" | "b*" => {
                    path.close();
                    self.push_segments(&path);
                    path.clear();
                }
                "n" | "f" | "F" | "f*" => path.clear(),
                "Do" => {
                    if depth < MAX_FORM_DEPTH {
                        if let Some(Object::Name(name)) = op.operands.first() {
                            self.walk_form(name, resources, ctm, depth);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_form(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
        depth: usize,
    ) {
        let Some(doc) = self.doc else {
            return;
        };
        let Some(stream) = resources
            .and_then(|r| resolve_dict(doc, r.get(b"XObject").ok()?))
            .and_then(|x| x.get(name).ok())
            .and_then(|obj| resolve(doc, obj).as_stream().ok())
        else {
            return;
        };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Form") {
            return;
        }

        let Some(content) = form_content(stream) else {
            debug!("unreadable form content stream");
            return;
        };
        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|m| numbers::<6>(m))
            .map(Matrix)
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(doc, r))
            .or(resources);
        self.walk(
            &content.operations,
            form_resources,
            form_matrix.then(&ctm),
            depth + 1,
        );
    }

    /// Bounding box of device-space points, flipped to top-left.
    fn push_box(&mut self, points: &[Point]) {
        let x_min = points.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
        let x_max = points.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
        let y_min = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let y_max = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
        let h = self.page_height;
        if let Ok(bbox) = BBox::new(x_min, h - y_max, x_max, h - y_min) {
            self.rects.push(bbox);
        }
    }

    /// One hairline box per axis-aligned stroked segment.
    fn push_segments(&mut self, path: &Path) {
        for &((x0, y0), (x1, y1)) in &path.segments {
            let dx = (x1 - x0).abs();
            let dy = (y1 - y0).abs();
            if dx > AXIS_SLACK && dy > AXIS_SLACK {
                continue;
            }
            let pad_x = (STROKED_RULING_WIDTH - dx).max(0.0) / 2.0;
            let pad_y = (STROKED_RULING_WIDTH - dy).max(0.0) / 2.0;
            self.push_box(&[
                (x0.min(x1) - pad_x, y0.min(y1) - pad_y),
                (x0.max(x1) + pad_x, y0.max(y1) + pad_y),
            ]);
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).as_dict().ok()
}

fn form_content(stream: &Stream) -> Option<Content> {
    let bytes = if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content().ok()?
    } else {
        stream.content.clone()
    };
    Content::decode(&bytes).ok()
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    if operands.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(operands) {
        *slot = match obj {
            Object::Integer(i) => *i as f32,
            Object::Real(f) => *f as f32,
            _ => return None,
        };
    }
    Some(out)
}

/// Walk up the page tree until `key` is found.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page_id;
    loop {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
}

/// MediaBox height, inherited through the page tree when needed.
fn page_height(doc: &Document, page_id: ObjectId) -> Option<f32> {
    let media_box = resolve(doc, inherited(doc, page_id, b"MediaBox")?)
        .as_array()
        .ok()?;
    let [_, y0, _, y1] = numbers::<4>(media_box)?;
    Some((y1 - y0).abs())
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    resolve_dict(doc, inherited(doc, page_id, b"Resources")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Orientation, Ruling};

    fn op(operator: &str, operands: &[f32]) -> Operation {
        Operation::new(
            operator,
            operands.iter().map(|v| Object::Real(*v)).collect(),
        )
    }

    #[test]
    fn test_rect_is_flipped_to_top_left_origin() {
        let ops = vec![op("re", &[20.0, 700.0, 560.0, 0.5])];
        let rects = rects_from_operations(&ops, 800.0);
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].x_min, 20.0);
        assert_eq!(rects[0].x_max, 580.0);
        assert!((rects[0].y_min - 99.5).abs() < 1e-3);
        assert!((rects[0].y_max - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_ctm_translation_and_restore() {
        let ops = vec![
            op("q", &[]),
            op("cm", &[1.0, 0.0, 0.0, 1.0, 10.0, 20.0]),
            op("re", &[0.0, 0.0, 5.0, 5.0]),
            op("Q", &[]),
            op("re", &[0.0, 0.0, 5.0, 5.0]),
        ];
        let rects = rects_from_operations(&ops, 100.0);
        assert_eq!(rects.len(), 2);
        assert_eq!((rects[0].x_min, rects[0].y_max), (10.0, 80.0));
        assert_eq!((rects[1].x_min, rects[1].y_max), (0.0, 100.0));
    }

    #[test]
    fn test_ctm_scale_composes() {
        let ops = vec![
            op("cm", &[2.0, 0.0, 0.0, 2.0, 0.0, 0.0]),
            op("cm", &[1.0, 0.0, 0.0, 1.0, 5.0, 0.0]),
            op("re", &[0.0, 0.0, 1.0, 1.0]),
        ];
        // Inner translation is scaled by the outer matrix.
        let rects = rects_from_operations(&ops, 10.0);
        assert_eq!((rects[0].x_min, rects[0].x_max), (10.0, 12.0));
    }

    #[test]
    fn test_stroked_segments_become_rulings() {
        let ops = vec![
            op("m", &[100.0, 700.0]),
            op("l", &[100.0, 600.0]),
            op("S", &[]),
            op("m", &[20.0, 650.0]),
            op("l", &[580.0, 650.0]),
            op("S", &[]),
        ];
        let rects = rects_from_operations(&ops, 800.0);
        assert_eq!(rects.len(), 2);

        let vertical = Ruling::classify(&rects[0]).unwrap();
        assert_eq!(vertical.orientation, Orientation::Vertical);
        assert!((vertical.position() - 100.0).abs() < 1e-3);
        assert!((rects[0].y_min - 100.0).abs() < 1e-3);
        assert!((rects[0].y_max - 200.0).abs() < 1e-3);

        let horizontal = Ruling::classify(&rects[1]).unwrap();
        assert_eq!(horizontal.orientation, Orientation::Horizontal);
        assert!((horizontal.position() - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_closed_stroke_emits_every_side() {
        let ops = vec![
            op("m", &[10.0, 10.0]),
            op("l", &[90.0, 10.0]),
            op("l", &[90.0, 50.0]),
            op("l", &[10.0, 50.0]),
            op("s", &[]),
        ];
        assert_eq!(rects_from_operations(&ops, 100.0).len(), 4);
    }

    #[test]
    fn test_unstroked_and_diagonal_paths_are_ignored() {
        let ops = vec![
            op("m", &[10.0, 10.0]),
            op("l", &[90.0, 10.0]),
            op("n", &[]),
            op("m", &[10.0, 10.0]),
            op("l", &[90.0, 60.0]),
            op("S", &[]),
        ];
        assert!(rects_from_operations(&ops, 100.0).is_empty());
    }

    #[test]
    fn test_rulings_inside_form_xobjects() {
        use lopdf::{dictionary, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let form = Content {
            operations: vec![op("m", &[20.0, 650.0]), op("l", &[580.0, 650.0]), op("S", &[])],
        };
        let form_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 600.into(), 800.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 10.into()],
            },
            form.encode().unwrap(),
        )));
        let content_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            b"q /Fm1 Do Q".to_vec(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Fm1" => form_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
                "MediaBox" => vec![0.into(), 0.into(), 600.into(), 800.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let pages = extract_rects(&bytes).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].len(), 1);
        // Form matrix lifts the line by 10; the page height comes from the parent.
        assert!((pages[0][0].center_y() - 140.0).abs() < 1e-3);
    }

    #[test]
    fn test_malformed_operands_are_skipped() {
        let ops = vec![Operation::new("re", vec![Object::Name(b"x".to_vec())])];
        assert!(rects_from_operations(&ops, 100.0).is_empty());
    }
}

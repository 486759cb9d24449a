use crate::ConvertOptions;
use crate::element::{Element, ElementKind};
use crate::path::{PathCommand, flatten, parse_with};
use crate::report::{ConversionReport, SkipReason};
use crate::text::{TextAnchor, TextElement, TextPathElement, TextScan};
use crate::transform::Matrix;
use crate::types::Point;
use tracing::debug;

const EPS: f64 = 1e-9;
/// Estimated glyph advance as a fraction of the font size.
const ADVANCE_RATIO: f64 = 0.6;
const CURVE_SAMPLES: usize = 16;

pub const BEZIER_KNOTS: [f64; 8] = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

/// A sketch entity in sketch coordinates (scaled, Y up).
#[derive(Debug, Clone, PartialEq)]
pub enum SketchEntity {
    LineSegment {
        id: String,
        midpoint: Point,
        direction: Point,
        start_param: f64,
        end_param: f64,
        is_construction: bool,
    },
    Circle {
        id: String,
        center: Point,
        radius: f64,
        is_construction: bool,
    },
    Ellipse {
        id: String,
        center: Point,
        major_radius: f64,
        minor_radius: f64,
        major_direction: Point,
        is_construction: bool,
    },
    Bezier {
        id: String,
        control_points: [Point; 4],
        knots: [f64; 8],
        is_construction: bool,
    },
    Text {
        id: String,
        baseline_start: Point,
        baseline_direction: Point,
        ascent: f64,
        content: String,
        font: String,
    },
}

impl SketchEntity {
    /// Midpoint, unit direction and symmetric trim parameters. A segment
    /// shorter than 1e-9 points along +x.
    pub fn line(id: String, start: Point, end: Point, is_construction: bool) -> Self {
        let len = start.distance(end);
        let direction = (end - start)
            .normalized(EPS)
            .unwrap_or(Point::new(1.0, 0.0));
        SketchEntity::LineSegment {
            id,
            midpoint: start.midpoint(end),
            direction,
            start_param: -len / 2.0,
            end_param: len / 2.0,
            is_construction,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SketchEntity::LineSegment { id, .. }
            | SketchEntity::Circle { id, .. }
            | SketchEntity::Ellipse { id, .. }
            | SketchEntity::Bezier { id, .. }
            | SketchEntity::Text { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SketchEntity::LineSegment { .. } => "line",
            SketchEntity::Circle { .. } => "circle",
            SketchEntity::Ellipse { .. } => "ellipse",
            SketchEntity::Bezier { .. } => "bezier",
            SketchEntity::Text { .. } => "text",
        }
    }

    /// End points of a line segment.
    pub fn endpoints(&self) -> Option<(Point, Point)> {
        match self {
            SketchEntity::LineSegment {
                midpoint,
                direction,
                start_param,
                end_param,
                ..
            } => Some((
                *midpoint + *direction * *start_param,
                *midpoint + *direction * *end_param,
            )),
            _ => None,
        }
    }
}

/// Encodes visible elements and text into sketch entities. Ids are
/// `<kind>_<n>` from one counter per call.
pub fn build(
    elements: &[Element],
    texts: &TextScan,
    options: &ConvertOptions,
    report: &mut ConversionReport,
) -> Vec<SketchEntity> {
    let mut codec = Codec {
        scale: options.scale,
        options,
        next_id: 0,
        out: Vec::new(),
        report,
    };
    for el in elements.iter().filter(|e| e.is_drawable()) {
        codec.element(el);
    }
    if options.text_as_sketch_text {
        for text in &texts.texts {
            codec.text(text);
        }
        for text_path in &texts.text_paths {
            codec.text_path(text_path, elements);
        }
    }
    codec.out
}

struct Codec<'a> {
    scale: f64,
    options: &'a ConvertOptions,
    next_id: usize,
    out: Vec<SketchEntity>,
    report: &'a mut ConversionReport,
}

impl Codec<'_> {
    fn id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{kind}_{}", self.next_id)
    }

    /// User space to sketch space: transform, scale, flip Y.
    fn map(&self, m: Matrix, p: Point) -> Point {
        let q = m.apply(p);
        Point::new(q.x * self.scale, -q.y * self.scale)
    }

    /// Direction of a user-space vector in sketch space.
    fn map_dir(&self, m: Matrix, v: Point) -> Option<Point> {
        Point::new(m.a * v.x + m.c * v.y, -(m.b * v.x + m.d * v.y)).normalized(EPS)
    }

    fn degenerate(&mut self, what: &str) {
        debug!(element = what, "dropping degenerate geometry");
        self.report.record(SkipReason::DegenerateGeometry);
    }

    fn line(&mut self, a: Point, b: Point, construction: bool) {
        if a.distance(b) < EPS {
            self.degenerate("line");
            return;
        }
        let id = self.id("line");
        self.out.push(SketchEntity::line(id, a, b, construction));
    }

    fn element(&mut self, el: &Element) {
        let m = el.transform;
        let construction = el.is_construction;
        match &el.kind {
            ElementKind::Line { x1, y1, x2, y2 } => {
                let a = self.map(m, Point::new(*x1, *y1));
                let b = self.map(m, Point::new(*x2, *y2));
                self.line(a, b, construction);
            }
            ElementKind::Rect {
                x,
                y,
                width,
                height,
            } => {
                if *width <= 0.0 || *height <= 0.0 {
                    self.degenerate("rect");
                    return;
                }
                let corners = [
                    Point::new(*x, *y),
                    Point::new(x + width, *y),
                    Point::new(x + width, y + height),
                    Point::new(*x, y + height),
                ]
                .map(|p| self.map(m, p));
                for i in 0..4 {
                    self.line(corners[i], corners[(i + 1) % 4], construction);
                }
            }
            ElementKind::Circle { cx, cy, r } => {
                let radius = r * self.scale * m.x_scale();
                if *r <= 0.0 || radius < EPS {
                    self.degenerate("circle");
                    return;
                }
                let id = self.id("circle");
                let center = self.map(m, Point::new(*cx, *cy));
                self.out.push(SketchEntity::Circle {
                    id,
                    center,
                    radius,
                    is_construction: construction,
                });
            }
            ElementKind::Ellipse { cx, cy, rx, ry } => {
                let rx_s = rx * self.scale * m.x_scale();
                let ry_s = ry * self.scale * m.y_scale();
                if *rx <= 0.0 || *ry <= 0.0 || rx_s < EPS || ry_s < EPS {
                    self.degenerate("ellipse");
                    return;
                }
                let (major_radius, minor_radius, axis) = if rx_s >= ry_s {
                    (rx_s, ry_s, Point::new(1.0, 0.0))
                } else {
                    (ry_s, rx_s, Point::new(0.0, 1.0))
                };
                let major_direction = self.map_dir(m, axis).unwrap_or(Point::new(1.0, 0.0));
                let id = self.id("ellipse");
                let center = self.map(m, Point::new(*cx, *cy));
                self.out.push(SketchEntity::Ellipse {
                    id,
                    center,
                    major_radius,
                    minor_radius,
                    major_direction,
                    is_construction: construction,
                });
            }
            ElementKind::Path { d } => self.path(d, m, construction),
            ElementKind::Use { .. } => {}
        }
    }

    fn path(&mut self, d: &str, m: Matrix, construction: bool) {
        let data = parse_with(d, &self.options.path);
        self.report.record_n(SkipReason::PathToken, data.skipped_tokens);

        let mut cur: Option<Point> = None;
        let mut start: Option<Point> = None;
        for cmd in data.commands {
            match cmd {
                PathCommand::Move(p) => {
                    let p = self.map(m, p);
                    cur = Some(p);
                    start = Some(p);
                }
                PathCommand::Line(p) => {
                    let p = self.map(m, p);
                    match cur {
                        Some(from) => self.line(from, p, construction),
                        None => self.report.record(SkipReason::OrphanSegment),
                    }
                    cur = Some(p);
                }
                PathCommand::CubicCurve(c1, c2, p) => {
                    let points = [self.map(m, c1), self.map(m, c2), self.map(m, p)];
                    match cur {
                        Some(from) => self.bezier([from, points[0], points[1], points[2]], construction),
                        None => self.report.record(SkipReason::OrphanSegment),
                    }
                    cur = Some(points[2]);
                }
                PathCommand::Close => {
                    if let (Some(from), Some(to)) = (cur, start) {
                        // The closing edge is implied when the pen is already home.
                        if from.distance(to) >= EPS {
                            self.line(from, to, construction);
                        }
                    }
                    cur = start;
                }
            }
        }
    }

    fn bezier(&mut self, control_points: [Point; 4], construction: bool) {
        let first = control_points[0];
        if control_points.iter().all(|p| p.distance(first) < EPS) {
            self.degenerate("bezier");
            return;
        }
        let id = self.id("bezier");
        self.out.push(SketchEntity::Bezier {
            id,
            control_points,
            knots: BEZIER_KNOTS,
            is_construction: construction,
        });
    }

    fn push_text(&mut self, content: &str, start: Point, direction: Point, ascent: f64, font: &str) {
        let id = self.id("text");
        self.out.push(SketchEntity::Text {
            id,
            baseline_start: start,
            baseline_direction: direction,
            ascent,
            content: content.to_string(),
            font: font.to_string(),
        });
    }

    fn anchored_start(&self, text: &TextElement, content: &str, at: Point) -> Point {
        let sf = text.transform.x_scale();
        let mut start = self.map(text.transform, at);
        let width = content.chars().count() as f64 * text.font_size * ADVANCE_RATIO * self.scale * sf;
        match text.text_anchor {
            TextAnchor::Start => {}
            TextAnchor::Middle => start.x -= width / 2.0,
            TextAnchor::End => start.x -= width,
        }
        start
    }

    fn text(&mut self, text: &TextElement) {
        let ascent = text.font_size * self.scale * text.transform.x_scale();
        let direction = Point::new(1.0, 0.0);
        let origin = Point::new(text.x, text.y);

        if !text.spans.iter().any(|s| s.is_positioned()) {
            if text.content.is_empty() {
                self.report.record(SkipReason::EmptyText);
                return;
            }
            let start = self.anchored_start(text, &text.content, origin);
            self.push_text(&text.content, start, direction, ascent, &text.font_family);
            return;
        }

        if !text.direct_content.is_empty() {
            let start = self.anchored_start(text, &text.direct_content, origin);
            self.push_text(&text.direct_content, start, direction, ascent, &text.font_family);
        }
        for span in &text.spans {
            if span.content.is_empty() {
                self.report.record(SkipReason::EmptyText);
                continue;
            }
            let at = Point::new(
                span.x.unwrap_or(text.x) + span.dx,
                span.y.unwrap_or(text.y) + span.dy,
            );
            let start = self.anchored_start(text, &span.content, at);
            self.push_text(&span.content, start, direction, ascent, &text.font_family);
        }
    }

    /// One entity per visible glyph along the referenced path's first subpath.
    fn text_path(&mut self, text_path: &TextPathElement, elements: &[Element]) {
        let target = elements.iter().find_map(|e| match &e.kind {
            ElementKind::Path { d } if e.id.as_deref() == Some(text_path.path_id.as_str()) => {
                Some((d, e.transform))
            }
            _ => None,
        });
        let Some((d, m)) = target else {
            debug!(path = %text_path.path_id, "textPath target not found");
            self.report.record(SkipReason::MissingTextPathTarget);
            return;
        };
        let commands = parse_with(d, &self.options.path).commands;
        let Some(polyline) = flatten(&commands, CURVE_SAMPLES).into_iter().next() else {
            self.report.record(SkipReason::MissingTextPathTarget);
            return;
        };
        let walker = PolylineWalker::new(&polyline);
        let ascent = text_path.font_size * self.scale * m.x_scale();
        let advance = text_path.font_size * ADVANCE_RATIO;
        let offset = text_path.start_offset.resolve(walker.length());

        let mut placed = 0;
        for (i, ch) in text_path.content.chars().enumerate() {
            let distance = offset + i as f64 * advance;
            let Some((at, tangent)) = walker.at(distance) else {
                continue;
            };
            if ch.is_whitespace() {
                continue;
            }
            let start = self.map(m, at);
            let direction = self.map_dir(m, tangent).unwrap_or(Point::new(1.0, 0.0));
            self.push_text(&ch.to_string(), start, direction, ascent, &text_path.font_family);
            placed += 1;
        }
        if placed == 0 {
            self.report.record(SkipReason::EmptyText);
        }
    }
}

struct PolylineWalker<'a> {
    points: &'a [Point],
    cumulative: Vec<f64>,
}

impl<'a> PolylineWalker<'a> {
    fn new(points: &'a [Point]) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative.push(0.0);
        for w in points.windows(2) {
            total += w[0].distance(w[1]);
            cumulative.push(total);
        }
        Self { points, cumulative }
    }

    fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Point and unit tangent at arc length `distance`; `None` off the path.
    fn at(&self, distance: f64) -> Option<(Point, Point)> {
        if distance < 0.0 || distance > self.length() {
            return None;
        }
        for i in 1..self.points.len() {
            let (a, b) = (self.points[i - 1], self.points[i]);
            let seg = self.cumulative[i] - self.cumulative[i - 1];
            if seg < EPS || distance > self.cumulative[i] {
                continue;
            }
            let t = (distance - self.cumulative[i - 1]) / seg;
            return Some((a.lerp(b, t), (b - a) * (1.0 / seg)));
        }
        None
    }
}

// Path data (`d`) interpreter. Output is absolute and untransformed, using
// only move, line, cubic and close.

use crate::number::NumberCursor;
use crate::transform::Matrix;
use crate::types::Point;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PathCommand {
    Move(Point),
    Line(Point),
    /// Control 1, control 2, end point.
    CubicCurve(Point, Point, Point),
    Close,
}

/// How `S`/`T` pick their implied first control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothCurves {
    /// The current point stands in for the reflected control.
    #[default]
    ReflectCurrentPoint,
    /// SVG semantics: reflect the previous segment's control point.
    ReflectPreviousControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Arcs {
    /// A straight line to the arc end point.
    #[default]
    Chord,
    /// Cubic approximation, at most 90 degrees per segment.
    Cubic,
}

/// What coordinate pairs after the first one in an `M` run mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveRepeats {
    /// Each pair starts a new subpath.
    #[default]
    Move,
    /// SVG semantics: the pairs are implicit `L` commands.
    LineTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathOptions {
    pub smooth_curves: SmoothCurves,
    pub arcs: Arcs,
    pub move_repeats: MoveRepeats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathData {
    pub commands: Vec<PathCommand>,
    /// Unknown letters and numbers that fit no command.
    pub skipped_tokens: usize,
}

pub fn parse(d: &str) -> Vec<PathCommand> {
    parse_with(d, &PathOptions::default()).commands
}

pub fn parse_with(d: &str, options: &PathOptions) -> PathData {
    let mut out = PathData::default();
    let mut p = NumberCursor::new(d);
    let mut cur = Point::ORIGIN;
    let mut start = Point::ORIGIN;
    let mut last_cubic_ctrl2: Option<Point> = None;
    let mut last_quad_ctrl: Option<Point> = None;
    let reflect = options.smooth_curves == SmoothCurves::ReflectPreviousControl;

    while !p.at_end() {
        let Some(c) = p.peek() else { break };
        if !c.is_ascii_alphabetic() {
            // Every command arm consumes all complete groups, so a number here
            // fits nothing.
            if p.next_number().is_none() {
                p.bump();
            }
            out.skipped_tokens += 1;
            continue;
        }
        p.bump();
        let rel = c.is_ascii_lowercase();
        let at = |cur: Point, x: f64, y: f64| {
            if rel {
                Point::new(cur.x + x, cur.y + y)
            } else {
                Point::new(x, y)
            }
        };
        let segs = &mut out.commands;

        match c.to_ascii_uppercase() {
            b'M' => {
                if let Some((x, y)) = p.next_pair() {
                    cur = at(cur, x, y);
                    start = cur;
                    segs.push(PathCommand::Move(cur));
                    while let Some((x, y)) = p.next_pair() {
                        cur = at(cur, x, y);
                        match options.move_repeats {
                            MoveRepeats::Move => {
                                start = cur;
                                segs.push(PathCommand::Move(cur));
                            }
                            MoveRepeats::LineTo => segs.push(PathCommand::Line(cur)),
                        }
                    }
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            b'L' => {
                while let Some((x, y)) = p.next_pair() {
                    cur = at(cur, x, y);
                    segs.push(PathCommand::Line(cur));
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            b'H' => {
                while let Some(x) = p.next_number() {
                    cur = Point::new(if rel { cur.x + x } else { x }, cur.y);
                    segs.push(PathCommand::Line(cur));
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            b'V' => {
                while let Some(y) = p.next_number() {
                    cur = Point::new(cur.x, if rel { cur.y + y } else { y });
                    segs.push(PathCommand::Line(cur));
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            b'C' => {
                while let Some([x1, y1, x2, y2, x, y]) = p.next_numbers::<6>() {
                    let c1 = at(cur, x1, y1);
                    let c2 = at(cur, x2, y2);
                    cur = at(cur, x, y);
                    segs.push(PathCommand::CubicCurve(c1, c2, cur));
                    last_cubic_ctrl2 = Some(c2);
                    last_quad_ctrl = None;
                }
            }
            b'S' => {
                while let Some([x2, y2, x, y]) = p.next_numbers::<4>() {
                    let c2 = at(cur, x2, y2);
                    let end = at(cur, x, y);
                    let c1 = match last_cubic_ctrl2 {
                        Some(prev) if reflect => cur * 2.0 - prev,
                        _ => cur,
                    };
                    segs.push(PathCommand::CubicCurve(c1, c2, end));
                    cur = end;
                    last_cubic_ctrl2 = Some(c2);
                    last_quad_ctrl = None;
                }
            }
            b'Q' => {
                while let Some([x1, y1, x, y]) = p.next_numbers::<4>() {
                    let ctrl = at(cur, x1, y1);
                    let end = at(cur, x, y);
                    let (c1, c2) = quad_to_cubic(cur, ctrl, end);
                    segs.push(PathCommand::CubicCurve(c1, c2, end));
                    cur = end;
                    last_quad_ctrl = Some(ctrl);
                    last_cubic_ctrl2 = Some(c2);
                }
            }
            b'T' => {
                while let Some((x, y)) = p.next_pair() {
                    let end = at(cur, x, y);
                    let ctrl = match last_quad_ctrl {
                        Some(prev) if reflect => cur * 2.0 - prev,
                        _ => cur,
                    };
                    let (c1, c2) = quad_to_cubic(cur, ctrl, end);
                    segs.push(PathCommand::CubicCurve(c1, c2, end));
                    cur = end;
                    last_quad_ctrl = Some(ctrl);
                    last_cubic_ctrl2 = Some(c2);
                }
            }
            b'A' => {
                while let Some(arc) = next_arc(&mut p) {
                    let end = at(cur, arc.x, arc.y);
                    match options.arcs {
                        Arcs::Chord => {
                            segs.push(PathCommand::Line(end));
                            last_cubic_ctrl2 = None;
                        }
                        Arcs::Cubic => {
                            let curves = arc_to_cubics(cur, &arc, end);
                            last_cubic_ctrl2 = curves.iter().rev().find_map(|seg| match *seg {
                                PathCommand::CubicCurve(_, c2, _) => Some(c2),
                                _ => None,
                            });
                            segs.extend(curves);
                        }
                    }
                    cur = end;
                    last_quad_ctrl = None;
                }
            }
            b'Z' => {
                segs.push(PathCommand::Close);
                cur = start;
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            other => {
                debug!(command = %(other as char), "skipping unsupported path command");
                out.skipped_tokens += 1;
            }
        }
    }

    out
}

struct ArcArgs {
    rx: f64,
    ry: f64,
    rotation: f64,
    large_arc: bool,
    sweep: bool,
    x: f64,
    y: f64,
}

fn next_arc(p: &mut NumberCursor<'_>) -> Option<ArcArgs> {
    let mark = p.position();
    let parsed = (|| {
        let [rx, ry, rotation] = p.next_numbers::<3>()?;
        let large_arc = p.next_flag()?;
        let sweep = p.next_flag()?;
        let (x, y) = p.next_pair()?;
        Some(ArcArgs {
            rx,
            ry,
            rotation,
            large_arc,
            sweep,
            x,
            y,
        })
    })();
    if parsed.is_none() {
        p.rewind(mark);
    }
    parsed
}

/// Degree elevation: `c1 = p0 + 2/3 (q - p0)`, `c2 = p3 + 2/3 (q - p3)`.
pub fn quad_to_cubic(p0: Point, ctrl: Point, p3: Point) -> (Point, Point) {
    let c1 = p0 + (ctrl - p0) * (2.0 / 3.0);
    let c2 = p3 + (ctrl - p3) * (2.0 / 3.0);
    (c1, c2)
}

/// Cubic approximation of an elliptical arc. The center is solved in the
/// ellipse's own frame (unrotated, origin at the chord midpoint); one matrix
/// then carries unit-circle arcs back to user space.
fn arc_to_cubics(from: Point, arc: &ArcArgs, to: Point) -> Vec<PathCommand> {
    use std::f64::consts::{FRAC_PI_2, TAU};

    let mut radii = Point::new(arc.rx.abs(), arc.ry.abs());
    if radii.x == 0.0 || radii.y == 0.0 || from == to {
        return vec![PathCommand::Line(to)];
    }

    let local = Matrix::rotate(-arc.rotation).apply((from - to) * 0.5);
    // Radii too small to span the chord grow uniformly until they do.
    let reach = (local.x / radii.x).powi(2) + (local.y / radii.y).powi(2);
    if reach > 1.0 {
        radii = radii * libm::sqrt(reach);
    }
    let center = arc_center(local, radii, arc.large_arc != arc.sweep);

    let mid = from.midpoint(to);
    let frame = Matrix::translate(mid.x, mid.y)
        .mul(Matrix::rotate(arc.rotation))
        .mul(Matrix::translate(center.x, center.y))
        .mul(Matrix::scale(radii.x, radii.y));

    let on_unit = |p: Point| Point::new((p.x - center.x) / radii.x, (p.y - center.y) / radii.y);
    let a = on_unit(local);
    let b = on_unit(local * -1.0);
    let start = libm::atan2(a.y, a.x);
    let mut span = libm::atan2(a.x * b.y - a.y * b.x, a.dot(b));
    if arc.sweep && span < 0.0 {
        span += TAU;
    } else if !arc.sweep && span > 0.0 {
        span -= TAU;
    }

    let count = libm::ceil(span.abs() / FRAC_PI_2).max(1.0) as usize;
    let step = span / count as f64;
    let mut out: Vec<PathCommand> = (0..count)
        .map(|i| unit_arc(frame, start + step * i as f64, step))
        .collect();
    if let Some(PathCommand::CubicCurve(_, _, end)) = out.last_mut() {
        *end = to;
    }
    out
}

/// Ellipse center relative to the chord midpoint, in the ellipse frame.
/// `positive` picks which of the two candidate centers is used.
fn arc_center(local: Point, radii: Point, positive: bool) -> Point {
    let rx2 = radii.x * radii.x;
    let ry2 = radii.y * radii.y;
    let den = rx2 * local.y * local.y + ry2 * local.x * local.x;
    if den == 0.0 {
        return Point::ORIGIN;
    }
    let root = libm::sqrt(((rx2 * ry2 - den) / den).max(0.0));
    let root = if positive { root } else { -root };
    Point::new(
        root * radii.x * local.y / radii.y,
        -root * radii.y * local.x / radii.x,
    )
}

/// One cubic for the unit-circle arc `[t, t + step]`, mapped through `frame`.
fn unit_arc(frame: Matrix, t: f64, step: f64) -> PathCommand {
    let k = (4.0 / 3.0) * libm::tan(step / 4.0);
    let p0 = Point::new(libm::cos(t), libm::sin(t));
    let p3 = Point::new(libm::cos(t + step), libm::sin(t + step));
    let tangent = |p: Point| Point::new(-p.y, p.x) * k;
    PathCommand::CubicCurve(
        frame.apply(p0 + tangent(p0)),
        frame.apply(p3 - tangent(p3)),
        frame.apply(p3),
    )
}

fn cubic_point(p0: Point, c1: Point, c2: Point, p3: Point, t: f64) -> Point {
    let mt = 1.0 - t;
    p0 * (mt * mt * mt) + c1 * (3.0 * mt * mt * t) + c2 * (3.0 * mt * t * t) + p3 * (t * t * t)
}

/// Polylines, one per subpath, with each cubic sampled `samples` times.
pub fn flatten(commands: &[PathCommand], samples: usize) -> Vec<Vec<Point>> {
    let samples = samples.max(1);
    let mut out: Vec<Vec<Point>> = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut start = Point::ORIGIN;
    for cmd in commands {
        match *cmd {
            PathCommand::Move(p) => {
                if current.len() > 1 {
                    out.push(std::mem::take(&mut current));
                }
                current.clear();
                current.push(p);
                start = p;
            }
            PathCommand::Line(p) => {
                if current.is_empty() {
                    current.push(start);
                }
                current.push(p);
            }
            PathCommand::CubicCurve(c1, c2, p) => {
                let p0 = current.last().copied().unwrap_or(start);
                if current.is_empty() {
                    current.push(p0);
                }
                for i in 1..=samples {
                    current.push(cubic_point(p0, c1, c2, p, i as f64 / samples as f64));
                }
            }
            PathCommand::Close => {
                if current.len() > 1 {
                    current.push(start);
                    out.push(std::mem::take(&mut current));
                }
                current.clear();
                current.push(start);
            }
        }
    }
    if current.len() > 1 {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    #[test]
    fn parses_simple_path() {
        let segs = parse("M 0 0 L 10 0 L 10 10 Z");
        assert_eq!(
            segs,
            vec![
                PathCommand::Move(Point::new(0.0, 0.0)),
                PathCommand::Line(Point::new(10.0, 0.0)),
                PathCommand::Line(Point::new(10.0, 10.0)),
                PathCommand::Close,
            ]
        );
    }

    #[test]
    fn relative_commands_and_implicit_repeats() {
        let segs = parse("m 1 1 2 0 l 0 2 0 2 h -3 v -1");
        let points: Vec<Point> = segs
            .iter()
            .filter_map(|s| match s {
                PathCommand::Move(p) | PathCommand::Line(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(
            points,
            vec![
                Point::new(1.0, 1.0),
                Point::new(3.0, 1.0),
                Point::new(3.0, 3.0),
                Point::new(3.0, 5.0),
                Point::new(0.0, 5.0),
                Point::new(0.0, 4.0),
            ]
        );
    }

    #[test]
    fn implicit_move_pairs_repeat_the_move() {
        assert_eq!(
            parse("M 0 0 10 0 20 0"),
            vec![
                PathCommand::Move(Point::new(0.0, 0.0)),
                PathCommand::Move(Point::new(10.0, 0.0)),
                PathCommand::Move(Point::new(20.0, 0.0)),
            ]
        );
        // Close goes back to the last moved-to point.
        let segs = parse("m 1 1 4 0 l 0 3 z l 1 0");
        assert_eq!(segs[4], PathCommand::Line(Point::new(6.0, 1.0)));
    }

    #[test]
    fn line_to_reading_of_move_pairs_is_opt_in() {
        let options = PathOptions {
            move_repeats: MoveRepeats::LineTo,
            ..PathOptions::default()
        };
        assert_eq!(
            parse_with("M 0 0 10 0 20 0", &options).commands,
            vec![
                PathCommand::Move(Point::new(0.0, 0.0)),
                PathCommand::Line(Point::new(10.0, 0.0)),
                PathCommand::Line(Point::new(20.0, 0.0)),
            ]
        );
    }

    #[test]
    fn quadratic_elevates_to_thirds() {
        let segs = parse("M 0 0 Q 5 10 10 0");
        let PathCommand::CubicCurve(c1, c2, end) = segs[1] else {
            panic!("expected cubic");
        };
        assert!(close(c1, Point::new(10.0 / 3.0, 20.0 / 3.0)));
        assert!(close(c2, Point::new(20.0 / 3.0, 20.0 / 3.0)));
        assert_eq!(end, Point::new(10.0, 0.0));
    }

    #[test]
    fn smooth_cubic_modes() {
        let d = "M 0 0 C 0 10 10 10 10 0 S 20 -10 20 0";
        let default = parse(d);
        let PathCommand::CubicCurve(c1, _, _) = default[2] else {
            panic!("expected cubic");
        };
        assert_eq!(c1, Point::new(10.0, 0.0));

        let options = PathOptions {
            smooth_curves: SmoothCurves::ReflectPreviousControl,
            ..PathOptions::default()
        };
        let reflected = parse_with(d, &options).commands;
        let PathCommand::CubicCurve(c1, _, _) = reflected[2] else {
            panic!("expected cubic");
        };
        assert_eq!(c1, Point::new(10.0, -10.0));
    }

    #[test]
    fn arcs_default_to_chord() {
        let segs = parse("M 0 0 A 5 5 0 0 1 10 0");
        assert_eq!(segs[1], PathCommand::Line(Point::new(10.0, 0.0)));
    }

    #[test]
    fn cubic_arcs_follow_the_circle() {
        let options = PathOptions {
            arcs: Arcs::Cubic,
            ..PathOptions::default()
        };
        let segs = parse_with("M10 10 A5 5 0 01 20 10", &options).commands;
        let cubics: Vec<_> = segs.iter().filter(|s| matches!(s, PathCommand::CubicCurve(..))).collect();
        assert_eq!(cubics.len(), 2);
        let PathCommand::CubicCurve(_, _, mid) = *cubics[0] else {
            panic!("expected cubic");
        };
        assert!((mid.distance(Point::new(15.0, 10.0)) - 5.0).abs() < 1e-9);
        assert!(matches!(segs.last(), Some(PathCommand::CubicCurve(_, _, end)) if *end == Point::new(20.0, 10.0)));
    }

    fn cubic_ends(d: &str) -> Vec<Point> {
        let options = PathOptions {
            arcs: Arcs::Cubic,
            ..PathOptions::default()
        };
        parse_with(d, &options)
            .commands
            .into_iter()
            .filter_map(|s| match s {
                PathCommand::CubicCurve(_, _, end) => Some(end),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rotated_ellipse_arc_stays_on_the_ellipse() {
        // Major axis turned vertical: center (0, 10), rx 10 along y, ry 5 along x.
        let ends = cubic_ends("M 0 0 A 10 5 90 0 1 0 20");
        assert_eq!(ends.len(), 2);
        for p in &ends {
            let along = (p.y - 10.0) / 10.0;
            let across = p.x / 5.0;
            assert!((along * along + across * across - 1.0).abs() < 1e-9, "{p:?}");
        }
        assert!((ends[0].x.abs() - 5.0).abs() < 1e-9);
        assert_eq!(ends[1], Point::new(0.0, 20.0));
    }

    #[test]
    fn short_radii_grow_to_span_the_chord() {
        let ends = cubic_ends("M 0 0 A 1 1 0 0 1 10 0");
        assert_eq!(ends.len(), 2);
        assert!((ends[0].distance(Point::new(5.0, 0.0)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn close_returns_to_subpath_start() {
        let segs = parse("M 5 5 L 10 5 Z l 1 1");
        assert_eq!(segs[3], PathCommand::Line(Point::new(6.0, 6.0)));
    }

    #[test]
    fn garbage_is_skipped_without_hanging() {
        let data = parse_with("7 M 0 0 X 1 2 L 3 4 5 Z 9 #", &PathOptions::default());
        assert_eq!(
            data.commands,
            vec![
                PathCommand::Move(Point::new(0.0, 0.0)),
                PathCommand::Line(Point::new(3.0, 4.0)),
                PathCommand::Close,
            ]
        );
        // 7, X, 1, 2, 5, 9, #
        assert_eq!(data.skipped_tokens, 7);
    }

    #[test]
    fn exponents_and_packed_numbers() {
        let segs = parse("M1e1-5L.5.5");
        assert_eq!(segs[0], PathCommand::Move(Point::new(10.0, -5.0)));
        assert_eq!(segs[1], PathCommand::Line(Point::new(0.5, 0.5)));
    }

    #[test]
    fn flatten_samples_curves_and_closes() {
        let lines = flatten(&parse("M 0 0 L 10 0 L 10 10 Z M 0 0 C 0 1 1 1 1 0"), 4);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].last(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(lines[1].len(), 5);
    }
}

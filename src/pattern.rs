use crate::element::Element;
use crate::types::Point;
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt;

const SPACING_TOLERANCE: f64 = 0.01;
const PARALLEL_COSINE: f64 = 0.99;
const MIN_SPACING: f64 = 0.001;
const ANGLE_TOLERANCE: f64 = 0.1;

/// A repetition among `<use>` instances of one reference. Positions are the
/// translation components of each instance transform, in user units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    Linear {
        group_key: String,
        count: usize,
        spacing: f64,
        direction: Point,
        start: Point,
    },
    Grid {
        group_key: String,
        rows: usize,
        cols: usize,
        row_spacing: f64,
        col_spacing: f64,
        start: Point,
    },
    Circular {
        group_key: String,
        count: usize,
        radius: f64,
        center: Point,
        start_angle: f64,
    },
}

impl Pattern {
    pub fn group_key(&self) -> &str {
        match self {
            Pattern::Linear { group_key, .. }
            | Pattern::Grid { group_key, .. }
            | Pattern::Circular { group_key, .. } => group_key,
        }
    }

    pub fn instance_count(&self) -> usize {
        match self {
            Pattern::Linear { count, .. } | Pattern::Circular { count, .. } => *count,
            Pattern::Grid { rows, cols, .. } => rows * cols,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Linear { count, spacing, .. } => {
                write!(f, "Linear: {count} instances, spacing {spacing:.2}")
            }
            Pattern::Grid {
                rows,
                cols,
                row_spacing,
                col_spacing,
                ..
            } => write!(
                f,
                "Grid: {rows}×{cols} ({} total), row spacing {row_spacing:.2}, col spacing {col_spacing:.2}",
                rows * cols
            ),
            Pattern::Circular { count, radius, .. } => {
                write!(f, "Circular: {count} instances, radius {radius:.2}")
            }
        }
    }
}

/// Classifies each group of `<use>` clones. Groups keep first-seen order and
/// groups matching no pattern are left out.
pub fn detect(elements: &[Element]) -> Vec<Pattern> {
    let mut groups: Vec<(&str, Vec<(usize, Point)>)> = Vec::new();
    for el in elements.iter().filter(|e| !e.is_hidden) {
        let (Some(key), Some(instance)) = (el.source_group_key.as_deref(), el.source_instance)
        else {
            continue;
        };
        let idx = match groups.iter().position(|(k, _)| *k == key) {
            Some(idx) => idx,
            None => {
                groups.push((key, Vec::new()));
                groups.len() - 1
            }
        };
        let instances = &mut groups[idx].1;
        // Symbol members share an instance; the first one stands for all.
        if !instances.iter().any(|(i, _)| *i == instance) {
            instances.push((instance, el.transform.translation()));
        }
    }

    groups
        .into_iter()
        .filter(|(_, instances)| instances.len() >= 2)
        .filter_map(|(key, instances)| {
            let positions: Vec<Point> = instances.into_iter().map(|(_, p)| p).collect();
            detect_linear(key, &positions)
                .or_else(|| detect_grid(key, &positions))
                .or_else(|| detect_circular(key, &positions))
        })
        .collect()
}

fn within_tolerance(value: f64, reference: f64) -> bool {
    (value / reference - 1.0).abs() < SPACING_TOLERANCE
}

fn detect_linear(key: &str, positions: &[Point]) -> Option<Pattern> {
    let deltas: Vec<Point> = positions.windows(2).map(|w| w[1] - w[0]).collect();
    let first = *deltas.first()?;
    let spacing = first.length();
    if spacing < MIN_SPACING {
        return None;
    }
    let uniform = deltas.iter().all(|d| {
        let len = d.length();
        within_tolerance(len, spacing) && d.dot(first) / (len * spacing) > PARALLEL_COSINE
    });
    if !uniform {
        return None;
    }
    Some(Pattern::Linear {
        group_key: key.to_string(),
        count: positions.len(),
        spacing,
        direction: first * (1.0 / spacing),
        start: positions[0],
    })
}

fn detect_grid(key: &str, positions: &[Point]) -> Option<Pattern> {
    if positions.len() < 4 {
        return None;
    }
    // Rows bucketed by y rounded to two decimals, in first-seen order.
    let mut rows: Vec<(i64, Vec<f64>)> = Vec::new();
    for p in positions {
        let y_key = (p.y * 100.0).round() as i64;
        match rows.iter_mut().find(|(k, _)| *k == y_key) {
            Some((_, xs)) => xs.push(p.x),
            None => rows.push((y_key, vec![p.x])),
        }
    }
    if rows.len() < 2 {
        return None;
    }
    let cols = rows[0].1.len();
    if cols < 2 || rows.iter().any(|(_, xs)| xs.len() != cols) {
        return None;
    }

    rows.sort_by_key(|(k, _)| *k);
    let ys: Vec<f64> = rows.iter().map(|(k, _)| *k as f64 / 100.0).collect();
    let row_spacings: Vec<f64> = ys.windows(2).map(|w| w[1] - w[0]).collect();
    let row_spacing = row_spacings[0];
    if !row_spacings.iter().all(|s| within_tolerance(*s, row_spacing)) {
        return None;
    }

    for (_, xs) in rows.iter_mut() {
        xs.sort_by(|a, b| a.total_cmp(b));
    }
    let col_spacing = rows[0].1[1] - rows[0].1[0];
    let columns_uniform = rows.iter().all(|(_, xs)| {
        xs.windows(2)
            .all(|w| within_tolerance(w[1] - w[0], col_spacing))
    });
    if !columns_uniform {
        return None;
    }

    Some(Pattern::Grid {
        group_key: key.to_string(),
        rows: rows.len(),
        cols,
        row_spacing,
        col_spacing,
        start: Point::new(rows[0].1[0], ys[0]),
    })
}

fn detect_circular(key: &str, positions: &[Point]) -> Option<Pattern> {
    if positions.len() < 3 {
        return None;
    }
    let n = positions.len() as f64;
    let sum = positions.iter().fold(Point::ORIGIN, |acc, p| acc + *p);
    let center = sum * (1.0 / n);

    let radius = positions[0].distance(center);
    if !positions
        .iter()
        .all(|p| within_tolerance(p.distance(center), radius))
    {
        return None;
    }

    let mut angles: Vec<f64> = positions
        .iter()
        .map(|p| libm::atan2(p.y - center.y, p.x - center.x))
        .collect();
    angles.sort_by(|a, b| a.total_cmp(b));
    let expected = 2.0 * PI / n;
    let mut diffs: Vec<f64> = angles.windows(2).map(|w| w[1] - w[0]).collect();
    diffs.push(angles[0] + 2.0 * PI - angles[angles.len() - 1]);
    if !diffs.iter().all(|d| (d - expected).abs() < ANGLE_TOLERANCE) {
        return None;
    }

    Some(Pattern::Circular {
        group_key: key.to_string(),
        count: positions.len(),
        radius,
        center,
        start_angle: angles[0],
    })
}

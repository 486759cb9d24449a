// Line-based command text for the FeatureScript importer. Coordinates are
// transformed and scaled but keep the Y-down orientation of the input.

use crate::element::{Element, ElementKind};
use crate::path::{PathCommand, PathOptions, parse_with};
use crate::pattern::Pattern;
use crate::transform::Matrix;
use crate::types::Point;
use std::fmt::Write;

pub const HEADER: &str = "# Intermediate Format for SVG to Sketch v47";

pub fn generate(elements: &[Element], patterns: &[Pattern], scale: f64) -> String {
    generate_with(elements, patterns, scale, &PathOptions::default())
}

/// Plain elements first, then one array block per pattern whose body is the
/// pattern's first instance.
pub fn generate_with(
    elements: &[Element],
    patterns: &[Pattern],
    scale: f64,
    path_options: &PathOptions,
) -> String {
    let writer = Writer {
        scale,
        path_options,
    };
    let in_pattern = |el: &Element| {
        el.source_group_key
            .as_deref()
            .is_some_and(|key| patterns.iter().any(|p| p.group_key() == key))
    };

    let mut lines = vec![HEADER.to_string(), format!("# Scale: {scale}"), String::new()];
    for el in elements.iter().filter(|e| e.is_drawable() && !in_pattern(*e)) {
        writer.element(el, &mut lines);
    }

    for pattern in patterns {
        let mut members = elements
            .iter()
            .filter(|e| e.is_drawable() && e.source_group_key.as_deref() == Some(pattern.group_key()));
        let Some(first) = members.next() else {
            continue;
        };
        lines.push(String::new());
        lines.push(format!(
            "# Pattern: {} ({} instances)",
            pattern_kind(pattern),
            pattern.instance_count()
        ));
        lines.push(writer.array_command(pattern));

        let mut body = Vec::new();
        writer.element(first, &mut body);
        // Symbol instances hold several elements sharing one instance index.
        for el in members.filter(|e| e.source_instance == first.source_instance) {
            writer.element(el, &mut body);
        }
        if !body.is_empty() {
            lines.push("BEGIN_PATTERN".to_string());
            lines.extend(body);
            lines.push("END_PATTERN".to_string());
        }
    }

    lines.join("\n")
}

fn pattern_kind(pattern: &Pattern) -> &'static str {
    match pattern {
        Pattern::Linear { .. } => "linear",
        Pattern::Grid { .. } => "grid",
        Pattern::Circular { .. } => "circular",
    }
}

fn construction(line: String, is_construction: bool) -> String {
    if is_construction {
        format!("{line} CONSTRUCTION")
    } else {
        line
    }
}

struct Writer<'a> {
    scale: f64,
    path_options: &'a PathOptions,
}

impl Writer<'_> {
    fn point(&self, m: Matrix, p: Point) -> String {
        let q = m.apply(p);
        format!("{:.6} {:.6}", q.x * self.scale, q.y * self.scale)
    }

    fn element(&self, el: &Element, out: &mut Vec<String>) {
        let m = el.transform;
        let c = el.is_construction;
        match &el.kind {
            ElementKind::Line { x1, y1, x2, y2 } => out.push(construction(
                format!(
                    "LINE {} {}",
                    self.point(m, Point::new(*x1, *y1)),
                    self.point(m, Point::new(*x2, *y2))
                ),
                c,
            )),
            ElementKind::Rect {
                x,
                y,
                width,
                height,
            } => {
                let corners = [
                    Point::new(*x, *y),
                    Point::new(x + width, *y),
                    Point::new(x + width, y + height),
                    Point::new(*x, y + height),
                ];
                let mut line = String::from("RECT");
                for p in corners {
                    let _ = write!(line, " {}", self.point(m, p));
                }
                out.push(construction(line, c));
            }
            ElementKind::Circle { cx, cy, r } => out.push(construction(
                format!(
                    "CIRCLE {} {:.6}",
                    self.point(m, Point::new(*cx, *cy)),
                    r * self.scale * m.x_scale()
                ),
                c,
            )),
            ElementKind::Ellipse { cx, cy, rx, ry } => out.push(construction(
                format!(
                    "ELLIPSE {} {:.6} {:.6}",
                    self.point(m, Point::new(*cx, *cy)),
                    rx * self.scale * m.x_scale(),
                    ry * self.scale * m.y_scale()
                ),
                c,
            )),
            ElementKind::Path { d } => {
                let first = out.len();
                for cmd in parse_with(d, self.path_options).commands {
                    out.push(match cmd {
                        PathCommand::Move(p) => format!("M {}", self.point(m, p)),
                        PathCommand::Line(p) => format!("L {}", self.point(m, p)),
                        PathCommand::CubicCurve(c1, c2, p) => format!(
                            "C {} {} {}",
                            self.point(m, c1),
                            self.point(m, c2),
                            self.point(m, p)
                        ),
                        PathCommand::Close => "Z".to_string(),
                    });
                }
                // The first command of a path carries its construction flag.
                if c {
                    if let Some(head) = out.get_mut(first) {
                        head.push_str(" CONSTRUCTION");
                    }
                }
            }
            ElementKind::Use { .. } => {}
        }
    }

    /// Lengths are scaled like coordinates; directions and angles are not.
    fn array_command(&self, pattern: &Pattern) -> String {
        let s = self.scale;
        match pattern {
            Pattern::Linear {
                count,
                spacing,
                direction,
                ..
            } => format!(
                "ARRAY_LINEAR {count} {:.6} {:.6} {:.6}",
                spacing * s,
                direction.x,
                direction.y
            ),
            Pattern::Grid {
                rows,
                cols,
                row_spacing,
                col_spacing,
                ..
            } => format!(
                "ARRAY_GRID {rows} {cols} {:.6} {:.6}",
                row_spacing * s,
                col_spacing * s
            ),
            Pattern::Circular {
                count,
                radius,
                center,
                start_angle,
                ..
            } => format!(
                "ARRAY_CIRCULAR {count} {:.6} {:.6} {:.6} {:.6}",
                radius * s,
                center.x * s,
                center.y * s,
                start_angle
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::pattern::detect;
    use crate::scan::scan;

    fn generate_for(markup: &str, scale: f64) -> String {
        let elements = expand(scan(markup));
        let patterns = detect(&elements);
        generate(&elements, &patterns, scale)
    }

    #[test]
    fn header_and_primitives() {
        let text = generate_for(
            r#"<line x1="0" y1="0" x2="10" y2="5"/><rect width="2" height="1" stroke-dasharray="2"/>
               <circle cx="1" cy="2" r="3"/><ellipse rx="4" ry="2"/>"#,
            1.0,
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "# Scale: 1");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "LINE 0.000000 0.000000 10.000000 5.000000");
        assert_eq!(
            lines[4],
            "RECT 0.000000 0.000000 2.000000 0.000000 2.000000 1.000000 0.000000 1.000000 CONSTRUCTION"
        );
        assert_eq!(lines[5], "CIRCLE 1.000000 2.000000 3.000000");
        assert_eq!(lines[6], "ELLIPSE 0.000000 0.000000 4.000000 2.000000");
    }

    #[test]
    fn path_commands_are_scaled_not_flipped() {
        let text = generate_for(r#"<path d="M 0 0 L 100 200 Z" style="stroke-dasharray: 1 1"/>"#, 0.01);
        let body: Vec<&str> = text.lines().skip(3).collect();
        assert_eq!(
            body,
            vec!["M 0.000000 0.000000 CONSTRUCTION", "L 1.000000 2.000000", "Z"]
        );
    }

    #[test]
    fn patterns_become_array_blocks() {
        let text = generate_for(
            r##"<defs><circle id="dot" r="1"/></defs>
                <use href="#dot" x="0"/><use href="#dot" x="10"/><use href="#dot" x="20"/>
                <line x2="1"/>"##,
            1.0,
        );
        let body: Vec<&str> = text.lines().skip(3).collect();
        assert_eq!(
            body,
            vec![
                "LINE 0.000000 0.000000 1.000000 0.000000",
                "",
                "# Pattern: linear (3 instances)",
                "ARRAY_LINEAR 3 10.000000 1.000000 0.000000",
                "BEGIN_PATTERN",
                "CIRCLE 0.000000 0.000000 1.000000",
                "END_PATTERN",
            ]
        );
    }

    #[test]
    fn unpatterned_clones_stay_plain() {
        let text = generate_for(
            r##"<defs><line id="l" x2="1"/></defs><use href="#l" y="3"/>"##,
            1.0,
        );
        assert!(text.contains("LINE 0.000000 3.000000 1.000000 3.000000"));
        assert!(!text.contains("BEGIN_PATTERN"));
    }
}

use crate::attrs::Attributes;
use crate::element::{Element, ElementKind};
use crate::markup::{StartTag, Token, Tokenizer};
use crate::number::parse_number_list;
use crate::transform::{Matrix, compose};
use tracing::debug;

/// Scans markup into drawable elements and unresolved `<use>` references.
/// Group transforms are already folded into each element.
pub fn scan(markup: &str) -> Vec<Element> {
    let mut scanner = Scanner::new();
    for token in Tokenizer::new(markup) {
        match token {
            Token::Start(tag) => scanner.start(tag),
            Token::End(name) => scanner.end(&name),
            Token::Text(_) => {}
        }
    }
    debug!(elements = scanner.out.len(), "scanned markup");
    scanner.out
}

struct Scanner {
    transforms: Vec<Matrix>,
    defs_depth: usize,
    symbols: Vec<Option<String>>,
    out: Vec<Element>,
}

impl Scanner {
    fn new() -> Self {
        Self {
            transforms: vec![Matrix::identity()],
            defs_depth: 0,
            symbols: Vec::new(),
            out: Vec::new(),
        }
    }

    fn inherited(&self) -> Matrix {
        self.transforms.last().copied().unwrap_or_default()
    }

    fn start(&mut self, tag: StartTag) {
        let inherited = self.inherited();
        match tag.name.as_str() {
            "g" => {
                if !tag.self_closing {
                    self.transforms
                        .push(compose(inherited, tag.attrs.transform()));
                }
            }
            "defs" => {
                if !tag.self_closing {
                    self.defs_depth += 1;
                }
            }
            "symbol" => {
                if !tag.self_closing {
                    self.symbols.push(tag.attrs.id());
                }
            }
            "use" => {
                let attrs = &tag.attrs;
                let href = attrs.href().unwrap_or_default().trim().to_string();
                let offset = Matrix::translate(attrs.number("x", 0.0), attrs.number("y", 0.0));
                let local = compose(attrs.transform(), offset);
                let mut el = Element::new(ElementKind::Use { href })
                    .with_transform(compose(inherited, local));
                el.id = attrs.id();
                self.push(el);
            }
            name => {
                let Some(kind) = drawable_kind(name, &tag.attrs) else {
                    return;
                };
                let style = tag.attrs.style();
                let mut el = Element::new(kind)
                    .with_transform(compose(inherited, tag.attrs.transform()));
                el.id = tag.attrs.id();
                el.is_construction = tag.attrs.is_construction(&style);
                self.push(el);
            }
        }
    }

    fn push(&mut self, mut el: Element) {
        if self.defs_depth > 0 || !self.symbols.is_empty() {
            el.is_hidden = true;
        }
        if let Some(Some(symbol_id)) = self.symbols.last() {
            el.parent_symbol_id = Some(symbol_id.clone());
        }
        self.out.push(el);
    }

    fn end(&mut self, name: &str) {
        match name {
            "g" => {
                if self.transforms.len() > 1 {
                    self.transforms.pop();
                }
            }
            "defs" => {
                self.defs_depth = self.defs_depth.saturating_sub(1);
            }
            "symbol" => {
                self.symbols.pop();
            }
            _ => {}
        }
    }
}

fn drawable_kind(name: &str, attrs: &Attributes) -> Option<ElementKind> {
    let kind = match name {
        "path" => ElementKind::Path {
            d: attrs.get("d").unwrap_or_default().to_string(),
        },
        "rect" => ElementKind::Rect {
            x: attrs.number("x", 0.0),
            y: attrs.number("y", 0.0),
            width: attrs.number("width", 0.0),
            height: attrs.number("height", 0.0),
        },
        "line" => ElementKind::Line {
            x1: attrs.number("x1", 0.0),
            y1: attrs.number("y1", 0.0),
            x2: attrs.number("x2", 0.0),
            y2: attrs.number("y2", 0.0),
        },
        "circle" => ElementKind::Circle {
            cx: attrs.number("cx", 0.0),
            cy: attrs.number("cy", 0.0),
            r: attrs.number("r", 0.0),
        },
        "ellipse" => ElementKind::Ellipse {
            cx: attrs.number("cx", 0.0),
            cy: attrs.number("cy", 0.0),
            rx: attrs.number("rx", 0.0),
            ry: attrs.number("ry", 0.0),
        },
        "polyline" | "polygon" => {
            let d = points_to_path(attrs.get("points")?, name == "polygon")?;
            ElementKind::Path { d }
        }
        _ => return None,
    };
    Some(kind)
}

/// `points="x,y x,y ..."` as `M x,y L x,y ... [Z]`. A trailing odd coordinate is dropped.
fn points_to_path(points: &str, close: bool) -> Option<String> {
    let nums = parse_number_list(points);
    let mut pairs = nums.chunks_exact(2);
    let first = pairs.next()?;
    let mut d = format!("M {},{}", first[0], first[1]);
    for pair in pairs {
        d.push_str(&format!(" L {},{}", pair[0], pair[1]));
    }
    if close {
        d.push_str(" Z");
    }
    Some(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn nested_groups_compose_transforms() {
        let src = r#"<svg><g transform="translate(10,0)"><g transform="scale(2)">
            <circle cx="1" cy="1" r="1"/></g><rect width="1" height="1"/></g>
            <line x2="1"/></svg>"#;
        let els = scan(src);
        assert_eq!(els.len(), 3);
        assert_eq!(els[0].transform.apply(Point::new(1.0, 1.0)), Point::new(12.0, 2.0));
        assert_eq!(els[1].transform, Matrix::translate(10.0, 0.0));
        assert!(els[2].transform.is_identity());
    }

    #[test]
    fn self_closing_group_does_not_push() {
        let els = scan(r#"<g transform="translate(5,5)"/><rect width="1" height="1"/>"#);
        assert!(els[0].transform.is_identity());
    }

    #[test]
    fn defs_and_symbols_mark_hidden_with_provenance() {
        let src = r#"<defs><circle id="dot" r="2"/></defs>
            <symbol id="sym"><rect width="1" height="1"/><line x2="3"/></symbol>
            <path d="M0 0 L1 1"/>"#;
        let els = scan(src);
        assert_eq!(els.len(), 4);
        assert!(els[0].is_hidden && els[0].parent_symbol_id.is_none());
        assert_eq!(els[0].id.as_deref(), Some("dot"));
        assert!(els[1].is_hidden && els[2].is_hidden);
        assert_eq!(els[1].parent_symbol_id.as_deref(), Some("sym"));
        assert!(!els[3].is_hidden);
    }

    #[test]
    fn use_offset_applies_before_transform() {
        let els = scan(r##"<g transform="translate(100,0)"><use href="#a" x="5" y="6" transform="scale(2)"/></g>"##);
        let ElementKind::Use { href } = &els[0].kind else {
            panic!("expected use");
        };
        assert_eq!(href, "#a");
        // translate(100,0) . scale(2) . translate(5,6)
        assert_eq!(els[0].transform.apply(Point::ORIGIN), Point::new(110.0, 12.0));
    }

    #[test]
    fn polygon_and_polyline_become_paths() {
        let els = scan(r#"<polygon points="0,0 10,0 10,10"/><polyline points="1 2 3 4 5"/>"#);
        assert_eq!(els[0].kind, ElementKind::Path { d: "M 0,0 L 10,0 L 10,10 Z".to_string() });
        assert_eq!(els[1].kind, ElementKind::Path { d: "M 1,2 L 3,4".to_string() });
    }

    #[test]
    fn dashed_stroke_marks_construction_and_unknown_tags_ignored() {
        let els = scan(r#"<foo/><line x2="1" style="stroke-dasharray: 2 2"/><text>hi</text>"#);
        assert_eq!(els.len(), 1);
        assert!(els[0].is_construction);
    }

    #[test]
    fn agrees_with_xml_parser_on_well_formed_input() {
        let src = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
            <!-- header -->
            <defs><path id="p" d="M 0 0 L 1 0"/></defs>
            <g id="outer" transform="rotate(15)">
                <rect id="r1" x="1" y="2" width="3" height="4"/>
                <g><ellipse id="e1" rx="2" ry="1"/><use id="u1" xlink:href="#p"/></g>
            </g>
            <circle id="c1" r="5" data-note="a &gt; b"/>
        </svg>"##;
        let doc = roxmltree::Document::parse(src).expect("well-formed");
        let expected: Vec<&str> = doc
            .descendants()
            .filter(|n| {
                n.is_element()
                    && matches!(n.tag_name().name(), "path" | "rect" | "ellipse" | "use" | "circle")
            })
            .filter_map(|n| n.attribute("id"))
            .collect();
        let els = scan(src);
        let got: Vec<&str> = els.iter().filter_map(|e| e.id.as_deref()).collect();
        assert_eq!(got, expected);
        let rotate = Matrix::rotate(15.0);
        assert_eq!(els[1].transform, rotate);
        assert_eq!(els[2].transform, rotate);
    }
}

use crate::attrs::Attributes;
use crate::markup::{StartTag, Token, Tokenizer};
use crate::number::parse_number;
use crate::transform::{Matrix, compose};
use tracing::debug;

pub const DEFAULT_FONT_SIZE: f64 = 12.0;
pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
    End,
}

impl TextAnchor {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "middle" => TextAnchor::Middle,
            "end" => TextAnchor::End,
            _ => TextAnchor::Start,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub content: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub dx: f64,
    pub dy: f64,
}

impl TextSpan {
    /// Spans with their own `x`/`y` become separate sketch texts.
    pub fn is_positioned(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    /// All character data, spans included, whitespace collapsed.
    pub content: String,
    /// Character data outside any `<tspan>`.
    pub direct_content: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub font_family: String,
    pub text_anchor: TextAnchor,
    pub transform: Matrix,
    pub id: Option<String>,
    pub spans: Vec<TextSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartOffset {
    Absolute(f64),
    Percent(f64),
}

impl StartOffset {
    fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return StartOffset::Absolute(0.0);
        };
        match raw.strip_suffix('%') {
            Some(pct) => StartOffset::Percent(parse_number(pct).unwrap_or(0.0)),
            None => StartOffset::Absolute(parse_number(raw).unwrap_or(0.0)),
        }
    }

    pub fn resolve(self, path_length: f64) -> f64 {
        match self {
            StartOffset::Absolute(v) => v,
            StartOffset::Percent(pct) => path_length * pct / 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextPathElement {
    pub content: String,
    /// Referenced path id without the leading `#`.
    pub path_id: String,
    pub start_offset: StartOffset,
    pub font_size: f64,
    pub font_family: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextScan {
    pub texts: Vec<TextElement>,
    pub text_paths: Vec<TextPathElement>,
}

impl TextScan {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty() && self.text_paths.is_empty()
    }
}

/// Collects visible `<text>` and `<textPath>` content. Text inside `<defs>` or
/// `<symbol>` is not drawn and is skipped.
pub fn scan_text(markup: &str) -> TextScan {
    let mut scanner = TextScanner::new();
    for token in Tokenizer::new(markup) {
        match token {
            Token::Start(tag) => scanner.start(tag),
            Token::End(name) => scanner.end(&name),
            Token::Text(chunk) => scanner.chars(&chunk),
        }
    }
    scanner.out
}

struct OpenText {
    el: TextElement,
    content: String,
    direct: String,
    span: Option<TextSpan>,
    path: Option<TextPathElement>,
    has_path: bool,
    hidden: bool,
}

struct TextScanner {
    transforms: Vec<Matrix>,
    hidden_depth: usize,
    open: Option<OpenText>,
    out: TextScan,
}

impl TextScanner {
    fn new() -> Self {
        Self {
            transforms: vec![Matrix::identity()],
            hidden_depth: 0,
            open: None,
            out: TextScan::default(),
        }
    }

    fn start(&mut self, tag: StartTag) {
        match tag.name.as_str() {
            "g" if !tag.self_closing => {
                let inherited = self.transforms.last().copied().unwrap_or_default();
                self.transforms.push(compose(inherited, tag.attrs.transform()));
            }
            "defs" | "symbol" if !tag.self_closing => self.hidden_depth += 1,
            "text" if !tag.self_closing && self.open.is_none() => {
                let inherited = self.transforms.last().copied().unwrap_or_default();
                self.open = Some(OpenText {
                    el: text_element(&tag.attrs, inherited),
                    content: String::new(),
                    direct: String::new(),
                    span: None,
                    path: None,
                    has_path: false,
                    hidden: self.hidden_depth > 0,
                });
            }
            "tspan" if !tag.self_closing => {
                if let Some(open) = self.open.as_mut().filter(|o| o.path.is_none()) {
                    let attrs = &tag.attrs;
                    open.span = Some(TextSpan {
                        content: String::new(),
                        x: attrs.optional_number("x"),
                        y: attrs.optional_number("y"),
                        dx: attrs.number("dx", 0.0),
                        dy: attrs.number("dy", 0.0),
                    });
                }
            }
            "textpath" if !tag.self_closing => {
                if let Some(open) = self.open.as_mut() {
                    let href = tag.attrs.href().unwrap_or_default().trim();
                    open.has_path = true;
                    open.path = Some(TextPathElement {
                        content: String::new(),
                        path_id: href.strip_prefix('#').unwrap_or(href).to_string(),
                        start_offset: StartOffset::parse(tag.attrs.get("startOffset")),
                        font_size: open.el.font_size,
                        font_family: open.el.font_family.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    fn chars(&mut self, chunk: &str) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        if let Some(path) = open.path.as_mut() {
            path.content.push_str(chunk);
            return;
        }
        open.content.push_str(chunk);
        match open.span.as_mut() {
            Some(span) => span.content.push_str(chunk),
            None => open.direct.push_str(chunk),
        }
    }

    fn end(&mut self, name: &str) {
        match name {
            "g" => {
                if self.transforms.len() > 1 {
                    self.transforms.pop();
                }
            }
            "defs" | "symbol" => self.hidden_depth = self.hidden_depth.saturating_sub(1),
            "tspan" => {
                if let Some(open) = self.open.as_mut() {
                    if let Some(mut span) = open.span.take() {
                        span.content = collapse_whitespace(&span.content);
                        open.el.spans.push(span);
                    }
                }
            }
            "textpath" => {
                if let Some(open) = self.open.as_mut() {
                    if let Some(mut path) = open.path.take() {
                        path.content = collapse_whitespace(&path.content);
                        if !open.hidden {
                            self.out.text_paths.push(path);
                        }
                    }
                }
            }
            "text" => {
                let Some(open) = self.open.take() else {
                    return;
                };
                let mut el = open.el;
                el.content = collapse_whitespace(&open.content);
                el.direct_content = collapse_whitespace(&open.direct);
                if open.hidden {
                    debug!(content = %el.content, "skipping text inside defs/symbol");
                } else if !(el.content.is_empty() && open.has_path) {
                    // A text holding only a textPath has nothing to place at (x, y).
                    self.out.texts.push(el);
                }
            }
            _ => {}
        }
    }
}

fn text_element(attrs: &Attributes, inherited: Matrix) -> TextElement {
    let style = attrs.style();
    let font_size = attrs
        .presentation("font-size", &style)
        .and_then(|v| parse_number(&v))
        .filter(|v| *v > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE);
    let font_family = attrs
        .presentation("font-family", &style)
        .map(|v| v.replace(['"', '\''], ""))
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());
    let text_anchor = attrs
        .presentation("text-anchor", &style)
        .map(|v| TextAnchor::parse(&v))
        .unwrap_or_default();
    TextElement {
        content: String::new(),
        direct_content: String::new(),
        x: attrs.number("x", 0.0),
        y: attrs.number("y", 0.0),
        font_size,
        font_family,
        text_anchor,
        transform: compose(inherited, attrs.transform()),
        id: attrs.id(),
        spans: Vec::new(),
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn reads_defaults_and_attributes() {
        let scan = scan_text(r#"<svg><text x="5" y="10">  Hello   <b>bold</b> </text>
            <text font-size="20" font-family="Arial" text-anchor="middle">B</text></svg>"#);
        assert_eq!(scan.texts.len(), 2);
        let a = &scan.texts[0];
        assert_eq!(a.content, "Hello bold");
        assert_eq!((a.x, a.y), (5.0, 10.0));
        assert_eq!(a.font_size, DEFAULT_FONT_SIZE);
        assert_eq!(a.font_family, DEFAULT_FONT_FAMILY);
        assert_eq!(a.text_anchor, TextAnchor::Start);
        let b = &scan.texts[1];
        assert_eq!((b.font_size, b.font_family.as_str()), (20.0, "Arial"));
        assert_eq!(b.text_anchor, TextAnchor::Middle);
    }

    #[test]
    fn style_overrides_font_attributes() {
        let scan = scan_text(r#"<text font-size="10" style="font-size: 16px; text-anchor: end">x</text>"#);
        assert_eq!(scan.texts[0].font_size, 16.0);
        assert_eq!(scan.texts[0].text_anchor, TextAnchor::End);
    }

    #[test]
    fn tspans_keep_offsets() {
        let scan = scan_text(r#"<text x="1" y="2">Head<tspan x="1" dy="12">Second</tspan><tspan dx="3">tail</tspan></text>"#);
        let t = &scan.texts[0];
        assert_eq!(t.content, "HeadSecondtail");
        assert_eq!(t.direct_content, "Head");
        assert_eq!(t.spans.len(), 2);
        assert!(t.spans[0].is_positioned());
        assert_eq!((t.spans[0].x, t.spans[0].y, t.spans[0].dy), (Some(1.0), None, 12.0));
        assert!(!t.spans[1].is_positioned());
        assert_eq!(t.spans[1].dx, 3.0);
    }

    #[test]
    fn text_paths_inherit_font_and_skip_parent_text() {
        let scan = scan_text(r##"<text font-size="8"><textPath href="#curve" startOffset="25%">On path</textPath></text>
            <text><textPath xlink:href="#c2" startOffset="4">x</textPath>after</text>"##);
        assert_eq!(scan.text_paths.len(), 2);
        let p = &scan.text_paths[0];
        assert_eq!(p.path_id, "curve");
        assert_eq!(p.content, "On path");
        assert_eq!(p.font_size, 8.0);
        assert_eq!(p.start_offset, StartOffset::Percent(25.0));
        assert_eq!(p.start_offset.resolve(200.0), 50.0);
        assert_eq!(scan.text_paths[1].start_offset, StartOffset::Absolute(4.0));
        // The first text holds only a textPath and produces no plain text.
        assert_eq!(scan.texts.len(), 1);
        assert_eq!(scan.texts[0].content, "after");
    }

    #[test]
    fn group_transforms_apply_and_defs_hide() {
        let scan = scan_text(r#"<g transform="translate(10,0)"><text transform="scale(2)">a</text></g>
            <defs><text>hidden</text></defs>"#);
        assert_eq!(scan.texts.len(), 1);
        assert_eq!(scan.texts[0].transform.apply(Point::new(1.0, 1.0)), Point::new(12.0, 2.0));
    }
}

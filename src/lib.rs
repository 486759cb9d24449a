mod attrs;
mod btm;
mod codec;
mod debug;
mod element;
mod error;
mod expand;
mod intermediate;
mod markup;
mod number;
mod path;
mod pattern;
#[cfg(feature = "python")]
mod python;
mod report;
mod scan;
mod style;
mod text;
mod transform;
mod types;

pub use btm::{entities_to_json, entities_to_value, to_value as entity_to_value};
pub use btmsketch_contract as contract;
pub use codec::{BEZIER_KNOTS, SketchEntity, build as build_entities};
use debug::DebugLogger;
pub use element::{Element, ElementKind};
pub use error::{ConvertError, Result};
pub use expand::{DEFAULT_MAX_CLONES, expand, expand_with_limit, expand_with_report};
pub use intermediate::{HEADER as INTERMEDIATE_HEADER, generate as generate_intermediate};
pub use path::{
    Arcs, MoveRepeats, PathCommand, PathData, PathOptions, SmoothCurves, flatten as flatten_path,
    parse as parse_path, parse_with as parse_path_with, quad_to_cubic,
};
pub use pattern::{Pattern, detect as detect_patterns};
pub use report::{ConversionReport, SkipReason};
pub use scan::scan;
use serde_json::Value;
use std::sync::Arc;
pub use text::{
    DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, StartOffset, TextAnchor, TextElement,
    TextPathElement, TextScan, TextSpan, scan_text,
};
pub use transform::{Matrix, compose, parse_transform};
use tracing::debug;
pub use types::Point;

pub const DEFAULT_SCALE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertOptions {
    /// Sketch units per user unit.
    pub scale: f64,
    pub text_as_sketch_text: bool,
    pub detect_patterns: bool,
    pub path: PathOptions,
    /// Most elements `<use>` expansion may create for one document.
    pub max_clones: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            text_as_sketch_text: true,
            detect_patterns: true,
            path: PathOptions::default(),
            max_clones: DEFAULT_MAX_CLONES,
        }
    }
}

impl ConvertOptions {
    fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConvertError::InvalidConfiguration(format!(
                "scale must be a finite value > 0, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

/// Markup to sketch entities plus their count. Malformed or unsupported
/// fragments are skipped; only invalid options fail.
pub fn convert(markup: &str, options: &ConvertOptions) -> Result<(Vec<SketchEntity>, usize)> {
    options.validate()?;
    let conversion = run(markup, options);
    let count = conversion.entities.len();
    Ok((conversion.entities, count))
}

fn run(markup: &str, options: &ConvertOptions) -> Conversion {
    let mut report = ConversionReport::default();
    let elements = expand_with_limit(scan(markup), options.max_clones, &mut report);
    let patterns = if options.detect_patterns {
        pattern::detect(&elements)
    } else {
        Vec::new()
    };
    let texts = if options.text_as_sketch_text {
        scan_text(markup)
    } else {
        TextScan::default()
    };
    let entities = codec::build(&elements, &texts, options, &mut report);
    debug!(
        elements = elements.len(),
        entities = entities.len(),
        patterns = patterns.len(),
        skipped = report.total(),
        "converted markup"
    );
    Conversion {
        entities,
        patterns,
        report,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub entities: Vec<SketchEntity>,
    pub patterns: Vec<Pattern>,
    pub report: ConversionReport,
}

impl Conversion {
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    pub fn to_btm_value(&self) -> Result<Value> {
        btm::entities_to_value(&self.entities)
    }

    pub fn to_btm_json(&self) -> Result<String> {
        btm::entities_to_json(&self.entities)
    }

    /// Deterministic identity of the serialized entity list.
    pub fn fingerprint_sha256(&self) -> Result<String> {
        Ok(contract::payload_fingerprint_sha256(&self.to_btm_value()?))
    }

    pub fn into_parts(self) -> (Vec<SketchEntity>, Vec<Pattern>, ConversionReport) {
        (self.entities, self.patterns, self.report)
    }
}

pub struct Converter {
    options: ConvertOptions,
    debug: Option<Arc<DebugLogger>>,
}

#[derive(Debug, Clone, Default)]
pub struct ConverterBuilder {
    options: ConvertOptions,
    debug_path: Option<std::path::PathBuf>,
}

impl ConverterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.options.scale = scale;
        self
    }

    pub fn text_as_sketch_text(mut self, enabled: bool) -> Self {
        self.options.text_as_sketch_text = enabled;
        self
    }

    pub fn detect_patterns(mut self, enabled: bool) -> Self {
        self.options.detect_patterns = enabled;
        self
    }

    pub fn smooth_curves(mut self, mode: SmoothCurves) -> Self {
        self.options.path.smooth_curves = mode;
        self
    }

    pub fn arcs(mut self, mode: Arcs) -> Self {
        self.options.path.arcs = mode;
        self
    }

    pub fn move_repeats(mut self, mode: MoveRepeats) -> Self {
        self.options.path.move_repeats = mode;
        self
    }

    pub fn max_clones(mut self, limit: usize) -> Self {
        self.options.max_clones = limit;
        self
    }

    pub fn debug_log(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Converter> {
        self.options.validate()?;
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        Ok(Converter {
            options: self.options,
            debug,
        })
    }
}

impl Converter {
    pub fn builder() -> ConverterBuilder {
        ConverterBuilder::new()
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    fn log_conversion(&self, doc_id: usize, conversion: &Conversion) {
        if let Some(logger) = self.debug.as_deref() {
            logger.log_conversion(
                doc_id,
                conversion.entities.len(),
                conversion.patterns.len(),
                &conversion.report,
            );
        }
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }

    pub fn convert(&self, markup: &str) -> Result<Conversion> {
        let conversion = run(markup, &self.options);
        self.log_conversion(0, &conversion);
        self.emit_debug_summary("convert");
        Ok(conversion)
    }

    /// Converts independent inputs on the rayon pool; results keep input order.
    pub fn convert_many_parallel(&self, markups: &[String]) -> Result<Vec<Conversion>> {
        use rayon::prelude::*;

        let mut results: Vec<(usize, Conversion)> = markups
            .par_iter()
            .enumerate()
            .map(|(idx, markup)| (idx, run(markup, &self.options)))
            .collect();
        results.sort_by_key(|(idx, _)| *idx);

        let mut conversions = Vec::with_capacity(results.len());
        for (idx, conversion) in results {
            self.log_conversion(idx, &conversion);
            conversions.push(conversion);
        }
        self.emit_debug_summary("convert_many_parallel");
        Ok(conversions)
    }

    pub fn convert_intermediate(&self, markup: &str) -> Result<String> {
        let mut report = ConversionReport::default();
        let elements = expand_with_limit(scan(markup), self.options.max_clones, &mut report);
        let patterns = if self.options.detect_patterns {
            pattern::detect(&elements)
        } else {
            Vec::new()
        };
        Ok(intermediate::generate_with(
            &elements,
            &patterns,
            self.options.scale,
            &self.options.path,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_log_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "btmsketch_{tag}_{}_{}.jsonl",
            std::process::id(),
            nanos
        ))
    }

    const DRAWING: &str = r##"<svg xmlns="http://www.w3.org/2000/svg">
        <defs><circle id="hole" r="2"/></defs>
        <g transform="translate(5,5)">
            <rect x="0" y="0" width="100" height="50"/>
            <path d="M 10 10 C 20 0 30 0 40 10 Q 50 20 60 10 Z" stroke-dasharray="4 2"/>
        </g>
        <use href="#hole" x="20" y="25"/><use href="#hole" x="40" y="25"/><use href="#hole" x="60" y="25"/>
        <ellipse cx="50" cy="80" rx="30" ry="10"/>
        <text x="5" y="120" font-size="10">Part A</text>
    </svg>"##;

    #[test]
    fn rect_at_default_scale_gives_four_flipped_segments() {
        let markup = r#"<rect x="0" y="0" width="10" height="5"/>"#;
        let (entities, count) = convert(markup, &ConvertOptions::default()).expect("convert");
        assert_eq!(count, 4);
        let starts: Vec<Point> = entities
            .iter()
            .filter_map(|e| e.endpoints().map(|(a, _)| a))
            .collect();
        let expected = [(0.0, 0.0), (0.01, 0.0), (0.01, -0.005), (0.0, -0.005)];
        for (p, (x, y)) in starts.iter().zip(expected) {
            assert!((p.x - x).abs() < 1e-12 && (p.y - y).abs() < 1e-12, "{p:?}");
        }
    }

    #[test]
    fn missing_use_reference_yields_nothing() {
        let (entities, count) =
            convert(r##"<use href="#missing"/>"##, &ConvertOptions::default()).expect("convert");
        assert!(entities.is_empty());
        assert_eq!(count, 0);
    }

    #[test]
    fn empty_input_yields_empty_list() {
        let (entities, _) = convert("", &ConvertOptions::default()).expect("convert");
        assert!(entities.is_empty());
    }

    #[test]
    fn invalid_scale_is_rejected() {
        for scale in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = Converter::builder().scale(scale).build().err();
            assert!(matches!(err, Some(ConvertError::InvalidConfiguration(_))), "{scale}");
        }
        let options = ConvertOptions {
            scale: 0.0,
            ..ConvertOptions::default()
        };
        assert!(convert("<line x2='1'/>", &options).is_err());
    }

    #[test]
    fn every_entity_passes_the_contract() {
        let conversion = Converter::builder()
            .build()
            .expect("converter")
            .convert(DRAWING)
            .expect("convert");
        let kinds: Vec<&str> = conversion.entities.iter().map(SketchEntity::kind).collect();
        for kind in ["line", "bezier", "circle", "ellipse", "text"] {
            assert!(kinds.contains(&kind), "missing {kind} in {kinds:?}");
        }
        let payload = conversion.to_btm_value().expect("payload");
        let violations = contract::validate_payload(&payload);
        assert!(violations.is_empty(), "{violations:?}");
        assert_eq!(conversion.patterns.len(), 1);
    }

    #[test]
    fn fingerprint_is_stable() {
        let converter = Converter::builder().build().expect("converter");
        let a = converter.convert(DRAWING).expect("a").fingerprint_sha256().expect("fp a");
        let b = converter.convert(DRAWING).expect("b").fingerprint_sha256().expect("fp b");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let other = converter
            .convert("<line x2='1'/>")
            .expect("c")
            .fingerprint_sha256()
            .expect("fp c");
        assert_ne!(a, other);
    }

    #[test]
    fn parallel_batch_matches_sequential() {
        let converter = Converter::builder().scale(0.01).build().expect("converter");
        let inputs: Vec<String> = (0..12)
            .map(|i| format!(r#"<circle cx="{i}" r="{}"/><line x2="{i}" y2="1"/>"#, i + 1))
            .chain(std::iter::once(DRAWING.to_string()))
            .collect();
        let parallel = converter.convert_many_parallel(&inputs).expect("parallel");
        let sequential: Vec<Conversion> = inputs
            .iter()
            .map(|m| converter.convert(m).expect("sequential"))
            .collect();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn text_can_be_disabled() {
        let converter = Converter::builder()
            .text_as_sketch_text(false)
            .detect_patterns(false)
            .build()
            .expect("converter");
        let conversion = converter.convert(DRAWING).expect("convert");
        assert!(conversion.entities.iter().all(|e| e.kind() != "text"));
        assert!(conversion.patterns.is_empty());
    }

    #[test]
    fn arcs_option_reaches_the_codec() {
        let markup = r#"<path d="M 0 0 A 5 5 0 0 1 10 0"/>"#;
        let chord = Converter::builder().build().expect("chord").convert(markup).expect("c");
        assert_eq!(chord.count(), 1);
        assert_eq!(chord.entities[0].kind(), "line");
        let cubic = Converter::builder()
            .arcs(Arcs::Cubic)
            .build()
            .expect("cubic")
            .convert(markup)
            .expect("c");
        assert!(cubic.count() >= 2);
        assert!(cubic.entities.iter().all(|e| e.kind() == "bezier"));
    }

    #[test]
    fn intermediate_lists_pattern_once() {
        let converter = Converter::builder().scale(1.0).build().expect("converter");
        let text = converter.convert_intermediate(DRAWING).expect("intermediate");
        assert!(text.starts_with(INTERMEDIATE_HEADER));
        assert!(text.contains("ARRAY_LINEAR 3 20.000000 1.000000 0.000000"));
        assert_eq!(text.matches("CIRCLE").count(), 1);
        assert!(text.contains("ELLIPSE 50.000000 80.000000 30.000000 10.000000"));
    }

    #[test]
    fn debug_log_records_conversions() {
        let log_path = temp_log_path("convert_summary");
        let converter = Converter::builder()
            .debug_log(&log_path)
            .build()
            .expect("converter");
        let _ = converter
            .convert(r#"<path d="M 0 0 L 1 1 X 3"/><circle r="0"/>"#)
            .expect("convert");
        drop(converter);
        let log = std::fs::read_to_string(&log_path).expect("read debug log");
        assert!(log.contains("\"type\":\"convert.summary\""));
        assert!(log.contains("\"degenerate_geometry\":1"));
        assert!(log.contains("\"type\":\"debug.summary\""));
        let _ = std::fs::remove_file(log_path);
    }

    #[test]
    fn clone_budget_bounds_nested_symbols() {
        let mut markup = String::from(r#"<symbol id="s0"><line x2="1"/></symbol>"#);
        for level in 1..=4 {
            markup.push_str(&format!(r#"<symbol id="s{level}">"#));
            for i in 0..10 {
                markup.push_str(&format!(r##"<use href="#s{}" y="{i}"/>"##, level - 1));
            }
            markup.push_str("</symbol>");
        }
        markup.push_str(r##"<use href="#s4"/>"##);

        let converter = Converter::builder()
            .max_clones(200)
            .detect_patterns(false)
            .build()
            .expect("converter");
        let conversion = converter.convert(&markup).expect("convert");
        assert!(conversion.count() <= 200);
        assert!(conversion.report.count(SkipReason::CloneBudget) > 0);

        let unbounded = Converter::builder().detect_patterns(false).build().expect("converter");
        let full = unbounded.convert(&markup).expect("convert");
        assert_eq!(full.count(), 10_000);
        assert_eq!(full.report.count(SkipReason::CloneBudget), 0);
    }

    #[test]
    fn move_repeats_option_reaches_the_codec() {
        let markup = r#"<path d="M 0 0 10 0 10 10"/>"#;
        let moves = Converter::builder().build().expect("moves").convert(markup).expect("c");
        assert_eq!(moves.count(), 0);
        let lines = Converter::builder()
            .move_repeats(MoveRepeats::LineTo)
            .build()
            .expect("lines")
            .convert(markup)
            .expect("c");
        assert_eq!(lines.count(), 2);
    }
}

use crate::element::{Element, ElementKind};
use crate::report::{ConversionReport, SkipReason};
use crate::transform::{Matrix, compose};
use tracing::warn;

const MAX_REFERENCE_DEPTH: usize = 8;

/// Clone cap used when the caller sets none. Nested symbols multiply, so a
/// few hundred bytes of markup can otherwise ask for millions of elements.
pub const DEFAULT_MAX_CLONES: usize = 100_000;

/// Appends a clone of every element a `<use>` references. The input order is
/// kept; references are resolved against the original elements only.
pub fn expand(elements: Vec<Element>) -> Vec<Element> {
    expand_with_report(elements, &mut ConversionReport::default())
}

pub fn expand_with_report(elements: Vec<Element>, report: &mut ConversionReport) -> Vec<Element> {
    expand_with_limit(elements, DEFAULT_MAX_CLONES, report)
}

/// Stops cloning once `max_clones` clones exist. Each `<use>` cut short or
/// never expanded counts once as [`SkipReason::CloneBudget`].
pub fn expand_with_limit(
    elements: Vec<Element>,
    max_clones: usize,
    report: &mut ConversionReport,
) -> Vec<Element> {
    let mut expander = Expander {
        elements: &elements,
        max_clones,
        clones: Vec::new(),
        report,
    };
    let mut exhausted = false;
    for (index, el) in elements.iter().enumerate() {
        let ElementKind::Use { href } = &el.kind else {
            continue;
        };
        let key = strip_fragment(href);
        if key.is_empty() {
            warn!(index, "skipping <use> with empty href");
            expander.report.record(SkipReason::EmptyHref);
            continue;
        }
        if exhausted {
            expander.report.record(SkipReason::CloneBudget);
            continue;
        }
        let origin = Origin {
            key,
            instance: index,
            hidden: el.is_hidden,
        };
        let mut chain = vec![key.to_string()];
        if !expander.resolve(key, el.transform, &origin, &mut chain) {
            warn!(index, max_clones, "clone budget exhausted; later <use> elements are skipped");
            expander.report.record(SkipReason::CloneBudget);
            exhausted = true;
        }
    }
    let clones = expander.clones;
    let mut out = elements;
    out.extend(clones);
    out
}

struct Origin<'a> {
    key: &'a str,
    instance: usize,
    hidden: bool,
}

fn strip_fragment(href: &str) -> &str {
    let href = href.trim();
    href.strip_prefix('#').unwrap_or(href)
}

/// Symbol members first, then the single element carrying the id.
fn targets<'a>(elements: &'a [Element], key: &str) -> Vec<&'a Element> {
    let members: Vec<&Element> = elements
        .iter()
        .filter(|e| e.parent_symbol_id.as_deref() == Some(key))
        .collect();
    if !members.is_empty() {
        return members;
    }
    elements
        .iter()
        .find(|e| e.id.as_deref() == Some(key))
        .into_iter()
        .collect()
}

struct Expander<'a> {
    elements: &'a [Element],
    max_clones: usize,
    clones: Vec<Element>,
    report: &'a mut ConversionReport,
}

impl Expander<'_> {
    /// Returns `false` once the clone budget runs out.
    fn resolve(
        &mut self,
        key: &str,
        use_transform: Matrix,
        origin: &Origin<'_>,
        chain: &mut Vec<String>,
    ) -> bool {
        let found = targets(self.elements, key);
        if found.is_empty() {
            warn!(reference = key, "<use> reference not found; skipping");
            self.report.record(SkipReason::UnresolvedReference);
            return true;
        }
        for base in found {
            let transform = compose(use_transform, base.transform);
            if let ElementKind::Use { href } = &base.kind {
                let inner = strip_fragment(href);
                if inner.is_empty() {
                    self.report.record(SkipReason::EmptyHref);
                    continue;
                }
                if chain.iter().any(|k| k == inner) || chain.len() >= MAX_REFERENCE_DEPTH {
                    warn!(reference = inner, depth = chain.len(), "<use> reference cycle; skipping");
                    self.report.record(SkipReason::ReferenceCycle);
                    continue;
                }
                chain.push(inner.to_string());
                let complete = self.resolve(inner, transform, origin, chain);
                chain.pop();
                if !complete {
                    return false;
                }
                continue;
            }
            if self.clones.len() >= self.max_clones {
                return false;
            }
            let mut clone = base.clone();
            clone.transform = transform;
            clone.source_group_key = Some(origin.key.to_string());
            clone.is_hidden = origin.hidden;
            clone.parent_symbol_id = None;
            clone.source_instance = Some(origin.instance);
            self.clones.push(clone);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan;
    use crate::types::Point;

    fn clones(elements: &[Element]) -> Vec<&Element> {
        elements.iter().filter(|e| e.source_group_key.is_some()).collect()
    }

    #[test]
    fn missing_reference_yields_nothing() {
        let mut report = ConversionReport::default();
        let out = expand_with_report(scan(r##"<use href="#missing"/>"##), &mut report);
        assert!(out.iter().all(|e| !e.is_drawable()));
        assert!(clones(&out).is_empty());
        assert_eq!(report.count(SkipReason::UnresolvedReference), 1);
    }

    #[test]
    fn id_reference_clones_with_composed_transform() {
        let src = r##"<defs><circle id="dot" cx="1" r="2" transform="scale(2)"/></defs>
            <use href="#dot" x="10"/>"##;
        let out = expand(scan(src));
        let made = clones(&out);
        assert_eq!(made.len(), 1);
        let clone = made[0];
        assert!(!clone.is_hidden);
        assert_eq!(clone.source_group_key.as_deref(), Some("dot"));
        assert_eq!(clone.source_instance, Some(1));
        assert_eq!(clone.transform.apply(Point::new(1.0, 0.0)), Point::new(12.0, 0.0));
    }

    #[test]
    fn symbol_reference_clones_every_member() {
        let src = r##"<symbol id="s"><rect width="1" height="1"/><line x2="1"/></symbol>
            <use xlink:href="#s" transform="translate(0,5)"/>"##;
        let out = expand(scan(src));
        let made = clones(&out);
        assert_eq!(made.len(), 2);
        assert!(made.iter().all(|e| e.parent_symbol_id.is_none() && !e.is_hidden));
        assert!(made.iter().all(|e| e.transform == Matrix::translate(0.0, 5.0)));
    }

    #[test]
    fn symbol_group_wins_over_id() {
        let src = r##"<rect id="s" width="9" height="9"/>
            <symbol id="s"><circle r="1"/></symbol><use href="#s"/>"##;
        let out = expand(scan(src));
        let made = clones(&out);
        assert_eq!(made.len(), 1);
        assert!(matches!(made[0].kind, ElementKind::Circle { .. }));
    }

    #[test]
    fn nested_references_resolve_and_cycles_stop() {
        let src = r##"<defs><circle id="c" r="1"/><use id="u" href="#c" x="1"/></defs>
            <use href="#u" x="10"/>
            <use id="a" href="#b"/><use id="b" href="#a"/>"##;
        let mut report = ConversionReport::default();
        let out = expand_with_report(scan(src), &mut report);
        let visible: Vec<&Element> = clones(&out).into_iter().filter(|e| !e.is_hidden).collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].source_group_key.as_deref(), Some("u"));
        assert_eq!(visible[0].transform.apply(Point::ORIGIN), Point::new(11.0, 0.0));
        assert_eq!(report.count(SkipReason::ReferenceCycle), 2);
    }

    #[test]
    fn empty_href_is_counted() {
        let mut report = ConversionReport::default();
        expand_with_report(scan(r#"<use href=""/>"#), &mut report);
        assert_eq!(report.count(SkipReason::EmptyHref), 1);
    }

    /// `levels` nested symbols, each using the previous one ten times.
    fn fan_out(levels: usize) -> String {
        let mut src = String::from(r#"<symbol id="s0"><circle r="1"/></symbol>"#);
        for level in 1..=levels {
            src.push_str(&format!(r#"<symbol id="s{level}">"#));
            for i in 0..10 {
                src.push_str(&format!(r##"<use href="#s{}" x="{i}"/>"##, level - 1));
            }
            src.push_str("</symbol>");
        }
        src.push_str(&format!(r##"<use href="#s{levels}"/><use href="#s0"/>"##));
        src
    }

    #[test]
    fn clone_budget_caps_nested_fan_out() {
        let elements = scan(&fan_out(5));
        let originals = elements.len();
        let mut report = ConversionReport::default();
        let out = expand_with_limit(elements, 50, &mut report);
        assert_eq!(out.len() - originals, 50);
        // The use that ran out plus every use after it.
        assert!(report.count(SkipReason::CloneBudget) >= 2);
        assert_eq!(report.count(SkipReason::ReferenceCycle), 0);
    }

    #[test]
    fn default_budget_applies_without_a_limit() {
        let mut report = ConversionReport::default();
        let out = expand_with_report(scan(&fan_out(6)), &mut report);
        assert!(clones(&out).len() <= DEFAULT_MAX_CLONES);
        assert!(report.count(SkipReason::CloneBudget) > 0);

        let mut small = ConversionReport::default();
        expand_with_report(scan(&fan_out(2)), &mut small);
        assert_eq!(small.count(SkipReason::CloneBudget), 0);
    }
}

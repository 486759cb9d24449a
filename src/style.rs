use lightningcss::printer::PrinterOptions;
use lightningcss::properties::Property;
use lightningcss::properties::svg::StrokeDasharray;
use lightningcss::stylesheet::{ParserOptions, StyleAttribute};

/// Parsed `style=""` declarations. Later declarations win, `!important` ones last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    props: Vec<(String, String)>,
    dashed: Option<bool>,
}

impl InlineStyle {
    pub fn parse(input: &str) -> Self {
        let mut style = InlineStyle::default();
        if input.trim().is_empty() {
            return style;
        }
        if let Ok(style_attr) = StyleAttribute::parse(input, ParserOptions::default()) {
            style.apply_property_list(&style_attr.declarations.declarations);
            style.apply_property_list(&style_attr.declarations.important_declarations);
            return style;
        }
        style.apply_legacy(input);
        style
    }

    fn apply_property_list(&mut self, props: &[Property]) {
        for prop in props {
            self.apply_property(prop);
        }
    }

    fn apply_property(&mut self, prop: &Property<'_>) {
        if let Property::StrokeDasharray(value) = prop {
            self.dashed = Some(match value {
                StrokeDasharray::None => false,
                StrokeDasharray::Values(values) => !values.is_empty(),
            });
            return;
        }
        let name = prop.property_id().name().to_ascii_lowercase();
        if let Ok(value) = prop.value_to_css_string(PrinterOptions::default()) {
            // `var()` and CSS-wide keywords arrive as unparsed token lists.
            if name == "stroke-dasharray" {
                self.declare_dashes(&value);
            } else {
                self.set(name, value);
            }
        }
    }

    fn apply_legacy(&mut self, input: &str) {
        for decl in input.split(';') {
            let decl = decl.trim();
            if decl.is_empty() {
                continue;
            }
            let Some((k, v)) = decl.split_once(':') else {
                continue;
            };
            let key = k.trim().to_ascii_lowercase();
            let val = v.trim().trim_end_matches("!important").trim();
            if key == "stroke-dasharray" {
                self.declare_dashes(val);
            } else {
                self.set(key, val.to_string());
            }
        }
    }

    /// Keywords that defer to the parent leave the flag undeclared.
    fn declare_dashes(&mut self, value: &str) {
        let value = value.trim();
        if ["inherit", "initial", "unset", "revert", "revert-layer"]
            .iter()
            .any(|k| value.eq_ignore_ascii_case(k))
        {
            return;
        }
        self.dashed = Some(!value.is_empty() && !value.eq_ignore_ascii_case("none"));
    }

    fn set(&mut self, name: String, value: String) {
        let value = unquote(value.trim()).to_string();
        match self.props.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.props.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Whether a declared `stroke-dasharray` draws dashes; `None` when undeclared.
    pub fn dasharray(&self) -> Option<bool> {
        self.dashed
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// Single-pass tag tokenizer for the SVG subset. No tree is built; consumers keep
// their own stacks while walking the token stream.

use crate::attrs::Attributes;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StartTag {
    /// Lowercase local name (`svg:Path` reads as `path`).
    pub name: String,
    pub attrs: Attributes,
    pub self_closing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'a> {
    Start(StartTag),
    End(String),
    Text(Cow<'a, str>),
}

pub(crate) struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Advances past `terminator`, or to the end of input when it never appears.
    fn skip_past(&mut self, terminator: &str) {
        match self.rest().find(terminator) {
            Some(idx) => self.pos += idx + terminator.len(),
            None => self.pos = self.src.len(),
        }
    }

    fn read_text(&mut self) -> Token<'a> {
        let rest = self.rest();
        // A '<' that does not open markup is literal text.
        let mut end = rest.len();
        let mut search = rest.chars().next().map_or(1, char::len_utf8);
        while let Some(idx) = rest[search..].find('<') {
            let at = search + idx;
            if opens_markup(&rest[at..]) {
                end = at;
                break;
            }
            search = at + 1;
        }
        self.pos += end;
        Token::Text(decode_entities(&rest[..end]))
    }

    fn read_start_tag(&mut self) -> Option<Token<'a>> {
        let rest = self.rest();
        let end = find_tag_end(rest)?;
        let inner = &rest[1..end];
        self.pos += end + 1;

        let trimmed = inner.trim_end();
        let self_closing = trimmed.ends_with('/');
        let inner = if self_closing {
            &trimmed[..trimmed.len() - 1]
        } else {
            trimmed
        };
        let name_end = inner
            .find(|c: char| c.is_whitespace() || c == '/')
            .unwrap_or(inner.len());
        Some(Token::Start(StartTag {
            name: local_name(&inner[..name_end]),
            attrs: Attributes::parse(&inner[name_end..]),
            self_closing,
        }))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return None;
            }
            if !rest.starts_with('<') || !opens_markup(rest) {
                return Some(self.read_text());
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->");
                continue;
            }
            if let Some(body) = rest.strip_prefix("<![CDATA[") {
                let len = body.find("]]>").unwrap_or(body.len());
                let text = &body[..len];
                self.pos = (self.pos + "<![CDATA[".len() + len + "]]>".len()).min(self.src.len());
                return Some(Token::Text(Cow::Borrowed(text)));
            }
            if rest.starts_with("<?") {
                self.skip_past("?>");
                continue;
            }
            if rest.starts_with("<!") {
                self.skip_past(">");
                continue;
            }
            if let Some(body) = rest.strip_prefix("</") {
                let len = body.find('>').unwrap_or(body.len());
                let name = local_name(body[..len].trim());
                self.pos = (self.pos + 2 + len + 1).min(self.src.len());
                return Some(Token::End(name));
            }
            // Unterminated start tag ends the stream.
            return self.read_start_tag();
        }
    }
}

fn opens_markup(s: &str) -> bool {
    let mut chars = s.chars();
    if chars.next() != Some('<') {
        return false;
    }
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '/' || c == '!' || c == '?')
}

/// Index of the `>` closing a start tag, skipping any inside quoted values.
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (idx, b) in tag.bytes().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(idx),
            None => {}
        }
    }
    None
}

fn local_name(raw: &str) -> String {
    let local = raw.rsplit(':').next().unwrap_or(raw);
    local.to_ascii_lowercase()
}

pub(crate) fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => {
                    let code = if let Some(hex) = entity
                        .strip_prefix("#x")
                        .or_else(|| entity.strip_prefix("#X"))
                    {
                        u32::from_str_radix(hex, 16).ok()
                    } else if let Some(dec) = entity.strip_prefix('#') {
                        dec.parse::<u32>().ok()
                    } else {
                        None
                    };
                    code.and_then(char::from_u32)
                }
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

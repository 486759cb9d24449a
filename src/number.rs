// Numeric tokenizing shared by the transform, attribute and path grammars.

/// Byte cursor over a numeric list such as `10,20 -3.5e2`.
pub(crate) struct NumberCursor<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> NumberCursor<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
        }
    }

    pub(crate) fn skip_ws(&mut self) {
        while self.eat(|b| matches!(b, b' ' | b'\n' | b'\r' | b'\t' | b',')) {}
    }

    /// Consumes one byte when `accept` takes it.
    fn eat(&mut self, accept: impl Fn(u8) -> bool) -> bool {
        match self.peek() {
            Some(b) if accept(b) => {
                self.i += 1;
                true
            }
            _ => false,
        }
    }

    fn eat_digits(&mut self) -> usize {
        let from = self.i;
        while self.eat(|b| b.is_ascii_digit()) {}
        self.i - from
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    pub(crate) fn bump(&mut self) {
        self.i = (self.i + 1).min(self.bytes.len());
    }

    pub(crate) fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.i >= self.bytes.len()
    }

    pub(crate) fn position(&self) -> usize {
        self.i
    }

    pub(crate) fn rewind(&mut self, position: usize) {
        self.i = position.min(self.bytes.len());
    }

    /// Reads `[sign] digits [. digits] [e [sign] digits]`. Leaves the cursor
    /// untouched and returns `None` when no digit is present.
    pub(crate) fn next_number(&mut self) -> Option<f64> {
        self.skip_ws();
        let start = self.i;
        self.eat(|b| b == b'+' || b == b'-');
        let mut digits = self.eat_digits();
        if self.eat(|b| b == b'.') {
            digits += self.eat_digits();
        }
        if digits == 0 {
            self.i = start;
            return None;
        }
        // `10em` keeps the `em`: an exponent needs digits.
        let mantissa_end = self.i;
        if self.eat(|b| b == b'e' || b == b'E') {
            self.eat(|b| b == b'+' || b == b'-');
            if self.eat_digits() == 0 {
                self.i = mantissa_end;
            }
        }
        std::str::from_utf8(&self.bytes[start..self.i]).ok()?.parse().ok()
    }

    /// Arc flags may be packed without separators (`01`).
    pub(crate) fn next_flag(&mut self) -> Option<bool> {
        self.skip_ws();
        if self.eat(|b| b == b'0') {
            Some(false)
        } else if self.eat(|b| b == b'1') {
            Some(true)
        } else {
            self.next_number().map(|v| v.abs() > 0.5)
        }
    }

    pub(crate) fn next_pair(&mut self) -> Option<(f64, f64)> {
        let mark = self.i;
        let x = self.next_number()?;
        match self.next_number() {
            Some(y) => Some((x, y)),
            None => {
                self.i = mark;
                None
            }
        }
    }

    /// Reads exactly `N` numbers or rewinds.
    pub(crate) fn next_numbers<const N: usize>(&mut self) -> Option<[f64; N]> {
        let mark = self.i;
        let mut out = [0.0; N];
        for slot in out.iter_mut() {
            match self.next_number() {
                Some(v) => *slot = v,
                None => {
                    self.i = mark;
                    return None;
                }
            }
        }
        Some(out)
    }
}

/// Attribute number. Unit suffixes are ignored and malformed text reads as `0.0`.
pub(crate) fn parse_lenient(input: &str) -> f64 {
    parse_number(input).unwrap_or(0.0)
}

pub(crate) fn parse_number(input: &str) -> Option<f64> {
    let s = input.trim();
    let s = s
        .trim_end_matches("px")
        .trim_end_matches("pt")
        .trim_end_matches("mm")
        .trim_end_matches("cm")
        .trim_end_matches("in")
        .trim();
    if let Ok(v) = s.parse::<f64>() {
        return v.is_finite().then_some(v);
    }
    NumberCursor::new(s).next_number().filter(|v| v.is_finite())
}

pub(crate) fn parse_number_list(input: &str) -> Vec<f64> {
    let mut cursor = NumberCursor::new(input);
    let mut out = Vec::new();
    while !cursor.at_end() {
        match cursor.next_number() {
            Some(v) => out.push(v),
            None => cursor.bump(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_signs_decimals_and_exponents() {
        assert_eq!(parse_number_list("1,-2.5 3e2 .5-4"), vec![1.0, -2.5, 300.0, 0.5, -4.0]);
    }

    #[test]
    fn lenient_parse_ignores_units_and_garbage() {
        assert_eq!(parse_lenient("12px"), 12.0);
        assert_eq!(parse_lenient(" 3.5mm "), 3.5);
        assert_eq!(parse_lenient("abc"), 0.0);
        assert_eq!(parse_lenient(""), 0.0);
        assert_eq!(parse_lenient("7abc"), 7.0);
    }

    #[test]
    fn compact_flags_and_pairs() {
        let mut cursor = NumberCursor::new("01 20,30");
        assert_eq!(cursor.next_flag(), Some(false));
        assert_eq!(cursor.next_flag(), Some(true));
        assert_eq!(cursor.next_pair(), Some((20.0, 30.0)));
        assert!(cursor.at_end());
    }

    #[test]
    fn incomplete_group_rewinds() {
        let mut cursor = NumberCursor::new("1 2 3 L");
        assert_eq!(cursor.next_numbers::<4>(), None);
        assert_eq!(cursor.next_numbers::<3>(), Some([1.0, 2.0, 3.0]));
    }

    #[test]
    fn exponent_without_digits_is_not_consumed() {
        let mut cursor = NumberCursor::new("10em");
        assert_eq!(cursor.next_number(), Some(10.0));
        assert_eq!(cursor.peek(), Some(b'e'));
    }

    #[test]
    fn bare_signs_and_dots_are_not_numbers() {
        for input in ["-", "+.", ".", "-e5"] {
            let mut cursor = NumberCursor::new(input);
            assert_eq!(cursor.next_number(), None, "{input}");
            assert_eq!(cursor.position(), 0, "{input}");
        }
        let mut cursor = NumberCursor::new("-.5E+1x 5.");
        assert_eq!(cursor.next_number(), Some(-5.0));
        assert_eq!(cursor.peek(), Some(b'x'));
        cursor.bump();
        assert_eq!(cursor.next_number(), Some(5.0));
        assert!(cursor.at_end());
    }
}

use crate::number::parse_number_list;
use crate::types::Point;
use serde::Serialize;

/// 2x3 affine matrix `[a b c d e f]`: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub const fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn rotate(deg: f64) -> Self {
        Self::rotate_about(deg, 0.0, 0.0)
    }

    /// `translate(cx,cy) rotate(deg) translate(-cx,-cy)` in closed form.
    pub fn rotate_about(deg: f64, cx: f64, cy: f64) -> Self {
        let rad = deg.to_radians();
        let s = libm::sin(rad);
        let c = libm::cos(rad);
        Self::new(c, s, -s, c, cx - c * cx + s * cy, cy - s * cx - c * cy)
    }

    pub fn skew_x(deg: f64) -> Self {
        Self::new(1.0, 0.0, libm::tan(deg.to_radians()), 1.0, 0.0, 0.0)
    }

    pub fn skew_y(deg: f64) -> Self {
        Self::new(1.0, libm::tan(deg.to_radians()), 0.0, 1.0, 0.0, 0.0)
    }

    /// `self ∘ other`: `other` applies first.
    pub fn mul(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    pub fn is_identity(self) -> bool {
        self == Self::identity()
    }

    /// Length of the transformed x basis vector.
    pub fn x_scale(self) -> f64 {
        libm::hypot(self.a, self.b)
    }

    /// Length of the transformed y basis vector.
    pub fn y_scale(self) -> f64 {
        libm::hypot(self.c, self.d)
    }

    pub fn translation(self) -> Point {
        Point::new(self.e, self.f)
    }

    pub fn to_array(self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

/// Composes a parent transform with a child's local transform.
pub fn compose(outer: Matrix, inner: Matrix) -> Matrix {
    outer.mul(inner)
}

/// Parses a `transform` attribute. Functions compose left to right; unknown
/// names and under-specified calls contribute nothing.
pub fn parse_transform(input: &str) -> Matrix {
    let mut out = Matrix::identity();
    let mut s = input.trim();

    while !s.is_empty() {
        let Some(open) = s.find('(') else { break };
        let name = s[..open].trim_matches(|c: char| c.is_whitespace() || c == ',');
        let Some(close) = s[open + 1..].find(')') else {
            break;
        };
        let args = parse_number_list(&s[open + 1..open + 1 + close]);

        let m = match name.to_ascii_lowercase().as_str() {
            "translate" => match args.as_slice() {
                [] => None,
                [tx] => Some(Matrix::translate(*tx, 0.0)),
                [tx, ty, ..] => Some(Matrix::translate(*tx, *ty)),
            },
            "scale" => match args.as_slice() {
                [] => None,
                [s] => Some(Matrix::scale(*s, *s)),
                [sx, sy, ..] => Some(Matrix::scale(*sx, *sy)),
            },
            "rotate" => match args.as_slice() {
                [] => None,
                [a, cx, cy, ..] => Some(Matrix::rotate_about(*a, *cx, *cy)),
                [a, ..] => Some(Matrix::rotate(*a)),
            },
            "skewx" => args.first().map(|a| Matrix::skew_x(*a)),
            "skewy" => args.first().map(|a| Matrix::skew_y(*a)),
            "matrix" => match args.as_slice() {
                [a, b, c, d, e, f, ..] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
                _ => None,
            },
            _ => None,
        };

        if let Some(m) = m {
            out = out.mul(m);
        }
        s = s[open + 1 + close + 1..].trim_start();
    }

    out
}

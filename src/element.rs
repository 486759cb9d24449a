use crate::transform::Matrix;

/// Geometry carried by a scanned element, in local (pre-transform) user units.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Path { d: String },
    Rect { x: f64, y: f64, width: f64, height: f64 },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    Circle { cx: f64, cy: f64, r: f64 },
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64 },
    Use { href: String },
}

impl ElementKind {
    pub fn tag_name(&self) -> &'static str {
        match self {
            ElementKind::Path { .. } => "path",
            ElementKind::Rect { .. } => "rect",
            ElementKind::Line { .. } => "line",
            ElementKind::Circle { .. } => "circle",
            ElementKind::Ellipse { .. } => "ellipse",
            ElementKind::Use { .. } => "use",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    /// Fully composed transform (inherited groups included).
    pub transform: Matrix,
    pub is_construction: bool,
    pub id: Option<String>,
    /// Inside `<defs>` or `<symbol>`; never drawn directly.
    pub is_hidden: bool,
    /// Reference key of the `<use>` that produced this clone.
    pub source_group_key: Option<String>,
    pub parent_symbol_id: Option<String>,
    /// Index of the originating `<use>` in the scanned list. Clones of one
    /// multi-element symbol instance share it.
    pub source_instance: Option<usize>,
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            transform: Matrix::identity(),
            is_construction: false,
            id: None,
            is_hidden: false,
            source_group_key: None,
            parent_symbol_id: None,
            source_instance: None,
        }
    }

    pub fn with_transform(mut self, transform: Matrix) -> Self {
        self.transform = transform;
        self
    }

    pub fn is_use(&self) -> bool {
        matches!(self.kind, ElementKind::Use { .. })
    }

    /// Visible, non-reference geometry.
    pub fn is_drawable(&self) -> bool {
        !self.is_hidden && !self.is_use()
    }
}

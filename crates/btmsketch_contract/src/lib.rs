use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

pub const CONTRACT_ID: &str = "btmsketch.btm_contract";
pub const CONTRACT_VERSION: &str = "1";

pub const LINE_SEGMENT_BT_TYPE: &str = "BTMSketchCurveSegment-155";
pub const CURVE_BT_TYPE: &str = "BTMSketchCurve-4";
pub const TEXT_BT_TYPE: &str = "BTMSketchTextEntity-1761";
pub const LINE_GEOMETRY_BT_TYPE: &str = "BTCurveGeometryLine-117";
pub const CIRCLE_GEOMETRY_BT_TYPE: &str = "BTCurveGeometryCircle-115";
pub const ELLIPSE_GEOMETRY_BT_TYPE: &str = "BTCurveGeometryEllipse-1189";
pub const SPLINE_GEOMETRY_BT_TYPE: &str = "BTCurveGeometryControlPointSpline-2197";
pub const STRING_PARAMETER_BT_TYPE: &str = "BTMParameterString-149";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtRole {
    Entity,
    Geometry,
    Parameter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Bool,
    Str,
    Object,
    Array,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Str => value.is_string(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::Str => "string",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BtTypeDef {
    pub id: &'static str,
    pub role: BtRole,
    pub fields: &'static [(&'static str, FieldKind)],
    /// Geometry btTypes an entity may carry. Empty for geometry and parameters.
    pub geometries: &'static [&'static str],
}

pub const BT_TYPES_V1: [BtTypeDef; 8] = [
    BtTypeDef {
        id: LINE_SEGMENT_BT_TYPE,
        role: BtRole::Entity,
        fields: &[
            ("entityId", FieldKind::Str),
            ("startPointId", FieldKind::Str),
            ("endPointId", FieldKind::Str),
            ("isConstruction", FieldKind::Bool),
            ("startParam", FieldKind::Number),
            ("endParam", FieldKind::Number),
            ("geometry", FieldKind::Object),
        ],
        geometries: &[LINE_GEOMETRY_BT_TYPE, SPLINE_GEOMETRY_BT_TYPE],
    },
    BtTypeDef {
        id: CURVE_BT_TYPE,
        role: BtRole::Entity,
        fields: &[
            ("entityId", FieldKind::Str),
            ("centerId", FieldKind::Str),
            ("isConstruction", FieldKind::Bool),
            ("geometry", FieldKind::Object),
        ],
        geometries: &[CIRCLE_GEOMETRY_BT_TYPE, ELLIPSE_GEOMETRY_BT_TYPE],
    },
    BtTypeDef {
        id: TEXT_BT_TYPE,
        role: BtRole::Entity,
        fields: &[
            ("entityId", FieldKind::Str),
            ("baselineStartX", FieldKind::Number),
            ("baselineStartY", FieldKind::Number),
            ("baselineDirectionX", FieldKind::Number),
            ("baselineDirectionY", FieldKind::Number),
            ("ascent", FieldKind::Number),
            ("parameters", FieldKind::Array),
        ],
        geometries: &[],
    },
    BtTypeDef {
        id: LINE_GEOMETRY_BT_TYPE,
        role: BtRole::Geometry,
        fields: &[
            ("pntX", FieldKind::Number),
            ("pntY", FieldKind::Number),
            ("dirX", FieldKind::Number),
            ("dirY", FieldKind::Number),
        ],
        geometries: &[],
    },
    BtTypeDef {
        id: CIRCLE_GEOMETRY_BT_TYPE,
        role: BtRole::Geometry,
        fields: &[
            ("radius", FieldKind::Number),
            ("xCenter", FieldKind::Number),
            ("yCenter", FieldKind::Number),
            ("xDir", FieldKind::Number),
            ("yDir", FieldKind::Number),
            ("clockwise", FieldKind::Bool),
        ],
        geometries: &[],
    },
    BtTypeDef {
        id: ELLIPSE_GEOMETRY_BT_TYPE,
        role: BtRole::Geometry,
        fields: &[
            ("radius", FieldKind::Number),
            ("minorRadius", FieldKind::Number),
            ("xCenter", FieldKind::Number),
            ("yCenter", FieldKind::Number),
            ("xDir", FieldKind::Number),
            ("yDir", FieldKind::Number),
            ("clockwise", FieldKind::Bool),
        ],
        geometries: &[],
    },
    BtTypeDef {
        id: SPLINE_GEOMETRY_BT_TYPE,
        role: BtRole::Geometry,
        fields: &[
            ("degree", FieldKind::Number),
            ("isBezier", FieldKind::Bool),
            ("controlPointCount", FieldKind::Number),
            ("controlPoints", FieldKind::Array),
            ("knots", FieldKind::Array),
        ],
        geometries: &[],
    },
    BtTypeDef {
        id: STRING_PARAMETER_BT_TYPE,
        role: BtRole::Parameter,
        fields: &[("parameterId", FieldKind::Str), ("value", FieldKind::Str)],
        geometries: &[],
    },
];

/// Text entities must carry these string parameters.
pub const TEXT_PARAMETER_IDS: [&str; 2] = ["text", "fontName"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    pub path: String,
    pub message: String,
}

impl ContractViolation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BtmContractMetadata {
    pub contract_id: &'static str,
    pub contract_version: &'static str,
    pub contract_fingerprint_sha256: String,
    pub bt_type_count: usize,
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

static CONTRACT_FINGERPRINT: OnceLock<String> = OnceLock::new();

pub fn bt_type_defs_v1() -> &'static [BtTypeDef] {
    &BT_TYPES_V1
}

pub fn bt_type_def(bt_type: &str) -> Option<&'static BtTypeDef> {
    BT_TYPES_V1.iter().find(|d| d.id == bt_type)
}

pub fn contract_fingerprint_sha256() -> String {
    CONTRACT_FINGERPRINT
        .get_or_init(|| {
            let mut text = String::new();
            text.push_str(CONTRACT_ID);
            text.push('\n');
            text.push_str(CONTRACT_VERSION);
            for def in &BT_TYPES_V1 {
                text.push('\n');
                text.push_str(def.id);
                for (name, kind) in def.fields {
                    text.push(' ');
                    text.push_str(name);
                    text.push(':');
                    text.push_str(kind.label());
                }
            }
            hex_sha256(text.as_bytes())
        })
        .clone()
}

/// Hash of the compact JSON encoding. Object keys serialize sorted, so equal
/// payloads always hash equal.
pub fn payload_fingerprint_sha256(payload: &Value) -> String {
    hex_sha256(payload.to_string().as_bytes())
}

fn check_fields(def: &BtTypeDef, obj: &serde_json::Map<String, Value>, path: &str, out: &mut Vec<ContractViolation>) {
    for (name, kind) in def.fields {
        match obj.get(*name) {
            None => out.push(ContractViolation::new(
                format!("{path}.{name}"),
                format!("missing required field for {}", def.id),
            )),
            Some(value) if !kind.matches(value) => out.push(ContractViolation::new(
                format!("{path}.{name}"),
                format!("expected {}", kind.label()),
            )),
            Some(_) => {}
        }
    }
}

fn bt_type_of<'a>(obj: &'a serde_json::Map<String, Value>) -> Option<&'a str> {
    obj.get("btType").and_then(Value::as_str)
}

fn check_spline(obj: &serde_json::Map<String, Value>, path: &str, out: &mut Vec<ContractViolation>) {
    let count = obj.get("controlPointCount").and_then(Value::as_u64).unwrap_or(0) as usize;
    let degree = obj.get("degree").and_then(Value::as_u64).unwrap_or(0) as usize;
    if let Some(points) = obj.get("controlPoints").and_then(Value::as_array) {
        if points.len() != count * 2 {
            out.push(ContractViolation::new(
                format!("{path}.controlPoints"),
                format!("expected {} coordinates, found {}", count * 2, points.len()),
            ));
        }
        if points.iter().any(|v| !v.is_number()) {
            out.push(ContractViolation::new(
                format!("{path}.controlPoints"),
                "coordinates must be numbers",
            ));
        }
    }
    if let Some(knots) = obj.get("knots").and_then(Value::as_array) {
        if knots.len() != count + degree + 1 {
            out.push(ContractViolation::new(
                format!("{path}.knots"),
                format!("expected {} knots, found {}", count + degree + 1, knots.len()),
            ));
        }
    }
}

fn check_text_parameters(params: &[Value], path: &str, out: &mut Vec<ContractViolation>) {
    for (idx, param) in params.iter().enumerate() {
        let param_path = format!("{path}.parameters[{idx}]");
        let Some(obj) = param.as_object() else {
            out.push(ContractViolation::new(param_path, "parameter must be an object"));
            continue;
        };
        if bt_type_of(obj) != Some(STRING_PARAMETER_BT_TYPE) {
            out.push(ContractViolation::new(
                format!("{param_path}.btType"),
                format!("expected {STRING_PARAMETER_BT_TYPE}"),
            ));
        }
        if let Some(def) = bt_type_def(STRING_PARAMETER_BT_TYPE) {
            check_fields(def, obj, &param_path, out);
        }
    }
    for required in TEXT_PARAMETER_IDS {
        let present = params
            .iter()
            .any(|p| p.get("parameterId").and_then(Value::as_str) == Some(required));
        if !present {
            out.push(ContractViolation::new(
                format!("{path}.parameters"),
                format!("missing parameter '{required}'"),
            ));
        }
    }
}

fn validate_at(entity: &Value, path: &str, out: &mut Vec<ContractViolation>) {
    let Some(obj) = entity.as_object() else {
        out.push(ContractViolation::new(path, "entity must be an object"));
        return;
    };
    let Some(bt_type) = bt_type_of(obj) else {
        out.push(ContractViolation::new(format!("{path}.btType"), "missing btType"));
        return;
    };
    let Some(def) = bt_type_def(bt_type).filter(|d| d.role == BtRole::Entity) else {
        out.push(ContractViolation::new(
            format!("{path}.btType"),
            format!("unknown entity btType '{bt_type}'"),
        ));
        return;
    };
    check_fields(def, obj, path, out);

    if let Some(params) = obj.get("parameters").and_then(Value::as_array) {
        check_text_parameters(params, path, out);
    }

    let Some(geometry) = obj.get("geometry").and_then(Value::as_object) else {
        return;
    };
    let geometry_path = format!("{path}.geometry");
    let Some(geometry_type) = bt_type_of(geometry) else {
        out.push(ContractViolation::new(
            format!("{geometry_path}.btType"),
            "missing btType",
        ));
        return;
    };
    if !def.geometries.contains(&geometry_type) {
        out.push(ContractViolation::new(
            format!("{geometry_path}.btType"),
            format!("{geometry_type} is not valid geometry for {}", def.id),
        ));
        return;
    }
    if let Some(geometry_def) = bt_type_def(geometry_type) {
        check_fields(geometry_def, geometry, &geometry_path, out);
    }
    if geometry_type == SPLINE_GEOMETRY_BT_TYPE {
        check_spline(geometry, &geometry_path, out);
    }
}

/// Structural check of one serialized sketch entity.
pub fn validate_entity(entity: &Value) -> Vec<ContractViolation> {
    let mut out = Vec::new();
    validate_at(entity, "$", &mut out);
    out
}

/// Checks every entity of a serialized entity list; a non-array payload is one violation.
pub fn validate_payload(payload: &Value) -> Vec<ContractViolation> {
    let mut out = Vec::new();
    let Some(entities) = payload.as_array() else {
        out.push(ContractViolation::new("$", "payload must be an array of entities"));
        return out;
    };
    for (idx, entity) in entities.iter().enumerate() {
        validate_at(entity, &format!("$[{idx}]"), &mut out);
    }
    out
}

pub fn metadata() -> BtmContractMetadata {
    BtmContractMetadata {
        contract_id: CONTRACT_ID,
        contract_version: CONTRACT_VERSION,
        contract_fingerprint_sha256: contract_fingerprint_sha256(),
        bt_type_count: BT_TYPES_V1.len(),
    }
}

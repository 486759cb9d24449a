// BTM JSON shapes for sketch entities. Field names follow the target schema,
// btType strings come from the contract crate.

use crate::codec::SketchEntity;
use crate::error::Result;
use btmsketch_contract::{
    CIRCLE_GEOMETRY_BT_TYPE, CURVE_BT_TYPE, ELLIPSE_GEOMETRY_BT_TYPE, LINE_GEOMETRY_BT_TYPE,
    LINE_SEGMENT_BT_TYPE, SPLINE_GEOMETRY_BT_TYPE, STRING_PARAMETER_BT_TYPE, TEXT_BT_TYPE,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SegmentEntity<'a, G: Serialize> {
    bt_type: &'static str,
    entity_id: &'a str,
    start_point_id: String,
    end_point_id: String,
    is_construction: bool,
    start_param: f64,
    end_param: f64,
    geometry: G,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurveEntity<'a, G: Serialize> {
    bt_type: &'static str,
    entity_id: &'a str,
    center_id: String,
    is_construction: bool,
    geometry: G,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LineGeometry {
    bt_type: &'static str,
    pnt_x: f64,
    pnt_y: f64,
    dir_x: f64,
    dir_y: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CircleGeometry {
    bt_type: &'static str,
    radius: f64,
    x_center: f64,
    y_center: f64,
    x_dir: f64,
    y_dir: f64,
    clockwise: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EllipseGeometry {
    bt_type: &'static str,
    radius: f64,
    minor_radius: f64,
    x_center: f64,
    y_center: f64,
    x_dir: f64,
    y_dir: f64,
    clockwise: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SplineGeometry {
    bt_type: &'static str,
    degree: u8,
    is_bezier: bool,
    control_point_count: usize,
    control_points: Vec<f64>,
    knots: [f64; 8],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextEntity<'a> {
    bt_type: &'static str,
    entity_id: &'a str,
    baseline_start_x: f64,
    baseline_start_y: f64,
    baseline_direction_x: f64,
    baseline_direction_y: f64,
    ascent: f64,
    parameters: [StringParameter<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StringParameter<'a> {
    bt_type: &'static str,
    parameter_id: &'static str,
    value: &'a str,
}

fn point_id(entity_id: &str, suffix: &str) -> String {
    format!("{entity_id}.{suffix}")
}

/// One entity as its BTM JSON object.
pub fn to_value(entity: &SketchEntity) -> Result<Value> {
    let value = match entity {
        SketchEntity::LineSegment {
            id,
            midpoint,
            direction,
            start_param,
            end_param,
            is_construction,
        } => serde_json::to_value(SegmentEntity {
            bt_type: LINE_SEGMENT_BT_TYPE,
            entity_id: id,
            start_point_id: point_id(id, "start"),
            end_point_id: point_id(id, "end"),
            is_construction: *is_construction,
            start_param: *start_param,
            end_param: *end_param,
            geometry: LineGeometry {
                bt_type: LINE_GEOMETRY_BT_TYPE,
                pnt_x: midpoint.x,
                pnt_y: midpoint.y,
                dir_x: direction.x,
                dir_y: direction.y,
            },
        })?,
        SketchEntity::Circle {
            id,
            center,
            radius,
            is_construction,
        } => serde_json::to_value(CurveEntity {
            bt_type: CURVE_BT_TYPE,
            entity_id: id,
            center_id: point_id(id, "center"),
            is_construction: *is_construction,
            geometry: CircleGeometry {
                bt_type: CIRCLE_GEOMETRY_BT_TYPE,
                radius: *radius,
                x_center: center.x,
                y_center: center.y,
                x_dir: 1.0,
                y_dir: 0.0,
                clockwise: false,
            },
        })?,
        SketchEntity::Ellipse {
            id,
            center,
            major_radius,
            minor_radius,
            major_direction,
            is_construction,
        } => serde_json::to_value(CurveEntity {
            bt_type: CURVE_BT_TYPE,
            entity_id: id,
            center_id: point_id(id, "center"),
            is_construction: *is_construction,
            geometry: EllipseGeometry {
                bt_type: ELLIPSE_GEOMETRY_BT_TYPE,
                radius: *major_radius,
                minor_radius: *minor_radius,
                x_center: center.x,
                y_center: center.y,
                x_dir: major_direction.x,
                y_dir: major_direction.y,
                clockwise: false,
            },
        })?,
        SketchEntity::Bezier {
            id,
            control_points,
            knots,
            is_construction,
        } => serde_json::to_value(SegmentEntity {
            bt_type: LINE_SEGMENT_BT_TYPE,
            entity_id: id,
            start_point_id: point_id(id, "start"),
            end_point_id: point_id(id, "end"),
            is_construction: *is_construction,
            start_param: 0.0,
            end_param: 1.0,
            geometry: SplineGeometry {
                bt_type: SPLINE_GEOMETRY_BT_TYPE,
                degree: 3,
                is_bezier: true,
                control_point_count: control_points.len(),
                control_points: control_points.iter().flat_map(|p| [p.x, p.y]).collect(),
                knots: *knots,
            },
        })?,
        SketchEntity::Text {
            id,
            baseline_start,
            baseline_direction,
            ascent,
            content,
            font,
        } => serde_json::to_value(TextEntity {
            bt_type: TEXT_BT_TYPE,
            entity_id: id,
            baseline_start_x: baseline_start.x,
            baseline_start_y: baseline_start.y,
            baseline_direction_x: baseline_direction.x,
            baseline_direction_y: baseline_direction.y,
            ascent: *ascent,
            parameters: [
                StringParameter {
                    bt_type: STRING_PARAMETER_BT_TYPE,
                    parameter_id: "text",
                    value: content,
                },
                StringParameter {
                    bt_type: STRING_PARAMETER_BT_TYPE,
                    parameter_id: "fontName",
                    value: font,
                },
            ],
        })?,
    };
    Ok(value)
}

pub fn entities_to_value(entities: &[SketchEntity]) -> Result<Value> {
    entities
        .iter()
        .map(to_value)
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

/// Compact JSON array, the form handed to the CAD importer.
pub fn entities_to_json(entities: &[SketchEntity]) -> Result<String> {
    Ok(serde_json::to_string(&entities_to_value(entities)?)?)
}

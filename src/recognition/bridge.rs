use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::confidence::sanitize_confidence;
use crate::core::geometry::{BBox, Point};
use crate::core::model::{Connection, Direction, Endpoint, Equipment, PassCandidates};
use crate::core::units::PageGeometry;
use crate::fusion::compare::usable_tag;
use crate::recognition::TileSpec;

/// Edge slack, in pixels, for deciding that a box was clipped by its tile.
const CLIP_SLACK_PX: f64 = 1.0;

/// Output of the recognition service for one tile, as received.
///
/// Entries stay untyped until [`ingest`] so one malformed entry cannot reject
/// the rest of the tile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecognition {
    #[serde(default, alias = "detections")]
    pub equipment: Vec<Value>,
    #[serde(default, alias = "wires")]
    pub connections: Vec<Value>,
    #[serde(default)]
    pub endpoints: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawEquipment {
    #[serde(default, alias = "type", alias = "class")]
    category: Value,
    #[serde(default, alias = "label")]
    tag: Value,
    #[serde(default, alias = "box", alias = "bounding_box")]
    bbox: Value,
    #[serde(default, alias = "score")]
    confidence: Value,
    #[serde(default, alias = "clipped")]
    partial: Value,
    #[serde(default)]
    description: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConnection {
    #[serde(default, alias = "from", alias = "source")]
    from_tag: Value,
    #[serde(default, alias = "to", alias = "target")]
    to_tag: Value,
    #[serde(default, alias = "points", alias = "polyline")]
    path: Value,
    #[serde(default)]
    direction: Value,
    #[serde(default, alias = "score")]
    confidence: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawEndpoint {
    #[serde(default, alias = "hint", alias = "tag")]
    hint_tag: Value,
    #[serde(default, alias = "position")]
    point: Value,
}

/// Counts of what the adapter had to repair or throw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub equipment: usize,
    pub connections: usize,
    pub endpoints: usize,
    pub degenerate_boxes: usize,
    pub short_paths: usize,
    pub malformed: usize,
}

/// Normalizes one tile's raw output into page-global candidates.
pub fn ingest(
    raw: &RawRecognition,
    tile: &TileSpec,
    page_idx: usize,
    page: &PageGeometry,
) -> (PassCandidates, IngestStats) {
    let mut stats = IngestStats::default();
    let mut out = PassCandidates::default();

    for value in &raw.equipment {
        let Ok(entry) = serde_json::from_value::<RawEquipment>(value.clone()) else {
            stats.malformed += 1;
            continue;
        };
        let local = parse_bbox(&entry.bbox);
        if local.is_degenerate() {
            stats.degenerate_boxes += 1;
            continue;
        }
        let partial = parse_bool(&entry.partial).unwrap_or_else(|| clipped_by_tile(&local, tile, page));
        out.equipment.push(Equipment {
            category: parse_category(&entry.category),
            tag: usable_tag(parse_str(&entry.tag).as_deref()),
            bbox: tile.offset.bbox_to_global(local),
            page: page_idx,
            confidence: sanitize_confidence(parse_f64(&entry.confidence).unwrap_or(0.0)),
            partial,
            description: parse_str(&entry.description).filter(|d| !d.trim().is_empty()),
        });
        stats.equipment += 1;
    }

    for value in &raw.connections {
        let Ok(entry) = serde_json::from_value::<RawConnection>(value.clone()) else {
            stats.malformed += 1;
            continue;
        };
        let path: Vec<Point> = parse_path(&entry.path)
            .into_iter()
            .map(|p| tile.offset.to_global(p))
            .collect();
        if path.len() < 2 {
            stats.short_paths += 1;
            continue;
        }
        out.connections.push(Connection {
            from_tag: usable_tag(parse_str(&entry.from_tag).as_deref()),
            to_tag: usable_tag(parse_str(&entry.to_tag).as_deref()),
            path,
            direction: parse_direction(&entry.direction),
            confidence: sanitize_confidence(parse_f64(&entry.confidence).unwrap_or(0.0)),
            page: page_idx,
        });
        stats.connections += 1;
    }

    for value in &raw.endpoints {
        let Ok(entry) = serde_json::from_value::<RawEndpoint>(value.clone()) else {
            stats.malformed += 1;
            continue;
        };
        let Some(point) = parse_point(&entry.point) else {
            stats.malformed += 1;
            continue;
        };
        out.endpoints.push(Endpoint {
            hint_tag: usable_tag(parse_str(&entry.hint_tag).as_deref()),
            point: tile.offset.to_global(point),
            page: page_idx,
        });
        stats.endpoints += 1;
    }

    let dropped = stats.degenerate_boxes + stats.short_paths + stats.malformed;
    if dropped > 0 {
        warn!(
            "tile {} on page {}: dropped {} unusable entries ({} zero-area boxes, {} short paths, {} malformed)",
            tile.index, page_idx, dropped, stats.degenerate_boxes, stats.short_paths, stats.malformed
        );
    }
    debug!(
        "tile {} on page {}: {} equipment, {} connections, {} endpoints",
        tile.index, page_idx, stats.equipment, stats.connections, stats.endpoints
    );

    (out, stats)
}

/// Finite number from a JSON number or numeric string.
fn parse_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn parse_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_category(value: &Value) -> String {
    parse_str(value)
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_direction(value: &Value) -> Direction {
    match parse_str(value).map(|d| d.trim().to_lowercase()).as_deref() {
        Some("forward" | "directed" | "->") => Direction::Forward,
        _ => Direction::Undirected,
    }
}

fn field(map: &serde_json::Map<String, Value>, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| map.get(*name).and_then(parse_f64))
}

/// Box from `[x, y, w, h]`, `{x, y, w|width, h|height}` or `{x0, y0, x1, y1}`.
/// Anything unreadable becomes the zero box.
fn parse_bbox(value: &Value) -> BBox {
    match value {
        Value::Array(items) if items.len() == 4 => {
            let nums: Vec<f64> = items.iter().map(|v| parse_f64(v).unwrap_or(0.0)).collect();
            BBox::new(nums[0], nums[1], nums[2], nums[3])
        }
        Value::Object(map) => {
            if let (Some(x0), Some(y0), Some(x1), Some(y1)) = (
                field(map, &["x0", "left"]),
                field(map, &["y0", "top"]),
                field(map, &["x1", "right"]),
                field(map, &["y1", "bottom"]),
            ) {
                return BBox::from_corners(x0, y0, x1, y1);
            }
            BBox::new(
                field(map, &["x"]).unwrap_or(0.0),
                field(map, &["y"]).unwrap_or(0.0),
                field(map, &["w", "width"]).unwrap_or(0.0),
                field(map, &["h", "height"]).unwrap_or(0.0),
            )
        }
        _ => BBox::default(),
    }
}

fn parse_point(value: &Value) -> Option<Point> {
    let p = match value {
        Value::Array(items) if items.len() >= 2 => Point::new(parse_f64(&items[0])?, parse_f64(&items[1])?),
        Value::Object(map) => Point::new(field(map, &["x"])?, field(map, &["y"])?),
        _ => return None,
    };
    p.is_finite().then_some(p)
}

/// Points that fail to parse are skipped; the caller checks the remaining length.
fn parse_path(value: &Value) -> Vec<Point> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_point).collect(),
        _ => Vec::new(),
    }
}

/// True when the box touches a tile edge that is not also a page edge.
fn clipped_by_tile(local: &BBox, tile: &TileSpec, page: &PageGeometry) -> bool {
    if tile.width_px <= 0.0 || tile.height_px <= 0.0 {
        return false;
    }
    let left = tile.offset.x > CLIP_SLACK_PX && local.x <= CLIP_SLACK_PX;
    let top = tile.offset.y > CLIP_SLACK_PX && local.y <= CLIP_SLACK_PX;
    let right = tile.offset.x + tile.width_px < page.width_px - CLIP_SLACK_PX
        && local.right() >= tile.width_px - CLIP_SLACK_PX;
    let bottom = tile.offset.y + tile.height_px < page.height_px - CLIP_SLACK_PX
        && local.bottom() >= tile.height_px - CLIP_SLACK_PX;
    left || top || right || bottom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::TileOffset;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn page() -> PageGeometry {
        PageGeometry {
            width_px: 2000.0,
            height_px: 1000.0,
            width_mm: 420.0,
            height_mm: 210.0,
        }
    }

    fn right_tile() -> TileSpec {
        TileSpec {
            index: 1,
            offset: TileOffset::new(1000.0, 0.0),
            width_px: 1000.0,
            height_px: 1000.0,
            image: None,
        }
    }

    fn ingest_json(raw: Value) -> (PassCandidates, IngestStats) {
        let raw: RawRecognition = serde_json::from_value(raw).unwrap();
        ingest(&raw, &right_tile(), 0, &page())
    }

    #[test]
    fn accepts_list_and_record_boxes() {
        let (out, stats) = ingest_json(json!({
            "equipment": [
                {"category": "Pump", "tag": "P-101", "bbox": [10, 20, 30, 40], "confidence": 0.8, "partial": false},
                {"type": "valve", "bbox": {"x": 100, "y": 100, "width": 20, "height": 10}, "score": "0.6"},
                {"category": "tank", "bbox": {"x0": 200, "y0": 300, "x1": 260, "y1": 400}, "confidence": 0.9}
            ]
        }));
        assert_eq!(stats.equipment, 3);
        assert_eq!(out.equipment[0].bbox, BBox::new(1010.0, 20.0, 30.0, 40.0));
        assert_eq!(out.equipment[0].category, "pump");
        assert_eq!(out.equipment[0].tag.as_deref(), Some("P-101"));
        assert_eq!(out.equipment[1].bbox, BBox::new(1100.0, 100.0, 20.0, 10.0));
        assert_eq!(out.equipment[1].confidence, 0.6);
        assert_eq!(out.equipment[2].bbox, BBox::new(1200.0, 300.0, 60.0, 100.0));
    }

    #[test]
    fn sanitizes_bad_numbers() {
        let (out, stats) = ingest_json(json!({
            "equipment": [
                {"category": "pump", "bbox": [10, 10, 20, 20], "confidence": "NaN"},
                {"category": "pump", "bbox": [10, 10, 20, 20], "confidence": 7.5},
                {"category": "pump", "bbox": "garbage", "confidence": 0.9},
                {"category": "pump", "bbox": [10, 10, "inf", 20], "confidence": 0.9},
                "not an object"
            ]
        }));
        assert_eq!(out.equipment.len(), 2);
        assert_eq!(out.equipment[0].confidence, 0.0);
        assert_eq!(out.equipment[1].confidence, 1.0);
        assert_eq!(stats.degenerate_boxes, 2);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn infers_partial_on_interior_tile_edge() {
        let (out, _) = ingest_json(json!({
            "equipment": [
                {"category": "pump", "bbox": [0, 100, 20, 20], "confidence": 0.5},
                {"category": "pump", "bbox": [980, 100, 20, 20], "confidence": 0.5},
                {"category": "pump", "bbox": [0, 300, 20, 20], "confidence": 0.5, "partial": false}
            ]
        }));
        // Left edge of the right-hand tile is interior, its right edge is the page edge.
        assert!(out.equipment[0].partial);
        assert!(!out.equipment[1].partial);
        assert!(!out.equipment[2].partial);
    }

    #[test]
    fn rejects_short_paths_and_offsets_points() {
        let (out, stats) = ingest_json(json!({
            "connections": [
                {"from": "P-101", "to": " ", "points": [[0, 0], {"x": 50, "y": 0}], "direction": "forward", "confidence": 0.7},
                {"from": "P-101", "to": "V-1", "path": [[0, 0], [null, 3]]},
                {"path": "nope"}
            ],
            "endpoints": [
                {"hint": "V-1", "point": [5, 5]},
                {"point": {"x": "7", "y": 8}},
                {"point": [1]}
            ]
        }));
        assert_eq!(out.connections.len(), 1);
        assert_eq!(stats.short_paths, 2);
        let conn = &out.connections[0];
        assert_eq!(conn.to_tag, None);
        assert_eq!(conn.direction, Direction::Forward);
        assert_eq!(conn.path, vec![Point::new(1000.0, 0.0), Point::new(1050.0, 0.0)]);
        assert_eq!(out.endpoints.len(), 2);
        assert_eq!(out.endpoints[1].point, Point::new(1007.0, 8.0));
        assert_eq!(out.endpoints[0].hint_tag.as_deref(), Some("V-1"));
        assert_eq!(stats.malformed, 1);
    }
}

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::json;

use diagfuse::core::geometry::{path_similarity, BBox, Point};
use diagfuse::core::model::{CoordinateFrame, DiagramKind, Endpoint, Equipment};
use diagfuse::core::page_classifier::classify_text;
use diagfuse::core::units::{snap_to_grid, PageGeometry, TileOffset};
use diagfuse::fusion::cluster::{cluster_and_merge, cluster_points};
use diagfuse::fusion::connectivity::snap_endpoints;
use diagfuse::fusion::cross_pass::dedup_passes;
use diagfuse::fusion::nms::suppress;
use diagfuse::pipeline::{build_document, export_document, PipelineConfig};
use diagfuse::recognition::{RawRecognition, TileRecognition, TileSpec};
use diagfuse::{FusionConfig, FusionEngine, PagePasses, TileFusionEngine};

fn equipment(category: &str, tag: Option<&str>, cx: f64, cy: f64, confidence: f64) -> Equipment {
    Equipment {
        category: category.to_string(),
        tag: tag.map(str::to_string),
        bbox: BBox::new(cx - 10.0, cy - 10.0, 20.0, 20.0),
        page: 0,
        confidence,
        partial: false,
        description: None,
    }
}

fn tile(index: usize, x: f64, y: f64, raw: serde_json::Value) -> TileRecognition {
    TileRecognition {
        tile: TileSpec {
            index,
            offset: TileOffset::new(x, y),
            width_px: 1200.0,
            height_px: 900.0,
            image: None,
        },
        recognition: Some(serde_json::from_value::<RawRecognition>(raw).unwrap()),
    }
}

fn a3_geometry() -> PageGeometry {
    PageGeometry {
        width_px: 2000.0,
        height_px: 1500.0,
        width_mm: 400.0,
        height_mm: 300.0,
    }
}

#[test]
fn iou_properties() {
    let a = BBox::new(0.0, 0.0, 30.0, 20.0);
    let b = BBox::new(10.0, 5.0, 30.0, 20.0);
    let c = BBox::new(100.0, 100.0, 5.0, 5.0);
    assert_eq!(a.iou(&a), 1.0);
    assert_eq!(a.iou(&b), b.iou(&a));
    assert_eq!(a.iou(&c), 0.0);
}

#[test]
fn nms_survivor_is_highest_confidence() {
    let input = vec![
        equipment("valve", None, 100.0, 100.0, 0.4),
        equipment("valve", None, 101.0, 100.0, 0.95),
        equipment("valve", None, 100.0, 102.0, 0.6),
        equipment("valve", None, 300.0, 100.0, 0.5),
    ];
    let kept = suppress(&input, 0.55);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].confidence, 0.95);
    assert!(kept.iter().all(|k| input.contains(k)));
}

#[test]
fn clustering_is_transitive() {
    let points = [Point::new(0.0, 0.0), Point::new(9.0, 0.0), Point::new(18.0, 0.0)];
    assert_eq!(cluster_points(&points, 10.0, |_, _| true, |_| None), vec![vec![0, 1, 2]]);
}

#[test]
fn merging_shared_tag_keeps_best_confidence() {
    let input = vec![
        equipment("motor", Some("M-101"), 200.0, 200.0, 0.9),
        equipment("motor", Some("M-101"), 203.0, 201.0, 0.7),
        equipment("motor", Some("M-101"), 201.0, 204.0, 0.85),
    ];
    let merged = cluster_and_merge(&suppress(&input, 0.55), 10.0);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].confidence, 0.9);
    assert_eq!(merged[0].tag.as_deref(), Some("M-101"));
}

#[test]
fn path_similarity_properties() {
    let path = vec![Point::new(0.0, 0.0), Point::new(80.0, 0.0), Point::new(80.0, 60.0)];
    let moved: Vec<Point> = path.iter().map(|p| p.offset(400.0, 400.0)).collect();
    assert_eq!(path_similarity(&path, &path, 32), 1.0);
    assert!(path_similarity(&path, &moved, 32) < 0.5);
}

#[test]
fn endpoint_snapping_and_leftovers() {
    let motor = Equipment {
        bbox: BBox::new(100.0, 100.0, 50.0, 50.0),
        ..equipment("motor", Some("M-101"), 0.0, 0.0, 0.9)
    };
    let near = Endpoint {
        hint_tag: None,
        point: Point::new(160.0, 125.0),
        page: 0,
    };
    let far = Endpoint {
        hint_tag: None,
        point: Point::new(650.0, 125.0),
        page: 0,
    };
    let outcome = snap_endpoints(&[near, far.clone()], &[motor], 25.0);
    assert_eq!(outcome.resolved.len(), 1);
    assert_eq!(outcome.resolved[0].tag, "M-101");
    assert_eq!(outcome.resolved[0].distance, 10.0);
    assert_eq!(outcome.leftovers, vec![far]);
}

#[test]
fn cross_pass_size_adaptive_tolerance() {
    let config = FusionConfig::default();

    let tanks = dedup_passes(
        &[equipment("tank", Some("T-101"), 500.0, 400.0, 0.8)],
        &[equipment("tank", Some("T-101"), 515.0, 410.0, 0.7)],
        &config,
    );
    assert_eq!(tanks.len(), 1);

    let transmitters = dedup_passes(
        &[equipment("pressure transmitter", Some("PT-101"), 600.0, 400.0, 0.8)],
        &[equipment("pressure transmitter", Some("PT-101"), 608.0, 400.0, 0.7)],
        &config,
    );
    assert_eq!(transmitters.len(), 2);

    let breakers = dedup_passes(
        &[equipment("circuit breaker", Some("CB-101"), 300.0, 300.0, 0.8)],
        &[equipment("circuit breaker", Some("CB-102"), 300.0, 300.0, 0.7)],
        &config,
    );
    assert_eq!(breakers.len(), 2);
}

#[test]
fn grid_rounding() {
    assert_eq!(snap_to_grid(9.0, 4.0), 12.0);
    assert_eq!(snap_to_grid(6.0, 4.0), 8.0);
    for v in [0.1, 1.9, 2.0, 13.37, 101.5, 250.0] {
        assert_eq!(snap_to_grid(v, 4.0) % 4.0, 0.0);
    }
}

#[test]
fn classifier_examples() {
    let electrical = "circuit breaker CB1, relay K3, transformer TR1, circuit breaker CB2, relay K4";
    assert_eq!(classify_text(electrical), DiagramKind::Electrical);
    assert_eq!(classify_text("pump P-1, valve V-2, flow transmitter FT-3"), DiagramKind::Process);
    assert_eq!(classify_text(""), DiagramKind::Process);
}

#[test]
fn fuses_tiled_and_global_passes_end_to_end() -> Result<()> {
    // Two tiles overlapping on x in [800, 1200]; tank T-101 sits in the overlap.
    let left = tile(0, 0.0, 0.0, json!({
        "equipment": [
            {"category": "Tank", "tag": "T-101", "bbox": [900, 300, 120, 200], "confidence": 0.85},
            {"category": "pump", "tag": "P-101", "bbox": [400, 420, 40, 40], "confidence": 0.9}
        ],
        "connections": [
            {"from": "P-101", "to": "T-101", "path": [[440, 440], [900, 440]], "direction": "forward", "confidence": 0.8}
        ]
    }));
    let right = tile(1, 800.0, 0.0, json!({
        "equipment": [
            {"category": "tank", "tag": "T-101", "bbox": {"x": 102, "y": 302, "w": 118, "h": 198}, "confidence": 0.8}
        ],
        "connections": [
            {"from": "T-101", "to": null, "path": [[220, 400], [500, 400]], "confidence": 0.6}
        ],
        "endpoints": [
            {"point": [900, 800]}
        ]
    }));
    let global = tile(9, 0.0, 0.0, json!({
        "equipment": [
            {"category": "tank", "tag": "T-101", "bbox": [910, 305, 120, 200], "confidence": 0.7},
            {"category": "pump", "tag": "P-101", "bbox": [402, 421, 40, 40], "confidence": "0.75"}
        ],
        "connections": [
            {"from": "T-101", "to": "P-101", "path": [[900, 441], [440, 441]], "confidence": 0.5}
        ]
    }));

    let page = PagePasses {
        page_idx: 0,
        geometry: a3_geometry(),
        kind: None,
        text: Some("pump P-101 to storage tank T-101".to_string()),
        tiles: vec![left, right],
        global: Some(global),
    };

    let fused = TileFusionEngine::new(FusionConfig::default()).fuse(&page)?;

    assert_eq!(fused.kind, DiagramKind::Process);
    assert_eq!(fused.frame, CoordinateFrame::Millimeter);
    let tags: Vec<_> = fused.equipment.iter().filter_map(|e| e.tag.as_deref()).collect();
    assert_eq!(tags, vec!["T-101", "P-101"]);

    // The pump-tank wire was seen twice in opposite directions; one survives.
    let pump_tank: Vec<_> = fused
        .connections
        .iter()
        .filter(|c| c.from_tag.as_deref() == Some("P-101") || c.to_tag.as_deref() == Some("P-101"))
        .collect();
    assert_eq!(pump_tank.len(), 1);
    assert_eq!(pump_tank[0].confidence, 0.8);

    // The wire leaving the tank to the right and the stray endpoint stay unresolved.
    assert_eq!(fused.leftovers.len(), 2);
    assert!(fused.leftovers.iter().all(|e| e.point.x <= 400.0 && e.point.y <= 300.0));

    // Pixel to millimetre at the actual render scale (0.2 mm/px).
    let pump = fused.equipment.iter().find(|e| e.tag.as_deref() == Some("P-101")).unwrap();
    assert_eq!(pump.bbox, BBox::new(80.0, 84.0, 8.0, 8.0));
    Ok(())
}

#[test]
fn cli_pipeline_reads_and_writes_json() -> Result<()> {
    let mut dir = std::env::temp_dir();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
    dir.push(format!("diagfuse-integration-{}-{}", std::process::id(), now));
    fs::create_dir_all(&dir)?;

    let input_path = dir.join("recognized.json");
    let document = json!({
        "pages": [{
            "page_idx": 0,
            "geometry": {"width_px": 2000.0, "height_px": 1500.0, "width_mm": 400.0, "height_mm": 300.0},
            "text": "relay K1 circuit breaker Q1 transformer T1",
            "tiles": [{
                "tile": {"index": 0, "offset": {"x": 0.0, "y": 0.0}, "width_px": 2000.0, "height_px": 1500.0},
                "recognition": {"detections": [
                    {"type": "relay", "label": "K1", "box": [101, 99, 30, 30], "score": 0.9}
                ]}
            }]
        }, {
            "page_idx": 1,
            "geometry": {"width_px": 2000.0, "height_px": 1500.0, "width_mm": 400.0, "height_mm": 300.0},
            "tiles": [{"tile": {"index": 0}, "recognition": null}]
        }]
    });
    fs::write(&input_path, serde_json::to_string(&document)?)?;

    let output_path: PathBuf = dir.join("out").join("fused.json");
    let config = PipelineConfig::new(input_path, output_path.clone(), FusionConfig::default()).with_jobs(2);
    let report = build_document(&config)?;
    export_document(&report, &output_path)?;

    assert_eq!(report.document.pages.len(), 1);
    assert_eq!(report.failures.len(), 1);
    let page = &report.document.pages[0];
    assert_eq!(page.kind, DiagramKind::Electrical);
    // Electrical pages land on the 4 mm grid: corners (20.2, 19.8)-(26.2, 25.8) mm.
    assert_eq!(page.equipment[0].bbox, BBox::new(20.0, 20.0, 8.0, 4.0));

    let written = fs::read_to_string(&output_path)?;
    assert!(written.contains("\"K1\""));

    let _ = fs::remove_dir_all(&dir);
    Ok(())
}

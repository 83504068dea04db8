use serde::{Deserialize, Serialize};

use crate::core::geometry::{BBox, Point};

/// Pixel offset of a tile's top-left corner within the rendered page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct TileOffset {
    pub x: f64,
    pub y: f64,
}

impl TileOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_global(&self, local: Point) -> Point {
        local.offset(self.x, self.y)
    }

    pub fn bbox_to_global(&self, local: BBox) -> BBox {
        local.translate(self.x, self.y)
    }
}

/// Actual rendered extent and physical size of one page render.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PageGeometry {
    pub width_px: f64,
    pub height_px: f64,
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageGeometry {
    pub fn is_valid(&self) -> bool {
        [self.width_px, self.height_px, self.width_mm, self.height_mm]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }

    pub fn scale_x(&self) -> f64 {
        self.width_mm / self.width_px
    }

    pub fn scale_y(&self) -> f64 {
        self.height_mm / self.height_px
    }

    pub fn point_to_mm(&self, p: Point) -> Point {
        Point::new(
            px_to_mm(p.x, self.width_px, self.width_mm),
            px_to_mm(p.y, self.height_px, self.height_mm),
        )
    }

    pub fn bbox_to_mm(&self, b: BBox) -> BBox {
        BBox::new(
            px_to_mm(b.x, self.width_px, self.width_mm),
            px_to_mm(b.y, self.height_px, self.height_mm),
            px_to_mm(b.w, self.width_px, self.width_mm),
            px_to_mm(b.h, self.height_px, self.height_mm),
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    TopLeft,
    BottomLeft,
}

pub fn px_to_mm(px: f64, total_px: f64, total_mm: f64) -> f64 {
    if total_px <= 0.0 {
        return 0.0;
    }
    px * total_mm / total_px
}

/// Rounds to the nearest multiple of `quantum`, midpoints going up.
pub fn snap_to_grid(value: f64, quantum: f64) -> f64 {
    if !(quantum > 0.0) || !value.is_finite() {
        return value;
    }
    ((value + quantum / 2.0) / quantum).floor() * quantum
}

pub fn snap_point(p: Point, quantum: f64) -> Point {
    Point::new(snap_to_grid(p.x, quantum), snap_to_grid(p.y, quantum))
}

/// Snaps the corners onto the grid; each side keeps at least one quantum.
pub fn snap_bbox(b: BBox, quantum: f64) -> BBox {
    if !(quantum > 0.0) {
        return b;
    }
    let x0 = snap_to_grid(b.x, quantum);
    let y0 = snap_to_grid(b.y, quantum);
    let x1 = snap_to_grid(b.right(), quantum).max(x0 + quantum);
    let y1 = snap_to_grid(b.bottom(), quantum).max(y0 + quantum);
    BBox::new(x0, y0, x1 - x0, y1 - y0)
}

pub fn flip_y(y: f64, page_height_mm: f64) -> f64 {
    page_height_mm - y
}

pub fn flip_point(p: Point, page_height_mm: f64) -> Point {
    Point::new(p.x, flip_y(p.y, page_height_mm))
}

/// A box keeps its top-left anchor, so the flipped anchor is the former bottom edge.
pub fn flip_bbox(b: BBox, page_height_mm: f64) -> BBox {
    BBox::new(b.x, flip_y(b.bottom(), page_height_mm), b.w, b.h)
}

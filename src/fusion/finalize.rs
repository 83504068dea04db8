use crate::core::geometry::{BBox, Point};
use crate::core::model::{Connection, DiagramKind, Endpoint, Equipment, ResolvedEndpoint};
use crate::core::units::{flip_bbox, flip_point, snap_bbox, snap_point, Origin, PageGeometry};

/// Converts page-global pixels into the physical frame consumers expect.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateNormalizer {
    geometry: PageGeometry,
    grid_quantum_mm: Option<f64>,
    origin: Origin,
}

impl CoordinateNormalizer {
    pub fn new(geometry: PageGeometry, kind: DiagramKind, grid_quantum_mm: f64, origin: Origin) -> Self {
        let grid_quantum_mm = (kind.requires_grid() && grid_quantum_mm > 0.0).then_some(grid_quantum_mm);
        Self {
            geometry,
            grid_quantum_mm,
            origin,
        }
    }

    pub fn point(&self, p: Point) -> Point {
        let mut mm = self.geometry.point_to_mm(p);
        if let Some(q) = self.grid_quantum_mm {
            mm = snap_point(mm, q);
        }
        match self.origin {
            Origin::TopLeft => mm,
            Origin::BottomLeft => flip_point(mm, self.geometry.height_mm),
        }
    }

    pub fn bbox(&self, b: BBox) -> BBox {
        let mut mm = self.geometry.bbox_to_mm(b);
        if let Some(q) = self.grid_quantum_mm {
            mm = snap_bbox(mm, q);
        }
        match self.origin {
            Origin::TopLeft => mm,
            Origin::BottomLeft => flip_bbox(mm, self.geometry.height_mm),
        }
    }

    pub fn equipment(&self, eq: &Equipment) -> Equipment {
        Equipment {
            bbox: self.bbox(eq.bbox),
            ..eq.clone()
        }
    }

    pub fn connection(&self, conn: &Connection) -> Connection {
        Connection {
            path: conn.path.iter().map(|&p| self.point(p)).collect(),
            ..conn.clone()
        }
    }

    pub fn endpoint(&self, ep: &Endpoint) -> Endpoint {
        Endpoint {
            point: self.point(ep.point),
            ..ep.clone()
        }
    }

    pub fn resolved(&self, r: &ResolvedEndpoint) -> ResolvedEndpoint {
        ResolvedEndpoint {
            endpoint: self.endpoint(&r.endpoint),
            distance: r.distance * self.geometry.scale_x().max(self.geometry.scale_y()),
            tag: r.tag.clone(),
        }
    }
}

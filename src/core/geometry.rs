use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Self) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned box stored as origin plus extent. Width and height are never negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w: w.max(0.0),
            h: h.max(0.0),
        }
    }

    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs())
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn iou(&self, other: &Self) -> f64 {
        if self.is_degenerate() || other.is_degenerate() {
            return 0.0;
        }
        let iw = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let ih = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let inter_area = iw * ih;
        let union = self.area() + other.area() - inter_area;
        if union <= 0.0 {
            0.0
        } else {
            inter_area / union
        }
    }

    pub fn center_distance(&self, other: &Self) -> f64 {
        self.center().distance(&other.center())
    }

    /// Distance from a point to the nearest edge, `0` inside the box.
    pub fn distance_to_point(&self, p: &Point) -> f64 {
        let dx = (self.x - p.x).max(0.0).max(p.x - self.right());
        let dy = (self.y - p.y).max(0.0).max(p.y - self.bottom());
        (dx * dx + dy * dy).sqrt()
    }

    pub fn diagonal(&self) -> f64 {
        (self.w * self.w + self.h * self.h).sqrt()
    }

    /// Smallest box covering every point, `None` for an empty slice.
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Some(Self::from_corners(x0, y0, x1, y1))
    }
}

pub fn path_length(path: &[Point]) -> f64 {
    path.windows(2).map(|seg| seg[0].distance(&seg[1])).sum()
}

/// Resamples a polyline into `samples` points spaced evenly along its arc length.
pub fn resample(path: &[Point], samples: usize) -> Vec<Point> {
    if path.is_empty() || samples == 0 {
        return Vec::new();
    }
    if samples == 1 || path.len() == 1 {
        return vec![path[0]; samples];
    }

    let total = path_length(path);
    if total <= 0.0 {
        return vec![path[0]; samples];
    }

    let step = total / (samples - 1) as f64;
    let mut out = Vec::with_capacity(samples);
    let mut seg = 0;
    let mut walked = 0.0;

    for i in 0..samples {
        let target = (step * i as f64).min(total);
        while seg < path.len() - 2 && walked + path[seg].distance(&path[seg + 1]) < target {
            walked += path[seg].distance(&path[seg + 1]);
            seg += 1;
        }
        let a = path[seg];
        let b = path[seg + 1];
        let len = a.distance(&b);
        let t = if len > 0.0 {
            ((target - walked) / len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        out.push(Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t));
    }
    out
}

/// Shape similarity of two polylines in `[0, 1]`.
///
/// Both paths are resampled by arc length, corresponding samples are compared in
/// both traversal orders (duplicate detections disagree on direction), and the
/// better mean distance is normalized by the larger bounding-box diagonal.
pub fn path_similarity(a: &[Point], b: &[Point], samples: usize) -> f64 {
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }
    let samples = samples.max(2);
    let ra = resample(a, samples);
    let rb = resample(b, samples);

    let forward = mean_pointwise_distance(ra.iter(), rb.iter());
    let reverse = mean_pointwise_distance(ra.iter(), rb.iter().rev());
    let mean = forward.min(reverse);

    let scale = match (BBox::enclosing(a), BBox::enclosing(b)) {
        (Some(ba), Some(bb)) => ba.diagonal().max(bb.diagonal()),
        _ => 0.0,
    };
    if scale <= 0.0 {
        return if mean <= f64::EPSILON { 1.0 } else { 0.0 };
    }

    (1.0 - mean / scale).clamp(0.0, 1.0)
}

fn mean_pointwise_distance<'a>(
    a: impl Iterator<Item = &'a Point>,
    b: impl Iterator<Item = &'a Point>,
) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (p, q) in a.zip(b) {
        total += p.distance(q);
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

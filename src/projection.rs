//! Affine projection from geographic coordinates onto the drawing plane.
//!
//! Longitude maps to x and latitude to y (inverted, drawing-space y grows
//! downward). Each axis is scaled independently so the geographic frame fills
//! the target rectangle exactly.

use crate::data::osm::GeoPoint;

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawingPoint {
    pub x: f64,
    pub y: f64,
}

impl DrawingPoint {
    pub fn new(x: f64, y: f64) -> Self {
        DrawingPoint { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: GeoPoint,
    pub max: GeoPoint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawingRect {
    pub origin: DrawingPoint,
    pub size: DrawingPoint,
}

#[derive(Debug, Clone)]
pub struct Projector {
    bounds: BoundingBox,
    rect: DrawingRect,
    span_lon: f64,
    span_lat: f64,
}

impl Projector {
    pub fn new(bounds: BoundingBox, rect: DrawingRect) -> Self {
        Projector {
            bounds,
            rect,
            span_lon: bounds.max.lon - bounds.min.lon,
            span_lat: bounds.max.lat - bounds.min.lat,
        }
    }

    pub fn project(&self, point: GeoPoint) -> DrawingPoint {
        // Fractions keep the frame corners exact: span / span is exactly 1.
        let fx = if self.span_lon == 0.0 { 0.0 } else { (point.lon - self.bounds.min.lon) / self.span_lon };
        let fy = if self.span_lat == 0.0 { 0.0 } else { (self.bounds.max.lat - point.lat) / self.span_lat };
        DrawingPoint {
            x: self.rect.origin.x + self.rect.size.x * fx,
            y: self.rect.origin.y + self.rect.size.y * fy,
        }
    }

    /// Degrees per drawing unit on each axis, 0 for a degenerate axis.
    pub fn inverse_scale(&self) -> DrawingPoint {
        DrawingPoint {
            x: if self.rect.size.x == 0.0 { 0.0 } else { self.span_lon / self.rect.size.x },
            y: if self.rect.size.y == 0.0 { 0.0 } else { self.span_lat / self.rect.size.y },
        }
    }

    pub fn rect(&self) -> DrawingRect {
        self.rect
    }

    /// Whether the frame touches the left and right canvas edges while
    /// leaving margins above and below. Those margins get padded over so
    /// geometry spilling out of the frame is hidden.
    pub fn needs_vertical_padding(&self) -> bool {
        self.rect.origin.x == 0.0 && self.rect.origin.y > 0.0
    }
}

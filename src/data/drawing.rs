use crate::data::osm::Tags;
use crate::projection::DrawingPoint;
use crate::style::color::Color;

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(DrawingPoint),
    LineTo(DrawingPoint),
    QuadTo(DrawingPoint, DrawingPoint),
    CubicTo(DrawingPoint, DrawingPoint, DrawingPoint),
    Close,
}

impl PathCommand {
    pub fn translate(&self, dx: f64, dy: f64) -> PathCommand {
        let shift = |p: &DrawingPoint| DrawingPoint::new(p.x + dx, p.y + dy);
        match self {
            PathCommand::MoveTo(p) => PathCommand::MoveTo(shift(p)),
            PathCommand::LineTo(p) => PathCommand::LineTo(shift(p)),
            PathCommand::QuadTo(c, p) => PathCommand::QuadTo(shift(c), shift(p)),
            PathCommand::CubicTo(c1, c2, p) => PathCommand::CubicTo(shift(c1), shift(c2), shift(p)),
            PathCommand::Close => PathCommand::Close,
        }
    }
}

pub fn rect_path(x: f64, y: f64, width: f64, height: f64) -> Vec<PathCommand> {
    vec![
        PathCommand::MoveTo(DrawingPoint::new(x, y)),
        PathCommand::LineTo(DrawingPoint::new(x + width, y)),
        PathCommand::LineTo(DrawingPoint::new(x + width, y + height)),
        PathCommand::LineTo(DrawingPoint::new(x, y + height)),
        PathCommand::Close,
    ]
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
    pub dash: Vec<f32>,
    pub cap: LineCap,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Paint {
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
    pub opacity: f32,
}

impl Paint {
    pub fn fill(color: Color) -> Self {
        Paint { fill: Some(color), stroke: None, opacity: 1.0 }
    }
}

/// Visual style and layering key for one primitive.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct StyleDescriptor {
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
    pub opacity: f32,
    pub icon_refs: Vec<String>,
    pub layer: f64,
    pub priority: i32,
}

impl StyleDescriptor {
    pub fn paint(&self) -> Paint {
        Paint { fill: self.fill, stroke: self.stroke.clone(), opacity: self.opacity }
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct PathPrimitive {
    pub commands: Vec<PathCommand>,
    pub style: StyleDescriptor,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct PointPrimitive {
    pub position: DrawingPoint,
    pub icons: Vec<String>,
    pub color: Color,
    pub tags: Tags,
    pub matched_tag_keys: Vec<String>,
    pub layer: f64,
    pub priority: i32,
}

/// Every primitive of one run, in draw order once sorted.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Default)]
pub struct Drawing {
    pub width: u32,
    pub height: u32,
    pub frame_origin: DrawingPoint,
    /// Whether the margins above and below the frame get painted over.
    pub vertical_padding: bool,
    pub paths: Vec<PathPrimitive>,
    pub points: Vec<PointPrimitive>,
    /// Unstyled way and node geometry, only filled for debug renders.
    pub raw_ways: Vec<Vec<PathCommand>>,
    pub raw_nodes: Vec<DrawingPoint>,
}

impl Drawing {
    /// Stable sort by `(layer, priority)`; equal keys keep insertion order.
    pub fn sort(&mut self) {
        self.paths.sort_by(|a, b| {
            a.style.layer.total_cmp(&b.style.layer).then(a.style.priority.cmp(&b.style.priority))
        });
        self.points.sort_by(|a, b| a.layer.total_cmp(&b.layer).then(a.priority.cmp(&b.priority)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub fill: Color,
    pub halo: Option<Stroke>,
    pub opacity: f32,
    pub font_size: f32,
    pub anchor: TextAnchor,
}

/// One call to an emitter. Emitters receive these in final draw order.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Path { commands: Vec<PathCommand>, paint: Paint },
    Circle { center: DrawingPoint, radius: f64, color: Color },
    Text { position: DrawingPoint, content: String, style: TextStyle },
}

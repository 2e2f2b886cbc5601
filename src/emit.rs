pub mod raster;
pub mod svg;

use crate::data::drawing::{rect_path, DrawCall, Drawing, LineCap, Paint, Stroke};
use crate::errors::Result;
use crate::glyph::IconSet;
use crate::placement::{icon_calls, missed_tag_labels, place};
use crate::style::color::Color;

const RAW_WAY_WIDTH: f32 = 0.2;
const RAW_NODE_RADIUS: f64 = 0.2;

/// Output backend. Receives draw calls in final order, bracketed by
/// `begin` and `finish`.
pub trait Emitter {
    fn begin(&mut self, width: u32, height: u32) -> Result<()>;
    fn emit(&mut self, call: &DrawCall) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub overlap: f64,
    pub show_missed_tags: bool,
}

/// Streams a sorted drawing to `emitter`: background, raw geometry, paths,
/// then icons with their labels, then the vertical padding if any.
pub fn render(drawing: &Drawing, background: Color, icons: &IconSet, options: RenderOptions, emitter: &mut dyn Emitter) -> Result<()> {
    let width = drawing.width as f64;
    let height = drawing.height as f64;
    emitter.begin(drawing.width, drawing.height)?;
    emitter.emit(&DrawCall::Path { commands: rect_path(0.0, 0.0, width, height), paint: Paint::fill(background) })?;

    let raw_paint = Paint {
        fill: None,
        stroke: Some(Stroke { color: Color::WHITE, width: RAW_WAY_WIDTH, dash: Vec::new(), cap: LineCap::Round }),
        opacity: 1.0,
    };
    for commands in &drawing.raw_ways {
        emitter.emit(&DrawCall::Path { commands: commands.clone(), paint: raw_paint.clone() })?;
    }
    for center in &drawing.raw_nodes {
        emitter.emit(&DrawCall::Circle { center: *center, radius: RAW_NODE_RADIUS, color: Color::WHITE })?;
    }

    for path in &drawing.paths {
        emitter.emit(&DrawCall::Path { commands: path.commands.clone(), paint: path.style.paint() })?;
    }

    let placed = place(&drawing.points, options.overlap);
    let mut next = placed.iter().peekable();
    for (source, point) in drawing.points.iter().enumerate() {
        while let Some(icon) = next.next_if(|icon| icon.source == source) {
            for call in icon_calls(icon, icons) {
                emitter.emit(&call)?;
            }
        }
        if options.show_missed_tags {
            for call in missed_tag_labels(point) {
                emitter.emit(&call)?;
            }
        }
    }

    if drawing.vertical_padding {
        let margin = drawing.frame_origin.y;
        for y in [0.0, height - margin] {
            emitter.emit(&DrawCall::Path { commands: rect_path(0.0, y, width, margin), paint: Paint::fill(Color::WHITE) })?;
        }
    }
    emitter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::drawing::{PathCommand, PathPrimitive, PointPrimitive, StyleDescriptor};
    use crate::projection::DrawingPoint;

    #[derive(Default)]
    struct Recorder {
        size: Option<(u32, u32)>,
        calls: Vec<DrawCall>,
        finished: bool,
    }

    impl Emitter for Recorder {
        fn begin(&mut self, width: u32, height: u32) -> Result<()> {
            self.size = Some((width, height));
            Ok(())
        }

        fn emit(&mut self, call: &DrawCall) -> Result<()> {
            self.calls.push(call.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn point(x: f64, y: f64, icon: &str, tags: &[(&str, &str)]) -> PointPrimitive {
        PointPrimitive {
            position: DrawingPoint::new(x, y),
            icons: vec![icon.to_string()],
            color: Color::rgb(0x44, 0x44, 0x44),
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            matched_tag_keys: vec!["amenity".to_string()],
            layer: 0.0,
            priority: 0,
        }
    }

    fn drawing() -> Drawing {
        Drawing {
            width: 200,
            height: 100,
            paths: vec![PathPrimitive {
                commands: vec![PathCommand::MoveTo(DrawingPoint::new(1.0, 1.0)), PathCommand::LineTo(DrawingPoint::new(5.0, 5.0))],
                style: StyleDescriptor {
                    fill: None,
                    stroke: Some(Stroke { color: Color::BLACK, width: 1.0, dash: Vec::new(), cap: LineCap::Round }),
                    opacity: 1.0,
                    icon_refs: Vec::new(),
                    layer: 0.0,
                    priority: 50,
                },
            }],
            points: vec![
                point(50.0, 50.0, "bench", &[("amenity", "bench"), ("backrest", "no")]),
                point(52.0, 52.0, "bench", &[("amenity", "bench")]),
            ],
            ..Default::default()
        }
    }

    fn render_calls(drawing: &Drawing, options: RenderOptions) -> Recorder {
        let icons = IconSet::builtin().unwrap();
        let mut recorder = Recorder::default();
        render(drawing, Color::rgb(0xee, 0xee, 0xee), &icons, options, &mut recorder).unwrap();
        recorder
    }

    #[test]
    fn draw_order_is_background_paths_icons() {
        let recorder = render_calls(&drawing(), RenderOptions { overlap: 14.0, show_missed_tags: false });
        assert_eq!(recorder.size, Some((200, 100)));
        assert!(recorder.finished);
        // Background, one path, then outline and fill of the one accepted icon.
        assert_eq!(recorder.calls.len(), 4);
        match &recorder.calls[0] {
            DrawCall::Path { commands, paint } => {
                assert_eq!(commands, &rect_path(0.0, 0.0, 200.0, 100.0));
                assert_eq!(paint.fill, Some(Color::rgb(0xee, 0xee, 0xee)));
            },
            other => panic!("unexpected call {:?}", other),
        }
        assert!(matches!(&recorder.calls[1], DrawCall::Path { paint, .. } if paint.stroke.is_some()));
    }

    #[test]
    fn labels_and_padding_are_optional() {
        let mut padded = drawing();
        padded.frame_origin = DrawingPoint::new(0.0, 10.0);
        padded.vertical_padding = true;
        let recorder = render_calls(&padded, RenderOptions { overlap: 0.0, show_missed_tags: true });

        let texts = recorder.calls.iter().filter(|call| matches!(call, DrawCall::Text { .. })).count();
        assert_eq!(texts, 2);
        // Background, path, two icons of two calls each, two label calls, two padding rects.
        assert_eq!(recorder.calls.len(), 1 + 1 + 4 + 2 + 2);
        let last = recorder.calls.last().unwrap();
        assert_eq!(
            last,
            &DrawCall::Path { commands: rect_path(0.0, 90.0, 200.0, 10.0), paint: Paint::fill(Color::WHITE) }
        );
    }

    #[test]
    fn raw_geometry_draws_under_paths() {
        let mut raw = drawing();
        raw.raw_nodes = vec![DrawingPoint::new(3.0, 3.0)];
        raw.points.clear();
        let recorder = render_calls(&raw, RenderOptions { overlap: 14.0, show_missed_tags: false });
        assert_eq!(recorder.calls.len(), 3);
        assert_eq!(recorder.calls[1], DrawCall::Circle { center: DrawingPoint::new(3.0, 3.0), radius: 0.2, color: Color::WHITE });
    }
}

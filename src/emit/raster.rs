use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use raqote::{DrawOptions, DrawTarget, LineJoin, PathBuilder, SolidSource, Source, StrokeStyle};

use crate::data::drawing::{DrawCall, LineCap, Paint, PathCommand, Stroke, TextAnchor, TextStyle};
use crate::errors::Result;
use crate::style::color::Color;

use super::Emitter;

mod fk {
    pub use font_kit::font::Font;
    pub use font_kit::hinting::HintingOptions;
    pub use font_kit::outline::OutlineSink;
    pub use pathfinder_geometry::line_segment::LineSegment2F;
    pub use pathfinder_geometry::vector::Vector2F;
}

fn source(color: &Color) -> Source<'static> {
    Source::Solid(SolidSource::from_unpremultiplied_argb(color.a, color.r, color.g, color.b))
}

fn options(opacity: f32) -> DrawOptions {
    let mut options = DrawOptions::new();
    options.alpha = opacity;
    options
}

fn stroke_style(stroke: &Stroke) -> StrokeStyle {
    StrokeStyle {
        cap: match stroke.cap {
            LineCap::Butt => raqote::LineCap::Butt,
            LineCap::Round => raqote::LineCap::Round,
            LineCap::Square => raqote::LineCap::Square,
        },
        join: LineJoin::Round,
        width: stroke.width,
        miter_limit: 10.0,
        dash_array: stroke.dash.clone(),
        dash_offset: 0.0,
    }
}

fn build_path(commands: &[PathCommand]) -> raqote::Path {
    let mut pb = PathBuilder::new();
    for command in commands {
        match command {
            PathCommand::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathCommand::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathCommand::QuadTo(c, p) => pb.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathCommand::CubicTo(c1, c2, p) => pb.cubic_to(
                c1.x as f32, c1.y as f32, c2.x as f32, c2.y as f32, p.x as f32, p.y as f32,
            ),
            PathCommand::Close => pb.close(),
        }
    }
    pb.finish()
}

/// Feeds font outlines into a raqote path, scaled from font units and flipped
/// so that y grows downward.
struct GlyphPathSink<'a> {
    pb: &'a mut PathBuilder,
    origin: (f32, f32),
    scale: f32,
}

impl GlyphPathSink<'_> {
    fn map(&self, v: fk::Vector2F) -> (f32, f32) {
        (self.origin.0 + v.x() * self.scale, self.origin.1 - v.y() * self.scale)
    }
}

impl fk::OutlineSink for GlyphPathSink<'_> {
    fn move_to(&mut self, to: fk::Vector2F) {
        let (x, y) = self.map(to);
        self.pb.move_to(x, y);
    }

    fn line_to(&mut self, to: fk::Vector2F) {
        let (x, y) = self.map(to);
        self.pb.line_to(x, y);
    }

    fn quadratic_curve_to(&mut self, ctrl: fk::Vector2F, to: fk::Vector2F) {
        let (cx, cy) = self.map(ctrl);
        let (x, y) = self.map(to);
        self.pb.quad_to(cx, cy, x, y);
    }

    fn cubic_curve_to(&mut self, ctrl: fk::LineSegment2F, to: fk::Vector2F) {
        let (c1x, c1y) = self.map(ctrl.from());
        let (c2x, c2y) = self.map(ctrl.to());
        let (x, y) = self.map(to);
        self.pb.cubic_to(c1x, c1y, c2x, c2y, x, y);
    }

    fn close(&mut self) {
        self.pb.close();
    }
}

/// Renders into a raqote canvas and writes it out as a PNG on `finish`.
pub struct RasterEmitter {
    output: PathBuf,
    font: Option<fk::Font>,
    target: Option<DrawTarget>,
    skipped_labels: usize,
}

impl RasterEmitter {
    pub fn new(output: &Path, font_path: Option<&Path>) -> Result<Self> {
        let font = match font_path {
            Some(path) => Some(fk::Font::from_path(path, 0)?),
            None => None,
        };
        Ok(RasterEmitter { output: output.to_path_buf(), font, target: None, skipped_labels: 0 })
    }

    fn target(&mut self) -> Result<&mut DrawTarget> {
        self.target.as_mut().ok_or_else(|| "Raster emitter used before begin".into())
    }

    fn draw_path(&mut self, commands: &[PathCommand], paint: &Paint) -> Result<()> {
        let path = build_path(commands);
        let draw_options = options(paint.opacity);
        let dt = self.target()?;
        if let Some(fill) = &paint.fill {
            dt.fill(&path, &source(fill), &draw_options);
        }
        if let Some(stroke) = &paint.stroke {
            dt.stroke(&path, &source(&stroke.color), &stroke_style(stroke), &draw_options);
        }
        Ok(())
    }

    fn draw_circle(&mut self, center: (f32, f32), radius: f32, color: &Color) -> Result<()> {
        let mut pb = PathBuilder::new();
        pb.arc(center.0, center.1, radius, 0.0, 2.0 * std::f32::consts::PI);
        pb.close();
        let path = pb.finish();
        self.target()?.fill(&path, &source(color), &DrawOptions::new());
        Ok(())
    }

    fn text_path(font: &fk::Font, position: (f32, f32), content: &str, style: &TextStyle) -> Result<raqote::Path> {
        let scale = style.font_size / font.metrics().units_per_em as f32;
        let mut glyphs = Vec::new();
        let mut width = 0.0;
        for c in content.chars() {
            let Some(glyph_id) = font.glyph_for_char(c) else {
                continue;
            };
            glyphs.push((glyph_id, width));
            width += font.advance(glyph_id)?.x() * scale;
        }
        let start_x = match style.anchor {
            TextAnchor::Start => position.0,
            TextAnchor::Middle => position.0 - width / 2.0,
            TextAnchor::End => position.0 - width,
        };

        let mut pb = PathBuilder::new();
        for (glyph_id, offset) in glyphs {
            let mut sink = GlyphPathSink { pb: &mut pb, origin: (start_x + offset, position.1), scale };
            font.outline(glyph_id, fk::HintingOptions::None, &mut sink)?;
        }
        Ok(pb.finish())
    }

    fn draw_text(&mut self, position: (f32, f32), content: &str, style: &TextStyle) -> Result<()> {
        let Some(font) = &self.font else {
            if self.skipped_labels == 0 {
                warn!("No font configured, labels are not drawn");
            }
            self.skipped_labels += 1;
            return Ok(());
        };
        let path = Self::text_path(font, position, content, style)?;
        let draw_options = options(style.opacity);
        let dt = self.target()?;
        if let Some(halo) = &style.halo {
            dt.stroke(&path, &source(&halo.color), &stroke_style(halo), &draw_options);
        }
        dt.fill(&path, &source(&style.fill), &draw_options);
        Ok(())
    }
}

/// Encodes premultiplied ARGB pixels as 8-bit straight-alpha RGBA.
pub fn encode_png<W: Write>(dt: &DrawTarget, writer: W) -> Result<()> {
    let width = u32::try_from(dt.width())?;
    let height = u32::try_from(dt.height())?;
    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut png_writer = encoder.write_header()?;

    let mut rgba = Vec::with_capacity(dt.get_data().len() * 4);
    for pixel in dt.get_data() {
        let a = (pixel >> 24) & 0xff;
        let unpremultiply = |channel: u32| -> u8 {
            if a == 0 { 0 } else { ((channel * 255 + a / 2) / a).min(255) as u8 }
        };
        rgba.push(unpremultiply((pixel >> 16) & 0xff));
        rgba.push(unpremultiply((pixel >> 8) & 0xff));
        rgba.push(unpremultiply(pixel & 0xff));
        rgba.push(a as u8);
    }
    png_writer.write_image_data(&rgba)?;
    png_writer.finish()?;
    Ok(())
}

impl Emitter for RasterEmitter {
    fn begin(&mut self, width: u32, height: u32) -> Result<()> {
        self.target = Some(DrawTarget::new(i32::try_from(width)?, i32::try_from(height)?));
        Ok(())
    }

    fn emit(&mut self, call: &DrawCall) -> Result<()> {
        match call {
            DrawCall::Path { commands, paint } => self.draw_path(commands, paint),
            DrawCall::Circle { center, radius, color } => {
                self.draw_circle((center.x as f32, center.y as f32), *radius as f32, color)
            },
            DrawCall::Text { position, content, style } => {
                self.draw_text((position.x as f32, position.y as f32), content, style)
            },
        }
    }

    fn finish(&mut self) -> Result<()> {
        let dt = self.target.take().ok_or("Raster emitter finished before begin")?;
        if self.skipped_labels > 0 {
            warn!(labels = self.skipped_labels; "Skipped labels without a font");
        }
        let output_str = self.output.to_string_lossy();
        info!(path = &*output_str; "Writing raster map");
        let mut writer = BufWriter::new(File::create(&self.output)?);
        encode_png(&dt, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

use std::fmt::Write as _;
use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::data::drawing::{DrawCall, LineCap, Paint, PathCommand, TextAnchor, TextStyle};
use crate::errors::Result;
use crate::projection::DrawingPoint;
use crate::style::color::Color;

use super::Emitter;

/// Rounds to three decimals; `Display` then drops trailing zeros.
fn num(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn point(out: &mut String, p: &DrawingPoint) {
    let _ = write!(out, "{},{}", num(p.x), num(p.y));
}

pub fn path_data(commands: &[PathCommand]) -> String {
    let mut out = String::new();
    for command in commands {
        if !out.is_empty() {
            out.push(' ');
        }
        match command {
            PathCommand::MoveTo(p) => {
                out.push_str("M ");
                point(&mut out, p);
            },
            PathCommand::LineTo(p) => {
                out.push_str("L ");
                point(&mut out, p);
            },
            PathCommand::QuadTo(c, p) => {
                out.push_str("Q ");
                point(&mut out, c);
                out.push(' ');
                point(&mut out, p);
            },
            PathCommand::CubicTo(c1, c2, p) => {
                out.push_str("C ");
                point(&mut out, c1);
                out.push(' ');
                point(&mut out, c2);
                out.push(' ');
                point(&mut out, p);
            },
            PathCommand::Close => out.push('Z'),
        }
    }
    out
}

fn color_attrs(out: &mut String, attribute: &str, color: &Color) {
    let _ = write!(out, "{}:{};", attribute, color.to_hex());
    if color.a != 0xff {
        let _ = write!(out, "{}-opacity:{};", attribute, num(color.a as f64 / 255.0));
    }
}

fn cap_name(cap: LineCap) -> &'static str {
    match cap {
        LineCap::Butt => "butt",
        LineCap::Round => "round",
        LineCap::Square => "square",
    }
}

pub fn paint_style(paint: &Paint) -> String {
    let mut out = String::new();
    match &paint.fill {
        Some(fill) => color_attrs(&mut out, "fill", fill),
        None => out.push_str("fill:none;"),
    }
    if let Some(stroke) = &paint.stroke {
        color_attrs(&mut out, "stroke", &stroke.color);
        let _ = write!(
            out,
            "stroke-width:{};stroke-linecap:{};stroke-linejoin:round;",
            num(stroke.width as f64),
            cap_name(stroke.cap)
        );
        if !stroke.dash.is_empty() {
            let dash: Vec<String> = stroke.dash.iter().map(|d| num(*d as f64).to_string()).collect();
            let _ = write!(out, "stroke-dasharray:{};", dash.join(","));
        }
    }
    if paint.opacity != 1.0 {
        let _ = write!(out, "opacity:{};", num(paint.opacity as f64));
    }
    out
}

fn text_style(style: &TextStyle) -> String {
    let anchor = match style.anchor {
        TextAnchor::Start => "start",
        TextAnchor::Middle => "middle",
        TextAnchor::End => "end",
    };
    let mut out = format!("font-size:{};text-anchor:{};", num(style.font_size as f64), anchor);
    color_attrs(&mut out, "fill", &style.fill);
    if let Some(halo) = &style.halo {
        color_attrs(&mut out, "stroke", &halo.color);
        let _ = write!(out, "stroke-width:{};stroke-linejoin:round;", num(halo.width as f64));
    }
    if style.opacity != 1.0 {
        let _ = write!(out, "opacity:{};", num(style.opacity as f64));
    }
    out
}

/// Writes SVG 1.1 markup.
pub struct SvgEmitter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> SvgEmitter<W> {
    pub fn new(inner: W) -> Self {
        SvgEmitter { writer: Writer::new_with_indent(inner, b' ', 2) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> Emitter for SvgEmitter<W> {
    fn begin(&mut self, width: u32, height: u32) -> Result<()> {
        let (width, height) = (width.to_string(), height.to_string());
        self.writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let svg = BytesStart::new("svg").with_attributes([
            ("xmlns", "http://www.w3.org/2000/svg"),
            ("version", "1.1"),
            ("width", width.as_str()),
            ("height", height.as_str()),
        ]);
        self.writer.write_event(Event::Start(svg))?;
        Ok(())
    }

    fn emit(&mut self, call: &DrawCall) -> Result<()> {
        match call {
            DrawCall::Path { commands, paint } => {
                let (d, style) = (path_data(commands), paint_style(paint));
                let path = BytesStart::new("path").with_attributes([("d", d.as_str()), ("style", style.as_str())]);
                self.writer.write_event(Event::Empty(path))?;
            },
            DrawCall::Circle { center, radius, color } => {
                let (cx, cy, r) = (num(center.x).to_string(), num(center.y).to_string(), num(*radius).to_string());
                let fill = color.to_hex();
                let circle = BytesStart::new("circle").with_attributes([
                    ("cx", cx.as_str()),
                    ("cy", cy.as_str()),
                    ("r", r.as_str()),
                    ("fill", fill.as_str()),
                ]);
                self.writer.write_event(Event::Empty(circle))?;
            },
            DrawCall::Text { position, content, style } => {
                let (x, y, style) = (num(position.x).to_string(), num(position.y).to_string(), text_style(style));
                let text = BytesStart::new("text").with_attributes([
                    ("x", x.as_str()),
                    ("y", y.as_str()),
                    ("style", style.as_str()),
                ]);
                self.writer.write_event(Event::Start(text))?;
                self.writer.write_event(Event::Text(BytesText::new(content)))?;
                self.writer.write_event(Event::End(BytesEnd::new("text")))?;
            },
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new("svg")))?;
        self.writer.get_mut().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::drawing::Stroke;

    fn p(x: f64, y: f64) -> DrawingPoint {
        DrawingPoint::new(x, y)
    }

    #[test]
    fn path_data_rounds_to_three_decimals() {
        let d = path_data(&[
            PathCommand::MoveTo(p(1.23456, 2.0)),
            PathCommand::LineTo(p(-0.0001, 10.5)),
            PathCommand::QuadTo(p(1.0, 1.0), p(2.0, 2.0)),
            PathCommand::Close,
        ]);
        assert_eq!(d, "M 1.235,2 L 0,10.5 Q 1,1 2,2 Z");
    }

    #[test]
    fn paint_style_lists_stroke_details() {
        let paint = Paint {
            fill: None,
            stroke: Some(Stroke { color: Color::rgb(0x88, 0x88, 0x88), width: 3.0, dash: vec![7.5, 13.5], cap: LineCap::Round }),
            opacity: 0.5,
        };
        assert_eq!(
            paint_style(&paint),
            "fill:none;stroke:#888888;stroke-width:3;stroke-linecap:round;stroke-linejoin:round;stroke-dasharray:7.5,13.5;opacity:0.5;"
        );
        assert_eq!(paint_style(&Paint::fill(Color::rgb(0xd4, 0xd4, 0xd4))), "fill:#D4D4D4;");
    }

    #[test]
    fn writes_a_complete_document() {
        let mut emitter = SvgEmitter::new(Vec::new());
        emitter.begin(100, 50).unwrap();
        emitter.emit(&DrawCall::Circle { center: p(3.0, 4.0), radius: 0.2, color: Color::WHITE }).unwrap();
        emitter.emit(&DrawCall::Text {
            position: p(10.0, 28.0),
            content: "shop: fish & chips <fresh>".to_string(),
            style: TextStyle {
                fill: Color::rgb(0x73, 0x4a, 0x08),
                halo: None,
                opacity: 1.0,
                font_size: 10.0,
                anchor: TextAnchor::Middle,
            },
        }).unwrap();
        emitter.finish().unwrap();
        let svg = String::from_utf8(emitter.into_inner()).unwrap();

        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(svg.contains("<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"100\" height=\"50\">"));
        assert!(svg.contains("<circle cx=\"3\" cy=\"4\" r=\"0.2\" fill=\"#FFFFFF\"/>"));
        assert!(svg.contains("shop: fish &amp; chips &lt;fresh&gt;"));
        assert!(svg.contains("style=\"font-size:10;text-anchor:middle;fill:#734A08;\""));
        assert!(svg.trim_end().ends_with("</svg>"));
    }
}

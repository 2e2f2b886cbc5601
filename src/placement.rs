//! Greedy icon placement around point primitives.
//!
//! Icons of one point are laid out in a row of fixed-width slots centred on
//! the point. When an overlap radius is set, a slot is dropped if any of the
//! most recent accepted placements falls inside the box around it.

use std::collections::VecDeque;

use log::info;

use crate::data::drawing::{DrawCall, LineCap, Paint, PointPrimitive, Stroke, TextAnchor, TextStyle};
use crate::glyph::IconSet;
use crate::projection::DrawingPoint;
use crate::style::color::Color;
use crate::style::missed_tags::unmatched;

pub const SLOT_WIDTH: f64 = 16.0;
pub const HISTORY_LEN: usize = 1000;

const LABEL_COLOR: Color = Color::rgb(0x73, 0x4a, 0x08);
const LINK_COLOR: Color = Color::rgb(0x00, 0x00, 0xff);
const LABEL_FONT_SIZE: f32 = 10.0;
const LABEL_FIRST_OFFSET: f64 = 18.0;
const LABEL_LINE_HEIGHT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedIcon {
    /// Index of the point primitive the icon belongs to.
    pub source: usize,
    pub icon: String,
    pub position: DrawingPoint,
    pub color: Color,
}

pub struct PlacementEngine {
    overlap: f64,
    history: VecDeque<DrawingPoint>,
    accepted: usize,
    rejected: usize,
}

impl PlacementEngine {
    pub fn new(overlap: f64) -> Self {
        PlacementEngine {
            overlap,
            history: VecDeque::with_capacity(HISTORY_LEN),
            accepted: 0,
            rejected: 0,
        }
    }

    fn collides(&self, candidate: DrawingPoint) -> bool {
        let r = self.overlap;
        self.history.iter().any(|placed| {
            candidate.x - r <= placed.x && placed.x <= candidate.x + r
                && candidate.y - r <= placed.y && placed.y <= candidate.y + r
        })
    }

    fn remember(&mut self, position: DrawingPoint) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(position);
    }

    /// Places the icons of one point. With a zero radius every slot is kept.
    pub fn place_point(&mut self, source: usize, point: &PointPrimitive) -> Vec<PlacedIcon> {
        let mut placed = Vec::with_capacity(point.icons.len());
        let mut offset = -((point.icons.len() as f64) - 1.0) * SLOT_WIDTH / 2.0;

        for icon in &point.icons {
            let position = DrawingPoint::new(point.position.x + offset, point.position.y);
            if self.overlap != 0.0 {
                if self.collides(position) {
                    self.rejected += 1;
                    continue;
                }
                self.remember(position);
            }
            self.accepted += 1;
            placed.push(PlacedIcon { source, icon: icon.clone(), position, color: point.color });
            offset += SLOT_WIDTH;
        }
        placed
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

/// Places every point in order and returns the flat list of accepted icons.
pub fn place(points: &[PointPrimitive], overlap_radius: f64) -> Vec<PlacedIcon> {
    let mut engine = PlacementEngine::new(overlap_radius);
    let placed: Vec<PlacedIcon> = points.iter()
        .enumerate()
        .flat_map(|(source, point)| engine.place_point(source, point))
        .collect();
    info!(accepted = engine.accepted(), rejected = engine.rejected(); "Placed icons");
    placed
}

/// Outline then fill for one placed glyph.
pub fn icon_calls(placed: &PlacedIcon, icons: &IconSet) -> [DrawCall; 2] {
    let commands = icons.glyph(&placed.icon).placed_at(placed.position);
    let (outline, opacity) = if placed.color.luminance() > 200.0 {
        (Color::BLACK, 0.3)
    } else {
        (Color::WHITE, 0.5)
    };
    [
        DrawCall::Path {
            commands: commands.clone(),
            paint: Paint {
                fill: Some(outline),
                stroke: Some(Stroke { color: outline, width: 3.0, dash: Vec::new(), cap: LineCap::Round }),
                opacity,
            },
        },
        DrawCall::Path { commands, paint: Paint::fill(placed.color) },
    ]
}

fn label_text(key: &str, value: &str) -> (String, Color) {
    if value.starts_with("http://") || value.starts_with("https://") {
        return (format!("{}: link", key.replace('&', "and")), LINK_COLOR);
    }
    (format!("{}: {}", key, value).replace('&', "and"), LABEL_COLOR)
}

/// Labels for the tags of `point` that nothing accounted for, stacked under
/// the point. Each label is a halo pass followed by the text itself.
pub fn missed_tag_labels(point: &PointPrimitive) -> Vec<DrawCall> {
    let mut calls = Vec::new();
    for (line, (key, value)) in unmatched(&point.tags, &point.matched_tag_keys).enumerate() {
        let (content, color) = label_text(key, value);
        let position = DrawingPoint::new(
            point.position.x,
            point.position.y + LABEL_FIRST_OFFSET + LABEL_LINE_HEIGHT * line as f64,
        );
        calls.push(DrawCall::Text {
            position,
            content: content.clone(),
            style: TextStyle {
                fill: Color::WHITE,
                halo: Some(Stroke { color: Color::WHITE, width: 5.0, dash: Vec::new(), cap: LineCap::Round }),
                opacity: 0.5,
                font_size: LABEL_FONT_SIZE,
                anchor: TextAnchor::Middle,
            },
        });
        calls.push(DrawCall::Text {
            position,
            content,
            style: TextStyle {
                fill: color,
                halo: None,
                opacity: 1.0,
                font_size: LABEL_FONT_SIZE,
                anchor: TextAnchor::Middle,
            },
        });
    }
    calls
}

//! Icon glyphs: vector outlines keyed by icon name.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::data::drawing::PathCommand;
use crate::errors::Result;
use crate::projection::DrawingPoint;

const BUILTIN_ICONS: &str = include_str!("../resources/icons.json");
const FALLBACK_PATH: &str = "M 4,4 L 4,10 10,10 10,4 z";

/// Side of the square a glyph is drawn in.
pub const GLYPH_SIZE: f64 = 16.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub commands: Vec<PathCommand>,
    /// Placement shift in glyph-size units.
    pub offset: (f64, f64),
}

impl Glyph {
    /// Outline moved so that the glyph box is centred on `anchor`. The anchor
    /// is snapped to whole units first.
    pub fn placed_at(&self, anchor: DrawingPoint) -> Vec<PathCommand> {
        let dx = anchor.x.trunc() - GLYPH_SIZE / 2.0 - self.offset.0 * GLYPH_SIZE;
        let dy = anchor.y.trunc() - GLYPH_SIZE / 2.0 - self.offset.1 * GLYPH_SIZE;
        self.commands.iter().map(|command| command.translate(dx, dy)).collect()
    }
}

#[derive(Deserialize)]
struct GlyphFile {
    path: String,
    #[serde(default)]
    offset: (f64, f64),
}

pub struct IconSet {
    glyphs: HashMap<String, Glyph>,
    fallback: Glyph,
}

impl IconSet {
    pub fn builtin() -> Result<IconSet> {
        IconSet::from_json(BUILTIN_ICONS)
    }

    pub fn load(path: Option<&Path>) -> Result<IconSet> {
        match path {
            Some(path) => IconSet::from_json(&fs::read_to_string(path)?),
            None => IconSet::builtin(),
        }
    }

    pub fn from_json(json: &str) -> Result<IconSet> {
        let parser = PathDataParser::new()?;
        let files: HashMap<String, GlyphFile> = serde_json::from_str(json)?;
        let mut glyphs = HashMap::new();
        for (name, file) in files {
            let commands = parser.parse(&file.path)
                .map_err(|err| format!("Icon '{}': {}", name, err.message))?;
            glyphs.insert(name, Glyph { commands, offset: file.offset });
        }
        Ok(IconSet {
            glyphs,
            fallback: Glyph { commands: parser.parse(FALLBACK_PATH)?, offset: (0.0, 0.0) },
        })
    }

    /// Glyph for `name`, or the fallback square for unknown names.
    pub fn glyph(&self, name: &str) -> &Glyph {
        match self.glyphs.get(name) {
            Some(glyph) => glyph,
            None => {
                debug!(icon = name; "Unknown icon, using fallback glyph");
                &self.fallback
            },
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.glyphs.contains_key(name)
    }
}

/// Parser for the subset of SVG path data used by icon sets:
/// `M L H V C Q Z` in absolute and relative form.
pub struct PathDataParser {
    token: Regex,
}

enum Token {
    Command(char),
    Number(f64),
}

impl PathDataParser {
    pub fn new() -> Result<Self> {
        Ok(PathDataParser {
            token: Regex::new(r"([MmLlHhVvCcQqZz])|([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)")?,
        })
    }

    fn tokenize(&self, data: &str) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        for captures in self.token.captures_iter(data) {
            if let Some(command) = captures.get(1) {
                if let Some(c) = command.as_str().chars().next() {
                    tokens.push(Token::Command(c));
                }
            } else if let Some(number) = captures.get(2) {
                tokens.push(Token::Number(number.as_str().parse()?));
            }
        }
        Ok(tokens)
    }

    pub fn parse(&self, data: &str) -> Result<Vec<PathCommand>> {
        let tokens = self.tokenize(data)?;
        let mut commands = Vec::new();
        let mut current = DrawingPoint::default();
        let mut subpath_start = DrawingPoint::default();
        let mut command: Option<char> = None;
        let mut idx = 0;

        let number = |idx: &mut usize| -> Result<f64> {
            match tokens.get(*idx) {
                Some(Token::Number(value)) => {
                    *idx += 1;
                    Ok(*value)
                },
                _ => Err(format!("Expected a number in path data '{}'", data).into()),
            }
        };

        while idx < tokens.len() {
            if let Token::Command(c) = tokens[idx] {
                command = Some(c);
                idx += 1;
                if c == 'Z' || c == 'z' {
                    commands.push(PathCommand::Close);
                    current = subpath_start;
                    continue;
                }
            }
            let Some(c) = command else {
                return Err(format!("Path data '{}' does not start with a command", data).into());
            };
            let relative = c.is_ascii_lowercase();
            let base = if relative { current } else { DrawingPoint::default() };
            let point = |x: f64, y: f64| DrawingPoint::new(base.x + x, base.y + y);

            match c.to_ascii_uppercase() {
                'M' => {
                    current = point(number(&mut idx)?, number(&mut idx)?);
                    subpath_start = current;
                    commands.push(PathCommand::MoveTo(current));
                    // Further coordinate pairs after a move are implicit line-tos.
                    command = Some(if relative { 'l' } else { 'L' });
                },
                'L' => {
                    current = point(number(&mut idx)?, number(&mut idx)?);
                    commands.push(PathCommand::LineTo(current));
                },
                'H' => {
                    let x = number(&mut idx)?;
                    current = DrawingPoint::new(if relative { current.x + x } else { x }, current.y);
                    commands.push(PathCommand::LineTo(current));
                },
                'V' => {
                    let y = number(&mut idx)?;
                    current = DrawingPoint::new(current.x, if relative { current.y + y } else { y });
                    commands.push(PathCommand::LineTo(current));
                },
                'C' => {
                    let c1 = point(number(&mut idx)?, number(&mut idx)?);
                    let c2 = point(number(&mut idx)?, number(&mut idx)?);
                    current = point(number(&mut idx)?, number(&mut idx)?);
                    commands.push(PathCommand::CubicTo(c1, c2, current));
                },
                'Q' => {
                    let ctrl = point(number(&mut idx)?, number(&mut idx)?);
                    current = point(number(&mut idx)?, number(&mut idx)?);
                    commands.push(PathCommand::QuadTo(ctrl, current));
                },
                _ => return Err(format!("Unsupported path command '{}'", c).into()),
            }
        }
        Ok(commands)
    }
}

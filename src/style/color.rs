use std::collections::HashMap;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::errors::Result;

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 0xff }
    }

    /// Parses `RRGGBB`, `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(string: &str) -> Option<Color> {
        let hex = string.strip_prefix('#').unwrap_or(string);
        if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
            return None;
        }
        let byte = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
        Some(Color {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: if hex.len() == 8 { byte(6)? } else { 0xff },
        })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn luminance(&self) -> f64 {
        0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64
    }
}

struct ColorVisitor;

impl<'de> Visitor<'de> for ColorVisitor {
    type Value = Color;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "a hex colour string like 'RRGGBB', '#RRGGBB' or '#RRGGBBAA'")
    }

    fn visit_str<E>(self, string: &str) -> std::result::Result<Self::Value, E> where E: de::Error {
        Color::from_hex(string).ok_or_else(|| de::Error::invalid_value(de::Unexpected::Str(string), &self))
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error> where D: Deserializer<'de> {
        deserializer.deserialize_str(ColorVisitor)
    }
}

/// Flat colour-name table. Lookups accept either a known name or a literal
/// hex colour.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ColorTable {
    colors: HashMap<String, Color>,
}

impl ColorTable {
    pub fn merge(&mut self, other: ColorTable) {
        self.colors.extend(other.colors);
    }

    pub fn resolve(&self, reference: &str) -> Result<Color> {
        if let Some(color) = self.colors.get(reference) {
            return Ok(*color);
        }
        Color::from_hex(reference).ok_or_else(|| format!("Unknown colour '{}'", reference).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(Color::from_hex("AACCFF"), Some(Color::rgb(0xaa, 0xcc, 0xff)));
        assert_eq!(Color::from_hex("#6688bb"), Some(Color::rgb(0x66, 0x88, 0xbb)));
        assert_eq!(Color::from_hex("#00000080"), Some(Color { r: 0, g: 0, b: 0, a: 0x80 }));
        assert_eq!(Color::from_hex("blue"), None);
        assert_eq!(Color::from_hex("#GG0000"), None);
    }

    #[test]
    fn table_resolves_names_then_hex() {
        let table: ColorTable = serde_json::from_str(r##"{"water": "AACCFF", "white": "#FFFFFF"}"##).unwrap();
        assert_eq!(table.resolve("water").unwrap(), Color::rgb(0xaa, 0xcc, 0xff));
        assert_eq!(table.resolve("123456").unwrap(), Color::rgb(0x12, 0x34, 0x56));
        assert!(table.resolve("no_such_colour").is_err());
    }

    #[test]
    fn light_colours_have_high_luminance() {
        assert!(Color::WHITE.luminance() > 200.0);
        assert!(Color::rgb(0x44, 0x44, 0x44).luminance() < 200.0);
    }
}

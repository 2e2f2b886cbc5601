//! Style scheme: colour table, per-category way rules and node icon rules.
//!
//! The JSON file is deserialized into loosely typed `*File` structs and then
//! compiled into a `Scheme` where every colour reference is resolved, so the
//! resolver never has to deal with bad configuration.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::data::drawing::{LineCap, Stroke};
use crate::data::osm::Tags;
use crate::errors::Result;

use super::color::{Color, ColorTable};
use super::Category;

const BUILTIN_SCHEME: &str = include_str!("../../resources/scheme.json");
const DEFAULT_PRIORITY: i32 = 50;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_cap() -> LineCap {
    LineCap::Round
}

#[derive(Deserialize)]
struct SchemeFile {
    #[serde(default)]
    colors: ColorTable,
    background: String,
    default_icon_color: String,
    categories: HashMap<String, CategoryFile>,
    #[serde(default)]
    icons: Vec<IconRuleFile>,
}

#[derive(Deserialize)]
struct CategoryFile {
    #[serde(default)]
    layer: f64,
    #[serde(default = "default_priority")]
    priority: i32,
    #[serde(default)]
    values: HashMap<String, Option<StyleRuleFile>>,
    default: Option<StyleRuleFile>,
    tunnel: Option<StrokeFile>,
}

#[derive(Deserialize)]
struct StyleRuleFile {
    fill: Option<String>,
    stroke: Option<StrokeFile>,
    casing: Option<StrokeFile>,
    opacity: Option<f32>,
    #[serde(default)]
    layer: f64,
    priority: Option<i32>,
    #[serde(default)]
    icon: Vec<String>,
    icon_color: Option<String>,
    #[serde(default)]
    variants: Vec<VariantFile>,
}

#[derive(Deserialize)]
struct VariantFile {
    when: Tags,
    style: StyleRuleFile,
}

#[derive(Deserialize)]
struct StrokeFile {
    color: String,
    width: f32,
    #[serde(default)]
    dash: Vec<f32>,
    #[serde(default = "default_cap")]
    cap: LineCap,
}

#[derive(Deserialize)]
struct IconRuleFile {
    tags: Tags,
    #[serde(default)]
    icon: Vec<String>,
    color: Option<String>,
    #[serde(default)]
    add: bool,
}

#[derive(Debug, Clone)]
pub struct Scheme {
    pub background: Color,
    pub default_icon_color: Color,
    pub categories: HashMap<Category, CategoryStyle>,
    pub icon_rules: Vec<IconRule>,
}

#[derive(Debug, Clone)]
pub struct CategoryStyle {
    pub layer: f64,
    pub priority: i32,
    /// `None` marks a value that is explicitly not drawn.
    pub values: HashMap<String, Option<StyleRule>>,
    pub default: Option<StyleRule>,
    pub tunnel: Option<Stroke>,
}

impl CategoryStyle {
    pub fn rule_for(&self, value: &str) -> Option<&StyleRule> {
        match self.values.get(value) {
            Some(rule) => rule.as_ref(),
            None => self.default.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StyleRule {
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
    pub casing: Option<Stroke>,
    pub opacity: f32,
    pub layer: f64,
    pub priority: Option<i32>,
    pub icon: Vec<String>,
    pub icon_color: Option<Color>,
    pub variants: Vec<Variant>,
}

impl StyleRule {
    pub fn variant_for(&self, tags: &Tags) -> Option<&Variant> {
        self.variants.iter().find(|variant| tags_match(&variant.when, tags))
    }
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub when: Tags,
    pub style: StyleRule,
}

#[derive(Debug, Clone)]
pub struct IconRule {
    pub tags: Tags,
    pub icons: Vec<String>,
    pub color: Option<Color>,
    pub add: bool,
}

/// Every `(key, value)` of `pattern` is present in `tags`; `*` matches any value.
pub fn tags_match(pattern: &Tags, tags: &Tags) -> bool {
    pattern.iter().all(|(key, value)| {
        tags.get(key).map_or(false, |actual| value == "*" || actual == value)
    })
}

impl Scheme {
    pub fn builtin() -> Result<Scheme> {
        Scheme::from_json(BUILTIN_SCHEME, None)
    }

    pub fn load(scheme_path: Option<&Path>, colors_path: Option<&Path>) -> Result<Scheme> {
        let extra_colors = match colors_path {
            Some(path) => Some(serde_json::from_str::<ColorTable>(&fs::read_to_string(path)?)?),
            None => None,
        };
        match scheme_path {
            Some(path) => {
                let path_str = path.to_string_lossy();
                info!(path = &*path_str; "Loading style scheme");
                Scheme::from_json(&fs::read_to_string(path)?, extra_colors)
            },
            None => Scheme::from_json(BUILTIN_SCHEME, extra_colors),
        }
    }

    pub fn from_json(json: &str, extra_colors: Option<ColorTable>) -> Result<Scheme> {
        let file: SchemeFile = serde_json::from_str(json)?;
        let mut colors = file.colors;
        if let Some(extra) = extra_colors {
            colors.merge(extra);
        }

        let mut categories = HashMap::new();
        for (key, category) in file.categories {
            let category_key = Category::from_key(&key)
                .ok_or_else(|| format!("Unknown style category '{}'", key))?;
            categories.insert(category_key, compile_category(&colors, category)?);
        }

        let icon_rules = file.icons.into_iter()
            .map(|rule| -> Result<IconRule> {
                Ok(IconRule {
                    tags: rule.tags,
                    icons: rule.icon,
                    color: rule.color.as_deref().map(|color| colors.resolve(color)).transpose()?,
                    add: rule.add,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Scheme {
            background: colors.resolve(&file.background)?,
            default_icon_color: colors.resolve(&file.default_icon_color)?,
            categories,
            icon_rules,
        })
    }
}

fn compile_category(colors: &ColorTable, category: CategoryFile) -> Result<CategoryStyle> {
    let mut values = HashMap::new();
    for (value, rule) in category.values {
        let compiled = match rule {
            Some(rule) => Some(compile_rule(colors, rule)?),
            None => None,
        };
        values.insert(value, compiled);
    }
    Ok(CategoryStyle {
        layer: category.layer,
        priority: category.priority,
        values,
        default: category.default.map(|rule| compile_rule(colors, rule)).transpose()?,
        tunnel: category.tunnel.map(|stroke| compile_stroke(colors, stroke)).transpose()?,
    })
}

fn compile_rule(colors: &ColorTable, rule: StyleRuleFile) -> Result<StyleRule> {
    let variants = rule.variants.into_iter()
        .map(|variant| -> Result<Variant> {
            Ok(Variant { when: variant.when, style: compile_rule(colors, variant.style)? })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(StyleRule {
        fill: rule.fill.as_deref().map(|color| colors.resolve(color)).transpose()?,
        stroke: rule.stroke.map(|stroke| compile_stroke(colors, stroke)).transpose()?,
        casing: rule.casing.map(|stroke| compile_stroke(colors, stroke)).transpose()?,
        opacity: rule.opacity.unwrap_or(1.0),
        layer: rule.layer,
        priority: rule.priority,
        icon: rule.icon,
        icon_color: rule.icon_color.as_deref().map(|color| colors.resolve(color)).transpose()?,
        variants,
    })
}

fn compile_stroke(colors: &ColorTable, stroke: StrokeFile) -> Result<Stroke> {
    Ok(Stroke {
        color: colors.resolve(&stroke.color)?,
        width: stroke.width,
        dash: stroke.dash,
        cap: stroke.cap,
    })
}

//! Tag set -> style resolution.
//!
//! Ways and multipolygon relations are classified by the first key of
//! `CATEGORY_ORDER` they carry; the category's value rules then pick fill,
//! stroke, icons and the additive layer. Nodes only get icons, chosen by the
//! scheme's icon rules.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use regex::Regex;

use crate::data::drawing::StyleDescriptor;
use crate::data::osm::Tags;
use crate::errors::Result;

use super::color::Color;
use super::missed_tags::MissedTags;
use super::scheme::{tags_match, Scheme, StyleRule};
use super::{Category, CATEGORY_ORDER};

/// Road casings sit just below the road fill.
pub const CASING_LAYER_OFFSET: f64 = -0.01;
/// Tunnels draw below everything else regardless of their own layer.
pub const TUNNEL_LAYER_OFFSET: f64 = -100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub category: Category,
    /// Bottom to top: optional tunnel, optional casing, then the main style.
    pub styles: Vec<StyleDescriptor>,
    /// Icons drawn at the centre of area-like ways. Empty for everything else.
    pub icons: Vec<String>,
    pub icon_color: Color,
    pub matched_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconResolution {
    pub icons: Vec<String>,
    pub color: Color,
    pub matched_keys: Vec<String>,
}

pub struct StyleResolver<'a> {
    scheme: &'a Scheme,
    numeric: Regex,
    /// Keys any rule of the scheme looks at. Cache keys only use these.
    read_keys: BTreeSet<String>,
    way_cache: HashMap<String, Option<Resolution>>,
    icon_cache: HashMap<String, IconResolution>,
}

fn collect_variant_keys(rule: &StyleRule, keys: &mut BTreeSet<String>) {
    for variant in &rule.variants {
        keys.extend(variant.when.keys().cloned());
        collect_variant_keys(&variant.style, keys);
    }
}

fn read_keys(scheme: &Scheme) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = CATEGORY_ORDER.iter().map(|category| category.key().to_string()).collect();
    keys.extend(["layer", "height", "tunnel"].map(String::from));
    for category in scheme.categories.values() {
        for rule in category.values.values().flatten().chain(category.default.iter()) {
            collect_variant_keys(rule, &mut keys);
        }
    }
    for rule in &scheme.icon_rules {
        keys.extend(rule.tags.keys().cloned());
    }
    keys
}

fn signature(tags: &Tags, read_keys: &BTreeSet<String>) -> String {
    let mut signature = String::new();
    for (key, value) in tags.iter().filter(|(key, _)| read_keys.contains(*key)) {
        signature.push_str(key);
        signature.push('\u{1f}');
        signature.push_str(value);
        signature.push('\u{1e}');
    }
    signature
}

fn push_unique(keys: &mut Vec<String>, key: &str) {
    if !keys.iter().any(|existing| existing == key) {
        keys.push(key.to_string());
    }
}

impl<'a> StyleResolver<'a> {
    pub fn new(scheme: &'a Scheme) -> Result<Self> {
        Ok(StyleResolver {
            scheme,
            numeric: Regex::new(r"^\s*([-+]?(?:\d+(?:\.\d*)?|\.\d+))\s*(?:m|metres?|meters?)?\s*$")?,
            read_keys: read_keys(scheme),
            way_cache: HashMap::new(),
            icon_cache: HashMap::new(),
        })
    }

    /// Styles a way. `None` means the way is not drawn.
    pub fn resolve(&mut self, tags: &Tags, missed: &mut MissedTags) -> Option<Resolution> {
        self.resolve_with(tags, &[], missed)
    }

    /// Styles a multipolygon relation. Its `type` tag counts as used.
    pub fn resolve_multipolygon(&mut self, tags: &Tags, missed: &mut MissedTags) -> Option<Resolution> {
        self.resolve_with(tags, &["type"], missed)
    }

    fn resolve_with(&mut self, tags: &Tags, structural_keys: &[&str], missed: &mut MissedTags) -> Option<Resolution> {
        let key = signature(tags, &self.read_keys);
        let mut resolution = match self.way_cache.get(&key) {
            Some(cached) => cached.clone(),
            None => {
                let computed = self.compute(tags);
                self.way_cache.insert(key, computed.clone());
                computed
            },
        };
        match &mut resolution {
            Some(resolution) => {
                for key in structural_keys {
                    push_unique(&mut resolution.matched_keys, key);
                }
                missed.record(tags, &resolution.matched_keys)
            },
            None => {
                let used: Vec<String> = structural_keys.iter().map(|key| key.to_string()).collect();
                missed.record(tags, &used)
            },
        }
        resolution
    }

    /// Icons for a node.
    pub fn resolve_icons(&mut self, tags: &Tags, missed: &mut MissedTags) -> IconResolution {
        let key = signature(tags, &self.read_keys);
        let resolution = match self.icon_cache.get(&key) {
            Some(cached) => cached.clone(),
            None => {
                let computed = self.compute_icons(tags);
                self.icon_cache.insert(key, computed.clone());
                computed
            },
        };
        missed.record(tags, &resolution.matched_keys);
        resolution
    }

    /// Reads a numeric tag such as `layer` or `height`. Anything unparsable
    /// counts as zero.
    pub fn numeric_tag(&self, tags: &Tags, key: &str) -> f64 {
        let Some(value) = tags.get(key) else {
            return 0.0;
        };
        let parsed = self.numeric.captures(value)
            .and_then(|captures| captures.get(1))
            .and_then(|number| number.as_str().parse::<f64>().ok());
        match parsed {
            Some(number) => number,
            None => {
                debug!(key = key, value = value.as_str(); "Ignoring non-numeric tag value");
                0.0
            },
        }
    }

    fn compute(&self, tags: &Tags) -> Option<Resolution> {
        let category = CATEGORY_ORDER.iter().copied().find(|category| tags.contains_key(category.key()))?;
        let category_style = self.scheme.categories.get(&category)?;
        let value = tags.get(category.key())?;
        let base_rule = category_style.rule_for(value)?;

        let mut matched_keys = vec![category.key().to_string()];
        let rule = match base_rule.variant_for(tags) {
            Some(variant) => {
                for key in variant.when.keys() {
                    push_unique(&mut matched_keys, key);
                }
                &variant.style
            },
            None => base_rule,
        };

        let mut layer = self.numeric_tag(tags, "layer") + category_style.layer + rule.layer;
        if category == Category::Building && tags.contains_key("height") {
            layer += self.numeric_tag(tags, "height");
            push_unique(&mut matched_keys, "height");
        }
        let priority = rule.priority.unwrap_or(category_style.priority);

        let mut styles = Vec::new();
        if tags.get("tunnel").map_or(false, |tunnel| tunnel == "yes") {
            if let Some(tunnel) = &category_style.tunnel {
                push_unique(&mut matched_keys, "tunnel");
                styles.push(StyleDescriptor {
                    fill: None,
                    stroke: Some(tunnel.clone()),
                    opacity: 1.0,
                    icon_refs: Vec::new(),
                    layer: layer + TUNNEL_LAYER_OFFSET,
                    priority,
                });
            }
        }
        if let Some(casing) = &rule.casing {
            styles.push(StyleDescriptor {
                fill: None,
                stroke: Some(casing.clone()),
                opacity: rule.opacity,
                icon_refs: Vec::new(),
                layer: layer + CASING_LAYER_OFFSET,
                priority,
            });
        }

        let (icons, icon_color) = if rule.icon.is_empty() {
            (Vec::new(), self.scheme.default_icon_color)
        } else {
            let by_tags = self.compute_icons(tags);
            if by_tags.icons.is_empty() {
                (rule.icon.clone(), rule.icon_color.unwrap_or(self.scheme.default_icon_color))
            } else {
                for key in &by_tags.matched_keys {
                    push_unique(&mut matched_keys, key);
                }
                (by_tags.icons, by_tags.color)
            }
        };

        styles.push(StyleDescriptor {
            fill: rule.fill,
            stroke: rule.stroke.clone(),
            opacity: rule.opacity,
            icon_refs: icons.clone(),
            layer,
            priority,
        });

        Some(Resolution { category, styles, icons, icon_color, matched_keys })
    }

    fn compute_icons(&self, tags: &Tags) -> IconResolution {
        let mut main: Option<(Vec<String>, Option<Color>)> = None;
        let mut added = Vec::new();
        let mut matched_keys = Vec::new();

        for rule in &self.scheme.icon_rules {
            if rule.tags.is_empty() || !tags_match(&rule.tags, tags) {
                continue;
            }
            if rule.add {
                added.extend(rule.icons.iter().cloned());
            } else if main.is_none() {
                main = Some((rule.icons.clone(), rule.color));
            } else {
                continue;
            }
            for key in rule.tags.keys() {
                push_unique(&mut matched_keys, key);
            }
        }

        let (mut icons, color) = main.unwrap_or_default();
        icons.extend(added);
        IconResolution {
            icons,
            color: color.unwrap_or(self.scheme.default_icon_color),
            matched_keys,
        }
    }
}

mod collect;
mod data;
mod emit;
mod errors;
mod etl;
mod glyph;
mod placement;
mod projection;
mod rings;
mod style;

use std::env;
use std::fs::{create_dir_all, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::errors::Result;
use crate::etl::build_drawing::BuildDrawingEtl;
use crate::etl::draw_map::DrawMapEtl;
use crate::etl::parse_osm::ParseOsmEtl;
use crate::etl::Etl;
use crate::glyph::IconSet;
use crate::style::scheme::Scheme;

const DEFAULT_CONFIG_PATH: &str = "config/default.json";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GeoBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
}

fn default_dest_path() -> String {
    "output".to_string()
}

fn default_canvas_px() -> u32 {
    2650
}

fn default_margin_px() -> f64 {
    25.0
}

fn default_overlap() -> f64 {
    14.0
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Debug)]
pub struct UserConfig {
    pub data_path: String,
    #[serde(default = "default_dest_path")]
    pub dest_path: String,
    #[serde(default = "default_canvas_px")]
    pub width_px: u32,
    #[serde(default = "default_canvas_px")]
    pub height_px: u32,
    #[serde(default)]
    pub bounding_box: Option<GeoBox>,
    #[serde(default = "default_margin_px")]
    pub margin_px: f64,
    #[serde(default)]
    pub scheme_path: Option<String>,
    #[serde(default)]
    pub colors_path: Option<String>,
    #[serde(default)]
    pub icons_path: Option<String>,
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default = "default_overlap")]
    pub overlap: f64,
    #[serde(default)]
    pub show_missed_tags: bool,
    #[serde(default = "default_true")]
    pub draw_ways: bool,
    #[serde(default = "default_true")]
    pub draw_nodes: bool,
    #[serde(default)]
    pub raw_geometry: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub force: bool,
}

fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path).map_err(|err| format!("Could not open config file {}: {}", path.display(), err))?;
    let config = serde_json::from_reader(file).map_err(|err| format!("Could not parse config {}: {}", path.display(), err))?;
    Ok(config)
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new(&config.dest_path).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn warn_missing_icons(scheme: &Scheme, icons: &IconSet) {
    let referenced = scheme.icon_rules.iter().flat_map(|rule| rule.icons.iter());
    for icon in referenced.filter(|icon| !icons.contains(icon)) {
        warn!(icon = icon.as_str(); "Icon has no glyph, the fallback square will be drawn");
    }
}

fn run(config_path: &Path) -> Result<()> {
    let user_config = load_user_config(config_path)?;
    let output_dir = create_output_dir(&user_config)?;
    let output_dir_str = output_dir.to_string_lossy();
    info!(output_dir = &*output_dir_str; "Rendering map");

    let scheme = Scheme::load(
        user_config.scheme_path.as_deref().map(Path::new),
        user_config.colors_path.as_deref().map(Path::new),
    )?;
    let icons = IconSet::load(user_config.icons_path.as_deref().map(Path::new))?;
    warn_missing_icons(&scheme, &icons);

    let mut parse_etl = ParseOsmEtl::new(Path::new(&user_config.data_path));
    let mut build_etl = BuildDrawingEtl::new(&user_config, &scheme);
    let mut draw_etl = DrawMapEtl::new(&user_config, &scheme, &icons);

    if user_config.force {
        parse_etl.clean(&output_dir)?;
        build_etl.clean(&output_dir)?;
        draw_etl.clean(&output_dir)?;
    }

    parse_etl.process(&output_dir)?;
    build_etl.process(&output_dir)?;
    draw_etl.process(&output_dir)?;
    Ok(())
}

fn main() -> Result<()> {
    setup_logging();

    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    match run(Path::new(&config_path)) {
        Ok(()) => Ok(()),
        Err(err) => {
            log::error!(err = err.message; "Map rendering failed");
            Err(err)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: UserConfig = serde_json::from_str(r#"{"data_path": "data/city.osm.xz"}"#).unwrap();
        assert_eq!(config.dest_path, "output");
        assert_eq!((config.width_px, config.height_px), (2650, 2650));
        assert_eq!(config.margin_px, 25.0);
        assert_eq!(config.overlap, 14.0);
        assert!(config.draw_ways && config.draw_nodes);
        assert!(!config.show_missed_tags && !config.raw_geometry && !config.force);
        assert_eq!(config.output_format, OutputFormat::Svg);
        assert!(config.bounding_box.is_none());
    }

    #[test]
    fn config_reads_bounding_box_and_format() {
        let config: UserConfig = serde_json::from_str(r#"{
            "data_path": "map.osm",
            "bounding_box": {"min_lat": 51.5, "min_lon": -0.2, "max_lat": 51.6, "max_lon": -0.1},
            "output_format": "png",
            "overlap": 0
        }"#).unwrap();
        assert_eq!(config.bounding_box, Some(GeoBox { min_lat: 51.5, min_lon: -0.2, max_lat: 51.6, max_lon: -0.1 }));
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.overlap, 0.0);
    }

    #[test]
    fn bundled_config_parses() {
        let config: UserConfig = serde_json::from_str(include_str!("../config/default.json")).unwrap();
        assert_eq!(config.colors_path.as_deref(), Some("resources/colors.json"));
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        assert!(serde_json::from_str::<UserConfig>(r#"{"data_path": "a.osm", "output_format": "gif"}"#).is_err());
    }
}

use std::path::{Path, PathBuf};

use log::info;

use crate::data::drawing::Drawing;
use crate::data::osm::GeoPoint;
use crate::data::OsmMapData;
use crate::collect::{CollectOptions, PrimitiveCollector};
use crate::errors::Result;
use crate::projection::{BoundingBox, DrawingPoint, DrawingRect, Projector};
use crate::style::missed_tags::MissedTags;
use crate::style::scheme::Scheme;
use crate::UserConfig;

use super::parse_osm::ParseOsmEtl;
use super::{read_cache, remove_output, write_cache, Etl};

pub const ETL_NAME: &str = "build_drawing";
pub const OUTPUT_FILE_NAME: &str = "drawing.rkyv";
pub const MISSED_TAGS_FILE_NAME: &str = "missed_tags.json";

/// Geographic frame and target rectangle for a run. An explicit bounding box
/// fills the whole canvas; otherwise the node bounds are inset by the margin.
pub fn frame(config: &UserConfig, data: &OsmMapData) -> Result<Projector> {
    let width = config.width_px as f64;
    let height = config.height_px as f64;
    let projector = match &config.bounding_box {
        Some(bbox) => Projector::new(
            BoundingBox {
                min: GeoPoint::new(bbox.min_lat, bbox.min_lon),
                max: GeoPoint::new(bbox.max_lat, bbox.max_lon),
            },
            DrawingRect { origin: DrawingPoint::new(0.0, 0.0), size: DrawingPoint::new(width, height) },
        ),
        None => {
            let bounds = data.bounds().ok_or("Cannot frame a map without nodes")?;
            let margin = config.margin_px;
            Projector::new(
                bounds,
                DrawingRect {
                    origin: DrawingPoint::new(margin, margin),
                    size: DrawingPoint::new(width - 2.0 * margin, height - 2.0 * margin),
                },
            )
        },
    };
    Ok(projector)
}

pub struct BuildDrawingEtl<'a> {
    config: &'a UserConfig,
    scheme: &'a Scheme,
}

impl BuildDrawingEtl<'_> {
    pub fn new<'a>(config: &'a UserConfig, scheme: &'a Scheme) -> BuildDrawingEtl<'a> {
        BuildDrawingEtl { config, scheme }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    pub fn read_output(dir: &Path) -> Result<Drawing> {
        read_cache(&Self::output_path(dir))
    }

    fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            draw_ways: self.config.draw_ways,
            draw_nodes: self.config.draw_nodes,
            raw_geometry: self.config.raw_geometry,
        }
    }
}

impl Etl for BuildDrawingEtl<'_> {
    type Input = OsmMapData;
    type Output = (Drawing, MissedTags);

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_output(&Self::output_path(dir))?;
        remove_output(&dir.join(MISSED_TAGS_FILE_NAME))
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        ParseOsmEtl::read_output(dir)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let projector = frame(self.config, &input)?;
        let degrees_per_px = projector.inverse_scale();
        info!(
            etl_name = ETL_NAME,
            lon_per_px = degrees_per_px.x,
            lat_per_px = degrees_per_px.y;
            "Framed map"
        );
        let mut missed = MissedTags::default();
        let mut collector = PrimitiveCollector::new(&projector, self.scheme, self.collect_options())?;
        collector.collect(&input, &mut missed);
        let drawing = collector.finish();
        info!(
            etl_name = ETL_NAME,
            width = drawing.width,
            height = drawing.height,
            missed_tags = missed.len();
            "Built drawing"
        );
        Ok((drawing, missed))
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let (drawing, missed) = output;
        write_cache(&Self::output_path(dir), &drawing)?;
        missed.flush(&dir.join(MISSED_TAGS_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::{Node, Tags};
    use crate::GeoBox;

    fn config(bounding_box: Option<GeoBox>) -> UserConfig {
        let mut config: UserConfig = serde_json::from_str(r#"{"data_path": "map.osm", "width_px": 1000, "height_px": 500}"#).unwrap();
        config.bounding_box = bounding_box;
        config
    }

    fn data() -> OsmMapData {
        OsmMapData {
            nodes: vec![
                Node { id: 1, position: GeoPoint::new(10.0, 20.0), tags: Tags::new() },
                Node { id: 2, position: GeoPoint::new(11.0, 22.0), tags: Tags::new() },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn node_bounds_are_inset_by_the_margin() {
        let projector = frame(&config(None), &data()).unwrap();
        assert_eq!(projector.project(GeoPoint::new(11.0, 20.0)), DrawingPoint::new(25.0, 25.0));
        assert_eq!(projector.project(GeoPoint::new(10.0, 22.0)), DrawingPoint::new(975.0, 475.0));
    }

    #[test]
    fn explicit_bounding_box_fills_the_canvas() {
        let bbox = GeoBox { min_lat: 0.0, min_lon: 0.0, max_lat: 50.0, max_lon: 100.0 };
        let projector = frame(&config(Some(bbox)), &OsmMapData::default()).unwrap();
        assert_eq!(projector.project(GeoPoint::new(50.0, 0.0)), DrawingPoint::new(0.0, 0.0));
        assert_eq!(projector.project(GeoPoint::new(0.0, 100.0)), DrawingPoint::new(1000.0, 500.0));
    }

    #[test]
    fn empty_data_needs_a_bounding_box() {
        assert!(frame(&config(None), &OsmMapData::default()).is_err());
    }
}

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::info;

use crate::data::drawing::Drawing;
use crate::emit::raster::RasterEmitter;
use crate::emit::svg::SvgEmitter;
use crate::emit::{render, Emitter, RenderOptions};
use crate::errors::Result;
use crate::glyph::IconSet;
use crate::style::scheme::Scheme;
use crate::{OutputFormat, UserConfig};

use super::build_drawing::BuildDrawingEtl;
use super::{remove_output, Etl};

pub const ETL_NAME: &str = "draw_map";

pub fn output_file_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Svg => "map.svg",
        OutputFormat::Png => "map.png",
    }
}

pub struct DrawMapEtl<'a> {
    config: &'a UserConfig,
    scheme: &'a Scheme,
    icons: &'a IconSet,
}

impl DrawMapEtl<'_> {
    pub fn new<'a>(config: &'a UserConfig, scheme: &'a Scheme, icons: &'a IconSet) -> DrawMapEtl<'a> {
        DrawMapEtl { config, scheme, icons }
    }

    fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(output_file_name(self.config.output_format))
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions { overlap: self.config.overlap, show_missed_tags: self.config.show_missed_tags }
    }

    fn emitter(&self, dir: &Path) -> Result<Box<dyn Emitter>> {
        let output_path = self.output_path(dir);
        let emitter: Box<dyn Emitter> = match self.config.output_format {
            OutputFormat::Svg => Box::new(SvgEmitter::new(BufWriter::new(File::create(&output_path)?))),
            OutputFormat::Png => {
                let font_path = self.config.font_path.as_deref().map(Path::new);
                Box::new(RasterEmitter::new(&output_path, font_path)?)
            },
        };
        Ok(emitter)
    }
}

impl Etl for DrawMapEtl<'_> {
    type Input = Drawing;
    type Output = Drawing;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(self.output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_output(&dir.join(output_file_name(OutputFormat::Svg)))?;
        remove_output(&dir.join(output_file_name(OutputFormat::Png)))
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        BuildDrawingEtl::read_output(dir)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        info!(
            etl_name = ETL_NAME,
            paths = input.paths.len(),
            points = input.points.len();
            "Drawing map"
        );
        Ok(input)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let mut emitter = self.emitter(dir)?;
        render(&output, self.scheme.background, self.icons, self.render_options(), emitter.as_mut())
    }
}

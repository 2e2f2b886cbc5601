pub mod build_drawing;
pub mod draw_map;
pub mod parse_osm;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use log::{error, info};
use rkyv::de::deserializers::SharedDeserializeMap;
use rkyv::ser::serializers::AllocSerializer;

use crate::errors::Result;


pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn is_cached(&self, dir: &Path) -> Result<bool>;
    fn clean(&self, dir: &Path) -> Result<()>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn process(&mut self, dir: &Path) -> Result<()> {
        info!(etl_name = self.etl_name(); "Starting ETL process");
        if self.is_cached(dir)? {
            info!(etl_name = self.etl_name(); "Using cached value");
        } else {
            info!(etl_name = self.etl_name(); "Extracting");
            let input = match self.extract(dir) {
                Ok(input) => Ok(input),
                Err(err) => {
                    error!(etl_name = self.etl_name(), err = err.message; "Extraction failed with error");
                    Err(err)
                },
            }?;

            info!(etl_name = self.etl_name(); "Transforming");
            let output = match self.transform(input) {
                Ok(output) => Ok(output),
                Err(err) => {
                    error!(etl_name = self.etl_name(), err = err.message; "Transformation failed with error");
                    Err(err)
                },
            }?;

            info!(etl_name = self.etl_name(); "Loading");
            match self.load(dir, output) {
                Ok(_) => Ok(()),
                Err(err) => {
                    error!(etl_name = self.etl_name(), err = err.message; "Loading failed with error");
                    Err(err)
                },
            }?;
        }
        info!(etl_name = self.etl_name(); "Process finished");
        Ok(())
    }
}

/// Removes a stage output if it exists.
pub fn remove_output(path: &Path) -> Result<()> {
    if path.try_exists()? {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub fn write_cache<T>(path: &Path, value: &T) -> Result<()>
where
    T: rkyv::Serialize<AllocSerializer<256>>,
{
    let bytes = rkyv::to_bytes::<_, 256>(value)
        .map_err(|err| format!("Could not serialize {}: {:?}", path.display(), err))?;
    let mut output_file = File::create(path)?;
    output_file.write_all(&bytes)?;
    Ok(())
}

pub fn read_cache<T>(path: &Path) -> Result<T>
where
    T: rkyv::Archive,
    T::Archived: rkyv::Deserialize<T, SharedDeserializeMap>,
{
    let bytes = fs::read(path)?;
    let mut aligned = rkyv::AlignedVec::with_capacity(bytes.len());
    aligned.extend_from_slice(&bytes);
    // SAFETY: cache files are only ever produced by `write_cache` for the
    // same type within the same output directory.
    let value = unsafe { rkyv::from_bytes_unchecked::<T>(&aligned) }
        .map_err(|err| format!("Could not deserialize {}: {:?}", path.display(), err))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::{GeoPoint, Node, Tags};
    use crate::data::OsmMapData;

    #[test]
    fn cache_survives_a_round_trip_through_disk() {
        let dir = std::env::temp_dir().join(format!("osm_vector_map_cache_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("osm_elements.rkyv");

        let tags: Tags = [("amenity".to_string(), "bench".to_string())].into_iter().collect();
        let data = OsmMapData {
            nodes: vec![Node { id: 7, position: GeoPoint::new(51.5, -0.12), tags }],
            ..Default::default()
        };
        write_cache(&path, &data).unwrap();
        let read: OsmMapData = read_cache(&path).unwrap();
        assert_eq!(read.nodes, data.nodes);

        remove_output(&path).unwrap();
        assert!(!path.exists());
        remove_output(&path).unwrap();
        fs::remove_dir_all(&dir).unwrap();
    }
}

use std::collections::HashMap;

use crate::projection::BoundingBox;

use self::osm::{GeoPoint, Node, OsmId, Relation, Way};

pub mod drawing;
pub mod osm;

/// Map data as defined in the .osm file, kept in file order. Elements the
/// renderer never looks at (changesets, metadata attributes) are discarded.

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
pub struct OsmMapData {
    pub nodes: Vec<Node>,
    pub ways: Vec<Way>,
    pub relations: Vec<Relation>,
}

/// Id lookups over a loaded `OsmMapData`.
pub struct MapIndex<'a> {
    pub nodes: HashMap<OsmId, &'a Node>,
    pub ways: HashMap<OsmId, &'a Way>,
}

impl MapIndex<'_> {
    pub fn node_position(&self, id: OsmId) -> Option<GeoPoint> {
        self.nodes.get(&id).map(|node| node.position)
    }
}

impl OsmMapData {
    pub fn index(&self) -> MapIndex<'_> {
        MapIndex {
            nodes: self.nodes.iter().map(|node| (node.id, node)).collect(),
            ways: self.ways.iter().map(|way| (way.id, way)).collect(),
        }
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        let first = self.nodes.first()?.position;
        let mut min = first;
        let mut max = first;
        for node in &self.nodes[1..] {
            min.lat = min.lat.min(node.position.lat);
            min.lon = min.lon.min(node.position.lon);
            max.lat = max.lat.max(node.position.lat);
            max.lon = max.lon.max(node.position.lon);
        }
        Some(BoundingBox { min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::Tags;

    fn node(id: OsmId, lat: f64, lon: f64) -> Node {
        Node { id, position: GeoPoint::new(lat, lon), tags: Tags::new() }
    }

    #[test]
    fn bounds_cover_all_nodes() {
        let data = OsmMapData {
            nodes: vec![node(1, 51.5, -0.1), node(2, 51.4, 0.2), node(3, 51.6, 0.0)],
            ..Default::default()
        };
        let bounds = data.bounds().unwrap();
        assert_eq!(bounds.min, GeoPoint::new(51.4, -0.1));
        assert_eq!(bounds.max, GeoPoint::new(51.6, 0.2));
    }

    #[test]
    fn bounds_of_empty_data_is_none() {
        assert!(OsmMapData::default().bounds().is_none());
    }

    #[test]
    fn index_finds_nodes_and_ways() {
        let data = OsmMapData {
            nodes: vec![node(7, 1.0, 2.0)],
            ways: vec![Way { id: 9, node_refs: vec![7], tags: Tags::new() }],
            ..Default::default()
        };
        let index = data.index();
        assert_eq!(index.node_position(7), Some(GeoPoint::new(1.0, 2.0)));
        assert!(index.node_position(8).is_none());
        assert_eq!(index.ways[&9].node_refs, vec![7]);
    }
}

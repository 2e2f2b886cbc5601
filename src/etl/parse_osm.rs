use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{GeoPoint, Member, MemberType, Node, Relation, Tags, Way};
use crate::data::OsmMapData;
use crate::errors::Result;

use super::{read_cache, remove_output, write_cache, Etl};

pub const ETL_NAME: &str = "parse_osm";
pub const OUTPUT_FILE_NAME: &str = "osm_elements.rkyv";

/// Attributes of one element, unescaped.
struct Attributes(Vec<(Vec<u8>, String)>);

impl Attributes {
    fn read(el: &BytesStart) -> Result<Attributes> {
        let mut attributes = Vec::new();
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            attributes.push((attribute.key.as_ref().to_vec(), attribute.unescape_value()?.into_owned()));
        }
        Ok(Attributes(attributes))
    }

    fn get(&self, key: &[u8]) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn parse<T: FromStr>(&self, key: &[u8]) -> Option<T> {
        self.get(key)?.trim().parse().ok()
    }
}

/// Element currently being read, waiting for its children.
enum OpenElement {
    None,
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl OpenElement {
    fn tags_mut(&mut self) -> Option<&mut Tags> {
        match self {
            OpenElement::None => None,
            OpenElement::Node(node) => Some(&mut node.tags),
            OpenElement::Way(way) => Some(&mut way.tags),
            OpenElement::Relation(relation) => Some(&mut relation.tags),
        }
    }
}

fn parse_node(attributes: &Attributes) -> Option<Node> {
    let parsed = (attributes.parse(b"id"), attributes.parse(b"lat"), attributes.parse(b"lon"));
    match parsed {
        (Some(id), Some(lat), Some(lon)) => Some(Node { id, position: GeoPoint::new(lat, lon), tags: Tags::new() }),
        _ => {
            warn!(id = attributes.get(b"id").unwrap_or("?"); "Skipping node without id, lat and lon");
            None
        },
    }
}

fn parse_way(attributes: &Attributes) -> Option<Way> {
    match attributes.parse(b"id") {
        Some(id) => Some(Way { id, node_refs: Vec::new(), tags: Tags::new() }),
        None => {
            warn!("Skipping way without id");
            None
        },
    }
}

fn parse_relation(attributes: &Attributes) -> Option<Relation> {
    match attributes.parse(b"id") {
        Some(id) => Some(Relation { id, members: Vec::new(), tags: Tags::new() }),
        None => {
            warn!("Skipping relation without id");
            None
        },
    }
}

fn parse_member(attributes: &Attributes) -> Option<Member> {
    let member_type = match attributes.get(b"type")? {
        "node" => MemberType::Node,
        "way" => MemberType::Way,
        "relation" => MemberType::Relation,
        other => {
            warn!(member_type = other; "Skipping member of unknown type");
            return None;
        },
    };
    Some(Member {
        member_type,
        member_ref: attributes.parse(b"ref")?,
        role: attributes.get(b"role").unwrap_or("").into(),
    })
}

/// Reads every node, way and relation of an OSM XML document, in file order.
pub fn parse_osm<R: BufRead>(mut reader: Reader<R>) -> Result<OsmMapData> {
    let mut data = OsmMapData::default();
    let mut open = OpenElement::None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let (el, is_empty) = match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(el) => (el, false),
            Event::Empty(el) => (el, true),
            Event::End(el) => {
                match (el.name().as_ref(), std::mem::replace(&mut open, OpenElement::None)) {
                    (b"node", OpenElement::Node(node)) => data.nodes.push(node),
                    (b"way", OpenElement::Way(way)) => data.ways.push(way),
                    (b"relation", OpenElement::Relation(relation)) => data.relations.push(relation),
                    (_, still_open) => open = still_open,
                }
                continue;
            },
            // Declarations, comments and free text carry nothing we draw.
            _ => continue,
        };

        let attributes = Attributes::read(&el)?;
        match el.name().as_ref() {
            b"node" => {
                if let Some(node) = parse_node(&attributes) {
                    if is_empty { data.nodes.push(node) } else { open = OpenElement::Node(node) }
                }
            },
            b"way" => {
                if let Some(way) = parse_way(&attributes) {
                    if is_empty { data.ways.push(way) } else { open = OpenElement::Way(way) }
                }
            },
            b"relation" => {
                if let Some(relation) = parse_relation(&attributes) {
                    if is_empty { data.relations.push(relation) } else { open = OpenElement::Relation(relation) }
                }
            },
            b"tag" => {
                if let (Some(tags), Some(k), Some(v)) = (open.tags_mut(), attributes.get(b"k"), attributes.get(b"v")) {
                    tags.insert(k.to_string(), v.to_string());
                }
            },
            b"nd" => {
                if let (OpenElement::Way(way), Some(node_ref)) = (&mut open, attributes.parse(b"ref")) {
                    way.node_refs.push(node_ref);
                }
            },
            b"member" => {
                if let OpenElement::Relation(relation) = &mut open {
                    if let Some(member) = parse_member(&attributes) {
                        relation.members.push(member);
                    }
                }
            },
            _ => (),
        }
    }
    Ok(data)
}

pub struct ParseOsmEtl {
    data_path: PathBuf,
}

impl ParseOsmEtl {
    pub fn new(data_path: &Path) -> ParseOsmEtl {
        ParseOsmEtl { data_path: data_path.to_path_buf() }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    fn create_osm_reader(&self) -> Result<Reader<Box<dyn BufRead>>> {
        let file_reader = BufReader::new(fs::File::open(&self.data_path)?);
        let is_xz = self.data_path.extension().map_or(false, |extension| extension == "xz");
        let inner: Box<dyn BufRead> = if is_xz {
            Box::new(BufReader::new(XzDecoder::new(file_reader)))
        } else {
            Box::new(file_reader)
        };
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        Ok(reader)
    }

    /// Loads the cached output of this stage from `dir`.
    pub fn read_output(dir: &Path) -> Result<OsmMapData> {
        read_cache(&Self::output_path(dir))
    }
}

impl Etl for ParseOsmEtl {
    type Input = Reader<Box<dyn BufRead>>;
    type Output = OsmMapData;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_output(&Self::output_path(dir))
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        let data_path_str = self.data_path.to_string_lossy();
        info!(etl_name = ETL_NAME, path = &*data_path_str; "Opening OSM file");
        self.create_osm_reader()
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let data = parse_osm(input)?;
        info!(
            etl_name = ETL_NAME,
            nodes = data.nodes.len(),
            ways = data.ways.len(),
            relations = data.relations.len();
            "Parsed OSM elements"
        );
        Ok(data)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        write_cache(&Self::output_path(dir), &output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::MemberRole;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <bounds minlat="51.5" minlon="-0.1" maxlat="51.6" maxlon="0.0"/>
  <node id="1" lat="51.51" lon="-0.09" version="3" user="someone"/>
  <node id="2" lat="51.52" lon="-0.08">
    <tag k="amenity" v="cafe"/>
    <tag k="name" v="Fish &amp; Chips"/>
  </node>
  <node id="3" lat="oops" lon="-0.07"/>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <nd ref="1"/>
    <tag k="building" v="yes"/>
  </way>
  <relation id="20">
    <member type="way" ref="10" role="outer"/>
    <member type="way" ref="11" role=""/>
    <member type="node" ref="2" role="label"/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>"#;

    fn parse(xml: &str) -> OsmMapData {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        parse_osm(reader).unwrap()
    }

    #[test]
    fn reads_nodes_ways_and_relations_in_file_order() {
        let data = parse(SAMPLE);

        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.nodes[0].id, 1);
        assert_eq!(data.nodes[0].position, GeoPoint::new(51.51, -0.09));
        assert!(data.nodes[0].tags.is_empty());
        assert_eq!(data.nodes[1].tags.get("name").map(String::as_str), Some("Fish & Chips"));

        assert_eq!(data.ways.len(), 1);
        assert_eq!(data.ways[0].node_refs, vec![1, 2, 1]);
        assert!(data.ways[0].is_closed());
        assert_eq!(data.ways[0].tags.get("building").map(String::as_str), Some("yes"));

        assert_eq!(data.relations.len(), 1);
        let relation = &data.relations[0];
        assert!(relation.is_multipolygon());
        assert_eq!(relation.members.len(), 3);
        assert_eq!(relation.members[1].role, MemberRole::Outer);
        assert_eq!(relation.members[2].member_type, MemberType::Node);
        assert_eq!(relation.members[2].role, MemberRole::Other("label".to_string()));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let mut reader = Reader::from_str("<osm><node id=\"1\" lat=\"1\" lon=\"1\"></way></osm>");
        reader.trim_text(true);
        assert!(parse_osm(reader).is_err());
    }
}

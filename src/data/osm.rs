use std::collections::BTreeMap;

pub type OsmId = u64;

/// Tags are kept sorted by key so every pass over them is deterministic.
pub type Tags = BTreeMap<String, String>;

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub position: GeoPoint,
    pub tags: Tags,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Way {
    pub id: OsmId,
    pub node_refs: Vec<OsmId>,
    pub tags: Tags,
}

impl Way {
    pub fn is_closed(&self) -> bool {
        match (self.node_refs.first(), self.node_refs.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
pub enum MemberRole {
    Outer,
    Inner,
    Other(String),
}

impl From<&str> for MemberRole {
    fn from(value: &str) -> Self {
        match value {
            // Untagged members of a multipolygon are outer boundaries in practice.
            "outer" | "" => MemberRole::Outer,
            "inner" => MemberRole::Inner,
            other => MemberRole::Other(other.to_string()),
        }
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Member {
    pub member_type: MemberType,
    pub member_ref: OsmId,
    pub role: MemberRole,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: OsmId,
    pub members: Vec<Member>,
    pub tags: Tags,
}

impl Relation {
    pub fn is_multipolygon(&self) -> bool {
        self.tags.get("type").map_or(false, |value| value == "multipolygon")
    }
}

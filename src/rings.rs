//! Multipolygon ring assembly.
//!
//! Relation members arrive as unordered way fragments. Fragments of the same
//! role are stitched end to end into rings, then combined so that outer rings
//! come first and inner rings follow in reversed point order, which makes
//! holes render under both the non-zero and the even-odd fill rule.

use std::collections::HashMap;

use log::{debug, warn};

use crate::data::osm::{MemberRole, MemberType, OsmId, Relation};
use crate::data::MapIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingRole {
    Outer,
    Inner,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub role: RingRole,
    pub node_refs: Vec<OsmId>,
}

impl Ring {
    pub fn is_closed(&self) -> bool {
        self.node_refs.len() > 1 && self.node_refs.first() == self.node_refs.last()
    }
}

fn is_closed(nodes: &[OsmId]) -> bool {
    nodes.len() > 1 && nodes.first() == nodes.last()
}

/// Stitches fragments into rings. Fragments that are already closed become
/// rings on their own; the others are joined greedily through shared end
/// nodes. A chain that cannot be closed is returned open.
pub fn assemble(fragments: &[&[OsmId]], role: RingRole) -> Vec<Ring> {
    let mut by_end: HashMap<OsmId, Vec<usize>> = HashMap::new();
    for (idx, fragment) in fragments.iter().enumerate() {
        if fragment.len() < 2 || is_closed(fragment) {
            continue;
        }
        by_end.entry(fragment[0]).or_default().push(idx);
        by_end.entry(fragment[fragment.len() - 1]).or_default().push(idx);
    }

    let mut consumed = vec![false; fragments.len()];
    let mut rings = Vec::new();

    for start in 0..fragments.len() {
        if consumed[start] {
            continue;
        }
        consumed[start] = true;
        let fragment = fragments[start];
        if fragment.len() < 2 {
            continue;
        }

        let mut chain: Vec<OsmId> = fragment.to_vec();
        while !is_closed(&chain) {
            let head = chain[0];
            let tail = chain[chain.len() - 1];
            let candidate = [tail, head].iter()
                .filter_map(|end| by_end.get(end))
                .flatten()
                .copied()
                .find(|idx| !consumed[*idx]);
            let Some(next) = candidate else {
                break;
            };
            consumed[next] = true;
            chain = splice(&chain, fragments[next]);
        }
        rings.push(Ring { role, node_refs: chain });
    }
    rings
}

/// Joins `fragment` onto whichever end of `chain` it shares, reversing it when
/// needed to keep the direction of travel.
fn splice(chain: &[OsmId], fragment: &[OsmId]) -> Vec<OsmId> {
    let head = chain[0];
    let tail = chain[chain.len() - 1];
    let first = fragment[0];
    let last = fragment[fragment.len() - 1];
    let mut joined = Vec::with_capacity(chain.len() + fragment.len() - 1);

    if first == tail {
        joined.extend_from_slice(chain);
        joined.extend_from_slice(&fragment[1..]);
    } else if last == tail {
        joined.extend_from_slice(chain);
        joined.extend(fragment[..fragment.len() - 1].iter().rev());
    } else if last == head {
        joined.extend_from_slice(&fragment[..fragment.len() - 1]);
        joined.extend_from_slice(chain);
    } else {
        joined.extend(fragment[1..].iter().rev());
        joined.extend_from_slice(chain);
    }
    joined
}

/// Rings of a multipolygon relation in drawing order: outers as assembled,
/// then inners with their point order reversed.
pub fn multipolygon_rings(relation: &Relation, index: &MapIndex) -> Vec<Ring> {
    let mut outers: Vec<&[OsmId]> = Vec::new();
    let mut inners: Vec<&[OsmId]> = Vec::new();

    for member in &relation.members {
        if member.member_type != MemberType::Way {
            continue;
        }
        let Some(way) = index.ways.get(&member.member_ref) else {
            debug!(relation_id = relation.id, way_id = member.member_ref; "Skipping missing multipolygon member");
            continue;
        };
        match member.role {
            MemberRole::Outer => outers.push(&way.node_refs),
            MemberRole::Inner => inners.push(&way.node_refs),
            MemberRole::Other(_) => (),
        }
    }

    let mut rings = assemble(&outers, RingRole::Outer);
    for mut ring in assemble(&inners, RingRole::Inner) {
        ring.node_refs.reverse();
        rings.push(ring);
    }

    for ring in rings.iter().filter(|ring| !ring.is_closed()) {
        let role = match ring.role {
            RingRole::Outer => "outer",
            RingRole::Inner => "inner",
        };
        warn!(relation_id = relation.id, role = role, nodes = ring.node_refs.len(); "Multipolygon ring is not closed");
    }
    rings
}

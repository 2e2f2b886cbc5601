use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::data::osm::Tags;
use crate::errors::Result;

/// Keys that carry information but are deliberately not drawn as style.
const TAGS_TO_WRITE: &[&str] = &[
    "operator", "opening_hours", "cuisine", "network", "website", "website_2",
    "STIF:zone", "opening_hours:url", "phone", "branch", "route_ref", "brand",
    "ref", "wikipedia", "description", "level", "wikidata", "name", "alt_name",
    "image", "fax", "old_name", "artist_name", "int_name", "official_name",
    "full_name", "email", "designation", "min_height", "height", "inscription",
    "start_date", "created_by", "naptan:verified", "url", "naptan:AtcoCode",
    "naptan:Landmark", "naptan:Indicator", "collection_times", "naptan:Street",
    "naptan:PlusbusZoneRef", "naptan:Crossing", "local_ref", "naptan:CommonName",
    "survey:date", "naptan:NaptanCode", "postal_code", "uk_postcode_centroid",
    "fhrs:rating_date", "fhrs:local_authority_id", "destination", "fhrs:id",
    "naptan:ShortCommonName", "flickr", "royal_cypher", "is_in", "booth",
    "naptan:AltStreet", "media:commons", "ref_no", "uri", "fhrs:inspectiondate",
    "telephone", "naptan:AltCommonName", "end_date", "facebook", "naptan:Notes",
    "voltage", "last_collection", "twitter", "ele", "information", "phone_1",
    "cyclestreets_id", "cladr:code", "naptan:Bearing", "species", "taxon",
    "seats", "capacity", "fhrs:rating", "fhrs:confidence_management",
    "fhrs:hygiene", "genus", "platforms", "naptan:BusStopType",
];

const PREFIXES_TO_WRITE: &[&str] = &[
    "addr", "contact", "name", "operator", "wikipedia", "alt_name", "description",
    "old_name", "inscription", "route_ref", "is_in", "website", "ref", "species",
    "taxon", "genus",
];

const TAGS_TO_SKIP: &[&str] = &[
    "note", "layer", "source", "building:part", "fixme", "comment", "FIXME",
    "source_ref", "naptan:verified:note", "building:levels",
];

const PREFIXES_TO_SKIP: &[&str] = &["source"];

fn has_prefix(key: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| {
        key.strip_prefix(prefix).map_or(false, |rest| rest.starts_with(':'))
    })
}

/// Keys that are known to carry no drawable meaning, either because they are
/// metadata or because they are informational text.
pub fn is_known_not_drawn(key: &str) -> bool {
    TAGS_TO_WRITE.contains(&key)
        || TAGS_TO_SKIP.contains(&key)
        || has_prefix(key, PREFIXES_TO_WRITE)
        || has_prefix(key, PREFIXES_TO_SKIP)
}

/// Tags of `tags` that were neither used for styling nor known to be skipped.
pub fn unmatched<'a>(tags: &'a Tags, matched_keys: &'a [String]) -> impl Iterator<Item = (&'a String, &'a String)> + 'a {
    tags.iter().filter(move |(key, _)| {
        !is_known_not_drawn(key) && !matched_keys.iter().any(|matched| matched == *key)
    })
}

#[derive(Serialize, Debug, PartialEq)]
pub struct MissedTag {
    pub tag: String,
    pub count: usize,
}

/// Frequency table of `key: value` pairs the resolver could not use.
#[derive(Debug, Default)]
pub struct MissedTags {
    counts: HashMap<String, usize>,
}

impl MissedTags {
    pub fn record(&mut self, tags: &Tags, matched_keys: &[String]) {
        for (key, value) in unmatched(tags, matched_keys) {
            *self.counts.entry(format!("{}: {}", key, value)).or_insert(0) += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Entries by descending count, ties by tag text.
    pub fn entries(&self) -> Vec<MissedTag> {
        let mut entries: Vec<MissedTag> = self.counts.iter()
            .map(|(tag, count)| MissedTag { tag: tag.clone(), count: *count })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        entries
    }

    pub fn flush(&self, path: &Path) -> Result<()> {
        info!(distinct_tags = self.len(); "Writing missed tags");
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.entries())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn known_keys_and_prefixes() {
        assert!(is_known_not_drawn("name"));
        assert!(is_known_not_drawn("addr:street"));
        assert!(is_known_not_drawn("source:geometry"));
        assert!(is_known_not_drawn("layer"));
        assert!(!is_known_not_drawn("addrx"));
        assert!(!is_known_not_drawn("shop"));
    }

    #[test]
    fn records_only_unmatched_tags() {
        let mut missed = MissedTags::default();
        let matched = vec!["building".to_string()];
        missed.record(&tags(&[("building", "yes"), ("name", "Town hall"), ("roof:shape", "flat")]), &matched);
        missed.record(&tags(&[("building", "yes"), ("roof:shape", "flat")]), &matched);
        missed.record(&tags(&[("shop", "bakery")]), &[]);
        assert_eq!(
            missed.entries(),
            vec![
                MissedTag { tag: "roof:shape: flat".to_string(), count: 2 },
                MissedTag { tag: "shop: bakery".to_string(), count: 1 },
            ]
        );
    }
}

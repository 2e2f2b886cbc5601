//! Turns loaded map data into a sorted `Drawing`.

use log::{debug, info};

use crate::data::drawing::{Drawing, PathCommand, PathPrimitive, PointPrimitive};
use crate::data::osm::{Node, OsmId, Relation, Tags, Way};
use crate::data::{MapIndex, OsmMapData};
use crate::errors::Result;
use crate::projection::{DrawingPoint, Projector};
use crate::rings::multipolygon_rings;
use crate::style::missed_tags::{is_known_not_drawn, MissedTags};
use crate::style::resolver::{Resolution, StyleResolver};
use crate::style::scheme::Scheme;

#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    pub draw_ways: bool,
    pub draw_nodes: bool,
    pub raw_geometry: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        CollectOptions { draw_ways: true, draw_nodes: true, raw_geometry: false }
    }
}

pub struct PrimitiveCollector<'a> {
    projector: &'a Projector,
    resolver: StyleResolver<'a>,
    options: CollectOptions,
    drawing: Drawing,
}

/// Midpoint of the bounding box of `points`.
pub fn box_center(points: &[DrawingPoint]) -> Option<DrawingPoint> {
    let first = points.first()?;
    let (mut min, mut max) = (*first, *first);
    for point in &points[1..] {
        min.x = min.x.min(point.x);
        min.y = min.y.min(point.y);
        max.x = max.x.max(point.x);
        max.y = max.y.max(point.y);
    }
    Some(DrawingPoint::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0))
}

fn polyline(points: &[DrawingPoint], closed: bool) -> Vec<PathCommand> {
    let mut commands = Vec::with_capacity(points.len() + 1);
    let body = if closed { &points[..points.len() - 1] } else { points };
    for (idx, point) in body.iter().enumerate() {
        commands.push(if idx == 0 { PathCommand::MoveTo(*point) } else { PathCommand::LineTo(*point) });
    }
    if closed {
        commands.push(PathCommand::Close);
    }
    commands
}

impl<'a> PrimitiveCollector<'a> {
    pub fn new(projector: &'a Projector, scheme: &'a Scheme, options: CollectOptions) -> Result<Self> {
        let rect = projector.rect();
        let canvas_width = rect.size.x + 2.0 * rect.origin.x;
        let canvas_height = rect.size.y + 2.0 * rect.origin.y;
        Ok(PrimitiveCollector {
            projector,
            resolver: StyleResolver::new(scheme)?,
            options,
            drawing: Drawing {
                width: canvas_width.round() as u32,
                height: canvas_height.round() as u32,
                frame_origin: rect.origin,
                vertical_padding: projector.needs_vertical_padding(),
                ..Default::default()
            },
        })
    }

    /// Collects every entity of `data`: ways, then multipolygon relations,
    /// then nodes from north to south.
    pub fn collect(&mut self, data: &OsmMapData, missed: &mut MissedTags) {
        let index = data.index();

        if self.options.raw_geometry {
            for way in &data.ways {
                let points = self.project_refs(&way.node_refs, &index);
                if points.len() > 1 {
                    self.drawing.raw_ways.push(polyline(&points, false));
                }
            }
            self.drawing.raw_nodes = data.nodes.iter().map(|node| self.projector.project(node.position)).collect();
        }

        if self.options.draw_ways {
            for way in &data.ways {
                self.add_way(way, &index, missed);
            }
            for relation in data.relations.iter().filter(|relation| relation.is_multipolygon()) {
                self.add_multipolygon(relation, &index, missed);
            }
        }

        if self.options.draw_nodes {
            let mut nodes: Vec<&Node> = data.nodes.iter().collect();
            nodes.sort_by(|a, b| b.position.lat.total_cmp(&a.position.lat));
            let (mut processed, mut skipped) = (0usize, 0usize);
            for node in nodes {
                let (node_processed, node_skipped) = self.add_node(node, missed);
                processed += node_processed;
                skipped += node_skipped;
            }
            info!(tags_processed = processed, tags_skipped = skipped; "Collected node icons");
        }

        info!(
            paths = self.drawing.paths.len(),
            points = self.drawing.points.len();
            "Collected primitives"
        );
    }

    fn project_refs(&self, node_refs: &[OsmId], index: &MapIndex) -> Vec<DrawingPoint> {
        node_refs.iter()
            .filter_map(|id| match index.node_position(*id) {
                Some(position) => Some(self.projector.project(position)),
                None => {
                    debug!(node_id = *id; "Skipping missing node reference");
                    None
                },
            })
            .collect()
    }

    pub fn add_way(&mut self, way: &Way, index: &MapIndex, missed: &mut MissedTags) {
        let Some(resolution) = self.resolver.resolve(&way.tags, missed) else {
            return;
        };
        let points = self.project_refs(&way.node_refs, index);
        if points.len() < 2 {
            debug!(way_id = way.id, nodes = points.len(); "Skipping way without drawable geometry");
            return;
        }
        let closed = way.is_closed() && points.first() == points.last();
        let commands = polyline(&points, closed);
        self.push_resolution(resolution, commands, box_center(&points), &way.tags);
    }

    pub fn add_multipolygon(&mut self, relation: &Relation, index: &MapIndex, missed: &mut MissedTags) {
        let Some(resolution) = self.resolver.resolve_multipolygon(&relation.tags, missed) else {
            return;
        };
        let mut commands = Vec::new();
        let mut outline = Vec::new();
        for ring in multipolygon_rings(relation, index) {
            let points = self.project_refs(&ring.node_refs, index);
            if points.len() < 2 {
                continue;
            }
            let closed = ring.is_closed() && points.first() == points.last();
            commands.extend(polyline(&points, closed));
            outline.extend(points);
        }
        if commands.is_empty() {
            debug!(relation_id = relation.id; "Skipping multipolygon without drawable rings");
            return;
        }
        self.push_resolution(resolution, commands, box_center(&outline), &relation.tags);
    }

    fn push_resolution(&mut self, resolution: Resolution, commands: Vec<PathCommand>, center: Option<DrawingPoint>, tags: &Tags) {
        let Resolution { styles, icons, icon_color, matched_keys, .. } = resolution;
        // Points share one sort key so collection order alone decides placement.
        if let Some(center) = center.filter(|_| !icons.is_empty()) {
            self.drawing.points.push(PointPrimitive {
                position: center,
                icons,
                color: icon_color,
                tags: tags.clone(),
                matched_tag_keys: matched_keys,
                layer: 0.0,
                priority: 0,
            });
        }
        for style in styles {
            self.drawing.paths.push(PathPrimitive { commands: commands.clone(), style });
        }
    }

    /// Adds a node's point primitive. Returns how many of its tags were
    /// accounted for and how many were left unmatched.
    pub fn add_node(&mut self, node: &Node, missed: &mut MissedTags) -> (usize, usize) {
        let resolution = self.resolver.resolve_icons(&node.tags, missed);
        let processed = node.tags.keys()
            .filter(|key| is_known_not_drawn(key) || resolution.matched_keys.iter().any(|matched| matched == *key))
            .count();
        let skipped = node.tags.len() - processed;

        self.drawing.points.push(PointPrimitive {
            position: self.projector.project(node.position),
            icons: resolution.icons,
            color: resolution.color,
            tags: node.tags.clone(),
            matched_tag_keys: resolution.matched_keys,
            layer: 0.0,
            priority: 0,
        });
        (processed, skipped)
    }

    /// Sorts and hands over everything collected so far.
    pub fn finish(mut self) -> Drawing {
        self.drawing.sort();
        self.drawing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::{GeoPoint, Member, MemberType};
    use crate::placement::place;
    use crate::projection::{BoundingBox, DrawingRect};
    use crate::style::color::Color;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn node(id: OsmId, lat: f64, lon: f64, node_tags: Tags) -> Node {
        Node { id, position: GeoPoint::new(lat, lon), tags: node_tags }
    }

    fn projector() -> Projector {
        Projector::new(
            BoundingBox { min: GeoPoint::new(0.0, 0.0), max: GeoPoint::new(10.0, 10.0) },
            DrawingRect { origin: DrawingPoint::new(0.0, 0.0), size: DrawingPoint::new(100.0, 100.0) },
        )
    }

    fn collect(data: &OsmMapData, options: CollectOptions) -> Drawing {
        let scheme = Scheme::builtin().unwrap();
        let projector = projector();
        let mut missed = MissedTags::default();
        let mut collector = PrimitiveCollector::new(&projector, &scheme, options).unwrap();
        collector.collect(data, &mut missed);
        collector.finish()
    }

    fn ways_only() -> CollectOptions {
        CollectOptions { draw_nodes: false, ..Default::default() }
    }

    fn square(first_id: OsmId, south: f64, west: f64, side: f64) -> Vec<Node> {
        vec![
            node(first_id, south, west, Tags::new()),
            node(first_id + 1, south, west + side, Tags::new()),
            node(first_id + 2, south + side, west + side, Tags::new()),
            node(first_id + 3, south + side, west, Tags::new()),
        ]
    }

    #[test]
    fn building_way_becomes_closed_path_and_centered_icon() {
        let data = OsmMapData {
            nodes: vec![
                node(10, 0.0, 0.0, Tags::new()),
                node(11, 0.0, 10.0, Tags::new()),
                node(12, 10.0, 10.0, Tags::new()),
            ],
            ways: vec![Way { id: 1, node_refs: vec![10, 11, 12, 10], tags: tags(&[("building", "yes")]) }],
            ..Default::default()
        };
        let drawing = collect(&data, ways_only());

        assert_eq!(drawing.paths.len(), 1);
        let path = &drawing.paths[0];
        assert_eq!(path.commands.last(), Some(&PathCommand::Close));
        assert_eq!(path.commands[0], PathCommand::MoveTo(DrawingPoint::new(0.0, 100.0)));
        assert!(path.style.layer > 0.05);
        assert_eq!(path.style.fill, Some(Color::from_hex("D4D4D4").unwrap()));

        assert_eq!(drawing.points.len(), 1);
        let point = &drawing.points[0];
        assert_eq!(point.position, DrawingPoint::new(50.0, 50.0));
        assert_eq!(point.icons, vec!["building".to_string()]);
    }

    #[test]
    fn unstyled_ways_and_missing_nodes_are_skipped() {
        let data = OsmMapData {
            nodes: vec![node(1, 1.0, 1.0, Tags::new()), node(2, 2.0, 2.0, Tags::new())],
            ways: vec![
                Way { id: 1, node_refs: vec![1, 2], tags: tags(&[("landuse", "residential")]) },
                Way { id: 2, node_refs: vec![1, 404], tags: tags(&[("highway", "primary")]) },
                Way { id: 3, node_refs: vec![1, 404, 2], tags: tags(&[("waterway", "stream")]) },
            ],
            ..Default::default()
        };
        let drawing = collect(&data, ways_only());
        assert_eq!(drawing.paths.len(), 1);
        assert_eq!(
            drawing.paths[0].commands,
            vec![PathCommand::MoveTo(DrawingPoint::new(10.0, 90.0)), PathCommand::LineTo(DrawingPoint::new(20.0, 80.0))]
        );
    }

    #[test]
    fn multipolygon_inner_ring_is_reversed_after_outer() {
        let mut nodes = square(1, 0.0, 0.0, 10.0);
        nodes.extend(square(11, 4.0, 4.0, 2.0));
        let data = OsmMapData {
            nodes,
            ways: vec![
                Way { id: 100, node_refs: vec![1, 2, 3], tags: Tags::new() },
                Way { id: 101, node_refs: vec![3, 4, 1], tags: Tags::new() },
                Way { id: 102, node_refs: vec![11, 12, 13, 14, 11], tags: Tags::new() },
            ],
            relations: vec![Relation {
                id: 500,
                members: vec![
                    Member { member_type: MemberType::Way, member_ref: 100, role: "outer".into() },
                    Member { member_type: MemberType::Way, member_ref: 102, role: "inner".into() },
                    Member { member_type: MemberType::Way, member_ref: 101, role: "outer".into() },
                ],
                tags: tags(&[("type", "multipolygon"), ("natural", "water")]),
            }],
        };
        let drawing = collect(&data, ways_only());
        assert_eq!(drawing.paths.len(), 1);
        let p = |x: f64, y: f64| DrawingPoint::new(x, y);
        assert_eq!(
            drawing.paths[0].commands,
            vec![
                PathCommand::MoveTo(p(0.0, 100.0)),
                PathCommand::LineTo(p(100.0, 100.0)),
                PathCommand::LineTo(p(100.0, 0.0)),
                PathCommand::LineTo(p(0.0, 0.0)),
                PathCommand::Close,
                PathCommand::MoveTo(p(40.0, 60.0)),
                PathCommand::LineTo(p(40.0, 40.0)),
                PathCommand::LineTo(p(60.0, 40.0)),
                PathCommand::LineTo(p(60.0, 60.0)),
                PathCommand::Close,
            ]
        );
    }

    #[test]
    fn highway_casing_sorts_under_fill() {
        let data = OsmMapData {
            nodes: vec![node(1, 1.0, 1.0, Tags::new()), node(2, 2.0, 2.0, Tags::new())],
            ways: vec![Way { id: 1, node_refs: vec![1, 2], tags: tags(&[("highway", "primary")]) }],
            ..Default::default()
        };
        let drawing = collect(&data, ways_only());
        assert_eq!(drawing.paths.len(), 2);
        assert!(drawing.paths[0].style.layer < drawing.paths[1].style.layer);
        let casing = drawing.paths[0].style.stroke.as_ref().unwrap();
        let fill = drawing.paths[1].style.stroke.as_ref().unwrap();
        assert!(casing.width > fill.width);
    }

    #[test]
    fn nodes_are_collected_north_to_south() {
        let data = OsmMapData {
            nodes: vec![
                node(1, 2.0, 1.0, tags(&[("amenity", "bench")])),
                node(2, 8.0, 1.0, Tags::new()),
                node(3, 2.0, 5.0, tags(&[("amenity", "cafe")])),
                node(4, 5.0, 1.0, Tags::new()),
            ],
            ..Default::default()
        };
        let drawing = collect(&data, CollectOptions::default());
        let ys: Vec<f64> = drawing.points.iter().map(|point| point.position.y).collect();
        assert_eq!(ys, vec![20.0, 50.0, 80.0, 80.0]);
        assert_eq!(drawing.points[2].icons, vec!["bench".to_string()]);
        assert_eq!(drawing.points[3].icons, vec!["cafe".to_string()]);
    }

    #[test]
    fn area_icons_are_placed_before_node_icons() {
        let mut nodes = square(1, 0.0, 0.0, 10.0);
        nodes.push(node(20, 5.0, 5.0, tags(&[("amenity", "bench")])));
        let data = OsmMapData {
            nodes,
            ways: vec![Way { id: 1, node_refs: vec![1, 2, 3, 4, 1], tags: tags(&[("building", "yes"), ("height", "30")]) }],
            ..Default::default()
        };
        let drawing = collect(&data, CollectOptions::default());
        let with_icons: Vec<&Vec<String>> = drawing.points.iter()
            .map(|point| &point.icons)
            .filter(|icons| !icons.is_empty())
            .collect();
        assert_eq!(with_icons, vec![&vec!["building".to_string()], &vec!["bench".to_string()]]);

        let placed: Vec<String> = place(&drawing.points, 14.0).into_iter().map(|icon| icon.icon).collect();
        assert_eq!(placed, vec!["building".to_string()]);
    }

    #[test]
    fn raw_geometry_is_only_collected_on_request() {
        let data = OsmMapData {
            nodes: vec![node(1, 1.0, 1.0, Tags::new()), node(2, 2.0, 2.0, Tags::new())],
            ways: vec![Way { id: 1, node_refs: vec![1, 2], tags: Tags::new() }],
            ..Default::default()
        };
        let plain = collect(&data, CollectOptions::default());
        assert!(plain.raw_ways.is_empty() && plain.raw_nodes.is_empty());

        let raw = collect(&data, CollectOptions { raw_geometry: true, ..Default::default() });
        assert_eq!(raw.raw_ways.len(), 1);
        assert_eq!(raw.raw_nodes.len(), 2);
        assert!(raw.paths.is_empty());
    }

    #[test]
    fn canvas_size_includes_margins() {
        let scheme = Scheme::builtin().unwrap();
        let projector = Projector::new(
            BoundingBox { min: GeoPoint::new(0.0, 0.0), max: GeoPoint::new(1.0, 1.0) },
            DrawingRect { origin: DrawingPoint::new(25.0, 25.0), size: DrawingPoint::new(950.0, 450.0) },
        );
        let collector = PrimitiveCollector::new(&projector, &scheme, CollectOptions::default()).unwrap();
        let drawing = collector.finish();
        assert_eq!((drawing.width, drawing.height), (1000, 500));
        assert_eq!(drawing.frame_origin, DrawingPoint::new(25.0, 25.0));
    }
}

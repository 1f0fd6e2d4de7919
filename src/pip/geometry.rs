//! Boundary geometry assembly from OSM relations.

use std::io::{Read, Seek};

use geo::{Coord, LineString, MultiPolygon, Polygon};
use hashbrown::{HashMap, HashSet};
use osmpbfreader::{NodeId, OsmId, OsmObj, OsmPbfReader, RelationId, Tags, WayId};
use tracing::info;

use crate::error::Result;

/// Node coordinates and way members needed to build the selected relations.
///
/// Only the nodes of outer ways of matching relations are kept in memory,
/// which stays small for state and city boundaries of a regional extract.
pub struct GeometryResolver {
    nodes: HashMap<NodeId, Coord<f64>>,
    way_nodes: HashMap<WayId, Vec<NodeId>>,
    relation_ways: HashMap<RelationId, Vec<WayId>>,
}

impl GeometryResolver {
    /// Scan the file three times: relations, then their ways, then their nodes.
    pub fn build<R, F>(reader: &mut OsmPbfReader<R>, filter: F) -> Result<Self>
    where
        R: Read + Seek,
        F: Fn(&Tags) -> bool,
    {
        info!("Pass 1/3: selecting boundary relations...");
        reader.rewind()?;
        let mut relation_ways = HashMap::new();
        let mut wanted_ways = HashSet::new();
        for obj in reader.iter() {
            let OsmObj::Relation(rel) = obj? else {
                continue;
            };
            if !filter(&rel.tags) {
                continue;
            }
            let ways: Vec<WayId> = rel
                .refs
                .iter()
                .filter(|m| m.role == "outer" || m.role == "")
                .filter_map(|m| match m.member {
                    OsmId::Way(id) => Some(id),
                    _ => None,
                })
                .collect();
            wanted_ways.extend(ways.iter().copied());
            relation_ways.insert(rel.id, ways);
        }
        info!("Selected {} relations", relation_ways.len());

        info!("Pass 2/3: collecting member ways...");
        reader.rewind()?;
        let mut way_nodes = HashMap::new();
        let mut wanted_nodes = HashSet::new();
        for obj in reader.iter() {
            let OsmObj::Way(way) = obj? else {
                continue;
            };
            if wanted_ways.contains(&way.id) {
                wanted_nodes.extend(way.nodes.iter().copied());
                way_nodes.insert(way.id, way.nodes);
            }
        }
        info!(
            "Collected {} ways referencing {} nodes",
            way_nodes.len(),
            wanted_nodes.len()
        );

        info!("Pass 3/3: reading node coordinates...");
        reader.rewind()?;
        let mut nodes = HashMap::with_capacity(wanted_nodes.len());
        for obj in reader.iter() {
            let OsmObj::Node(node) = obj? else {
                continue;
            };
            if wanted_nodes.contains(&node.id) {
                nodes.insert(
                    node.id,
                    Coord {
                        x: node.lon(),
                        y: node.lat(),
                    },
                );
            }
        }
        info!("Stored {} node coordinates", nodes.len());

        Ok(Self {
            nodes,
            way_nodes,
            relation_ways,
        })
    }

    /// Outer rings of a relation, merged into polygons.
    pub fn resolve_relation(&self, id: RelationId) -> Option<MultiPolygon<f64>> {
        let segments: Vec<Vec<Coord<f64>>> = self
            .relation_ways
            .get(&id)?
            .iter()
            .filter_map(|way| self.way_nodes.get(way))
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|n| self.nodes.get(n).copied())
                    .collect::<Vec<_>>()
            })
            .filter(|coords| coords.len() >= 2)
            .collect();

        let polygons = assemble_rings(segments);
        if polygons.is_empty() {
            None
        } else {
            Some(MultiPolygon::new(polygons))
        }
    }
}

/// Chain open way segments end to end into closed rings.
///
/// Segments may arrive in any order and direction. Chains that cannot be
/// closed with at least three distinct vertices are dropped.
pub fn assemble_rings(segments: Vec<Vec<Coord<f64>>>) -> Vec<Polygon<f64>> {
    let mut pending = segments;
    let mut polygons = Vec::new();

    while let Some(mut chain) = pending.pop() {
        while !is_closed(&chain) {
            let Some((pos, extended)) = pending
                .iter()
                .enumerate()
                .find_map(|(pos, segment)| join(&chain, segment).map(|c| (pos, c)))
            else {
                break;
            };
            pending.swap_remove(pos);
            chain = extended;
        }

        if let Some(polygon) = close_ring(chain) {
            polygons.push(polygon);
        }
    }

    polygons
}

fn is_closed(chain: &[Coord<f64>]) -> bool {
    chain.len() >= 4 && chain.first() == chain.last()
}

/// Attach `segment` to either end of `chain`, reversing it when needed.
fn join(chain: &[Coord<f64>], segment: &[Coord<f64>]) -> Option<Vec<Coord<f64>>> {
    let (first, last) = (chain.first()?, chain.last()?);
    let (seg_first, seg_last) = (segment.first()?, segment.last()?);

    let mut joined = Vec::with_capacity(chain.len() + segment.len());
    if last == seg_first {
        joined.extend_from_slice(chain);
        joined.extend_from_slice(&segment[1..]);
    } else if last == seg_last {
        joined.extend_from_slice(chain);
        joined.extend(segment.iter().rev().skip(1));
    } else if first == seg_last {
        joined.extend_from_slice(segment);
        joined.extend_from_slice(&chain[1..]);
    } else if first == seg_first {
        joined.extend(segment.iter().rev());
        joined.extend_from_slice(&chain[1..]);
    } else {
        return None;
    }
    Some(joined)
}

fn close_ring(mut chain: Vec<Coord<f64>>) -> Option<Polygon<f64>> {
    if chain.len() < 3 {
        return None;
    }
    if chain.first() != chain.last() {
        // Open chains (segments missing from the extract) are not guessed at
        return None;
    }
    if chain.len() < 4 {
        return None;
    }
    chain.shrink_to_fit();
    Some(Polygon::new(LineString::new(chain), vec![]))
}

//! OpenStreetMap PBF files as a replayable entity stream.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use areasmith_core::{
    Entity, EntityKind, EntityMask, EntitySource, Member, Node, Relation, Way, collect_tags,
};
use geo::Coord;
use log::debug;
use osmpbf::{Element, ElementReader, RelMemberType};
use thiserror::Error;

/// Errors returned when streaming an OSM PBF file.
#[derive(Debug, Error)]
pub enum OsmReadError {
    #[error("failed to open OSM PBF file at {path:?}")]
    Open {
        #[source]
        source: osmpbf::Error,
        path: PathBuf,
    },
    #[error("failed to decode OSM PBF data at {path:?}")]
    Decode {
        #[source]
        source: osmpbf::Error,
        path: PathBuf,
    },
}

/// Counts of entities delivered by one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassCounts {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
}

/// A PBF file on disk. Every pass reopens the file, so the source can be
/// streamed any number of times.
///
/// # Examples
/// ```no_run
/// use areasmith_core::{EntityMask, EntitySource};
/// use areasmith_data::PbfSource;
///
/// # fn main() -> Result<(), areasmith_data::OsmReadError> {
/// let source = PbfSource::new("berlin.osm.pbf");
/// let mut relations = 0;
/// source.for_each_entity(EntityMask::RELATIONS, &mut |_| relations += 1)?;
/// println!("{relations} relations");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PbfSource {
    path: PathBuf,
    last_pass: Cell<PassCounts>,
}

impl PbfSource {
    /// Source reading `path`. The file is not opened until the first pass.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_pass: Cell::new(PassCounts::default()),
        }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entities delivered by the most recent pass.
    pub fn last_pass(&self) -> PassCounts {
        self.last_pass.get()
    }

    fn open(&self) -> Result<ElementReader<std::io::BufReader<std::fs::File>>, OsmReadError> {
        ElementReader::from_path(&self.path).map_err(|source| OsmReadError::Open {
            source,
            path: self.path.clone(),
        })
    }
}

impl EntitySource for PbfSource {
    type Error = OsmReadError;

    fn for_each_entity(
        &self,
        mask: EntityMask,
        handler: &mut dyn FnMut(Entity),
    ) -> Result<(), Self::Error> {
        let reader = self.open()?;
        let mut counts = PassCounts::default();
        reader
            .for_each(|element| {
                if let Some(entity) = convert(element, mask) {
                    match entity.kind() {
                        EntityKind::Node => counts.nodes += 1,
                        EntityKind::Way => counts.ways += 1,
                        EntityKind::Relation => counts.relations += 1,
                    }
                    handler(entity);
                }
            })
            .map_err(|source| OsmReadError::Decode {
                source,
                path: self.path.clone(),
            })?;
        debug!(
            "read {mask} from {}: {} nodes, {} ways, {} relations",
            self.path.display(),
            counts.nodes,
            counts.ways,
            counts.relations
        );
        self.last_pass.set(counts);
        Ok(())
    }
}

fn convert(element: Element<'_>, mask: EntityMask) -> Option<Entity> {
    match element {
        Element::Node(node) if mask.contains(EntityKind::Node) => Some(Entity::Node(Node {
            id: node.id(),
            location: validated_coord(node.lon(), node.lat()),
        })),
        Element::DenseNode(node) if mask.contains(EntityKind::Node) => Some(Entity::Node(Node {
            id: node.id(),
            location: validated_coord(node.lon(), node.lat()),
        })),
        Element::Way(way) if mask.contains(EntityKind::Way) => Some(Entity::Way(Way {
            id: way.id(),
            node_refs: way.refs().collect(),
            tags: collect_tags(way.tags()),
        })),
        Element::Relation(relation) if mask.contains(EntityKind::Relation) => {
            let members = relation
                .members()
                .map(|member| {
                    let kind = match member.member_type {
                        RelMemberType::Node => EntityKind::Node,
                        RelMemberType::Way => EntityKind::Way,
                        RelMemberType::Relation => EntityKind::Relation,
                    };
                    // Undecodable roles count as empty.
                    Member::new(member.member_id, kind, member.role().unwrap_or_default())
                })
                .collect();
            Some(Entity::Relation(Relation {
                id: relation.id(),
                members,
                tags: collect_tags(relation.tags()),
            }))
        }
        _ => None,
    }
}

/// WGS84 coordinate when finite and within range.
pub(crate) fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}

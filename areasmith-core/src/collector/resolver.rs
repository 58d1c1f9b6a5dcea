//! Second-pass stage populating the location index and resolving ways.

use geo::Coord;
use log::warn;

use crate::entity::{Node, Tags, Way};
use crate::location::{LocationIndex, LocationIndexError};

/// A way whose node references were looked up in the location index.
///
/// `locations` always has the same length as `node_refs`; an entry is
/// `None` when the node was never indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWay {
    pub id: i64,
    pub node_refs: Vec<i64>,
    pub locations: Vec<Option<Coord<f64>>>,
    pub tags: Tags,
}

impl ResolvedWay {
    /// Whether the first and last node references match.
    pub fn ends_have_same_id(&self) -> bool {
        match (self.node_refs.first(), self.node_refs.last()) {
            (Some(first), Some(last)) => self.node_refs.len() > 1 && first == last,
            _ => false,
        }
    }

    /// Number of node references without a location.
    pub fn missing_locations(&self) -> usize {
        self.locations.iter().filter(|location| location.is_none()).count()
    }

    /// Every location, or `None` when any is missing.
    pub fn complete_locations(&self) -> Option<Vec<Coord<f64>>> {
        self.locations.iter().copied().collect()
    }
}

/// Counters kept by the [`LocationResolver`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Nodes whose location was stored.
    pub nodes_indexed: u64,
    /// Nodes skipped for an absent location or a negative id.
    pub nodes_without_location: u64,
    /// Nodes the location index could not hold.
    pub nodes_rejected: u64,
    /// Ways resolved against the index.
    pub ways_resolved: u64,
    /// Node references that had no location.
    pub missing_locations: u64,
}

/// Owns the location index for the duration of the second pass.
pub struct LocationResolver {
    index: Box<dyn LocationIndex>,
    stats: ResolverStats,
}

impl LocationResolver {
    /// Wrap an empty index.
    pub fn new(index: Box<dyn LocationIndex>) -> Self {
        Self {
            index,
            stats: ResolverStats::default(),
        }
    }

    /// Store a node's location.
    ///
    /// Nodes without a location and nodes with negative ids are counted and
    /// skipped; ways referring to them see a missing location.
    pub fn handle_node(&mut self, node: &Node) -> Result<(), LocationIndexError> {
        let (Some(location), Ok(id)) = (node.location, u64::try_from(node.id)) else {
            self.stats.nodes_without_location += 1;
            return Ok(());
        };
        if self.index.put(id, location)? {
            self.stats.nodes_indexed += 1;
            return Ok(());
        }
        if self.stats.nodes_rejected == 0 {
            warn!(
                "Node {id} cannot be stored by the {} index; ways using such nodes miss locations",
                self.index.strategy()
            );
        }
        self.stats.nodes_rejected += 1;
        Ok(())
    }

    /// Substitute each node reference of `way` with its indexed location.
    pub fn resolve_way(&mut self, way: Way) -> Result<ResolvedWay, LocationIndexError> {
        let Way { id, node_refs, tags } = way;
        let mut locations = Vec::with_capacity(node_refs.len());
        for node_id in &node_refs {
            let location = match u64::try_from(*node_id) {
                Ok(unsigned) => self.index.get(unsigned)?,
                Err(_) => {
                    warn!("Way {id} refers to unsupported negative node id {node_id}");
                    None
                }
            };
            locations.push(location);
        }
        let resolved = ResolvedWay {
            id,
            node_refs,
            locations,
            tags,
        };
        self.stats.ways_resolved += 1;
        self.stats.missing_locations += resolved.missing_locations() as u64;
        Ok(resolved)
    }

    /// The underlying index.
    pub fn index(&self) -> &dyn LocationIndex {
        self.index.as_ref()
    }

    /// Counters gathered so far.
    pub const fn stats(&self) -> &ResolverStats {
        &self.stats
    }
}

impl std::fmt::Debug for LocationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationResolver")
            .field("strategy", &self.index.strategy())
            .field("stats", &self.stats)
            .finish()
    }
}

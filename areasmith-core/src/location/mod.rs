//! Node id to coordinate lookup with pluggable storage strategies.
//!
//! Strategies trade resident memory against access pattern:
//! - [`DenseMemArray`] indexes a vector directly by id;
//! - [`DenseFileArray`] keeps the same layout in a temporary file;
//! - [`SparseMemMap`] stores only the ids it sees in an ordered map;
//! - [`NoLocations`] stores nothing and always reports "absent".

use std::fmt;
use std::io;
use std::str::FromStr;

use geo::Coord;
use thiserror::Error;

use crate::entity::EntityMask;

mod dense;
mod sparse;

pub use dense::{DenseFileArray, DenseMemArray, MAX_DENSE_ID};
pub use sparse::SparseMemMap;

/// Storage for node locations keyed by unsigned node id.
pub trait LocationIndex {
    /// Store `location` for `id`, replacing any previous value.
    ///
    /// Returns `false` when the strategy cannot hold this id or location;
    /// lookups for `id` then report it as absent.
    fn put(&mut self, id: u64, location: Coord<f64>) -> Result<bool, LocationIndexError>;

    /// Look up the location stored for `id`.
    fn get(&self, id: u64) -> Result<Option<Coord<f64>>, LocationIndexError>;

    /// Number of ids holding a location.
    fn len(&self) -> usize;

    /// Whether no location has been stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Estimated bytes used by the index, resident or on disk.
    fn used_memory(&self) -> usize;

    /// Strategy implemented by this index.
    fn strategy(&self) -> IndexStrategy;
}

/// Errors raised by location index strategies.
#[derive(Debug, Error)]
pub enum LocationIndexError {
    /// The temporary backing file could not be created.
    #[error("failed to create backing file for the {strategy} index")]
    CreateBackingFile {
        /// Strategy that needed the file.
        strategy: IndexStrategy,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Reading or writing the backing file failed.
    #[error("failed to access backing file slot for node {id}")]
    BackingFile {
        /// Node id whose slot was accessed.
        id: u64,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The strategy name is not recognised.
    #[error("unknown location index type {name:?} (available: {available})")]
    UnknownStrategy {
        /// Name that failed to parse.
        name: String,
        /// Comma-separated list of valid names.
        available: String,
    },
}

/// Selectable location index strategy.
///
/// # Examples
/// ```
/// use areasmith_core::IndexStrategy;
///
/// let strategy: IndexStrategy = "dense_mem_array".parse().unwrap();
/// assert_eq!(strategy, IndexStrategy::DenseMemArray);
/// assert!(strategy.requires_nodes());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexStrategy {
    /// In-memory vector indexed by id.
    DenseMemArray,
    /// Temporary-file vector indexed by id.
    DenseFileArray,
    /// In-memory ordered map.
    #[default]
    SparseMemMap,
    /// No storage; every lookup is absent.
    None,
}

impl IndexStrategy {
    /// Every strategy in presentation order.
    pub const ALL: [Self; 4] = [
        Self::DenseMemArray,
        Self::DenseFileArray,
        Self::SparseMemMap,
        Self::None,
    ];

    /// Name used on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DenseMemArray => "dense_mem_array",
            Self::DenseFileArray => "dense_file_array",
            Self::SparseMemMap => "sparse_mem_map",
            Self::None => "none",
        }
    }

    /// Whether node entities must be streamed to populate this index.
    pub const fn requires_nodes(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Entity kinds the second pass must request for this strategy.
    pub const fn second_pass_mask(self) -> EntityMask {
        if self.requires_nodes() {
            EntityMask::NODES.union(EntityMask::WAYS)
        } else {
            EntityMask::WAYS
        }
    }

    /// Instantiate an empty index for this strategy.
    pub fn build(self) -> Result<Box<dyn LocationIndex>, LocationIndexError> {
        let index: Box<dyn LocationIndex> = match self {
            Self::DenseMemArray => Box::new(DenseMemArray::default()),
            Self::DenseFileArray => Box::new(DenseFileArray::new()?),
            Self::SparseMemMap => Box::new(SparseMemMap::default()),
            Self::None => Box::new(NoLocations),
        };
        Ok(index)
    }
}

impl fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexStrategy {
    type Err = LocationIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| LocationIndexError::UnknownStrategy {
                name: s.to_owned(),
                available: Self::ALL.map(Self::name).join(", "),
            })
    }
}

/// Strategy that discards every location.
///
/// Used when only relation structure is being collected; the second pass
/// then never requests nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocations;

impl LocationIndex for NoLocations {
    fn put(&mut self, _id: u64, _location: Coord<f64>) -> Result<bool, LocationIndexError> {
        Ok(false)
    }

    fn get(&self, _id: u64) -> Result<Option<Coord<f64>>, LocationIndexError> {
        Ok(None)
    }

    fn len(&self) -> usize {
        0
    }

    fn used_memory(&self) -> usize {
        0
    }

    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::None
    }
}

use std::collections::BTreeMap;
use std::mem::size_of;

use geo::Coord;

use super::{IndexStrategy, LocationIndex, LocationIndexError};

/// Ordered map holding only the ids that were stored.
///
/// Lower footprint than the dense arrays for sparse id spaces such as
/// regional extracts, at the cost of logarithmic lookups.
#[derive(Debug, Default)]
pub struct SparseMemMap {
    locations: BTreeMap<u64, Coord<f64>>,
}

impl LocationIndex for SparseMemMap {
    fn put(&mut self, id: u64, location: Coord<f64>) -> Result<bool, LocationIndexError> {
        self.locations.insert(id, location);
        Ok(true)
    }

    fn get(&self, id: u64) -> Result<Option<Coord<f64>>, LocationIndexError> {
        Ok(self.locations.get(&id).copied())
    }

    fn len(&self) -> usize {
        self.locations.len()
    }

    fn used_memory(&self) -> usize {
        self.locations.len() * (size_of::<u64>() + size_of::<Coord<f64>>())
    }

    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::SparseMemMap
    }
}

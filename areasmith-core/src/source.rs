//! Contract for replayable entity streams.

use crate::entity::{Entity, EntityMask};

/// A dataset that can be streamed more than once.
///
/// Every call to [`EntitySource::for_each_entity`] is an independent pass
/// over the same logical input. Implementations must deliver only entities
/// whose kind is contained in `mask`, in the order they appear in the
/// dataset (nodes and ways in non-decreasing id order for the location index
/// to be populated before a way refers to it).
pub trait EntitySource {
    /// Failure raised while opening or decoding the stream.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stream every entity matching `mask` into `handler`.
    fn for_each_entity(
        &self,
        mask: EntityMask,
        handler: &mut dyn FnMut(Entity),
    ) -> Result<(), Self::Error>;
}

impl<S: EntitySource + ?Sized> EntitySource for &S {
    type Error = S::Error;

    fn for_each_entity(
        &self,
        mask: EntityMask,
        handler: &mut dyn FnMut(Entity),
    ) -> Result<(), Self::Error> {
        (**self).for_each_entity(mask, handler)
    }
}

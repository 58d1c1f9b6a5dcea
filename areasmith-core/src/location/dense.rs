//! Dense location arrays addressed directly by node id.
//!
//! Both arrays store one 8-byte fixed-point slot per id up to the largest id
//! seen. Ids above [`MAX_DENSE_ID`] and coordinates outside the fixed-point
//! range are not stored; lookups for them report an absent location.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::mem::size_of;

use geo::Coord;

use super::{IndexStrategy, LocationIndex, LocationIndexError};

/// Largest node id the dense strategies address.
pub const MAX_DENSE_ID: u64 = 1 << 36;

/// Fixed-point units per degree.
const COORDINATE_PRECISION: f64 = 10_000_000.0;

/// Coordinate value reserved for empty slots.
const UNDEFINED: i32 = i32::MAX;

/// A location in fixed-point units, or the empty-slot marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FixedLocation {
    x: i32,
    y: i32,
}

impl FixedLocation {
    const UNDEFINED: Self = Self {
        x: UNDEFINED,
        y: UNDEFINED,
    };
    const BYTES: usize = 8;

    fn encode(location: Coord<f64>) -> Option<Self> {
        Some(Self {
            x: to_fixed(location.x)?,
            y: to_fixed(location.y)?,
        })
    }

    fn decode(self) -> Option<Coord<f64>> {
        if self == Self::UNDEFINED {
            return None;
        }
        Some(Coord {
            x: f64::from(self.x) / COORDINATE_PRECISION,
            y: f64::from(self.y) / COORDINATE_PRECISION,
        })
    }

    fn to_bytes(self) -> [u8; Self::BYTES] {
        let mut bytes = [0_u8; Self::BYTES];
        let (x, y) = bytes.split_at_mut(4);
        x.copy_from_slice(&self.x.to_le_bytes());
        y.copy_from_slice(&self.y.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: [u8; Self::BYTES]) -> Self {
        let [x0, x1, x2, x3, y0, y1, y2, y3] = bytes;
        Self {
            x: i32::from_le_bytes([x0, x1, x2, x3]),
            y: i32::from_le_bytes([y0, y1, y2, y3]),
        }
    }
}

/// Scale `degrees` to fixed-point units, or `None` when it does not fit.
fn to_fixed(degrees: f64) -> Option<i32> {
    let scaled = (degrees * COORDINATE_PRECISION).round();
    let fits = scaled.is_finite() && scaled >= f64::from(i32::MIN) && scaled < f64::from(UNDEFINED);
    fits.then_some(scaled as i32)
}

/// Slot number for `id`, or `None` beyond [`MAX_DENSE_ID`].
fn dense_slot(id: u64) -> Option<usize> {
    if id > MAX_DENSE_ID {
        return None;
    }
    usize::try_from(id).ok()
}

/// Vector of fixed-point locations indexed by node id.
///
/// Fastest lookups with the highest footprint: memory grows with the largest
/// id stored, not with the number of ids.
#[derive(Debug, Default)]
pub struct DenseMemArray {
    slots: Vec<FixedLocation>,
    stored: usize,
}

impl LocationIndex for DenseMemArray {
    fn put(&mut self, id: u64, location: Coord<f64>) -> Result<bool, LocationIndexError> {
        let (Some(slot), Some(fixed)) = (dense_slot(id), FixedLocation::encode(location)) else {
            return Ok(false);
        };
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, FixedLocation::UNDEFINED);
        }
        if let Some(entry) = self.slots.get_mut(slot) {
            if *entry == FixedLocation::UNDEFINED {
                self.stored += 1;
            }
            *entry = fixed;
        }
        Ok(true)
    }

    fn get(&self, id: u64) -> Result<Option<Coord<f64>>, LocationIndexError> {
        Ok(dense_slot(id)
            .and_then(|slot| self.slots.get(slot))
            .and_then(|fixed| fixed.decode()))
    }

    fn len(&self) -> usize {
        self.stored
    }

    fn used_memory(&self) -> usize {
        self.slots.capacity() * size_of::<FixedLocation>()
    }

    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::DenseMemArray
    }
}

const RECORD_LEN: u64 = FixedLocation::BYTES as u64;

/// Dense location array kept in an anonymous temporary file.
///
/// Resident memory stays bounded. Growing the file writes empty-slot markers
/// up to the new id. The file is removed by the OS once the index is
/// dropped.
#[derive(Debug)]
pub struct DenseFileArray {
    file: File,
    slots: u64,
    stored: usize,
}

impl DenseFileArray {
    /// Create an index backed by a fresh temporary file.
    pub fn new() -> Result<Self, LocationIndexError> {
        let file = tempfile::tempfile().map_err(|source| LocationIndexError::CreateBackingFile {
            strategy: IndexStrategy::DenseFileArray,
            source,
        })?;
        Ok(Self {
            file,
            slots: 0,
            stored: 0,
        })
    }

    fn read_slot(&self, id: u64) -> Result<FixedLocation, LocationIndexError> {
        let mut bytes = [0_u8; FixedLocation::BYTES];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(id * RECORD_LEN))
            .and_then(|_| file.read_exact(&mut bytes))
            .map_err(|source| LocationIndexError::BackingFile { id, source })?;
        Ok(FixedLocation::from_bytes(bytes))
    }

    /// Write `fixed` at `id`, filling any gap before it with empty slots.
    fn write_slot(&mut self, id: u64, fixed: FixedLocation) -> Result<(), LocationIndexError> {
        let start = id.min(self.slots);
        let mut file = &self.file;
        let written = file.seek(SeekFrom::Start(start * RECORD_LEN)).and_then(|_| {
            let mut writer = BufWriter::new(file);
            for _ in start..id {
                writer.write_all(&FixedLocation::UNDEFINED.to_bytes())?;
            }
            writer.write_all(&fixed.to_bytes())?;
            writer.flush()
        });
        written.map_err(|source| LocationIndexError::BackingFile { id, source })?;
        self.slots = self.slots.max(id + 1);
        Ok(())
    }
}

impl LocationIndex for DenseFileArray {
    fn put(&mut self, id: u64, location: Coord<f64>) -> Result<bool, LocationIndexError> {
        let (Some(_), Some(fixed)) = (dense_slot(id), FixedLocation::encode(location)) else {
            return Ok(false);
        };
        let was_present = id < self.slots && self.read_slot(id)? != FixedLocation::UNDEFINED;
        self.write_slot(id, fixed)?;
        if !was_present {
            self.stored += 1;
        }
        Ok(true)
    }

    fn get(&self, id: u64) -> Result<Option<Coord<f64>>, LocationIndexError> {
        if dense_slot(id).is_none() || id >= self.slots {
            return Ok(None);
        }
        Ok(self.read_slot(id)?.decode())
    }

    fn len(&self) -> usize {
        self.stored
    }

    fn used_memory(&self) -> usize {
        usize::try_from(self.slots * RECORD_LEN).unwrap_or(usize::MAX)
    }

    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::DenseFileArray
    }
}

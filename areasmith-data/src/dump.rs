//! Raw structural dump of assembled areas, for debugging.

use std::io::{self, Write};

use areasmith_core::{Area, AreaSink, CheckedArea, SinkError};
use geo::LineString;

use crate::target::OutputTarget;

/// Writes every area as an indented text block.
///
/// ```text
/// area 17 from relation 8 valid=yes
///   tags: building=yes
///   polygon 0
///     outer (5): 0 0, 1 0, 1 1, 0 1, 0 0
/// ```
#[derive(Debug)]
pub struct DumpSink {
    target: OutputTarget,
}

impl DumpSink {
    /// Dump into `target`.
    pub const fn new(target: OutputTarget) -> Self {
        Self { target }
    }

    fn dump(&mut self, area: &Area, valid: Option<bool>) -> io::Result<()> {
        let out = &mut self.target;
        let valid = match valid {
            Some(true) => "yes",
            Some(false) => "no",
            None => "unchecked",
        };
        writeln!(
            out,
            "area {} from {} {} valid={valid}",
            area.id(),
            area.origin().entity_kind(),
            area.original_id()
        )?;
        let tags: Vec<String> = area
            .tags()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        writeln!(out, "  tags: {}", tags.join(" "))?;
        if area.is_empty() {
            writeln!(out, "  (empty)")?;
        }
        for (index, polygon) in area.geometry().iter().enumerate() {
            writeln!(out, "  polygon {index}")?;
            write_ring(out, "outer", polygon.exterior())?;
            for inner in polygon.interiors() {
                write_ring(out, "inner", inner)?;
            }
        }
        Ok(())
    }
}

fn write_ring(out: &mut impl Write, label: &str, ring: &LineString<f64>) -> io::Result<()> {
    let coords: Vec<String> = ring.coords().map(|c| format!("{} {}", c.x, c.y)).collect();
    writeln!(out, "    {label} ({}): {}", coords.len(), coords.join(", "))
}

impl AreaSink for DumpSink {
    fn name(&self) -> &str {
        "dump"
    }

    fn is_persistent(&self) -> bool {
        false
    }

    fn write(&mut self, area: CheckedArea<'_>) -> Result<(), SinkError> {
        self.dump(area.area, area.valid)
            .map_err(|err| SinkError::new(format!("dump to {}", self.target.label()), err))
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.target
            .flush()
            .map_err(|err| SinkError::new(format!("dump to {}", self.target.label()), err))
    }
}

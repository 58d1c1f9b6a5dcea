//! Tag statistics for areas that failed to assemble.
//!
//! Run the assembler with empty placeholders enabled and register a
//! [`FailedTagSink`]; every placeholder is counted under the first matching
//! category of [`FailedTagCounts`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::area::Area;
use crate::output::{AreaSink, CheckedArea, SinkError};

/// Failed areas per tag category.
///
/// Categories are checked in the order `building`, `landuse`, `natural`,
/// `amenity`, `boundary`, `sport`, `leisure`, `place`; an area counts once,
/// under the first key it carries, or as `unknown`. `name` is counted
/// independently of the category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailedTagCounts {
    pub amenity: u64,
    pub boundary: u64,
    pub building: u64,
    pub landuse: u64,
    pub leisure: u64,
    pub natural: u64,
    pub place: u64,
    pub sport: u64,
    pub unknown: u64,
    pub name: u64,
}

impl FailedTagCounts {
    /// Count one failed area.
    pub fn record(&mut self, area: &Area) {
        let tags = area.tags();
        if tags.contains_key("name") {
            self.name += 1;
        }
        let category = [
            ("building", &mut self.building),
            ("landuse", &mut self.landuse),
            ("natural", &mut self.natural),
            ("amenity", &mut self.amenity),
            ("boundary", &mut self.boundary),
            ("sport", &mut self.sport),
            ("leisure", &mut self.leisure),
            ("place", &mut self.place),
        ]
        .into_iter()
        .find(|(key, _)| tags.contains_key(*key));
        match category {
            Some((_, count)) => *count += 1,
            None => {
                self.unknown += 1;
                for (key, value) in tags {
                    debug!("{} {key} {value}", area.id());
                }
            }
        }
    }

    /// Total failed areas counted.
    pub const fn total(&self) -> u64 {
        self.amenity
            + self.boundary
            + self.building
            + self.landuse
            + self.leisure
            + self.natural
            + self.place
            + self.sport
            + self.unknown
    }
}

impl fmt::Display for FailedTagCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "amenity:   {}", self.amenity)?;
        writeln!(f, "boundary:  {}", self.boundary)?;
        writeln!(f, "building:  {}", self.building)?;
        writeln!(f, "landuse:   {}", self.landuse)?;
        writeln!(f, "leisure:   {}", self.leisure)?;
        writeln!(f, "natural:   {}", self.natural)?;
        writeln!(f, "place:     {}", self.place)?;
        writeln!(f, "sport:     {}", self.sport)?;
        writeln!(f, "unknown:   {}", self.unknown)?;
        writeln!(f, "with name: {}", self.name)
    }
}

/// Sink counting the tags of empty placeholder areas.
///
/// Areas with geometry are ignored. The counts stay readable through
/// [`FailedTagSink::counts`] after the sink moved into a fan-out.
#[derive(Debug, Default, Clone)]
pub struct FailedTagSink {
    counts: Rc<RefCell<FailedTagCounts>>,
}

impl FailedTagSink {
    /// Shared handle onto the counts.
    pub fn counts(&self) -> Rc<RefCell<FailedTagCounts>> {
        Rc::clone(&self.counts)
    }
}

impl AreaSink for FailedTagSink {
    fn name(&self) -> &str {
        "failed tags"
    }

    fn is_persistent(&self) -> bool {
        false
    }

    fn write(&mut self, checked: CheckedArea<'_>) -> Result<(), SinkError> {
        if checked.area.is_empty() {
            self.counts.borrow_mut().record(checked.area);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{AreaId, AreaOrigin};
    use crate::entity::collect_tags;
    use geo::{MultiPolygon, polygon};
    use rstest::rstest;

    fn placeholder(tags: &[(&str, &str)]) -> Area {
        let id = AreaId::encode(AreaOrigin::Way, 1).expect("id");
        Area::empty(id, collect_tags(tags.iter().copied()))
    }

    #[rstest]
    #[case(&[("building", "yes"), ("landuse", "residential")], FailedTagCounts { building: 1, ..FailedTagCounts::default() })]
    #[case(&[("amenity", "school"), ("natural", "wood")], FailedTagCounts { natural: 1, ..FailedTagCounts::default() })]
    #[case(&[("place", "island"), ("name", "Holm")], FailedTagCounts { place: 1, name: 1, ..FailedTagCounts::default() })]
    #[case(&[("leisure", "park"), ("sport", "golf")], FailedTagCounts { sport: 1, ..FailedTagCounts::default() })]
    #[case(&[("area:highway", "footway")], FailedTagCounts { unknown: 1, ..FailedTagCounts::default() })]
    fn counts_the_first_matching_category(
        #[case] tags: &[(&str, &str)],
        #[case] expected: FailedTagCounts,
    ) {
        let mut counts = FailedTagCounts::default();
        counts.record(&placeholder(tags));
        assert_eq!(counts, expected);
        assert_eq!(counts.total(), 1);
    }

    #[rstest]
    fn sink_skips_assembled_areas() {
        let mut sink = FailedTagSink::default();
        let counts = sink.counts();
        let id = AreaId::encode(AreaOrigin::Way, 2).expect("id");
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let assembled = Area::new(
            id,
            collect_tags([("building", "yes")]),
            MultiPolygon::new(vec![square]),
        );
        let failed = placeholder(&[("boundary", "administrative")]);

        for area in [&assembled, &failed] {
            sink.write(CheckedArea { area, valid: None }).expect("count");
        }

        assert_eq!(
            *counts.borrow(),
            FailedTagCounts {
                boundary: 1,
                ..FailedTagCounts::default()
            }
        );
    }

    #[rstest]
    fn renders_one_line_per_category() {
        let counts = FailedTagCounts {
            building: 3,
            name: 1,
            ..FailedTagCounts::default()
        };
        assert_eq!(
            counts.to_string(),
            "amenity:   0\nboundary:  0\nbuilding:  3\nlanduse:   0\nleisure:   0\n\
             natural:   0\nplace:     0\nsport:     0\nunknown:   0\nwith name: 1\n"
        );
    }
}

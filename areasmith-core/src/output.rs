//! Output fan-out for assembled areas.
//!
//! Every area may be validated once, then offered to each registered
//! [`AreaSink`]. Sink failures for one area become problem records and never
//! stop the run.

use std::error::Error;
use std::fmt;

use geo::algorithm::validation::Validation;
use log::warn;
use thiserror::Error;

use crate::area::Area;
use crate::assembler::Assembly;
use crate::problem::{ProblemKind, ProblemRecord, ProblemReporter};

/// Failure raised by a sink or problem reporter.
#[derive(Debug, Error)]
#[error("{sink} failed")]
pub struct SinkError {
    /// Name of the failing sink.
    pub sink: String,
    /// Underlying error.
    #[source]
    pub source: Box<dyn Error + Send + Sync>,
}

impl SinkError {
    /// Wrap `source` as a failure of the sink called `sink`.
    pub fn new(sink: impl Into<String>, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self {
            sink: sink.into(),
            source: source.into(),
        }
    }

    /// The source chain rendered on one line.
    pub fn chain(&self) -> String {
        let mut message = self.source.to_string();
        let mut next = self.source.source();
        while let Some(cause) = next {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            next = cause.source();
        }
        message
    }
}

/// An area paired with its validity flag. `valid` is `None` when no check
/// ran.
#[derive(Debug, Clone, Copy)]
pub struct CheckedArea<'a> {
    pub area: &'a Area,
    pub valid: Option<bool>,
}

/// Destination for assembled areas.
pub trait AreaSink {
    /// Name used in problem records and logs.
    fn name(&self) -> &str;

    /// Whether the sink stores areas durably. Only persistent sinks are
    /// subject to the invalid-only filter.
    fn is_persistent(&self) -> bool {
        true
    }

    /// Accept one area.
    fn write(&mut self, area: CheckedArea<'_>) -> Result<(), SinkError>;

    /// Flush or commit at the end of the run.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Validation and filtering switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutConfig {
    /// Run the geometry validity check on every area.
    pub check: bool,
    /// Withhold valid areas from persistent sinks. Implies `check`.
    pub only_invalid: bool,
}

impl FanOutConfig {
    /// Whether areas are validated.
    pub const fn validates(self) -> bool {
        self.check || self.only_invalid
    }
}

/// Counters kept by the [`FanOut`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputStats {
    /// Areas dispatched.
    pub areas: u64,
    /// Areas found invalid.
    pub invalid: u64,
    /// Valid areas withheld from persistent sinks.
    pub filtered: u64,
    /// Areas accepted by at least one persistent sink.
    pub persisted: u64,
    /// Failed sink writes.
    pub sink_failures: u64,
    /// Problems handed to the reporter.
    pub problems: u64,
    /// Problems the reporter failed to record.
    pub unreported_problems: u64,
}

impl fmt::Display for OutputStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "areas={} invalid={} filtered={} persisted={} sink_failures={} problems={}",
            self.areas, self.invalid, self.filtered, self.persisted, self.sink_failures, self.problems
        )
    }
}

/// Routes areas to sinks and problems to a reporter.
pub struct FanOut {
    config: FanOutConfig,
    sinks: Vec<Box<dyn AreaSink>>,
    reporter: Box<dyn ProblemReporter>,
    stats: OutputStats,
}

impl FanOut {
    /// Create a fan-out with no sinks.
    pub fn new(config: FanOutConfig, reporter: Box<dyn ProblemReporter>) -> Self {
        Self {
            config,
            sinks: Vec::new(),
            reporter,
            stats: OutputStats::default(),
        }
    }

    /// Register a sink. Sinks receive areas in registration order.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn AreaSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Register a sink on an existing fan-out.
    pub fn add_sink(&mut self, sink: Box<dyn AreaSink>) {
        self.sinks.push(sink);
    }

    /// Counters gathered so far.
    pub const fn stats(&self) -> &OutputStats {
        &self.stats
    }

    /// Hand a problem to the reporter, logging it if the reporter fails.
    pub fn report(&mut self, problem: &ProblemRecord) {
        self.stats.problems += 1;
        if let Err(err) = self.reporter.report(problem) {
            self.stats.unreported_problems += 1;
            warn!("{problem} (not recorded: {}: {})", err, err.chain());
        }
    }

    /// Dispatch everything one assembler call produced.
    pub fn dispatch(&mut self, assembly: Assembly) {
        for problem in &assembly.problems {
            self.report(problem);
        }
        for area in &assembly.areas {
            self.dispatch_area(area);
        }
    }

    fn dispatch_area(&mut self, area: &Area) {
        self.stats.areas += 1;
        let valid = self.config.validates().then(|| area.geometry().is_valid());
        if valid == Some(false) {
            self.stats.invalid += 1;
        }
        let withheld = self.config.only_invalid && valid == Some(true);
        if withheld {
            self.stats.filtered += 1;
        }

        let checked = CheckedArea { area, valid };
        let mut persisted = false;
        let mut failures = Vec::new();
        for sink in &mut self.sinks {
            if withheld && sink.is_persistent() {
                continue;
            }
            match sink.write(checked) {
                Ok(()) => persisted |= sink.is_persistent(),
                Err(err) => failures.push(err),
            }
        }
        if persisted {
            self.stats.persisted += 1;
        }
        for err in failures {
            self.stats.sink_failures += 1;
            let problem = ProblemRecord::new(
                area.origin().entity_kind(),
                area.original_id(),
                ProblemKind::SinkFailure {
                    message: err.chain(),
                    sink: err.sink,
                },
            );
            self.report(&problem);
        }
    }

    /// Finish every sink and the reporter.
    ///
    /// All of them are finished even if one fails; the first error is
    /// returned.
    pub fn finish(mut self) -> Result<OutputStats, SinkError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.finish() {
                first_error.get_or_insert(err);
            }
        }
        if let Err(err) = self.reporter.finish() {
            first_error.get_or_insert(err);
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(self.stats),
        }
    }
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sinks: Vec<&str> = self.sinks.iter().map(|sink| sink.name()).collect();
        f.debug_struct("FanOut")
            .field("config", &self.config)
            .field("sinks", &sinks)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Sink that only counts the areas it sees.
#[derive(Debug, Default, Clone)]
pub struct CountingSink {
    areas: u64,
    invalid: u64,
}

impl CountingSink {
    /// Areas seen.
    pub const fn areas(&self) -> u64 {
        self.areas
    }

    /// Areas seen with a failed validity check.
    pub const fn invalid(&self) -> u64 {
        self.invalid
    }
}

impl AreaSink for CountingSink {
    fn name(&self) -> &str {
        "count"
    }

    fn is_persistent(&self) -> bool {
        false
    }

    fn write(&mut self, area: CheckedArea<'_>) -> Result<(), SinkError> {
        self.areas += 1;
        if area.valid == Some(false) {
            self.invalid += 1;
        }
        Ok(())
    }
}

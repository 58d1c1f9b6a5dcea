//! Problem records written as text lines.

use std::io::Write;

use areasmith_core::{ProblemRecord, ProblemReporter, SinkError};

use crate::target::OutputTarget;

/// Writes one line per problem to a text target.
#[derive(Debug)]
pub struct StreamProblemReporter {
    target: OutputTarget,
    written: u64,
}

impl StreamProblemReporter {
    /// Report into `target`.
    pub const fn new(target: OutputTarget) -> Self {
        Self { target, written: 0 }
    }

    /// Lines written so far.
    pub const fn written(&self) -> u64 {
        self.written
    }

    fn sink_name(&self) -> String {
        format!("problems to {}", self.target.label())
    }
}

impl ProblemReporter for StreamProblemReporter {
    fn report(&mut self, problem: &ProblemRecord) -> Result<(), SinkError> {
        writeln!(self.target, "{problem}").map_err(|err| SinkError::new(self.sink_name(), err))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.target
            .flush()
            .map_err(|err| SinkError::new(self.sink_name(), err))
    }
}

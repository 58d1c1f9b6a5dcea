//! Facade crate for streaming area assembly.
//!
//! This crate re-exports the core domain types and exposes the OSM PBF
//! source and SQLite output behind the `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use areasmith_core::{
    Area, AreaId, AreaOrigin, AreaSink, Assembler, AssemblerConfig, AssemblyStats, AuditReport,
    CheckedArea, CollectOnlyAssembler, Entity, EntityKind, EntityMask, EntitySource,
    FailedTagCounts, FailedTagSink, FanOut, FanOutConfig, IndexStrategy, LocationIndex, LocationIndexError, OutputStats, Pipeline,
    PipelineError, ProblemKind, ProblemRecord, ProblemReporter, RingAssembler, RunSummary,
    SinkError, audit_relations,
};

#[cfg(feature = "store-sqlite")]
pub use areasmith_data::{
    DumpSink, OsmReadError, PbfSource, SqliteOutput, SqliteOutputError, StreamProblemReporter,
    TargetSpec,
};

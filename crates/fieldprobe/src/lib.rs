//! Field probes.
//!
//! This crate samples a discretized field at a fixed set of points spread
//! over the ranks of a parallel computation and accumulates the sampled
//! values as per-point time series, typically one entry per time step.
//!
//! # Architecture
//!
//! - [`probe`] - [`Probe`]: one point and its evaluation history
//! - [`collection`] - [`ProbeCollection`]: the probes owned by one rank
//! - [`dict`] - [`ProbeDict`]: one collection per solution component
//! - [`field`] - [`FieldSpace`] and [`Field`] collaborator traits
//! - [`comm`] - [`Communicator`]: the collective sum used at construction
//! - [`sink`] - [`ProbeSink`]: where dumped time series go
//! - [`config`] - [`ProbeConfig`]
//! - [`error`] - [`ProbeError`]
//!
//! # Example
//!
//! ```
//! use fieldprobe::{FnField, MemorySink, ProbeCollection, SelfComm, SlabPartition};
//!
//! let space = SlabPartition::new(vec![0.0; 3], vec![1.0; 3], 0, 0, 1, 1).unwrap();
//! let points = vec![[0.5, 0.5, 0.5], [2.0, 0.0, 0.0]];
//! let mut probes = ProbeCollection::new(&points, &space, &SelfComm).unwrap();
//!
//! for step in 0..3 {
//!     let t = step as f64;
//!     let field = FnField::new(1, move |p: &[f64]| Ok(vec![p[0] * t]));
//!     probes.eval(&field).unwrap();
//! }
//!
//! let mut sink = MemorySink::new();
//! probes.dump(0, "u", &mut sink).unwrap();
//! assert_eq!(sink.table("u").unwrap().rows[0].series.len(), 3);
//! ```

pub mod collection;
pub mod comm;
pub mod config;
pub mod dict;
pub mod error;
pub mod field;
pub mod probe;
pub mod sink;

#[cfg(test)]
mod tests;

pub use collection::{EvalReport, ProbeCollection};
pub use comm::{CommError, Communicator, SelfComm, ThreadComm};
pub use config::{EvalErrorPolicy, ProbeConfig};
pub use dict::ProbeDict;
pub use error::{ProbeError, Result};
pub use field::{Field, FieldError, FieldSpace, FnField, SlabPartition};
pub use probe::Probe;
pub use sink::{
    FileSink, FileSinkConfig, MemorySink, NullSink, ProbeRow, ProbeSink, ProbeTable, Series,
    SinkError,
};

//! The set of probes owned by one rank.
//!
//! Two index spaces are in play and must not be confused:
//!
//! - the **local index** `0..local_size()`, position in this rank's list
//! - the **global id**, position of the point in the candidate set given to
//!   every rank at construction
//!
//! Local order is the candidate order restricted to owned points and is
//! never re-sorted.

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::comm::Communicator;
use crate::config::{EvalErrorPolicy, ProbeConfig};
use crate::error::{ProbeError, Result};
use crate::field::{Field, FieldError, FieldSpace};
use crate::probe::Probe;
use crate::sink::{ProbeRow, ProbeSink, ProbeTable, Series};

/// Outcome of one [`ProbeCollection::eval`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalReport {
    /// Probes that received a value.
    pub evaluated: usize,
    /// Global ids of probes that received the missing sentinel.
    pub skipped: Vec<usize>,
}

/// Probes owned by this rank, with a shared evaluation count.
#[derive(Debug, Clone)]
pub struct ProbeCollection {
    probes: Vec<(usize, Probe)>,
    value_size: usize,
    total_probe_count: usize,
    num_evals: usize,
    rank: usize,
    config: ProbeConfig,
}

impl ProbeCollection {
    /// Build the collection with the default [`ProbeConfig`].
    pub fn new<P, S, C>(points: &[P], space: &S, comm: &C) -> Result<Self>
    where
        P: AsRef<[f64]>,
        S: FieldSpace + ?Sized,
        C: Communicator + ?Sized,
    {
        Self::with_config(points, space, comm, ProbeConfig::default())
    }

    /// Build the collection from the candidate points.
    ///
    /// Every rank of `comm` must call this with the same `points`; the
    /// global probe count is summed over the group here and nowhere else.
    pub fn with_config<P, S, C>(
        points: &[P],
        space: &S,
        comm: &C,
        config: ProbeConfig,
    ) -> Result<Self>
    where
        P: AsRef<[f64]>,
        S: FieldSpace + ?Sized,
        C: Communicator + ?Sized,
    {
        let local = Self::filter_owned(points, space, &config);

        // The reduction runs even when this rank failed validation, otherwise
        // the other ranks would block forever.
        let local_count = local.as_ref().map_or(0, Vec::len);
        let total_probe_count = comm.sum(local_count)?;
        let probes = local?;

        info!(
            rank = comm.rank(),
            candidates = points.len(),
            local = probes.len(),
            total = total_probe_count,
            "probe collection created"
        );

        Ok(Self {
            probes,
            value_size: space.value_size(),
            total_probe_count,
            num_evals: 0,
            rank: comm.rank(),
            config,
        })
    }

    fn filter_owned<P, S>(
        points: &[P],
        space: &S,
        config: &ProbeConfig,
    ) -> Result<Vec<(usize, Probe)>>
    where
        P: AsRef<[f64]>,
        S: FieldSpace + ?Sized,
    {
        config.validate()?;
        let value_size = space.value_size();
        if value_size == 0 {
            return Err(ProbeError::InvalidConfig(
                "field space value_size must be > 0".to_string(),
            ));
        }

        let dim = space.geometric_dim();
        let mut probes = Vec::new();
        for (id, point) in points.iter().enumerate() {
            let point = point.as_ref();
            if point.len() != dim {
                return Err(ProbeError::DimensionMismatch {
                    expected: dim,
                    got: point.len(),
                });
            }
            if space.owns(point) {
                probes.push((
                    id,
                    Probe::with_capacity(id, point.to_vec(), value_size, config.history_capacity),
                ));
            }
        }
        Ok(probes)
    }

    /// Number of probes owned by this rank.
    pub fn local_size(&self) -> usize {
        self.probes.len()
    }

    /// Number of components recorded per evaluation.
    pub fn value_size(&self) -> usize {
        self.value_size
    }

    /// Number of probes owned by any rank of the group.
    pub fn total_probe_count(&self) -> usize {
        self.total_probe_count
    }

    /// Completed evaluations since construction or the last clear.
    pub fn number_of_evaluations(&self) -> usize {
        self.num_evals
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// `(global_id, probe)` pairs in local order.
    pub fn probes(&self) -> impl Iterator<Item = (usize, &Probe)> {
        self.probes.iter().map(|(id, probe)| (*id, probe))
    }

    /// Probe at local index `i`.
    pub fn get_probe(&self, i: usize) -> Result<&Probe> {
        self.probes
            .get(i)
            .map(|(_, probe)| probe)
            .ok_or_else(|| ProbeError::out_of_range("local probe", i, self.probes.len()))
    }

    /// Global id of the probe at local index `i`.
    pub fn get_probe_id(&self, i: usize) -> Result<usize> {
        self.probes
            .get(i)
            .map(|(id, _)| *id)
            .ok_or_else(|| ProbeError::out_of_range("local probe", i, self.probes.len()))
    }

    /// Evaluate `field` at every local probe and append the results.
    ///
    /// Probes are evaluated independently (in parallel above
    /// `parallel_threshold`) and appended in local order. What happens when
    /// a probe cannot be evaluated depends on [`EvalErrorPolicy`]; under
    /// `Abort` nothing is appended and the evaluation count is unchanged.
    #[instrument(skip_all, fields(rank = self.rank, evaluation = self.num_evals))]
    pub fn eval<F>(&mut self, field: &F) -> Result<EvalReport>
    where
        F: Field + ?Sized,
    {
        if field.value_size() != self.value_size {
            return Err(ProbeError::DimensionMismatch {
                expected: self.value_size,
                got: field.value_size(),
            });
        }

        let evaluate = |(_, probe): &(usize, Probe)| field.evaluate(probe.coordinates());
        let staged: Vec<std::result::Result<Vec<f64>, FieldError>> =
            if self.probes.len() >= self.config.parallel_threshold {
                self.probes.par_iter().map(evaluate).collect()
            } else {
                self.probes.iter().map(evaluate).collect()
            };

        let mut skipped = Vec::new();
        for ((id, _), result) in self.probes.iter().zip(&staged) {
            match result {
                Ok(values) if values.len() != self.value_size => {
                    return Err(ProbeError::DimensionMismatch {
                        expected: self.value_size,
                        got: values.len(),
                    });
                }
                Ok(_) => {}
                Err(err) => match self.config.on_eval_error {
                    EvalErrorPolicy::Abort => {
                        return Err(ProbeError::Evaluation {
                            id: *id,
                            message: err.to_string(),
                        });
                    }
                    EvalErrorPolicy::SkipAndWarn => {
                        warn!(probe = *id, error = %err, "probe evaluation skipped");
                        skipped.push(*id);
                    }
                },
            }
        }

        for ((_, probe), result) in self.probes.iter_mut().zip(staged) {
            match result {
                Ok(values) => probe.append(values)?,
                Err(_) => probe.append_missing(),
            }
        }
        self.num_evals += 1;

        let report = EvalReport {
            evaluated: self.probes.len() - skipped.len(),
            skipped,
        };
        debug!(
            evaluated = report.evaluated,
            skipped = report.skipped.len(),
            "probes evaluated"
        );
        Ok(report)
    }

    /// Values of every local probe at evaluation `k`, in local order.
    pub fn snapshot(&self, k: usize) -> Result<Vec<(usize, &[f64])>> {
        if k >= self.num_evals {
            return Err(ProbeError::out_of_range("snapshot", k, self.num_evals));
        }
        self.probes
            .iter()
            .map(|(id, probe)| Ok((*id, probe.snapshot(k)?)))
            .collect()
    }

    /// Write component `component` of every local history to `sink`.
    pub fn dump<S>(&self, component: usize, name: &str, sink: &mut S) -> Result<()>
    where
        S: ProbeSink + ?Sized,
    {
        if component >= self.value_size {
            return Err(ProbeError::out_of_range(
                "component",
                component,
                self.value_size,
            ));
        }
        let rows = self
            .probes
            .iter()
            .map(|(id, probe)| {
                Ok(ProbeRow {
                    id: *id,
                    coordinates: probe.coordinates().to_vec(),
                    series: Series::Component {
                        index: component,
                        values: probe.component(component)?,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.write(name, rows, sink)
    }

    /// Write every component of every local history to `sink`.
    pub fn dump_all<S>(&self, name: &str, sink: &mut S) -> Result<()>
    where
        S: ProbeSink + ?Sized,
    {
        let rows = self
            .probes
            .iter()
            .map(|(id, probe)| ProbeRow {
                id: *id,
                coordinates: probe.coordinates().to_vec(),
                series: Series::Full(probe.history().to_vec()),
            })
            .collect();
        self.write(name, rows, sink)
    }

    fn write<S>(&self, name: &str, rows: Vec<ProbeRow>, sink: &mut S) -> Result<()>
    where
        S: ProbeSink + ?Sized,
    {
        let table = ProbeTable {
            rank: self.rank,
            value_size: self.value_size,
            evaluations: self.num_evals,
            rows,
        };
        sink.write_table(name, table)?;
        debug!(table = name, rank = self.rank, probes = self.probes.len(), "probes dumped");
        Ok(())
    }

    /// Remove evaluation `k` from every local probe.
    ///
    /// Either every probe loses entry `k` or, on error, none does.
    pub fn erase_snapshot(&mut self, k: usize) -> Result<()> {
        if k >= self.num_evals {
            return Err(ProbeError::out_of_range("snapshot", k, self.num_evals));
        }
        if let Some((_, probe)) = self
            .probes
            .iter()
            .find(|(_, probe)| probe.number_of_evaluations() <= k)
        {
            return Err(ProbeError::out_of_range(
                "snapshot",
                k,
                probe.number_of_evaluations(),
            ));
        }

        for (_, probe) in &mut self.probes {
            probe.erase_snapshot(k)?;
        }
        self.num_evals -= 1;
        debug!(snapshot = k, remaining = self.num_evals, "snapshot erased");
        Ok(())
    }

    /// Drop every history and reset the evaluation count.
    pub fn clear(&mut self) {
        for (_, probe) in &mut self.probes {
            probe.clear();
        }
        self.num_evals = 0;
        debug!(rank = self.rank, "probes cleared");
    }
}

//! fieldprobe-run - Sample an analytic field at probe points over several ranks
//!
//! Loads probe points, splits their bounding box into one slab per rank,
//! runs each rank on its own thread, evaluates a decaying scalar field for a
//! number of steps and dumps every rank's time series as JSON.

mod points;

use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::thread;

use clap::Parser;
use fieldprobe::{
    Communicator, EvalErrorPolicy, FieldError, FileSink, FileSinkConfig, FnField, ProbeCollection,
    ProbeConfig, ProbeError, ProbeSink, SlabPartition, ThreadComm,
};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::points::PointsError;

#[derive(Parser, Debug)]
#[command(name = "fieldprobe-run")]
#[command(about = "Probe an analytic field over in-process ranks and dump the time series")]
struct Cli {
    /// Path to a whitespace-separated point file (x y z per line)
    #[arg(long)]
    points: PathBuf,

    /// Number of in-process ranks
    #[arg(long, default_value = "1")]
    ranks: usize,

    /// Number of evaluations (time steps)
    #[arg(long, default_value = "10")]
    steps: usize,

    /// Time step size
    #[arg(long, default_value = "0.01")]
    dt: f64,

    /// Diffusivity of the decaying field
    #[arg(long, default_value = "0.1")]
    nu: f64,

    /// Output directory
    #[arg(long, default_value = "probes")]
    output: PathBuf,

    /// Optional JSON probe config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Record a missing value instead of aborting when a probe cannot be evaluated
    #[arg(long)]
    skip_failures: bool,
}

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Points(#[from] PointsError),

    #[error("failed to read config {path}: {message}")]
    Config { path: String, message: String },

    #[error("rank {rank}: {source}")]
    Rank {
        rank: usize,
        #[source]
        source: ProbeError,
    },

    #[error("invalid run: {0}")]
    Invalid(String),

    #[error("rank {0} panicked")]
    Panicked(usize),
}

/// What one rank did.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RankSummary {
    rank: usize,
    local: usize,
    total: usize,
    evaluations: usize,
    skipped: usize,
    output: Option<PathBuf>,
}

fn load_config(path: Option<&Path>, skip_failures: bool) -> Result<ProbeConfig, RunError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| RunError::Config {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            serde_json::from_str(&text).map_err(|e| RunError::Config {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        }
        None => ProbeConfig::default(),
    };
    if skip_failures {
        config.on_eval_error = EvalErrorPolicy::SkipAndWarn;
    }
    Ok(config)
}

/// Decaying mode `sin(pi x) cos(pi y) exp(-2 pi^2 nu t)`.
fn decaying_mode(
    t: f64,
    nu: f64,
) -> FnField<impl Fn(&[f64]) -> Result<Vec<f64>, FieldError> + Sync> {
    let decay = (-2.0 * PI * PI * nu * t).exp();
    FnField::new(1, move |p: &[f64]| {
        let value = (PI * p[0]).sin() * (PI * p[1]).cos() * decay;
        if value.is_finite() {
            Ok(vec![value])
        } else {
            Err(FieldError::Failed(format!("non-finite value at {p:?}")))
        }
    })
}

/// Padded bounding box of the points and the axis with the largest extent.
///
/// Every axis is padded by at least a few ulps of its coordinate magnitude, so
/// the box stays non-empty for a single point or a flat set far from the origin.
fn domain(points: &[[f64; 3]]) -> (Vec<f64>, Vec<f64>, usize) {
    let (lower, upper) = points::bounding_box(points);
    let mut axis = 0;
    for candidate in 1..3 {
        if upper[candidate] - lower[candidate] > upper[axis] - lower[axis] {
            axis = candidate;
        }
    }
    let pad = |i: usize| {
        let magnitude = lower[i].abs().max(upper[i].abs()).max(1.0);
        (1e-9 * (upper[i] - lower[i]).max(1.0)).max(16.0 * f64::EPSILON * magnitude)
    };
    (
        (0..3).map(|i| lower[i] - pad(i)).collect(),
        (0..3).map(|i| upper[i] + pad(i)).collect(),
        axis,
    )
}

fn run_rank(
    comm: &ThreadComm,
    points: &[[f64; 3]],
    cli: &Cli,
    config: ProbeConfig,
    run_id: &str,
) -> Result<RankSummary, ProbeError> {
    let (lower, upper, axis) = domain(points);
    let space = SlabPartition::new(lower, upper, axis, comm.rank(), comm.size(), 1).ok_or_else(
        || ProbeError::InvalidConfig("could not partition the probe domain".to_string()),
    )?;

    let mut probes = ProbeCollection::with_config(points, &space, comm, config)?;
    let mut skipped = 0;
    for step in 0..cli.steps {
        let field = decaying_mode(step as f64 * cli.dt, cli.nu);
        skipped += probes.eval(&field)?.skipped.len();
    }

    let mut sink = FileSink::new(FileSinkConfig {
        output_dir: cli.output.clone(),
        run_id: Some(run_id.to_string()),
        rank: comm.rank(),
    })?;
    probes.dump(0, "u", &mut sink)?;
    sink.close()?;

    Ok(RankSummary {
        rank: comm.rank(),
        local: probes.local_size(),
        total: probes.total_probe_count(),
        evaluations: probes.number_of_evaluations(),
        skipped,
        output: sink.output_path(),
    })
}

fn run(cli: &Cli, run_id: &str) -> Result<Vec<RankSummary>, RunError> {
    if cli.ranks == 0 {
        return Err(RunError::Invalid("--ranks must be >= 1".to_string()));
    }
    if !cli.dt.is_finite() || !cli.nu.is_finite() {
        return Err(RunError::Invalid("--dt and --nu must be finite".to_string()));
    }

    let points = points::load(&cli.points)?;
    let config = load_config(cli.config.as_deref(), cli.skip_failures)?;
    info!(points = points.len(), ranks = cli.ranks, steps = cli.steps, "probe run starting");

    let group = ThreadComm::group(cli.ranks);
    let results: Vec<Result<RankSummary, RunError>> = thread::scope(|s| {
        let handles: Vec<_> = group
            .iter()
            .map(|comm| {
                let points = &points;
                s.spawn(move || run_rank(comm, points, cli, config, run_id))
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| match handle.join() {
                Ok(result) => result.map_err(|source| RunError::Rank { rank, source }),
                Err(_) => Err(RunError::Panicked(rank)),
            })
            .collect()
    });

    results.into_iter().collect()
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldprobe=info,fieldprobe_run=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let run_id = format!("run_{}", std::process::id());

    match run(&cli, &run_id) {
        Ok(summaries) => {
            for summary in &summaries {
                info!(
                    rank = summary.rank,
                    local = summary.local,
                    total = summary.total,
                    evaluations = summary.evaluations,
                    skipped = summary.skipped,
                    output = ?summary.output,
                    "rank finished"
                );
            }
        }
        Err(e) => {
            error!("Probe run failed: {}", e);
            std::process::exit(1);
        }
    }
}

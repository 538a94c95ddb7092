//! Multi-rank scenarios for the probe crate.

use std::thread;

use crate::comm::{Communicator, SelfComm, ThreadComm};
use crate::config::{EvalErrorPolicy, ProbeConfig};
use crate::field::{FieldError, FnField, SlabPartition};
use crate::sink::{MemorySink, ProbeSink, Series};
use crate::{FileSink, FileSinkConfig, ProbeCollection, ProbeTable};

fn unit_box(comm: &ThreadComm, value_size: usize) -> SlabPartition {
    SlabPartition::new(
        vec![0.0, 0.0, 0.0],
        vec![1.0, 1.0, 1.0],
        0,
        comm.rank(),
        comm.size(),
        value_size,
    )
    .expect("valid partition")
}

/// Builds one collection per rank on its own thread and returns them in rank order.
fn build_on_ranks(ranks: usize, points: &[[f64; 3]], value_size: usize) -> Vec<ProbeCollection> {
    let group = ThreadComm::group(ranks);
    thread::scope(|s| {
        let handles: Vec<_> = group
            .iter()
            .map(|comm| {
                s.spawn(move || {
                    ProbeCollection::new(points, &unit_box(comm, value_size), comm)
                        .expect("construct")
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

fn time_field(t: f64) -> FnField<impl Fn(&[f64]) -> Result<Vec<f64>, FieldError> + Sync> {
    FnField::new(1, move |p: &[f64]| Ok(vec![p[0] + 10.0 * t]))
}

#[test]
fn local_sizes_sum_to_total() {
    let points = [
        [0.1, 0.5, 0.5],
        [0.6, 0.5, 0.5],
        [0.9, 0.1, 0.2],
        [0.3, 0.3, 0.3],
        [0.5, 0.5, 0.5],
        [1.0, 1.0, 1.0],
    ];
    for ranks in 1..=4 {
        let collections = build_on_ranks(ranks, &points, 1);
        let local_sum: usize = collections.iter().map(ProbeCollection::local_size).sum();
        assert_eq!(local_sum, points.len(), "ranks = {ranks}");
        for collection in &collections {
            assert_eq!(collection.total_probe_count(), points.len());
        }
    }
}

#[test]
fn point_outside_domain_is_dropped_and_never_double_counted() {
    // Three points inside the unit box, one outside everything.
    let points = [
        [0.2, 0.5, 0.5],
        [0.4, 0.5, 0.5],
        [5.0, 0.5, 0.5],
        [0.8, 0.5, 0.5],
    ];
    let collections = build_on_ranks(2, &points, 1);

    assert_eq!(collections[0].local_size(), 2);
    assert_eq!(collections[1].local_size(), 1);
    assert_eq!(collections[0].total_probe_count(), 3);
    assert_eq!(collections[1].total_probe_count(), 3);

    let mut ids: Vec<usize> = collections
        .iter()
        .flat_map(|c| c.probes().map(|(id, _)| id).collect::<Vec<_>>())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 3]);

    // Local index 0 on rank 1 is global id 3.
    assert_eq!(collections[1].get_probe_id(0).unwrap(), 3);
    assert_eq!(collections[1].rank(), 1);
}

#[test]
fn scalar_dump_emits_one_value_per_eval_in_call_order() {
    let points = [[0.25, 0.5, 0.5], [0.75, 0.5, 0.5], [0.5, 0.1, 0.1]];
    let mut collections = build_on_ranks(2, &points, 1);

    for step in 0..3 {
        for collection in &mut collections {
            collection.eval(&time_field(step as f64)).unwrap();
        }
    }

    for collection in &collections {
        let mut sink = MemorySink::new();
        collection.dump(0, "u", &mut sink).unwrap();
        let table = sink.table("u").unwrap();
        assert_eq!(table.rank, collection.rank());
        assert_eq!(table.rows.len(), collection.local_size());
        for row in &table.rows {
            let x = row.coordinates[0];
            assert_eq!(
                row.series,
                Series::Component {
                    index: 0,
                    values: vec![x, x + 10.0, x + 20.0]
                }
            );
        }
    }
}

#[test]
fn evaluation_runs_independently_per_rank() {
    let points = [[0.25, 0.5, 0.5], [0.75, 0.5, 0.5]];
    let group = ThreadComm::group(2);
    let counts: Vec<(usize, usize)> = thread::scope(|s| {
        let handles: Vec<_> = group
            .iter()
            .map(|comm| {
                s.spawn(move || {
                    let mut probes =
                        ProbeCollection::new(&points, &unit_box(comm, 1), comm).unwrap();
                    // Ranks evaluate a different number of times without talking.
                    for step in 0..=comm.rank() * 2 {
                        probes.eval(&time_field(step as f64)).unwrap();
                    }
                    (probes.local_size(), probes.number_of_evaluations())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(counts, vec![(1, 1), (1, 3)]);
}

#[test]
fn file_sink_writes_one_table_per_rank() {
    let temp_dir = tempfile::tempdir().unwrap();
    let points = [[0.25, 0.5, 0.5], [0.75, 0.5, 0.5]];
    let mut collections = build_on_ranks(2, &points, 1);

    for collection in &mut collections {
        collection.eval(&time_field(0.0)).unwrap();
        let mut sink = FileSink::new(FileSinkConfig {
            output_dir: temp_dir.path().to_path_buf(),
            run_id: Some("probes".to_string()),
            rank: collection.rank(),
        })
        .unwrap();
        collection.dump_all("u", &mut sink).unwrap();
        sink.close().unwrap();
    }

    for rank in 0..2 {
        let path = temp_dir.path().join(format!("probes/u_rank{rank}.json"));
        let table: ProbeTable =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(table.rank, rank);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].id, rank);
    }
}

#[test]
fn skipped_evaluations_read_back_from_file_sink_as_missing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let points = [[0.25, 0.5, 0.5], [0.75, 0.5, 0.5]];
    let space = SlabPartition::new(vec![0.0; 3], vec![1.0; 3], 0, 0, 1, 1).unwrap();
    let config = ProbeConfig {
        on_eval_error: EvalErrorPolicy::SkipAndWarn,
        ..ProbeConfig::default()
    };
    let mut collection = ProbeCollection::with_config(&points, &space, &SelfComm, config).unwrap();

    collection.eval(&time_field(0.0)).unwrap();
    let failing_right_half = FnField::new(1, |p: &[f64]| {
        if p[0] > 0.5 {
            Err(FieldError::Failed("no value".to_string()))
        } else {
            Ok(vec![p[0]])
        }
    });
    let report = collection.eval(&failing_right_half).unwrap();
    assert_eq!(report.skipped, vec![1]);
    collection.eval(&time_field(1.0)).unwrap();

    let mut sink = FileSink::new(FileSinkConfig {
        output_dir: temp_dir.path().to_path_buf(),
        run_id: Some("skips".to_string()),
        rank: 0,
    })
    .unwrap();
    collection.dump(0, "u", &mut sink).unwrap();
    collection.dump_all("all", &mut sink).unwrap();
    sink.close().unwrap();

    let read = |name: &str| -> ProbeTable {
        let path = sink.table_path(name);
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    };

    let table = read("u");
    assert_eq!(table.evaluations, 3);
    match &table.rows[1].series {
        Series::Component { values, .. } => {
            assert_eq!(values.len(), 3);
            assert_eq!((values[0], values[2]), (0.75, 10.75));
            assert!(values[1].is_nan());
        }
        other => panic!("unexpected series: {other:?}"),
    }
    match &table.rows[0].series {
        Series::Component { values, .. } => assert_eq!(values, &vec![0.25, 0.25, 10.25]),
        other => panic!("unexpected series: {other:?}"),
    }

    match &read("all").rows[1].series {
        Series::Full(history) => {
            assert_eq!(history.len(), 3);
            assert!(history[1].iter().all(|v| v.is_nan()));
        }
        other => panic!("unexpected series: {other:?}"),
    }
}

//! Every execution model must report the same multiset of matches for the
//! same inputs, and reject invalid shapes before generating anything.

use parcommon::parallel::{ExecutionModel, ProblemShape, ThreadBackend};
use parcommon::report::{CollectingSink, NullSink, SharedSink};
use parcommon::source::{DataSource, FixedSource, SeededSource};
use std::collections::HashSet;
use std::sync::Arc;

fn all_models(processes: usize, threads: usize) -> Vec<ExecutionModel> {
    vec![
        ExecutionModel::Sequential,
        ExecutionModel::SharedMemory {
            threads,
            backend: ThreadBackend::Scoped,
        },
        ExecutionModel::SharedMemory {
            threads,
            backend: ThreadBackend::Rayon,
        },
        ExecutionModel::Distributed { processes },
        ExecutionModel::Hybrid {
            processes,
            threads,
            backend: ThreadBackend::Scoped,
        },
        ExecutionModel::Hybrid {
            processes,
            threads,
            backend: ThreadBackend::Rayon,
        },
    ]
}

/// Reference answer: every element of array 1 found in array 2, duplicates kept
fn reference(array1: &[i32], array2: &[i32]) -> Vec<i32> {
    let lookup: HashSet<i32> = array2.iter().copied().collect();
    let mut matches: Vec<i32> = array1.iter().copied().filter(|v| lookup.contains(v)).collect();
    matches.sort_unstable();
    matches
}

fn run(model: ExecutionModel, shape: ProblemShape, source: &mut dyn DataSource) -> (Vec<i32>, u64) {
    let collector = Arc::new(CollectingSink::new());
    let sink: SharedSink = collector.clone();
    let summary = model.run(shape, source, &sink).unwrap();
    assert_eq!(collector.summaries().len(), 1, "{:?}", model);
    (collector.sorted_matches(), summary.report.matches)
}

#[test]
fn test_small_example_with_duplicates() {
    let shape = ProblemShape::new(5, 3).unwrap();
    for model in all_models(1, 2) {
        let mut source = FixedSource::new(vec![vec![3, 7, 2, 9, 3], vec![9, 4, 3]]);
        let (matches, count) = run(model, shape, &mut source);
        assert_eq!(matches, vec![3, 3, 9], "{:?}", model);
        assert_eq!(count, 3, "{:?}", model);
    }
}

#[test]
fn test_seeded_arrays_agree_with_reference() {
    const SEED: u64 = 42;
    const MAX_VALUE: i32 = 500;
    let shape = ProblemShape::new(2_000, 1_000).unwrap();

    let mut generator = SeededSource::new(SEED, MAX_VALUE);
    let array1 = generator.generate(shape.size1).unwrap();
    let array2 = generator.generate(shape.size2).unwrap();
    let expected = reference(&array1, &array2);
    assert!(!expected.is_empty());

    for model in all_models(4, 3) {
        let mut source = SeededSource::new(SEED, MAX_VALUE);
        let (matches, count) = run(model, shape, &mut source);
        assert_eq!(matches, expected, "{:?}", model);
        assert_eq!(count as usize, expected.len(), "{:?}", model);
    }
}

#[test]
fn test_no_matches_when_ranges_are_disjoint() {
    let shape = ProblemShape::new(8, 4).unwrap();
    for model in all_models(2, 3) {
        let mut source = FixedSource::new(vec![(1..=8).collect(), vec![-1, -2, -3, -4]]);
        let (matches, count) = run(model, shape, &mut source);
        assert!(matches.is_empty(), "{:?}", model);
        assert_eq!(count, 0);
    }
}

#[test]
fn test_more_threads_than_elements() {
    let shape = ProblemShape::new(3, 3).unwrap();
    let model = ExecutionModel::SharedMemory {
        threads: 8,
        backend: ThreadBackend::Scoped,
    };
    let mut source = FixedSource::new(vec![vec![1, 2, 3], vec![3, 2, 1]]);
    let (matches, _) = run(model, shape, &mut source);
    assert_eq!(matches, vec![1, 2, 3]);
}

#[test]
fn test_non_divisible_distributed_runs_are_rejected_up_front() {
    let shape = ProblemShape::new(10, 6).unwrap();
    let sink: SharedSink = Arc::new(NullSink);

    for model in [
        ExecutionModel::Distributed { processes: 3 },
        ExecutionModel::Hybrid {
            processes: 4,
            threads: 2,
            backend: ThreadBackend::Scoped,
        },
    ] {
        // an exhausted source errors with a protocol violation if touched
        let mut source = FixedSource::new(Vec::new());
        let err = model.run(shape, &mut source, &sink).unwrap_err();
        assert!(err.is_configuration(), "{:?}: {}", model, err);
    }
}

#[test]
fn test_elapsed_time_is_a_maximum_not_a_sum() {
    let shape = ProblemShape::new(4_000, 400).unwrap();
    let collector = Arc::new(CollectingSink::new());
    let sink: SharedSink = collector.clone();
    let mut source = SeededSource::new(7, 1_000);

    let summary = ExecutionModel::Hybrid {
        processes: 2,
        threads: 2,
        backend: ThreadBackend::Scoped,
    }
    .run(shape, &mut source, &sink)
    .unwrap();

    assert_eq!(summary.report.samples, 2);
    assert!(summary.report.slowest_worker < 2);
    assert!(summary.report.seconds() >= 0.0);
}

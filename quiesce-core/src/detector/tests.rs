//! Unit tests for the token-colour termination detector.

use std::{thread, time::Duration};

use rstest::{fixture, rstest};

use crate::{
    error::ConfigError,
    graph::{Graph, NodeId},
    harness::{ScriptedWork, WorkHarness, WorkUnit, run_worker},
    mst::build_spanning_tree,
    state::Color,
};

use super::{DetectorErrorCode, TerminationDetector, detect_termination};

/// Five nodes: root 0 with children 1 and 3, 2 under 1 and 4 under 2.
#[fixture]
fn tree() -> Graph {
    let mut graph = Graph::new();
    let ids: Vec<NodeId> = (1..=5).map(|label| graph.add_node(label)).collect();
    for (from, to, weight) in [(0, 1, 10), (0, 3, 20), (1, 2, 30), (2, 4, 40), (3, 4, 50)] {
        graph
            .add_edge(ids[from], ids[to], weight)
            .expect("endpoints exist");
    }
    build_spanning_tree(&mut graph).expect("graph is valid");
    graph
}

fn complete(graph: &Graph, id: NodeId, color: Color) {
    let mut state = graph
        .node(id)
        .expect("node exists")
        .cell()
        .lock(id)
        .expect("lock is healthy");
    state.completed = true;
    state.color = color;
}

fn complete_all(graph: &Graph) {
    for node in graph.nodes() {
        complete(graph, node.id(), Color::White);
    }
}

/// Panics while holding `id`'s lock so every later `lock` call fails.
fn poison(graph: &Graph, id: NodeId) {
    let cell = graph.node(id).expect("node exists").cell();
    let outcome = thread::scope(|scope| {
        scope
            .spawn(|| {
                let _guard = cell.lock(id).expect("lock is healthy");
                panic!("worker panicked while holding node lock");
            })
            .join()
    });
    assert!(outcome.is_err());
}

fn short() -> TerminationDetector {
    TerminationDetector::builder()
        .with_timeout(Duration::from_millis(150))
        .with_poll_interval(Duration::from_millis(5))
        .build()
        .expect("configuration is valid")
}

#[rstest]
fn clean_completion_terminates_in_one_wave(tree: Graph) {
    complete_all(&tree);
    let verdict = short().detect(&tree);

    assert!(verdict.terminated());
    assert!(!verdict.inconclusive());
    assert_eq!(verdict.reason(), None);
    assert_eq!(verdict.waves(), 1);
    assert_eq!(verdict.scans(), 1);
}

#[rstest]
#[case::leaf(4)]
#[case::inner(1)]
#[case::root(0)]
fn black_node_forces_a_second_wave(tree: Graph, #[case] black: usize) {
    complete_all(&tree);
    complete(&tree, NodeId::new(black), Color::Black);

    let verdict = short().detect(&tree);
    assert!(verdict.terminated());
    assert_eq!(verdict.waves(), 2);

    let snapshot = tree.snapshot().expect("locks are healthy");
    assert_eq!(snapshot.black, 0, "forwarding resets every node to white");
    assert_eq!(snapshot.tokens, 0, "every token was consumed");
}

#[rstest]
fn incomplete_node_times_out(tree: Graph) {
    complete_all(&tree);
    tree.node(NodeId::new(2))
        .expect("node exists")
        .cell()
        .lock(NodeId::new(2))
        .expect("lock is healthy")
        .completed = false;

    let verdict = short().detect(&tree);
    assert!(verdict.inconclusive());
    assert_eq!(verdict.reason(), Some(DetectorErrorCode::Timeout));
    assert!(verdict.elapsed() >= Duration::from_millis(150));
}

#[rstest]
fn zero_timeout_still_completes_an_unobstructed_wave(tree: Graph) {
    complete_all(&tree);
    let verdict = detect_termination(&tree, Duration::ZERO);
    assert!(verdict.terminated());
}

#[rstest]
fn unbuilt_tree_is_inconclusive() {
    let mut graph = Graph::new();
    graph.add_node(1);
    complete_all(&graph);

    let verdict = detect_termination(&graph, Duration::from_millis(50));
    assert!(verdict.inconclusive());
    assert_eq!(verdict.reason(), Some(DetectorErrorCode::TreeNotBuilt));
    assert_eq!(verdict.waves(), 0);
}

#[rstest]
fn disconnected_graph_is_inconclusive_without_waiting() {
    let mut graph = Graph::new();
    let a = graph.add_node(1);
    let b = graph.add_node(2);
    graph.add_node(3);
    graph.add_edge(a, b, 1).expect("endpoints exist");
    build_spanning_tree(&mut graph).expect("forest is valid");
    complete_all(&graph);

    let verdict = detect_termination(&graph, Duration::from_secs(5));
    assert!(verdict.inconclusive());
    assert_eq!(verdict.reason(), Some(DetectorErrorCode::Disconnected));
    assert!(verdict.elapsed() < Duration::from_secs(5));
}

#[rstest]
fn wave_budget_bounds_repeated_black_waves(tree: Graph) {
    complete_all(&tree);
    complete(&tree, NodeId::new(3), Color::Black);

    let detector = TerminationDetector::builder()
        .with_max_waves(1)
        .build()
        .expect("configuration is valid");
    let verdict = detector.detect(&tree);
    assert!(verdict.inconclusive());
    assert_eq!(verdict.reason(), Some(DetectorErrorCode::WaveLimit));
    assert_eq!(verdict.waves(), 1);
}

#[rstest]
fn scan_budget_bounds_stalled_waves(tree: Graph) {
    let detector = TerminationDetector::builder()
        .with_max_scans(3)
        .with_poll_interval(Duration::from_millis(1))
        .build()
        .expect("configuration is valid");
    let verdict = detector.detect(&tree);
    assert!(verdict.inconclusive());
    assert_eq!(verdict.reason(), Some(DetectorErrorCode::ScanLimit));
    assert_eq!(verdict.scans(), 3);
}

#[rstest]
fn late_dirty_worker_forces_another_wave(tree: Graph) {
    let late = NodeId::new(4);
    for node in tree.nodes().iter().filter(|node| node.id() != late) {
        complete(&tree, node.id(), Color::White);
    }

    let detector = TerminationDetector::builder()
        .with_timeout(Duration::from_secs(5))
        .build()
        .expect("configuration is valid");
    let work = ScriptedWork::new(WorkUnit::dirty(Duration::from_millis(30)));

    let verdict = thread::scope(|scope| {
        let detection = scope.spawn(|| detector.detect(&tree));
        run_worker(&tree, late, &work).expect("worker succeeds");
        detection.join().expect("detector thread must not panic")
    });

    assert!(verdict.terminated());
    assert!(verdict.waves() >= 2, "the black leaf must spoil the first wave");
}

#[rstest]
fn detection_alongside_running_workers_terminates(tree: Graph) {
    let work = ScriptedWork::new(WorkUnit::dirty_with_message(Duration::from_millis(5), 1))
        .with_unit(NodeId::new(0), WorkUnit::clean(Duration::from_millis(20)));
    let harness = WorkHarness::builder().build().expect("defaults are valid");
    let detector = TerminationDetector::builder()
        .with_timeout(Duration::from_secs(10))
        .build()
        .expect("configuration is valid");

    let verdict = thread::scope(|scope| {
        let detection = scope.spawn(|| detector.detect(&tree));
        harness.run(&tree, &work).expect("workers succeed");
        detection.join().expect("detector thread must not panic")
    });

    assert!(verdict.terminated());
    let snapshot = tree.snapshot().expect("locks are healthy");
    assert!(snapshot.all_completed());
    assert_eq!(snapshot.black, 0, "a terminated verdict leaves no dirty node");
    assert_eq!(snapshot.tokens, 0, "a terminated verdict leaves no token");
}

#[rstest]
#[case::leaf(4)]
#[case::inner(2)]
#[case::root(0)]
fn poisoned_node_lock_is_inconclusive(tree: Graph, #[case] poisoned: usize) {
    complete_all(&tree);
    poison(&tree, NodeId::new(poisoned));

    let verdict = detect_termination(&tree, Duration::from_millis(100));
    assert!(verdict.inconclusive());
    assert_eq!(verdict.reason(), Some(DetectorErrorCode::LockPoisoned));
    assert!(verdict.waves() <= 1, "{verdict:?}");
    assert!(verdict.elapsed() < Duration::from_millis(100));
}

#[rstest]
#[case::waves(TerminationDetector::builder().with_max_waves(0), "max_waves")]
#[case::scans(TerminationDetector::builder().with_max_scans(0), "max_scans")]
#[case::poll(
    TerminationDetector::builder().with_poll_interval(Duration::ZERO),
    "poll_interval"
)]
fn builder_rejects_zero_limits(#[case] builder: super::DetectorBuilder, #[case] parameter: &str) {
    let err = builder.build().expect_err("zero limits must be rejected");
    assert!(matches!(err, ConfigError::ZeroLimit { parameter: got } if got == parameter));
}

#[rstest]
fn error_codes_are_stable() {
    assert_eq!(DetectorErrorCode::Timeout.as_str(), "DETECTOR_TIMEOUT");
    assert_eq!(DetectorErrorCode::Disconnected.as_str(), "DETECTOR_DISCONNECTED");
    assert_eq!(DetectorErrorCode::LockPoisoned.as_str(), "DETECTOR_LOCK_POISONED");
}

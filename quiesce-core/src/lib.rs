//! Quiesce core library.
//!
//! Builds a minimum spanning tree over a weighted graph of nodes, runs one
//! concurrent worker per node, and detects global quiescence by circulating
//! coloured tokens up the tree.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod detector;
mod error;
mod graph;
mod harness;
mod mst;
mod signal;
mod state;
mod telemetry;

pub use crate::{
    detector::{
        DetectorBuilder, DetectorError, DetectorErrorCode, TerminationDetector, Verdict,
        detect_termination,
    },
    error::{
        ConfigError, ConfigErrorCode, GraphError, GraphErrorCode, StateError, StateErrorCode,
    },
    graph::{Edge, EdgeId, Graph, Node, NodeId, Snapshot},
    harness::{
        HarnessBuilder, HarnessError, HarnessErrorCode, HarnessReport, ScriptedWork, SeededWork,
        SeededWorkBuilder, WorkHarness, WorkSource, WorkUnit, WorkerReport, run_worker,
    },
    mst::{SpanningTree, TreeEdge, TreeError, TreeErrorCode, build_spanning_tree},
    signal::{CompletionSignal, Progress},
    state::{Color, NodeCell, NodeState},
};

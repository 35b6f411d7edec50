//! Concurrent work harness: one independent task per node.
//!
//! Each worker marks its node active, performs its simulated unit of work,
//! optionally dirties one neighbour, then records completion under its own
//! node lock and fires the node's one-shot completion signal. A worker never
//! holds more than one node lock at a time.

mod work;

use std::{num::NonZeroUsize, thread, time::Duration};

use rayon::{ThreadPoolBuilder, prelude::*};
use tracing::{debug, info, instrument};

use crate::{
    error::{ConfigError, StateError, define_error_codes},
    graph::{Graph, NodeId},
    state::Color,
    telemetry,
};

pub use self::work::{ScriptedWork, SeededWork, SeededWorkBuilder, WorkSource, WorkUnit};

/// Errors surfaced by worker tasks.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HarnessError {
    /// The worker was asked to run for a node that does not exist.
    #[error("cannot run a worker for unknown {node}")]
    UnknownNode {
        /// The missing node.
        node: NodeId,
    },
    /// A node lock was poisoned by a panicking holder.
    #[error("{source}")]
    State {
        /// Underlying lock failure.
        #[from]
        source: StateError,
    },
    /// The worker thread pool could not be created.
    #[error("failed to build worker pool: {reason}")]
    PoolBuild {
        /// Description reported by the pool builder.
        reason: String,
    },
}

define_error_codes! {
    /// Stable codes describing [`HarnessError`] variants.
    enum HarnessErrorCode for HarnessError {
        /// The worker was asked to run for a node that does not exist.
        UnknownNode => UnknownNode { .. } => "HARNESS_UNKNOWN_NODE",
        /// A node lock was poisoned by a panicking holder.
        LockPoisoned => State { .. } => "HARNESS_LOCK_POISONED",
        /// The worker thread pool could not be created.
        PoolBuild => PoolBuild { .. } => "HARNESS_POOL_BUILD",
    }
}

/// What a single worker did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkerReport {
    node: NodeId,
    worked_for: Duration,
    dirty: bool,
    dirtied: Option<NodeId>,
    first_signal: bool,
}

impl WorkerReport {
    /// Node the worker ran for.
    #[must_use]
    #[rustfmt::skip]
    pub const fn node(&self) -> NodeId { self.node }

    /// Simulated work duration.
    #[must_use]
    #[rustfmt::skip]
    pub const fn worked_for(&self) -> Duration { self.worked_for }

    /// Whether the node finished black.
    #[must_use]
    #[rustfmt::skip]
    pub const fn dirty(&self) -> bool { self.dirty }

    /// Neighbour that received a dirty message, if any.
    #[must_use]
    #[rustfmt::skip]
    pub const fn dirtied(&self) -> Option<NodeId> { self.dirtied }

    /// `false` when the node's completion signal had already fired.
    #[must_use]
    #[rustfmt::skip]
    pub const fn first_signal(&self) -> bool { self.first_signal }
}

/// Aggregate result of running every worker.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HarnessReport {
    workers: Vec<WorkerReport>,
}

impl HarnessReport {
    /// Per-worker reports in node order.
    #[must_use]
    #[rustfmt::skip]
    pub fn workers(&self) -> &[WorkerReport] { &self.workers }

    /// Number of nodes that finished black.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.workers.iter().filter(|report| report.dirty).count()
    }

    /// Number of dirty messages delivered to neighbours.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|report| report.dirtied.is_some())
            .count()
    }
}

/// Runs the worker for a single node on the calling thread.
///
/// The node's [`crate::CompletionSignal`] is reachable through
/// `graph.node(node)` and fires once this call has recorded completion.
/// A repeat run on a node that has already completed leaves its state alone:
/// even a dirty unit sends no message and does not recolour the node. Its
/// duplicate signal is absorbed and reported through
/// [`WorkerReport::first_signal`].
///
/// # Errors
/// Returns [`HarnessError::UnknownNode`] when `node` is not in `graph` and
/// [`HarnessError::State`] when a node lock is poisoned.
#[instrument(level = "debug", name = "harness.worker", skip(graph, source), fields(node = %node))]
pub fn run_worker<W>(graph: &Graph, node: NodeId, source: &W) -> Result<WorkerReport, HarnessError>
where
    W: WorkSource + ?Sized,
{
    let target = graph.node(node).ok_or(HarnessError::UnknownNode { node })?;
    let repeat = {
        let mut state = target.cell().lock(node)?;
        if !state.completed {
            state.active = true;
        }
        state.completed
    };

    let unit = source.unit_for(target);
    debug!(
        duration_ms = unit.duration().as_millis(),
        dirty = unit.is_dirty(),
        "worker starting"
    );
    thread::sleep(unit.duration());

    // Dirty the neighbour before completing so a completed node never emits
    // further dirty signals.
    let dirty = unit.is_dirty() && !repeat;
    let dirtied = match unit.message() {
        Some(pick) if dirty => send_dirty_message(graph, node, pick)?,
        _ => None,
    };

    if repeat {
        debug!("node already completed; state left unchanged");
    } else {
        let mut state = target.cell().lock(node)?;
        state.completed = true;
        state.active = false;
        if dirty {
            state.color = Color::Black;
        }
    }
    let first_signal = target.cell().signal().fire();
    if !first_signal {
        debug!("duplicate completion signal absorbed");
    }
    graph.progress().bump();

    Ok(WorkerReport {
        node,
        worked_for: unit.duration(),
        dirty,
        dirtied,
        first_signal,
    })
}

/// Flips one eligible neighbour of `sender` from white to black.
fn send_dirty_message(graph: &Graph, sender: NodeId, pick: u64) -> Result<Option<NodeId>, HarnessError> {
    let parent = graph.node(sender).and_then(|node| node.parent());
    let candidates: Vec<NodeId> = graph
        .neighbours(sender)
        .filter(|neighbour| Some(*neighbour) != parent)
        .collect();
    let Some(len) = u64::try_from(candidates.len()).ok().filter(|len| *len > 0) else {
        return Ok(None);
    };
    let slot = usize::try_from(pick % len).unwrap_or_default();
    let Some(&recipient) = candidates.get(slot) else {
        return Ok(None);
    };
    let Some(target) = graph.node(recipient) else {
        return Ok(None);
    };

    {
        let mut state = target.cell().lock(recipient)?;
        if state.color == Color::White {
            state.color = Color::Black;
        }
    }
    graph.progress().bump();
    telemetry::record_dirty_message();
    debug!(sender = %sender, recipient = %recipient, "dirty message delivered");
    Ok(Some(recipient))
}

/// Runs one worker per node in parallel on a dedicated rayon pool.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use quiesce_core::{Graph, ScriptedWork, WorkHarness, WorkUnit};
///
/// let mut graph = Graph::new();
/// graph.add_node(1);
/// graph.add_node(2);
/// let harness = WorkHarness::builder().build().expect("defaults are valid");
/// let report = harness
///     .run(&graph, &ScriptedWork::new(WorkUnit::clean(Duration::ZERO)))
///     .expect("workers succeed");
/// assert_eq!(report.workers().len(), 2);
/// assert!(graph.snapshot().expect("locks are healthy").all_completed());
/// ```
#[derive(Clone, Debug)]
pub struct WorkHarness {
    max_threads: Option<NonZeroUsize>,
}

impl WorkHarness {
    /// Starts a builder populated with defaults.
    #[must_use]
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Maximum worker threads; `None` means one per node.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max_threads(&self) -> Option<NonZeroUsize> { self.max_threads }

    /// Runs every node's worker and waits for all of them.
    ///
    /// # Errors
    /// Returns [`HarnessError::PoolBuild`] if the pool cannot be created, or
    /// the first worker error encountered.
    #[instrument(name = "harness.run", err, skip(self, graph, source), fields(nodes = graph.len()))]
    pub fn run<W>(&self, graph: &Graph, source: &W) -> Result<HarnessReport, HarnessError>
    where
        W: WorkSource + ?Sized,
    {
        let per_node = graph.len().max(1);
        let threads = self
            .max_threads
            .map_or(per_node, |cap| per_node.min(cap.get()));
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("quiesce-worker-{index}"))
            .build()
            .map_err(|err| HarnessError::PoolBuild {
                reason: err.to_string(),
            })?;

        let workers = pool.install(|| {
            graph
                .nodes()
                .par_iter()
                .with_max_len(1)
                .map(|node| run_worker(graph, node.id(), source))
                .collect::<Result<Vec<_>, _>>()
        })?;

        let report = HarnessReport { workers };
        info!(
            threads,
            dirty = report.dirty_count(),
            messages = report.message_count(),
            "all workers finished"
        );
        Ok(report)
    }
}

/// Configures [`WorkHarness`].
#[derive(Clone, Debug, Default)]
pub struct HarnessBuilder {
    max_threads: Option<usize>,
}

impl HarnessBuilder {
    /// Caps the number of worker threads.
    #[must_use]
    pub const fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = Some(max_threads);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::ZeroLimit`] when the thread cap is zero.
    pub fn build(self) -> Result<WorkHarness, ConfigError> {
        let max_threads = self
            .max_threads
            .map(|cap| {
                NonZeroUsize::new(cap).ok_or(ConfigError::ZeroLimit {
                    parameter: "max_threads",
                })
            })
            .transpose()?;
        Ok(WorkHarness { max_threads })
    }
}

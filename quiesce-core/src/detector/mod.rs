//! Token-colour termination detection over the spanning tree.
//!
//! A wave hands every node a white token. During a scan, a node that has
//! completed its work and whose children have all completed and forwarded
//! their tokens forwards its own token to its parent. The outgoing colour is
//! black when either the node or the token it holds is black, and black
//! dominates white when merged into the parent's token. Forwarding resets
//! the sender to white.
//!
//! When the root forwards, the wave ends: a white token means no dirty
//! signal is outstanding and termination is declared; a black token starts a
//! fresh wave. Exceeding the configured time, wave or scan budget yields an
//! inconclusive [`Verdict`] instead of blocking forever.
//!
//! Locks are taken strictly one node at a time.

mod ledger;

use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, instrument, trace, warn};

use crate::{
    error::{ConfigError, StateError, define_error_codes},
    graph::{Graph, Node, NodeId},
    state::Color,
    telemetry,
};

use self::ledger::WaveLedger;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_WAVES: usize = 64;
const DEFAULT_MAX_SCANS: usize = 1_000_000;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Reasons a detection run ends without declaring termination.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DetectorError {
    /// The time budget ran out.
    #[error("termination not detected within {budget:?}")]
    Timeout {
        /// The configured time budget.
        budget: Duration,
    },
    /// Too many waves ended black.
    #[error("termination not detected within {limit} waves")]
    WaveLimit {
        /// The configured wave budget.
        limit: usize,
    },
    /// Too many scans were needed.
    #[error("termination not detected within {limit} scans")]
    ScanLimit {
        /// The configured scan budget.
        limit: usize,
    },
    /// Some nodes are not reachable from the root.
    #[error("only {reachable} of {nodes} nodes are reachable from the root")]
    Disconnected {
        /// Nodes reachable from the designated root.
        reachable: usize,
        /// Nodes in the graph.
        nodes: usize,
    },
    /// Detection needs parent/children links.
    #[error("the spanning tree has not been built")]
    TreeNotBuilt,
    /// A topology link named a missing node.
    #[error("tree link references unknown {node}")]
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
}

define_error_codes! {
    /// Stable codes describing [`DetectorError`] variants.
    enum DetectorErrorCode for DetectorError {
        /// The time budget ran out.
        Timeout => Timeout { .. } => "DETECTOR_TIMEOUT",
        /// Too many waves ended black.
        WaveLimit => WaveLimit { .. } => "DETECTOR_WAVE_LIMIT",
        /// Too many scans were needed.
        ScanLimit => ScanLimit { .. } => "DETECTOR_SCAN_LIMIT",
        /// Some nodes are not reachable from the root.
        Disconnected => Disconnected { .. } => "DETECTOR_DISCONNECTED",
        /// Detection needs parent/children links.
        TreeNotBuilt => TreeNotBuilt => "DETECTOR_TREE_NOT_BUILT",
        /// A topology link named a missing node.
        UnknownNode => UnknownNode { .. } => "DETECTOR_UNKNOWN_NODE",
        /// A node lock was poisoned by a panicking holder.
        LockPoisoned => State { .. } => "DETECTOR_LOCK_POISONED",
    }
}

/// Outcome of a detection run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    terminated: bool,
    reason: Option<DetectorErrorCode>,
    waves: usize,
    scans: usize,
    elapsed: Duration,
}

impl Verdict {
    /// Global quiescence was reached: the root received a white token.
    #[must_use]
    #[rustfmt::skip]
    pub const fn terminated(&self) -> bool { self.terminated }

    /// Detection gave up without a conclusion.
    #[must_use]
    #[rustfmt::skip]
    pub const fn inconclusive(&self) -> bool { !self.terminated }

    /// Why detection was inconclusive.
    #[must_use]
    #[rustfmt::skip]
    pub const fn reason(&self) -> Option<DetectorErrorCode> { self.reason }

    /// Waves started, including the final one.
    #[must_use]
    #[rustfmt::skip]
    pub const fn waves(&self) -> usize { self.waves }

    /// Scans performed across all waves.
    #[must_use]
    #[rustfmt::skip]
    pub const fn scans(&self) -> usize { self.scans }

    /// Wall-clock time spent detecting.
    #[must_use]
    #[rustfmt::skip]
    pub const fn elapsed(&self) -> Duration { self.elapsed }
}

#[derive(Debug, Default)]
struct Tally {
    waves: usize,
    scans: usize,
}

/// Coordinator running the token-propagation protocol.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use quiesce_core::{Graph, ScriptedWork, TerminationDetector, WorkHarness, WorkUnit, build_spanning_tree};
///
/// let mut graph = Graph::new();
/// let a = graph.add_node(1);
/// let b = graph.add_node(2);
/// graph.add_edge(a, b, 1).expect("endpoints exist");
/// build_spanning_tree(&mut graph).expect("graph is valid");
///
/// WorkHarness::builder()
///     .build()
///     .expect("defaults are valid")
///     .run(&graph, &ScriptedWork::new(WorkUnit::clean(Duration::ZERO)))
///     .expect("workers succeed");
///
/// let detector = TerminationDetector::builder()
///     .with_timeout(Duration::from_secs(1))
///     .build()
///     .expect("configuration is valid");
/// let verdict = detector.detect(&graph);
/// assert!(verdict.terminated());
/// assert_eq!(verdict.waves(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminationDetector {
    timeout: Duration,
    max_waves: usize,
    max_scans: usize,
    poll_interval: Duration,
}

impl Default for TerminationDetector {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

impl TerminationDetector {
    /// Starts a builder populated with defaults.
    #[must_use]
    pub fn builder() -> DetectorBuilder {
        DetectorBuilder::default()
    }

    /// Default limits with the given time budget.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            max_waves: DEFAULT_MAX_WAVES,
            max_scans: DEFAULT_MAX_SCANS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Time budget for one detection run.
    #[must_use]
    #[rustfmt::skip]
    pub const fn timeout(&self) -> Duration { self.timeout }

    /// Maximum number of waves.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max_waves(&self) -> usize { self.max_waves }

    /// Maximum number of scans across all waves.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max_scans(&self) -> usize { self.max_scans }

    /// Longest single sleep while waiting for node progress.
    #[must_use]
    #[rustfmt::skip]
    pub const fn poll_interval(&self) -> Duration { self.poll_interval }

    /// Runs detection waves until the root sees a white token or a budget is
    /// exhausted.
    ///
    /// Never panics and never blocks beyond the time budget plus one poll
    /// interval; every failure degrades to an inconclusive [`Verdict`].
    #[instrument(
        name = "detector.detect",
        skip(self, graph),
        fields(
            nodes = graph.len(),
            timeout_ms = self.timeout.as_millis(),
            max_waves = self.max_waves,
        ),
    )]
    pub fn detect(&self, graph: &Graph) -> Verdict {
        let started = Instant::now();
        let mut tally = Tally::default();
        let outcome = self.run_waves(graph, started, &mut tally);
        let elapsed = started.elapsed();

        match outcome {
            Ok(()) => {
                info!(
                    waves = tally.waves,
                    scans = tally.scans,
                    "termination detected"
                );
                telemetry::record_verdict("terminated");
                Verdict {
                    terminated: true,
                    reason: None,
                    waves: tally.waves,
                    scans: tally.scans,
                    elapsed,
                }
            }
            Err(err) => {
                warn!(
                    error = %err,
                    code = %err.code(),
                    waves = tally.waves,
                    scans = tally.scans,
                    "termination detection inconclusive"
                );
                telemetry::record_verdict("inconclusive");
                Verdict {
                    terminated: false,
                    reason: Some(err.code()),
                    waves: tally.waves,
                    scans: tally.scans,
                    elapsed,
                }
            }
        }
    }

    fn run_waves(
        &self,
        graph: &Graph,
        started: Instant,
        tally: &mut Tally,
    ) -> Result<(), DetectorError> {
        if !graph.is_tree_built() {
            return Err(DetectorError::TreeNotBuilt);
        }
        let root = graph.root().ok_or(DetectorError::TreeNotBuilt)?;
        let order = graph.bottom_up_order();
        if order.len() != graph.len() {
            return Err(DetectorError::Disconnected {
                reachable: order.len(),
                nodes: graph.len(),
            });
        }
        let deadline = started.checked_add(self.timeout);

        loop {
            if tally.waves >= self.max_waves {
                return Err(DetectorError::WaveLimit {
                    limit: self.max_waves,
                });
            }
            tally.waves += 1;
            telemetry::record_wave();

            let span = info_span!("detector.wave", wave = tally.waves);
            let _entered = span.enter();
            match self.run_wave(graph, root, &order, deadline, tally)? {
                Color::White => return Ok(()),
                Color::Black => debug!("black token reached the root; starting a fresh wave"),
            }
        }
    }

    fn run_wave(
        &self,
        graph: &Graph,
        root: NodeId,
        order: &[NodeId],
        deadline: Option<Instant>,
        tally: &mut Tally,
    ) -> Result<Color, DetectorError> {
        let mut ledger = WaveLedger::start(graph, order)?;

        loop {
            if tally.scans >= self.max_scans {
                return Err(DetectorError::ScanLimit {
                    limit: self.max_scans,
                });
            }
            tally.scans += 1;

            let seen = graph.progress().generation();
            let (propagated, verdict) = scan(graph, root, &mut ledger)?;
            telemetry::record_propagations(propagated);
            if let Some(color) = verdict {
                return Ok(color);
            }

            let remaining = match deadline {
                Some(deadline) => deadline
                    .checked_duration_since(Instant::now())
                    .filter(|left| !left.is_zero())
                    .ok_or(DetectorError::Timeout {
                        budget: self.timeout,
                    })?,
                None => self.poll_interval,
            };
            if propagated == 0 {
                trace!(
                    pending = ledger.remaining(),
                    "scan made no progress; waiting for node updates"
                );
                graph
                    .progress()
                    .wait_past(seen, remaining.min(self.poll_interval));
            }
        }
    }
}

/// One pass over the current token holders, children before parents.
///
/// Returns how many tokens moved and, if the root forwarded, its colour.
fn scan(
    graph: &Graph,
    root: NodeId,
    ledger: &mut WaveLedger,
) -> Result<(usize, Option<Color>), DetectorError> {
    let mut propagated = 0;
    for id in ledger.pending() {
        let node = lookup(graph, id)?;
        if !children_settled(graph, node)? {
            continue;
        }
        let Some(outgoing) = forward_token(node)? else {
            continue;
        };
        ledger.retire(id);
        propagated += 1;

        match node.parent() {
            Some(parent) => deliver(graph, parent, outgoing)?,
            None if id == root => {
                debug!(color = outgoing.as_str(), "root forwarded its token");
                return Ok((propagated, Some(outgoing)));
            }
            None => {
                return Err(DetectorError::Disconnected {
                    reachable: graph.bottom_up_order().len(),
                    nodes: graph.len(),
                });
            }
        }
    }
    Ok((propagated, None))
}

fn lookup(graph: &Graph, id: NodeId) -> Result<&Node, DetectorError> {
    graph
        .node(id)
        .ok_or(DetectorError::UnknownNode { node: id })
}

/// Every child has completed and forwarded its token. Each child lock is
/// released before the next is taken.
fn children_settled(graph: &Graph, node: &Node) -> Result<bool, DetectorError> {
    for &child in node.children() {
        let state = lookup(graph, child)?.cell().read(child)?;
        if !state.completed || state.token.is_some() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Takes the node's token if it has completed, returning the outgoing
/// colour and resetting the node to white.
fn forward_token(node: &Node) -> Result<Option<Color>, StateError> {
    let mut state = node.cell().lock(node.id())?;
    if !state.completed {
        return Ok(None);
    }
    let Some(token) = state.token else {
        return Ok(None);
    };
    let outgoing = token.merge(state.color);
    state.color = Color::White;
    state.token = None;
    Ok(Some(outgoing))
}

/// Merges `color` into the parent's token; black dominates.
fn deliver(graph: &Graph, parent: NodeId, color: Color) -> Result<(), DetectorError> {
    let mut state = lookup(graph, parent)?.cell().lock(parent)?;
    state.token = Some(state.token.map_or(color, |held| held.merge(color)));
    Ok(())
}

/// Runs detection with default wave and scan limits.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use quiesce_core::{Graph, build_spanning_tree, detect_termination};
///
/// let mut graph = Graph::new();
/// graph.add_node(1);
/// build_spanning_tree(&mut graph).expect("graph is valid");
///
/// // Nothing has completed, so detection times out.
/// let verdict = detect_termination(&graph, Duration::from_millis(20));
/// assert!(verdict.inconclusive());
/// ```
#[must_use]
pub fn detect_termination(graph: &Graph, timeout: Duration) -> Verdict {
    TerminationDetector::with_timeout(timeout).detect(graph)
}

/// Configures and validates [`TerminationDetector`].
#[derive(Clone, Debug)]
pub struct DetectorBuilder {
    timeout: Duration,
    max_waves: usize,
    max_scans: usize,
    poll_interval: Duration,
}

impl Default for DetectorBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_waves: DEFAULT_MAX_WAVES,
            max_scans: DEFAULT_MAX_SCANS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl DetectorBuilder {
    /// Overrides the time budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the wave budget.
    #[must_use]
    pub const fn with_max_waves(mut self, max_waves: usize) -> Self {
        self.max_waves = max_waves;
        self
    }

    /// Overrides the scan budget.
    #[must_use]
    pub const fn with_max_scans(mut self, max_scans: usize) -> Self {
        self.max_scans = max_scans;
        self
    }

    /// Overrides the longest single wait between stalled scans.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::ZeroLimit`] when the wave budget, scan budget or
    /// poll interval is zero.
    pub fn build(self) -> Result<TerminationDetector, ConfigError> {
        if self.max_waves == 0 {
            return Err(ConfigError::ZeroLimit {
                parameter: "max_waves",
            });
        }
        if self.max_scans == 0 {
            return Err(ConfigError::ZeroLimit {
                parameter: "max_scans",
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroLimit {
                parameter: "poll_interval",
            });
        }
        Ok(TerminationDetector {
            timeout: self.timeout,
            max_waves: self.max_waves,
            max_scans: self.max_scans,
            poll_interval: self.poll_interval,
        })
    }
}

#[cfg(test)]
mod tests;

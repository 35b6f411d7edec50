//! Command implementations and argument parsing for the quiesce CLI.

use std::{
    io::{self, Write},
    thread,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use quiesce_core::{
    ConfigError, GraphError, HarnessError, HarnessReport, SeededWork, Snapshot, SpanningTree,
    StateError, TerminationDetector, TreeError, Verdict, WorkHarness, build_spanning_tree,
};
use thiserror::Error;
use tracing::{Span, field, info, instrument, warn};

use crate::{
    render::{label_of, render_tree},
    topology::Topology,
};

const DEFAULT_SEED: u64 = 0;
const DEFAULT_MAX_WORK_MS: u64 = 50;
const DEFAULT_DIRTY_PROBABILITY: f64 = 0.5;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_WAVES: usize = 64;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "quiesce",
    about = "Run concurrent workers over a spanning tree and detect termination."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build the spanning tree, run every worker and detect termination.
    Run(RunCommand),
}

/// Options accepted by the `run` command.
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Built-in graph to run against.
    #[arg(long, value_enum, default_value_t = Topology::Demo)]
    pub topology: Topology,

    /// Base seed for the per-node work plans.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Upper bound on each worker's simulated work, in milliseconds.
    #[arg(long = "max-work-ms", default_value_t = DEFAULT_MAX_WORK_MS)]
    pub max_work_ms: u64,

    /// Probability that a worker finishes dirty and messages a neighbour.
    #[arg(long = "dirty-probability", default_value_t = DEFAULT_DIRTY_PROBABILITY)]
    pub dirty_probability: f64,

    /// Time budget for detection, in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Maximum number of detection waves.
    #[arg(long = "max-waves", default_value_t = DEFAULT_MAX_WAVES)]
    pub max_waves: usize,

    /// Print the spanning tree with each node's final colour.
    #[arg(long)]
    pub tree: bool,
}

impl Default for RunCommand {
    fn default() -> Self {
        Self {
            topology: Topology::Demo,
            seed: DEFAULT_SEED,
            max_work_ms: DEFAULT_MAX_WORK_MS,
            dirty_probability: DEFAULT_DIRTY_PROBABILITY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_waves: DEFAULT_MAX_WAVES,
            tree: false,
        }
    }
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The topology could not be assembled.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The spanning tree could not be built.
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// A worker failed.
    #[error(transparent)]
    Harness(#[from] HarnessError),
    /// A command-line value was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Node state could not be read for the summary.
    #[error(transparent)]
    State(#[from] StateError),
    /// The detector thread panicked.
    #[error("termination detector thread panicked")]
    DetectorPanicked,
}

impl CliError {
    /// Stable code of the underlying library error, if any.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::Graph(err) => Some(err.code().as_str()),
            Self::Tree(err) => Some(err.code().as_str()),
            Self::Harness(err) => Some(err.code().as_str()),
            Self::Config(err) => Some(err.code().as_str()),
            Self::State(err) => Some(err.code().as_str()),
            Self::DetectorPanicked => None,
        }
    }
}

/// Summarises one `run` invocation.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Topology that was run.
    pub topology: Topology,
    /// Base seed of the work plans.
    pub seed: u64,
    /// Label of the detection root.
    pub root: String,
    /// Spanning tree selected over the topology.
    pub tree: SpanningTree,
    /// What the workers did.
    pub workers: HarnessReport,
    /// Outcome of termination detection.
    pub verdict: Verdict,
    /// Node census taken after detection finished.
    pub census: Snapshot,
    /// Rendered tree, when requested with `--tree`.
    pub tree_lines: Option<Vec<String>>,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when the graph, tree, workers or configuration fail.
/// An inconclusive verdict is not an error; it is reported in the summary.
///
/// # Examples
/// ```
/// use quiesce_cli::cli::{Cli, Command, RunCommand, run_cli};
/// use quiesce_cli::topology::Topology;
///
/// let cli = Cli {
///     command: Command::Run(RunCommand {
///         topology: Topology::Sample,
///         max_work_ms: 2,
///         ..RunCommand::default()
///     }),
/// };
/// let summary = run_cli(cli).expect("run succeeds");
/// assert!(summary.verdict.terminated());
/// assert!(summary.census.all_completed());
/// ```
#[instrument(name = "cli.run", err, skip(cli), fields(command = field::Empty))]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Run(run) => {
            Span::current().record("command", field::display("run"));
            run_command(run)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(topology = %command.topology, seed = command.seed),
)]
pub(super) fn run_command(command: RunCommand) -> Result<ExecutionSummary, CliError> {
    let work = SeededWork::builder()
        .with_seed(command.seed)
        .with_max_duration(Duration::from_millis(command.max_work_ms))
        .with_dirty_probability(command.dirty_probability)
        .build()?;
    let detector = TerminationDetector::builder()
        .with_timeout(Duration::from_millis(command.timeout_ms))
        .with_max_waves(command.max_waves)
        .build()?;
    let harness = WorkHarness::builder().build()?;

    let mut graph = command.topology.build()?;
    let tree = build_spanning_tree(&mut graph)?;

    let (workers, verdict) = thread::scope(|scope| {
        let detection = scope.spawn(|| detector.detect(&graph));
        let workers = harness.run(&graph, &work);
        let verdict = detection.join().map_err(|_| CliError::DetectorPanicked);
        (workers, verdict)
    });
    let workers = workers?;
    let verdict = verdict?;

    let census = graph.snapshot()?;
    let tree_lines = if command.tree {
        Some(render_tree(&graph)?)
    } else {
        None
    };
    let root = graph
        .root()
        .map_or_else(String::new, |root| label_of(&graph, root));

    if verdict.terminated() {
        info!(waves = verdict.waves(), "command completed");
    } else {
        warn!(
            reason = verdict.reason().map(|code| code.as_str()),
            "command completed without detecting termination"
        );
    }
    Ok(ExecutionSummary {
        topology: command.topology,
        seed: command.seed,
        root,
        tree,
        workers,
        verdict,
        census,
        tree_lines,
    })
}

/// Renders `summary` to `writer` as plain text.
///
/// # Errors
/// Returns [`io::Error`] if writing to `writer` fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    writeln!(
        writer,
        "topology: {} (seed {}, root {})",
        summary.topology, summary.seed, summary.root
    )?;
    writeln!(
        writer,
        "spanning tree: {} edges, total weight {}, {} component(s)",
        summary.tree.edges().len(),
        summary.tree.total_weight(),
        summary.tree.component_count()
    )?;
    writeln!(
        writer,
        "workers: {} (dirty {}, messages {})",
        summary.workers.workers().len(),
        summary.workers.dirty_count(),
        summary.workers.message_count()
    )?;

    let verdict = &summary.verdict;
    match verdict.reason() {
        None => writeln!(
            writer,
            "verdict: terminated after {} wave(s), {} scan(s)",
            verdict.waves(),
            verdict.scans()
        )?,
        Some(code) => writeln!(
            writer,
            "verdict: inconclusive ({code}) after {} wave(s), {} scan(s)",
            verdict.waves(),
            verdict.scans()
        )?,
    }

    let census = &summary.census;
    writeln!(
        writer,
        "census: {}/{} completed, {} active, {} black, {} token(s)",
        census.completed, census.nodes, census.active, census.black, census.tokens
    )?;

    if let Some(lines) = &summary.tree_lines {
        writeln!(writer)?;
        for line in lines {
            writeln!(writer, "{line}")?;
        }
    }
    Ok(())
}

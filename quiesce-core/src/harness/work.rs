//! Pluggable sources of simulated work.
//!
//! A [`WorkSource`] decides, per node, how long the simulated work takes and
//! whether it ends "dirty" (turning the node black and optionally messaging
//! a neighbour). [`SeededWork`] derives an independent `SmallRng` stream per
//! node from one base seed, so plans are reproducible regardless of thread
//! scheduling.

use std::{collections::HashMap, time::Duration};

use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};

use crate::{
    error::ConfigError,
    graph::{Node, NodeId},
};

/// SplitMix64 increment used for per-node seed derivation.
const NODE_SEED_SPACING: u64 = 0x9E37_79B9_7F4A_7C15;
const SPLITMIX_MULT_A: u64 = 0xBF58_476D_1CE4_E5B9;
const SPLITMIX_MULT_B: u64 = 0x94D0_49BB_1331_11EB;

#[inline]
pub(crate) fn mix_node_seed(base_seed: u64, node_index: usize) -> u64 {
    splitmix64(base_seed ^ ((node_index as u64).wrapping_add(1)).wrapping_mul(NODE_SEED_SPACING))
}

#[inline]
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(NODE_SEED_SPACING);
    state = (state ^ (state >> 30)).wrapping_mul(SPLITMIX_MULT_A);
    state = (state ^ (state >> 27)).wrapping_mul(SPLITMIX_MULT_B);
    state ^ (state >> 31)
}

/// One node's unit of simulated work.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WorkUnit {
    duration: Duration,
    dirty: bool,
    message: Option<u64>,
}

impl WorkUnit {
    /// Work that finishes white.
    #[must_use]
    pub const fn clean(duration: Duration) -> Self {
        Self {
            duration,
            dirty: false,
            message: None,
        }
    }

    /// Work that turns the node black without messaging anyone.
    #[must_use]
    pub const fn dirty(duration: Duration) -> Self {
        Self {
            duration,
            dirty: true,
            message: None,
        }
    }

    /// Work that turns the node black and dirties one neighbour.
    ///
    /// `pick` selects the neighbour modulo the number of eligible
    /// neighbours (all neighbours except the node itself and its parent).
    #[must_use]
    pub const fn dirty_with_message(duration: Duration, pick: u64) -> Self {
        Self {
            duration,
            dirty: true,
            message: Some(pick),
        }
    }

    /// How long the worker sleeps.
    #[must_use]
    #[rustfmt::skip]
    pub const fn duration(&self) -> Duration { self.duration }

    /// Whether the node turns black on completion.
    #[must_use]
    #[rustfmt::skip]
    pub const fn is_dirty(&self) -> bool { self.dirty }

    /// Neighbour selector for the dirty message, if one is sent.
    #[must_use]
    #[rustfmt::skip]
    pub const fn message(&self) -> Option<u64> { self.message }
}

/// Supplies the unit of work each node performs.
pub trait WorkSource: Send + Sync {
    /// Returns the work plan for `node`.
    fn unit_for(&self, node: &Node) -> WorkUnit;
}

impl<F> WorkSource for F
where
    F: Fn(&Node) -> WorkUnit + Send + Sync,
{
    fn unit_for(&self, node: &Node) -> WorkUnit {
        self(node)
    }
}

/// Explicit per-node work plans with a fallback for unlisted nodes.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use quiesce_core::{NodeId, ScriptedWork, WorkUnit};
///
/// let work = ScriptedWork::new(WorkUnit::clean(Duration::ZERO))
///     .with_unit(NodeId::new(2), WorkUnit::dirty(Duration::from_millis(5)));
/// assert!(work.planned(NodeId::new(2)).is_dirty());
/// assert!(!work.planned(NodeId::new(0)).is_dirty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ScriptedWork {
    fallback: WorkUnit,
    units: HashMap<NodeId, WorkUnit>,
}

impl ScriptedWork {
    /// Creates a script where every node performs `fallback`.
    #[must_use]
    pub fn new(fallback: WorkUnit) -> Self {
        Self {
            fallback,
            units: HashMap::new(),
        }
    }

    /// Assigns `unit` to `node`.
    #[must_use]
    pub fn with_unit(mut self, node: NodeId, unit: WorkUnit) -> Self {
        self.units.insert(node, unit);
        self
    }

    /// Returns the unit planned for `node`.
    #[must_use]
    pub fn planned(&self, node: NodeId) -> WorkUnit {
        self.units.get(&node).copied().unwrap_or(self.fallback)
    }
}

impl WorkSource for ScriptedWork {
    fn unit_for(&self, node: &Node) -> WorkUnit {
        self.planned(node.id())
    }
}

/// Randomised work drawn from per-node deterministic streams.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use quiesce_core::SeededWork;
///
/// let work = SeededWork::builder()
///     .with_seed(7)
///     .with_max_duration(Duration::from_millis(20))
///     .with_dirty_probability(0.5)
///     .build()
///     .expect("configuration is valid");
/// assert_eq!(work.seed(), 7);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SeededWork {
    seed: u64,
    max_duration: Duration,
    dirty_probability: f64,
    message_probability: f64,
}

impl SeededWork {
    /// Starts a builder populated with defaults.
    #[must_use]
    pub fn builder() -> SeededWorkBuilder {
        SeededWorkBuilder::default()
    }

    /// Base seed from which per-node streams are derived.
    #[must_use]
    #[rustfmt::skip]
    pub const fn seed(&self) -> u64 { self.seed }

    /// Draws the plan for the node at `index`.
    #[must_use]
    pub fn unit_at(&self, index: usize) -> WorkUnit {
        let mut rng = SmallRng::seed_from_u64(mix_node_seed(self.seed, index));
        let max_millis = u64::try_from(self.max_duration.as_millis()).unwrap_or(u64::MAX);
        let duration = Duration::from_millis(rng.gen_range(0..=max_millis));
        if !rng.gen_bool(self.dirty_probability) {
            return WorkUnit::clean(duration);
        }
        if rng.gen_bool(self.message_probability) {
            WorkUnit::dirty_with_message(duration, rng.next_u64())
        } else {
            WorkUnit::dirty(duration)
        }
    }
}

impl WorkSource for SeededWork {
    fn unit_for(&self, node: &Node) -> WorkUnit {
        self.unit_at(node.id().index())
    }
}

/// Configures and validates [`SeededWork`].
#[derive(Clone, Debug)]
pub struct SeededWorkBuilder {
    seed: u64,
    max_duration: Duration,
    dirty_probability: f64,
    message_probability: f64,
}

impl Default for SeededWorkBuilder {
    fn default() -> Self {
        Self {
            seed: 0,
            max_duration: Duration::from_millis(50),
            dirty_probability: 0.5,
            message_probability: 1.0,
        }
    }
}

impl SeededWorkBuilder {
    /// Overrides the base seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Overrides the upper bound on simulated work duration.
    #[must_use]
    pub const fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Overrides the probability that a node finishes dirty.
    #[must_use]
    pub const fn with_dirty_probability(mut self, probability: f64) -> Self {
        self.dirty_probability = probability;
        self
    }

    /// Overrides the probability that a dirty node also messages a neighbour.
    #[must_use]
    pub const fn with_message_probability(mut self, probability: f64) -> Self {
        self.message_probability = probability;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidProbability`] when either probability is
    /// not a finite value within `[0, 1]`.
    pub fn build(self) -> Result<SeededWork, ConfigError> {
        validate_probability("dirty_probability", self.dirty_probability)?;
        validate_probability("message_probability", self.message_probability)?;
        Ok(SeededWork {
            seed: self.seed,
            max_duration: self.max_duration,
            dirty_probability: self.dirty_probability,
            message_probability: self.message_probability,
        })
    }
}

fn validate_probability(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability {
            parameter,
            got: value,
        })
    }
}

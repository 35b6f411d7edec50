//! Lock-protected per-node state used by workers and the detector.

use std::sync::{Mutex, MutexGuard};

use crate::{error::StateError, graph::NodeId, signal::CompletionSignal};

/// Token and node colour.
///
/// White means quiescent; black means a dirty signal has been observed and
/// must be retired before termination can be declared.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Color {
    /// No pending signal.
    #[default]
    White,
    /// An unconsumed dirty signal.
    Black,
}

impl Color {
    /// Combines two colours; black dominates white.
    ///
    /// # Examples
    /// ```
    /// use quiesce_core::Color;
    ///
    /// assert_eq!(Color::White.merge(Color::White), Color::White);
    /// assert_eq!(Color::White.merge(Color::Black), Color::Black);
    /// assert_eq!(Color::Black.merge(Color::White), Color::Black);
    /// ```
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::White, Self::White) => Self::White,
            _ => Self::Black,
        }
    }

    /// Returns `true` for [`Color::Black`].
    #[must_use]
    pub const fn is_black(self) -> bool {
        matches!(self, Self::Black)
    }

    /// Lower-case name used by renderers and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }
}

/// Mutable fields of a node. Only ever accessed under the node's lock.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NodeState {
    /// The node's unit of work has finished.
    pub completed: bool,
    /// Dirty marker carried into the next token the node forwards.
    pub color: Color,
    /// Token held during a detection wave; `None` once forwarded.
    pub token: Option<Color>,
    /// A worker is currently executing for this node.
    pub active: bool,
}

/// Concurrency wrapper owning a node's state lock and completion signal.
#[derive(Debug, Default)]
pub struct NodeCell {
    state: Mutex<NodeState>,
    signal: CompletionSignal,
}

impl NodeCell {
    /// Acquires the node lock.
    ///
    /// # Errors
    /// Returns [`StateError::LockPoisoned`] when a previous holder panicked.
    pub fn lock(&self, node: NodeId) -> Result<MutexGuard<'_, NodeState>, StateError> {
        self.state
            .lock()
            .map_err(|_| StateError::LockPoisoned { node })
    }

    /// Copies the current state out from under the lock.
    ///
    /// # Errors
    /// Returns [`StateError::LockPoisoned`] when a previous holder panicked.
    pub fn read(&self, node: NodeId) -> Result<NodeState, StateError> {
        self.lock(node).map(|guard| *guard)
    }

    /// The node's one-shot completion signal.
    #[must_use]
    pub const fn signal(&self) -> &CompletionSignal {
        &self.signal
    }
}

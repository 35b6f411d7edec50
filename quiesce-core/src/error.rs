//! Error types shared across the quiesce core library.
//!
//! Each public error enum carries a stable machine-readable code so callers
//! can log or match on failures without depending on display strings.

use thiserror::Error;

use crate::graph::NodeId;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl ::std::fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

pub(crate) use define_error_codes;

/// An error produced while assembling a [`crate::Graph`].
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum GraphError {
    /// An edge endpoint does not name a node in the graph.
    #[error("node {node} is not part of the graph (node_count {node_count})")]
    UnknownNode {
        /// The missing endpoint.
        node: NodeId,
        /// Number of nodes currently in the graph.
        node_count: usize,
    },
    /// The requested root does not name a node in the graph.
    #[error("cannot designate {node} as root: graph has {node_count} nodes")]
    NoSuchRoot {
        /// The rejected root id.
        node: NodeId,
        /// Number of nodes currently in the graph.
        node_count: usize,
    },
    /// The root cannot change once the spanning tree has been oriented.
    #[error("the spanning tree is already built; the root can no longer change")]
    TreeFrozen,
}

define_error_codes! {
    /// Stable codes describing [`GraphError`] variants.
    enum GraphErrorCode for GraphError {
        /// An edge endpoint does not name a node in the graph.
        UnknownNode => UnknownNode { .. } => "GRAPH_UNKNOWN_NODE",
        /// The requested root does not name a node in the graph.
        NoSuchRoot => NoSuchRoot { .. } => "GRAPH_NO_SUCH_ROOT",
        /// The root cannot change once the spanning tree has been oriented.
        TreeFrozen => TreeFrozen => "GRAPH_TREE_FROZEN",
    }
}

/// Failure to access a node's lock-protected state.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum StateError {
    /// A worker panicked while holding the node lock.
    #[error("state lock for node {node} is poisoned")]
    LockPoisoned {
        /// Node whose lock was poisoned.
        node: NodeId,
    },
}

define_error_codes! {
    /// Stable codes describing [`StateError`] variants.
    enum StateErrorCode for StateError {
        /// A worker panicked while holding the node lock.
        LockPoisoned => LockPoisoned { .. } => "STATE_LOCK_POISONED",
    }
}

/// Rejected configuration supplied to one of the builders.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A limit that must be positive was zero.
    #[error("{parameter} must be at least 1")]
    ZeroLimit {
        /// Name of the offending parameter.
        parameter: &'static str,
    },
    /// A probability fell outside `[0, 1]` or was not finite.
    #[error("{parameter} must lie within [0, 1] (got {got})")]
    InvalidProbability {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The rejected value.
        got: f64,
    },
}

define_error_codes! {
    /// Stable codes describing [`ConfigError`] variants.
    enum ConfigErrorCode for ConfigError {
        /// A limit that must be positive was zero.
        ZeroLimit => ZeroLimit { .. } => "CONFIG_ZERO_LIMIT",
        /// A probability fell outside `[0, 1]` or was not finite.
        InvalidProbability => InvalidProbability { .. } => "CONFIG_INVALID_PROBABILITY",
    }
}

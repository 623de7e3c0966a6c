//! Error types for projection wiring and stepping.
//!
//! Every error is surfaced immediately. Construction-time problems
//! (missing capabilities, conflicting registrations) abort the construction
//! of the projection that hit them; step-time problems (unknown taps, shape
//! mismatches) abort the step.

use thiserror::Error;

/// Coarse classification of a [`ProjError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A collaborator lacks a role capability.
    Capability,
    /// A tap, hook, or input function was read before it was registered.
    Lookup,
    /// A produced shape disagrees with the declared one.
    Shape,
    /// An existing key was re-registered with incompatible parameters.
    Conflict,
    /// A model or delay parameter is malformed.
    Parameter,
}

/// Errors raised while wiring or stepping projections.
#[derive(Debug, Error)]
pub enum ProjError {
    #[error("{role} `{node}` does not support {capability}")]
    Capability {
        role: &'static str,
        node: String,
        capability: &'static str,
    },

    #[error("delay tap `{0}` is not registered")]
    UnknownTap(String),

    #[error("hook `{0}` is not registered")]
    UnknownHook(String),

    #[error("projection `{0}` requires a driving value")]
    MissingInput(String),

    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("axis names {names:?} do not match a tensor of rank {rank}")]
    AxisNames { names: Vec<String>, rank: usize },

    #[error("delay tap `{tap}` already registered with offset {existing:?}, requested {requested:?}")]
    TapConflict {
        tap: String,
        existing: Option<usize>,
        requested: Option<usize>,
    },

    #[error("hook `{0}` is already registered")]
    DuplicateHook(String),

    #[error("hook `{key}` holds a {found}, expected a {expected}")]
    HookKind {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("input function `{0}` is already registered")]
    DuplicateInput(String),

    #[error("`{0}` is already registered in the network")]
    DuplicateName(String),

    #[error("population `{0}` does not exist")]
    UnknownNode(String),

    #[error("invalid delay: {0}")]
    InvalidDelay(String),

    #[error("invalid parameter `{key}`: {reason}")]
    InvalidParam { key: String, reason: String },
}

impl ProjError {
    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProjError::Capability { .. } => ErrorKind::Capability,
            ProjError::UnknownTap(_)
            | ProjError::UnknownHook(_)
            | ProjError::MissingInput(_)
            | ProjError::UnknownNode(_) => ErrorKind::Lookup,
            ProjError::ShapeMismatch { .. } | ProjError::AxisNames { .. } => ErrorKind::Shape,
            ProjError::TapConflict { .. }
            | ProjError::DuplicateHook(_)
            | ProjError::HookKind { .. }
            | ProjError::DuplicateInput(_)
            | ProjError::DuplicateName(_) => ErrorKind::Conflict,
            ProjError::InvalidDelay(_) | ProjError::InvalidParam { .. } => ErrorKind::Parameter,
        }
    }

    pub(crate) fn capability(role: &'static str, node: impl Into<String>, capability: &'static str) -> Self {
        ProjError::Capability {
            role,
            node: node.into(),
            capability,
        }
    }

    pub(crate) fn param(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ProjError::InvalidParam {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProjError>;

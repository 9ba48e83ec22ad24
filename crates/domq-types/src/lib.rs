//! Shared types for the domq query engine.
//!
//! This crate provides the foundational types used across the other domq crates:
//! - `QueryError`: unified error taxonomy with stable error codes
//! - `SelectorError`: selector failures reported by a host tree
//! - `Budget`: traversal limits, deserializable from configuration

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for query construction and evaluation.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    // === Construction ===
    #[error("domq: {0}")]
    Config(String),

    // === Budget ===
    #[error("domq: traversal budget exceeded (max_nodes={max_nodes})")]
    NodeBudgetExceeded { max_nodes: usize },

    #[error("domq: traversal budget exceeded (max_ms={max_ms}, elapsed={elapsed_ms:.2}ms)")]
    TimeBudgetExceeded { max_ms: f64, elapsed_ms: f64 },

    // === Cardinality ===
    #[error(
        "domq.one(): expected exactly 1 match, got {}.\nPipeline: {pipeline}\n{}",
        count_label(.found, .truncated),
        sample_label(.sample)
    )]
    ExpectedOne {
        found: usize,
        /// The lookahead stopped early, more matches may exist.
        truncated: bool,
        pipeline: String,
        sample: Vec<String>,
    },

    #[error(
        "domq.maybe_one(): expected 0 or 1 match, got {}.\nPipeline: {pipeline}",
        count_label(.found, .truncated)
    )]
    ExpectedAtMostOne {
        found: usize,
        truncated: bool,
        pipeline: String,
    },
}

fn count_label(found: &usize, truncated: &bool) -> String {
    if *truncated {
        format!("{found} or more")
    } else {
        found.to_string()
    }
}

fn sample_label(sample: &[String]) -> String {
    if sample.is_empty() {
        "No matches.".to_string()
    } else {
        format!("Sample: {}", sample.join(", "))
    }
}

impl QueryError {
    /// Build a configuration error from any message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::Config,
            Self::NodeBudgetExceeded { .. } => ErrorCode::BudgetNodes,
            Self::TimeBudgetExceeded { .. } => ErrorCode::BudgetTime,
            Self::ExpectedOne { .. } => ErrorCode::One,
            Self::ExpectedAtMostOne { .. } => ErrorCode::MaybeOne,
        }
    }

    /// Whether this error was raised by a traversal budget.
    pub fn is_budget(&self) -> bool {
        matches!(
            self,
            Self::NodeBudgetExceeded { .. } | Self::TimeBudgetExceeded { .. }
        )
    }

    /// Whether this error was raised by `one()` or `maybe_one()`.
    pub fn is_cardinality(&self) -> bool {
        matches!(
            self,
            Self::ExpectedOne { .. } | Self::ExpectedAtMostOne { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// Error codes exposed to callers that match on strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Config,
    BudgetNodes,
    BudgetTime,
    One,
    MaybeOne,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "DOMQ_CONFIG",
            Self::BudgetNodes => "DOMQ_BUDGET_NODES",
            Self::BudgetTime => "DOMQ_BUDGET_TIME",
            Self::One => "DOMQ_ONE",
            Self::MaybeOne => "DOMQ_MAYBEONE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selector string the host tree could not parse or evaluate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector {selector:?}: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

impl SelectorError {
    pub fn new(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Traversal limits applied when a query is evaluated.
///
/// Every field is optional; an unset field imposes no limit. Configuration
/// files use camelCase keys (`maxNodes`, `maxMs`, `maxDepth`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Budget {
    /// Maximum number of elements visited by sources and relations.
    pub max_nodes: Option<usize>,
    /// Maximum wall-clock time for one evaluation, in milliseconds.
    pub max_ms: Option<f64>,
    /// Maximum depth for depth-aware relations.
    pub max_depth: Option<usize>,
}

impl Budget {
    pub fn nodes(max_nodes: usize) -> Self {
        Self::default().with_nodes(max_nodes)
    }

    pub fn ms(max_ms: f64) -> Self {
        Self::default().with_ms(max_ms)
    }

    pub fn depth(max_depth: usize) -> Self {
        Self::default().with_depth(max_depth)
    }

    pub fn with_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    pub fn with_ms(mut self, max_ms: f64) -> Self {
        self.max_ms = Some(max_ms);
        self
    }

    pub fn with_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Shallow merge: fields set on `other` replace the ones on `self`.
    pub fn merge(self, other: Budget) -> Budget {
        Budget {
            max_nodes: other.max_nodes.or(self.max_nodes),
            max_ms: other.max_ms.or(self.max_ms),
            max_depth: other.max_depth.or(self.max_depth),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_nodes.is_none() && self.max_ms.is_none() && self.max_depth.is_none()
    }
}

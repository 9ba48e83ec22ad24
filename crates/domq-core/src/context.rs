//! Per-evaluation traversal state and budget checks.

use std::time::{Duration, Instant};

use domq_types::{Budget, QueryError, Result};

use crate::query::Trace;

/// Created fresh for every terminal call; never shared between evaluations.
#[derive(Debug)]
pub struct TraversalContext {
    budget: Budget,
    trace: Trace,
    visited: usize,
    started: Instant,
}

impl TraversalContext {
    pub fn new(budget: Budget, trace: Trace) -> Self {
        Self {
            budget,
            trace,
            visited: 0,
            started: Instant::now(),
        }
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.budget.max_depth
    }

    /// Elements produced so far by sources and relations.
    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Count a newly produced element, then run the budget checks.
    pub fn visit(&mut self) -> Result<()> {
        self.visited += 1;
        self.checkpoint()
    }

    /// Budget checks without counting; used by stages that re-yield elements
    /// they pulled from upstream.
    pub fn checkpoint(&self) -> Result<()> {
        if let Some(max_nodes) = self.budget.max_nodes {
            if self.visited > max_nodes {
                return Err(QueryError::NodeBudgetExceeded { max_nodes });
            }
        }
        if let Some(max_ms) = self.budget.max_ms {
            let elapsed_ms = self.elapsed_ms();
            if elapsed_ms > max_ms {
                return Err(QueryError::TimeBudgetExceeded { max_ms, elapsed_ms });
            }
        }
        Ok(())
    }
}

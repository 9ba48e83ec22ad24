//! Lazy, fluent query pipelines over a host element tree.
//!
//! Start a pipeline with [`Dq::from`] or [`Dq::all`], chain relations
//! (`ancestors`, `descendants`, `closest`, ...) and filters built from
//! [`predicate`] helpers, then run a terminal such as `first`, `one` or
//! `to_vec`. Nothing touches the tree until a terminal runs, and every
//! evaluation can be bounded by a [`Budget`].
//!
//! The tree itself is reached through the [`Element`] trait; host adapters
//! implement it for their node handles.

pub mod context;
pub mod dq;
pub mod element;
pub mod predicate;
pub mod query;
pub mod registry;
pub mod relation;
pub mod stage;

#[cfg(test)]
mod fixture;

pub use context::TraversalContext;
pub use dq::{CompileOptions, CompiledQuery, Dq};
pub use element::{describe_element, normalize_text, Candidate, Element};
pub use predicate::{Comparator, IntoPredicates, Predicate};
pub use query::{Query, Trace};
pub use registry::{Extension, PredicateFactory, Registry};
pub use relation::{Relation, RelationArg, Walk};
pub use stage::{BoxStage, Stage};

pub use domq_types::{Budget, ErrorCode, QueryError, Result, SelectorError};

//! The lazy query pipeline.
//!
//! A [`Query`] is an immutable description of a traversal: a production
//! function that builds the stage chain, the explain steps, and the budget and
//! trace configuration. Chaining methods return new queries; nothing touches
//! the tree until a terminal method runs.

use std::hash::Hash;
use std::rc::Rc;

use domq_types::{Budget, QueryError, Result};

use crate::context::TraversalContext;
use crate::element::{describe_element, Element};
use crate::predicate::Predicate;
use crate::registry::Registry;
use crate::relation::{self, step_label, Relation, RelationArg, Walk};
use crate::stage::{BoxStage, Buffered, Filter, Skip, Source, Take, UniqueBy, Window};

/// Builds a fresh stage chain for one evaluation.
pub type Producer<E> = Rc<dyn Fn(&TraversalContext) -> BoxStage<E>>;

/// Matches `one()` inspects before reporting a cardinality error.
const ONE_LOOKAHEAD: usize = 3;
const MAYBE_ONE_LOOKAHEAD: usize = 2;

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

/// Whether terminal calls emit a diagnostic event, and under which label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Trace {
    #[default]
    Off,
    On,
    Labeled(String),
}

impl Trace {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Trace::Off)
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Trace::Labeled(label) => Some(label.as_str()),
            _ => None,
        }
    }
}

impl From<bool> for Trace {
    fn from(enabled: bool) -> Self {
        if enabled {
            Trace::On
        } else {
            Trace::Off
        }
    }
}

impl From<&str> for Trace {
    fn from(label: &str) -> Self {
        Trace::Labeled(label.to_string())
    }
}

impl From<String> for Trace {
    fn from(label: String) -> Self {
        Trace::Labeled(label)
    }
}

/// The diagnostic line emitted for one evaluation.
pub(crate) fn trace_line(
    label: Option<&str>,
    matches: usize,
    visited: usize,
    elapsed_ms: f64,
    explain: &str,
) -> String {
    let tag = label.map(|l| format!("domq {l}")).unwrap_or_else(|| "domq".into());
    format!("[{tag}] matches={matches} visited={visited} time={elapsed_ms:.2}ms\n{explain}")
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A deferred, reusable traversal pipeline.
pub struct Query<E> {
    producer: Producer<E>,
    steps: Vec<String>,
    budget: Budget,
    trace: Trace,
    registry: Rc<Registry<E>>,
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            producer: Rc::clone(&self.producer),
            steps: self.steps.clone(),
            budget: self.budget,
            trace: self.trace.clone(),
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<E: Element> std::fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("pipeline", &self.explain())
            .field("budget", &self.budget)
            .field("trace", &self.trace)
            .finish()
    }
}

impl<E: Element> Query<E> {
    /// Start a pipeline from a fixed list of elements.
    pub fn from_elements(
        items: Vec<E>,
        step: impl Into<String>,
        registry: Rc<Registry<E>>,
    ) -> Self {
        let items: Rc<[E]> = items.into();
        Self {
            producer: Rc::new(move |_: &TraversalContext| -> BoxStage<E> {
                Box::new(Source::new(Rc::clone(&items)))
            }),
            steps: vec![step.into()],
            budget: Budget::default(),
            trace: Trace::Off,
            registry,
        }
    }

    /// A single start element, or an empty pipeline for `None`.
    pub fn from_element(start: Option<E>, registry: Rc<Registry<E>>) -> Self {
        let step = match &start {
            Some(el) => format!("from({})", describe_element(el)),
            None => "from(null)".to_string(),
        };
        Self::from_elements(start.into_iter().collect(), step, registry)
    }

    fn chain(
        &self,
        step: String,
        wrap: impl Fn(BoxStage<E>, &TraversalContext) -> BoxStage<E> + 'static,
    ) -> Self {
        let upstream = Rc::clone(&self.producer);
        let mut next = self.clone();
        next.producer = Rc::new(move |cx: &TraversalContext| wrap(upstream(cx), cx));
        next.steps.push(step);
        next
    }

    /// Append an already bound walk under the given explain step. Used by
    /// extension crates to add typed relation methods.
    pub fn walk(&self, step: impl Into<String>, walk: Walk<E>) -> Self {
        self.chain(step.into(), move |input, cx| walk(input, cx))
    }

    // -- relations ---------------------------------------------------------

    /// Apply a relation with arguments. Argument errors are reported here,
    /// not at evaluation.
    pub fn get(&self, relation: &Relation<E>, args: &[RelationArg<E>]) -> Result<Self> {
        let walk = relation.bind(args)?;
        Ok(self.walk(relation.step(args), walk))
    }

    /// Apply a relation registered under `name`.
    pub fn apply(&self, name: &str, args: &[RelationArg<E>]) -> Result<Self> {
        let relation = self
            .registry
            .relation(name)
            .ok_or_else(|| QueryError::config(format!("unknown relation '{name}'")))?
            .clone();
        self.get(&relation, args)
    }

    pub fn self_(&self) -> Self {
        self.walk("self()", relation::expand(relation::self_of))
    }

    pub fn parent(&self) -> Self {
        self.walk("parent()", relation::expand(relation::parent_of))
    }

    /// Nearest first; bounded by `max_depth`.
    pub fn ancestors(&self) -> Self {
        self.walk("ancestors()", relation::expand(relation::ancestors_of))
    }

    pub fn children(&self) -> Self {
        self.walk("children()", relation::expand(relation::children_of))
    }

    /// Pre-order; bounded by `max_depth`.
    pub fn descendants(&self) -> Self {
        self.walk(
            "descendants()",
            relation::expand(relation::descendants_of),
        )
    }

    pub fn siblings(&self) -> Self {
        self.walk("siblings()", relation::expand(relation::siblings_of))
    }

    pub fn following_siblings(&self) -> Self {
        self.walk(
            "following_siblings()",
            relation::expand(relation::following_siblings_of),
        )
    }

    /// Document order: farthest sibling first.
    pub fn preceding_siblings(&self) -> Self {
        self.walk(
            "preceding_siblings()",
            relation::expand(relation::preceding_siblings_of),
        )
    }

    pub fn next(&self) -> Self {
        self.walk("next()", relation::expand(relation::next_of))
    }

    pub fn prev(&self) -> Self {
        self.walk("prev()", relation::expand(relation::prev_of))
    }

    pub fn closest(&self, selector: &str) -> Self {
        self.selector_walk("closest", selector, relation::closest_of)
    }

    pub fn find(&self, selector: &str) -> Self {
        self.selector_walk("find", selector, relation::find_of)
    }

    pub fn within(&self, selector: &str) -> Self {
        self.selector_walk("within", selector, relation::closest_of)
    }

    fn selector_walk<I>(&self, name: &str, selector: &str, step: fn(&E, &str) -> I) -> Self
    where
        I: Iterator<Item = E> + 'static,
    {
        let owned = selector.to_string();
        self.walk(
            format!("{name}({selector})"),
            relation::expand(move |el: &E, _| step(el, &owned)),
        )
    }

    /// Ancestors up to, not including, the first one matching `boundary`
    /// (a selector string or a predicate).
    pub fn until(&self, boundary: impl Into<RelationArg<E>>) -> Self {
        let arg = boundary.into();
        let step = step_label("until", std::slice::from_ref(&arg));
        self.walk(step, relation::until_walk(relation::boundary(arg)))
    }

    // -- filters -----------------------------------------------------------

    /// Keep elements matching `predicate`.
    pub fn filter(&self, predicate: Predicate<E>) -> Self {
        let step = format!("where({})", predicate.description());
        self.chain(step, move |input, _| {
            Box::new(Filter::new(input, predicate.clone(), true))
        })
    }

    /// Drop elements matching `predicate`.
    pub fn not(&self, predicate: Predicate<E>) -> Self {
        let step = format!("not({})", predicate.description());
        self.chain(step, move |input, _| {
            Box::new(Filter::new(input, predicate.clone(), false))
        })
    }

    /// Drop repeated elements; first occurrence wins.
    pub fn unique(&self) -> Self {
        self.dedup::<E>("unique()".into(), Rc::new(E::clone))
    }

    /// Drop elements whose key was already seen.
    pub fn unique_by<K>(&self, key: impl Fn(&E) -> K + 'static) -> Self
    where
        K: Hash + Eq + 'static,
    {
        self.dedup("unique_by(fn)".into(), Rc::new(key))
    }

    fn dedup<K: Hash + Eq + 'static>(&self, step: String, key: Rc<dyn Fn(&E) -> K>) -> Self {
        self.chain(step, move |input, _| {
            Box::new(UniqueBy::new(input, Rc::clone(&key)))
        })
    }

    // -- windows -----------------------------------------------------------

    pub fn reverse(&self) -> Self {
        self.buffered("reverse()".into(), Window::Reverse)
    }

    /// Single element at `index`; negative counts from the end.
    pub fn at(&self, index: isize) -> Self {
        self.buffered(format!("at({index})"), Window::At(index))
    }

    /// Slice with `Array.prototype.slice` bounds; `None` runs to the end.
    pub fn slice(&self, start: isize, end: Option<isize>) -> Self {
        let end_label = end.map_or_else(|| "null".to_string(), |e| e.to_string());
        self.buffered(format!("slice({start}, {end_label})"), Window::Slice(start, end))
    }

    fn buffered(&self, step: String, window: Window) -> Self {
        self.chain(step, move |input, _| Box::new(Buffered::new(input, window)))
    }

    /// First `n` elements; never pulls past the `n`th.
    pub fn take(&self, n: usize) -> Self {
        self.chain(format!("take({n})"), move |input, _| Box::new(Take::new(input, n)))
    }

    pub fn skip(&self, n: usize) -> Self {
        self.chain(format!("skip({n})"), move |input, _| Box::new(Skip::new(input, n)))
    }

    // -- configuration -----------------------------------------------------

    /// Merge `budget` over the current one; set fields win.
    pub fn budget(&self, budget: Budget) -> Self {
        let mut next = self.clone();
        next.budget = self.budget.merge(budget);
        next
    }

    /// Emit a diagnostic event on every terminal call. Accepts `true`,
    /// `false`, or a label.
    pub fn debug(&self, trace: impl Into<Trace>) -> Self {
        let mut next = self.clone();
        next.trace = trace.into();
        next
    }

    pub fn explain(&self) -> String {
        self.steps.join(" -> ")
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn budget_config(&self) -> Budget {
        self.budget
    }

    pub fn trace_config(&self) -> &Trace {
        &self.trace
    }

    pub fn registry(&self) -> &Registry<E> {
        &self.registry
    }

    // -- terminals ---------------------------------------------------------

    fn evaluate(&self) -> (TraversalContext, BoxStage<E>) {
        let cx = TraversalContext::new(self.budget, self.trace.clone());
        let stage = (self.producer)(&cx);
        (cx, stage)
    }

    /// Pull up to `limit` elements.
    fn pull(&self, limit: usize) -> Result<(TraversalContext, Vec<E>)> {
        let (mut cx, mut stage) = self.evaluate();
        let mut found = Vec::new();
        while found.len() < limit {
            match stage.next(&mut cx)? {
                Some(el) => found.push(el),
                None => break,
            }
        }
        Ok((cx, found))
    }

    fn report(&self, cx: &TraversalContext, matches: usize) {
        let trace = cx.trace();
        if !trace.is_enabled() {
            return;
        }
        let elapsed_ms = cx.elapsed_ms();
        tracing::info!(
            label = trace.label().unwrap_or(""),
            matches,
            visited = cx.visited(),
            elapsed_ms,
            "{}",
            trace_line(trace.label(), matches, cx.visited(), elapsed_ms, &self.explain())
        );
    }

    pub fn first(&self) -> Result<Option<E>> {
        let (cx, mut found) = self.pull(1)?;
        self.report(&cx, found.len());
        Ok(found.pop())
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.first()?.is_some())
    }

    pub fn count(&self) -> Result<usize> {
        let (mut cx, mut stage) = self.evaluate();
        let mut n = 0;
        while stage.next(&mut cx)?.is_some() {
            n += 1;
        }
        self.report(&cx, n);
        Ok(n)
    }

    pub fn to_vec(&self) -> Result<Vec<E>> {
        let (cx, found) = self.pull(usize::MAX)?;
        self.report(&cx, found.len());
        Ok(found)
    }

    /// Map every match with its index.
    pub fn map<T>(&self, mut f: impl FnMut(&E, usize) -> T) -> Result<Vec<T>> {
        let (mut cx, mut stage) = self.evaluate();
        let mut out = Vec::new();
        while let Some(el) = stage.next(&mut cx)? {
            out.push(f(&el, out.len()));
        }
        self.report(&cx, out.len());
        Ok(out)
    }

    /// Exactly one match, or an error describing what was found.
    pub fn one(&self) -> Result<E> {
        let (cx, mut found) = self.pull(ONE_LOOKAHEAD)?;
        self.report(&cx, found.len());
        if found.len() == 1 {
            if let Some(el) = found.pop() {
                return Ok(el);
            }
        }
        Err(QueryError::ExpectedOne {
            found: found.len(),
            truncated: found.len() == ONE_LOOKAHEAD,
            pipeline: self.explain(),
            sample: found.iter().map(describe_element).collect(),
        })
    }

    /// Zero or one match; more is an error.
    pub fn maybe_one(&self) -> Result<Option<E>> {
        let (cx, mut found) = self.pull(MAYBE_ONE_LOOKAHEAD)?;
        self.report(&cx, found.len());
        if found.len() <= 1 {
            return Ok(found.pop());
        }
        Err(QueryError::ExpectedAtMostOne {
            found: found.len(),
            truncated: found.len() == MAYBE_ONE_LOOKAHEAD,
            pipeline: self.explain(),
        })
    }
}

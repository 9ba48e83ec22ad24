//! Tree relations: how each input element expands into related elements.
//!
//! A [`Relation`] binds its arguments when the pipeline is built, so argument
//! errors surface at chain time. The bound [`Walk`] wraps an upstream stage
//! and flat-maps every element through the relation lazily.

use std::fmt;
use std::iter;
use std::rc::Rc;

use domq_types::{QueryError, Result, SelectorError};

use crate::context::TraversalContext;
use crate::element::Element;
use crate::predicate::{self, Predicate};
use crate::stage::{BoxStage, Expand, ExpandFn};

/// A bound relation: wraps an upstream stage with the relation's expansion.
pub type Walk<E> = Rc<dyn Fn(BoxStage<E>, &TraversalContext) -> BoxStage<E>>;

type Bind<E> = Rc<dyn Fn(&[RelationArg<E>]) -> Result<Walk<E>>>;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Argument passed to a relation.
pub enum RelationArg<E> {
    Selector(String),
    Predicate(Predicate<E>),
}

impl<E> Clone for RelationArg<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Selector(s) => Self::Selector(s.clone()),
            Self::Predicate(p) => Self::Predicate(p.clone()),
        }
    }
}

impl<E> fmt::Debug for RelationArg<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector(s) => f.debug_tuple("Selector").field(s).finish(),
            Self::Predicate(p) => f.debug_tuple("Predicate").field(p).finish(),
        }
    }
}

impl<E> fmt::Display for RelationArg<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector(s) => f.write_str(s),
            Self::Predicate(p) => fmt::Display::fmt(p, f),
        }
    }
}

impl<E> From<&str> for RelationArg<E> {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl<E> From<String> for RelationArg<E> {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl<E> From<Predicate<E>> for RelationArg<E> {
    fn from(predicate: Predicate<E>) -> Self {
        Self::Predicate(predicate)
    }
}

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// A named relation that can be bound to arguments and applied to a pipeline.
pub struct Relation<E> {
    name: Rc<str>,
    bind: Bind<E>,
}

impl<E> Clone for Relation<E> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            bind: Rc::clone(&self.bind),
        }
    }
}

impl<E> fmt::Debug for Relation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation").field("name", &self.name).finish()
    }
}

impl<E: Element> Relation<E> {
    pub fn new(
        name: impl Into<String>,
        bind: impl Fn(&[RelationArg<E>]) -> Result<Walk<E>> + 'static,
    ) -> Self {
        Self {
            name: name.into().into(),
            bind: Rc::new(bind),
        }
    }

    /// A relation without arguments, defined by its per-element expansion.
    /// The expansion receives the depth limit of the current evaluation.
    pub fn expand<F, I>(name: impl Into<String>, step: F) -> Self
    where
        F: Fn(&E, Option<usize>) -> I + 'static,
        I: Iterator<Item = E> + 'static,
    {
        let walk = expand(step);
        Self::new(name, move |_| Ok(Rc::clone(&walk)))
    }

    /// A relation taking one selector argument.
    pub fn with_selector<F, I>(name: impl Into<String>, step: F) -> Self
    where
        F: Fn(&E, &str) -> I + 'static,
        I: Iterator<Item = E> + 'static,
    {
        let name: String = name.into();
        let step = Rc::new(step);
        let label = name.clone();
        Self::new(name, move |args| {
            let selector = selector_arg(&label, args)?;
            let step = Rc::clone(&step);
            Ok(expand(move |el: &E, _| step(el, &selector)))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate `args` and produce the walk for them.
    pub fn bind(&self, args: &[RelationArg<E>]) -> Result<Walk<E>> {
        (self.bind)(args)
    }

    /// Step description used by `explain()`, e.g. `closest(section)`.
    pub fn step(&self, args: &[RelationArg<E>]) -> String {
        step_label(&self.name, args)
    }
}

pub(crate) fn step_label<E>(name: &str, args: &[RelationArg<E>]) -> String {
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("{name}({})", args.join(", "))
}

/// Build a walk from a per-element expansion.
pub fn expand<E, F, I>(step: F) -> Walk<E>
where
    E: Element,
    F: Fn(&E, Option<usize>) -> I + 'static,
    I: Iterator<Item = E> + 'static,
{
    let step: ExpandFn<E> = Rc::new(
        move |el: &E, limit: Option<usize>| -> Box<dyn Iterator<Item = E>> {
            Box::new(step(el, limit))
        },
    );
    Rc::new(move |input: BoxStage<E>, cx: &TraversalContext| -> BoxStage<E> {
        Box::new(Expand::new(input, Rc::clone(&step), cx.max_depth()))
    })
}

fn selector_arg<E>(relation: &str, args: &[RelationArg<E>]) -> Result<String> {
    match args.first() {
        Some(RelationArg::Selector(selector)) => Ok(selector.clone()),
        Some(RelationArg::Predicate(_)) => Err(QueryError::config(format!(
            "{relation}(selector) expects a selector string, got a predicate"
        ))),
        None => Err(QueryError::config(format!(
            "{relation}(selector) requires a selector string"
        ))),
    }
}

/// Selector failures inside relations mean "no match".
fn swallow<T: Default>(selector: &str, result: std::result::Result<T, SelectorError>) -> T {
    result.unwrap_or_else(|err| {
        tracing::debug!(selector, error = %err, "Selector rejected by host, treating as no match");
        T::default()
    })
}

// ---------------------------------------------------------------------------
// Built-in expansions
// ---------------------------------------------------------------------------

pub(crate) fn self_of<E: Element>(el: &E, _: Option<usize>) -> iter::Once<E> {
    iter::once(el.clone())
}

pub(crate) fn parent_of<E: Element>(el: &E, _: Option<usize>) -> std::option::IntoIter<E> {
    el.parent().into_iter()
}

/// Nearest first, at most `limit` levels.
pub(crate) fn ancestors_of<E: Element>(el: &E, limit: Option<usize>) -> impl Iterator<Item = E> {
    iter::successors(el.parent(), E::parent).take(limit.unwrap_or(usize::MAX))
}

pub(crate) fn children_of<E: Element>(el: &E, _: Option<usize>) -> std::vec::IntoIter<E> {
    el.children().into_iter()
}

/// Pre-order depth-first; depth 1 is a direct child.
pub(crate) fn descendants_of<E: Element>(el: &E, limit: Option<usize>) -> PreOrder<E> {
    PreOrder::new(el, limit)
}

pub(crate) fn siblings_of<E: Element>(el: &E, _: Option<usize>) -> impl Iterator<Item = E> {
    let this = el.clone();
    el.parent()
        .map(|p| p.children())
        .unwrap_or_default()
        .into_iter()
        .filter(move |s| *s != this)
}

pub(crate) fn following_siblings_of<E: Element>(
    el: &E,
    _: Option<usize>,
) -> impl Iterator<Item = E> {
    iter::successors(el.next_sibling(), E::next_sibling)
}

/// Farthest first, nearest last.
pub(crate) fn preceding_siblings_of<E: Element>(
    el: &E,
    _: Option<usize>,
) -> std::iter::Rev<std::vec::IntoIter<E>> {
    let nearest_first: Vec<E> = iter::successors(el.prev_sibling(), E::prev_sibling).collect();
    nearest_first.into_iter().rev()
}

pub(crate) fn next_of<E: Element>(el: &E, _: Option<usize>) -> std::option::IntoIter<E> {
    el.next_sibling().into_iter()
}

pub(crate) fn prev_of<E: Element>(el: &E, _: Option<usize>) -> std::option::IntoIter<E> {
    el.prev_sibling().into_iter()
}

pub(crate) fn closest_of<E: Element>(el: &E, selector: &str) -> std::option::IntoIter<E> {
    swallow(selector, el.closest(selector)).into_iter()
}

pub(crate) fn find_of<E: Element>(el: &E, selector: &str) -> std::vec::IntoIter<E> {
    swallow(selector, el.query_selector_all(selector)).into_iter()
}

/// Pre-order traversal below a root, skipping subtrees past the depth limit.
pub struct PreOrder<E> {
    stack: Vec<(E, usize)>,
    limit: Option<usize>,
}

impl<E: Element> PreOrder<E> {
    pub fn new(root: &E, limit: Option<usize>) -> Self {
        let mut walk = Self {
            stack: Vec::new(),
            limit,
        };
        walk.push_children(root, 1);
        walk
    }

    fn push_children(&mut self, el: &E, depth: usize) {
        if self.limit.is_some_and(|limit| depth > limit) {
            return;
        }
        self.stack
            .extend(el.children().into_iter().rev().map(|c| (c, depth)));
    }
}

impl<E: Element> Iterator for PreOrder<E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        let (el, depth) = self.stack.pop()?;
        self.push_children(&el, depth + 1);
        Some(el)
    }
}

/// Turn an `until` argument into the boundary test.
pub(crate) fn boundary<E: Element>(arg: RelationArg<E>) -> Predicate<E> {
    match arg {
        RelationArg::Selector(selector) => predicate::matches(&selector),
        RelationArg::Predicate(p) => p,
    }
}

/// Ancestors nearest first, stopping before the first one matching
/// `boundary`. Honors the depth limit.
pub(crate) fn until_walk<E: Element>(boundary: Predicate<E>) -> Walk<E> {
    expand(move |el: &E, limit| {
        let boundary = boundary.clone();
        ancestors_of(el, limit).take_while(move |a| !boundary.test(a))
    })
}

// ---------------------------------------------------------------------------
// Built-in relations
// ---------------------------------------------------------------------------

pub fn self_<E: Element>() -> Relation<E> {
    Relation::expand("self", self_of)
}

pub fn parent<E: Element>() -> Relation<E> {
    Relation::expand("parent", parent_of)
}

pub fn ancestors<E: Element>() -> Relation<E> {
    Relation::expand("ancestors", ancestors_of)
}

pub fn children<E: Element>() -> Relation<E> {
    Relation::expand("children", children_of)
}

pub fn descendants<E: Element>() -> Relation<E> {
    Relation::expand("descendants", descendants_of)
}

pub fn siblings<E: Element>() -> Relation<E> {
    Relation::expand("siblings", siblings_of)
}

pub fn following_siblings<E: Element>() -> Relation<E> {
    Relation::expand("following_siblings", following_siblings_of)
}

pub fn preceding_siblings<E: Element>() -> Relation<E> {
    Relation::expand("preceding_siblings", preceding_siblings_of)
}

pub fn next<E: Element>() -> Relation<E> {
    Relation::expand("next", next_of)
}

pub fn prev<E: Element>() -> Relation<E> {
    Relation::expand("prev", prev_of)
}

pub fn closest<E: Element>() -> Relation<E> {
    Relation::with_selector("closest", closest_of)
}

pub fn find<E: Element>() -> Relation<E> {
    Relation::with_selector("find", find_of)
}

/// Same walk as [`closest`]; reads better when scoping to a container.
pub fn within<E: Element>() -> Relation<E> {
    Relation::with_selector("within", closest_of)
}

pub fn until<E: Element>() -> Relation<E> {
    Relation::new("until", |args: &[RelationArg<E>]| match args.first() {
        Some(arg) => Ok(until_walk(boundary(arg.clone()))),
        None => Err(QueryError::config(
            "until(boundary) requires a selector or predicate",
        )),
    })
}

/// Every built-in relation, in registration order.
pub fn builtins<E: Element>() -> Vec<Relation<E>> {
    vec![
        self_(),
        parent(),
        ancestors(),
        children(),
        descendants(),
        siblings(),
        following_siblings(),
        preceding_siblings(),
        next(),
        prev(),
        closest(),
        find(),
        within(),
        until(),
    ]
}

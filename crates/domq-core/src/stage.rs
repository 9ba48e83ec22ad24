//! Pull-based pipeline stages.
//!
//! Every stage pulls from its upstream on demand and runs the budget
//! checkpoint for each element it yields. Sources and relation expansions
//! count visits; pass-through stages only check.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

use domq_types::Result;

use crate::context::TraversalContext;
use crate::element::Element;
use crate::predicate::Predicate;

/// A lazily evaluated sequence of elements.
pub trait Stage<E> {
    fn next(&mut self, cx: &mut TraversalContext) -> Result<Option<E>>;
}

pub type BoxStage<E> = Box<dyn Stage<E>>;

/// Per-element expansion used by relations.
pub type ExpandFn<E> = Rc<dyn Fn(&E, Option<usize>) -> Box<dyn Iterator<Item = E>>>;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Yields a fixed list of start elements.
pub struct Source<E> {
    items: Rc<[E]>,
    pos: usize,
}

impl<E> Source<E> {
    pub fn new(items: Rc<[E]>) -> Self {
        Self { items, pos: 0 }
    }
}

impl<E: Element> Stage<E> for Source<E> {
    fn next(&mut self, cx: &mut TraversalContext) -> Result<Option<E>> {
        let Some(item) = self.items.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        cx.visit()?;
        Ok(Some(item.clone()))
    }
}

// ---------------------------------------------------------------------------
// Relation expansion
// ---------------------------------------------------------------------------

/// Flat-maps each upstream element through a relation, in input order.
pub struct Expand<E> {
    input: BoxStage<E>,
    step: ExpandFn<E>,
    limit: Option<usize>,
    current: Option<Box<dyn Iterator<Item = E>>>,
}

impl<E> Expand<E> {
    pub fn new(input: BoxStage<E>, step: ExpandFn<E>, limit: Option<usize>) -> Self {
        Self {
            input,
            step,
            limit,
            current: None,
        }
    }
}

impl<E: Element> Stage<E> for Expand<E> {
    fn next(&mut self, cx: &mut TraversalContext) -> Result<Option<E>> {
        loop {
            if let Some(iter) = self.current.as_mut() {
                if let Some(el) = iter.next() {
                    cx.visit()?;
                    return Ok(Some(el));
                }
                self.current = None;
            }
            match self.input.next(cx)? {
                Some(el) => self.current = Some((self.step)(&el, self.limit)),
                None => return Ok(None),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Filtering and dedup
// ---------------------------------------------------------------------------

pub struct Filter<E> {
    input: BoxStage<E>,
    predicate: Predicate<E>,
    keep: bool,
}

impl<E> Filter<E> {
    /// Keep elements for which `predicate` returns `keep`.
    pub fn new(input: BoxStage<E>, predicate: Predicate<E>, keep: bool) -> Self {
        Self {
            input,
            predicate,
            keep,
        }
    }
}

impl<E: Element> Stage<E> for Filter<E> {
    fn next(&mut self, cx: &mut TraversalContext) -> Result<Option<E>> {
        while let Some(el) = self.input.next(cx)? {
            if self.predicate.test(&el) == self.keep {
                cx.checkpoint()?;
                return Ok(Some(el));
            }
        }
        Ok(None)
    }
}

/// Drops elements whose key was already seen; first occurrence wins.
pub struct UniqueBy<E, K> {
    input: BoxStage<E>,
    key: Rc<dyn Fn(&E) -> K>,
    seen: HashSet<K>,
}

impl<E, K> UniqueBy<E, K> {
    pub fn new(input: BoxStage<E>, key: Rc<dyn Fn(&E) -> K>) -> Self {
        Self {
            input,
            key,
            seen: HashSet::new(),
        }
    }
}

impl<E: Element, K: Hash + Eq> Stage<E> for UniqueBy<E, K> {
    fn next(&mut self, cx: &mut TraversalContext) -> Result<Option<E>> {
        while let Some(el) = self.input.next(cx)? {
            if self.seen.insert((self.key)(&el)) {
                cx.checkpoint()?;
                return Ok(Some(el));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

/// Yields at most `remaining` elements and never pulls past the last one.
pub struct Take<E> {
    input: BoxStage<E>,
    remaining: usize,
}

impl<E> Take<E> {
    pub fn new(input: BoxStage<E>, n: usize) -> Self {
        Self {
            input,
            remaining: n,
        }
    }
}

impl<E: Element> Stage<E> for Take<E> {
    fn next(&mut self, cx: &mut TraversalContext) -> Result<Option<E>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        match self.input.next(cx)? {
            Some(el) => {
                self.remaining -= 1;
                cx.checkpoint()?;
                Ok(Some(el))
            }
            None => {
                self.remaining = 0;
                Ok(None)
            }
        }
    }
}

pub struct Skip<E> {
    input: BoxStage<E>,
    pending: usize,
}

impl<E> Skip<E> {
    pub fn new(input: BoxStage<E>, n: usize) -> Self {
        Self { input, pending: n }
    }
}

impl<E: Element> Stage<E> for Skip<E> {
    fn next(&mut self, cx: &mut TraversalContext) -> Result<Option<E>> {
        while self.pending > 0 {
            if self.input.next(cx)?.is_none() {
                self.pending = 0;
                return Ok(None);
            }
            self.pending -= 1;
        }
        match self.input.next(cx)? {
            Some(el) => {
                cx.checkpoint()?;
                Ok(Some(el))
            }
            None => Ok(None),
        }
    }
}

/// How a buffered stage reshapes the fully drained upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Reverse,
    /// Single index; negative counts from the end.
    At(isize),
    /// Half-open range with `Array.prototype.slice` semantics.
    Slice(isize, Option<isize>),
}

impl Window {
    fn apply<E>(self, mut items: Vec<E>) -> VecDeque<E> {
        let len = items.len();
        match self {
            Window::Reverse => {
                items.reverse();
                items.into()
            }
            Window::At(index) => match resolve_index(index, len).filter(|p| *p < len) {
                Some(pos) => VecDeque::from([items.swap_remove(pos)]),
                None => VecDeque::new(),
            },
            Window::Slice(start, end) => {
                let start = clamp_index(start, len);
                let end = end.map_or(len, |e| clamp_index(e, len));
                if start >= end {
                    return VecDeque::new();
                }
                items.truncate(end);
                items.drain(..start);
                items.into()
            }
        }
    }
}

/// Resolve a possibly negative index against `len`.
fn resolve_index(index: isize, len: usize) -> Option<usize> {
    if index >= 0 {
        Some(index as usize)
    } else {
        len.checked_sub(index.unsigned_abs())
    }
}

/// Resolve and clamp into `0..=len`, as `slice` bounds do.
fn clamp_index(index: isize, len: usize) -> usize {
    resolve_index(index, len).unwrap_or(0).min(len)
}

/// Drains upstream on the first pull, then yields the reshaped buffer.
pub struct Buffered<E> {
    input: BoxStage<E>,
    window: Window,
    buffer: Option<VecDeque<E>>,
}

impl<E> Buffered<E> {
    pub fn new(input: BoxStage<E>, window: Window) -> Self {
        Self {
            input,
            window,
            buffer: None,
        }
    }
}

impl<E: Element> Stage<E> for Buffered<E> {
    fn next(&mut self, cx: &mut TraversalContext) -> Result<Option<E>> {
        if self.buffer.is_none() {
            let mut items = Vec::new();
            while let Some(el) = self.input.next(cx)? {
                items.push(el);
            }
            self.buffer = Some(self.window.apply(items));
        }
        match self.buffer.as_mut().and_then(VecDeque::pop_front) {
            Some(el) => {
                cx.checkpoint()?;
                Ok(Some(el))
            }
            None => Ok(None),
        }
    }
}

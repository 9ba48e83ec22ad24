//! Named relations and predicate factories, and the extension hook that
//! installs new ones.

use std::collections::BTreeMap;
use std::rc::Rc;

use domq_types::{QueryError, Result};

use crate::element::Element;
use crate::predicate::{self, Predicate};
use crate::relation::{self, Relation};

/// Builds a predicate from string arguments, e.g. `tag("button")`.
pub type PredicateFactory<E> = Rc<dyn Fn(&[&str]) -> Result<Predicate<E>>>;

/// Names owned by the `Query` chaining surface; extensions cannot take them.
pub const RESERVED_NAMES: &[&str] = &[
    "get",
    "apply",
    "filter",
    "where",
    "not",
    "unique",
    "unique_by",
    "reverse",
    "at",
    "take",
    "skip",
    "slice",
    "budget",
    "debug",
    "explain",
    "first",
    "exists",
    "count",
    "to_vec",
    "map",
    "one",
    "maybe_one",
];

// ---------------------------------------------------------------------------
// Extension
// ---------------------------------------------------------------------------

/// Installs relations and predicates into a registry.
pub trait Extension<E: Element> {
    fn install(&self, registry: &mut Registry<E>);
}

impl<E, F> Extension<E> for F
where
    E: Element,
    F: Fn(&mut Registry<E>),
{
    fn install(&self, registry: &mut Registry<E>) {
        self(registry)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct Registry<E> {
    relations: BTreeMap<String, Relation<E>>,
    predicates: BTreeMap<String, PredicateFactory<E>>,
}

impl<E> Clone for Registry<E> {
    fn clone(&self) -> Self {
        Self {
            relations: self.relations.clone(),
            predicates: self.predicates.clone(),
        }
    }
}

impl<E: Element> Registry<E> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            relations: BTreeMap::new(),
            predicates: BTreeMap::new(),
        }
    }

    /// A registry holding every built-in relation and the direct predicates.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for rel in relation::builtins() {
            registry.register_relation(rel);
        }
        registry.register_predicate("tag", single_arg("tag", predicate::tag));
        registry.register_predicate("has_class", single_arg("has_class", predicate::has_class));
        registry.register_predicate("role", single_arg("role", predicate::role));
        registry.register_predicate("matches", single_arg("matches", predicate::matches));
        registry
    }

    fn is_taken(&self, name: &str) -> bool {
        RESERVED_NAMES.contains(&name)
            || self.relations.contains_key(name)
            || self.predicates.contains_key(name)
    }

    /// Register a relation under its own name. Returns `false` and leaves
    /// the registry unchanged if the name is already taken.
    pub fn register_relation(&mut self, relation: Relation<E>) -> bool {
        let name = relation.name().to_string();
        if self.is_taken(&name) {
            tracing::warn!(name = %name, "Relation name already taken, not registering");
            return false;
        }
        self.relations.insert(name, relation);
        true
    }

    /// Register a predicate factory. Returns `false` if the name is taken.
    pub fn register_predicate(
        &mut self,
        name: &str,
        factory: impl Fn(&[&str]) -> Result<Predicate<E>> + 'static,
    ) -> bool {
        if self.is_taken(name) {
            tracing::warn!(name, "Predicate name already taken, not registering");
            return false;
        }
        self.predicates.insert(name.to_string(), Rc::new(factory));
        true
    }

    pub fn install(&mut self, extension: &dyn Extension<E>) {
        extension.install(self);
    }

    pub fn relation(&self, name: &str) -> Option<&Relation<E>> {
        self.relations.get(name)
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Build a registered predicate. Unknown names are configuration errors.
    pub fn predicate(&self, name: &str, args: &[&str]) -> Result<Predicate<E>> {
        let factory = self
            .predicates
            .get(name)
            .ok_or_else(|| QueryError::config(format!("unknown predicate '{name}'")))?;
        factory(args)
    }

    pub fn relation_names(&self) -> Vec<&str> {
        self.relations.keys().map(String::as_str).collect()
    }

    pub fn predicate_names(&self) -> Vec<&str> {
        self.predicates.keys().map(String::as_str).collect()
    }
}

impl<E: Element> Default for Registry<E> {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Adapt a one-string predicate constructor into a factory.
fn single_arg<E: Element>(
    name: &'static str,
    build: fn(&str) -> Predicate<E>,
) -> impl Fn(&[&str]) -> Result<Predicate<E>> {
    move |args: &[&str]| match args {
        [arg] => Ok(build(arg)),
        _ => Err(QueryError::config(format!(
            "{name}() expects exactly one argument, got {}",
            args.len()
        ))),
    }
}

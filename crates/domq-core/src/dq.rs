//! Entry point: start queries, compile reusable pipelines, install extensions.

use std::rc::Rc;

use domq_types::{Budget, Result};

use crate::element::{Candidate, Element};
use crate::predicate::Predicate;
use crate::query::{Query, Trace};
use crate::registry::{Extension, Registry};
use crate::relation::Relation;

/// Query namespace bound to one registry.
///
/// Installing an extension affects queries started afterwards; queries
/// already built keep the registry they were started with.
pub struct Dq<E> {
    registry: Rc<Registry<E>>,
}

impl<E> Clone for Dq<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<E: Element> Default for Dq<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Element> Dq<E> {
    /// A namespace with every built-in relation and predicate registered.
    pub fn new() -> Self {
        Self::with_registry(Registry::with_builtins())
    }

    pub fn with_registry(registry: Registry<E>) -> Self {
        Self {
            registry: Rc::new(registry),
        }
    }

    /// Start from one node. Text nodes resolve to their parent element; a
    /// candidate that is not an element yields an empty pipeline.
    pub fn from(&self, start: impl Candidate<E>) -> Query<E> {
        Query::from_element(start.to_element(), Rc::clone(&self.registry))
    }

    /// Start from a sequence of nodes. Non-elements are dropped.
    pub fn all<I>(&self, candidates: I) -> Query<E>
    where
        I: IntoIterator,
        I::Item: Candidate<E>,
    {
        let items: Vec<E> = candidates
            .into_iter()
            .filter_map(|c| c.element_only())
            .collect();
        let step = format!("all({} elements)", items.len());
        Query::from_elements(items, step, Rc::clone(&self.registry))
    }

    /// Install an extension into this namespace's registry.
    pub fn use_extension(&mut self, extension: &dyn Extension<E>) -> &mut Self {
        Rc::make_mut(&mut self.registry).install(extension);
        self
    }

    pub fn registry(&self) -> &Registry<E> {
        &self.registry
    }

    pub fn relation(&self, name: &str) -> Option<&Relation<E>> {
        self.registry.relation(name)
    }

    pub fn predicate(&self, name: &str, args: &[&str]) -> Result<Predicate<E>> {
        self.registry.predicate(name, args)
    }

    /// Wrap `builder` into a pipeline reusable from any start node.
    pub fn compile<F>(&self, builder: F) -> CompiledQuery<E, F> {
        CompiledQuery {
            dq: self.clone(),
            builder,
        }
    }
}

/// Per-call configuration for a compiled query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOptions {
    pub budget: Option<Budget>,
    pub debug: Option<Trace>,
}

impl CompileOptions {
    pub fn budget(budget: Budget) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }

    pub fn with_debug(mut self, trace: impl Into<Trace>) -> Self {
        self.debug = Some(trace.into());
        self
    }
}

/// A pipeline template produced by [`Dq::compile`].
pub struct CompiledQuery<E, F> {
    dq: Dq<E>,
    builder: F,
}

impl<E: Element, F> CompiledQuery<E, F> {
    pub fn run<T>(&self, start: impl Candidate<E>) -> T
    where
        F: Fn(Query<E>) -> T,
    {
        self.run_with(start, &CompileOptions::default())
    }

    /// Options are applied to the start query before the builder runs.
    pub fn run_with<T>(&self, start: impl Candidate<E>, options: &CompileOptions) -> T
    where
        F: Fn(Query<E>) -> T,
    {
        let mut query = self.dq.from(start);
        if let Some(budget) = options.budget {
            query = query.budget(budget);
        }
        if let Some(trace) = &options.debug {
            query = query.debug(trace.clone());
        }
        (self.builder)(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{fixture, FixtureElement};
    use crate::predicate::attr;
    use crate::relation::RelationArg;

    #[test]
    fn from_resolves_text_nodes_and_absent_starts() {
        let doc = fixture();
        let dq = Dq::<FixtureElement>::new();
        let a1 = doc.by_id("a1");

        let q = dq.from(doc.text_node(&a1));
        assert_eq!(q.first().unwrap(), Some(a1.clone()));

        let empty = dq.from(None::<FixtureElement>);
        assert_eq!(empty.explain(), "from(null)");
        assert_eq!(empty.count().unwrap(), 0);
        assert_eq!(empty.descendants().count().unwrap(), 0);
    }

    #[test]
    fn all_drops_non_elements() {
        let doc = fixture();
        let dq = Dq::<FixtureElement>::new();
        let a1 = doc.by_id("a1");
        let nodes = vec![
            crate::fixture::FixtureNode::Element(doc.by_id("a")),
            doc.text_node(&a1),
            crate::fixture::FixtureNode::Element(doc.by_id("b")),
        ];
        let q = dq.all(nodes);
        assert_eq!(q.to_vec().unwrap(), doc.ids(&["a", "b"]));
        assert_eq!(q.explain(), "all(2 elements)");
    }

    #[test]
    fn compiled_query_is_reusable() {
        let doc = fixture();
        let dq = Dq::<FixtureElement>::new();
        let primary = dq.compile(|q: Query<FixtureElement>| {
            q.closest(".section")
                .descendants()
                .filter(attr("data-action").eq("primary"))
                .first()
        });

        let btn = doc.by_id("btn");
        assert_eq!(primary.run(doc.by_id("a2")).unwrap(), Some(btn.clone()));
        assert_eq!(primary.run(doc.by_id("a1")).unwrap(), Some(btn));
        assert_eq!(primary.run(doc.by_id("c1")).unwrap(), None);
    }

    #[test]
    fn compile_options_apply_budget() {
        let doc = fixture();
        let dq = Dq::<FixtureElement>::new();
        let all_desc = dq.compile(|q: Query<FixtureElement>| q.descendants().to_vec());

        let err = all_desc
            .run_with(doc.root(), &CompileOptions::budget(Budget::nodes(3)))
            .unwrap_err();
        assert_eq!(err.code().as_str(), "DOMQ_BUDGET_NODES");
        assert_eq!(all_desc.run(doc.root()).unwrap().len(), 10);

        let traced = dq.compile(|q: Query<FixtureElement>| q.trace_config().clone());
        let opts = CompileOptions::default().with_debug("primary");
        assert_eq!(traced.run_with(doc.root(), &opts), Trace::Labeled("primary".into()));
    }

    #[test]
    fn extensions_reach_later_queries() {
        let doc = fixture();
        let mut dq = Dq::<FixtureElement>::new();
        let before = dq.from(doc.by_id("a"));
        assert!(before.apply("leaves", &[]).is_err());

        dq.use_extension(&|r: &mut Registry<FixtureElement>| {
            r.register_relation(Relation::new("leaves", |_: &[RelationArg<FixtureElement>]| {
                Ok(crate::relation::expand(|el: &FixtureElement, _| {
                    crate::relation::PreOrder::new(el, None)
                        .filter(|d| d.children().is_empty())
                }))
            }));
            r.register_predicate("leaf_kind", |_| Ok(attr("data-kind").eq("leaf")));
        });

        let leaves = dq.from(doc.by_id("a")).apply("leaves", &[]).unwrap();
        assert_eq!(leaves.to_vec().unwrap(), doc.ids(&["a1", "a2", "inp"]));
        assert_eq!(leaves.explain(), "from(div#a.box) -> leaves()");

        let leaf = dq.predicate("leaf_kind", &[]).unwrap();
        assert_eq!(leaves.filter(leaf).count().unwrap(), 2);
        assert!(dq.relation("leaves").is_some());
        assert!(dq.predicate("tag", &["span"]).is_ok());
    }
}

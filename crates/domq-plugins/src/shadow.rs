//! Relations that cross shadow-tree boundaries.
//!
//! The composed tree treats a slotted element as a child of its slot and the
//! top-level children of a shadow root as children of the host.

use std::iter;

use domq_core::relation;
use domq_core::{Element, Extension, Query, Registry, Relation};

/// Host access to shadow roots and slot assignment.
pub trait ShadowElement: Element {
    /// Children of the attached shadow root; empty without one.
    fn shadow_root_children(&self) -> Vec<Self>;

    /// The host element, when this element is a top-level child of a shadow
    /// root. Such elements have no light-tree `parent()`.
    fn shadow_host(&self) -> Option<Self>;

    /// The slot this element is rendered into.
    fn assigned_slot(&self) -> Option<Self>;

    fn is_slot(&self) -> bool {
        self.tag_name() == "slot"
    }

    /// Elements assigned to this slot, with nested slots flattened.
    fn assigned_elements(&self) -> Vec<Self>;
}

/// Assigned slot, else light-tree parent, else shadow host.
pub fn composed_parent<E: ShadowElement>(el: &E) -> Option<E> {
    el.assigned_slot()
        .or_else(|| el.parent())
        .or_else(|| el.shadow_host())
}

fn composed_children<E: ShadowElement>(el: &E) -> Vec<E> {
    let mut children = el.children();
    children.extend(el.shadow_root_children());
    children
}

// ---------------------------------------------------------------------------
// Expansions
// ---------------------------------------------------------------------------

fn shadow_root_of<E: ShadowElement>(el: &E, _: Option<usize>) -> std::vec::IntoIter<E> {
    el.shadow_root_children().into_iter()
}

/// Nearest first, at most `limit` levels.
fn composed_ancestors_of<E: ShadowElement>(
    el: &E,
    limit: Option<usize>,
) -> impl Iterator<Item = E> {
    iter::successors(composed_parent(el), composed_parent).take(limit.unwrap_or(usize::MAX))
}

/// Pre-order over light children then shadow-root children.
fn composed_descendants_of<E: ShadowElement>(
    el: &E,
    limit: Option<usize>,
) -> ComposedPreOrder<E> {
    ComposedPreOrder::new(el, limit)
}

fn assigned_slot_of<E: ShadowElement>(el: &E, _: Option<usize>) -> std::option::IntoIter<E> {
    el.assigned_slot().into_iter()
}

fn assigned_elements_of<E: ShadowElement>(el: &E, _: Option<usize>) -> std::vec::IntoIter<E> {
    if el.is_slot() {
        el.assigned_elements().into_iter()
    } else {
        Vec::new().into_iter()
    }
}

/// Same walk as [`PreOrder`](domq_core::relation::PreOrder), with
/// shadow-root children after light children.
pub struct ComposedPreOrder<E> {
    stack: Vec<(E, usize)>,
    limit: Option<usize>,
}

impl<E: ShadowElement> ComposedPreOrder<E> {
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
            .extend(composed_children(el).into_iter().rev().map(|c| (c, depth)));
    }
}

impl<E: ShadowElement> Iterator for ComposedPreOrder<E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        let (el, depth) = self.stack.pop()?;
        self.push_children(&el, depth + 1);
        Some(el)
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

pub fn shadow_root<E: ShadowElement>() -> Relation<E> {
    Relation::expand("shadow_root", shadow_root_of)
}

pub fn composed_ancestors<E: ShadowElement>() -> Relation<E> {
    Relation::expand("composed_ancestors", composed_ancestors_of)
}

pub fn composed_descendants<E: ShadowElement>() -> Relation<E> {
    Relation::expand("composed_descendants", composed_descendants_of)
}

pub fn assigned_slot<E: ShadowElement>() -> Relation<E> {
    Relation::expand("assigned_slot", assigned_slot_of)
}

pub fn assigned_elements<E: ShadowElement>() -> Relation<E> {
    Relation::expand("assigned_elements", assigned_elements_of)
}

/// Registers the five shadow relations by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowExtension;

impl<E: ShadowElement> Extension<E> for ShadowExtension {
    fn install(&self, registry: &mut Registry<E>) {
        let mut installed = 0;
        for rel in [
            shadow_root(),
            composed_ancestors(),
            composed_descendants(),
            assigned_slot(),
            assigned_elements(),
        ] {
            if registry.register_relation(rel) {
                installed += 1;
            }
        }
        tracing::debug!(installed, "Installed shadow relations");
    }
}

/// Typed shadow relations on [`Query`].
pub trait ShadowQueryExt<E> {
    fn shadow_root(&self) -> Query<E>;
    fn composed_ancestors(&self) -> Query<E>;
    fn composed_descendants(&self) -> Query<E>;
    fn assigned_slot(&self) -> Query<E>;
    fn assigned_elements(&self) -> Query<E>;
}

impl<E: ShadowElement> ShadowQueryExt<E> for Query<E> {
    fn shadow_root(&self) -> Query<E> {
        self.walk("shadow_root()", relation::expand(shadow_root_of))
    }

    /// Nearest first; bounded by `max_depth`.
    fn composed_ancestors(&self) -> Query<E> {
        self.walk(
            "composed_ancestors()",
            relation::expand(composed_ancestors_of),
        )
    }

    /// Pre-order; bounded by `max_depth`.
    fn composed_descendants(&self) -> Query<E> {
        self.walk(
            "composed_descendants()",
            relation::expand(composed_descendants_of),
        )
    }

    fn assigned_slot(&self) -> Query<E> {
        self.walk("assigned_slot()", relation::expand(assigned_slot_of))
    }

    fn assigned_elements(&self) -> Query<E> {
        self.walk("assigned_elements()", relation::expand(assigned_elements_of))
    }
}

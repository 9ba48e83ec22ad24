//! In-memory element tree used by unit tests.
//!
//! Selector support is limited to compound selectors (`tag`, `*`, `#id`,
//! `.class`, `[attr]`, `[attr="v"]`) and comma-separated lists. Anything else
//! is reported as a selector error.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use domq_types::SelectorError;

use crate::element::{Candidate, Element};

// ---------------------------------------------------------------------------
// Tree storage
// ---------------------------------------------------------------------------

enum Child {
    Element(usize),
    Text(String),
}

struct NodeData {
    tag: String,
    attrs: Vec<(String, String)>,
    parent: Option<usize>,
    children: Vec<Child>,
}

pub(crate) struct Builder {
    nodes: Vec<NodeData>,
    stack: Vec<usize>,
}

impl Builder {
    pub(crate) fn el(
        &mut self,
        tag: &str,
        attrs: &[(&str, &str)],
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        let id = self.nodes.len();
        let parent = self.stack.last().copied();
        self.nodes.push(NodeData {
            tag: tag.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(Child::Element(id));
        }
        self.stack.push(id);
        body(self);
        self.stack.pop();
        self
    }

    pub(crate) fn text(&mut self, text: &str) -> &mut Self {
        let parent = *self.stack.last().expect("text needs an enclosing element");
        self.nodes[parent].children.push(Child::Text(text.to_string()));
        self
    }
}

pub(crate) struct Fixture {
    tree: Rc<Vec<NodeData>>,
}

impl Fixture {
    pub(crate) fn build(f: impl FnOnce(&mut Builder)) -> Self {
        let mut builder = Builder {
            nodes: Vec::new(),
            stack: Vec::new(),
        };
        f(&mut builder);
        assert!(!builder.nodes.is_empty(), "fixture needs a root element");
        Self {
            tree: Rc::new(builder.nodes),
        }
    }

    pub(crate) fn root(&self) -> FixtureElement {
        self.handle(0)
    }

    pub(crate) fn by_id(&self, id: &str) -> FixtureElement {
        let index = self
            .tree
            .iter()
            .position(|n| n.attrs.iter().any(|(k, v)| k == "id" && v == id))
            .unwrap_or_else(|| panic!("no element with id {id:?}"));
        self.handle(index)
    }

    pub(crate) fn ids(&self, ids: &[&str]) -> Vec<FixtureElement> {
        ids.iter().map(|id| self.by_id(id)).collect()
    }

    /// A text node inside `el`, as a node candidate.
    pub(crate) fn text_node(&self, el: &FixtureElement) -> FixtureNode {
        FixtureNode::Text(el.clone())
    }

    fn handle(&self, id: usize) -> FixtureElement {
        FixtureElement {
            tree: Rc::clone(&self.tree),
            id,
        }
    }
}

/// The shared document used across unit tests.
pub(crate) fn fixture() -> Fixture {
    Fixture::build(|b| {
        b.el("div", &[("id", "root"), ("data-root", "1")], |b| {
            b.el("section", &[("id", "s1"), ("class", "section")], |b| {
                b.el("div", &[("id", "a"), ("class", "box"), ("data-x", "1")], |b| {
                    b.el("span", &[("id", "a1"), ("data-kind", "leaf")], |b| {
                        b.text("  Hello   world ");
                    });
                    b.el(
                        "span",
                        &[("id", "a2"), ("data-kind", "leaf"), ("data-x", "2")],
                        |b| {
                            b.text("Second");
                        },
                    );
                    b.el(
                        "input",
                        &[
                            ("id", "inp"),
                            ("type", "text"),
                            ("value", "yes"),
                            ("data-kebab-case", "ok"),
                        ],
                        |_| {},
                    );
                });
                b.el("div", &[("id", "b"), ("class", "box")], |b| {
                    b.el(
                        "button",
                        &[
                            ("id", "btn"),
                            ("class", "cta primary"),
                            ("data-action", "primary"),
                        ],
                        |b| {
                            b.text("Click");
                        },
                    );
                });
            });
            b.el("section", &[("id", "s2"), ("class", "section")], |b| {
                b.el("div", &[("id", "c"), ("class", "box")], |b| {
                    b.el("span", &[("id", "c1"), ("data-kind", "leaf")], |b| {
                        b.text("Third");
                    });
                });
            });
        });
    })
}

// ---------------------------------------------------------------------------
// Element handles
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct FixtureElement {
    tree: Rc<Vec<NodeData>>,
    id: usize,
}

impl FixtureElement {
    fn data(&self) -> &NodeData {
        &self.tree[self.id]
    }

    fn handle(&self, id: usize) -> Self {
        Self {
            tree: Rc::clone(&self.tree),
            id,
        }
    }

    fn sibling(&self, offset: isize) -> Option<Self> {
        let siblings = self.parent()?.children();
        let pos = siblings.iter().position(|s| s == self)? as isize + offset;
        usize::try_from(pos).ok().and_then(|p| siblings.get(p).cloned())
    }

    fn descendants(&self) -> Vec<Self> {
        let mut out = Vec::new();
        for child in self.children() {
            out.push(child.clone());
            out.extend(child.descendants());
        }
        out
    }
}

impl PartialEq for FixtureElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }
}

impl Eq for FixtureElement {}

impl Hash for FixtureElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.tree).hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for FixtureElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.data().tag)?;
        if let Some(id) = self.attribute("id") {
            write!(f, "#{id}")?;
        }
        f.write_str(">")
    }
}

impl Element for FixtureElement {
    fn parent(&self) -> Option<Self> {
        self.data().parent.map(|p| self.handle(p))
    }

    fn children(&self) -> Vec<Self> {
        self.data()
            .children
            .iter()
            .filter_map(|c| match c {
                Child::Element(id) => Some(self.handle(*id)),
                Child::Text(_) => None,
            })
            .collect()
    }

    fn next_sibling(&self) -> Option<Self> {
        self.sibling(1)
    }

    fn prev_sibling(&self) -> Option<Self> {
        self.sibling(-1)
    }

    fn tag_name(&self) -> String {
        self.data().tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.data()
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.data().attrs.clone()
    }

    fn text_content(&self) -> String {
        self.data()
            .children
            .iter()
            .map(|c| match c {
                Child::Element(id) => self.handle(*id).text_content(),
                Child::Text(t) => t.clone(),
            })
            .collect()
    }

    fn own_text(&self) -> String {
        self.data()
            .children
            .iter()
            .filter_map(|c| match c {
                Child::Text(t) => Some(t.as_str()),
                Child::Element(_) => None,
            })
            .collect()
    }

    fn form_value(&self) -> Option<String> {
        match self.data().tag.as_str() {
            "input" => Some(self.attribute("value").unwrap_or_default()),
            "textarea" => Some(self.text_content()),
            _ => None,
        }
    }

    fn matches(&self, selector: &str) -> Result<bool, SelectorError> {
        let list = parse_selector(selector)?;
        Ok(list.iter().any(|c| c.matches(self)))
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<Self>, SelectorError> {
        let list = parse_selector(selector)?;
        Ok(self
            .descendants()
            .into_iter()
            .filter(|d| list.iter().any(|c| c.matches(d)))
            .collect())
    }
}

/// A node that may or may not be an element.
pub(crate) enum FixtureNode {
    Element(FixtureElement),
    /// A text node, identified by its parent element.
    Text(FixtureElement),
}

impl Candidate<FixtureElement> for FixtureNode {
    fn to_element(self) -> Option<FixtureElement> {
        match self {
            Self::Element(el) | Self::Text(el) => Some(el),
        }
    }

    fn element_only(self) -> Option<FixtureElement> {
        match self {
            Self::Element(el) => Some(el),
            Self::Text(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Selector subset
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, el: &FixtureElement) -> bool {
        self.tag.as_ref().map_or(true, |t| *t == el.tag_name())
            && self
                .ids
                .iter()
                .all(|id| el.attribute("id").as_deref() == Some(id.as_str()))
            && self.classes.iter().all(|c| el.has_class(c))
            && self.attrs.iter().all(|(name, value)| match value {
                Some(v) => el.attribute(name).as_deref() == Some(v.as_str()),
                None => el.attribute(name).is_some(),
            })
    }
}

fn parse_selector(selector: &str) -> Result<Vec<Compound>, SelectorError> {
    selector
        .split(',')
        .map(|part| {
            parse_compound(part.trim())
                .ok_or_else(|| SelectorError::new(selector, "unsupported selector syntax"))
        })
        .collect()
}

fn ident_len(s: &str) -> usize {
    s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(s.len())
}

fn parse_compound(s: &str) -> Option<Compound> {
    if s.is_empty() {
        return None;
    }
    let mut compound = Compound::default();
    let mut rest = s;
    if let Some(tail) = rest.strip_prefix('*') {
        rest = tail;
    } else {
        let n = ident_len(rest);
        if n > 0 {
            compound.tag = Some(rest[..n].to_ascii_lowercase());
            rest = &rest[n..];
        }
    }
    while !rest.is_empty() {
        let mut chars = rest.chars();
        let kind = chars.next()?;
        let tail = chars.as_str();
        match kind {
            '#' | '.' => {
                let n = ident_len(tail);
                if n == 0 {
                    return None;
                }
                let name = tail[..n].to_string();
                if kind == '#' {
                    compound.ids.push(name);
                } else {
                    compound.classes.push(name);
                }
                rest = &tail[n..];
            }
            '[' => {
                let close = tail.find(']')?;
                let inner = &tail[..close];
                let (name, value) = match inner.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim_matches(|c| c == '"' || c == '\'');
                        (name, Some(value.to_string()))
                    }
                    None => (inner, None),
                };
                if name.is_empty() || ident_len(name) != name.len() {
                    return None;
                }
                compound.attrs.push((name.to_string(), value));
                rest = &tail[close + 1..];
            }
            _ => return None,
        }
    }
    Some(compound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_subset_matches_compounds() {
        let doc = fixture();
        let btn = doc.by_id("btn");
        assert!(btn.matches("button.cta").unwrap());
        assert!(btn.matches("[data-action=\"primary\"]").unwrap());
        assert!(btn.matches("span, .primary").unwrap());
        assert!(!btn.matches("button.secondary").unwrap());
        assert!(btn.matches("[[[").is_err());
        assert!(btn.matches("div > button").is_err());
    }

    #[test]
    fn siblings_follow_document_order() {
        let doc = fixture();
        let a2 = doc.by_id("a2");
        assert_eq!(a2.prev_sibling(), Some(doc.by_id("a1")));
        assert_eq!(a2.next_sibling(), Some(doc.by_id("inp")));
        assert_eq!(doc.by_id("inp").next_sibling(), None);
    }
}

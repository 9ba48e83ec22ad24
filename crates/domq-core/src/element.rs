//! Host tree boundary: the `Element` trait, candidate normalization, and
//! human-readable element descriptions.

use std::fmt;
use std::hash::Hash;

use domq_types::SelectorError;

// ---------------------------------------------------------------------------
// Element trait
// ---------------------------------------------------------------------------

/// A handle to an element node owned by a host tree.
///
/// Handles are cheap to clone and compare by node identity. Selector
/// evaluation is delegated to the host; the query engine never parses
/// selectors itself.
pub trait Element: Clone + Eq + Hash + fmt::Debug + 'static {
    /// Parent element, `None` at the root or when the parent is not an element.
    fn parent(&self) -> Option<Self>;

    /// Child elements in document order.
    fn children(&self) -> Vec<Self>;

    fn next_sibling(&self) -> Option<Self>;

    fn prev_sibling(&self) -> Option<Self>;

    /// Lowercase tag name.
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;

    /// All attributes as `(name, value)` pairs in source order.
    fn attributes(&self) -> Vec<(String, String)>;

    /// Concatenated text of every descendant text node.
    fn text_content(&self) -> String;

    /// Concatenated text of direct text children only.
    fn own_text(&self) -> String;

    /// Current form value for `input`, `textarea` and `select`; `None` for
    /// every other element.
    fn form_value(&self) -> Option<String>;

    fn matches(&self, selector: &str) -> Result<bool, SelectorError>;

    /// Descendants matching `selector` in document order, excluding `self`.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<Self>, SelectorError>;

    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, selector: &str) -> Result<Option<Self>, SelectorError> {
        let mut current = Some(self.clone());
        while let Some(el) = current {
            if el.matches(selector)? {
                return Ok(Some(el));
            }
            current = el.parent();
        }
        Ok(None)
    }

    fn class_list(&self) -> Vec<String> {
        self.attribute("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn has_class(&self, name: &str) -> bool {
        self.class_list().iter().any(|c| c == name)
    }

    /// `data-*` attributes keyed the way browsers expose them
    /// (`data-kebab-case` becomes `kebabCase`).
    fn dataset(&self) -> Vec<(String, String)> {
        self.attributes()
            .into_iter()
            .filter_map(|(name, value)| {
                name.strip_prefix("data-")
                    .map(|key| (camel_case(key), value.clone()))
            })
            .collect()
    }
}

/// Convert a kebab-case key to camelCase: each `-` followed by a lowercase
/// ASCII letter is dropped and the letter uppercased.
pub fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('-', Some(next)) if next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Collapse whitespace runs to a single space and trim both ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// Anything a query can start from.
///
/// Hosts with non-element nodes (text, comments) implement this for their
/// node type so `Dq::from` can resolve a text node to its parent element.
pub trait Candidate<E: Element> {
    /// Lenient conversion used for single start nodes.
    fn to_element(self) -> Option<E>;

    /// Strict conversion used for sequences: only element nodes survive.
    fn element_only(self) -> Option<E>
    where
        Self: Sized,
    {
        self.to_element()
    }
}

impl<E: Element> Candidate<E> for E {
    fn to_element(self) -> Option<E> {
        Some(self)
    }
}

impl<E: Element> Candidate<E> for &E {
    fn to_element(self) -> Option<E> {
        Some(self.clone())
    }
}

impl<E: Element> Candidate<E> for Option<E> {
    fn to_element(self) -> Option<E> {
        self
    }
}

// ---------------------------------------------------------------------------
// Descriptions
// ---------------------------------------------------------------------------

const DESCRIBED_ATTRIBUTES: &[&str] = &[
    "data-testid",
    "data-test",
    "data-qa",
    "name",
    "role",
    "aria-label",
];

/// Short description such as `button#save.cta.primary[data-testid="save"]`.
///
/// Includes at most three classes and two identifying attributes.
pub fn describe_element<E: Element>(el: &E) -> String {
    let mut out = el.tag_name();
    if let Some(id) = el.attribute("id").filter(|id| !id.is_empty()) {
        out.push('#');
        out.push_str(&id);
    }
    for class in el.class_list().iter().take(3) {
        out.push('.');
        out.push_str(class);
    }
    let attrs: Vec<String> = DESCRIBED_ATTRIBUTES
        .iter()
        .filter_map(|name| {
            el.attribute(name)
                .filter(|value| !value.is_empty())
                .map(|value| format!("{name}={value:?}"))
        })
        .take(2)
        .collect();
    if !attrs.is_empty() {
        out.push('[');
        out.push_str(&attrs.join(" "));
        out.push(']');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{fixture, Fixture, FixtureElement};

    #[test]
    fn camel_case_follows_dataset_rules() {
        assert_eq!(camel_case("kebab-case"), "kebabCase");
        assert_eq!(camel_case("x"), "x");
        assert_eq!(camel_case("a-1"), "a-1");
        assert_eq!(camel_case("multi-word-key"), "multiWordKey");
    }

    #[test]
    fn normalize_text_collapses_whitespace() {
        assert_eq!(normalize_text("  Hello   world "), "Hello world");
        assert_eq!(normalize_text("\n\t"), "");
    }

    #[test]
    fn dataset_is_derived_from_data_attributes() {
        let doc = fixture();
        let inp = doc.by_id("inp");
        assert!(inp
            .dataset()
            .contains(&("kebabCase".to_string(), "ok".to_string())));
    }

    #[test]
    fn closest_is_inclusive() {
        let doc = fixture();
        let a1 = doc.by_id("a1");
        assert_eq!(a1.closest("span").unwrap(), Some(a1.clone()));
        assert_eq!(a1.closest(".section").unwrap(), Some(doc.by_id("s1")));
        assert_eq!(a1.closest("table").unwrap(), None);
    }

    #[test]
    fn describe_element_lists_id_classes_and_attributes() {
        let doc = Fixture::build(|b| {
            b.el(
                "button",
                &[
                    ("id", "save"),
                    ("class", "a b c d"),
                    ("name", "save"),
                    ("role", "button"),
                    ("aria-label", "Save"),
                ],
                |_| {},
            );
        });
        let button = doc.root();
        assert_eq!(
            describe_element(&button),
            r#"button#save.a.b.c[name="save" role="button"]"#
        );
    }

    #[test]
    fn describe_element_skips_empty_attributes() {
        let doc = Fixture::build(|b| {
            b.el(
                "button",
                &[("id", "b"), ("name", ""), ("role", "button"), ("aria-label", "Go")],
                |_| {},
            );
        });
        assert_eq!(
            describe_element(&doc.root()),
            r#"button#b[role="button" aria-label="Go"]"#
        );
    }

    #[test]
    fn candidates_normalize_to_elements() {
        let doc = fixture();
        let a = doc.by_id("a");
        assert_eq!(Candidate::<FixtureElement>::to_element(&a), Some(a.clone()));
        assert_eq!(Candidate::<FixtureElement>::to_element(Some(a.clone())), Some(a.clone()));
        assert_eq!(Candidate::<FixtureElement>::to_element(None::<FixtureElement>), None);
    }
}

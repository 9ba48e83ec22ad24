//! Composable, self-describing element predicates.
//!
//! Comparator predicates are built in two steps: a field selector such as
//! [`attr`] or [`text`] returns a [`Comparator`], and a comparison on it
//! returns a [`Predicate`]. Every predicate carries a description that shows
//! up in `explain()` output.

use std::fmt;
use std::ops::Not;
use std::rc::Rc;

use regex::Regex;

use domq_types::{QueryError, Result};

use crate::element::{camel_case, normalize_text, Element};

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// A reusable element test paired with its description.
pub struct Predicate<E> {
    test: Rc<dyn Fn(&E) -> bool>,
    description: Rc<str>,
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self {
            test: Rc::clone(&self.test),
            description: Rc::clone(&self.description),
        }
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.description).finish()
    }
}

impl<E> fmt::Display for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl<E: Element> Predicate<E> {
    pub fn new(description: impl Into<String>, test: impl Fn(&E) -> bool + 'static) -> Self {
        Self {
            test: Rc::new(test),
            description: description.into().into(),
        }
    }

    pub fn test(&self, el: &E) -> bool {
        (self.test)(el)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Replace the description, keeping the test.
    pub fn describe(self, description: impl Into<String>) -> Self {
        Self {
            test: self.test,
            description: description.into().into(),
        }
    }

    pub fn and(self, other: Predicate<E>) -> Self {
        and([self, other])
    }

    pub fn or(self, other: Predicate<E>) -> Self {
        or([self, other])
    }
}

impl<E: Element> Not for Predicate<E> {
    type Output = Predicate<E>;

    fn not(self) -> Self::Output {
        not(self)
    }
}

/// Wrap an arbitrary closure. The description is `predicate`.
pub fn predicate<E: Element>(test: impl Fn(&E) -> bool + 'static) -> Predicate<E> {
    Predicate::new("predicate", test)
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

/// Anything that contributes predicates to [`and`] or [`or`]: a single
/// predicate, an optional one, or a nested list of either.
pub trait IntoPredicates<E> {
    fn push_into(self, out: &mut Vec<Predicate<E>>);
}

impl<E> IntoPredicates<E> for Predicate<E> {
    fn push_into(self, out: &mut Vec<Predicate<E>>) {
        out.push(self);
    }
}

impl<E, T: IntoPredicates<E>> IntoPredicates<E> for Option<T> {
    fn push_into(self, out: &mut Vec<Predicate<E>>) {
        if let Some(inner) = self {
            inner.push_into(out);
        }
    }
}

impl<E, T: IntoPredicates<E>> IntoPredicates<E> for Vec<T> {
    fn push_into(self, out: &mut Vec<Predicate<E>>) {
        for item in self {
            item.push_into(out);
        }
    }
}

impl<E, T: IntoPredicates<E>, const N: usize> IntoPredicates<E> for [T; N] {
    fn push_into(self, out: &mut Vec<Predicate<E>>) {
        for item in self {
            item.push_into(out);
        }
    }
}

fn collect_present<E, I>(predicates: I) -> Vec<Predicate<E>>
where
    I: IntoIterator,
    I::Item: IntoPredicates<E>,
{
    let mut out = Vec::new();
    for item in predicates {
        item.push_into(&mut out);
    }
    out
}

fn join_descriptions<E>(predicates: &[Predicate<E>], op: &str) -> String {
    let parts: Vec<&str> = predicates.iter().map(|p| &*p.description).collect();
    format!("({})", parts.join(op))
}

/// True when every present predicate passes. `None` entries are ignored and
/// nested lists are flattened.
pub fn and<E, I>(predicates: I) -> Predicate<E>
where
    E: Element,
    I: IntoIterator,
    I::Item: IntoPredicates<E>,
{
    let list = collect_present(predicates);
    let description = join_descriptions(&list, " AND ");
    Predicate::new(description, move |el| list.iter().all(|p| p.test(el)))
}

/// True when any present predicate passes. `None` entries are ignored and
/// nested lists are flattened.
pub fn or<E, I>(predicates: I) -> Predicate<E>
where
    E: Element,
    I: IntoIterator,
    I::Item: IntoPredicates<E>,
{
    let list = collect_present(predicates);
    let description = join_descriptions(&list, " OR ");
    Predicate::new(description, move |el| list.iter().any(|p| p.test(el)))
}

pub fn not<E: Element>(predicate: Predicate<E>) -> Predicate<E> {
    let description = format!("NOT({})", predicate.description);
    Predicate::new(description, move |el| !predicate.test(el))
}

// ---------------------------------------------------------------------------
// Direct predicates
// ---------------------------------------------------------------------------

pub fn tag<E: Element>(name: &str) -> Predicate<E> {
    let name = name.to_ascii_lowercase();
    Predicate::new(format!("tag({name:?})"), move |el: &E| el.tag_name() == name)
}

pub fn has_class<E: Element>(class: &str) -> Predicate<E> {
    let class = class.to_string();
    Predicate::new(format!("has_class({class:?})"), move |el: &E| {
        el.has_class(&class)
    })
}

pub fn role<E: Element>(role: &str) -> Predicate<E> {
    let role = role.to_string();
    Predicate::new(format!("role({role:?})"), move |el: &E| {
        el.attribute("role").as_deref() == Some(role.as_str())
    })
}

/// Host selector match. Invalid selectors never match.
pub fn matches<E: Element>(selector: &str) -> Predicate<E> {
    let selector = selector.to_string();
    Predicate::new(format!("matches({selector:?})"), move |el: &E| {
        el.matches(&selector).unwrap_or(false)
    })
}

// ---------------------------------------------------------------------------
// Comparators
// ---------------------------------------------------------------------------

type Reader<E> = Rc<dyn Fn(&E) -> Option<String>>;

/// A field read from an element, ready to be compared.
pub struct Comparator<E> {
    label: String,
    read: Reader<E>,
}

impl<E> Clone for Comparator<E> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            read: Rc::clone(&self.read),
        }
    }
}

pub fn attr<E: Element>(name: &str) -> Comparator<E> {
    let name = name.to_string();
    Comparator::new(format!("attr({name:?})"), move |el: &E| el.attribute(&name))
}

/// Dataset value: exact key, then the camel-cased key, then the raw
/// `data-<key>` attribute.
pub fn data<E: Element>(key: &str) -> Comparator<E> {
    let key = key.to_string();
    let camel = camel_case(&key);
    let raw = format!("data-{key}");
    Comparator::new(format!("data({key:?})"), move |el: &E| {
        let dataset = el.dataset();
        let lookup = |k: &str| dataset.iter().find(|(name, _)| name == k).map(|(_, v)| v.clone());
        lookup(&key)
            .or_else(|| lookup(&camel))
            .or_else(|| el.attribute(&raw))
    })
}

/// Alias of [`data`].
pub fn dataset<E: Element>(key: &str) -> Comparator<E> {
    data(key)
}

/// Whitespace-normalized text content.
pub fn text<E: Element>() -> Comparator<E> {
    Comparator::new("text()", |el: &E| Some(normalize_text(&el.text_content())))
}

/// Whitespace-normalized text of direct text children only.
pub fn own_text<E: Element>() -> Comparator<E> {
    Comparator::new("own_text()", |el: &E| Some(normalize_text(&el.own_text())))
}

/// Form value; empty for elements without one.
pub fn value<E: Element>() -> Comparator<E> {
    Comparator::new("value()", |el: &E| Some(el.form_value().unwrap_or_default()))
}

impl<E: Element> Comparator<E> {
    pub fn new(label: impl Into<String>, read: impl Fn(&E) -> Option<String> + 'static) -> Self {
        Self {
            label: label.into(),
            read: Rc::new(read),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn check(&self, suffix: String, test: impl Fn(Option<String>) -> bool + 'static) -> Predicate<E> {
        let read = Rc::clone(&self.read);
        Predicate::new(format!("{}{suffix}", self.label), move |el| test(read(el)))
    }

    /// Compare against the field read as `""` when absent.
    fn check_str(&self, suffix: String, test: impl Fn(&str) -> bool + 'static) -> Predicate<E> {
        self.check(suffix, move |v| test(v.as_deref().unwrap_or("")))
    }

    fn check_number(&self, op: &str, n: f64, test: fn(f64, f64) -> bool) -> Predicate<E> {
        self.check(format!(" {op} {}", format_number(n)), move |v| {
            test(to_number(v.as_deref()), n)
        })
    }

    pub fn exists(&self) -> Predicate<E> {
        self.check(".exists()".into(), |v| v.is_some_and(|v| !v.is_empty()))
    }

    /// Same test as [`Comparator::exists`], described as `.truthy()`.
    pub fn truthy(&self) -> Predicate<E> {
        self.check(".truthy()".into(), |v| v.is_some_and(|v| !v.is_empty()))
    }

    pub fn eq(&self, expected: impl Into<String>) -> Predicate<E> {
        let expected = expected.into();
        self.check(format!(" == {expected:?}"), move |v| {
            v.as_deref() == Some(expected.as_str())
        })
    }

    /// Absent fields count as not equal.
    pub fn ne(&self, expected: impl Into<String>) -> Predicate<E> {
        let expected = expected.into();
        self.check(format!(" != {expected:?}"), move |v| {
            v.as_deref() != Some(expected.as_str())
        })
    }

    pub fn includes(&self, needle: impl Into<String>) -> Predicate<E> {
        let needle = needle.into();
        self.check_str(format!(".includes({needle:?})"), move |v| v.contains(&needle))
    }

    pub fn starts_with(&self, prefix: impl Into<String>) -> Predicate<E> {
        let prefix = prefix.into();
        self.check_str(format!(".starts_with({prefix:?})"), move |v| {
            v.starts_with(&prefix)
        })
    }

    pub fn ends_with(&self, suffix: impl Into<String>) -> Predicate<E> {
        let suffix = suffix.into();
        self.check_str(format!(".ends_with({suffix:?})"), move |v| v.ends_with(&suffix))
    }

    pub fn matches(&self, pattern: Regex) -> Predicate<E> {
        self.check_str(format!(".matches(/{}/)", pattern.as_str()), move |v| {
            pattern.is_match(v)
        })
    }

    /// Compile `pattern` and match against it.
    pub fn matches_pattern(&self, pattern: &str) -> Result<Predicate<E>> {
        let re = Regex::new(pattern)
            .map_err(|e| QueryError::config(format!("invalid pattern {pattern:?}: {e}")))?;
        Ok(self.matches(re))
    }

    pub fn gt(&self, n: f64) -> Predicate<E> {
        self.check_number(">", n, |a, b| a > b)
    }

    pub fn gte(&self, n: f64) -> Predicate<E> {
        self.check_number(">=", n, |a, b| a >= b)
    }

    pub fn lt(&self, n: f64) -> Predicate<E> {
        self.check_number("<", n, |a, b| a < b)
    }

    pub fn lte(&self, n: f64) -> Predicate<E> {
        self.check_number("<=", n, |a, b| a <= b)
    }
}

/// Absent, blank, or unparsable values become NaN.
fn to_number(value: Option<&str>) -> f64 {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

//! Layout-dependent predicates: visibility, viewport intersection, computed
//! style and box size.
//!
//! These read rendered geometry, so they only make sense for hosts that run
//! layout. The host exposes it through [`LayoutElement`].

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use domq_core::{Element, Extension, Predicate, QueryError, Registry, Result};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A box in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Resolved style properties keyed by CSS property name.
pub type ComputedStyle = BTreeMap<String, String>;

/// Host access to rendered layout.
pub trait LayoutElement: Element {
    /// `None` when the host cannot compute a style for this element.
    fn computed_style(&self) -> Option<ComputedStyle>;

    fn bounding_rect(&self) -> Rect;

    /// One rect per rendered box; empty when the element generates no boxes.
    fn client_rects(&self) -> Vec<Rect>;

    fn viewport(&self) -> Viewport;
}

/// Property lookup; an unset property reads as `""`.
fn style_value<E: LayoutElement>(el: &E, property: &str) -> Option<String> {
    el.computed_style()
        .map(|style| style.get(property).cloned().unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Rendered: displayed, not hidden, not fully transparent, and has boxes.
pub fn visible<E: LayoutElement>() -> Predicate<E> {
    Predicate::new("visible()", |el: &E| {
        let Some(style) = el.computed_style() else {
            return false;
        };
        let prop = |name: &str| style.get(name).map(String::as_str).unwrap_or("");
        if prop("display") == "none" || prop("visibility") == "hidden" {
            return false;
        }
        if prop("opacity").trim().parse::<f64>().is_ok_and(|o| o == 0.0) {
            return false;
        }
        !el.client_rects().is_empty()
    })
}

/// At least `threshold` (0.0 to 1.0) of the element's box lies inside the
/// viewport. Zero-area boxes and empty viewports never match.
pub fn in_viewport<E: LayoutElement>(threshold: f64) -> Predicate<E> {
    Predicate::new(format!("in_viewport(threshold={threshold})"), move |el: &E| {
        let viewport = el.viewport();
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return false;
        }
        let r = el.bounding_rect();
        let area = r.area();
        if area == 0.0 {
            return false;
        }
        let visible_w = (viewport.width.min(r.right()) - r.left.max(0.0)).max(0.0);
        let visible_h = (viewport.height.min(r.bottom()) - r.top.max(0.0)).max(0.0);
        visible_w * visible_h / area >= threshold
    })
}

/// Comparisons against one computed style property.
pub fn style(property: &str) -> StyleComparator {
    StyleComparator {
        property: property.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct StyleComparator {
    property: String,
}

impl StyleComparator {
    fn label(&self) -> String {
        format!("style({:?})", self.property)
    }

    /// Elements without a computed style never match.
    pub fn eq<E: LayoutElement>(&self, expected: impl Into<String>) -> Predicate<E> {
        let expected = expected.into();
        let property = self.property.clone();
        Predicate::new(format!("{} == {expected:?}", self.label()), move |el: &E| {
            style_value(el, &property).is_some_and(|v| v == expected)
        })
    }

    /// Elements without a computed style never match.
    pub fn ne<E: LayoutElement>(&self, expected: impl Into<String>) -> Predicate<E> {
        let expected = expected.into();
        let property = self.property.clone();
        Predicate::new(format!("{} != {expected:?}", self.label()), move |el: &E| {
            style_value(el, &property).is_some_and(|v| v != expected)
        })
    }

    pub fn matches<E: LayoutElement>(&self, pattern: Regex) -> Predicate<E> {
        let property = self.property.clone();
        Predicate::new(
            format!("{}.matches(/{}/)", self.label(), pattern.as_str()),
            move |el: &E| pattern.is_match(&style_value(el, &property).unwrap_or_default()),
        )
    }

    pub fn includes<E: LayoutElement>(&self, needle: impl Into<String>) -> Predicate<E> {
        let needle = needle.into();
        let property = self.property.clone();
        Predicate::new(
            format!("{}.includes({needle:?})", self.label()),
            move |el: &E| {
                style_value(el, &property)
                    .unwrap_or_default()
                    .contains(&needle)
            },
        )
    }
}

/// Comparisons against the bounding rect's size.
pub fn rect() -> RectMeasures {
    RectMeasures
}

#[derive(Debug, Clone, Copy)]
pub struct RectMeasures;

impl RectMeasures {
    pub fn width(&self) -> Measure {
        Measure::Width
    }

    pub fn height(&self) -> Measure {
        Measure::Height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Width,
    Height,
}

impl Measure {
    fn name(self) -> &'static str {
        match self {
            Measure::Width => "width",
            Measure::Height => "height",
        }
    }

    fn read(self, r: &Rect) -> f64 {
        match self {
            Measure::Width => r.width,
            Measure::Height => r.height,
        }
    }

    pub fn gt<E: LayoutElement>(self, n: f64) -> Predicate<E> {
        Predicate::new(format!("rect().{} > {n}", self.name()), move |el: &E| {
            self.read(&el.bounding_rect()) > n
        })
    }

    pub fn lt<E: LayoutElement>(self, n: f64) -> Predicate<E> {
        Predicate::new(format!("rect().{} < {n}", self.name()), move |el: &E| {
            self.read(&el.bounding_rect()) < n
        })
    }
}

// ---------------------------------------------------------------------------
// Extension
// ---------------------------------------------------------------------------

/// Registers `visible`, `in_viewport` and `style` as named predicates.
///
/// - `visible()`
/// - `in_viewport(threshold?)`, threshold defaults to 0
/// - `style(property, value)`, equality
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutExtension;

impl<E: LayoutElement> Extension<E> for LayoutExtension {
    fn install(&self, registry: &mut Registry<E>) {
        registry.register_predicate("visible", |_| Ok(visible()));
        registry.register_predicate("in_viewport", |args| {
            let threshold = match args.first() {
                Some(raw) => parse_threshold(raw)?,
                None => 0.0,
            };
            Ok(in_viewport(threshold))
        });
        registry.register_predicate("style", |args| match args {
            [property, value, ..] => Ok(style(property).eq(*value)),
            _ => Err(QueryError::config(
                "style(property, value) requires two arguments",
            )),
        });
        tracing::debug!("Installed layout predicates");
    }
}

fn parse_threshold(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|t| (0.0..=1.0).contains(t))
        .ok_or_else(|| {
            QueryError::config(format!(
                "in_viewport(threshold) expects a number between 0 and 1, got {raw:?}"
            ))
        })
}

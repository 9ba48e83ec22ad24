//! domq host adapter for HTML parsed with `scraper`.
//!
//! ```ignore
//! let doc = HtmlDocument::parse(r#"<div id="root"><button class="cta">Go</button></div>"#);
//! let dq = Dq::new();
//! let button = dq.from(doc.root()).find("button.cta").one()?;
//! ```

mod element;

use std::rc::Rc;

use scraper::{ElementRef, Html, Selector};

use domq_core::SelectorError;

pub use element::{HtmlElement, HtmlNode};

/// A parsed HTML document shared by every handle into it.
#[derive(Clone)]
pub struct HtmlDocument {
    html: Rc<Html>,
}

impl HtmlDocument {
    /// Parse a full document. Parsing is lenient; recoverable errors are
    /// logged and the tree is built anyway.
    pub fn parse(source: &str) -> Self {
        Self::from_html(Html::parse_document(source))
    }

    /// Parse a fragment; the result is rooted at a synthetic `<html>` element.
    pub fn parse_fragment(source: &str) -> Self {
        Self::from_html(Html::parse_fragment(source))
    }

    fn from_html(html: Html) -> Self {
        if !html.errors.is_empty() {
            tracing::debug!(errors = html.errors.len(), "HTML parsed with recoverable errors");
        }
        Self {
            html: Rc::new(html),
        }
    }

    /// The `<html>` element.
    pub fn root(&self) -> HtmlElement {
        HtmlElement::new(Rc::clone(&self.html), self.html.root_element().id())
    }

    pub fn element_by_id(&self, id: &str) -> Option<HtmlElement> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().id() == Some(id))
            .map(|el| HtmlElement::new(Rc::clone(&self.html), el.id()))
    }

    /// Every element matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> Result<Vec<HtmlElement>, SelectorError> {
        let parsed = parse_selector(selector)?;
        Ok(self
            .html
            .select(&parsed)
            .map(|el| HtmlElement::new(Rc::clone(&self.html), el.id()))
            .collect())
    }
}

impl std::fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlDocument")
            .field("nodes", &self.html.root_element().descendants().count())
            .finish()
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|err| SelectorError::new(selector, err.to_string()))
}

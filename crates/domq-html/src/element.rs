use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Node};

use domq_core::{describe_element, normalize_text, Candidate, Element, SelectorError};

use crate::parse_selector;

// ---------------------------------------------------------------------------
// HtmlElement
// ---------------------------------------------------------------------------

/// Handle to an element node inside an [`HtmlDocument`](crate::HtmlDocument).
#[derive(Clone)]
pub struct HtmlElement {
    doc: Rc<Html>,
    id: NodeId,
}

impl HtmlElement {
    pub(crate) fn new(doc: Rc<Html>, id: NodeId) -> Self {
        Self { doc, id }
    }

    fn element(&self) -> ElementRef<'_> {
        self.doc
            .tree
            .get(self.id)
            .and_then(ElementRef::wrap)
            .expect("HtmlElement always refers to an element node")
    }

    fn handle(&self, el: ElementRef<'_>) -> Self {
        Self::new(Rc::clone(&self.doc), el.id())
    }

    /// All child nodes, text and comments included.
    pub fn child_nodes(&self) -> Vec<HtmlNode> {
        self.element()
            .children()
            .map(|n| HtmlNode::new(Rc::clone(&self.doc), n.id()))
            .collect()
    }

    pub fn as_node(&self) -> HtmlNode {
        HtmlNode::new(Rc::clone(&self.doc), self.id)
    }

    /// Serialized outer HTML.
    pub fn outer_html(&self) -> String {
        self.element().html()
    }

    fn option_value(option: ElementRef<'_>) -> String {
        match option.value().attr("value") {
            Some(v) => v.to_string(),
            None => normalize_text(&option.text().collect::<String>()),
        }
    }

    /// Selected option of a `<select>`, falling back to the first option.
    fn select_value(&self) -> String {
        let options: Vec<ElementRef<'_>> = self
            .element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "option")
            .collect();
        options
            .iter()
            .find(|o| o.value().attr("selected").is_some())
            .or_else(|| options.first())
            .map(|o| Self::option_value(*o))
            .unwrap_or_default()
    }
}

impl PartialEq for HtmlElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.doc, &other.doc) && self.id == other.id
    }
}

impl Eq for HtmlElement {}

impl Hash for HtmlElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.doc).hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for HtmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HtmlElement({})", describe_element(self))
    }
}

impl Element for HtmlElement {
    fn parent(&self) -> Option<Self> {
        self.element()
            .parent()
            .and_then(ElementRef::wrap)
            .map(|p| self.handle(p))
    }

    fn children(&self) -> Vec<Self> {
        self.element()
            .children()
            .filter_map(ElementRef::wrap)
            .map(|c| self.handle(c))
            .collect()
    }

    fn next_sibling(&self) -> Option<Self> {
        self.element()
            .next_siblings()
            .find_map(ElementRef::wrap)
            .map(|s| self.handle(s))
    }

    fn prev_sibling(&self) -> Option<Self> {
        self.element()
            .prev_siblings()
            .find_map(ElementRef::wrap)
            .map(|s| self.handle(s))
    }

    fn tag_name(&self) -> String {
        self.element().value().name().to_ascii_lowercase()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.element().value().attr(name).map(str::to_string)
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.element()
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn text_content(&self) -> String {
        self.element().text().collect()
    }

    fn own_text(&self) -> String {
        self.element()
            .children()
            .filter_map(|n| n.value().as_text().map(|t| String::from(&**t)))
            .collect()
    }

    fn form_value(&self) -> Option<String> {
        match self.element().value().name() {
            "input" => Some(self.attribute("value").unwrap_or_default()),
            "textarea" => Some(self.text_content()),
            "select" => Some(self.select_value()),
            _ => None,
        }
    }

    fn matches(&self, selector: &str) -> Result<bool, SelectorError> {
        let parsed = parse_selector(selector)?;
        Ok(parsed.matches(&self.element()))
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<Self>, SelectorError> {
        let parsed = parse_selector(selector)?;
        Ok(self
            .element()
            .select(&parsed)
            .filter(|el| el.id() != self.id)
            .map(|el| self.handle(el))
            .collect())
    }

    fn closest(&self, selector: &str) -> Result<Option<Self>, SelectorError> {
        let parsed = parse_selector(selector)?;
        let mut current = Some(self.element());
        while let Some(el) = current {
            if parsed.matches(&el) {
                return Ok(Some(self.handle(el)));
            }
            current = el.parent().and_then(ElementRef::wrap);
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// HtmlNode
// ---------------------------------------------------------------------------

/// Handle to any node: element, text, comment, or the document itself.
#[derive(Clone)]
pub struct HtmlNode {
    doc: Rc<Html>,
    id: NodeId,
}

impl HtmlNode {
    fn new(doc: Rc<Html>, id: NodeId) -> Self {
        Self { doc, id }
    }

    fn with_node<T>(&self, f: impl FnOnce(&Node) -> T) -> Option<T> {
        self.doc.tree.get(self.id).map(|n| f(n.value()))
    }

    pub fn is_element(&self) -> bool {
        self.with_node(Node::is_element).unwrap_or(false)
    }

    pub fn is_text(&self) -> bool {
        self.with_node(Node::is_text).unwrap_or(false)
    }
}

impl fmt::Debug for HtmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_element() {
            "element"
        } else if self.is_text() {
            "text"
        } else {
            "other"
        };
        write!(f, "HtmlNode({kind})")
    }
}

impl Candidate<HtmlElement> for HtmlNode {
    /// Elements map to themselves, text nodes to their parent element.
    fn to_element(self) -> Option<HtmlElement> {
        let node = self.doc.tree.get(self.id)?;
        let target = if node.value().is_text() {
            node.parent().and_then(ElementRef::wrap)?
        } else {
            ElementRef::wrap(node)?
        };
        Some(HtmlElement::new(Rc::clone(&self.doc), target.id()))
    }

    fn element_only(self) -> Option<HtmlElement> {
        let node = self.doc.tree.get(self.id)?;
        ElementRef::wrap(node).map(|el| HtmlElement::new(Rc::clone(&self.doc), el.id()))
    }
}

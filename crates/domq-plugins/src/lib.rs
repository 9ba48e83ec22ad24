//! Optional domq extensions for hosts that can provide more than the plain
//! element tree.
//!
//! - [`layout`]: visibility, viewport, computed style and box-size predicates
//!   for hosts implementing [`LayoutElement`].
//! - [`shadow`]: composed-tree relations for hosts implementing
//!   [`ShadowElement`].

pub mod layout;
pub mod shadow;

pub use layout::{in_viewport, rect, style, visible, LayoutElement, LayoutExtension, Rect, Viewport};
pub use shadow::{composed_parent, ShadowElement, ShadowExtension, ShadowQueryExt};

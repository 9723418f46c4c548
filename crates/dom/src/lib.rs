//! # Vellum DOM
//!
//! Arena-backed document tree for rich-text documents.
//!
//! Nodes live in a slab owned by [`Tree`]; a [`NodeId`] is a stable index
//! that is never reused, so holders of an id (caches, bookmarks) can always
//! re-validate it against the tree instead of dangling.

pub mod iterator;
pub mod tree;

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub use iterator::{DomPoint, PositionIterator};
pub use tree::{NodeId, NodeKind, Tree};

/// ODF text namespace (paragraphs, spans, whitespace elements)
pub const TEXT_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:text:1.0";
/// ODF office namespace (document roots)
pub const OFFICE_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:office:1.0";
/// ODF style namespace
pub const STYLE_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:style:1.0";

/// Well-known namespace prefixes
static PREFIXES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("text", TEXT_NS);
    map.insert("office", OFFICE_NS);
    map.insert("style", STYLE_NS);
    map
});

/// Namespace-qualified name of an element or attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    /// Namespace URI
    pub ns: String,
    /// Local name
    pub local: String,
}

impl QName {
    pub fn new(ns: &str, local: &str) -> Self {
        Self {
            ns: ns.to_string(),
            local: local.to_string(),
        }
    }

    /// `text:*` name
    pub fn text(local: &str) -> Self {
        Self::new(TEXT_NS, local)
    }

    /// `office:*` name
    pub fn office(local: &str) -> Self {
        Self::new(OFFICE_NS, local)
    }

    /// `style:*` name
    pub fn style(local: &str) -> Self {
        Self::new(STYLE_NS, local)
    }

    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.ns == ns && self.local == local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match PREFIXES.iter().find(|(_, uri)| **uri == self.ns) {
            Some((prefix, _)) => write!(f, "{}:{}", prefix, self.local),
            None => write!(f, "{{{}}}{}", self.ns, self.local),
        }
    }
}

/// Is this element name a paragraph-level block (`text:p` / `text:h`)?
pub fn is_paragraph_name(name: &QName) -> bool {
    name.ns == TEXT_NS && (name.local == "p" || name.local == "h")
}

/// Is this element name an inline grouping element (`text:span`)?
pub fn is_grouping_name(name: &QName) -> bool {
    is_paragraph_name(name) || (name.ns == TEXT_NS && name.local == "span")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_display() {
        assert_eq!(QName::text("p").to_string(), "text:p");
        assert_eq!(QName::new("urn:x", "y").to_string(), "{urn:x}y");
    }

    #[test]
    fn test_paragraph_names() {
        assert!(is_paragraph_name(&QName::text("p")));
        assert!(is_paragraph_name(&QName::text("h")));
        assert!(!is_paragraph_name(&QName::text("span")));
        assert!(is_grouping_name(&QName::text("span")));
    }
}

//! Small navigation helpers over a parsed `scraper::Html` tree.
//!
//! The documentation pages are addressed by element ids and sibling
//! relationships ("the table after the heading with id X"), which CSS
//! selectors cannot express, so these walk the tree directly.

use std::collections::HashMap;

use scraper::{ElementRef, Html};

/// Concatenated text content of an element and its descendants.
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// First element in document order whose `id` attribute equals `id`.
pub fn element_by_id<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(id))
}

/// Element siblings after `element` with the given tag name.
pub fn following_siblings<'a>(
    element: ElementRef<'a>,
    tag: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

/// Direct element children with the given tag name.
pub fn children<'a>(
    element: ElementRef<'a>,
    tag: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

/// Rows that belong to `table` itself, looking through the `thead`/`tbody`/
/// `tfoot` wrappers the HTML parser inserts. Rows of nested tables are not
/// included.
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(children(child, "tr")),
            _ => {}
        }
    }
    rows
}

/// Lookup table from `id` attribute to element, built in one pass.
///
/// Duplicate ids keep the first element in document order.
pub struct IdIndex<'a> {
    elements: HashMap<&'a str, ElementRef<'a>>,
}

impl<'a> IdIndex<'a> {
    pub fn build(document: &'a Html) -> Self {
        let mut elements = HashMap::new();
        for el in document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
        {
            if let Some(id) = el.value().id() {
                elements.entry(id).or_insert(el);
            }
        }
        Self { elements }
    }

    pub fn get(&self, id: &str) -> Option<ElementRef<'a>> {
        self.elements.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

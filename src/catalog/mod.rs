//! Source-specific catalog collaborators.
//!
//! A catalog knows how to turn a catalog ID into a manifest URL and how to
//! scrape the catalog page into a [`HeaderArtifact`](crate::header::HeaderArtifact).
//!
//! - [`ColendaCatalog`] - Penn Libraries' Colenda repository
//! - [`FolgerCatalog`] - Folger Shakespeare Library digital collections

mod colenda;
mod folger;

use html_escape::decode_html_entities;

use crate::header::Property;

pub use colenda::{COLENDA_BASE_URL, ColendaCatalog, parse_catalog_page};
pub use folger::{FOLGER_BASE_URL, FolgerCatalog, parse_folger_page};

/// A `dt` or `dd` entry of a description list, in document order.
pub(crate) enum Term {
    Key(String),
    Value(String),
}

/// Pairs each `dt` with the `dd` right after it; a `dt` without one gets
/// an empty value and stray `dd`s are dropped.
pub(crate) fn pair_terms(terms: Vec<Term>) -> Vec<Property> {
    let mut properties = Vec::new();
    let mut terms = terms.into_iter().peekable();
    while let Some(term) = terms.next() {
        let Term::Key(key) = term else { continue };
        let value = match terms.next_if(|next| matches!(next, Term::Value(_))) {
            Some(Term::Value(value)) => value,
            _ => String::new(),
        };
        properties.push(Property::new(clean_text(&key), clean_text(&value)));
    }
    properties
}

/// Decodes references, then collapses whitespace.
pub(crate) fn clean_text(raw: &str) -> String {
    normalize_whitespace(&decode_entities(raw))
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decodes named and numeric character references in scraped text.
pub(crate) fn decode_entities(text: &str) -> String {
    decode_html_entities(text).into_owned()
}

//! Folger Shakespeare Library digital collections.
//!
//! Unlike Colenda, the manifest URL cannot be derived from the catalog ID;
//! it is read off the catalog page, so the header must be acquired before
//! anything else can start.

use std::cell::RefCell;

use async_trait::async_trait;
use lol_html::{HtmlRewriter, Settings, element, text};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{Term, clean_text, decode_entities, pair_terms};
use crate::download::HttpClient;
use crate::header::{HeaderArtifact, HeaderError, HeaderSource};

/// Public Folger digital collections host.
pub const FOLGER_BASE_URL: &str = "https://digitalcollections.folger.edu";

/// Header source for Folger catalog IDs such as `bib244741-309974-lb41`.
#[derive(Debug, Clone)]
pub struct FolgerCatalog {
    client: HttpClient,
    base_url: String,
}

impl FolgerCatalog {
    /// Creates a catalog pointing at the public Folger host.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, FOLGER_BASE_URL)
    }

    /// Creates a catalog pointing at another host.
    #[must_use]
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Catalog page URL for `catalog_id`.
    ///
    /// ```
    /// use folio_core::{FolgerCatalog, HttpClient};
    ///
    /// let catalog = FolgerCatalog::new(HttpClient::new());
    /// assert_eq!(
    ///     catalog.page_url("bib244741-309974-lb41"),
    ///     "https://digitalcollections.folger.edu/bib244741-309974-lb41"
    /// );
    /// ```
    #[must_use]
    pub fn page_url(&self, catalog_id: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(catalog_id))
    }
}

#[async_trait]
impl HeaderSource for FolgerCatalog {
    fn name(&self) -> &str {
        "folger"
    }

    #[instrument(skip(self), fields(source = "folger"))]
    async fn acquire(&self, catalog_id: &str) -> Result<HeaderArtifact, HeaderError> {
        let url = self.page_url(catalog_id);
        debug!(url = %url, "fetching catalog page");

        let body = self
            .client
            .fetch_bytes(&url)
            .await
            .map_err(|source| HeaderError::Fetch {
                catalog_id: catalog_id.to_string(),
                source,
            })?;

        parse_folger_page(catalog_id, &url, &body)
    }
}

/// Scrapes a Folger catalog page fetched from `page_url`.
///
/// - title: text of the `h1` elements
/// - properties: each `dl > dt` paired with the `dd` right after it
/// - manifest URL: the first `a` or `link` whose `href` mentions
///   `manifest`, resolved against `page_url`
/// - links: the catalog page itself
///
/// A page without a manifest link yields `manifest_url: None`.
///
/// # Errors
///
/// Returns [`HeaderError::Scrape`] if the markup cannot be tokenized.
pub fn parse_folger_page(
    catalog_id: &str,
    page_url: &str,
    html: &[u8],
) -> Result<HeaderArtifact, HeaderError> {
    let title = RefCell::new(String::new());
    let manifest_href = RefCell::new(None::<String>);
    let terms = RefCell::new(Vec::new());

    let take_manifest = |href: Option<String>| {
        let mut slot = manifest_href.borrow_mut();
        if slot.is_none() {
            *slot = href;
        }
    };

    {
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    text!("h1", |chunk| {
                        title.borrow_mut().push_str(chunk.as_str());
                        Ok(())
                    }),
                    element!("a[href*='manifest']", |el| {
                        take_manifest(el.get_attribute("href"));
                        Ok(())
                    }),
                    element!("link[href*='manifest']", |el| {
                        take_manifest(el.get_attribute("href"));
                        Ok(())
                    }),
                    element!("dl > dt", |_| {
                        terms.borrow_mut().push(Term::Key(String::new()));
                        Ok(())
                    }),
                    text!("dl > dt", |chunk| {
                        if let Some(Term::Key(key)) = terms.borrow_mut().last_mut() {
                            key.push_str(chunk.as_str());
                        }
                        Ok(())
                    }),
                    element!("dl > dd", |_| {
                        terms.borrow_mut().push(Term::Value(String::new()));
                        Ok(())
                    }),
                    text!("dl > dd", |chunk| {
                        if let Some(Term::Value(value)) = terms.borrow_mut().last_mut() {
                            value.push_str(chunk.as_str());
                        }
                        Ok(())
                    }),
                ],
                ..Settings::default()
            },
            |_: &[u8]| {},
        );

        rewriter
            .write(html)
            .map_err(|e| HeaderError::scrape(catalog_id, e))?;
        rewriter
            .end()
            .map_err(|e| HeaderError::scrape(catalog_id, e))?;
    }

    let title = clean_text(&title.into_inner());
    if title.is_empty() {
        warn!(catalog_id, "catalog page has no title");
    }

    let manifest_url = manifest_href
        .into_inner()
        .map(|href| absolute_url(page_url, &decode_entities(href.trim())));
    if manifest_url.is_none() {
        warn!(catalog_id, "catalog page has no manifest link");
    }

    let artifact = HeaderArtifact {
        catalog_id: catalog_id.to_string(),
        title,
        properties: pair_terms(terms.into_inner()),
        links: vec![page_url.to_string()],
        manifest_url,
    };
    debug!(
        properties = artifact.properties.len(),
        manifest_url = ?artifact.manifest_url,
        "parsed catalog page"
    );
    Ok(artifact)
}

/// Resolves `href` against `base`; left as written if either is unusable.
fn absolute_url(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map_or_else(|_| href.to_string(), String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::header::Property;

    const PAGE_URL: &str = "https://digitalcollections.folger.edu/bib244741-309974-lb41";

    const PAGE: &str = r#"<!doctype html>
<html><head>
  <link rel="alternate" type="application/ld+json" href="/iiif/bib244741/manifest?format=json&amp;v=2">
</head><body>
  <h1>
    Mr. William Shakespeares Comedies, Histories, &amp; Tragedies
  </h1>
  <a href="https://iiif.example.org/other/manifest">second manifest link</a>
  <dl>
    <dt>Date:</dt><dd>1623</dd>
    <dt>Call number:</dt><dd>STC 22273 Fo.1 no.68</dd>
  </dl>
</body></html>"#;

    #[test]
    fn test_parse_reads_first_manifest_link() {
        let artifact = parse_folger_page("bib244741-309974-lb41", PAGE_URL, PAGE.as_bytes()).unwrap();

        assert_eq!(
            artifact.title,
            "Mr. William Shakespeares Comedies, Histories, & Tragedies"
        );
        assert_eq!(
            artifact.manifest_url.as_deref(),
            Some("https://digitalcollections.folger.edu/iiif/bib244741/manifest?format=json&v=2")
        );
        assert_eq!(
            artifact.properties,
            vec![
                Property::new("Date:", "1623"),
                Property::new("Call number:", "STC 22273 Fo.1 no.68"),
            ]
        );
        assert_eq!(artifact.links, vec![PAGE_URL]);
    }

    #[test]
    fn test_parse_keeps_absolute_manifest_link() {
        let html = br#"<h1>Hamlet</h1><a href="https://iiif.example.org/hamlet/manifest">IIIF</a>"#;
        let artifact = parse_folger_page("x", PAGE_URL, html).unwrap();
        assert_eq!(
            artifact.manifest_url.as_deref(),
            Some("https://iiif.example.org/hamlet/manifest")
        );
    }

    #[test]
    fn test_parse_without_manifest_link() {
        let artifact = parse_folger_page("x", PAGE_URL, b"<h1>Hamlet</h1>").unwrap();
        assert_eq!(artifact.title, "Hamlet");
        assert!(artifact.manifest_url.is_none());
    }

    #[test]
    fn test_page_url_encodes_catalog_id() {
        let catalog = FolgerCatalog::with_base_url(HttpClient::new(), "http://127.0.0.1:9/");
        assert_eq!(catalog.page_url("a b"), "http://127.0.0.1:9/a%20b");
    }
}

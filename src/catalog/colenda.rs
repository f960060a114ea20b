//! Colenda (Penn Libraries) catalog: URL scheme and catalog page scraper.

use std::cell::RefCell;

use async_trait::async_trait;
use lol_html::{HtmlRewriter, Settings, element, text};
use tracing::{debug, instrument, warn};

use super::{Term, clean_text, decode_entities, pair_terms};
use crate::download::HttpClient;
use crate::header::{HeaderArtifact, HeaderError, HeaderSource, Property};

/// Public Colenda host.
pub const COLENDA_BASE_URL: &str = "https://colenda.library.upenn.edu";

/// Header source and manifest URL scheme for Colenda catalog IDs.
#[derive(Debug, Clone)]
pub struct ColendaCatalog {
    client: HttpClient,
    base_url: String,
}

impl ColendaCatalog {
    /// Creates a catalog pointing at the public Colenda host.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, COLENDA_BASE_URL)
    }

    /// Creates a catalog pointing at another host (mirrors, tests).
    #[must_use]
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// IIIF manifest URL for `catalog_id`.
    ///
    /// ```
    /// use folio_core::{ColendaCatalog, HttpClient};
    ///
    /// let catalog = ColendaCatalog::new(HttpClient::new());
    /// assert_eq!(
    ///     catalog.manifest_url("81431-p3hk28"),
    ///     "https://colenda.library.upenn.edu/phalt/iiif/2/81431-p3hk28/manifest"
    /// );
    /// ```
    #[must_use]
    pub fn manifest_url(&self, catalog_id: &str) -> String {
        format!(
            "{}/phalt/iiif/2/{}/manifest",
            self.base_url,
            urlencoding::encode(catalog_id)
        )
    }

    /// Human-facing catalog page URL for `catalog_id`.
    #[must_use]
    pub fn page_url(&self, catalog_id: &str) -> String {
        format!("{}/catalog/{}", self.base_url, urlencoding::encode(catalog_id))
    }
}

#[async_trait]
impl HeaderSource for ColendaCatalog {
    fn name(&self) -> &str {
        "colenda"
    }

    #[instrument(skip(self), fields(source = "colenda"))]
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

        let mut artifact = parse_catalog_page(catalog_id, &body)?;
        artifact.manifest_url = Some(self.manifest_url(catalog_id));
        Ok(artifact)
    }
}

/// Scrapes a Colenda catalog page.
///
/// - title: text of every `[itemprop='name']` element
/// - links: `href` of `#sidebar` anchors, skipping site-relative ones
/// - properties: each `dl > dt` paired with the `dd` right after it
///
/// # Errors
///
/// Returns [`HeaderError::Scrape`] if the markup cannot be tokenized.
pub fn parse_catalog_page(catalog_id: &str, html: &[u8]) -> Result<HeaderArtifact, HeaderError> {
    let title = RefCell::new(String::new());
    let links = RefCell::new(Vec::new());
    let terms = RefCell::new(Vec::new());

    {
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    text!("[itemprop='name']", |chunk| {
                        title.borrow_mut().push_str(chunk.as_str());
                        Ok(())
                    }),
                    element!("#sidebar a[href]", |el| {
                        if let Some(href) = el.get_attribute("href") {
                            if !href.starts_with('/') {
                                links.borrow_mut().push(href);
                            }
                        }
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

    let properties = pair_terms(terms.into_inner());

    let title = clean_text(&title.into_inner());
    if title.is_empty() {
        warn!(catalog_id, "catalog page has no title");
    }

    let artifact = HeaderArtifact {
        catalog_id: catalog_id.to_string(),
        title,
        properties,
        links: links
            .into_inner()
            .iter()
            .map(|href| decode_entities(href))
            .collect(),
        manifest_url: None,
    };
    debug!(
        properties = artifact.properties.len(),
        links = artifact.links.len(),
        "parsed catalog page"
    );
    Ok(artifact)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><body>
  <h1 itemprop="name">
     Book of Hours &amp; Psalter
  </h1>
  <div id="sidebar">
    <a href="/catalog/81431/librarian_view">Staff view</a>
    <a href="https://franklin.library.upenn.edu/catalog/FRANKLIN_9949">Franklin record</a>
    <a href="https://openn.library.upenn.edu/html/ms_1058.html">OPenn</a>
  </div>
  <a href="https://elsewhere.example.org/">not in sidebar</a>
  <dl class="document-metadata">
    <dt>Date:</dt>
    <dd>ca. 1450</dd>
    <dt>Language:</dt>
    <dd>Latin</dd>
    <dt>Orphan:</dt>
  </dl>
</body></html>"#;

    #[test]
    fn test_parse_title_links_properties() {
        let artifact = parse_catalog_page("81431", PAGE.as_bytes()).unwrap();

        assert_eq!(artifact.catalog_id, "81431");
        assert_eq!(artifact.title, "Book of Hours & Psalter");
        assert_eq!(
            artifact.links,
            vec![
                "https://franklin.library.upenn.edu/catalog/FRANKLIN_9949",
                "https://openn.library.upenn.edu/html/ms_1058.html",
            ]
        );
        assert_eq!(
            artifact.properties,
            vec![
                Property::new("Date:", "ca. 1450"),
                Property::new("Language:", "Latin"),
                Property::new("Orphan:", ""),
            ]
        );
        assert!(artifact.manifest_url.is_none());
    }

    #[test]
    fn test_parse_decodes_typographic_entities() {
        let html = br#"<h1 itemprop="name">Hamlet&rsquo;s Folio &mdash; 1623</h1>
<dl><dt>Note:</dt><dd>&ldquo;first&rdquo;&hellip;</dd></dl>"#;

        let artifact = parse_catalog_page("x", html).unwrap();

        assert_eq!(artifact.title, "Hamlet\u{2019}s Folio \u{2014} 1623");
        assert_eq!(
            artifact.properties,
            vec![Property::new("Note:", "\u{201C}first\u{201D}\u{2026}")]
        );
    }

    #[test]
    fn test_parse_empty_page() {
        let artifact = parse_catalog_page("x", b"<html></html>").unwrap();
        assert!(artifact.title.is_empty());
        assert!(artifact.links.is_empty());
        assert!(artifact.properties.is_empty());
    }

    #[test]
    fn test_urls_use_catalog_scheme() {
        let catalog = ColendaCatalog::with_base_url(HttpClient::new(), "http://127.0.0.1:9/");
        assert_eq!(
            catalog.manifest_url("81431-p3hk28"),
            "http://127.0.0.1:9/phalt/iiif/2/81431-p3hk28/manifest"
        );
        assert_eq!(
            catalog.page_url("81431-p3hk28"),
            "http://127.0.0.1:9/catalog/81431-p3hk28"
        );
    }

    #[test]
    fn test_urls_encode_catalog_id() {
        let catalog = ColendaCatalog::new(HttpClient::new());
        assert_eq!(
            catalog.page_url("a b/c"),
            "https://colenda.library.upenn.edu/catalog/a%20b%2Fc"
        );
    }
}

//! Shared User-Agent string for manifest, catalog and image requests.

/// Default User-Agent for every request made by the library.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("folio/{version} (iiif-manifest-binder)")
}

//! Localized region names with locale fallback

use tracing::debug;

use crate::catalog::{Catalog, Details};
use crate::error::CatalogError;
use crate::storage::DocumentStore;

/// Locale whose region names are always tried last
pub const DEFAULT_LOCALE: &str = "en-US";

/// Locales to try for `locale`, most specific first.
///
/// `es-MX` → `[es-MX, es, en-US]`, `de` → `[de, en-US]`. Duplicates are
/// dropped, so `en-US` yields `[en-US, en]`.
pub fn fallback_chain(locale: &str) -> Vec<String> {
    let mut chain = vec![locale.to_string()];
    if let Some((language, _)) = locale.split_once('-')
        && !language.is_empty()
    {
        chain.push(language.to_string());
    }
    if !chain.iter().any(|candidate| candidate == DEFAULT_LOCALE) {
        chain.push(DEFAULT_LOCALE.to_string());
    }
    chain
}

impl<S: DocumentStore> Catalog<S> {
    /// Region names for `locale`, falling back to its language and then to
    /// `en-US`
    pub fn regions(&self, locale: &str) -> Result<Details, CatalogError> {
        for candidate in fallback_chain(locale) {
            let details = self.get(&format!("regions/{}", candidate));
            if !details.is_empty() {
                if candidate != locale {
                    debug!("Using {} region names for locale {}", candidate, locale);
                }
                return Ok(details);
            }
        }

        Err(CatalogError::MissingRegionData {
            locale: locale.to_string(),
        })
    }
}

//! Catalog snapshot stored on a wiki page.
//!
//! The catalog is kept as pretty-printed JSON wrapped in `<code>` tags so the
//! wiki renders it verbatim instead of interpreting it as markup.

use crate::Error;
use crate::model::Catalog;

const OPEN_TAG: &str = "<code>";
const CLOSE_TAG: &str = "</code>";

/// Serialize a catalog into cache page text.
pub fn encode(catalog: &Catalog) -> Result<String, Error> {
    let json = serde_json::to_string_pretty(catalog)?;
    Ok(format!("{OPEN_TAG}{json}{CLOSE_TAG}"))
}

/// Parse cache page text back into a catalog.
///
/// The delimiters are optional so that a hand-edited page without them still
/// loads. An empty page is reported as corrupt rather than as an empty
/// catalog, so that callers fall back to a full scan.
pub fn decode(text: &str) -> Result<Catalog, Error> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix(OPEN_TAG).unwrap_or(trimmed);
    let body = body.strip_suffix(CLOSE_TAG).unwrap_or(body);
    if body.trim().is_empty() {
        return Err(Error::CacheCorrupt("cache page is empty".into()));
    }
    Ok(serde_json::from_str(body)?)
}

/// Total number of comics across all languages.
pub fn comic_count(catalog: &Catalog) -> usize {
    catalog.values().map(Vec::len).sum()
}

//! Catalog data model.
//!
//! Comics refer to their strips by id only; nothing here holds a reference
//! into the catalog, so a language's list can be swapped out wholesale.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Separator between namespace parts of a page id.
pub const ID_SEPARATOR: char = ':';

/// Per-language comic lists, keyed by language code.
pub type Catalog = BTreeMap<String, Vec<Comic>>;

/// Structured identifier of a wiki page: `language:comic[:strip]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId {
    pub language: String,
    pub comic_id: String,
    pub strip_id: Option<String>,
}

impl PageId {
    pub fn new(language: impl Into<String>, comic_id: impl Into<String>, strip_id: Option<String>) -> Self {
        Self { language: language.into(), comic_id: comic_id.into(), strip_id }
    }

    /// Same page, pointing at the given strip.
    pub fn with_strip(&self, strip_id: impl Into<String>) -> Self {
        Self { strip_id: Some(strip_id.into()), ..self.clone() }
    }

    /// Parse a URL path (or a raw id) against a set of known languages.
    ///
    /// Longer language codes are tried first so that `pt-br` wins over `pt`.
    /// The part after the language is the comic id if it has no separator,
    /// otherwise the last segment is the strip id.
    pub fn parse<'a>(path: &str, languages: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let full_id = path_to_id(path);
        let mut languages: Vec<&str> = languages.into_iter().collect();
        languages.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        for language in languages {
            let Some(rest) = full_id
                .strip_prefix(language)
                .and_then(|rest| rest.strip_prefix(ID_SEPARATOR))
            else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            return match rest.rsplit_once(ID_SEPARATOR) {
                None => Some(Self::new(language, rest, None)),
                Some((comic, strip)) if !comic.is_empty() && !strip.is_empty() => {
                    Some(Self::new(language, comic, Some(strip.to_string())))
                }
                Some(_) => None,
            };
        }
        None
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [Some(self.language.as_str()), Some(self.comic_id.as_str()), self.strip_id.as_deref()];
        let mut first = true;
        for part in parts.into_iter().flatten().filter(|p| !p.is_empty()) {
            if !first {
                write!(f, "{ID_SEPARATOR}")?;
            }
            f.write_str(part)?;
            first = false;
        }
        Ok(())
    }
}

/// Turn a URL path like `/en/sci-fi/foo` into a page id `en:sci-fi:foo`.
pub fn path_to_id(path: &str) -> String {
    let mut id = String::with_capacity(path.len());
    let mut last_was_separator = false;
    for c in path.chars() {
        if c == '/' || c == ID_SEPARATOR {
            if !last_was_separator {
                id.push(ID_SEPARATOR);
            }
            last_was_separator = true;
        } else {
            id.push(c);
            last_was_separator = false;
        }
    }
    id.trim_start_matches(ID_SEPARATOR).to_string()
}

/// Rating parsed from a trailing menu token such as `@gold@` or `*grey*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicRating {
    pub rating_color: String,
    pub is_active: bool,
}

impl ComicRating {
    pub fn apply(&self, comic: &mut Comic) {
        comic.rating_color = Some(self.rating_color.clone());
        comic.is_active = Some(self.is_active);
    }
}

/// A comic series as listed on a language menu page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comic {
    /// Path relative to the language root, e.g. `sci-fi:freefall`.
    pub id: String,

    #[serde(rename = "homePageURL")]
    pub home_page_url: Url,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "thumbnailURL", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<Url>,

    /// Set by validation only. `None` until the first validation pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_strip_renders: Option<bool>,
}

impl Comic {
    pub fn new(id: impl Into<String>, home_page_url: Url) -> Self {
        Self {
            id: id.into(),
            home_page_url,
            category_name: None,
            rating_color: None,
            is_active: None,
            name: None,
            thumbnail_url: None,
            first_strip_renders: None,
        }
    }
}

/// Numbered story strips of one comic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripSet {
    pub story_strips: Vec<String>,
}

impl StripSet {
    pub fn first(&self) -> Option<&str> {
        self.story_strips.first().map(String::as_str)
    }
}

/// Order purely numeric ids by value, falling back to lexical order.
///
/// Works on arbitrarily long digit strings: leading zeros are ignored for the
/// numeric comparison, so `"0002" < "10"`, and `"01" < "1"` breaks the tie.
pub fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let ta = a.trim_start_matches('0');
    let tb = b.trim_start_matches('0');
    ta.len().cmp(&tb.len()).then_with(|| ta.cmp(tb)).then_with(|| a.cmp(b))
}

/// Page metadata as reported by the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Full page id, e.g. `en:sci-fi:freefall:0001`.
    pub name: String,
    #[serde(default)]
    pub author: Option<String>,
    pub last_modified: DateTime<Utc>,
    /// Revision timestamp; `None` means the current revision.
    #[serde(default)]
    pub version: Option<i64>,
}

/// One entry of a namespace listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    pub id: String,
    #[serde(default)]
    pub rev: Option<i64>,
    #[serde(default)]
    pub mtime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// A single strip, ready for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strip {
    /// Content-only page URL. Kept for older clients; same as `display_url`.
    pub url: Url,
    pub display_url: Url,
    pub share_url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub info: PageInfo,
}

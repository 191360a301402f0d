//! Comic index page markup.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::path_to_id;

const ADULT_MARKER: &str = "<note adult>";

static TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"=([^=]+?)=").expect("invalid regex"));
static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([^}|]+\.(?i:png|jpe?g)[^|}]*)[^}]*\}\}").expect("invalid regex")
});
static SINGLE_NAV: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{cnav(?:>[^}]+)?\}").expect("invalid regex"));
static SECTION_NAV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{section>[^#]+/index#cnav").expect("invalid regex"));
static SECTION_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">[./]*([^#]+)/index").expect("invalid regex"));
static STRIP_TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("invalid regex"));

/// How an index page lays out its series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesLayout {
    /// One series, navigated with a single `{cnav}` bar.
    Single,
    /// Several sub-series, one `{{section>…/index#cnav}}` per sub-series.
    /// Holds the sub-series paths as page ids, in declaration order.
    Sections(Vec<String>),
    /// Neither marker present; the page does not describe a comic.
    Unrecognized,
}

/// Everything the catalog needs from a comic's index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPage {
    pub adult: bool,
    pub title: Option<String>,
    /// Media reference of the first embedded png/jpeg, e.g. `cover.png?200`.
    pub thumbnail: Option<String>,
    pub layout: SeriesLayout,
}

impl IndexPage {
    pub fn parse(text: &str) -> Self {
        let title = TITLE
            .captures(text)
            .map(|caps| caps[1].trim().to_string())
            .filter(|title| !title.is_empty());

        let thumbnail = IMAGE.captures(text).map(|caps| caps[1].trim().to_string());

        let layout = if SINGLE_NAV.is_match(text) {
            SeriesLayout::Single
        } else {
            let sections: Vec<String> = SECTION_NAV
                .find_iter(text)
                .filter_map(|nav| SECTION_PATH.captures(nav.as_str()))
                .map(|caps| path_to_id(&caps[1]))
                .filter(|path| !path.is_empty())
                .collect();
            if sections.is_empty() { SeriesLayout::Unrecognized } else { SeriesLayout::Sections(sections) }
        };

        Self { adult: text.contains(ADULT_MARKER), title, thumbnail, layout }
    }
}

/// Title of a strip page: its first `**bold**` run.
pub fn strip_title(text: &str) -> Option<String> {
    STRIP_TITLE.captures(text).map(|caps| caps[1].trim().to_string())
}

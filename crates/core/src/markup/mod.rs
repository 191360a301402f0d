//! Wiki markup grammar for menu and index pages.
//!
//! The catalog has no schema of its own; these patterns are the schema.
//! Menu pages are read line by line and every line is classified into a
//! [`MenuLine`], so the grammar can be tested without any I/O.
//!
//! ### Menu lines
//! - category heading, in one of two conventions chosen per deployment:
//!   `== Sci-Fi ==` ([`HeadingStyle::Equals`]) or `<spoiler|Sci-Fi>`
//!   ([`HeadingStyle::Spoiler`])
//! - the editor's "add new comic" affordance (contains `add?do=edit`)
//! - a comic link `[[target]]` optionally followed by rating tokens
//!   `@color@` (active) or `*color*` (inactive)

pub mod index;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::ComicRating;

pub use index::{IndexPage, SeriesLayout, strip_title};

/// Literal marker of the "add new comic" line on menu pages.
const ADD_PAGE_MARKER: &str = "add?do=edit";

static EQUALS_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"=+([^=]+)=+").expect("invalid regex"));
static SPOILER_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<spoiler\|([^>]+)>").expect("invalid regex"));
static COMIC_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\](.*)").expect("invalid regex"));
static RATING_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[@*]\w+[@*]").expect("invalid regex"));

/// How category headings are written on the menu pages of a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingStyle {
    /// `=+ text =+`
    #[default]
    Equals,
    /// `<spoiler|text>`
    Spoiler,
}

impl HeadingStyle {
    fn heading(self, line: &str) -> Option<String> {
        let pattern = match self {
            HeadingStyle::Equals => &*EQUALS_HEADING,
            HeadingStyle::Spoiler => &*SPOILER_HEADING,
        };
        pattern
            .captures(line)
            .map(|caps| caps[1].trim().to_string())
            .filter(|name| !name.is_empty())
    }
}

/// Classification of a single menu line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuLine {
    Category(String),
    Boilerplate,
    ComicLink { target: String, ratings: Vec<ComicRating> },
    Unrecognized,
}

/// A comic link together with the category it was listed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub target: String,
    pub category: Option<String>,
    pub ratings: Vec<ComicRating>,
}

/// Classify one line of a menu page.
pub fn classify_line(line: &str, style: HeadingStyle) -> MenuLine {
    if line.contains(ADD_PAGE_MARKER) {
        return MenuLine::Boilerplate;
    }
    if let Some(name) = style.heading(line) {
        return MenuLine::Category(name);
    }
    if let Some(caps) = COMIC_LINK.captures(line) {
        let target = caps[1].split('|').next().unwrap_or_default().trim();
        if !target.is_empty() {
            return MenuLine::ComicLink { target: target.to_string(), ratings: parse_ratings(&caps[2]) };
        }
    }
    MenuLine::Unrecognized
}

/// Parse trailing rating tokens, in order of appearance.
pub fn parse_ratings(trailer: &str) -> Vec<ComicRating> {
    RATING_TOKEN
        .find_iter(trailer)
        .map(|token| {
            let token = token.as_str();
            ComicRating { rating_color: token[1..token.len() - 1].to_string(), is_active: token.starts_with('@') }
        })
        .collect()
}

/// Walk a menu page and collect its comic links in line order.
pub fn parse_menu(text: &str, style: HeadingStyle) -> Vec<MenuEntry> {
    let mut category = None;
    let mut entries = Vec::new();
    for line in text.lines() {
        match classify_line(line, style) {
            MenuLine::Category(name) => category = Some(name),
            MenuLine::ComicLink { target, ratings } => {
                entries.push(MenuEntry { target, category: category.clone(), ratings })
            }
            MenuLine::Boilerplate | MenuLine::Unrecognized => {}
        }
    }
    entries
}

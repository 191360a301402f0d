//! Catalog discovery from menu and index pages.
//!
//! Every language keeps a `<language>:menu` page listing its comics. The
//! scanner reads each menu, follows every comic link to the comic's index
//! page and builds [`Comic`] records from what it finds there. A broken
//! menu or index page costs only that language or that comic; the scan
//! itself fails only when the top-level listing does.

use std::sync::Arc;

use futures_util::future::join_all;
use regex::{Regex, RegexBuilder};

use comicslate_core::markup::{IndexPage, MenuEntry, SeriesLayout, parse_menu};
use comicslate_core::model::{ID_SEPARATOR, path_to_id};
use comicslate_core::{Catalog, Comic, Error, HeadingStyle};

use crate::pages::Pages;

/// Suffix of the per-language menu page id.
const MENU_SUFFIX: &str = ":menu";

/// Suffix of a comic's index page id.
const INDEX_SUFFIX: &str = ":index";

/// Menus sit one level below the root namespace.
const MENU_DEPTH: u32 = 2;

pub struct Scanner {
    pages: Arc<Pages>,
    heading_style: HeadingStyle,
    banned: Vec<Regex>,
}

impl Scanner {
    pub fn new(pages: Arc<Pages>, heading_style: HeadingStyle) -> Self {
        Self { pages, heading_style, banned: Vec::new() }
    }

    /// Exclude menu targets matching any of `patterns`.
    ///
    /// Patterns are case-insensitive and `.` matches newlines.
    pub fn with_banned<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, Error> {
        self.banned = patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern.as_ref())
                    .case_insensitive(true)
                    .dot_matches_new_line(true)
                    .build()
                    .map_err(|e| Error::InvalidInput(format!("banned comic pattern {:?}: {e}", pattern.as_ref())))
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn accepts(&self, target: &str) -> bool {
        !self.banned.iter().any(|re| re.is_match(target))
    }

    /// Scan every language menu under `root` (`""` for the whole wiki).
    pub async fn scan(&self, root: &str) -> Result<Catalog, Error> {
        let mut ids: Vec<String> = self
            .pages
            .store()
            .list_pages(root, Some(MENU_DEPTH))
            .await?
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        ids.sort();

        let mut catalog = Catalog::new();
        for language in ids.iter().filter_map(|id| id.strip_suffix(MENU_SUFFIX)) {
            if language.is_empty() {
                continue;
            }
            match self.scan_language(language).await {
                Ok(comics) => {
                    tracing::info!(language, comics = comics.len(), "scanned language menu");
                    catalog.insert(language.to_string(), comics);
                }
                Err(e) => {
                    tracing::error!(language, error = %e, "failed to read language menu, leaving language out");
                }
            }
        }
        Ok(catalog)
    }

    /// Comics listed on one language's menu, in menu order.
    pub async fn scan_language(&self, language: &str) -> Result<Vec<Comic>, Error> {
        let menu = self.pages.store().get_page(&format!("{language}{MENU_SUFFIX}"), None).await?;
        let entries = parse_menu(&menu, self.heading_style);

        let fetches = entries.iter().map(|entry| async move {
            if !self.accepts(&entry.target) {
                tracing::warn!(language, target = %entry.target, "comic is banned, skipping");
                return Vec::new();
            }
            match self.comics_for_entry(language, entry).await {
                Ok(comics) => comics,
                Err(e) => {
                    tracing::warn!(language, target = %entry.target, error = %e, "failed to read comic index page");
                    Vec::new()
                }
            }
        });

        Ok(join_all(fetches).await.into_iter().flatten().collect())
    }

    async fn comics_for_entry(&self, language: &str, entry: &MenuEntry) -> Result<Vec<Comic>, Error> {
        let page_id = path_to_id(&entry.target);
        if page_id.is_empty() {
            return Ok(Vec::new());
        }
        let index = IndexPage::parse(&self.pages.store().get_page(&page_id, None).await?);

        if index.adult {
            tracing::warn!(language, page = %page_id, "comic is marked adult content, skipping");
            return Ok(Vec::new());
        }

        let comic_id = page_id.strip_suffix(INDEX_SUFFIX).unwrap_or(&page_id);
        let language_prefix = format!("{language}{ID_SEPARATOR}");
        let comic_id = comic_id.strip_prefix(&language_prefix).unwrap_or(comic_id);

        let mut template = Comic::new(comic_id, self.pages.page_url(&page_id, false, None)?);
        template.category_name = entry.category.clone();
        template.thumbnail_url =
            index.thumbnail.as_deref().map(|file| self.pages.media_url(comic_id, file)).transpose()?;
        template.name = index.title;

        let comics = match index.layout {
            SeriesLayout::Single => {
                if let Some(rating) = entry.ratings.first() {
                    rating.apply(&mut template);
                }
                vec![template]
            }
            SeriesLayout::Sections(sections) => sections
                .iter()
                .enumerate()
                .map(|(n, section)| {
                    let mut comic = template.clone();
                    comic.id = format!("{}{ID_SEPARATOR}{section}", template.id);
                    comic.name = template.name.as_ref().map(|name| format!("{name} #{}", n + 1));
                    if let Some(rating) = entry.ratings.get(n) {
                        rating.apply(&mut comic);
                    }
                    comic
                })
                .collect(),
            SeriesLayout::Unrecognized => {
                tracing::debug!(language, page = %page_id, "index page has no navigation, not a comic");
                Vec::new()
            }
        };
        Ok(comics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use comicslate_client::doku::MemoryStore;

    const MENU: &str = "\
====== Comics ======
== Sci-Fi ==
  * [[en/sci-fi/freefall/index]] @gold@
  * [[:en:sci-fi:saga:index|The Saga]] @green@ *grey*
  * [[en:sci-fi:broken:index]] @red@
== Other ==
  * [[en:other:adult:index]]
  * [[en:other:Banned-Thing:index]]
  * [[en:add?do=edit|Add a comic]]
  * [[en:other:plain:index]]
";

    fn store() -> MemoryStore {
        let store = MemoryStore::new()
            .with_page("en:menu", MENU)
            .with_page("en:sci-fi:freefall:index", &testing::single_index("Freefall"))
            .with_page(
                "en:sci-fi:saga:index",
                "= Saga =\n{{section>./book1/index#cnav}}\n{{section>book2/index#cnav}}\n",
            )
            .with_page("en:sci-fi:broken:index", "{cnav}")
            .with_page("en:other:adult:index", "<note adult>18+</note>\n= Adult =\n{cnav}")
            .with_page("en:other:banned-thing:index", "= Banned =\n{cnav}")
            .with_page("en:other:plain:index", "= Plain =\nNothing to see here.")
            .with_page("ru:menu", "== Фантастика ==\n  * [[ru:foo]]")
            .with_page("wiki:start", "not a menu");
        store.fail_on("en:sci-fi:broken:index");
        store
    }

    fn scanner(store: MemoryStore) -> (Scanner, tempfile::TempDir) {
        let (pages, dir) = testing::pages(store);
        (Scanner::new(pages, HeadingStyle::Equals).with_banned(&["banned"]).unwrap(), dir)
    }

    #[tokio::test]
    async fn test_single_comic_menu() {
        let store = MemoryStore::new()
            .with_page("en:menu", "**Title**\n[[en:foo]] @gold@")
            .with_page("en:foo", "=My Comic=\n{cnav}");
        let (pages, _dir) = testing::pages(store);
        let scanner = Scanner::new(pages, HeadingStyle::Equals);

        let catalog = scanner.scan("").await.unwrap();
        let comics = &catalog["en"];
        assert_eq!(comics.len(), 1);
        assert_eq!(comics[0].id, "foo");
        assert_eq!(comics[0].name.as_deref(), Some("My Comic"));
        assert_eq!(comics[0].rating_color.as_deref(), Some("gold"));
        assert_eq!(comics[0].is_active, Some(true));
        assert_eq!(comics[0].category_name, None);
        assert_eq!(comics[0].first_strip_renders, None);
    }

    #[tokio::test]
    async fn test_scan_language_in_menu_order() {
        let (scanner, _dir) = scanner(store());
        let comics = scanner.scan_language("en").await.unwrap();

        let ids: Vec<&str> = comics.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["sci-fi:freefall", "sci-fi:saga:book1", "sci-fi:saga:book2"]);

        let freefall = &comics[0];
        assert_eq!(freefall.category_name.as_deref(), Some("Sci-Fi"));
        assert_eq!(freefall.name.as_deref(), Some("Freefall"));
        assert_eq!(freefall.home_page_url.as_str(), "https://wiki.example/en/sci-fi/freefall/index");
        assert_eq!(
            freefall.thumbnail_url.as_ref().map(|u| u.as_str()),
            Some("https://wiki.example/_media/sci-fi/freefall/cover.png?200")
        );
    }

    #[tokio::test]
    async fn test_sections_get_positional_ratings() {
        let (scanner, _dir) = scanner(store());
        let comics = scanner.scan_language("en").await.unwrap();

        let book1 = &comics[1];
        assert_eq!(book1.name.as_deref(), Some("Saga #1"));
        assert_eq!(book1.rating_color.as_deref(), Some("green"));
        assert_eq!(book1.is_active, Some(true));

        let book2 = &comics[2];
        assert_eq!(book2.name.as_deref(), Some("Saga #2"));
        assert_eq!(book2.rating_color.as_deref(), Some("grey"));
        assert_eq!(book2.is_active, Some(false));
    }

    #[tokio::test]
    async fn test_sections_without_title() {
        let store = MemoryStore::new()
            .with_page("en:menu", "[[en:saga:index]] @gold@")
            .with_page("en:saga:index", "{{section>one/index#cnav}}\n{{section>two/index#cnav}}");
        let (pages, _dir) = testing::pages(store);
        let comics = Scanner::new(pages, HeadingStyle::Equals).scan_language("en").await.unwrap();

        assert_eq!(comics.len(), 2);
        assert!(comics.iter().all(|c| c.name.is_none()));
        assert_eq!(comics[0].rating_color.as_deref(), Some("gold"));
        assert_eq!(comics[1].rating_color, None);
    }

    #[tokio::test]
    async fn test_scan_isolates_failures() {
        let store = store();
        store.fail_on("ru:menu");
        let (scanner, _dir) = scanner(store);

        let catalog = scanner.scan("").await.unwrap();
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["en"]);
        assert_eq!(catalog["en"].len(), 3);
    }

    #[tokio::test]
    async fn test_scan_fails_without_listing() {
        let store = store();
        store.fail_on("");
        let (scanner, _dir) = scanner(store);
        assert!(matches!(scanner.scan("").await, Err(Error::Rpc(_))));
    }

    #[tokio::test]
    async fn test_spoiler_headings() {
        let store = MemoryStore::new()
            .with_page("en:menu", "<spoiler|Drama>\n  * [[en:foo]]\n</spoiler>\n== Not a heading ==")
            .with_page("en:foo", "=Foo=\n{cnav>0001}");
        let (pages, _dir) = testing::pages(store);
        let comics = Scanner::new(pages, HeadingStyle::Spoiler).scan_language("en").await.unwrap();

        assert_eq!(comics.len(), 1);
        assert_eq!(comics[0].category_name.as_deref(), Some("Drama"));
    }

    #[test]
    fn test_banned_patterns() {
        let (pages, _dir) = testing::pages(MemoryStore::new());
        let scanner = Scanner::new(pages, HeadingStyle::Equals).with_banned(&["^en:evil.*index$"]).unwrap();

        assert!(!scanner.accepts("EN:Evil:Comic:index"));
        assert!(!scanner.accepts("en:evil\n:index"));
        assert!(scanner.accepts("en:good:index"));
    }

    #[test]
    fn test_invalid_banned_pattern() {
        let (pages, _dir) = testing::pages(MemoryStore::new());
        let result = Scanner::new(pages, HeadingStyle::Equals).with_banned(&["("]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}

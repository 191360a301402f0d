//! First-strip validation.
//!
//! A comic whose first story strip cannot be rendered is broken for readers,
//! whatever its menu entry says. Validation renders that strip for every
//! comic (reusing cached renders) and records the outcome on the comic.

use std::path::PathBuf;

use futures_util::future::join_all;

use comicslate_core::{Catalog, Error, PageId};

use crate::pages::Pages;

/// Set `first_strip_renders` on every comic and return how many passed.
///
/// All comics are checked concurrently; one failure never affects another.
pub async fn validate(pages: &Pages, catalog: &mut Catalog) -> usize {
    let checks = catalog.iter_mut().flat_map(move |(language, comics)| {
        comics.iter_mut().map(move |comic| async move {
            let first = PageId::new(language.as_str(), comic.id.as_str(), None);
            let renders = match render_first_strip(pages, &first).await {
                Ok(path) => {
                    tracing::debug!(comic = %first, path = %path.display(), "first strip renders");
                    true
                }
                Err(e) => {
                    tracing::warn!(comic = %first, error = %e, "failed to render the first story strip");
                    false
                }
            };
            comic.first_strip_renders = Some(renders);
            renders
        })
    });

    join_all(checks).await.into_iter().filter(|renders| *renders).count()
}

async fn render_first_strip(pages: &Pages, comic: &PageId) -> Result<PathBuf, Error> {
    let strips = pages.list_strips(&comic.language, &comic.comic_id).await?;
    let first = strips.into_iter().next().ok_or_else(|| Error::NoStrips(comic.to_string()))?;
    let info = pages.page_info(&comic.with_strip(first), None).await?;
    pages.render_strip(&info, true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FakeRenderer};
    use comicslate_client::doku::MemoryStore;
    use comicslate_core::Comic;
    use std::sync::Arc;
    use url::Url;

    fn comic(id: &str) -> Comic {
        Comic::new(id, Url::parse(testing::BASE_URL).unwrap())
    }

    #[tokio::test]
    async fn test_validate_marks_every_comic() {
        let store = MemoryStore::new()
            .with_page("en:good:0002", "**Two**")
            .with_page("en:good:0001", "**One**")
            .with_page("en:ugly:0001", "**Blank**")
            .with_page("en:empty:talk", "no strips here")
            .with_page("ru:good:0001", "**Один**");
        let renderer = FakeRenderer::failing(&["/ugly/"]);
        let (pages, _, dir) = testing::pages_with(Arc::new(store), renderer.clone());

        let mut catalog = Catalog::new();
        catalog.insert("en".into(), vec![comic("good"), comic("ugly"), comic("empty"), comic("missing")]);
        catalog.insert("ru".into(), vec![comic("good")]);

        let valid = validate(&pages, &mut catalog).await;
        assert_eq!(valid, 2);

        let flags: Vec<_> = catalog["en"].iter().map(|c| c.first_strip_renders).collect();
        assert_eq!(flags, vec![Some(true), Some(false), Some(false), Some(false)]);
        assert_eq!(catalog["ru"][0].first_strip_renders, Some(true));

        assert!(dir.path().join("en/good/u/0001.webp").exists());
        assert!(!dir.path().join("en/good/u/0002.webp").exists());
        assert_eq!(pages.renders().tracker().stats().failures, 1);
    }

    #[tokio::test]
    async fn test_validate_reuses_cached_renders() {
        let store = MemoryStore::new().with_page("en:foo:0001", "**One**");
        let renderer = FakeRenderer::new();
        let (pages, _, _dir) = testing::pages_with(Arc::new(store), renderer.clone());

        let mut catalog = Catalog::new();
        catalog.insert("en".into(), vec![comic("foo")]);

        assert_eq!(validate(&pages, &mut catalog).await, 1);
        assert_eq!(validate(&pages, &mut catalog).await, 1);
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn test_validate_empty_catalog() {
        let (pages, _dir) = testing::pages(MemoryStore::new());
        assert_eq!(validate(&pages, &mut Catalog::new()).await, 0);
    }
}

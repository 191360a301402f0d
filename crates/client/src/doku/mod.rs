//! Content store access.
//!
//! The catalog reads and writes wiki pages only through [`ContentStore`].
//! [`DokuClient`] talks to a DokuWiki over its JSON-RPC endpoint;
//! [`MemoryStore`] keeps pages in memory for tests and offline runs.

pub mod memory;
pub mod rpc;

use std::time::Duration;

use comicslate_core::{Error, PageEntry, PageInfo};

pub use memory::MemoryStore;
pub use rpc::DokuClient;

/// Read/write access to wiki pages.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Authenticate the session. `Ok(false)` means the credentials were refused.
    async fn login(&self, user: &str, password: &str) -> Result<bool, Error>;

    /// Raw markup of a page, optionally at a given revision.
    async fn get_page(&self, id: &str, version: Option<i64>) -> Result<String, Error>;

    /// Metadata of a page, optionally at a given revision.
    async fn get_page_info(&self, id: &str, version: Option<i64>) -> Result<PageInfo, Error>;

    /// Pages under a namespace. `depth` limits recursion; `None` lists everything.
    async fn list_pages(&self, namespace: &str, depth: Option<u32>) -> Result<Vec<PageEntry>, Error>;

    /// Replace a page's text, recording `summary` in the page history.
    async fn put_page(&self, id: &str, text: &str, summary: &str) -> Result<(), Error>;
}

/// Log in, retrying with a fixed delay until the store accepts us.
///
/// Nothing works without a session, so this never gives up; callers that need
/// an upper bound should wrap it in `tokio::time::timeout`.
pub async fn login_with_retry(store: &dyn ContentStore, user: &str, password: &str, delay: Duration) {
    let mut attempt = 1u64;
    loop {
        let accepted = store.login(user, password).await.and_then(|accepted| {
            if accepted { Ok(()) } else { Err(Error::LoginFailed(format!("credentials for {user} refused"))) }
        });
        match accepted {
            Ok(()) => {
                tracing::info!(user, attempt, "logged in to content store");
                return;
            }
            Err(e) => {
                tracing::error!(user, attempt, error = %e, "content store login failed, retrying in {delay:?}");
            }
        }
        attempt += 1;
        tokio::time::sleep(delay).await;
    }
}

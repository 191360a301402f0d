//! DokuWiki JSON-RPC client.
//!
//! Speaks JSON-RPC 2.0 to `lib/exe/jsonrpc.php` using the classic method
//! names (`wiki.getPage`, `dokuwiki.getPagelist`, ...). The session is a
//! cookie set by `dokuwiki.login`, kept in the client's cookie store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::{Client, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use comicslate_core::{Error, PageEntry, PageInfo};

use super::ContentStore;

/// Path of the RPC endpoint relative to the wiki base URL.
const RPC_PATH: &str = "lib/exe/jsonrpc.php";

/// DokuWiki JSON-RPC client.
pub struct DokuClient {
    http: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// DokuWiki reports times either as unix seconds or as a date string,
/// depending on version and method.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Seconds(i64),
    Text(String),
}

impl Timestamp {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Seconds(secs) => Utc.timestamp_opt(*secs, 0).single(),
            Timestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, "%Y%m%dT%H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageInfo {
    name: String,
    #[serde(default)]
    author: Option<String>,
    last_modified: Timestamp,
    #[serde(default)]
    version: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawPageEntry {
    id: String,
    #[serde(default)]
    rev: Option<i64>,
    #[serde(default)]
    mtime: Option<Timestamp>,
    #[serde(default)]
    size: Option<u64>,
}

impl TryFrom<RawPageInfo> for PageInfo {
    type Error = Error;

    fn try_from(raw: RawPageInfo) -> Result<Self, Error> {
        let last_modified = raw
            .last_modified
            .to_utc()
            .ok_or_else(|| Error::Rpc(format!("unparseable lastModified for {}", raw.name)))?;
        Ok(PageInfo {
            name: raw.name,
            author: raw.author.filter(|a| !a.is_empty()),
            last_modified,
            version: raw.version.filter(|v| *v > 0),
        })
    }
}

impl From<RawPageEntry> for PageEntry {
    fn from(raw: RawPageEntry) -> Self {
        PageEntry { id: raw.id, rev: raw.rev, mtime: raw.mtime.and_then(|t| t.to_utc()), size: raw.size }
    }
}

impl DokuClient {
    /// Create a client for the wiki at `base_url`.
    pub fn new(base_url: &Url, user_agent: &str, timeout: Duration) -> Result<Self, Error> {
        let endpoint = base_url.join(RPC_PATH)?;
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Rpc(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, endpoint, next_id: AtomicU64::new(1) })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_body(&self, method: &str, params: Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, Error> {
        let body = self.request_body(method, params);

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Rpc(format!("{method}: network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Rpc(format!("{method}: status {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Rpc(format!("{method}: failed to read response: {e}")))?;

        tracing::trace!(method, bytes = bytes.len(), "rpc response");
        decode_response(method, &bytes)
    }
}

fn decode_response<T: DeserializeOwned>(method: &str, bytes: &[u8]) -> Result<T, Error> {
    let envelope: RpcResponse =
        serde_json::from_slice(bytes).map_err(|e| Error::Rpc(format!("{method}: malformed response: {e}")))?;

    if let Some(err) = envelope.error
        && err.code != 0
    {
        return Err(Error::RpcFault { code: err.code, message: err.message });
    }

    serde_json::from_value(envelope.result.unwrap_or(Value::Null))
        .map_err(|e| Error::Rpc(format!("{method}: unexpected result: {e}")))
}

#[async_trait::async_trait]
impl ContentStore for DokuClient {
    async fn login(&self, user: &str, password: &str) -> Result<bool, Error> {
        self.call("dokuwiki.login", json!([user, password])).await
    }

    async fn get_page(&self, id: &str, version: Option<i64>) -> Result<String, Error> {
        match version {
            Some(version) => self.call("wiki.getPageVersion", json!([id, version])).await,
            None => self.call("wiki.getPage", json!([id])).await,
        }
    }

    async fn get_page_info(&self, id: &str, version: Option<i64>) -> Result<PageInfo, Error> {
        let raw: RawPageInfo = match version {
            Some(version) => self.call("wiki.getPageInfoVersion", json!([id, version])).await?,
            None => self.call("wiki.getPageInfo", json!([id])).await?,
        };
        raw.try_into()
    }

    async fn list_pages(&self, namespace: &str, depth: Option<u32>) -> Result<Vec<PageEntry>, Error> {
        let options = match depth {
            Some(depth) => json!({ "depth": depth }),
            None => json!({}),
        };
        let raw: Vec<RawPageEntry> = self.call("dokuwiki.getPagelist", json!([namespace, options])).await?;
        Ok(raw.into_iter().map(PageEntry::from).collect())
    }

    async fn put_page(&self, id: &str, text: &str, summary: &str) -> Result<(), Error> {
        let saved: bool = self.call("wiki.putPage", json!([id, text, { "sum": summary, "minor": false }])).await?;
        if saved { Ok(()) } else { Err(Error::Rpc(format!("wiki.putPage refused to save {id}"))) }
    }
}

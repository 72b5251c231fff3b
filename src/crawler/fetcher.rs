//! HTTP transport for Mastodon-compatible APIs
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Public timeline pages, optionally enriched with reblogging accounts
//! - Account lookup and follower/following pages
//! - Reading the next cursor from the `Link` header
//! - Reading rate-limit hints from the configured headers
//! - Error classification

use crate::config::{ApiConfig, UserAgentConfig};
use crate::crawler::page::{FetchError, Item, PageFetcher, PageResult, RateLimitHints};
use crate::crawler::rate_limit::RateLimiter;
use crate::crawler::walker::{PageWalker, WalkSettings};
use crate::state::{CrawlTarget, Cursor, ResourceKind};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Page size of the reblogged-by listing
const REBLOGGED_BY_LIMIT: u32 = 80;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Overall timeout for a single request
///
/// # Example
///
/// ```no_run
/// use mastodonte::config::UserAgentConfig;
/// use mastodonte::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "Mastodonte".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Base URL of one instance's API
#[derive(Debug, Clone)]
pub struct ApiEndpoint {
    base: Url,
}

impl ApiEndpoint {
    pub fn new(scheme: &str, host: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(&format!("{}://{}/", scheme, host))?,
        })
    }

    /// Joins an API path such as `api/v1/timelines/public`
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path)
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(error)
    }
}

/// Issues one GET and decodes a page of JSON items
async fn get_page(client: &Client, url: Url, api: &ApiConfig) -> Result<PageResult, FetchError> {
    tracing::debug!(%url, "GET");
    let response = client.get(url).send().await.map_err(classify)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }

    let hints = extract_rate_limit_hints(response.headers(), api);
    let next_cursor = response
        .headers()
        .get(LINK)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_next_link)
        .and_then(|next| cursor_from_url(&next, &api.cursor_param));

    let body = response.text().await.map_err(classify)?;
    let items: Vec<Item> =
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(PageResult {
        items,
        next_cursor,
        hints,
    })
}

/// Extracts the `rel="next"` target from a `Link` header
///
/// ```
/// use mastodonte::crawler::parse_next_link;
///
/// let header = r#"<https://example.org/api/v1/timelines/public?max_id=7>; rel="next", <https://example.org/api/v1/timelines/public?min_id=9>; rel="prev""#;
/// let next = parse_next_link(header).unwrap();
/// assert_eq!(next.query(), Some("max_id=7"));
/// ```
pub fn parse_next_link(header: &str) -> Option<Url> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;

        let is_next = parts.any(|param| {
            let Some((name, value)) = param.split_once('=') else {
                return false;
            };
            name.trim().eq_ignore_ascii_case("rel")
                && value
                    .trim()
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case("next"))
        });

        if is_next {
            Url::parse(target).ok()
        } else {
            None
        }
    })
}

fn cursor_from_url(url: &Url, param: &str) -> Option<Cursor> {
    url.query_pairs()
        .find(|(name, _)| name == param)
        .map(|(_, value)| Cursor::new(value.into_owned()))
}

/// Reads the remaining-quota and reset headers named in `api`
///
/// Malformed values are logged and treated as absent.
pub fn extract_rate_limit_hints(headers: &HeaderMap, api: &ApiConfig) -> RateLimitHints {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    let remaining = header(&api.remaining_header).and_then(|raw| match raw.parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(header = %api.remaining_header, value = raw, "ignoring malformed quota header");
            None
        }
    });

    let reset_at = header(&api.reset_header).and_then(|raw| {
        let parsed = parse_reset(raw);
        if parsed.is_none() {
            tracing::warn!(header = %api.reset_header, value = raw, "ignoring malformed reset header");
        }
        parsed
    });

    RateLimitHints {
        remaining,
        reset_at,
    }
}

/// Parses a reset time given as RFC 3339 or as integer Unix seconds
fn parse_reset(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }

    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Qualifies a local handle with the instance host
fn qualified_acct(acct: &str, host: &str) -> String {
    if acct.contains('@') {
        acct.to_string()
    } else {
        format!("{}@{}", acct, host)
    }
}

fn id_of(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Reblog enrichment settings for a timeline fetcher
#[derive(Clone)]
struct ReblogEnrichment {
    limiter: Arc<RateLimiter>,
    settings: WalkSettings,
}

/// Pages of an instance's public timeline
pub struct TimelineFetcher {
    client: Client,
    endpoint: ApiEndpoint,
    api: ApiConfig,
    host: String,
    limit: u32,
    local: bool,
    reblogs: Option<ReblogEnrichment>,
}

impl TimelineFetcher {
    pub fn new(
        client: Client,
        api: &ApiConfig,
        target: &CrawlTarget,
        limit: u32,
        local: bool,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: ApiEndpoint::new(&api.scheme, target.host())?,
            api: api.clone(),
            host: target.host().to_string(),
            limit,
            local,
            reblogs: None,
        })
    }

    /// Attaches the accounts that reblogged each status as `rebloggers`
    ///
    /// The reblogged-by listing is walked to exhaustion with the same
    /// politeness delay and rate-limit gate as the timeline itself.
    pub fn with_rebloggers(mut self, limiter: Arc<RateLimiter>, settings: WalkSettings) -> Self {
        self.reblogs = Some(ReblogEnrichment { limiter, settings });
        self
    }

    async fn rebloggers(
        &self,
        enrichment: &ReblogEnrichment,
        status_id: &str,
    ) -> Result<Vec<String>, FetchError> {
        let path = format!("api/v1/statuses/{}/reblogged_by", status_id);
        let fetcher = AccountPageFetcher {
            client: self.client.clone(),
            url: self
                .endpoint
                .url(&path)
                .map_err(|e| FetchError::Decode(e.to_string()))?,
            api: self.api.clone(),
            limit: REBLOGGED_BY_LIMIT,
        };

        let mut accounts: Vec<Item> = Vec::new();
        let mut walker = PageWalker::new(
            &fetcher,
            enrichment.limiter.as_ref(),
            &self.host,
            None,
            WalkSettings::unbounded(enrichment.settings.tolerance, enrichment.settings.politeness_delay),
        );
        walker.walk(&mut accounts).await?;

        Ok(accounts
            .iter()
            .filter_map(|account| account.get("acct").and_then(Value::as_str))
            .map(|acct| qualified_acct(acct, &self.host).to_lowercase())
            .collect())
    }
}

#[async_trait]
impl PageFetcher for TimelineFetcher {
    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<PageResult, FetchError> {
        let mut url = self
            .endpoint
            .url("api/v1/timelines/public")
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.limit.to_string());
            query.append_pair("local", if self.local { "true" } else { "false" });
            if let Some(cursor) = cursor {
                query.append_pair(&self.api.cursor_param, cursor.as_str());
            }
        }

        let mut page = get_page(&self.client, url, &self.api).await?;

        if let Some(enrichment) = &self.reblogs {
            let mut reblogged = 0usize;
            for status in page.items.iter_mut() {
                let count = status
                    .get("reblogs_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                if count == 0 {
                    continue;
                }
                let Some(id) = id_of(status) else {
                    continue;
                };

                let rebloggers = self.rebloggers(enrichment, &id).await?;
                if let Some(fields) = status.as_object_mut() {
                    fields.insert("rebloggers".to_string(), Value::from(rebloggers));
                    reblogged += 1;
                }
            }
            tracing::debug!(host = %self.host, reblogged, "rebloggers attached");
        }

        Ok(page)
    }
}

/// Plain account listing at a fixed URL (reblogged-by pages)
struct AccountPageFetcher {
    client: Client,
    url: Url,
    api: ApiConfig,
    limit: u32,
}

#[async_trait]
impl PageFetcher for AccountPageFetcher {
    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<PageResult, FetchError> {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.limit.to_string());
            if let Some(cursor) = cursor {
                query.append_pair(&self.api.cursor_param, cursor.as_str());
            }
        }
        get_page(&self.client, url, &self.api).await
    }
}

/// Pages of a user's follower or following list
///
/// The numeric account id is looked up in `resolve`; a missing account is
/// reported as `FetchError::NotFound`.
pub struct AccountListFetcher {
    client: Client,
    endpoint: ApiEndpoint,
    api: ApiConfig,
    host: String,
    user: String,
    kind: ResourceKind,
    limit: u32,
    account_id: Option<String>,
}

impl AccountListFetcher {
    pub fn new(
        client: Client,
        api: &ApiConfig,
        target: &CrawlTarget,
        limit: u32,
    ) -> Result<Self, FetchError> {
        let user = target.handle().ok_or_else(|| FetchError::NotFound {
            what: format!("account handle in {}", target),
        })?;

        Ok(Self {
            client,
            endpoint: ApiEndpoint::new(&api.scheme, target.host())
                .map_err(|e| FetchError::Decode(e.to_string()))?,
            api: api.clone(),
            host: target.host().to_string(),
            user: user.to_string(),
            kind: target.kind(),
            limit,
            account_id: None,
        })
    }
}

#[async_trait]
impl PageFetcher for AccountListFetcher {
    async fn resolve(&mut self) -> Result<(), FetchError> {
        let mut url = self
            .endpoint
            .url("api/v1/accounts/lookup")
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        url.query_pairs_mut().append_pair("acct", &self.user);

        tracing::debug!(%url, "looking up account");
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                what: format!("account {}@{}", self.user, self.host),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(classify)?;
        let account: Value =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        let id = id_of(&account)
            .ok_or_else(|| FetchError::Decode("account lookup returned no id".to_string()))?;

        tracing::debug!(user = %self.user, host = %self.host, %id, "account resolved");
        self.account_id = Some(id);
        Ok(())
    }

    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<PageResult, FetchError> {
        let id = self
            .account_id
            .as_deref()
            .ok_or_else(|| FetchError::Decode("account id not resolved".to_string()))?;

        let path = format!("api/v1/accounts/{}/{}", id, self.kind.as_str());
        let mut url = self
            .endpoint
            .url(&path)
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.limit.to_string());
            if let Some(cursor) = cursor {
                query.append_pair(&self.api.cursor_param, cursor.as_str());
            }
        }

        let mut page = get_page(&self.client, url, &self.api).await?;
        for account in page.items.iter_mut() {
            let acct = account.get("acct").and_then(Value::as_str).map(str::to_string);
            if let (Some(acct), Some(fields)) = (acct, account.as_object_mut()) {
                fields.insert(
                    "acct".to_string(),
                    Value::from(qualified_acct(&acct, &self.host)),
                );
            }
        }

        Ok(page)
    }
}

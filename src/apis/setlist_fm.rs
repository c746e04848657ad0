use crate::app::ports::{AttendedPage, AttendedSource};
use crate::config::HarvestConfig;
use crate::constants::{BACKOFF_BASE_MS, BACKOFF_CAP_MS, PAGE_SIZE};
use crate::error::{HarvestError, Result};
use crate::observability::metrics;
use crate::pipeline::normalize::normalize;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, ACCEPT_LANGUAGE, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// `setlist` is a list, except for single-item pages where some responses inline the object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendedResponse {
    #[serde(default)]
    setlist: Option<OneOrMany>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    items_per_page: Option<u64>,
}

impl AttendedResponse {
    fn into_items(self) -> Vec<Value> {
        match self.setlist {
            Some(OneOrMany::Many(items)) => items,
            Some(OneOrMany::One(Value::Null)) | None => Vec::new(),
            Some(OneOrMany::One(item)) => vec![item],
        }
    }
}

/// Exponential delay for the given zero-based retry attempt: 500ms doubling, capped at 30s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor).min(BACKOFF_CAP_MS))
}

/// Positive `retry-after` seconds, if the server sent them.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// A page is the last one when it is short, or when it reaches the advertised total.
pub fn is_last_page(page: u32, raw_count: usize, items_per_page: Option<u64>, total: Option<u64>) -> bool {
    if raw_count < PAGE_SIZE {
        return true;
    }
    match total {
        Some(total) => {
            let per_page = items_per_page.unwrap_or(PAGE_SIZE as u64);
            let seen = u64::from(page.saturating_sub(1)) * per_page + raw_count as u64;
            seen >= total
        }
        None => false,
    }
}

/// HTTP client for the Setlist.fm attended listing.
pub struct SetlistFmClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    locale: String,
    include_festival: bool,
    max_retries: Option<u32>,
}

impl SetlistFmClient {
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        // Validate the base early so a typo fails before any paging starts
        Url::parse(&config.api_base)
            .map_err(|e| HarvestError::Config(format!("invalid API base '{}': {}", config.api_base, e)))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("setlist_harvester/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            locale: config.locale.clone(),
            include_festival: config.include_festival,
            max_retries: config.max_rate_limit_retries,
        })
    }

    /// `{base}/user/{username}/attended?p={page}[&inc=festival]`
    pub fn attended_url(&self, username: &str, page: u32) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| HarvestError::Config(format!("invalid API base '{}': {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| HarvestError::Config(format!("API base '{}' cannot take a path", self.api_base)))?
            .pop_if_empty()
            .extend(&["user", username, "attended"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("p", &page.to_string());
            if self.include_festival {
                query.append_pair("inc", "festival");
            }
        }
        Ok(url)
    }

    /// GET with unbounded (unless configured) retry on 429; any other failure status is final.
    async fn get_with_backoff(&self, url: Url) -> Result<AttendedResponse> {
        let mut attempt: u32 = 0;
        loop {
            let resp = self
                .client
                .get(url.clone())
                .header("x-api-key", &self.api_key)
                .header(ACCEPT, "application/json")
                .header(ACCEPT_LANGUAGE, &self.locale)
                .send()
                .await?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                metrics::fetch::rate_limited();
                let wait = retry_after(resp.headers()).unwrap_or_else(|| backoff_delay(attempt));
                // Release the connection before waiting out the backoff
                drop(resp);
                attempt += 1;
                if let Some(max) = self.max_retries {
                    if attempt > max {
                        return Err(HarvestError::RateLimited { attempts: attempt });
                    }
                }
                warn!(attempt, wait_ms = wait.as_millis() as u64, "Rate limited by setlist.fm, backing off");
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(HarvestError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body,
                });
            }

            return Ok(resp.json::<AttendedResponse>().await?);
        }
    }
}

#[async_trait]
impl AttendedSource for SetlistFmClient {
    #[instrument(skip(self))]
    async fn fetch_page(&self, username: &str, page: u32) -> Result<AttendedPage> {
        let url = self.attended_url(username, page)?;
        let response = self.get_with_backoff(url).await?;
        metrics::fetch::page_fetched();

        let (total, items_per_page) = (response.total, response.items_per_page);
        let items = response.into_items();
        let raw_count = items.len();
        let records: Vec<_> = items.iter().filter_map(normalize).collect();
        if records.len() < raw_count {
            let dropped = raw_count - records.len();
            warn!(dropped, "Dropped attended records without an id");
            metrics::fetch::records_dropped(dropped);
        }

        let is_last = is_last_page(page, raw_count, items_per_page, total);
        debug!(raw_count, is_last, "Fetched attended page");
        Ok(AttendedPage { records, raw_count, is_last })
    }
}

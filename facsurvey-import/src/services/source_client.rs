//! Survey source API client
//!
//! Range queries return a paginated envelope `{count, next, previous, results}`
//! and are followed through `next` until exhausted. By-id queries return a
//! single submission object. Every request carries `Authorization: Token <key>`.

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::config::SourceConfig;
use crate::error::SourceError;

const USER_AGENT: &str = concat!("facsurvey-import/", env!("CARGO_PKG_VERSION"));

/// Where raw submissions come from
///
/// The HTTP client is the production implementation; tests substitute an
/// in-memory source.
#[async_trait]
pub trait SurveySource: Send + Sync {
    /// Tag recorded on staged raw imports
    fn source_tag(&self) -> &str;

    /// Submissions collected in `[start, end)`, in the order received
    async fn fetch_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, SourceError>;

    /// One submission; `Ok(None)` when the source does not know the id
    async fn fetch_by_id(&self, external_id: &str) -> Result<Option<Value>, SourceError>;
}

/// Paginated range response
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    next: Option<String>,
    results: Vec<Value>,
}

/// HTTP client for the survey platform's data endpoint
pub struct SourceClient {
    http_client: Client,
    base_url: Url,
    api_key: String,
    source_tag: String,
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl SourceClient {
    pub fn new(config: &SourceConfig) -> facsurvey_common::Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            facsurvey_common::Error::Config(format!("Invalid source base URL: {}", e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(facsurvey_common::Error::Config(format!(
                "Source base URL cannot take a path: {}",
                config.base_url
            )));
        }

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                facsurvey_common::Error::Internal(format!("Failed to build HTTP client: {}", e))
            })?;

        let rate_limiter = config
            .requests_per_second
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            http_client,
            base_url,
            api_key: config.api_key.clone(),
            source_tag: config.source_tag.clone(),
            rate_limiter,
        })
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, SourceError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        tracing::debug!(url = %url, "Querying source API");

        self.http_client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.api_key))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }

    fn by_id_url(&self, external_id: &str) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SourceError::Unavailable(format!("Base URL cannot take a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .push(external_id);
        Ok(url)
    }
}

#[async_trait]
impl SurveySource for SourceClient {
    fn source_tag(&self) -> &str {
        &self.source_tag
    }

    async fn fetch_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, SourceError> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("start", &start.format("%Y-%m-%d").to_string())
            .append_pair("end", &end.format("%Y-%m-%d").to_string());

        let mut records = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            if !visited.insert(url.to_string()) {
                tracing::warn!(url = %url, "Pagination cursor repeated, stopping");
                break;
            }

            let response = self.get(url.clone()).await?;
            let body = read_success_body(response).await?;
            let page: Page = serde_json::from_slice(&body)
                .map_err(|e| SourceError::InvalidResponse(format!("Bad page envelope: {}", e)))?;

            tracing::debug!(
                page_records = page.results.len(),
                total = ?page.count,
                "Fetched page"
            );
            records.extend(page.results);

            next = match page.next.as_deref().map(str::trim) {
                Some(link) if !link.is_empty() => Some(url.join(link).map_err(|e| {
                    SourceError::InvalidResponse(format!("Bad next cursor '{}': {}", link, e))
                })?),
                _ => None,
            };
        }

        tracing::info!(
            start = %start,
            end = %end,
            records = records.len(),
            "Fetched submissions by date range"
        );
        Ok(records)
    }

    async fn fetch_by_id(&self, external_id: &str) -> Result<Option<Value>, SourceError> {
        let url = self.by_id_url(external_id)?;
        let response = self.get(url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!(external_id, "Submission not found in source");
            return Ok(None);
        }

        let body = read_success_body(response).await?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| SourceError::InvalidResponse(format!("Bad submission body: {}", e)))?;

        if !value.is_object() {
            return Err(SourceError::InvalidResponse(
                "Submission body is not a JSON object".to_string(),
            ));
        }
        Ok(Some(value))
    }
}

/// Body of a 2xx response; anything else becomes `Rejected`
async fn read_success_body(response: reqwest::Response) -> Result<Vec<u8>, SourceError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| SourceError::Unavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(base_url: &str) -> SourceConfig {
        SourceConfig {
            base_url: base_url.to_string(),
            api_key: "secret".to_string(),
            source_tag: "kobo".to_string(),
            timeout: Duration::from_secs(5),
            requests_per_second: None,
        }
    }

    #[test]
    fn test_by_id_url_appends_encoded_segment() {
        let client = SourceClient::new(&config("https://kf.example.org/api/v2/assets/abc/data")).unwrap();
        assert_eq!(
            client.by_id_url("42").unwrap().as_str(),
            "https://kf.example.org/api/v2/assets/abc/data/42"
        );
        assert_eq!(
            client.by_id_url("a b/c").unwrap().as_str(),
            "https://kf.example.org/api/v2/assets/abc/data/a%20b%2Fc"
        );

        let client = SourceClient::new(&config("https://kf.example.org/data/")).unwrap();
        assert_eq!(
            client.by_id_url("7").unwrap().as_str(),
            "https://kf.example.org/data/7"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(SourceClient::new(&config("not a url")).is_err());
        assert!(SourceClient::new(&config("mailto:ops@example.org")).is_err());
    }

    #[test]
    fn test_source_tag_from_config() {
        let client = SourceClient::new(&config("https://kf.example.org/data")).unwrap();
        assert_eq!(client.source_tag(), "kobo");
    }
}

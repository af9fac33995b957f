pub mod auth;
pub mod directory;

use crate::config::Cloud;
use crate::error::{GroupSyncError, Result};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30000;
const JITTER_FACTOR: f64 = 0.3; // +/- 30% jitter

/// Calculate backoff with jitter for exponential backoff
fn calculate_backoff_with_jitter(attempt: u32) -> Duration {
    let base_backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
    let capped_backoff = base_backoff.min(MAX_BACKOFF_MS);

    let jitter_range = (capped_backoff as f64 * JITTER_FACTOR) as u64;
    let jitter = if jitter_range > 0 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::time::SystemTime::now().hash(&mut hasher);
        (hasher.finish() % (jitter_range * 2)) as i64 - jitter_range as i64
    } else {
        0
    };

    let final_backoff = (capped_backoff as i64 + jitter).max(100) as u64;
    Duration::from_millis(final_backoff)
}

/// Graph API client with retry support
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl GraphClient {
    pub fn new(access_token: String, cloud: Cloud) -> Self {
        Self::with_base_url(access_token, cloud.graph_base())
    }

    /// Point the client at an arbitrary Graph root (e.g. a mock server)
    pub fn with_base_url(access_token: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let resp = self
            .send_with_retry(Method::GET, &self.url(endpoint), None)
            .await?;
        Ok(resp.json::<T>().await?)
    }

    pub async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R> {
        let body = serde_json::to_value(body)?;
        let resp = self
            .send_with_retry(Method::POST, &self.url(endpoint), Some(&body))
            .await?;
        Ok(resp.json::<R>().await?)
    }

    /// POST to an endpoint that answers `204 No Content` (e.g. `$ref` links)
    pub async fn post_no_content<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<()> {
        let body = serde_json::to_value(body)?;
        self.send_with_retry(Method::POST, &self.url(endpoint), Some(&body))
            .await?;
        Ok(())
    }

    /// Send a request, retrying on 429, 5xx and connection errors
    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            let mut request = self
                .client
                .request(method.clone(), url)
                .bearer_auth(&self.access_token);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RETRIES - 1 {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(INITIAL_BACKOFF_MS / 1000);

                        tracing::warn!(
                            %method,
                            url,
                            retry_after,
                            attempt = attempt + 1,
                            max_attempts = MAX_RETRIES,
                            "Rate limited (429), retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(retry_after)).await;
                        continue;
                    }

                    if status.is_server_error() && attempt < MAX_RETRIES - 1 {
                        let wait_time = calculate_backoff_with_jitter(attempt);
                        tracing::warn!(
                            %method,
                            url,
                            %status,
                            wait_ms = wait_time.as_millis() as u64,
                            attempt = attempt + 1,
                            max_attempts = MAX_RETRIES,
                            "Server error, retrying"
                        );
                        tokio::time::sleep(wait_time).await;
                        continue;
                    }

                    if !status.is_success() {
                        let error_text = resp.text().await.unwrap_or_default();
                        let enhanced_error = crate::error::enhance_graph_error(&error_text);
                        return Err(GroupSyncError::GraphApiError(format!(
                            "HTTP {}: {}",
                            status, enhanced_error
                        )));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    if attempt < MAX_RETRIES - 1 {
                        let wait_time = calculate_backoff_with_jitter(attempt);
                        tracing::warn!(
                            %method,
                            url,
                            error = %e,
                            wait_ms = wait_time.as_millis() as u64,
                            attempt = attempt + 1,
                            max_attempts = MAX_RETRIES,
                            "Connection error, retrying"
                        );
                        tokio::time::sleep(wait_time).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map(|e| e.into()).unwrap_or_else(|| {
            GroupSyncError::GraphApiError(format!(
                "{} {} failed after {} retries",
                method, url, MAX_RETRIES
            ))
        }))
    }
}

/// Generic paginated response from Graph API
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl GraphClient {
    /// Fetch all pages of a paginated endpoint, following `@odata.nextLink`
    ///
    /// ```ignore
    /// let all_users: Vec<DirectoryObject> = client.get_all_pages("users").await?;
    /// ```
    pub async fn get_all_pages<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let mut all_items: Vec<T> = Vec::new();
        let mut current_url = self.url(endpoint);

        loop {
            let resp = self
                .send_with_retry(Method::GET, &current_url, None)
                .await?;
            let page: PaginatedResponse<T> = resp.json().await?;
            all_items.extend(page.value);

            match page.next_link {
                Some(next) => current_url = next,
                None => break,
            }
        }

        Ok(all_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let first = calculate_backoff_with_jitter(0);
        assert!(first >= Duration::from_millis(700) && first <= Duration::from_millis(1300));

        let capped = calculate_backoff_with_jitter(10);
        assert!(capped <= Duration::from_millis(39_000));
        assert!(capped >= Duration::from_millis(21_000));
    }

    #[test]
    fn test_url_joining() {
        let client = GraphClient::with_base_url("t".into(), "http://localhost:1234/v1.0/");
        assert_eq!(client.url("/groups"), "http://localhost:1234/v1.0/groups");
        assert_eq!(
            GraphClient::new("t".into(), Cloud::GccHigh).url("users"),
            "https://graph.microsoft.us/v1.0/users"
        );
    }
}

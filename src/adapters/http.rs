use crate::domain::ports::{HttpRequest, HttpResponse, HttpTransport};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

const TOO_MANY_REQUESTS: u16 = 429;

/// `HttpTransport` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrottlePolicy {
    /// Wait used when a 429 carries no usable Retry-After header.
    pub default_retry_after: Duration,
    /// `None` retries for as long as the server keeps throttling.
    pub max_retries: Option<u32>,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            default_retry_after: Duration::from_secs(5),
            max_retries: Some(10),
        }
    }
}

impl ThrottlePolicy {
    pub fn retry_delay(&self, response: &HttpResponse) -> Duration {
        response
            .header("Retry-After")
            .and_then(|value| value.trim().parse::<f64>().ok())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(self.default_retry_after)
    }
}

/// Destination client that waits out "too many requests" responses and
/// replays the identical request.
#[derive(Clone)]
pub struct RateLimitedClient {
    transport: Arc<dyn HttpTransport>,
    default_headers: Vec<(String, String)>,
    policy: ThrottlePolicy,
}

impl RateLimitedClient {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: ThrottlePolicy) -> Self {
        Self {
            transport,
            default_headers: Vec::new(),
            policy,
        }
    }

    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut request = request;
        for (name, value) in &self.default_headers {
            if !request.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name)) {
                request.headers.push((name.clone(), value.clone()));
            }
        }

        let mut retries = 0u32;
        loop {
            let response = self.transport.send(&request).await?;
            if response.status != TOO_MANY_REQUESTS {
                return Ok(response);
            }

            if let Some(max) = self.policy.max_retries {
                if retries >= max {
                    tracing::error!(
                        "Rate limit still exceeded after {} retries for {} {}",
                        retries,
                        request.method,
                        request.url
                    );
                    return Ok(response);
                }
            }

            let delay = self.policy.retry_delay(&response);
            retries += 1;
            tracing::warn!(
                "Rate limit exceeded. Retrying after {:?} (attempt {})",
                delay,
                retries
            );
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn get(&self, url: impl Into<String>) -> Result<HttpResponse> {
        self.request(HttpRequest::get(url)).await
    }

    pub async fn post(&self, url: impl Into<String>, body: serde_json::Value) -> Result<HttpResponse> {
        self.request(HttpRequest::post(url, body)).await
    }
}

//! reqwest-backed fetcher.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::{FetchError, FetchResponse, MediaFetcher};
use crate::config::HttpConfig;

/// Fetcher over a shared reqwest client.
///
/// The configured request timeout applies to playlist and segment requests
/// only; direct transfers can legitimately run for hours.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    request_timeout: Option<Duration>,
}

impl HttpFetcher {
    pub fn from_config(config: &HttpConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::Setup(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::Setup(format!("invalid value for {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
        })
    }

    fn timed_get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match self.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, FetchError> {
        let response = request.send().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

fn body_error(url: &str, e: reqwest::Error) -> FetchError {
    FetchError::Interrupted {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.send(self.timed_get(url), url).await?;
        response.text().await.map_err(|e| body_error(url, e))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self.send(self.timed_get(url), url).await?;
        response.bytes().await.map_err(|e| body_error(url, e))
    }

    async fn open(&self, url: &str, offset: u64) -> Result<FetchResponse, FetchError> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
            debug!(url, offset, "Requesting range");
        }

        let response = self.send(request, url).await?;
        let resumed = offset > 0 && response.status() == StatusCode::PARTIAL_CONTENT;
        let total = response
            .content_length()
            .map(|len| if resumed { offset + len } else { len });

        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| body_error(&owned_url, e)))
            .boxed();

        Ok(FetchResponse {
            total,
            resumed,
            body,
        })
    }
}

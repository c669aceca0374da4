//! Blocking JSON-over-HTTP plumbing shared by every remote backend.
//!
//! Maps transport failures and HTTP statuses onto the crate error taxonomy:
//! 429 is a rate limit, 401/403 a configuration problem, other 4xx a rejected
//! request, and 5xx, timeouts and connection failures mean unavailable.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use semsearch_core::error::{Error, Result};

const MAX_BODY_IN_ERROR: usize = 512;

#[derive(Clone)]
pub struct JsonClient {
    client: Client,
    component: String,
}

impl JsonClient {
    pub fn new(component: impl Into<String>, timeout: Duration, mut headers: HeaderMap) -> Result<Self> {
        let component = component.into();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::configuration(&component, format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, component })
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.client.put(url)
    }

    /// Send and decode; a 404 is a rejected request.
    pub fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R> {
        self.send_optional(request)?
            .ok_or_else(|| Error::request(&self.component, "resource not found (404)"))
    }

    /// Send and decode; a 404 comes back as `Ok(None)`.
    pub fn send_optional<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<R>> {
        let response = request.send().map_err(|e| transport_error(&self.component, &e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(status_error(&self.component, status, retry_after, &body));
        }
        response.json::<R>().map(Some).map_err(|e| {
            if e.is_timeout() {
                Error::unavailable(&self.component, e)
            } else {
                Error::request(&self.component, format!("failed to decode response: {e}"))
            }
        })
    }
}

/// `Authorization: Bearer <key>` headers.
pub fn bearer_headers(component: &str, api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
        .map_err(|_| Error::configuration(component, "API key contains invalid header characters"))?;
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// A single custom credential header such as `api-key` or `x-goog-api-key`.
pub fn key_header(component: &str, name: &'static str, api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(api_key.trim())
        .map_err(|_| Error::configuration(component, "API key contains invalid header characters"))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(headers)
}

pub fn status_error(component: &str, status: StatusCode, retry_after: Option<Duration>, body: &str) -> Error {
    let body = truncate(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => Error::ProviderRateLimited {
            component: component.to_string(),
            retry_after,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::configuration(component, format!("credential rejected ({status}): {body}"))
        }
        StatusCode::REQUEST_TIMEOUT => Error::unavailable(component, format!("{status}: {body}")),
        s if s.is_server_error() => Error::unavailable(component, format!("{status}: {body}")),
        _ => Error::request(component, format!("{status}: {body}")),
    }
}

fn transport_error(component: &str, err: &reqwest::Error) -> Error {
    if err.is_builder() {
        Error::configuration(component, format!("invalid request: {err}"))
    } else {
        Error::unavailable(component, err)
    }
}

/// `Retry-After` given in whole seconds. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

pub fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_IN_ERROR {
        return body.to_string();
    }
    let mut out: String = body.chars().take(MAX_BODY_IN_ERROR).collect();
    out.push('…');
    out
}

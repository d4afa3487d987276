//! HTTP client for a {json:api} backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::collection::Collection;
use super::error::{ApiError, JsonApiError};
use super::payload::Document;
use super::query::Query;
use super::resource::Resource;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{
    HttpBody, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartPart,
};
use crate::rate_limit::ApiRateLimiter;
use crate::retry::with_throttle_retry;
use crate::sync::ProgressCallback;

/// Default API host.
pub const DEFAULT_HOST: &str = "https://rest.api.transifex.com";

/// Request timeout for the default transport.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const MEDIA_TYPE: &str = "application/vnd.api+json";
const USER_AGENT: &str = concat!("txsync/", env!("CARGO_PKG_VERSION"));

/// Redirect hops `download` follows before giving up.
pub const MAX_DOWNLOAD_REDIRECTS: usize = 10;

/// Seconds to wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// A cheaply clonable handle to the API.
///
/// Every request carries the bearer token and the `Integration` header.
/// Throttled requests (429) are retried until they succeed; nothing else is
/// retried.
#[derive(Clone)]
pub struct JsonApiClient {
    transport: Arc<dyn HttpTransport>,
    host: String,
    token: String,
    rate_limiter: Option<ApiRateLimiter>,
    on_progress: Option<Arc<ProgressCallback>>,
    throttle_countdown: bool,
}

impl JsonApiClient {
    /// Create a client backed by reqwest.
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Result<Self, JsonApiError> {
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?;
        Ok(Self::new_with_transport(host, token, Arc::new(transport)))
    }

    pub fn new_with_transport(
        host: impl Into<String>,
        token: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        Self {
            transport,
            host,
            token: token.into(),
            rate_limiter: None,
            on_progress: None,
            throttle_countdown: false,
        }
    }

    /// Pace requests with a shared limiter.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: ApiRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Report throttle waits through a progress callback.
    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Emit a per-second countdown while throttled instead of one event.
    #[must_use]
    pub fn with_throttle_countdown(mut self, countdown: bool) -> Self {
        self.throttle_countdown = countdown;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Absolute URL for a path, or the input itself when it already is one.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{path}", self.host)
        } else {
            format!("{}/{path}", self.host)
        }
    }

    fn build_request(
        &self,
        method: HttpMethod,
        url: String,
        body: HttpBody,
        authenticated: bool,
    ) -> HttpRequest {
        let mut headers: HttpHeaders = vec![("User-Agent".to_string(), USER_AGENT.to_string())];
        if authenticated {
            headers.push(("Authorization".to_string(), format!("Bearer {}", self.token)));
            headers.push(("Integration".to_string(), "txclient".to_string()));
            headers.push(("Accept".to_string(), MEDIA_TYPE.to_string()));
        }
        // Multipart bodies get their boundary content type from the transport.
        if matches!(body, HttpBody::Bytes(_)) {
            headers.push(("Content-Type".to_string(), MEDIA_TYPE.to_string()));
        }

        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }

    /// One round trip, with the status code mapped onto an error.
    async fn attempt(&self, request: HttpRequest) -> Result<HttpResponse, JsonApiError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }

        tracing::debug!(method = request.method.as_str(), url = %request.url, "request");
        let response = self.transport.send(request).await?;

        match response.status {
            429 => {
                // A zero wait would turn the retry into a busy loop.
                let retry_after = response
                    .header("retry-after")
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
                    .max(1);
                Err(JsonApiError::Throttled { retry_after })
            }
            300..=399 => Err(JsonApiError::Redirect {
                location: response.header("location").unwrap_or_default().to_string(),
            }),
            status if status >= 400 => {
                Err(ApiError::from_response(status, &response.body).into())
            }
            _ => Ok(response),
        }
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, JsonApiError> {
        let target = format!("{} {}", request.method.as_str(), request.url);
        with_throttle_retry(
            || self.attempt(request.clone()),
            &target,
            self.on_progress.clone(),
            self.throttle_countdown,
        )
        .await
    }

    pub(crate) async fn send_json(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Document, JsonApiError> {
        let body = match body {
            Some(value) => HttpBody::Bytes(serde_json::to_vec(&value)?),
            None => HttpBody::Empty,
        };
        let request = self.build_request(method, self.url(path), body, true);
        let response = self.execute(request).await?;
        Document::parse(&response.body)
    }

    pub(crate) async fn send_multipart(
        &self,
        method: HttpMethod,
        path: &str,
        parts: Vec<MultipartPart>,
    ) -> Result<Document, JsonApiError> {
        let request = self.build_request(method, self.url(path), HttpBody::Multipart(parts), true);
        let response = self.execute(request).await?;
        Document::parse(&response.body)
    }

    /// Fetch one object by type and id.
    pub async fn get(&self, resource_type: &str, id: &str) -> Result<Resource, JsonApiError> {
        let path = format!("/{resource_type}/{id}");
        match self.send_json(HttpMethod::Get, &path, None).await {
            Ok(document) => document.into_resource(),
            Err(err) if err.is_not_found() => Err(JsonApiError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    /// Fetch the first page of a list endpoint.
    pub async fn list(&self, resource_type: &str, query: &Query) -> Result<Collection, JsonApiError> {
        let path = if query.is_empty() {
            format!("/{resource_type}")
        } else {
            format!("/{resource_type}?{}", query.encode())
        };
        self.send_json(HttpMethod::Get, &path, None)
            .await?
            .into_collection()
    }

    /// Plain GET of a URL outside the API, e.g. a redirect target.
    ///
    /// The API credentials are not sent. Redirects are followed here, up to
    /// [`MAX_DOWNLOAD_REDIRECTS`] hops; a redirect without a `Location` is an
    /// error.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, JsonApiError> {
        let mut url = self.url(url);
        for _ in 0..=MAX_DOWNLOAD_REDIRECTS {
            let request = self.build_request(HttpMethod::Get, url.clone(), HttpBody::Empty, false);
            match self.execute(request).await {
                Ok(response) => return Ok(response.body),
                Err(JsonApiError::Redirect { location }) if !location.is_empty() => {
                    tracing::debug!(from = %url, to = %location, "Following download redirect");
                    url = resolve_location(&url, &location);
                }
                Err(JsonApiError::Redirect { .. }) => {
                    return Err(JsonApiError::unexpected(format!(
                        "redirect without a location from {url}"
                    )));
                }
                Err(err) => return Err(err),
            }
        }
        Err(JsonApiError::unexpected(format!(
            "more than {MAX_DOWNLOAD_REDIRECTS} redirects downloading {url}"
        )))
    }
}

/// A `Location` value made absolute against the URL that returned it.
fn resolve_location(current: &str, location: &str) -> String {
    url::Url::parse(current)
        .and_then(|base| base.join(location))
        .map(String::from)
        .unwrap_or_else(|_| location.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{MockTransport, header_get};
    use crate::sync::SyncProgress;
    use serde_json::json;
    use std::sync::Mutex;

    const HOST: &str = "https://api.test";

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn client(transport: &MockTransport) -> JsonApiClient {
        JsonApiClient::new_with_transport(HOST, "secret", Arc::new(transport.clone()))
    }

    #[test]
    fn url_joins_paths_and_keeps_absolute_urls() {
        let client = client(&MockTransport::new());
        assert_eq!(client.url("/projects"), "https://api.test/projects");
        assert_eq!(client.url("projects"), "https://api.test/projects");
        assert_eq!(
            client.url("https://cdn.test/file"),
            "https://cdn.test/file"
        );
    }

    #[test]
    fn trailing_slash_on_host_is_trimmed() {
        let client =
            JsonApiClient::new_with_transport("https://api.test/", "t", Arc::new(MockTransport::new()));
        assert_eq!(client.host(), "https://api.test");
    }

    #[tokio::test]
    async fn requests_carry_auth_and_integration_headers() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{HOST}/projects/p1"),
            200,
            json!({"data": {"type": "projects", "id": "p1"}}),
        );
        let client = client(&transport);

        client.get("projects", "p1").await.expect("get");

        let request = &transport.requests()[0];
        assert_eq!(
            header_get(&request.headers, "authorization"),
            Some("Bearer secret")
        );
        assert_eq!(header_get(&request.headers, "integration"), Some("txclient"));
        assert_eq!(header_get(&request.headers, "content-type"), None);
    }

    #[tokio::test]
    async fn download_omits_credentials() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            "https://cdn.test/file",
            response(200, &[], "content"),
        );
        let client = client(&transport);

        let bytes = client.download("https://cdn.test/file").await.expect("download");
        assert_eq!(bytes, b"content");
        let request = &transport.requests()[0];
        assert_eq!(header_get(&request.headers, "authorization"), None);
    }

    #[tokio::test]
    async fn get_maps_404_to_not_found() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{HOST}/resources/missing"),
            404,
            json!({"errors": [{"status": "404", "code": "not_found", "detail": "nope"}]}),
        );
        let client = client(&transport);

        let err = client.get("resources", "missing").await.expect_err("404");
        assert!(
            matches!(err, JsonApiError::NotFound { ref resource_type, ref id }
                if resource_type == "resources" && id == "missing")
        );
    }

    #[tokio::test]
    async fn error_status_yields_api_error() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{HOST}/projects"),
            403,
            json!({"errors": [{"status": "403", "code": "forbidden", "detail": "no access"}]}),
        );
        let client = client(&transport);

        let err = client
            .list("projects", &Query::new())
            .await
            .expect_err("403");
        match err {
            JsonApiError::Api(api) => {
                assert_eq!(api.status_code, 403);
                assert_eq!(api.items[0].code, "forbidden");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn see_other_is_returned_as_redirect() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{HOST}/jobs/1"),
            response(303, &[("Location", "https://cdn.test/out")], ""),
        );
        let client = client(&transport);

        let err = client.get("jobs", "1").await.expect_err("redirect");
        assert!(
            matches!(err, JsonApiError::Redirect { ref location } if location == "https://cdn.test/out")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_request_waits_and_retries() {
        let transport = MockTransport::new();
        let url = format!("{HOST}/projects/p1");
        transport.push_response(
            HttpMethod::Get,
            url.clone(),
            response(429, &[("Retry-After", "2")], ""),
        );
        transport.push_json(
            HttpMethod::Get,
            url,
            200,
            json!({"data": {"type": "projects", "id": "p1"}}),
        );

        let events: Arc<Mutex<Vec<SyncProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        });
        let client = client(&transport).with_progress(Arc::new(callback));

        let started = tokio::time::Instant::now();
        let project = client.get("projects", "p1").await.expect("eventually ok");

        assert_eq!(project.id, "p1");
        assert_eq!(transport.requests().len(), 2);
        assert!(started.elapsed() >= Duration::from_secs(2));
        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        assert!(events.iter().any(|e| matches!(
            e,
            SyncProgress::Throttled {
                retry_after_secs: 2,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_without_header_defaults_to_one_second() {
        let transport = MockTransport::new();
        let url = format!("{HOST}/projects/p1");
        transport.push_response(HttpMethod::Get, url.clone(), response(429, &[], ""));
        transport.push_json(
            HttpMethod::Get,
            url,
            200,
            json!({"data": {"type": "projects", "id": "p1"}}),
        );
        let client = client(&transport);

        let started = tokio::time::Instant::now();
        client.get("projects", "p1").await.expect("eventually ok");
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn download_follows_redirects_to_the_content() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            "https://cdn.test/a",
            response(302, &[("Location", "https://cdn.test/b")], ""),
        );
        transport.push_response(
            HttpMethod::Get,
            "https://cdn.test/b",
            response(307, &[("Location", "/files/c")], ""),
        );
        transport.push_response(
            HttpMethod::Get,
            "https://cdn.test/files/c",
            response(200, &[], "translated"),
        );
        let client = client(&transport);

        let bytes = client.download("https://cdn.test/a").await.expect("download");

        assert_eq!(bytes, b"translated");
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn download_redirect_without_location_is_an_error() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            "https://cdn.test/a",
            response(302, &[], ""),
        );
        let client = client(&transport);

        let err = client
            .download("https://cdn.test/a")
            .await
            .expect_err("no location");
        assert!(matches!(err, JsonApiError::UnexpectedPayload(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retry_after_still_waits_a_second() {
        let transport = MockTransport::new();
        let url = format!("{HOST}/projects/p1");
        transport.push_response(
            HttpMethod::Get,
            url.clone(),
            response(429, &[("Retry-After", "0")], ""),
        );
        transport.push_json(
            HttpMethod::Get,
            url,
            200,
            json!({"data": {"type": "projects", "id": "p1"}}),
        );
        let client = client(&transport);

        let started = tokio::time::Instant::now();
        client.get("projects", "p1").await.expect("eventually ok");
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}

use async_trait::async_trait;
use reqwest::{header, Method};
use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, SignalAborted};

/// Response surface the retry engine needs from a transport.
pub trait HttpResponse {
    fn status_code(&self) -> u16;
}

impl HttpResponse for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

/// Sends one HTTP request.
///
/// `signal` is cancelled when the attempt's timeout elapses. Implementations
/// should stop work and fail when it fires; the engine aborts the attempt
/// either way.
#[async_trait]
pub trait Transport: Send + Sync {
    type Response: HttpResponse + Send;

    async fn fetch(
        &self,
        url: &str,
        request: &RequestOptions,
        signal: &CancellationToken,
    ) -> Result<Self::Response, BoxError>;
}

/// Request settings passed through to the transport unchanged.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestOptions {
    /// HTTP method name, e.g. `"GET"`.
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET.as_str().to_owned(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: Method::POST.as_str().to_owned(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Default transport backed by [`reqwest::Client`].
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client, e.g. with proxies or default headers.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn build(
        &self,
        url: &str,
        request: &RequestOptions,
    ) -> Result<reqwest::RequestBuilder, BoxError> {
        let method = Method::from_bytes(request.method.as_bytes())?;
        let mut builder = self.http.request(method, url);
        for (name, value) in &request.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())?;
            let value = header::HeaderValue::from_str(value)?;
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    type Response = reqwest::Response;

    async fn fetch(
        &self,
        url: &str,
        request: &RequestOptions,
        signal: &CancellationToken,
    ) -> Result<Self::Response, BoxError> {
        let builder = self.build(url, request)?;
        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(Box::new(SignalAborted) as BoxError),
            response = builder.send() => Ok(response?),
        }
    }
}

use serde_json::Value;
use tokio::time::sleep;

use crate::{
    FetchError, HttpResponse, Rejection, RequestOptions, ReqwestTransport, Result, RetryOptions,
    StatusError, TimeoutContext, Transport,
};

/// Result of a single attempt, consumed immediately by the run loop.
enum AttemptOutcome<R> {
    Accepted(R),
    RetryableFailure(FetchError),
    TerminalFailure(FetchError),
}

/// Run loop states. Attempt indexes are 0-based.
enum State<R> {
    Attempting(u32),
    RetryingDelay(u32),
    Accepted(R),
    Failed(FetchError),
}

/// Final result of a run together with every error recorded along the way.
#[derive(Debug)]
pub struct RetryReport<R> {
    pub result: Result<R>,
    /// One entry per non-accepted attempt, oldest first.
    pub errors: Vec<FetchError>,
}

/// HTTP client that retries each request with a fixed delay.
///
/// Every attempt gets its own [`TimeoutContext`]; an attempt that outlives
/// `signal_timeout_ms` is aborted and counted like any other failure.
#[derive(Clone, Debug)]
pub struct RetryClient<T = ReqwestTransport> {
    transport: T,
    options: RetryOptions,
}

impl RetryClient<ReqwestTransport> {
    /// Creates a client over a default [`reqwest::Client`].
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }
}

impl Default for RetryClient<ReqwestTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> RetryClient<T> {
    /// Creates a client over a custom transport.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            options: RetryOptions::default(),
        }
    }

    /// Applies retry options used by [`RetryClient::run`].
    pub fn with_options(mut self, opts: RetryOptions) -> Self {
        self.options = opts.normalize();
        self
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `request` to `url` until a status in the accept set comes back.
    ///
    /// Each failed attempt is appended to `errors`. On failure the returned
    /// error is the last one appended.
    pub async fn run(
        &self,
        url: &str,
        request: Option<RequestOptions>,
        errors: &mut Vec<FetchError>,
    ) -> Result<T::Response> {
        self.run_with_options(url, request, &self.options, errors)
            .await
    }

    /// Like [`RetryClient::run`] but with per-call options.
    pub async fn run_with_options(
        &self,
        url: &str,
        request: Option<RequestOptions>,
        options: &RetryOptions,
        errors: &mut Vec<FetchError>,
    ) -> Result<T::Response> {
        let options = options.normalize();
        let request = request.unwrap_or_default();
        let mut state = State::Attempting(0);

        loop {
            state = match state {
                State::Attempting(index) => {
                    match self.attempt(url, &request, &options, index).await {
                        AttemptOutcome::Accepted(response) => State::Accepted(response),
                        AttemptOutcome::RetryableFailure(err) => {
                            errors.push(err.clone());
                            if err.will_retry() {
                                State::RetryingDelay(index)
                            } else {
                                State::Failed(err)
                            }
                        }
                        AttemptOutcome::TerminalFailure(err) => {
                            errors.push(err.clone());
                            State::Failed(err)
                        }
                    }
                }
                State::RetryingDelay(index) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "retrying {} after {} ms (attempt {} of {})",
                        url,
                        options.retry_timeout_ms,
                        index + 2,
                        options.max_retries
                    );

                    sleep(options.retry_timeout()).await;
                    State::Attempting(index + 1)
                }
                State::Accepted(response) => return Ok(response),
                State::Failed(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("giving up on {}: {}", url, err);

                    return Err(err);
                }
            };
        }
    }

    /// Runs with the client options and returns the error history with the result.
    pub async fn run_with_history(
        &self,
        url: &str,
        request: Option<RequestOptions>,
    ) -> RetryReport<T::Response> {
        let mut errors = Vec::new();
        let result = self.run(url, request, &mut errors).await;
        RetryReport { result, errors }
    }

    async fn attempt(
        &self,
        url: &str,
        request: &RequestOptions,
        options: &RetryOptions,
        index: u32,
    ) -> AttemptOutcome<T::Response> {
        let attempt = index + 1;
        let will_retry = attempt < options.max_retries;
        let context = TimeoutContext::create(options.signal_timeout());

        // The transport may ignore the signal, so race it here as well.
        let sent = tokio::select! {
            biased;
            sent = self.transport.fetch(url, request, context.signal()) => Some(sent),
            _ = context.signal().cancelled() => None,
        };

        let outcome = match sent {
            Some(Ok(response)) => {
                context.disarm();
                match classify_status(response.status_code(), options, index) {
                    None => AttemptOutcome::Accepted(response),
                    Some(err) if err.rejection == Rejection::NotRetryable => {
                        AttemptOutcome::TerminalFailure(FetchError::Status(err))
                    }
                    Some(err) => AttemptOutcome::RetryableFailure(FetchError::Status(err)),
                }
            }
            Some(Err(source)) if !context.is_aborted() => {
                AttemptOutcome::RetryableFailure(FetchError::transport(source, attempt, will_retry))
            }
            Some(Err(_)) | None => AttemptOutcome::RetryableFailure(FetchError::Abort {
                timeout_ms: options.signal_timeout_ms,
                attempt,
                will_retry,
            }),
        };

        #[cfg(feature = "tracing")]
        if let AttemptOutcome::RetryableFailure(err) | AttemptOutcome::TerminalFailure(err) =
            &outcome
        {
            tracing::debug!("attempt {} for {} failed: {}", attempt, url, err);
        }

        outcome
    }
}

/// Sends a request over the default reqwest transport with loosely-typed
/// retry options.
///
/// `retry_options` is normalized with [`RetryOptions::from_value`], so
/// malformed fields fall back to their defaults instead of failing.
pub async fn fetch_with_retry(
    url: &str,
    request: Option<RequestOptions>,
    retry_options: Option<&Value>,
    errors: &mut Vec<FetchError>,
) -> Result<reqwest::Response> {
    let options = RetryOptions::from_value(retry_options);
    RetryClient::new()
        .run_with_options(url, request, &options, errors)
        .await
}

/// Returns `None` when `status` is accepted.
///
/// Accept codes win over retry codes when both list the same status.
fn classify_status(status: u16, options: &RetryOptions, index: u32) -> Option<StatusError> {
    if options.accept_status_codes.contains(&status) {
        return None;
    }

    let will_retry = index + 1 < options.max_retries;
    let (rejection, codes, will_retry) = if options.retry_status_codes.is_empty() {
        (Rejection::NotAccepted, &options.accept_status_codes, will_retry)
    } else if options.retry_status_codes.contains(&status) {
        (Rejection::Retryable, &options.retry_status_codes, will_retry)
    } else {
        (Rejection::NotRetryable, &options.retry_status_codes, false)
    };

    Some(StatusError {
        status,
        rejection,
        codes: codes.clone(),
        attempt: index + 1,
        will_retry,
    })
}

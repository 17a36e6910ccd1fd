//! `rfetch` sends HTTP requests and retries them with a fixed delay.
//!
//! Each attempt runs under its own timeout signal; the response status is
//! classified against an accept set and an optional retry set:
//! - [`RetryClient::run`]
//! - [`RetryClient::run_with_history`]
//! - [`fetch_with_retry`]

mod client;
mod error;
mod options;
mod parse;
mod signal;
mod transport;

pub use client::{fetch_with_retry, RetryClient, RetryReport};
pub use error::{BoxError, FetchError, Rejection, SignalAborted, StatusError};
pub use options::RetryOptions;
pub use signal::TimeoutContext;
pub use transport::{HttpResponse, ReqwestTransport, RequestOptions, Transport};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, FetchError>;

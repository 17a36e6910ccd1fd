use std::{error::Error as StdError, fmt, sync::Arc};

/// Boxed error returned by [`crate::Transport`] implementations.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Error type returned by this crate.
///
/// Every variant records the 1-indexed attempt it belongs to and whether the
/// engine went on to retry after it.
#[derive(Clone, Debug, thiserror::Error)]
pub enum FetchError {
    /// The attempt exceeded its signal timeout before a response arrived.
    #[error(
        "AbortError: signal timeout of <{timeout_ms}> ms elapsed, \
         attempt: <{attempt}>, willRetry: <{will_retry}>."
    )]
    Abort {
        /// Configured per-attempt timeout.
        timeout_ms: u64,
        attempt: u32,
        will_retry: bool,
    },
    /// A response was received but its status is not directly returnable.
    #[error("RetryError: {0}")]
    Status(StatusError),
    /// Any other failure raised by the transport.
    #[error("TransportError: {source}")]
    Transport {
        #[source]
        source: Arc<dyn StdError + Send + Sync + 'static>,
        attempt: u32,
        will_retry: bool,
    },
}

impl FetchError {
    /// 1-indexed attempt that produced this error.
    pub fn attempt(&self) -> u32 {
        match self {
            Self::Abort { attempt, .. } | Self::Transport { attempt, .. } => *attempt,
            Self::Status(err) => err.attempt,
        }
    }

    /// Whether the engine scheduled another attempt after this one.
    pub fn will_retry(&self) -> bool {
        match self {
            Self::Abort { will_retry, .. } | Self::Transport { will_retry, .. } => *will_retry,
            Self::Status(err) => err.will_retry,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort { .. })
    }

    /// Response status, if the attempt got as far as a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(err) => Some(err.status),
            _ => None,
        }
    }

    pub(crate) fn transport(source: BoxError, attempt: u32, will_retry: bool) -> Self {
        Self::Transport {
            source: Arc::from(source),
            attempt,
            will_retry,
        }
    }
}

/// Why a received status was not returned to the caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rejection {
    /// Retry set is empty and the status is outside the accept set.
    NotAccepted,
    /// Status is listed in the retry set.
    Retryable,
    /// Retry set is non-empty and does not list the status. Ends the loop.
    NotRetryable,
}

/// Classification of a non-accepted response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatusError {
    pub status: u16,
    pub rejection: Rejection,
    /// The code set that decided the branch: accept codes for
    /// [`Rejection::NotAccepted`], retry codes otherwise.
    pub codes: Vec<u16>,
    pub attempt: u32,
    pub will_retry: bool,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes = self
            .codes
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let relation = match self.rejection {
            Rejection::NotAccepted => "not in expected acceptStatusCodes",
            Rejection::Retryable => "is in retryStatusCodes",
            Rejection::NotRetryable => "is not in retryStatusCodes",
        };
        write!(
            f,
            "Response.status: <{}>, {relation}: <[{codes}]> attempt: <{}>, willRetry: <{}>.",
            self.status, self.attempt, self.will_retry
        )
    }
}

impl StdError for StatusError {}

/// Raised by transports that observe the per-attempt signal firing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, thiserror::Error)]
#[error("the request was aborted by its signal")]
pub struct SignalAborted;

#[cfg(test)]
mod tests {
    use super::{FetchError, Rejection, SignalAborted, StatusError};

    fn status_error(rejection: Rejection, codes: Vec<u16>, will_retry: bool) -> FetchError {
        FetchError::Status(StatusError {
            status: 503,
            rejection,
            codes,
            attempt: 2,
            will_retry,
        })
    }

    #[test]
    fn retryable_message_names_retry_codes() {
        let err = status_error(Rejection::Retryable, vec![503, 408], true);
        assert_eq!(
            err.to_string(),
            "RetryError: Response.status: <503>, is in retryStatusCodes: <[503, 408]> \
             attempt: <2>, willRetry: <true>."
        );
    }

    #[test]
    fn not_retryable_message_never_retries() {
        let err = status_error(Rejection::NotRetryable, vec![418], false);
        assert_eq!(
            err.to_string(),
            "RetryError: Response.status: <503>, is not in retryStatusCodes: <[418]> \
             attempt: <2>, willRetry: <false>."
        );
    }

    #[test]
    fn not_accepted_message_names_accept_codes() {
        let err = status_error(Rejection::NotAccepted, vec![200, 204], false);
        assert_eq!(
            err.to_string(),
            "RetryError: Response.status: <503>, not in expected acceptStatusCodes: <[200, 204]> \
             attempt: <2>, willRetry: <false>."
        );
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.attempt(), 2);
    }

    #[test]
    fn abort_message_carries_timeout_and_attempt() {
        let err = FetchError::Abort {
            timeout_ms: 100,
            attempt: 5,
            will_retry: false,
        };
        assert!(err.is_abort());
        assert_eq!(err.status(), None);
        assert_eq!(
            err.to_string(),
            "AbortError: signal timeout of <100> ms elapsed, attempt: <5>, willRetry: <false>."
        );
    }

    #[test]
    fn transport_error_exposes_source() {
        let err = FetchError::transport(Box::new(SignalAborted), 1, true);
        assert!(err.will_retry());
        assert_eq!(
            err.to_string(),
            "TransportError: the request was aborted by its signal"
        );
        let source = std::error::Error::source(&err).expect("source must be kept");
        assert_eq!(source.to_string(), SignalAborted.to_string());
    }
}

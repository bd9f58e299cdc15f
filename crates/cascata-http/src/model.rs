//! Models for pending HTTP exchanges

use std::time::Duration;

use tokio::sync::oneshot;

/// Default maximum number of outstanding requests
pub const DEFAULT_MAX_OUTSTANDING_REQUESTS: usize = 5000;

/// Default time an unanswered request stays registered
pub const DEFAULT_REQUEST_EXPIRATION: Duration = Duration::from_secs(60);

/// Errors raised by the outstanding-request registry
#[derive(thiserror::Error, Debug)]
pub enum ContextMapError {
    #[error("HTTP request already registered with identifier {0}")]
    AlreadyRegistered(String),

    #[error("no HTTP request registered with identifier {0}")]
    NotRegistered(String),
}

/// Final word delivered to whatever is suspending an HTTP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDirective {
    /// The response has been produced; finish the exchange
    Complete,
    /// The request expired unanswered; answer with 503
    ServiceUnavailable,
}

/// Sending half of a suspended exchange
///
/// Delivery consumes the handle, so an exchange can be answered at most once.
#[derive(Debug)]
pub struct ResponseHandle {
    sender: oneshot::Sender<ResponseDirective>,
}

impl ResponseHandle {
    /// New handle plus the receiver the suspended exchange waits on
    pub fn channel() -> (Self, oneshot::Receiver<ResponseDirective>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Deliver the directive; fails if the waiting side has gone away
    pub fn send(self, directive: ResponseDirective) -> Result<(), ResponseDirective> {
        self.sender.send(directive)
    }
}

/// Snapshot of the request retained with a pending exchange
#[derive(Debug, Clone, Default)]
pub struct HttpRequestInfo {
    pub method: String,
    pub uri: String,
    pub client_address: Option<String>,
}

impl HttpRequestInfo {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            client_address: None,
        }
    }
}

/// Settings for the outstanding-request registry
#[derive(Debug, Clone)]
pub struct ContextMapConfig {
    /// Maximum number of requests outstanding at any one time; registering
    /// beyond this is refused
    pub max_outstanding_requests: usize,
    /// How long a request is left unanswered before being evicted and
    /// answered with "service unavailable"
    pub request_expiration: Duration,
}

impl Default for ContextMapConfig {
    fn default() -> Self {
        Self {
            max_outstanding_requests: DEFAULT_MAX_OUTSTANDING_REQUESTS,
            request_expiration: DEFAULT_REQUEST_EXPIRATION,
        }
    }
}

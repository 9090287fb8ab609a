//! Cross-origin lookup transport.
//!
//! A [`Transport`] turns an endpoint and a [`LookupQuery`] into a validated
//! [`LookupOutcome`]. The production implementation is [`JsonpTransport`];
//! the callback-name bookkeeping it needs lives in [`registry`] and never
//! leaks to callers.

pub mod jsonp;
pub mod registry;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::model::types::{EnvelopeError, LookupOutcome, LookupQuery};

pub use jsonp::{JsonpTransport, build_request_url, extract_callback_payload};
pub use registry::{CallbackGuard, CallbackRegistry};

/// Failures below the envelope level: the remote never produced a usable answer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("JSONP load error: {0}")]
    Load(String),

    #[error("JSONP load error: HTTP {0}")]
    HttpStatus(u16),

    #[error("JSONP load error: request timed out after {0:?}")]
    Timeout(Duration),

    #[error("response never invoked callback {callback}")]
    CallbackNotInvoked { callback: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<EnvelopeError> for TransportError {
    fn from(err: EnvelopeError) -> Self {
        TransportError::Malformed(err.to_string())
    }
}

/// Read-only lookup against a remote directory service.
pub trait Transport: Send + Sync {
    fn fetch(
        &self,
        endpoint: &Url,
        query: &LookupQuery,
    ) -> impl Future<Output = Result<LookupOutcome, TransportError>> + Send;
}

/// Transport that answers every lookup with a fixed outcome, e.g. a saved envelope.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    outcome: LookupOutcome,
}

impl ReplayTransport {
    pub fn new(outcome: LookupOutcome) -> Self {
        Self { outcome }
    }
}

impl Transport for ReplayTransport {
    fn fetch(
        &self,
        _endpoint: &Url,
        _query: &LookupQuery,
    ) -> impl Future<Output = Result<LookupOutcome, TransportError>> + Send {
        std::future::ready(Ok(self.outcome.clone()))
    }
}

//! Error types and provider-agnostic failure classification.
//!
//! Every failure raised by an adapter is a [`GatewayError::Provider`] carrying an ordered
//! chain of tags: the provider [`Sentinel`] naming the subsystem that failed, an optional
//! [`Category`] that callers can branch on without knowing the vendor, and the original
//! [`Cause`].
//!
//! ```
//! use gateway_core::error::{Category, Cause, GatewayError, Sentinel};
//!
//! let err = GatewayError::classify("openai", Sentinel::Generation, Cause::api(429, "slow down"));
//! assert!(err.is(Category::RateLimited));
//! assert!(err.is(Sentinel::Generation));
//! assert!(err.is_retryable());
//! ```

use crate::batch::BatchStatus;
use crate::provider::Capability;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the gateway.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Subsystem that failed. Always the first tag of a provider error chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// Building the vendor client failed
    ClientConstruction,
    /// A single (non-streaming) generation failed
    Generation,
    /// A streaming generation failed
    Stream,
    /// A batch submit/poll/list/download/cancel call failed
    Batch,
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientConstruction => write!(f, "client construction failed"),
            Self::Generation => write!(f, "generation failed"),
            Self::Stream => write!(f, "stream failed"),
            Self::Batch => write!(f, "batch failed"),
        }
    }
}

/// Provider-agnostic failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// HTTP 429 equivalent
    RateLimited,
    /// HTTP 401 equivalent
    AuthFailed,
    /// HTTP 402 equivalent
    InsufficientCredits,
    /// HTTP 400 equivalent
    BadRequest,
    /// HTTP 500/503/529 equivalents, cancellation and deadline expiry
    ServiceUnavailable,
}

impl Category {
    /// Map an HTTP-like status code to a category.
    ///
    /// Codes outside the fixed table yield `None`.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(Self::RateLimited),
            401 => Some(Self::AuthFailed),
            402 => Some(Self::InsufficientCredits),
            400 => Some(Self::BadRequest),
            500 | 503 | 529 => Some(Self::ServiceUnavailable),
            _ => None,
        }
    }

    /// Whether a caller may retry with backoff.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::ServiceUnavailable)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::InsufficientCredits => write!(f, "insufficient credits"),
            Self::BadRequest => write!(f, "bad request"),
            Self::ServiceUnavailable => write!(f, "service unavailable"),
        }
    }
}

/// A classification tag that can be queried with [`GatewayError::is`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorTag {
    /// Provider sentinel
    Sentinel(Sentinel),
    /// Category sentinel
    Category(Category),
}

impl From<Sentinel> for ErrorTag {
    fn from(sentinel: Sentinel) -> Self {
        Self::Sentinel(sentinel)
    }
}

impl From<Category> for ErrorTag {
    fn from(category: Category) -> Self {
        Self::Category(category)
    }
}

/// The original failure at the bottom of a provider error chain.
#[derive(Debug, Clone, Error)]
pub enum Cause {
    /// The caller's cancellation token fired
    #[error("request cancelled")]
    Cancelled,

    /// The request deadline (client timeout) elapsed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The vendor answered with an error status
    #[error("HTTP {status}: {message}")]
    Api {
        /// HTTP-like status code
        status: u16,
        /// Vendor error code or type, when reported
        code: Option<String>,
        /// Vendor error message
        message: String,
    },

    /// Connection or I/O failure before a status was received
    #[error("transport error: {0}")]
    Transport(String),

    /// The vendor payload could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl Cause {
    /// Vendor API error with a status code.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Vendor API error with a status code and vendor error code.
    pub fn api_with_code(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code,
            message: message.into(),
        }
    }

    /// Status code, when the cause carries one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Category derived from this cause.
    ///
    /// Cancellation and deadline expiry are checked before the status table, so a cancelled
    /// request is never reported as a plain provider failure.
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Cancelled | Self::DeadlineExceeded => Some(Category::ServiceUnavailable),
            Self::Api { status, .. } => Category::from_status(*status),
            Self::Transport(_) | Self::Decode(_) | Self::Other(_) => None,
        }
    }
}

fn category_suffix(category: &Option<Category>) -> String {
    category.map(|c| format!(" ({c})")).unwrap_or_default()
}

/// Gateway error type.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Missing or invalid configuration; fatal at model construction
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem
        message: String,
    },

    /// Caller input failed validation before anything was sent
    #[error("validation error: {message}")]
    Validation {
        /// Description of the problem
        message: String,
        /// Offending field, when known
        field: Option<String>,
        /// Machine-readable code
        code: String,
    },

    /// Classified vendor failure
    #[error("{provider}: {sentinel}{}: {cause}", category_suffix(.category))]
    Provider {
        /// Provider name ("anthropic", "openai", ...)
        provider: String,
        /// Failing subsystem
        sentinel: Sentinel,
        /// Provider-agnostic category, if one applies
        category: Option<Category>,
        /// Original failure
        #[source]
        cause: Cause,
    },

    /// The model does not declare the capability needed for the call
    #[error("capability not supported: {capability}")]
    Unsupported {
        /// Missing capability
        capability: Capability,
    },

    /// `RawClient::downcast` was asked for the wrong concrete type
    #[error("raw client type mismatch: requested {expected}, model holds {actual}")]
    RawClientMismatch {
        /// Requested type name
        expected: &'static str,
        /// Actual type name
        actual: &'static str,
    },

    /// Batch results requested before the job completed
    #[error("batch job {id} is {status}; results are only available once it has completed")]
    BatchNotReady {
        /// Batch job ID
        id: String,
        /// Current status
        status: BatchStatus,
    },

    /// The model was closed and can no longer issue calls
    #[error("model {model_id} has been closed")]
    Closed {
        /// Model identifier
        model_id: String,
    },

    /// Internal invariant violated
    #[error("internal error: {message}")]
    Internal {
        /// Description of the problem
        message: String,
    },
}

impl GatewayError {
    /// Classify a vendor failure into a provider error chain.
    pub fn classify(provider: impl Into<String>, sentinel: Sentinel, cause: Cause) -> Self {
        let category = cause.category();
        let provider = provider.into();
        tracing::debug!(
            provider = %provider,
            sentinel = %sentinel,
            category = ?category,
            cause = %cause,
            "Classified provider failure"
        );
        Self::Provider {
            provider,
            sentinel,
            category,
            cause,
        }
    }

    /// Cancellation of the caller's token.
    pub fn cancelled(provider: impl Into<String>, sentinel: Sentinel) -> Self {
        Self::classify(provider, sentinel, Cause::Cancelled)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(
        message: impl Into<String>,
        field: Option<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field,
            code: code.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error carries the given sentinel or category tag.
    pub fn is(&self, tag: impl Into<ErrorTag>) -> bool {
        let tag = tag.into();
        self.tags().contains(&tag)
    }

    /// Classification tags in chain order: sentinel first, then category.
    #[must_use]
    pub fn tags(&self) -> Vec<ErrorTag> {
        match self {
            Self::Provider {
                sentinel, category, ..
            } => {
                let mut tags = vec![ErrorTag::Sentinel(*sentinel)];
                if let Some(category) = category {
                    tags.push(ErrorTag::Category(*category));
                }
                tags
            }
            Self::Validation { .. } => vec![ErrorTag::Category(Category::BadRequest)],
            _ => Vec::new(),
        }
    }

    /// Provider-agnostic category, if any.
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        self.tags().into_iter().find_map(|tag| match tag {
            ErrorTag::Category(c) => Some(c),
            ErrorTag::Sentinel(_) => None,
        })
    }

    /// Provider sentinel, if this is a provider failure.
    #[must_use]
    pub fn sentinel(&self) -> Option<Sentinel> {
        match self {
            Self::Provider { sentinel, .. } => Some(*sentinel),
            _ => None,
        }
    }

    /// Original cause, if this is a provider failure.
    #[must_use]
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::Provider { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Whether the caller may retry with backoff. Unclassified failures are not retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_some_and(Category::is_retryable)
    }

    /// Whether this error stems from cancellation of the caller's token.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause(), Some(Cause::Cancelled))
    }
}

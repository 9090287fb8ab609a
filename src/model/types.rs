//! Lookup entity structs and the typed response boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A trimmed, non-empty LOT identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LookupQuery(String);

impl LookupQuery {
    /// Trim raw input; whitespace-only input yields `None` and is never submitted.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LookupQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One remote file associated with a LOT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_id: String,
    pub name: String,
    /// Drive "open" page.
    pub open: String,
    /// Direct view URL, the first choice for the detail image.
    pub view: String,
    /// Embeddable preview URL, used for PDFs.
    pub preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    /// Direct image URL; terminal fallback for every image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl FileDescriptor {
    pub fn is_pdf(&self) -> bool {
        self.name.to_lowercase().ends_with(".pdf")
    }

    /// Grid thumbnail source: `thumb`, then `view`, then `image` (first non-empty).
    pub fn thumb_source(&self) -> Option<&str> {
        [self.thumb.as_deref(), Some(self.view.as_str()), self.image.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
    }

    /// Non-empty direct image URL, if any.
    pub fn image_fallback(&self) -> Option<&str> {
        self.image.as_deref().filter(|s| !s.is_empty())
    }
}

/// Wire shape delivered to the JSONP callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<FileDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<FileDescriptor>,
}

/// Errors raised while decoding a callback payload.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("invalid envelope: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Why the remote service reported failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    Remote(String),
    NotFound,
    Unspecified,
}

impl FailureReason {
    pub fn message(&self) -> &str {
        match self {
            FailureReason::Remote(msg) => msg,
            FailureReason::NotFound => "Not found",
            FailureReason::Unspecified => "Lookup failed",
        }
    }
}

/// Validated result of one lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found {
        count: u64,
        items: Vec<FileDescriptor>,
        primary: Option<FileDescriptor>,
    },
    Failed {
        reason: FailureReason,
    },
}

impl ResponseEnvelope {
    /// Decode an untrusted callback argument. `null` is a failed lookup, not a shape error.
    pub fn decode(payload: Value) -> Result<LookupOutcome, EnvelopeError> {
        let kind = match &payload {
            Value::Null => {
                return Ok(LookupOutcome::Failed {
                    reason: FailureReason::Unspecified,
                });
            }
            Value::Object(_) => None,
            Value::Bool(_) => Some("a boolean"),
            Value::Number(_) => Some("a number"),
            Value::String(_) => Some("a string"),
            Value::Array(_) => Some("an array"),
        };
        if let Some(kind) = kind {
            return Err(EnvelopeError::NotAnObject(kind));
        }
        let envelope: ResponseEnvelope = serde_json::from_value(payload)?;
        Ok(envelope.into_outcome())
    }

    /// Only `ok == true` is trusted; everything else drops the payload.
    pub fn into_outcome(self) -> LookupOutcome {
        if self.ok != Some(true) {
            let reason = match self.error.filter(|e| !e.is_empty()) {
                Some(msg) => FailureReason::Remote(msg),
                None if self.not_found == Some(true) => FailureReason::NotFound,
                None => FailureReason::Unspecified,
            };
            return LookupOutcome::Failed { reason };
        }
        let items = self.items.unwrap_or_default();
        LookupOutcome::Found {
            count: self.count.unwrap_or(items.len() as u64),
            items,
            primary: self.primary,
        }
    }
}

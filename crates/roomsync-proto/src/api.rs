//! Request handles and completion outcomes for the asynchronous API.
//!
//! Every request the room issues is identified by a [`RequestHandle`] and
//! completes exactly once with a [`RequestOutcome`].

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Opaque identifier of an outstanding API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(u64);

impl RequestHandle {
    /// Wrap a raw handle value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// How a request finished.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// 2xx with a JSON body.
    Ok(Value),
    /// The request never got an HTTP response.
    TransportError(String),
    /// Non-success HTTP status.
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body, usually `{ "errcode", "error" }`.
        body: Value,
    },
}

impl RequestOutcome {
    /// Split into the success payload or a failure.
    pub fn into_result(self) -> Result<Value, RequestFailure> {
        match self {
            Self::Ok(body) => Ok(body),
            Self::TransportError(message) => Err(RequestFailure::Transport(message)),
            Self::ServerError { status, body } => {
                let message = body
                    .get("error")
                    .or_else(|| body.get("errcode"))
                    .and_then(Value::as_str)
                    .map_or_else(|| body.to_string(), str::to_owned);
                Err(RequestFailure::Server { status, message })
            },
        }
    }
}

/// A request that did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Server rejected the request.
    #[error("server returned {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error message from the body.
        message: String,
    },

    /// Success status but the body is not what the request promises.
    #[error("bad response: {0}")]
    BadResponse(String),
}

/// Body of a successful `send` request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SendEventResponse {
    /// Server-assigned event id.
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Body of a successful media upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    /// `mxc://` reference to the uploaded content.
    pub content_uri: String,
}

impl UploadResponse {
    /// Decode an upload body. A missing or empty `content_uri` is a bad
    /// response.
    pub fn from_value(body: Value) -> Result<Self, RequestFailure> {
        let response = Self::deserialize(body)
            .map_err(|_| RequestFailure::BadResponse("upload response missing content_uri".into()))?;
        if response.content_uri.is_empty() {
            return Err(RequestFailure::BadResponse("upload response has empty content_uri".into()));
        }
        Ok(response)
    }
}

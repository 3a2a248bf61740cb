//! Error types for the request pipeline and the entity serializer.
//!
//! # Design
//! Every failure of a request surfaces as one `OrcError` value. Variants
//! raised after the transport answered carry the wrapped response so the
//! caller can still inspect status, headers and body. Transport errors are
//! kept exactly as the transport produced them.

use std::io;

use crate::response::OrcResponse;

/// Error produced by a `Transport` implementation, passed through unchanged.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of `RequestExecutor::execute` and of the client operations built
/// on top of it.
#[derive(Debug, thiserror::Error)]
pub enum OrcError {
    /// The base URL or path could not be turned into an absolute URL.
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The transport failed before producing a response.
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    /// The server answered with a status outside 200..=299.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        response: Box<OrcResponse>,
    },

    /// The body was read but releasing the response failed.
    #[error("failed to close response: {source}")]
    Close {
        #[source]
        source: io::Error,
        response: Box<OrcResponse>,
    },

    /// Reading the response body failed.
    #[error("failed to read response body: {source}")]
    Body {
        #[source]
        source: io::Error,
        response: Box<OrcResponse>,
    },

    /// The request or response payload could not be (de)serialized.
    #[error(transparent)]
    Serialization(#[from] SerializerError),

    /// A streamed response was used in a way that conflicts with its mode.
    #[error("streamed response misuse: {0}")]
    Stream(&'static str),
}

impl OrcError {
    /// The wrapped response, for failures raised after the transport answered.
    pub fn response(&self) -> Option<&OrcResponse> {
        match self {
            OrcError::Status { response, .. }
            | OrcError::Close { response, .. }
            | OrcError::Body { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn response_mut(&mut self) -> Option<&mut OrcResponse> {
        match self {
            OrcError::Status { response, .. }
            | OrcError::Close { response, .. }
            | OrcError::Body { response, .. } => Some(response),
            _ => None,
        }
    }

    /// HTTP status, when the failure came from a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            OrcError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure while turning JSON into entities or back.
#[derive(Debug, thiserror::Error)]
pub enum SerializerError {
    #[error("invalid JSON payload ({source}) near: {fragment}")]
    Json {
        #[source]
        source: serde_json::Error,
        fragment: String,
    },

    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("payload has no `value` array: {fragment}")]
    MissingCollection { fragment: String },

    #[error("expected a JSON object: {fragment}")]
    NotAnObject { fragment: String },

    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Broken parent/child wiring found while binding an entity graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("entity {entity} already belongs to {existing_owner}.{existing_field}, cannot rebind to {owner}.{field}")]
    ParentAlreadySet {
        entity: u64,
        existing_owner: u64,
        existing_field: String,
        owner: u64,
        field: String,
    },
}

/// Longest payload excerpt quoted in serializer errors.
const MAX_FRAGMENT: usize = 200;

/// Trim `payload` to a short excerpt for error messages.
pub(crate) fn fragment(payload: &str) -> String {
    if payload.chars().count() <= MAX_FRAGMENT {
        return payload.to_string();
    }
    let mut excerpt: String = payload.chars().take(MAX_FRAGMENT).collect();
    excerpt.push_str("...");
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_keeps_short_payloads() {
        assert_eq!(fragment("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn fragment_truncates_on_char_boundary() {
        let payload = "é".repeat(MAX_FRAGMENT + 10);
        let excerpt = fragment(&payload);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), MAX_FRAGMENT + 3);
    }

    #[test]
    fn status_error_boxes_as_transport_error() {
        fn send_sync<T: Send + Sync>() {}
        send_sync::<OrcError>();

        let response = crate::http::Response::from_bytes(503, crate::http::HeaderMultimap::new(), "busy");
        let err = OrcError::Status {
            status: 503,
            message: "Response status: 503\nResponse content: busy".to_string(),
            response: Box::new(OrcResponse::new(response)),
        };

        let boxed: TransportError = err.into();
        let inner = boxed.downcast_ref::<OrcError>().unwrap();
        assert_eq!(inner.status(), Some(503));
        assert!(boxed.to_string().ends_with("busy"));
    }

    #[test]
    fn bind_error_names_both_owners() {
        let err = BindError::ParentAlreadySet {
            entity: 7,
            existing_owner: 1,
            existing_field: "Items".to_string(),
            owner: 2,
            field: "Other".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("1.Items"));
        assert!(text.contains("2.Other"));
    }
}

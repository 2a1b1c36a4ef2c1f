//! Error types for the CRM client.
//!
//! # Design
//! `NotFound` keeps the raw response because the CRM signals "missing" in
//! more than one way (a 204 on lookups, a plain-text message on owner
//! change) and callers may want to inspect which. Listing and search calls
//! never produce an error for a non-200; they hand the response back inside
//! `Listing::Raw` instead.

use crate::http::HttpResponse;

/// Errors returned by the resource clients and transports.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The remote reported that the resource (or a referenced owner) does
    /// not exist.
    #[error("{}", not_found_message(.message))]
    NotFound {
        response: HttpResponse,
        message: Option<String>,
    },

    /// The server returned a status the operation has no meaning for.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The transport could not complete the round-trip.
    #[error("transport failed: {0}")]
    Transport(String),

    /// An instance operation was called on a resource without an id.
    #[error("{0} has no id")]
    MissingId(&'static str),

    /// Missing or invalid transport configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub(crate) fn not_found(response: HttpResponse) -> Self {
        ApiError::NotFound {
            response,
            message: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

fn not_found_message(message: &Option<String>) -> String {
    match message {
        Some(msg) => format!("not found: {msg}"),
        None => "resource not found".to_string(),
    }
}

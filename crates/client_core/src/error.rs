//! Failure taxonomy for remote calls.

use thiserror::Error;

/// Closed set of categorized failure reasons surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoConnectivity,
    Timeout,
    Unauthorized,
    NotFound,
    Conflict,
    PayloadTooLarge,
    ServerFault,
    Unknown,
}

impl ErrorKind {
    /// Fixed table applied to every non-2xx response, for every endpoint.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::ServerFault,
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            413 => Self::PayloadTooLarge,
            500..=599 => Self::ServerFault,
            _ => Self::Unknown,
        }
    }
}

/// A categorized remote failure, optionally carrying the raw server
/// response text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {}", .detail.as_deref().unwrap_or("no server detail"))]
pub struct FetchError {
    pub kind: ErrorKind,
    pub detail: Option<String>,
}

impl FetchError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    pub fn bare(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }
}

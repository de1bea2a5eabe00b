//! Error types for the pipebus core.
//!
//! Errors propagate upward unmodified. The only component that intercepts an
//! error is the resource-scoped filter, and only to release its transport
//! resource before re-raising.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for pipebus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Missing or malformed configuration. Fatal, never retried.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The transport resource (channel/session) could not be acquired.
    #[error("{0}")]
    ResourceAcquisition(#[from] ResourceAcquisitionError),

    /// The transport failed to transmit a message.
    #[error("{0}")]
    Send(#[from] SendError),

    /// A destination address could not be resolved to a send endpoint.
    #[error("Endpoint resolution failed for '{address}': {reason}")]
    EndpointResolution {
        /// The address being resolved.
        address: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The request was sent but its timeout could not be scheduled.
    ///
    /// The request is still in flight; no automatic expiration will occur.
    #[error("Request {request_id} was sent but its timeout could not be scheduled: {source}")]
    TimeoutNotScheduled {
        /// The request identifier that was already sent.
        request_id: Uuid,
        /// The scheduling failure.
        #[source]
        source: Box<BusError>,
    },

    /// A filter failed with a business-logic error.
    #[error("Filter error: {0}")]
    Filter(anyhow::Error),

    /// The operation was cancelled.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BusError {
    /// Wraps a business-logic error raised by a filter.
    pub fn filter(err: impl Into<anyhow::Error>) -> Self {
        Self::Filter(err.into())
    }

    /// Creates an endpoint resolution error.
    pub fn endpoint_resolution(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EndpointResolution {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors that must never be retried.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if the error came from cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Converts to a dictionary representation for structured logs.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        let kind = match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::ResourceAcquisition(_) => "ResourceAcquisitionError",
            Self::Send(_) => "SendError",
            Self::EndpointResolution { .. } => "EndpointResolutionError",
            Self::TimeoutNotScheduled { .. } => "TimeoutNotScheduled",
            Self::Filter(_) => "FilterError",
            Self::Cancelled(_) => "Cancelled",
            Self::Serialization(_) => "SerializationError",
            Self::Internal(_) => "InternalError",
        };
        map.insert("type".to_string(), serde_json::json!(kind));
        if let Self::TimeoutNotScheduled { request_id, .. } = self {
            map.insert("request_id".to_string(), serde_json::json!(request_id));
        }
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Cloning a `Filter` error keeps its rendered cause chain, not the source
/// error value.
impl Clone for BusError {
    fn clone(&self) -> Self {
        match self {
            Self::Configuration(e) => Self::Configuration(e.clone()),
            Self::ResourceAcquisition(e) => Self::ResourceAcquisition(e.clone()),
            Self::Send(e) => Self::Send(e.clone()),
            Self::EndpointResolution { address, reason } => Self::EndpointResolution {
                address: address.clone(),
                reason: reason.clone(),
            },
            Self::TimeoutNotScheduled { request_id, source } => Self::TimeoutNotScheduled {
                request_id: *request_id,
                source: source.clone(),
            },
            Self::Filter(e) => Self::Filter(anyhow::anyhow!("{e:#}")),
            Self::Cancelled(reason) => Self::Cancelled(reason.clone()),
            Self::Serialization(message) => Self::Serialization(message.clone()),
            Self::Internal(message) => Self::Internal(message.clone()),
        }
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Diagnostic details attached to a configuration error.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ConfigurationIssue {
    /// The configuration key or component at fault.
    pub key: String,
    /// What is wrong with it.
    pub message: String,
}

/// Raised when configuration is missing, malformed, or cannot be honored.
#[derive(Debug, Clone, Error)]
#[error("Configuration error: {message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// Individual issues, when validation collected more than one.
    pub issues: Vec<ConfigurationIssue>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    /// Adds a single issue.
    #[must_use]
    pub fn with_issue(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.issues.push(ConfigurationIssue {
            key: key.into(),
            message: message.into(),
        });
        self
    }

    /// Builds an error from collected issues, or `None` if there are none.
    #[must_use]
    pub fn from_issues(context: &str, issues: Vec<ConfigurationIssue>) -> Option<Self> {
        if issues.is_empty() {
            return None;
        }
        let summary = issues
            .iter()
            .map(|i| format!("{}: {}", i.key, i.message))
            .collect::<Vec<_>>()
            .join("; ");
        Some(Self {
            message: format!("{context}: {summary}"),
            issues,
        })
    }
}

/// Raised when a connection cannot produce a transport resource.
#[derive(Debug, Clone, Error)]
#[error("Failed to acquire {resource} on connection '{connection}': {message}")]
pub struct ResourceAcquisitionError {
    /// Kind of resource (e.g. "channel", "session").
    pub resource: String,
    /// The connection that failed.
    pub connection: String,
    /// Underlying failure.
    pub message: String,
}

impl ResourceAcquisitionError {
    /// Creates a new resource acquisition error.
    #[must_use]
    pub fn new(
        resource: impl Into<String>,
        connection: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            connection: connection.into(),
            message: message.into(),
        }
    }
}

/// Raised by a transport when a message could not be transmitted.
#[derive(Debug, Clone, Error)]
#[error("Send to '{address}' failed: {message}")]
pub struct SendError {
    /// The destination address.
    pub address: String,
    /// The message id, when known.
    pub message_id: Option<Uuid>,
    /// Underlying failure.
    pub message: String,
}

impl SendError {
    /// Creates a new send error.
    #[must_use]
    pub fn new(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            message_id: None,
            message: message.into(),
        }
    }

    /// Sets the message id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: Uuid) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_keeps_variant_and_message() {
        let err = BusError::filter(anyhow::anyhow!("card declined").context("charging order 7"));
        let cloned = err.clone();
        assert!(matches!(cloned, BusError::Filter(_)));
        assert_eq!(cloned.to_string(), "Filter error: charging order 7: card declined");

        let nested = BusError::TimeoutNotScheduled {
            request_id: Uuid::nil(),
            source: Box::new(BusError::Cancelled("stop".to_string())),
        };
        assert_eq!(nested.clone().to_string(), nested.to_string());
    }

    #[test]
    fn test_configuration_error_from_issues() {
        let err = ConfigurationError::from_issues(
            "RequestSettings",
            vec![
                ConfigurationIssue {
                    key: "service_address".to_string(),
                    message: "must not be empty".to_string(),
                },
                ConfigurationIssue {
                    key: "timeout_seconds".to_string(),
                    message: "must be finite".to_string(),
                },
            ],
        )
        .unwrap();

        assert_eq!(err.issues.len(), 2);
        assert!(err.message.starts_with("RequestSettings: service_address"));
    }

    #[test]
    fn test_configuration_error_no_issues() {
        assert!(ConfigurationError::from_issues("x", Vec::new()).is_none());
    }

    #[test]
    fn test_bus_error_fatal() {
        let err: BusError = ConfigurationError::new("no scheduler").into();
        assert!(err.is_fatal());
        assert!(!BusError::Cancelled("x".to_string()).is_fatal());
    }

    #[test]
    fn test_send_error_display() {
        let err = SendError::new("loopback://host/orders", "broker unavailable");
        assert_eq!(
            err.to_string(),
            "Send to 'loopback://host/orders' failed: broker unavailable"
        );
    }

    #[test]
    fn test_timeout_not_scheduled_to_dict() {
        let request_id = Uuid::new_v4();
        let err = BusError::TimeoutNotScheduled {
            request_id,
            source: Box::new(SendError::new("loopback://host/quartz", "down").into()),
        };

        let dict = err.to_dict();
        assert_eq!(dict.get("type").unwrap(), "TimeoutNotScheduled");
        assert_eq!(dict.get("request_id").unwrap(), &serde_json::json!(request_id));
    }

    #[test]
    fn test_filter_error_wraps_anyhow() {
        let err = BusError::filter(anyhow::anyhow!("order rejected"));
        assert_eq!(err.to_string(), "Filter error: order rejected");
    }
}

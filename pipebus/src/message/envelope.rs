//! Message envelopes.

use crate::context::Address;
use crate::errors::BusError;
use crate::utils::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A message type that can travel on the bus.
pub trait Message: Serialize + Send + Sync {
    /// The logical message type name, used for routing and publishing.
    const MESSAGE_TYPE: &'static str;
}

/// A message together with its addressing and correlation headers.
///
/// The body is kept as a JSON value; encoding it for the wire is the
/// transport's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique id of this message.
    pub message_id: Uuid,
    /// Logical message type.
    pub message_type: String,
    /// Request id, set when the message is a request or a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    /// Correlation id of the owning conversation or saga.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// Where the message was sent from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<Address>,
    /// Where the message is going.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<Address>,
    /// Where responses should be sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_address: Option<Address>,
    /// When the message was handed to the transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_time: Option<Timestamp>,
    /// Free-form headers.
    #[serde(default)]
    pub headers: HashMap<String, serde_json::Value>,
    /// The message body.
    pub body: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope with a fresh message id.
    #[must_use]
    pub fn new(message_type: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            message_type: message_type.into(),
            request_id: None,
            correlation_id: None,
            source_address: None,
            destination_address: None,
            response_address: None,
            sent_time: None,
            headers: HashMap::new(),
            body,
        }
    }

    /// Wraps a typed message.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Serialization` if the message cannot be converted.
    pub fn from_message<M: Message>(message: &M) -> Result<Self, BusError> {
        Ok(Self::new(M::MESSAGE_TYPE, serde_json::to_value(message)?))
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Sets the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Sets the source address.
    #[must_use]
    pub fn with_source_address(mut self, address: Address) -> Self {
        self.source_address = Some(address);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.headers.insert(key.into(), value);
        self
    }

    /// Returns true if the envelope carries the given message type.
    #[must_use]
    pub fn is<M: Message>(&self) -> bool {
        self.message_type == M::MESSAGE_TYPE
    }

    /// Deserializes the body as `M`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Serialization` if the type does not match or the
    /// body cannot be decoded.
    pub fn decode<M: Message + DeserializeOwned>(&self) -> Result<M, BusError> {
        if !self.is::<M>() {
            return Err(BusError::Serialization(format!(
                "Expected message type '{}', found '{}'",
                M::MESSAGE_TYPE,
                self.message_type
            )));
        }
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

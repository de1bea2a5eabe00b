//! Bus and request configuration.

use crate::context::Address;
use crate::errors::{ConfigurationError, ConfigurationIssue};
use crate::utils::{expiration_after, now_utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for assembling a [`MessageBus`](crate::bus::MessageBus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSettings {
    /// The bus input address; replies and request timeouts come back here.
    pub input_address: Address,
    /// Base address for publish topics. Defaults to the root of the input
    /// address.
    #[serde(default)]
    pub publish_host: Option<Address>,
    /// Address of a remote scheduling service to use as the ambient scheduler.
    #[serde(default)]
    pub scheduler_address: Option<Address>,
    /// Whether to run an in-process scheduler as the ambient scheduler.
    #[serde(default)]
    pub in_process_scheduler: bool,
}

impl BusSettings {
    /// Creates settings for the given input address.
    #[must_use]
    pub const fn new(input_address: Address) -> Self {
        Self {
            input_address,
            publish_host: None,
            scheduler_address: None,
            in_process_scheduler: false,
        }
    }

    /// Parses settings from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the JSON is malformed or the settings
    /// do not validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::new(format!("Invalid bus settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Sets the publish host.
    #[must_use]
    pub fn with_publish_host(mut self, host: Address) -> Self {
        self.publish_host = Some(host);
        self
    }

    /// Uses a remote scheduling service as the ambient scheduler.
    #[must_use]
    pub fn with_scheduler_address(mut self, address: Address) -> Self {
        self.scheduler_address = Some(address);
        self
    }

    /// Enables the in-process scheduler.
    #[must_use]
    pub fn with_in_process_scheduler(mut self, enabled: bool) -> Self {
        self.in_process_scheduler = enabled;
        self
    }

    /// The effective publish host.
    #[must_use]
    pub fn publish_host(&self) -> Address {
        self.publish_host
            .clone()
            .unwrap_or_else(|| self.input_address.root())
    }

    /// Checks the settings for conflicts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` listing every issue found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut issues = Vec::new();
        if self.in_process_scheduler && self.scheduler_address.is_some() {
            issues.push(ConfigurationIssue {
                key: "scheduler_address".to_string(),
                message: "cannot be combined with in_process_scheduler".to_string(),
            });
        }
        if self.scheduler_address.as_ref() == Some(&self.input_address) {
            issues.push(ConfigurationIssue {
                key: "scheduler_address".to_string(),
                message: "must differ from input_address".to_string(),
            });
        }
        ConfigurationError::from_issues("BusSettings", issues).map_or(Ok(()), Err)
    }
}

/// Settings for one kind of request sent by a saga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSettings {
    /// Where requests are sent.
    pub service_address: Address,
    /// Request timeout in seconds; zero disables the timeout.
    #[serde(default)]
    pub timeout_seconds: f64,
    /// Remote scheduling service for the timeout message. When unset the
    /// ambient scheduler of the consume context is used.
    #[serde(default)]
    pub scheduling_service_address: Option<Address>,
}

impl RequestSettings {
    /// Creates settings with no timeout.
    #[must_use]
    pub fn new(service_address: Address) -> Self {
        Self {
            service_address,
            timeout_seconds: 0.0,
            scheduling_service_address: None,
        }
    }

    /// Parses settings from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the JSON is malformed or the settings
    /// do not validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::new(format!("Invalid request settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the scheduling service address.
    #[must_use]
    pub fn with_scheduling_service(mut self, address: Address) -> Self {
        self.scheduling_service_address = Some(address);
        self
    }

    /// The timeout, or `None` when requests do not time out.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the timeout is negative, not finite,
    /// or too large to compute an expiration time from now.
    pub fn timeout(&self) -> Result<Option<Duration>, ConfigurationError> {
        self.checked_timeout().map_err(|issue| {
            ConfigurationError::new(format!("RequestSettings: {}: {}", issue.key, issue.message))
                .with_issue(issue.key, issue.message)
        })
    }

    fn checked_timeout(&self) -> Result<Option<Duration>, ConfigurationIssue> {
        let seconds = self.timeout_seconds;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ConfigurationIssue {
                key: "timeout_seconds".to_string(),
                message: "must be a finite, non-negative number".to_string(),
            });
        }
        if seconds <= 0.0 {
            return Ok(None);
        }
        Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|timeout| expiration_after(now_utc(), *timeout).is_ok())
            .map(Some)
            .ok_or_else(|| ConfigurationIssue {
                key: "timeout_seconds".to_string(),
                message: "is too large".to_string(),
            })
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` listing every issue found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let issues: Vec<_> = self.checked_timeout().err().into_iter().collect();
        ConfigurationError::from_issues("RequestSettings", issues).map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bus_settings_from_json() {
        let settings = BusSettings::from_json_str(
            r#"{"input_address": "loopback://local/saga", "in_process_scheduler": true}"#,
        )
        .unwrap();

        assert_eq!(settings.input_address.as_str(), "loopback://local/saga");
        assert!(settings.in_process_scheduler);
        assert_eq!(settings.scheduler_address, None);
        assert_eq!(settings.publish_host().as_str(), "loopback://local");
    }

    #[test]
    fn test_bus_settings_conflicting_schedulers() {
        let input = Address::parse("loopback://local/saga").unwrap();
        let err = BusSettings::new(input.clone())
            .with_in_process_scheduler(true)
            .with_scheduler_address(input)
            .validate()
            .unwrap_err();

        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn test_bus_settings_rejects_bad_address() {
        let err = BusSettings::from_json_str(r#"{"input_address": "saga"}"#).unwrap_err();
        assert!(err.message.starts_with("Invalid bus settings"));
    }

    #[test]
    fn test_request_settings_defaults() {
        let settings =
            RequestSettings::from_json_str(r#"{"service_address": "loopback://local/billing"}"#).unwrap();
        assert_eq!(settings.timeout().unwrap(), None);
        assert_eq!(settings.scheduling_service_address, None);
    }

    #[test]
    fn test_request_settings_timeout() {
        let settings = RequestSettings::new(Address::parse("loopback://local/billing").unwrap())
            .with_timeout(30.0);
        assert_eq!(settings.timeout().unwrap(), Some(Duration::from_secs(30)));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_request_settings_invalid_timeout() {
        let base = RequestSettings::new(Address::parse("loopback://local/billing").unwrap());
        assert!(base.clone().with_timeout(-1.0).validate().is_err());
        assert!(base.clone().with_timeout(f64::NAN).validate().is_err());
        assert!(base.clone().with_timeout(1e300).validate().is_err());
        assert!(base.clone().with_timeout(1e13).validate().is_err());
        assert!(base.with_timeout(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_invalid_timeout_is_an_error_not_disabled() {
        let base = RequestSettings::new(Address::parse("loopback://local/billing").unwrap());
        for seconds in [f64::INFINITY, f64::NAN, -5.0, 1e13] {
            let err = base.clone().with_timeout(seconds).timeout().unwrap_err();
            assert_eq!(err.issues[0].key, "timeout_seconds");
        }
        assert_eq!(base.with_timeout(0.0).timeout().unwrap(), None);
    }
}

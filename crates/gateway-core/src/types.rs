//! Validated domain newtypes.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};

/// Sampling temperature in `0.0..=2.0`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Temperature(f32);

impl Temperature {
    /// Upper bound accepted by every supported provider
    pub const MAX: f32 = 2.0;

    /// Create a validated temperature
    ///
    /// # Errors
    /// Returns error if the value is outside `0.0..=2.0` or not finite
    pub fn new(value: f32) -> Result<Self, GatewayError> {
        if value.is_finite() && (0.0..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(GatewayError::validation(
                format!("temperature must be between 0.0 and {}, got {value}", Self::MAX),
                Some("temperature".to_string()),
                "invalid_temperature",
            ))
        }
    }

    /// Raw value
    #[must_use]
    pub fn value(self) -> f32 {
        self.0
    }
}

impl TryFrom<f32> for Temperature {
    type Error = GatewayError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Temperature> for f32 {
    fn from(value: Temperature) -> Self {
        value.0
    }
}

/// Nucleus sampling mass in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct TopP(f32);

impl TopP {
    /// Create a validated top_p
    ///
    /// # Errors
    /// Returns error if the value is outside `0.0..=1.0` or not finite
    pub fn new(value: f32) -> Result<Self, GatewayError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(GatewayError::validation(
                format!("top_p must be between 0.0 and 1.0, got {value}"),
                Some("top_p".to_string()),
                "invalid_top_p",
            ))
        }
    }

    /// Raw value
    #[must_use]
    pub fn value(self) -> f32 {
        self.0
    }
}

impl TryFrom<f32> for TopP {
    type Error = GatewayError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TopP> for f32 {
    fn from(value: TopP) -> Self {
        value.0
    }
}

/// Output token limit, at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct MaxTokens(u32);

impl MaxTokens {
    /// Create a validated token limit
    ///
    /// # Errors
    /// Returns error if the value is zero
    pub fn new(value: u32) -> Result<Self, GatewayError> {
        if value == 0 {
            return Err(GatewayError::validation(
                "max_tokens must be at least 1",
                Some("max_tokens".to_string()),
                "invalid_max_tokens",
            ));
        }
        Ok(Self(value))
    }

    /// Raw value
    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for MaxTokens {
    type Error = GatewayError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MaxTokens> for u32 {
    fn from(value: MaxTokens) -> Self {
        value.0
    }
}

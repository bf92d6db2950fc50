//! Per-field protection contracts.

use crate::error::{SecureError, SecureResult};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a field's value is obfuscated before it reaches storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Stored under its semantic name, value untouched.
    None,
    /// Name pseudonymized, value untouched.
    TokenOnly,
    /// Equality-preserving authenticated encryption.
    Deterministic,
    /// Keyed one-way digest. Write-only.
    Blind,
    /// Coarse range descriptor. Write-only.
    Bucketed,
    /// Secret-shifted timestamp.
    TemporalOffset,
    /// Randomized authenticated encryption.
    Encrypted,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::TokenOnly => "TOKEN_ONLY",
            Self::Deterministic => "DETERMINISTIC",
            Self::Blind => "BLIND",
            Self::Bucketed => "BUCKETED",
            Self::TemporalOffset => "TEMPORAL_OFFSET",
            Self::Encrypted => "ENCRYPTED",
        }
    }

    /// Whether stored values can be turned back into the original.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, Self::Blind | Self::Bucketed)
    }

    /// Whether the field is stored under a registry token.
    pub fn is_pseudonymous(self) -> bool {
        self != Self::None
    }

    /// Whether the strategy can serve `capability`.
    pub fn supports(self, capability: SearchCapability) -> bool {
        match capability {
            SearchCapability::Equality => matches!(
                self,
                Self::None | Self::TokenOnly | Self::Deterministic | Self::Blind
            ),
            SearchCapability::Range => matches!(
                self,
                Self::None | Self::TokenOnly | Self::Bucketed | Self::TemporalOffset
            ),
            SearchCapability::Ordering => {
                matches!(self, Self::None | Self::TokenOnly | Self::TemporalOffset)
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query patterns a field declares it must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCapability {
    Equality,
    Range,
    Ordering,
}

/// Granularity applied to timestamps before they are offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalPrecision {
    Second,
    Minute,
    Hour,
    Day,
}

impl TemporalPrecision {
    pub fn as_delta(self) -> TimeDelta {
        match self {
            Self::Second => TimeDelta::seconds(1),
            Self::Minute => TimeDelta::minutes(1),
            Self::Hour => TimeDelta::hours(1),
            Self::Day => TimeDelta::days(1),
        }
    }
}

impl FromStr for TemporalPrecision {
    type Err = SecureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "second" | "seconds" => Ok(Self::Second),
            "minute" | "minutes" => Ok(Self::Minute),
            "hour" | "hours" => Ok(Self::Hour),
            "day" | "days" => Ok(Self::Day),
            other => Err(SecureError::config(format!(
                "unknown temporal precision '{other}' (expected second, minute, hour or day)"
            ))),
        }
    }
}

/// Protection contract for one field.
///
/// Immutable once built. The constructors validate their inputs, and
/// [`FieldSecurityConfig::validate`] re-checks configs that arrive through
/// deserialization (registry imports).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSecurityConfig {
    strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    buckets: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temporal_precision: Option<TemporalPrecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    capabilities: Vec<SearchCapability>,
}

impl FieldSecurityConfig {
    fn simple(strategy: Strategy) -> Self {
        Self {
            strategy,
            buckets: None,
            temporal_precision: None,
            capabilities: Vec::new(),
        }
    }

    /// Stored as plaintext under its semantic name.
    pub fn plaintext() -> Self {
        Self::simple(Strategy::None)
    }

    /// Name pseudonymized, value stored as-is.
    pub fn token_only() -> Self {
        Self::simple(Strategy::TokenOnly)
    }

    pub fn deterministic() -> Self {
        Self::simple(Strategy::Deterministic)
    }

    pub fn blind() -> Self {
        Self::simple(Strategy::Blind)
    }

    pub fn encrypted() -> Self {
        Self::simple(Strategy::Encrypted)
    }

    /// Bucketed range index over ascending `boundaries`.
    pub fn bucketed(boundaries: Vec<f64>) -> SecureResult<Self> {
        validate_boundaries(&boundaries)?;
        Ok(Self {
            buckets: Some(boundaries),
            ..Self::simple(Strategy::Bucketed)
        })
    }

    /// Secret-shifted timestamp at full precision.
    pub fn temporal_offset() -> Self {
        Self::simple(Strategy::TemporalOffset)
    }

    /// Secret-shifted timestamp truncated to `precision` ("day", "hour", ...).
    pub fn temporal_offset_with_precision(precision: &str) -> SecureResult<Self> {
        Ok(Self {
            temporal_precision: Some(precision.parse()?),
            ..Self::simple(Strategy::TemporalOffset)
        })
    }

    /// Declares a search capability, rejecting ones the strategy cannot serve.
    pub fn with_capability(mut self, capability: SearchCapability) -> SecureResult<Self> {
        if !self.strategy.supports(capability) {
            return Err(SecureError::config(format!(
                "{} fields cannot support {:?} search",
                self.strategy, capability
            )));
        }
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        Ok(self)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn buckets(&self) -> Option<&[f64]> {
        self.buckets.as_deref()
    }

    pub fn temporal_precision(&self) -> Option<TemporalPrecision> {
        self.temporal_precision
    }

    pub fn capabilities(&self) -> &[SearchCapability] {
        &self.capabilities
    }

    pub fn supports(&self, capability: SearchCapability) -> bool {
        self.strategy.supports(capability)
    }

    /// Re-checks every construction-time invariant.
    pub fn validate(&self) -> SecureResult<()> {
        match (self.strategy, &self.buckets) {
            (Strategy::Bucketed, Some(boundaries)) => validate_boundaries(boundaries)?,
            (Strategy::Bucketed, None) => {
                return Err(SecureError::config("BUCKETED field has no boundaries"));
            }
            (other, Some(_)) => {
                return Err(SecureError::config(format!(
                    "{other} field must not declare bucket boundaries"
                )));
            }
            _ => {}
        }
        if self.temporal_precision.is_some() && self.strategy != Strategy::TemporalOffset {
            return Err(SecureError::config(format!(
                "{} field must not declare a temporal precision",
                self.strategy
            )));
        }
        if let Some(capability) = self
            .capabilities
            .iter()
            .find(|c| !self.strategy.supports(**c))
        {
            return Err(SecureError::config(format!(
                "{} fields cannot support {:?} search",
                self.strategy, capability
            )));
        }
        Ok(())
    }
}

fn validate_boundaries(boundaries: &[f64]) -> SecureResult<()> {
    if boundaries.is_empty() {
        return Err(SecureError::config("bucket boundary list is empty"));
    }
    if boundaries.iter().any(|b| !b.is_finite()) {
        return Err(SecureError::config("bucket boundaries must be finite"));
    }
    if boundaries.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SecureError::config(
            "bucket boundaries must be strictly ascending",
        ));
    }
    Ok(())
}

//! Pool configuration.
//!
//! Loaded from JSON; every field is optional and falls back to the values
//! below.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed-point scale representing a nominal 100% per annum.
pub const ANNUAL_RATE_SCALE: u128 = 1_000_000_000;
pub const DAYS_PER_YEAR: u64 = 365;
pub const SECONDS_PER_DAY: u64 = 86_400;
pub const DEFAULT_BREAKPOINT_DAYS: [u64; 3] = [0, 10, 30];
pub const PRESENTATION_DIVISOR: u128 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// How an elapsed age in seconds becomes a whole number of accrual days.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DayRounding {
    /// `floor(age / day) + 1`: the day in progress always counts, so an age
    /// of exactly one day credits two.
    #[default]
    FloorPlusOne,
    /// `max(1, ceil(age / day))`
    CeilMinOne,
    /// `max(1, floor(age / day))`
    FloorMinOne,
}

impl DayRounding {
    pub fn days(self, elapsed_secs: u64, seconds_per_day: u64) -> u64 {
        let days = match self {
            DayRounding::FloorPlusOne => (elapsed_secs / seconds_per_day).saturating_add(1),
            DayRounding::CeilMinOne => elapsed_secs.div_ceil(seconds_per_day),
            DayRounding::FloorMinOne => elapsed_secs / seconds_per_day,
        };
        days.max(1)
    }
}

/// Which principal a participant accrues against.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccrualBasis {
    /// Every stake ages from its own timestamp; withdrawals drain the newest
    /// open stakes first.
    #[default]
    PerTransaction,
    /// The current balance ages from the most recent balance change.
    CurrentBalance,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    pub annual_rate_scale: u128,
    pub days_per_year: u64,
    pub seconds_per_day: u64,
    pub breakpoint_days: Vec<u64>,
    pub presentation_divisor: u128,
    pub rounding: DayRounding,
    pub basis: AccrualBasis,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            annual_rate_scale: ANNUAL_RATE_SCALE,
            days_per_year: DAYS_PER_YEAR,
            seconds_per_day: SECONDS_PER_DAY,
            breakpoint_days: DEFAULT_BREAKPOINT_DAYS.to_vec(),
            presentation_divisor: PRESENTATION_DIVISOR,
            rounding: DayRounding::default(),
            basis: AccrualBasis::default(),
        }
    }
}

impl PoolConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&bytes)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: PoolConfig = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days_per_year == 0 {
            return Err(ConfigError::Invalid("days_per_year must be > 0"));
        }
        if self.seconds_per_day == 0 {
            return Err(ConfigError::Invalid("seconds_per_day must be > 0"));
        }
        if self.presentation_divisor == 0 {
            return Err(ConfigError::Invalid("presentation_divisor must be > 0"));
        }
        if self.breakpoint_days.is_empty() {
            return Err(ConfigError::Invalid("breakpoint_days must not be empty"));
        }
        if self.breakpoint_days.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConfigError::Invalid("breakpoint_days must be strictly ascending"));
        }
        Ok(())
    }

    /// Per-unit accrual credited for one day.
    pub fn daily_rate(&self) -> u128 {
        self.annual_rate_scale / u128::from(self.days_per_year)
    }
}

//! Relative Timestamps
//!
//! Wall time elapsed since the runtime started, printed as `r<secs>.<ms>`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use sim_agents::RelativeTime;
//!
//! let at = RelativeTime::from(Duration::from_millis(12_345));
//! assert_eq!(at.to_string(), "r12.345");
//! assert_eq!("r12.345".parse::<RelativeTime>().unwrap(), at);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::Value;

/// Millisecond-resolution offset from the simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RelativeTime {
    millis: u64,
}

impl RelativeTime {
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.millis as f64 / 1000.0
    }

    /// Reads a timestamp carried in a message: either the string form or a
    /// float number of seconds.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => s.parse().ok(),
            other => other
                .as_float()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| Self::from_millis((secs * 1000.0).round() as u64)),
        }
    }
}

impl From<Duration> for RelativeTime {
    fn from(elapsed: Duration) -> Self {
        Self {
            millis: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<RelativeTime> for Value {
    fn from(time: RelativeTime) -> Self {
        Value::Str(time.to_string())
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}.{:03}", self.millis / 1000, self.millis % 1000)
    }
}

/// Error type for parsing [`RelativeTime`] from strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseTimeError {
    InvalidFormat(String),
    InvalidSeconds(String),
    InvalidMillis(String),
}

impl fmt::Display for ParseTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseTimeError::InvalidFormat(s) => {
                write!(f, "invalid timestamp: '{}', expected 'rSECS.MMM'", s)
            }
            ParseTimeError::InvalidSeconds(s) => write!(f, "invalid seconds: '{}'", s),
            ParseTimeError::InvalidMillis(s) => write!(f, "invalid milliseconds: '{}'", s),
        }
    }
}

impl std::error::Error for ParseTimeError {}

impl FromStr for RelativeTime {
    type Err = ParseTimeError;

    /// Parses strings like "r12.345".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('r')
            .ok_or_else(|| ParseTimeError::InvalidFormat(s.to_string()))?;
        let (secs, millis) = rest
            .split_once('.')
            .ok_or_else(|| ParseTimeError::InvalidFormat(s.to_string()))?;
        let secs = secs
            .parse::<u64>()
            .map_err(|_| ParseTimeError::InvalidSeconds(secs.to_string()))?;
        if millis.len() != 3 {
            return Err(ParseTimeError::InvalidMillis(millis.to_string()));
        }
        let millis = millis
            .parse::<u64>()
            .map_err(|_| ParseTimeError::InvalidMillis(millis.to_string()))?;
        Ok(Self::from_millis(secs * 1000 + millis))
    }
}

impl Serialize for RelativeTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RelativeTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How each interval is weighted when folding into the running average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AveragingMode {
    /// TWAP: weight is the elapsed time between consecutive samples.
    #[default]
    Time,
    /// VWAP: weight is the absolute change of the first pool reserve.
    Volume,
}

impl fmt::Display for AveragingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AveragingMode::Time => "time",
            AveragingMode::Volume => "volume",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid averaging mode: {0}")]
pub struct ParseModeError(String);

impl FromStr for AveragingMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" | "twap" => Ok(AveragingMode::Time),
            "volume" | "vwap" => Ok(AveragingMode::Volume),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("TWAP".parse::<AveragingMode>(), Ok(AveragingMode::Time));
        assert_eq!("volume".parse::<AveragingMode>(), Ok(AveragingMode::Volume));
        assert_eq!(
            "median".parse::<AveragingMode>().unwrap_err().to_string(),
            "invalid averaging mode: median"
        );
    }

    #[test]
    fn defaults_to_time_weighting() {
        assert_eq!(AveragingMode::default(), AveragingMode::Time);
        assert_eq!(AveragingMode::Volume.to_string(), "volume");
    }
}

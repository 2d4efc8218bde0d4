//! Device platform families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform family of the target device.
///
/// Operation units declare the families they support; the scheduler skips
/// units whose declaration does not include the job's family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// ASR 9000 series.
    #[serde(rename = "ASR9K")]
    Asr9k,
    /// NCS 1000 series.
    #[serde(rename = "NCS1K")]
    Ncs1k,
    /// NCS 5000 series.
    #[serde(rename = "NCS5K")]
    Ncs5k,
    /// NCS 5500 series.
    #[serde(rename = "NCS5500")]
    Ncs5500,
    /// NCS 6000 series.
    #[serde(rename = "NCS6K")]
    Ncs6k,
    /// CRS series.
    #[serde(rename = "CRS")]
    Crs,
}

impl Platform {
    /// All known platform families.
    pub const ALL: [Platform; 6] = [
        Platform::Asr9k,
        Platform::Ncs1k,
        Platform::Ncs5k,
        Platform::Ncs5500,
        Platform::Ncs6k,
        Platform::Crs,
    ];

    /// Returns the family name as used in job descriptions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Asr9k => "ASR9K",
            Platform::Ncs1k => "NCS1K",
            Platform::Ncs5k => "NCS5K",
            Platform::Ncs5500 => "NCS5500",
            Platform::Ncs6k => "NCS6K",
            Platform::Crs => "CRS",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a platform family name.
#[derive(Debug, Error)]
#[error("unknown platform family '{0}'")]
pub struct PlatformParseError(pub String);

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| PlatformParseError(s.to_string()))
    }
}

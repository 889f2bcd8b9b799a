use std::{fmt, str::FromStr};

use crate::foundation::error::PackError;

/// Target asset profile of a pack transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetProfile {
    /// PNG images and lossy audio, for archiving and transfer.
    Compressed,
    /// 24-bit BMP images and PCM WAV audio.
    Uncompressed,
    /// 4-bit RLE BMP images and MP3 audio as expected by device firmware.
    Firmware,
}

impl TargetProfile {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compressed => "compressed",
            Self::Uncompressed => "uncompressed",
            Self::Firmware => "firmware",
        }
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetProfile {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compressed" => Ok(Self::Compressed),
            "uncompressed" => Ok(Self::Uncompressed),
            "firmware" => Ok(Self::Firmware),
            other => Err(PackError::validation(format!(
                "unknown target profile '{other}' (expected compressed, uncompressed or firmware)"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transcode/profile.rs"]
mod tests;

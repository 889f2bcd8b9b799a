use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::foundation::error::{PackError, PackResult};

/// Which of a node's two asset slots an asset lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Node picture.
    Image,
    /// Node sound.
    Audio,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Image => "image",
            Self::Audio => "audio",
        })
    }
}

/// Closed set of image format tags carried by pack nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageFormat {
    /// Windows bitmap, either 24-bit or 4-bit RLE.
    Bmp,
    /// PNG.
    Png,
    /// JPEG.
    Jpeg,
}

impl ImageFormat {
    /// Canonical MIME spelling.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Bmp => "image/bmp",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Parse a MIME tag.
    pub fn from_mime(tag: &str) -> PackResult<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "image/bmp" | "image/x-ms-bmp" => Ok(Self::Bmp),
            "image/png" => Ok(Self::Png),
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            _ => Err(PackError::unsupported_format(tag)),
        }
    }
}

/// Closed set of audio format tags carried by pack nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AudioFormat {
    /// RIFF/WAVE PCM.
    Wav,
    /// Ogg Vorbis.
    Ogg,
    /// MPEG audio (layer III). Both `audio/mpeg` and `audio/mp3` parse to this variant.
    Mp3,
}

impl AudioFormat {
    /// Canonical MIME spelling.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Wav => "audio/x-wav",
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
        }
    }

    /// Parse a MIME tag.
    pub fn from_mime(tag: &str) -> PackResult<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "audio/x-wav" | "audio/wav" | "audio/wave" => Ok(Self::Wav),
            "audio/ogg" => Ok(Self::Ogg),
            "audio/mpeg" | "audio/mp3" => Ok(Self::Mp3),
            _ => Err(PackError::unsupported_format(tag)),
        }
    }

    /// Whether the format is a lossy compressed codec.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Ogg | Self::Mp3)
    }
}

macro_rules! mime_conversions {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.mime())
            }
        }

        impl FromStr for $ty {
            type Err = PackError;

            fn from_str(s: &str) -> PackResult<Self> {
                Self::from_mime(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = PackError;

            fn try_from(s: String) -> PackResult<Self> {
                Self::from_mime(&s)
            }
        }

        impl From<$ty> for String {
            fn from(v: $ty) -> String {
                v.mime().to_string()
            }
        }
    };
}

mime_conversions!(ImageFormat);
mime_conversions!(AudioFormat);

/// A format tag plus the encoded bytes it describes.
///
/// Bytes are reference counted so that producing a new pack shares every asset that a transform
/// leaves untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaAsset<F> {
    /// Format the bytes are encoded in.
    pub format: F,
    /// Encoded asset bytes.
    pub bytes: Arc<[u8]>,
}

impl<F> MediaAsset<F> {
    /// Wrap `bytes` tagged as `format`.
    pub fn new(format: F, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }

    /// Borrow the encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether both assets point at the same shared buffer.
    pub fn shares_bytes_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

/// Node picture.
pub type ImageAsset = MediaAsset<ImageFormat>;
/// Node sound.
pub type AudioAsset = MediaAsset<AudioFormat>;

/// One narrative node of a pack. Image and audio are independent of each other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageNode {
    /// Node identifier.
    pub uuid: String,
    /// Optional picture.
    pub image: Option<ImageAsset>,
    /// Optional sound.
    pub audio: Option<AudioAsset>,
}

impl StageNode {
    /// Create an empty node.
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            image: None,
            audio: None,
        }
    }

    /// Builder-style image setter.
    pub fn with_image(mut self, image: ImageAsset) -> Self {
        self.image = Some(image);
        self
    }

    /// Builder-style audio setter.
    pub fn with_audio(mut self, audio: AudioAsset) -> Self {
        self.audio = Some(audio);
        self
    }
}

/// A story pack: an ordered list of stage nodes. Traversal order is the `nodes` order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoryPack {
    /// Pack identifier.
    pub uuid: String,
    /// Human readable title.
    pub title: String,
    /// Stage nodes in traversal order.
    pub nodes: Vec<StageNode>,
}

impl StoryPack {
    /// Create a pack from its nodes.
    pub fn new(uuid: impl Into<String>, title: impl Into<String>, nodes: Vec<StageNode>) -> Self {
        Self {
            uuid: uuid.into(),
            title: title.into(),
            nodes,
        }
    }

    /// Count assets across all nodes.
    pub fn asset_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| usize::from(n.image.is_some()) + usize::from(n.audio.is_some()))
            .sum()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/pack.rs"]
mod tests;

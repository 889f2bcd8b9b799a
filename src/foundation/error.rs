use crate::model::pack::AssetKind;

/// Convenience result type used across the crate.
pub type PackResult<T> = Result<T, PackError>;

/// Top-level error taxonomy for pack transcoding.
///
/// Every variant is fatal for the pack being processed: the pipeline never retries and never
/// returns a partially transcoded pack.
#[derive(thiserror::Error, Debug)]
pub enum PackError {
    /// Input bytes are not valid for the format they claim.
    #[error("decode failure: {0}")]
    Decode(String),

    /// An encoder failed or produced empty output.
    #[error("encode failure: {0}")]
    Encode(String),

    /// No transcoding rule exists for this combination.
    #[error("unsupported transition: {kind} {from} -> {to} ({profile})")]
    UnsupportedTransition {
        /// Asset kind being transcoded.
        kind: AssetKind,
        /// Source format tag.
        from: String,
        /// Requested target format tag.
        to: String,
        /// Target profile name.
        profile: String,
    },

    /// A format tag outside the closed set of known MIME types.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An RLE4 bitmap stream that cannot be interpreted (truncated token, payload or header).
    #[error("malformed RLE stream: {0}")]
    MalformedRle(String),

    /// Invalid options or settings supplied by the caller.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure of a single asset, with the node it belongs to.
    #[error("node {node} {kind} asset: {source}")]
    Asset {
        /// Index of the node in pack traversal order.
        node: usize,
        /// Which asset of the node failed.
        kind: AssetKind,
        /// Underlying failure.
        #[source]
        source: Box<PackError>,
    },

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PackError {
    /// Build a [`PackError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`PackError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`PackError::MalformedRle`] value.
    pub fn malformed_rle(msg: impl Into<String>) -> Self {
        Self::MalformedRle(msg.into())
    }

    /// Build a [`PackError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PackError::UnsupportedFormat`] value.
    pub fn unsupported_format(tag: impl Into<String>) -> Self {
        Self::UnsupportedFormat(tag.into())
    }

    /// Build a [`PackError::UnsupportedTransition`] value.
    pub fn unsupported_transition(
        kind: AssetKind,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
        profile: impl std::fmt::Display,
    ) -> Self {
        Self::UnsupportedTransition {
            kind,
            from: from.to_string(),
            to: to.to_string(),
            profile: profile.to_string(),
        }
    }

    /// Attach node context to an asset failure.
    pub(crate) fn in_asset(self, node: usize, kind: AssetKind) -> Self {
        Self::Asset {
            node,
            kind,
            source: Box::new(self),
        }
    }

    /// Strip [`PackError::Asset`] context layers and return the underlying failure.
    pub fn root_cause(&self) -> &PackError {
        match self {
            Self::Asset { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;

//! Sink failure taxonomy and export errors.

use std::fmt;

use framecast_model::ModelError;

/// Category of a sink failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkErrorKind {
    /// The encoder rejected the audio channel count or layout.
    ChannelMismatch,
    /// The encoder rejected the audio sample rate.
    SampleRateMismatch,
    /// The container format is unknown or cannot be written.
    FormatUnsupported,
    /// The requested codec is unavailable.
    CodecUnsupported,
    /// A frame failed to encode.
    EncodeFailure,
    /// Anything else.
    Unknown,
}

/// Markers recognised in text-only backend errors, checked in order.
const MARKERS: &[(SinkErrorKind, &[&str])] = &[
    (
        SinkErrorKind::ChannelMismatch,
        &["invalidchannels", "invalid channel", "channel layout", "channel count"],
    ),
    (
        SinkErrorKind::SampleRateMismatch,
        &["invalidsamplerate", "invalid sample rate", "sample rate"],
    ),
    (
        SinkErrorKind::FormatUnsupported,
        &[
            "invalidformat",
            "unable to find a suitable output format",
            "invalid output format",
            "unknown format",
        ],
    ),
    (
        SinkErrorKind::CodecUnsupported,
        &["invalidcodec", "unknown encoder", "encoder not found", "codec not currently supported"],
    ),
    (
        SinkErrorKind::EncodeFailure,
        &["errorencodingvideo", "error encoding", "error while encoding", "error submitting"],
    ),
];

impl SinkErrorKind {
    /// Short, stable tag for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChannelMismatch => "invalid-channels",
            Self::SampleRateMismatch => "invalid-sample-rate",
            Self::FormatUnsupported => "invalid-format",
            Self::CodecUnsupported => "invalid-codec",
            Self::EncodeFailure => "encode-failure",
            Self::Unknown => "unknown",
        }
    }

    /// Classify free-form backend output by the markers it contains.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        MARKERS
            .iter()
            .find(|(_, markers)| markers.iter().any(|marker| lowered.contains(marker)))
            .map(|(kind, _)| *kind)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for SinkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by a [`Sink`](crate::sink::Sink).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct SinkError {
    pub kind: SinkErrorKind,
    pub detail: String,
}

impl SinkError {
    pub fn new(kind: SinkErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Build an error from backend text, classifying it by marker.
    ///
    /// Only for adapters around backends that report failures as strings;
    /// native sinks should construct the kind directly.
    pub fn from_message(message: impl Into<String>) -> Self {
        let detail = message.into();
        Self {
            kind: SinkErrorKind::classify(&detail),
            detail,
        }
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(SinkErrorKind::Unknown, detail)
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self::unknown(err.to_string())
    }
}

/// Errors surfaced by the export engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("Invalid export range {start}..={end}: select a valid range of frames to export")]
    InvalidRange { start: u64, end: u64 },

    #[error("Encoder rejected the channel count: {0}")]
    SinkChannelMismatch(String),

    #[error("Encoder rejected the sample rate: {0}")]
    SinkSampleRateMismatch(String),

    #[error("Output format is not supported: {0}")]
    SinkFormatUnsupported(String),

    #[error("Codec is not supported: {0}")]
    SinkCodecUnsupported(String),

    #[error("Failed to encode frame: {0}")]
    SinkEncodeFailure(String),

    #[error("Export failed: {0}")]
    SinkUnknownFailure(String),
}

impl From<SinkError> for ExportError {
    fn from(err: SinkError) -> Self {
        match err.kind {
            SinkErrorKind::ChannelMismatch => Self::SinkChannelMismatch(err.detail),
            SinkErrorKind::SampleRateMismatch => Self::SinkSampleRateMismatch(err.detail),
            SinkErrorKind::FormatUnsupported => Self::SinkFormatUnsupported(err.detail),
            SinkErrorKind::CodecUnsupported => Self::SinkCodecUnsupported(err.detail),
            SinkErrorKind::EncodeFailure => Self::SinkEncodeFailure(err.detail),
            SinkErrorKind::Unknown => Self::SinkUnknownFailure(err.detail),
        }
    }
}

impl From<ModelError> for ExportError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidRange { start, end } => Self::InvalidRange { start, end },
            other => Self::SinkUnknownFailure(other.to_string()),
        }
    }
}

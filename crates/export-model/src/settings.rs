//! Encoder settings for an export.

use serde::{Deserialize, Serialize};

/// What the export writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportType {
    #[default]
    VideoAndAudio,
    VideoOnly,
    AudioOnly,
    ImageSequence,
}

impl ExportType {
    pub fn has_video(self) -> bool {
        !matches!(self, Self::AudioOnly)
    }

    pub fn has_audio(self) -> bool {
        matches!(self, Self::VideoAndAudio | Self::AudioOnly)
    }

    /// Whether the export produces a single container file that could
    /// overwrite an existing one.
    pub fn is_single_file(self) -> bool {
        !matches!(self, Self::ImageSequence)
    }
}

/// A rational number such as a frame rate or aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    pub num: u32,
    pub den: u32,
}

impl Fraction {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Floating point value; a zero denominator yields 0.0.
    pub fn as_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

/// Encoder rate control, parsed from strings like `"8 Mb/s"` or `"23 crf"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Bitrate {
    /// Constant bitrate in bits per second.
    Bits(u64),
    /// Constant rate factor, `0..=63`.
    Crf(u8),
    /// Constant quantization parameter, `0..=63`.
    Cqp(u8),
    /// Quantization parameter, `0..=255`.
    Qp(u8),
}

impl Default for Bitrate {
    fn default() -> Self {
        Self::Bits(0)
    }
}

impl Bitrate {
    /// Parse a `"<number> <unit>"` string.
    ///
    /// Units are matched case-insensitively by substring: `kb` and `mb`
    /// scale to bits per second, `crf`/`cqp` clamp to `[0, 63]` and `qp`
    /// clamps to `[0, 255]`. A bare `b/s` or `bps` is taken as bits per
    /// second. Anything unparsable yields `Bits(0)`.
    pub fn parse(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let mut parts = lowered.split(' ');
        let (Some(number), Some(unit)) = (parts.next(), parts.next()) else {
            tracing::warn!(bitrate = text, "Failed to convert bitrate string");
            return Self::default();
        };

        let Ok(value) = number.replace(',', ".").parse::<f64>() else {
            tracing::warn!(bitrate = text, "Failed to convert bitrate string");
            return Self::default();
        };

        if unit.contains("kb") {
            Self::Bits((value * 1000.0) as u64)
        } else if unit.contains("mb") {
            Self::Bits((value * 1000.0 * 1000.0) as u64)
        } else if unit.contains("crf") {
            Self::Crf(value.clamp(0.0, 63.0) as u8)
        } else if unit.contains("cqp") {
            Self::Cqp(value.clamp(0.0, 63.0) as u8)
        } else if unit.contains("qp") {
            Self::Qp(value.clamp(0.0, 255.0) as u8)
        } else if unit == "b/s" || unit == "bps" {
            Self::Bits(value.max(0.0) as u64)
        } else {
            Self::default()
        }
    }

    /// The integer handed to the encoder, whatever the mode.
    pub fn as_value(self) -> u64 {
        match self {
            Self::Bits(bits) => bits,
            Self::Crf(q) | Self::Cqp(q) | Self::Qp(q) => q as u64,
        }
    }

    /// Encoder option name for quality-based modes.
    pub fn quality_option(self) -> Option<&'static str> {
        match self {
            Self::Bits(_) => None,
            Self::Crf(_) => Some("crf"),
            Self::Cqp(_) => Some("cqp"),
            Self::Qp(_) => Some("qp"),
        }
    }
}

/// Speaker arrangement of the audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    Mono,
    #[default]
    Stereo,
    Surround,
    FivePointOne,
    SevenPointOne,
}

impl ChannelLayout {
    pub fn channels(self) -> u32 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Surround => 3,
            Self::FivePointOne => 6,
            Self::SevenPointOne => 8,
        }
    }

    /// Name understood by ffmpeg's `-channel_layout`.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Mono => "mono",
            Self::Stereo => "stereo",
            Self::Surround => "3.0",
            Self::FivePointOne => "5.1",
            Self::SevenPointOne => "7.1",
        }
    }
}

/// Video stream parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Container format / file extension (e.g. `mp4`).
    pub format: String,
    /// Encoder name (e.g. `libx264`).
    pub codec: String,
    pub fps: Fraction,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: Fraction,
    pub bitrate: Bitrate,
    pub interlaced: bool,
    pub top_field_first: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            format: "mp4".to_string(),
            codec: "libx264".to_string(),
            fps: Fraction::new(30, 1),
            width: 1920,
            height: 1080,
            pixel_ratio: Fraction::new(1, 1),
            bitrate: Bitrate::Bits(15_000_000),
            interlaced: false,
            top_field_first: false,
        }
    }
}

impl VideoSettings {
    /// Switch format and codec to the image type named by `image_suffix`
    /// (e.g. `%05d.png`).
    pub fn apply_image_sequence(&mut self, image_suffix: &str) {
        let ext = std::path::Path::new(image_suffix.trim())
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        self.codec = match ext.as_str() {
            "jpg" | "jpeg" => "mjpeg".to_string(),
            other => other.to_string(),
        };
        self.format = ext;
    }
}

/// Audio stream parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub channel_layout: ChannelLayout,
    pub bitrate: Bitrate,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            codec: "aac".to_string(),
            sample_rate: 48_000,
            channels: 2,
            channel_layout: ChannelLayout::Stereo,
            bitrate: Bitrate::Bits(192_000),
        }
    }
}

impl AudioSettings {
    /// Audio is dropped when either the sample rate or channel count is zero.
    pub fn has_audio(&self) -> bool {
        self.sample_rate != 0 && self.channels != 0
    }

    /// Pick a layout and sync the channel count to it.
    pub fn set_layout(&mut self, layout: ChannelLayout) {
        self.channel_layout = layout;
        self.channels = layout.channels();
    }
}

/// Everything the encoder needs to know about an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExportSettings {
    pub export_type: ExportType,
    pub video: VideoSettings,
    pub audio: AudioSettings,
}

impl ExportSettings {
    /// Whether the output carries an audio stream.
    pub fn wants_audio(&self) -> bool {
        self.export_type.has_audio() && self.audio.has_audio()
    }
}

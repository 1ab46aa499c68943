//! Ordered snapshots of the settings used for the last export.
//!
//! Each entry is keyed by a stable identifier and carries its kind, so a
//! restore can apply values in the same order they were written without
//! inspecting anything beyond the record itself.

use serde::{Deserialize, Serialize};

use crate::settings::{Bitrate, ChannelLayout, ExportSettings, ExportType, Fraction};
use crate::ModelError;

/// Kind of value a setting holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    Text,
    Choice,
    Number,
    Toggle,
}

/// A stored setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Toggle(bool),
    Number(i64),
    Text(String),
}

/// One `{name, kind, value}` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSetting {
    pub name: String,
    pub kind: SettingKind,
    pub value: SettingValue,
}

/// An ordered list of saved settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsSnapshot {
    entries: Vec<SavedSetting>,
}

impl SettingsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, name: &str, value: impl Into<String>) {
        self.push(name, SettingKind::Text, SettingValue::Text(value.into()));
    }

    pub fn push_choice(&mut self, name: &str, value: impl Into<String>) {
        self.push(name, SettingKind::Choice, SettingValue::Text(value.into()));
    }

    pub fn push_number(&mut self, name: &str, value: i64) {
        self.push(name, SettingKind::Number, SettingValue::Number(value));
    }

    pub fn push_toggle(&mut self, name: &str, value: bool) {
        self.push(name, SettingKind::Toggle, SettingValue::Toggle(value));
    }

    fn push(&mut self, name: &str, kind: SettingKind, value: SettingValue) {
        self.entries.push(SavedSetting {
            name: name.to_string(),
            kind,
            value,
        });
    }

    /// Entries in write order.
    pub fn entries(&self) -> &[SavedSetting] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&SavedSetting> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        serde_json::to_string_pretty(self).map_err(|source| ModelError::Snapshot { source })
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        serde_json::from_str(json).map_err(|source| ModelError::Snapshot { source })
    }

    /// Record every field of `settings` in a fixed order.
    pub fn capture(settings: &ExportSettings) -> Self {
        let mut snapshot = Self::new();
        snapshot.push_choice("export_type", enum_name(&settings.export_type));
        snapshot.push_text("video_format", &settings.video.format);
        snapshot.push_text("video_codec", &settings.video.codec);
        snapshot.push_number("fps_num", settings.video.fps.num as i64);
        snapshot.push_number("fps_den", settings.video.fps.den as i64);
        snapshot.push_number("width", settings.video.width as i64);
        snapshot.push_number("height", settings.video.height as i64);
        snapshot.push_number("pixel_ratio_num", settings.video.pixel_ratio.num as i64);
        snapshot.push_number("pixel_ratio_den", settings.video.pixel_ratio.den as i64);
        snapshot.push_text("video_bitrate", bitrate_text(settings.video.bitrate));
        snapshot.push_toggle("interlaced", settings.video.interlaced);
        snapshot.push_toggle("top_field_first", settings.video.top_field_first);
        snapshot.push_text("audio_codec", &settings.audio.codec);
        snapshot.push_number("sample_rate", settings.audio.sample_rate as i64);
        snapshot.push_number("channels", settings.audio.channels as i64);
        snapshot.push_choice("channel_layout", enum_name(&settings.audio.channel_layout));
        snapshot.push_text("audio_bitrate", bitrate_text(settings.audio.bitrate));
        snapshot
    }

    /// Apply entries, in order, on top of `base`.
    ///
    /// Unknown names are skipped. A known name whose record kind or value
    /// type does not match the setting is an error.
    pub fn restore(&self, base: ExportSettings) -> Result<ExportSettings, ModelError> {
        let mut settings = base;
        for entry in &self.entries {
            let name = entry.name.as_str();
            match name {
                "export_type" => settings.export_type = choice(entry)?,
                "video_format" => settings.video.format = text(entry)?.to_string(),
                "video_codec" => settings.video.codec = text(entry)?.to_string(),
                "fps_num" => settings.video.fps.num = number(entry)?,
                "fps_den" => settings.video.fps.den = number(entry)?,
                "width" => settings.video.width = number(entry)?,
                "height" => settings.video.height = number(entry)?,
                "pixel_ratio_num" => settings.video.pixel_ratio.num = number(entry)?,
                "pixel_ratio_den" => settings.video.pixel_ratio.den = number(entry)?,
                "video_bitrate" => settings.video.bitrate = Bitrate::parse(text(entry)?),
                "interlaced" => settings.video.interlaced = toggle(entry)?,
                "top_field_first" => settings.video.top_field_first = toggle(entry)?,
                "audio_codec" => settings.audio.codec = text(entry)?.to_string(),
                "sample_rate" => settings.audio.sample_rate = number(entry)?,
                "channels" => settings.audio.channels = number(entry)?,
                "channel_layout" => {
                    settings.audio.channel_layout = choice::<ChannelLayout>(entry)?
                }
                "audio_bitrate" => settings.audio.bitrate = Bitrate::parse(text(entry)?),
                other => tracing::debug!(setting = other, "Skipping unknown saved setting"),
            }
        }
        Ok(settings)
    }
}

fn bitrate_text(bitrate: Bitrate) -> String {
    match bitrate {
        Bitrate::Bits(bits) => format!("{bits} b/s"),
        Bitrate::Crf(q) => format!("{q} crf"),
        Bitrate::Cqp(q) => format!("{q} cqp"),
        Bitrate::Qp(q) => format!("{q} qp"),
    }
}

fn enum_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => name,
        _ => String::new(),
    }
}

fn kind_error(entry: &SavedSetting, expected: &'static str) -> ModelError {
    ModelError::SettingKind {
        name: entry.name.clone(),
        expected,
    }
}

fn text(entry: &SavedSetting) -> Result<&str, ModelError> {
    match (entry.kind, &entry.value) {
        (SettingKind::Text, SettingValue::Text(value)) => Ok(value),
        _ => Err(kind_error(entry, "text")),
    }
}

fn number<T: TryFrom<i64>>(entry: &SavedSetting) -> Result<T, ModelError> {
    match (entry.kind, &entry.value) {
        (SettingKind::Number, SettingValue::Number(value)) => {
            T::try_from(*value).map_err(|_| kind_error(entry, "non-negative number"))
        }
        _ => Err(kind_error(entry, "number")),
    }
}

fn toggle(entry: &SavedSetting) -> Result<bool, ModelError> {
    match (entry.kind, &entry.value) {
        (SettingKind::Toggle, SettingValue::Toggle(value)) => Ok(*value),
        _ => Err(kind_error(entry, "toggle")),
    }
}

fn choice<T: serde::de::DeserializeOwned>(entry: &SavedSetting) -> Result<T, ModelError> {
    let name = match (entry.kind, &entry.value) {
        (SettingKind::Choice, SettingValue::Text(name)) => name,
        _ => return Err(kind_error(entry, "choice")),
    };
    serde_json::from_value(serde_json::Value::String(name.clone()))
        .map_err(|_| kind_error(entry, "known choice"))
}

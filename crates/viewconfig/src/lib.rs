//! On-disk configuration for deltaview.
//!
//! The file is TOML with a mandatory `version = 1` key. Every other table is
//! optional and falls back to the defaults below, so the smallest valid file
//! is a single line. Durations accept humantime strings (`"750ms"`, `"2s"`)
//! or bare numbers, which are read as milliseconds.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const CONFIG_VERSION: u32 = 1;
pub const MAX_FRAME_EDGE: u32 = 16_384;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which signal feeds the edge detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionInput {
    #[default]
    Grayscale,
    Difference,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Gpu,
    Software,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Pattern,
    Solid,
    Images,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ViewConfig {
    pub version: u32,
    #[serde(
        default = "default_delay",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub delay: Duration,
    #[serde(default)]
    pub input_mode: DetectionInput,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub gpu: GpuSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub width: u32,
    pub height: u32,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub frame_interval: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Swap the pattern size every N frames to exercise renegotiation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_every: Option<u32>,
    /// Frames shown before the solid source switches colour.
    pub switch_after: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GpuSettings {
    pub power: PowerSetting,
    pub allow_fallback: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            delay: default_delay(),
            input_mode: DetectionInput::default(),
            backend: BackendKind::default(),
            window: WindowSettings::default(),
            source: SourceSettings::default(),
            gpu: GpuSettings::default(),
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            vsync: true,
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            width: 640,
            height: 480,
            frame_interval: Duration::from_millis(33),
            directory: None,
            resize_every: None,
            switch_after: 60,
        }
    }
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            power: PowerSetting::default(),
            allow_fallback: true,
        }
    }
}

fn default_delay() -> Duration {
    Duration::from_millis(1000)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of milliseconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v.trim())
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_millis(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_millis(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v / 1000.0))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

/// Parses a duration the same way the config file does.
///
/// Shared with the CLI so `--delay 750` and `delay = 750` agree.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("duration must not be empty".into());
    }
    if let Ok(millis) = trimmed.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{trimmed}': {err}"))
}

impl ViewConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ViewConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(
                "window width and height must be greater than zero".into(),
            ));
        }

        validate_frame_size("source", self.source.width, self.source.height)?;

        if self.source.kind == SourceKind::Images {
            match &self.source.directory {
                None => {
                    return Err(ConfigError::Invalid(
                        "source.kind = \"images\" requires source.directory".into(),
                    ));
                }
                Some(dir) if dir.as_os_str().is_empty() => {
                    return Err(ConfigError::Invalid(
                        "source.directory may not be empty".into(),
                    ));
                }
                Some(_) => {}
            }
        }

        if self.source.resize_every == Some(0) {
            return Err(ConfigError::Invalid(
                "source.resize_every must be greater than zero when set".into(),
            ));
        }

        if self.source.switch_after == 0 {
            return Err(ConfigError::Invalid(
                "source.switch_after must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

fn validate_frame_size(section: &str, width: u32, height: u32) -> Result<(), ConfigError> {
    if width == 0 || height == 0 {
        return Err(ConfigError::Invalid(format!(
            "{section} width and height must be greater than zero"
        )));
    }
    if width > MAX_FRAME_EDGE || height > MAX_FRAME_EDGE {
        return Err(ConfigError::Invalid(format!(
            "{section} size {width}x{height} exceeds the {MAX_FRAME_EDGE}px limit"
        )));
    }
    Ok(())
}

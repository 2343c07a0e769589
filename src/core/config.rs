//! Logger configuration
//!
//! Every struct deserializes from camelCase JSON or YAML with all keys
//! optional. An unset level defaults to `info` and an unset writer to stdout.

use super::error::{LoggerError, Result};
use super::level::{Level, LevelSet};
use super::timestamp::{validate_strftime, TimestampFormat};
use super::writer::Writer;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Default strftime pattern for rotated file buckets (one bucket per day)
pub const DEFAULT_BACKUP_TIME_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Text,
    Json,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Text => "text",
            Encoding::Json => "json",
        }
    }
}

impl FromStr for Encoding {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "text" | "console" => Ok(Encoding::Text),
            "json" => Ok(Encoding::Json),
            _ => Err(LoggerError::config(
                "encoding",
                format!("unsupported encoding '{}'", s),
            )),
        }
    }
}

impl Serialize for Encoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Encoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A part of the text encoder's line prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    Time,
    Level,
    Name,
    Caller,
    Stack,
    Message,
}

impl Part {
    pub fn default_order() -> Vec<Part> {
        vec![
            Part::Time,
            Part::Level,
            Part::Name,
            Part::Caller,
            Part::Stack,
            Part::Message,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextEncoderConfig {
    pub parts_order: Vec<Part>,
    pub time_format: TimestampFormat,
    pub disable_timestamp: bool,
    pub disable_color: bool,
    /// Extra frames to skip when resolving the caller
    pub caller_skip_frame: usize,
    pub show_module_name: bool,
}

impl Default for TextEncoderConfig {
    fn default() -> Self {
        Self {
            parts_order: Part::default_order(),
            time_format: TimestampFormat::default(),
            disable_timestamp: false,
            disable_color: false,
            caller_skip_frame: 0,
            show_module_name: false,
        }
    }
}

impl TextEncoderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parts_order(mut self, parts: Vec<Part>) -> Self {
        self.parts_order = parts;
        self
    }

    #[must_use]
    pub fn with_time_format(mut self, format: TimestampFormat) -> Self {
        self.time_format = format;
        self
    }

    #[must_use]
    pub fn with_disable_timestamp(mut self, disable: bool) -> Self {
        self.disable_timestamp = disable;
        self
    }

    #[must_use]
    pub fn with_disable_color(mut self, disable: bool) -> Self {
        self.disable_color = disable;
        self
    }

    #[must_use]
    pub fn with_caller_skip_frame(mut self, skip: usize) -> Self {
        self.caller_skip_frame = skip;
        self
    }

    #[must_use]
    pub fn with_show_module_name(mut self, show: bool) -> Self {
        self.show_module_name = show;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.time_format.validate()
    }
}

/// Key names of the fixed JSON prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonKeys {
    pub time: String,
    pub level: String,
    pub module: String,
    pub caller: String,
    pub stack: String,
    pub message: String,
}

impl Default for JsonKeys {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            level: "level".to_string(),
            module: "module".to_string(),
            caller: "caller".to_string(),
            stack: "stack".to_string(),
            message: "message".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonEncoderConfig {
    pub time_format: TimestampFormat,
    pub disable_timestamp: bool,
    pub caller_skip_frame: usize,
    pub show_module_name: bool,
    pub keys: JsonKeys,
}

impl JsonEncoderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_time_format(mut self, format: TimestampFormat) -> Self {
        self.time_format = format;
        self
    }

    #[must_use]
    pub fn with_disable_timestamp(mut self, disable: bool) -> Self {
        self.disable_timestamp = disable;
        self
    }

    #[must_use]
    pub fn with_caller_skip_frame(mut self, skip: usize) -> Self {
        self.caller_skip_frame = skip;
        self
    }

    #[must_use]
    pub fn with_show_module_name(mut self, show: bool) -> Self {
        self.show_module_name = show;
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: JsonKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.time_format.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriterKind {
    #[default]
    Stdout,
    Stderr,
    Discard,
    File,
    RotateFile,
    Custom,
    /// Fan out to every entry of `sinks`
    Multi,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
    /// `"stdout"`, `"stderr"`, `""` (discard) or a file path
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RotateFileConfig {
    /// Active file path; empty selects `<process name>.log`
    pub filename: String,
    /// Backups to keep; 0 keeps all, negative is rejected
    pub max_backups: i64,
    /// strftime pattern defining the rotation bucket
    pub backup_time_format: String,
    pub local_time: bool,
    /// Skip the flush after every write
    #[serde(rename = "async")]
    pub async_write: bool,
}

impl Default for RotateFileConfig {
    fn default() -> Self {
        Self {
            filename: String::new(),
            max_backups: 0,
            backup_time_format: DEFAULT_BACKUP_TIME_FORMAT.to_string(),
            local_time: false,
            async_write: false,
        }
    }
}

impl RotateFileConfig {
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_backups(mut self, max_backups: i64) -> Self {
        self.max_backups = max_backups;
        self
    }

    #[must_use]
    pub fn with_backup_time_format(mut self, format: impl Into<String>) -> Self {
        self.backup_time_format = format.into();
        self
    }

    #[must_use]
    pub fn with_local_time(mut self, local_time: bool) -> Self {
        self.local_time = local_time;
        self
    }

    #[must_use]
    pub fn with_async(mut self, async_write: bool) -> Self {
        self.async_write = async_write;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_backups < 0 {
            return Err(LoggerError::config(
                "rotateFile",
                format!("maxBackups cannot be negative, got {}", self.max_backups),
            ));
        }
        validate_strftime("rotateFile", &self.backup_time_format)
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriterConfig {
    #[serde(rename = "type")]
    pub kind: WriterKind,
    pub file: FileConfig,
    pub rotate_file: RotateFileConfig,
    #[serde(skip)]
    pub custom: Option<Arc<dyn Writer>>,
    pub sinks: Vec<SinkConfig>,
}

/// One destination of a `multi` writer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SinkConfig {
    /// Only lines at this level or more severe reach the sink
    pub level: Option<Level>,
    pub writer: WriterConfig,
}

impl SinkConfig {
    pub fn new(writer: WriterConfig) -> Self {
        Self {
            level: None,
            writer,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }
}

impl fmt::Debug for WriterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterConfig")
            .field("kind", &self.kind)
            .field("file", &self.file)
            .field("rotate_file", &self.rotate_file)
            .field("custom", &self.custom.as_ref().map(|w| w.name().to_string()))
            .field("sinks", &self.sinks)
            .finish()
    }
}

impl WriterConfig {
    pub fn stdout() -> Self {
        Self::default()
    }

    pub fn stderr() -> Self {
        Self {
            kind: WriterKind::Stderr,
            ..Self::default()
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: WriterKind::File,
            file: FileConfig { path: path.into() },
            ..Self::default()
        }
    }

    pub fn rotate_file(config: RotateFileConfig) -> Self {
        Self {
            kind: WriterKind::RotateFile,
            rotate_file: config,
            ..Self::default()
        }
    }

    pub fn custom(writer: Arc<dyn Writer>) -> Self {
        Self {
            kind: WriterKind::Custom,
            custom: Some(writer),
            ..Self::default()
        }
    }

    /// Fan out to several writers
    pub fn multi(sinks: Vec<SinkConfig>) -> Self {
        Self {
            kind: WriterKind::Multi,
            sinks,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.kind {
            WriterKind::RotateFile => self.rotate_file.validate(),
            WriterKind::Multi => self.sinks.iter().try_for_each(|sink| sink.writer.validate()),
            WriterKind::Custom if self.custom.is_none() => Err(LoggerError::config(
                "writer",
                "type 'custom' requires a custom writer",
            )),
            _ => Ok(()),
        }
    }
}

/// Configuration for one logger module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub level: Level,
    pub encoding: Encoding,
    pub text_encoder: TextEncoderConfig,
    pub json_encoder: JsonEncoderConfig,
    pub caller_levels: Vec<Level>,
    pub stacktrace_levels: Vec<Level>,
    pub writer: WriterConfig,
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_text_encoder(mut self, config: TextEncoderConfig) -> Self {
        self.text_encoder = config;
        self
    }

    #[must_use]
    pub fn with_json_encoder(mut self, config: JsonEncoderConfig) -> Self {
        self.json_encoder = config;
        self
    }

    #[must_use]
    pub fn with_caller_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.caller_levels = levels.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_stacktrace_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.stacktrace_levels = levels.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_writer(mut self, writer: WriterConfig) -> Self {
        self.writer = writer;
        self
    }

    /// Route output to a caller-provided sink
    #[must_use]
    pub fn with_custom_writer(mut self, writer: Arc<dyn Writer>) -> Self {
        self.writer = WriterConfig::custom(writer);
        self
    }

    pub fn caller_level_set(&self) -> LevelSet {
        self.caller_levels.iter().collect()
    }

    pub fn stacktrace_level_set(&self) -> LevelSet {
        self.stacktrace_levels.iter().collect()
    }

    /// Validate the encoder selected by `encoding` and the writer
    pub fn validate(&self) -> Result<()> {
        match self.encoding {
            Encoding::Text => self.text_encoder.validate()?,
            Encoding::Json => self.json_encoder.validate()?,
        }
        self.writer.validate()
    }
}

/// A default config plus per-module overrides, as loaded from a file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configs {
    pub default: Config,
    pub modules: HashMap<String, Config>,
}

impl Configs {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "reading config file",
                format!("cannot read {}", path.display()),
                e,
            )
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            other => Err(LoggerError::config(
                "config file",
                format!("unsupported config file extension: {}", other.unwrap_or("")),
            )),
        }
    }

    /// The config for `module`, falling back to the default
    pub fn module_config(&self, module: &str) -> &Config {
        self.modules.get(module).unwrap_or(&self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.encoding, Encoding::Text);
        assert_eq!(config.writer.kind, WriterKind::Stdout);
        assert_eq!(config.text_encoder.parts_order, Part::default_order());
        assert_eq!(config.writer.rotate_file.backup_time_format, "%Y%m%d");
    }

    #[test]
    fn test_json_camel_case() {
        let configs = Configs::from_json_str(
            r#"{
                "default": {
                    "level": "debug",
                    "encoding": "console",
                    "callerLevels": ["error", "WARN"],
                    "textEncoder": {"disableColor": true, "partsOrder": ["level", "message"]},
                    "writer": {"type": "rotateFile", "rotateFile": {"filename": "app.log", "maxBackups": 3, "async": true}}
                },
                "modules": {
                    "db": {"level": "error", "encoding": "json"}
                }
            }"#,
        )
        .unwrap();

        let default = &configs.default;
        assert_eq!(default.level, Level::Debug);
        assert_eq!(default.encoding, Encoding::Text);
        assert_eq!(default.caller_levels, vec![Level::Error, Level::Warning]);
        assert!(default.text_encoder.disable_color);
        assert_eq!(default.text_encoder.parts_order, vec![Part::Level, Part::Message]);
        assert_eq!(default.writer.kind, WriterKind::RotateFile);
        assert_eq!(default.writer.rotate_file.max_backups, 3);
        assert!(default.writer.rotate_file.async_write);

        assert_eq!(configs.module_config("db").encoding, Encoding::Json);
        assert_eq!(configs.module_config("other").level, Level::Debug);
    }

    #[test]
    fn test_unsupported_encoding_rejected() {
        let err = Configs::from_json_str(r#"{"default": {"encoding": "xml"}}"#).unwrap_err();
        assert!(err.to_string().contains("unsupported encoding 'xml'"));
        assert!("xml".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_negative_max_backups_rejected() {
        let config = Config::new().with_writer(WriterConfig::rotate_file(
            RotateFileConfig::new("app.log").with_max_backups(-1),
        ));
        assert!(matches!(
            config.validate(),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_invalid_time_format_rejected() {
        let configs =
            Configs::from_json_str(r#"{"default": {"textEncoder": {"timeFormat": "%Q"}}}"#)
                .unwrap();
        assert!(matches!(
            configs.default.validate(),
            Err(LoggerError::InvalidConfiguration { .. })
        ));

        let json = Config::new()
            .with_encoding(Encoding::Json)
            .with_json_encoder(
                JsonEncoderConfig::new()
                    .with_time_format(TimestampFormat::Custom("%Y %Q".to_string())),
            );
        assert!(json.validate().is_err());

        let rotate = Config::new().with_writer(WriterConfig::rotate_file(
            RotateFileConfig::new("app.log").with_backup_time_format("%Q"),
        ));
        assert!(rotate.validate().is_err());
    }

    #[test]
    fn test_multi_writer_config() {
        let configs = Configs::from_json_str(
            r#"{"default": {"writer": {"type": "multi", "sinks": [
                {"writer": {"type": "stdout"}},
                {"level": "error", "writer": {"type": "file", "file": {"path": "errors.log"}}}
            ]}}}"#,
        )
        .unwrap();
        let writer = &configs.default.writer;
        assert_eq!(writer.kind, WriterKind::Multi);
        assert_eq!(writer.sinks.len(), 2);
        assert_eq!(writer.sinks[0].level, None);
        assert_eq!(writer.sinks[1].level, Some(Level::Error));
        assert_eq!(writer.sinks[1].writer.file.path, "errors.log");

        let nested_invalid = WriterConfig::multi(vec![SinkConfig::new(WriterConfig::rotate_file(
            RotateFileConfig::new("x.log").with_max_backups(-1),
        ))]);
        assert!(nested_invalid.validate().is_err());
    }

    #[test]
    fn test_custom_writer_required() {
        let config = Config::new().with_writer(WriterConfig {
            kind: WriterKind::Custom,
            ..WriterConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "default:\n  level: warning\n  stacktraceLevels: [panic, fatal]\nmodules:\n  http:\n    level: debug\n"
        )
        .unwrap();

        let configs = Configs::load(file.path()).unwrap();
        assert_eq!(configs.default.level, Level::Warning);
        assert!(configs.default.stacktrace_level_set().contains(Level::Fatal));
        assert_eq!(configs.module_config("http").level, Level::Debug);
    }

    #[test]
    fn test_load_unsupported_extension() {
        let file = Builder::new().suffix(".toml").tempfile().unwrap();
        let err = Configs::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config file extension"));
    }
}

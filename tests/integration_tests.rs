//! Integration tests for the log engine
//!
//! These tests verify:
//! - Exact text and JSON output
//! - Level gating and child loggers
//! - Caller and stacktrace annotation
//! - Failure reporting through metrics
//! - Fan-out to several sinks
//! - Process exit on fatal entries
//! - File-based configuration and the global registry

use rust_log_engine::core::{Configs, Level, Part, SinkConfig};
use rust_log_engine::prelude::*;
use rust_log_engine::{global, info, values};
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn plain_text() -> TextEncoder {
    TextEncoder::new(
        TextEncoderConfig::new()
            .with_disable_timestamp(true)
            .with_disable_color(true),
    )
}

fn json_no_time() -> JsonEncoder {
    JsonEncoder::new(JsonEncoderConfig::new().with_disable_timestamp(true))
}

fn text_logger(level: Level) -> (Logger, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder("it")
        .level(level)
        .encoder(plain_text())
        .writer(buffer.clone())
        .build();
    (logger, buffer)
}

#[test]
fn test_text_example_line() {
    let (logger, buffer) = text_logger(Level::Info);
    logger.info_with("hello", values!["a", 1, "b", true]);
    assert_eq!(buffer.contents_string(), "INFO hello a=1 b=true\n");
}

#[test]
fn test_json_error_line() {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder("it")
        .encoder(json_no_time())
        .writer(buffer.clone())
        .build();

    logger.error_with("boom", values!["code", 500]);

    let output = buffer.contents_string();
    assert_eq!(output.lines().count(), 1);
    assert!(output.contains("\"level\":\"error\""));
    assert!(output.contains("\"message\":\"boom\""));
    assert!(output.contains("\"code\":500"));
    let value: Value = serde_json::from_str(output.trim_end()).unwrap();
    assert_eq!(value["code"], 500);
}

#[test]
fn test_log_injection_prevention() {
    let (logger, buffer) = text_logger(Level::Info);

    let malicious_message = "User login\nERRO Fake error injected\nINFO Continuation";
    logger.info(malicious_message);

    let content = buffer.contents_string();
    assert!(content.contains("\\n"));
    assert_eq!(content.lines().count(), 1, "Log should be a single line");
}

#[test]
fn test_level_gating() {
    let (logger, buffer) = text_logger(Level::Warning);
    logger.debug("d");
    logger.info("i");
    logger.warn("w");
    logger.error("e");
    logger.log(Level::Info, "i2");
    logger.log(Level::Error, "e2");

    assert_eq!(buffer.lines(), vec!["WARN w", "ERRO e", "ERRO e2"]);
    assert_eq!(logger.metrics().total_logged(), 3);
}

#[test]
fn test_child_loggers_chain() {
    let (logger, buffer) = text_logger(Level::Info);
    let service = logger.with_field("svc", "billing");
    let request = service.with_values(values!["req", 9, "user", "ann lee"]);

    request.info("charged");
    service.info("idle");

    assert_eq!(
        buffer.lines(),
        vec![
            "INFO charged svc=billing req=9 user=\"ann lee\"",
            "INFO idle svc=billing"
        ]
    );
}

#[test]
fn test_part_order_and_module_name() {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder("payments")
        .encoder(TextEncoder::new(
            TextEncoderConfig::new()
                .with_disable_timestamp(true)
                .with_disable_color(true)
                .with_show_module_name(true)
                .with_parts_order(vec![Part::Name, Part::Message, Part::Level]),
        ))
        .writer(buffer.clone())
        .build();

    logger.warn("slow");
    assert_eq!(buffer.contents_string(), "payments slow WARN\n");
}

#[test]
fn test_caller_annotation_points_at_call_site() {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder("it")
        .encoder(plain_text())
        .writer(buffer.clone())
        .caller_levels([Level::Info, Level::Error])
        .build();

    let line = line!() + 1;
    logger.info("direct");
    let child_line = line!() + 1;
    logger.with_field("k", 1).error_with("child", values!["x", 2]);
    let macro_line = line!() + 1;
    info!(logger, "via {}", "macro");

    let lines = buffer.lines();
    assert_eq!(lines.len(), 3);
    assert!(
        lines[0].contains(&format!("integration_tests.rs:{} direct", line)),
        "unexpected line {}",
        lines[0]
    );
    assert!(
        lines[1].contains(&format!("integration_tests.rs:{} child", child_line)),
        "unexpected line {}",
        lines[1]
    );
    assert!(
        lines[2].contains(&format!("integration_tests.rs:{} via macro", macro_line)),
        "unexpected line {}",
        lines[2]
    );
}

#[inline(never)]
fn audit(logger: &Logger, action: &str) {
    logger.with_caller_skip(1).info(action);
}

#[test]
fn test_caller_skip_for_wrappers() {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder("it")
        .encoder(json_no_time())
        .writer(buffer.clone())
        .caller_levels([Level::Info])
        .build();

    let line = line!() + 1;
    audit(&logger, "deleted");

    let value: Value = serde_json::from_str(buffer.contents_string().trim_end()).unwrap();
    let caller = value["caller"].as_str().unwrap();
    assert!(
        caller.ends_with(&format!("integration_tests.rs:{}", line)),
        "unexpected caller {}",
        caller
    );
}

#[test]
fn test_stacktrace_on_selected_levels() {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder("it")
        .encoder(json_no_time())
        .writer(buffer.clone())
        .stacktrace_levels([Level::Error])
        .build();

    logger.info("no stack");
    logger.error("with stack");

    let lines = buffer.lines();
    let info: Value = serde_json::from_str(&lines[0]).unwrap();
    let error: Value = serde_json::from_str(&lines[1]).unwrap();
    assert!(info.get("stack").is_none());
    let stack = error["stack"].as_str().unwrap();
    assert!(stack.contains("test_stacktrace_on_selected_levels"));
    assert!(stack.contains("\n\t"));
}

struct BrokenPipe;

impl Writer for BrokenPipe {
    fn write(&self, _bytes: &[u8]) -> Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "reader went away").into())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "broken-pipe"
    }
}

#[test]
fn test_write_failures_are_counted() {
    let logger = Logger::new(
        "it",
        &Config::new().with_custom_writer(Arc::new(BrokenPipe)),
    )
    .unwrap();

    logger.info("one");
    logger.warn("two");
    logger.debug("suppressed");

    let metrics = logger.metrics();
    assert_eq!(metrics.write_failures(), 2);
    assert_eq!(metrics.total_logged(), 0);
    assert!(metrics.failure_rate() > 0.99);
}

#[test]
fn test_unsupported_encoding_fails_construction() {
    let err = Configs::from_json_str(r#"{"default": {"encoding": "protobuf"}}"#).unwrap_err();
    assert!(err.to_string().contains("protobuf"));
}

#[test]
fn test_invalid_time_format_fails_construction() {
    let configs =
        Configs::from_json_str(r#"{"default": {"textEncoder": {"timeFormat": "%Q"}}}"#).unwrap();
    let err = Logger::new("it", &configs.default).unwrap_err();
    assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    assert!(err.to_string().contains("%Q"));
}

#[test]
fn test_fan_out_survives_a_failing_sink() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let all_path = temp_dir.path().join("all.log");
    let errors_path = temp_dir.path().join("errors.log");
    let config = Config::new()
        .with_text_encoder(
            TextEncoderConfig::new()
                .with_disable_timestamp(true)
                .with_disable_color(true),
        )
        .with_writer(WriterConfig::multi(vec![
            SinkConfig::new(WriterConfig::custom(Arc::new(BrokenPipe))),
            SinkConfig::new(WriterConfig::file(all_path.display().to_string())),
            SinkConfig::new(WriterConfig::file(errors_path.display().to_string()))
                .with_level(Level::Error),
        ]));
    let logger = Logger::new("it", &config).unwrap();

    logger.info("request served");
    logger.error_with("request failed", values!["status", 502]);

    assert_eq!(
        fs::read_to_string(&all_path).unwrap(),
        "INFO request served\nERRO request failed status=502\n"
    );
    assert_eq!(
        fs::read_to_string(&errors_path).unwrap(),
        "ERRO request failed status=502\n"
    );
    assert_eq!(logger.metrics().write_failures(), 2);
}

const FATAL_CHILD_LOG: &str = "RUST_LOG_ENGINE_FATAL_CHILD_LOG";

#[test]
fn test_fatal_writes_then_exits_with_status_one() {
    if let Ok(path) = std::env::var(FATAL_CHILD_LOG) {
        let config = Config::new()
            .with_text_encoder(
                TextEncoderConfig::new()
                    .with_disable_timestamp(true)
                    .with_disable_color(true),
            )
            .with_writer(WriterConfig::file(path));
        let logger = Logger::new("child", &config).unwrap();
        logger.fatal_with("shutting down", values!["code", 7]);
        logger.info("never written");
        return;
    }

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_path = temp_dir.path().join("fatal.log");
    let output = std::process::Command::new(std::env::current_exe().unwrap())
        .args([
            "test_fatal_writes_then_exits_with_status_one",
            "--exact",
            "--test-threads=1",
        ])
        .env(FATAL_CHILD_LOG, &log_path)
        .output()
        .expect("failed to re-run the test binary");

    assert_eq!(
        output.status.code(),
        Some(1),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        fs::read_to_string(&log_path).unwrap(),
        "FATA shutting down code=7\n"
    );
}

#[test]
fn test_registry_from_json_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_path = temp_dir.path().join("logs").join("db.log");
    let config_path = temp_dir.path().join("logging.json");
    let config = serde_json::json!({
        "default": {"level": "info", "writer": {"type": "discard"}},
        "modules": {
            "db": {
                "level": "debug",
                "encoding": "json",
                "jsonEncoder": {"disableTimestamp": true, "showModuleName": true},
                "writer": {"type": "file", "file": {"path": log_path.display().to_string()}}
            }
        }
    });
    fs::write(&config_path, config.to_string()).unwrap();

    let registry = LoggerRegistry::load(&config_path).unwrap();
    let db = registry.logger("db").unwrap();
    db.debug_with("query", values!["rows", 3]);
    registry.logger("http").unwrap().info("dropped");
    db.flush().unwrap();

    let content = fs::read_to_string(&log_path).unwrap();
    assert_eq!(
        content,
        "{\"level\":\"debug\",\"module\":\"db\",\"message\":\"query\",\"rows\":3}\n"
    );
}

#[test]
fn test_registry_from_yaml_rotate_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_path = temp_dir.path().join("app.log");
    let config_path = temp_dir.path().join("logging.yaml");
    fs::write(
        &config_path,
        format!(
            "default:\n  level: info\n  textEncoder:\n    disableTimestamp: true\n    disableColor: true\n  writer:\n    type: rotateFile\n    rotateFile:\n      filename: {}\n      maxBackups: 2\n",
            log_path.display()
        ),
    )
    .unwrap();

    let registry = LoggerRegistry::load(&config_path).unwrap();
    registry.logger("app").unwrap().info_with("started", values!["pid", 1]);

    assert_eq!(
        fs::read_to_string(&log_path).unwrap(),
        "INFO started pid=1\n"
    );
}

#[test]
fn test_global_registry() {
    let buffer = SharedBuffer::new();
    global::configure(Configs {
        default: Config::new()
            .with_text_encoder(
                TextEncoderConfig::new()
                    .with_disable_timestamp(true)
                    .with_disable_color(true),
            )
            .with_custom_writer(Arc::new(buffer.clone())),
        ..Configs::default()
    });

    global::logger("global").info("hi");
    assert_eq!(buffer.contents_string(), "INFO hi\n");
}

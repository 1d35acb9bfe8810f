//! Global subscriber output. Runs in its own binary because a process can
//! install only one global subscriber.

use std::fs;

use service_common::{LogLevel, LogOutput, ServiceConfig, init_logging};
use test_utils::fixtures::env_reader;

#[test]
fn test_json_file_logging_appends_and_reports_bad_level() {
    let path = std::env::temp_dir().join(format!("service-logging-{}.log", std::process::id()));
    fs::write(&path, "rotated entry from a previous run\n").unwrap();

    let config = ServiceConfig::from_reader(&env_reader(&[
        ("SERVICE_NAME", "notes"),
        ("LOG_LEVEL", "bogus"),
        ("LOG_OUTPUT", path.to_str().unwrap()),
        ("LOG_JSON", "true"),
    ]))
    .unwrap();
    let logging = config.logging();
    assert_eq!(logging.output, LogOutput::File(path.clone()));
    assert!(logging.json_output);

    let handle = init_logging(&logging).unwrap();
    assert_eq!(handle.level(), LogLevel::Error);

    let span = logging.service_span();
    let _entered = span.enter();
    tracing::error!(attempt = 3, "Database unreachable");
    tracing::info!("muted at the fallback level");

    assert_eq!(handle.set_level("INFO").unwrap(), LogLevel::Info);
    tracing::info!("heard after raising the level");

    let written = fs::read_to_string(&path).unwrap();
    fs::remove_file(&path).unwrap();

    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("rotated entry from a previous run"));

    let records: Vec<serde_json::Value> = lines
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let messages: Vec<&str> = records
        .iter()
        .filter_map(|record| record["fields"]["message"].as_str())
        .collect();

    let notice = records
        .iter()
        .find(|record| record["fields"]["message"] == "Unrecognized log level")
        .unwrap();
    assert_eq!(notice["level"], "ERROR");
    assert_eq!(notice["fields"]["level"], "bogus");
    assert_eq!(notice["fields"]["fallback"], "ERROR");

    let event = records
        .iter()
        .find(|record| record["fields"]["message"] == "Database unreachable")
        .unwrap();
    assert_eq!(event["fields"]["attempt"], 3);
    assert_eq!(event["span"]["service"], "notes");

    assert!(messages.contains(&"heard after raising the level"));
    assert!(!messages.contains(&"muted at the fallback level"));
}

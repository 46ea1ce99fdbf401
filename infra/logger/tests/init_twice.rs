use lanebus_logger::{LevelFilter, LogFormat, Logger, LoggerError};
use serial_test::serial;

#[test]
#[serial]
fn init_twice_returns_subscriber_error() {
    Logger::builder()
        .level(LevelFilter::INFO)
        .format(LogFormat::Json)
        .test_writer(true)
        .init()
        .expect("first init should succeed");

    let err = Logger::builder()
        .level(LevelFilter::DEBUG)
        .test_writer(true)
        .init()
        .expect_err("second init should fail");

    assert!(
        matches!(err, LoggerError::Subscriber { .. }),
        "expected subscriber error for second init"
    );
    assert!(err.to_string().contains("Installing global tracing subscriber"));
}

//! Idle watchdog: sessions are reclaimed when clients go quiet, and any
//! command activity pushes the deadline out.

mod common;

use common::{StubDriver, TOUCH_CMD};
use drover::{CoreHolder, Driver};
use serde_json::json;
use std::time::Duration;

async fn start_with_timeout(driver: &StubDriver, timeout_secs: f64) -> String {
    let caps = json!({
        "alwaysMatch": {"platformName": "fake", "newCommandTimeout": timeout_secs}
    });
    let result = driver
        .execute_command("createSession", vec![caps])
        .await
        .expect("session should start");
    result["sessionId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn idle_session_is_torn_down() {
    let driver = StubDriver::new();
    start_with_timeout(&driver, 0.05).await;
    assert!(driver.core().watchdog.is_armed());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        driver.core().session_id().is_none(),
        "watchdog should have deleted the idle session"
    );
    assert!(!driver.core().shutdown.is_latched(), "latch must clear after teardown");
}

#[tokio::test]
async fn activity_postpones_the_deadline() {
    let driver = StubDriver::new();
    start_with_timeout(&driver, 0.2).await;

    // Keep touching the driver well past the configured timeout.
    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(80)).await;
        driver
            .execute_command(TOUCH_CMD, vec![])
            .await
            .expect("active session must stay alive");
    }
    assert!(driver.core().session_id().is_some());

    // Then go quiet and let it fire.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(driver.core().session_id().is_none());
}

#[tokio::test]
async fn zero_timeout_disables_the_watchdog() {
    let driver = StubDriver::new();
    start_with_timeout(&driver, 0.0).await;
    assert!(
        !driver.core().watchdog.is_armed(),
        "a zero timeout must never arm the watchdog"
    );
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(driver.core().session_id().is_some());
}

#[tokio::test]
async fn delete_session_disarms_the_watchdog() {
    let driver = StubDriver::new();
    start_with_timeout(&driver, 5.0).await;
    assert!(driver.core().watchdog.is_armed());
    driver.execute_command("deleteSession", vec![]).await.unwrap();
    assert!(
        !driver.core().watchdog.is_armed(),
        "no timer may survive an explicit session delete"
    );
}

#[tokio::test]
async fn commands_after_idle_teardown_report_shutdown() {
    let driver = StubDriver::new();
    start_with_timeout(&driver, 0.05).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let err = driver.execute_command("getSession", vec![]).await.unwrap_err();
    assert_eq!(err.error_code(), "invalid session id");
}

#[tokio::test]
async fn legacy_command_timeout_rearms_with_new_value() {
    let driver = StubDriver::new();
    start_with_timeout(&driver, 600.0).await;

    driver
        .execute_command("timeouts", vec![json!({"type": "command", "ms": 50})])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        driver.core().session_id().is_none(),
        "the shortened timeout should have fired"
    );
}

#[tokio::test]
async fn watchdog_is_not_armed_without_a_session() {
    let driver = StubDriver::new();
    driver.execute_command("getTimeouts", vec![]).await.unwrap();
    assert!(
        !driver.core().watchdog.is_armed(),
        "no session means nothing to reclaim"
    );
}

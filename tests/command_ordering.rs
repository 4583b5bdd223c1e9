//! Command serialization: one command at a time, strict arrival order,
//! and timing that starts only when a command gets its turn.

mod common;

use common::{start_session, StubDriver, PAUSE_CMD, TOUCH_CMD};
use drover::{CoreHolder, Driver};
use serde_json::json;

#[tokio::test]
async fn commands_never_overlap() {
    let driver = StubDriver::new();
    start_session(&driver).await;
    driver.trace.lock().clear();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let driver = driver.clone();
        handles.push(tokio::spawn(async move {
            driver.execute_command(PAUSE_CMD, vec![json!(10)]).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let trace = driver.trace_snapshot();
    assert_eq!(trace.len(), 8);
    for pair in trace.chunks(2) {
        assert!(
            pair[0].ends_with(":start") && pair[1].ends_with(":end"),
            "command bodies interleaved: {trace:?}"
        );
    }

    // History records must be non-overlapping and ordered.
    let records = driver.core().history.command_records();
    for window in records.windows(2) {
        assert!(
            window[1].start_time >= window[0].end_time,
            "record windows overlap: {:?} then {:?}",
            window[0],
            window[1],
        );
    }
}

#[tokio::test]
async fn queued_commands_run_in_arrival_order() {
    let driver = StubDriver::new();
    start_session(&driver).await;
    driver.trace.lock().clear();

    // Occupy the slot, then queue distinguishable commands behind it.
    let blocker = {
        let driver = driver.clone();
        tokio::spawn(async move { driver.execute_command(PAUSE_CMD, vec![json!(60)]).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let mut handles = Vec::new();
    for ms in [1u64, 2, 3, 4, 5] {
        let driver = driver.clone();
        handles.push(tokio::spawn(async move {
            driver.execute_command(PAUSE_CMD, vec![json!(ms)]).await
        }));
        // Give each submission time to join the queue before the next.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    blocker.await.unwrap().unwrap();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let starts: Vec<String> = driver
        .trace_snapshot()
        .into_iter()
        .filter(|line| line.ends_with(":start"))
        .collect();
    assert_eq!(
        starts,
        vec![
            "pause(60):start",
            "pause(1):start",
            "pause(2):start",
            "pause(3):start",
            "pause(4):start",
            "pause(5):start",
        ],
        "queued commands must run in the order they arrived"
    );
}

#[tokio::test]
async fn history_times_execution_not_submission() {
    let driver = StubDriver::new();
    start_session(&driver).await;

    // A long command, with a short one queued behind it.
    let blocker = {
        let driver = driver.clone();
        tokio::spawn(async move { driver.execute_command(PAUSE_CMD, vec![json!(80)]).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    driver.execute_command(TOUCH_CMD, vec![]).await.unwrap();
    blocker.await.unwrap().unwrap();

    let records = driver.core().history.command_records();
    let pause = records.iter().find(|r| r.cmd == PAUSE_CMD).expect("pause record");
    let touch = records.iter().find(|r| r.cmd == TOUCH_CMD).expect("touch record");
    assert!(
        touch.start_time >= pause.end_time,
        "queued command's startTime must reflect when it ran, not when it was submitted: \
         touch started {} but pause ended {}",
        touch.start_time,
        pause.end_time,
    );
}

#[tokio::test]
async fn a_failing_command_releases_the_slot() {
    let driver = StubDriver::new();
    start_session(&driver).await;

    driver.execute_command("getLog", vec![json!("bogus")]).await.unwrap_err();

    // The next command must not hang on a stuck slot.
    tokio::time::timeout(
        std::time::Duration::from_millis(500),
        driver.execute_command(TOUCH_CMD, vec![]),
    )
    .await
    .expect("slot was not released by the failing command")
    .unwrap();
}

#[tokio::test]
async fn every_command_is_recorded_in_history() {
    let driver = StubDriver::new();
    start_session(&driver).await;
    driver.execute_command(TOUCH_CMD, vec![]).await.unwrap();
    driver.execute_command("getTimeouts", vec![]).await.unwrap();

    let cmds: Vec<String> = driver
        .core()
        .history
        .command_records()
        .into_iter()
        .map(|r| r.cmd)
        .collect();
    assert_eq!(cmds, vec!["createSession", TOUCH_CMD, "getTimeouts"]);
}

#[tokio::test]
async fn failed_commands_are_recorded_too() {
    let driver = StubDriver::new();
    start_session(&driver).await;
    driver.execute_command("getLog", vec![json!("bogus")]).await.unwrap_err();

    let records = driver.core().history.command_records();
    assert!(
        records.iter().any(|r| r.cmd == "getLog"),
        "failures still produce a timing record"
    );
}

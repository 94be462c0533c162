// Unit tests for the crate-private single-flight helper

use crate::flight::SingleFlight;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinError;
use tokio::time::{sleep, timeout};

fn aborted(_: JoinError) -> Result<usize, String> {
    Err("aborted".to_string())
}

/// **VALUE**: Concurrent callers share one execution of the operation.
///
/// **WHY THIS MATTERS**: Launches and consent prompts are coalesced through this helper.
/// Two executions would mean two companion processes or two prompts in front of the user.
///
/// **BUG THIS CATCHES**: Would catch a slot that is filled after the operation starts
/// (check-then-act race), letting a second caller slip in.
#[tokio::test]
async fn given_concurrent_callers_when_running_then_operation_executes_once() {
    // GIVEN: An operation that counts its executions and blocks until released
    let flight = Arc::new(SingleFlight::<Result<usize, String>>::new());
    let executions = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());

    // WHEN: Eight callers run it at the same time
    let mut callers = Vec::new();
    for _ in 0..8 {
        let flight = Arc::clone(&flight);
        let executions = Arc::clone(&executions);
        let release = Arc::clone(&release);
        callers.push(tokio::spawn(async move {
            flight
                .run(
                    move || async move {
                        let n = executions.fetch_add(1, Ordering::SeqCst) + 1;
                        release.notified().await;
                        Ok::<usize, String>(n)
                    },
                    aborted,
                )
                .await
        }));
    }

    sleep(Duration::from_millis(50)).await;
    release.notify_one();

    // THEN: Every caller observes the single execution's outcome
    for caller in callers {
        assert_eq!(caller.await.unwrap(), Ok(1));
    }
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

/// **VALUE**: Dropping the leading caller does not cancel the shared work.
///
/// **BUG THIS CATCHES**: Would catch running the operation inline in the leader's
/// future, where a timed-out leader kills a launch that other callers are waiting on.
#[tokio::test]
async fn given_leader_cancelled_when_follower_waits_then_follower_gets_outcome() {
    // GIVEN: A slow operation started by a leader that gives up early
    let flight = Arc::new(SingleFlight::<Result<usize, String>>::new());
    let executions = Arc::new(AtomicUsize::new(0));

    let operation = |executions: Arc<AtomicUsize>| {
        move || async move {
            executions.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(100)).await;
            Ok::<usize, String>(7)
        }
    };

    let leader = timeout(
        Duration::from_millis(10),
        flight.run(operation(Arc::clone(&executions)), aborted),
    )
    .await;
    assert!(leader.is_err(), "Leader should time out");

    // WHEN: A follower arrives while the work is still running
    let outcome = flight
        .run(operation(Arc::clone(&executions)), aborted)
        .await;

    // THEN: It joins the original execution instead of starting another
    assert_eq!(outcome, Ok(7));
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn given_completed_flight_when_running_again_then_starts_new_execution() {
    let flight = SingleFlight::<Result<usize, String>>::new();

    let first = flight.run(|| async { Ok(1) }, aborted).await;
    sleep(Duration::from_millis(10)).await;
    let second = flight.run(|| async { Ok(2) }, aborted).await;

    assert_eq!(first, Ok(1));
    assert_eq!(second, Ok(2));
    assert!(!flight.in_flight());
}

/// **VALUE**: A panicking operation is reported, not propagated, and frees the slot.
///
/// **BUG THIS CATCHES**: Would catch a slot that stays occupied after a panic, turning
/// every later launch into an immediate replay of the failure.
#[tokio::test]
async fn given_panicking_operation_when_running_then_reports_abort_and_clears_slot() {
    // GIVEN: An operation that panics
    let flight = SingleFlight::<Result<usize, String>>::new();

    // WHEN: Running it
    let outcome = flight
        .run(
            || async {
                let failing = true;
                assert!(!failing, "operation failed");
                Ok::<usize, String>(0)
            },
            aborted,
        )
        .await;

    // THEN: The abort mapping is returned and the slot is free again
    assert_eq!(outcome, Err("aborted".to_string()));
    sleep(Duration::from_millis(10)).await;
    assert!(!flight.in_flight());
}

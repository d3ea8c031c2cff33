// tests/race_behaviour.rs

mod common;
use crate::common::{Behaviour, FakeTriggerSource, init_tracing};

use std::error::Error;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use agentloop::errors::AgentLoopError;
use agentloop::race::{RaceResult, race};
use agentloop::trigger::TriggerSource;

type TestResult = Result<(), Box<dyn Error>>;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn first_fire_wins_and_the_rest_are_cancelled() -> TestResult {
    init_tracing();

    let source = FakeTriggerSource::new(vec![
        ("slow", Behaviour::FireAfter(ms(500))),
        ("fast", Behaviour::FireAfter(ms(50))),
        ("never", Behaviour::Never),
    ]);
    let stats = source.stats();
    let shutdown = CancellationToken::new();

    let result = race(source.instantiate(), &shutdown).await?;

    assert_eq!(
        result,
        RaceResult::Fired {
            index: 1,
            label: "fast".to_string()
        }
    );
    // Every watcher has finished by the time the race returns.
    assert_eq!(stats.started(), 3);
    assert_eq!(stats.finished(), 3);
    assert_eq!(stats.cancelled(), 2);
    assert!(!shutdown.is_cancelled());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn late_fire_is_discarded() -> TestResult {
    init_tracing();

    // "stubborn" ignores cancellation and fires after the winner.
    let source = FakeTriggerSource::new(vec![
        ("winner", Behaviour::FireAfter(ms(10))),
        ("stubborn", Behaviour::FireIgnoringCancel(ms(100))),
    ]);
    let stats = source.stats();

    let result = race(source.instantiate(), &CancellationToken::new()).await?;

    assert_eq!(
        result,
        RaceResult::Fired {
            index: 0,
            label: "winner".to_string()
        }
    );
    assert_eq!(stats.finished(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_the_whole_race() -> TestResult {
    init_tracing();

    let source = FakeTriggerSource::new(vec![("a", Behaviour::Never), ("b", Behaviour::Never)]);
    let stats = source.stats();
    let shutdown = CancellationToken::new();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(ms(200)).await;
        trigger.cancel();
    });

    let result = race(source.instantiate(), &shutdown).await?;

    assert_eq!(result, RaceResult::Cancelled);
    assert_eq!(stats.cancelled(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn aborted_watchers_do_not_end_the_race_while_others_run() -> TestResult {
    init_tracing();

    let source = FakeTriggerSource::new(vec![
        ("broken", Behaviour::AbortAfter(ms(5), "no shell".to_string())),
        ("healthy", Behaviour::FireAfter(ms(300))),
    ]);

    let result = race(source.instantiate(), &CancellationToken::new()).await?;
    assert!(matches!(result, RaceResult::Fired { index: 1, .. }));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn all_watchers_aborting_is_an_error() {
    init_tracing();

    let source = FakeTriggerSource::new(vec![
        ("a", Behaviour::AbortAfter(ms(5), "gone".to_string())),
        ("b", Behaviour::AbortAfter(ms(10), "gone".to_string())),
    ]);

    let err = race(source.instantiate(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentLoopError::AllTriggersFailed));
}

#[tokio::test]
async fn empty_race_is_rejected() {
    let err = race(Vec::new(), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AgentLoopError::NoTriggers));
}

#[tokio::test(start_paused = true)]
async fn every_race_gets_fresh_watchers() -> TestResult {
    init_tracing();

    let source = FakeTriggerSource::new(vec![("only", Behaviour::FireAfter(ms(1)))]);
    let stats = source.stats();
    let shutdown = CancellationToken::new();

    for _ in 0..3 {
        let result = race(source.instantiate(), &shutdown).await?;
        assert!(matches!(result, RaceResult::Fired { index: 0, .. }));
    }

    assert_eq!(stats.started(), 3);
    assert_eq!(source.races().load(std::sync::atomic::Ordering::SeqCst), 3);
    Ok(())
}

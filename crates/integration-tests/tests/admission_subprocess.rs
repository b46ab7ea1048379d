//! Admission queue driving real child processes

#![cfg(unix)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use netdiag_core::application::{AdmissionConfig, AdmissionQueue, CommandRequest, ResultSink};
use netdiag_core::domain::Invocation;
use netdiag_core::port::time_provider::SystemTimeProvider;
use netdiag_core::port::ExecutionError;
use netdiag_infra_system::SubprocessExecutor;

fn queue(config: AdmissionConfig) -> AdmissionQueue {
    let executor = SubprocessExecutor::new(
        Arc::new(SystemTimeProvider),
        vec!["PATH".to_string()],
    )
    .with_kill_grace(config.kill_grace);
    AdmissionQueue::new(Arc::new(executor), config).unwrap()
}

fn sh(script: &str) -> Invocation {
    Invocation::new("sh").args(["-c", script])
}

/// Six 200ms commands behind a ceiling of two take three waves
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ceiling_holds_for_real_processes() {
    let queue = queue(AdmissionConfig::new(2));
    let started = Instant::now();

    let receivers: Vec<_> = (0..6)
        .map(|i| {
            let (request, rx) =
                CommandRequest::with_channel(sh(&format!("sleep 0.2; echo run-{}", i)));
            queue.submit(request);
            rx
        })
        .collect();
    assert_eq!(queue.stats().pending, 4);

    let mut peak_active = 0;
    while !queue.stats().is_idle() {
        peak_active = peak_active.max(queue.stats().active);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for (i, rx) in receivers.into_iter().enumerate() {
        let result = rx.await.unwrap().unwrap();
        assert_eq!(result.stdout.trim(), format!("run-{}", i));
    }

    assert!(peak_active <= 2, "peak active was {}", peak_active);
    assert!(started.elapsed() >= Duration::from_millis(600));
    assert_eq!(queue.stats().completed_total, 6);
}

#[tokio::test]
async fn test_failed_process_frees_capacity() {
    let queue = queue(AdmissionConfig::new(1));

    let (first, first_rx) = CommandRequest::with_channel(sh("echo 'no route to host' >&2; exit 7"));
    let (second, second_rx) = CommandRequest::with_channel(Invocation::new("echo").arg("second"));
    queue.submit(first);
    queue.submit(second);

    match first_rx.await.unwrap() {
        Err(ExecutionError::NonZeroExit { code, stderr }) => {
            assert_eq!(code, Some(7));
            assert_eq!(stderr.trim(), "no route to host");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(second_rx.await.unwrap().unwrap().stdout.trim(), "second");

    queue.wait_idle().await;
    let stats = queue.stats();
    assert_eq!(stats.failed_total, 1);
    assert_eq!(stats.completed_total, 2);
}

#[tokio::test]
async fn test_timed_out_process_is_killed_and_waiter_runs() {
    let config = AdmissionConfig::new(1)
        .with_command_timeout(Duration::from_millis(200))
        .with_kill_grace(Duration::from_millis(100));
    let queue = queue(config);
    let started = Instant::now();

    let (slow, slow_rx) = CommandRequest::with_channel(Invocation::new("sleep").arg("30"));
    let (next, next_rx) = CommandRequest::with_channel(Invocation::new("echo").arg("next"));
    queue.submit(slow);
    queue.submit(next);

    assert_eq!(slow_rx.await.unwrap(), Err(ExecutionError::Timeout(200)));
    assert_eq!(next_rx.await.unwrap().unwrap().stdout.trim(), "next");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_missing_binary_reports_spawn_failure() {
    let queue = queue(AdmissionConfig::new(1));
    let outcome = queue
        .run(Invocation::new("netdiag-no-such-tool").arg("example.com"))
        .await
        .unwrap();
    assert!(matches!(outcome, Err(ExecutionError::SpawnFailed(_))));
    assert!(queue.stats().is_idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_delivers_every_outcome_once() {
    let queue = queue(AdmissionConfig::new(3));
    let delivered = Arc::new(AtomicUsize::new(0));

    for _ in 0..20 {
        let delivered = Arc::clone(&delivered);
        let sink = ResultSink::from_fn(move |outcome| {
            if outcome.is_ok() {
                delivered.fetch_add(1, Ordering::SeqCst);
            }
        });
        queue.submit(CommandRequest::new(Invocation::new("true"), sink));
    }

    queue.wait_idle().await;
    assert_eq!(delivered.load(Ordering::SeqCst), 20);
    assert_eq!(queue.stats().dispatched_total, 20);
}

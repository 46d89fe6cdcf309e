//! Tests for supervised calls.

use portgate_cache::ClientCacheConfig;
use portgate_error::RateLimitError;
use portgate_limiter::{
    CallError, CallSupervisor, Classifier, ErrorFactory, Invocation, LimiterConfig, Namespace,
    SupervisorConfig,
};
use serde_json::{Value as JsonValue, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type Supervisor = CallSupervisor<String, JsonValue>;

fn limits(
    max_attempts: u32,
    max_repeat_attempts: u32,
    delay_ms: u64,
    capacity: usize,
) -> LimiterConfig {
    LimiterConfig::default()
        .with_max_attempts(max_attempts)
        .with_max_repeat_attempts(max_repeat_attempts)
        .with_check_delay_ms(delay_ms)
        .with_max_one_time_req(capacity)
}

fn supervisor(limits: LimiterConfig) -> Supervisor {
    CallSupervisor::new(SupervisorConfig::new(limits, Classifier::forbidden_status())).unwrap()
}

fn forbidden() -> JsonValue {
    json!({"statusCode": 403, "message": "quota"})
}

#[test]
fn test_invalid_limits_are_rejected() {
    let result = CallSupervisor::<String, JsonValue>::new(SupervisorConfig::new(
        limits(3, 1, 10, 0),
        Classifier::never(),
    ));
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_success_releases_slot() {
    let supervisor = supervisor(limits(3, 1, 10, 2));

    let value = supervisor
        .call("drive", |invocation| async move { Ok(invocation.args * 2) }, 21)
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_plain_failure_is_returned_without_retry() {
    let supervisor = supervisor(limits(3, 1, 10, 2));
    let runs = AtomicUsize::new(0);

    let err = supervisor
        .call(
            "drive",
            |_invocation| {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(json!({"statusCode": 500})) }
            },
            (),
        )
        .await
        .unwrap_err();

    assert_eq!(err.as_operation(), Some(&json!({"statusCode": 500})));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 0);
}

#[tokio::test]
async fn test_panic_releases_slot() {
    let supervisor = Arc::new(supervisor(limits(3, 1, 10, 1)));

    let task = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            supervisor
                .call(
                    "drive",
                    |_invocation| async {
                        if true {
                            panic!("operation blew up");
                        }
                        Ok::<(), JsonValue>(())
                    },
                    (),
                )
                .await
        })
    };

    let joined = task.await;
    assert!(joined.unwrap_err().is_panic());
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_call_releases_slot() {
    let supervisor = supervisor(limits(3, 1, 10, 1));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        supervisor.call(
            "drive",
            |_invocation| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<(), JsonValue>(())
            },
            (),
        ),
    )
    .await;

    assert!(abandoned.is_err());
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_saturated_port_exhausts_without_running() {
    let supervisor = supervisor(limits(3, 1, 10, 1));
    supervisor.gate(Namespace::Request).acquire("drive");
    let runs = AtomicUsize::new(0);

    let start = Instant::now();
    let err = supervisor
        .call(
            "drive",
            |_invocation| {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), JsonValue>(()) }
            },
            (),
        )
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(err.is_exhausted());
    assert_eq!(
        err.as_admission().and_then(|e| e.rate_limit_error()),
        Some(&RateLimitError::default())
    );
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(elapsed >= Duration::from_millis(30) && elapsed < Duration::from_millis(40));
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_error_factory_reaches_caller() {
    let config = SupervisorConfig::new(limits(1, 1, 10, 1), Classifier::forbidden_status())
        .with_error_factory(ErrorFactory::new(|| {
            RateLimitError::new("DRIVE_BUSY", "Drive is busy", 429)
        }));
    let supervisor: Supervisor = CallSupervisor::new(config).unwrap();
    supervisor.gate(Namespace::Request).acquire("drive");

    let err = supervisor
        .call("drive", |_invocation| async { Ok::<(), JsonValue>(()) }, ())
        .await
        .unwrap_err();

    let rate_limit = err.as_admission().and_then(|e| e.rate_limit_error()).cloned();
    assert_eq!(rate_limit.map(|e| e.name), Some("DRIVE_BUSY".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_call_is_retried_once() {
    let supervisor = supervisor(limits(3, 1, 10, 1));
    let runs = AtomicUsize::new(0);

    let value = supervisor
        .call(
            "drive",
            |invocation| {
                let run = runs.fetch_add(1, Ordering::SeqCst);
                async move {
                    if run == 0 {
                        Err(forbidden())
                    } else {
                        Ok(format!("listed {}", invocation.args))
                    }
                }
            },
            "root",
        )
        .await
        .unwrap();

    assert_eq!(value, "listed root");
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_rate_limit_runs_twice_then_fails() {
    let supervisor = supervisor(limits(3, 1, 10, 1));
    let runs = AtomicUsize::new(0);

    let err = supervisor
        .call(
            "drive",
            |_invocation| {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(forbidden()) }
            },
            (),
        )
        .await
        .unwrap_err();

    assert_eq!(err.into_operation().ok(), Some(forbidden()));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_uses_reduced_budget() {
    // The classifier refills the port right after the failed run releases it, so
    // the retry has to wait out its whole reduced budget.
    let handle: Arc<OnceLock<Weak<Supervisor>>> = Arc::new(OnceLock::new());
    let classifier = {
        let handle = Arc::clone(&handle);
        Classifier::new(move |_failure: &JsonValue| {
            if let Some(supervisor) = handle.get().and_then(Weak::upgrade) {
                supervisor.gate(Namespace::Request).acquire("drive");
            }
            true
        })
    };
    let supervisor: Arc<Supervisor> = Arc::new(
        CallSupervisor::new(SupervisorConfig::new(limits(10, 2, 10, 1), classifier)).unwrap(),
    );
    handle.set(Arc::downgrade(&supervisor)).unwrap();
    let runs = AtomicUsize::new(0);

    let start = Instant::now();
    let err = supervisor
        .call(
            "drive",
            |_invocation| {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(forbidden()) }
            },
            (),
        )
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(err.is_exhausted());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(
        elapsed >= Duration::from_millis(20) && elapsed < Duration::from_millis(30),
        "waited {:?}",
        elapsed
    );

    supervisor.gate(Namespace::Request).release("drive");
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_caller_waits_for_first() {
    let supervisor = supervisor(limits(3, 1, 10, 1));
    let start = Instant::now();

    let slow = |invocation: Invocation<&'static str, String>| async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        Ok::<_, JsonValue>((invocation.args, Instant::now()))
    };

    let (first, second) = tokio::join!(
        supervisor.call("drive", slow, "a"),
        supervisor.call("drive", slow, "b"),
    );

    let (first, first_done) = first.unwrap();
    let (second, second_done) = second.unwrap();
    assert_eq!((first, second), ("a", "b"));
    assert!(first_done - start >= Duration::from_millis(15));
    // Admitted on the 20ms poll, after the first call freed the slot at 15ms
    assert!(second_done - start >= Duration::from_millis(35));
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_caller_gives_up_on_small_budget() {
    let supervisor = supervisor(limits(1, 1, 10, 1));

    let slow = |_invocation: Invocation<(), String>| async {
        tokio::time::sleep(Duration::from_millis(25)).await;
        Ok::<(), JsonValue>(())
    };

    let (first, second) = tokio::join!(
        supervisor.call("drive", slow, ()),
        supervisor.call("drive", slow, ()),
    );

    assert!(first.is_ok());
    assert!(second.unwrap_err().is_exhausted());
}

#[tokio::test(start_paused = true)]
async fn test_ports_do_not_share_slots() {
    let supervisor = supervisor(limits(1, 1, 10, 1));
    supervisor.gate(Namespace::Request).acquire("drive");

    let result = supervisor
        .call("gmail", |_invocation| async { Ok::<_, JsonValue>("sent") }, ())
        .await;
    assert_eq!(result.ok(), Some("sent"));
}

#[tokio::test(start_paused = true)]
async fn test_client_is_injected() {
    let supervisor = supervisor(limits(3, 1, 10, 2));

    let before = supervisor
        .call("drive", |invocation| async move { Ok::<_, JsonValue>(invocation.client) }, ())
        .await
        .unwrap();
    assert_eq!(before, None);

    supervisor.set_client("drive", "token-abc".to_string());
    assert!(supervisor.has_client("drive"));
    let after = supervisor
        .call("drive", |invocation| async move { Ok::<_, JsonValue>(invocation.client) }, ())
        .await
        .unwrap();
    assert_eq!(after.as_deref(), Some("token-abc"));

    supervisor.clients().remove_client("drive");
    assert_eq!(supervisor.client("drive"), None);
}

#[tokio::test(start_paused = true)]
async fn test_invocation_merges_client_under_configured_field() {
    let supervisor = supervisor(limits(3, 1, 10, 2).with_client_field_name("auth".to_string()));
    supervisor.set_client("drive", "token-abc".to_string());

    let merged = supervisor
        .call(
            "drive",
            |invocation| async move {
                assert_eq!(invocation.client_field(), "auth");
                Ok::<_, JsonValue>(invocation.to_json())
            },
            json!({"fileId": "f-1"}),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merged, json!({"fileId": "f-1", "auth": "token-abc"}));

    let unit = supervisor
        .call("drive", |invocation| async move { Ok::<_, JsonValue>(invocation.to_json()) }, ())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unit, json!({"auth": "token-abc"}));

    let scalar = supervisor
        .call("drive", |invocation| async move { Ok::<_, JsonValue>(invocation.to_json()) }, 7)
        .await
        .unwrap();
    assert!(scalar.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_background_slots_are_separate() {
    let supervisor = supervisor(limits(2, 1, 10, 1));

    supervisor.acquire_key("drive").await.unwrap();
    assert_eq!(supervisor.in_flight(Namespace::Background, "drive"), 1);
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 0);

    let call = supervisor
        .call("drive", |_invocation| async { Ok::<_, JsonValue>(1) }, ())
        .await;
    assert_eq!(call.ok(), Some(1));

    let start = Instant::now();
    let second = supervisor.acquire_key("drive").await;
    assert!(second.unwrap_err().is_exhausted());
    assert!(start.elapsed() >= Duration::from_millis(20));
    assert_eq!(supervisor.in_flight(Namespace::Background, "drive"), 1);

    supervisor.release_key("drive");
    assert_eq!(supervisor.in_flight(Namespace::Background, "drive"), 0);
    supervisor.release_key("drive");
    assert_eq!(supervisor.in_flight(Namespace::Background, "drive"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_waiting_call() {
    let supervisor = supervisor(limits(100, 1, 10, 1));
    supervisor.gate(Namespace::Request).acquire("drive");
    let cancel = CancellationToken::new();
    let runs = AtomicUsize::new(0);

    let (result, _) = tokio::join!(
        supervisor.call_with_cancel(
            "drive",
            |_invocation| {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), JsonValue>(()) }
            },
            (),
            &cancel,
        ),
        async {
            tokio::time::sleep(Duration::from_millis(25)).await;
            cancel.cancel();
        }
    );

    assert!(matches!(result, Err(CallError::Admission(ref e)) if e.is_cancelled()));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(supervisor.in_flight(Namespace::Request, "drive"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_background_acquire() {
    let supervisor = supervisor(limits(100, 1, 10, 1));
    supervisor.acquire_key("drive").await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = supervisor.acquire_key_with_cancel("drive", &cancel).await;
    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(supervisor.in_flight(Namespace::Background, "drive"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_per_port_data() {
    let supervisor = supervisor(limits(3, 1, 10, 1));

    supervisor.set_data("drive", "pageToken", json!("p-2"), None);
    assert_eq!(supervisor.data("drive", "pageToken"), Some(json!("p-2")));
    assert_eq!(supervisor.data("gmail", "pageToken"), None);

    supervisor.set_data("drive", "etag", json!(7), Some(Duration::from_secs(1)));
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(supervisor.data("drive", "etag"), None);
    assert_eq!(supervisor.data("drive", "pageToken"), Some(json!("p-2")));
}

fn expiring_limits(ttl_secs: u64, check_period_secs: u64) -> LimiterConfig {
    limits(3, 1, 10, 1).with_cache(
        ClientCacheConfig::default()
            .with_std_ttl_secs(Some(ttl_secs))
            .with_check_period_secs(check_period_secs),
    )
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_purges_expired_port_data() {
    let supervisor = supervisor(expiring_limits(10, 1));
    assert!(supervisor.is_sweeping());
    assert!(!supervisor.start_sweeper());

    for index in 0..100 {
        supervisor.set_data("drive", &format!("page-{}", index), json!(index), None);
    }
    supervisor.set_client("drive", "token-abc".to_string());

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(supervisor.clients().purge_expired(), 0);
    assert!(!supervisor.has_client("drive"));
}

#[tokio::test]
async fn test_sweeper_needs_ttl_and_period() {
    let no_ttl = supervisor(limits(3, 1, 10, 1));
    assert!(!no_ttl.is_sweeping());
    assert!(!no_ttl.start_sweeper());

    let no_period = supervisor(expiring_limits(10, 0));
    assert!(!no_period.is_sweeping());
}

#[test]
fn test_supervisor_outside_runtime_skips_sweeper() {
    let supervisor = supervisor(expiring_limits(10, 1));
    assert!(!supervisor.is_sweeping());
    assert!(!supervisor.start_sweeper());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_supervisor_stops_sweeper() {
    let supervisor = supervisor(expiring_limits(10, 1));
    let clients = Arc::clone(supervisor.clients());
    clients.set_data("drive", "page", json!(1), None);
    drop(supervisor);

    tokio::time::sleep(Duration::from_secs(60)).await;

    // Nothing swept once the supervisor is gone
    assert_eq!(clients.purge_expired(), 1);
}

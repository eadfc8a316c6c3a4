//! End-to-end breaker scenarios driven through the public async API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use overcurrent::{Breaker, BreakerConfig, State};
use overcurrent_testing::{FlakyService, ManualClock, Unavailable, init_tracing};

fn guarded(name: &str, clock: &Arc<ManualClock>) -> Arc<Breaker> {
    init_tracing();
    Breaker::with_clock(BreakerConfig::new(name), clock.clone()).unwrap()
}

/// Half-failing traffic until the breaker opens: ten calls at 50% failure.
async fn trip(breaker: &Breaker, service: &FlakyService) {
    for i in 0..10 {
        let _ = breaker.execute(service.call(i % 2 == 0)).await;
    }
    assert_eq!(breaker.state(), State::Open);
}

#[tokio::test]
async fn steady_success_stays_closed() {
    let clock = ManualClock::arc();
    let breaker = guarded("steady", &clock);
    let service = FlakyService::arc();

    for _ in 0..10 {
        assert!(breaker.execute(service.ok()).await.is_ok());
    }

    assert_eq!(breaker.state(), State::Closed);
    assert_eq!(service.calls(), 10);
    assert_eq!(breaker.metrics().successes(), 10);
}

#[tokio::test]
async fn half_failing_flood_trips_and_rejects() {
    let clock = ManualClock::arc();
    let breaker = guarded("flood", &clock);
    let service = FlakyService::arc();

    let mut rejected = 0;
    for i in 0..100 {
        let out = breaker.execute(service.call(i % 2 == 0)).await;
        if let Err(err) = out {
            if err.is_open() {
                rejected += 1;
            }
        }
    }

    // The tenth sample puts the window at 5 of 10 failures, exactly the
    // threshold; everything after is rejected without reaching the service.
    assert_eq!(breaker.state(), State::Open);
    assert_eq!(service.calls(), 10);
    assert_eq!(rejected, 90);
    assert_eq!(breaker.metrics().rejections(), 90);
}

#[tokio::test]
async fn probes_reclose_after_the_sleep_window() {
    let clock = ManualClock::arc();
    let breaker = guarded("recovery", &clock);
    let service = FlakyService::arc();
    trip(&breaker, &service).await;

    // The first call at exactly open_until is admitted as a probe.
    clock.set(65);
    assert!(breaker.execute(service.ok()).await.is_ok());
    assert_eq!(breaker.state(), State::HalfOpen);

    for _ in 1..20 {
        assert!(breaker.execute(service.ok()).await.is_ok());
    }
    assert_eq!(breaker.state(), State::Closed);

    // Recovered traffic flows normally again.
    assert!(breaker.execute(service.ok()).await.is_ok());
    assert_eq!(breaker.state(), State::Closed);
}

#[tokio::test]
async fn failing_probes_reopen_and_keep_rejecting() {
    let clock = ManualClock::arc();
    let breaker = guarded("retrip", &clock);
    let service = FlakyService::arc();
    trip(&breaker, &service).await;

    clock.set(66);
    for _ in 0..20 {
        let out = breaker.execute(service.fail()).await;
        assert!(matches!(
            out,
            Err(overcurrent::BreakerError::Service(Unavailable))
        ));
    }
    assert_eq!(breaker.state(), State::Open);

    // The sleep window was refreshed from the re-trip, so the next call
    // inside it is rejected without reaching the service.
    let admitted = service.calls();
    clock.set(100);
    let out = breaker.execute(service.ok()).await;
    assert!(out.unwrap_err().is_open());
    assert_eq!(service.calls(), admitted);

    // And once the refreshed window elapses, probing resumes.
    clock.set(66 + 65);
    assert!(breaker.execute(service.ok()).await.is_ok());
    assert_eq!(breaker.state(), State::HalfOpen);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn half_open_admits_exactly_the_probe_budget() {
    let clock = ManualClock::arc();
    let breaker = guarded("probe-budget", &clock);
    let service = FlakyService::arc();
    trip(&breaker, &service).await;
    clock.set(65);

    let (release, _) = tokio::sync::watch::channel(false);
    let release = Arc::new(release);
    let started = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let breaker = breaker.clone();
        let started = started.clone();
        let rejected = rejected.clone();
        let mut gate = release.subscribe();
        tasks.push(tokio::spawn(async move {
            let out = breaker
                .execute(async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    // Hold the probe open so the episode cannot finish
                    // before every caller has been admitted or rejected.
                    while !*gate.borrow_and_update() {
                        gate.changed().await.unwrap();
                    }
                    Ok::<_, Unavailable>(())
                })
                .await;
            if let Err(err) = out {
                assert!(err.is_open());
                rejected.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    while rejected.load(Ordering::SeqCst) < 80 {
        tokio::task::yield_now().await;
    }
    release.send(true).unwrap();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(started.load(Ordering::SeqCst), 20);
    assert_eq!(rejected.load(Ordering::SeqCst), 80);
    // All twenty probes succeeded, so the episode closed the breaker.
    assert_eq!(breaker.state(), State::Closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_shares_one_breaker() {
    let tasks: Vec<_> = (0..16)
        .map(|_| {
            tokio::spawn(async {
                overcurrent::execute("shared-first-use", async { Ok::<_, Unavailable>(()) }).await
            })
        })
        .collect();
    for outcome in futures::future::join_all(tasks).await {
        assert!(outcome.unwrap().is_ok());
    }

    // Every call landed on the same instance.
    let breaker = overcurrent::registry::get("shared-first-use").unwrap();
    assert_eq!(breaker.metrics().successes(), 16);
    assert!(Arc::ptr_eq(
        &breaker,
        &overcurrent::registry::get("shared-first-use").unwrap()
    ));
}

#[tokio::test]
async fn fallback_sees_exactly_what_the_caller_gets() {
    let service = FlakyService::arc();

    let mut seen = None;
    let out = overcurrent::execute_with_fallback("fallback-e2e", service.fail(), |err| {
        seen = Some(err.to_string());
    })
    .await;
    assert!(matches!(
        out,
        Err(overcurrent::BreakerError::Service(Unavailable))
    ));
    assert_eq!(seen.as_deref(), Some("downstream unavailable"));
}

#[tokio::test]
async fn registered_policy_drives_the_named_entry_point() {
    let registered = BreakerConfig::new("policy-e2e")
        .with_interval(40)
        .with_probe_max(25)
        .register()
        .unwrap();
    assert_eq!(registered.config().interval_secs, 40);
    // 40 < default sleep window, so the floor keeps the configured value.
    assert_eq!(registered.config().sleep_window_secs, 65);

    assert!(
        overcurrent::execute("policy-e2e", async { Ok::<_, Unavailable>(()) })
            .await
            .is_ok()
    );
    assert_eq!(registered.metrics().successes(), 1);
}

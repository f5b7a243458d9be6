//! Retry envelope timing and classification.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use omni::error::OmniError;
use omni::util::retry::RetryPolicy;
use tokio::time::Instant;

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_millis(1500),
        multiplier: 2.0,
        ..Default::default()
    }
}

/// Run `policy` over an operation that fails with `make_err` every time,
/// returning the instant of each attempt.
async fn attempts_for<F>(policy: &RetryPolicy, make_err: F) -> (Vec<Instant>, OmniError)
where
    F: Fn() -> OmniError,
{
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let err = policy
        .execute(|| {
            attempts.lock().unwrap().push(Instant::now());
            let err = make_err();
            async move { Err::<(), _>(err) }
        })
        .await
        .unwrap_err();
    let attempts = attempts.lock().unwrap().clone();
    (attempts, err)
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_then_caps() {
    let (attempts, err) =
        attempts_for(&policy(), || OmniError::ConnectionFailure("refused".into())).await;

    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[1] - attempts[0], Duration::from_secs(1));
    assert_eq!(attempts[2] - attempts[1], Duration::from_millis(1500));
    assert!(matches!(err, OmniError::ConnectionFailure(_)));
}

#[tokio::test(start_paused = true)]
async fn retryable_statuses_are_retried() {
    let (attempts, _) = attempts_for(&policy(), || OmniError::RateLimited {
        retry_after_ms: None,
    })
    .await;
    assert_eq!(attempts.len(), 3);

    let (attempts, _) = attempts_for(&policy(), || OmniError::api(503, "unavailable")).await;
    assert_eq!(attempts.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn authentication_failure_is_attempted_once() {
    let (attempts, err) =
        attempts_for(&policy(), || OmniError::Authentication("bad key".into())).await;
    assert_eq!(attempts.len(), 1);
    assert!(matches!(err, OmniError::Authentication(_)));
}

#[tokio::test(start_paused = true)]
async fn malformed_response_is_attempted_once() {
    let (attempts, _) =
        attempts_for(&policy(), || OmniError::MalformedResponse("no choices".into())).await;
    assert_eq!(attempts.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_status_is_attempted_once() {
    let (attempts, err) = attempts_for(&policy(), || OmniError::api(400, "bad request")).await;
    assert_eq!(attempts.len(), 1);
    assert_eq!(err.status(), Some(400));
}

#[tokio::test(start_paused = true)]
async fn success_after_transient_failure() {
    let calls = Arc::new(Mutex::new(0u32));
    let start = Instant::now();
    let value = policy()
        .execute(|| {
            let calls = calls.clone();
            async move {
                let mut n = calls.lock().unwrap();
                *n += 1;
                if *n < 2 {
                    Err(OmniError::api(500, "boom"))
                } else {
                    Ok("answer")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "answer");
    assert_eq!(*calls.lock().unwrap(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

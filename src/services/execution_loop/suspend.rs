//! Guarded suspension points.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of awaiting a collaborator under a timeout and a cancel signal.
#[derive(Debug)]
pub(crate) enum Suspended<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

/// Await `future`, giving up after `limit` or as soon as `cancel` fires.
///
/// Cancellation wins ties so a cancelled request never starts new work.
pub(crate) async fn guarded<F>(future: F, limit: Duration, cancel: &CancellationToken) -> Suspended<F::Output>
where
    F: Future,
{
    if cancel.is_cancelled() {
        return Suspended::Cancelled;
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Suspended::Cancelled,
        result = tokio::time::timeout(limit, future) => match result {
            Ok(value) => Suspended::Done(value),
            Err(_) => Suspended::TimedOut,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes() {
        let cancel = CancellationToken::new();
        let result = guarded(async { 7 }, Duration::from_secs(1), &cancel).await;
        assert!(matches!(result, Suspended::Done(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let cancel = CancellationToken::new();
        let slow = tokio::time::sleep(Duration::from_secs(60));
        let result = guarded(slow, Duration::from_secs(1), &cancel).await;
        assert!(matches!(result, Suspended::TimedOut));
    }

    #[tokio::test]
    async fn test_cancel_aborts_wait() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let result = guarded(std::future::pending::<()>(), Duration::from_secs(30), &cancel).await;
        assert!(matches!(result, Suspended::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = guarded(async { 1 }, Duration::from_secs(1), &cancel).await;
        assert!(matches!(result, Suspended::Cancelled));
    }
}

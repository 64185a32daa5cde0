use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

// ============================================================================
// CancellationToken - Structured Cancellation With Deadlines
// ============================================================================

/// Cooperative cancellation signal shared between a caller and an
/// execution.
///
/// Clones share one signal: cancelling any clone cancels them all. A
/// deadline is attached per-clone via [`CancellationToken::with_deadline`],
/// so "operation with timeout" is the same primitive as explicit
/// cancellation. It serves both process timeouts and the registry's
/// bounded registration wait.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// A token that never fires until [`CancellationToken::cancel`] is
    /// called.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            deadline: None,
        }
    }

    /// A clone of this token that additionally fires once `timeout` has
    /// elapsed. The shared explicit signal is unaffected.
    #[must_use]
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) => Some(existing.min(candidate)),
            None => Some(candidate),
        };
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            deadline,
        }
    }

    /// Fire the shared cancellation signal.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether this token has fired (explicitly or by deadline).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Wait until this token fires. Pends forever on a token with no
    /// deadline that is never cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let explicit = async move {
            loop {
                if *rx.borrow() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender dropped without firing; only the deadline can
                    // complete us now.
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = explicit => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => explicit.await,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_propagates_to_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_on_explicit_cancel() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_deadline_fires_without_explicit_cancel() {
        let token = CancellationToken::new().with_deadline(Duration::from_millis(30));
        let started = Instant::now();
        token.cancelled().await;
        assert!(started.elapsed() >= Duration::from_millis(25));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_shrinks_never_grows() {
        let token = CancellationToken::new()
            .with_deadline(Duration::from_millis(20))
            .with_deadline(Duration::from_secs(60));
        let started = Instant::now();
        token.cancelled().await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_deadline_does_not_cancel_shared_signal() {
        let base = CancellationToken::new();
        let bounded = base.with_deadline(Duration::from_millis(10));
        bounded.cancelled().await;
        assert!(!base.is_cancelled());
    }
}

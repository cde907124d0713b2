//! Generic ordered-fallback resource acquisition.
//!
//! A caller supplies an ordered list of named strategies; [`acquire`] runs
//! them one at a time and returns the first result the caller's usability
//! check accepts. Unusable results are dropped before the next strategy
//! runs, so at most one resource is live at any time. Exhaustion produces a
//! [`FallbackError`] naming every strategy and why it failed.

use futures::future::BoxFuture;
use std::future::Future;

/// One named way of producing a resource of type `R`.
pub struct FallbackStrategy<'a, R> {
    name: String,
    attempt: Box<dyn FnOnce() -> BoxFuture<'a, anyhow::Result<R>> + Send + 'a>,
}

impl<'a, R> FallbackStrategy<'a, R> {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'a,
    {
        Self {
            name: name.into(),
            attempt: Box::new(move || Box::pin(f())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Why one strategy did not yield a usable resource.
#[derive(Debug)]
pub struct AttemptFailure {
    pub strategy: String,
    pub error: String,
}

/// Every strategy was tried and none produced a usable resource.
#[derive(Debug)]
pub struct FallbackError {
    pub attempts: Vec<AttemptFailure>,
}

impl std::fmt::Display for FallbackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "all {} strategies failed: ", self.attempts.len())?;
        for (i, attempt) in self.attempts.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} ({})", attempt.strategy, attempt.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for FallbackError {}

/// Try `strategies` in order and return the first result that passes
/// `usable`. A produced-but-unusable resource is dropped before the next
/// strategy runs.
pub async fn acquire<'a, R>(
    strategies: Vec<FallbackStrategy<'a, R>>,
    usable: impl Fn(&R) -> bool,
) -> Result<R, FallbackError> {
    let mut attempts = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let name = strategy.name;
        tracing::debug!(strategy = %name, "trying acquisition strategy");
        match (strategy.attempt)().await {
            Ok(resource) => {
                if usable(&resource) {
                    tracing::debug!(strategy = %name, "acquisition strategy succeeded");
                    return Ok(resource);
                }
                drop(resource);
                tracing::debug!(strategy = %name, "strategy produced unusable resource");
                attempts.push(AttemptFailure {
                    strategy: name,
                    error: "produced unusable resource".into(),
                });
            }
            Err(e) => {
                tracing::debug!(strategy = %name, error = %format!("{e:#}"), "acquisition strategy failed");
                attempts.push(AttemptFailure {
                    strategy: name,
                    error: format!("{e:#}"),
                });
            }
        }
    }
    Err(FallbackError { attempts })
}

/// [`acquire`] with every produced resource accepted as usable.
pub async fn acquire_any<'a, R>(
    strategies: Vec<FallbackStrategy<'a, R>>,
) -> Result<R, FallbackError> {
    acquire(strategies, |_| true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_strategies_tried_in_order_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mk = |calls: Arc<AtomicUsize>, outcome: anyhow::Result<u32>| {
            FallbackStrategy::new("s", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                outcome
            })
        };
        let strategies = vec![
            mk(calls.clone(), Err(anyhow!("one"))),
            mk(calls.clone(), Err(anyhow!("two"))),
            mk(calls.clone(), Ok(42)),
        ];
        let result = acquire_any(strategies).await.unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_short_circuits_remaining_strategies() {
        let later = Arc::new(AtomicUsize::new(0));
        let later2 = later.clone();
        let strategies = vec![
            FallbackStrategy::new("first", || async { Ok(1u32) }),
            FallbackStrategy::new("second", move || async move {
                later2.fetch_add(1, Ordering::SeqCst);
                Ok(2u32)
            }),
        ];
        assert_eq!(acquire_any(strategies).await.unwrap(), 1);
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_names_every_strategy() {
        let strategies: Vec<FallbackStrategy<'_, u32>> = vec![
            FallbackStrategy::new("alpha", || async { Err(anyhow!("boom a")) }),
            FallbackStrategy::new("beta", || async { Err(anyhow!("boom b")) }),
        ];
        let err = acquire_any(strategies).await.unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        let msg = err.to_string();
        assert!(msg.contains("all 2 strategies failed"));
        assert!(msg.contains("alpha (boom a)"));
        assert!(msg.contains("beta (boom b)"));
    }

    #[tokio::test]
    async fn test_unusable_resource_is_dropped_before_next_attempt() {
        struct Guard(Arc<AtomicUsize>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let d1 = drops.clone();
        let d2 = drops.clone();
        let strategies = vec![
            FallbackStrategy::new("empty", move || async move { Ok((Guard(d1), 0usize)) }),
            FallbackStrategy::new("full", move || async move { Ok((Guard(d2), 3usize)) }),
        ];
        let drops_seen = drops.clone();
        let (guard, count) = acquire(strategies, move |(_, n)| {
            // The first strategy's guard must already be gone when the
            // second result is checked.
            if *n > 0 {
                assert_eq!(drops_seen.load(Ordering::SeqCst), 1);
            }
            *n > 0
        })
        .await
        .unwrap();
        assert_eq!(count, 3);
        drop(guard);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }
}

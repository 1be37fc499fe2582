//! Thread-safe walk state handle (spec §4.3).
//!
//! An `Arc<RwLock<_>>`-guarded accumulator shared across every worker
//! driving the same walk, so readers (progress checks) don't block on
//! writers unnecessarily and every mutation sees a consistent snapshot.

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, thread-safe handle to a walk's accumulated state.
pub struct WalkState<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> Clone for WalkState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> WalkState<S> {
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Read-only access via a closure under a read lock.
    pub async fn access<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let guard = self.inner.read().await;
        f(&guard)
    }

    /// Mutate via a closure under a write lock.
    pub async fn modify(&self, f: impl FnOnce(&mut S)) {
        let mut guard = self.inner.write().await;
        f(&mut guard);
    }

    /// Compare-and-swap: re-check `will_modify` under the write lock before
    /// applying `modify`, so a racing writer cannot invalidate the
    /// precondition between the check and the mutation. The spec notes the
    /// guard may be invoked more than once (spec §4.3); here it is invoked
    /// exactly once, but always under the same lock acquisition as the
    /// mutation, which is what makes the composition safe under
    /// concurrent callers.
    pub async fn compare_and_swap(
        &self,
        will_modify: impl Fn(&S) -> bool,
        modify: impl FnOnce(&mut S),
    ) -> bool {
        let mut guard = self.inner.write().await;
        if !will_modify(&guard) {
            return false;
        }
        modify(&mut guard);
        true
    }

    pub async fn into_inner(self) -> S
    where
        S: Clone,
    {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn compare_and_swap_only_applies_when_predicate_holds() {
        let state = WalkState::new(std::collections::HashSet::<u32>::new());
        let applied = state
            .compare_and_swap(|set| !set.contains(&1), |set| {
                set.insert(1);
            })
            .await;
        assert!(applied);
        let applied_again = state
            .compare_and_swap(|set| !set.contains(&1), |set| {
                set.insert(1);
            })
            .await;
        assert!(!applied_again);
        assert_eq!(state.access(|set| set.len()).await, 1);
    }
}

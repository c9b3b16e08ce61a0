//! Lazily-populated registry of engine handles
//!
//! Engines are expensive to construct, so each mode's engine is built on
//! first acquisition and cached for the life of the process. The registry
//! lock is held across construction: a concurrent acquire for the same
//! mode waits and then observes the Ready handle instead of building a
//! duplicate.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::engine::{Engine, EngineError, EngineFactory, ModeId};

/// Construction state of a pooled handle. Absent from the registry means
/// the engine has never been requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Loading,
    Ready,
    Failed,
}

struct Slot {
    lifecycle: Lifecycle,
    engine: Option<Arc<dyn Engine>>,
}

pub struct ResourcePool {
    factory: Arc<dyn EngineFactory>,
    slots: Mutex<HashMap<ModeId, Slot>>,
}

impl ResourcePool {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get the engine for `mode`, constructing it on first use.
    ///
    /// A Ready handle is returned unchanged, with no duplicate side
    /// effects. A Failed slot is retried.
    pub async fn acquire(&self, mode: ModeId) -> Result<Arc<dyn Engine>, EngineError> {
        let mut slots = self.slots.lock().await;

        if let Some(slot) = slots.get(&mode) {
            match slot.lifecycle {
                Lifecycle::Ready => {
                    if let Some(engine) = &slot.engine {
                        return Ok(Arc::clone(engine));
                    }
                }
                Lifecycle::Failed => {
                    info!(%mode, "previous construction failed, retrying");
                }
                Lifecycle::Loading => {}
            }
        }

        info!(%mode, "constructing engine");
        slots.insert(
            mode,
            Slot {
                lifecycle: Lifecycle::Loading,
                engine: None,
            },
        );

        // Construction is blocking work (process launches, warm-up runs),
        // so it goes to the blocking pool; the registry lock stays held.
        let factory = Arc::clone(&self.factory);
        let built = tokio::task::spawn_blocking(move || factory.build(mode))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?;

        match built {
            Ok(engine) => {
                slots.insert(
                    mode,
                    Slot {
                        lifecycle: Lifecycle::Ready,
                        engine: Some(Arc::clone(&engine)),
                    },
                );
                info!(%mode, "engine ready");
                Ok(engine)
            }
            Err(e) => {
                warn!(%mode, err = %e, "engine construction failed");
                slots.insert(
                    mode,
                    Slot {
                        lifecycle: Lifecycle::Failed,
                        engine: None,
                    },
                );
                Err(e)
            }
        }
    }

    /// Tear down every cached engine, invoking its clean-up operation.
    /// Failures are logged and never fatal.
    pub async fn release_all(&self) {
        let mut slots = self.slots.lock().await;
        for (mode, slot) in slots.drain() {
            let Some(engine) = slot.engine else { continue };
            info!(%mode, "releasing engine");
            match tokio::task::spawn_blocking(move || engine.clean_up()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%mode, err = %e, "engine clean-up failed"),
                Err(e) => warn!(%mode, ?e, "engine clean-up panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeEngine {
        mode: ModeId,
        cleaned: AtomicUsize,
        fail_clean: bool,
    }

    impl FakeEngine {
        fn new(mode: ModeId, fail_clean: bool) -> Self {
            Self {
                mode,
                cleaned: AtomicUsize::new(0),
                fail_clean,
            }
        }
    }

    impl Engine for FakeEngine {
        fn mode(&self) -> ModeId {
            self.mode
        }
        fn start(&self) -> Result<(), EngineError> {
            Ok(())
        }
        fn stop(&self) -> Result<(), EngineError> {
            Ok(())
        }
        fn is_busy(&self) -> bool {
            false
        }
        fn clean_up(&self) -> Result<(), EngineError> {
            self.cleaned.fetch_add(1, Ordering::SeqCst);
            if self.fail_clean {
                Err(EngineError::NotRunning)
            } else {
                Ok(())
            }
        }
    }

    struct FakeFactory {
        builds: AtomicUsize,
        fail_next: AtomicBool,
        fail_clean: bool,
        made: std::sync::Mutex<Vec<Arc<FakeEngine>>>,
    }

    impl FakeFactory {
        fn new() -> Arc<Self> {
            Self::with_failing_clean_up(false)
        }

        fn with_failing_clean_up(fail_clean: bool) -> Arc<Self> {
            Arc::new(Self {
                builds: AtomicUsize::new(0),
                fail_next: AtomicBool::new(false),
                fail_clean,
                made: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    impl EngineFactory for FakeFactory {
        fn build(&self, mode: ModeId) -> Result<Arc<dyn Engine>, EngineError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(EngineError::EmptyCommand);
            }
            let engine = Arc::new(FakeEngine::new(mode, self.fail_clean));
            self.made.lock().unwrap().push(Arc::clone(&engine));
            Ok(engine)
        }
    }

    #[tokio::test]
    async fn test_acquire_is_idempotent() {
        let factory = FakeFactory::new();
        let pool = ResourcePool::new(factory.clone());

        let first = pool.acquire(ModeId::Realtime).await.unwrap();
        let second = pool.acquire(ModeId::Realtime).await.unwrap();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_modes_get_distinct_engines() {
        let factory = FakeFactory::new();
        let pool = ResourcePool::new(factory.clone());

        let realtime = pool.acquire(ModeId::Realtime).await.unwrap();
        let longform = pool.acquire(ModeId::Longform).await.unwrap();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
        assert_eq!(realtime.mode(), ModeId::Realtime);
        assert_eq!(longform.mode(), ModeId::Longform);
    }

    #[tokio::test]
    async fn test_failed_construction_is_retried() {
        let factory = FakeFactory::new();
        factory.fail_next.store(true, Ordering::SeqCst);
        let pool = ResourcePool::new(factory.clone());

        assert!(pool.acquire(ModeId::Static).await.is_err());
        assert!(pool.acquire(ModeId::Static).await.is_ok());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_release_all_cleans_and_empties() {
        let factory = FakeFactory::new();
        let pool = ResourcePool::new(factory.clone());

        pool.acquire(ModeId::Longform).await.unwrap();
        pool.release_all().await;

        let made = factory.made.lock().unwrap().clone();
        assert_eq!(made.len(), 1);
        assert_eq!(made[0].cleaned.load(Ordering::SeqCst), 1);

        // The registry is empty again; the next acquire reconstructs.
        pool.acquire(ModeId::Longform).await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clean_up_failure_is_not_fatal() {
        let factory = FakeFactory::with_failing_clean_up(true);
        let pool = ResourcePool::new(factory.clone());

        pool.acquire(ModeId::Realtime).await.unwrap();
        pool.acquire(ModeId::Static).await.unwrap();

        // Both clean-ups run even though each reports an error.
        pool.release_all().await;
        let made = factory.made.lock().unwrap().clone();
        assert_eq!(made.len(), 2);
        for engine in made {
            assert_eq!(engine.cleaned.load(Ordering::SeqCst), 1);
        }
    }
}

//! # Controller
//!
//! Runs one kind: watch streams feed the work queue, a pool of workers drains
//! it through the rate limiter into the reconciler.
//!
//! Each reconcile gets a child of the shutdown token that is also cancelled
//! when the reconcile deadline passes. The reconciler decides what still runs
//! to completion after cancellation.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{Action, ReconcilerError};
use crate::observability::metrics;
use crate::runtime::error_policy::error_policy;
use crate::runtime::queue::WorkQueue;
use crate::runtime::rate_limiter::TokenBucket;
use crate::runtime::Reconcile;
use futures::StreamExt;
use kube::api::Api;
use kube::Resource;
use kube_runtime::{watcher, WatchStreamExt};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// Workers for one kind
pub struct Controller {
    reconciler: Arc<dyn Reconcile>,
    queue: Arc<WorkQueue>,
    limiter: Arc<TokenBucket>,
    workers: usize,
    reconcile_timeout: Duration,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("kind", &self.reconciler.kind())
            .field("workers", &self.workers)
            .field("reconcile_timeout", &self.reconcile_timeout)
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(
        reconciler: Arc<dyn Reconcile>,
        limiter: Arc<TokenBucket>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            reconciler,
            queue: Arc::new(WorkQueue::new(
                config.backoff_base_duration(),
                config.backoff_max_duration(),
            )),
            limiter,
            workers: config.max_concurrent_reconciles.max(1),
            reconcile_timeout: config.reconcile_timeout(),
        }
    }

    pub fn queue(&self) -> Arc<WorkQueue> {
        Arc::clone(&self.queue)
    }

    /// Run workers until `shutdown` fires, then wait for in-flight reconciles
    pub async fn run(self, shutdown: CancellationToken) {
        let kind = self.reconciler.kind();
        info!("Starting {} workers for {}", self.workers, kind);

        let handles: Vec<_> = (0..self.workers)
            .map(|id| {
                let reconciler = Arc::clone(&self.reconciler);
                let queue = Arc::clone(&self.queue);
                let limiter = Arc::clone(&self.limiter);
                let shutdown = shutdown.clone();
                let timeout = self.reconcile_timeout;
                tokio::spawn(
                    worker(reconciler, queue, limiter, timeout, shutdown)
                        .instrument(tracing::debug_span!("controller.worker", kind, id)),
                )
            })
            .collect();

        shutdown.cancelled().await;
        info!("Shutting down {} workers", kind);
        self.queue.shutdown();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("{} worker panicked: {}", kind, e);
            }
        }
    }
}

async fn worker(
    reconciler: Arc<dyn Reconcile>,
    queue: Arc<WorkQueue>,
    limiter: Arc<TokenBucket>,
    timeout: Duration,
    shutdown: CancellationToken,
) {
    let kind = reconciler.kind();
    while let Some(key) = queue.get().await {
        tokio::select! {
            () = limiter.acquire() => {}
            () = shutdown.cancelled() => {
                queue.done(&key);
                break;
            }
        }

        let result = reconcile_once(reconciler.as_ref(), &key, timeout, &shutdown).await;
        let action = match &result {
            Ok(action) => {
                queue.forget(&key);
                *action
            }
            Err(e) => error_policy(kind, &key, e, reconciler.poll_interval()),
        };
        schedule(&queue, kind, &key, action);
        queue.done(&key);
        metrics::set_queue_depth(kind, queue.len());
    }
}

/// Run one reconcile with a deadline
///
/// When the deadline passes the token is cancelled and the reconcile is
/// awaited until it returns.
pub async fn reconcile_once(
    reconciler: &dyn Reconcile,
    key: &str,
    timeout: Duration,
    shutdown: &CancellationToken,
) -> Result<Action, ReconcilerError> {
    let kind = reconciler.kind();
    let token = shutdown.child_token();
    let start = Instant::now();
    metrics::increment_reconciliations(kind);

    let reconcile = reconciler.reconcile(key, token.clone());
    tokio::pin!(reconcile);
    let result = tokio::select! {
        result = &mut reconcile => result,
        () = tokio::time::sleep(timeout) => {
            warn!(
                resource.kind = kind,
                resource.name = key,
                "Reconcile exceeded {:?}, cancelling",
                timeout
            );
            token.cancel();
            reconcile.await
        }
    };
    token.cancel();

    metrics::observe_reconciliation_duration(kind, start.elapsed().as_secs_f64());
    result
}

/// Put `key` back on the queue according to `action`
pub fn schedule(queue: &WorkQueue, kind: &str, key: &str, action: Action) {
    metrics::increment_requeues_total(kind, action.reason());
    match action {
        Action::RequeueAfter(delay) => {
            debug!(resource.kind = kind, resource.name = key, "Next reconcile in {:?}", delay);
            queue.add_after(key, delay);
        }
        Action::Backoff => {
            let delay = queue.add_rate_limited(key);
            debug!(
                resource.kind = kind,
                resource.name = key,
                "Backing off for {:?} (failures: {})",
                delay,
                queue.failures(key)
            );
        }
        Action::Immediately => queue.add(key),
        Action::AwaitChange => {}
        Action::Forget => queue.forget(key),
    }
}

/// Decides which watch events represent a change of desired state
///
/// First sight, a new generation or a change of the deletion timestamp
/// qualify; status-only writes do not.
#[derive(Debug, Default)]
pub struct DesiredStateFilter {
    seen: HashMap<String, (Option<i64>, bool)>,
}

impl DesiredStateFilter {
    pub fn should_enqueue(&mut self, name: &str, generation: Option<i64>, deleting: bool) -> bool {
        let current = (generation, deleting);
        self.seen
            .insert(name.to_string(), current)
            .is_none_or(|previous| previous != current)
    }

    pub fn remove(&mut self, name: &str) {
        self.seen.remove(name);
    }
}

/// Feed `queue` with desired-state changes of `K`
pub async fn watch_desired_state<K>(api: Api<K>, queue: Arc<WorkQueue>, shutdown: CancellationToken)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let mut filter = DesiredStateFilter::default();
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);

    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => break,
            event = stream.next() => event,
        };
        let Some(event) = event else {
            warn!("Watch stream ended");
            break;
        };
        match event {
            Ok(watcher::Event::Apply(obj) | watcher::Event::InitApply(obj)) => {
                let meta = obj.meta();
                let Some(name) = meta.name.as_deref() else {
                    continue;
                };
                if filter.should_enqueue(name, meta.generation, meta.deletion_timestamp.is_some()) {
                    debug!(resource.name = name, "Desired state changed, queueing");
                    queue.add(name);
                }
            }
            Ok(watcher::Event::Delete(obj)) => {
                if let Some(name) = obj.meta().name.as_deref() {
                    filter.remove(name);
                    queue.forget(name);
                }
            }
            Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
            Err(e) => {
                warn!("Watch error: {}", e);
            }
        }
    }
}

/// Feed `queue` with the key `map` derives from every change of `K`
pub async fn watch_mapped<K, F>(
    api: Api<K>,
    queue: Arc<WorkQueue>,
    shutdown: CancellationToken,
    map: F,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    F: Fn(&K) -> Option<String> + Send,
{
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);

    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => break,
            event = stream.next() => event,
        };
        let Some(event) = event else {
            warn!("Watch stream ended");
            break;
        };
        match event {
            Ok(
                watcher::Event::Apply(obj)
                | watcher::Event::InitApply(obj)
                | watcher::Event::Delete(obj),
            ) => {
                if let Some(key) = map(&obj) {
                    queue.add(&key);
                }
            }
            Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
            Err(e) => {
                warn!("Watch error: {}", e);
            }
        }
    }
}

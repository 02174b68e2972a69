// Leader election state machine: jittered startup, periodic lease
// acquisition/renewal, best-effort revocation on shutdown.
//
// One elector runs per process replica. All coordination goes through the
// LeaseStore; replicas never talk to each other. Store failures are handled
// conservatively: any error inside an election cycle resolves to Follower,
// never to Leader.

use crate::{config::ElectorConfig, store::LeaseStore, Error, Result};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Elects one leader among equivalent process replicas through a shared
/// TTL key-value store.
///
/// After [`start`](Elector::start), a single worker task waits out a
/// randomized startup delay, then runs one election cycle immediately and
/// one per `check_interval` thereafter. Cycles run strictly sequentially,
/// so a slow store call never overlaps the next cycle.
///
/// Consumers gate singleton work behind [`is_leader`](Elector::is_leader)
/// and must treat `false` as "do not run".
#[derive(Debug)]
pub struct Elector {
    inner: Arc<Inner>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

#[derive(Debug)]
struct Inner {
    instance_id: String,
    config: ElectorConfig,
    store: Arc<dyn LeaseStore>,
    is_leader: RwLock<bool>,
}

#[derive(Debug)]
struct Lifecycle {
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl Elector {
    /// Create an elector with a fresh instance id.
    ///
    /// Fails with [`Error::InvalidConfig`] if the config violates the timing
    /// invariants (see [`ElectorConfig::validate`]).
    pub fn new(store: Arc<dyn LeaseStore>, config: ElectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                instance_id: Uuid::new_v4().to_string(),
                config,
                store,
                is_leader: RwLock::new(false),
            }),
            lifecycle: Mutex::new(None),
        })
    }

    /// Begin participating in the election.
    ///
    /// Returns immediately; the jittered delay and all election cycles run
    /// on a spawned worker task. Fails with [`Error::AlreadyStarted`] if the
    /// elector is already running. An elector stopped with
    /// [`stop`](Elector::stop) may be started again.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let initial_delay =
            jittered_delay(self.inner.config.min_initial_delay, self.inner.config.max_initial_delay);
        debug!(
            "starting leader election, instance {}, initial delay {:?}",
            self.inner.instance_id, initial_delay
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run_worker(self.inner.clone(), shutdown_rx, initial_delay));
        *lifecycle = Some(Lifecycle {
            shutdown: shutdown_tx,
            worker,
        });
        Ok(())
    }

    /// Stop participating in the election.
    ///
    /// Halts the pending startup timer and the cycle loop, waits for an
    /// in-flight cycle to finish its store calls, and forces the local
    /// leadership flag to `false`. If this instance believed it was leader,
    /// it then makes one best-effort attempt to delete the lease record so
    /// a peer can take over without waiting out the TTL. Revoke failures
    /// are logged, not returned. Idempotent.
    pub async fn stop(&self) {
        let Some(lifecycle) = self.lifecycle.lock().take() else {
            return;
        };

        let _ = lifecycle.shutdown.send(true);
        if let Err(err) = lifecycle.worker.await {
            warn!("election worker did not shut down cleanly: {}", err);
        }

        // Force the local flag down regardless of what the revoke does
        let was_leader = self.inner.swap_leader(false);
        if !was_leader {
            debug!("not the leader, nothing to revoke");
            return;
        }

        if let Err(err) = self.inner.revoke().await {
            warn!("failed to revoke leadership on shutdown: {}", err);
        }
    }

    /// Whether this instance currently believes it is the leader.
    ///
    /// `false` before [`start`](Elector::start) has won a lease and after
    /// [`stop`](Elector::stop). Cheap; callable from any task.
    pub fn is_leader(&self) -> bool {
        *self.inner.is_leader.read()
    }

    /// This process's opaque instance id, constant for the elector's
    /// lifetime.
    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }
}

/// Randomized startup delay in `[min, max)`, or exactly `min` when the
/// bounds coincide. Desynchronizes replicas that boot simultaneously so
/// they do not all race for the lock at t=0.
fn jittered_delay(min: Duration, max: Duration) -> Duration {
    let spread_ms = max.saturating_sub(min).as_millis() as u64;
    if spread_ms == 0 {
        return min;
    }
    let offset_ms = rand::rng().random_range(0..spread_ms);
    min + Duration::from_millis(offset_ms)
}

/// Single worker driving all election cycles for one elector, strictly in
/// sequence. Exits when the shutdown signal fires or the elector is dropped.
async fn run_worker(
    inner: Arc<Inner>,
    mut shutdown: watch::Receiver<bool>,
    initial_delay: Duration,
) {
    tokio::select! {
        _ = shutdown.changed() => {
            debug!("shutdown before initial delay elapsed");
            return;
        }
        _ = sleep(initial_delay) => {}
    }
    debug!(
        "initial delay completed ({:?}), starting election cycles",
        initial_delay
    );

    let mut ticker = interval(inner.config.check_interval);
    // A slow cycle pushes the following tick out instead of bunching ticks up
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // The first tick completes immediately, so the first cycle runs as
        // soon as the jitter window closes rather than one interval later
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {}
        }
        if *shutdown.borrow() {
            return;
        }
        inner.run_cycle().await;
    }
}

impl Inner {
    async fn run_cycle(&self) {
        let started = Instant::now();

        if *self.is_leader.read() {
            debug!("instance is leader, renewing lease");
            match self.renew().await {
                Ok(true) => debug!("leadership renewed"),
                Ok(false) => {
                    info!("lost leadership, instance {}", self.instance_id);
                    self.swap_leader(false);
                }
                Err(err) => {
                    error!("failed to renew leadership: {}", err);
                    self.swap_leader(false);
                }
            }
        } else {
            debug!("instance is not leader, attempting acquisition");
            match self.try_acquire().await {
                Ok(true) => {
                    info!("acquired leadership, instance {}", self.instance_id);
                    self.swap_leader(true);
                }
                Ok(false) => debug!("lease held elsewhere, staying follower"),
                Err(err) => error!("failed to attempt leadership: {}", err),
            }
        }

        debug!("election cycle completed in {:?}", started.elapsed());
    }

    /// Try to take the lease. Returns `Ok(true)` only when the verification
    /// read confirms our id ended up in the store.
    async fn try_acquire(&self) -> Result<bool> {
        if let Some(holder) = self.read_holder().await? {
            debug!("lease currently held by {}", holder);
            return Ok(false);
        }

        self.write_holder().await?;

        // The write is an unconditional upsert, so re-read to detect a
        // racing writer that landed after us. Narrows the race window,
        // cannot close it without store-side compare-and-swap.
        let holder = self.read_holder().await?;
        Ok(holder.as_deref() == Some(self.instance_id.as_str()))
    }

    /// Extend the lease TTL. Returns `Ok(false)` without writing if another
    /// instance has overtaken the lease in the meantime; writing here would
    /// resurrect a leadership we already lost.
    async fn renew(&self) -> Result<bool> {
        match self.read_holder().await? {
            Some(holder) if holder == self.instance_id => {}
            other => {
                debug!("lease holder is now {:?}, not renewing", other);
                return Ok(false);
            }
        }

        self.write_holder().await?;
        Ok(true)
    }

    /// Best-effort removal of our lease record on shutdown.
    async fn revoke(&self) -> Result<()> {
        debug!("revoking leadership, instance {}", self.instance_id);

        // Only delete a record we still own; deleting someone else's fresh
        // lease would force an extra failover. A failed read does not block
        // the delete, the record is ours as far as we know.
        match self.read_holder().await {
            Ok(Some(holder)) if holder == self.instance_id => {}
            Ok(current) => {
                warn!(
                    "no longer the lease holder (current: {:?}), skipping revoke",
                    current
                );
                return Ok(());
            }
            Err(err) => warn!(
                "could not verify holder before revoke, deleting anyway: {}",
                err
            ),
        }

        self.store
            .delete_holder(&self.config.namespace, &self.config.lock_key)
            .await?;

        // Confirm the delete took; a surviving record means a peer must wait
        // out the TTL before taking over
        match self.read_holder().await {
            Ok(None) => debug!("leadership revoked, lease record removed"),
            Ok(Some(holder)) => {
                warn!("lease record still present after revoke, holder {}", holder)
            }
            Err(err) => warn!("could not verify revocation: {}", err),
        }
        Ok(())
    }

    async fn read_holder(&self) -> Result<Option<String>> {
        self.store
            .read_holder(&self.config.namespace, &self.config.lock_key)
            .await
    }

    async fn write_holder(&self) -> Result<()> {
        self.store
            .write_holder(
                &self.config.namespace,
                &self.config.lock_key,
                &self.instance_id,
                self.config.lease_timeout,
            )
            .await
    }

    /// Swap the leadership flag, returning the previous value.
    fn swap_leader(&self, flag: bool) -> bool {
        let mut guard = self.is_leader.write();
        let previous = *guard;
        *guard = flag;
        previous
    }
}

//! One-shot delayed activation.
//!
//! [`OneShotTrigger`] schedules a job to run once after a delay. Arming an
//! already armed or already fired trigger does nothing, so activation is
//! idempotent.
//!
//! A trigger built with [`OneShotTrigger::with_schedule_lock`] also holds a
//! lease in the job lock table while it is armed, so a second process
//! activating the same purge sees it as already scheduled. The lease outlives
//! the delay by [`SCHEDULE_GRACE`]; a process that dies while armed frees the
//! schedule once it expires.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::{DbResult, JobLockRepo};

/// How long a schedule lease outlives the trigger delay.
pub const SCHEDULE_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Armed,
    Fired,
}

/// Result of [`OneShotTrigger::arm`].
///
/// The handle resolves to `Some(output)` when the job ran and `None` when the
/// trigger was cancelled before firing.
#[derive(Debug)]
pub enum ArmOutcome<T> {
    Armed(JoinHandle<Option<T>>),
    AlreadyArmed,
    AlreadyFired,
}

#[derive(Clone)]
struct ScheduleLock {
    locks: Arc<dyn JobLockRepo>,
    name: String,
    holder: String,
}

impl ScheduleLock {
    async fn release(&self) {
        match self.locks.release(&self.name, &self.holder).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(lock = %self.name, "Schedule lease was no longer held"),
            Err(e) => tracing::warn!(lock = %self.name, error = %e, "Failed to release schedule lease"),
        }
    }
}

#[derive(Clone)]
pub struct OneShotTrigger {
    state: Arc<Mutex<TriggerState>>,
    schedule: Option<ScheduleLock>,
}

impl Default for OneShotTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl OneShotTrigger {
    /// A trigger guarded within this process only.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TriggerState::Idle)),
            schedule: None,
        }
    }

    /// A trigger that also takes the lease `name` in `locks` while armed.
    pub fn with_schedule_lock(locks: Arc<dyn JobLockRepo>, name: impl Into<String>) -> Self {
        Self {
            schedule: Some(ScheduleLock {
                locks,
                name: name.into(),
                holder: Uuid::new_v4().to_string(),
            }),
            ..Self::new()
        }
    }

    pub fn state(&self) -> TriggerState {
        *lock(&self.state)
    }

    /// Run `job` once after `delay`.
    ///
    /// Cancelling `cancel` before the delay elapses returns the trigger to
    /// idle without running the job. Once the job has started, cancellation
    /// is the job's own concern. The schedule lease, if any, is released
    /// when the trigger fires or is cancelled.
    pub async fn arm<F, Fut, T>(
        &self,
        delay: Duration,
        cancel: CancellationToken,
        job: F,
    ) -> DbResult<ArmOutcome<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        {
            let mut state = lock(&self.state);
            match *state {
                TriggerState::Armed => return Ok(ArmOutcome::AlreadyArmed),
                TriggerState::Fired => return Ok(ArmOutcome::AlreadyFired),
                TriggerState::Idle => *state = TriggerState::Armed,
            }
        }

        if let Some(schedule) = &self.schedule {
            let acquired = schedule
                .locks
                .try_acquire(&schedule.name, &schedule.holder, delay + SCHEDULE_GRACE)
                .await;
            match acquired {
                Ok(true) => {}
                Ok(false) => {
                    *lock(&self.state) = TriggerState::Idle;
                    tracing::info!(lock = %schedule.name, "Purge already scheduled elsewhere");
                    return Ok(ArmOutcome::AlreadyArmed);
                }
                Err(e) => {
                    *lock(&self.state) = TriggerState::Idle;
                    return Err(e);
                }
            }
        }

        tracing::info!(delay_secs = delay.as_secs(), "Purge scheduled");

        let state = Arc::clone(&self.state);
        let schedule = self.schedule.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    *lock(&state) = TriggerState::Idle;
                    if let Some(schedule) = &schedule {
                        schedule.release().await;
                    }
                    tracing::info!("Scheduled purge cancelled before it started");
                    None
                }
                _ = tokio::time::sleep(delay) => {
                    *lock(&state) = TriggerState::Fired;
                    if let Some(schedule) = &schedule {
                        schedule.release().await;
                    }
                    Some(job().await)
                }
            }
        });

        Ok(ArmOutcome::Armed(handle))
    }
}

fn lock(state: &Mutex<TriggerState>) -> MutexGuard<'_, TriggerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicU32, Ordering},
    };

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    /// Lease table on the tokio clock, so paused-time tests can expire leases.
    #[derive(Default)]
    struct MemoryLocks {
        leases: Mutex<HashMap<String, (String, Instant)>>,
    }

    impl MemoryLocks {
        fn holder(&self, name: &str) -> Option<String> {
            let leases = self.leases.lock().unwrap();
            leases
                .get(name)
                .filter(|(_, expires)| *expires > Instant::now())
                .map(|(holder, _)| holder.clone())
        }
    }

    #[async_trait]
    impl JobLockRepo for MemoryLocks {
        async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> DbResult<bool> {
            let mut leases = self.leases.lock().unwrap();
            let now = Instant::now();
            if leases.get(name).is_some_and(|(_, expires)| *expires > now) {
                return Ok(false);
            }
            leases.insert(name.to_string(), (holder.to_string(), now + ttl));
            Ok(true)
        }

        async fn renew(&self, name: &str, holder: &str, ttl: Duration) -> DbResult<bool> {
            let mut leases = self.leases.lock().unwrap();
            match leases.get_mut(name) {
                Some(lease) if lease.0 == holder => {
                    lease.1 = Instant::now() + ttl;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn release(&self, name: &str, holder: &str) -> DbResult<bool> {
            let mut leases = self.leases.lock().unwrap();
            if leases.get(name).is_some_and(|(h, _)| h == holder) {
                leases.remove(name);
                return Ok(true);
            }
            Ok(false)
        }
    }

    const DELAY: Duration = Duration::from_secs(20);
    const SCHEDULE: &str = "product_purge:schedule";

    async fn arm_counter(trigger: &OneShotTrigger, runs: &Arc<AtomicU32>) -> ArmOutcome<u32> {
        let counter = Arc::clone(runs);
        trigger
            .arm(DELAY, CancellationToken::new(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst)
            })
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let trigger = OneShotTrigger::new();
        let runs = Arc::new(AtomicU32::new(0));

        let ArmOutcome::Armed(handle) = arm_counter(&trigger, &runs).await else {
            panic!("first arm should succeed");
        };
        assert_eq!(trigger.state(), TriggerState::Armed);

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(handle.await.unwrap(), Some(0));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(trigger.state(), TriggerState::Fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_arm_is_ignored() {
        let trigger = OneShotTrigger::new();
        let runs = Arc::new(AtomicU32::new(0));

        let ArmOutcome::Armed(handle) = arm_counter(&trigger, &runs).await else {
            panic!("first arm should succeed");
        };
        assert!(matches!(
            arm_counter(&trigger, &runs).await,
            ArmOutcome::AlreadyArmed
        ));

        handle.await.unwrap();
        assert!(matches!(
            arm_counter(&trigger, &runs).await,
            ArmOutcome::AlreadyFired
        ));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_fire_returns_to_idle() {
        let trigger = OneShotTrigger::new();
        let cancel = CancellationToken::new();

        let ArmOutcome::Armed(handle) = trigger
            .arm(DELAY, cancel.clone(), || async { "ran" })
            .await
            .unwrap()
        else {
            panic!("first arm should succeed");
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(trigger.state(), TriggerState::Idle);

        let ArmOutcome::Armed(handle) = trigger
            .arm(DELAY, CancellationToken::new(), || async { "ran" })
            .await
            .unwrap()
        else {
            panic!("idle trigger should re-arm");
        };
        assert_eq!(handle.await.unwrap(), Some("ran"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_lease_shared_between_processes() {
        let locks = Arc::new(MemoryLocks::default());
        let first = OneShotTrigger::with_schedule_lock(locks.clone(), SCHEDULE);
        let second = OneShotTrigger::with_schedule_lock(locks.clone(), SCHEDULE);
        let runs = Arc::new(AtomicU32::new(0));

        let ArmOutcome::Armed(handle) = arm_counter(&first, &runs).await else {
            panic!("first arm should succeed");
        };
        assert!(locks.holder(SCHEDULE).is_some());

        assert!(matches!(
            arm_counter(&second, &runs).await,
            ArmOutcome::AlreadyArmed
        ));
        assert_eq!(second.state(), TriggerState::Idle);

        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(locks.holder(SCHEDULE), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_schedule_lease() {
        let locks = Arc::new(MemoryLocks::default());
        let trigger = OneShotTrigger::with_schedule_lock(locks.clone(), SCHEDULE);
        let cancel = CancellationToken::new();

        let ArmOutcome::Armed(handle) = trigger
            .arm(DELAY, cancel.clone(), || async {})
            .await
            .unwrap()
        else {
            panic!("first arm should succeed");
        };
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(locks.holder(SCHEDULE), None);

        let other = OneShotTrigger::with_schedule_lock(locks.clone(), SCHEDULE);
        let runs = Arc::new(AtomicU32::new(0));
        assert!(matches!(
            arm_counter(&other, &runs).await,
            ArmOutcome::Armed(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_schedule_expires() {
        let locks = Arc::new(MemoryLocks::default());
        assert!(
            locks
                .try_acquire(SCHEDULE, "crashed-host", DELAY + SCHEDULE_GRACE)
                .await
                .unwrap()
        );

        let trigger = OneShotTrigger::with_schedule_lock(locks.clone(), SCHEDULE);
        let runs = Arc::new(AtomicU32::new(0));
        assert!(matches!(
            arm_counter(&trigger, &runs).await,
            ArmOutcome::AlreadyArmed
        ));

        tokio::time::sleep(DELAY + SCHEDULE_GRACE).await;

        let ArmOutcome::Armed(handle) = arm_counter(&trigger, &runs).await else {
            panic!("expired schedule should be taken over");
        };
        assert_eq!(handle.await.unwrap(), Some(0));
    }
}

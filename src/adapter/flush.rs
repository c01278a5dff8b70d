//! Flush timers
//!
//! One scheduler per queue kind, each running the same small state
//! machine: `Idle` (timer disabled) → `Armed` (due at T+interval) →
//! `Firing` (drain + upload) → back to `Idle`, or straight to `Armed`
//! when new work arrived while firing. Timers are armed on demand by the
//! enqueue paths; an idle queue causes no wake-ups at all.
//!
//! The flush closure owns the drain-and-upload cycle, including the
//! empty-drain skip guard; errors inside it surface as warnings on its
//! aggregate result, never as a scheduler crash.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::shared::ShutdownSignal;

/// Observable timer state for one queue kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTimerState {
    Idle,
    Armed,
    Firing,
}

/// What one flush cycle did
#[derive(Debug, Clone, Copy)]
pub struct FlushOutcome {
    /// Items drained in this cycle (0 means the skip guard fired)
    pub drained: usize,
    /// Request an immediate re-arm without a fresh enqueue (e.g. a lock
    /// timeout left the queue untouched)
    pub rearm: bool,
}

impl FlushOutcome {
    pub fn empty() -> Self {
        Self {
            drained: 0,
            rearm: false,
        }
    }
}

/// Schedule-on-demand flush timer for one queue kind.
pub struct FlushScheduler {
    name: &'static str,
    interval: Duration,
    armed: Notify,
    state: AtomicU8,
}

impl FlushScheduler {
    pub fn new(name: &'static str, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            interval,
            armed: Notify::new(),
            state: AtomicU8::new(FlushTimerState::Idle as u8),
        })
    }

    /// Arm the timer. Idempotent: arming an already-armed timer does not
    /// postpone the pending fire.
    pub fn arm(&self) {
        self.armed.notify_one();
    }

    pub fn state(&self) -> FlushTimerState {
        match self.state.load(Ordering::SeqCst) {
            0 => FlushTimerState::Idle,
            1 => FlushTimerState::Armed,
            _ => FlushTimerState::Firing,
        }
    }

    fn set_state(&self, state: FlushTimerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Drive the timer until shutdown. `flush` is invoked on every fire
    /// and once more as a final drain when the signal triggers.
    pub async fn run<F, Fut>(self: Arc<Self>, shutdown: ShutdownSignal, mut flush: F)
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = FlushOutcome> + Send,
    {
        info!(
            queue = self.name,
            interval_ms = self.interval.as_millis() as u64,
            "Flush scheduler started"
        );

        'outer: loop {
            self.set_state(FlushTimerState::Idle);
            tokio::select! {
                _ = self.armed.notified() => {}
                _ = shutdown.wait() => break 'outer,
            }

            loop {
                self.set_state(FlushTimerState::Armed);
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = shutdown.wait() => break 'outer,
                }

                self.set_state(FlushTimerState::Firing);
                let outcome = flush().await;
                if outcome.drained == 0 {
                    debug!(queue = self.name, "Flush fired on empty queue, skipped");
                }

                if !outcome.rearm {
                    // Back to Idle; an arm that raced the upload left a
                    // permit behind and re-enters immediately.
                    break;
                }
            }
        }

        // Final drain so queued work is not lost on shutdown
        self.set_state(FlushTimerState::Firing);
        let outcome = flush().await;
        if outcome.drained > 0 {
            info!(
                queue = self.name,
                drained = outcome.drained,
                "Drained pending work during shutdown"
            );
        }

        self.set_state(FlushTimerState::Idle);
        info!(queue = self.name, "Flush scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_flush(
        counter: Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = FlushOutcome> + Send>> {
        move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                FlushOutcome {
                    drained: 1,
                    rearm: false,
                }
            })
        }
    }

    #[tokio::test]
    async fn unarmed_timer_never_fires() {
        let scheduler = FlushScheduler::new("test", Duration::from_millis(10));
        let shutdown = ShutdownSignal::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(scheduler.clone().run(shutdown.clone(), counting_flush(fired.clone())));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.state(), FlushTimerState::Idle);

        shutdown.trigger();
        handle.await.unwrap();
        // Only the final shutdown drain ran
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn armed_timer_fires_after_interval() {
        let scheduler = FlushScheduler::new("test", Duration::from_millis(20));
        let shutdown = ShutdownSignal::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(scheduler.clone().run(shutdown.clone(), counting_flush(fired.clone())));

        scheduler.arm();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0, "must not fire before the interval");

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn arm_during_firing_schedules_next_cycle() {
        let scheduler = FlushScheduler::new("test", Duration::from_millis(10));
        let shutdown = ShutdownSignal::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(scheduler.clone().run(shutdown.clone(), counting_flush(fired.clone())));

        scheduler.arm();
        tokio::time::sleep(Duration::from_millis(25)).await;
        let after_first = fired.load(Ordering::SeqCst);
        assert!(after_first >= 1);

        // New work while the previous cycle may still be settling
        scheduler.arm();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(fired.load(Ordering::SeqCst) > after_first);

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_runs_final_drain() {
        let scheduler = FlushScheduler::new("test", Duration::from_secs(3600));
        let shutdown = ShutdownSignal::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(scheduler.clone().run(shutdown.clone(), counting_flush(fired.clone())));

        // Armed with a huge interval: only the shutdown drain can fire
        scheduler.arm();
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

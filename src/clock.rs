//! Monotonic time source and cancellable timers.
//!
//! Every delay the trial flow waits on is spawned through [`Clock`], which hands back a
//! [`TimerHandle`]. Cancelling or dropping the handle stops the callback before it runs; a
//! callback that is already waiting on a lock is dropped at its next await point.

use std::{future::Future, ops::ControlFlow, time::Duration};

use log::trace;
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Milliseconds since this clock was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    pub async fn sleep(&self, duration: Duration) {
        time::sleep(duration).await;
    }

    /// Spawns `task` with a fresh cancellation token. The task is raced against the token,
    /// so cancelling the returned handle drops it even if it never checks the token itself.
    pub fn spawn<F, Fut>(&self, task: F) -> TimerHandle
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let watched = token.clone();
        let fut = task(token.clone());

        let join = tokio::spawn(async move {
            tokio::select! {
                _ = watched.cancelled() => {}
                _ = fut => {}
            }
        });

        TimerHandle {
            token,
            join,
            armed: true,
        }
    }

    pub fn schedule_once<F, Fut>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(move |_| async move {
            time::sleep(delay).await;
            callback().await;
        })
    }

    /// Calls `callback` every `period`, first after one full period, passing the 1-based
    /// firing count. Stops when the callback returns `ControlFlow::Break`.
    pub fn schedule_repeating<F, Fut>(&self, period: Duration, mut callback: F) -> TimerHandle
    where
        F: FnMut(u32) -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        self.spawn(move |_| async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut fired: u32 = 0;
            loop {
                interval.tick().await;
                fired = fired.saturating_add(1);
                if callback(fired).await.is_break() {
                    break;
                }
            }
        })
    }
}

/// Owner of one scheduled timer. Dropping the handle cancels the timer; a callback that
/// ends its own timer calls [`TimerHandle::detach`] instead.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
    armed: bool,
}

impl TimerHandle {
    /// Synchronously cancels the timer. Safe to call any number of times.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            trace!("timer cancelled");
        }
        self.token.cancel();
        self.join.abort();
    }

    /// Releases the handle without stopping the timer.
    pub fn detach(mut self) {
        self.armed = false;
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if self.armed {
            self.cancel();
        }
    }
}

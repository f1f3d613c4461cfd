//! Local timers. A [`Timer`] runs its callback on the current `LocalSet` and
//! is cancelled when dropped.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

pub(crate) struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Run `f` once after `delay`.
    pub(crate) fn once(delay: Duration, f: impl FnOnce() + 'static) -> Self {
        let handle = tokio::task::spawn_local(async move {
            time::sleep(delay).await;
            f();
        });
        Self { handle }
    }

    /// Run `f` every `period`, first after one full period.
    pub(crate) fn every(period: Duration, mut f: impl FnMut() + 'static) -> Self {
        let handle = tokio::task::spawn_local(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                f();
            }
        });
        Self { handle }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

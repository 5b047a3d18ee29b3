//! Per-group countdown.
//!
//! [`GroupTimer`] is the synchronous state machine; it lives inside the
//! engine's state lock. Entering `running` hands out a [`Countdown`], which
//! the engine turns into a ticking task via [`spawn_countdown`]. Every tick
//! carries the countdown's generation, and the timer ignores ticks from any
//! generation but the current one, so a task that was cancelled while a tick
//! was already in flight can never decrement or fire a later cycle.
//!
//! Pausing keeps the fraction of the current second that already elapsed, so
//! a resumed countdown's first tick comes early by that amount.

use std::future::Future;
use std::time::Duration;

use cuebus_core::{TimerState, TimerStatus};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const TICK: Duration = Duration::from_secs(1);

/// Operator action for `playback.control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackAction {
    Start,
    Stop,
    Reset,
}

/// Handle for one running cycle of a timer.
#[derive(Debug, Clone)]
pub struct Countdown {
    pub generation: u64,
    pub token: CancellationToken,
    /// Delay before the first tick; one full tick unless resuming mid-second.
    pub first_tick: Duration,
}

/// What a tick did to the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Tick belongs to a cancelled cycle or the timer is not running.
    Stale,
    /// One second elapsed, countdown continues.
    Counted,
    /// Countdown reached zero and restarted. `fire_count` is the number of
    /// earlier expiries since the last reset.
    Expired { fire_count: u64 },
}

#[derive(Debug)]
pub struct GroupTimer {
    state: TimerState,
    generation: u64,
    token: Option<CancellationToken>,
    /// Start of the second currently being counted.
    anchor: Instant,
    /// Part of the current second spent before the last pause.
    carried: Duration,
}

impl GroupTimer {
    /// New timers are idle with the full interval displayed.
    pub fn new(interval: u64) -> Self {
        Self {
            state: TimerState {
                duration: interval,
                iteration: 0,
                state: TimerStatus::Idle,
            },
            generation: 0,
            token: None,
            anchor: Instant::now(),
            carried: Duration::ZERO,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn status(&self) -> TimerStatus {
        self.state.state
    }

    /// Apply an operator action. Returns a countdown to spawn when the timer
    /// entered `running`; actions that make no sense in the current state are
    /// ignored.
    pub fn apply(&mut self, action: PlaybackAction, interval: u64) -> Option<Countdown> {
        match (self.state.state, action) {
            (TimerStatus::Idle, PlaybackAction::Start) => Some(self.start(interval)),
            (TimerStatus::Paused, PlaybackAction::Start) => Some(self.resume()),
            (TimerStatus::Running, PlaybackAction::Stop) => {
                self.pause();
                None
            }
            (TimerStatus::Running | TimerStatus::Paused, PlaybackAction::Reset) => {
                self.stop(interval);
                None
            }
            _ => None,
        }
    }

    /// Begin a fresh countdown of `duration` seconds.
    pub fn start(&mut self, duration: u64) -> Countdown {
        self.state.duration = duration;
        self.carried = Duration::ZERO;
        self.begin()
    }

    /// Continue from the retained remaining duration.
    pub fn resume(&mut self) -> Countdown {
        self.begin()
    }

    /// Suspend, keeping the remaining duration and the elapsed part of the
    /// current second.
    pub fn pause(&mut self) {
        self.cancel();
        self.carried = (self.carried + self.anchor.elapsed()).min(TICK);
        self.state.state = TimerStatus::Paused;
    }

    /// Cancel and return to idle showing the full interval.
    pub fn stop(&mut self, interval: u64) {
        self.cancel();
        self.carried = Duration::ZERO;
        self.state = TimerState {
            duration: interval,
            iteration: 0,
            state: TimerStatus::Idle,
        };
    }

    /// Show a new interval. Only a timer that is not counting down changes
    /// its displayed duration; a running timer picks it up at expiry.
    pub fn set_interval(&mut self, interval: u64) {
        if self.state.state != TimerStatus::Running {
            self.state.duration = interval;
            self.carried = Duration::ZERO;
        }
    }

    /// Advance one second on behalf of countdown `generation`. On expiry the
    /// countdown restarts from `interval`, read by the caller at that moment.
    pub fn tick(&mut self, generation: u64, interval: u64) -> Tick {
        if generation != self.generation || self.state.state != TimerStatus::Running {
            return Tick::Stale;
        }
        self.anchor = Instant::now();
        self.carried = Duration::ZERO;
        self.state.duration = self.state.duration.saturating_sub(1);
        if self.state.duration > 0 {
            return Tick::Counted;
        }
        let fire_count = self.state.iteration;
        self.state.iteration += 1;
        self.state.duration = interval;
        Tick::Expired { fire_count }
    }

    /// Cancel the running countdown task, if any. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }

    fn begin(&mut self) -> Countdown {
        self.cancel();
        self.generation += 1;
        self.state.state = TimerStatus::Running;
        self.anchor = Instant::now();
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        Countdown {
            generation: self.generation,
            token,
            first_tick: TICK - self.carried,
        }
    }
}

impl Drop for GroupTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Run `on_tick(generation)` once per second, starting after
/// `countdown.first_tick`, until the countdown is cancelled or `on_tick`
/// returns `false`.
pub fn spawn_countdown<F, Fut>(countdown: Countdown, mut on_tick: F) -> JoinHandle<()>
where
    F: FnMut(u64) -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    tokio::spawn(async move {
        let start = Instant::now() + countdown.first_tick;
        let mut interval = tokio::time::interval_at(start, TICK);
        loop {
            tokio::select! {
                _ = countdown.token.cancelled() => break,
                _ = interval.tick() => {
                    if countdown.token.is_cancelled() || !on_tick(countdown.generation).await {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn start_from_idle_runs_full_interval() {
        let mut t = GroupTimer::new(10);
        let cd = t.apply(PlaybackAction::Start, 10).expect("countdown");
        assert_eq!(cd.generation, 1);
        assert_eq!(t.state(), TimerState { duration: 10, iteration: 0, state: TimerStatus::Running });
    }

    #[test]
    fn stop_then_start_resumes_remaining() {
        let mut t = GroupTimer::new(10);
        let cd = t.apply(PlaybackAction::Start, 10).unwrap();
        t.tick(cd.generation, 10);
        t.tick(cd.generation, 10);

        assert!(t.apply(PlaybackAction::Stop, 10).is_none());
        assert!(cd.token.is_cancelled());
        assert_eq!(t.state().state, TimerStatus::Paused);
        assert_eq!(t.state().duration, 8);

        let resumed = t.apply(PlaybackAction::Start, 10).unwrap();
        assert_eq!(t.state().state, TimerStatus::Running);
        assert_eq!(t.state().duration, 8);
        assert_eq!(resumed.generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_keeps_the_elapsed_part_of_a_second() {
        let mut t = GroupTimer::new(10);
        let cd = t.apply(PlaybackAction::Start, 10).unwrap();
        assert_eq!(cd.first_tick, TICK);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        t.tick(cd.generation, 10);
        tokio::time::sleep(Duration::from_millis(400)).await;
        t.apply(PlaybackAction::Stop, 10);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let resumed = t.apply(PlaybackAction::Start, 10).unwrap();
        assert_eq!(resumed.first_tick, Duration::from_millis(600));

        // a second pause before the next tick accumulates
        tokio::time::sleep(Duration::from_millis(200)).await;
        t.apply(PlaybackAction::Stop, 10);
        let again = t.apply(PlaybackAction::Start, 10).unwrap();
        assert_eq!(again.first_tick, Duration::from_millis(400));

        t.apply(PlaybackAction::Reset, 10);
        let fresh = t.apply(PlaybackAction::Start, 10).unwrap();
        assert_eq!(fresh.first_tick, TICK);
    }

    #[test]
    fn reset_returns_to_idle_with_interval() {
        for pause_first in [false, true] {
            let mut t = GroupTimer::new(10);
            let cd = t.apply(PlaybackAction::Start, 10).unwrap();
            t.tick(cd.generation, 10);
            if pause_first {
                t.apply(PlaybackAction::Stop, 10);
            }
            t.apply(PlaybackAction::Reset, 12);
            assert_eq!(t.state(), TimerState { duration: 12, iteration: 0, state: TimerStatus::Idle });
            assert!(cd.token.is_cancelled());
        }
    }

    #[test]
    fn meaningless_actions_are_ignored() {
        let mut t = GroupTimer::new(10);
        assert!(t.apply(PlaybackAction::Stop, 10).is_none());
        assert!(t.apply(PlaybackAction::Reset, 10).is_none());
        assert_eq!(t.status(), TimerStatus::Idle);

        t.apply(PlaybackAction::Start, 10);
        assert!(t.apply(PlaybackAction::Start, 10).is_none());
        assert_eq!(t.status(), TimerStatus::Running);
    }

    #[test]
    fn expiry_restarts_with_interval_read_at_expiry() {
        let mut t = GroupTimer::new(3);
        let cd = t.apply(PlaybackAction::Start, 3).unwrap();
        assert_eq!(t.tick(cd.generation, 3), Tick::Counted);
        // interval edited mid-cycle: current countdown is not truncated
        t.set_interval(7);
        assert_eq!(t.state().duration, 2);
        assert_eq!(t.tick(cd.generation, 7), Tick::Counted);
        assert_eq!(t.tick(cd.generation, 7), Tick::Expired { fire_count: 0 });
        assert_eq!(t.state(), TimerState { duration: 7, iteration: 1, state: TimerStatus::Running });
    }

    #[test]
    fn fire_count_grows_per_expiry() {
        let mut t = GroupTimer::new(1);
        let cd = t.apply(PlaybackAction::Start, 1).unwrap();
        assert_eq!(t.tick(cd.generation, 1), Tick::Expired { fire_count: 0 });
        assert_eq!(t.tick(cd.generation, 1), Tick::Expired { fire_count: 1 });
        assert_eq!(t.tick(cd.generation, 1), Tick::Expired { fire_count: 2 });
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut t = GroupTimer::new(5);
        let old = t.apply(PlaybackAction::Start, 5).unwrap();
        t.apply(PlaybackAction::Reset, 5);
        let new = t.apply(PlaybackAction::Start, 5).unwrap();

        assert_eq!(t.tick(old.generation, 5), Tick::Stale);
        assert_eq!(t.state().duration, 5);
        assert_eq!(t.tick(new.generation, 5), Tick::Counted);
    }

    #[test]
    fn ticks_while_not_running_are_stale() {
        let mut t = GroupTimer::new(5);
        assert_eq!(t.tick(0, 5), Tick::Stale);
        let cd = t.apply(PlaybackAction::Start, 5).unwrap();
        t.apply(PlaybackAction::Stop, 5);
        assert_eq!(t.tick(cd.generation, 5), Tick::Stale);
        assert_eq!(t.state().duration, 5);
    }

    #[test]
    fn set_interval_updates_idle_and_paused_only() {
        let mut t = GroupTimer::new(5);
        t.set_interval(9);
        assert_eq!(t.state().duration, 9);

        let cd = t.apply(PlaybackAction::Start, 9).unwrap();
        t.set_interval(20);
        assert_eq!(t.state().duration, 9);

        t.tick(cd.generation, 20);
        t.apply(PlaybackAction::Stop, 20);
        t.set_interval(4);
        assert_eq!(t.state().duration, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_each_second_until_cancelled() {
        let mut t = GroupTimer::new(10);
        let cd = t.apply(PlaybackAction::Start, 10).unwrap();
        let token = cd.token.clone();
        let ticks = Arc::new(AtomicU64::new(0));
        let seen = ticks.clone();

        let handle = spawn_countdown(cd, move |_| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}

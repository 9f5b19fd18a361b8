//! # Activity Watchdog
//!
//! Process-wide record of the last productive step, plus the two windows in
//! which a long silence is expected: a deliberate pacing delay and the
//! countdown to the next cycle. A freeze is reported only outside both
//! windows; it is never fatal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub const DEFAULT_FREEZE_THRESHOLD: Duration = Duration::from_secs(5 * 60);

const PACING_BIT: u64 = 1 << 63;
const COUNTDOWN_BIT: u64 = 1 << 62;
const WINDOW_BITS: u64 = PACING_BIT | COUNTDOWN_BIT;
const TIME_MASK: u64 = COUNTDOWN_BIT - 1;

/// Shared activity record.
///
/// Both window flags and the last activity time (milliseconds since `origin`)
/// live in one word, so every transition is a single atomic update and a
/// reader never sees a closed window paired with a stale timestamp.
#[derive(Debug)]
pub struct ActivityState {
    origin: Instant,
    state: AtomicU64,
    freezes: AtomicU64,
    freeze_threshold: Duration,
}

impl Default for ActivityState {
    fn default() -> Self {
        Self::new(DEFAULT_FREEZE_THRESHOLD)
    }
}

impl ActivityState {
    pub fn new(freeze_threshold: Duration) -> Self {
        Self {
            origin: Instant::now(),
            state: AtomicU64::new(0),
            freezes: AtomicU64::new(0),
            freeze_threshold,
        }
    }

    pub fn shared(freeze_threshold: Duration) -> Arc<Self> {
        Arc::new(Self::new(freeze_threshold))
    }

    fn now_ms(&self) -> u64 {
        (self.origin.elapsed().as_millis() as u64) & TIME_MASK
    }

    fn update(&self, f: impl Fn(u64) -> Option<u64>) {
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, f);
    }

    /// Records a productive step. Ignored while the countdown runs.
    pub fn mark_activity(&self) {
        let now = self.now_ms();
        self.update(|s| (s & COUNTDOWN_BIT == 0).then_some((s & WINDOW_BITS) | now));
    }

    pub fn begin_pacing(&self) {
        self.state.fetch_or(PACING_BIT, Ordering::SeqCst);
    }

    pub fn end_pacing(&self) {
        self.state.fetch_and(!PACING_BIT, Ordering::SeqCst);
    }

    pub fn is_pacing(&self) -> bool {
        self.state.load(Ordering::SeqCst) & PACING_BIT != 0
    }

    pub fn begin_countdown(&self) {
        self.state.fetch_or(COUNTDOWN_BIT, Ordering::SeqCst);
    }

    /// Leaves the countdown window and counts the transition as activity.
    pub fn end_countdown(&self) {
        let now = self.now_ms();
        self.update(|s| Some((s & PACING_BIT) | now));
    }

    pub fn in_countdown(&self) -> bool {
        self.state.load(Ordering::SeqCst) & COUNTDOWN_BIT != 0
    }

    pub fn freeze_threshold(&self) -> Duration {
        self.freeze_threshold
    }

    /// Number of freezes [`check_freeze`](Self::check_freeze) has reported.
    pub fn freeze_count(&self) -> u64 {
        self.freezes.load(Ordering::SeqCst)
    }

    fn idle_since(&self, state: u64) -> Duration {
        Duration::from_millis(self.now_ms().saturating_sub(state & TIME_MASK))
    }

    pub fn idle_for(&self) -> Duration {
        self.idle_since(self.state.load(Ordering::SeqCst))
    }

    pub fn is_frozen(&self) -> bool {
        let state = self.state.load(Ordering::SeqCst);
        if state & WINDOW_BITS != 0 {
            return false;
        }
        self.idle_since(state) > self.freeze_threshold
    }

    /// Like [`is_frozen`](Self::is_frozen), but reports the freeze.
    pub fn check_freeze(&self) -> bool {
        if !self.is_frozen() {
            return false;
        }
        self.freezes.fetch_add(1, Ordering::SeqCst);
        error!(
            "Freeze detected! No activity for {} seconds. Continuing to next account...",
            self.idle_for().as_secs()
        );
        true
    }

    /// Marks a pacing window that closes when the guard is dropped.
    pub fn pacing_guard(&self) -> PacingGuard<'_> {
        self.begin_pacing();
        PacingGuard { state: self }
    }

    /// Sleeps inside a pacing window and records activity before the window
    /// closes.
    pub async fn pace(&self, duration: Duration) {
        let _guard = self.pacing_guard();
        tokio::time::sleep(duration).await;
        self.mark_activity();
    }
}

/// Closes the pacing window on drop, including when the sleeping future is
/// cancelled.
#[must_use = "the pacing window closes as soon as the guard is dropped"]
pub struct PacingGuard<'a> {
    state: &'a ActivityState,
}

impl Drop for PacingGuard<'_> {
    fn drop(&mut self) {
        self.state.end_pacing();
    }
}

/// Starts the fixed-interval freeze monitor. Detection only; it stops when
/// `shutdown` is cancelled.
pub fn spawn_watchdog(
    activity: Arc<ActivityState>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Watchdog stopped");
                    break;
                }
                _ = ticker.tick() => {
                    activity.check_freeze();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_fresh_state_is_not_frozen() {
        let state = ActivityState::default();
        assert!(!state.is_frozen());
        advance(Duration::from_secs(299)).await;
        assert!(!state.check_freeze());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_past_threshold_is_frozen() {
        let state = ActivityState::default();
        state.mark_activity();
        advance(Duration::from_secs(301)).await;
        assert!(state.is_frozen());
        assert!(state.check_freeze());

        state.mark_activity();
        assert!(!state.is_frozen());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_window_suppresses_freeze() {
        let state = ActivityState::default();
        state.begin_pacing();
        advance(Duration::from_secs(3600)).await;
        assert!(!state.check_freeze());

        state.end_pacing();
        assert!(state.is_frozen());
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_suppresses_freeze_and_activity() {
        let state = ActivityState::default();
        state.begin_countdown();
        advance(Duration::from_secs(400)).await;
        state.mark_activity();
        assert!(!state.is_frozen());
        // mark_activity was ignored during the countdown
        assert!(state.idle_for() >= Duration::from_secs(400));

        state.end_countdown();
        assert!(!state.is_frozen());
        assert_eq!(state.idle_for(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_marks_activity_and_closes_window() {
        let state = ActivityState::default();
        advance(Duration::from_secs(200)).await;
        state.pace(Duration::from_secs(200)).await;
        assert!(!state.is_pacing());
        assert_eq!(state.idle_for(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_guard_resets_on_drop() {
        let state = ActivityState::default();
        {
            let _guard = state.pacing_guard();
            assert!(state.is_pacing());
        }
        assert!(!state.is_pacing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_reports_freeze() {
        let state = Arc::new(ActivityState::default());
        let shutdown = CancellationToken::new();
        let handle = spawn_watchdog(state.clone(), Duration::from_secs(60), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(400)).await;
        assert!(state.freeze_count() >= 1);

        shutdown.cancel();
        assert!(handle.await.is_ok());
    }

    #[test]
    fn test_leaving_countdown_is_never_seen_as_frozen() {
        use std::sync::atomic::AtomicBool;
        use std::thread;

        let state = Arc::new(ActivityState::new(Duration::from_millis(100)));
        for _ in 0..5 {
            state.begin_countdown();
            let done = Arc::new(AtomicBool::new(false));
            let checker = {
                let state = state.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut seen_frozen = false;
                    while !done.load(Ordering::SeqCst) {
                        seen_frozen |= state.is_frozen();
                    }
                    seen_frozen
                })
            };

            thread::sleep(Duration::from_millis(150));
            state.end_countdown();
            done.store(true, Ordering::SeqCst);

            assert!(!checker.join().unwrap());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_flags_keep_timestamp() {
        let state = ActivityState::default();
        advance(Duration::from_secs(10)).await;
        state.mark_activity();
        state.begin_pacing();
        state.begin_countdown();
        state.end_pacing();
        assert!(state.in_countdown());
        assert!(!state.is_pacing());
        assert_eq!(state.idle_for(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_stops_on_shutdown() {
        let state = Arc::new(ActivityState::default());
        let shutdown = CancellationToken::new();
        let handle = spawn_watchdog(state, Duration::from_secs(60), shutdown.clone());

        advance(Duration::from_secs(600)).await;
        shutdown.cancel();
        assert!(handle.await.is_ok());
    }
}

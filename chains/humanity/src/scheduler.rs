//! Cycle Scheduler - walks every account, then counts down to the next pass
//!
//! Accounts are processed one at a time, in file order. Each account runs
//! profile, daily reward and referral steps separated by randomized pauses.
//! A freeze detected between steps abandons the rest of that account.

use crate::account::AccountContext;
use crate::engine::AccountRoutine;
use core_logic::{targets, ActivityState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Profile,
    Daily,
    Referral,
}

const STEPS: [Step; 3] = [Step::Profile, Step::Daily, Step::Referral];

/// Totals for one pass over all accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub accounts: usize,
    /// Accounts whose remaining steps were skipped after a freeze
    pub abandoned: usize,
    /// Steps that produced a result
    pub succeeded: usize,
    /// Steps that exhausted their retries
    pub failed: usize,
}

pub struct CycleScheduler<R: AccountRoutine> {
    routine: R,
    accounts: Vec<AccountContext>,
    activity: Arc<ActivityState>,
    run_interval: Duration,
}

impl<R: AccountRoutine> CycleScheduler<R> {
    pub fn new(
        routine: R,
        accounts: Vec<AccountContext>,
        activity: Arc<ActivityState>,
        run_interval: Duration,
    ) -> Self {
        Self {
            routine,
            accounts,
            activity,
            run_interval,
        }
    }

    pub fn accounts(&self) -> &[AccountContext] {
        &self.accounts
    }

    pub fn routine(&self) -> &R {
        &self.routine
    }

    /// One pass over every account.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport {
            accounts: self.accounts.len(),
            ..CycleReport::default()
        };

        for account in self.accounts.iter_mut() {
            self.activity.mark_activity();
            info!(target: targets::CYCLE, "Processing account {}", account.display_id);

            let completed =
                process_account(&mut self.routine, &self.activity, account, &mut report).await;
            if !completed {
                report.abandoned += 1;
            }
        }

        report
    }

    /// Logs the remaining time every second until `duration` has elapsed.
    /// Returns `false` when cancelled first.
    pub async fn countdown(&self, duration: Duration, shutdown: &CancellationToken) -> bool {
        self.activity.begin_countdown();

        let mut remaining = duration;
        let mut ticker = interval_at(Instant::now() + COUNTDOWN_TICK, COUNTDOWN_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(target: targets::COUNTDOWN, "{}", format_remaining(remaining));

        let completed = loop {
            if remaining.is_zero() {
                break true;
            }
            tokio::select! {
                _ = shutdown.cancelled() => break false,
                _ = ticker.tick() => {
                    remaining = remaining.saturating_sub(COUNTDOWN_TICK);
                    info!(target: targets::COUNTDOWN, "{}", format_remaining(remaining));
                }
            }
        };

        self.activity.end_countdown();
        completed
    }

    /// Alternates cycles and countdowns until `shutdown` is cancelled.
    pub async fn run_forever(&mut self, shutdown: CancellationToken) {
        loop {
            info!(target: targets::CYCLE, "Starting cycle for {} accounts", self.accounts.len());

            let report = tokio::select! {
                report = self.run_cycle() => report,
                _ = shutdown.cancelled() => break,
            };

            info!(
                target: targets::CYCLE,
                "Cycle completed: {} accounts, {} steps ok, {} failed, {} abandoned",
                report.accounts,
                report.succeeded,
                report.failed,
                report.abandoned
            );
            let next_run = chrono::Local::now()
                + chrono::Duration::from_std(self.run_interval).unwrap_or(chrono::Duration::zero());
            info!(
                target: targets::CYCLE,
                "Starting countdown for next run at {}",
                next_run.format("%Y-%m-%d %H:%M:%S")
            );

            if !self.countdown(self.run_interval, &shutdown).await {
                break;
            }
        }

        info!("Scheduler stopped");
    }
}

/// Runs the steps of one account. Returns `false` when a freeze cut it short.
async fn process_account<R: AccountRoutine>(
    routine: &mut R,
    activity: &ActivityState,
    account: &mut AccountContext,
    report: &mut CycleReport,
) -> bool {
    for (index, step) in STEPS.iter().enumerate() {
        activity.mark_activity();
        let ok = match step {
            Step::Profile => routine.fetch_profile(account).await.is_some(),
            Step::Daily => routine.claim_daily(account).await.is_some(),
            Step::Referral => routine.check_referral(account).await.is_some(),
        };
        if ok {
            report.succeeded += 1;
        } else {
            report.failed += 1;
        }

        if activity.check_freeze() {
            return false;
        }
        routine.pause_between_steps().await;
        if index + 1 < STEPS.len() && activity.check_freeze() {
            return false;
        }
    }
    true
}

pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    format!(
        "Next run in: {}h {}m {}s",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

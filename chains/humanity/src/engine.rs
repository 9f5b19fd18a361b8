//! Request Engine - retried, paced account operations
//!
//! Every operation runs the same attempt loop:
//!
//! 1. Make sure the account holds a session, renewing it when missing and
//!    occasionally even when present.
//! 2. Wait a randomized pacing delay.
//! 3. Send the operation's requests with freshly generated browser headers.
//! 4. Decode and interpret the response.
//!
//! A failed attempt backs off and retries until [`RetryConfig::max_attempts`]
//! is spent. Failures never leave the engine: the caller gets `None`.

use crate::account::AccountContext;
use crate::api::{display_value, DailyOutcome, Endpoints, Operation, ProfileSummary, RewardStatus};
use crate::config::RunnerConfig;
use crate::session::SessionManager;
use async_trait::async_trait;
use core_logic::{
    attempt_timeout, targets, ActivityState, ConfigError, DelayRange, Entropy, HttpRequest,
    RetryConfig, SessionError, TaskError, Transport,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Upper bound of the random extra added to the profile timeout.
const PROFILE_TIMEOUT_JITTER_MS: u64 = 5_000;

/// The per-account steps the cycle scheduler drives.
#[async_trait]
pub trait AccountRoutine: Send {
    async fn fetch_profile(&mut self, account: &mut AccountContext) -> Option<ProfileSummary>;

    async fn claim_daily(&mut self, account: &mut AccountContext) -> Option<DailyOutcome>;

    async fn check_referral(&mut self, account: &mut AccountContext) -> Option<RewardStatus>;

    /// Randomized pause between two steps of the same account.
    async fn pause_between_steps(&mut self);
}

#[derive(Clone, Copy)]
enum Endpoint {
    UserInfo,
    DailyCheck,
    DailyClaim,
    ReferralCheck,
}

enum Output {
    Profile(ProfileSummary),
    Daily(DailyOutcome),
    Referral(RewardStatus),
}

pub struct RequestEngine {
    transport: Arc<dyn Transport>,
    activity: Arc<ActivityState>,
    sessions: SessionManager,
    entropy: Box<dyn Entropy>,
    config: RunnerConfig,
    endpoints: Endpoints,
    retry: RetryConfig,
}

impl RequestEngine {
    /// Fails when `config.base_url` cannot be resolved into endpoint URLs.
    pub fn new(
        transport: Arc<dyn Transport>,
        activity: Arc<ActivityState>,
        config: RunnerConfig,
        entropy: Box<dyn Entropy>,
    ) -> Result<Self, ConfigError> {
        let endpoints = Endpoints::resolve(&config.service_url()?)?;
        let sessions = SessionManager::new(
            transport.clone(),
            activity.clone(),
            endpoints.login.clone(),
            config.base_timeout(),
        );

        Ok(Self {
            transport,
            activity,
            sessions,
            entropy,
            config,
            endpoints,
            retry: RetryConfig::request(),
        })
    }

    async fn run(&mut self, op: Operation, account: &mut AccountContext) -> Option<Output> {
        for attempt in 0..self.retry.max_attempts {
            if let Err(e) = self.ensure_session(account).await {
                error!("[{}] {} failed (Attempt {}): {}", account.display_id, op, attempt + 1, e);
                if self.retry.has_retry_left(attempt) {
                    continue;
                }
                break;
            }

            match self.attempt(op, account, attempt).await {
                Ok(output) => return Some(output),
                Err(e) => {
                    error!("[{}] {} failed (Attempt {}): {}", account.display_id, op, attempt + 1, e);
                    if !self.retry.has_retry_left(attempt) {
                        break;
                    }

                    let delay = self.retry.calculate_delay(attempt, self.entropy.as_mut());
                    warn!(
                        "[{}] Retrying {} in {}s...",
                        account.display_id,
                        op,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                    self.activity.mark_activity();
                }
            }
        }

        error!("[{}] {} - Max retries reached", account.display_id, op);
        None
    }

    async fn ensure_session(&mut self, account: &mut AccountContext) -> Result<(), SessionError> {
        let refresh = !account.has_session()
            || self.entropy.chance(self.config.session_refresh_probability);
        if !refresh {
            return Ok(());
        }

        info!("[{}] Getting new session...", account.display_id);
        let cookie = self
            .sessions
            .acquire(&account.proxy, &account.identity, self.entropy.as_mut())
            .await?;
        account.session = Some(cookie);
        Ok(())
    }

    async fn attempt(
        &mut self,
        op: Operation,
        account: &AccountContext,
        attempt: u32,
    ) -> Result<Output, TaskError> {
        self.pace(self.config.pacing.request).await;

        match op {
            Operation::Profile => self.profile_once(account, attempt).await.map(Output::Profile),
            Operation::Daily => self.daily_once(account, attempt).await.map(Output::Daily),
            Operation::Referral => self.referral_once(account, attempt).await.map(Output::Referral),
        }
    }

    async fn profile_once(
        &mut self,
        account: &AccountContext,
        attempt: u32,
    ) -> Result<ProfileSummary, TaskError> {
        if self.entropy.chance(self.config.config_check_probability) {
            self.activity.mark_activity();
            let check = HttpRequest::get(&self.endpoints.config)
                .header("User-Agent", &account.identity.user_agent)
                .header("Cookie", account.cookie_header())
                .header("Accept-Language", &account.identity.locale)
                .timeout(attempt_timeout(self.config.config_check_timeout(), attempt));
            self.transport.execute(&account.proxy, check).await?;
            self.pace(self.config.pacing.config_check).await;
        }

        let timeout = Duration::from_millis(self.entropy.below(PROFILE_TIMEOUT_JITTER_MS))
            + attempt_timeout(self.config.base_timeout(), attempt);
        let body = self.post(account, Endpoint::UserInfo, timeout).await?;
        ProfileSummary::from_response(&body)
    }

    async fn daily_once(
        &mut self,
        account: &AccountContext,
        attempt: u32,
    ) -> Result<DailyOutcome, TaskError> {
        let timeout = attempt_timeout(self.config.base_timeout(), attempt);
        let check = RewardStatus::from_value(self.post(account, Endpoint::DailyCheck, timeout).await?);
        log_reward_status(targets::CLAIM, &account.display_id, "Daily Rewards Check", &check);

        if !check.available {
            return Ok(DailyOutcome::Checked(check));
        }

        info!(target: targets::CLAIM, "[{}] Attempting to claim daily rewards...", account.display_id);
        self.pace(self.config.pacing.claim).await;
        let claim = RewardStatus::from_value(self.post(account, Endpoint::DailyClaim, timeout).await?);
        Ok(DailyOutcome::Claimed(claim))
    }

    async fn referral_once(
        &mut self,
        account: &AccountContext,
        attempt: u32,
    ) -> Result<RewardStatus, TaskError> {
        let timeout = attempt_timeout(self.config.base_timeout(), attempt);
        let body = self.post(account, Endpoint::ReferralCheck, timeout).await?;
        Ok(RewardStatus::from_value(body))
    }

    async fn post(
        &mut self,
        account: &AccountContext,
        endpoint: Endpoint,
        timeout: Duration,
    ) -> Result<Value, TaskError> {
        let url = match endpoint {
            Endpoint::UserInfo => self.endpoints.user_info.clone(),
            Endpoint::DailyCheck => self.endpoints.daily_check.clone(),
            Endpoint::DailyClaim => self.endpoints.daily_claim.clone(),
            Endpoint::ReferralCheck => self.endpoints.referral_check.clone(),
        };
        let request = self.api_request(account, url).timeout(timeout);
        self.activity.mark_activity();
        let response = self.transport.execute(&account.proxy, request).await?;
        self.activity.mark_activity();
        Ok(response.json()?)
    }

    /// POST with the full browser header set. Telemetry headers are drawn anew
    /// on every call.
    fn api_request(&mut self, account: &AccountContext, url: String) -> HttpRequest {
        let identity = &account.identity;
        let mouse_x = self.entropy.below(1000);
        let mouse_y = self.entropy.below(1000);
        let scroll_y = self.entropy.below(5000);

        HttpRequest::post(url)
            .header("authority", &self.endpoints.authority)
            .header("accept", "application/json, text/plain, */*")
            .header("accept-language", &identity.locale)
            .header("authorization", format!("Bearer {}", account.token))
            .header("content-type", "application/json")
            .header("cookie", account.cookie_header())
            .header("origin", &self.endpoints.origin)
            .header("priority", "u=1, i")
            .header("referer", &self.endpoints.dashboard)
            .header("sec-ch-ua", identity.sec_ch_ua())
            .header("sec-ch-ua-mobile", identity.sec_ch_ua_mobile())
            .header("sec-ch-ua-platform", identity.sec_ch_ua_platform())
            .header("sec-fetch-dest", "empty")
            .header("sec-fetch-mode", "cors")
            .header("sec-fetch-site", "same-origin")
            .header("token", &account.token)
            .header("user-agent", &identity.user_agent)
            .header("x-mouse-movement", format!("x: {}, y: {}", mouse_x, mouse_y))
            .header("x-scroll-position", format!("y={}", scroll_y))
            .header("x-requested-with", "XMLHttpRequest")
            .json_body(&json!({}))
    }

    async fn pace(&mut self, range: DelayRange) {
        let millis = self.entropy.between(range.min_ms, range.max_ms);
        self.activity.pace(Duration::from_millis(millis)).await;
    }
}

#[async_trait]
impl AccountRoutine for RequestEngine {
    async fn fetch_profile(&mut self, account: &mut AccountContext) -> Option<ProfileSummary> {
        match self.run(Operation::Profile, account).await? {
            Output::Profile(summary) => {
                info!(target: targets::PROFILE, "[{}] User Info", account.display_id);
                info!(target: targets::PROFILE, "Nick Name: {}", summary.nickname);
                info!(
                    target: targets::PROFILE,
                    "Balance: total {} | daily {} | referral today {}",
                    display_value(&summary.total_rewards),
                    display_value(&summary.daily_rewards),
                    display_value(&summary.referral_rewards_today)
                );
                Some(summary)
            }
            _ => None,
        }
    }

    async fn claim_daily(&mut self, account: &mut AccountContext) -> Option<DailyOutcome> {
        match self.run(Operation::Daily, account).await? {
            Output::Daily(outcome) => {
                if let DailyOutcome::Claimed(claim) = &outcome {
                    info!(target: targets::CLAIM, "[{}] Daily rewards claimed", account.display_id);
                    if let Some(message) = &claim.message {
                        info!(target: targets::CLAIM, "Status: {}", message);
                    }
                    if let Some(amount) = &claim.amount {
                        info!(target: targets::CLAIM, "Claimed Amount: {}", display_value(amount));
                    }
                    if let Some(next) = &claim.next_daily_award {
                        info!(target: targets::CLAIM, "Next Award: {}", display_value(next));
                    }
                }
                Some(outcome)
            }
            _ => None,
        }
    }

    async fn check_referral(&mut self, account: &mut AccountContext) -> Option<RewardStatus> {
        match self.run(Operation::Referral, account).await? {
            Output::Referral(status) => {
                log_reward_status(
                    targets::REFERRAL,
                    &account.display_id,
                    "Daily Referral Rewards Check",
                    &status,
                );
                Some(status)
            }
            _ => None,
        }
    }

    async fn pause_between_steps(&mut self) {
        self.pace(self.config.pacing.step).await;
    }
}

fn log_reward_status(target: &'static str, display_id: &str, title: &str, status: &RewardStatus) {
    // tracing targets must be literals, so dispatch on the known ones.
    macro_rules! emit {
        ($target:expr) => {{
            info!(target: $target, "[{}] {}", display_id, title);
            info!(target: $target, "Status: {}", status.message.as_deref().unwrap_or("undefined"));
            info!(target: $target, "Available: {}", status.available_label());
            if let Some(amount) = &status.amount {
                info!(target: $target, "Amount: {}", display_value(amount));
            }
            if let Some(next) = &status.next_daily_award {
                info!(target: $target, "Next Award: {}", display_value(next));
            }
        }};
    }

    if target == targets::REFERRAL {
        emit!(targets::REFERRAL)
    } else {
        emit!(targets::CLAIM)
    }
}

//! Dashboard API endpoints and the response shapes the runner reads.
//!
//! Responses are parsed leniently: only the fields the runner logs or branches
//! on are extracted, everything else stays in the raw JSON.

use crate::config::ServiceUrl;
use core_logic::{ConfigError, TaskError};
use serde_json::Value;
use std::fmt;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const CONFIG_PATH: &str = "/api/config";
pub const USER_INFO_PATH: &str = "/api/user/userInfo";
pub const DAILY_CHECK_PATH: &str = "/api/rewards/daily/check";
pub const DAILY_CLAIM_PATH: &str = "/api/rewards/daily/claim";
pub const REFERRAL_CHECK_PATH: &str = "/api/rewards/referral/check";

/// Business status the profile endpoint reports on success.
pub const SUCCESS_CODE: i64 = 0;

/// Absolute URLs and browser origin headers, resolved once from `base_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub dashboard: String,
    pub config: String,
    pub user_info: String,
    pub daily_check: String,
    pub daily_claim: String,
    pub referral_check: String,
    pub authority: String,
    pub origin: String,
}

impl Endpoints {
    pub fn resolve(service: &ServiceUrl) -> Result<Self, ConfigError> {
        Ok(Self {
            login: service.endpoint(LOGIN_PATH)?,
            dashboard: service.endpoint(DASHBOARD_PATH)?,
            config: service.endpoint(CONFIG_PATH)?,
            user_info: service.endpoint(USER_INFO_PATH)?,
            daily_check: service.endpoint(DAILY_CHECK_PATH)?,
            daily_claim: service.endpoint(DAILY_CLAIM_PATH)?,
            referral_check: service.endpoint(REFERRAL_CHECK_PATH)?,
            authority: service.authority(),
            origin: service.origin(),
        })
    }
}

/// Nickname and balances from `/api/user/userInfo`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub nickname: String,
    pub total_rewards: Value,
    pub daily_rewards: Value,
    pub referral_rewards_today: Value,
}

impl ProfileSummary {
    /// Accepts the body only when `code == 0` and a `data` object is present.
    pub fn from_response(body: &Value) -> Result<Self, TaskError> {
        let raw_code = body.get("code");
        let message = body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        if raw_code.and_then(Value::as_f64) != Some(SUCCESS_CODE as f64) {
            let code = raw_code
                .and_then(|c| c.as_i64().or_else(|| c.as_f64().map(|f| f as i64)))
                .unwrap_or(-1);
            return Err(TaskError::rejected(code, message));
        }

        let data = match body.get("data") {
            Some(data) if data.is_object() => data,
            _ => return Err(TaskError::rejected(SUCCESS_CODE, "response has no data")),
        };
        let balance = data.get("balance").unwrap_or(&Value::Null);
        let field = |name: &str| balance.get(name).cloned().unwrap_or(Value::Null);

        Ok(Self {
            nickname: data
                .get("nickName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            total_rewards: field("total_rewards"),
            daily_rewards: field("daily_rewards"),
            referral_rewards_today: field("referral_rewards_today"),
        })
    }
}

/// Body of the daily/referral check and claim endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardStatus {
    pub raw: Value,
    pub message: Option<String>,
    pub available: bool,
    pub amount: Option<Value>,
    pub next_daily_award: Option<Value>,
}

impl RewardStatus {
    pub fn from_value(raw: Value) -> Self {
        let present = |name: &str| {
            raw.get(name)
                .filter(|v| !v.is_null() && *v != &Value::Bool(false))
                .cloned()
        };

        Self {
            message: raw.get("message").map(display_value),
            // Only a literal `true` opens the claim.
            available: raw.get("available") == Some(&Value::Bool(true)),
            amount: present("amount"),
            next_daily_award: present("next_daily_award"),
            raw,
        }
    }

    pub fn available_label(&self) -> String {
        self.raw
            .get("available")
            .map(display_value)
            .unwrap_or_else(|| "undefined".to_string())
    }
}

/// Result of one daily-reward operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DailyOutcome {
    /// Reward not available; the check response.
    Checked(RewardStatus),
    /// Reward was available and claimed; the claim response.
    Claimed(RewardStatus),
}

impl DailyOutcome {
    pub fn status(&self) -> &RewardStatus {
        match self {
            DailyOutcome::Checked(status) | DailyOutcome::Claimed(status) => status,
        }
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self, DailyOutcome::Claimed(_))
    }
}

/// Renders a JSON scalar without quotes, anything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The three account operations, named for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Profile,
    Daily,
    Referral,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Profile => "Profile",
            Operation::Daily => "Daily reward",
            Operation::Referral => "Referral check",
        };
        f.write_str(name)
    }
}

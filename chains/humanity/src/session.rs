//! Session Manager - obtains a fresh session cookie from the login page
//!
//! A session is the `name=value` pairs of every cookie the login page sets,
//! joined with `"; "`. Transport failures are retried with backoff; a login
//! page that answers but sets no cookie is final for that acquisition.

use crate::fingerprint::Identity;
use core_logic::{
    attempt_timeout, ActivityState, Entropy, HttpRequest, RetryConfig, SessionError, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    activity: Arc<ActivityState>,
    login_url: String,
    base_timeout: Duration,
    retry: RetryConfig,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        activity: Arc<ActivityState>,
        login_url: String,
        base_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            activity,
            login_url,
            base_timeout,
            retry: RetryConfig::session(),
        }
    }

    /// Loads the login page through `proxy` and returns its cookies.
    pub async fn acquire(
        &self,
        proxy: &str,
        identity: &Identity,
        entropy: &mut dyn Entropy,
    ) -> Result<String, SessionError> {
        for attempt in 0..self.retry.max_attempts {
            self.activity.mark_activity();

            let request = HttpRequest::get(&self.login_url)
                .header("User-Agent", &identity.user_agent)
                .header("Accept-Language", &identity.locale)
                .timeout(attempt_timeout(self.base_timeout, attempt));

            match self.transport.execute(proxy, request).await {
                Ok(response) => {
                    self.activity.mark_activity();
                    return response.session_cookie().ok_or_else(|| {
                        warn!("Login page set no cookie via {}", proxy);
                        unavailable(proxy)
                    });
                }
                Err(e) => {
                    if !self.retry.has_retry_left(attempt) {
                        error!("Max retries reached for getting new session: {}", e);
                        break;
                    }

                    let delay = self.retry.calculate_delay(attempt, entropy);
                    warn!(
                        "[Retry {}] Failed to get new session: {}. Retrying in {}s...",
                        attempt + 1,
                        e,
                        delay.as_secs()
                    );
                    self.activity.mark_activity();
                    tokio::time::sleep(delay).await;
                    self.activity.mark_activity();
                }
            }
        }

        Err(unavailable(proxy))
    }
}

fn unavailable(proxy: &str) -> SessionError {
    SessionError::Unavailable {
        proxy: proxy.to_string(),
    }
}

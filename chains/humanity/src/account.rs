//! Per-account runtime state

use crate::fingerprint::{FingerprintProvider, Identity};
use core_logic::{AccountRecord, Entropy};

const DISPLAY_ID_LEN: usize = 6;

/// One account as the engine sees it.
///
/// `session` starts from the account file's cookie and is replaced whenever
/// the session manager renews it. `identity` never changes after creation.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub proxy: String,
    pub token: String,
    pub session: Option<String>,
    pub identity: Identity,
    /// Last characters of the token, used as the log label
    pub display_id: String,
}

impl AccountContext {
    pub fn new(record: AccountRecord, identity: Identity) -> Self {
        let display_id = display_id(&record.token);
        Self {
            proxy: record.proxy,
            token: record.token,
            session: record.cookie.filter(|cookie| !cookie.trim().is_empty()),
            identity,
            display_id,
        }
    }

    pub fn from_record(
        record: AccountRecord,
        fingerprints: &FingerprintProvider<'_>,
        entropy: &mut dyn Entropy,
    ) -> Self {
        let identity = fingerprints.identity_for(&record.proxy, entropy);
        Self::new(record, identity)
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Value for the `Cookie` header; empty when no session is held.
    pub fn cookie_header(&self) -> &str {
        self.session.as_deref().unwrap_or_default()
    }
}

fn display_id(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let start = chars.len().saturating_sub(DISPLAY_ID_LEN);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::NoGeoLookup;
    use core_logic::testing::ScriptedEntropy;

    fn record(token: &str, cookie: Option<&str>) -> AccountRecord {
        AccountRecord {
            proxy: "http://10.0.0.1:8080".to_string(),
            token: token.to_string(),
            cookie: cookie.map(str::to_string),
        }
    }

    #[test]
    fn test_display_id_is_token_tail() {
        assert_eq!(display_id("eyJhbGciOiJIUzI1NiJ9.abcdef123456"), "123456");
        assert_eq!(display_id("abc"), "abc");
    }

    #[test]
    fn test_cookie_becomes_initial_session() {
        let fingerprints = FingerprintProvider::new(&NoGeoLookup, "US");
        let mut entropy = ScriptedEntropy::quiet();

        let with_cookie =
            AccountContext::from_record(record("token-1", Some("sid=1")), &fingerprints, &mut entropy);
        assert_eq!(with_cookie.cookie_header(), "sid=1");

        let blank =
            AccountContext::from_record(record("token-2", Some("  ")), &fingerprints, &mut entropy);
        assert!(!blank.has_session());
        assert_eq!(blank.cookie_header(), "");
    }
}

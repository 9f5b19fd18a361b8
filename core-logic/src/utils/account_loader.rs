use crate::config::AccountRecord;
use crate::error::{ConfigError, CoreError};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub struct AccountLoader;

impl AccountLoader {
    pub const ACCOUNT_FILE: &'static str = "config.txt";

    /// Loads accounts from `path`.
    /// Format expected: independent lines of proxy|token|cookie (cookie optional)
    ///
    /// Fails when the file is missing or holds no usable line.
    pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<AccountRecord>> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        if !path.exists() {
            return Err(CoreError::from(ConfigError::FileNotFound { path: shown }).into());
        }

        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", shown))?;
        let accounts = Self::parse_accounts(&content);
        if accounts.is_empty() {
            return Err(CoreError::NoAccounts { path: shown }.into());
        }

        info!("Loaded {} accounts from {}", accounts.len(), shown);
        Ok(accounts)
    }

    pub fn parse_accounts(content: &str) -> Vec<AccountRecord> {
        let mut accounts = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split('|').map(str::trim);
            let proxy = parts.next().unwrap_or_default();
            let token = parts.next().unwrap_or_default();
            let cookie = parts.next().filter(|c| !c.is_empty());

            if proxy.is_empty() || token.is_empty() {
                warn!("Skipping invalid account line (expected proxy|token|cookie)");
                continue;
            }

            accounts.push(AccountRecord {
                proxy: proxy.to_string(),
                token: token.to_string(),
                cookie: cookie.map(str::to_string),
            });
        }

        accounts
    }
}

use anyhow::{Context, Result};
use core_logic::{
    setup_logger, spawn_watchdog, AccountLoader, ActivityState, ReqwestTransport, ShutdownSignal,
    SystemEntropy, Transport,
};
use dotenv::dotenv;
use humanity_runner::{
    country_lookup, AccountContext, CycleScheduler, FingerprintProvider, RequestEngine,
    RunnerConfig,
};
use std::env;
use std::sync::Arc;
use tracing::{error, info};

const CONFIG_ENV: &str = "HUMANITY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _log_guard = setup_logger();

    // 1. Load Config
    let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = RunnerConfig::load_or_default(&config_path).context("Failed to load config")?;

    // 2. Load Accounts
    let records = match AccountLoader::load_accounts(&config.accounts_path) {
        Ok(records) => records,
        Err(e) => {
            error!("{:#}", e);
            error!("No valid configurations found in {}", config.accounts_path);
            error!("Format: proxy|token|cookie");
            return Err(e);
        }
    };

    let mut entropy = SystemEntropy::new();
    let lookup = country_lookup(config.geoip_db_path.as_deref())?;
    let fingerprints = FingerprintProvider::new(lookup.as_ref(), &config.default_country);
    let accounts: Vec<AccountContext> = records
        .into_iter()
        .map(|record| AccountContext::from_record(record, &fingerprints, &mut entropy))
        .collect();

    info!("Starting Humanity Runner...");
    info!("Accounts: {}", accounts.len());
    info!("Base URL: {}", config.base_url);
    info!("Interval: {}s", config.run_interval_secs);

    // 3. Watchdog and shutdown
    let activity = ActivityState::shared(config.freeze_threshold());
    let shutdown = ShutdownSignal::install();
    let watchdog = spawn_watchdog(activity.clone(), config.watchdog_interval(), shutdown.clone());

    // 4. Run
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new());
    let run_interval = config.run_interval();
    let engine = RequestEngine::new(transport, activity.clone(), config, Box::new(entropy))
        .context("Invalid base_url")?;
    let mut scheduler = CycleScheduler::new(engine, accounts, activity, run_interval);
    scheduler.run_forever(shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = watchdog.await {
        error!("Watchdog task failed: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use steward::{bootstrap, Config, Database, IdentityService};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = steward::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        steward::logging::init_console_only(&config.logging.level);
    }

    info!("steward - identity and access-control core");

    if let Err(e) = run(config).await {
        error!(error = %e, "Startup failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> steward::Result<()> {
    config.validate()?;

    let db = Arc::new(Database::open(&config.database.path).await?);
    let service = Arc::new(IdentityService::new(Arc::clone(&db), &config.security)?);

    let report = bootstrap::run(&service, &config.bootstrap).await?;
    info!(
        database = %config.database.path,
        roles_created = report.roles_created.len(),
        admin_created = report.admin_created,
        "Identity store ready"
    );

    if config.security.session_sweep_interval_secs > 0 {
        let interval = Duration::from_secs(config.security.session_sweep_interval_secs);
        let sweeper = service.spawn_session_sweeper(interval);
        info!(interval_secs = interval.as_secs(), "Session sweeper running; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        sweeper.abort();
    }

    db.close().await;
    Ok(())
}

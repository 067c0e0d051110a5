pub mod api; // REST surface and middleware
pub mod config;
pub mod core_state; // Shared state: DB location, attachments, audit
pub mod db;
pub mod dispensary; // Medicine inventory, prescription review, dispensing
pub mod fundraising; // Fundraising requests and certificates
pub mod laboratory; // Test reports and attachments
pub mod models;
pub mod pdf; // Receipt / report / certificate rendering
pub mod prescribing; // Prescription form and transactional save
pub mod registry; // Accounts, doctor directory, patient sheets
pub mod scheduling; // Doctor appointments and lab test slots

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Start the service: tracing, data directories, database, API server.
/// Runs until Ctrl-C, then shuts the server down and flushes the audit
/// buffer.
pub async fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    std::fs::create_dir_all(config::app_data_dir()).expect("cannot create data directory");
    std::fs::create_dir_all(config::attachments_dir())
        .expect("cannot create attachments directory");

    let core = Arc::new(core_state::CoreState::new());

    // Open once at startup so migrations run before the first request.
    if let Err(e) = core.open_db() {
        tracing::error!("Database initialisation failed: {e}");
        std::process::exit(1);
    }

    let addr: SocketAddr = config::bind_addr()
        .parse()
        .expect("invalid MEDCENTER_ADDR listen address");

    let mut server = api::start_api_server(core.clone(), addr)
        .await
        .expect("error while starting MedCenter");

    tracing::info!(addr = %server.addr, "{} ready", config::APP_NAME);

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");

    tracing::info!("Shutdown requested");
    server.shutdown();
    if let Err(e) = core.flush_and_prune_audit() {
        tracing::warn!("Final audit flush failed: {e}");
    }
}
